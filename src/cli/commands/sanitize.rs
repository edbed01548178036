//! Sanitize Command
//!
//! Repair generator output read from a file or stdin.
//!
//! Usage:
//!   finreport sanitize [FILE] [--root-class CLASS] [--check]

use std::io::Read;
use std::path::Path;

use crate::ai::{HtmlRepairer, SanitizeOptions, clean_generated_html};
use crate::cli::Output;
use crate::config::Config;
use crate::types::{FragmentError, Result};

pub struct SanitizeArgs<'a> {
    pub input: Option<&'a Path>,
    pub root_class: Option<String>,
    pub check: bool,
}

/// Print the repaired fragment; with `check`, fail on hard invariant issues
pub fn run(args: SanitizeArgs<'_>, config: &Config, output: &Output) -> Result<()> {
    let raw = read_input(args.input)?;
    let options = options(args.root_class, config);
    let fragment = clean_generated_html(&raw, &HtmlRepairer::with_options(options.clone()));

    println!("{}", fragment);

    if args.check {
        let issues = fragment.check_with(&options.container_tag, &options.root_class);
        output.fragment_issues(&issues);

        let hard: Vec<String> = issues
            .iter()
            .filter(|issue| !issue.is_advisory())
            .map(ToString::to_string)
            .collect();
        if !hard.is_empty() {
            return Err(FragmentError { issues: hard }.into());
        }
        output.success("Fragment is well-formed");
    }

    Ok(())
}

fn options(root_class: Option<String>, config: &Config) -> SanitizeOptions {
    let mut options = config.sanitize.options();
    if let Some(root_class) = root_class {
        options.root_class = root_class;
    }
    options
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
