use console::style;

use crate::ai::FragmentIssue;
use crate::report::Source;

/// Status messages for the terminal
///
/// Everything goes to stderr so stdout carries only command output
/// (fragments, rendered config) and stays pipeable.
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn quiet(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("✓").green(), message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn section(&self, message: &str) {
        if !self.quiet {
            eprintln!("\n{}", style(message).bold());
            eprintln!("{}", "─".repeat(40));
        }
    }

    /// Hard issues as errors, advisory ones as warnings
    pub fn fragment_issues(&self, issues: &[FragmentIssue]) {
        for issue in issues {
            if issue.is_advisory() {
                self.warning(&issue.to_string());
            } else {
                self.error(&issue.to_string());
            }
        }
    }

    pub fn sources(&self, sources: &[Source]) {
        if sources.is_empty() {
            return;
        }
        self.section(&format!("{} sources", sources.len()));
        for (idx, source) in sources.iter().enumerate() {
            if !self.quiet {
                eprintln!(
                    "  {}. {} {}",
                    idx + 1,
                    style(&source.title).bold(),
                    style(&source.url).dim()
                );
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
