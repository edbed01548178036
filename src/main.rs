use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use finreport::cli::Output;
use finreport::cli::commands::{ask, config as config_cmd, sanitize};
use finreport::config::{ConfigLoader, env_flag};
use finreport::constants::env as env_constants;

#[derive(Parser)]
#[command(name = "finreport")]
#[command(
    version,
    about = "Resilient search-API client and HTML repair for generated financial reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Config file (skips global/project discovery)")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair generated HTML read from a file or stdin
    Sanitize {
        #[arg(help = "Input file (stdin when omitted or '-')")]
        file: Option<PathBuf>,
        #[arg(long, help = "Class the fragment root must carry")]
        root_class: Option<String>,
        #[arg(long, help = "Fail when the repaired fragment breaks structural checks")]
        check: bool,
    },

    /// Generate one report fragment through the search API
    Ask {
        #[arg(help = "Prompt sent as the user message")]
        prompt: String,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "Run a research call with this model first (e.g. sonar-deep-research)")]
        research_model: Option<String>,
        #[arg(long, help = "Maximum attempts for the request")]
        max_retries: Option<u32>,
        #[arg(long, help = "Per-attempt timeout in seconds")]
        timeout: Option<u64>,
        #[arg(long, help = "Search mode (e.g. sec)")]
        search_mode: Option<String>,
        #[arg(long, help = "Only search sources published after this date (m/d/yyyy)")]
        search_after: Option<String>,
        #[arg(long, short, default_value = "html", help = "Output format: html, json")]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show {
        #[arg(long, short, default_value = "text", help = "Output format: text, json, yaml")]
        format: String,
    },
    /// Show configuration file locations
    Path,
    /// Create .finreport/config.toml in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing configuration")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mfinreport encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // RUST_BACKTRACE=1 still prints the backtrace
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());
    if env_flag(env_constants::DEBUG_HTML_VAR) {
        filter = filter.add_directive("finreport::ai::validation=debug".parse()?);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let output = Output::quiet(cli.quiet);

    match cli.command {
        Commands::Sanitize {
            file,
            root_class,
            check,
        } => {
            let args = sanitize::SanitizeArgs {
                input: file.as_deref(),
                root_class,
                check,
            };
            sanitize::run(args, &config, &output)?;
        }
        Commands::Ask {
            prompt,
            model,
            research_model,
            max_retries,
            timeout,
            search_mode,
            search_after,
            format,
        } => {
            let args = ask::AskArgs {
                prompt,
                model,
                research_model,
                max_retries,
                timeout_secs: timeout,
                search_mode,
                search_after,
                format,
            };
            let rt = Runtime::new()?;
            rt.block_on(ask::run(args, &config, &output))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => config_cmd::show(&config, &format, &output)?,
            ConfigAction::Path => config_cmd::path()?,
            ConfigAction::Init { force } => config_cmd::init(force, &output)?,
        },
    }

    Ok(())
}
