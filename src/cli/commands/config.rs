//! Config Command
//!
//! Manage finreport configuration.
//!
//! Usage:
//!   finreport config show [-f text|json|yaml]
//!   finreport config path
//!   finreport config init [--force]

use crate::cli::Output;
use crate::config::{ApiKeyPool, Config, ConfigLoader};
use crate::types::Result;

/// Show the effective (merged) configuration
pub fn show(config: &Config, format: &str, output: &Output) -> Result<()> {
    println!("{}", ConfigLoader::render(config, format)?);

    let keys = ApiKeyPool::from_env(&config.api.api_key_var);
    if keys.is_empty() {
        output.warning(&format!("{} is not set", config.api.api_key_var));
    } else if keys.pool_size() > 0 {
        output.info(&format!("{} pooled API keys available", keys.pool_size()));
    }
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize project configuration in the current directory
pub fn init(force: bool, output: &Output) -> Result<()> {
    let root = std::env::current_dir()?;
    let config_path = ConfigLoader::init_project(&root, force)?;

    output.success("Initialized project configuration");
    output.info(&format!("Config: {}", config_path.display()));
    Ok(())
}
