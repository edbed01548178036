//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/finreport/config.toml)
//! 3. Project config (.finreport/config.toml)
//! 4. Environment variables (FINREPORT_* prefix, `__` separates sections)
//! 5. DEBUG_HTML toggles verbose HTML repair logging

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::constants::env as env_constants;
use crate::types::{ReportError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // FINREPORT_BREAKER__FAILURE_THRESHOLD -> breaker.failure_threshold
        figment = figment.merge(
            Env::prefixed(env_constants::CONFIG_PREFIX)
                .split("__")
                .lowercase(true),
        );

        let mut config: Config = figment
            .extract()
            .map_err(|e| ReportError::Config(format!("Configuration error: {}", e)))?;

        if env_flag(env_constants::DEBUG_HTML_VAR) {
            config.sanitize.debug = true;
        }

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ReportError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory
    pub fn global_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "finreport")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".finreport")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render a configuration as text (TOML), json or yaml
    pub fn render(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => Ok(serde_yaml::to_string(config)?),
            _ => toml::to_string_pretty(config).map_err(|e| ReportError::Config(e.to_string())),
        }
    }

    /// Write a default project config if none exists (or `force`)
    pub fn init_project(dir: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = dir.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        } else {
            info!("Project config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# finreport Project Configuration
# Overrides global defaults; FINREPORT_<SECTION>__<KEY> env vars override this file.

version = "1.0"

[api]
endpoint = "https://api.perplexity.ai/chat/completions"
model = "sonar-reasoning-pro"
api_key_var = "PERPLEXITY_API_KEY"

[retry]
max_attempts = 5
base_delay_ms = 1000
max_delay_secs = 60
timeout_secs = 120

[breaker]
failure_threshold = 3
cool_down_secs = 60

[sanitize]
root_class = "section"
wrapper_class = "report-container"
container_tag = "div"
debug = false

[debug_log]
enabled = false
capacity = 20
"#
        .to_string()
    }
}

/// Interpret an environment variable as a boolean flag
///
/// Accepts `1`, `true`, `yes`, `y`, `on` (case-insensitive); anything else,
/// including an unset variable, is false.
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}
