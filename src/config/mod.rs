//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/finreport/config.toml)
//! 3. Project config (.finreport/config.toml)
//! 4. Environment variables (FINREPORT_*, DEBUG_HTML)
//! 5. CLI arguments (highest priority)

mod credentials;
mod loader;
mod types;

pub use credentials::{ApiKeyPool, is_blank};
pub use loader::{ConfigLoader, env_flag};
pub use types::*;
