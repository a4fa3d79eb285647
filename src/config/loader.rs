//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/docloom/config.toml)
//! 3. Project config (.docloom/config.toml)
//! 4. Environment variables (DOCLOOM_* prefix)

use std::env;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::debug;

use super::types::Config;
use crate::types::{DocloomError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the full resolution chain:
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

        // e.g. DOCLOOM_LIMITS_TPM -> limits.tpm
        figment = figment.merge(Env::prefixed("DOCLOOM_").split("_").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| DocloomError::Config(format!("Configuration error: {e}")))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only (merged over defaults).
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| DocloomError::Config(format!("Configuration error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Path to the global config directory (~/.config/docloom/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("docloom"))
    }

    /// Path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".docloom/config.toml")
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

    /// Show the current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config)
                    .map_err(|e| DocloomError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    /// Write a default project configuration file.
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let path = Self::project_config_path();
        if path.exists() && !force {
            return Err(DocloomError::Config(format!(
                "'{}' already exists; use --force to overwrite",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(&Config::default())
            .map_err(|e| DocloomError::Config(e.to_string()))?;
        std::fs::write(&path, rendered)?;
        Ok(path)
    }
}
