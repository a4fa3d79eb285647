//! Config Command

use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration.
pub fn show(format: &str) -> Result<()> {
    ConfigLoader::show_config(format == "json")
}

/// Show configuration file paths.
pub fn path() {
    ConfigLoader::show_path();
}

/// Write a default project configuration.
pub fn init(force: bool) -> Result<()> {
    let path = ConfigLoader::init_project(force)?;
    println!("Wrote {}", path.display());
    Ok(())
}
