//! JSON configuration file loading.

use std::path::Path;

use cutline_pipeline::CuttingConfig;
use tracing::{debug, info};

use crate::IoError;

/// Load a [`CuttingConfig`] from a JSON file.
///
/// A file that does not exist yields the defaults. Fields missing from
/// the file keep their defaults.
///
/// # Errors
///
/// Returns [`IoError::Io`] if the file exists but cannot be read,
/// [`IoError::Json`] if it is not valid JSON for the schema, and
/// [`IoError::Pipeline`] if a value fails validation.
pub fn load_config(path: &Path) -> Result<CuttingConfig, IoError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(CuttingConfig::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: CuttingConfig = serde_json::from_str(&text)?;
    config.validate()?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}
