//! Config loader
//!
//! Loads `ec2prep.yaml` from the install root.

use super::PrepConfig;
use crate::PrepError;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Load the config file, falling back to defaults
///
/// A missing file yields the defaults. A file that fails to parse is logged
/// and ignored so that a typo cannot stop first-boot provisioning.
pub async fn load_config(path: impl AsRef<Path>) -> Result<PrepConfig, PrepError> {
    let path = path.as_ref();

    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(PrepConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    match PrepConfig::from_yaml(&content) {
        Ok(config) => {
            debug!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            Ok(PrepConfig::default())
        }
    }
}
