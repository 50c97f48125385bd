//! On-disk state for ec2prep
//!
//! Manages the install root layout:
//! - `Instance/<id>` completion markers
//! - `Scripts/` provisioning scripts
//! - the log and config files

pub mod marker;
pub mod paths;

pub use marker::CompletionMarker;
pub use paths::PrepPaths;

use crate::PrepError;
use tokio::fs;
use tracing::{debug, info};

/// Create the `Instance` and `Scripts` directories if they are missing
///
/// Runs at install time. Provisioning itself never creates these.
pub async fn initialize_directories(paths: &PrepPaths) -> Result<(), PrepError> {
    info!("Initializing directories under {}", paths.root.display());

    for dir in [paths.instance_dir(), paths.scripts_dir()] {
        if fs::try_exists(&dir).await? {
            debug!("{} already exists", dir.display());
            continue;
        }
        fs::create_dir(&dir).await?;
        debug!("Created {}", dir.display());
    }

    Ok(())
}
