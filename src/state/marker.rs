//! Completion marker handling
//!
//! The marker is a directory named after the instance identity. Its
//! existence is the only record that provisioning started for that instance.
//! It is created before the first script runs and never removed here.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::PrepPaths;
use crate::{InstanceIdentity, PrepError};

/// Completion marker for one instance identity
#[derive(Debug, Clone)]
pub struct CompletionMarker {
    path: PathBuf,
}

impl CompletionMarker {
    pub fn new(paths: &PrepPaths, identity: &InstanceIdentity) -> Self {
        Self {
            path: paths.marker(identity),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether provisioning already ran for this identity
    ///
    /// Any existing entry counts, including a plain file an operator left in
    /// place. Errors other than "not found" also count as present so that an
    /// unreadable marker never triggers a second run.
    pub async fn exists(&self) -> bool {
        let present = match fs::symlink_metadata(&self.path).await {
            Ok(_) => true,
            Err(e) => e.kind() != ErrorKind::NotFound,
        };
        debug!(
            "Marker check: {} -> {}",
            self.path.display(),
            if present { "present" } else { "absent" }
        );
        present
    }

    /// Create the marker directory
    ///
    /// The parent is not created: a missing `Instance` directory means the
    /// agent was never installed and is reported as a failure.
    pub async fn create(&self) -> Result<(), PrepError> {
        fs::create_dir(&self.path)
            .await
            .map_err(|source| PrepError::MarkerCreationFailed {
                path: self.path.clone(),
                source,
            })?;
        debug!("Created marker: {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PrepPaths, InstanceIdentity) {
        let temp = TempDir::new().unwrap();
        let paths = PrepPaths::with_root(temp.path());
        let id = InstanceIdentity::new("i-test").unwrap();
        (temp, paths, id)
    }

    #[tokio::test]
    async fn test_marker_create_and_exists() {
        let (_temp, paths, id) = setup();
        std::fs::create_dir(paths.instance_dir()).unwrap();

        let marker = CompletionMarker::new(&paths, &id);
        assert!(!marker.exists().await);

        marker.create().await.unwrap();
        assert!(marker.exists().await);
        assert!(paths.instance_dir().join("i-test").is_dir());
    }

    #[tokio::test]
    async fn test_marker_missing_parent_fails() {
        let (_temp, paths, id) = setup();

        let marker = CompletionMarker::new(&paths, &id);
        let err = marker.create().await.unwrap_err();

        assert!(matches!(err, PrepError::MarkerCreationFailed { .. }));
        assert!(!paths.instance_dir().exists());
    }

    #[tokio::test]
    async fn test_marker_create_twice_fails() {
        let (_temp, paths, id) = setup();
        std::fs::create_dir(paths.instance_dir()).unwrap();

        let marker = CompletionMarker::new(&paths, &id);
        marker.create().await.unwrap();
        assert!(marker.create().await.is_err());
    }

    #[tokio::test]
    async fn test_marker_file_counts_as_present() {
        let (_temp, paths, id) = setup();
        std::fs::create_dir(paths.instance_dir()).unwrap();
        std::fs::write(paths.marker(&id), "done").unwrap();

        assert!(CompletionMarker::new(&paths, &id).exists().await);
    }
}
