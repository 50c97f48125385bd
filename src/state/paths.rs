//! Install root layout
//!
//! Everything ec2prep reads or writes lives under one install root, by
//! default the directory holding the executable.

use std::path::{Path, PathBuf};

use crate::InstanceIdentity;

/// Directory holding one completion marker per instance
pub const INSTANCE_DIR: &str = "Instance";

/// Directory holding the provisioning scripts
pub const SCRIPTS_DIR: &str = "Scripts";

/// Log file name
pub const LOG_FILE: &str = "ec2prep.log";

/// Config file name
pub const CONFIG_FILE: &str = "ec2prep.yaml";

/// Paths derived from the install root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepPaths {
    /// Install root
    pub root: PathBuf,
}

impl PrepPaths {
    /// Create with a custom install root (useful for testing)
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root at the directory containing the running executable
    pub fn from_current_exe() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let root = exe.parent().map(Path::to_path_buf).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has no parent directory", exe.display()),
            )
        })?;
        Ok(Self { root })
    }

    /// R/Instance - Completion marker root
    pub fn instance_dir(&self) -> PathBuf {
        self.root.join(INSTANCE_DIR)
    }

    /// R/Instance/<id> - Completion marker for one instance
    pub fn marker(&self, identity: &InstanceIdentity) -> PathBuf {
        self.instance_dir().join(identity.as_str())
    }

    /// R/Scripts - Provisioning scripts
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(SCRIPTS_DIR)
    }

    /// R/ec2prep.log - Log sink
    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// R/ec2prep.yaml - Optional config file
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = PrepPaths::with_root("/opt/ec2prep");
        assert_eq!(paths.instance_dir(), PathBuf::from("/opt/ec2prep/Instance"));
        assert_eq!(paths.scripts_dir(), PathBuf::from("/opt/ec2prep/Scripts"));
        assert_eq!(paths.log_file(), PathBuf::from("/opt/ec2prep/ec2prep.log"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/opt/ec2prep/ec2prep.yaml")
        );
    }

    #[test]
    fn test_marker_path() {
        let paths = PrepPaths::with_root("/opt/ec2prep");
        let id = InstanceIdentity::new("i-1234567890abcdef0").unwrap();
        assert_eq!(
            paths.marker(&id),
            PathBuf::from("/opt/ec2prep/Instance/i-1234567890abcdef0")
        );
    }

    #[test]
    fn test_from_current_exe() {
        let paths = PrepPaths::from_current_exe().unwrap();
        assert!(paths.root.is_dir());
    }
}
