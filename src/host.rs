//! Host service registration
//!
//! Installs ec2prep as a systemd unit so that it runs on every boot.
//! The runner itself decides whether there is anything to do.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::PrepError;
use crate::state::{self, PrepPaths};

/// Service name registered with the host
pub const SERVICE_NAME: &str = "ec2prep";

/// Human readable service name
pub const DISPLAY_NAME: &str = "EC2 Prep";

/// Service description
pub const DESCRIPTION: &str = "Runs scripts on instance first boot";

/// systemd unit directory for locally installed units
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

/// Service registration with the host's service manager
#[derive(Debug, Clone)]
pub struct HostService {
    unit_dir: PathBuf,
    manage_systemctl: bool,
}

impl Default for HostService {
    fn default() -> Self {
        Self::new()
    }
}

impl HostService {
    pub fn new() -> Self {
        Self {
            unit_dir: PathBuf::from(SYSTEMD_UNIT_DIR),
            manage_systemctl: true,
        }
    }

    /// Write units to `dir` without calling systemctl (useful for testing)
    pub fn with_unit_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            unit_dir: dir.as_ref().to_path_buf(),
            manage_systemctl: false,
        }
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{SERVICE_NAME}.service"))
    }

    /// Render the unit file for the given executable and install root
    pub fn render_unit(exe: &Path, root: &Path) -> String {
        format!(
            "[Unit]\n\
             Description={DISPLAY_NAME}: {DESCRIPTION}\n\
             Wants=network-online.target\n\
             After=network-online.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart=\"{}\" --root \"{}\" run\n\
             Restart=no\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            exe.display(),
            root.display()
        )
    }

    /// Create the state directories and register the service
    pub async fn install(&self, paths: &PrepPaths, exe: &Path) -> Result<(), PrepError> {
        state::initialize_directories(paths).await?;

        let unit_path = self.unit_path();
        fs::write(&unit_path, Self::render_unit(exe, &paths.root)).await?;
        info!("Wrote unit file {}", unit_path.display());

        if self.manage_systemctl {
            systemctl(&["daemon-reload"]).await?;
            systemctl(&["enable", SERVICE_NAME]).await?;
        }

        info!("Installed service {}", SERVICE_NAME);
        Ok(())
    }

    /// Unregister the service; state directories are left alone
    pub async fn uninstall(&self) -> Result<(), PrepError> {
        if self.manage_systemctl {
            systemctl(&["disable", SERVICE_NAME]).await?;
        }

        let unit_path = self.unit_path();
        if fs::try_exists(&unit_path).await? {
            fs::remove_file(&unit_path).await?;
            debug!("Removed unit file {}", unit_path.display());
        }

        if self.manage_systemctl {
            systemctl(&["daemon-reload"]).await?;
        }

        info!("Uninstalled service {}", SERVICE_NAME);
        Ok(())
    }
}

async fn systemctl(args: &[&str]) -> Result<(), PrepError> {
    debug!("Running systemctl {:?}", args);
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .await
        .map_err(|e| PrepError::Service(format!("failed to run systemctl: {e}")))?;

    if !output.status.success() {
        return Err(PrepError::Service(format!(
            "systemctl {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_unit() {
        let unit = HostService::render_unit(
            Path::new("/opt/ec2prep/ec2prep"),
            Path::new("/opt/ec2prep"),
        );
        assert!(unit.contains("ExecStart=\"/opt/ec2prep/ec2prep\" --root \"/opt/ec2prep\" run"));
        assert!(unit.contains("After=network-online.target"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[tokio::test]
    async fn test_install_and_uninstall() {
        let root = TempDir::new().unwrap();
        let units = TempDir::new().unwrap();
        let host = HostService::with_unit_dir(units.path());
        let paths = PrepPaths::with_root(root.path());

        host.install(&paths, &root.path().join("ec2prep"))
            .await
            .unwrap();

        assert!(root.path().join("Instance").is_dir());
        assert!(root.path().join("Scripts").is_dir());
        assert!(units.path().join("ec2prep.service").exists());

        host.uninstall().await.unwrap();

        assert!(!units.path().join("ec2prep.service").exists());
        assert!(root.path().join("Instance").is_dir());
    }
}
