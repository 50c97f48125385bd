//! Instance identity resolution
//!
//! The instance identity is the idempotency key for provisioning: the
//! completion marker is keyed by it, so it must come from a stable source.

pub mod fixed;
pub mod imds;

use async_trait::async_trait;
use std::fmt;

use crate::PrepError;
use crate::config::{IdentityConfig, IdentitySource};

/// Opaque identifier of the current machine instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceIdentity(String);

impl InstanceIdentity {
    /// Wrap a raw identifier, rejecting empty or whitespace-only values
    pub fn new(id: impl Into<String>) -> Result<Self, PrepError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PrepError::identity("instance id is empty"));
        }
        // The id becomes a directory name under the Instance root
        if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
            return Err(PrepError::identity(format!(
                "instance id '{trimmed}' is not a valid path component"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InstanceIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the instance identity
///
/// Resolution happens once per run. Implementations must not retry: any
/// failure is reported as [`PrepError::IdentityUnavailable`] and aborts the
/// run before anything is written to disk.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Name of this resolver (e.g., "IMDS", "Fixed")
    fn name(&self) -> &'static str;

    /// Resolve the identity of the current instance
    async fn resolve(&self) -> Result<InstanceIdentity, PrepError>;
}

/// Build the resolver selected by configuration
pub fn from_config(config: &IdentityConfig) -> Result<Box<dyn IdentityResolver>, PrepError> {
    match config.source {
        IdentitySource::Imds => Ok(Box::new(imds::Imds::from_config(config)?)),
        IdentitySource::Fixed => {
            let id = config.instance_id.as_deref().ok_or_else(|| {
                PrepError::Config("identity.source is 'fixed' but no instance_id is set".into())
            })?;
            Ok(Box::new(fixed::FixedIdentity::new(id)))
        }
    }
}
