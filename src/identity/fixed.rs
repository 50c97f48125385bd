//! Fixed identity for testing and off-cloud runs

use async_trait::async_trait;

use super::{IdentityResolver, InstanceIdentity};
use crate::PrepError;

/// Resolver that always returns the same literal identity
///
/// # Example
/// ```
/// use ec2prep::identity::fixed::FixedIdentity;
///
/// let resolver = FixedIdentity::new("i-local-test");
/// ```
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    id: String,
}

impl FixedIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl IdentityResolver for FixedIdentity {
    fn name(&self) -> &'static str {
        "Fixed"
    }

    async fn resolve(&self) -> Result<InstanceIdentity, PrepError> {
        InstanceIdentity::new(self.id.as_str())
    }
}
