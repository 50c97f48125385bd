//! Service lifecycle hooks
//!
//! The host service manager only ever calls `start` and `stop`. All of the
//! provisioning logic stays in [`Runner`].

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::PrepError;
use crate::runner::{RunOutcome, Runner};

/// Lifecycle hooks invoked by the host service manager
pub trait Service {
    /// Begin work in the background and return immediately
    fn start(&mut self) -> Result<(), PrepError>;

    /// Called when the host asks the service to stop
    fn stop(&mut self) -> Result<(), PrepError>;
}

/// Runs one provisioning pass on a background task
pub struct ProvisioningService {
    runner: Option<Runner>,
    handle: Option<JoinHandle<Result<RunOutcome, PrepError>>>,
}

impl ProvisioningService {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner: Some(runner),
            handle: None,
        }
    }

    /// Whether `start` has been called
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the background run to finish
    pub async fn wait(&mut self) -> Result<RunOutcome, PrepError> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| PrepError::Service("service was not started".into()))?;

        handle
            .await
            .map_err(|e| PrepError::Service(format!("provisioning task failed: {e}")))?
    }
}

impl Service for ProvisioningService {
    fn start(&mut self) -> Result<(), PrepError> {
        let runtime = Handle::try_current()
            .map_err(|e| PrepError::Service(format!("no async runtime: {e}")))?;

        let runner = self
            .runner
            .take()
            .ok_or_else(|| PrepError::Service("service already started".into()))?;

        info!("Starting provisioning service");
        self.handle = Some(runtime.spawn(async move { runner.run().await }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PrepError> {
        // An in-flight batch is left to finish
        debug!("Stop requested");
        Ok(())
    }
}
