//! ec2prep library
//!
//! First-boot provisioning for cloud instances: run the scripts in the
//! install root's `Scripts` directory exactly once per instance identity.
//!
//! # Design Principles
//!
//! - **At most once**: the completion marker is written before any script
//!   runs, so a crash mid-batch is never retried automatically
//! - **Fail fast**: the first failing script stops the batch
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)

pub mod config;
pub mod host;
pub mod identity;
pub mod logging;
pub mod runner;
pub mod scripts;
pub mod service;
pub mod state;

mod error;

pub use error::PrepError;
pub use identity::{IdentityResolver, InstanceIdentity};
pub use logging::{LogSink, MemorySink, TracingSink};
pub use runner::{RunOutcome, RunState, Runner};
pub use service::{ProvisioningService, Service};
