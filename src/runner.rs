//! Provisioning runner
//!
//! Drives one provisioning run:
//!
//! ```text
//! Init -> CheckMarker -> AlreadyDone
//!                     -> CreateMarker -> Discover -> Execute(0..n) -> Done
//! ```
//!
//! The completion marker is created before the first script runs, so a run
//! that dies half way is never repeated for the same instance. Any script
//! that fails to launch or exits non-zero aborts the rest of the batch.

use std::fmt;
use std::sync::Arc;
use tracing::Level;

use crate::config::{DiscoveryFailurePolicy, PrepConfig};
use crate::identity::{self, IdentityResolver, InstanceIdentity};
use crate::logging::LogSink;
use crate::scripts::{self, Interpreter};
use crate::state::{CompletionMarker, PrepPaths};
use crate::PrepError;

/// Runner states, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    CheckMarker,
    AlreadyDone,
    CreateMarker,
    Discover,
    Execute(usize),
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::CheckMarker => write!(f, "check-marker"),
            RunState::AlreadyDone => write!(f, "already-done"),
            RunState::CreateMarker => write!(f, "create-marker"),
            RunState::Discover => write!(f, "discover"),
            RunState::Execute(i) => write!(f, "execute({i})"),
            RunState::Done => write!(f, "done"),
        }
    }
}

/// Successful end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The marker already existed; nothing was done
    AlreadyProcessed { identity: InstanceIdentity },
    /// Every discovered script ran and exited zero
    Completed {
        identity: InstanceIdentity,
        scripts_run: usize,
    },
}

impl RunOutcome {
    pub fn identity(&self) -> &InstanceIdentity {
        match self {
            RunOutcome::AlreadyProcessed { identity } => identity,
            RunOutcome::Completed { identity, .. } => identity,
        }
    }

    /// Process exit code reported for this outcome
    pub fn exit_code(&self) -> i32 {
        0
    }
}

/// Runs the provisioning protocol once
pub struct Runner {
    resolver: Box<dyn IdentityResolver>,
    paths: PrepPaths,
    interpreter: Interpreter,
    discovery_policy: DiscoveryFailurePolicy,
    sink: Arc<dyn LogSink>,
}

impl Runner {
    /// Create a runner with the platform default interpreter
    pub fn new(
        resolver: Box<dyn IdentityResolver>,
        paths: PrepPaths,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            resolver,
            paths,
            interpreter: Interpreter::default(),
            discovery_policy: DiscoveryFailurePolicy::default(),
            sink,
        }
    }

    /// Create a runner from the loaded configuration
    pub fn from_config(
        config: &PrepConfig,
        paths: PrepPaths,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, PrepError> {
        let resolver = identity::from_config(&config.identity)?;
        Ok(Self::new(resolver, paths, sink)
            .with_interpreter(Interpreter::new(config.scripts.interpreter.clone()))
            .with_discovery_policy(config.scripts.on_discovery_failure))
    }

    pub fn with_interpreter(mut self, interpreter: Interpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_discovery_policy(mut self, policy: DiscoveryFailurePolicy) -> Self {
        self.discovery_policy = policy;
        self
    }

    fn log(&self, level: Level, message: impl AsRef<str>) {
        self.sink.write(level, message.as_ref());
    }

    fn enter(&self, state: RunState) {
        self.log(Level::DEBUG, format!("Runner state: {state}"));
    }

    /// Log a fatal error with its context and hand it back
    fn fatal(&self, identity: Option<&InstanceIdentity>, err: PrepError) -> PrepError {
        let identity = identity.map_or("<unresolved>", InstanceIdentity::as_str);
        self.log(
            Level::ERROR,
            format!("Provisioning aborted for instance {identity}: {err}"),
        );
        err
    }

    /// Execute one provisioning run
    ///
    /// Every returned error is fatal to the run and has already been logged.
    pub async fn run(&self) -> Result<RunOutcome, PrepError> {
        self.enter(RunState::Init);
        self.log(Level::INFO, "Starting EC2 prep...");

        let identity = self.resolver.resolve().await.map_err(|e| {
            self.log(
                Level::ERROR,
                format!("Could not resolve instance identity via {}", self.resolver.name()),
            );
            self.fatal(None, e)
        })?;
        self.log(
            Level::INFO,
            format!("Resolved instance identity {identity} via {}", self.resolver.name()),
        );

        self.enter(RunState::CheckMarker);
        self.log(Level::INFO, "Checking if instance has already been processed.");
        let marker = CompletionMarker::new(&self.paths, &identity);
        if marker.exists().await {
            self.enter(RunState::AlreadyDone);
            self.log(
                Level::INFO,
                format!("Instance {identity} has already been processed, exiting..."),
            );
            return Ok(RunOutcome::AlreadyProcessed { identity });
        }

        self.enter(RunState::CreateMarker);
        marker
            .create()
            .await
            .map_err(|e| self.fatal(Some(&identity), e))?;
        self.log(
            Level::INFO,
            format!("Created completion marker {}", marker.path().display()),
        );

        self.enter(RunState::Discover);
        let scripts_dir = self.paths.scripts_dir();
        self.log(
            Level::INFO,
            format!("Reading files from {}", scripts_dir.display()),
        );
        let scripts = match scripts::discover(&scripts_dir).await {
            Ok(scripts) => scripts,
            Err(source) => match self.discovery_policy {
                DiscoveryFailurePolicy::Ignore => {
                    self.log(
                        Level::WARN,
                        format!(
                            "Could not read scripts directory {} for instance {identity}: {source}; running no scripts",
                            scripts_dir.display()
                        ),
                    );
                    Vec::new()
                }
                DiscoveryFailurePolicy::Fatal => {
                    let err = PrepError::DiscoveryFailed {
                        path: scripts_dir.clone(),
                        source,
                    };
                    return Err(self.fatal(Some(&identity), err));
                }
            },
        };
        self.log(Level::INFO, format!("Found {} scripts", scripts.len()));

        for (i, script) in scripts.iter().enumerate() {
            self.enter(RunState::Execute(i));
            self.log(
                Level::INFO,
                format!("Running script {}", script.path.display()),
            );

            let result = self
                .interpreter
                .run(script)
                .await
                .map_err(|e| self.fatal(Some(&identity), e))?;

            if !result.stdout.is_empty() {
                self.log(Level::INFO, result.stdout.trim_end());
            }

            if !result.stderr.is_empty() {
                self.log(
                    Level::WARN,
                    format!("Error while running script {}", script.path.display()),
                );
                self.log(Level::WARN, result.stderr.trim_end());
            }

            if !result.success() {
                let err = PrepError::exited(
                    &script.path,
                    result.status.code(),
                    result.stderr.trim_end(),
                );
                return Err(self.fatal(Some(&identity), err));
            }
        }

        self.enter(RunState::Done);
        self.log(Level::INFO, "Completed EC2 prep.");
        Ok(RunOutcome::Completed {
            identity,
            scripts_run: scripts.len(),
        })
    }
}
