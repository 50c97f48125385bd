//! ec2prep - first-boot provisioning agent
//!
//! Runs the scripts under `<root>/Scripts` once per instance and records
//! completion under `<root>/Instance/<instance-id>`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, FmtSubscriber, fmt, prelude::*};

use ec2prep::config::{IdentitySource, PrepConfig, load_config};
use ec2prep::host::HostService;
use ec2prep::state::{CompletionMarker, PrepPaths};
use ec2prep::{LogSink, PrepError, ProvisioningService, Runner, Service, TracingSink, identity};

#[derive(Parser)]
#[command(name = "ec2prep")]
#[command(author, version, about = "Runs scripts on instance first boot", long_about = None)]
struct Cli {
    /// Install root (defaults to the executable's directory)
    #[arg(long, env = "EC2PREP_ROOT", global = true)]
    root: Option<PathBuf>,

    /// Use this instance id instead of querying the metadata service
    #[arg(long, global = true)]
    instance_id: Option<String>,

    /// Metadata service base URL
    #[arg(long, global = true)]
    imds_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision this instance if it has not been processed yet
    Run,
    /// Create the state directories and register the host service
    Install,
    /// Unregister the host service
    Uninstall,
    /// Report whether this instance has already been processed
    Status,
}

fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Log to stderr for interactive commands
fn init_console_logging(verbosity: u8) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level_for(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Append to the log file in the install root
///
/// The returned guard flushes the background writer when dropped.
fn init_file_logging(log_file: &Path, verbosity: u8) -> anyhow::Result<WorkerGuard> {
    let dir = log_file
        .parent()
        .context("log file has no parent directory")?;
    let name = log_file
        .file_name()
        .context("log file has no file name")?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_for(verbosity).as_str().to_ascii_lowercase()))
        .context("invalid log filter")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(false),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

fn apply_overrides(mut config: PrepConfig, cli: &Cli) -> PrepConfig {
    if let Some(id) = &cli.instance_id {
        config.identity.source = IdentitySource::Fixed;
        config.identity.instance_id = Some(id.clone());
    }
    if let Some(url) = &cli.imds_url {
        config.identity.imds_url = url.clone();
    }
    config
}

async fn run(cli: &Cli, paths: PrepPaths) -> anyhow::Result<ExitCode> {
    let _guard = init_file_logging(&paths.log_file(), cli.verbose)?;
    Ok(exit_code(provision(cli, paths, Arc::new(TracingSink)).await))
}

/// Load the config, run the service to completion and return the exit code
///
/// Every failure is written to `sink` before its exit code is returned.
async fn provision(cli: &Cli, paths: PrepPaths, sink: Arc<dyn LogSink>) -> i32 {
    let config_file = paths.config_file();
    let config = match load_config(&config_file).await {
        Ok(config) => apply_overrides(config, cli),
        Err(e) => {
            sink.write(
                Level::ERROR,
                &format!("Could not load configuration {}: {e}", config_file.display()),
            );
            return e.exit_code();
        }
    };

    let runner = match Runner::from_config(&config, paths, sink.clone()) {
        Ok(runner) => runner,
        Err(e) => {
            sink.write(Level::ERROR, &format!("Invalid configuration: {e}"));
            return e.exit_code();
        }
    };

    let mut service = ProvisioningService::new(runner);
    if let Err(e) = service.start() {
        sink.write(Level::ERROR, &format!("Could not start provisioning: {e}"));
        return e.exit_code();
    }
    let result = service.wait().await;
    if let Err(e) = service.stop() {
        sink.write(Level::WARN, &format!("Stopping the service failed: {e}"));
    }

    match result {
        Ok(outcome) => outcome.exit_code(),
        // Runner errors are logged by the runner itself
        Err(e @ PrepError::Service(_)) => {
            sink.write(Level::ERROR, &e.to_string());
            e.exit_code()
        }
        Err(e) => e.exit_code(),
    }
}

async fn status(cli: &Cli, paths: PrepPaths) -> anyhow::Result<ExitCode> {
    let config = apply_overrides(load_config(paths.config_file()).await?, cli);
    let resolver = identity::from_config(&config.identity)?;
    let id = resolver
        .resolve()
        .await
        .context("failed to resolve instance identity")?;

    let marker = CompletionMarker::new(&paths, &id);
    if marker.exists().await {
        println!("{id}: processed ({})", marker.path().display());
    } else {
        println!("{id}: not processed");
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let paths = match &cli.root {
        Some(root) => PrepPaths::with_root(root),
        None => PrepPaths::from_current_exe().context("cannot locate install root")?,
    };

    match cli.command {
        Some(Commands::Run) | None => run(&cli, paths).await,
        Some(Commands::Install) => {
            init_console_logging(cli.verbose);
            let exe = std::env::current_exe().context("cannot locate executable")?;
            HostService::new()
                .install(&paths, &exe)
                .await
                .context("install failed")?;
            info!("Install complete");
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Uninstall) => {
            init_console_logging(cli.verbose);
            HostService::new()
                .uninstall()
                .await
                .context("uninstall failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Status) => {
            init_console_logging(cli.verbose);
            status(&cli, paths).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec2prep::MemorySink;
    use ec2prep::state::initialize_directories;
    use tempfile::TempDir;

    fn cli(root: &Path, extra: &[&str]) -> Cli {
        let mut args = vec!["ec2prep", "--root", root.to_str().unwrap()];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    #[tokio::test]
    async fn test_unreadable_config_is_logged() {
        let temp = TempDir::new().unwrap();
        let paths = PrepPaths::with_root(temp.path());
        std::fs::create_dir(paths.config_file()).unwrap();
        let sink = MemorySink::new();

        let code = provision(&cli(temp.path(), &[]), paths, Arc::new(sink.clone())).await;

        assert_eq!(code, 1);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, Level::ERROR);
        assert!(entries[0].1.contains("Could not load configuration"));
        assert!(entries[0].1.contains("ec2prep.yaml"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_logged() {
        let temp = TempDir::new().unwrap();
        let paths = PrepPaths::with_root(temp.path());
        std::fs::write(paths.config_file(), "identity:\n  source: fixed\n").unwrap();
        let sink = MemorySink::new();

        let code = provision(&cli(temp.path(), &[]), paths, Arc::new(sink.clone())).await;

        assert_eq!(code, 1);
        assert!(sink.contains("Invalid configuration"));
    }

    #[tokio::test]
    async fn test_provision_with_fixed_identity() {
        let temp = TempDir::new().unwrap();
        let paths = PrepPaths::with_root(temp.path());
        initialize_directories(&paths).await.unwrap();
        let sink = MemorySink::new();

        let cli = cli(temp.path(), &["--instance-id", "i-cli", "run"]);
        let code = provision(&cli, paths, Arc::new(sink.clone())).await;

        assert_eq!(code, 0);
        assert!(temp.path().join("Instance/i-cli").is_dir());
        assert!(sink.contains("Completed EC2 prep"));
    }
}
