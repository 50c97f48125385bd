//! Script execution
//!
//! Runs one script through the configured interpreter and captures its
//! output. The call waits for the child to exit; there is no timeout.

use std::process::ExitStatus;
use tokio::process::Command;
use tracing::debug;

use super::ScriptEntry;
use crate::PrepError;
use crate::config::default_interpreter;

/// Captured result of one script run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Command prefix used to launch scripts
///
/// The script path is appended as the last argument. An empty prefix runs
/// the script file directly.
#[derive(Debug, Clone)]
pub struct Interpreter {
    argv: Vec<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(default_interpreter())
    }
}

impl Interpreter {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    fn command(&self, script: &ScriptEntry) -> Command {
        match self.argv.split_first() {
            Some((program, args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args).arg(&script.path);
                cmd
            }
            None => Command::new(&script.path),
        }
    }

    /// Run a script and wait for it to exit
    ///
    /// Only a failure to launch is an error here; the exit status is left
    /// for the caller to judge.
    pub async fn run(&self, script: &ScriptEntry) -> Result<ExecutionResult, PrepError> {
        debug!("Launching {} via {:?}", script.path.display(), self.argv);

        let output = self
            .command(script)
            .output()
            .await
            .map_err(|source| PrepError::ScriptLaunchFailed {
                path: script.path.clone(),
                source,
            })?;

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn script(temp: &TempDir, name: &str, body: &str) -> ScriptEntry {
        let path = temp.path().join(name);
        std::fs::write(&path, body).unwrap();
        ScriptEntry {
            path,
            name: name.to_string(),
        }
    }

    fn sh() -> Interpreter {
        Interpreter::new(vec!["/bin/sh".to_string()])
    }

    #[tokio::test]
    async fn test_run_captures_output() {
        let temp = TempDir::new().unwrap();
        let entry = script(&temp, "a.sh", "echo out\necho err >&2\n");

        let result = sh().run(&entry).await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        let entry = script(&temp, "fail.sh", "exit 7\n");

        let result = sh().run(&entry).await.unwrap();

        assert!(!result.success());
        assert_eq!(result.status.code(), Some(7));
    }

    #[tokio::test]
    async fn test_run_interpreter_args_precede_script() {
        let temp = TempDir::new().unwrap();
        let entry = script(&temp, "unset.sh", "echo \"$UNDEFINED_VAR_FOR_TEST\"\n");

        let interpreter = Interpreter::new(vec!["/bin/sh".to_string(), "-u".to_string()]);
        let result = interpreter.run(&entry).await.unwrap();

        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let temp = TempDir::new().unwrap();
        let entry = script(&temp, "a.sh", "echo hi\n");

        let interpreter = Interpreter::new(vec!["/nonexistent/interpreter".to_string()]);
        let err = interpreter.run(&entry).await.unwrap_err();

        assert!(matches!(err, PrepError::ScriptLaunchFailed { .. }));
    }
}
