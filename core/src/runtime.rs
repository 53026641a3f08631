use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// The bridge could not start or talk to the child process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// How an isolated run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    /// The text worth showing when the run failed: stderr, or stdout when
    /// stderr is empty. Returned verbatim.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Runs one pipeline job in its own process.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Starts the job, writes each line (newline-terminated, in order) to its
    /// stdin, then waits for it to exit.
    async fn launch(&self, stdin_lines: &[&str]) -> Result<ProcessOutcome, LaunchError>;
}

/// Spawns a fresh child process per run.
///
/// Every run gets its own memory; nothing is shared between runs.
#[derive(Debug, Clone)]
pub struct ChildProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl ChildProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl Launcher for ChildProcessLauncher {
    async fn launch(&self, stdin_lines: &[&str]) -> Result<ProcessOutcome, LaunchError> {
        let program = self.program.display().to_string();

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;
        info!(program = %program, pid = child.id(), "child process started");

        let input: String = stdin_lines.iter().map(|l| format!("{l}\n")).collect();
        // Written on its own task so a child that fills its stdout pipe before
        // reading stdin cannot deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let result = stdin.write_all(input.as_bytes()).await;
                drop(stdin);
                result
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| LaunchError::Wait {
                program: program.clone(),
                source,
            })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The child may exit without reading its input; its exit
                // status already says what happened.
                Ok(Err(e)) => debug!(error = %e, "child closed stdin early"),
                Err(e) => warn!(error = %e, "stdin writer task failed"),
            }
        }

        let outcome = ProcessOutcome {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        info!(
            program = %program,
            success = outcome.success,
            exit_code = ?outcome.exit_code,
            stdout_len = outcome.stdout.len(),
            stderr_len = outcome.stderr.len(),
            "child process exited"
        );
        Ok(outcome)
    }
}
