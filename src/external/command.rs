//! Base command execution abstraction
//!
//! Provides the foundational trait for executing external commands, enabling
//! dependency injection for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

/// Per-invocation execution options: working directory and wall-clock bound.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ExecOptions {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(dir.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cwd: None,
            timeout: Some(timeout),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
///
/// This abstraction allows the rest of the codebase to execute commands
/// without directly depending on tokio::process::Command, enabling testing
/// with mock implementations.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        opts: &ExecOptions,
    ) -> Result<CommandOutput, CommandError>;
}

/// Real implementation using tokio::process::Command
///
/// A timeout in [`ExecOptions`] bounds the subprocess with a wall clock;
/// on expiry the child is killed and the call fails with
/// [`CommandError::Timeout`].
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        opts: &ExecOptions,
    ) -> Result<CommandOutput, CommandError> {
        let mut command = tokio::process::Command::new(program);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = &opts.cwd {
            command.current_dir(dir);
        }

        let pending = command.output();
        let output = match opts.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                CommandError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => pending.await,
        };

        let output = output.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::CommandNotFound {
                    command: program.to_string(),
                }
            } else {
                CommandError::Io {
                    message: e.to_string(),
                }
            }
        })?;

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Scripted executor for unit tests: canned responses keyed by command
/// line, unscripted commands succeed with empty output, and every
/// invocation is recorded so tests can assert on call order.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub struct ScriptedExecutor {
        responses: Mutex<HashMap<String, VecDeque<Result<CommandOutput, CommandError>>>>,
        prefix_responses: Mutex<Vec<(String, Result<CommandOutput, CommandError>)>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                prefix_responses: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Match on a command-line prefix; used when part of the command is
        /// generated at runtime (unique branch names).
        pub fn on_prefix(
            self,
            prefix: &str,
            response: Result<CommandOutput, CommandError>,
        ) -> Self {
            self.prefix_responses
                .lock()
                .unwrap()
                .push((prefix.to_string(), response));
            self
        }

        pub fn on(self, command_line: &str, response: Result<CommandOutput, CommandError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(command_line.to_string())
                .or_default()
                .push_back(response);
            self
        }

        pub fn on_stdout(self, command_line: &str, stdout: &str) -> Self {
            self.on(
                command_line,
                Ok(CommandOutput {
                    status_code: 0,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            )
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            program: &str,
            args: &[&str],
            _opts: &ExecOptions,
        ) -> Result<CommandOutput, CommandError> {
            let key = format!("{} {}", program, args.join(" "));
            self.calls.lock().unwrap().push(key.clone());

            if let Some(queue) = self.responses.lock().unwrap().get_mut(&key) {
                if let Some(response) = queue.pop_front() {
                    return response;
                }
            }

            for (prefix, response) in self.prefix_responses.lock().unwrap().iter() {
                if key.starts_with(prefix.as_str()) {
                    return response.clone();
                }
            }

            Ok(CommandOutput {
                status_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }
}
