//! External command execution
//!
//! The manager never spawns processes itself. Everything goes through a
//! [`CommandRunner`], so tests can script the host and the CLI can plug in
//! [`SystemRunner`].

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Combined output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr
    pub combined: Vec<u8>,
}

impl CommandOutput {
    pub fn new(combined: impl Into<Vec<u8>>) -> Self {
        Self {
            combined: combined.into(),
        }
    }

    /// Output as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}

/// Capability to run an external program
///
/// Implementations must fold stdout and stderr into one byte sequence and
/// return [`Error::CommandFailed`] carrying that output whenever the program
/// exits non-zero.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// Render a program and its arguments as one shell-like line
pub fn display_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Runs commands on the host with `std::process`
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// Kill the command after this long (None = wait forever)
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a per-command timeout; zero disables it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    fn wait(
        &self,
        child: &mut std::process::Child,
        command: &str,
    ) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let start = Instant::now();
        loop {
            match child.try_wait()? {
                Some(status) => return Ok(status),
                None => {
                    if start.elapsed() > timeout {
                        let _ = child.kill();
                        // Reap after kill
                        let _ = child.wait();
                        return Err(Error::CommandTimeout {
                            command: command.to_string(),
                            secs: timeout.as_secs(),
                        });
                    }
                    thread::sleep(Duration::from_millis(20));
                }
            }
        }
    }
}

/// Drain a pipe on its own thread so a chatty child never blocks on a full buffer
fn drain<T: Read + Send + 'static>(pipe: Option<T>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let command = display_command(program, args);
        debug!(command = %command, "running");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::CommandFailed {
                command: command.clone(),
                message: format!("failed to spawn: {}", e),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, &command)?;

        let mut combined = stdout.join().unwrap_or_default();
        combined.extend(stderr.join().unwrap_or_default());
        let output = CommandOutput { combined };

        if !status.success() {
            return Err(Error::CommandFailed {
                command,
                message: format!("{} (output: {})", status, output.text().trim()),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Test double that answers commands from a table

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum Reply {
        Output(String),
        Fail(String),
    }

    /// Scripted runner that records every invocation
    ///
    /// Unscripted commands succeed with empty output unless `strict` is set.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedRunner {
        replies: Mutex<HashMap<String, Reply>>,
        calls: Mutex<Vec<String>>,
        strict: bool,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Reject any command that has no scripted reply
        pub(crate) fn strict() -> Self {
            Self {
                strict: true,
                ..Self::default()
            }
        }

        pub(crate) fn reply(self, command: &str, output: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(command.to_string(), Reply::Output(output.to_string()));
            self
        }

        pub(crate) fn fail(self, command: &str, message: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(command.to_string(), Reply::Fail(message.to_string()));
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            let command = display_command(program, args);
            self.calls.lock().unwrap().push(command.clone());

            match self.replies.lock().unwrap().get(&command) {
                Some(Reply::Output(out)) => Ok(CommandOutput::new(out.as_bytes())),
                Some(Reply::Fail(message)) => Err(Error::CommandFailed {
                    command,
                    message: message.clone(),
                }),
                None if self.strict => Err(Error::CommandFailed {
                    command,
                    message: "unscripted command".to_string(),
                }),
                None => Ok(CommandOutput::default()),
            }
        }
    }
}
