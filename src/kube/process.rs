use crate::kube::error::KubeAgentError;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::*;

/// A program plus its ordered argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandLine {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout on a zero exit, otherwise the captured stderr as a
    /// [`KubeAgentError::Command`].
    pub fn into_stdout(self, program: &str) -> Result<String, KubeAgentError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(KubeAgentError::Command {
                program: program.to_string(),
                message: self.stderr,
            })
        }
    }
}

/// Which output streams a spawned child gets pipes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// stdout and stderr are both piped.
    All,
    /// stdout goes to the null device; only stderr is piped.
    StderrOnly,
}

impl Capture {
    fn stdout(self) -> Stdio {
        match self {
            Capture::All => Stdio::piped(),
            Capture::StderrOnly => Stdio::null(),
        }
    }
}

/// Runs external commands on behalf of the dispatcher.
///
/// A non-zero exit is not an error at this level: `run` only fails when the
/// process could not be started at all.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the command to completion and captures its output.
    async fn run(&self, command: &CommandLine) -> io::Result<ProcessOutput>;

    /// Starts the command in the background. stderr is always piped, stdout
    /// only when `capture` asks for it.
    ///
    /// The child is killed if its handle is dropped.
    fn spawn(&self, command: &CommandLine, capture: Capture) -> io::Result<Child>;
}

/// [`ProcessRunner`] backed by real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandLine) -> io::Result<ProcessOutput> {
        debug!("Running: {}", command);

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            "{} exited with {:?} ({} bytes stdout, {} bytes stderr)",
            command.program,
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }

    fn spawn(&self, command: &CommandLine, capture: Capture) -> io::Result<Child> {
        debug!("Spawning: {} ({:?})", command, capture);

        Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(capture.stdout())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_displays_as_shell_text() {
        let cmd = CommandLine::new(
            "kubectl",
            vec!["get".to_string(), "pods".to_string(), "-n".to_string(), "kube-system".to_string()],
        );
        assert_eq!(cmd.to_string(), "kubectl get pods -n kube-system");
    }

    #[test]
    fn non_zero_exit_becomes_command_error() {
        let output = ProcessOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "error: the server doesn't have a resource type \"podz\"".to_string(),
        };
        match output.into_stdout("kubectl") {
            Err(KubeAgentError::Command { program, message }) => {
                assert_eq!(program, "kubectl");
                assert!(message.contains("podz"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn killed_process_is_not_success() {
        let output = ProcessOutput {
            exit_code: None,
            ..Default::default()
        };
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_stdout_and_stderr() {
        let cmd = CommandLine::new(
            "sh",
            vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
        );
        let output = SystemRunner.run(&cmd).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_only_spawn_has_no_stdout_pipe() {
        let cmd = CommandLine::new("sh", vec!["-c".to_string(), "echo hidden".to_string()]);
        let mut child = SystemRunner.spawn(&cmd, Capture::StderrOnly).unwrap();
        assert!(child.stdout.is_none());
        assert!(child.stderr.is_some());
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn system_runner_reports_missing_binary_as_io_error() {
        let cmd = CommandLine::new("definitely-not-a-real-binary-4821", vec![]);
        assert!(SystemRunner.run(&cmd).await.is_err());
    }
}
