use crate::kube::dispatcher::CommandDispatcher;
use crate::kube::envelope::{fields, CommandResult, Fields};
use crate::kube::error::KubeAgentError;
use crate::kube::process::Capture;
use crate::kube::reader::DEFAULT_NAMESPACE;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::time::Instant;
use tracing::*;

pub const DEFAULT_MAX_FOLLOW_SECONDS: u64 = 60;

/// How long to wait for stderr to drain once the follower is done.
const STDERR_DRAIN: Duration = Duration::from_secs(1);

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_max_follow_seconds() -> u64 {
    DEFAULT_MAX_FOLLOW_SECONDS
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LogsRequest {
    /// Pod name, or `type/name` for deployments and jobs.
    pub resource_name: String,
    pub container: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Read logs of the previous container instance.
    #[serde(default)]
    pub previous: bool,
    /// Relative duration such as 5s, 2m or 3h.
    pub since: Option<String>,
    /// Number of lines from the end of the logs.
    pub tail: Option<u32>,
    /// Stream logs until the process exits or max_follow_seconds elapses.
    #[serde(default)]
    pub follow: bool,
    #[serde(default = "default_max_follow_seconds")]
    pub max_follow_seconds: u64,
}

impl LogsRequest {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "logs".to_string(),
            self.resource_name.clone(),
            "-n".to_string(),
            self.namespace.clone(),
        ];
        if let Some(container) = self.container.as_ref().filter(|c| !c.is_empty()) {
            args.push("-c".to_string());
            args.push(container.clone());
        }
        if self.previous {
            args.push("-p".to_string());
        }
        if let Some(since) = self.since.as_ref().filter(|s| !s.is_empty()) {
            args.push("--since".to_string());
            args.push(since.clone());
        }
        if let Some(tail) = self.tail.filter(|t| *t > 0) {
            args.push("--tail".to_string());
            args.push(tail.to_string());
        }
        if self.follow {
            args.push("-f".to_string());
        }
        args
    }

    fn context(&self) -> Fields {
        fields(json!({
            "resource_name": self.resource_name,
            "namespace": self.namespace,
        }))
    }
}

/// What a bounded follow collected.
struct Followed {
    logs: String,
    stderr: String,
    truncated: bool,
}

impl CommandDispatcher {
    pub async fn logs(&self, req: &LogsRequest) -> CommandResult {
        let context = req.context();

        if !req.follow {
            return match self.execute(req.args()).await {
                Ok(logs) => CommandResult::success(context, "container", req.container.clone())
                    .with("logs", logs),
                Err(e) => CommandResult::from_outcome(context, "logs", Err(e)),
            };
        }

        match self.follow(req.args(), req.max_follow_seconds).await {
            Ok(followed) if !followed.stderr.is_empty() => {
                CommandResult::error(context, followed.stderr)
            }
            Ok(followed) => CommandResult::success(context, "container", req.container.clone())
                .with("logs", followed.logs)
                .with("truncated", followed.truncated),
            Err(e) => {
                warn!("Log follow failed: {}", e);
                CommandResult::error(context, e.to_string())
            }
        }
    }

    /// Streams stdout line by line until the process exits or the deadline
    /// passes, in which case the process is killed. Reading and the final
    /// wait share the one deadline.
    async fn follow(&self, args: Vec<String>, max_seconds: u64) -> Result<Followed, KubeAgentError> {
        let deadline = Instant::now()
            .checked_add(Duration::from_secs(max_seconds))
            .ok_or_else(|| {
                KubeAgentError::contract(format!("max_follow_seconds is out of range: {}", max_seconds))
            })?;

        let command = self.command(args);
        info!("Following: {} (max {}s)", command, max_seconds);

        let mut child = self.runner().spawn(&command, Capture::All)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout was not captured"))?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut buffer).await {
                    debug!("Stopped reading stderr: {}", e);
                }
            }
            buffer
        });

        let mut reader = BufReader::new(stdout);
        let mut logs = Vec::new();
        let streamed = tokio::time::timeout_at(deadline, async {
            loop {
                match reader.read_until(b'\n', &mut logs).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Error reading log stream: {}", e);
                        break;
                    }
                }
            }
            child.wait().await
        })
        .await;

        let truncated = match streamed {
            Ok(status) => {
                let status = status?;
                debug!("Log follower exited with {:?}", status.code());
                false
            }
            Err(_) => {
                debug!("Follow deadline reached, killing {}", command.program);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill log follower: {}", e);
                }
                true
            }
        };

        let stderr = match tokio::time::timeout(STDERR_DRAIN, stderr_task).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => String::new(),
        };

        Ok(Followed {
            logs: String::from_utf8_lossy(&logs).into_owned(),
            stderr,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::process::testing::FakeRunner;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn request(value: serde_json::Value) -> LogsRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let req = request(json!({ "resource_name": "web-0" }));
        assert_eq!(req.namespace, "default");
        assert_eq!(req.max_follow_seconds, 60);
        assert!(!req.follow);
        assert_eq!(req.args(), vec!["logs", "web-0", "-n", "default"]);
    }

    #[test]
    fn every_option_lands_in_argv_order() {
        let req = request(json!({
            "resource_name": "deployment/web",
            "container": "app",
            "namespace": "prod",
            "previous": true,
            "since": "5m",
            "tail": 20,
            "follow": true,
        }));
        assert_eq!(
            req.args(),
            vec!["logs", "deployment/web", "-n", "prod", "-c", "app", "-p", "--since", "5m", "--tail", "20", "-f"]
        );
    }

    #[tokio::test]
    async fn plain_logs_success_carries_container() {
        let runner = Arc::new(FakeRunner::succeeding("started\nready\n"));
        let dispatcher = CommandDispatcher::new(runner.clone(), "kubectl");

        let result = dispatcher
            .logs(&request(json!({ "resource_name": "web-0", "container": "app" })))
            .await;
        assert_eq!(
            result.to_value(),
            json!({
                "status": "success",
                "resource_name": "web-0",
                "namespace": "default",
                "container": "app",
                "logs": "started\nready\n",
            })
        );
    }

    #[tokio::test]
    async fn plain_logs_failure_uses_stderr() {
        let runner = Arc::new(FakeRunner::failing("pods \"web-0\" not found"));
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let result = dispatcher.logs(&request(json!({ "resource_name": "web-0" }))).await;
        assert_eq!(
            result.to_value(),
            json!({
                "status": "error",
                "resource_name": "web-0",
                "namespace": "default",
                "message": "pods \"web-0\" not found",
            })
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn follow_collects_lines_until_exit() {
        let runner = Arc::new(FakeRunner::succeeding("").with_script("echo one; echo two"));
        let dispatcher = CommandDispatcher::new(runner.clone(), "kubectl");

        let result = dispatcher
            .logs(&request(json!({ "resource_name": "web-0", "follow": true })))
            .await;
        let value = result.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["logs"], "one\ntwo\n");
        assert_eq!(value["truncated"], false);
        assert_eq!(runner.last_args().last().map(String::as_str), Some("-f"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn follow_is_cut_off_at_the_deadline() {
        let runner = Arc::new(
            FakeRunner::succeeding("").with_script("while true; do echo tick; sleep 0.1; done"),
        );
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let started = std::time::Instant::now();
        let result = dispatcher
            .logs(&request(json!({
                "resource_name": "web-0",
                "follow": true,
                "max_follow_seconds": 1,
            })))
            .await;
        let elapsed = started.elapsed();

        let value = result.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["truncated"], true);
        assert!(value["logs"].as_str().unwrap().starts_with("tick\n"));
        assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn follow_with_stderr_is_an_error() {
        let runner = Arc::new(FakeRunner::succeeding("").with_script("echo partial; echo 'container not found' >&2; exit 1"));
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let result = dispatcher
            .logs(&request(json!({ "resource_name": "web-0", "follow": true })))
            .await;
        assert_eq!(result.message(), Some("container not found\n"));
        assert!(!result.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn follow_keeps_the_last_line_as_received() {
        let runner = Arc::new(FakeRunner::succeeding("").with_script("printf 'one\\ntwo'"));
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let result = dispatcher
            .logs(&request(json!({ "resource_name": "web-0", "follow": true })))
            .await;
        assert_eq!(result.to_value()["logs"], "one\ntwo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_does_not_escape_the_deadline() {
        let runner = Arc::new(FakeRunner::succeeding("").with_script(
            "printf 'ok\\n\\377\\376\\n'; while true; do echo tick; sleep 0.1; done",
        ));
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let followed = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.logs(&request(json!({
                "resource_name": "web-0",
                "follow": true,
                "max_follow_seconds": 1,
            }))),
        )
        .await
        .expect("follow ignored max_follow_seconds");

        let value = followed.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["truncated"], true);
        let logs = value["logs"].as_str().unwrap();
        assert!(logs.starts_with("ok\n\u{FFFD}\u{FFFD}\ntick\n"), "{:?}", logs);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn closed_stdout_still_honours_the_deadline() {
        let runner = Arc::new(
            FakeRunner::succeeding("").with_script("echo first; exec 1>&-; exec sleep 30"),
        );
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let started = std::time::Instant::now();
        let result = dispatcher
            .logs(&request(json!({
                "resource_name": "web-0",
                "follow": true,
                "max_follow_seconds": 1,
            })))
            .await;

        let value = result.to_value();
        assert_eq!(value["logs"], "first\n");
        assert_eq!(value["truncated"], true);
        assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn oversized_follow_limit_is_an_error_result() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        let dispatcher = CommandDispatcher::new(runner.clone(), "kubectl");

        let result = dispatcher
            .logs(&request(json!({
                "resource_name": "web-0",
                "follow": true,
                "max_follow_seconds": u64::MAX,
            })))
            .await;
        assert_eq!(
            result.to_value(),
            json!({
                "status": "error",
                "resource_name": "web-0",
                "namespace": "default",
                "message": format!("max_follow_seconds is out of range: {}", u64::MAX),
            })
        );
        assert_eq!(runner.spawn_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abandoned_follow_kills_its_process() {
        let dir = tempfile::tempdir().unwrap();
        let heartbeat = dir.path().join("heartbeat");
        let script = format!(
            "while true; do echo tick; echo tick >> {}; sleep 0.1; done",
            heartbeat.display()
        );
        let runner = Arc::new(FakeRunner::succeeding("").with_script(&script));
        let dispatcher = CommandDispatcher::new(runner, "kubectl");

        let req = request(json!({ "resource_name": "web-0", "follow": true }));
        let abandoned = tokio::time::timeout(Duration::from_millis(500), dispatcher.logs(&req)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let size = std::fs::metadata(&heartbeat).unwrap().len();
        assert!(size > 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(std::fs::metadata(&heartbeat).unwrap().len(), size);
    }
}
