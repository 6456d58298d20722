use crate::kube::envelope::{fields, CommandResult, Fields};
use crate::kube::process::{Capture, CommandLine, ProcessRunner};
use crate::kube::reader::DEFAULT_NAMESPACE;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::Mutex;
use tracing::*;

/// Time a fresh session gets before an exit counts as a startup failure.
const STARTUP_GRACE: Duration = Duration::from_secs(1);
/// Time a session gets to exit after SIGTERM before it is killed.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_address() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PortForwardRequest {
    /// pod, service, deployment, ...
    pub resource_type: String,
    pub name: String,
    pub local_port: u16,
    pub remote_port: u16,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Local address to bind to.
    #[serde(default = "default_address")]
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StopPortForwardRequest {
    /// Session to stop. Stops every session when omitted.
    pub process_key: Option<String>,
}

/// Identifies a session: `namespace/resource_type/name/local/remote`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub namespace: String,
    pub resource_type: String,
    pub name: String,
    pub local_port: u16,
    pub remote_port: u16,
}

impl From<&PortForwardRequest> for SessionKey {
    fn from(req: &PortForwardRequest) -> Self {
        SessionKey {
            namespace: req.namespace.clone(),
            resource_type: req.resource_type.clone(),
            name: req.name.clone(),
            local_port: req.local_port,
            remote_port: req.remote_port,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.namespace, self.resource_type, self.name, self.local_port, self.remote_port
        )
    }
}

/// Owns every background `kubectl port-forward` process.
///
/// Children are spawned kill-on-drop, so dropping the registry tears down
/// whatever is still running.
pub struct PortForwardRegistry {
    runner: Arc<dyn ProcessRunner>,
    kubectl: String,
    sessions: Mutex<HashMap<String, Child>>,
    grace: Duration,
}

impl PortForwardRegistry {
    pub fn new(runner: Arc<dyn ProcessRunner>, kubectl: impl Into<String>) -> Self {
        PortForwardRegistry {
            runner,
            kubectl: kubectl.into(),
            sessions: Mutex::new(HashMap::new()),
            grace: STARTUP_GRACE,
        }
    }

    #[cfg(test)]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn start(&self, req: &PortForwardRequest) -> CommandResult {
        let key = SessionKey::from(req).to_string();
        let context = fields(json!({
            "resource_type": req.resource_type,
            "name": req.name,
            "namespace": req.namespace,
            "local_port": req.local_port,
            "remote_port": req.remote_port,
        }));

        let command = CommandLine::new(
            self.kubectl.clone(),
            vec![
                "port-forward".to_string(),
                format!("{}/{}", req.resource_type, req.name),
                format!("{}:{}", req.local_port, req.remote_port),
                "-n".to_string(),
                req.namespace.clone(),
                "--address".to_string(),
                req.address.clone(),
            ],
        );

        {
            let mut sessions = self.sessions.lock().await;
            if let Some(existing) = sessions.get_mut(&key) {
                match existing.try_wait() {
                    Ok(None) => {
                        warn!("Port forward {} is already running", key);
                        return CommandResult::error(
                            context,
                            format!("Port forwarding already running for key: {}", key),
                        );
                    }
                    _ => {
                        debug!("Replacing stale port forward {}", key);
                        sessions.remove(&key);
                    }
                }
            }

            info!("Starting: {}", command);
            let child = match self.runner.spawn(&command, Capture::StderrOnly) {
                Ok(child) => child,
                Err(e) => {
                    error!("Failed to spawn port forward: {}", e);
                    return CommandResult::error(context, format!("Failed to set up port forwarding: {}", e));
                }
            };
            sessions.insert(key.clone(), child);
        }

        tokio::time::sleep(self.grace).await;

        let mut sessions = self.sessions.lock().await;
        let exited = match sessions.get_mut(&key) {
            Some(child) => match child.try_wait() {
                Ok(None) => false,
                Ok(Some(status)) => {
                    debug!("Port forward {} exited early with {:?}", key, status.code());
                    true
                }
                Err(e) => {
                    warn!("Could not poll port forward {}: {}", key, e);
                    true
                }
            },
            None => {
                return CommandResult::error(
                    context,
                    format!("Port forwarding for key {} was stopped during startup", key),
                )
            }
        };

        if exited {
            let stderr = match sessions.remove(&key) {
                Some(child) => read_stderr(child).await,
                None => String::new(),
            };
            return CommandResult::error(context, stderr);
        }

        if let Some(stderr) = sessions.get_mut(&key).and_then(|child| child.stderr.take()) {
            tokio::spawn(log_stderr(key.clone(), stderr));
        }

        info!("Port forward {} is running", key);
        let message = format!(
            "Port forwarding started: {}:{} -> {}:{}",
            req.address, req.local_port, req.name, req.remote_port
        );
        CommandResult::success(context, "address", req.address.clone())
            .with("process_key", key)
            .with("message", message)
    }

    /// Stops one session, or all of them when `key` is `None`.
    pub async fn stop(&self, key: Option<&str>) -> CommandResult {
        let mut sessions = self.sessions.lock().await;

        match key {
            Some(key) => match sessions.remove(key) {
                Some(child) => {
                    terminate(key, child).await;
                    CommandResult::success(
                        Fields::new(),
                        "message",
                        format!("Stopped port-forwarding for {}", key),
                    )
                }
                None => CommandResult::error(
                    Fields::new(),
                    format!("No port-forwarding process found for key: {}", key),
                ),
            },
            None => {
                let drained: Vec<(String, Child)> = sessions.drain().collect();
                let count = drained.len();
                for (key, child) in drained {
                    terminate(&key, child).await;
                }
                info!("Stopped {} port forwards", count);
                CommandResult::success(
                    Fields::new(),
                    "message",
                    format!("Stopped all port-forwarding processes ({} total)", count),
                )
            }
        }
    }
}

async fn read_stderr(mut child: Child) -> String {
    let mut buffer = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        if let Err(e) = stderr.read_to_string(&mut buffer).await {
            debug!("Could not read port forward stderr: {}", e);
        }
    }
    buffer
}

/// Keeps a running session's stderr pipe from filling up.
async fn log_stderr(key: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!("Port forward {}: {}", key, line),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading port forward {} stderr: {}", key, e);
                break;
            }
        }
    }
}

/// SIGTERM, then a bounded wait, then a hard kill.
async fn terminate(key: &str, mut child: Child) {
    send_sigterm(key, &child);

    match tokio::time::timeout(STOP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!("Port forward {} exited with {:?}", key, status.code()),
        Ok(Err(e)) => warn!("Failed waiting for port forward {}: {}", key, e),
        Err(_) => {
            warn!("Port forward {} ignored SIGTERM, killing", key);
            if let Err(e) = child.kill().await {
                error!("Failed to kill port forward {}: {}", key, e);
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(key: &str, child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to port forward {}: {}", key, e);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_key: &str, _child: &Child) {}
