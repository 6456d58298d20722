pub mod types;

use crate::agent::Agent;
use crate::kube::tools::ToolCall;
use crate::kube::KubernetesConnector;
use rig::completion::Message;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use types::{AskRequest, AskResponse, Method, Path, Request, ToolCallRequest};

/// Largest request the server will buffer.
const MAX_REQUEST_BYTES: usize = 100_000;

/// HTTP server in front of the agent and the Kubernetes tools.
///
/// Implements a custom TCP-based HTTP/1.1 server without using a web framework.
/// Provides endpoints for health checks, agent questions and direct tool calls.
pub struct Server {
    agent: Agent,
    connector: Arc<KubernetesConnector>,
    host: String,
    api_key: String,
}

impl Server {
    pub fn new(
        agent: Agent,
        connector: Arc<KubernetesConnector>,
        host: String,
        api_key: String,
    ) -> Self {
        Server {
            agent,
            connector,
            host,
            api_key,
        }
    }

    /// Starts the server and listens for incoming connections.
    ///
    /// Each connection is served on its own task, so a slow agent answer or a
    /// long log follow never holds up other clients.
    pub async fn listen(self: Arc<Self>) -> io::Result<()> {
        let listener = TcpListener::bind(&self.host).await?;
        info!("Server listening on {}", self.host);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream).await {
                            error!("Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn read_request(stream: &mut TcpStream) -> io::Result<String> {
        let mut buffer = Vec::new();
        let mut chunk = [0; 8192];

        loop {
            let bytes_read = stream.read(&mut chunk).await?;
            if bytes_read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..bytes_read]);
            if Request::is_complete(&buffer) || buffer.len() >= MAX_REQUEST_BYTES {
                break;
            }
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Handles a single client connection.
    ///
    /// Reads the HTTP request, validates the API key, routes to appropriate handler,
    /// and sends the response.
    async fn handle_client(&self, mut stream: TcpStream) -> io::Result<()> {
        let request_str = Self::read_request(&mut stream).await?;

        let request = match Request::parse(&request_str) {
            Some(request) => request,
            None => {
                warn!("Received malformed request, returning 400");
                debug!("Request string: {}", request_str);
                return Self::send_response(&mut stream, "400 Bad Request", "Invalid request").await;
            }
        };

        debug!(
            "Parsed request: method={:?}, path={:?}",
            request.method, request.path
        );

        // Validate API key
        match &request.api_key {
            Some(api_key) if *api_key == self.api_key => {
                debug!("API key validated successfully");
            }
            Some(_) => {
                warn!("Invalid API key attempt");
                return Self::send_response(&mut stream, "403 Forbidden", "Invalid API key").await;
            }
            None => {
                warn!("Request missing API key");
                return Self::send_response(&mut stream, "401 Unauthorized", "Missing API key")
                    .await;
            }
        }

        let (status, body) = match (request.path, request.method) {
            (Path::Root, Method::GET) => {
                debug!("Health check requested");
                ("200 OK", json!({ "healthy": true }).to_string())
            }
            (Path::Ask, Method::POST) => self.ask_handler(request.body).await,
            (Path::ToolsCall, Method::POST) => {
                tool_call_response(&self.connector, request.body.as_deref()).await
            }
            (Path::Favicon, _) => {
                debug!("Favicon request received, returning 404");
                ("404 Not Found", "Favicon not found".to_string())
            }
            (path, method) => {
                warn!("Invalid HTTP method {:?} for {:?}", method, path);
                ("405 Method Not Allowed", "Invalid method".to_string())
            }
        };

        Self::send_response(&mut stream, status, &body).await
    }

    /// Sends an HTTP response to the client.
    async fn send_response(stream: &mut TcpStream, status: &str, body: &str) -> io::Result<()> {
        debug!("Sending response: {}", status);
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    }

    /// Handles POST /ask by running the question through the agent.
    async fn ask_handler(&self, body: Option<String>) -> (&'static str, String) {
        let body_str = match body {
            Some(b) => b,
            None => {
                warn!("Ask request missing body");
                return ("400 Bad Request", "Missing request body".to_string());
            }
        };

        let ask = match serde_json::from_str::<AskRequest>(&body_str) {
            Ok(ask) => ask,
            Err(e) => {
                warn!(
                    "Failed to parse ask request JSON (request: {}), ERROR: {}",
                    &body_str, e
                );
                return ("400 Bad Request", "Invalid JSON body".to_string());
            }
        };

        info!("Processing question ({} chars)", ask.query.len());

        // Convert chat history to internal message format
        let mut chat_history: Vec<Message> = Vec::new();
        if let Some(history) = ask.chat_history {
            debug!("Including {} historical messages", history.len());
            for msg in history {
                match msg.try_into() {
                    Ok(m) => chat_history.push(m),
                    Err(e) => {
                        warn!("Invalid message role in chat history: {}", e);
                        return (
                            "400 Bad Request",
                            "Invalid message role in chat history".to_string(),
                        );
                    }
                }
            }
        }

        match self.agent.chat(ask.query, chat_history).await {
            Ok(response) => {
                info!("Generated response ({} chars)", response.len());
                debug!("Response content: {}", response);
                match serde_json::to_string(&AskResponse { response }) {
                    Ok(body) => ("200 OK", body),
                    Err(e) => {
                        error!("Failed to encode response: {}", e);
                        ("500 Internal Server Error", "Failed to generate response".to_string())
                    }
                }
            }
            Err(e) => {
                error!("Failed to generate response: {}", e);
                ("500 Internal Server Error", "Failed to generate response".to_string())
            }
        }
    }
}

/// Handles POST /tools/call: parses `{name, arguments}` and runs the tool.
async fn tool_call_response(
    connector: &KubernetesConnector,
    body: Option<&str>,
) -> (&'static str, String) {
    let Some(body) = body else {
        warn!("Tool call missing body");
        return ("400 Bad Request", json!({ "error": "Missing request body" }).to_string());
    };

    let call = serde_json::from_str::<ToolCallRequest>(body)
        .and_then(|req| ToolCall::from_parts(&req.name, req.arguments));

    match call {
        Ok(call) => {
            let result = call.invoke(connector).await;
            match serde_json::to_string_pretty(&result) {
                Ok(text) => ("200 OK", text),
                Err(e) => {
                    error!("Failed to encode tool result: {}", e);
                    ("500 Internal Server Error", json!({ "error": e.to_string() }).to_string())
                }
            }
        }
        Err(e) => {
            warn!("Rejected tool call: {}", e);
            (
                "400 Bad Request",
                json!({ "error": format!("Invalid tool call: {}", e) }).to_string(),
            )
        }
    }
}
