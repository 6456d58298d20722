use rig::completion::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods supported by the server
#[derive(Debug, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
}

impl Method {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            _ => None,
        }
    }
}

/// HTTP paths (routes) supported by the server
#[derive(Debug, PartialEq, Eq)]
pub enum Path {
    /// GET / - Health check endpoint
    Root,
    /// POST /ask - Natural-language question answered by the agent
    Ask,
    /// POST /tools/call - Direct invocation of one tool
    ToolsCall,
    /// GET /favicon.ico - Favicon request (returns 404)
    Favicon,
}

impl Path {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "/" => Some(Path::Root),
            "/ask" => Some(Path::Ask),
            "/tools/call" => Some(Path::ToolsCall),
            "/favicon.ico" => Some(Path::Favicon),
            _ => None,
        }
    }
}

/// Parsed HTTP request with relevant fields extracted
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: Path,
    pub api_key: Option<String>,
    pub body: Option<String>,
}

fn split_head(request_str: &str) -> Option<(&str, &str)> {
    request_str
        .split_once("\r\n\r\n")
        .or_else(|| request_str.split_once("\n\n"))
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value.trim())
    } else {
        None
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| header_value(line, "content-length"))
        .and_then(|len| len.parse().ok())
        .unwrap_or(0)
}

impl Request {
    /// Parses an HTTP/1.1 request string into a Request struct.
    ///
    /// Extracts:
    /// - HTTP method and path from the request line
    /// - X-API-Key header for authentication
    /// - Request body based on Content-Length header
    ///
    /// Returns None if the request is malformed or uses unsupported method/path.
    pub fn parse(request_str: &str) -> Option<Self> {
        let (head, rest) = split_head(request_str).unwrap_or((request_str, ""));
        let mut lines = head.lines();
        let first_line = lines.next()?;
        let mut parts = first_line.split_whitespace();

        let method = parts.next().and_then(Method::from_str)?;
        let path = parts.next().and_then(Path::from_str)?;

        let api_key = lines
            .find_map(|line| header_value(line, "x-api-key"))
            .map(str::to_string);

        let length = content_length(head);
        let body = if length > 0 {
            let end = length.min(rest.len());
            Some(rest.get(..end).unwrap_or(rest).to_string())
        } else {
            None
        };

        Some(Request {
            method,
            path,
            body,
            api_key,
        })
    }

    /// True once the headers and `Content-Length` bytes of body are buffered.
    pub fn is_complete(buffer: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buffer);
        match split_head(&text) {
            Some((head, rest)) => rest.len() >= content_length(head),
            None => false,
        }
    }
}

/// Request payload for the /ask endpoint
#[derive(Debug, Deserialize, Serialize)]
pub struct AskRequest {
    /// The user's question about the cluster
    pub query: String,
    /// Optional conversation history for context
    pub chat_history: Option<Vec<HttpMessage>>,
}

/// Response payload for the /ask endpoint
#[derive(Debug, Deserialize, Serialize)]
pub struct AskResponse {
    pub response: String,
}

/// Request payload for the /tools/call endpoint
#[derive(Debug, Deserialize, Serialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// A single message in a chat conversation
#[derive(Debug, Deserialize, Serialize)]
pub struct HttpMessage {
    /// Message role: "user" or "assistant"
    pub role: String,
    /// Message content/text
    pub content: String,
}

impl TryFrom<HttpMessage> for Message {
    type Error = &'static str;

    fn try_from(value: HttpMessage) -> Result<Self, Self::Error> {
        match value.role.as_str() {
            "user" => Ok(Message::user(value.content)),
            "assistant" => Ok(Message::assistant(value.content)),
            _ => Err("Invalid role in HttpMessage"),
        }
    }
}
