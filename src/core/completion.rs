//! Chat-completion backends.
//!
//! [`CompletionClient`] is the seam the orchestrator and evaluator talk to. The
//! production implementation, [`HttpCompletionClient`], speaks the
//! OpenAI-compatible `chat/completions` protocol; the responder and the
//! evaluator are two instances of it with different [`ClientConfig`]s.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::api::{ChatRequest, ChatResponse, ResponseFormat};
use crate::core::message::Message;
use crate::utils::url::construct_api_url;

const MAX_ERROR_SUMMARY_CHARS: usize = 300;

/// Named JSON schema the backend must satisfy (strict structured output).
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub response_format: Option<ResponseSchema>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            response_format: None,
        }
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_format = Some(schema);
        self
    }

    /// System prompt of the request, if the first message is one.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == crate::core::message::Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Failure of a single backend call.
#[derive(Debug)]
pub enum RequestError {
    /// The request never produced an HTTP response.
    Transport(Box<dyn StdError + Send + Sync>),

    /// No response arrived before the deadline.
    Timeout(Duration),

    /// The backend answered with a non-2xx status.
    Status { status: u16, body: String },

    /// The body could not be decoded or carried no reply text.
    Malformed(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(source) => write!(f, "request failed: {source}"),
            RequestError::Timeout(limit) => {
                write!(f, "no response within {} seconds", limit.as_secs())
            }
            RequestError::Status { status, body } => {
                write!(f, "backend returned HTTP {status}: {body}")
            }
            RequestError::Malformed(detail) => write!(f, "malformed response: {detail}"),
        }
    }
}

impl StdError for RequestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RequestError::Transport(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short name used in logs ("responder", "evaluator").
    fn label(&self) -> &str;

    /// Model named in every request this client sends.
    fn default_model(&self) -> &str;

    /// Sends the request and returns the first choice's content.
    async fn complete(&self, request: CompletionRequest) -> Result<String, RequestError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub label: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpCompletionClient {
    pub fn new(config: ClientConfig) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| RequestError::Transport(Box::new(err)))?;
        Ok(Self { client, config })
    }

    fn map_send_error(&self, err: reqwest::Error) -> RequestError {
        if err.is_timeout() {
            RequestError::Timeout(self.config.timeout)
        } else {
            RequestError::Transport(Box::new(err))
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    fn label(&self) -> &str {
        &self.config.label
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, RequestError> {
        let model = self.default_model();
        let response_format = request
            .response_format
            .as_ref()
            .map(|format| ResponseFormat::strict_json_schema(&format.name, &format.schema));
        let body = ChatRequest {
            model,
            messages: &request.messages,
            response_format,
        };

        let url = construct_api_url(&self.config.base_url, "chat/completions");
        debug!(
            client = %self.config.label,
            %model,
            messages = request.messages.len(),
            structured = request.response_format.is_some(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.map_send_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: summarize_error_body(&error_text),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|err| self.map_send_error(err))?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|err| RequestError::Malformed(format!("{err} in {}", clip(&text))))?;

        parsed
            .into_first_content()
            .ok_or_else(|| RequestError::Malformed("no choice with content".to_string()))
    }
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                // Gemini's OpenAI shim wraps errors in a one-element array.
                Value::Array(items) => items
                    .first()
                    .and_then(|item| item.pointer("/error/message"))
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .as_array()
                .and_then(|items| items.first())
                .and_then(extract_error_summary)
        });

    summary.map(|text| collapse_whitespace(&text))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clip(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= MAX_ERROR_SUMMARY_CHARS {
        return collapsed;
    }
    let mut clipped: String = collapsed.chars().take(MAX_ERROR_SUMMARY_CHARS).collect();
    clipped.push('…');
    clipped
}

/// One-line description of an error body suitable for the transcript.
pub fn summarize_error_body(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return summary;
            }
        }
    }

    clip(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Mutex;

    type CapturedBodies = Arc<Mutex<Vec<(String, Value)>>>;

    async fn read_http_request(stream: &mut TcpStream) -> Result<(String, Vec<u8>), String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let read = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
            if read == 0 {
                return Err("connection closed before headers".to_string());
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end..].to_vec();
        while body.len() < content_length {
            let read = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);
        Ok((head, body))
    }

    /// Serves a single canned response and records the request head and JSON body.
    async fn serve_once(status_line: &'static str, body: String) -> (String, CapturedBodies) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let captured: CapturedBodies = Arc::new(Mutex::new(Vec::new()));
        let captured_for_server = Arc::clone(&captured);

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.map_err(|e| e.to_string())?;
            let (head, request_body) = read_http_request(&mut stream).await?;
            let json: Value = serde_json::from_slice(&request_body).unwrap_or(Value::Null);
            captured_for_server.lock().await.push((head, json));

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .await
                .map_err(|e| e.to_string())?;
            stream.shutdown().await.map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        });

        (format!("http://{addr}/v1/"), captured)
    }

    fn client_for(base_url: String) -> HttpCompletionClient {
        HttpCompletionClient::new(ClientConfig {
            label: "responder".to_string(),
            base_url,
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn complete_returns_first_choice_and_sends_openai_payload() {
        let body = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Hello from the backend"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        })
        .to_string();
        let (base_url, captured) = serve_once("200 OK", body).await;
        let client = client_for(base_url);

        let reply = client
            .complete(CompletionRequest::new(vec![
                Message::system("be helpful"),
                Message::user("hi"),
            ]))
            .await
            .expect("completion should succeed");
        assert_eq!(reply, "Hello from the backend");

        let captured = captured.lock().await;
        let (head, json) = &captured[0];
        assert!(head.starts_with("POST /v1/chat/completions HTTP/1.1"));
        assert!(head
            .to_ascii_lowercase()
            .contains("authorization: bearer test-key"));
        assert_eq!(
            json,
            &json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "be helpful"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn complete_forwards_schema_with_configured_model() {
        let body = json!({
            "choices": [{"message": {"content": "{\"is_acceptable\":true,\"feedback\":\"\"}"}}]
        })
        .to_string();
        let (base_url, captured) = serve_once("200 OK", body).await;
        let client = client_for(base_url);

        let request = CompletionRequest::new(vec![Message::user("judge")]).with_schema(
            ResponseSchema {
                name: "evaluation".to_string(),
                schema: json!({"type": "object"}),
            },
        );

        client.complete(request).await.expect("completion");

        let captured = captured.lock().await;
        let (_, json) = &captured[0];
        assert_eq!(json["model"], client.default_model());
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], "evaluation");
        assert_eq!(json["response_format"]["json_schema"]["strict"], true);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_summary() {
        let body = json!({"error": {"message": "model   overloaded", "type": "server_error"}})
            .to_string();
        let (base_url, _captured) = serve_once("503 Service Unavailable", body).await;
        let client = client_for(base_url);

        let err = client
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .expect_err("503 should fail");

        match err {
            RequestError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model overloaded");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let (base_url, _captured) = serve_once("200 OK", "not json".to_string()).await;
        let client = client_for(base_url);

        let err = client
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .expect_err("garbage should fail");
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let (base_url, _captured) = serve_once("200 OK", r#"{"choices":[]}"#.to_string()).await;
        let client = client_for(base_url);

        let err = client
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .expect_err("no choices should fail");
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{addr}"));
        let err = client
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .expect_err("nothing is listening");
        assert!(matches!(err, RequestError::Transport(_)));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn configured_timeout_applies_to_silent_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
            Ok::<(), std::io::Error>(())
        });

        let client = HttpCompletionClient::new(ClientConfig {
            label: "evaluator".to_string(),
            base_url: format!("http://{addr}"),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_millis(300),
        })
        .expect("client should build");

        let err = client
            .complete(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .expect_err("silent backend should time out");
        assert!(matches!(err, RequestError::Timeout(limit) if limit == Duration::from_millis(300)));
    }

    #[test]
    fn summarize_error_body_handles_common_shapes() {
        assert_eq!(
            summarize_error_body(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(summarize_error_body(r#"{"error":"quota"}"#), "quota");
        assert_eq!(
            summarize_error_body(r#"[{"error":{"code":400,"message":"Invalid JSON payload"}}]"#),
            "Invalid JSON payload"
        );
        assert_eq!(summarize_error_body("  upstream\n  failure "), "upstream failure");
        assert_eq!(summarize_error_body(""), "<empty>");
    }

    #[test]
    fn long_plaintext_errors_are_clipped() {
        let long = "x".repeat(1000);
        let summary = summarize_error_body(&long);
        assert_eq!(summary.chars().count(), MAX_ERROR_SUMMARY_CHARS + 1);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn system_prompt_reads_leading_system_message() {
        let request = CompletionRequest::new(vec![Message::system("sys"), Message::user("u")]);
        assert_eq!(request.system_prompt(), Some("sys"));

        let request = CompletionRequest::new(vec![Message::user("u")]);
        assert_eq!(request.system_prompt(), None);
    }
}
