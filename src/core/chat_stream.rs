use std::time::Duration;

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::utils::url::construct_api_url;

/// Capacity of the worker-to-consumer event channel. The worker blocks on a
/// full channel, so a slow consumer applies natural backpressure.
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

/// How long a cancelled worker gets to wind down cooperatively before its
/// task is aborted outright.
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Event relayed from the streaming worker to the single consumer. Events are
/// delivered in network order, tagged with the id of the stream that produced
/// them so stale streams can be ignored.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// Incremental text as it arrives over the network.
    Fragment(String),
    /// Stream ended normally; carries the full concatenated text.
    Completed(String),
    /// Terminal failure for this attempt. Reported once; no retry.
    Failed(String),
}

/// Sampling parameters forwarded verbatim to the endpoint.
#[derive(Clone, Debug)]
pub struct SamplingOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub stop: Option<Vec<String>>,
}

/// Everything one streaming request needs. Built by the controller; the
/// worker owns it for the lifetime of the request and touches nothing else.
pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_token: Option<String>,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingOptions,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// What to do with one SSE `data:` payload.
#[derive(Debug, PartialEq)]
enum SseAction {
    Content(String),
    Done,
    Fail(String),
    Skip,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn classify_data_payload(payload: &str) -> SseAction {
    if payload == "[DONE]" {
        return SseAction::Done;
    }
    if let Ok(response) = serde_json::from_str::<ChatResponse>(payload) {
        if let Some(content) = response
            .choices
            .first()
            .and_then(|choice| choice.delta.content.clone())
        {
            return SseAction::Content(content);
        }
        // Role announcements and finish markers carry no content.
        return SseAction::Skip;
    }
    if payload.trim().is_empty() {
        return SseAction::Skip;
    }
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) if value.get("error").is_some() => SseAction::Fail(format_api_error(payload)),
        _ => {
            warn!(payload, "skipping unrecognized stream payload");
            SseAction::Skip
        }
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed.trim().to_string())
}

/// Turn a raw error body into a one-line summary plus the original payload.
fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "API error: <empty response body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API error: {summary}");
            }
        }
        if let Ok(pretty) = serde_json::to_string_pretty(&json_value) {
            return format!("API error:\n{pretty}");
        }
    }

    format!("API error: {trimmed}")
}

/// Spawns and feeds streaming workers. Created once; all workers share the
/// same outbound channel, and the receiver end belongs to the UI loop.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::Sender<(StreamEvent, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::Receiver<(StreamEvent, u64)>) {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Start one streaming chat-completion call on a background task.
    ///
    /// The worker relays fragments in network order, then exactly one of
    /// `Completed` or `Failed`. Cancelling the token stops the relay between
    /// fragments; the returned handle lets the caller escalate to a hard
    /// abort if the worker does not yield within the grace period.
    pub fn spawn_stream(&self, params: StreamParams) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                base_url,
                api_token,
                model,
                messages,
                sampling,
                cancel_token,
                stream_id,
            } = params;

            let request = ChatRequest {
                model,
                messages,
                stream: true,
                temperature: sampling.temperature,
                top_p: sampling.top_p,
                max_tokens: sampling.max_tokens,
                stop: sampling.stop,
            };

            debug!(stream_id, "starting chat completion stream");
            tokio::select! {
                _ = relay_stream(&client, &base_url, api_token.as_deref(), &request, &tx, stream_id) => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "stream cancelled");
                }
            }
        })
    }

    #[cfg(test)]
    pub async fn send_for_test(&self, event: StreamEvent, stream_id: u64) {
        let _ = self.tx.send((event, stream_id)).await;
    }
}

async fn relay_stream(
    client: &reqwest::Client,
    base_url: &str,
    api_token: Option<&str>,
    request: &ChatRequest,
    tx: &mpsc::Sender<(StreamEvent, u64)>,
    stream_id: u64,
) {
    let url = construct_api_url(base_url, "chat/completions");
    let mut http_request = client.post(url).header("Content-Type", "application/json");
    if let Some(token) = api_token {
        http_request = http_request.bearer_auth(token);
    }

    let response = match http_request.json(request).send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx
                .send((StreamEvent::Failed(format_api_error(&e.to_string())), stream_id))
                .await;
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        debug!(stream_id, %status, "chat completion request rejected");
        let _ = tx
            .send((StreamEvent::Failed(format_api_error(&body)), stream_id))
            .await;
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut full_text = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx
                    .send((StreamEvent::Failed(format_api_error(&e.to_string())), stream_id))
                    .await;
                return;
            }
        };
        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let line = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(s) => s.trim().to_string(),
                Err(e) => {
                    warn!(stream_id, "invalid UTF-8 in stream: {e}");
                    buffer.drain(..=newline_pos);
                    continue;
                }
            };
            buffer.drain(..=newline_pos);

            let Some(payload) = extract_data_payload(&line) else {
                continue;
            };
            match classify_data_payload(payload) {
                SseAction::Content(text) => {
                    full_text.push_str(&text);
                    if tx
                        .send((StreamEvent::Fragment(text), stream_id))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                SseAction::Done => {
                    debug!(stream_id, "stream completed");
                    let _ = tx.send((StreamEvent::Completed(full_text), stream_id)).await;
                    return;
                }
                SseAction::Fail(error) => {
                    let _ = tx.send((StreamEvent::Failed(error), stream_id)).await;
                    return;
                }
                SseAction::Skip => {}
            }
        }
    }

    // Connection closed without a [DONE] marker; treat what we have as the
    // complete response.
    debug!(stream_id, "stream ended without terminator");
    let _ = tx.send((StreamEvent::Completed(full_text), stream_id)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_prefix_spacing_variants_are_accepted() {
        let spaced = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        let tight = r#"data:{"choices":[{"delta":{"content":"World"}}]}"#;

        for (line, expected) in [(spaced, "Hello"), (tight, "World")] {
            let payload = extract_data_payload(line).expect("data payload");
            assert_eq!(
                classify_data_payload(payload),
                SseAction::Content(expected.to_string())
            );
        }
    }

    #[test]
    fn done_marker_terminates() {
        assert_eq!(classify_data_payload("[DONE]"), SseAction::Done);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        assert!(extract_data_payload("event: ping").is_none());
        assert!(extract_data_payload(": keepalive comment").is_none());
    }

    #[test]
    fn deltas_without_content_are_skipped() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert_eq!(classify_data_payload(payload), SseAction::Skip);
        assert_eq!(classify_data_payload(r#"{"choices":[]}"#), SseAction::Skip);
    }

    #[test]
    fn malformed_payloads_are_skipped_not_fatal() {
        assert_eq!(classify_data_payload("not json at all"), SseAction::Skip);
        assert_eq!(classify_data_payload(r#"{"unexpected":"shape"}"#), SseAction::Skip);
        assert_eq!(classify_data_payload(""), SseAction::Skip);
    }

    #[test]
    fn embedded_error_objects_fail_the_stream() {
        let payload = r#"{"error":{"message":"internal server error"}}"#;
        match classify_data_payload(payload) {
            SseAction::Fail(text) => {
                assert_eq!(text, "API error: internal server error");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn api_errors_are_summarized() {
        let raw = r#"{"error":{"message":"model   overloaded","type":"rate_limit"}}"#;
        assert_eq!(format_api_error(raw), "API error: model overloaded");

        let string_error = r#"{"error":"quota exceeded"}"#;
        assert_eq!(format_api_error(string_error), "API error: quota exceeded");

        assert_eq!(format_api_error("plain failure"), "API error: plain failure");
        assert_eq!(format_api_error("  "), "API error: <empty response body>");
    }

    #[test]
    fn json_errors_without_summary_keep_the_body() {
        let raw = r#"{"status":"failed"}"#;
        let formatted = format_api_error(raw);
        assert!(formatted.starts_with("API error:\n"));
        assert!(formatted.contains("\"status\": \"failed\""));
    }

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (service, mut rx) = ChatStreamService::new();
        service
            .send_for_test(StreamEvent::Fragment("He".to_string()), 7)
            .await;
        service
            .send_for_test(StreamEvent::Fragment("llo".to_string()), 7)
            .await;
        service
            .send_for_test(StreamEvent::Completed("Hello".to_string()), 7)
            .await;

        let mut fragments = String::new();
        loop {
            match rx.try_recv().expect("queued event") {
                (StreamEvent::Fragment(text), 7) => fragments.push_str(&text),
                (StreamEvent::Completed(full), 7) => {
                    assert_eq!(full, fragments);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }
}
