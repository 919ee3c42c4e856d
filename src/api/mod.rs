use serde::{Deserialize, Serialize};

use crate::core::message::Role;

/// One entry of the `messages` array sent to the chat-completions endpoint.
#[derive(Serialize, Clone, Debug)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Outbound request body for `POST {base_url}/chat/completions`.
#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Incremental delta carried by one SSE payload. `content` is optional by
/// design; payloads without it (role announcements, finish markers) are
/// tolerated and skipped.
#[derive(Deserialize, Debug)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_sampling_parameters() {
        let request = ChatRequest {
            model: "test-model".to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "hi".to_string(),
            }],
            stream: true,
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 500,
            stop: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["stream"], true);
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["top_p"], 0.95);
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn delta_without_content_is_accepted() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        let response: ChatResponse = serde_json::from_str(payload).unwrap();
        assert!(response.choices[0].delta.content.is_none());
    }
}
