use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn. Serialized as the lowercase strings the
/// chat-completions wire format uses, so transcripts round-trip verbatim.
/// Unknown role strings are rejected when a transcript is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// One conversation turn. An ordered `Vec<Message>` is the whole conversation
/// state; order defines dialogue turn order and is sent verbatim to the
/// inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_as_lowercase_strings() {
        let message = Message::assistant("hi");
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let result = serde_json::from_str::<Message>(r#"{"role":"thinking","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn messages_round_trip() {
        let original = vec![
            Message::system("S"),
            Message::user("hi"),
            Message::assistant("Hello"),
        ];
        let json = serde_json::to_string(&original).unwrap();
        let loaded: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, original);
    }
}
