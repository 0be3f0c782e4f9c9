use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub id: String,
    pub content: String,
    pub role: ChatRole,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChatMetadata>,
}

impl ChatMessage {
    fn local(role: ChatRole, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis().to_string(),
            content: content.into(),
            role,
            timestamp: now.to_rfc3339(),
            metadata: None,
        }
    }

    /// A message typed by the user, before the server has seen it
    pub fn user(content: impl Into<String>) -> Self {
        Self::local(ChatRole::User, content)
    }

    /// Placeholder assistant reply shown when sending failed
    pub fn send_failure() -> Self {
        let mut message = Self::local(
            ChatRole::Assistant,
            "Sorry, I encountered an error. Please try again.",
        );
        message.metadata = Some(ChatMetadata {
            coin_id: None,
            error: Some("Failed to send message".to_string()),
        });
        message
    }

    pub fn is_error(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.error.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: ChatMessage,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_missing_session() {
        let req = ChatRequest {
            message: "What is the price of bitcoin?".to_string(),
            session_id: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"message": "What is the price of bitcoin?"})
        );

        let req = ChatRequest {
            session_id: Some("s1".to_string()),
            ..req
        };
        assert_eq!(serde_json::to_value(&req).unwrap()["sessionId"], "s1");
    }

    #[test]
    fn test_response_parses() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"message":{"id":"m2","content":"BTC is $65k","role":"assistant","timestamp":"2024-05-01T12:00:00Z"},"sessionId":"s1"}"#,
        )
        .unwrap();
        assert_eq!(resp.message.role, ChatRole::Assistant);
        assert_eq!(resp.session_id.as_deref(), Some("s1"));
        assert!(resp.suggestions.is_empty());
    }

    #[test]
    fn test_send_failure_is_error() {
        assert!(ChatMessage::send_failure().is_error());
        assert!(!ChatMessage::user("hi").is_error());
    }
}
