use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Bot,
}

/// One entry of the interview-prep chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Speaker::Bot, content)
    }

    fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_serialized_as_type() {
        let json = serde_json::to_value(ChatMessage::bot("hi")).unwrap();
        assert_eq!(json["type"], "bot");
        assert_eq!(json["content"], "hi");
    }
}
