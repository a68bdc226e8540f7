//! Conversation history storage
//!
//! Stores conversation messages with timestamps per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
        }
    }
}

/// Conversation history for one session
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub session_id: Uuid,
    messages: VecDeque<ConversationMessage>,
}

impl ConversationHistory {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            messages: VecDeque::new(),
        }
    }

    pub fn add_message(&mut self, message: ConversationMessage) {
        self.messages.push_back(message);
    }

    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The N most recent messages, oldest first.
    pub fn recent_messages(&self, count: usize) -> Vec<&ConversationMessage> {
        let mut recent: Vec<&ConversationMessage> =
            self.messages.iter().rev().take(count).collect();
        recent.reverse();
        recent
    }

    /// Render the last `count` turns for inclusion in an LLM prompt.
    pub fn format_context(&self, count: usize) -> String {
        let mut context = String::new();
        for msg in self.recent_messages(count) {
            let role = match msg.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            context.push_str(&format!("{}: {}\n", role, msg.content));
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_accumulates_messages() {
        let mut history = ConversationHistory::new(Uuid::new_v4());
        history.add_message(ConversationMessage::new(
            MessageRole::User,
            "Add 50 TL for coffee".to_string(),
        ));
        history.add_message(ConversationMessage::new(
            MessageRole::Assistant,
            "Done.".to_string(),
        ));

        assert_eq!(history.message_count(), 2);
    }

    #[test]
    fn test_recent_messages_order() {
        let mut history = ConversationHistory::new(Uuid::new_v4());
        for i in 0..5 {
            history.add_message(ConversationMessage::new(
                MessageRole::User,
                format!("message {}", i),
            ));
        }

        let recent = history.recent_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[1].content, "message 4");
    }

    #[test]
    fn test_format_context() {
        let mut history = ConversationHistory::new(Uuid::new_v4());
        history.add_message(ConversationMessage::new(
            MessageRole::User,
            "hello".to_string(),
        ));
        history.add_message(ConversationMessage::new(
            MessageRole::Assistant,
            "hi!".to_string(),
        ));

        let context = history.format_context(10);
        assert!(context.contains("User: hello"));
        assert!(context.contains("Assistant: hi!"));
    }
}
