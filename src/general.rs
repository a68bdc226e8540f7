//! General handler
//!
//! Answers greetings, capability questions and anything the classifier
//! could not place in a domain. Uses the LLM with recent session context
//! when configured, a static capability summary otherwise. Memory
//! failures are logged and tolerated; the turn is always answered.

use crate::gemini::GeminiClient;
use crate::memory::{ConversationMessage, MessageRole, SessionStore};
use crate::Result;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const SYSTEM_PROMPT: &str = "You are a friendly personal assistant. You can track \
expenses and budgets, assignments and exams, personal projects, and email accounts. \
Answer briefly. If the user seems to want one of those domains but the request is \
unclear, ask them to clarify.";

const CAPABILITIES: &str = "I can help you with:\n\
- Expenses and budgets: record spending, set limits, check totals\n\
- Assignments and exams: deadlines, completion, grades\n\
- Personal projects: milestones, features, progress notes\n\
- Email: connect accounts, unread and important messages, search\n\
Tell me what you need, e.g. \"Add 50 TL for coffee\" or \"What's due this week?\"";

/// Number of previous turns included in the LLM prompt.
const CONTEXT_TURNS: usize = 10;

pub struct GeneralResponder {
    gemini: Option<GeminiClient>,
    sessions: Arc<SessionStore>,
}

impl GeneralResponder {
    pub fn new(gemini: Option<GeminiClient>, sessions: Arc<SessionStore>) -> Self {
        Self { gemini, sessions }
    }

    pub async fn respond(&self, session_id: Uuid, request: &str) -> Result<String> {
        let history = match self.sessions.load(session_id).await {
            Ok(history) => Some(history),
            Err(error) => {
                warn!(error = %error, "Session history load failed, continuing without context");
                None
            }
        };

        let user_message = ConversationMessage::new(MessageRole::User, request.to_string());
        if let Err(error) = self.sessions.append(session_id, &user_message).await {
            warn!(error = %error, "Session history append failed");
        }

        let answer = match &self.gemini {
            Some(client) => {
                let mut prompt = String::new();
                if let Some(history) = &history {
                    if history.message_count() > 0 {
                        prompt.push_str("Conversation so far:\n");
                        prompt.push_str(&history.format_context(CONTEXT_TURNS));
                        prompt.push_str("\n---\n\n");
                    }
                }
                prompt.push_str(request);

                match client.generate(SYSTEM_PROMPT, &prompt).await {
                    Ok(answer) => answer,
                    Err(error) => {
                        warn!(error = %error, "LLM general response failed, using static reply");
                        static_response(request)
                    }
                }
            }
            None => static_response(request),
        };

        let agent_message = ConversationMessage::new(MessageRole::Assistant, answer.clone());
        if let Err(error) = self.sessions.append(session_id, &agent_message).await {
            warn!(error = %error, "Session history append failed");
        }

        Ok(answer)
    }
}

fn static_response(request: &str) -> String {
    let lowered = request.trim().to_lowercase();
    let greeting = ["hello", "hi", "hey", "good morning", "good evening"]
        .iter()
        .any(|g| lowered.starts_with(g));

    if greeting {
        format!("Hello! {}", CAPABILITIES)
    } else {
        CAPABILITIES.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_response_without_llm() {
        let responder = GeneralResponder::new(None, Arc::new(SessionStore::in_memory()));
        let answer = responder
            .respond(Uuid::new_v4(), "what can you do?")
            .await
            .unwrap();
        assert!(answer.contains("Expenses"));
        assert!(answer.contains("Email"));
    }

    #[tokio::test]
    async fn test_greeting_gets_a_greeting() {
        let responder = GeneralResponder::new(None, Arc::new(SessionStore::in_memory()));
        let answer = responder.respond(Uuid::new_v4(), "hello").await.unwrap();
        assert!(answer.starts_with("Hello!"));
    }

    #[tokio::test]
    async fn test_both_turns_recorded() {
        let sessions = Arc::new(SessionStore::in_memory());
        let responder = GeneralResponder::new(None, sessions.clone());
        let session_id = Uuid::new_v4();

        responder.respond(session_id, "hi").await.unwrap();

        let history = sessions.load(session_id).await.unwrap();
        assert_eq!(history.message_count(), 2);
        let roles: Vec<MessageRole> = history.messages().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }
}
