//! Session persistence backends
//!
//! SQLite-backed when `ASSISTANT_DB_PATH` is configured, in-memory
//! otherwise. The schema is bootstrapped once on first use.

use crate::error::AssistantError;
use crate::memory::history::{ConversationHistory, ConversationMessage, MessageRole};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;
use uuid::Uuid;

enum Backend {
    InMemory {
        histories: Arc<RwLock<HashMap<Uuid, ConversationHistory>>>,
    },
    Sqlite {
        pool: SqlitePool,
        schema_ready: Arc<OnceCell<()>>,
    },
}

pub struct SessionStore {
    backend: Backend,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::InMemory {
                histories: Arc::new(RwLock::new(HashMap::new())),
            },
        }
    }

    pub fn sqlite(path: impl Into<std::path::PathBuf>) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path.into())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(options);

        Self {
            backend: Backend::Sqlite {
                pool,
                schema_ready: Arc::new(OnceCell::new()),
            },
        }
    }

    /// Pick a backend from the environment: `ASSISTANT_DB_PATH` (or a
    /// `sqlite:` `DATABASE_URL`) selects SQLite, anything else falls
    /// back to in-memory.
    pub fn from_env() -> Self {
        let configured = env::var("ASSISTANT_DB_PATH").ok().or_else(|| {
            env::var("DATABASE_URL")
                .ok()
                .and_then(|url| url.strip_prefix("sqlite://").map(str::to_string))
        });

        match configured {
            Some(path) if !path.trim().is_empty() => {
                info!(path = %path, "Session store backend: sqlite");
                Self::sqlite(path)
            }
            _ => {
                info!("Session store backend: in-memory");
                Self::in_memory()
            }
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        let Backend::Sqlite { pool, schema_ready } = &self.backend else {
            return Ok(());
        };

        schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS conversation_messages (
                      message_id TEXT PRIMARY KEY,
                      session_id TEXT NOT NULL,
                      role TEXT NOT NULL,
                      content TEXT NOT NULL,
                      created_at TEXT NOT NULL
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_conversation_messages_session_time
                    ON conversation_messages (session_id, created_at);
                    "#,
                )
                .execute(pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AssistantError::Database(format!("Failed to initialize session schema: {}", e))
            })?;

        Ok(())
    }

    fn role_to_db(role: MessageRole) -> &'static str {
        match role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    fn role_from_db(role: &str) -> MessageRole {
        match role.to_lowercase().as_str() {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }

    /// Load a session's history, empty if none exists yet.
    pub async fn load(&self, session_id: Uuid) -> Result<ConversationHistory> {
        match &self.backend {
            Backend::InMemory { histories } => {
                let locked = histories.read().await;
                Ok(locked
                    .get(&session_id)
                    .cloned()
                    .unwrap_or_else(|| ConversationHistory::new(session_id)))
            }
            Backend::Sqlite { pool, .. } => {
                self.ensure_schema().await?;

                let rows = sqlx::query(
                    r#"
                    SELECT message_id, role, content, created_at
                    FROM conversation_messages
                    WHERE session_id = ?
                    ORDER BY created_at ASC
                    "#,
                )
                .bind(session_id.to_string())
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AssistantError::Database(format!("Failed to load session history: {}", e))
                })?;

                let mut history = ConversationHistory::new(session_id);
                for row in rows {
                    let db_role: String =
                        row.try_get("role").unwrap_or_else(|_| "user".to_string());
                    let raw_id: String = row.try_get("message_id").unwrap_or_default();
                    let raw_stamp: String = row.try_get("created_at").unwrap_or_default();

                    history.add_message(ConversationMessage {
                        message_id: Uuid::parse_str(&raw_id).unwrap_or_else(|_| Uuid::new_v4()),
                        timestamp: raw_stamp
                            .parse()
                            .unwrap_or_else(|_| chrono::Utc::now()),
                        role: Self::role_from_db(&db_role),
                        content: row.try_get("content").unwrap_or_default(),
                    });
                }

                Ok(history)
            }
        }
    }

    /// Append one message to a session.
    pub async fn append(&self, session_id: Uuid, message: &ConversationMessage) -> Result<()> {
        match &self.backend {
            Backend::InMemory { histories } => {
                let mut locked = histories.write().await;
                locked
                    .entry(session_id)
                    .or_insert_with(|| ConversationHistory::new(session_id))
                    .add_message(message.clone());
                Ok(())
            }
            Backend::Sqlite { pool, .. } => {
                self.ensure_schema().await?;

                sqlx::query(
                    r#"
                    INSERT INTO conversation_messages
                      (message_id, session_id, role, content, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(message.message_id.to_string())
                .bind(session_id.to_string())
                .bind(Self::role_to_db(message.role))
                .bind(&message.content)
                .bind(message.timestamp.to_rfc3339())
                .execute(pool)
                .await
                .map_err(|e| {
                    AssistantError::Database(format!("Failed to append session message: {}", e))
                })?;

                Ok(())
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = SessionStore::in_memory();
        let session = Uuid::new_v4();

        store
            .append(
                session,
                &ConversationMessage::new(MessageRole::User, "hello".to_string()),
            )
            .await
            .unwrap();
        store
            .append(
                session,
                &ConversationMessage::new(MessageRole::Assistant, "hi!".to_string()),
            )
            .await
            .unwrap();

        let history = store.load(session).await.unwrap();
        assert_eq!(history.message_count(), 2);

        // Other sessions are empty.
        let other = store.load(Uuid::new_v4()).await.unwrap();
        assert_eq!(other.message_count(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::sqlite(dir.path().join("sessions.db"));
        let session = Uuid::new_v4();

        store
            .append(
                session,
                &ConversationMessage::new(MessageRole::User, "first".to_string()),
            )
            .await
            .unwrap();
        store
            .append(
                session,
                &ConversationMessage::new(MessageRole::Assistant, "second".to_string()),
            )
            .await
            .unwrap();

        let history = store.load(session).await.unwrap();
        assert_eq!(history.message_count(), 2);
        let contents: Vec<&str> = history.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }
}
