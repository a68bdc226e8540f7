//! Mail provider boundary
//!
//! Consumed operations: list unread, search by query, fetch full message.
//! Every call requires a valid access token; a rejected token surfaces as
//! `TokenExpired` so the session manager can run its silent refresh path.

use crate::error::AssistantError;
use crate::models::{AccountToken, EmailMessage};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn list_unread(
        &self,
        token: &AccountToken,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>>;

    async fn list_recent(
        &self,
        token: &AccountToken,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>>;

    /// Provider-side search; the query matches subject, sender, body and
    /// date ranges using the provider's own syntax.
    async fn search(
        &self,
        token: &AccountToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>>;

    async fn fetch_message(&self, token: &AccountToken, id: &str) -> Result<EmailMessage>;
}

/// Gmail-style REST provider over a pooled HTTP client.
pub struct HttpMailProvider {
    client: Client,
    base_url: String,
}

impl HttpMailProvider {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            env::var("MAIL_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    async fn get_json(
        &self,
        token: &AccountToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token.access_secret)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                AssistantError::Provider(format!("Mail provider request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AssistantError::TokenExpired(
                "provider rejected the access token".to_string(),
            ));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::Provider(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(AssistantError::Provider(format!(
                "Mail provider returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }

    /// List message ids matching `query`, then fetch each in provider
    /// order.
    async fn list_messages(
        &self,
        token: &AccountToken,
        query: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>> {
        let mut params = vec![("maxResults", max_results.to_string())];
        if let Some(q) = query {
            params.push(("q", q.to_string()));
        }

        let listing = self
            .get_json(token, "/users/me/messages", &params)
            .await?;

        let ids: Vec<String> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.fetch_message(token, &id).await?);
        }
        Ok(results)
    }
}

#[async_trait]
impl MailProvider for HttpMailProvider {
    async fn list_unread(
        &self,
        token: &AccountToken,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>> {
        self.list_messages(token, Some("is:unread"), max_results).await
    }

    async fn list_recent(
        &self,
        token: &AccountToken,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>> {
        self.list_messages(token, None, max_results).await
    }

    async fn search(
        &self,
        token: &AccountToken,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EmailMessage>> {
        self.list_messages(token, Some(query), max_results).await
    }

    async fn fetch_message(&self, token: &AccountToken, id: &str) -> Result<EmailMessage> {
        let params = vec![
            ("format", "metadata".to_string()),
            ("metadataHeaders", "Subject".to_string()),
            ("metadataHeaders", "From".to_string()),
            ("metadataHeaders", "Date".to_string()),
        ];
        let raw = self
            .get_json(token, &format!("/users/me/messages/{}", id), &params)
            .await?;
        Ok(parse_message(id, &raw))
    }
}

/// Normalize a provider message payload into an `EmailMessage`.
fn parse_message(id: &str, raw: &Value) -> EmailMessage {
    let headers = raw.pointer("/payload/headers").and_then(Value::as_array);

    let header = |name: &str| -> String {
        headers
            .and_then(|hs| {
                hs.iter().find(|h| {
                    h.get("name")
                        .and_then(Value::as_str)
                        .map(|n| n.eq_ignore_ascii_case(name))
                        .unwrap_or(false)
                })
            })
            .and_then(|h| h.get("value"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    let unread = raw
        .get("labelIds")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(Value::as_str)
                .any(|l| l == "UNREAD")
        })
        .unwrap_or(false);

    EmailMessage {
        id: id.to_string(),
        subject: header("Subject"),
        sender: header("From"),
        date: header("Date"),
        snippet: raw
            .get("snippet")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        unread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message() {
        let raw = json!({
            "snippet": "Your PS4 deadline is Friday",
            "labelIds": ["INBOX", "UNREAD"],
            "payload": {
                "headers": [
                    {"name": "Subject", "value": "COMP305 assignment"},
                    {"name": "From", "value": "prof@uni.edu"},
                    {"name": "Date", "value": "Mon, 3 Mar 2025 10:00:00 +0300"}
                ]
            }
        });

        let message = parse_message("abc123", &raw);
        assert_eq!(message.id, "abc123");
        assert_eq!(message.subject, "COMP305 assignment");
        assert_eq!(message.sender, "prof@uni.edu");
        assert!(message.unread);
        assert!(message.snippet.contains("deadline"));
    }

    #[test]
    fn test_parse_message_missing_fields() {
        let raw = json!({"payload": {}});
        let message = parse_message("x", &raw);
        assert_eq!(message.subject, "");
        assert!(!message.unread);
    }
}
