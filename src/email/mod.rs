//! Email session manager
//!
//! Per-account OAuth token lifecycle and message operations. Each account
//! moves through {Disconnected, Connected, Expired}: expiry is detected
//! lazily (a stale expiry stamp or a provider rejection), recovered by a
//! silent refresh, and only then by the interactive handshake. Accounts
//! are fully independent; no state is shared between them.

use crate::error::AssistantError;
use crate::models::{AccountToken, Domain, EmailMessage};
use crate::toolcall::{
    ensure_object, require_str, ParamKind, ToolInvocation, ToolParam, ToolPlan, ToolPlanner,
    ToolSpec,
};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub mod auth;
pub mod provider;

pub use auth::{Authenticator, FileTokenStore, OAuthAuthenticator, TokenStore};
pub use provider::{HttpMailProvider, MailProvider};

/// A message is important when its subject or body carries one of these.
pub const IMPORTANCE_KEYWORDS: &[&str] = &["assignment", "deadline", "exam", "urgent", "due"];

const MAX_RESULTS: usize = 10;
const IMPORTANCE_SCAN_RESULTS: usize = 20;

const SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "connect_account",
        description: "Connect a mail account, authorizing if needed",
        params: &[ToolParam {
            name: "account_name",
            kind: ParamKind::String,
            required: true,
            description: "Account label, e.g. personal, school",
        }],
    },
    ToolSpec {
        name: "get_unread_emails",
        description: "List unread messages for a connected account",
        params: &[ToolParam {
            name: "account_name",
            kind: ParamKind::String,
            required: true,
            description: "Connected account label",
        }],
    },
    ToolSpec {
        name: "get_recent_emails",
        description: "List the most recent messages for a connected account",
        params: &[ToolParam {
            name: "account_name",
            kind: ParamKind::String,
            required: true,
            description: "Connected account label",
        }],
    },
    ToolSpec {
        name: "search_emails",
        description: "Search messages by subject, sender, body or date range",
        params: &[
            ToolParam {
                name: "account_name",
                kind: ParamKind::String,
                required: true,
                description: "Connected account label",
            },
            ToolParam {
                name: "query",
                kind: ParamKind::String,
                required: true,
                description: "Search query, e.g. from:prof@uni.edu",
            },
        ],
    },
    ToolSpec {
        name: "check_important_emails",
        description: "Unread messages mentioning assignments, deadlines, exams or urgency",
        params: &[ToolParam {
            name: "account_name",
            kind: ParamKind::String,
            required: true,
            description: "Connected account label",
        }],
    },
    ToolSpec {
        name: "list_accounts",
        description: "List known accounts and their connection state",
        params: &[],
    },
];

#[derive(Debug, Clone)]
enum SessionState {
    Disconnected,
    Connected(AccountToken),
    Expired(AccountToken),
}

impl SessionState {
    fn label(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected(_) => "connected",
            SessionState::Expired(_) => "expired",
        }
    }
}

fn is_important(message: &EmailMessage) -> bool {
    let subject = message.subject.to_lowercase();
    let body = message.snippet.to_lowercase();
    IMPORTANCE_KEYWORDS
        .iter()
        .any(|kw| subject.contains(kw) || body.contains(kw))
}

pub struct EmailSessionManager {
    sessions: Mutex<HashMap<String, SessionState>>,
    token_store: Arc<dyn TokenStore>,
    authenticator: Arc<dyn Authenticator>,
    provider: Arc<dyn MailProvider>,
    planner: Arc<dyn ToolPlanner>,
}

impl EmailSessionManager {
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        authenticator: Arc<dyn Authenticator>,
        provider: Arc<dyn MailProvider>,
        planner: Arc<dyn ToolPlanner>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            token_store,
            authenticator,
            provider,
            planner,
        }
    }

    async fn set_state(&self, account: &str, state: SessionState) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(account.to_string(), state);
    }

    async fn state_of(&self, account: &str) -> Option<SessionState> {
        let sessions = self.sessions.lock().await;
        sessions.get(account).cloned()
    }

    /// Connect an account: reuse a persisted token when valid, refresh a
    /// stale one silently, and only then fall back to the interactive
    /// handshake. On handshake failure the account stays Disconnected.
    pub async fn connect_account(&self, account: &str) -> Result<String> {
        let account = account.trim();
        if account.is_empty() {
            return Err(AssistantError::Validation(
                "Account name must not be empty".to_string(),
            ));
        }

        if let Some(SessionState::Connected(token)) = self.state_of(account).await {
            if !token.is_expired(Utc::now()) {
                return Ok(format!("Account '{}' is already connected.", account));
            }
        }

        match self.token_store.load(account)? {
            Some(stored) if !stored.is_expired(Utc::now()) => {
                info!(account = %account, "Loaded persisted token");
                self.set_state(account, SessionState::Connected(stored)).await;
            }
            Some(stored) => {
                // Persisted but stale: the silent path first.
                self.recover(account, stored).await?;
            }
            None => {
                let token = match self.authenticator.authorize_interactive(account).await {
                    Ok(token) => token,
                    Err(e) => {
                        self.set_state(account, SessionState::Disconnected).await;
                        return Err(e);
                    }
                };
                self.token_store.save(account, &token)?;
                self.set_state(account, SessionState::Connected(token)).await;
            }
        }

        Ok(format!("Account '{}' connected.", account))
    }

    /// Silent refresh, falling back to the interactive handshake. Both
    /// failing disconnects the account and reports Fatal for this
    /// operation only.
    async fn recover(&self, account: &str, stale: AccountToken) -> Result<AccountToken> {
        info!(account = %account, "Token expired, attempting silent refresh");

        let fresh = match self.authenticator.refresh(&stale).await {
            Ok(token) => token,
            Err(refresh_error) => {
                warn!(
                    account = %account,
                    error = %refresh_error,
                    "Silent refresh failed, falling back to interactive handshake"
                );
                match self.authenticator.authorize_interactive(account).await {
                    Ok(token) => token,
                    Err(auth_error) => {
                        self.set_state(account, SessionState::Disconnected).await;
                        let _ = self.token_store.delete(account);
                        return Err(AssistantError::Authorization(format!(
                            "Re-authorization for '{}' failed: {}",
                            account, auth_error
                        )));
                    }
                }
            }
        };

        self.token_store.save(account, &fresh)?;
        self.set_state(account, SessionState::Connected(fresh.clone()))
            .await;
        Ok(fresh)
    }

    /// A usable token for `account`, refreshing when the expiry stamp has
    /// already passed.
    async fn ensure_token(&self, account: &str) -> Result<AccountToken> {
        match self.state_of(account).await {
            None | Some(SessionState::Disconnected) => Err(AssistantError::Validation(format!(
                "Account '{}' is not connected. Connect it first.",
                account
            ))),
            Some(SessionState::Connected(token)) => {
                if token.is_expired(Utc::now()) {
                    self.set_state(account, SessionState::Expired(token.clone()))
                        .await;
                    self.recover(account, token).await
                } else {
                    Ok(token)
                }
            }
            Some(SessionState::Expired(token)) => self.recover(account, token).await,
        }
    }

    /// Run a provider call; on a token rejection, recover silently and
    /// retry exactly once.
    async fn with_token<T, F, Fut>(&self, account: &str, op: F) -> Result<T>
    where
        F: Fn(AccountToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.ensure_token(account).await?;
        match op(token.clone()).await {
            Err(AssistantError::TokenExpired(reason)) => {
                info!(account = %account, reason = %reason, "Provider reported an expired token");
                self.set_state(account, SessionState::Expired(token.clone()))
                    .await;
                let fresh = self.recover(account, token).await?;
                op(fresh).await
            }
            other => other,
        }
    }

    pub async fn get_unread_emails(&self, account: &str) -> Result<Vec<EmailMessage>> {
        let provider = Arc::clone(&self.provider);
        self.with_token(account, move |token| {
            let provider = Arc::clone(&provider);
            async move { provider.list_unread(&token, MAX_RESULTS).await }
        })
        .await
    }

    pub async fn get_recent_emails(&self, account: &str) -> Result<Vec<EmailMessage>> {
        let provider = Arc::clone(&self.provider);
        self.with_token(account, move |token| {
            let provider = Arc::clone(&provider);
            async move { provider.list_recent(&token, MAX_RESULTS).await }
        })
        .await
    }

    pub async fn search_emails(&self, account: &str, query: &str) -> Result<Vec<EmailMessage>> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(AssistantError::Validation(
                "Search query must not be empty".to_string(),
            ));
        }

        let provider = Arc::clone(&self.provider);
        self.with_token(account, move |token| {
            let provider = Arc::clone(&provider);
            let query = query.clone();
            async move { provider.search(&token, &query, MAX_RESULTS).await }
        })
        .await
    }

    /// Unread messages whose subject or body mentions any importance
    /// keyword, in provider-returned order.
    pub async fn check_important_emails(&self, account: &str) -> Result<Vec<EmailMessage>> {
        let provider = Arc::clone(&self.provider);
        let unread = self
            .with_token(account, move |token| {
                let provider = Arc::clone(&provider);
                async move { provider.list_unread(&token, IMPORTANCE_SCAN_RESULTS).await }
            })
            .await?;

        Ok(unread.into_iter().filter(is_important).collect())
    }

    pub async fn list_accounts(&self) -> Vec<(String, &'static str)> {
        let sessions = self.sessions.lock().await;
        let mut accounts: Vec<(String, &'static str)> = sessions
            .iter()
            .map(|(name, state)| (name.clone(), state.label()))
            .collect();
        accounts.sort();
        accounts
    }

    // =============================
    // Rendering
    // =============================

    fn render_messages(account: &str, kind: &str, messages: &[EmailMessage]) -> String {
        if messages.is_empty() {
            return format!("No {} emails in '{}'.", kind, account);
        }

        let mut out = format!("{} email(s) in '{}':\n", messages.len(), account);
        for (i, message) in messages.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} - {} ({})\n",
                i + 1,
                message.subject,
                message.sender,
                message.date
            ));
            if !message.snippet.is_empty() {
                out.push_str(&format!("   {}\n", message.snippet));
            }
        }
        out.trim_end().to_string()
    }

    async fn dispatch(&self, inv: &ToolInvocation) -> Result<String> {
        let args = &inv.arguments;
        ensure_object(args)?;

        match inv.name.as_str() {
            "connect_account" => {
                let account = require_str(args, "account_name")?;
                self.connect_account(&account).await
            }
            "get_unread_emails" => {
                let account = require_str(args, "account_name")?;
                let messages = self.get_unread_emails(&account).await?;
                Ok(Self::render_messages(&account, "unread", &messages))
            }
            "get_recent_emails" => {
                let account = require_str(args, "account_name")?;
                let messages = self.get_recent_emails(&account).await?;
                Ok(Self::render_messages(&account, "recent", &messages))
            }
            "search_emails" => {
                let account = require_str(args, "account_name")?;
                let query = require_str(args, "query")?;
                let messages = self.search_emails(&account, &query).await?;
                Ok(Self::render_messages(&account, "matching", &messages))
            }
            "check_important_emails" => {
                let account = require_str(args, "account_name")?;
                let messages = self.check_important_emails(&account).await?;
                Ok(Self::render_messages(&account, "important", &messages))
            }
            "list_accounts" => {
                let accounts = self.list_accounts().await;
                if accounts.is_empty() {
                    return Ok("No accounts known. Connect one first.".to_string());
                }
                let mut out = String::from("Accounts:\n");
                for (name, state) in accounts {
                    out.push_str(&format!("  {} ({})\n", name, state));
                }
                Ok(out.trim_end().to_string())
            }
            other => Err(AssistantError::Validation(format!(
                "Unknown email operation '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl crate::trackers::Tracker for EmailSessionManager {
    fn domain(&self) -> Domain {
        Domain::Email
    }

    fn tool_specs(&self) -> &'static [ToolSpec] {
        SPECS
    }

    async fn handle(&self, request: &str) -> Result<String> {
        match self.planner.plan(request, SPECS).await? {
            ToolPlan::Answer(text) => Ok(text),
            ToolPlan::Call(inv) => self.dispatch(&inv).await,
        }
    }
}
