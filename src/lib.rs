//! Personal Assistant Orchestrator
//!
//! Routes natural-language requests to domain trackers and relays their
//! responses:
//! - Expense ledger: categories, budgets, threshold warnings
//! - Academic tracker: assignments, exams, deadline arithmetic
//! - Project tracker: milestones, features, progress notes
//! - Email session manager: OAuth token lifecycle, importance filtering
//!
//! TURN FLOW:
//! REQUEST → CLASSIFY → TRACKER (tool-call step → typed operation) → RESPONSE

pub mod api;
pub mod classifier;
pub mod email;
pub mod error;
pub mod gemini;
pub mod general;
pub mod memory;
pub mod models;
pub mod router;
pub mod store;
pub mod toolcall;
pub mod trackers;

pub use error::{AssistantError, Result};

// Re-export common types
pub use classifier::{IntentClassifier, KeywordClassifier};
pub use models::*;
