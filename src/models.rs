//! Core data models for the personal assistant

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

//
// ================= Routing =================
//

/// The five routing targets the intent classifier can emit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Expense,
    Academic,
    Project,
    Email,
    General,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Expense => "expense",
            Domain::Academic => "academic",
            Domain::Project => "project",
            Domain::Email => "email",
            Domain::General => "general",
        };
        write!(f, "{}", s)
    }
}

/// Transient routing outcome: where a request goes and the verbatim text
/// forwarded there. Never persisted.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub target: Domain,
    pub payload: String,
}

//
// ================= Expense Ledger =================
//

/// A single recorded expense. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseRecord {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Spending limit for one category. `spent` is maintained only through
/// ledger operations and always equals the sum of the category's records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub limit: f64,
    pub spent: f64,
}

/// Expenses grouped by upper-cased category, insertion order per category.
pub type ExpenseBook = BTreeMap<String, Vec<ExpenseRecord>>;

/// One budget per category key.
pub type BudgetBook = BTreeMap<String, Budget>;

//
// ================= Academic Tracker =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub deadline: NaiveDate,
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exam {
    pub date: NaiveDate,
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<NaiveDate>,
    #[serde(default)]
    pub grade: Option<f64>,
}

/// Keyed `course -> context -> record`; both keys upper-cased.
pub type AssignmentBook = BTreeMap<String, BTreeMap<String, Assignment>>;
pub type ExamBook = BTreeMap<String, BTreeMap<String, Exam>>;

//
// ================= Project Tracker =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Completed,
    OnHold,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub name: String,
    pub status: MilestoneStatus,
    #[serde(default)]
    pub completed_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectNote {
    pub date: NaiveDate,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub created_date: NaiveDate,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub features: BTreeSet<String>,
    #[serde(default)]
    pub challenges: BTreeSet<String>,
    #[serde(default)]
    pub tech_stack: BTreeSet<String>,
    #[serde(default)]
    pub links: BTreeSet<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub notes: Vec<ProjectNote>,
}

impl Project {
    pub fn new(name: String, description: String, created_date: NaiveDate) -> Self {
        Self {
            name,
            description,
            status: ProjectStatus::InProgress,
            created_date,
            milestones: Vec::new(),
            features: BTreeSet::new(),
            challenges: BTreeSet::new(),
            tech_stack: BTreeSet::new(),
            links: BTreeSet::new(),
            next_steps: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// Keyed by upper-snake project key derived from the name.
pub type ProjectBook = BTreeMap<String, Project>;

//
// ================= Email =================
//

/// Persisted OAuth credential for one account. The access secret is an
/// opaque blob to everything outside the authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountToken {
    pub access_secret: String,
    #[serde(default)]
    pub refresh_secret: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl AccountToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// Normalized message record produced by the mail provider boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub snippet: String,
    pub unread: bool,
}

//
// ================= Key Normalization =================
//

/// Canonical key for categories, courses and assignment/exam contexts.
pub fn category_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Canonical key for project names: upper-case with underscores.
pub fn project_key(name: &str) -> String {
    name.trim().to_uppercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        assert_eq!(category_key("  coffee "), "COFFEE");
        assert_eq!(category_key("Food"), "FOOD");
        assert_eq!(project_key("Personal Assistant"), "PERSONAL_ASSISTANT");
        assert_eq!(project_key(" side project "), "SIDE_PROJECT");
    }

    #[test]
    fn test_project_defaults() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let p = Project::new("Demo".into(), "A demo".into(), date);
        assert_eq!(p.status, ProjectStatus::InProgress);
        assert!(p.milestones.is_empty());
        assert!(p.features.is_empty());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ProjectStatus::OnHold).unwrap();
        assert_eq!(json, "\"on_hold\"");
        let back: ProjectStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(back, ProjectStatus::InProgress);
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let token = AccountToken {
            access_secret: "blob".into(),
            refresh_secret: None,
            expiry: now - chrono::Duration::seconds(1),
        };
        assert!(token.is_expired(now));
    }
}
