//! Domain trackers
//!
//! Each tracker owns one business domain's persisted state and operations.
//! Trackers never call each other; the router is the only component that
//! knows which tracker owns which intent. A tracker's entry point takes
//! the verbatim request text, runs the classifier-assisted tool-call step
//! and dispatches to its typed operations.

use crate::models::Domain;
use crate::toolcall::ToolSpec;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod academic;
pub mod expense;
pub mod project;

pub use academic::AcademicTracker;
pub use expense::ExpenseLedger;
pub use project::ProjectTracker;

#[async_trait]
pub trait Tracker: Send + Sync {
    fn domain(&self) -> Domain;
    fn tool_specs(&self) -> &'static [ToolSpec];
    /// Handle a verbatim user request for this domain.
    async fn handle(&self, request: &str) -> Result<String>;
}

/// Calendar date for "now". All deadline arithmetic is date-only.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Signed day count until `target`: 0 means due today, negative is overdue.
pub fn days_until(target: NaiveDate, today: NaiveDate) -> i64 {
    (target - today).num_days()
}

/// Human phrasing for a signed day count.
pub(crate) fn deadline_phrase(days: i64) -> String {
    match days {
        0 => "due today".to_string(),
        1 => "1 day left".to_string(),
        d if d > 1 => format!("{} days left", d),
        -1 => "overdue by 1 day".to_string(),
        d => format!("overdue by {} days", -d),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared test doubles for tracker entry points.

    use crate::toolcall::{ToolPlan, ToolPlanner, ToolSpec};
    use crate::Result;
    use async_trait::async_trait;

    /// Planner that always emits a pre-scripted plan.
    pub struct ScriptedPlanner {
        pub plan: ToolPlan,
    }

    #[async_trait]
    impl ToolPlanner for ScriptedPlanner {
        async fn plan(&self, _request: &str, _specs: &[ToolSpec]) -> Result<ToolPlan> {
            Ok(self.plan.clone())
        }
    }
}
