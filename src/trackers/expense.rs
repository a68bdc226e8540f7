//! Expense ledger
//!
//! Records expenses per category and evaluates spending against budgets.
//! Budget `spent` is maintained in lock-step with the recorded expenses;
//! exceeding a limit warns in the confirmation but never blocks recording.

use crate::error::AssistantError;
use crate::models::{category_key, Budget, BudgetBook, Domain, ExpenseBook, ExpenseRecord};
use crate::store::JsonStore;
use crate::toolcall::{
    ensure_object, optional_date, optional_str, require_f64, require_str, ParamKind,
    ToolInvocation, ToolParam, ToolPlan, ToolPlanner, ToolSpec,
};
use crate::trackers::{today, Tracker};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

const EXPENSES: &str = "expenses";
const BUDGETS: &str = "budgets";

const SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "add_expense",
        description: "Record an expense in a category",
        params: &[
            ToolParam {
                name: "category",
                kind: ParamKind::String,
                required: true,
                description: "Expense category, e.g. coffee, food, transport",
            },
            ToolParam {
                name: "amount",
                kind: ParamKind::Number,
                required: true,
                description: "Amount spent in TL",
            },
            ToolParam {
                name: "date",
                kind: ParamKind::Date,
                required: false,
                description: "Date of the expense, defaults to today",
            },
        ],
    },
    ToolSpec {
        name: "get_expenses",
        description: "List recorded expenses, optionally for one category",
        params: &[ToolParam {
            name: "category",
            kind: ParamKind::String,
            required: false,
            description: "Category to filter by",
        }],
    },
    ToolSpec {
        name: "set_budget",
        description: "Create or overwrite the spending limit for a category",
        params: &[
            ToolParam {
                name: "category",
                kind: ParamKind::String,
                required: true,
                description: "Budget category",
            },
            ToolParam {
                name: "limit",
                kind: ParamKind::Number,
                required: true,
                description: "Spending limit in TL",
            },
        ],
    },
    ToolSpec {
        name: "get_category_total",
        description: "Total amount recorded for a category",
        params: &[ToolParam {
            name: "category",
            kind: ParamKind::String,
            required: true,
            description: "Category to total",
        }],
    },
    ToolSpec {
        name: "get_budgets",
        description: "Show all budgets with limits and spending",
        params: &[],
    },
    ToolSpec {
        name: "get_budget",
        description: "Show one category's budget status",
        params: &[ToolParam {
            name: "category",
            kind: ParamKind::String,
            required: true,
            description: "Budget category",
        }],
    },
];

pub struct ExpenseLedger {
    store: Arc<JsonStore>,
    planner: Arc<dyn ToolPlanner>,
}

impl ExpenseLedger {
    pub fn new(store: Arc<JsonStore>, planner: Arc<dyn ToolPlanner>) -> Self {
        Self { store, planner }
    }

    /// Record an expense. Rejects non-positive amounts; bumps the matching
    /// budget's `spent` and appends a warning clause when the limit is
    /// exceeded.
    pub fn add_expense(
        &self,
        category: &str,
        amount: f64,
        date: Option<NaiveDate>,
    ) -> Result<String> {
        if !(amount > 0.0) {
            return Err(AssistantError::Validation(format!(
                "Expense amount must be positive, got {}",
                amount
            )));
        }

        let key = category_key(category);
        if key.is_empty() {
            return Err(AssistantError::Validation(
                "Expense category must not be empty".to_string(),
            ));
        }
        let date = date.unwrap_or_else(today);

        self.store.update(EXPENSES, |book: &mut ExpenseBook| {
            book.entry(key.clone())
                .or_default()
                .push(ExpenseRecord { date, amount });
            Ok(())
        })?;

        // Budget bookkeeping only when a budget exists for the category.
        let budget_status = self.store.update(BUDGETS, |budgets: &mut BudgetBook| {
            Ok(budgets.get_mut(&key).map(|budget| {
                budget.spent += amount;
                budget.clone()
            }))
        })?;

        info!(category = %key, amount, date = %date, "Expense recorded");

        let mut message = format!("Expense of {:.2} TL added to '{}' on {}.", amount, key, date);
        if let Some(budget) = budget_status {
            if budget.spent > budget.limit {
                message.push_str(&format!(
                    " Warning: over budget, {:.2} TL spent of {:.2} TL limit ({:.2} TL over).",
                    budget.spent,
                    budget.limit,
                    budget.spent - budget.limit
                ));
            } else {
                message.push_str(&format!(
                    " Budget: {:.2}/{:.2} TL ({:.2} TL remaining).",
                    budget.spent,
                    budget.limit,
                    budget.limit - budget.spent
                ));
            }
        }

        Ok(message)
    }

    /// All records, or one category's records in insertion order.
    pub fn get_expenses(&self, category: Option<&str>) -> Result<ExpenseBook> {
        let book: ExpenseBook = self.store.load(EXPENSES)?;
        match category {
            None => Ok(book),
            Some(raw) => {
                let key = category_key(raw);
                Ok(book.into_iter().filter(|(k, _)| *k == key).collect())
            }
        }
    }

    /// Create or overwrite a category's budget. Creating seeds `spent`
    /// from the recorded expense sum; overwriting keeps `spent`.
    pub fn set_budget(&self, category: &str, limit: f64) -> Result<String> {
        if !(limit > 0.0) {
            return Err(AssistantError::Validation(format!(
                "Budget limit must be positive, got {}",
                limit
            )));
        }

        let key = category_key(category);
        if key.is_empty() {
            return Err(AssistantError::Validation(
                "Budget category must not be empty".to_string(),
            ));
        }

        let spent_seed = self.get_category_total(&key)?;

        let (spent, created) = self.store.update(BUDGETS, |budgets: &mut BudgetBook| {
            match budgets.get_mut(&key) {
                Some(existing) => {
                    existing.limit = limit;
                    Ok((existing.spent, false))
                }
                None => {
                    budgets.insert(
                        key.clone(),
                        Budget {
                            limit,
                            spent: spent_seed,
                        },
                    );
                    Ok((spent_seed, true))
                }
            }
        })?;

        info!(category = %key, limit, "Budget set");

        if created && spent > 0.0 {
            Ok(format!(
                "Budget for '{}' set to {:.2} TL. Already spent: {:.2} TL ({:.2} TL remaining).",
                key,
                limit,
                spent,
                limit - spent
            ))
        } else if created {
            Ok(format!("Budget for '{}' set to {:.2} TL.", key, limit))
        } else {
            Ok(format!(
                "Budget for '{}' limit changed to {:.2} TL ({:.2} TL already spent).",
                key, limit, spent
            ))
        }
    }

    /// Authoritative total for a category: the sum over its records.
    pub fn get_category_total(&self, category: &str) -> Result<f64> {
        let book: ExpenseBook = self.store.load(EXPENSES)?;
        let key = category_key(category);
        Ok(book
            .get(&key)
            .map(|records| records.iter().map(|r| r.amount).sum())
            .unwrap_or(0.0))
    }

    pub fn get_budgets(&self) -> Result<BudgetBook> {
        self.store.load(BUDGETS)
    }

    fn render_expenses(&self, category: Option<&str>) -> Result<String> {
        let book = self.get_expenses(category)?;
        if book.is_empty() {
            return Ok(match category {
                Some(raw) => format!("No expenses recorded for '{}'.", category_key(raw)),
                None => "No expenses recorded.".to_string(),
            });
        }

        let mut out = String::new();
        for (key, records) in &book {
            let total: f64 = records.iter().map(|r| r.amount).sum();
            out.push_str(&format!("{} ({:.2} TL total):\n", key, total));
            for record in records {
                out.push_str(&format!("  {}  {:.2} TL\n", record.date, record.amount));
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn render_budgets(&self, category: Option<&str>) -> Result<String> {
        let budgets = self.get_budgets()?;
        match category {
            Some(raw) => {
                let key = category_key(raw);
                let budget = budgets.get(&key).ok_or_else(|| {
                    AssistantError::NotFound(format!("No budget for category '{}'", key))
                })?;
                Ok(format!(
                    "Budget '{}': {:.2}/{:.2} TL spent ({:.2} TL remaining).",
                    key,
                    budget.spent,
                    budget.limit,
                    budget.limit - budget.spent
                ))
            }
            None => {
                if budgets.is_empty() {
                    return Ok("No budgets set.".to_string());
                }
                let mut out = String::new();
                for (key, budget) in &budgets {
                    out.push_str(&format!(
                        "{}: {:.2}/{:.2} TL spent ({:.2} TL remaining)\n",
                        key,
                        budget.spent,
                        budget.limit,
                        budget.limit - budget.spent
                    ));
                }
                Ok(out.trim_end().to_string())
            }
        }
    }

    fn dispatch(&self, inv: &ToolInvocation) -> Result<String> {
        let args = &inv.arguments;
        ensure_object(args)?;

        match inv.name.as_str() {
            "add_expense" => {
                let category = require_str(args, "category")?;
                let amount = require_f64(args, "amount")?;
                let date = optional_date(args, "date")?;
                self.add_expense(&category, amount, date)
            }
            "get_expenses" => self.render_expenses(optional_str(args, "category").as_deref()),
            "set_budget" => {
                let category = require_str(args, "category")?;
                let limit = require_f64(args, "limit")?;
                self.set_budget(&category, limit)
            }
            "get_category_total" => {
                let category = require_str(args, "category")?;
                let key = category_key(&category);
                let total = self.get_category_total(&key)?;
                let count = self
                    .get_expenses(Some(key.as_str()))?
                    .values()
                    .map(Vec::len)
                    .sum::<usize>();
                Ok(format!(
                    "Category '{}': {} expense(s) totaling {:.2} TL.",
                    key, count, total
                ))
            }
            "get_budgets" => self.render_budgets(None),
            "get_budget" => {
                let category = require_str(args, "category")?;
                self.render_budgets(Some(category.as_str()))
            }
            other => Err(AssistantError::Validation(format!(
                "Unknown expense operation '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl Tracker for ExpenseLedger {
    fn domain(&self) -> Domain {
        Domain::Expense
    }

    fn tool_specs(&self) -> &'static [ToolSpec] {
        SPECS
    }

    async fn handle(&self, request: &str) -> Result<String> {
        match self.planner.plan(request, SPECS).await? {
            ToolPlan::Answer(text) => Ok(text),
            ToolPlan::Call(inv) => self.dispatch(&inv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trackers::testing::ScriptedPlanner;
    use serde_json::json;

    fn ledger() -> (tempfile::TempDir, ExpenseLedger) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()).unwrap());
        let planner = Arc::new(ScriptedPlanner {
            plan: ToolPlan::Answer("unused".into()),
        });
        (dir, ExpenseLedger::new(store, planner))
    }

    #[test]
    fn test_category_total_equals_sum_of_adds() {
        let (_dir, ledger) = ledger();
        ledger.add_expense("coffee", 60.0, None).unwrap();
        ledger.add_expense("coffee", 50.0, None).unwrap();
        ledger.add_expense("food", 25.0, None).unwrap();

        assert_eq!(ledger.get_category_total("coffee").unwrap(), 110.0);
        assert_eq!(ledger.get_category_total("food").unwrap(), 25.0);
        assert_eq!(ledger.get_category_total("transport").unwrap(), 0.0);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let (_dir, ledger) = ledger();
        assert!(matches!(
            ledger.add_expense("coffee", 0.0, None),
            Err(AssistantError::Validation(_))
        ));
        assert!(matches!(
            ledger.add_expense("coffee", -5.0, None),
            Err(AssistantError::Validation(_))
        ));
        assert_eq!(ledger.get_category_total("coffee").unwrap(), 0.0);
    }

    #[test]
    fn test_over_budget_warning_scenario() {
        let (_dir, ledger) = ledger();
        ledger.set_budget("coffee", 100.0).unwrap();

        let first = ledger.add_expense("coffee", 60.0, None).unwrap();
        assert!(!first.contains("Warning"), "unexpected warning: {}", first);

        let second = ledger.add_expense("coffee", 50.0, None).unwrap();
        assert!(second.contains("Warning"), "missing warning: {}", second);
        assert!(second.contains("110.00"));
        assert!(second.contains("100.00"));
    }

    #[test]
    fn test_no_budget_no_warning() {
        let (_dir, ledger) = ledger();
        let msg = ledger.add_expense("coffee", 500.0, None).unwrap();
        assert!(!msg.contains("Warning"));
        assert!(!msg.contains("Budget"));
    }

    #[test]
    fn test_budget_seeds_spent_from_existing_records() {
        let (_dir, ledger) = ledger();
        ledger.add_expense("food", 30.0, None).unwrap();

        let msg = ledger.set_budget("food", 100.0).unwrap();
        assert!(msg.contains("30.00"));

        let budgets = ledger.get_budgets().unwrap();
        assert_eq!(budgets.get("FOOD").unwrap().spent, 30.0);

        // Overwriting the limit keeps spent intact.
        ledger.set_budget("food", 50.0).unwrap();
        let budgets = ledger.get_budgets().unwrap();
        assert_eq!(budgets.get("FOOD").unwrap().spent, 30.0);
        assert_eq!(budgets.get("FOOD").unwrap().limit, 50.0);
    }

    #[test]
    fn test_spent_matches_record_sum_invariant() {
        let (_dir, ledger) = ledger();
        ledger.set_budget("coffee", 200.0).unwrap();
        ledger.add_expense("coffee", 60.0, None).unwrap();
        ledger.add_expense("coffee", 50.0, None).unwrap();

        let budgets = ledger.get_budgets().unwrap();
        assert_eq!(
            budgets.get("COFFEE").unwrap().spent,
            ledger.get_category_total("coffee").unwrap()
        );
    }

    #[test]
    fn test_insertion_order_preserved() {
        let (_dir, ledger) = ledger();
        let d1 = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        ledger.add_expense("coffee", 10.0, Some(d1)).unwrap();
        ledger.add_expense("coffee", 20.0, Some(d2)).unwrap();

        let book = ledger.get_expenses(Some("coffee")).unwrap();
        let records = book.get("COFFEE").unwrap();
        // Insertion order, not date order.
        assert_eq!(records[0].date, d1);
        assert_eq!(records[1].date, d2);
    }

    #[test]
    fn test_dispatch_validates_arguments() {
        let (_dir, ledger) = ledger();

        let missing_amount = ledger.dispatch(&ToolInvocation {
            name: "add_expense".into(),
            arguments: json!({"category": "coffee"}),
        });
        assert!(matches!(missing_amount, Err(AssistantError::Validation(_))));

        let unknown = ledger.dispatch(&ToolInvocation {
            name: "remove_expense".into(),
            arguments: json!({}),
        });
        assert!(matches!(unknown, Err(AssistantError::Validation(_))));

        // Numeric strings from the planner are tolerated.
        let ok = ledger
            .dispatch(&ToolInvocation {
                name: "add_expense".into(),
                arguments: json!({"category": "coffee", "amount": "42.5"}),
            })
            .unwrap();
        assert!(ok.contains("42.50"));
    }

    #[tokio::test]
    async fn test_handle_runs_planned_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()).unwrap());
        let planner = Arc::new(ScriptedPlanner {
            plan: ToolPlan::Call(ToolInvocation {
                name: "add_expense".into(),
                arguments: json!({"category": "coffee", "amount": 50}),
            }),
        });
        let ledger = ExpenseLedger::new(store, planner);

        let response = ledger.handle("Add 50 TL for coffee").await.unwrap();
        assert!(response.contains("50.00"));
        assert_eq!(ledger.get_category_total("coffee").unwrap(), 50.0);
    }
}
