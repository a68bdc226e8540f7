//! Tool-call boundary between trackers and the classifier collaborator
//!
//! Each tracker describes its operations as named functions with a fixed
//! argument schema. The planner's only contract is to emit either a
//! structured call (operation name + arguments) or a natural-language
//! final answer; trackers validate every argument themselves and never
//! trust planner-supplied types blindly.

use crate::error::AssistantError;
use crate::gemini::GeminiClient;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

//
// ================= Operation Schemas =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Date,
}

impl ParamKind {
    fn label(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Date => "date (YYYY-MM-DD)",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolParam {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ToolParam],
}

/// A structured operation call emitted by the planner.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

/// Planner outcome: either an operation to run or a direct answer.
#[derive(Debug, Clone)]
pub enum ToolPlan {
    Call(ToolInvocation),
    Answer(String),
}

#[async_trait]
pub trait ToolPlanner: Send + Sync {
    /// Map a free-text request onto one of the tracker's operations.
    async fn plan(&self, request: &str, specs: &[ToolSpec]) -> Result<ToolPlan>;
}

//
// ================= Gemini-backed Planner =================
//

pub struct GeminiToolPlanner {
    client: GeminiClient,
}

impl GeminiToolPlanner {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    fn build_system_prompt(specs: &[ToolSpec], today: NaiveDate) -> String {
        let mut prompt = format!(
            "You extract one operation call from a user request.\n\
             CURRENT DATE: {}\n\nOperations:\n",
            today.format("%Y-%m-%d")
        );

        for spec in specs {
            prompt.push_str(&format!("- {}: {}\n", spec.name, spec.description));
            for param in spec.params {
                prompt.push_str(&format!(
                    "    {} ({}, {})\n",
                    param.name,
                    param.kind.label(),
                    if param.required { "required" } else { "optional" },
                ));
            }
        }

        prompt.push_str(
            "\nRules:\n\
             - Resolve relative dates (today, tomorrow) against CURRENT DATE.\n\
             - If the request maps to an operation, reply ONLY with JSON:\n\
               {\"tool\": \"<name>\", \"arguments\": {...}}\n\
             - If a required argument is missing from the request, or nothing \
             fits, reply ONLY with JSON: {\"answer\": \"<ask or explain>\"}\n\
             - No explanation text outside the JSON.",
        );

        prompt
    }
}

#[async_trait]
impl ToolPlanner for GeminiToolPlanner {
    async fn plan(&self, request: &str, specs: &[ToolSpec]) -> Result<ToolPlan> {
        let today = chrono::Local::now().date_naive();
        let system = Self::build_system_prompt(specs, today);
        let response = self.client.generate(&system, request).await?;
        parse_plan_response(&response)
    }
}

/// Parse the planner's JSON reply, tolerating markdown fences.
pub fn parse_plan_response(response: &str) -> Result<ToolPlan> {
    let cleaned = strip_code_fence(response);

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        AssistantError::Llm(format!(
            "Failed to parse planner response: {} | raw={}",
            e, response
        ))
    })?;

    if let Some(answer) = json.get("answer").and_then(Value::as_str) {
        return Ok(ToolPlan::Answer(answer.to_string()));
    }

    let name = json
        .get("tool")
        .and_then(Value::as_str)
        .ok_or_else(|| AssistantError::Llm("Planner response has no 'tool' or 'answer'".into()))?
        .to_string();

    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Ok(ToolPlan::Call(ToolInvocation { name, arguments }))
}

fn strip_code_fence(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

//
// ================= Argument Validation =================
//

pub fn ensure_object(args: &Value) -> Result<()> {
    if args.is_object() {
        Ok(())
    } else {
        Err(AssistantError::Validation(
            "arguments must be a JSON object".to_string(),
        ))
    }
}

pub fn require_str(args: &Value, name: &str) -> Result<String> {
    optional_str(args, name).ok_or_else(|| {
        AssistantError::Validation(format!("Missing required argument '{}'", name))
    })
}

pub fn optional_str(args: &Value, name: &str) -> Option<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers may arrive as JSON numbers or numeric strings; accept both.
pub fn require_f64(args: &Value, name: &str) -> Result<f64> {
    optional_f64(args, name)?.ok_or_else(|| {
        AssistantError::Validation(format!("Missing required argument '{}'", name))
    })
}

pub fn optional_f64(args: &Value, name: &str) -> Result<Option<f64>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            if let Some(n) = value.as_f64() {
                return Ok(Some(n));
            }
            if let Some(s) = value.as_str() {
                if let Ok(n) = s.trim().parse::<f64>() {
                    return Ok(Some(n));
                }
            }
            Err(AssistantError::Validation(format!(
                "Argument '{}' must be a number",
                name
            )))
        }
    }
}

pub fn bool_or(args: &Value, name: &str, default: bool) -> bool {
    match args.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => default,
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AssistantError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

pub fn require_date(args: &Value, name: &str) -> Result<NaiveDate> {
    let raw = require_str(args, name)?;
    parse_date(&raw)
}

pub fn optional_date(args: &Value, name: &str) -> Result<Option<NaiveDate>> {
    match optional_str(args, name) {
        Some(raw) => parse_date(&raw).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_call_response() {
        let plan = parse_plan_response(
            r#"{"tool": "add_expense", "arguments": {"category": "coffee", "amount": 50}}"#,
        )
        .unwrap();
        match plan {
            ToolPlan::Call(inv) => {
                assert_eq!(inv.name, "add_expense");
                assert_eq!(inv.arguments["amount"], json!(50));
            }
            ToolPlan::Answer(_) => panic!("expected a call"),
        }
    }

    #[test]
    fn test_parse_fenced_answer_response() {
        let plan = parse_plan_response(
            "```json\n{\"answer\": \"Which category is that expense for?\"}\n```",
        )
        .unwrap();
        match plan {
            ToolPlan::Answer(text) => assert!(text.contains("category")),
            ToolPlan::Call(_) => panic!("expected an answer"),
        }
    }

    #[test]
    fn test_parse_garbage_response() {
        assert!(parse_plan_response("sure, adding that now!").is_err());
        assert!(parse_plan_response(r#"{"neither": true}"#).is_err());
    }

    #[test]
    fn test_require_str() {
        let args = json!({"category": "coffee", "blank": "  "});
        assert_eq!(require_str(&args, "category").unwrap(), "coffee");
        assert!(require_str(&args, "blank").is_err());
        assert!(require_str(&args, "missing").is_err());
    }

    #[test]
    fn test_numbers_from_strings() {
        let args = json!({"amount": "42.5", "count": 3, "bad": "abc"});
        assert_eq!(require_f64(&args, "amount").unwrap(), 42.5);
        assert_eq!(require_f64(&args, "count").unwrap(), 3.0);
        assert!(require_f64(&args, "bad").is_err());
        assert!(optional_f64(&args, "missing").unwrap().is_none());
    }

    #[test]
    fn test_dates() {
        let args = json!({"deadline": "2025-03-10", "bad": "10/03/2025"});
        assert_eq!(
            require_date(&args, "deadline").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
        assert!(require_date(&args, "bad").is_err());
        assert!(optional_date(&args, "missing").unwrap().is_none());
    }

    #[test]
    fn test_bool_or() {
        let args = json!({"show_completed": true, "as_text": "yes"});
        assert!(bool_or(&args, "show_completed", false));
        assert!(bool_or(&args, "as_text", false));
        assert!(!bool_or(&args, "missing", false));
    }
}
