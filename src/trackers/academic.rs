//! Academic tracker
//!
//! Assignments and exams keyed by (course, context), with date-only
//! deadline arithmetic. Items transition pending -> completed exactly
//! once; overdue items are never expired or deleted automatically.

use crate::error::AssistantError;
use crate::models::{category_key, Assignment, AssignmentBook, Domain, Exam, ExamBook};
use crate::store::JsonStore;
use crate::toolcall::{
    bool_or, ensure_object, require_date, require_f64, require_str, ParamKind, ToolInvocation,
    ToolParam, ToolPlan, ToolPlanner, ToolSpec,
};
use crate::trackers::{days_until, deadline_phrase, today, Tracker};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

const ASSIGNMENTS: &str = "assignments";
const EXAMS: &str = "exams";

const SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "set_assignment",
        description: "Add a new assignment for a course",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name, e.g. COMP305",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Assignment name: PS3, Homework 1, Project...",
            },
            ToolParam {
                name: "deadline",
                kind: ParamKind::Date,
                required: true,
                description: "Due date",
            },
        ],
    },
    ToolSpec {
        name: "get_assignments",
        description: "List assignments with days until their deadlines",
        params: &[ToolParam {
            name: "show_completed",
            kind: ParamKind::Boolean,
            required: false,
            description: "Show completed instead of pending ones",
        }],
    },
    ToolSpec {
        name: "complete_assignment",
        description: "Mark a pending assignment as completed",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Assignment name",
            },
        ],
    },
    ToolSpec {
        name: "update_assignment",
        description: "Change an assignment's deadline",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Assignment name",
            },
            ToolParam {
                name: "new_deadline",
                kind: ParamKind::Date,
                required: true,
                description: "New due date",
            },
        ],
    },
    ToolSpec {
        name: "remove_assignment",
        description: "Remove a cancelled assignment",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Assignment name",
            },
        ],
    },
    ToolSpec {
        name: "set_exam",
        description: "Add a new exam for a course",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Exam type: Midterm 1, Final...",
            },
            ToolParam {
                name: "date",
                kind: ParamKind::Date,
                required: true,
                description: "Exam date",
            },
        ],
    },
    ToolSpec {
        name: "get_exams",
        description: "List exams with days until their dates",
        params: &[ToolParam {
            name: "show_completed",
            kind: ParamKind::Boolean,
            required: false,
            description: "Show completed instead of pending ones",
        }],
    },
    ToolSpec {
        name: "complete_exam",
        description: "Mark a pending exam as taken",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Exam type",
            },
        ],
    },
    ToolSpec {
        name: "enter_grade",
        description: "Record the grade for an exam",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Exam type",
            },
            ToolParam {
                name: "grade",
                kind: ParamKind::Number,
                required: true,
                description: "Grade or score",
            },
        ],
    },
    ToolSpec {
        name: "update_exam",
        description: "Change an exam's date",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Exam type",
            },
            ToolParam {
                name: "new_date",
                kind: ParamKind::Date,
                required: true,
                description: "New exam date",
            },
        ],
    },
    ToolSpec {
        name: "remove_exam",
        description: "Remove a cancelled exam",
        params: &[
            ToolParam {
                name: "course",
                kind: ParamKind::String,
                required: true,
                description: "Course name",
            },
            ToolParam {
                name: "context",
                kind: ParamKind::String,
                required: true,
                description: "Exam type",
            },
        ],
    },
];

/// One assignment annotated with its deadline distance.
#[derive(Debug, Clone)]
pub struct AssignmentEntry {
    pub course: String,
    pub context: String,
    pub record: Assignment,
    pub days_left: i64,
}

/// One exam annotated with its date distance.
#[derive(Debug, Clone)]
pub struct ExamEntry {
    pub course: String,
    pub context: String,
    pub record: Exam,
    pub days_left: i64,
}

fn assignment_entries(
    book: &AssignmentBook,
    show_completed: bool,
    today: NaiveDate,
) -> Vec<AssignmentEntry> {
    let mut entries = Vec::new();
    for (course, contexts) in book {
        for (context, record) in contexts {
            if record.completed != show_completed {
                continue;
            }
            entries.push(AssignmentEntry {
                course: course.clone(),
                context: context.clone(),
                record: record.clone(),
                days_left: days_until(record.deadline, today),
            });
        }
    }
    entries
}

fn exam_entries(book: &ExamBook, show_completed: bool, today: NaiveDate) -> Vec<ExamEntry> {
    let mut entries = Vec::new();
    for (course, contexts) in book {
        for (context, record) in contexts {
            if record.completed != show_completed {
                continue;
            }
            entries.push(ExamEntry {
                course: course.clone(),
                context: context.clone(),
                record: record.clone(),
                days_left: days_until(record.date, today),
            });
        }
    }
    entries
}

fn item_keys(course: &str, context: &str) -> Result<(String, String)> {
    let course_key = category_key(course);
    let context_key = category_key(context);
    if course_key.is_empty() || context_key.is_empty() {
        return Err(AssistantError::Validation(
            "Course and context must not be empty".to_string(),
        ));
    }
    Ok((course_key, context_key))
}

pub struct AcademicTracker {
    store: Arc<JsonStore>,
    planner: Arc<dyn ToolPlanner>,
}

impl AcademicTracker {
    pub fn new(store: Arc<JsonStore>, planner: Arc<dyn ToolPlanner>) -> Self {
        Self { store, planner }
    }

    // =============================
    // Assignments
    // =============================

    pub fn set_assignment(
        &self,
        course: &str,
        context: &str,
        deadline: NaiveDate,
    ) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        self.store.update(ASSIGNMENTS, |book: &mut AssignmentBook| {
            let contexts = book.entry(course_key.clone()).or_default();
            if contexts.contains_key(&context_key) {
                return Err(AssistantError::Conflict(format!(
                    "Assignment '{}' for {} already exists",
                    context_key, course_key
                )));
            }
            contexts.insert(
                context_key.clone(),
                Assignment {
                    deadline,
                    completed: false,
                    completed_date: None,
                },
            );
            Ok(())
        })?;

        info!(course = %course_key, context = %context_key, deadline = %deadline, "Assignment added");
        Ok(format!(
            "Assignment '{}' for {} (due {}) added.",
            context_key, course_key, deadline
        ))
    }

    pub fn get_assignments(&self, show_completed: bool) -> Result<Vec<AssignmentEntry>> {
        let book: AssignmentBook = self.store.load(ASSIGNMENTS)?;
        Ok(assignment_entries(&book, show_completed, today()))
    }

    /// Completing requires a matching *pending* record: completing a
    /// missing or already-completed assignment is NotFound.
    pub fn complete_assignment(&self, course: &str, context: &str) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;
        let stamp = today();

        self.store.update(ASSIGNMENTS, |book: &mut AssignmentBook| {
            let record = book
                .get_mut(&course_key)
                .and_then(|contexts| contexts.get_mut(&context_key))
                .filter(|a| !a.completed)
                .ok_or_else(|| {
                    AssistantError::NotFound(format!(
                        "No pending assignment '{}' for {}",
                        context_key, course_key
                    ))
                })?;
            record.completed = true;
            record.completed_date = Some(stamp);
            Ok(())
        })?;

        Ok(format!(
            "Assignment '{}' for {} marked as completed.",
            context_key, course_key
        ))
    }

    pub fn update_assignment(
        &self,
        course: &str,
        context: &str,
        new_deadline: NaiveDate,
    ) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        let previous = self.store.update(ASSIGNMENTS, |book: &mut AssignmentBook| {
            let record = book
                .get_mut(&course_key)
                .and_then(|contexts| contexts.get_mut(&context_key))
                .ok_or_else(|| {
                    AssistantError::NotFound(format!(
                        "Assignment '{}' for {} not found",
                        context_key, course_key
                    ))
                })?;
            let previous = record.deadline;
            record.deadline = new_deadline;
            Ok(previous)
        })?;

        Ok(format!(
            "Assignment '{}' for {} deadline updated: {} -> {}.",
            context_key, course_key, previous, new_deadline
        ))
    }

    pub fn remove_assignment(&self, course: &str, context: &str) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        self.store.update(ASSIGNMENTS, |book: &mut AssignmentBook| {
            let contexts = book.get_mut(&course_key).ok_or_else(|| {
                AssistantError::NotFound(format!("No assignments for course '{}'", course_key))
            })?;
            contexts.remove(&context_key).ok_or_else(|| {
                AssistantError::NotFound(format!(
                    "Assignment '{}' for {} not found",
                    context_key, course_key
                ))
            })?;
            if contexts.is_empty() {
                book.remove(&course_key);
            }
            Ok(())
        })?;

        Ok(format!(
            "Assignment '{}' for {} removed.",
            context_key, course_key
        ))
    }

    // =============================
    // Exams
    // =============================

    pub fn set_exam(&self, course: &str, context: &str, date: NaiveDate) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        self.store.update(EXAMS, |book: &mut ExamBook| {
            let contexts = book.entry(course_key.clone()).or_default();
            if contexts.contains_key(&context_key) {
                return Err(AssistantError::Conflict(format!(
                    "Exam '{}' for {} already exists",
                    context_key, course_key
                )));
            }
            contexts.insert(
                context_key.clone(),
                Exam {
                    date,
                    completed: false,
                    completed_date: None,
                    grade: None,
                },
            );
            Ok(())
        })?;

        info!(course = %course_key, context = %context_key, date = %date, "Exam added");
        Ok(format!(
            "Exam '{}' for {} (on {}) added.",
            context_key, course_key, date
        ))
    }

    pub fn get_exams(&self, show_completed: bool) -> Result<Vec<ExamEntry>> {
        let book: ExamBook = self.store.load(EXAMS)?;
        Ok(exam_entries(&book, show_completed, today()))
    }

    pub fn complete_exam(&self, course: &str, context: &str) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;
        let stamp = today();

        self.store.update(EXAMS, |book: &mut ExamBook| {
            let record = book
                .get_mut(&course_key)
                .and_then(|contexts| contexts.get_mut(&context_key))
                .filter(|e| !e.completed)
                .ok_or_else(|| {
                    AssistantError::NotFound(format!(
                        "No pending exam '{}' for {}",
                        context_key, course_key
                    ))
                })?;
            record.completed = true;
            record.completed_date = Some(stamp);
            Ok(())
        })?;

        Ok(format!(
            "Exam '{}' for {} marked as completed.",
            context_key, course_key
        ))
    }

    /// Grades are independent of completion; a second grade entry for the
    /// same exam is a Conflict.
    pub fn enter_grade(&self, course: &str, context: &str, grade: f64) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        self.store.update(EXAMS, |book: &mut ExamBook| {
            let record = book
                .get_mut(&course_key)
                .and_then(|contexts| contexts.get_mut(&context_key))
                .ok_or_else(|| {
                    AssistantError::NotFound(format!(
                        "Exam '{}' for {} not found",
                        context_key, course_key
                    ))
                })?;
            if let Some(existing) = record.grade {
                return Err(AssistantError::Conflict(format!(
                    "Exam '{}' for {} already has grade {}",
                    context_key, course_key, existing
                )));
            }
            record.grade = Some(grade);
            Ok(())
        })?;

        Ok(format!(
            "Grade {} recorded for exam '{}' of {}.",
            grade, context_key, course_key
        ))
    }

    pub fn update_exam(&self, course: &str, context: &str, new_date: NaiveDate) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        let previous = self.store.update(EXAMS, |book: &mut ExamBook| {
            let record = book
                .get_mut(&course_key)
                .and_then(|contexts| contexts.get_mut(&context_key))
                .ok_or_else(|| {
                    AssistantError::NotFound(format!(
                        "Exam '{}' for {} not found",
                        context_key, course_key
                    ))
                })?;
            let previous = record.date;
            record.date = new_date;
            Ok(previous)
        })?;

        Ok(format!(
            "Exam '{}' for {} date updated: {} -> {}.",
            context_key, course_key, previous, new_date
        ))
    }

    pub fn remove_exam(&self, course: &str, context: &str) -> Result<String> {
        let (course_key, context_key) = item_keys(course, context)?;

        self.store.update(EXAMS, |book: &mut ExamBook| {
            let contexts = book.get_mut(&course_key).ok_or_else(|| {
                AssistantError::NotFound(format!("No exams for course '{}'", course_key))
            })?;
            contexts.remove(&context_key).ok_or_else(|| {
                AssistantError::NotFound(format!(
                    "Exam '{}' for {} not found",
                    context_key, course_key
                ))
            })?;
            if contexts.is_empty() {
                book.remove(&course_key);
            }
            Ok(())
        })?;

        Ok(format!("Exam '{}' for {} removed.", context_key, course_key))
    }

    // =============================
    // Rendering
    // =============================

    fn render_assignments(&self, show_completed: bool) -> Result<String> {
        let entries = self.get_assignments(show_completed)?;
        if entries.is_empty() {
            let status = if show_completed { "completed" } else { "pending" };
            return Ok(format!("No {} assignments found.", status));
        }

        let mut out = String::new();
        for entry in entries {
            if show_completed {
                let completed = entry
                    .record
                    .completed_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unknown date".to_string());
                out.push_str(&format!(
                    "{} {}: completed on {}\n",
                    entry.course, entry.context, completed
                ));
            } else {
                out.push_str(&format!(
                    "{} {}: due {} ({})\n",
                    entry.course,
                    entry.context,
                    entry.record.deadline,
                    deadline_phrase(entry.days_left)
                ));
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn render_exams(&self, show_completed: bool) -> Result<String> {
        let entries = self.get_exams(show_completed)?;
        if entries.is_empty() {
            let status = if show_completed { "completed" } else { "pending" };
            return Ok(format!("No {} exams found.", status));
        }

        let mut out = String::new();
        for entry in entries {
            let grade = entry
                .record
                .grade
                .map(|g| format!(", grade {}", g))
                .unwrap_or_default();
            if show_completed {
                out.push_str(&format!(
                    "{} {}: taken on {}{}\n",
                    entry.course, entry.context, entry.record.date, grade
                ));
            } else {
                out.push_str(&format!(
                    "{} {}: on {} ({}){}\n",
                    entry.course,
                    entry.context,
                    entry.record.date,
                    deadline_phrase(entry.days_left),
                    grade
                ));
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn dispatch(&self, inv: &ToolInvocation) -> Result<String> {
        let args = &inv.arguments;
        ensure_object(args)?;

        match inv.name.as_str() {
            "set_assignment" => self.set_assignment(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
                require_date(args, "deadline")?,
            ),
            "get_assignments" => self.render_assignments(bool_or(args, "show_completed", false)),
            "complete_assignment" => self.complete_assignment(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
            ),
            "update_assignment" => self.update_assignment(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
                require_date(args, "new_deadline")?,
            ),
            "remove_assignment" => self.remove_assignment(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
            ),
            "set_exam" => self.set_exam(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
                require_date(args, "date")?,
            ),
            "get_exams" => self.render_exams(bool_or(args, "show_completed", false)),
            "complete_exam" => self.complete_exam(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
            ),
            "enter_grade" => self.enter_grade(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
                require_f64(args, "grade")?,
            ),
            "update_exam" => self.update_exam(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
                require_date(args, "new_date")?,
            ),
            "remove_exam" => self.remove_exam(
                &require_str(args, "course")?,
                &require_str(args, "context")?,
            ),
            other => Err(AssistantError::Validation(format!(
                "Unknown academic operation '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl Tracker for AcademicTracker {
    fn domain(&self) -> Domain {
        Domain::Academic
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

    fn tracker() -> (tempfile::TempDir, AcademicTracker) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()).unwrap());
        let planner = Arc::new(ScriptedPlanner {
            plan: ToolPlan::Answer("unused".into()),
        });
        (dir, AcademicTracker::new(store, planner))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_set_and_complete_assignment() {
        let (_dir, tracker) = tracker();
        tracker
            .set_assignment("COMP305", "PS4", date(2025, 3, 10))
            .unwrap();
        tracker.complete_assignment("COMP305", "PS4").unwrap();

        let completed = tracker.get_assignments(true).unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].record.completed);
        assert_eq!(completed[0].record.completed_date, Some(today()));
        assert!(tracker.get_assignments(false).unwrap().is_empty());
    }

    #[test]
    fn test_completion_is_once_only() {
        let (_dir, tracker) = tracker();
        tracker
            .set_assignment("COMP305", "PS4", date(2025, 3, 10))
            .unwrap();
        tracker.complete_assignment("COMP305", "PS4").unwrap();

        let second = tracker.complete_assignment("COMP305", "PS4");
        assert!(matches!(second, Err(AssistantError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_assignment_is_conflict() {
        let (_dir, tracker) = tracker();
        tracker
            .set_assignment("comp305", "ps4", date(2025, 3, 10))
            .unwrap();

        // Identity is case-normalized.
        let dup = tracker.set_assignment("COMP305", "PS4", date(2025, 4, 1));
        assert!(matches!(dup, Err(AssistantError::Conflict(_))));

        // The original deadline is untouched.
        let pending = tracker.get_assignments(false).unwrap();
        assert_eq!(pending[0].record.deadline, date(2025, 3, 10));
    }

    #[test]
    fn test_days_until_annotations() {
        let today = date(2025, 3, 10);
        let mut book = AssignmentBook::new();
        let mut contexts = std::collections::BTreeMap::new();
        contexts.insert(
            "DUE_TODAY".to_string(),
            Assignment {
                deadline: today,
                completed: false,
                completed_date: None,
            },
        );
        contexts.insert(
            "OVERDUE".to_string(),
            Assignment {
                deadline: date(2025, 3, 9),
                completed: false,
                completed_date: None,
            },
        );
        book.insert("COMP305".to_string(), contexts);

        let entries = assignment_entries(&book, false, today);
        let due_today = entries.iter().find(|e| e.context == "DUE_TODAY").unwrap();
        let overdue = entries.iter().find(|e| e.context == "OVERDUE").unwrap();
        assert_eq!(due_today.days_left, 0);
        assert_eq!(overdue.days_left, -1);
    }

    #[test]
    fn test_completing_missing_assignment() {
        let (_dir, tracker) = tracker();
        let result = tracker.complete_assignment("COMP305", "PS9");
        assert!(matches!(result, Err(AssistantError::NotFound(_))));
    }

    #[test]
    fn test_update_and_remove_assignment() {
        let (_dir, tracker) = tracker();
        tracker
            .set_assignment("COMP305", "PS4", date(2025, 3, 10))
            .unwrap();

        let msg = tracker
            .update_assignment("COMP305", "PS4", date(2025, 3, 20))
            .unwrap();
        assert!(msg.contains("2025-03-10"));
        assert!(msg.contains("2025-03-20"));

        tracker.remove_assignment("COMP305", "PS4").unwrap();
        assert!(tracker.get_assignments(false).unwrap().is_empty());
        assert!(matches!(
            tracker.remove_assignment("COMP305", "PS4"),
            Err(AssistantError::NotFound(_))
        ));
    }

    #[test]
    fn test_exam_lifecycle() {
        let (_dir, tracker) = tracker();
        tracker
            .set_exam("COMP305", "Midterm 1", date(2025, 4, 5))
            .unwrap();

        // Grade entry is independent of completion.
        tracker.enter_grade("COMP305", "Midterm 1", 87.0).unwrap();
        let pending = tracker.get_exams(false).unwrap();
        assert_eq!(pending[0].record.grade, Some(87.0));
        assert!(!pending[0].record.completed);

        // Second grade entry conflicts.
        let again = tracker.enter_grade("COMP305", "Midterm 1", 90.0);
        assert!(matches!(again, Err(AssistantError::Conflict(_))));

        tracker.complete_exam("COMP305", "Midterm 1").unwrap();
        let completed = tracker.get_exams(true).unwrap();
        assert_eq!(completed[0].record.completed_date, Some(today()));

        let second = tracker.complete_exam("COMP305", "Midterm 1");
        assert!(matches!(second, Err(AssistantError::NotFound(_))));
    }

    #[test]
    fn test_grade_for_missing_exam() {
        let (_dir, tracker) = tracker();
        let result = tracker.enter_grade("COMP305", "Final", 75.0);
        assert!(matches!(result, Err(AssistantError::NotFound(_))));
    }

    #[test]
    fn test_dispatch_validates_arguments() {
        let (_dir, tracker) = tracker();

        let bad_date = tracker.dispatch(&ToolInvocation {
            name: "set_assignment".into(),
            arguments: json!({"course": "COMP305", "context": "PS4", "deadline": "10/03/2025"}),
        });
        assert!(matches!(bad_date, Err(AssistantError::Validation(_))));

        let missing = tracker.dispatch(&ToolInvocation {
            name: "enter_grade".into(),
            arguments: json!({"course": "COMP305", "context": "Final"}),
        });
        assert!(matches!(missing, Err(AssistantError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_runs_planned_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()).unwrap());
        let planner = Arc::new(ScriptedPlanner {
            plan: ToolPlan::Call(ToolInvocation {
                name: "set_assignment".into(),
                arguments: json!({
                    "course": "COMP305",
                    "context": "PS4",
                    "deadline": "2025-03-10"
                }),
            }),
        });
        let tracker = AcademicTracker::new(store, planner);

        let response = tracker
            .handle("add PS4 for COMP305 due March 10")
            .await
            .unwrap();
        assert!(response.contains("PS4"));
        assert_eq!(tracker.get_assignments(false).unwrap().len(), 1);
    }
}
