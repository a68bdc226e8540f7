//! Project tracker
//!
//! Personal projects with milestones, features, notes and a status that
//! changes only through the explicit status-update operation, never
//! inferred from milestone completion.

use crate::error::AssistantError;
use crate::models::{
    project_key, Domain, Milestone, MilestoneStatus, Project, ProjectBook, ProjectNote,
    ProjectStatus,
};
use crate::store::JsonStore;
use crate::toolcall::{
    ensure_object, optional_str, require_str, ParamKind, ToolInvocation, ToolParam, ToolPlan,
    ToolPlanner, ToolSpec,
};
use crate::trackers::{today, Tracker};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const PROJECTS: &str = "projects";

const SPECS: &[ToolSpec] = &[
    ToolSpec {
        name: "create_project",
        description: "Create a new project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "description",
                kind: ParamKind::String,
                required: true,
                description: "What the project is about",
            },
        ],
    },
    ToolSpec {
        name: "list_projects",
        description: "List projects, optionally by status",
        params: &[ToolParam {
            name: "status",
            kind: ParamKind::String,
            required: false,
            description: "in_progress, completed or on_hold",
        }],
    },
    ToolSpec {
        name: "get_project",
        description: "Full details of one project",
        params: &[ToolParam {
            name: "name",
            kind: ParamKind::String,
            required: true,
            description: "Project name",
        }],
    },
    ToolSpec {
        name: "update_status",
        description: "Change a project's status",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "status",
                kind: ParamKind::String,
                required: true,
                description: "in_progress, completed or on_hold",
            },
        ],
    },
    ToolSpec {
        name: "update_description",
        description: "Change a project's description",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "description",
                kind: ParamKind::String,
                required: true,
                description: "New description",
            },
        ],
    },
    ToolSpec {
        name: "add_milestone",
        description: "Add a pending milestone to a project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "milestone",
                kind: ParamKind::String,
                required: true,
                description: "Milestone name, e.g. Backend API",
            },
        ],
    },
    ToolSpec {
        name: "complete_milestone",
        description: "Mark a project milestone as completed",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "milestone",
                kind: ParamKind::String,
                required: true,
                description: "Milestone name",
            },
        ],
    },
    ToolSpec {
        name: "add_feature",
        description: "Add a feature to a project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "value",
                kind: ParamKind::String,
                required: true,
                description: "Feature description",
            },
        ],
    },
    ToolSpec {
        name: "add_challenge",
        description: "Document a challenge faced in a project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "value",
                kind: ParamKind::String,
                required: true,
                description: "Challenge description",
            },
        ],
    },
    ToolSpec {
        name: "add_tech",
        description: "Add a technology to a project's tech stack",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "value",
                kind: ParamKind::String,
                required: true,
                description: "Technology, e.g. Rust, Docker",
            },
        ],
    },
    ToolSpec {
        name: "add_link",
        description: "Add a reference link to a project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "value",
                kind: ParamKind::String,
                required: true,
                description: "URL",
            },
        ],
    },
    ToolSpec {
        name: "add_next_step",
        description: "Add a planned next step to a project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "value",
                kind: ParamKind::String,
                required: true,
                description: "The next step",
            },
        ],
    },
    ToolSpec {
        name: "add_note",
        description: "Add a dated progress note to a project",
        params: &[
            ToolParam {
                name: "name",
                kind: ParamKind::String,
                required: true,
                description: "Project name",
            },
            ToolParam {
                name: "content",
                kind: ParamKind::String,
                required: true,
                description: "Note content",
            },
        ],
    },
];

fn parse_status(raw: &str) -> Result<ProjectStatus> {
    match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
        "in_progress" | "active" | "started" => Ok(ProjectStatus::InProgress),
        "completed" | "done" | "finished" => Ok(ProjectStatus::Completed),
        "on_hold" | "paused" | "hold" => Ok(ProjectStatus::OnHold),
        other => Err(AssistantError::Validation(format!(
            "Unknown status '{}', expected in_progress, completed or on_hold",
            other
        ))),
    }
}

pub struct ProjectTracker {
    store: Arc<JsonStore>,
    planner: Arc<dyn ToolPlanner>,
}

impl ProjectTracker {
    pub fn new(store: Arc<JsonStore>, planner: Arc<dyn ToolPlanner>) -> Self {
        Self { store, planner }
    }

    /// Run `f` against an existing project, persisting on success.
    fn with_project<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Project) -> Result<R>,
    ) -> Result<R> {
        let key = project_key(name);
        self.store.update(PROJECTS, |book: &mut ProjectBook| {
            let project = book.get_mut(&key).ok_or_else(|| {
                AssistantError::NotFound(format!("Project '{}' not found", key))
            })?;
            f(project)
        })
    }

    pub fn create_project(&self, name: &str, description: &str) -> Result<String> {
        let key = project_key(name);
        if key.is_empty() {
            return Err(AssistantError::Validation(
                "Project name must not be empty".to_string(),
            ));
        }

        let created = today();
        self.store.update(PROJECTS, |book: &mut ProjectBook| {
            if book.contains_key(&key) {
                return Err(AssistantError::Conflict(format!(
                    "Project '{}' already exists",
                    key
                )));
            }
            book.insert(
                key.clone(),
                Project::new(name.trim().to_string(), description.trim().to_string(), created),
            );
            Ok(())
        })?;

        info!(project = %key, "Project created");
        Ok(format!("Project '{}' created (status in_progress).", key))
    }

    pub fn get_project(&self, name: &str) -> Result<Project> {
        let key = project_key(name);
        let book: ProjectBook = self.store.load(PROJECTS)?;
        book.get(&key)
            .cloned()
            .ok_or_else(|| AssistantError::NotFound(format!("Project '{}' not found", key)))
    }

    pub fn list_projects(&self, status: Option<ProjectStatus>) -> Result<Vec<(String, Project)>> {
        let book: ProjectBook = self.store.load(PROJECTS)?;
        Ok(book
            .into_iter()
            .filter(|(_, p)| status.map(|s| p.status == s).unwrap_or(true))
            .collect())
    }

    pub fn update_status(&self, name: &str, status: ProjectStatus) -> Result<String> {
        let key = project_key(name);
        self.with_project(name, |project| {
            project.status = status;
            Ok(())
        })?;
        Ok(format!("Status of '{}' changed to '{}'.", key, status))
    }

    pub fn update_description(&self, name: &str, description: &str) -> Result<String> {
        let key = project_key(name);
        self.with_project(name, |project| {
            project.description = description.trim().to_string();
            Ok(())
        })?;
        Ok(format!("Description of '{}' updated.", key))
    }

    pub fn add_milestone(&self, name: &str, milestone: &str) -> Result<String> {
        let key = project_key(name);
        let milestone = milestone.trim().to_string();
        if milestone.is_empty() {
            return Err(AssistantError::Validation(
                "Milestone name must not be empty".to_string(),
            ));
        }

        self.with_project(name, |project| {
            if project
                .milestones
                .iter()
                .any(|m| m.name.eq_ignore_ascii_case(&milestone))
            {
                return Err(AssistantError::Conflict(format!(
                    "Milestone '{}' already exists in '{}'",
                    milestone, key
                )));
            }
            project.milestones.push(Milestone {
                name: milestone.clone(),
                status: MilestoneStatus::Pending,
                completed_date: None,
            });
            Ok(())
        })?;

        Ok(format!("Milestone '{}' added to '{}'.", milestone, key))
    }

    pub fn complete_milestone(&self, name: &str, milestone: &str) -> Result<String> {
        let key = project_key(name);
        let stamp = today();

        self.with_project(name, |project| {
            let found = project
                .milestones
                .iter_mut()
                .find(|m| m.name.eq_ignore_ascii_case(milestone.trim()))
                .ok_or_else(|| {
                    AssistantError::NotFound(format!(
                        "Milestone '{}' not found in '{}'",
                        milestone, key
                    ))
                })?;
            if found.status == MilestoneStatus::Completed {
                return Err(AssistantError::Conflict(format!(
                    "Milestone '{}' in '{}' is already completed",
                    milestone, key
                )));
            }
            found.status = MilestoneStatus::Completed;
            found.completed_date = Some(stamp);
            Ok(())
        })?;

        Ok(format!(
            "Milestone '{}' in '{}' marked as completed.",
            milestone.trim(),
            key
        ))
    }

    /// Idempotent set-insert for features, challenges, tech stack, links.
    fn add_to_set(&self, name: &str, field: &'static str, value: &str) -> Result<String> {
        let key = project_key(name);
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(AssistantError::Validation(format!(
                "{} value must not be empty",
                field
            )));
        }

        let inserted = self.with_project(name, |project| {
            let set = match field {
                "feature" => &mut project.features,
                "challenge" => &mut project.challenges,
                "tech" => &mut project.tech_stack,
                "link" => &mut project.links,
                _ => unreachable!("unknown set field"),
            };
            Ok(set.insert(value.clone()))
        })?;

        if inserted {
            Ok(format!("Added {} '{}' to '{}'.", field, value, key))
        } else {
            Ok(format!("{} '{}' is already listed in '{}'.", field, value, key))
        }
    }

    pub fn add_feature(&self, name: &str, value: &str) -> Result<String> {
        self.add_to_set(name, "feature", value)
    }

    pub fn add_challenge(&self, name: &str, value: &str) -> Result<String> {
        self.add_to_set(name, "challenge", value)
    }

    pub fn add_tech(&self, name: &str, value: &str) -> Result<String> {
        self.add_to_set(name, "tech", value)
    }

    pub fn add_link(&self, name: &str, value: &str) -> Result<String> {
        self.add_to_set(name, "link", value)
    }

    pub fn add_next_step(&self, name: &str, value: &str) -> Result<String> {
        let key = project_key(name);
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(AssistantError::Validation(
                "Next step must not be empty".to_string(),
            ));
        }
        self.with_project(name, |project| {
            project.next_steps.push(value.clone());
            Ok(())
        })?;
        Ok(format!("Next step added to '{}'.", key))
    }

    pub fn add_note(&self, name: &str, content: &str) -> Result<String> {
        let key = project_key(name);
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AssistantError::Validation(
                "Note content must not be empty".to_string(),
            ));
        }
        let date = today();
        self.with_project(name, |project| {
            project.notes.push(ProjectNote {
                date,
                content: content.clone(),
            });
            Ok(())
        })?;
        Ok(format!("Note added to '{}' ({}).", key, date))
    }

    // =============================
    // Rendering
    // =============================

    fn render_project(&self, name: &str) -> Result<String> {
        let project = self.get_project(name)?;
        let key = project_key(name);

        let mut out = format!(
            "{} [{}]\n{}\nCreated: {}\n",
            key, project.status, project.description, project.created_date
        );

        if !project.tech_stack.is_empty() {
            let techs: Vec<&str> = project.tech_stack.iter().map(String::as_str).collect();
            out.push_str(&format!("Tech stack: {}\n", techs.join(", ")));
        }

        if !project.milestones.is_empty() {
            out.push_str("Milestones:\n");
            for m in &project.milestones {
                match m.status {
                    MilestoneStatus::Completed => {
                        let when = m
                            .completed_date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "unknown".to_string());
                        out.push_str(&format!("  [x] {} (completed {})\n", m.name, when));
                    }
                    MilestoneStatus::Pending => {
                        out.push_str(&format!("  [ ] {}\n", m.name));
                    }
                }
            }
        }

        if !project.features.is_empty() {
            out.push_str("Features:\n");
            for f in &project.features {
                out.push_str(&format!("  - {}\n", f));
            }
        }

        if !project.challenges.is_empty() {
            out.push_str("Challenges:\n");
            for c in &project.challenges {
                out.push_str(&format!("  - {}\n", c));
            }
        }

        if !project.next_steps.is_empty() {
            out.push_str("Next steps:\n");
            for s in &project.next_steps {
                out.push_str(&format!("  - {}\n", s));
            }
        }

        if !project.links.is_empty() {
            out.push_str("Links:\n");
            for l in &project.links {
                out.push_str(&format!("  - {}\n", l));
            }
        }

        if !project.notes.is_empty() {
            out.push_str("Notes:\n");
            for n in &project.notes {
                out.push_str(&format!("  {} {}\n", n.date, n.content));
            }
        }

        Ok(out.trim_end().to_string())
    }

    fn render_list(&self, status: Option<ProjectStatus>) -> Result<String> {
        let projects = self.list_projects(status)?;
        if projects.is_empty() {
            return Ok(match status {
                Some(s) => format!("No projects with status '{}'.", s),
                None => "No projects found.".to_string(),
            });
        }

        let mut out = String::new();
        for (key, project) in projects {
            let done = project
                .milestones
                .iter()
                .filter(|m| m.status == MilestoneStatus::Completed)
                .count();
            out.push_str(&format!(
                "{} [{}]: {} ({}/{} milestones done)\n",
                key,
                project.status,
                project.description,
                done,
                project.milestones.len()
            ));
        }
        Ok(out.trim_end().to_string())
    }

    fn dispatch(&self, inv: &ToolInvocation) -> Result<String> {
        let args = &inv.arguments;
        ensure_object(args)?;

        match inv.name.as_str() {
            "create_project" => self.create_project(
                &require_str(args, "name")?,
                &require_str(args, "description")?,
            ),
            "list_projects" => {
                let status = optional_str(args, "status")
                    .map(|raw| parse_status(&raw))
                    .transpose()?;
                self.render_list(status)
            }
            "get_project" => self.render_project(&require_str(args, "name")?),
            "update_status" => {
                let status = parse_status(&require_str(args, "status")?)?;
                self.update_status(&require_str(args, "name")?, status)
            }
            "update_description" => self.update_description(
                &require_str(args, "name")?,
                &require_str(args, "description")?,
            ),
            "add_milestone" => self.add_milestone(
                &require_str(args, "name")?,
                &require_str(args, "milestone")?,
            ),
            "complete_milestone" => self.complete_milestone(
                &require_str(args, "name")?,
                &require_str(args, "milestone")?,
            ),
            "add_feature" => {
                self.add_feature(&require_str(args, "name")?, &require_str(args, "value")?)
            }
            "add_challenge" => {
                self.add_challenge(&require_str(args, "name")?, &require_str(args, "value")?)
            }
            "add_tech" => self.add_tech(&require_str(args, "name")?, &require_str(args, "value")?),
            "add_link" => self.add_link(&require_str(args, "name")?, &require_str(args, "value")?),
            "add_next_step" => {
                self.add_next_step(&require_str(args, "name")?, &require_str(args, "value")?)
            }
            "add_note" => self.add_note(&require_str(args, "name")?, &require_str(args, "content")?),
            other => Err(AssistantError::Validation(format!(
                "Unknown project operation '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl Tracker for ProjectTracker {
    fn domain(&self) -> Domain {
        Domain::Project
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

    fn tracker() -> (tempfile::TempDir, ProjectTracker) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()).unwrap());
        let planner = Arc::new(ScriptedPlanner {
            plan: ToolPlan::Answer("unused".into()),
        });
        (dir, ProjectTracker::new(store, planner))
    }

    #[test]
    fn test_create_and_duplicate_conflict() {
        let (_dir, tracker) = tracker();
        tracker
            .create_project("Personal Assistant", "Routes requests")
            .unwrap();

        // Same key after normalization.
        let dup = tracker.create_project("personal assistant", "Other text");
        assert!(matches!(dup, Err(AssistantError::Conflict(_))));

        // Existing project untouched.
        let project = tracker.get_project("Personal Assistant").unwrap();
        assert_eq!(project.description, "Routes requests");
        assert_eq!(project.status, ProjectStatus::InProgress);
    }

    #[test]
    fn test_milestone_lifecycle() {
        let (_dir, tracker) = tracker();
        tracker.create_project("Demo", "demo").unwrap();

        // Completing before adding is NotFound.
        let missing = tracker.complete_milestone("Demo", "Backend API");
        assert!(matches!(missing, Err(AssistantError::NotFound(_))));

        tracker.add_milestone("Demo", "Backend API").unwrap();
        let dup = tracker.add_milestone("Demo", "backend api");
        assert!(matches!(dup, Err(AssistantError::Conflict(_))));

        tracker.complete_milestone("Demo", "Backend API").unwrap();
        let project = tracker.get_project("Demo").unwrap();
        assert_eq!(project.milestones[0].status, MilestoneStatus::Completed);
        assert_eq!(project.milestones[0].completed_date, Some(today()));

        let again = tracker.complete_milestone("Demo", "Backend API");
        assert!(matches!(again, Err(AssistantError::Conflict(_))));
    }

    #[test]
    fn test_status_only_changes_explicitly() {
        let (_dir, tracker) = tracker();
        tracker.create_project("Demo", "demo").unwrap();
        tracker.add_milestone("Demo", "Only one").unwrap();
        tracker.complete_milestone("Demo", "Only one").unwrap();

        // All milestones done, status still in_progress.
        let project = tracker.get_project("Demo").unwrap();
        assert_eq!(project.status, ProjectStatus::InProgress);

        tracker
            .update_status("Demo", ProjectStatus::Completed)
            .unwrap();
        let project = tracker.get_project("Demo").unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
    }

    #[test]
    fn test_set_fields_are_idempotent() {
        let (_dir, tracker) = tracker();
        tracker.create_project("Demo", "demo").unwrap();

        tracker.add_feature("Demo", "Realtime sync").unwrap();
        tracker.add_feature("Demo", "Realtime sync").unwrap();
        tracker.add_tech("Demo", "Rust").unwrap();
        tracker.add_tech("Demo", "Rust").unwrap();

        let project = tracker.get_project("Demo").unwrap();
        assert_eq!(project.features.len(), 1);
        assert_eq!(project.tech_stack.len(), 1);
    }

    #[test]
    fn test_next_steps_and_notes_append() {
        let (_dir, tracker) = tracker();
        tracker.create_project("Demo", "demo").unwrap();

        tracker.add_next_step("Demo", "Write docs").unwrap();
        tracker.add_next_step("Demo", "Ship v1").unwrap();
        tracker.add_note("Demo", "Fixed async issue").unwrap();

        let project = tracker.get_project("Demo").unwrap();
        assert_eq!(project.next_steps, vec!["Write docs", "Ship v1"]);
        assert_eq!(project.notes.len(), 1);
        assert_eq!(project.notes[0].date, today());
    }

    #[test]
    fn test_unknown_project_is_not_found() {
        let (_dir, tracker) = tracker();
        assert!(matches!(
            tracker.add_feature("Ghost", "x"),
            Err(AssistantError::NotFound(_))
        ));
        assert!(matches!(
            tracker.get_project("Ghost"),
            Err(AssistantError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_projects_by_status() {
        let (_dir, tracker) = tracker();
        tracker.create_project("One", "first").unwrap();
        tracker.create_project("Two", "second").unwrap();
        tracker
            .update_status("Two", ProjectStatus::OnHold)
            .unwrap();

        let on_hold = tracker.list_projects(Some(ProjectStatus::OnHold)).unwrap();
        assert_eq!(on_hold.len(), 1);
        assert_eq!(on_hold[0].0, "TWO");

        let all = tracker.list_projects(None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("in progress").unwrap(), ProjectStatus::InProgress);
        assert_eq!(parse_status("Done").unwrap(), ProjectStatus::Completed);
        assert_eq!(parse_status("paused").unwrap(), ProjectStatus::OnHold);
        assert!(parse_status("archived").is_err());
    }

    #[tokio::test]
    async fn test_handle_runs_planned_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()).unwrap());
        let planner = Arc::new(ScriptedPlanner {
            plan: ToolPlan::Call(ToolInvocation {
                name: "create_project".into(),
                arguments: json!({"name": "Demo", "description": "via planner"}),
            }),
        });
        let tracker = ProjectTracker::new(store, planner);

        let response = tracker.handle("start a project called Demo").await.unwrap();
        assert!(response.contains("DEMO"));
        assert!(tracker.get_project("Demo").is_ok());
    }
}
