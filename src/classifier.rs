//! Intent classification
//!
//! Maps free-text user input to one of the five routing domains. The
//! classifier is a swappable collaborator behind a trait: the default is
//! a deterministic keyword scorer, with an LLM-backed variant for
//! ambiguous phrasing. Ambiguity is reported, never guessed away; the
//! router resolves it to the general handler.

use crate::error::AssistantError;
use crate::gemini::GeminiClient;
use crate::models::Domain;
use crate::Result;
use async_trait::async_trait;

/// Fixed description of one domain's scope, handed to the classifier
/// alongside the request text.
pub struct DomainScope {
    pub domain: Domain,
    pub summary: &'static str,
    pub keywords: &'static [&'static str],
}

/// Static scope table, zero allocation
const DOMAIN_SCOPES: &[DomainScope] = &[
    DomainScope {
        domain: Domain::Expense,
        summary: "Money: expenses, budgets, spending, costs, payments",
        keywords: &[
            "expense", "expenses", "budget", "spent", "spend", "cost", "money", "tl", "lira",
            "dollar", "payment", "paid", "bought", "purchase",
        ],
    },
    DomainScope {
        domain: Domain::Academic,
        summary: "School: assignments, homework, exams, deadlines, grades, courses",
        keywords: &[
            "assignment", "homework", "exam", "midterm", "final", "grade", "course", "class",
            "deadline", "due", "quiz", "lecture", "study",
        ],
    },
    DomainScope {
        domain: Domain::Project,
        summary: "Personal projects: milestones, features, tech stack, progress notes",
        keywords: &[
            "project", "projects", "milestone", "feature", "tech stack", "development",
            "coding", "repo", "prototype", "next step",
        ],
    },
    DomainScope {
        domain: Domain::Email,
        summary: "Email accounts: inbox, unread messages, important mail, search",
        keywords: &[
            "email", "emails", "inbox", "unread", "mail", "gmail", "message", "messages",
            "sender",
        ],
    },
];

/// The scope table shown to every classifier. `General` is the implicit
/// fifth label for anything that matches nothing above.
pub fn domain_scopes() -> &'static [DomainScope] {
    DOMAIN_SCOPES
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Pick exactly one domain for `request`, or fail with a Routing
    /// error when no confident pick exists.
    async fn classify(&self, request: &str, scopes: &[DomainScope]) -> Result<Domain>;
}

/// Deterministic keyword scorer. The default classifier: identical
/// requests always route identically.
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn score(request: &str, scope: &DomainScope) -> usize {
        scope
            .keywords
            .iter()
            .filter(|kw| request.contains(**kw))
            .count()
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, request: &str, scopes: &[DomainScope]) -> Result<Domain> {
        let lowered = request.to_lowercase();

        let scores: Vec<(Domain, usize)> = scopes
            .iter()
            .map(|scope| (scope.domain, Self::score(&lowered, scope)))
            .collect();

        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        if best == 0 {
            return Ok(Domain::General);
        }

        let mut leaders = scores.iter().filter(|(_, s)| *s == best);
        let leader = leaders.next().map(|(d, _)| *d);

        if leaders.next().is_some() {
            // Two domains tied: refuse to guess.
            return Err(AssistantError::Routing(format!(
                "Ambiguous request, {} domains tied at score {}",
                scores.iter().filter(|(_, s)| *s == best).count(),
                best
            )));
        }

        Ok(leader.unwrap_or(Domain::General))
    }
}

/// LLM-backed classifier for phrasing the keyword scorer cannot pin down.
pub struct GeminiIntentClassifier {
    client: GeminiClient,
}

impl GeminiIntentClassifier {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    fn build_system_prompt(scopes: &[DomainScope]) -> String {
        let mut prompt = String::from(
            "You are the router of a personal assistant. \
             Classify the user's request into exactly one domain.\n\nDomains:\n",
        );
        for scope in scopes {
            prompt.push_str(&format!("- {}: {}\n", scope.domain, scope.summary));
        }
        prompt.push_str(
            "- general: greetings, questions about capabilities, anything unclear\n\n\
             Reply with a single word: one of expense, academic, project, email, general. \
             If unsure, reply general.",
        );
        prompt
    }

    fn parse_label(response: &str) -> Option<Domain> {
        let lowered = response.trim().to_lowercase();
        let label = lowered.split_whitespace().next()?;
        match label.trim_matches(|c: char| !c.is_ascii_alphabetic()) {
            "expense" => Some(Domain::Expense),
            "academic" => Some(Domain::Academic),
            "project" => Some(Domain::Project),
            "email" => Some(Domain::Email),
            "general" => Some(Domain::General),
            _ => None,
        }
    }
}

#[async_trait]
impl IntentClassifier for GeminiIntentClassifier {
    async fn classify(&self, request: &str, scopes: &[DomainScope]) -> Result<Domain> {
        let system = Self::build_system_prompt(scopes);
        let response = self.client.generate(&system, request).await?;

        Self::parse_label(&response).ok_or_else(|| {
            AssistantError::Routing(format!("Classifier returned no usable label: {}", response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(request: &str) -> Result<Domain> {
        tokio_test::block_on(KeywordClassifier.classify(request, domain_scopes()))
    }

    #[test]
    fn test_expense_requests() {
        let cases = vec![
            "Add 50 TL for coffee",
            "how much money did I spend this week",
            "set a budget for transport",
        ];
        for c in cases {
            assert_eq!(classify(c).unwrap(), Domain::Expense, "case: {}", c);
        }
    }

    #[test]
    fn test_academic_requests() {
        let cases = vec![
            "PS4 assignment for COMP305 is due 2025-03-10",
            "when is my midterm exam",
            "enter my grade for the final",
        ];
        for c in cases {
            assert_eq!(classify(c).unwrap(), Domain::Academic, "case: {}", c);
        }
    }

    #[test]
    fn test_project_requests() {
        let cases = vec![
            "add a milestone to my side project",
            "show all my projects",
        ];
        for c in cases {
            assert_eq!(classify(c).unwrap(), Domain::Project, "case: {}", c);
        }
    }

    #[test]
    fn test_email_requests() {
        let cases = vec!["check my unread emails", "anything new in my inbox?"];
        for c in cases {
            assert_eq!(classify(c).unwrap(), Domain::Email, "case: {}", c);
        }
    }

    #[test]
    fn test_unmatched_falls_to_general() {
        assert_eq!(classify("hello there").unwrap(), Domain::General);
        assert_eq!(classify("what can you do?").unwrap(), Domain::General);
    }

    #[test]
    fn test_tied_scores_are_ambiguous() {
        // One expense keyword, one academic keyword.
        let result = classify("budget for the course");
        assert!(matches!(result, Err(AssistantError::Routing(_))));
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(
            GeminiIntentClassifier::parse_label("expense"),
            Some(Domain::Expense)
        );
        assert_eq!(
            GeminiIntentClassifier::parse_label("  Email\n"),
            Some(Domain::Email)
        );
        assert_eq!(GeminiIntentClassifier::parse_label("dunno"), None);
    }
}
