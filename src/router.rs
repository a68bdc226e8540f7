//! Intent router
//!
//! The only component with cross-domain knowledge: it classifies a
//! request, forwards the verbatim text to the owning tracker and relays
//! the tracker's response unmodified. It owns no domain state, parses no
//! arguments and never retries; a tracker error's message becomes the
//! turn's response.

use crate::classifier::{domain_scopes, IntentClassifier, KeywordClassifier};
use crate::email::{
    EmailSessionManager, FileTokenStore, HttpMailProvider, OAuthAuthenticator,
};
use crate::gemini::GeminiClient;
use crate::general::GeneralResponder;
use crate::memory::SessionStore;
use crate::models::{Domain, RoutingDecision};
use crate::store::JsonStore;
use crate::toolcall::{GeminiToolPlanner, ToolPlanner};
use crate::trackers::{AcademicTracker, ExpenseLedger, ProjectTracker, Tracker};
use crate::Result;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Router {
    classifier: Box<dyn IntentClassifier>,
    trackers: HashMap<Domain, Arc<dyn Tracker>>,
    general: GeneralResponder,
}

impl Router {
    pub fn new(
        classifier: Box<dyn IntentClassifier>,
        trackers: Vec<Arc<dyn Tracker>>,
        general: GeneralResponder,
    ) -> Self {
        let trackers = trackers
            .into_iter()
            .map(|tracker| (tracker.domain(), tracker))
            .collect();

        Self {
            classifier,
            trackers,
            general,
        }
    }

    /// Route one request and produce the turn's response. Domain errors
    /// are surfaced as the response text, never retried or re-routed.
    pub async fn route(&self, session_id: Uuid, request: &str) -> String {
        let decision = self.decide(request).await;
        info!(target = %decision.target, "Routing request");

        match decision.target {
            Domain::General => self.answer_generally(session_id, &decision.payload).await,
            domain => match self.trackers.get(&domain) {
                Some(tracker) => match tracker.handle(&decision.payload).await {
                    Ok(response) => response,
                    Err(error) => error.to_string(),
                },
                None => self.answer_generally(session_id, &decision.payload).await,
            },
        }
    }

    async fn decide(&self, request: &str) -> RoutingDecision {
        let target = match self.classifier.classify(request, domain_scopes()).await {
            Ok(domain) => domain,
            Err(error) => {
                // Ambiguity falls back to general instead of guessing a
                // domain and misfiling the request.
                warn!(error = %error, "Classifier found no confident domain");
                Domain::General
            }
        };

        RoutingDecision {
            target,
            payload: request.to_string(),
        }
    }

    async fn answer_generally(&self, session_id: Uuid, request: &str) -> String {
        self.general
            .respond(session_id, request)
            .await
            .unwrap_or_else(|error| error.to_string())
    }
}

/// Wire up the default component set: keyword classifier, Gemini tool
/// planner, JSON-backed trackers and the email session manager.
pub fn create_default_router(store: Arc<JsonStore>) -> Result<Router> {
    let api_key = env::var("GEMINI_API_KEY").unwrap_or_default();

    let planner: Arc<dyn ToolPlanner> =
        Arc::new(GeminiToolPlanner::new(GeminiClient::new(api_key)));

    let expense = Arc::new(ExpenseLedger::new(store.clone(), planner.clone()));
    let academic = Arc::new(AcademicTracker::new(store.clone(), planner.clone()));
    let project = Arc::new(ProjectTracker::new(store.clone(), planner.clone()));

    let token_store = Arc::new(FileTokenStore::new(store.dir().join("email_credentials"))?);
    let authenticator: Arc<dyn crate::email::Authenticator> = match OAuthAuthenticator::from_env()
    {
        Some(authenticator) => Arc::new(authenticator),
        None => Arc::new(crate::email::auth::UnconfiguredAuthenticator),
    };
    let provider = Arc::new(HttpMailProvider::from_env());
    let email = Arc::new(EmailSessionManager::new(
        token_store,
        authenticator,
        provider,
        planner,
    ));

    let sessions = Arc::new(SessionStore::from_env());
    let general = GeneralResponder::new(GeminiClient::from_env(), sessions);

    let trackers: Vec<Arc<dyn Tracker>> = vec![expense, academic, project, email];

    Ok(Router::new(Box::new(KeywordClassifier), trackers, general))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DomainScope;
    use crate::error::AssistantError;
    use crate::toolcall::ToolSpec;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedClassifier {
        outcome: Result<Domain>,
    }

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(&self, _request: &str, _scopes: &[DomainScope]) -> Result<Domain> {
            match &self.outcome {
                Ok(domain) => Ok(*domain),
                Err(_) => Err(AssistantError::Routing("ambiguous".into())),
            }
        }
    }

    struct RecordingTracker {
        domain: Domain,
        requests: Mutex<Vec<String>>,
        response: Result<String>,
    }

    #[async_trait]
    impl Tracker for RecordingTracker {
        fn domain(&self) -> Domain {
            self.domain
        }

        fn tool_specs(&self) -> &'static [ToolSpec] {
            &[]
        }

        async fn handle(&self, request: &str) -> Result<String> {
            self.requests.lock().unwrap().push(request.to_string());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(error) => Err(AssistantError::NotFound(error.to_string())),
            }
        }
    }

    fn general() -> GeneralResponder {
        GeneralResponder::new(None, Arc::new(SessionStore::in_memory()))
    }

    #[tokio::test]
    async fn test_forwards_verbatim_and_relays_unmodified() {
        let tracker = Arc::new(RecordingTracker {
            domain: Domain::Expense,
            requests: Mutex::new(Vec::new()),
            response: Ok("Expense of 50.00 TL added.".to_string()),
        });
        let router = Router::new(
            Box::new(FixedClassifier {
                outcome: Ok(Domain::Expense),
            }),
            vec![tracker.clone()],
            general(),
        );

        let request = "  Add 50 TL for coffee!  ";
        let response = router.route(Uuid::new_v4(), request).await;

        assert_eq!(response, "Expense of 50.00 TL added.");
        // The tracker saw exactly what the user typed.
        assert_eq!(
            tracker.requests.lock().unwrap().clone(),
            vec![request.to_string()]
        );
    }

    #[tokio::test]
    async fn test_tracker_error_text_is_the_response() {
        let tracker = Arc::new(RecordingTracker {
            domain: Domain::Academic,
            requests: Mutex::new(Vec::new()),
            response: Err(AssistantError::NotFound("no such assignment".into())),
        });
        let router = Router::new(
            Box::new(FixedClassifier {
                outcome: Ok(Domain::Academic),
            }),
            vec![tracker],
            general(),
        );

        let response = router.route(Uuid::new_v4(), "complete PS9").await;
        assert!(response.contains("no such assignment"));
    }

    #[tokio::test]
    async fn test_general_bypasses_trackers() {
        let tracker = Arc::new(RecordingTracker {
            domain: Domain::Expense,
            requests: Mutex::new(Vec::new()),
            response: Ok("never".to_string()),
        });
        let router = Router::new(
            Box::new(FixedClassifier {
                outcome: Ok(Domain::General),
            }),
            vec![tracker.clone()],
            general(),
        );

        let response = router.route(Uuid::new_v4(), "hello").await;
        assert!(!response.is_empty());
        assert!(tracker.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back_to_general() {
        let tracker = Arc::new(RecordingTracker {
            domain: Domain::Expense,
            requests: Mutex::new(Vec::new()),
            response: Ok("never".to_string()),
        });
        let router = Router::new(
            Box::new(FixedClassifier {
                outcome: Err(AssistantError::Routing("tied".into())),
            }),
            vec![tracker.clone()],
            general(),
        );

        let response = router.route(Uuid::new_v4(), "budget for the course").await;
        assert!(!response.is_empty());
        assert!(tracker.requests.lock().unwrap().is_empty());
    }
}
