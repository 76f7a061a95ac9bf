//! Evaluation step: builds the risk event, creates the remote evaluation and
//! resolves exactly one outcome.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::Error;
use crate::journey::state::{SessionState, keys};
use crate::journey::{IdentityResolver, JourneyRequest};
use crate::protect::client::RiskClient;
use crate::protect::event::{
    Browser, DeviceSharingType, EvaluationRequest, EventUser, Flow, FlowType, RiskEvaluation,
    RiskLevel, RiskPolicySet, Sdk, Signals, TargetResource, UserType,
};
use crate::worker::{TokenCache, WorkerDirectory};

fn default_score_threshold() -> f64 {
    300.0
}

/// Configuration for the evaluation step.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Name of the worker to evaluate with, resolved per tenant.
    pub worker: String,
    #[serde(default)]
    pub target_resource_id: Option<String>,
    #[serde(default)]
    pub risk_policy_set_id: Option<String>,
    #[serde(default)]
    pub flow_type: FlowType,
    #[serde(default)]
    pub device_sharing_type: DeviceSharingType,
    #[serde(default)]
    pub user_type: UserType,
    /// Scores above this value route to the exceed outcome. Zero disables
    /// the rule.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// Allow-list of recommended-action values recognized as outcomes.
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    /// Session-state key overriding the resolved user id.
    #[serde(default)]
    pub user_id_key: Option<String>,
    /// Session-state key overriding the resolved username.
    #[serde(default)]
    pub username_key: Option<String>,
    /// Store the full evaluation result in transient state. Never durable;
    /// that would bloat the resumable session token.
    #[serde(default)]
    pub store_result: bool,
}

impl EvaluationConfig {
    /// Validate at configuration-load time.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a negative or non-finite score
    /// threshold, or an empty or duplicated recommended-action entry.
    pub fn validate(&self) -> Result<(), Error> {
        if self.worker.is_empty() {
            return Err(Error::Configuration("worker reference is empty".to_string()));
        }
        if !self.score_threshold.is_finite() || self.score_threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "invalid score threshold: {}",
                self.score_threshold
            )));
        }
        for (i, action) in self.recommended_actions.iter().enumerate() {
            if action.is_empty() {
                return Err(Error::Configuration(
                    "empty recommended action in allow-list".to_string(),
                ));
            }
            if self.recommended_actions[..i].contains(action) {
                return Err(Error::Configuration(format!(
                    "duplicate recommended action: {action}"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of the evaluation step: the fixed set plus dynamic outcomes named
/// after configured recommended-action values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    High,
    Medium,
    Low,
    /// Score exceeded the configured threshold.
    Exceed,
    /// Evaluation could not be completed; detail is in transient state.
    Failure,
    /// A recommended action from the configured allow-list.
    Action(String),
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Medium => f.write_str("medium"),
            Self::Low => f.write_str("low"),
            Self::Exceed => f.write_str("exceed"),
            Self::Failure => f.write_str("failure"),
            Self::Action(action) => f.write_str(action),
        }
    }
}

impl From<RiskLevel> for EvaluationOutcome {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::High => Self::High,
            RiskLevel::Medium => Self::Medium,
            RiskLevel::Low => Self::Low,
        }
    }
}

/// Step outcome plus audit detail for the host engine.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub outcome: EvaluationOutcome,
    /// Id of the created evaluation, when the create call succeeded.
    pub evaluation_id: Option<String>,
    /// Environment the evaluation ran in, once the worker was resolved.
    pub environment_id: Option<String>,
}

/// Resolve an evaluation result into exactly one outcome. Strict precedence:
/// score threshold, then configured recommended action, then level.
fn decide(
    config: &EvaluationConfig,
    evaluation: &RiskEvaluation,
) -> Result<EvaluationOutcome, Error> {
    let result = &evaluation.result;

    if config.score_threshold > 0.0 {
        if let Some(score) = result.score {
            if score > config.score_threshold {
                return Ok(EvaluationOutcome::Exceed);
            }
        }
    }

    if let Some(action) = result.recommended_action.as_deref() {
        if config.recommended_actions.iter().any(|a| a == action) {
            return Ok(EvaluationOutcome::Action(action.to_string()));
        }
        warn!("no outcome configured for recommended action {action}");
    }

    match result.level.as_deref() {
        Some(level) => Ok(level.parse::<RiskLevel>()?.into()),
        None => Err(Error::InvalidResponse(
            "no level in evaluation result and no other rule matched".to_string(),
        )),
    }
}

/// Creates the remote risk evaluation and routes to an outcome.
pub struct EvaluationStep {
    config: EvaluationConfig,
    directory: Arc<WorkerDirectory>,
    cache: Arc<TokenCache>,
    risk: RiskClient,
}

impl EvaluationStep {
    /// # Errors
    /// Returns [`Error::Configuration`] when the step configuration fails
    /// validation.
    pub fn new(
        config: EvaluationConfig,
        directory: Arc<WorkerDirectory>,
        cache: Arc<TokenCache>,
        risk: RiskClient,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            directory,
            cache,
            risk,
        })
    }

    /// Run the evaluation. Never returns an error: credential, transport and
    /// invalid-response failures all route to [`EvaluationOutcome::Failure`]
    /// with the triggering detail recorded in transient state only.
    pub async fn process(
        &self,
        tenant: &str,
        request: &JourneyRequest,
        identities: &dyn IdentityResolver,
        state: &mut dyn SessionState,
    ) -> EvaluationReport {
        match self.try_process(tenant, request, identities, state).await {
            Ok(report) => report,
            Err(e) => {
                warn!("risk evaluation failed: {e}");
                state.put_transient(keys::ERROR_DETAIL, json!(e.to_string()));
                EvaluationReport {
                    outcome: EvaluationOutcome::Failure,
                    evaluation_id: state
                        .get_shared(keys::EVALUATION_ID)
                        .and_then(|v| v.as_str().map(str::to_owned)),
                    environment_id: self
                        .directory
                        .get(tenant, &self.config.worker)
                        .ok()
                        .map(|w| w.environment_id.clone()),
                }
            }
        }
    }

    async fn try_process(
        &self,
        tenant: &str,
        request: &JourneyRequest,
        identities: &dyn IdentityResolver,
        state: &mut dyn SessionState,
    ) -> Result<EvaluationReport, Error> {
        let worker = self.directory.get(tenant, &self.config.worker)?;
        let token = self.cache.get_token(tenant, worker).await?;

        let payload = self.build_request(request, identities, state);
        let evaluation = self
            .risk
            .create_evaluation(&token, worker, &payload)
            .await?;

        debug!(evaluation_id = %evaluation.id, "risk evaluation created");

        // The completion step runs in a later HTTP turn; the correlation
        // handle and worker reference must survive in durable state.
        state.put_shared(keys::EVALUATION_ID, json!(evaluation.id));
        state.put_shared(keys::WORKER, json!(self.config.worker));

        if self.config.store_result {
            state.put_transient(keys::EVALUATION_RESULT, evaluation.raw.clone());
        }

        let outcome = decide(&self.config, &evaluation)?;

        Ok(EvaluationReport {
            outcome,
            evaluation_id: Some(evaluation.id),
            environment_id: Some(worker.environment_id.clone()),
        })
    }

    fn build_request(
        &self,
        request: &JourneyRequest,
        identities: &dyn IdentityResolver,
        state: &dyn SessionState,
    ) -> EvaluationRequest {
        let signals = state
            .get_transient(keys::SIGNALS)
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|s| !s.is_empty());

        EvaluationRequest {
            event: crate::protect::event::RiskEvent {
                target_resource: self
                    .config
                    .target_resource_id
                    .clone()
                    .map(|id| TargetResource { id }),
                ip: Some(request.client_ip.clone()).filter(|ip| !ip.is_empty()),
                flow: Flow {
                    flow_type: self.config.flow_type,
                },
                user: self.resolve_user(request, identities, state),
                sdk: signals.map(|data| Sdk {
                    signals: Signals { data },
                }),
                sharing_type: self.config.device_sharing_type,
                browser: request.header("user-agent").map(|ua| Browser {
                    user_agent: ua.to_string(),
                }),
            },
            risk_policy_set: self
                .config
                .risk_policy_set_id
                .clone()
                .map(|id| RiskPolicySet { id }),
        }
    }

    // Explicit state overrides win; otherwise the identity behind the
    // principal, falling back to the raw session username.
    fn resolve_user(
        &self,
        request: &JourneyRequest,
        identities: &dyn IdentityResolver,
        state: &dyn SessionState,
    ) -> EventUser {
        let state_string =
            |key: &str| -> Option<String> { state.value(key)?.as_str().map(str::to_owned) };

        let needs_identity = self.config.user_id_key.is_none() || self.config.username_key.is_none();
        let resolved = if needs_identity {
            request
                .principal
                .as_deref()
                .and_then(|p| identities.resolve(p))
        } else {
            None
        };

        let id = match self.config.user_id_key.as_deref() {
            Some(key) => state_string(key),
            None => resolved
                .as_ref()
                .map(|r| r.id.clone())
                .or_else(|| request.principal.clone()),
        };

        let name = match self.config.username_key.as_deref() {
            Some(key) => state_string(key),
            None => resolved
                .as_ref()
                .map(|r| r.name.clone())
                .or_else(|| state_string(keys::USERNAME)),
        };

        EventUser {
            id,
            name,
            user_type: self.config.user_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::state::InMemorySessionState;
    use crate::journey::{NoIdentityStore, ResolvedIdentity};
    use crate::protect::event::RiskResult;
    use crate::worker::{StaticSecrets, WorkerCredential};
    use anyhow::{Result, anyhow};
    use base64ct::{Base64UrlUnpadded, Encoding};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use std::time::{SystemTime, UNIX_EPOCH};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> EvaluationConfig {
        EvaluationConfig {
            worker: "protect".to_string(),
            target_resource_id: None,
            risk_policy_set_id: None,
            flow_type: FlowType::Authentication,
            device_sharing_type: DeviceSharingType::Shared,
            user_type: UserType::External,
            score_threshold: 300.0,
            recommended_actions: vec!["BOT_MITIGATION".to_string()],
            user_id_key: None,
            username_key: None,
            store_result: false,
        }
    }

    fn evaluation(result: RiskResult) -> RiskEvaluation {
        RiskEvaluation {
            id: "eval-1".to_string(),
            result,
            raw: Value::Null,
        }
    }

    #[test]
    fn score_threshold_dominates_action_and_level() -> Result<()> {
        let outcome = decide(
            &config(),
            &evaluation(RiskResult {
                level: Some("LOW".to_string()),
                score: Some(500.0),
                recommended_action: Some("BOT_MITIGATION".to_string()),
            }),
        )?;
        assert_eq!(outcome, EvaluationOutcome::Exceed);
        Ok(())
    }

    #[test]
    fn matching_action_beats_level() -> Result<()> {
        let outcome = decide(
            &config(),
            &evaluation(RiskResult {
                level: Some("LOW".to_string()),
                score: Some(50.0),
                recommended_action: Some("BOT_MITIGATION".to_string()),
            }),
        )?;
        assert_eq!(
            outcome,
            EvaluationOutcome::Action("BOT_MITIGATION".to_string())
        );
        Ok(())
    }

    #[test]
    fn unknown_action_falls_through_to_level() -> Result<()> {
        let outcome = decide(
            &config(),
            &evaluation(RiskResult {
                level: Some("MEDIUM".to_string()),
                score: Some(50.0),
                recommended_action: Some("UNKNOWN_ACTION".to_string()),
            }),
        )?;
        assert_eq!(outcome, EvaluationOutcome::Medium);
        Ok(())
    }

    #[test]
    fn level_only_routes_by_level() -> Result<()> {
        let outcome = decide(
            &config(),
            &evaluation(RiskResult {
                level: Some("HIGH".to_string()),
                score: None,
                recommended_action: None,
            }),
        )?;
        assert_eq!(outcome, EvaluationOutcome::High);
        Ok(())
    }

    #[test]
    fn zero_threshold_disables_score_rule() -> Result<()> {
        let mut config = config();
        config.score_threshold = 0.0;

        let outcome = decide(
            &config,
            &evaluation(RiskResult {
                level: Some("LOW".to_string()),
                score: Some(10_000.0),
                recommended_action: None,
            }),
        )?;
        assert_eq!(outcome, EvaluationOutcome::Low);
        Ok(())
    }

    #[test]
    fn missing_level_is_invalid_response() {
        let err = decide(
            &config(),
            &evaluation(RiskResult {
                level: None,
                score: Some(50.0),
                recommended_action: None,
            }),
        );
        assert!(matches!(err, Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn unexpected_level_is_invalid_response() {
        let err = decide(
            &config(),
            &evaluation(RiskResult {
                level: Some("SEVERE".to_string()),
                score: None,
                recommended_action: None,
            }),
        );
        assert!(matches!(err, Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let mut bad = config();
        bad.score_threshold = -1.0;
        assert!(matches!(bad.validate(), Err(Error::Configuration(_))));

        let mut bad = config();
        bad.recommended_actions = vec!["A".to_string(), "A".to_string()];
        assert!(matches!(bad.validate(), Err(Error::Configuration(_))));

        let mut bad = config();
        bad.recommended_actions = vec![String::new()];
        assert!(matches!(bad.validate(), Err(Error::Configuration(_))));

        let mut bad = config();
        bad.worker = String::new();
        assert!(matches!(bad.validate(), Err(Error::Configuration(_))));

        assert!(config().validate().is_ok());
    }

    // Async step tests against a mock token endpoint and risk API.

    fn test_jwt(exp: u64) -> String {
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload =
            Base64UrlUnpadded::encode_string(json!({ "exp": exp }).to_string().as_bytes());
        format!("{header}.{payload}.sig")
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    async fn mock_token_endpoint(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/env-1/as/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": test_jwt(unix_now() + 3600)
            })))
            .mount(server)
            .await;
    }

    fn step(server: &MockServer, config: EvaluationConfig) -> Result<EvaluationStep> {
        let mut directory = WorkerDirectory::new();
        directory.insert(
            "acme",
            "protect",
            WorkerCredential {
                client_id: "client-1".to_string(),
                client_secret_ref: "worker.secret".to_string(),
                environment_id: "env-1".to_string(),
                api_base_url: server.uri(),
                auth_base_url: server.uri(),
            },
        );

        let mut secrets = StaticSecrets::new();
        secrets.insert("worker.secret", SecretString::from("hunter2".to_string()));

        Ok(EvaluationStep::new(
            config,
            Arc::new(directory),
            Arc::new(TokenCache::new(Arc::new(secrets))?),
            RiskClient::new()?,
        )?)
    }

    fn journey_request() -> JourneyRequest {
        let mut request = JourneyRequest {
            client_ip: "203.0.113.7".to_string(),
            principal: Some("uid=alice".to_string()),
            ..JourneyRequest::default()
        };
        request
            .headers
            .insert("User-Agent".to_string(), vec!["Mozilla/5.0".to_string()]);
        request
    }

    struct TestIdentities;

    impl crate::journey::IdentityResolver for TestIdentities {
        fn resolve(&self, principal: &str) -> Option<ResolvedIdentity> {
            (principal == "uid=alice").then(|| ResolvedIdentity {
                id: "alice-id".to_string(),
                name: "alice".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn successful_evaluation_persists_markers_and_routes() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .and(body_partial_json(json!({
                "event": {
                    "ip": "203.0.113.7",
                    "flow": { "type": "AUTHENTICATION" },
                    "user": { "id": "alice-id", "name": "alice", "type": "EXTERNAL" },
                    "browser": { "userAgent": "Mozilla/5.0" }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "eval-1",
                "result": { "level": "HIGH", "score": 75.0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let step = step(&server, config())?;
        let mut state = InMemorySessionState::new();

        let report = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;

        assert_eq!(report.outcome, EvaluationOutcome::High);
        assert_eq!(report.evaluation_id.as_deref(), Some("eval-1"));
        assert_eq!(report.environment_id.as_deref(), Some("env-1"));
        assert_eq!(
            state.get_shared(keys::EVALUATION_ID),
            Some(json!("eval-1"))
        );
        assert_eq!(state.get_shared(keys::WORKER), Some(json!("protect")));
        // Full result is only stored on request.
        assert_eq!(state.get_transient(keys::EVALUATION_RESULT), None);
        Ok(())
    }

    #[tokio::test]
    async fn signals_from_transient_state_reach_the_payload() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .and(body_partial_json(json!({
                "event": { "sdk": { "signals": { "data": "blob" } } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "eval-1",
                "result": { "level": "LOW" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let step = step(&server, config())?;
        let mut state = InMemorySessionState::new();
        state.put_transient(keys::SIGNALS, json!("blob"));

        let report = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;
        assert_eq!(report.outcome, EvaluationOutcome::Low);
        Ok(())
    }

    #[tokio::test]
    async fn state_override_keys_win_over_identity() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .and(body_partial_json(json!({
                "event": { "user": { "id": "override-id", "name": "override-name" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "eval-1",
                "result": { "level": "LOW" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config();
        config.user_id_key = Some("customUserId".to_string());
        config.username_key = Some("customUsername".to_string());

        let step = step(&server, config)?;
        let mut state = InMemorySessionState::new();
        state.put_shared("customUserId", json!("override-id"));
        state.put_shared("customUsername", json!("override-name"));

        let report = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;
        assert_eq!(report.outcome, EvaluationOutcome::Low);
        Ok(())
    }

    #[tokio::test]
    async fn unresolved_principal_falls_back_to_session_username() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .and(body_partial_json(json!({
                "event": { "user": { "id": "uid=alice", "name": "alice-session" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "eval-1",
                "result": { "level": "LOW" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let step = step(&server, config())?;
        let mut state = InMemorySessionState::new();
        state.put_shared(keys::USERNAME, json!("alice-session"));

        let report = step
            .process("acme", &journey_request(), &NoIdentityStore, &mut state)
            .await;
        assert_eq!(report.outcome, EvaluationOutcome::Low);
        Ok(())
    }

    #[tokio::test]
    async fn create_failure_routes_to_failure_without_markers() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "nope" })))
            .mount(&server)
            .await;

        let step = step(&server, config())?;
        let mut state = InMemorySessionState::new();

        let report = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;

        assert_eq!(report.outcome, EvaluationOutcome::Failure);
        assert_eq!(report.evaluation_id, None);
        assert_eq!(state.get_shared(keys::EVALUATION_ID), None);
        assert_eq!(state.get_shared(keys::WORKER), None);

        // Diagnostics go to transient state only.
        let detail = state
            .get_transient(keys::ERROR_DETAIL)
            .ok_or_else(|| anyhow!("expected transient diagnostics"))?;
        assert!(detail.as_str().unwrap_or_default().contains("400"));
        assert_eq!(state.get_shared(keys::ERROR_DETAIL), None);
        Ok(())
    }

    #[tokio::test]
    async fn missing_level_routes_to_failure_after_persisting_markers() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "eval-1",
                "result": { "score": 10.0 }
            })))
            .mount(&server)
            .await;

        let step = step(&server, config())?;
        let mut state = InMemorySessionState::new();

        let report = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;

        assert_eq!(report.outcome, EvaluationOutcome::Failure);
        // The evaluation was created before the decision failed.
        assert_eq!(report.evaluation_id.as_deref(), Some("eval-1"));
        assert!(state.get_transient(keys::ERROR_DETAIL).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn store_result_keeps_full_body_in_transient_state() -> Result<()> {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/environments/env-1/riskEvaluations"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "eval-1",
                "result": { "level": "LOW" },
                "createdAt": "2026-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let mut config = config();
        config.store_result = true;

        let step = step(&server, config)?;
        let mut state = InMemorySessionState::new();

        let _ = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;

        let stored = state
            .get_transient(keys::EVALUATION_RESULT)
            .ok_or_else(|| anyhow!("expected stored result"))?;
        assert_eq!(stored["createdAt"], "2026-01-01T00:00:00Z");
        assert_eq!(state.get_shared(keys::EVALUATION_RESULT), None);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_worker_routes_to_failure() -> Result<()> {
        let server = MockServer::start().await;

        let mut config = config();
        config.worker = "missing".to_string();

        let step = step(&server, config)?;
        let mut state = InMemorySessionState::new();

        let report = step
            .process("acme", &journey_request(), &TestIdentities, &mut state)
            .await;

        assert_eq!(report.outcome, EvaluationOutcome::Failure);
        assert!(state.get_transient(keys::ERROR_DETAIL).is_some());
        assert!(server.received_requests().await.map_or(true, |r| r.is_empty()));
        Ok(())
    }
}
