//! The three journey steps and their shared context types.
//!
//! Steps are driven by an external authentication-tree engine as a sequence
//! of independent request/response cycles: signal collection suspends for a
//! client round-trip, evaluation creates the remote risk evaluation and
//! resolves an outcome, and completion best-effort reports the final journey
//! result. All cross-step data travels through [`state::SessionState`].

pub mod complete;
pub mod evaluate;
pub mod signals;
pub mod state;

use std::collections::HashMap;

pub use complete::{CompletionConfig, CompletionStep};
pub use evaluate::{EvaluationConfig, EvaluationOutcome, EvaluationReport, EvaluationStep};
pub use signals::{
    ClientInstruction, ClientSignalsResponse, InstructionDelivery, SignalCollectionConfig,
    SignalCollectionStep, SignalStepResult,
};
pub use state::{InMemorySessionState, SessionState};

/// Request-scoped context handed to a step by the host engine.
#[derive(Debug, Clone, Default)]
pub struct JourneyRequest {
    /// Client IP of the authentication attempt.
    pub client_ip: String,
    /// Raw request headers, multi-valued.
    pub headers: HashMap<String, Vec<String>>,
    /// Universal id of the authenticated principal, when one exists yet.
    pub principal: Option<String>,
}

impl JourneyRequest {
    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// An identity resolved from the backing identity store.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub id: String,
    pub name: String,
}

/// Resolves the identity behind an authenticated principal. External
/// collaborator; the evaluation step falls back to the raw session username
/// when resolution yields nothing.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, principal: &str) -> Option<ResolvedIdentity>;
}

/// Resolver for deployments without an identity backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentityStore;

impl IdentityResolver for NoIdentityStore {
    fn resolve(&self, _principal: &str) -> Option<ResolvedIdentity> {
        None
    }
}
