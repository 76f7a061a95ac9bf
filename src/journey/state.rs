//! Session state interface shared by the journey steps.
//!
//! The three steps run in separate request/response cycles, so everything
//! that must survive a round-trip travels through this store. Durable
//! ("shared") values are serialized into the resumable session token by the
//! host engine; transient values live for the current turn only. Diagnostic
//! detail therefore always goes to the transient scope.

use serde_json::Value;
use std::collections::HashMap;

/// Keys written and read by the journey steps.
pub mod keys {
    /// Durable: correlation id of the created risk evaluation.
    pub const EVALUATION_ID: &str = "riskEvaluationId";
    /// Durable: name of the worker that created the evaluation.
    pub const WORKER: &str = "riskEvaluationWorker";
    /// Durable: whether the completion status was reported successfully.
    pub const COMPLETION_REPORTED: &str = "riskCompletionReported";
    /// Transient: raw signal blob captured from the client.
    pub const SIGNALS: &str = "riskSignals";
    /// Transient: full evaluation result body, stored only on request.
    pub const EVALUATION_RESULT: &str = "riskEvaluationResult";
    /// Transient: diagnostic detail for a failed step.
    pub const ERROR_DETAIL: &str = "riskError";
    /// Durable: raw session username maintained by the host engine.
    pub const USERNAME: &str = "username";
}

/// Per-authentication-attempt key/value store with durable and transient
/// scopes. Implemented by the host engine in production; an in-memory
/// implementation is provided for embedding and tests.
pub trait SessionState: Send {
    fn get_shared(&self, key: &str) -> Option<Value>;
    fn put_shared(&mut self, key: &str, value: Value);
    fn get_transient(&self, key: &str) -> Option<Value>;
    fn put_transient(&mut self, key: &str, value: Value);

    /// Look a key up in either scope, transient first.
    fn value(&self, key: &str) -> Option<Value> {
        self.get_transient(key).or_else(|| self.get_shared(key))
    }
}

/// In-memory [`SessionState`].
#[derive(Debug, Default)]
pub struct InMemorySessionState {
    shared: HashMap<String, Value>,
    transient: HashMap<String, Value>,
}

impl InMemorySessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionState for InMemorySessionState {
    fn get_shared(&self, key: &str) -> Option<Value> {
        self.shared.get(key).cloned()
    }

    fn put_shared(&mut self, key: &str, value: Value) {
        self.shared.insert(key.to_string(), value);
    }

    fn get_transient(&self, key: &str) -> Option<Value> {
        self.transient.get(key).cloned()
    }

    fn put_transient(&mut self, key: &str, value: Value) {
        self.transient.insert(key.to_string(), value);
    }
}
