use thiserror::Error;

/// Error taxonomy for the risk-evaluation flow.
///
/// Variants map to distinct propagation policies: [`Error::ClientSignal`] and
/// [`Error::InvalidResponse`] terminate the authentication attempt through a
/// distinguished error outcome, [`Error::Credential`] and [`Error::Evaluation`]
/// route the evaluation step to its failure outcome, and every variant is
/// downgraded to a logged warning inside the completion step. Nothing in this
/// crate retries automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// Token issuance or client secret resolution failed. Carries the
    /// upstream status and body when the token endpoint answered at all.
    #[error("worker credential error: {0}")]
    Credential(String),

    /// A risk evaluation create/update call failed or returned an unexpected
    /// status.
    #[error("risk evaluation API error: {0}")]
    Evaluation(String),

    /// The client reported a signal-collection error during the round-trip.
    #[error("client signal collection error: {0}")]
    ClientSignal(String),

    /// The remote evaluation result is missing required fields.
    #[error("invalid risk evaluation response: {0}")]
    InvalidResponse(String),

    /// A referenced worker or tenant is unknown or disabled, or a step
    /// configuration value failed validation.
    #[error("configuration error: {0}")]
    Configuration(String),
}
