//! Risk-signal collection and evaluation for multi-step authentication
//! journeys.
//!
//! The crate embeds into a host authentication-tree engine and contributes
//! three steps: [`journey::SignalCollectionStep`] gathers device and
//! behavioral telemetry from the client, [`journey::EvaluationStep`] creates
//! a remote risk evaluation and routes the journey by its result, and
//! [`journey::CompletionStep`] reports the final journey outcome back to the
//! risk service. Worker credentials and their cached bearer tokens live in
//! [`worker`]; the wire model and API client in [`protect`].

pub mod error;
pub mod journey;
pub mod protect;
pub mod worker;

mod http;

pub use error::Error;
