//! Remote risk API integration: the wire model and the stateless client for
//! the create-evaluation and report-completion operations.

pub mod client;
pub mod event;

pub use client::RiskClient;
pub use event::{
    CompletionStatus, DeviceSharingType, EvaluationRequest, FlowType, RiskEvaluation, RiskEvent,
    RiskLevel, UserType,
};
