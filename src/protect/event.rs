//! Wire model for the risk evaluation API.
//!
//! Everything here is structured serde serialization; optional members are
//! omitted entirely when absent so the payload never carries null keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// The kind of flow the risk evaluation is carried out for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    Registration,
    #[default]
    Authentication,
    Access,
    Authorization,
    Transaction,
}

/// How the device is shared between users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceSharingType {
    Unspecified,
    #[default]
    Shared,
    Private,
}

/// The kind of user associated with the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    #[default]
    External,
    PingOne,
}

/// Final status reported back for a risk evaluation record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    #[default]
    Success,
    Failed,
}

/// Remote-assigned risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => Err(Error::InvalidResponse(format!(
                "unexpected risk level: {other}"
            ))),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("HIGH"),
            Self::Medium => f.write_str("MEDIUM"),
            Self::Low => f.write_str("LOW"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResource {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(rename = "type")]
    pub flow_type: FlowType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdk {
    pub signals: Signals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub user_type: UserType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Browser {
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicySet {
    pub id: String,
}

/// The outbound risk event. Constructed fresh per evaluation call and never
/// persisted beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_resource: Option<TargetResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub flow: Flow,
    pub user: EventUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<Sdk>,
    pub sharing_type: DeviceSharingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<Browser>,
}

/// Envelope posted to the create-evaluation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub event: RiskEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_policy_set: Option<RiskPolicySet>,
}

/// The scored part of the create-evaluation response. `level` stays a raw
/// string here; interpreting it is the decision engine's job so that an
/// unexpected value surfaces as an invalid-response error instead of a
/// deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
}

/// A created risk evaluation. `id` is the correlation handle persisted to
/// session state for the later completion report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvaluation {
    pub id: String,
    #[serde(default)]
    pub result: RiskResult,
    /// Complete response body, kept for optional transient storage.
    #[serde(skip)]
    pub raw: Value,
}
