//! Signal collection step: instructs the client to gather device and
//! behavioral telemetry, then captures the blob on resume.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Error;
use crate::journey::state::{SessionState, keys};
use crate::worker::WorkerCredential;

const SCRIPT_TEMPLATE: &str = include_str!("signals.js");

fn default_sdk_url() -> String {
    "https://apps.pingone.com/signals/web-sdk/5.2.7/signals-sdk.js".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rsync_intervals() -> u32 {
    14
}

/// How the collection instruction is delivered to the client: as executable
/// script text, or as a structured directive rendered by an SDK.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionDelivery {
    #[default]
    Script,
    Directive,
}

/// Collection-behavior flags for the client-side signals SDK.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalCollectionConfig {
    #[serde(default)]
    pub delivery: InstructionDelivery,
    #[serde(default)]
    pub console_log_enabled: bool,
    #[serde(default)]
    pub device_attributes_to_ignore: Vec<String>,
    #[serde(default)]
    pub custom_host: Option<String>,
    #[serde(default)]
    pub lazy_metadata: bool,
    #[serde(default = "default_true")]
    pub behavioral_data_collection: bool,
    /// Days between device attestation fallback-key resyncs.
    #[serde(default = "default_rsync_intervals")]
    pub device_key_rsync_intervals: u32,
    #[serde(default)]
    pub enable_trust: bool,
    #[serde(default)]
    pub disable_tags: bool,
    #[serde(default)]
    pub disable_hub: bool,
    #[serde(default = "default_sdk_url")]
    pub sdk_url: String,
}

impl Default for SignalCollectionConfig {
    fn default() -> Self {
        Self {
            delivery: InstructionDelivery::default(),
            console_log_enabled: false,
            device_attributes_to_ignore: Vec::new(),
            custom_host: None,
            lazy_metadata: false,
            behavioral_data_collection: true,
            device_key_rsync_intervals: default_rsync_intervals(),
            enable_trust: false,
            disable_tags: false,
            disable_hub: false,
            sdk_url: default_sdk_url(),
        }
    }
}

/// Instruction payload for the client round-trip. The host engine renders
/// either form to the client and returns its response on the next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInstruction {
    /// Executable script text, templated with the collection flags.
    Script(String),
    /// Structured directive carrying the same flags plus an `_action`
    /// discriminator.
    Directive(Value),
}

/// What the client reported back after running the instruction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientSignalsResponse {
    /// Collection-side error reported by the client, if any.
    pub error: Option<String>,
    /// Opaque signal blob. Absence is not an error; evaluation can proceed
    /// without client signals.
    pub signals: Option<String>,
}

/// Step result. `AwaitClient` suspends the journey for a client round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalStepResult {
    AwaitClient(ClientInstruction),
    SignalsReceived,
    ClientError,
}

/// Emits the collection instruction on first entry and captures the signal
/// blob on resume.
#[derive(Debug, Clone, Default)]
pub struct SignalCollectionStep {
    config: SignalCollectionConfig,
}

impl SignalCollectionStep {
    #[must_use]
    pub fn new(config: SignalCollectionConfig) -> Self {
        Self { config }
    }

    pub fn process(
        &self,
        worker: &WorkerCredential,
        response: Option<&ClientSignalsResponse>,
        state: &mut dyn SessionState,
    ) -> SignalStepResult {
        let Some(response) = response else {
            debug!(environment_id = %worker.environment_id, "sending signal collection instruction");
            return SignalStepResult::AwaitClient(self.instruction(worker));
        };

        if let Some(error) = response.error.as_deref().filter(|e| !e.is_empty()) {
            let detail = Error::ClientSignal(error.to_string());
            warn!("{detail}");
            state.put_transient(keys::ERROR_DETAIL, json!(detail.to_string()));
            return SignalStepResult::ClientError;
        }

        if let Some(signals) = response.signals.as_deref().filter(|s| !s.is_empty()) {
            state.put_transient(keys::SIGNALS, json!(signals));
        }

        SignalStepResult::SignalsReceived
    }

    fn instruction(&self, worker: &WorkerCredential) -> ClientInstruction {
        match self.config.delivery {
            InstructionDelivery::Script => ClientInstruction::Script(self.render_script(worker)),
            InstructionDelivery::Directive => ClientInstruction::Directive(self.directive(worker)),
        }
    }

    fn render_script(&self, worker: &WorkerCredential) -> String {
        let config = &self.config;
        let vars = [
            ("envId", worker.environment_id.clone()),
            ("consoleLogEnabled", config.console_log_enabled.to_string()),
            (
                "deviceAttributesToIgnore",
                json!(config.device_attributes_to_ignore).to_string(),
            ),
            ("customHost", json!(config.custom_host).to_string()),
            ("lazyMetadata", config.lazy_metadata.to_string()),
            (
                "behavioralDataCollection",
                config.behavioral_data_collection.to_string(),
            ),
            (
                "deviceKeyRsyncIntervals",
                config.device_key_rsync_intervals.to_string(),
            ),
            ("enableTrust", config.enable_trust.to_string()),
            ("disableTags", config.disable_tags.to_string()),
            ("disableHub", config.disable_hub.to_string()),
            ("sdkUrl", config.sdk_url.clone()),
        ];

        vars.iter().fold(SCRIPT_TEMPLATE.to_string(), |acc, (k, v)| {
            acc.replace(&format!("${{{k}}}"), v)
        })
    }

    fn directive(&self, worker: &WorkerCredential) -> Value {
        let config = &self.config;
        json!({
            "_action": "protect_initialize",
            "envId": worker.environment_id,
            "consoleLogEnabled": config.console_log_enabled,
            "deviceAttributesToIgnore": config.device_attributes_to_ignore,
            "customHost": config.custom_host,
            "lazyMetadata": config.lazy_metadata,
            "behavioralDataCollection": config.behavioral_data_collection,
            "deviceKeyRsyncIntervals": config.device_key_rsync_intervals,
            "enableTrust": config.enable_trust,
            "disableTags": config.disable_tags,
            "disableHub": config.disable_hub,
        })
    }
}
