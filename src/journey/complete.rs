//! Completion step: best-effort report of the final journey result.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::Error;
use crate::journey::state::{SessionState, keys};
use crate::protect::client::RiskClient;
use crate::protect::event::CompletionStatus;
use crate::worker::{TokenCache, WorkerDirectory};

/// Configuration for the completion step. The status is fixed per placement:
/// a success-branch instance reports SUCCESS, a failure-branch one FAILED.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub status: CompletionStatus,
}

/// Reports the completion status for the evaluation created earlier in the
/// journey. Strictly best-effort; a journey never fails here.
pub struct CompletionStep {
    config: CompletionConfig,
    directory: Arc<WorkerDirectory>,
    cache: Arc<TokenCache>,
    risk: RiskClient,
}

impl CompletionStep {
    #[must_use]
    pub fn new(
        config: CompletionConfig,
        directory: Arc<WorkerDirectory>,
        cache: Arc<TokenCache>,
        risk: RiskClient,
    ) -> Self {
        Self {
            config,
            directory,
            cache,
            risk,
        }
    }

    /// Report the configured completion status. Returns whether the report
    /// was delivered; either way the outcome marker is written to durable
    /// state and the journey proceeds.
    pub async fn process(&self, tenant: &str, state: &mut dyn SessionState) -> bool {
        let reported = match self.try_report(tenant, state).await {
            Ok(()) => true,
            Err(e) => {
                warn!("completion report skipped or failed: {e}");
                false
            }
        };
        state.put_shared(keys::COMPLETION_REPORTED, json!(reported));
        reported
    }

    async fn try_report(&self, tenant: &str, state: &dyn SessionState) -> Result<(), Error> {
        let evaluation_id = state
            .get_shared(keys::EVALUATION_ID)
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::Evaluation("no risk evaluation id in session state".to_string())
            })?;
        let worker_name = state
            .get_shared(keys::WORKER)
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::Evaluation("no risk evaluation worker in session state".to_string())
            })?;

        let worker = self.directory.get(tenant, &worker_name)?;
        let token = self.cache.get_token(tenant, worker).await?;

        self.risk
            .report_completion(&token, worker, &evaluation_id, self.config.status)
            .await?;

        debug!(%evaluation_id, status = ?self.config.status, "completion status reported");
        Ok(())
    }
}
