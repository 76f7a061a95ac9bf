//! Stateless client for the two remote risk-evaluation operations.

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{Instrument, info_span};

use crate::error::Error;
use crate::http::endpoint_url;
use crate::protect::event::{CompletionStatus, EvaluationRequest, RiskEvaluation};
use crate::worker::{AccessToken, WorkerCredential};

/// Client for the remote risk API. Holds no state beyond the shared
/// connection pool; every call releases its connection on every exit path.
#[derive(Debug, Clone)]
pub struct RiskClient {
    client: reqwest::Client,
}

impl RiskClient {
    /// # Errors
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            client: crate::http::client()?,
        })
    }

    /// Create a new risk evaluation for the worker's environment. Success is
    /// strictly 201 Created.
    ///
    /// # Errors
    /// Returns [`Error::Evaluation`] on transport failure or any other
    /// status, and [`Error::InvalidResponse`] when the 201 body cannot be
    /// decoded. Callers must not assume either is retryable.
    pub async fn create_evaluation(
        &self,
        token: &AccessToken,
        worker: &WorkerCredential,
        request: &EvaluationRequest,
    ) -> Result<RiskEvaluation, Error> {
        let url = endpoint_url(
            &worker.api_base_url,
            &format!("/environments/{}/riskEvaluations", worker.environment_id),
        )?;

        let span = info_span!(
            "risk.create_evaluation",
            http.method = "POST",
            url = %url
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token.secret().expose_secret())
            .json(request)
            .send()
            .instrument(span)
            .await
            .map_err(|e| Error::Evaluation(format!("create evaluation request failed: {e}")))?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Evaluation(format!("{url} - {status}, {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("error parsing evaluation body: {e}")))?;

        let mut evaluation: RiskEvaluation = serde_json::from_value(body.clone())
            .map_err(|e| Error::InvalidResponse(format!("error parsing evaluation body: {e}")))?;
        evaluation.raw = body;

        Ok(evaluation)
    }

    /// Report the completion status of a previously created evaluation.
    /// Success is strictly 200 OK.
    ///
    /// # Errors
    /// Returns [`Error::Evaluation`] on transport failure or any other
    /// status.
    pub async fn report_completion(
        &self,
        token: &AccessToken,
        worker: &WorkerCredential,
        evaluation_id: &str,
        status: CompletionStatus,
    ) -> Result<(), Error> {
        let url = endpoint_url(
            &worker.api_base_url,
            &format!(
                "/environments/{}/riskEvaluations/{evaluation_id}/event",
                worker.environment_id
            ),
        )?;

        let span = info_span!(
            "risk.report_completion",
            http.method = "PUT",
            url = %url
        );
        let response = self
            .client
            .put(&url)
            .bearer_auth(token.secret().expose_secret())
            .json(&json!({ "completionStatus": status }))
            .send()
            .instrument(span)
            .await
            .map_err(|e| Error::Evaluation(format!("report completion request failed: {e}")))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Evaluation(format!("{url} - {status}, {body}")));
        }

        Ok(())
    }
}
