//! Client-credentials token exchange against a worker's auth endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64ct::{Base64UrlUnpadded, Encoding};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{Instrument, info_span};

use crate::error::Error;
use crate::http::endpoint_url;
use crate::worker::WorkerCredential;

/// A bearer token issued for a worker. Never mutated, only replaced by the
/// cache when expired.
#[derive(Debug, Clone)]
pub struct AccessToken {
    value: SecretString,
    expires_at: SystemTime,
    client_id: String,
}

impl AccessToken {
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.value
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

/// Exchange worker client credentials for an access token.
///
/// # Errors
/// Returns [`Error::Credential`] on transport failure, a non-200 status, or a
/// token response that cannot be decoded.
pub(crate) async fn exchange(
    client: &reqwest::Client,
    worker: &WorkerCredential,
    secret: &SecretString,
) -> Result<AccessToken, Error> {
    let url = endpoint_url(
        &worker.auth_base_url,
        &format!("/{}/as/token", worker.environment_id),
    )?;

    let span = info_span!(
        "worker.token_exchange",
        http.method = "POST",
        url = %url,
        client_id = %worker.client_id
    );
    let response = client
        .post(&url)
        .basic_auth(&worker.client_id, Some(secret.expose_secret()))
        .form(&[("grant_type", "client_credentials"), ("scope", "openid")])
        .send()
        .instrument(span)
        .await
        .map_err(|e| Error::Credential(format!("token request failed: {e}")))?;

    if response.status() != StatusCode::OK {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Credential(format!("{url} - {status}, {body}")));
    }

    let json_response: Value = response
        .json()
        .await
        .map_err(|e| Error::Credential(format!("error parsing token response: {e}")))?;

    let access_token = json_response
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::Credential("error parsing token response: no access_token found".to_string())
        })?;

    let expires_at = jwt_expiry(access_token)?;

    Ok(AccessToken {
        value: SecretString::from(access_token.to_string()),
        expires_at,
        client_id: worker.client_id.clone(),
    })
}

// The access token is a signed JWT; its expiry comes from the `exp` claim.
// The token is consumed, not validated, so the signature is not checked.
fn jwt_expiry(token: &str) -> Result<SystemTime, Error> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::Credential("access token is not a JWT".to_string()))?;

    let bytes = Base64UrlUnpadded::decode_vec(payload)
        .map_err(|_| Error::Credential("invalid base64url in access token payload".to_string()))?;

    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Credential(format!("invalid JSON in access token payload: {e}")))?;

    let exp = claims
        .get("exp")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Credential("no exp claim in access token".to_string()))?;

    Ok(UNIX_EPOCH + Duration::from_secs(exp))
}
