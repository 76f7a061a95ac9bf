//! Process-wide access-token cache with single-flight refresh.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::worker::token::{self, AccessToken};
use crate::worker::{SecretSource, WorkerCredential};

/// Cache key for issued tokens. Tenant is part of equality so two tenants
/// sharing a client id and environment id never observe each other's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    tenant: String,
    client_id: String,
    environment_id: String,
}

impl CacheKey {
    fn new(tenant: &str, worker: &WorkerCredential) -> Self {
        Self {
            tenant: tenant.to_string(),
            client_id: worker.client_id.clone(),
            environment_id: worker.environment_id.clone(),
        }
    }
}

type Slot = Arc<Mutex<Option<AccessToken>>>;

/// Caches worker access tokens per `(tenant, client id, environment id)`.
///
/// Retrieval is single-flight per key: concurrent callers for the same key
/// serialize on the key's slot, so at most one token exchange is in flight
/// per key at any time while callers for other keys proceed independently.
/// Entries never expire structurally; only the token value is replaced.
pub struct TokenCache {
    http: reqwest::Client,
    secrets: Arc<dyn SecretSource>,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl TokenCache {
    /// # Errors
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new(secrets: Arc<dyn SecretSource>) -> Result<Self, Error> {
        Ok(Self {
            http: crate::http::client()?,
            secrets,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Return a currently valid token for the worker, exchanging credentials
    /// only when the cached token is absent or expired.
    ///
    /// Expiry is checked on every retrieval: an expired cached token is
    /// discarded and refreshed before anything is returned. No retry is
    /// performed on failure; the slot is simply left empty for the next
    /// caller.
    ///
    /// # Errors
    /// Returns [`Error::Credential`] when secret resolution or the token
    /// exchange fails.
    pub async fn get_token(
        &self,
        tenant: &str,
        worker: &WorkerCredential,
    ) -> Result<AccessToken, Error> {
        let slot = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(CacheKey::new(tenant, worker))
                .or_default()
                .clone()
        };

        // Holding the slot lock across the exchange is what makes refresh
        // single-flight: a second caller blocks here and then finds the
        // freshly cached token instead of issuing its own exchange.
        let mut cached = slot.lock().await;

        if let Some(existing) = cached.as_ref() {
            if !existing.is_expired() {
                return Ok(existing.clone());
            }
            debug!(
                client_id = %worker.client_id,
                "cached worker token expired, refreshing"
            );
            *cached = None;
        }

        let secret = self.secrets.resolve(&worker.client_secret_ref)?;
        let fresh = token::exchange(&self.http, worker, &secret).await?;
        *cached = Some(fresh.clone());

        Ok(fresh)
    }

    /// Drop every cached token, typically on a configuration reload.
    ///
    /// Safe to run concurrently with in-flight [`TokenCache::get_token`]
    /// calls; a call already past its cache check may still return a token
    /// computed just before invalidation.
    pub async fn invalidate_all(&self) {
        self.entries.lock().await.clear();
    }
}
