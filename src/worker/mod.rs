//! Worker credentials and the access-token cache.
//!
//! A *worker* is a service-account credential used to call the risk API on
//! behalf of a tenant. Workers are configuration-owned and immutable; the
//! short-lived bearer tokens they produce are cached per
//! `(tenant, client id, environment id)` by [`cache::TokenCache`].

pub mod cache;
pub mod token;

use std::collections::HashMap;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::Error;

pub use cache::TokenCache;
pub use token::AccessToken;

fn default_api_base_url() -> String {
    "https://api.pingone.com/v1".to_string()
}

fn default_auth_base_url() -> String {
    "https://auth.pingone.com".to_string()
}

/// A configured worker credential. One instance may serve many concurrent
/// authentication attempts; nothing here is mutated after load.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerCredential {
    pub client_id: String,
    /// Label resolved through a [`SecretSource`]; the secret itself never
    /// lives in configuration.
    pub client_secret_ref: String,
    pub environment_id: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
}

/// Resolves client secrets from an external backend.
pub trait SecretSource: Send + Sync {
    /// Resolve the secret identified by `reference`.
    ///
    /// # Errors
    /// Returns [`Error::Credential`] when no valid secret exists for the
    /// reference.
    fn resolve(&self, reference: &str) -> Result<SecretString, Error>;
}

/// In-memory [`SecretSource`] for embedding applications that load secrets
/// at startup, and for tests.
#[derive(Default)]
pub struct StaticSecrets {
    secrets: HashMap<String, SecretString>,
}

impl StaticSecrets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, secret: SecretString) {
        self.secrets.insert(reference.into(), secret);
    }
}

impl SecretSource for StaticSecrets {
    fn resolve(&self, reference: &str) -> Result<SecretString, Error> {
        self.secrets.get(reference).cloned().ok_or_else(|| {
            Error::Credential(format!("no valid secret found for label: {reference}"))
        })
    }
}

fn default_enabled() -> bool {
    true
}

/// Workers configured for one tenant. A disabled tenant hides all of its
/// workers from lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantWorkers {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub workers: HashMap<String, WorkerCredential>,
}

impl Default for TenantWorkers {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: HashMap::new(),
        }
    }
}

/// Registry of worker credentials, looked up by `(tenant, name)`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerDirectory {
    #[serde(default)]
    tenants: HashMap<String, TenantWorkers>,
}

impl WorkerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        tenant: impl Into<String>,
        name: impl Into<String>,
        credential: WorkerCredential,
    ) {
        self.tenants
            .entry(tenant.into())
            .or_default()
            .workers
            .insert(name.into(), credential);
    }

    pub fn set_enabled(&mut self, tenant: impl Into<String>, enabled: bool) {
        self.tenants.entry(tenant.into()).or_default().enabled = enabled;
    }

    /// Look up a worker by tenant and name.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when the tenant is unknown or
    /// disabled, or the worker name is not configured for it.
    pub fn get(&self, tenant: &str, name: &str) -> Result<&WorkerCredential, Error> {
        let tenant_workers = self
            .tenants
            .get(tenant)
            .ok_or_else(|| Error::Configuration(format!("unknown tenant: {tenant}")))?;

        if !tenant_workers.enabled {
            return Err(Error::Configuration(format!(
                "worker configuration is disabled for tenant: {tenant}"
            )));
        }

        tenant_workers
            .workers
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("worker not found: {name}")))
    }
}
