use std::time::Duration;

use url::Url;

use crate::error::Error;

pub(crate) const APP_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// An unreachable endpoint must fail the authentication step quickly rather
// than hang the whole journey.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

pub(crate) fn client() -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Join `path` onto a validated base URL, preserving any base path segment.
pub(crate) fn endpoint_url(base: &str, path: &str) -> Result<String, Error> {
    let url = Url::parse(base)
        .map_err(|e| Error::Configuration(format!("error parsing URL {base}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(Error::Configuration(format!(
                "error parsing URL {base}: unsupported scheme {scheme}"
            )));
        }
    }

    if url.host().is_none() {
        return Err(Error::Configuration(format!(
            "error parsing URL {base}: no host specified"
        )));
    }

    Ok(format!("{}{}", base.trim_end_matches('/'), path))
}
