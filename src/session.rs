use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::watch;

use crate::config::RemoteConfig;
use crate::debug_log;
use crate::reqwest_simd_json::ResponseSimdJsonExt;

/// Stable identifier of an authenticated user. Namespaces remote documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answers whether a caller is authenticated, and as whom.
pub trait SessionGate: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Receiver that observes every sign-in and sign-out.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

#[derive(Deserialize)]
struct SessionResponse {
    uid: String,
}

pub fn build_http_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .context("Failed to create HTTP client")
}

/// Session backed by the hosted auth service, authenticated with an API token.
pub struct TokenSession {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    identity: watch::Sender<Option<Identity>>,
}

impl TokenSession {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let (identity, _) = watch::channel(None);
        Ok(Self {
            client: build_http_client(config.timeout_seconds)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            identity,
        })
    }

    /// Ask the auth service who the token belongs to. `Ok(None)` means the
    /// token was rejected.
    async fn fetch_identity(&self) -> Result<Option<Identity>> {
        let response = self
            .client
            .get(format!("{}/api/session", self.base_url))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("Failed to reach auth service")?;

        let status = response.status();
        if !status.is_success() {
            match status.as_u16() {
                401 | 403 => return Ok(None),
                code => anyhow::bail!("Auth service returned {code}"),
            }
        }

        let session: SessionResponse = response.simd_json().await?;
        if session.uid.is_empty() {
            anyhow::bail!("Auth service returned an empty user id");
        }
        Ok(Some(Identity::new(session.uid)))
    }

    /// Resolve the token to a user id and publish it to watchers.
    pub async fn sign_in(&self) -> Result<Identity> {
        let identity = self
            .fetch_identity()
            .await?
            .context("Invalid API token")?;

        debug_log::log("SESSION", "SIGNED_IN", identity.as_str());
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    /// Re-check the token. A rejected token signs the session out; an
    /// unreachable auth service leaves it as it is.
    pub async fn refresh(&self) -> Result<()> {
        match self.fetch_identity().await? {
            Some(identity) => {
                if self.current_identity().as_ref() != Some(&identity) {
                    debug_log::log("SESSION", "SIGNED_IN", identity.as_str());
                    self.identity.send_replace(Some(identity));
                }
            }
            None => self.sign_out(),
        }
        Ok(())
    }

    pub fn sign_out(&self) {
        debug_log::log("SESSION", "SIGNED_OUT", "");
        self.identity.send_replace(None);
    }
}

impl SessionGate for TokenSession {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

/// Fixed identity for tests.
#[cfg(test)]
pub struct StaticSession {
    identity: watch::Sender<Option<Identity>>,
}

#[cfg(test)]
impl StaticSession {
    pub fn signed_in(id: &str) -> Self {
        let (identity, _) = watch::channel(Some(Identity::new(id)));
        Self { identity }
    }

    pub fn signed_out() -> Self {
        let (identity, _) = watch::channel(None);
        Self { identity }
    }

    pub fn set(&self, identity: Option<Identity>) {
        self.identity.send_replace(identity);
    }
}

#[cfg(test)]
impl SessionGate for StaticSession {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}
