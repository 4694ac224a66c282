//! Out-of-band cache priming
//!
//! Pages post two kinds of messages to the agent:
//!
//! - `stitch:raw`: the source of a wrapped payload the page already ran,
//!   sent by the script wrapper on first load before the agent could see
//!   the request
//! - `stitch:precache`: a bundle URL to fetch and cache ahead of need
//!
//! Anything else is ignored.

use super::{Agent, Settle};
use crate::bundle::{extract, matches};
use crate::error::{Result, StitchError};
use crate::wire::split;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentMessage {
    #[serde(rename = "stitch:raw")]
    Raw {
        #[serde(default)]
        base: Option<String>,
        payload: String,
    },

    #[serde(rename = "stitch:precache")]
    Precache { url: String },

    #[serde(other)]
    Unknown,
}

impl AgentMessage {
    /// Decode a posted message body.
    ///
    /// Anything that is not a well-formed known message decodes to
    /// [`AgentMessage::Unknown`].
    pub fn from_slice(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(message) => message,
            Err(e) => {
                debug!("Unreadable agent message: {}", e);
                AgentMessage::Unknown
            }
        }
    }
}

impl Agent {
    /// Start handling `message` in the background.
    ///
    /// Returns `None` for messages that need no work.
    pub fn handle_message(&self, message: AgentMessage) -> Option<Settle> {
        let agent = self.clone();

        match message {
            AgentMessage::Raw { base, payload } => Some(Settle::spawn(async move {
                match agent.load_raw(&payload).await {
                    Ok(stored) => info!("Primed {} bundles from raw payload (base {:?})", stored, base),
                    Err(e) => warn!("Ignoring raw payload: {}", e),
                }
            })),
            AgentMessage::Precache { url } => Some(Settle::spawn(async move {
                match agent.precache(&url).await {
                    Ok(stored) => info!("Precached {} bundles from {}", stored, url),
                    Err(e) => warn!("Precache of {} failed: {}", url, e),
                }
            })),
            AgentMessage::Unknown => {
                debug!("Ignoring unknown agent message");
                None
            }
        }
    }

    /// Split a payload the page executed and store its cacheable chunks
    pub async fn load_raw(&self, payload: &str) -> Result<usize> {
        let chunks = split(payload, self.inner.config.kind)?;
        Ok(self.inner.cache.fill(&chunks).await)
    }

    /// Fetch a bundle URL (absolute, or relative to the origin) and cache it
    pub async fn precache(&self, url: &str) -> Result<usize> {
        let config = &self.inner.config;
        let url = config
            .origin
            .join(url)
            .map_err(|e| StitchError::Config(format!("invalid precache URL {}: {}", url, e)))?;

        if !matches(url.as_str(), &Method::GET, &config.namespace) {
            return Err(StitchError::Config(format!(
                "{} is outside /{}/",
                url, config.namespace
            )));
        }

        let expected: Vec<String> = extract(url.as_str(), &config.namespace)
            .into_iter()
            .map(|r| r.id)
            .collect();

        let chunks = self
            .fetch_chunks(&url, &expected)
            .await
            .map_err(|failure| failure.error)?;
        Ok(self.inner.cache.fill(&chunks).await)
    }
}
