//! Caller-owned client bound to a backend credential

use super::gemini::GeminiLiveTransport;
use super::{LiveConnector, LiveTransport, TransportSink};
use crate::session::config::LiveConfig;
use crate::{LiveError, Result};
use async_trait::async_trait;

/// Default websocket endpoint of the live API
pub const DEFAULT_LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Environment variables checked for the API key, in order
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Clone)]
pub struct GenAiClient {
    api_key: String,
    endpoint: String,
}

impl GenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LiveError::ConfigError("API key is empty".into()));
        }

        Ok(Self {
            api_key,
            endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
        })
    }

    /// Build a client from `GEMINI_API_KEY` or `API_KEY`
    pub fn from_env() -> Result<Self> {
        API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                LiveError::ConfigError(format!(
                    "no API key found, set one of {}",
                    API_KEY_VARS.join(", ")
                ))
            })
            .and_then(Self::new)
    }

    /// Point the client at another live endpoint (proxies, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Endpoint URL with the key attached
    pub(crate) fn live_url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, separator, self.api_key)
    }

    /// Open a live session
    pub async fn connect_live(
        &self,
        config: &LiveConfig,
        events: TransportSink,
    ) -> Result<GeminiLiveTransport> {
        GeminiLiveTransport::connect(&self.live_url(), config, events).await
    }
}

#[async_trait]
impl LiveConnector for GenAiClient {
    async fn connect(
        &self,
        config: &LiveConfig,
        events: TransportSink,
    ) -> Result<Box<dyn LiveTransport>> {
        let transport = self.connect_live(config, events).await?;
        Ok(Box::new(transport))
    }
}

impl std::fmt::Debug for GenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
