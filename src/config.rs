use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;

use crate::extensions::StatsRecorder;
use crate::retry::RetryPolicy;

/// Environment variable that turns on request/response dumps when set to `1`.
pub const DEBUG_ENV: &str = "REQCHAIN_DEBUG";

const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Settings for the connection layer shared by every builder of an agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub proxy: Option<String>,
    /// `0` disables redirect following.
    pub max_redirects: u32,
    /// Reuse pooled connections between requests.
    pub keep_alive: bool,
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            proxy: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            keep_alive: false,
            user_agent: None,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = Some(connect_timeout);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Defaults every builder created by an [`Agent`](crate::Agent) starts from.
#[derive(Clone, Default)]
pub struct AgentConfig {
    pub debug: bool,
    pub curl_command: bool,
    pub default_headers: HeaderMap,
    pub retry_policy: RetryPolicy,
    pub transport: TransportConfig,
    pub stats_recorder: Option<Arc<dyn StatsRecorder>>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AgentConfig")
            .field("debug", &self.debug)
            .field("curl_command", &self.curl_command)
            .field("default_headers", &self.default_headers)
            .field("retry_policy", &self.retry_policy)
            .field("transport", &self.transport)
            .field("stats_recorder", &self.stats_recorder.is_some())
            .finish()
    }
}

impl AgentConfig {
    /// Default configuration with debug mode taken from [`DEBUG_ENV`].
    pub fn from_env() -> Self {
        let debug = std::env::var(DEBUG_ENV).is_ok_and(|value| value == "1");
        Self::default().with_debug(debug)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_curl_command(mut self, curl_command: bool) -> Self {
        self.curl_command = curl_command;
        self
    }

    pub fn with_default_headers(mut self, default_headers: HeaderMap) -> Self {
        self.default_headers = default_headers;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_stats_recorder(mut self, stats_recorder: Arc<dyn StatsRecorder>) -> Self {
        self.stats_recorder = Some(stats_recorder);
        self
    }
}
