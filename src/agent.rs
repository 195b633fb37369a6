use std::sync::Arc;

use http::Method;

use crate::config::AgentConfig;
use crate::error::Error;
use crate::extensions::{Sleeper, ThreadSleeper};
use crate::request::RequestBuilder;
use crate::transport::{Transport, UreqTransport};

/// Factory for [`RequestBuilder`]s sharing one transport and configuration.
///
/// Cloning an agent is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Agent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Agent with default transport settings and debug mode read from the
    /// environment.
    pub fn new() -> Self {
        let config = AgentConfig::from_env();
        let transport = UreqTransport::direct(config.transport.clone());
        Self::with_transport(config, Arc::new(transport))
    }

    /// Fails when the configured proxy cannot be parsed.
    pub fn with_config(config: AgentConfig) -> crate::Result<Self> {
        let transport = UreqTransport::new(config.transport.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Agent executing requests through `transport`. `config.transport` is
    /// not consulted.
    pub fn with_transport(config: AgentConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(ThreadSleeper),
            config,
        }
    }

    /// Replaces the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Starts a request. `GET` starts without a body encoding, every other
    /// method starts with JSON.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.sleeper),
            &self.config,
            method,
            url,
        )
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::OPTIONS, url)
    }

    /// Starts a request with a method given by name. A name that is not a
    /// valid method token is recorded on the returned builder.
    pub fn custom_method(&self, method: &str, url: impl Into<String>) -> RequestBuilder {
        match Method::from_bytes(method.as_bytes()) {
            Ok(method) => self.request(method, url),
            Err(_) => self
                .request(Method::GET, url)
                .with_error(Error::InvalidMethod {
                    method: method.to_owned(),
                }),
        }
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use http::header::ACCEPT;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};

    use super::Agent;
    use crate::config::{AgentConfig, TransportConfig};
    use crate::descriptor::RequestDescriptor;
    use crate::error::ErrorCode;
    use crate::media_type::TargetEncoding;
    use crate::response::Response;
    use crate::retry::RetryPolicy;
    use crate::transport::Transport;

    #[derive(Default)]
    struct EchoTransport {
        methods: Mutex<Vec<Method>>,
    }

    impl Transport for EchoTransport {
        fn execute(&self, request: &RequestDescriptor) -> crate::Result<Response> {
            self.methods
                .lock()
                .expect("methods lock")
                .push(request.method().clone());
            Ok(Response::new(StatusCode::NO_CONTENT, HeaderMap::new(), ""))
        }
    }

    #[test]
    fn get_starts_unset_and_other_methods_start_json() {
        let agent = Agent::with_transport(
            AgentConfig::default(),
            Arc::new(EchoTransport::default()),
        );
        assert_eq!(
            agent.get("http://example.com/").target_encoding(),
            TargetEncoding::Unset
        );
        for builder in [
            agent.post("http://example.com/"),
            agent.put("http://example.com/"),
            agent.patch("http://example.com/"),
            agent.delete("http://example.com/"),
            agent.head("http://example.com/"),
            agent.options("http://example.com/"),
        ] {
            assert_eq!(builder.target_encoding(), TargetEncoding::Json);
        }
    }

    #[test]
    fn custom_method_dispatches_known_and_unknown_names() {
        let transport = Arc::new(EchoTransport::default());
        let agent = Agent::with_transport(AgentConfig::default(), transport.clone());

        assert_eq!(
            agent
                .custom_method("GET", "http://example.com/")
                .target_encoding(),
            TargetEncoding::Unset
        );
        let mut purge = agent.custom_method("PURGE", "http://example.com/");
        assert_eq!(purge.target_encoding(), TargetEncoding::Json);
        purge.end().expect("custom method is sent");
        assert_eq!(
            *transport.methods.lock().expect("methods lock"),
            vec![Method::from_bytes(b"PURGE").expect("valid token")]
        );

        let invalid = agent.custom_method("BAD METHOD", "http://example.com/");
        assert_eq!(invalid.errors()[0].code(), ErrorCode::InvalidMethod);
    }

    #[test]
    fn builders_inherit_config_defaults() {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let config = AgentConfig::default()
            .with_default_headers(default_headers)
            .with_retry_policy(RetryPolicy::new(2, Duration::ZERO, [503]));
        let agent = Agent::with_transport(config, Arc::new(EchoTransport::default()));

        let builder = agent.get("http://example.com/");
        assert_eq!(builder.headers()[ACCEPT], "application/json");
        assert_eq!(builder.retry_policy().max_attempts(), 2);

        let overridden = agent.get("http://example.com/").retry(0, Duration::ZERO, []);
        assert_eq!(overridden.retry_policy().max_attempts(), 0);
        assert_eq!(agent.config().retry_policy.max_attempts(), 2);
    }

    #[test]
    fn invalid_proxy_fails_agent_construction() {
        let config =
            AgentConfig::default().with_transport(TransportConfig::default().with_proxy("http://[::1"));
        let error = Agent::with_config(config).expect_err("proxy must parse");
        assert_eq!(error.code(), ErrorCode::InvalidProxy);
    }
}
