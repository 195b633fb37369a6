use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::config::TransportConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::Error;
use crate::response::Response;
use crate::util::redact_uri_for_logs;

/// Executes one request attempt. Implementations must not turn HTTP error
/// statuses into errors and must return a fully read body.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &RequestDescriptor) -> crate::Result<Response>;
}

/// Blocking transport backed by a pooled `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    config: TransportConfig,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UreqTransport")
            .field("config", &self.config)
            .finish()
    }
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> crate::Result<Self> {
        let proxy = config
            .proxy
            .as_deref()
            .map(|proxy| {
                ureq::Proxy::new(proxy).map_err(|source| Error::InvalidProxy {
                    proxy: proxy.to_owned(),
                    source: Arc::new(source),
                })
            })
            .transpose()?;
        Ok(Self::with_proxy(config, proxy))
    }

    /// Transport for a configuration without a proxy, which cannot fail.
    pub(crate) fn direct(mut config: TransportConfig) -> Self {
        config.proxy = None;
        Self::with_proxy(config, None)
    }

    fn with_proxy(config: TransportConfig, proxy: Option<ureq::Proxy>) -> Self {
        let idle_connections = if config.keep_alive { 10 } else { 0 };
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(config.max_redirects)
            .max_idle_connections(idle_connections)
            .max_idle_connections_per_host(idle_connections)
            .timeout_global(config.timeout)
            .timeout_connect(config.connect_timeout)
            .proxy(proxy);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        Self {
            agent: builder.build().new_agent(),
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn attempt_timeout(&self, request: &RequestDescriptor) -> crate::Result<Option<Duration>> {
        let remaining = request.context().and_then(|context| context.remaining());
        match (remaining, self.config.timeout) {
            (Some(remaining), _) if remaining.is_zero() => Err(Error::Timeout {
                timeout_ms: 0,
                method: request.method().clone(),
                uri: redact_uri_for_logs(request.url()),
            }),
            (Some(remaining), Some(timeout)) => Ok(Some(remaining.min(timeout))),
            (Some(remaining), None) => Ok(Some(remaining)),
            (None, timeout) => Ok(timeout),
        }
    }

    fn run<S: ureq::AsSendBody>(
        &self,
        request: ureq::http::Request<S>,
        descriptor: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> crate::Result<Response> {
        let request = self
            .agent
            .configure_request(request)
            .timeout_global(timeout)
            .build();
        let mut response = self.agent.run(request).map_err(|source| match source {
            ureq::Error::Timeout(_) => Error::Timeout {
                timeout_ms: timeout.map_or(0, |timeout| timeout.as_millis()),
                method: descriptor.method().clone(),
                uri: redact_uri_for_logs(descriptor.url()),
            },
            other => Error::Transport {
                method: descriptor.method().clone(),
                uri: redact_uri_for_logs(descriptor.url()),
                source: Arc::new(other),
            },
        })?;

        let mut body = Vec::new();
        response
            .body_mut()
            .as_reader()
            .read_to_end(&mut body)
            .map_err(|source| Error::ReadBody {
                source: Arc::new(source),
            })?;
        let status = response.status();
        let headers = response.headers().clone();
        Ok(Response::new(status, headers, Bytes::from(body)))
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &RequestDescriptor) -> crate::Result<Response> {
        if request
            .context()
            .is_some_and(|context| context.is_cancelled())
        {
            return Err(Error::Cancelled {
                method: request.method().clone(),
                uri: redact_uri_for_logs(request.url()),
            });
        }
        let timeout = self.attempt_timeout(request)?;

        let mut builder = ureq::http::Request::builder()
            .method(request.method().clone())
            .uri(request.url());
        for (name, value) in &request.wire_headers()? {
            builder = builder.header(name, value);
        }
        let build_error = |source: ureq::http::Error| Error::RequestBuild {
            source: Arc::new(source),
        };
        match request.body() {
            Some(body) => {
                let http_request = builder.body(body.to_vec()).map_err(build_error)?;
                self.run(http_request, request, timeout)
            }
            None => {
                let http_request = builder.body(()).map_err(build_error)?;
                self.run(http_request, request, timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use http::{HeaderMap, Method};

    use super::{Transport, UreqTransport};
    use crate::config::TransportConfig;
    use crate::descriptor::{RequestContext, RequestDescriptor};
    use crate::error::ErrorCode;

    fn descriptor(context: Option<RequestContext>) -> RequestDescriptor {
        RequestDescriptor {
            method: Method::GET,
            url: "http://127.0.0.1:9/never?token=secret".to_owned(),
            headers: HeaderMap::new(),
            host: None,
            body: None,
            basic_auth: None,
            cookies: Vec::new(),
            context,
        }
    }

    #[test]
    fn cancelled_context_fails_before_sending() {
        let transport = UreqTransport::direct(TransportConfig::default());
        let context = RequestContext::new();
        context.cancel();

        let error = transport
            .execute(&descriptor(Some(context)))
            .expect_err("cancelled request fails");
        assert_eq!(error.code(), ErrorCode::Cancelled);
        assert!(!error.to_string().contains("secret"));
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        let transport = UreqTransport::direct(TransportConfig::default());
        let context = RequestContext::new().with_deadline(Instant::now());

        let error = transport
            .execute(&descriptor(Some(context)))
            .expect_err("expired deadline fails");
        assert_eq!(error.code(), ErrorCode::Timeout);
    }

    #[test]
    fn deadline_caps_configured_timeout() {
        let transport = UreqTransport::direct(
            TransportConfig::default().with_timeout(Duration::from_secs(60)),
        );
        let context = RequestContext::new().with_timeout(Duration::from_secs(5));
        let timeout = transport
            .attempt_timeout(&descriptor(Some(context)))
            .expect("deadline in the future")
            .expect("timeout applies");
        assert!(timeout <= Duration::from_secs(5));
    }

    #[test]
    fn invalid_proxy_is_rejected() {
        let error = UreqTransport::new(TransportConfig::default().with_proxy("http://[::1"))
            .expect_err("proxy must parse");
        assert_eq!(error.code(), ErrorCode::InvalidProxy);
    }
}
