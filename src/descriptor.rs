use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, HOST};
use http::{HeaderMap, HeaderValue, Method};

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Cancellation and tracing handle attached to a request.
///
/// Clones share the cancellation flag. Cancelling only makes a pending attempt
/// fail before it is sent; it does not cut short a retry delay.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    trace_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }
}

/// The execution-ready request produced by `build()`.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) host: Option<String>,
    pub(crate) body: Option<Bytes>,
    pub(crate) basic_auth: Option<BasicAuth>,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) context: Option<RequestContext>,
}

impl RequestDescriptor {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers as accumulated, without the derived `Host`, `Authorization`
    /// and `Cookie` lines. See [`RequestDescriptor::wire_headers`].
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn content_length(&self) -> u64 {
        self.body.as_ref().map_or(0, |body| body.len() as u64)
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    pub fn authorization_header(&self) -> Option<String> {
        self.basic_auth.as_ref().map(|auth| {
            let credentials = format!("{}:{}", auth.username, auth.password);
            format!("Basic {}", STANDARD.encode(credentials))
        })
    }

    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Every header line that goes on the wire, including the routing host,
    /// basic auth and cookies.
    pub fn wire_headers(&self) -> crate::Result<HeaderMap> {
        let mut headers = self.headers.clone();
        if let Some(host) = &self.host {
            headers.insert(HOST, header_value(HOST.as_str(), host)?);
        }
        if let Some(authorization) = self.authorization_header() {
            headers.insert(
                AUTHORIZATION,
                header_value(AUTHORIZATION.as_str(), &authorization)?,
            );
        }
        if let Some(cookies) = self.cookie_header() {
            let combined = match headers.get(COOKIE).and_then(|value| value.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{existing}; {cookies}"),
                _ => cookies,
            };
            headers.insert(COOKIE, header_value(COOKIE.as_str(), &combined)?);
        }
        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> crate::Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::InvalidHeaderValue {
        name: name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::header::{AUTHORIZATION, COOKIE, HOST};
    use http::{HeaderMap, HeaderValue, Method};

    use super::{BasicAuth, Cookie, RequestContext, RequestDescriptor};

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor {
            method: Method::GET,
            url: "http://example.com/".to_owned(),
            headers: HeaderMap::new(),
            host: None,
            body: None,
            basic_auth: None,
            cookies: Vec::new(),
            context: None,
        }
    }

    #[test]
    fn basic_auth_renders_base64_credentials() {
        let mut descriptor = descriptor();
        descriptor.basic_auth = Some(BasicAuth {
            username: "myuser".to_owned(),
            password: "mypass".to_owned(),
        });
        assert_eq!(
            descriptor.authorization_header().as_deref(),
            Some("Basic bXl1c2VyOm15cGFzcw==")
        );
    }

    #[test]
    fn wire_headers_add_host_auth_and_cookies() {
        let mut descriptor = descriptor();
        descriptor
            .headers
            .insert(COOKIE, HeaderValue::from_static("existing=1"));
        descriptor.host = Some("api.internal".to_owned());
        descriptor.basic_auth = Some(BasicAuth {
            username: "u".to_owned(),
            password: String::new(),
        });
        descriptor.cookies = vec![Cookie::new("a", "1"), Cookie::new("b", "2")];

        let headers = descriptor.wire_headers().expect("valid headers");
        assert_eq!(headers[HOST], "api.internal");
        assert_eq!(headers[AUTHORIZATION], "Basic dTo=");
        assert_eq!(headers[COOKIE], "existing=1; a=1; b=2");
    }

    #[test]
    fn context_clones_share_cancellation() {
        let context = RequestContext::new()
            .with_timeout(Duration::from_secs(30))
            .with_trace_id("trace-1");
        let clone = context.clone();
        clone.cancel();

        assert!(context.is_cancelled());
        assert_eq!(context.trace_id(), Some("trace-1"));
        assert!(context.remaining().is_some_and(|left| left <= Duration::from_secs(30)));
    }
}
