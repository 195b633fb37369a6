use std::sync::Arc;
use std::time::Instant;

use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info_span};

use crate::accumulator::{AccumulatedData, QueryParameters, header_pairs};
use crate::config::AgentConfig;
use crate::curl::to_curl_command;
use crate::descriptor::{BasicAuth, Cookie, RequestContext, RequestDescriptor};
use crate::encode::encode_with_boundary;
use crate::error::{Error, ErrorList};
use crate::extensions::{RequestStats, Sleeper, StatsRecorder};
use crate::file::{FileAttachment, FileOptions, FileSource, register};
use crate::media_type::{MediaType, TargetEncoding, resolve};
use crate::multipart::random_boundary;
use crate::response::{Decoded, Response};
use crate::retry::{RetryPolicy, is_known_status, run_with_retry};
use crate::transport::Transport;
use crate::util::{
    append_query_pairs, parse_header_name, parse_header_value, parse_uri, redact_uri_for_logs,
    truncate_body,
};
use crate::value::SendValue;

/// Fluent accumulator for one request.
///
/// Every mutator consumes and returns the builder. Faults are recorded rather
/// than returned, and surface from [`RequestBuilder::build`] or
/// [`RequestBuilder::end`]. Cloning deep-copies all accumulated state and
/// shares the transport.
#[derive(Clone)]
pub struct RequestBuilder {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    stats_recorder: Option<Arc<dyn StatsRecorder>>,
    method: Method,
    url: String,
    headers: HeaderMap,
    target: TargetEncoding,
    forced: Option<MediaType>,
    data: AccumulatedData,
    query: QueryParameters,
    files: Vec<FileAttachment>,
    basic_auth: Option<BasicAuth>,
    cookies: Vec<Cookie>,
    retry_policy: RetryPolicy,
    context: Option<RequestContext>,
    debug: bool,
    curl_command: bool,
    stats: RequestStats,
    boundary: String,
    errors: Vec<Error>,
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &redact_uri_for_logs(&self.url))
            .field("target", &self.target)
            .field("forced", &self.forced)
            .field("files", &self.files.len())
            .field("retry_policy", &self.retry_policy)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
        config: &AgentConfig,
        method: Method,
        url: impl Into<String>,
    ) -> Self {
        let target = if method == Method::GET {
            TargetEncoding::Unset
        } else {
            TargetEncoding::Json
        };
        Self {
            transport,
            sleeper,
            stats_recorder: config.stats_recorder.clone(),
            method,
            url: url.into(),
            headers: config.default_headers.clone(),
            target,
            forced: None,
            data: AccumulatedData::default(),
            query: QueryParameters::default(),
            files: Vec::new(),
            basic_auth: None,
            cookies: Vec::new(),
            retry_policy: config.retry_policy.clone(),
            context: None,
            debug: config.debug,
            curl_command: config.curl_command,
            stats: RequestStats::default(),
            boundary: random_boundary(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn with_error(mut self, error: Error) -> Self {
        self.errors.push(error);
        self
    }

    /// Accumulates one body value.
    ///
    /// Strings are read as JSON first, then as a query string, and kept
    /// verbatim otherwise. A string read as a query string makes form the
    /// default encoding.
    pub fn send(mut self, value: impl Into<SendValue>) -> Self {
        match self.data.ingest(value.into()) {
            Ok(Some(preferred)) => self.target = preferred,
            Ok(None) => {}
            Err(error) => self.errors.push(error),
        }
        self
    }

    pub fn send_string(self, content: impl Into<String>) -> Self {
        self.send(SendValue::String(content.into()))
    }

    /// Serializes `record` and merges its top-level keys.
    pub fn send_record<T>(self, record: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match SendValue::record(record) {
            Ok(value) => self.send(value),
            Err(error) => self.with_error(error),
        }
    }

    pub fn send_slice<T>(self, items: &[T]) -> Self
    where
        T: Serialize,
    {
        match SendValue::sequence(items) {
            Ok(value) => self.send(value),
            Err(error) => self.with_error(error),
        }
    }

    pub fn send_map(self, map: Map<String, Value>) -> Self {
        self.send(SendValue::Map(map))
    }

    /// Attaches a file under the default `file{N}` field name.
    pub fn send_file(self, source: impl Into<FileSource>) -> Self {
        self.send_file_with(source, FileOptions::default())
    }

    pub fn send_file_with(mut self, source: impl Into<FileSource>, options: FileOptions) -> Self {
        match register(source.into(), options, self.files.len()) {
            Ok(attachment) => self.files.push(attachment),
            Err(error) => self.errors.push(error),
        }
        self
    }

    /// Adds query parameters from a JSON object string, a query string, a
    /// record or a map. Other kinds are ignored.
    pub fn query(mut self, value: impl Into<SendValue>) -> Self {
        if let Err(error) = self.query.ingest(value.into()) {
            self.errors.push(error);
        }
        self
    }

    pub fn query_record<T>(self, record: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match SendValue::record(record) {
            Ok(value) => self.query(value),
            Err(error) => self.with_error(error),
        }
    }

    /// Adds one query pair verbatim. Unlike [`RequestBuilder::query`], `;`
    /// is not special.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(key, value);
        self
    }

    /// Forces the body encoding by type name (`json`, `form`, `multipart`,
    /// ...). An unknown name is recorded and the previous choice is kept.
    pub fn force_type(mut self, name: &str) -> Self {
        match MediaType::from_name(name) {
            Some(media_type) => self.forced = Some(media_type),
            None => self.errors.push(Error::UnknownType {
                name: name.to_owned(),
            }),
        }
        self
    }

    /// Replaces every value of the header `name`.
    pub fn set(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(error) => self.errors.push(error),
        }
        self
    }

    /// Adds a value to the header `name`, keeping existing ones.
    pub fn append_header(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(error) => self.errors.push(error),
        }
        self
    }

    /// Appends one header per top-level key of `headers`. Values that are
    /// not scalars are skipped.
    pub fn set_headers<T>(self, headers: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        let pairs = serde_json::to_value(headers)
            .map_err(Error::decode_record)
            .and_then(header_pairs);
        match pairs {
            Ok(pairs) => pairs
                .iter()
                .fold(self, |builder, (name, value)| builder.append_header(name, value)),
            Err(error) => self.with_error(error),
        }
    }

    pub fn user_agent(self, user_agent: &str) -> Self {
        self.append_header(USER_AGENT.as_str(), user_agent)
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn add_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn add_cookies(mut self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Enables retrying up to `max_attempts` times, `delay` apart, on a
    /// transport error or one of `statuses`. Unknown status codes are
    /// recorded and leave the policy unchanged.
    pub fn retry(
        mut self,
        max_attempts: usize,
        delay: std::time::Duration,
        statuses: impl IntoIterator<Item = u16>,
    ) -> Self {
        let statuses: Vec<u16> = statuses.into_iter().collect();
        let unknown: Vec<u16> = statuses
            .iter()
            .copied()
            .filter(|code| !is_known_status(*code))
            .collect();
        if unknown.is_empty() {
            self.retry_policy = RetryPolicy::new(max_attempts, delay, statuses);
        } else {
            self.errors.extend(
                unknown
                    .into_iter()
                    .map(|code| Error::UnknownStatusCode { code }),
            );
        }
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn set_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn set_curl_command(mut self, curl_command: bool) -> Self {
        self.curl_command = curl_command;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn data(&self) -> &AccumulatedData {
        &self.data
    }

    pub fn query_parameters(&self) -> &QueryParameters {
        &self.query
    }

    pub fn files(&self) -> &[FileAttachment] {
        &self.files
    }

    pub fn target_encoding(&self) -> TargetEncoding {
        self.target
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Statistics of the last completed [`RequestBuilder::end`].
    pub fn stats(&self) -> RequestStats {
        self.stats
    }

    /// Encodes the accumulated state into an execution-ready request.
    ///
    /// Fails without doing any work when faults were recorded earlier. A
    /// fault found while building is recorded too, so later calls keep
    /// failing with it.
    pub fn build(&mut self) -> Result<RequestDescriptor, ErrorList> {
        if !self.errors.is_empty() {
            return Err(ErrorList::new(self.errors.clone()));
        }
        self.try_build().map_err(|error| {
            self.errors.push(error);
            ErrorList::new(self.errors.clone())
        })
    }

    fn try_build(&mut self) -> crate::Result<RequestDescriptor> {
        let content_type_header = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        self.target = resolve(self.forced, content_type_header, self.target)?;
        self.data.force_raw_fallback_if_mixed();

        let body = encode_with_boundary(
            self.target,
            &self.data,
            &self.headers,
            &self.files,
            &self.boundary,
        )?;

        let url = append_query_pairs(&self.url, self.query.pairs());
        parse_uri(&url)?;

        let mut headers = self.headers.clone();
        let host = headers
            .remove(HOST)
            .and_then(|value| value.to_str().ok().map(str::to_owned));

        let body = body.map(|encoded| {
            let has_content_type = headers
                .get(CONTENT_TYPE)
                .is_some_and(|value| !value.is_empty());
            if !has_content_type {
                if let Ok(value) = parse_header_value(CONTENT_TYPE.as_str(), &encoded.content_type)
                {
                    headers.insert(CONTENT_TYPE, value);
                }
            }
            encoded.bytes
        });

        let basic_auth = self
            .basic_auth
            .clone()
            .filter(|auth| !auth.username.is_empty() || !auth.password.is_empty());

        Ok(RequestDescriptor {
            method: self.method.clone(),
            url,
            headers,
            host,
            body,
            basic_auth,
            cookies: self.cookies.clone(),
            context: self.context.clone(),
        })
    }

    /// Renders the request as a `curl` command line without sending it.
    pub fn as_curl_command(&mut self) -> Result<String, ErrorList> {
        let request = self.build()?;
        to_curl_command(&request).map_err(ErrorList::from)
    }

    /// Builds the request once and sends it, retrying per the retry policy.
    ///
    /// Transport failures are returned but not recorded, so the builder can
    /// be ended again.
    pub fn end(&mut self) -> Result<Response, ErrorList> {
        let request = self.build()?;
        self.retry_policy.reset();

        if self.debug {
            debug!(
                method = %request.method(),
                uri = %request.url(),
                headers = ?request.headers(),
                body = %request.body().map(|body| truncate_body(body)).unwrap_or_default(),
                "request dump"
            );
        }
        if self.curl_command {
            match to_curl_command(&request) {
                Ok(command) => debug!(command = %command, "curl command"),
                Err(error) => debug!(error = %error, "curl command unavailable"),
            }
        }

        let transport = Arc::clone(&self.transport);
        let sleeper = Arc::clone(&self.sleeper);
        let redacted_uri = redact_uri_for_logs(request.url());
        let trace_id = request
            .context()
            .and_then(RequestContext::trace_id)
            .unwrap_or_default()
            .to_owned();
        let mut last_duration = std::time::Duration::ZERO;

        let outcome = run_with_retry(&mut self.retry_policy, sleeper.as_ref(), |attempt| {
            let span = info_span!(
                "reqchain.request",
                method = %request.method(),
                uri = %redacted_uri,
                attempt,
                trace_id = %trace_id
            );
            let _entered = span.enter();
            debug!("sending request");
            let started_at = Instant::now();
            let outcome = transport.execute(&request);
            last_duration = started_at.elapsed();
            if let Ok(response) = &outcome {
                debug!(
                    status = response.status().as_u16(),
                    elapsed_ms = last_duration.as_millis() as u64,
                    "request completed"
                );
            }
            outcome
        });

        let response = outcome.map_err(ErrorList::from)?;
        if self.debug {
            debug!(
                status = response.status().as_u16(),
                headers = ?response.headers(),
                body = %truncate_body(response.body()),
                "response dump"
            );
        }

        self.stats = RequestStats {
            request_bytes: request.content_length(),
            response_bytes: response.body().len() as u64,
            duration: last_duration,
        };
        if let Some(recorder) = &self.stats_recorder {
            recorder.record(&self.stats);
        }
        Ok(response)
    }

    /// Sends the request and decodes a JSON response body into `T`.
    ///
    /// A decoding fault does not discard the response; it is returned next to
    /// it in [`Decoded::value`].
    pub fn end_struct<T>(&mut self) -> Result<Decoded<T>, ErrorList>
    where
        T: DeserializeOwned,
    {
        let response = self.end()?;
        let value = response.json();
        Ok(Decoded { response, value })
    }
}

fn parse_header(
    name: &str,
    value: &str,
) -> crate::Result<(http::HeaderName, http::HeaderValue)> {
    let name = parse_header_name(name)?;
    let value = parse_header_value(name.as_str(), value)?;
    Ok((name, value))
}
