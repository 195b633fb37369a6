use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::media_type::MIME_JSON;

/// Header stamped on the final response with the number of retries performed.
pub const RETRY_COUNT_HEADER: &str = "retry-count";

/// A fully read response. The body is buffered and can be read any number of
/// times.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Media type of the response without parameters.
    pub fn media_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(strip_parameters)
            .unwrap_or_default()
    }

    pub fn retry_count(&self) -> Option<usize> {
        self.headers
            .get(RETRY_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }

    pub(crate) fn set_retry_count(&mut self, retries: usize) {
        self.headers
            .insert(RETRY_COUNT_HEADER, HeaderValue::from(retries));
    }

    /// Decodes the body as JSON. A failure on a response whose media type is
    /// not `application/json` is reported as an unexpected content type.
    pub fn json<T>(&self) -> crate::Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body).map_err(|source| {
            let media_type = self.media_type();
            if media_type == MIME_JSON {
                Error::DecodeResponseJson {
                    source: Arc::new(source),
                }
            } else {
                Error::UnexpectedContentType {
                    content_type: media_type.to_owned(),
                    source: Arc::new(source),
                }
            }
        })
    }
}

/// A response together with the outcome of decoding its body. Decode
/// failures never discard the response.
#[derive(Debug)]
pub struct Decoded<T> {
    pub response: Response,
    pub value: crate::Result<T>,
}

impl<T> Decoded<T> {
    pub fn into_value(self) -> crate::Result<T> {
        self.value
    }
}

fn strip_parameters(content_type: &str) -> &str {
    content_type
        .split([';', ' '])
        .next()
        .unwrap_or(content_type)
}
