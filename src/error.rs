use std::path::PathBuf;
use std::sync::Arc;

use http::Method;
use thiserror::Error;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Broad fault families. Accumulation faults never interrupt a chain; they are
/// collected and surface when the request is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Validation,
    Encoding,
    Io,
    Decode,
    Network,
    ResponseDecode,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Validation => "validation",
            Self::Encoding => "encoding",
            Self::Io => "io",
            Self::Decode => "decode",
            Self::Network => "network",
            Self::ResponseDecode => "response_decode",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    UnknownType,
    UnknownStatusCode,
    EmptyMimeType,
    UnsupportedFileSource,
    InvalidHeaderName,
    InvalidHeaderValue,
    InvalidUri,
    InvalidMethod,
    InvalidProxy,
    UnresolvedEncoding,
    SerializeJson,
    SerializeForm,
    ReadFile,
    DecodeRecord,
    RecordNotObject,
    DecodeQuery,
    RequestBuild,
    Transport,
    Timeout,
    Cancelled,
    ReadBody,
    UnexpectedContentType,
    DecodeResponseJson,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownType => "unknown_type",
            Self::UnknownStatusCode => "unknown_status_code",
            Self::EmptyMimeType => "empty_mime_type",
            Self::UnsupportedFileSource => "unsupported_file_source",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::InvalidUri => "invalid_uri",
            Self::InvalidMethod => "invalid_method",
            Self::InvalidProxy => "invalid_proxy",
            Self::UnresolvedEncoding => "unresolved_encoding",
            Self::SerializeJson => "serialize_json",
            Self::SerializeForm => "serialize_form",
            Self::ReadFile => "read_file",
            Self::DecodeRecord => "decode_record",
            Self::RecordNotObject => "record_not_object",
            Self::DecodeQuery => "decode_query",
            Self::RequestBuild => "request_build",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::ReadBody => "read_body",
            Self::UnexpectedContentType => "unexpected_content_type",
            Self::DecodeResponseJson => "decode_response_json",
        }
    }

    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::UnknownType
            | Self::UnknownStatusCode
            | Self::EmptyMimeType
            | Self::UnsupportedFileSource
            | Self::InvalidHeaderName
            | Self::InvalidHeaderValue
            | Self::InvalidUri
            | Self::InvalidMethod
            | Self::InvalidProxy => ErrorKind::Validation,
            Self::UnresolvedEncoding | Self::SerializeJson | Self::SerializeForm => {
                ErrorKind::Encoding
            }
            Self::ReadFile => ErrorKind::Io,
            Self::DecodeRecord | Self::RecordNotObject | Self::DecodeQuery => ErrorKind::Decode,
            Self::RequestBuild
            | Self::Transport
            | Self::Timeout
            | Self::Cancelled
            | Self::ReadBody => ErrorKind::Network,
            Self::UnexpectedContentType | Self::DecodeResponseJson => ErrorKind::ResponseDecode,
        }
    }
}

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("incorrect type \"{name}\"")]
    UnknownType { name: String },
    #[error("status code {code} is not a known http status")]
    UnknownStatusCode { code: u16 },
    #[error("mime type override for file attachment cannot be empty")]
    EmptyMimeType,
    #[error("file source is missing; expected a path, raw bytes or an open file")]
    UnsupportedFileSource,
    #[error("invalid header name {name}")]
    InvalidHeaderName { name: String },
    #[error("invalid header value for {name}")]
    InvalidHeaderValue { name: String },
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("invalid http method {method:?}")]
    InvalidMethod { method: String },
    #[error("invalid proxy {proxy}: {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: SharedError,
    },
    #[error("target encoding for media type {media_type} could not be determined")]
    UnresolvedEncoding { media_type: String },
    #[error("failed to serialize request json: {source}")]
    SerializeJson {
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("failed to serialize form body: {source}")]
    SerializeForm {
        #[source]
        source: Arc<serde_urlencoded::ser::Error>,
    },
    #[error("failed to read file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("failed to decode record: {source}")]
    DecodeRecord {
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("record must serialize to a json object, got {found}")]
    RecordNotObject { found: &'static str },
    #[error("failed to decode query string {input:?}: {message}")]
    DecodeQuery { input: String, message: String },
    #[error("failed to build http request: {source}")]
    RequestBuild {
        #[source]
        source: Arc<http::Error>,
    },
    #[error("http transport error for {method} {uri}: {source}")]
    Transport {
        method: Method,
        uri: String,
        #[source]
        source: SharedError,
    },
    #[error("http request timed out after {timeout_ms}ms for {method} {uri}")]
    Timeout {
        timeout_ms: u128,
        method: Method,
        uri: String,
    },
    #[error("request cancelled before sending {method} {uri}")]
    Cancelled { method: Method, uri: String },
    #[error("failed to read response body: {source}")]
    ReadBody {
        #[source]
        source: SharedError,
    },
    #[error(
        "response content-type is {content_type} not application/json, so can't be json decoded: {source}"
    )]
    UnexpectedContentType {
        content_type: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("response body json decode fail: {source}")]
    DecodeResponseJson {
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownType { .. } => ErrorCode::UnknownType,
            Self::UnknownStatusCode { .. } => ErrorCode::UnknownStatusCode,
            Self::EmptyMimeType => ErrorCode::EmptyMimeType,
            Self::UnsupportedFileSource => ErrorCode::UnsupportedFileSource,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::InvalidUri { .. } => ErrorCode::InvalidUri,
            Self::InvalidMethod { .. } => ErrorCode::InvalidMethod,
            Self::InvalidProxy { .. } => ErrorCode::InvalidProxy,
            Self::UnresolvedEncoding { .. } => ErrorCode::UnresolvedEncoding,
            Self::SerializeJson { .. } => ErrorCode::SerializeJson,
            Self::SerializeForm { .. } => ErrorCode::SerializeForm,
            Self::ReadFile { .. } => ErrorCode::ReadFile,
            Self::DecodeRecord { .. } => ErrorCode::DecodeRecord,
            Self::RecordNotObject { .. } => ErrorCode::RecordNotObject,
            Self::DecodeQuery { .. } => ErrorCode::DecodeQuery,
            Self::RequestBuild { .. } => ErrorCode::RequestBuild,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::ReadBody { .. } => ErrorCode::ReadBody,
            Self::UnexpectedContentType { .. } => ErrorCode::UnexpectedContentType,
            Self::DecodeResponseJson { .. } => ErrorCode::DecodeResponseJson,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    pub(crate) fn decode_record(source: serde_json::Error) -> Self {
        Self::DecodeRecord {
            source: Arc::new(source),
        }
    }

    pub(crate) fn serialize_json(source: serde_json::Error) -> Self {
        Self::SerializeJson {
            source: Arc::new(source),
        }
    }
}

/// Ordered faults collected while a request was assembled or executed.
#[derive(Clone, Debug, Default)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub(crate) fn new(errors: Vec<Error>) -> Self {
        Self(errors)
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.0.iter().map(Error::code).collect()
    }
}

impl From<Error> for ErrorList {
    fn from(error: Error) -> Self {
        Self(vec![error])
    }
}

impl std::ops::Deref for ErrorList {
    type Target = [Error];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                formatter.write_str("; ")?;
            }
            write!(formatter, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .first()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode, ErrorKind, ErrorList};

    #[test]
    fn codes_map_to_fault_families() {
        assert_eq!(ErrorCode::UnknownType.kind(), ErrorKind::Validation);
        assert_eq!(ErrorCode::UnresolvedEncoding.kind(), ErrorKind::Encoding);
        assert_eq!(ErrorCode::ReadFile.kind(), ErrorKind::Io);
        assert_eq!(ErrorCode::DecodeQuery.kind(), ErrorKind::Decode);
        assert_eq!(ErrorCode::Cancelled.kind(), ErrorKind::Network);
        assert_eq!(
            ErrorCode::UnexpectedContentType.kind(),
            ErrorKind::ResponseDecode
        );
    }

    #[test]
    fn error_list_display_joins_messages_in_order() {
        let errors = ErrorList::new(vec![
            Error::UnknownType {
                name: "yaml".to_owned(),
            },
            Error::UnknownStatusCode { code: 999 },
        ]);

        assert_eq!(
            errors.to_string(),
            "incorrect type \"yaml\"; status code 999 is not a known http status"
        );
        assert_eq!(
            errors.codes(),
            vec![ErrorCode::UnknownType, ErrorCode::UnknownStatusCode]
        );
    }
}
