//! `reqchain` is a fluent, blocking HTTP request builder.
//!
//! Values of different shapes (JSON strings, query strings, records, slices,
//! scalars, files) are accumulated across chained calls and encoded into one
//! body when the request is built. The encoding is forced by name, taken from
//! an explicit `Content-Type` header, or defaulted from the method and the
//! data sent.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use reqchain::prelude::Agent;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Created {
//!     id: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = Agent::new();
//!     let decoded = agent
//!         .post("https://api.example.com/v1/items")
//!         .send(r#"{"name": "demo"}"#)
//!         .send(r#"{"tags": ["a", "b"]}"#)
//!         .retry(3, Duration::from_millis(200), [502, 503])
//!         .end_struct::<Created>()?;
//!
//!     println!("created id={}", decoded.into_value()?.id);
//!     Ok(())
//! }
//! ```
//!
//! # Faults
//!
//! Builder methods never fail. Faults are recorded on the builder and
//! returned together as an [`ErrorList`] from `build()` or `end()`, before
//! anything is sent.

mod accumulator;
mod agent;
mod config;
mod curl;
mod descriptor;
mod encode;
mod error;
mod extensions;
mod file;
mod media_type;
mod multipart;
mod request;
mod response;
mod retry;
mod transport;
mod util;
mod value;

pub use crate::accumulator::{AccumulatedData, QueryParameters};
pub use crate::agent::Agent;
pub use crate::config::{AgentConfig, DEBUG_ENV, TransportConfig};
pub use crate::curl::to_curl_command;
pub use crate::descriptor::{BasicAuth, Cookie, RequestContext, RequestDescriptor};
pub use crate::encode::{
    DATA_FIELDNAME_HEADER, EncodedBody, JSON_FIELDNAME_HEADER, encode, encode_with_boundary,
    flatten,
};
pub use crate::error::{Error, ErrorCode, ErrorKind, ErrorList};
pub use crate::extensions::{RequestStats, Sleeper, StatsRecorder, ThreadSleeper};
pub use crate::file::{
    DEFAULT_FILE_FIELD, DEFAULT_FILE_MIME, FileAttachment, FileOptions, FileSource,
};
pub use crate::media_type::{
    MIME_FORM, MIME_HTML, MIME_JSON, MIME_MULTIPART, MIME_TEXT, MIME_XML, MediaType,
    TargetEncoding, resolve,
};
pub use crate::multipart::{MultipartWriter, random_boundary};
pub use crate::request::RequestBuilder;
pub use crate::response::{Decoded, RETRY_COUNT_HEADER, Response};
pub use crate::retry::{RetryPolicy, run_with_retry};
pub use crate::transport::{Transport, UreqTransport};
pub use crate::value::SendValue;

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Agent, AgentConfig, Cookie, Decoded, Error, ErrorCode, ErrorKind, ErrorList, FileOptions,
        FileSource, RequestBuilder, RequestContext, Response, Result, RetryPolicy, SendValue,
        TransportConfig,
    };
}
