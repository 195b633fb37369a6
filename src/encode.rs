use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use serde_json::{Map, Value};

use crate::accumulator::AccumulatedData;
use crate::error::Error;
use crate::file::FileAttachment;
use crate::media_type::{MIME_FORM, MIME_JSON, MIME_TEXT, MIME_XML, TargetEncoding};
use crate::multipart::{MultipartWriter, escape_quotes, random_boundary};

/// Header naming the multipart field that carries the raw buffer.
pub const DATA_FIELDNAME_HEADER: &str = "data_fieldname";
/// Header naming the multipart part that carries the JSON array.
pub const JSON_FIELDNAME_HEADER: &str = "json_fieldname";
const DEFAULT_MULTIPART_FIELD: &str = "data";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: String,
}

impl EncodedBody {
    fn non_empty(bytes: impl Into<Bytes>, content_type: &str) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return None;
        }
        Some(Self {
            bytes,
            content_type: content_type.to_owned(),
        })
    }
}

/// Serializes the accumulated stores under `encoding`. `Ok(None)` means the
/// request carries no body and no content type.
pub fn encode(
    encoding: TargetEncoding,
    data: &AccumulatedData,
    headers: &HeaderMap,
    files: &[FileAttachment],
) -> crate::Result<Option<EncodedBody>> {
    encode_with_boundary(encoding, data, headers, files, &random_boundary())
}

/// Like [`encode`], with a fixed multipart boundary so repeated builds of the
/// same data produce the same bytes.
pub fn encode_with_boundary(
    encoding: TargetEncoding,
    data: &AccumulatedData,
    headers: &HeaderMap,
    files: &[FileAttachment],
    boundary: &str,
) -> crate::Result<Option<EncodedBody>> {
    match encoding {
        TargetEncoding::Json => encode_json(data),
        TargetEncoding::Form => encode_form(data),
        TargetEncoding::Text => Ok(EncodedBody::non_empty(
            data.raw_buffer().as_bytes().to_vec(),
            MIME_TEXT,
        )),
        TargetEncoding::Xml => Ok(EncodedBody::non_empty(
            data.raw_buffer().as_bytes().to_vec(),
            MIME_XML,
        )),
        TargetEncoding::Multipart => encode_multipart(data, headers, files, boundary),
        TargetEncoding::Unset => Ok(None),
    }
}

fn encode_json(data: &AccumulatedData) -> crate::Result<Option<EncodedBody>> {
    let bytes = if data.raw_fallback() {
        data.raw_buffer().as_bytes().to_vec()
    } else if !data.map_store().is_empty() {
        serde_json::to_vec(data.map_store()).map_err(Error::serialize_json)?
    } else if !data.sequence_store().is_empty() {
        serde_json::to_vec(data.sequence_store()).map_err(Error::serialize_json)?
    } else {
        return Ok(None);
    };
    Ok(EncodedBody::non_empty(bytes, MIME_JSON))
}

fn encode_form(data: &AccumulatedData) -> crate::Result<Option<EncodedBody>> {
    if data.raw_fallback() || !data.sequence_store().is_empty() {
        return Ok(EncodedBody::non_empty(
            data.raw_buffer().as_bytes().to_vec(),
            MIME_FORM,
        ));
    }
    let encoded =
        serde_urlencoded::to_string(flatten(data.map_store())).map_err(|source| {
            Error::SerializeForm {
                source: Arc::new(source),
            }
        })?;
    Ok(EncodedBody::non_empty(encoded, MIME_FORM))
}

fn encode_multipart(
    data: &AccumulatedData,
    headers: &HeaderMap,
    files: &[FileAttachment],
    boundary: &str,
) -> crate::Result<Option<EncodedBody>> {
    let mut writer = MultipartWriter::with_boundary(boundary.to_owned());

    if data.raw_fallback() {
        let field = field_name_override(headers, DATA_FIELDNAME_HEADER);
        writer.add_field(field, data.raw_buffer().as_bytes());
    }

    for (name, value) in flatten(data.map_store()) {
        writer.add_field(&name, value.as_bytes());
    }

    if !data.sequence_store().is_empty() {
        let field = field_name_override(headers, JSON_FIELDNAME_HEADER);
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(field));
        let json = serde_json::to_vec(data.sequence_store()).map_err(Error::serialize_json)?;
        writer.add_part(
            &[
                ("Content-Disposition", disposition.as_str()),
                ("Content-Type", MIME_JSON),
            ],
            &json,
        );
    }

    for file in files {
        writer.add_file(
            file.field_name(),
            file.filename(),
            file.mime_type(),
            file.data(),
        );
    }

    Ok(writer.finish().map(|(bytes, content_type)| EncodedBody {
        bytes,
        content_type,
    }))
}

fn field_name_override<'a>(headers: &'a HeaderMap, header: &str) -> &'a str {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MULTIPART_FIELD)
}

/// Turns a one-level map into repeated `key=value` pairs.
///
/// Arrays emit one pair per element, stringified by the kind of their first
/// element; elements of another kind are dropped, and arrays whose first
/// element is not a string, boolean or number are skipped entirely. Nulls and
/// nested objects are skipped.
pub fn flatten(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                let Some(first) = items.first() else {
                    continue;
                };
                for item in items {
                    let text = match (first, item) {
                        (Value::String(_), Value::String(text)) => text.clone(),
                        (Value::Bool(_), Value::Bool(flag)) => flag.to_string(),
                        (Value::Number(_), Value::Number(number)) => number.to_string(),
                        _ => continue,
                    };
                    pairs.push((key.clone(), text));
                }
            }
            scalar => {
                if let Some(text) = scalar_text(scalar) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
