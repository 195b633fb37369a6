use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::media_type::TargetEncoding;
use crate::value::SendValue;

/// Body data collected across `send*` calls, not yet encoded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccumulatedData {
    map_store: Map<String, Value>,
    sequence_store: Vec<Value>,
    raw_buffer: String,
    raw_fallback: bool,
}

impl AccumulatedData {
    pub fn map_store(&self) -> &Map<String, Value> {
        &self.map_store
    }

    pub fn sequence_store(&self) -> &[Value] {
        &self.sequence_store
    }

    pub fn raw_buffer(&self) -> &str {
        &self.raw_buffer
    }

    pub fn raw_fallback(&self) -> bool {
        self.raw_fallback
    }

    pub fn is_empty(&self) -> bool {
        self.map_store.is_empty() && self.sequence_store.is_empty() && self.raw_buffer.is_empty()
    }

    /// Folds one value into the stores. Returns `Some(Form)` when a string
    /// was read as a query string, which moves the request default to form.
    pub(crate) fn ingest(&mut self, value: SendValue) -> crate::Result<Option<TargetEncoding>> {
        match value {
            SendValue::String(content) => Ok(self.ingest_string(&content)),
            SendValue::Integer(number) => Ok(self.ingest_string(&number.to_string())),
            SendValue::Float(number) => Ok(self.ingest_string(&number.to_string())),
            SendValue::Boolean(flag) => Ok(self.ingest_string(if flag { "true" } else { "false" })),
            SendValue::Record(record) => {
                self.merge_record(record)?;
                Ok(None)
            }
            SendValue::Map(map) => {
                self.merge_object(map);
                Ok(None)
            }
            SendValue::Sequence(items) => {
                self.sequence_store.extend(items);
                Ok(None)
            }
            SendValue::Optional(Some(inner)) => self.ingest(*inner),
            SendValue::Optional(None) => Ok(None),
        }
    }

    fn ingest_string(&mut self, content: &str) -> Option<TargetEncoding> {
        let mut preferred = None;
        if !self.raw_fallback {
            match decode_first_json(content) {
                Some(Value::Object(map)) => {
                    self.merge_object(map);
                    if self.map_store.is_empty() {
                        self.raw_fallback = true;
                    }
                }
                Some(Value::Array(items)) => self.sequence_store.extend(items),
                Some(_) => self.raw_fallback = true,
                None => match parse_query_string(content) {
                    Ok(pairs) => {
                        self.merge_form_pairs(pairs);
                        preferred = Some(TargetEncoding::Form);
                    }
                    Err(_) => self.raw_fallback = true,
                },
            }
        }
        self.raw_buffer.push_str(content);
        preferred
    }

    fn merge_record(&mut self, record: Value) -> crate::Result<()> {
        match record {
            Value::Object(map) => {
                self.merge_object(map);
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(Error::RecordNotObject {
                found: json_kind(&other),
            }),
        }
    }

    fn merge_object(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            self.map_store.insert(key, value);
        }
    }

    /// Repeated keys become string arrays. A prior JSON value under the key
    /// is stringified so every value reaches the form body.
    fn merge_form_pairs(&mut self, pairs: Vec<(String, String)>) {
        for (key, value) in pairs {
            match self.map_store.get_mut(&key) {
                None => {
                    self.map_store.insert(key, Value::String(value));
                }
                Some(Value::Array(items)) => {
                    let mut strings: Vec<Value> = items
                        .drain(..)
                        .map(|item| Value::String(form_text(item)))
                        .collect();
                    strings.push(Value::String(value));
                    *items = strings;
                }
                Some(existing) => {
                    let prior = form_text(existing.take());
                    *existing = Value::Array(vec![Value::String(prior), Value::String(value)]);
                }
            }
        }
    }

    /// A map and an array cannot share one JSON document, so mixed input is
    /// sent as the raw buffer instead.
    pub(crate) fn force_raw_fallback_if_mixed(&mut self) {
        if !self.map_store.is_empty() && !self.sequence_store.is_empty() {
            self.raw_fallback = true;
        }
    }
}

/// Query-string parameters, kept in insertion order with repeated keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParameters {
    pairs: Vec<(String, String)>,
}

impl QueryParameters {
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub(crate) fn ingest(&mut self, value: SendValue) -> crate::Result<()> {
        match value {
            SendValue::String(content) => self.ingest_string(&content),
            SendValue::Record(Value::Object(map)) | SendValue::Map(map) => {
                self.append_object(map);
                Ok(())
            }
            SendValue::Record(Value::Null) => Ok(()),
            SendValue::Record(other) => Err(Error::RecordNotObject {
                found: json_kind(&other),
            }),
            SendValue::Optional(Some(inner)) => self.ingest(*inner),
            SendValue::Integer(_)
            | SendValue::Float(_)
            | SendValue::Boolean(_)
            | SendValue::Sequence(_)
            | SendValue::Optional(None) => Ok(()),
        }
    }

    fn ingest_string(&mut self, content: &str) -> crate::Result<()> {
        if let Ok(map) = serde_json::from_str::<Map<String, Value>>(content) {
            self.append_object(map);
            return Ok(());
        }
        let pairs = parse_query_string(content).map_err(|message| Error::DecodeQuery {
            input: content.to_owned(),
            message,
        })?;
        self.pairs.extend(pairs);
        Ok(())
    }

    fn append_object(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            self.pairs.push((key, form_text(value)));
        }
    }
}

/// Flattens a header record into `(name, value)` pairs. Values that are not
/// scalars cannot become a header line and are skipped.
pub(crate) fn header_pairs(record: Value) -> crate::Result<Vec<(String, String)>> {
    let map = match record {
        Value::Object(map) => map,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(Error::RecordNotObject {
                found: json_kind(&other),
            });
        }
    };
    Ok(map
        .into_iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::String(text) => text,
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => return None,
            };
            Some((name, text))
        })
        .collect())
}

/// Decodes the leading JSON value; anything after it is ignored, so `null`
/// in `nullable=1` still reads as a scalar.
fn decode_first_json(content: &str) -> Option<Value> {
    let mut deserializer = serde_json::Deserializer::from_str(content);
    Value::deserialize(&mut deserializer).ok()
}

fn form_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Parses `key=value&key=value`. Rejects `;` separators and malformed
/// percent escapes, accepts everything else.
pub(crate) fn parse_query_string(content: &str) -> Result<Vec<(String, String)>, String> {
    if content.contains(';') {
        return Err("invalid semicolon separator in query".to_owned());
    }
    let bytes = content.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let escape = bytes.get(index + 1..index + 3);
            let valid = escape.is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                let end = (index + 3).min(content.len());
                return Err(format!(
                    "invalid URL escape {:?}",
                    String::from_utf8_lossy(&bytes[index..end])
                ));
            }
            index += 3;
        } else {
            index += 1;
        }
    }
    Ok(url::form_urlencoded::parse(bytes)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect())
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{AccumulatedData, QueryParameters, header_pairs, parse_query_string};
    use crate::error::ErrorCode;
    use crate::media_type::TargetEncoding;
    use crate::value::SendValue;

    fn ingest_all(values: Vec<SendValue>) -> AccumulatedData {
        let mut data = AccumulatedData::default();
        for value in values {
            data.ingest(value).expect("ingest should succeed");
        }
        data
    }

    #[test]
    fn json_objects_merge_with_last_write_winning() {
        let data = ingest_all(vec![
            r#"{"a": "1", "b": "2"}"#.into(),
            r#"{"b": "3", "c": 4}"#.into(),
        ]);

        assert_eq!(
            Value::Object(data.map_store().clone()),
            json!({"a": "1", "b": "3", "c": 4})
        );
        assert!(!data.raw_fallback());
        assert_eq!(data.raw_buffer(), r#"{"a": "1", "b": "2"}{"b": "3", "c": 4}"#);
    }

    #[test]
    fn empty_object_first_sets_raw_fallback() {
        let data = ingest_all(vec!["{}".into()]);
        assert!(data.raw_fallback());
        assert!(data.map_store().is_empty());
        assert_eq!(data.raw_buffer(), "{}");
    }

    #[test]
    fn json_array_appends_to_sequence_store() {
        let data = ingest_all(vec!["[1, \"two\"]".into(), "[true]".into()]);
        assert_eq!(data.sequence_store(), &[json!(1), json!("two"), json!(true)]);
        assert!(!data.raw_fallback());
    }

    #[test]
    fn json_scalar_sets_raw_fallback() {
        let data = ingest_all(vec!["\"just text\"".into()]);
        assert!(data.raw_fallback());
    }

    #[test]
    fn large_integers_keep_full_precision() {
        let data = ingest_all(vec![r#"{"id": 12345678901234567890123}"#.into()]);
        assert_eq!(
            data.map_store()["id"].to_string(),
            "12345678901234567890123"
        );
    }

    #[test]
    fn query_string_merges_and_prefers_form() {
        let mut data = AccumulatedData::default();
        let preferred = data
            .ingest("query=bicycle&size=50x50".into())
            .expect("query string ingests");

        assert_eq!(preferred, Some(TargetEncoding::Form));
        assert_eq!(data.map_store()["query"], json!("bicycle"));
        assert_eq!(data.map_store()["size"], json!("50x50"));
    }

    #[test]
    fn repeated_form_keys_accumulate_into_arrays() {
        let data = ingest_all(vec!["tag=a&tag=b".into(), "tag=c".into()]);
        assert_eq!(data.map_store()["tag"], json!(["a", "b", "c"]));
    }

    #[test]
    fn repeated_form_key_keeps_prior_json_value() {
        let data = ingest_all(vec![r#"{"n": 1}"#.into(), "n=2".into()]);
        assert_eq!(data.map_store()["n"], json!(["1", "2"]));

        let data = ingest_all(vec![
            r#"{"ids": [1, 2], "on": true}"#.into(),
            "ids=3&on=no".into(),
        ]);
        assert_eq!(data.map_store()["ids"], json!(["1", "2", "3"]));
        assert_eq!(data.map_store()["on"], json!(["true", "no"]));
    }

    #[test]
    fn leading_json_scalar_with_trailing_text_sets_raw_fallback() {
        for content in ["nullable=1&x=2", "1=a&2=b", "true=yes", "123abc"] {
            let mut data = AccumulatedData::default();
            let preferred = data.ingest(content.into()).expect("string ingests");
            assert!(data.raw_fallback(), "{content} should fall back to raw");
            assert!(data.map_store().is_empty());
            assert_eq!(preferred, None);
            assert_eq!(data.raw_buffer(), content);
        }
    }

    #[test]
    fn json_object_with_trailing_text_merges_leading_object() {
        let data = ingest_all(vec![r#"{"a": 1} trailing"#.into()]);
        assert_eq!(data.map_store()["a"], json!(1));
        assert!(!data.raw_fallback());
    }

    #[test]
    fn undecodable_string_sets_raw_fallback() {
        let data = ingest_all(vec!["a=%zz".into()]);
        assert!(data.raw_fallback());
        assert!(data.map_store().is_empty());
        assert_eq!(data.raw_buffer(), "a=%zz");
    }

    #[test]
    fn strings_after_raw_fallback_only_extend_raw_buffer() {
        let data = ingest_all(vec!["{}".into(), r#"{"a": 1}"#.into()]);
        assert!(data.map_store().is_empty());
        assert_eq!(data.raw_buffer(), r#"{}{"a": 1}"#);
    }

    #[test]
    fn scalars_are_stringified_before_ingestion() {
        let data = ingest_all(vec![
            SendValue::Integer(42),
            SendValue::Float(1.5),
            SendValue::Boolean(true),
        ]);
        assert_eq!(data.raw_buffer(), "421.5true");
        assert!(data.raw_fallback());
    }

    #[test]
    fn record_and_map_merge_without_empty_check() {
        let data = ingest_all(vec![
            SendValue::Record(json!({})),
            SendValue::from(json!({"k": "v"})),
        ]);
        assert!(!data.raw_fallback());
        assert_eq!(data.map_store()["k"], json!("v"));
        assert!(data.raw_buffer().is_empty());
    }

    #[test]
    fn non_object_record_is_a_decode_error() {
        let mut data = AccumulatedData::default();
        let error = data
            .ingest(SendValue::Record(json!([1, 2])))
            .expect_err("array record is rejected");
        assert_eq!(error.code(), ErrorCode::RecordNotObject);
    }

    #[test]
    fn optional_none_is_a_no_op() {
        let data = ingest_all(vec![SendValue::none()]);
        assert_eq!(data, AccumulatedData::default());
    }

    #[test]
    fn mixed_map_and_sequence_force_raw_fallback() {
        let mut data = ingest_all(vec!["[1]".into(), r#"{"a": 1}"#.into()]);
        assert!(!data.raw_fallback());
        data.force_raw_fallback_if_mixed();
        assert!(data.raw_fallback());
    }

    #[test]
    fn query_parameters_accept_json_and_query_strings() {
        let mut query = QueryParameters::default();
        query
            .ingest(r#"{"query": "bicycle", "size": 50, "exact": true}"#.into())
            .expect("json query");
        query.ingest("weight=20kg&size=60".into()).expect("query string");

        assert_eq!(query.get_all("query"), vec!["bicycle"]);
        assert_eq!(query.get_all("size"), vec!["50", "60"]);
        assert_eq!(query.get_all("exact"), vec!["true"]);
        assert_eq!(query.get_all("weight"), vec!["20kg"]);
    }

    #[test]
    fn query_json_with_trailing_text_is_read_as_query_string() {
        let mut query = QueryParameters::default();
        query
            .ingest(r#"{"a":"1"}junk"#.into())
            .expect("falls back to query string parsing");
        assert_eq!(query.get_all("a"), Vec::<&str>::new());
        assert_eq!(query.get_all(r#"{"a":"1"}junk"#), vec![""]);
    }

    #[test]
    fn query_record_numbers_keep_full_precision() {
        let mut query = QueryParameters::default();
        query
            .ingest(SendValue::Record(json!({"price": 0.1, "ids": [1, 2]})))
            .expect("record query");
        assert_eq!(query.get_all("price"), vec!["0.1"]);
        assert_eq!(query.get_all("ids"), vec!["[1,2]"]);
    }

    #[test]
    fn malformed_query_string_is_reported() {
        let mut query = QueryParameters::default();
        let error = query
            .ingest("fields=f1;f2".into())
            .expect_err("semicolons are rejected");
        assert_eq!(error.code(), ErrorCode::DecodeQuery);
        assert!(query.is_empty());
    }

    #[test]
    fn header_pairs_skip_composite_values() {
        let pairs = header_pairs(json!({
            "Accept": "application/json",
            "X-Retry": 3,
            "X-Flag": false,
            "X-List": ["a"],
        }))
        .expect("object record");

        assert_eq!(
            pairs,
            vec![
                ("Accept".to_owned(), "application/json".to_owned()),
                ("X-Flag".to_owned(), "false".to_owned()),
                ("X-Retry".to_owned(), "3".to_owned()),
            ]
        );
    }

    #[test]
    fn query_string_parser_handles_plus_and_bare_keys() {
        let pairs = parse_query_string("a=hello+world&flag").expect("valid query");
        assert_eq!(
            pairs,
            vec![
                ("a".to_owned(), "hello world".to_owned()),
                ("flag".to_owned(), String::new()),
            ]
        );
        assert!(parse_query_string("a=%4").is_err());
    }
}
