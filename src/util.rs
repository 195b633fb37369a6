use http::Uri;
use http::header::{HeaderName, HeaderValue};

use crate::error::Error;

const MAX_LOGGED_BODY_LEN: usize = 2048;

/// Strips credentials, query and fragment so a URL can be logged.
pub(crate) fn redact_uri_for_logs(uri_text: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(uri_text) else {
        return uri_text
            .split(['?', '#'])
            .next()
            .unwrap_or(uri_text)
            .to_owned();
    };

    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string()
}

pub(crate) fn parse_uri(uri_text: &str) -> crate::Result<Uri> {
    uri_text.parse().map_err(|_| Error::InvalidUri {
        uri: redact_uri_for_logs(uri_text),
    })
}

/// Appends `query_pairs` after the query already present on `url`, keeping
/// every existing pair.
pub(crate) fn append_query_pairs(url: &str, query_pairs: &[(String, String)]) -> String {
    if query_pairs.is_empty() {
        return url.to_owned();
    }

    if let Ok(mut parsed) = url::Url::parse(url) {
        let existing = parse_pairs(parsed.query());
        let query = build_query_string(&existing, query_pairs);
        parsed.set_query(Some(&query));
        return parsed.to_string();
    }

    let (without_fragment, fragment) = match url.split_once('#') {
        Some((left, right)) => (left, Some(right)),
        None => (url, None),
    };
    let (base, existing_query) = match without_fragment.split_once('?') {
        Some((left, right)) => (left, Some(right)),
        None => (without_fragment, None),
    };
    let existing = parse_pairs(existing_query);
    let query = build_query_string(&existing, query_pairs);

    let mut merged = format!("{base}?{query}");
    if let Some(fragment) = fragment {
        merged.push('#');
        merged.push_str(fragment);
    }
    merged
}

fn parse_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn build_query_string(existing: &[(String, String)], appended: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in existing.iter().chain(appended) {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

pub(crate) fn parse_header_name(name: &str) -> crate::Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| Error::InvalidHeaderName {
        name: name.to_owned(),
    })
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> crate::Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::InvalidHeaderValue {
        name: name.to_owned(),
    })
}

pub(crate) fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= MAX_LOGGED_BODY_LEN {
        return text.into_owned();
    }

    let truncated: String = text.chars().take(MAX_LOGGED_BODY_LEN).collect();
    format!("{truncated}...(truncated)")
}
