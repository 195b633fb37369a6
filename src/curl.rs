use std::collections::BTreeMap;

use crate::descriptor::RequestDescriptor;

/// Renders a built request as a shell-ready `curl` command line.
///
/// Header lines are sorted by name and repeated values are joined with a
/// space. The derived `Host`, `Authorization` and `Cookie` lines are included.
pub fn to_curl_command(request: &RequestDescriptor) -> crate::Result<String> {
    let mut parts = vec![
        "curl".to_owned(),
        "-X".to_owned(),
        shell_quote(request.method().as_str()),
    ];

    if let Some(body) = request.body() {
        parts.push("-d".to_owned());
        parts.push(shell_quote(&String::from_utf8_lossy(body)));
    }

    let headers = request.wire_headers()?;
    let mut lines: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        lines
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    for (name, values) in lines {
        parts.push("-H".to_owned());
        parts.push(shell_quote(&format!("{name}: {}", values.join(" "))));
    }

    parts.push(shell_quote(request.url()));
    Ok(parts.join(" "))
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// `content-type` -> `Content-Type`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
