//! Response parser for field-protocol replies, plus the error-page
//! classifier shared by every driver.

use std::collections::BTreeMap;

use crate::errors::{ConnectorError, CustomResult};

/// A field-addressable view over an `&`-delimited `Key=Value` reply.
#[derive(Debug, Clone, Default)]
pub struct FieldResponse {
    fields: BTreeMap<String, String>,
}

impl FieldResponse {
    /// Parse a raw delimited reply. Pairs without `=` are ignored; later
    /// duplicates win, matching how the gateways emit corrections.
    pub fn parse(raw: &str) -> Self {
        let fields = raw
            .trim()
            .split('&')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = key.trim();
                (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { fields }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Fetch a field the protocol guarantees, raising a schema error
    /// naming it when absent.
    pub fn require_field(&self, name: &'static str) -> CustomResult<&str, ConnectorError> {
        self.get_field(name)
            .ok_or_else(|| ConnectorError::MissingRequiredField { field_name: name }.into())
    }
}

/// Whether a reply body is an HTML document rather than a protocol
/// response (load balancer error pages, maintenance pages).
pub fn is_html_document(content_type: Option<&str>, body: &str) -> bool {
    if content_type.is_some_and(|value| value.to_ascii_lowercase().contains("text/html")) {
        return true;
    }
    let head = body.trim_start();
    head.get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
        || head.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("<html"))
}

/// Pull operator-facing diagnostic text out of an HTML error page: the
/// first blockquoted element, falling back to the first quoted run.
/// Never surfaced to the end customer.
pub fn html_diagnostic(body: &str) -> Option<String> {
    if let Some(start) = find_ignore_case(body, "<blockquote") {
        let after_tag = body.get(start..)?;
        let open_end = after_tag.find('>')?;
        let inner = after_tag.get(open_end + 1..)?;
        let close = find_ignore_case(inner, "</blockquote").unwrap_or(inner.len());
        let text = strip_tags(inner.get(..close)?);
        if !text.is_empty() {
            return Some(text);
        }
    }

    let stripped = strip_tags(body);
    let (_, tail) = stripped.split_once('"')?;
    let (quoted, _) = tail.split_once('"')?;
    let quoted = quoted.trim();
    (!quoted.is_empty()).then(|| quoted.to_string())
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delimited_pairs() {
        let response = FieldResponse::parse("Status=OK&VPSTxId=T1&StatusDetail=Fine and dandy");
        assert!(response.has_field("Status"));
        assert_eq!(response.get_field("VPSTxId"), Some("T1"));
        assert_eq!(response.get_field("StatusDetail"), Some("Fine and dandy"));
        assert!(!response.has_field("SecurityKey"));
    }

    #[test]
    fn later_duplicates_win_and_junk_is_ignored() {
        let response = FieldResponse::parse("Status=OK&Status=INVALID&orphan&=empty");
        assert_eq!(response.get_field("Status"), Some("INVALID"));
        assert!(!response.has_field(""));
    }

    #[test]
    fn missing_guaranteed_field_names_it() {
        let response = FieldResponse::parse("Status=OK");
        let err = response.require_field("VPSTxId").unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::MissingRequiredField {
                field_name: "VPSTxId"
            }
        );
    }

    #[test]
    fn html_detection() {
        assert!(is_html_document(Some("text/html; charset=utf-8"), ""));
        assert!(is_html_document(None, "<!DOCTYPE html><html></html>"));
        assert!(is_html_document(None, "  <HTML><body></body></HTML>"));
        assert!(!is_html_document(Some("text/plain"), "Status=OK"));
    }

    #[test]
    fn diagnostic_prefers_blockquote() {
        let body = r#"<html><body><h1>502</h1><blockquote>upstream timed out</blockquote></body></html>"#;
        assert_eq!(html_diagnostic(body).as_deref(), Some("upstream timed out"));
    }

    #[test]
    fn diagnostic_falls_back_to_quoted_text() {
        let body = r#"<html><body>The server said "no route to host" and gave up.</body></html>"#;
        assert_eq!(html_diagnostic(body).as_deref(), Some("no route to host"));
    }
}
