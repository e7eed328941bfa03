//! Field codec: scalar-value shaping for per-gateway length and charset
//! limits.

use crate::order::Address;

/// Marker appended when a value had to be cut.
const ELLIPSIS: &str = "...";

/// Condense `value` to at most `max` characters.
///
/// HTML entities are decoded to their Latin-1 characters first (legacy
/// gateways take ISO-8859-1 fields), runs of whitespace collapse to a
/// single space, and a cut is marked with `...` inside the budget.
/// Idempotent: re-applying with the same limit is a no-op.
pub fn truncate(value: &str, max: usize) -> String {
    // Decoding runs to a fixed point: double-encoded text ("&#38;amp;")
    // resolves fully on the first call, so a second call is a no-op.
    let mut decoded = decode_entities(value);
    loop {
        let pass = decode_entities(&decoded);
        if pass == decoded {
            break;
        }
        decoded = pass;
    }
    let collapsed = collapse_separators(&decoded);

    if collapsed.chars().count() <= max {
        return collapsed;
    }
    if max <= ELLIPSIS.len() {
        let cut: String = collapsed.chars().take(max).collect();
        return cut.trim_end().to_string();
    }
    let kept: String = collapsed.chars().take(max - ELLIPSIS.len()).collect();
    format!("{}{}", kept.trim_end(), ELLIPSIS)
}

/// Compose a cardholder display name from structured parts.
pub fn format_name(first: &str, last: &str, max: usize) -> String {
    let joined = [first, last]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate(&joined, max)
}

/// Compose a single-line street/city/country display string.
///
/// The post/zip code is deliberately never included: gateways that check
/// it separately reject billing data when the two fields overlap.
pub fn format_address(address: &Address, max: usize) -> String {
    let mut line = address.line1.trim().to_string();
    if let Some(line2) = address.line2.as_deref() {
        if !line2.trim().is_empty() {
            line.push_str(", ");
            line.push_str(line2.trim());
        }
    }

    let mut city = address.city.trim().to_string();
    if let Some(provstate) = address.provstate.as_deref() {
        if !provstate.trim().is_empty() {
            city.push(' ');
            city.push_str(provstate.trim());
        }
    }
    if !city.is_empty() {
        line.push_str(", ");
        line.push_str(&city);
    }

    let country = address.country.trim();
    if !country.is_empty() {
        line.push_str(", ");
        line.push_str(country);
    }

    truncate(&line, max)
}

/// Decode the HTML entities that occur in catalog-sourced text into the
/// Latin-1 target set. Unknown entities pass through untouched.
fn decode_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('&') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        match tail.find(';') {
            // Entities are short; a long run to the next ';' is just text.
            Some(end) if end <= 8 => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(c) => out.push(c),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(code) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        let value = u32::from_str_radix(code, 16).ok()?;
        return (value < 256).then(|| char::from_u32(value)).flatten();
    }
    if let Some(code) = entity.strip_prefix('#') {
        let value: u32 = code.parse().ok()?;
        return (value < 256).then(|| char::from_u32(value)).flatten();
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "pound" => Some('£'),
        "copy" => Some('©'),
        "reg" => Some('®'),
        "deg" => Some('°'),
        "frac12" => Some('½'),
        _ => None,
    }
}

fn collapse_separators(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out.trim().to_string()
}
