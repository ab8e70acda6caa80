//! Locator comment lines: `// <absoluteOffset> <length>`.
//!
//! The shadow generator prefixes every out-of-line reconstruction with one
//! of these so a later pass can re-attach edits to the original document.

/// Renders a locator line for an original-document span.
pub fn format_locator(offset: usize, length: usize) -> String {
    format!("// {offset} {length}")
}

/// Parses a locator line back into `(offset, length)`.
///
/// Rejects lines shorter than 6 characters, lines not starting with
/// `// `, and anything but exactly two base-10 fields.
pub fn parse_locator(line: &str) -> Option<(usize, usize)> {
    if line.len() < 6 || !line.starts_with("// ") {
        return None;
    }
    let (offset, length) = line[3..].split_once(' ')?;
    let offset = parse_field(offset)?;
    let length = parse_field(length)?;
    Some((offset, length))
}

fn parse_field(field: &str) -> Option<usize> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
