//! Text utilities for module transformation.
//!
//! Helpers for cleaning up raw source text and for writing JavaScript string
//! literals into generated code.

/// Strips the UTF-8 BOM (byte order mark) from the beginning of text if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

/// Turns JSON source into an ES module whose default export is the parsed value.
///
/// ```ignore
/// // Input: {"key": "value"}
/// // Output: export default JSON.parse("{\"key\": \"value\"}");
/// ```
pub fn transform_json_source(source: &str) -> String {
    format!("export default JSON.parse({});", js_string(source))
}

/// Quotes a string as a double-quoted JavaScript string literal.
///
/// U+2028 and U+2029 are escaped too: they are legal in JSON strings but were line
/// terminators inside JavaScript literals before ES2019.
pub fn js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\u{2028}' => result.push_str("\\u2028"),
            '\u{2029}' => result.push_str("\\u2029"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result.push('"');
    result
}
