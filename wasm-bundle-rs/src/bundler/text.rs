//! Source text helpers for the in-process bundler.
//!
//! Non-JavaScript files routed through a loader rule are turned into small ES
//! modules here before they reach the module graph.

use base64::Engine;

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

/// Wraps JSON source in a module whose default export is the parsed value.
pub fn transform_json_source(source: &str) -> String {
    format!("export default JSON.parse({})", js_string_literal(source))
}

/// A module whose default export is `text`.
pub fn text_module_source(text: &str) -> String {
    format!("export default {};\n", js_string_literal(text))
}

/// A module whose default export is the base64 encoding of `bytes`.
pub fn base64_module_source(bytes: &[u8]) -> String {
    let encoded = base64::prelude::BASE64_STANDARD.encode(bytes);
    format!("export default \"{}\";\n", encoded)
}

/// A module whose default export is a `Uint8Array` holding `bytes`.
///
/// The bytes travel as base64 and are decoded with `atob`, which exists in
/// browsers, workers, Node, Deno and Bun alike.
pub fn binary_module_source(bytes: &[u8]) -> String {
    let encoded = base64::prelude::BASE64_STANDARD.encode(bytes);
    format!(
        r#"const decoded = atob("{encoded}");
const bytes = new Uint8Array(decoded.length);
for (let i = 0; i < decoded.length; i++) {{
  bytes[i] = decoded.charCodeAt(i);
}}
export default bytes;
"#,
        encoded = encoded
    )
}

/// Quotes `s` as a double-quoted JavaScript string literal.
///
/// JSON string escaping is valid JavaScript from ES2019 on, which covers the
/// ES2022 output target.
fn js_string_literal(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{FEFF}export {}"), "export {}");
        assert_eq!(strip_bom("export {}"), "export {}");
    }

    #[test]
    fn test_json_source_is_parsed_at_runtime() {
        assert_eq!(
            transform_json_source(r#"{"minSize": 32768}"#),
            r#"export default JSON.parse("{\"minSize\": 32768}")"#
        );
    }

    #[test]
    fn test_js_string_literal_escapes() {
        assert_eq!(js_string_literal("hello"), "\"hello\"");
        assert_eq!(js_string_literal("\"quoted\""), "\"\\\"quoted\\\"\"");
        assert_eq!(js_string_literal("line\nbreak"), "\"line\\nbreak\"");
        assert_eq!(js_string_literal("a\\b"), "\"a\\\\b\"");
        assert_eq!(js_string_literal("\u{0}"), "\"\\u0000\"");
        assert_eq!(js_string_literal("\u{2028}"), "\"\u{2028}\"");
    }

    #[test]
    fn test_text_module_source() {
        assert_eq!(text_module_source("R U R'"), "export default \"R U R'\";\n");
    }

    #[test]
    fn test_base64_module_source() {
        assert_eq!(
            base64_module_source(b"\0asm"),
            "export default \"AGFzbQ==\";\n"
        );
    }

    #[test]
    fn test_binary_module_embeds_base64() {
        let source = binary_module_source(&[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]);
        assert!(source.contains("atob(\"AGFzbQEAAAA=\")"), "{source}");
        assert!(source.contains("new Uint8Array(decoded.length)"));
        assert!(source.trim_end().ends_with("export default bytes;"));
    }
}
