// ABOUTME: Wrapper generator for untrusted source text
// ABOUTME: Embeds the source as an opaque string literal inside a self-contained TypeScript module

use serde_json::Value;

use crate::frame::FrameToken;

/// Content type the staged wrapper is served with
pub const WRAPPER_CONTENT_TYPE: &str = "application/typescript";

const TEMPLATE: &str = include_str!("wrapper.ts");
const FRAME_MARKER_SLOT: &str = "__EVALD_FRAME_MARKER__";
const SOURCE_SLOT: &str = "__EVALD_SOURCE__";

/// Build the wrapper module for `source`.
///
/// The source is never inspected: it is embedded as a JSON string literal and
/// loaded by the wrapper as a separate module, so whatever it does cannot touch
/// the wrapper's own bindings. When run, the wrapper records console calls,
/// imports the source, writes one result frame marked with `token` to stdout
/// and exits.
pub fn generate_wrapper(source: &str, token: &FrameToken) -> String {
    let frame_marker = js_string_literal(&token.marker());
    let source = js_string_literal(source);

    // The source goes in last so text inside it is never treated as a slot.
    TEMPLATE
        .replacen(FRAME_MARKER_SLOT, &frame_marker, 1)
        .replacen(SOURCE_SLOT, &source, 1)
}

fn js_string_literal(text: &str) -> String {
    Value::String(text.to_owned()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Pull the embedded source literal back out of a generated wrapper
    fn embedded_source(wrapper: &str) -> String {
        let line = wrapper
            .lines()
            .find_map(|line| line.strip_prefix("const SOURCE: string = "))
            .expect("wrapper declares SOURCE");
        let literal = line.strip_suffix(';').expect("declaration ends with ;");
        serde_json::from_str(literal).expect("SOURCE is a JSON string literal")
    }

    #[rstest]
    #[case::plain("console.log('A'); console.log('B');")]
    #[case::quotes_and_newlines("const s = \"x\";\nconsole.log(`${s}\\n`);\r\n")]
    #[case::backticks_and_templates("console.log(`${1 + 1}`)")]
    #[case::unicode("console.log('héllo ✓ \u{2028} 🦀')")]
    #[case::closing_tokens("*/ ` '); exit(1); //")]
    #[case::slot_names("__EVALD_SOURCE__ __EVALD_FRAME_MARKER__")]
    fn test_source_is_embedded_verbatim(#[case] source: &str) {
        let wrapper = generate_wrapper(source, &FrameToken::generate());
        assert_eq!(embedded_source(&wrapper), source);
    }

    #[test]
    fn test_all_slots_are_filled() {
        let wrapper = generate_wrapper("1", &FrameToken::generate());
        assert!(!wrapper.contains(FRAME_MARKER_SLOT));
        assert!(!wrapper.contains(SOURCE_SLOT));
    }

    #[test]
    fn test_frame_marker_is_embedded() {
        let token = FrameToken::generate();
        let wrapper = generate_wrapper("1", &token);
        let expected = format!(
            "const FRAME_MARKER: string = {};",
            js_string_literal(&token.marker())
        );
        assert!(wrapper.lines().any(|line| line == expected));
    }

    #[test]
    fn test_each_token_gets_its_own_marker() {
        let first = generate_wrapper("1", &FrameToken::generate());
        let second = generate_wrapper("1", &FrameToken::generate());
        assert_ne!(first, second);
    }

    #[test]
    fn test_console_interception_is_not_a_fixed_list() {
        let wrapper = generate_wrapper("1", &FrameToken::generate());
        assert!(wrapper.contains("for (const method of consoleMethodNames(host))"));
        assert!(!wrapper.contains("CONSOLE_METHODS"));
    }

    #[test]
    fn test_wrapper_loads_source_as_module_and_always_exits() {
        let wrapper = generate_wrapper("1", &FrameToken::generate());
        assert!(wrapper.contains("await import(url)"));
        assert!(wrapper.contains("} finally {\n  exit(0);\n}"));
        assert!(wrapper.contains(r#"post({ type: "response", data: await execute(SOURCE) });"#));
    }

    #[test]
    fn test_source_is_not_inlined_as_code() {
        let wrapper = generate_wrapper("globalThis.pwned = true;", &FrameToken::generate());
        assert!(!wrapper.lines().any(|line| line.trim() == "globalThis.pwned = true;"));
    }
}
