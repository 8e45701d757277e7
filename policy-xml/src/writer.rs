//! Line-oriented XML output with caller-controlled indentation.
//!
//! Policy documents are emitted as hand-shaped text (one element per line,
//! tab indentation chosen by the caller) so that two serializations of the
//! same object compare byte-for-byte.

use std::borrow::Cow;

use quick_xml::escape::escape;

use crate::parser::parse_str;

/// Return `text` unchanged when it is already valid element content,
/// otherwise escape all five XML special characters.
///
/// Text that round-trips through the parser (for example `A &amp; B`) is left
/// alone so that re-serializing parsed documents does not double escape.
pub fn safe_text(text: &str) -> Cow<'_, str> {
    if parse_str(&format!("<t>{text}</t>")).is_ok() {
        return Cow::Borrowed(text);
    }
    escape(text)
}

/// Escape a value for use inside a double-quoted attribute.
pub fn attr_value(value: &str) -> Cow<'_, str> {
    escape(value)
}

/// `{indent}<tag>text</tag>\n`
pub fn text_element(indent: &str, tag: &str, text: &str) -> String {
    format!("{indent}<{tag}>{}</{tag}>\n", safe_text(text))
}

/// `{indent}<tag a="b">\n` with attributes in the given order.
pub fn open_tag(indent: &str, tag: &str, attributes: &[(&str, &str)]) -> String {
    let mut out = format!("{indent}<{tag}");
    for (key, value) in attributes {
        out.push_str(&format!(" {key}=\"{}\"", attr_value(value)));
    }
    out.push_str(">\n");
    out
}

/// `{indent}</tag>\n`
pub fn close_tag(indent: &str, tag: &str) -> String {
    format!("{indent}</{tag}>\n")
}

/// `{indent}<!-- text -->\n`, with `--` sequences broken up.
pub fn comment(indent: &str, text: &str) -> String {
    format!("{indent}<!-- {} -->\n", text.replace("--", "- -"))
}
