//! XML primitives for device-control policy documents: a small element tree,
//! a quick-xml backed parser and line-oriented writers whose indentation is
//! always supplied by the caller.

pub mod parser;
pub mod tree;
pub mod writer;

pub use parser::{parse, parse_file, parse_str, ParseError};
pub use tree::XmlNode;
pub use writer::{attr_value, close_tag, comment, open_tag, safe_text, text_element};
