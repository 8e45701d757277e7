use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::tree::XmlNode;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors that can occur while parsing XML into an [`XmlNode`] tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input XML could not be tokenized.
    #[error("failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Tag, attribute, or text bytes were not valid UTF-8.
    #[error("invalid UTF-8 while parsing XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// An entity or character reference could not be decoded.
    #[error("failed to decode XML text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    /// Failed to read input file.
    #[error("failed to read XML file: {0}")]
    Io(#[from] std::io::Error),
    /// Structural issue in the document, with the byte offset where it was found.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

/// Parse XML bytes into an [`XmlNode`] tree.
///
/// A leading UTF-8 byte order mark is skipped. Comments, processing
/// instructions and the XML declaration are dropped; whitespace-only text is
/// ignored.
pub fn parse(xml: &[u8]) -> Result<XmlNode, ParseError> {
    let xml = xml.strip_prefix(UTF8_BOM).unwrap_or(xml);
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let position = reader.buffer_position() as u64;
        match event {
            Event::Start(e) => stack.push(open_node(&e, &reader)?),
            Event::Empty(e) => {
                let node = open_node(&e, &reader)?;
                attach(&mut stack, &mut root, node, position)?;
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    append_text(current, &e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    append_text(current, std::str::from_utf8(e.as_ref())?);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| ParseError::Malformed {
                    position,
                    message: "closing tag without open tag".to_string(),
                })?;
                attach(&mut stack, &mut root, node, position)?;
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: format!("unclosed element {open} at end of document"),
        });
    }

    root.ok_or(ParseError::Malformed {
        position: 0,
        message: "no root element found".to_string(),
    })
}

/// Parse an XML string.
pub fn parse_str(xml: &str) -> Result<XmlNode, ParseError> {
    parse(xml.as_bytes())
}

/// Read and parse an XML file.
pub fn parse_file(path: &Path) -> Result<XmlNode, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
    position: u64,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(ParseError::Malformed {
            position,
            message: format!("second top-level element {node}"),
        });
    }
    *root = Some(node);
    Ok(())
}

fn append_text(node: &mut XmlNode, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    match &mut node.text {
        Some(existing) => existing.push_str(text),
        None => node.text = Some(text.to_string()),
    }
}

fn open_node(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<XmlNode, ParseError> {
    let mut node = XmlNode::new(qname_to_string(e.name())?);

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = qname_to_string(attr.key)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())?
            .into_owned();
        node.attributes.insert(key, value);
    }

    Ok(node)
}

fn qname_to_string(name: QName<'_>) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(name.as_ref())?.to_string())
}
