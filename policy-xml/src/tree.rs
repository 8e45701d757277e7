use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// A parsed XML element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<XmlNode>,
    /// Non-whitespace text content, if any.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create an element with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Builder-style helper that sets an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style helper that sets the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style helper that appends a child element.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First direct child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// All direct children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Text of this element with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim)
    }

    /// Trimmed text of the first direct child with `tag`.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.get_child(tag).and_then(XmlNode::trimmed_text)
    }

    /// Every descendant element (not including `self`) in document order.
    pub fn descendants(&self) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Descendant elements with the provided tag, in document order.
    ///
    /// Mirrors the `.//Tag` XPath form: nested matches are included.
    pub fn find_all(&self, tag: &str) -> Vec<&XmlNode> {
        self.descendants()
            .into_iter()
            .filter(|node| node.tag == tag)
            .collect()
    }
}

fn collect_descendants<'a>(node: &'a XmlNode, out: &mut Vec<&'a XmlNode>) {
    for child in &node.children {
        out.push(child);
        collect_descendants(child, out);
    }
}

/// Renders the opening tag only, which is what log lines want.
impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{value}\"")?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::XmlNode;

    fn sample() -> XmlNode {
        XmlNode::new("Groups").with_child(
            XmlNode::new("Group")
                .with_attribute("Id", "{a}")
                .with_child(XmlNode::new("Name").with_text("  Removable  "))
                .with_child(
                    XmlNode::new("DescriptorIdList")
                        .with_child(XmlNode::new("PrimaryId").with_text("RemovableMediaDevices")),
                ),
        )
    }

    #[test]
    fn child_text_is_trimmed() {
        let root = sample();
        let group = root.get_child("Group").expect("group");
        assert_eq!(group.child_text("Name"), Some("Removable"));
        assert_eq!(group.attr("Id"), Some("{a}"));
    }

    #[test]
    fn find_all_walks_in_document_order() {
        let root = sample();
        let tags: Vec<&str> = root.descendants().iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec!["Group", "Name", "DescriptorIdList", "PrimaryId"]
        );
        assert_eq!(root.find_all("PrimaryId").len(), 1);
    }

    #[test]
    fn display_shows_open_tag() {
        let node = XmlNode::new("Entry").with_attribute("Id", "{e}");
        assert_eq!(node.to_string(), "<Entry Id=\"{e}\">");
    }
}
