use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("Document has no root element")]
    NoRoot,
    #[error("Document has more than one root element ('{0}' follows the root)")]
    MultipleRoots(String),
    #[error("Element '{0}' is never closed")]
    Unclosed(String),
}

/// A generic XML element: tag, attributes in document order and child elements.
///
/// Text content and comments are not part of the force-field format and are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter used when generating entries.
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value of an existing attribute in place, or appends a new one.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}

fn node_from_start(e: &BytesStart) -> Result<XmlNode, XmlError> {
    let mut node = XmlNode::new(&String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

/// Parses a complete document into its root element.
pub fn parse(reader: impl BufRead) -> Result<XmlNode, XmlError> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        let finished = match xml_reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                stack.push(node_from_start(e)?);
                None
            }
            Event::Empty(ref e) => Some(node_from_start(e)?),
            Event::End(_) => stack.pop(),
            Event::Eof => break,
            _ => None,
        };

        if let Some(node) = finished {
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None if root.is_none() => root = Some(node),
                None => return Err(XmlError::MultipleRoots(node.tag)),
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.tag));
    }
    root.ok_or(XmlError::NoRoot)
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &XmlNode) -> Result<(), XmlError> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for child in &node.children {
            write_node(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    }
    Ok(())
}

/// Writes `root` with two-space indentation and a trailing newline.
pub fn write(root: &XmlNode, out: &mut impl Write) -> Result<(), XmlError> {
    let mut writer = Writer::new_with_indent(&mut *out, b' ', 2);
    write_node(&mut writer, root)?;
    writeln!(out).map_err(quick_xml::Error::from)?;
    Ok(())
}
