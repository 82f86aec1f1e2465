//! Minimal owned XML element tree, built from `quick-xml` events.

use std::collections::BTreeMap;
use std::str;

use log::trace;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Lower-cased local name (`svg:path` becomes `path`).
    pub tag: String,
    /// Attributes keyed by their qualified name as written (`xlink:href`).
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Builder used mostly by tests.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Class names from the `class` attribute, in order of appearance.
    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Concatenated text of all descendants, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Depth-first visit of this element and all its descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Element)) {
        visit(self);
        for child in self.child_elements() {
            child.walk(visit);
        }
    }
}

fn element_from(start: &BytesStart) -> Result<Element, Error> {
    let name = str::from_utf8(start.local_name())
        .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?;
    let mut element = Element::new(name);
    for attr in start.attributes().with_checks(false) {
        let attr: Attribute =
            attr.map_err(|e| Error::Xml(format!("Invalid attribute on <{}>: {}", name, e)))?;
        let key = str::from_utf8(attr.key)
            .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
            .to_string();
        let value = attr
            .unescaped_value()
            .map_err(|e| Error::Xml(format!("Invalid value for attribute {}: {}", key, e)))?;
        let value = String::from_utf8_lossy(&value).into_owned();
        // If an attribute is repeated, the first occurrence wins.
        element.attributes.entry(key).or_insert(value);
    }
    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    }
}

fn push_text(stack: &mut Vec<Element>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Text(text));
    }
}

/// Parse an XML string into its root element.
pub fn parse_document(xml: &str) -> Result<Element, Error> {
    trace!("parse_document");

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                trace!("parse_document: Matched start of {:?}", e.local_name());
                stack.push(element_from(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from(e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescaped()
                    .map_err(|e| Error::Xml(format!("Invalid text content: {}", e)))?;
                push_text(&mut stack, String::from_utf8_lossy(&text).into_owned());
            }
            Ok(Event::CData(ref e)) => {
                push_text(&mut stack, String::from_utf8_lossy(e).into_owned());
            }
            Ok(Event::Eof) => {
                trace!("parse_document: EOF");
                break;
            }
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(format!("Error when parsing XML: {}", e))),
        }

        // Events borrow `buf`; everything kept is owned by now.
        buf.clear();
    }

    root.ok_or_else(|| Error::Xml("Document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let _ = env_logger::try_init();
        let input = r#"
            <?xml version="1.0" encoding="UTF-8" standalone="no"?>
            <svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
                <g class="a b">
                    <path d="M 10,100 40,70"/>
                    <image xlink:href="other.svg"/>
                </g>
                <text>Hello &amp; <tspan>world</tspan></text>
            </svg>
        "#;
        let root = parse_document(input).unwrap();
        assert_eq!(root.tag, "svg");
        let children: Vec<&Element> = root.child_elements().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].classes(), vec!["a".to_string(), "b".to_string()]);
        let grandchildren: Vec<&Element> = children[0].child_elements().collect();
        assert_eq!(grandchildren[0].attr("d"), Some("M 10,100 40,70"));
        assert_eq!(grandchildren[1].attr("xlink:href"), Some("other.svg"));
        assert_eq!(children[1].text_content(), "Hello & world");
    }

    #[test]
    fn test_namespaced_tags_use_local_name() {
        let root = parse_document(r#"<svg:svg xmlns:svg="x"><svg:RECT/></svg:svg>"#).unwrap();
        assert_eq!(root.tag, "svg");
        assert_eq!(root.child_elements().next().unwrap().tag, "rect");
    }

    #[test]
    fn test_cdata_text() {
        let root = parse_document("<svg><style><![CDATA[.a { stroke: red }]]></style></svg>")
            .unwrap();
        let style = root.child_elements().next().unwrap();
        assert_eq!(style.text_content(), ".a { stroke: red }");
    }

    /// If multiple attributes share a name, simply use the first one.
    #[test]
    fn test_duplicate_attr() {
        let root = parse_document(r#"<svg><path d="M 20,30" d="M 10,100"/></svg>"#).unwrap();
        let path = root.child_elements().next().unwrap();
        assert_eq!(path.attr("d"), Some("M 20,30"));
        assert_eq!(path.attributes.len(), 1);
    }

    #[test]
    fn test_malformed() {
        let input = r#"
            <svg xmlns="http://www.w3.org/2000/svg" version="1.1">
                <path d="M 20,30"/>
            </baa>
        "#;
        assert!(parse_document(input).is_err());
    }

    #[test]
    fn test_walk_visits_in_document_order() {
        let root = parse_document("<svg><g><a/><b/></g><c/></svg>").unwrap();
        let mut tags = Vec::new();
        root.walk(&mut |element| tags.push(element.tag.clone()));
        assert_eq!(tags, vec!["svg", "g", "a", "b", "c"]);
    }
}
