use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// XML element tree.
    Xml,
}

impl ParType {
    /// Returns the type name as used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParType::Bool => "bool",
            ParType::Long => "long",
            ParType::Double => "double",
            ParType::String => "string",
            ParType::Xml => "xml",
        }
    }

    /// Returns the single-letter type code.
    pub fn code(&self) -> char {
        match self {
            ParType::Bool => 'B',
            ParType::Long => 'L',
            ParType::Double => 'D',
            ParType::String => 'S',
            ParType::Xml => 'X',
        }
    }

    /// Returns true for `Long` and `Double`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParType::Long | ParType::Double)
    }
}

impl fmt::Display for ParType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Element of an XML document held by an `Xml` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlElement {
    /// Tag name.
    pub tag: String,
    /// Attributes sorted by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Text content.
    pub text: String,
}

impl XmlElement {
    /// Creates an empty element.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            ..Default::default()
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Appends a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the text content.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_owned();
        self
    }

    /// Returns an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns the first child with the given tag.
    pub fn first_child_with_tag(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.tag == tag)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (name, value) in &self.attributes {
            write!(f, " {}=\"{}\"", name, escape_xml(value))?;
        }
        if self.children.is_empty() && self.text.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">{}", escape_xml(&self.text))?;
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}

/// Concrete parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Long(i64),
    /// Float value.
    Double(f64),
    /// String value.
    String(String),
    /// XML element tree, shared between copies.
    Xml(Rc<XmlElement>),
}

impl Value {
    /// Returns the type of the value.
    pub fn kind(&self) -> ParType {
        match self {
            Value::Bool(_) => ParType::Bool,
            Value::Long(_) => ParType::Long,
            Value::Double(_) => ParType::Double,
            Value::String(_) => ParType::String,
            Value::Xml(_) => ParType::Xml,
        }
    }

    /// Returns numeric values as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(i) => Some(*i as f64),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(i) => write!(f, "{}", i),
            Value::Double(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Xml(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Long(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<XmlElement> for Value {
    fn from(e: XmlElement) -> Self {
        Value::Xml(Rc::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_is_rendered_compactly() {
        let doc = XmlElement::new("route")
            .with_attribute("dest", "a&b")
            .with_child(XmlElement::new("hop").with_text("3"))
            .with_child(XmlElement::new("end"));
        assert_eq!(doc.to_string(), "<route dest=\"a&amp;b\"><hop>3</hop><end/></route>");
        assert_eq!(doc.attribute("dest"), Some("a&b"));
        assert_eq!(doc.first_child_with_tag("hop").map(|h| h.text.as_str()), Some("3"));
    }

    #[test]
    fn value_kinds() {
        assert_eq!(Value::from(3).kind(), ParType::Long);
        assert_eq!(Value::from(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::from("x").as_f64(), None);
        assert!(ParType::Double.is_numeric());
        assert!(!ParType::String.is_numeric());
        assert_eq!(ParType::Xml.code(), 'X');
    }
}
