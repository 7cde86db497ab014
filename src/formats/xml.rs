//! Small element tree over quick-xml
//!
//! Animation metadata only uses nested elements with text content, so
//! attributes are ignored on read and never written.

use std::str::FromStr;

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use super::FormatError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl ToString) -> Self {
        Self {
            name: name.into(),
            text: text.to_string(),
            children: Vec::new(),
        }
    }

    /// Appends `child` and returns it for further nesting.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn push_text(&mut self, name: &str, text: impl ToString) {
        self.children.push(Element::with_text(name, text));
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn required(&self, name: &str) -> Result<&Element, FormatError> {
        self.child(name).ok_or_else(|| FormatError::MissingElement {
            parent: self.name.clone(),
            element: name.to_string(),
        })
    }

    /// Parses the trimmed text content.
    pub fn value<T: FromStr>(&self) -> Result<T, FormatError> {
        let text = self.text.trim();
        text.parse().map_err(|_| FormatError::InvalidValue {
            element: self.name.clone(),
            value: text.to_string(),
        })
    }

    pub fn child_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, FormatError> {
        self.child(name).map(Element::value).transpose()
    }

    pub fn required_value<T: FromStr>(&self, name: &str) -> Result<T, FormatError> {
        self.required(name)?.value()
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn element_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Parses a document into its root element.
pub fn parse_document(xml: &str) -> Result<Element, FormatError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::new(element_name(&start))),
            Event::Empty(start) => {
                attach(&mut stack, &mut root, Element::new(element_name(&start)));
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or(FormatError::EmptyDocument)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), FormatError> {
    let name = element.name.as_str();
    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(name)))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Serialises `root` with an XML declaration and two-space indentation.
pub fn write_document(root: &Element) -> Result<String, FormatError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_element(&mut writer, root)?;

    let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    xml.push('\n');
    Ok(xml)
}
