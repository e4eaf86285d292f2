//! Structured Document
//!
//! A small element tree built from the array tool's `xml_e` rendering.
//! Callers navigate it by slash-separated paths relative to the root
//! element, so the tool's markup never leaks past the gateway.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

// =============================================================================
// Element
// =============================================================================

/// One XML element with its text content and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Concatenated text content (trimmed)
    pub text: String,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// First element at `path` below this one
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// All elements at `path` below this one, in document order
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current: Vec<&Element> = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|el| el.children.iter().filter(move |c| c.name == segment))
                .collect();
        }
        current
    }

    /// Text of the first child at `path`, if present and non-empty
    pub fn child_text(&self, path: &str) -> Option<&str> {
        self.find(path)
            .map(|el| el.text.as_str())
            .filter(|text| !text.is_empty())
    }
}

// =============================================================================
// Document
// =============================================================================

/// Parsed structured output of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    /// A document with no content; every lookup returns nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse XML text into a document
    pub fn parse(xml: &str) -> std::result::Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    stack.push(Element::new(name));
                }
                Ok(Event::Empty(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    attach(&mut stack, &mut root, Element::new(name))?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| "unexpected closing tag".to_string())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(text.trim());
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(String::from_utf8_lossy(&c.into_inner()).trim());
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(format!(
                        "position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| "no root element".to_string())
    }

    /// True if the document has no root content
    pub fn is_empty(&self) -> bool {
        self.root.name.is_empty()
    }

    /// First element at `path` below the root
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.root.find(path)
    }

    /// All elements at `path` below the root
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        self.root.find_all(path)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!("multiple root elements, second is <{}>", element.name)),
    }
}
