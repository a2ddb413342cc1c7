//! Namespace-aware XML element tree
//!
//! The export is small enough to hold in memory, so it is parsed into a plain
//! tree of resolved names. Every structural lookup takes a list of namespace
//! variants and tries them in order before falling back to the unqualified name.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{IndexError, Result};

/// Spreadsheet namespaces, in preference order
pub const SPREADSHEET_NAMESPACES: [&str; 2] = [
    "http://v8.1c.ru/8.2/data/spreadsheet",
    "http://v8.1c.ru/8.1/data/spreadsheet",
];

/// Core data namespaces (cell content), in preference order
pub const CORE_NAMESPACES: [&str; 2] = [
    "http://v8.1c.ru/8.1/data/core",
    "http://v8.1c.ru/8.2/data/core",
];

/// One element with its resolved namespace, text and children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub local_name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(namespace: Option<String>, local_name: String) -> Self {
        Self {
            namespace,
            local_name,
            ..Default::default()
        }
    }

    fn is(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == namespace
    }

    fn collect_descendants<'a>(
        &'a self,
        namespace: Option<&str>,
        local_name: &str,
        out: &mut Vec<&'a XmlElement>,
    ) {
        for child in &self.children {
            if child.is(namespace, local_name) {
                out.push(child);
            }
            child.collect_descendants(namespace, local_name, out);
        }
    }

    /// All descendants (document order) under the first namespace variant
    /// that yields any match
    pub fn find_descendants(&self, local_name: &str, namespaces: &[&str]) -> Vec<&XmlElement> {
        for namespace in variants(namespaces) {
            let mut found = Vec::new();
            self.collect_descendants(namespace, local_name, &mut found);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    pub fn find_descendant(&self, local_name: &str, namespaces: &[&str]) -> Option<&XmlElement> {
        self.find_descendants(local_name, namespaces).into_iter().next()
    }

    /// Direct children under the first namespace variant that yields any match
    pub fn find_children(&self, local_name: &str, namespaces: &[&str]) -> Vec<&XmlElement> {
        for namespace in variants(namespaces) {
            let found: Vec<&XmlElement> = self
                .children
                .iter()
                .filter(|c| c.is(namespace, local_name))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    pub fn find_child(&self, local_name: &str, namespaces: &[&str]) -> Option<&XmlElement> {
        self.find_children(local_name, namespaces).into_iter().next()
    }
}

/// Namespace variants followed by the unqualified fallback
fn variants<'a>(namespaces: &'a [&'a str]) -> impl Iterator<Item = Option<&'a str>> + 'a {
    namespaces
        .iter()
        .map(|ns| Some(*ns))
        .chain(std::iter::once(None))
}

fn resolved_namespace(resolved: &ResolveResult<'_>) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(Namespace(bytes)) => {
            Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
        }
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(IndexError::malformed(format!(
            "unbound namespace prefix: {}",
            String::from_utf8_lossy(prefix)
        ))),
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(IndexError::malformed("multiple root elements")),
    }
    Ok(())
}

/// Parse a whole document into an element tree
pub fn parse<R: BufRead>(source: R) -> Result<XmlElement> {
    let mut reader = NsReader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let (namespace, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok((resolved, event)) => (resolved_namespace(&resolved)?, event),
            Err(e) => return Err(IndexError::malformed(e.to_string())),
        };

        match event {
            Event::Start(start) => {
                let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(XmlElement::new(namespace, local));
            }
            Event::Empty(start) => {
                let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                attach(&mut stack, &mut root, XmlElement::new(namespace, local))?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| IndexError::malformed("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| IndexError::malformed(e.to_string()))?;
                    current.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(IndexError::malformed(format!(
            "unexpected end of document inside <{}>",
            open.local_name
        )));
    }

    root.ok_or_else(|| IndexError::malformed("document has no root element"))
}
