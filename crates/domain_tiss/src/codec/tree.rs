//! Minimal element tree built from the quick-xml pull parser
//!
//! Only element names (namespace prefix stripped) and trimmed text are kept.
//! Well-formedness problems the reader does not report on its own, such as
//! unclosed elements or a second root, are detected here.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub name: String,
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }
}

#[derive(Debug)]
pub(crate) struct ParsedDocument {
    pub has_declaration: bool,
    pub root: Node,
}

/// Parses `xml` into a tree, or explains why it is not well-formed
pub(crate) fn parse(xml: &str) -> Result<ParsedDocument, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut has_declaration = false;
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{} (at byte {})", e, reader.buffer_position()))?;
        match event {
            Event::Decl(_) => has_declaration = true,
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err("multiple root elements".to_string());
                }
                stack.push(Node::from_start(&start));
            }
            Event::Empty(start) => attach(&mut stack, &mut root, Node::from_start(&start))?,
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| "closing tag without matching opening tag".to_string())?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|e| e.to_string())?;
                match stack.last_mut() {
                    Some(parent) => parent.text.push_str(&value),
                    None => return Err("text outside the root element".to_string()),
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    let root = root.ok_or_else(|| "no root element".to_string())?;
    Ok(ParsedDocument { has_declaration, root })
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => return Err("multiple root elements".to_string()),
        None => *root = Some(node),
    }
    Ok(())
}
