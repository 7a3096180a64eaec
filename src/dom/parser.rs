//! XHTML chapter parsing into the arena document.
//!
//! EPUB content documents are well-formed XHTML, so the same event reader
//! that handles the package files covers them. Whitespace-only text between
//! elements is dropped and edge whitespace trimmed, so text step indices
//! count rendered text runs. Comments and processing instructions are
//! discarded; neither kind participates in CFI sibling counting.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Document, NodeId};
use crate::error::{Error, Result};
use crate::util::resolve_entity;

/// Parse chapter markup into a [`Document`].
///
/// If the outermost element is `<html>`, it is lifted away so the chapter
/// root's children are `head`/`body` directly.
pub fn parse_document(markup: &str) -> Result<Document> {
    let mut doc = Document::new();
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);

    let root = doc.root();
    let mut stack: Vec<NodeId> = vec![root];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let parent = stack.last().copied().unwrap_or(root);
                let node = append_from_tag(&mut doc, parent, &e)?;
                stack.push(node);
            }
            Ok(Event::Empty(e)) => {
                let parent = stack.last().copied().unwrap_or(root);
                append_from_tag(&mut doc, parent, &e)?;
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Ok(Event::Text(e)) => {
                let parent = stack.last().copied().unwrap_or(root);
                let raw = String::from_utf8_lossy(e.as_ref());
                doc.append_text(parent, &raw);
            }
            Ok(Event::CData(e)) => {
                let parent = stack.last().copied().unwrap_or(root);
                let bytes = e.into_inner();
                doc.append_text(parent, &String::from_utf8_lossy(&bytes));
            }
            Ok(Event::GeneralRef(e)) => {
                let parent = stack.last().copied().unwrap_or(root);
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    doc.append_text(parent, &resolved);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    lift_html_wrapper(&mut doc);

    Ok(doc)
}

fn append_from_tag(doc: &mut Document, parent: NodeId, tag: &BytesStart) -> Result<NodeId> {
    let name = String::from_utf8_lossy(local_name(tag.name().as_ref())).to_string();

    let mut attrs = Vec::new();
    for attr in tag.attributes().flatten() {
        let key = String::from_utf8_lossy(local_name(attr.key.as_ref())).to_string();
        let value = String::from_utf8(attr.value.to_vec())?;
        attrs.push((key, value));
    }

    Ok(doc.append_element(parent, name, attrs))
}

fn lift_html_wrapper(doc: &mut Document) {
    let root = doc.root();
    let mut elements = doc.child_elements(root);
    let first = elements.next();
    let extra = elements.next();
    drop(elements);

    if extra.is_none()
        && let Some(wrapper) = first
        && doc.element_name(wrapper) == Some("html")
        && doc.children(root).count() == 1
    {
        doc.lift_wrapper(wrapper);
    }
}

/// Extract local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
