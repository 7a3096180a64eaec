//! Arena-based document model for chapter content.
//!
//! Chapter markup parses into an arena-allocated node tree: all nodes live
//! in a contiguous vector and parent/child/sibling links are indices into
//! it. The tree is read-only after parsing; the CFI engine walks it in both
//! directions (node to path, path to node) and the layout engine descends
//! it looking for the element under the focus line.

mod parser;

use std::collections::HashMap;

pub use parser::parse_document;

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Chapter root. Never addressed by a CFI step; the path boundary.
    Root,
    /// Element with name and attributes.
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        /// Pre-extracted id for fast lookup and CFI id tokens.
        id: Option<String>,
    },
    /// Text content.
    Text(String),
}

/// A node in the arena.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }
}

/// A parsed chapter document.
///
/// The root node is synthetic: its children are the chapter's top-level
/// nodes. For a full XHTML document these are the children of `<html>`;
/// the wrapper element itself is lifted away so that paths start at
/// `head`/`body`, matching how reading systems address chapter content.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    id_map: HashMap<String, NodeId>,
}

impl Document {
    pub(crate) fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId::NONE,
            id_map: HashMap::new(),
        };
        doc.root = doc.alloc(Node::new(NodeData::Root));
        doc
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// The synthetic chapter root (the CFI path boundary).
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.get(id).parent;
        parent.is_some().then_some(parent)
    }

    /// All children of a node, in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = self.get(id).first_child;
        std::iter::from_fn(move || {
            if next.is_none() {
                return None;
            }
            let current = next;
            next = self.get(current).next_sibling;
            Some(current)
        })
    }

    /// Element children only (the sibling set element steps index into).
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.get(c).is_element())
    }

    /// Text children only (the sibling set text steps index into).
    pub fn child_texts(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.get(c).is_text())
    }

    /// The nth element child, by rank among element siblings.
    pub fn child_element_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.child_elements(id).nth(index)
    }

    /// The nth text child, by rank among text siblings.
    pub fn child_text_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.child_texts(id).nth(index)
    }

    /// Positional index of a node among same-kind siblings.
    pub fn sibling_rank(&self, id: NodeId) -> usize {
        let Some(parent) = self.parent(id) else {
            return 0;
        };
        let is_text = self.get(id).is_text();
        self.children(parent)
            .filter(|&c| self.get(c).is_text() == is_text)
            .take_while(|&c| c != id)
            .count()
    }

    /// Look up an element by its id attribute.
    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    /// Element name, or `None` for text nodes.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Attribute value on an element.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.get(id).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// The id token carried by an element, if any. Empty ids count as absent.
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).data {
            NodeData::Element { id: Some(token), .. } if !token.is_empty() => Some(token),
            _ => None,
        }
    }

    /// Text content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id).data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The `<body>` element if the chapter has one, otherwise the root.
    ///
    /// This is where focus-line descent and fragment lookups start.
    pub fn body(&self) -> NodeId {
        self.child_elements(self.root)
            .find(|&c| self.element_name(c) == Some("body"))
            .unwrap_or(self.root)
    }

    /// All descendants of a node in document order, node itself excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut kids: Vec<NodeId> = self.children(current).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// All text nodes in document order.
    pub fn text_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.get(n).is_text())
            .collect()
    }

    pub(crate) fn append_element(
        &mut self,
        parent: NodeId,
        name: String,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let id_attr = attrs
            .iter()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty());
        let node = self.alloc(Node::new(NodeData::Element {
            name,
            attrs,
            id: id_attr.clone(),
        }));
        self.attach(parent, node);
        if let Some(id_attr) = id_attr {
            self.id_map.entry(id_attr).or_insert(node);
        }
        node
    }

    /// Append text under a parent, merging into a trailing text sibling so
    /// entity references don't split one run into several nodes.
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        let last = self.get(parent).last_child;
        if last.is_some()
            && let NodeData::Text(existing) = &mut self.get_mut(last).data
        {
            existing.push_str(text);
            return;
        }
        let node = self.alloc(Node::new(NodeData::Text(text.to_string())));
        self.attach(parent, node);
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let last = self.get(parent).last_child;
        self.get_mut(child).parent = parent;
        self.get_mut(child).prev_sibling = last;
        if last.is_some() {
            self.get_mut(last).next_sibling = child;
        } else {
            self.get_mut(parent).first_child = child;
        }
        self.get_mut(parent).last_child = child;
    }

    /// Replace the root's children with the children of `wrapper`, leaving
    /// the wrapper element orphaned in the arena.
    pub(crate) fn lift_wrapper(&mut self, wrapper: NodeId) {
        let root = self.root;
        let first = self.get(wrapper).first_child;
        let last = self.get(wrapper).last_child;
        let mut child = first;
        while child.is_some() {
            self.get_mut(child).parent = root;
            child = self.get(child).next_sibling;
        }
        self.get_mut(root).first_child = first;
        self.get_mut(root).last_child = last;
        let wrapper_node = self.get_mut(wrapper);
        wrapper_node.parent = NodeId::NONE;
        wrapper_node.first_child = NodeId::NONE;
        wrapper_node.last_child = NodeId::NONE;
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("ids", &self.id_map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        parse_document(
            "<html><head/><body id=\"b\"><p id=\"p1\">one</p><p>two<span>x</span>tail</p></body></html>",
        )
        .unwrap()
    }

    #[test]
    fn test_html_wrapper_lifted() {
        let doc = sample();
        let names: Vec<_> = doc
            .child_elements(doc.root())
            .filter_map(|c| doc.element_name(c).map(str::to_string))
            .collect();
        assert_eq!(names, ["head", "body"]);
    }

    #[test]
    fn test_sibling_rank_counts_same_kind_only() {
        let doc = sample();
        let body = doc.body();
        let second_p = doc.child_element_at(body, 1).unwrap();
        assert_eq!(doc.sibling_rank(second_p), 1);

        // "two" and "tail" are text siblings 0 and 1; <span> doesn't count
        let tail = doc.child_text_at(second_p, 1).unwrap();
        assert_eq!(doc.text(tail), Some("tail"));
        assert_eq!(doc.sibling_rank(tail), 1);
    }

    #[test]
    fn test_id_lookup() {
        let doc = sample();
        let p1 = doc.node_by_id("p1").unwrap();
        assert_eq!(doc.element_name(p1), Some("p"));
        assert_eq!(doc.element_id(p1), Some("p1"));
    }

    #[test]
    fn test_body_fallback_for_fragment() {
        let doc = parse_document("<div><p>x</p></div>").unwrap();
        // no <body>: descent starts at the root
        assert_eq!(doc.body(), doc.root());
        assert_eq!(doc.child_elements(doc.root()).count(), 1);
    }
}
