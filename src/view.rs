//! Chapter views and the measurement seam.
//!
//! A [`ChapterView`] is one spine item's renderable content. Views are
//! created for every spine item up front, materialize (parse) their markup
//! when the layout engine first needs them, and report a measured size once
//! a [`Measurer`] has seen them. The `connected` flag tracks membership in
//! the visible window; the layout engine observes its transitions.

use crate::book::SpineItem;
use crate::dom::{Document, NodeId, parse_document};
use crate::error::{Error, Result};
use crate::geometry::{Rect, Size};

/// Font metrics of an element, for the text-offset scroll estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub font_size: f64,
    pub line_height: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            line_height: 24.0,
        }
    }
}

/// The render-tree collaborator: everything the layout engine knows about
/// pixel geometry comes through this trait.
///
/// Rects are local to the view; the engine shifts them by the view's
/// cumulative offset. Measurements are only read after the engine's
/// deferred measurement pass, so implementations may lay out lazily.
pub trait Measurer {
    /// Natural size of a whole chapter view.
    fn measure_view(&mut self, view: &ChapterView) -> Size;

    /// View-local box of a node, if the node has layout.
    fn node_rect(&self, view: &ChapterView, node: NodeId) -> Option<Rect>;

    /// Computed font metrics at a node.
    fn font_metrics(&self, view: &ChapterView, node: NodeId) -> FontMetrics {
        let _ = (view, node);
        FontMetrics::default()
    }
}

/// Fixed-size measurer: every chapter gets the same box and nodes sit at
/// the view origin. Good enough for headless use where only chapter-level
/// navigation matters.
#[derive(Debug, Clone, Copy)]
pub struct UniformMeasurer {
    pub view_size: Size,
}

impl UniformMeasurer {
    pub fn new(view_size: Size) -> Self {
        Self { view_size }
    }
}

impl Measurer for UniformMeasurer {
    fn measure_view(&mut self, _view: &ChapterView) -> Size {
        self.view_size
    }

    fn node_rect(&self, _view: &ChapterView, _node: NodeId) -> Option<Rect> {
        Some(Rect::new(0.0, 0.0, self.view_size.width, self.view_size.height))
    }
}

/// One spine item's materialized or to-be-materialized content.
pub struct ChapterView {
    idref: String,
    href: String,
    markup: String,
    doc: Option<Document>,
    size: Size,
    connected: bool,
}

impl ChapterView {
    pub(crate) fn new(item: &SpineItem) -> Self {
        Self {
            idref: item.idref.clone(),
            href: item.href.clone(),
            markup: item.content.clone(),
            doc: None,
            size: Size::default(),
            connected: false,
        }
    }

    pub fn idref(&self) -> &str {
        &self.idref
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Parse the chapter markup if it hasn't been parsed yet.
    pub(crate) fn materialize(&mut self) -> Result<()> {
        if self.doc.is_none() {
            self.doc = Some(parse_document(&self.markup)?);
        }
        Ok(())
    }

    /// The parsed content tree; errors if the view was never materialized.
    pub fn document(&self) -> Result<&Document> {
        self.doc
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("view {} is not materialized", self.href)))
    }

    /// Measured size; only meaningful after a measurement pass.
    pub fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: Size) -> bool {
        let changed = size != self.size;
        self.size = size;
        changed
    }

    /// Whether the view currently sits in the visible window.
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl std::fmt::Debug for ChapterView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterView")
            .field("idref", &self.idref)
            .field("href", &self.href)
            .field("size", &self.size)
            .field("connected", &self.connected)
            .finish()
    }
}

/// Where a content hyperlink leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// `mailto:` links are left alone.
    Mailto(String),
    /// Absolute external URLs open outside the reader.
    External(String),
    /// Everything else is a chapter-relative link routed back through the
    /// navigation facade.
    Internal(String),
}

/// Classify a single href the way in-content clicks are intercepted.
pub fn classify_link(href: &str) -> LinkTarget {
    if href.starts_with("mailto:") {
        LinkTarget::Mailto(href.to_string())
    } else if href.contains("://") {
        LinkTarget::External(href.to_string())
    } else {
        LinkTarget::Internal(href.to_string())
    }
}

/// Collect and classify every anchor with an href in a chapter document.
pub fn content_links(doc: &Document) -> Vec<(NodeId, LinkTarget)> {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&node| doc.element_name(node) == Some("a"))
        .filter_map(|node| {
            doc.attribute(node, "href")
                .map(|href| (node, classify_link(href)))
        })
        .collect()
}
