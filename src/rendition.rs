//! Navigation facade.
//!
//! Normalizes every way a host can say "go there" (a canonical CFI
//! string, a parsed [`Cfi`], a chapter-relative link, or a percentage)
//! into the address model and hands the result to the layout engine.
//! In-content link clicks route through here as well.

use crate::annotations::{Annotations, Mark};
use crate::book::Book;
use crate::cfi::Cfi;
use crate::error::{Error, Result};
use crate::events::ReaderEvent;
use crate::geometry::Size;
use crate::layout::{LayoutMode, LayoutOptions, ViewLayout};
use crate::util::is_cfi_string;
use crate::view::{ChapterView, LinkTarget, Measurer, classify_link};

/// A normalized navigation request. The set is closed: anything a host can
/// pass either converts into one of these or is rejected up front.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayTarget {
    /// A parsed address.
    Cfi(Cfi),
    /// A canonical `epubcfi(...)` string.
    Address(String),
    /// A chapter-relative link, `chapter.xhtml#fragment`.
    Link(String),
    /// A scroll ratio strictly between 0 and 1.
    Percent(f64),
}

impl From<Cfi> for DisplayTarget {
    fn from(cfi: Cfi) -> Self {
        Self::Cfi(cfi)
    }
}

impl From<f64> for DisplayTarget {
    fn from(percent: f64) -> Self {
        Self::Percent(percent)
    }
}

impl From<&str> for DisplayTarget {
    fn from(target: &str) -> Self {
        if is_cfi_string(target) {
            Self::Address(target.to_string())
        } else {
            Self::Link(target.to_string())
        }
    }
}

impl From<String> for DisplayTarget {
    fn from(target: String) -> Self {
        Self::from(target.as_str())
    }
}

/// Rendition construction options.
pub struct RenditionOptions {
    pub mode: LayoutMode,
    pub virtual_views: bool,
    pub viewport: Size,
}

impl Default for RenditionOptions {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Scroll,
            virtual_views: true,
            viewport: Size::new(600.0, 800.0),
        }
    }
}

/// Owns the layout engine and the annotation registry for one reader.
pub struct Rendition {
    layout: ViewLayout,
    annotations: Annotations,
}

impl Rendition {
    /// Build views for every spine item and set up the chosen layout.
    pub fn new(book: &Book, measurer: Box<dyn Measurer>, options: RenditionOptions) -> Self {
        let views: Vec<ChapterView> = book.spine.iter().map(ChapterView::new).collect();
        let layout = ViewLayout::new(
            views,
            measurer,
            LayoutOptions {
                mode: options.mode,
                virtual_views: options.virtual_views,
                viewport: options.viewport,
            },
        );
        Self {
            layout,
            annotations: Annotations::new(),
        }
    }

    pub fn render(&mut self) -> Result<()> {
        self.layout.render()
    }

    pub fn layout(&self) -> &ViewLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut ViewLayout {
        &mut self.layout
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    /// Navigate to any supported target form.
    pub fn display(&mut self, target: impl Into<DisplayTarget>) -> Result<()> {
        match target.into() {
            DisplayTarget::Cfi(cfi) => self.layout.display(&cfi),
            DisplayTarget::Address(address) => {
                let cfi = Cfi::parse(&address)?;
                self.layout.display(&cfi)
            }
            DisplayTarget::Link(link) => {
                let cfi = self.href_to_cfi(&link)?;
                self.layout.display(&cfi)
            }
            DisplayTarget::Percent(percent) => {
                if percent > 0.0 && percent < 1.0 {
                    self.layout.set_percent(percent);
                    Ok(())
                } else {
                    Err(Error::InvalidTarget(format!(
                        "percentage {percent} is outside (0, 1)"
                    )))
                }
            }
        }
    }

    /// Convert a `chapter.xhtml#fragment` link into a CFI against the view
    /// list. Without a fragment the chapter's first element is addressed.
    pub fn href_to_cfi(&self, link: &str) -> Result<Cfi> {
        let link = link.strip_prefix('/').unwrap_or(link);
        let (chapter, fragment) = match link.split_once('#') {
            Some((chapter, fragment)) => (chapter, Some(fragment)),
            None => (link, None),
        };
        if chapter.is_empty() {
            return Err(Error::InvalidTarget(format!("invalid link: {link}")));
        }

        let view_index = self
            .layout
            .views()
            .iter()
            .position(|view| view.href() == chapter)
            .ok_or_else(|| Error::NotFound(format!("{chapter} is not in the spine")))?;
        let view = &self.layout.views()[view_index];
        let doc = view.document()?;

        let node = match fragment {
            Some(fragment) if !fragment.is_empty() => doc.node_by_id(fragment).ok_or_else(|| {
                Error::NotFound(format!("no element with id {fragment} in {chapter}"))
            })?,
            _ => doc.child_elements(doc.root()).next().unwrap_or(doc.root()),
        };

        Cfi::from_position(doc, node, None, Cfi::base_for_spine(view_index))
    }

    /// Handle a click on an in-content anchor. Internal links navigate
    /// through the facade; `mailto:` and absolute external URLs are handed
    /// back for the host to open.
    pub fn follow_link(&mut self, href: &str) -> Result<LinkTarget> {
        let target = classify_link(href);
        if let LinkTarget::Internal(link) = &target {
            self.layout
                .push_event(ReaderEvent::LinkClicked(link.clone()));
            self.display(DisplayTarget::Link(link.clone()))?;
        }
        Ok(target)
    }

    /// Resolve every annotation against the current views.
    pub fn annotation_marks(&self) -> Vec<Mark> {
        self.annotations.marks(&self.layout)
    }
}
