//! The owning reader instance.
//!
//! Explicit context object tying a book, its rendition, and the enabled
//! capabilities together. There is no instance registry and no ambient
//! state: everything a component needs arrives through its constructor and
//! dies with this struct.

use crate::book::Book;
use crate::error::{Error, Result};
use crate::events::ReaderEvent;
use crate::plugins::{Capability, PluginSet, SearchMatch, search_chapter};
use crate::rendition::{DisplayTarget, Rendition, RenditionOptions};
use crate::view::Measurer;

/// A reader instance: one book, one rendition.
#[derive(Default)]
pub struct Reader {
    book: Option<Book>,
    rendition: Option<Rendition>,
    plugins: PluginSet,
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reader with the given capabilities switched on.
    pub fn with_capabilities(capabilities: &[Capability]) -> Self {
        Self {
            plugins: PluginSet::new(capabilities),
            ..Self::default()
        }
    }

    /// Attach an opened book. Replaces any previous book and drops the
    /// previous rendition.
    pub fn open(&mut self, book: Book) {
        self.book = Some(book);
        self.rendition = None;
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginSet {
        &mut self.plugins
    }

    /// Build the rendition and run its initial render pass.
    ///
    /// Rendering before [`Reader::open`] is a precondition failure.
    pub fn render(&mut self, measurer: Box<dyn Measurer>, options: RenditionOptions) -> Result<()> {
        let book = self.book.as_ref().ok_or(Error::MissingBook)?;
        let mut rendition = Rendition::new(book, measurer, options);
        rendition.render()?;
        self.rendition = Some(rendition);
        Ok(())
    }

    pub fn rendition(&self) -> Option<&Rendition> {
        self.rendition.as_ref()
    }

    pub fn rendition_mut(&mut self) -> Result<&mut Rendition> {
        self.rendition.as_mut().ok_or(Error::MissingBook)
    }

    /// Navigate to a CFI string, chapter link, percentage, or parsed CFI.
    pub fn display(&mut self, target: impl Into<DisplayTarget>) -> Result<()> {
        self.rendition_mut()?.display(target)
    }

    /// Drain deferred layout work (the host's event-loop turn).
    pub fn pump(&mut self) -> Result<()> {
        self.rendition_mut()?.layout_mut().pump();
        Ok(())
    }

    /// Collect events recorded since the last poll.
    pub fn poll_events(&mut self) -> Vec<ReaderEvent> {
        self.rendition
            .as_mut()
            .map(|rendition| rendition.layout_mut().take_events())
            .unwrap_or_default()
    }

    /// Linear-scan the whole book for a query.
    ///
    /// Requires [`Capability::Search`] and a rendered rendition (the scan
    /// runs over the materialized view cache).
    pub fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        if !self.plugins.is_enabled(Capability::Search) {
            return Err(Error::InvalidTarget(
                "search capability is not enabled".into(),
            ));
        }
        let rendition = self.rendition.as_ref().ok_or(Error::MissingBook)?;

        let mut matches = Vec::new();
        for (index, view) in rendition.layout().views().iter().enumerate() {
            let doc = view.document()?;
            matches.extend(search_chapter(doc, index, query)?);
        }
        Ok(matches)
    }
}
