//! # folio
//!
//! A virtualized EPUB reading engine with CFI position addressing.
//!
//! folio opens a zipped EPUB, models each spine item as a chapter view,
//! and lays the views out in a scrolled or paginated flow where only a
//! window around the viewport is ever attached. Positions are addressed
//! with EPUB Canonical Fragment Identifiers, so a reading position
//! survives restarts, reflows, and window resizes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::{Book, Reader, RenditionOptions, Size, UniformMeasurer};
//!
//! let mut reader = Reader::new();
//! reader.open(Book::open("book.epub")?);
//! reader.render(
//!     Box::new(UniformMeasurer::new(Size::new(600.0, 2400.0))),
//!     RenditionOptions::default(),
//! )?;
//!
//! // Jump to a stored position, then read the corrected one back
//! reader.display("epubcfi(/6/8!/4/10/1:120)")?;
//! reader.pump()?;
//! let position = reader.rendition_mut()?.layout().current_cfi()?;
//! println!("now at {position}");
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! ## Addressing
//!
//! [`Cfi`] is the address model: parse one with [`Cfi::parse`], build one
//! from a document position with [`Cfi::from_position`] or
//! [`Cfi::from_range`], and turn one back into a node with
//! [`Cfi::resolve`]. Serialization round-trips byte-for-byte for
//! canonical input.

pub mod annotations;
pub mod book;
pub mod cfi;
pub mod dom;
pub mod error;
pub mod events;
pub mod geometry;
pub mod layout;
pub mod plugins;
pub mod reader;
pub mod rendition;
pub mod view;

pub(crate) mod util;

pub use annotations::{Annotation, AnnotationId, AnnotationKind, Annotations, Mark};
pub use book::{Book, GuideReference, ManifestItem, Metadata, SpineItem, TocEntry};
pub use cfi::{Cfi, ContentRange, Segment, Step, StepKind, Terminal};
pub use dom::{Document, NodeId, parse_document};
pub use error::{Error, Result};
pub use events::ReaderEvent;
pub use geometry::{Rect, Size};
pub use layout::{LayoutMode, LayoutOptions, LayoutState, ViewLayout};
pub use plugins::{Capability, PluginSet, SearchMatch, Theme, search_chapter};
pub use reader::Reader;
pub use rendition::{DisplayTarget, Rendition, RenditionOptions};
pub use view::{
    ChapterView, FontMetrics, LinkTarget, Measurer, UniformMeasurer, classify_link, content_links,
};
