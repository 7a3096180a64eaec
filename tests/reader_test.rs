//! End-to-end tests against a synthetic in-memory EPUB: container opening,
//! reader lifecycle, navigation targets, links, search, and annotations.

mod common;

use std::io::Write;

use folio::{
    AnnotationKind, Book, Capability, Cfi, Error, LinkTarget, Reader, ReaderEvent,
    RenditionOptions, Size, UniformMeasurer,
};

fn opened_reader() -> Reader {
    let mut reader = Reader::with_capabilities(&[Capability::Search, Capability::Annotate]);
    reader.open(Book::from_bytes(&common::sample_epub()).unwrap());
    reader
        .render(
            Box::new(UniformMeasurer::new(Size::new(600.0, 1000.0))),
            RenditionOptions::default(),
        )
        .unwrap();
    reader.pump().unwrap();
    reader
}

// ============================================================================
// Container / Book
// ============================================================================

#[test]
fn test_open_book_structure() {
    let book = Book::from_bytes(&common::sample_epub()).unwrap();

    assert_eq!(book.metadata.title, "A Tale of Two Sittings");
    assert_eq!(book.metadata.creators, ["Charles Writer"]);
    assert_eq!(book.metadata.language, "en");
    assert_eq!(book.metadata.identifier, "urn:uuid:folio-fixture");
    assert_eq!(book.metadata.publisher.as_deref(), Some("Fixture Press"));

    let hrefs: Vec<_> = book.spine.iter().map(|item| item.href.as_str()).collect();
    assert_eq!(hrefs, ["ch1.xhtml", "ch2.xhtml", "ch3.xhtml"]);
    assert_eq!(book.spine_index_of("ch2.xhtml"), Some(1));

    assert_eq!(book.manifest.len(), 4);
    assert_eq!(book.guide.len(), 1);
    assert_eq!(book.guide[0].ref_type, "text");

    assert_eq!(book.toc.len(), 2);
    assert_eq!(book.toc[1].children.len(), 1);
    assert_eq!(book.toc[1].children[0].href, "ch2.xhtml#target");

    assert!(book.content("ch1.xhtml").unwrap().contains("best of times"));
    assert!(matches!(
        book.content("nope.xhtml"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_open_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&common::sample_epub()).unwrap();

    let book = Book::open(file.path()).unwrap();
    assert_eq!(book.spine.len(), 3);
}

#[test]
fn test_invalid_container() {
    assert!(matches!(
        Book::from_bytes(&common::not_an_epub()),
        Err(Error::InvalidContainer(_))
    ));
}

// ============================================================================
// Reader lifecycle
// ============================================================================

#[test]
fn test_render_requires_book() {
    let mut reader = Reader::new();
    let err = reader
        .render(
            Box::new(UniformMeasurer::new(Size::new(600.0, 1000.0))),
            RenditionOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::MissingBook));

    let err = reader.display("epubcfi(/6/2!)").unwrap_err();
    assert!(matches!(err, Error::MissingBook));
}

#[test]
fn test_render_emits_events() {
    let mut reader = opened_reader();
    let events = reader.poll_events();
    assert!(events.contains(&ReaderEvent::Rendered));
    assert!(events.contains(&ReaderEvent::ViewConnected(0)));
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_display_address_string() {
    let mut reader = opened_reader();

    reader.display("epubcfi(/6/4[ch2]!/4[body02]/4[target])").unwrap();
    reader.pump().unwrap();

    let layout = reader.rendition_mut().unwrap().layout();
    let (index, _) = layout.current_view_index().unwrap();
    assert_eq!(index, 1);

    let position = layout.current_cfi().unwrap();
    assert_eq!(position.spine_index(), 1);
}

#[test]
fn test_display_unattached_chapter_two_phase() {
    let mut reader = opened_reader();
    {
        let layout = reader.rendition_mut().unwrap().layout();
        assert!(!layout.views()[2].connected());
    }

    reader.display("epubcfi(/6/6!/4[body03]/2[fin])").unwrap();
    {
        let layout = reader.rendition_mut().unwrap().layout();
        assert_eq!(layout.fine_corrections(), 0);
        assert_eq!(layout.scroll_offset(), 2000.0);
    }

    reader.pump().unwrap();
    let layout = reader.rendition_mut().unwrap().layout();
    assert_eq!(layout.fine_corrections(), 1);

    let events = reader.poll_events();
    assert!(events.contains(&ReaderEvent::ViewConnected(2)));
}

#[test]
fn test_display_percent_validation() {
    let mut reader = opened_reader();

    assert!(matches!(
        reader.display(1.5),
        Err(Error::InvalidTarget(_))
    ));
    assert!(matches!(
        reader.display(0.0),
        Err(Error::InvalidTarget(_))
    ));

    // In-range percentages are accepted (windowed layout ignores them)
    reader.display(0.5).unwrap();
}

#[test]
fn test_display_unknown_chapter_errors() {
    let mut reader = opened_reader();
    let before = reader.rendition_mut().unwrap().layout().scroll_offset();

    let err = reader.display("epubcfi(/6/40!/2)").unwrap_err();
    assert!(matches!(err, Error::UnresolvableCfi(_)));
    assert_eq!(
        reader.rendition_mut().unwrap().layout().scroll_offset(),
        before
    );
}

// ============================================================================
// Links
// ============================================================================

#[test]
fn test_display_chapter_link() {
    let mut reader = opened_reader();

    reader.display("ch2.xhtml#target").unwrap();
    reader.pump().unwrap();

    let (index, _) = reader
        .rendition_mut()
        .unwrap()
        .layout()
        .current_view_index()
        .unwrap();
    assert_eq!(index, 1);

    assert!(matches!(
        reader.display("missing.xhtml#x"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        reader.display("ch2.xhtml#no-such-id"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_follow_link_policy() {
    let mut reader = opened_reader();
    let rendition = reader.rendition_mut().unwrap();

    let target = rendition.follow_link("https://example.com/").unwrap();
    assert!(matches!(target, LinkTarget::External(_)));

    let target = rendition.follow_link("mailto:someone@example.com").unwrap();
    assert!(matches!(target, LinkTarget::Mailto(_)));

    let target = rendition.follow_link("ch2.xhtml#target").unwrap();
    assert!(matches!(target, LinkTarget::Internal(_)));

    let events = reader.poll_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ReaderEvent::LinkClicked(href) if href == "ch2.xhtml#target"))
    );
}

// ============================================================================
// Search and annotations
// ============================================================================

#[test]
fn test_search_produces_range_addresses() {
    let reader = opened_reader();

    let matches = reader.search("cat").unwrap();
    assert_eq!(matches.len(), 1);
    assert!(matches[0].cfi.is_range());
    assert_eq!(matches[0].cfi.spine_index(), 1);
    assert!(matches[0].excerpt.contains("cat sat on the mat"));

    // the produced address resolves against the chapter it names
    let book = reader.book().unwrap();
    let doc = folio::parse_document(book.content("ch2.xhtml").unwrap()).unwrap();
    assert!(matches[0].cfi.resolve_range(&doc).is_ok());
}

#[test]
fn test_search_requires_capability() {
    let mut reader = Reader::new();
    reader.open(Book::from_bytes(&common::sample_epub()).unwrap());
    reader
        .render(
            Box::new(UniformMeasurer::new(Size::new(600.0, 1000.0))),
            RenditionOptions::default(),
        )
        .unwrap();

    assert!(matches!(
        reader.search("cat"),
        Err(Error::InvalidTarget(_))
    ));
}

#[test]
fn test_annotations_resolve_to_marks() {
    let mut reader = opened_reader();

    let cfi = reader.search("cat").unwrap().remove(0).cfi;
    let rendition = reader.rendition_mut().unwrap();
    let id = rendition
        .annotations_mut()
        .add(AnnotationKind::Highlight, cfi, vec!["hl".into()]);

    let marks = rendition.annotation_marks();
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].annotation, id);
    assert_eq!(marks[0].view_index, 1);
    assert!(!marks[0].rects.is_empty());
    assert_eq!(marks[0].class_list, ["hl"]);

    // removing an annotation also removes its mark
    assert!(rendition.annotations_mut().remove(id));
    assert!(rendition.annotation_marks().is_empty());

    // an annotation pointing past the spine is skipped, not fatal
    let stray = Cfi::parse("epubcfi(/6/40!/2)").unwrap();
    rendition.annotations_mut().highlight(stray);
    assert!(rendition.annotation_marks().is_empty());
}
