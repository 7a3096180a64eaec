//! EPUB container opening and package structure.
//!
//! The [`Book`] is the content source the rest of the engine draws on: it
//! owns everything parsed out of the archive (metadata, manifest, spine,
//! guide, table of contents) and serves decoded chapter markup by href.
//! Layout and addressing never touch the archive themselves.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::util::{decode_text, declared_encoding, resolve_entity};

/// Book metadata (Dublin Core subset).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub creators: Vec<String>,
    pub language: String,
    pub identifier: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub rights: Option<String>,
}

/// A manifest entry.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// An item in the reading order. Spine order is addressing order: the
/// position here drives the second step of every CFI chapter block.
#[derive(Debug, Clone)]
pub struct SpineItem {
    pub idref: String,
    pub href: String,
    pub properties: Option<String>,
    pub linear: bool,
    /// Decoded chapter markup.
    pub content: String,
}

/// A guide reference (`<guide><reference .../></guide>`).
#[derive(Debug, Clone)]
pub struct GuideReference {
    pub ref_type: String,
    pub title: String,
    pub href: String,
}

/// A table of contents entry (hierarchical, from the NCX).
#[derive(Debug, Clone, Default)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
    pub children: Vec<TocEntry>,
    pub play_order: Option<usize>,
}

/// An opened EPUB.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub metadata: Metadata,
    /// Maps manifest id -> item.
    pub manifest: HashMap<String, ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub guide: Vec<GuideReference>,
    pub toc: Vec<TocEntry>,
}

impl Book {
    /// Open an EPUB file from disk.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folio::Book;
    ///
    /// let book = Book::open("path/to/book.epub")?;
    /// println!("Title: {}", book.metadata.title);
    /// # Ok::<(), folio::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Open an EPUB from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(std::io::Cursor::new(bytes.to_vec()))
    }

    /// Open an EPUB from any [`Read`] + [`Seek`] source.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let opf_path = find_opf_path(&mut archive)?;
        let opf_dir = Path::new(&opf_path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        let opf_bytes = read_archive_entry(&mut archive, &opf_path)?;
        let opf_text = decode_entry(&opf_bytes);
        let package = parse_opf(&opf_text)?;

        let mut book = Book {
            metadata: package.metadata,
            manifest: package.manifest,
            guide: package.guide,
            ..Book::default()
        };

        // Spine itemrefs resolve through the manifest; chapter markup loads
        // eagerly so views can materialize without touching the archive.
        for itemref in package.spine {
            let Some(item) = book.manifest.get(&itemref.idref) else {
                continue;
            };
            let entry_path = resolve_path(&opf_dir, &item.href);
            let bytes = read_archive_entry(&mut archive, &entry_path)?;
            book.spine.push(SpineItem {
                idref: itemref.idref,
                href: item.href.clone(),
                properties: itemref.properties,
                linear: itemref.linear,
                content: decode_entry(&bytes).into_owned(),
            });
        }

        if let Some(toc_id) = package.toc_id
            && let Some(item) = book.manifest.get(&toc_id)
        {
            let ncx_path = resolve_path(&opf_dir, &item.href);
            if let Ok(bytes) = read_archive_entry(&mut archive, &ncx_path) {
                book.toc = parse_ncx(&decode_entry(&bytes))?;
            }
        }

        Ok(book)
    }

    /// Decoded markup for a spine item, by href.
    pub fn content(&self, href: &str) -> Result<&str> {
        self.spine
            .iter()
            .find(|item| item.href == href)
            .map(|item| item.content.as_str())
            .ok_or_else(|| Error::NotFound(format!("{href} is not in the spine")))
    }

    /// Spine position of a chapter href.
    pub fn spine_index_of(&self, href: &str) -> Option<usize> {
        self.spine.iter().position(|item| item.href == href)
    }
}

fn decode_entry(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    let hint = declared_encoding(bytes);
    decode_text(bytes, hint.as_deref())
}

struct SpineRef {
    idref: String,
    properties: Option<String>,
    linear: bool,
}

struct PackageData {
    metadata: Metadata,
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<SpineRef>,
    guide: Vec<GuideReference>,
    toc_id: Option<String>,
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let bytes = read_archive_entry(archive, "META-INF/container.xml")
        .map_err(|_| Error::InvalidContainer("META-INF/container.xml is missing".into()))?;
    let content = decode_entry(&bytes);

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidContainer(
        "no rootfile in container.xml".into(),
    ))
}

fn parse_opf(content: &str) -> Result<PackageData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut metadata = Metadata::default();
    let mut manifest: HashMap<String, ManifestItem> = HashMap::new();
    let mut spine: Vec<SpineRef> = Vec::new();
    let mut guide: Vec<GuideReference> = Vec::new();
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_field: Option<String> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = true,
                    local @ (b"title" | b"creator" | b"language" | b"identifier"
                    | b"publisher" | b"description" | b"date" | b"rights") => {
                        if in_metadata {
                            current_field = Some(String::from_utf8_lossy(local).to_string());
                            buf_text.clear();
                        }
                    }
                    b"spine" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"toc" {
                                toc_id = Some(String::from_utf8(attr.value.to_vec())?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => {
                        let mut id = String::new();
                        let mut item = ManifestItem {
                            href: String::new(),
                            media_type: String::new(),
                            properties: None,
                        };
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8(attr.value.to_vec())?;
                            match attr.key.as_ref() {
                                b"id" => id = value,
                                b"href" => item.href = value,
                                b"media-type" => item.media_type = value,
                                b"properties" => item.properties = Some(value),
                                _ => {}
                            }
                        }
                        if !id.is_empty() {
                            manifest.insert(id, item);
                        }
                    }
                    b"itemref" => {
                        let mut itemref = SpineRef {
                            idref: String::new(),
                            properties: None,
                            linear: true,
                        };
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8(attr.value.to_vec())?;
                            match attr.key.as_ref() {
                                b"idref" => itemref.idref = value,
                                b"properties" => itemref.properties = Some(value),
                                b"linear" => itemref.linear = value != "no",
                                _ => {}
                            }
                        }
                        if !itemref.idref.is_empty() {
                            spine.push(itemref);
                        }
                    }
                    b"reference" => {
                        let mut reference = GuideReference {
                            ref_type: String::new(),
                            title: String::new(),
                            href: String::new(),
                        };
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8(attr.value.to_vec())?;
                            match attr.key.as_ref() {
                                b"type" => reference.ref_type = value,
                                b"title" => reference.title = value,
                                b"href" => reference.href = value,
                                _ => {}
                            }
                        }
                        guide.push(reference);
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_field.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_field.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }
                if let Some(field) = current_field.take() {
                    match field.as_str() {
                        "title" => metadata.title = buf_text.clone(),
                        "creator" => metadata.creators.push(buf_text.clone()),
                        "language" => metadata.language = buf_text.clone(),
                        "identifier" => {
                            if metadata.identifier.is_empty() {
                                metadata.identifier = buf_text.clone();
                            }
                        }
                        "publisher" => metadata.publisher = Some(buf_text.clone()),
                        "description" => metadata.description = Some(buf_text.clone()),
                        "date" => metadata.date = Some(buf_text.clone()),
                        "rights" => metadata.rights = Some(buf_text.clone()),
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(PackageData {
        metadata,
        manifest,
        spine,
        guide,
        toc_id,
    })
}

fn parse_ncx(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // One frame per open navPoint; the bottom frame collects the roots
    let mut stack: Vec<TocEntry> = vec![TocEntry::default()];
    let mut in_label = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" => {
                        let mut entry = TocEntry::default();
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"playOrder" {
                                entry.play_order =
                                    String::from_utf8_lossy(&attr.value).parse().ok();
                            }
                        }
                        stack.push(entry);
                    }
                    b"text" => in_label = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src"
                            && let Some(entry) = stack.last_mut()
                        {
                            entry.href = String::from_utf8(attr.value.to_vec())?;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_label && let Some(entry) = stack.last_mut() {
                    entry.title.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_label
                    && let Some(entry) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    entry.title.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"text" => in_label = false,
                    b"navPoint" => {
                        if let Some(entry) = stack.pop()
                            && let Some(parent) = stack.last_mut()
                        {
                            parent.children.push(entry);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(stack.pop().map(|root| root.children).unwrap_or_default())
}

fn read_archive_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    // Try direct lookup first
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Fallback: percent-decoded path (handles malformed EPUBs)
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| Error::NotFound(format!("invalid UTF-8 in path: {path}")))?;

    match archive.by_name(&decoded) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            Ok(contents)
        }
        Err(zip::result::ZipError::FileNotFound) => {
            Err(Error::NotFound(format!("no archive entry for {path}")))
        }
        Err(e) => Err(e.into()),
    }
}

fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{base}/{href}")
    }
}

/// Extract local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"title"), b"title");
    }

    #[test]
    fn test_parse_opf_structure() {
        let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Don&apos;t Stop</dc:title>
    <dc:creator>A. Writer</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier>urn:uuid:1234</dc:identifier>
  </metadata>
  <manifest>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="ch2.xhtml" media-type="application/xhtml+xml" properties="svg"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2" linear="no"/>
  </spine>
  <guide>
    <reference type="cover" title="Cover" href="ch1.xhtml"/>
  </guide>
</package>"#;

        let package = parse_opf(opf).unwrap();
        assert_eq!(package.metadata.title, "Don't Stop");
        assert_eq!(package.metadata.creators, ["A. Writer"]);
        assert_eq!(package.manifest.len(), 3);
        assert_eq!(package.spine.len(), 2);
        assert!(package.spine[0].linear);
        assert!(!package.spine[1].linear);
        assert_eq!(package.guide.len(), 1);
        assert_eq!(package.guide[0].ref_type, "cover");
        assert_eq!(package.toc_id.as_deref(), Some("ncx"));
    }

    #[test]
    fn test_parse_ncx_nesting() {
        let ncx = r#"<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>Part One</text></navLabel>
      <content src="ch1.xhtml"/>
      <navPoint id="n2" playOrder="2">
        <navLabel><text>Chapter 1</text></navLabel>
        <content src="ch1.xhtml#s1"/>
      </navPoint>
    </navPoint>
  </navMap>
</ncx>"#;

        let toc = parse_ncx(ncx).unwrap();
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].title, "Part One");
        assert_eq!(toc[0].play_order, Some(1));
        assert_eq!(toc[0].children.len(), 1);
        assert_eq!(toc[0].children[0].href, "ch1.xhtml#s1");
    }
}
