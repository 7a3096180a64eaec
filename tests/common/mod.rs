//! Shared fixture: a small synthetic EPUB built in memory.

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CH1: &str = concat!(
    "<html><head><title>One</title></head>",
    "<body id=\"body01\">",
    "<p id=\"intro\">It was the best of times.</p>",
    "<p>Second paragraph with a <a href=\"ch2.xhtml#target\">link</a>.</p>",
    "<p>An external <a href=\"https://example.com/\">site</a>.</p>",
    "</body></html>",
);

pub const CH2: &str = concat!(
    "<html><head><title>Two</title></head>",
    "<body id=\"body02\">",
    "<h1>Chapter Two</h1>",
    "<p id=\"target\">Target paragraph text.</p>",
    "<p>The cat sat on the mat.</p>",
    "</body></html>",
);

pub const CH3: &str = concat!(
    "<html><head><title>Three</title></head>",
    "<body id=\"body03\"><p id=\"fin\">The end.</p></body></html>",
);

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>A Tale of Two Sittings</dc:title>
    <dc:creator>Charles Writer</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="uid">urn:uuid:folio-fixture</dc:identifier>
    <dc:publisher>Fixture Press</dc:publisher>
  </metadata>
  <manifest>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch3" href="ch3.xhtml" media-type="application/xhtml+xml"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
    <itemref idref="ch3"/>
  </spine>
  <guide>
    <reference type="text" title="Beginning" href="ch1.xhtml"/>
  </guide>
</package>"#;

const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>One</text></navLabel>
      <content src="ch1.xhtml"/>
    </navPoint>
    <navPoint id="np2" playOrder="2">
      <navLabel><text>Two</text></navLabel>
      <content src="ch2.xhtml"/>
      <navPoint id="np2a" playOrder="3">
        <navLabel><text>The Target</text></navLabel>
        <content src="ch2.xhtml#target"/>
      </navPoint>
    </navPoint>
  </navMap>
</ncx>"#;

/// Build the fixture EPUB as raw bytes.
pub fn sample_epub() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default();

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    for (name, content) in [
        ("META-INF/container.xml", CONTAINER),
        ("OEBPS/content.opf", OPF),
        ("OEBPS/toc.ncx", NCX),
        ("OEBPS/ch1.xhtml", CH1),
        ("OEBPS/ch2.xhtml", CH2),
        ("OEBPS/ch3.xhtml", CH3),
    ] {
        zip.start_file(name, deflated).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// A zip that is not an EPUB at all.
pub fn not_an_epub() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("readme.txt", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"nothing here").unwrap();
    zip.finish().unwrap().into_inner()
}
