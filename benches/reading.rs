//! Benchmarks for the CFI codec and chapter parsing.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};

use folio::{Cfi, parse_document};

const RANGE_CFI: &str = "epubcfi(/6/4[chap01ref]!/4[body01]/10[para05],/2/1:1,/3:4)";
const OFFSET_CFI: &str = "epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/2/1:3)";

fn sample_chapter() -> String {
    let mut markup = String::from("<html><head><title>Bench</title></head><body id=\"body\">");
    for section in 0..20 {
        markup.push_str(&format!("<div id=\"s{section}\">"));
        for para in 0..10 {
            markup.push_str(&format!(
                "<p id=\"s{section}p{para}\">Paragraph {para} of section {section}, \
                 with <em>some</em> inline markup and a little more text.</p>"
            ));
        }
        markup.push_str("</div>");
    }
    markup.push_str("</body></html>");
    markup
}

fn bench_cfi_parse(c: &mut Criterion) {
    c.bench_function("cfi_parse_offset", |b| {
        b.iter(|| Cfi::parse(OFFSET_CFI).unwrap());
    });

    c.bench_function("cfi_parse_range", |b| {
        b.iter(|| Cfi::parse(RANGE_CFI).unwrap());
    });
}

fn bench_cfi_serialize(c: &mut Criterion) {
    let cfi = Cfi::parse(RANGE_CFI).unwrap();
    c.bench_function("cfi_serialize_range", |b| {
        b.iter(|| cfi.to_string());
    });
}

fn bench_chapter_parse(c: &mut Criterion) {
    let markup = sample_chapter();
    c.bench_function("chapter_parse", |b| {
        b.iter(|| parse_document(&markup).unwrap());
    });
}

fn bench_resolve(c: &mut Criterion) {
    let markup = sample_chapter();
    let doc = parse_document(&markup).unwrap();
    let cfi = Cfi::parse("epubcfi(/6/2!/4[body]/20[s9]/10[s9p4]/1:12)").unwrap();

    c.bench_function("cfi_resolve", |b| {
        b.iter(|| cfi.resolve(&doc).unwrap());
    });

    let target = doc.node_by_id("s9p4").unwrap();
    c.bench_function("cfi_from_position", |b| {
        b.iter(|| Cfi::from_position(&doc, target, Some(12), Cfi::base_for_spine(0)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_cfi_parse,
    bench_cfi_serialize,
    bench_chapter_parse,
    bench_resolve
);
criterion_main!(benches);
