//! Benchmarks for the rich text conversion pipeline.
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use xmltext::{
    ConvertOptions, Document, InMemoryRepository, RichTextConverter, StylesheetEngine,
    StylesheetSpec, TransformError, parse_document, serialize_document,
};

/// Stylesheets are external; keep the tree as is so only the pipeline's own
/// stages are measured.
struct Identity;

impl StylesheetEngine for Identity {
    fn apply(&self, _stylesheets: &[StylesheetSpec], doc: Document) -> Result<Document, TransformError> {
        Ok(doc)
    }
}

/// A DocBook-ish document with many paragraphs, embeds and ids.
fn sample_document(paragraphs: usize) -> String {
    let mut xml = String::from(
        r#"<section xmlns="http://docbook.org/ns/docbook" xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:ezxhtml="http://ez.no/xmlns/ezpublish/docbook/xhtml">"#,
    );
    for i in 0..paragraphs {
        xml.push_str(&format!(
            r#"<paragraph xml:id="{i} p"><!-- note -->Text &amp; more text <emphasis>{i}</emphasis></paragraph>"#
        ));
        if i % 10 == 0 {
            xml.push_str(&format!(r#"<ezembed xlink:href="ezcontent://{}"/>"#, i % 3));
        }
    }
    xml.push_str("</section>");
    xml
}

fn bench_dom(c: &mut Criterion) {
    let xml = sample_document(500);
    let doc = parse_document(&xml).unwrap();

    let mut group = c.benchmark_group("dom");
    group.bench_function("parse", |b| b.iter(|| parse_document(&xml).unwrap()));
    group.bench_function("serialize", |b| b.iter(|| serialize_document(&doc)));
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let xml = sample_document(500);
    let converter = RichTextConverter::new(Arc::new(Identity))
        .with_repository(Arc::new(
            InMemoryRepository::new().with_content(0, 5).with_content(1, 2),
        ))
        .with_image_content_types([5]);
    let options = ConvertOptions::new()
        .check_duplicate_ids(true)
        .check_id_values(true)
        .content_field_id(1);

    c.bench_function("convert", |b| {
        b.iter(|| converter.convert_str(&xml, options).unwrap())
    });
}

criterion_group!(benches, bench_dom, bench_pipeline);
criterion_main!(benches);
