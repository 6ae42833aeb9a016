//! Shared fixtures for the writer tests
#![allow(dead_code)]

use bytes::Bytes;
use pdfwrite::pdf::document::Document;
use pdfwrite::pdf::object::{Dict, Object};

pub fn media_box() -> Object {
    Object::Array(vec![
        Object::Int(0),
        Object::Int(0),
        Object::Int(612),
        Object::Int(792),
    ])
}

pub fn put_stream(doc: &mut Document, num: i32, mut dict: Dict, body: &[u8]) {
    dict.put("Length", Object::Int(body.len() as i64));
    doc.update_object(
        num,
        Object::Stream {
            dict,
            data: Some(Bytes::copy_from_slice(body)),
        },
    )
    .unwrap();
}

pub fn font_dict() -> Dict {
    let mut font = Dict::new();
    font.put("Type", Object::name("Font"));
    font.put("Subtype", Object::name("Type1"));
    font.put("BaseFont", Object::name("Helvetica"));
    font
}

pub fn page_dict(parent: i32, contents: i32, res: Dict) -> Dict {
    let mut page = Dict::new();
    page.put("Type", Object::name("Page"));
    page.put("Parent", Object::reference(parent));
    page.put("MediaBox", media_box());
    page.put("Resources", Object::Dict(res));
    page.put("Contents", Object::reference(contents));
    page
}

pub fn font_res(font: i32) -> Dict {
    let mut fonts = Dict::new();
    fonts.put("F1", Object::reference(font));
    let mut res = Dict::new();
    res.put("Font", Object::Dict(fonts));
    res
}

pub fn image_dict() -> Dict {
    let mut img = Dict::new();
    img.put("Type", Object::name("XObject"));
    img.put("Subtype", Object::name("Image"));
    img.put("Width", Object::Int(4));
    img.put("Height", Object::Int(4));
    img.put("ColorSpace", Object::name("DeviceGray"));
    img.put("BitsPerComponent", Object::Int(8));
    img
}

pub fn finish_trailer(doc: &mut Document, root: i32) {
    let size = doc.xref_len() as i64;
    let trailer = doc.trailer_mut();
    trailer.put("Size", Object::Int(size));
    trailer.put("Root", Object::reference(root));
}

/// Minimal one-page document: catalogue, page tree, page, content, font.
pub fn minimal_doc() -> Document {
    let mut doc = Document::new(17);
    for _ in 0..5 {
        doc.create_object();
    }
    let mut cat = Dict::new();
    cat.put("Type", Object::name("Catalog"));
    cat.put("Pages", Object::reference(2));
    doc.update_object(1, Object::Dict(cat)).unwrap();

    let mut pages = Dict::new();
    pages.put("Type", Object::name("Pages"));
    pages.put("Kids", Object::Array(vec![Object::reference(3)]));
    pages.put("Count", Object::Int(1));
    doc.update_object(2, Object::Dict(pages)).unwrap();

    doc.update_object(3, Object::Dict(page_dict(2, 4, font_res(5))))
        .unwrap();
    put_stream(&mut doc, 4, Dict::new(), b"BT /F1 24 Tf (Hello) Tj ET");
    doc.update_object(5, Object::Dict(font_dict())).unwrap();

    finish_trailer(&mut doc, 1);
    doc
}

/// Three pages, each with its own content stream and its own copy of an
/// identical image stream, all sharing one font.
pub fn three_page_doc_with_duplicate_images() -> Document {
    let mut doc = Document::new(17);
    for _ in 0..12 {
        doc.create_object();
    }
    // 1 catalogue, 2 tree, 3/4/5 pages, 6/7/8 contents, 9/10/11 images,
    // 12 font
    let mut cat = Dict::new();
    cat.put("Type", Object::name("Catalog"));
    cat.put("Pages", Object::reference(2));
    doc.update_object(1, Object::Dict(cat)).unwrap();

    let mut pages = Dict::new();
    pages.put("Type", Object::name("Pages"));
    pages.put(
        "Kids",
        Object::Array(vec![
            Object::reference(3),
            Object::reference(4),
            Object::reference(5),
        ]),
    );
    pages.put("Count", Object::Int(3));
    doc.update_object(2, Object::Dict(pages)).unwrap();

    let image_body: Vec<u8> = (0u8..16).map(|i| i.wrapping_mul(17)).collect();
    let contents: [&[u8]; 3] = [
        b"q /Im0 Do Q\n% page one",
        b"q /Im0 Do Q\n% page two",
        b"q /Im0 Do Q\n% page three",
    ];
    for i in 0..3i32 {
        let page = 3 + i;
        let content = 6 + i;
        let image = 9 + i;
        let mut res = font_res(12);
        let mut xobjs = Dict::new();
        xobjs.put("Im0", Object::reference(image));
        res.put("XObject", Object::Dict(xobjs));
        doc.update_object(page, Object::Dict(page_dict(2, content, res)))
            .unwrap();
        put_stream(&mut doc, content, Dict::new(), contents[i as usize]);
        put_stream(&mut doc, image, image_dict(), &image_body);
    }
    doc.update_object(12, Object::Dict(font_dict())).unwrap();

    finish_trailer(&mut doc, 1);
    doc
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|w| *w == needle)
        .count()
}

/// Read the decimal integer that follows `key` in `data`.
pub fn int_after(data: &[u8], key: &[u8]) -> Option<i64> {
    let pos = find(data, key)? + key.len();
    let rest = &data[pos..];
    let start = rest.iter().position(|b| !b.is_ascii_whitespace())?;
    let digits: Vec<u8> = rest[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'-')
        .copied()
        .collect();
    std::str::from_utf8(&digits).ok()?.parse().ok()
}
