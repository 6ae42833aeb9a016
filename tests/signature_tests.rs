//! Deferred signature patching against real files

mod common;

use common::*;
use pdfwrite::fitz::error::Result;
use pdfwrite::pdf::document::{Document, Signer};
use pdfwrite::pdf::object::{Dict, Object};
use pdfwrite::pdf::write::{save_document, SaveOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
struct DigestCall {
    byte_range: Vec<(i64, i64)>,
    contents_ofs: i64,
    contents_len: i64,
}

#[derive(Clone, Default)]
struct RecordingSigner {
    calls: Arc<Mutex<Vec<DigestCall>>>,
}

impl Signer for RecordingSigner {
    fn write_digest(
        &self,
        _path: &Path,
        byte_range: &[(i64, i64)],
        contents_ofs: i64,
        contents_len: i64,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(DigestCall {
            byte_range: byte_range.to_vec(),
            contents_ofs,
            contents_len,
        });
        Ok(())
    }
}

/// Attach a signature field to the minimal document. Returns the field and
/// value object numbers.
fn add_sig_field(doc: &mut Document) -> (i32, i32) {
    let value = doc.create_object();
    let field = doc.create_object();

    let mut vd = Dict::new();
    vd.put("Type", Object::name("Sig"));
    vd.put("ByteRange", Object::Array(vec![]));
    vd.put("Contents", Object::string(&[0u8; 64]));
    vd.put("Filter", Object::name("Adobe.PPKLite"));
    doc.update_object(value, Object::Dict(vd)).unwrap();

    let mut fd = Dict::new();
    fd.put("FT", Object::name("Sig"));
    fd.put("T", Object::string(b"Signature1"));
    fd.put("V", Object::reference(value));
    doc.update_object(field, Object::Dict(fd)).unwrap();

    let mut fields = Dict::new();
    fields.put("Fields", Object::Array(vec![Object::reference(field)]));
    let cat = doc.object_mut(1).unwrap().as_dict_mut().unwrap();
    cat.put("AcroForm", Object::Dict(fields));

    finish_trailer(doc, 1);
    (field, value)
}

#[test]
fn signature_byte_range_covers_file_except_contents() {
    let tmp = NamedTempFile::new().unwrap();
    let mut doc = minimal_doc();
    let (field, _value) = add_sig_field(&mut doc);
    save_document(&mut doc, tmp.path(), &SaveOptions::default()).unwrap();

    // sign in an incremental update
    let signer = RecordingSigner::default();
    doc.add_unsaved_signature(field, Box::new(signer.clone()));
    let opts = SaveOptions {
        incremental: true,
        ..SaveOptions::default()
    };
    save_document(&mut doc, tmp.path(), &opts).unwrap();

    let data = std::fs::read(tmp.path()).unwrap();
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];

    // two segments: before the contents window and after it
    assert_eq!(call.byte_range.len(), 2);
    let (a_start, a_len) = call.byte_range[0];
    let (b_start, b_len) = call.byte_range[1];
    assert_eq!(a_start, 0);
    assert_eq!(a_start + a_len, call.contents_ofs);
    assert_eq!(b_start, call.contents_ofs + call.contents_len);
    assert_eq!((b_start + b_len) as usize, data.len());

    // the contents window holds the hex placeholder
    let window = &data[call.contents_ofs as usize..(call.contents_ofs + call.contents_len) as usize];
    assert_eq!(window[0], b'<');
    assert_eq!(window[window.len() - 1], b'>');

    // the byte range literal was patched in place, space padded; the one
    // written by the original save is further up the file, so take the
    // last occurrence
    let br_pos = data
        .windows(b"/ByteRange".len())
        .rposition(|w| w == b"/ByteRange")
        .unwrap();
    let after = &data[br_pos + 10..];
    let close = find(after, b"]").unwrap();
    let literal = std::str::from_utf8(&after[..close + 1]).unwrap();
    let expected = format!("[0 {} {} {}]", a_len, b_start, b_len);
    assert!(
        literal.trim_start().starts_with(&expected),
        "byte range literal {:?} does not match {:?}",
        literal,
        expected
    );
    // no placeholder survives
    assert!(find(&data, b"2147483647").is_none());
}

#[test]
fn two_signatures_share_one_byte_range() {
    let tmp = NamedTempFile::new().unwrap();
    let mut doc = minimal_doc();
    let (field1, _v1) = add_sig_field(&mut doc);

    // a second field with its own value dictionary
    let value2 = doc.create_object();
    let field2 = doc.create_object();
    let mut vd = Dict::new();
    vd.put("Type", Object::name("Sig"));
    vd.put("ByteRange", Object::Array(vec![]));
    vd.put("Contents", Object::string(&[0u8; 64]));
    vd.put("Filter", Object::name("Adobe.PPKLite"));
    doc.update_object(value2, Object::Dict(vd)).unwrap();
    let mut fd = Dict::new();
    fd.put("FT", Object::name("Sig"));
    fd.put("T", Object::string(b"Signature2"));
    fd.put("V", Object::reference(value2));
    doc.update_object(field2, Object::Dict(fd)).unwrap();
    finish_trailer(&mut doc, 1);

    save_document(&mut doc, tmp.path(), &SaveOptions::default()).unwrap();

    let signer = RecordingSigner::default();
    doc.add_unsaved_signature(field1, Box::new(signer.clone()));
    doc.add_unsaved_signature(field2, Box::new(signer.clone()));
    let opts = SaveOptions {
        incremental: true,
        ..SaveOptions::default()
    };
    save_document(&mut doc, tmp.path(), &opts).unwrap();

    let data = std::fs::read(tmp.path()).unwrap();
    let calls = signer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);

    // both signers saw the same three-segment range
    assert_eq!(calls[0].byte_range, calls[1].byte_range);
    let br = &calls[0].byte_range;
    assert_eq!(br.len(), 3);
    assert_eq!(br[0].0, 0);
    // segments are ordered and the last one ends at the file end
    assert!(br[0].0 + br[0].1 <= br[1].0);
    assert!(br[1].0 + br[1].1 <= br[2].0);
    assert_eq!((br[2].0 + br[2].1) as usize, data.len());

    // each signature's contents window falls in a gap of the range
    for call in calls.iter() {
        let end = call.contents_ofs + call.contents_len;
        assert!(br
            .iter()
            .all(|&(s, l)| end <= s || call.contents_ofs >= s + l));
    }
}

#[test]
fn unsigned_incremental_save_leaves_no_signature_state() {
    let tmp = NamedTempFile::new().unwrap();
    let mut doc = minimal_doc();
    let (_field, value) = add_sig_field(&mut doc);
    save_document(&mut doc, tmp.path(), &SaveOptions::default()).unwrap();

    // edit without signing: the placeholder array stays as written
    put_stream(&mut doc, 4, Dict::new(), b"BT (edited) Tj ET");
    let opts = SaveOptions {
        incremental: true,
        ..SaveOptions::default()
    };
    save_document(&mut doc, tmp.path(), &opts).unwrap();

    let vd = doc.object(value).unwrap().as_dict().unwrap();
    let br = vd.get("ByteRange").unwrap().as_array().unwrap();
    assert!(br.is_empty());
}
