//! Per-object emission
//!
//! Writes one numbered object to the output: plain objects are printed
//! directly, streams are either copied byte-for-byte (optionally deflated
//! or hex-wrapped) or expanded to their decoded form. Object-stream and
//! xref-stream carriers are dropped; their contents have long since been
//! materialized as ordinary objects.

use crate::fitz::error::{Error, Result};
use crate::fitz::output::Output;
use crate::pdf::document::Document;
use crate::pdf::filter::{encode_ascii_hex, encode_flate};
use crate::pdf::object::{Dict, Object};
use crate::pdf::print::obj_to_bytes;
use crate::pdf::write::{ExpandFlags, WriteState};

pub(crate) fn write_object(
    doc: &mut Document,
    state: &mut WriteState,
    out: &mut Output,
    num: i32,
    gen: u16,
    skip_xrefs: bool,
) -> Result<()> {
    let Some(obj) = doc.object(num).cloned() else {
        return emit_failure(state, out, num, gen, Error::generic(format!("object {} missing", num)));
    };

    // carriers of compressed objects and old cross-reference streams are
    // not carried over
    if obj.has_type("ObjStm") || (skip_xrefs && obj.has_type("XRef")) {
        state.use_list[num as usize] = 0;
        return Ok(());
    }

    match &obj {
        Object::Stream { dict, data } => match data {
            None => {
                out.write_str(&format!("{} {} obj\n", num, gen))?;
                out.write_data(&obj_to_bytes(&obj, state.do_tight))?;
                out.write_str("\nstream\nendstream\nendobj\n\n")?;
                Ok(())
            }
            Some(_) => {
                let expand = !state.do_expand.is_none()
                    && !suppress_expand(doc, state, dict)
                    && !is_jpx_stream(doc, dict);
                let written = if expand {
                    expand_stream(doc, state, out, dict.clone(), num, gen)
                } else {
                    copy_stream(doc, state, out, dict.clone(), num, gen)
                };
                match written {
                    Err(Error::TryLater) => Err(Error::TryLater),
                    Err(e) => emit_failure(state, out, num, gen, e),
                    Ok(()) => Ok(()),
                }
            }
        },
        _ => {
            out.write_str(&format!("{} {} obj\n", num, gen))?;
            out.write_data(&obj_to_bytes(&obj, state.do_tight))?;
            out.write_str("\nendobj\n\n")?;
            Ok(())
        }
    }
}

/// Per-object failure: with `continue_on_error` a null object stands in and
/// the error counter advances, otherwise the save aborts.
fn emit_failure(
    state: &mut WriteState,
    out: &mut Output,
    num: i32,
    gen: u16,
    err: Error,
) -> Result<()> {
    if state.continue_on_error {
        out.write_str(&format!("{} {} obj\nnull\nendobj\n", num, gen))?;
        state.errors += 1;
        log::warn!("writing null for object {}: {}", num, err);
        Ok(())
    } else {
        Err(err)
    }
}

fn copy_stream(
    doc: &Document,
    state: &mut WriteState,
    out: &mut Output,
    mut dict: Dict,
    num: i32,
    gen: u16,
) -> Result<()> {
    let orig_num = state.rev_renumber_map[num as usize];
    let orig_gen = state.rev_gen_list[num as usize];
    let mut buf = doc.load_raw_stream(num, gen, orig_num, orig_gen)?.to_vec();

    if state.do_deflate && dict.get("Filter").is_none() {
        dict.put("Filter", Object::name("FlateDecode"));
        buf = encode_flate(&buf, 6)?;
    }

    if state.do_ascii && is_binary_stream(&buf) {
        buf = encode_ascii_hex(&buf);
        add_hex_filter(&mut dict);
    }

    dict.put("Length", Object::Int(buf.len() as i64));
    emit_stream(state, out, &dict, &buf, num, gen)
}

fn expand_stream(
    doc: &Document,
    state: &mut WriteState,
    out: &mut Output,
    mut dict: Dict,
    num: i32,
    gen: u16,
) -> Result<()> {
    let orig_num = state.rev_renumber_map[num as usize];
    let orig_gen = state.rev_gen_list[num as usize];
    let mut truncated = false;
    let tolerate = state.continue_on_error.then_some(&mut truncated);
    let mut buf = doc.load_stream_decoded(num, gen, orig_num, orig_gen, tolerate)?;
    if truncated {
        state.errors += 1;
        log::warn!("stream {} truncated during expansion", num);
    }

    dict.remove("Filter");
    dict.remove("DecodeParms");

    if state.do_deflate {
        dict.put("Filter", Object::name("FlateDecode"));
        buf = encode_flate(&buf, 6)?;
    }

    if state.do_ascii && is_binary_stream(&buf) {
        buf = encode_ascii_hex(&buf);
        add_hex_filter(&mut dict);
    }

    dict.put("Length", Object::Int(buf.len() as i64));
    emit_stream(state, out, &dict, &buf, num, gen)
}

fn emit_stream(
    state: &WriteState,
    out: &mut Output,
    dict: &Dict,
    buf: &[u8],
    num: i32,
    gen: u16,
) -> Result<()> {
    out.write_str(&format!("{} {} obj\n", num, gen))?;
    out.write_data(&obj_to_bytes(&Object::Dict(dict.clone()), state.do_tight))?;
    out.write_str("\nstream\n")?;
    out.write_data(buf)?;
    out.write_str("\nendstream\nendobj\n\n")?;
    Ok(())
}

/// Decide whether expansion is suppressed for this stream. Image and font
/// payloads keep their native compression unless the matching expand flag
/// asks otherwise. Expanding everything bypasses the whole list.
fn suppress_expand(doc: &Document, state: &WriteState, dict: &Dict) -> bool {
    if state.do_expand == ExpandFlags::ALL {
        return false;
    }
    let no_images = !state.do_expand.contains(ExpandFlags::IMAGES);
    let no_fonts = !state.do_expand.contains(ExpandFlags::FONTS);
    let name_is = |key: &str, want: &str| {
        dict.get(key)
            .map(|o| doc.resolve(o))
            .and_then(Object::as_name)
            .map(|n| n.as_str() == want)
            .unwrap_or(false)
    };

    let mut dontexpand = false;
    if name_is("Type", "XObject") && name_is("Subtype", "Image") {
        dontexpand = no_images;
    }
    if name_is("Type", "Font") || name_is("Type", "FontDescriptor") {
        dontexpand = no_fonts;
    }
    if dict.get("Length1").is_some()
        || dict.get("Length2").is_some()
        || dict.get("Length3").is_some()
    {
        dontexpand = no_fonts;
    }
    if name_is("Subtype", "Type1C") || name_is("Subtype", "CIDFontType0C") {
        dontexpand = no_fonts;
    }
    if filter_implies_image(doc, dict.get("Filter")) {
        dontexpand = no_images;
    }
    if dict.get("Width").is_some() && dict.get("Height").is_some() {
        dontexpand = no_images;
    }
    dontexpand
}

fn is_image_filter(name: &str) -> bool {
    matches!(
        name,
        "CCITTFaxDecode" | "CCF" | "DCTDecode" | "DCT" | "RunLengthDecode" | "RL"
            | "JBIG2Decode" | "JPXDecode"
    )
}

fn filter_implies_image(doc: &Document, filter: Option<&Object>) -> bool {
    match filter.map(|o| doc.resolve(o)) {
        Some(Object::Name(n)) => is_image_filter(n.as_str()),
        Some(Object::Array(a)) => a
            .iter()
            .any(|o| o.as_name().map(|n| is_image_filter(n.as_str())).unwrap_or(false)),
        _ => false,
    }
}

/// JPX payloads cannot be re-encoded, so they are never expanded even when
/// image expansion is on.
fn is_jpx_stream(doc: &Document, dict: &Dict) -> bool {
    match dict.get("Filter").map(|o| doc.resolve(o)) {
        Some(Object::Name(n)) => n.as_str() == "JPXDecode",
        Some(Object::Array(a)) => a
            .iter()
            .any(|o| o.as_name().map(|n| n.as_str() == "JPXDecode").unwrap_or(false)),
        _ => false,
    }
}

fn is_binary(c: u8) -> bool {
    if c == b'\n' || c == b'\r' || c == b'\t' {
        return false;
    }
    c < 32 || c > 127
}

pub(crate) fn is_binary_stream(buf: &[u8]) -> bool {
    buf.iter().any(|&c| is_binary(c))
}

/// Splice an ASCIIHexDecode in front of whatever filter the stream already
/// names, keeping `/DecodeParms` aligned with the filter array.
pub(crate) fn add_hex_filter(dict: &mut Dict) {
    let filter = dict.remove("Filter");
    let parms = dict.remove("DecodeParms");
    let (new_filter, new_parms) = match filter {
        Some(Object::Name(existing)) => {
            let nf = Object::Array(vec![
                Object::name("ASCIIHexDecode"),
                Object::Name(existing),
            ]);
            let np = match parms {
                Some(p @ Object::Dict(_)) => Some(Object::Array(vec![Object::Null, p])),
                other => other,
            };
            (nf, np)
        }
        Some(Object::Array(mut fs)) => {
            fs.insert(0, Object::name("ASCIIHexDecode"));
            let np = match parms {
                Some(Object::Array(mut ps)) => {
                    ps.insert(0, Object::Null);
                    Some(Object::Array(ps))
                }
                other => other,
            };
            (Object::Array(fs), np)
        }
        _ => (Object::name("ASCIIHexDecode"), parms),
    };
    dict.put("Filter", new_filter);
    if let Some(p) = new_parms {
        dict.put("DecodeParms", p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::write::test_support::{new_state, two_page_doc};

    #[test]
    fn test_is_binary_stream() {
        assert!(!is_binary_stream(b"q 0 0 612 792 re W n Q\n"));
        assert!(is_binary_stream(&[0x00, 0x01]));
        assert!(is_binary_stream(&[0xFF]));
    }

    #[test]
    fn test_add_hex_filter_to_plain_stream() {
        let mut d = Dict::new();
        add_hex_filter(&mut d);
        assert_eq!(
            d.get("Filter").unwrap().as_name().unwrap().as_str(),
            "ASCIIHexDecode"
        );
    }

    #[test]
    fn test_add_hex_filter_in_front_of_name() {
        let mut d = Dict::new();
        d.put("Filter", Object::name("FlateDecode"));
        let mut parms = Dict::new();
        parms.put("Predictor", Object::Int(1));
        d.put("DecodeParms", Object::Dict(parms));
        add_hex_filter(&mut d);
        let fs = d.get("Filter").unwrap().as_array().unwrap();
        assert_eq!(fs[0].as_name().unwrap().as_str(), "ASCIIHexDecode");
        assert_eq!(fs[1].as_name().unwrap().as_str(), "FlateDecode");
        let ps = d.get("DecodeParms").unwrap().as_array().unwrap();
        assert!(ps[0].is_null());
        assert!(ps[1].as_dict().is_some());
    }

    #[test]
    fn test_add_hex_filter_in_front_of_array() {
        let mut d = Dict::new();
        d.put(
            "Filter",
            Object::Array(vec![Object::name("FlateDecode"), Object::name("LZWDecode")]),
        );
        add_hex_filter(&mut d);
        let fs = d.get("Filter").unwrap().as_array().unwrap();
        assert_eq!(fs.len(), 3);
        assert_eq!(fs[0].as_name().unwrap().as_str(), "ASCIIHexDecode");
    }

    #[test]
    fn test_suppress_expand_image() {
        let doc = two_page_doc();
        let mut state = new_state(&doc);
        state.do_expand = ExpandFlags::FONTS;
        // object 4 is the image xobject in the fixture
        let dict = doc.object(4).unwrap().as_dict().unwrap().clone();
        assert!(suppress_expand(&doc, &state, &dict));
        state.do_expand = ExpandFlags::IMAGES;
        assert!(!suppress_expand(&doc, &state, &dict));
    }

    #[test]
    fn test_suppress_expand_font_program() {
        let doc = two_page_doc();
        let mut state = new_state(&doc);
        state.do_expand = ExpandFlags::IMAGES;
        let mut dict = Dict::new();
        dict.put("Length1", Object::Int(1024));
        assert!(suppress_expand(&doc, &state, &dict));
        state.do_expand = ExpandFlags::ALL;
        assert!(!suppress_expand(&doc, &state, &dict));
    }

    #[test]
    fn test_jpx_never_expanded() {
        let doc = two_page_doc();
        let mut dict = Dict::new();
        dict.put("Filter", Object::name("JPXDecode"));
        assert!(is_jpx_stream(&doc, &dict));
    }

    #[test]
    fn test_write_plain_object() {
        let mut doc = two_page_doc();
        let mut state = new_state(&doc);
        let mut out = Output::memory();
        // object 8 is the font dict
        write_object(&mut doc, &mut state, &mut out, 8, 0, true).unwrap();
        // the default options emit tight dictionaries
        let text = String::from_utf8(out.data().unwrap().to_vec()).unwrap();
        assert!(text.starts_with("8 0 obj\n"));
        assert!(text.contains("/BaseFont/Helvetica"));
        assert!(text.ends_with("endobj\n\n"));
    }

    #[test]
    fn test_write_stream_object_copies_body() {
        let mut doc = two_page_doc();
        let mut state = new_state(&doc);
        let mut out = Output::memory();
        write_object(&mut doc, &mut state, &mut out, 5, 0, true).unwrap();
        let bytes = out.data().unwrap();
        let text = String::from_utf8_lossy(bytes);
        assert!(text.contains("stream\n"));
        assert!(text.contains("endstream"));
        assert!(text.contains("/Length 22"));
    }

    #[test]
    fn test_objstm_dropped() {
        let mut doc = two_page_doc();
        let num = doc.create_object();
        let mut d = Dict::new();
        d.put("Type", Object::name("ObjStm"));
        doc.update_object(num, Object::Dict(d)).unwrap();
        let mut state = new_state(&doc);
        state.use_list[num as usize] = 1;
        let mut out = Output::memory();
        write_object(&mut doc, &mut state, &mut out, num, 0, true).unwrap();
        assert_eq!(state.use_list[num as usize], 0);
        assert!(out.data().unwrap().is_empty());
    }

    #[test]
    fn test_continue_on_error_emits_null() {
        let mut doc = two_page_doc();
        // an in-use slot with a stream whose filter is unknown
        let num = doc.create_object();
        let mut d = Dict::new();
        d.put("Filter", Object::name("LZWDecode"));
        doc.update_object(num, Object::Dict(d)).unwrap();
        doc.update_stream(num, bytes::Bytes::from_static(b"\x80"), true)
            .unwrap();
        let mut state = new_state(&doc);
        state.do_expand = ExpandFlags::ALL;
        state.continue_on_error = true;
        let mut out = Output::memory();
        write_object(&mut doc, &mut state, &mut out, num, 0, true).unwrap();
        let text = String::from_utf8(out.data().unwrap().to_vec()).unwrap();
        assert!(text.contains("null\nendobj"));
        assert_eq!(state.errors, 1);
    }
}
