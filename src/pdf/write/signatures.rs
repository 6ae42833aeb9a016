//! Deferred signature patching
//!
//! Signature byte ranges depend on the final file layout, so they are
//! written as oversized placeholders first and patched in place once the
//! output is closed. The digest itself is produced by the caller-supplied
//! signer against the patched file.

use crate::fitz::error::{Error, Result};
use crate::pdf::document::Document;
use crate::pdf::object::{Array, Object};
use crate::pdf::print::obj_to_bytes;
use crate::pdf::write::WriteState;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// How much of the file is inspected around a signature object. The three
/// markers must all land inside this window.
const SIG_WINDOW: usize = 5120;

fn byte_range_array_mut<'a>(doc: &'a mut Document, field: i32) -> Option<&'a mut Array> {
    let vnum = doc.signature_value_num(field)?;
    let dict = doc.object_mut(vnum)?.as_dict_mut()?;
    let holder = if vnum == field {
        dict.get_mut("V")?.as_dict_mut()?
    } else {
        dict
    };
    holder.get_mut("ByteRange")?.as_array_mut()
}

/// Grow every unsaved signature's `/ByteRange` placeholder so its
/// serialized form can hold the final values: with n signatures there are
/// n+1 covered segments, two integers each.
pub(crate) fn presize_unsaved_signature_byteranges(doc: &mut Document) -> Result<()> {
    let n = doc.pending().unsaved_sigs.len();
    if n == 0 {
        return Ok(());
    }
    let fields: Vec<i32> = doc.pending().unsaved_sigs.iter().map(|s| s.field).collect();
    for field in fields {
        let Some(arr) = byte_range_array_mut(doc, field) else {
            return Err(Error::format(format!(
                "signature field {} has no /ByteRange array",
                field
            )));
        };
        for _ in 0..(n + 1) {
            arr.push(Object::Int(i32::MAX as i64));
            arr.push(Object::Int(i32::MAX as i64));
        }
    }
    Ok(())
}

fn find(window: &[u8], needle: &[u8]) -> Option<usize> {
    window.windows(needle.len()).position(|w| w == needle)
}

/// Locate each signature's markers in the saved file, overwrite the
/// byte-range placeholders with the final values, and hand the contents
/// windows to the signers. Consumes the unsaved signature records.
pub(crate) fn complete_signatures(
    doc: &mut Document,
    state: &mut WriteState,
    path: &Path,
) -> Result<()> {
    if doc.pending().unsaved_sigs.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            Error::generic(format!(
                "failed to open {} to complete signatures: {}",
                path.display(),
                e
            ))
        })?;

    let end_ofs = doc.pending().end_ofs;
    let mut sigs = std::mem::take(&mut doc.pending_mut().unsaved_sigs);

    // find the byte offsets of the markers inside each signature object
    for sig in &mut sigs {
        let pnum = doc.signature_value_num(sig.field).ok_or_else(|| {
            Error::format(format!("signature field {} has no value", sig.field))
        })?;
        let ofs = state.ofs_list[pnum as usize];
        file.seek(SeekFrom::Start(ofs as u64)).map_err(Error::System)?;
        let mut window = vec![0u8; SIG_WINDOW];
        let mut got = 0;
        while got < window.len() {
            let n = file.read(&mut window[got..]).map_err(Error::System)?;
            if n == 0 {
                break;
            }
            got += n;
        }
        window.truncate(got);

        let b = find(&window, b"/ByteRange");
        let c = find(&window, b"/Contents");
        let f = find(&window, b"/Filter");
        match (b, c, f) {
            (Some(b), Some(c), Some(f)) if b < c && c < f => {
                sig.byte_range_start = ofs + b as i64 + "/ByteRange".len() as i64;
                sig.byte_range_end = ofs + c as i64;
                sig.contents_start = ofs + c as i64 + "/Contents".len() as i64;
                sig.contents_end = ofs + f as i64;
            }
            _ => {
                return Err(Error::format(format!(
                    "signature object {} markers not found within {} bytes",
                    pnum, SIG_WINDOW
                )))
            }
        }
    }

    // the final range covers everything except the contents windows
    let mut pairs: Vec<(i64, i64)> = Vec::with_capacity(sigs.len() + 1);
    let mut last_end = 0i64;
    for sig in &sigs {
        pairs.push((last_end, sig.contents_start - last_end));
        last_end = sig.contents_end;
    }
    pairs.push((last_end, end_ofs - last_end));

    let arr: Array = pairs
        .iter()
        .flat_map(|&(a, b)| [Object::Int(a), Object::Int(b)])
        .collect();
    for sig in &sigs {
        if let Some(br) = byte_range_array_mut(doc, sig.field) {
            *br = arr.clone();
        }
    }

    // overwrite every placeholder, space padded to its reservation
    let serialized = obj_to_bytes(&Object::Array(arr), true);
    for sig in &sigs {
        let reservation = (sig.byte_range_end - sig.byte_range_start) as usize;
        if serialized.len() > reservation {
            return Err(Error::format("final byte range exceeds its reservation"));
        }
        let mut padded = serialized.clone();
        padded.resize(reservation, b' ');
        file.seek(SeekFrom::Start(sig.byte_range_start as u64))
            .map_err(Error::System)?;
        file.write_all(&padded).map_err(Error::System)?;
    }
    file.flush().map_err(Error::System)?;
    drop(file);

    for sig in &sigs {
        sig.signer.write_digest(
            path,
            &pairs,
            sig.contents_start,
            sig.contents_end - sig.contents_start,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::object::Dict;
    use crate::pdf::write::test_support::two_page_doc;

    struct NullSigner;
    impl crate::pdf::document::Signer for NullSigner {
        fn write_digest(
            &self,
            _path: &Path,
            _byte_range: &[(i64, i64)],
            _contents_ofs: i64,
            _contents_len: i64,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn doc_with_sig_field() -> (Document, i32, i32) {
        let mut doc = two_page_doc();
        let value = doc.create_object();
        let field = doc.create_object();
        let mut vd = Dict::new();
        vd.put("Type", Object::name("Sig"));
        vd.put("ByteRange", Object::Array(vec![]));
        vd.put("Contents", Object::string(&[0u8; 32]));
        vd.put("Filter", Object::name("Adobe.PPKLite"));
        doc.update_object(value, Object::Dict(vd)).unwrap();
        let mut fd = Dict::new();
        fd.put("FT", Object::name("Sig"));
        fd.put("V", Object::reference(value));
        doc.update_object(field, Object::Dict(fd)).unwrap();
        (doc, field, value)
    }

    #[test]
    fn test_presize_reserves_pairs() {
        let (mut doc, field, value) = doc_with_sig_field();
        doc.add_unsaved_signature(field, Box::new(NullSigner));
        presize_unsaved_signature_byteranges(&mut doc).unwrap();
        let vd = doc.object(value).unwrap().as_dict().unwrap();
        let br = vd.get("ByteRange").unwrap().as_array().unwrap();
        // one signature: (1+1) pairs of two ints
        assert_eq!(br.len(), 4);
        assert!(br.iter().all(|o| o.as_int() == Some(i32::MAX as i64)));
    }

    #[test]
    fn test_presize_without_byterange_fails() {
        let (mut doc, field, value) = doc_with_sig_field();
        doc.object_mut(value)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .remove("ByteRange");
        doc.add_unsaved_signature(field, Box::new(NullSigner));
        assert!(presize_unsaved_signature_byteranges(&mut doc).is_err());
    }

    #[test]
    fn test_find_markers() {
        let data = b"<</Type/Sig/ByteRange[1 2]/Contents<00>/Filter/X>>";
        assert!(find(data, b"/ByteRange").unwrap() < find(data, b"/Contents").unwrap());
        assert!(find(data, b"/Contents").unwrap() < find(data, b"/Filter").unwrap());
        assert!(find(data, b"/Missing").is_none());
    }
}
