//! Primary hint stream
//!
//! Builds the page-offset and shared-object hint tables (ISO 32000-1 Annex
//! F, tables F.3 to F.6) from the offsets established by pass 0, and
//! installs the result as the body of the hint stream object.

use crate::fitz::buffer::BitWriter;
use crate::fitz::error::Result;
use crate::fitz::output::Output;
use crate::pdf::document::Document;
use crate::pdf::filter::{encode_ascii_hex, encode_flate};
use crate::pdf::write::{
    WriteState, USE_CATALOGUE, USE_HINTS, USE_PAGE1, USE_PAGE_SHIFT, USE_PARAMS, USE_SHARED,
};
use bytes::Bytes;

/// Bits needed to represent `x`: floor(log2 x) + 1, or 0 when `x` is not
/// positive.
pub(crate) fn bits_needed(x: i64) -> u32 {
    if x <= 0 {
        return 0;
    }
    64 - (x as u64).leading_zeros()
}

/// The byte extent of object `i`: from its own offset up to the next thing
/// in the file. The last object of the first-page group runs into the main
/// xref; the final object wraps around to the remaining-pages group.
fn object_extent(state: &WriteState, xref_len: i32, i: i32) -> (i64, i64) {
    let min = state.ofs_list[i as usize];
    let max = if i == state.start - 1 || (state.start == 1 && i == xref_len - 1) {
        state.main_xref_offset
    } else if i == xref_len - 1 {
        state.ofs_list[1]
    } else {
        state.ofs_list[(i + 1) as usize]
    };
    (min, max)
}

fn make_page_offset_hints(
    doc: &Document,
    state: &mut WriteState,
    buf: &mut BitWriter,
) -> Result<()> {
    let xref_len = doc.xref_len();

    // second walk over the used objects: accumulate per-page extents and
    // find the shared-object section bounds
    let mut min_shared_object = xref_len;
    let mut max_shared_object = 1;
    let mut min_shared_length = state.file_len;
    let mut max_shared_length = 0i64;

    for i in 1..xref_len {
        let (min, max) = object_extent(state, xref_len, i);
        let usage = state.use_list[i as usize];

        let page = if usage & USE_SHARED != 0 {
            if i < min_shared_object {
                min_shared_object = i;
            }
            if i > max_shared_object {
                max_shared_object = i;
            }
            min_shared_length = min_shared_length.min(max - min);
            max_shared_length = max_shared_length.max(max - min);
            -1
        } else if usage & (USE_CATALOGUE | USE_HINTS | USE_PARAMS) != 0 {
            -1
        } else if usage & USE_PAGE1 != 0 {
            // page 1 objects double as shared-object entries
            min_shared_length = min_shared_length.min(max - min);
            max_shared_length = max_shared_length.max(max - min);
            0
        } else if usage == 0 {
            -1
        } else {
            (usage >> USE_PAGE_SHIFT) as i32
        };

        if page >= 0 {
            let po = state.pages.page_mut(page as usize);
            po.num_objects += 1;
            po.min_ofs = po.min_ofs.min(min);
            po.max_ofs = po.max_ofs.max(max);
        }
    }

    let page_count = state.page_count as usize;
    let mut min_objs_per_page = state.pages.page(0).num_objects;
    let mut max_objs_per_page = min_objs_per_page;
    let mut min_page_length = state.pages.page(0).max_ofs - state.pages.page(0).min_ofs;
    let mut max_page_length = min_page_length;
    for i in 1..page_count {
        let po = state.pages.page(i);
        min_objs_per_page = min_objs_per_page.min(po.num_objects);
        max_objs_per_page = max_objs_per_page.max(po.num_objects);
        let len = po.max_ofs - po.min_ofs;
        min_page_length = min_page_length.min(len);
        max_page_length = max_page_length.max(len);
    }

    // per-page shared reference counts; page 1's own objects count as its
    // shared references
    let mut max_shared_object_refs = 0;
    for i in 0..page_count {
        let mut count = 0;
        for &o in &state.pages.page(i).objects {
            let usage = state.use_list[o as usize];
            if (i == 0 && usage & USE_PAGE1 != 0) || (i != 0 && usage & USE_SHARED != 0) {
                count += 1;
            }
        }
        state.pages.page_mut(i).num_shared = count;
        if i == 0 || count > max_shared_object_refs {
            max_shared_object_refs = count;
        }
    }
    if min_shared_object > max_shared_object {
        min_shared_object = 0;
        max_shared_object = 0;
    }
    let page1_shared = state.pages.page(0).num_shared;

    // Page offset hint header
    let objs_per_page_bits = bits_needed((max_objs_per_page - min_objs_per_page) as i64);
    let page_len_bits = bits_needed(max_page_length - min_page_length);
    let shared_object_bits = bits_needed(max_shared_object_refs as i64);
    let shared_object_id_bits =
        bits_needed((max_shared_object - min_shared_object + page1_shared) as i64);

    // least number of objects in a page
    buf.write_bits(min_objs_per_page as u64, 32);
    // location of the first page's page object
    let first_page_obj_ofs = state.ofs_list[state.pages.page(0).page_object_number as usize];
    buf.write_bits(first_page_obj_ofs as u64, 32);
    // bits for the object-count delta
    buf.write_bits(objs_per_page_bits as u64, 16);
    // least page length, and bits for the length delta
    buf.write_bits(min_page_length as u64, 32);
    buf.write_bits(page_len_bits as u64, 16);
    // content stream offset and length fields: always zero
    buf.write_bits(0, 32);
    buf.write_bits(0, 16);
    buf.write_bits(0, 32);
    buf.write_bits(page_len_bits as u64, 16);
    // shared object reference widths
    buf.write_bits(shared_object_bits as u64, 16);
    buf.write_bits(shared_object_id_bits as u64, 16);
    // fraction numerator and denominator widths: always zero
    buf.write_bits(0, 16);
    buf.write_bits(0, 16);

    // Per-page entries, each sequence byte aligned.
    // object count deltas
    for i in 0..page_count {
        let po = state.pages.page(i);
        buf.write_bits((po.num_objects - min_objs_per_page) as u64, objs_per_page_bits);
    }
    buf.pad();
    // page length deltas
    for i in 0..page_count {
        let po = state.pages.page(i);
        buf.write_bits(
            (po.max_ofs - po.min_ofs - min_page_length) as u64,
            page_len_bits,
        );
    }
    buf.pad();
    // shared object reference counts
    for i in 0..page_count {
        buf.write_bits(state.pages.page(i).num_shared as u64, shared_object_bits);
    }
    buf.pad();
    // shared object ids; page 1's are all sent as zero, which is what
    // Acrobat emits
    for i in 0..page_count {
        for &o in &state.pages.page(i).objects {
            let usage = state.use_list[o as usize];
            if i == 0 && usage & USE_PAGE1 != 0 {
                buf.write_bits(0, shared_object_id_bits);
            }
            if i != 0 && usage & USE_SHARED != 0 {
                buf.write_bits(
                    (o - min_shared_object + page1_shared) as u64,
                    shared_object_id_bits,
                );
            }
        }
    }
    buf.pad();
    // content stream lengths: same values and width as the page lengths
    for i in 0..page_count {
        let po = state.pages.page(i);
        buf.write_bits(
            (po.max_ofs - po.min_ofs - min_page_length) as u64,
            page_len_bits,
        );
    }

    buf.pad();
    state.hints_shared_offset = buf.len() as i64;

    // Shared object hint header
    let shared_length_bits = bits_needed(max_shared_length - min_shared_length);
    buf.write_bits(min_shared_object as u64, 32);
    buf.write_bits(state.ofs_list[min_shared_object as usize] as u64, 32);
    buf.write_bits(page1_shared as u64, 32);
    buf.write_bits(
        (max_shared_object - min_shared_object + page1_shared) as u64,
        32,
    );
    // group size bits: one object per group
    buf.write_bits(0, 16);
    buf.write_bits(min_shared_length as u64, 32);
    buf.write_bits(shared_length_bits as u64, 16);

    // shared group lengths, page 1 entries first
    let page1_objects = state.pages.page(0).objects.clone();
    for &o in &page1_objects {
        let (min, max) = object_extent(state, xref_len, o);
        if state.use_list[o as usize] & USE_PAGE1 != 0 {
            buf.write_bits((max - min - min_shared_length) as u64, shared_length_bits);
        }
    }
    for i in min_shared_object..=max_shared_object {
        let (min, max) = object_extent(state, xref_len, i);
        buf.write_bits((max - min - min_shared_length) as u64, shared_length_bits);
    }
    buf.pad();

    // signature presence flags, all clear
    for _ in 0..(max_shared_object - min_shared_object + page1_shared) {
        buf.write_bits(0, 1);
    }
    buf.pad();
    // no signatures, so no digest block follows
    buf.pad();
    Ok(())
}

/// Build the hint tables and install them as the hint stream's body. Must
/// run after pass 0 (offsets) and before the parameter patch (length).
///
/// The body is encoded here rather than at emission time, so that
/// `hintstream_len` is exactly the number of bytes pass 1 will write; every
/// offset shifted by the hint stream depends on that.
pub(crate) fn make_hint_stream(doc: &mut Document, state: &mut WriteState) -> Result<()> {
    let mut buf = BitWriter::new();
    make_page_offset_hints(doc, state, &mut buf)?;
    let raw = buf.into_bytes();
    let hint_num = doc.xref_len() - 1;

    let mut body = raw.to_vec();
    let mut encoded = false;
    if state.do_deflate {
        body = encode_flate(&body, 6)?;
        encoded = true;
    }
    if state.do_ascii {
        body = encode_ascii_hex(&body);
        encoded = true;
    }
    state.hintstream_len = body.len() as i64;
    doc.update_stream_raw(hint_num, Bytes::from(body), encoded)?;
    Ok(())
}

/// Write `\n` until the output reaches `target`. Pass 1 uses this to pin
/// every object to the offset pass 0 recorded for it.
pub(crate) fn padto(out: &mut Output, target: i64) -> Result<()> {
    let mut pos = out.tell()?;
    debug_assert!(pos <= target, "output overran pad target");
    while pos < target {
        out.write_byte(b'\n')?;
        pos += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::write::linearize::linearize;
    use crate::pdf::write::test_support::{new_state, three_page_doc};

    /// Lay out plausible pass-0 offsets over a linearized document so the
    /// hint builder has consistent extents to work from.
    fn fake_pass0(state: &mut WriteState, xref_len: i32) {
        for num in 1..xref_len {
            state.ofs_list[num as usize] = 1000 + 100 * num as i64;
        }
        state.main_xref_offset = 1000 + 100 * xref_len as i64;
        state.file_len = state.main_xref_offset + 500;
    }

    #[test]
    fn test_header_locates_first_page_object() {
        let mut doc = three_page_doc();
        let mut state = new_state(&doc);
        linearize(&mut doc, &mut state).unwrap();
        let xref_len = doc.xref_len();
        fake_pass0(&mut state, xref_len);

        let mut buf = BitWriter::new();
        make_page_offset_hints(&doc, &mut state, &mut buf).unwrap();
        let data = buf.into_bytes();

        // header item 2 occupies bytes 4..8: the offset of the first
        // page's page object
        let expected = state.ofs_list[state.pages.page(0).page_object_number as usize];
        let got = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as i64;
        assert_eq!(got, expected);
        // the shared-object table starts somewhere past the fixed header
        assert!(state.hints_shared_offset >= 26);
        assert!((state.hints_shared_offset as usize) < data.len());
    }

    #[test]
    fn test_page_aggregates_accumulated() {
        let mut doc = three_page_doc();
        let mut state = new_state(&doc);
        linearize(&mut doc, &mut state).unwrap();
        let xref_len = doc.xref_len();
        fake_pass0(&mut state, xref_len);

        let mut buf = BitWriter::new();
        make_page_offset_hints(&doc, &mut state, &mut buf).unwrap();

        for page in 0..3 {
            let po = state.pages.page(page);
            assert!(po.num_objects > 0, "page {} counted no objects", page);
            assert!(po.max_ofs > po.min_ofs, "page {} has an empty extent", page);
        }
        // the graphics state shared by pages 2 and 3 counts as a shared
        // reference for both
        assert!(state.pages.page(1).num_shared >= 1);
        assert!(state.pages.page(2).num_shared >= 1);
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(-5), 0);
        assert_eq!(bits_needed(0), 0);
        assert_eq!(bits_needed(1), 1);
        assert_eq!(bits_needed(2), 2);
        assert_eq!(bits_needed(3), 2);
        assert_eq!(bits_needed(4), 3);
        assert_eq!(bits_needed(255), 8);
        assert_eq!(bits_needed(256), 9);
    }

    #[test]
    fn test_padto() {
        let mut out = Output::memory();
        out.write_str("abc").unwrap();
        padto(&mut out, 8).unwrap();
        assert_eq!(out.data().unwrap(), b"abc\n\n\n\n\n");
        // already there: no-op
        padto(&mut out, 8).unwrap();
        assert_eq!(out.tell().unwrap(), 8);
    }
}
