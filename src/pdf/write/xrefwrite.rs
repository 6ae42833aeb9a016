//! Cross-reference emission
//!
//! Classic `xref`/`trailer` tables and PDF 1.5 cross-reference streams.
//! Incremental writes partition the object range into maximal runs of
//! entries belonging to the pending section and emit one subsection per
//! run.

use crate::fitz::error::Result;
use crate::fitz::output::Output;
use crate::pdf::document::Document;
use crate::pdf::object::{Dict, Object};
use crate::pdf::print::obj_to_bytes;
use crate::pdf::write::objwrite::write_object;
use crate::pdf::write::WriteState;
use bytes::Bytes;

fn write_xref_subsect(
    state: &mut WriteState,
    out: &mut Output,
    from: i32,
    to: i32,
) -> Result<()> {
    out.write_str(&format!("{} {}\n", from, to - from))?;
    for num in from..to {
        let n = num as usize;
        let kind = if state.use_list[n] != 0 { 'n' } else { 'f' };
        // exactly 20 bytes per entry, trailing space included
        out.write_str(&format!(
            "{:010} {:05} {} \n",
            state.ofs_list[n], state.gen_list[n], kind
        ))?;
    }
    Ok(())
}

/// Emit a classic xref table plus trailer and `startxref`.
///
/// `first` marks the table that carries the document identity (`Root`,
/// `Info`, `ID`); a linearized file's trailing table omits it and instead
/// points back at the first one.
pub(crate) fn write_xref(
    doc: &mut Document,
    state: &mut WriteState,
    out: &mut Output,
    from: i32,
    to: i32,
    first: bool,
    main_xref_offset: i64,
    startxref: i64,
) -> Result<()> {
    out.write_str("xref\n")?;
    state.first_xref_entry_offset = out.tell()?;

    if state.do_incremental {
        let mut subfrom = from;
        while subfrom < to {
            while subfrom < to && !doc.is_incremental(subfrom) {
                subfrom += 1;
            }
            let mut subto = subfrom;
            while subto < to && doc.is_incremental(subto) {
                subto += 1;
            }
            if subfrom < subto {
                write_xref_subsect(state, out, subfrom, subto)?;
            }
            subfrom = subto;
        }
    } else {
        write_xref_subsect(state, out, from, to)?;
    }

    out.write_str("\n")?;

    let trailer = if state.do_incremental {
        let mut t = doc.trailer().clone();
        t.put("Size", Object::Int(doc.xref_len() as i64));
        t.put("Prev", Object::Int(doc.startxref));
        doc.startxref = startxref;
        t
    } else {
        let mut t = Dict::new();
        t.put("Size", Object::Int(to as i64));
        if first {
            for key in ["Info", "Root", "ID"] {
                if let Some(o) = doc.trailer().get(key) {
                    t.put(key, o.clone());
                }
            }
        }
        if main_xref_offset != 0 {
            t.put("Prev", Object::Int(main_xref_offset));
        }
        t
    };

    out.write_str("trailer\n")?;
    out.write_data(&obj_to_bytes(&Object::Dict(trailer), state.do_tight))?;
    out.write_str("\n")?;
    out.write_str(&format!("startxref\n{}\n%%EOF\n", startxref))?;

    doc.has_xref_streams = false;
    Ok(())
}

fn xref_stream_subsect(
    state: &WriteState,
    index: &mut Vec<Object>,
    body: &mut Vec<u8>,
    from: i32,
    to: i32,
) {
    index.push(Object::Int(from as i64));
    index.push(Object::Int((to - from) as i64));
    for num in from..to {
        let n = num as usize;
        body.push(if state.use_list[n] != 0 { 1 } else { 0 });
        body.push((state.ofs_list[n] >> 24) as u8);
        body.push((state.ofs_list[n] >> 16) as u8);
        body.push((state.ofs_list[n] >> 8) as u8);
        body.push(state.ofs_list[n] as u8);
        body.push(state.gen_list[n] as u8);
    }
}

/// Emit the cross-reference as a stream object: `/W [1 4 1]` packed
/// triples of type byte, big-endian offset, generation byte. The stream
/// allocates its own object number, extending the table by one.
pub(crate) fn write_xref_stream(
    doc: &mut Document,
    state: &mut WriteState,
    out: &mut Output,
    from: i32,
    to: i32,
    first: bool,
    main_xref_offset: i64,
    startxref: i64,
) -> Result<()> {
    let num = doc.create_object();
    state.first_xref_entry_offset = out.tell()?;

    // the table now covers the xref stream object itself
    let to = to + 1;

    let mut dict = Dict::new();
    if first {
        for key in ["Info", "Root", "ID"] {
            if let Some(o) = doc.trailer().get(key) {
                dict.put(key, o.clone());
            }
        }
        if state.do_incremental {
            if let Some(o) = doc.trailer().get("Encrypt") {
                dict.put("Encrypt", o.clone());
            }
        }
    }
    dict.put("Size", Object::Int(to as i64));
    if state.do_incremental {
        dict.put("Prev", Object::Int(doc.startxref));
        doc.startxref = startxref;
    } else if main_xref_offset != 0 {
        dict.put("Prev", Object::Int(main_xref_offset));
    }
    dict.put("Type", Object::name("XRef"));
    dict.put(
        "W",
        Object::Array(vec![Object::Int(1), Object::Int(4), Object::Int(1)]),
    );

    state.use_list[num as usize] = 1;
    state.ofs_list[num as usize] = state.first_xref_entry_offset;

    let mut index = Vec::new();
    let mut body = Vec::with_capacity(((to - from) as usize) * 6);
    if state.do_incremental {
        let mut subfrom = from;
        while subfrom < to {
            while subfrom < to && !doc.is_incremental(subfrom) {
                subfrom += 1;
            }
            let mut subto = subfrom;
            while subto < to && doc.is_incremental(subto) {
                subto += 1;
            }
            if subfrom < subto {
                xref_stream_subsect(state, &mut index, &mut body, subfrom, subto);
            }
            subfrom = subto;
        }
    } else {
        xref_stream_subsect(state, &mut index, &mut body, from, to);
    }
    dict.put("Index", Object::Array(index));

    doc.update_object_raw(num, Object::Dict(dict))?;
    doc.update_stream_raw(num, Bytes::from(body), false)?;

    write_object(doc, state, out, num, 0, false)?;
    out.write_str(&format!("startxref\n{}\n%%EOF\n", startxref))?;
    Ok(())
}
