//! Linearization planning
//!
//! Classifies every object into a linearization section, creates the
//! parameter and hint-stream objects, reorders the whole xref so that the
//! file can be emitted first-page-first, and patches the parameter values
//! once pass 0 has established the real offsets.

use crate::fitz::error::{Error, Result};
use crate::pdf::document::Document;
use crate::pdf::object::{Dict, Object};
use crate::pdf::write::gc::renumber_objs;
use crate::pdf::write::localise::localise_page_resources;
use crate::pdf::write::mark::mark_trailer;
use crate::pdf::write::pages::PageObjectsList;
use crate::pdf::write::{
    WriteState, SENTINEL, USE_CATALOGUE, USE_HINTS, USE_OTHER_OBJECTS, USE_PAGE1,
    USE_PAGE_OBJECT, USE_PAGE_SHIFT, USE_PARAMS, USE_SHARED,
};
use std::cmp::Ordering;

/// The linearization order of a use-list value, as a total sort key.
/// Sorting the xref ascending by this key yields, from lowest object number
/// to highest:
///
/// remaining pages (in page order), shared objects, other document-level
/// objects, the linearization params, the catalogue, the first page, the
/// hint stream, and finally anything unused.
///
/// Within a section, a page's root dictionary precedes everything else.
/// The file is then written starting at the params object, so the sections
/// land in the Annex F part order even though object numbers do not follow
/// file order. Section membership is decided by the highest-precedence
/// flag present, so an object tagged for both the first page and a later
/// one stays with the first page.
fn sort_key(u: u32) -> (u8, u32, u8) {
    let section = if u == 0 {
        7
    } else if u & USE_HINTS != 0 {
        6
    } else if u & USE_PAGE1 != 0 {
        5
    } else if u & USE_CATALOGUE != 0 {
        4
    } else if u & USE_PARAMS != 0 {
        3
    } else if u & USE_OTHER_OBJECTS != 0 {
        2
    } else if u & USE_SHARED != 0 {
        1
    } else {
        0
    };
    let page = if section == 0 { u >> USE_PAGE_SHIFT } else { 0 };
    let page_object_last = (u & USE_PAGE_OBJECT == 0) as u8;
    (section, page, page_object_last)
}

/// "Ordered at or after": true when `ui` sorts at the same place as or
/// later than `uj`.
pub(crate) fn order_ge(ui: u32, uj: u32) -> bool {
    sort_key(ui) >= sort_key(uj)
}

fn order_cmp(ui: u32, uj: u32) -> Ordering {
    sort_key(ui).cmp(&sort_key(uj))
}

/// Reorder the document for linearized output. On return the params object
/// sits at `state.start`, the hint stream is the last object, and the
/// per-page lists are renumbered, sorted and deduplicated.
pub(crate) fn linearize(doc: &mut Document, state: &mut WriteState) -> Result<()> {
    state.pages = PageObjectsList::new();

    // every page must own its resources before its object group is computed
    localise_page_resources(doc)?;

    for u in state.use_list.iter_mut() {
        *u = 0;
    }
    {
        let trailer = std::mem::take(doc.trailer_mut());
        let classified = mark_trailer(doc, state, &trailer);
        *doc.trailer_mut() = trailer;
        classified?;
    }

    add_linearization_objs(doc, state)?;

    let n = doc.xref_len() as usize;
    let mut reorder: Vec<usize> = (0..n).collect();
    reorder[1..].sort_by(|&i, &j| order_cmp(state.use_list[i], state.use_list[j]));

    let mut start = 1;
    while state.use_list[reorder[start]] & USE_PARAMS == 0 {
        start += 1;
    }
    state.start = start as i32;

    // roll the sort permutation into the renumber map
    let mut rev_renumber = vec![0i32; state.rev_renumber_map.len()];
    let mut rev_gen = vec![0u16; state.rev_gen_list.len()];
    for (i, &old) in reorder.iter().enumerate() {
        state.renumber_map[old] = i as i32;
        rev_renumber[i] = state.rev_renumber_map[old];
        rev_gen[i] = state.rev_gen_list[old];
    }
    state.rev_renumber_map = rev_renumber;
    state.rev_gen_list = rev_gen;

    state.pages.renumber(&state.renumber_map);
    renumber_objs(doc, state);
    state.pages.sort_and_dedupe();
    Ok(())
}

/// Create the Linearization Params dictionary and the (bodyless, for now)
/// primary hint stream. All nine parameter fields hold a sentinel whose
/// serialized width bounds any value patched in later.
fn add_linearization_objs(doc: &mut Document, state: &mut WriteState) -> Result<()> {
    let params_num = doc.create_object();
    let mut params = Dict::new();
    params.put("Linearized", Object::Real(1.0));
    params.put("L", Object::Int(SENTINEL));
    params.put(
        "H",
        Object::Array(vec![Object::Int(SENTINEL), Object::Int(SENTINEL)]),
    );
    params.put("O", Object::Int(SENTINEL));
    params.put("E", Object::Int(SENTINEL));
    params.put("N", Object::Int(SENTINEL));
    params.put("T", Object::Int(SENTINEL));
    doc.update_object_raw(params_num, Object::Dict(params))?;
    init_linear_obj_state(state, params_num, USE_PARAMS);

    let hint_num = doc.create_object();
    let mut hint = Dict::new();
    hint.put("P", Object::Int(0));
    hint.put("S", Object::Int(SENTINEL));
    // the body is stored pre-encoded (see make_hint_stream), so the filter
    // chain is fixed here and the pass-0 dictionary already has its final
    // shape apart from the sentinels
    match (state.do_ascii, state.do_deflate) {
        (true, true) => hint.put(
            "Filter",
            Object::Array(vec![
                Object::name("ASCIIHexDecode"),
                Object::name("FlateDecode"),
            ]),
        ),
        (true, false) => hint.put("Filter", Object::name("ASCIIHexDecode")),
        (false, true) => hint.put("Filter", Object::name("FlateDecode")),
        (false, false) => {}
    }
    hint.put("Length", Object::Int(SENTINEL));
    doc.update_object_raw(hint_num, Object::Stream { dict: hint, data: None })?;
    init_linear_obj_state(state, hint_num, USE_HINTS);
    Ok(())
}

fn init_linear_obj_state(state: &mut WriteState, num: i32, flag: u32) {
    let n = num as usize;
    state.use_list[n] = flag;
    state.renumber_map[n] = num;
    state.rev_renumber_map[n] = num;
    state.gen_list[n] = 0;
    state.rev_gen_list[n] = 0;
}

/// Patch the nine linearization parameters after pass 0. The params object
/// now lives at `state.start`, the hint stream at the end of the xref.
pub(crate) fn update_linearization_params(doc: &mut Document, state: &WriteState) -> Result<()> {
    let xref_len = doc.xref_len();
    let hint_ofs = state.ofs_list[(xref_len - 1) as usize];
    // the first page's data extends up to the start of the remaining pages,
    // with the hint stream counted as part of it
    let end_of_first = if state.start == 1 {
        state.main_xref_offset
    } else {
        state.ofs_list[1] + state.hintstream_len
    };
    let first_page_obj = state
        .pages
        .page(0)
        .objects
        .first()
        .copied()
        .unwrap_or_default();

    {
        let params = doc
            .object_mut(state.start)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| Error::generic("linearization params object missing"))?;
        params.put("L", Object::Int(state.file_len));
        if let Some(h) = params.get_mut("H").and_then(Object::as_array_mut) {
            h[0] = Object::Int(hint_ofs);
            h[1] = Object::Int(end_of_first - hint_ofs);
        }
        params.put("O", Object::Int(first_page_obj as i64));
        params.put("E", Object::Int(end_of_first));
        params.put("N", Object::Int(state.page_count as i64));
        params.put(
            "T",
            Object::Int(state.first_xref_entry_offset + state.hintstream_len),
        );
    }
    {
        let hint = doc
            .object_mut(xref_len - 1)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| Error::generic("hint stream object missing"))?;
        hint.put("S", Object::Int(state.hints_shared_offset));
        hint.put("Length", Object::Int(state.hintstream_len));
    }
    Ok(())
}
