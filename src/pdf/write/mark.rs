//! Reachability marking and linearization classification
//!
//! Two distinct walks over the object graph:
//!
//! - [`mark_obj`] marks everything reachable from the trailer, repairing
//!   broken references (replaced with null at the reference site) and
//!   inlining indirect `/Length` values into stream dictionaries.
//! - [`mark_trailer`] classifies every reachable object into a
//!   linearization section and records per-page usage.

use crate::fitz::error::Result;
use crate::pdf::document::Document;
use crate::pdf::object::{Dict, Object};
use crate::pdf::write::{
    WriteState, USE_CATALOGUE, USE_OTHER_OBJECTS, USE_PAGE1, USE_PAGE_MASK, USE_PAGE_OBJECT,
    USE_PAGE_SHIFT, USE_SHARED,
};

// ----------------------------------------------------------------------
// Reachability
// ----------------------------------------------------------------------

/// Recursively mark `obj` and everything it references as used. Returns
/// true when `obj` is itself a duff reference: the caller replaces it with
/// null in the containing dictionary or array.
pub(crate) fn mark_obj(doc: &mut Document, state: &mut WriteState, obj: &mut Object) -> Result<bool> {
    if let Object::Ref(r) = obj {
        let num = r.num;
        if num <= 0 || num >= doc.xref_len() {
            return Ok(true);
        }
        let n = num as usize;
        if state.use_list[n] != 0 {
            // already marked; also breaks reference cycles
            return Ok(false);
        }
        state.use_list[n] = 1;

        let Some(mut target) = doc.take_object(num) else {
            state.use_list[n] = 0;
            return Ok(true);
        };
        if target.is_null() {
            doc.put_object(num, target);
            state.use_list[n] = 0;
            return Ok(true);
        }

        if let Object::Stream { dict, .. } = &mut target {
            bake_stream_length(doc, state, num, dict);
        }

        let walked = if target.is_indirect() {
            // a slot aliasing another object; mark through it
            mark_obj(doc, state, &mut target).map(|_| ())
        } else {
            mark_children(doc, state, &mut target)
        };
        doc.put_object(num, target);
        walked?;
        return Ok(false);
    }

    mark_children(doc, state, obj)?;
    Ok(false)
}

/// Inline an indirect `/Length` into the stream dictionary, dropping the
/// length object from the used set. An unresolvable length is left broken.
fn bake_stream_length(doc: &Document, state: &mut WriteState, num: i32, dict: &mut Dict) {
    let Some(len_ref) = dict.get("Length").and_then(Object::as_ref_obj) else {
        return;
    };
    if len_ref.num > 0 && len_ref.num < doc.xref_len() {
        state.use_list[len_ref.num as usize] = 0;
    }
    match doc.resolve_num(len_ref.num).and_then(Object::as_int) {
        Some(len) => dict.put("Length", Object::Int(len)),
        None => log::warn!("cannot inline /Length of stream object {}", num),
    }
}

fn mark_children(doc: &mut Document, state: &mut WriteState, obj: &mut Object) -> Result<()> {
    match obj {
        Object::Dict(d) | Object::Stream { dict: d, .. } => {
            for i in 0..d.len() {
                if mark_obj(doc, state, d.value_at_mut(i))? {
                    *d.value_at_mut(i) = Object::Null;
                }
            }
        }
        Object::Array(a) => {
            for item in a.iter_mut() {
                if mark_obj(doc, state, item)? {
                    *item = Object::Null;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Linearization classification
// ----------------------------------------------------------------------

/// Classify every object reachable from the trailer into its linearization
/// section, and fill the per-page object lists.
pub(crate) fn mark_trailer(doc: &Document, state: &mut WriteState, trailer: &Dict) -> Result<()> {
    let mut marks = vec![false; doc.xref_len() as usize];
    for (key, val) in trailer.iter() {
        if key.as_str() == "Root" {
            mark_root(doc, state, val, &mut marks)?;
        } else {
            mark_all(doc, state, val, &mut marks, USE_CATALOGUE, -1);
        }
    }
    Ok(())
}

fn mark_root(
    doc: &Document,
    state: &mut WriteState,
    obj: &Object,
    marks: &mut [bool],
) -> Result<()> {
    let mut guard = None;
    if let Object::Ref(r) = obj {
        if r.num <= 0 || r.num >= doc.xref_len() {
            return Ok(());
        }
        let n = r.num as usize;
        if marks[n] {
            return Ok(());
        }
        marks[n] = true;
        guard = Some(n);
        state.use_list[n] |= USE_CATALOGUE;
    }

    if let Some(dict) = doc.resolve(obj).as_dict() {
        for (key, val) in dict.iter() {
            match key.as_str() {
                "Pages" => {
                    state.page_count = mark_pages(doc, state, val, marks, 0)?;
                }
                "Names" | "Dests" => {
                    mark_all(doc, state, val, marks, USE_OTHER_OBJECTS, -1);
                }
                "Outlines" => {
                    // outlines belong with the first page only when the
                    // viewer opens showing them
                    let mode = dict.get("PageMode").map(|o| doc.resolve(o));
                    let section = match mode.and_then(Object::as_name) {
                        Some(n) if n.as_str() == "UseOutlines" => USE_PAGE1,
                        _ => USE_OTHER_OBJECTS,
                    };
                    mark_all(doc, state, val, marks, section, -1);
                }
                _ => {
                    mark_all(doc, state, val, marks, USE_CATALOGUE, -1);
                }
            }
        }
    }

    if let Some(n) = guard {
        marks[n] = false;
    }
    Ok(())
}

fn mark_pages(
    doc: &Document,
    state: &mut WriteState,
    obj: &Object,
    marks: &mut [bool],
    mut pagenum: i32,
) -> Result<i32> {
    let mut guard = None;
    if let Object::Ref(r) = obj {
        if r.num <= 0 || r.num >= doc.xref_len() {
            return Ok(pagenum);
        }
        let n = r.num as usize;
        if marks[n] {
            return Ok(pagenum);
        }
        marks[n] = true;
        guard = Some(n);
    }

    let resolved = doc.resolve(obj);
    if resolved.has_type("Page") {
        // unmark so the full page walk below revisits this node
        if let Some(n) = guard {
            marks[n] = false;
        }
        let flag = if pagenum == 0 {
            USE_PAGE1
        } else {
            (pagenum as u32) << USE_PAGE_SHIFT
        };
        mark_all(doc, state, obj, marks, flag, pagenum);
        if let Some(r) = obj.as_ref_obj() {
            state.pages.set_page_object(pagenum as usize, r.num);
            state.use_list[r.num as usize] |= USE_PAGE_OBJECT;
        }
        return Ok(pagenum + 1);
    }

    match resolved {
        Object::Dict(d) => {
            for (key, val) in d.iter() {
                if key.as_str() == "Kids" {
                    pagenum = mark_pages(doc, state, val, marks, pagenum)?;
                } else {
                    mark_all(doc, state, val, marks, USE_CATALOGUE, -1);
                }
            }
            if let Some(n) = guard {
                state.use_list[n] |= USE_CATALOGUE;
            }
        }
        Object::Array(a) => {
            for item in a {
                pagenum = mark_pages(doc, state, item, marks, pagenum)?;
            }
            if let Some(n) = guard {
                state.use_list[n] |= USE_CATALOGUE;
            }
        }
        _ => {}
    }

    if let Some(n) = guard {
        marks[n] = false;
    }
    Ok(pagenum)
}

/// Tag `obj` and its whole subtree with `flag`. An object already tagged
/// for some other page is promoted to shared. With `page >= 0`, every
/// indirect object visited is recorded in that page's object list.
fn mark_all(
    doc: &Document,
    state: &mut WriteState,
    obj: &Object,
    marks: &mut [bool],
    flag: u32,
    page: i32,
) {
    let mut guard = None;
    if let Object::Ref(r) = obj {
        if r.num <= 0 || r.num >= doc.xref_len() {
            return;
        }
        let n = r.num as usize;
        if marks[n] {
            return;
        }
        marks[n] = true;
        guard = Some(n);
        if state.use_list[n] & USE_PAGE_MASK != 0 {
            state.use_list[n] |= USE_SHARED;
        } else {
            state.use_list[n] |= flag;
        }
        if page >= 0 {
            state.pages.insert(page as usize, r.num);
        }
    }

    match doc.resolve(obj) {
        Object::Dict(d) | Object::Stream { dict: d, .. } => {
            for (_, val) in d.iter() {
                mark_all(doc, state, val, marks, flag, page);
            }
        }
        Object::Array(a) => {
            for item in a {
                mark_all(doc, state, item, marks, flag, page);
            }
        }
        _ => {}
    }

    if let Some(n) = guard {
        marks[n] = false;
    }
}
