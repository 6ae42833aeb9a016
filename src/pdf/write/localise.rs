//! Page resource localization
//!
//! Pushes inheritable page attributes down from interior page-tree nodes to
//! the page leaves, so that every page is self-contained. Linearization
//! depends on this: a page's object group must be computable from the page
//! dictionary alone.

use crate::fitz::error::Result;
use crate::pdf::document::Document;
use crate::pdf::object::{Dict, Name, Object};

const RES_CATEGORIES: [&str; 8] = [
    "ExtGState",
    "ColorSpace",
    "Pattern",
    "Shading",
    "XObject",
    "Font",
    "ProcSet",
    "Properties",
];

const INHERITED_ATTRS: [&str; 6] = [
    "MediaBox", "CropBox", "BleedBox", "TrimBox", "ArtBox", "Rotate",
];

/// Ensure every page leaf carries its own `/Resources` and inheritable
/// attributes, then strip those keys from the interior nodes. Runs once per
/// document.
pub(crate) fn localise_page_resources(doc: &mut Document) -> Result<()> {
    if doc.resources_localised {
        return Ok(());
    }
    let pages = doc
        .trailer()
        .get("Root")
        .map(|r| doc.resolve(r))
        .and_then(Object::as_dict)
        .and_then(|cat| cat.get("Pages"))
        .cloned();
    if let Some(pages) = pages {
        let mut marks = vec![false; doc.xref_len() as usize];
        localise_node(doc, &pages, 0, &mut marks)?;
    }
    doc.resources_localised = true;
    Ok(())
}

fn localise_node(
    doc: &mut Document,
    node: &Object,
    depth: i32,
    marks: &mut Vec<bool>,
) -> Result<()> {
    let Some(r) = node.as_ref_obj() else {
        return Ok(());
    };
    let num = r.num;
    if num <= 0 || num >= doc.xref_len() || marks[num as usize] {
        return Ok(());
    }
    marks[num as usize] = true;

    let is_page = doc
        .resolve_num(num)
        .map(|o| o.has_type("Page"))
        .unwrap_or(false);

    if is_page {
        localise_leaf(doc, num, depth);
    } else {
        let kids: Vec<Object> = doc
            .resolve_num(num)
            .and_then(Object::as_dict)
            .and_then(|d| d.get("Kids"))
            .map(|k| doc.resolve(k))
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        for kid in &kids {
            localise_node(doc, kid, depth + 1, marks)?;
        }
        // the children are self-contained now
        if let Some(dict) = doc.object_mut(num).and_then(Object::as_dict_mut) {
            dict.remove("Resources");
            for key in INHERITED_ATTRS {
                dict.remove(key);
            }
        }
    }

    marks[num as usize] = false;
    Ok(())
}

fn localise_leaf(doc: &mut Document, num: i32, depth: i32) {
    // snapshot the page's own resources (following an indirect reference)
    let page_dict = match doc.resolve_num(num).and_then(Object::as_dict) {
        Some(d) => d.clone(),
        None => return,
    };
    let res_ref = page_dict.get("Resources").and_then(Object::as_ref_obj);
    let mut res = page_dict
        .get("Resources")
        .map(|o| doc.resolve(o))
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default();

    let res_changed = inherit_resources(doc, &page_dict, depth, &mut res);

    // inherited attributes resolve to direct values on the leaf
    let mut attrs: Vec<(&str, Object)> = Vec::new();
    for key in INHERITED_ATTRS {
        if let Some(value) = inherit_attr(doc, &page_dict, key, depth) {
            attrs.push((key, value));
        }
    }

    // store the merged resources: in place when they live in their own
    // object, directly on the page otherwise
    match res_ref {
        Some(rr) => {
            if res_changed {
                if let Some(slot) = doc.object_mut(rr.num) {
                    *slot = Object::Dict(res);
                }
            }
        }
        None => {
            if let Some(dict) = doc.object_mut(num).and_then(Object::as_dict_mut) {
                dict.put("Resources", Object::Dict(res));
            }
        }
    }
    if let Some(dict) = doc.object_mut(num).and_then(Object::as_dict_mut) {
        for (key, value) in attrs {
            dict.put(key, value);
        }
    }
}

/// Merge ancestor resources into `res`, existing entries winning. Returns
/// whether anything was added.
fn inherit_resources(doc: &Document, page_dict: &Dict, depth: i32, res: &mut Dict) -> bool {
    let mut changed = false;
    let mut node = page_dict.clone();
    let mut remaining = depth;
    loop {
        let Some(parent) = node.get("Parent").map(|p| doc.resolve(p)).and_then(Object::as_dict)
        else {
            break;
        };
        let parent = parent.clone();
        remaining -= 1;
        if remaining < 0 {
            break;
        }
        if let Some(pres) = parent
            .get("Resources")
            .map(|o| doc.resolve(o))
            .and_then(Object::as_dict)
        {
            for category in RES_CATEGORIES {
                changed |= inherit_category(doc, pres, res, category);
            }
        }
        node = parent;
    }
    changed
}

fn inherit_category(doc: &Document, parent_res: &Dict, res: &mut Dict, category: &str) -> bool {
    let Some(parent_entry) = parent_res.get(category) else {
        return false;
    };
    if !res.contains_key(category) {
        // copy the whole category, resolved so the leaf owns it
        return match doc.resolve(parent_entry) {
            value @ (Object::Dict(_) | Object::Array(_)) => {
                res.put(category, value.clone());
                true
            }
            _ => false,
        };
    }

    // fill the gaps of an existing sub-dictionary; leaf entries win
    let Some(parent_dict) = doc.resolve(parent_entry).as_dict() else {
        return false;
    };
    let missing: Vec<(Name, Object)> = match res.get(category).and_then(Object::as_dict) {
        Some(existing) => parent_dict
            .iter()
            .filter(|(key, _)| !existing.contains_key(key.as_str()))
            .map(|(key, val)| (key.clone(), val.clone()))
            .collect(),
        None => return false,
    };
    if missing.is_empty() {
        return false;
    }
    if let Some(existing) = res.get_mut(category).and_then(Object::as_dict_mut) {
        for (key, val) in missing {
            existing.put(key, val);
        }
    }
    true
}

/// Find an inheritable attribute on the page or its ancestors, resolved.
fn inherit_attr(doc: &Document, page_dict: &Dict, key: &str, depth: i32) -> Option<Object> {
    let mut node = page_dict.clone();
    let mut remaining = depth;
    loop {
        if let Some(value) = node.get(key) {
            return Some(doc.resolve(value).clone());
        }
        let parent = node.get("Parent").map(|p| doc.resolve(p)).and_then(Object::as_dict)?.clone();
        remaining -= 1;
        if remaining < 0 {
            return None;
        }
        node = parent;
    }
}
