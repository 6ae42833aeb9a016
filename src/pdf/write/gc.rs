//! Garbage collection: duplicate removal, xref compaction, renumbering

use crate::pdf::document::Document;
use crate::pdf::object::Object;
use crate::pdf::write::{GarbageLevel, WriteState};
use crate::pdf::xref::XrefEntry;

/// Scan for duplicate objects and fold each one onto its lowest-numbered
/// copy via the renumber map. Pairwise and slow; only runs when asked for.
pub(crate) fn remove_duplicate_objs(doc: &Document, state: &mut WriteState) {
    let xref_len = doc.xref_len();
    for num in 1..xref_len {
        // only compare an object to objects preceding it
        for other in 1..num {
            if state.use_list[num as usize] == 0 || state.use_list[other as usize] == 0 {
                continue;
            }

            // stream bodies are only compared at the highest garbage level;
            // otherwise streams never match anything
            let stream_a = doc.is_stream(num);
            let stream_b = doc.is_stream(other);
            let mut differ = stream_a || stream_b;
            if stream_a && stream_b && state.do_garbage >= GarbageLevel::DedupeStreams {
                differ = false;
            }
            if differ {
                continue;
            }

            // structural equality; for streams this includes the raw bytes
            match (doc.resolve_num(num), doc.resolve_num(other)) {
                (Some(a), Some(b)) if a == b => {}
                _ => continue,
            }

            // keep the lowest numbered object
            let newnum = num.min(other);
            state.renumber_map[num as usize] = newnum;
            state.renumber_map[other as usize] = newnum;
            state.rev_renumber_map[newnum as usize] = num;
            state.use_list[num.max(other) as usize] = 0;

            break;
        }
    }
}

/// Update the renumber map in place, clustering all used objects at low
/// object ids. Requires `renumber_map[n] <= n`, which the deduplicator
/// guarantees.
pub(crate) fn compact_xref(doc: &Document, state: &mut WriteState) {
    let xref_len = doc.xref_len() as usize;
    let mut newnum: i32 = 1;
    for num in 1..xref_len {
        let target = state.renumber_map[num] as usize;
        if state.use_list[target] == 0 {
            state.renumber_map[num] = 0;
        } else if state.renumber_map[num] == num as i32 {
            state.rev_renumber_map[newnum as usize] = state.rev_renumber_map[num];
            state.rev_gen_list[newnum as usize] = state.rev_gen_list[num];
            state.renumber_map[num] = newnum;
            newnum += 1;
        } else {
            // moved objects moved down, so the slot they moved to has its
            // final number already
            state.renumber_map[num] = state.renumber_map[target];
        }
    }
}

/// Rewrite the indirect references of one object tree under the map.
/// References to dropped or out-of-range objects become null.
fn renumber_obj_tree(map: &[i32], xref_len: i32, obj: &mut Object) {
    match obj {
        Object::Dict(d) | Object::Stream { dict: d, .. } => {
            for i in 0..d.len() {
                let val = d.value_at_mut(i);
                if let Object::Ref(r) = val {
                    *val = renumbered_ref(map, xref_len, r.num);
                } else {
                    renumber_obj_tree(map, xref_len, val);
                }
            }
        }
        Object::Array(a) => {
            for val in a.iter_mut() {
                if let Object::Ref(r) = val {
                    *val = renumbered_ref(map, xref_len, r.num);
                } else {
                    renumber_obj_tree(map, xref_len, val);
                }
            }
        }
        _ => {}
    }
}

fn renumbered_ref(map: &[i32], xref_len: i32, old: i32) -> Object {
    if old <= 0 || old >= xref_len || map[old as usize] == 0 {
        Object::Null
    } else {
        Object::reference(map[old as usize])
    }
}

/// Apply the renumber map to every indirect reference (trailer included),
/// move each surviving xref entry to its new slot, transfer the use-list to
/// the new numbering, and reset the map to identity.
pub(crate) fn renumber_objs(doc: &mut Document, state: &mut WriteState) {
    let xref_len = doc.xref_len();
    let map = state.renumber_map.clone();

    let mut trailer = Object::Dict(std::mem::take(doc.trailer_mut()));
    renumber_obj_tree(&map, xref_len, &mut trailer);
    *doc.trailer_mut() = match trailer {
        Object::Dict(d) => d,
        _ => unreachable!(),
    };

    for num in 0..xref_len {
        if map[num as usize] == 0 {
            continue;
        }
        if let Some(mut obj) = doc.take_object(num) {
            if let Object::Ref(r) = obj {
                obj = renumbered_ref(&map, xref_len, r.num);
            } else {
                renumber_obj_tree(&map, xref_len, &mut obj);
            }
            doc.put_object(num, obj);
        }
    }

    // move entries into their compacted slots
    let mut newlen = 0usize;
    for num in 1..xref_len as usize {
        if state.use_list[num] != 0 {
            newlen = newlen.max(map[num] as usize);
        }
    }
    let mut new_use = vec![0u32; xref_len as usize + 3];
    let mut slots: Vec<XrefEntry> = (0..=newlen).map(|_| XrefEntry::free(0)).collect();
    let old = doc.take_xref_entries();
    for (num, entry) in old.into_iter().enumerate() {
        if num == 0 {
            slots[0] = entry;
        } else if num < xref_len as usize && state.use_list[num] != 0 {
            let to = map[num] as usize;
            new_use[to] = state.use_list[num];
            slots[to] = entry;
        }
    }
    doc.replace_xref(slots);

    state.use_list = new_use;
    for num in 1..xref_len as usize {
        state.renumber_map[num] = num as i32;
    }
}
