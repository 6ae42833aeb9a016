//! Document writer
//!
//! Serializes a [`Document`] back to a file. Depending on the options this
//! garbage-collects, deduplicates, compacts and renumbers the xref,
//! recompresses streams, appends an incremental update, or produces a
//! linearized (fast-web-view) file with a primary hint stream.
//!
//! The linearized write runs in two passes: pass 0 establishes every byte
//! offset with placeholder parameter values, then the hint stream is built
//! and the parameters patched, and pass 1 rewrites the file pinning each
//! object to its recorded offset.

pub(crate) mod gc;
pub(crate) mod hints;
pub(crate) mod linearize;
pub(crate) mod localise;
pub(crate) mod mark;
pub(crate) mod objwrite;
pub(crate) mod pages;
pub(crate) mod signatures;
pub(crate) mod xrefwrite;

use crate::fitz::error::{Error, Result};
use crate::fitz::output::Output;
use crate::pdf::document::Document;
use crate::pdf::object::Object;
use crate::pdf::write::gc::{compact_xref, remove_duplicate_objs, renumber_objs};
use crate::pdf::write::hints::{make_hint_stream, padto};
use crate::pdf::write::linearize::{linearize, update_linearization_params};
use crate::pdf::write::mark::mark_obj;
use crate::pdf::write::objwrite::write_object;
use crate::pdf::write::pages::PageObjectsList;
use crate::pdf::write::signatures::{complete_signatures, presize_unsaved_signature_byteranges};
use crate::pdf::write::xrefwrite::{write_xref, write_xref_stream};
use crate::pdf::xref::EntryKind;
use std::io::SeekFrom;
use std::path::Path;

// Use-list constants.
//
// use_list[num] == 0 means object num is unused. The low byte holds the
// section flags below; the high bits hold the page number for objects used
// by a single page past the first.
pub(crate) const USE_CATALOGUE: u32 = 2;
pub(crate) const USE_PAGE1: u32 = 4;
pub(crate) const USE_SHARED: u32 = 8;
pub(crate) const USE_PARAMS: u32 = 16;
pub(crate) const USE_HINTS: u32 = 32;
pub(crate) const USE_PAGE_OBJECT: u32 = 64;
pub(crate) const USE_OTHER_OBJECTS: u32 = 128;
pub(crate) const USE_PAGE_MASK: u32 = !255;
pub(crate) const USE_PAGE_SHIFT: u32 = 8;

/// Placeholder for the linearization parameter fields. Its serialized
/// width (11 characters) bounds every value patched in after pass 0.
pub(crate) const SENTINEL: i64 = i32::MIN as i64;

/// How much garbage collection a save performs. Each level includes the
/// ones before it.
///
/// `Compact` and above renumber objects and force every generation number
/// to zero, which invalidates any existing encryption of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum GarbageLevel {
    /// Keep every object
    #[default]
    None,
    /// Drop objects unreachable from the trailer
    Sweep,
    /// Also compact and renumber the xref
    Compact,
    /// Also coalesce duplicate non-stream objects
    Dedupe,
    /// Also coalesce streams whose raw bytes match
    DedupeStreams,
}

/// Which stream kinds to decode on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpandFlags(u8);

impl ExpandFlags {
    pub const NONE: Self = Self(0);
    pub const IMAGES: Self = Self(1);
    pub const FONTS: Self = Self(2);
    pub const ALL: Self = Self(3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ExpandFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Collaborator that sanitizes page content streams before a save. The
/// writer itself never rewrites content.
pub trait ContentCleaner {
    fn clean_pages(&self, doc: &mut Document, ascii: bool) -> Result<()>;
}

/// Options controlling a save.
pub struct SaveOptions {
    /// Append changed objects to the existing file. Mutually exclusive
    /// with `garbage` and `linear`.
    pub incremental: bool,
    /// Wrap binary streams in ASCIIHex.
    pub ascii: bool,
    /// Decode the selected stream kinds instead of copying them.
    pub expand: ExpandFlags,
    /// Apply Flate to streams that have no filter (or were expanded).
    pub deflate: bool,
    pub garbage: GarbageLevel,
    /// Produce linearized output. Implies at least a reachability sweep.
    pub linear: bool,
    /// Run the content cleaner before writing.
    pub clean: bool,
    /// Write null for objects that fail to load or decode instead of
    /// aborting; failures are counted in [`SaveStats::errors`].
    pub continue_on_error: bool,
    pub cleaner: Option<Box<dyn ContentCleaner>>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            incremental: false,
            ascii: false,
            expand: ExpandFlags::NONE,
            deflate: false,
            garbage: GarbageLevel::None,
            linear: false,
            clean: false,
            continue_on_error: false,
            cleaner: None,
        }
    }
}

/// Outcome of a successful save.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveStats {
    /// Objects written as null under `continue_on_error`
    pub errors: usize,
}

/// Everything the writer tracks across one save.
pub(crate) struct WriteState {
    pub do_incremental: bool,
    pub do_tight: bool,
    pub do_ascii: bool,
    pub do_expand: ExpandFlags,
    pub do_deflate: bool,
    pub do_garbage: GarbageLevel,
    pub do_linear: bool,
    pub continue_on_error: bool,
    pub errors: usize,

    pub use_list: Vec<u32>,
    pub ofs_list: Vec<i64>,
    pub gen_list: Vec<u16>,
    pub renumber_map: Vec<i32>,
    pub rev_renumber_map: Vec<i32>,
    pub rev_gen_list: Vec<u16>,

    /// First object of the first-page group; the write starts here
    pub start: i32,
    pub first_xref_offset: i64,
    pub main_xref_offset: i64,
    pub first_xref_entry_offset: i64,
    pub file_len: i64,
    pub hints_shared_offset: i64,
    pub hintstream_len: i64,
    pub page_count: i32,
    pub pages: PageObjectsList,
}

impl WriteState {
    pub(crate) fn new(doc: &Document, opts: &SaveOptions) -> Self {
        let xref_len = doc.xref_len() as usize;
        // room for one-past-the-end access plus the two linearization
        // objects created mid-save
        let cap = xref_len + 3;

        let mut garbage = opts.garbage;
        if opts.linear && garbage < GarbageLevel::Sweep {
            garbage = GarbageLevel::Sweep;
        }

        let mut rev_gen_list = vec![0u16; cap];
        for (num, slot) in rev_gen_list.iter_mut().enumerate().take(xref_len) {
            *slot = doc.entry(num as i32).map(|e| e.gen).unwrap_or(0);
        }

        Self {
            do_incremental: opts.incremental,
            do_tight: opts.expand.is_none() || opts.deflate,
            do_ascii: opts.ascii,
            do_expand: opts.expand,
            do_deflate: opts.deflate,
            do_garbage: garbage,
            do_linear: opts.linear,
            continue_on_error: opts.continue_on_error,
            errors: 0,
            use_list: vec![0; cap],
            ofs_list: vec![0; cap],
            gen_list: vec![0; cap],
            renumber_map: (0..cap as i32).collect(),
            rev_renumber_map: (0..cap as i32).collect(),
            rev_gen_list,
            start: 0,
            first_xref_offset: 0,
            main_xref_offset: SENTINEL,
            first_xref_entry_offset: 0,
            file_len: 0,
            hints_shared_offset: 0,
            hintstream_len: 0,
            page_count: 0,
            pages: PageObjectsList::new(),
        }
    }
}

/// Hook for document edits that must land before a save.
pub fn finish_edit(doc: &mut Document) {
    rebalance_page_tree(doc);
}

// Rebuilding a degenerate page tree into a balanced one is not done yet;
// pages keep whatever tree shape they came with.
fn rebalance_page_tree(_doc: &mut Document) {}

fn preload_object_streams(doc: &Document) -> Result<()> {
    for num in 0..doc.xref_len() {
        if let Some(entry) = doc.entry(num) {
            if entry.is_compressed() && entry.obj.is_none() {
                return Err(Error::format(format!(
                    "object {} lives in an object stream but was never materialized",
                    num
                )));
            }
        }
    }
    Ok(())
}

/// Write one object for the given pass, recording its offset and final
/// generation number.
fn do_write_object(
    doc: &mut Document,
    state: &mut WriteState,
    out: &mut Output,
    num: i32,
    pass: i32,
) -> Result<()> {
    let Some(entry) = doc.entry(num) else {
        return Ok(());
    };
    let kind = entry.kind;
    let n = num as usize;
    state.gen_list[n] = match kind {
        EntryKind::ObjStm => 0,
        _ => entry.gen,
    };

    // renumbering already breaks encryption, so generations can be forced
    // to zero at the same time
    if state.do_garbage >= GarbageLevel::Compact {
        state.gen_list[n] = if num == 0 { 65535 } else { 0 };
    }

    if state.do_garbage != GarbageLevel::None && state.use_list[n] == 0 {
        return Ok(());
    }

    match kind {
        EntryKind::InUse | EntryKind::ObjStm => {
            if pass > 0 {
                padto(out, state.ofs_list[n])?;
            }
            if !state.do_incremental || doc.is_incremental(num) {
                state.ofs_list[n] = out.tell()?;
                let gen = state.gen_list[n];
                write_object(doc, state, out, num, gen, true)?;
            }
        }
        EntryKind::Free => {
            state.use_list[n] = 0;
        }
    }
    Ok(())
}

fn write_objects(
    doc: &mut Document,
    state: &mut WriteState,
    out: &mut Output,
    pass: i32,
) -> Result<()> {
    if !state.do_incremental {
        out.write_str(&format!(
            "%PDF-{}.{}\n",
            doc.version() / 10,
            doc.version() % 10
        ))?;
        out.write_data(b"%\xce\xbc\xe1\xbf\xa6\n\n")?;
    }

    let start = state.start;
    do_write_object(doc, state, out, start, pass)?;

    if state.do_linear {
        // the first-page xref sits right after the params object and points
        // forward at the main xref
        if pass == 0 {
            state.first_xref_offset = out.tell()?;
        } else {
            padto(out, state.first_xref_offset)?;
        }
        let len = doc.xref_len();
        let main_xref_offset = state.main_xref_offset;
        write_xref(doc, state, out, start, len, true, main_xref_offset, 0)?;
    }

    let len = doc.xref_len();
    for num in (state.start + 1)..len {
        do_write_object(doc, state, out, num, pass)?;
    }

    if state.do_linear && pass == 1 {
        let offset = if state.start == 1 {
            state.main_xref_offset
        } else {
            state.ofs_list[1] + state.hintstream_len
        };
        padto(out, offset)?;
    }

    for num in 1..state.start {
        // everything after the hint stream shifts down by its length
        if pass == 1 {
            state.ofs_list[num as usize] += state.hintstream_len;
        }
        do_write_object(doc, state, out, num, pass)?;
    }
    Ok(())
}

/// Serialize `doc` to `path`.
///
/// The whole save is driven from here: marking, garbage collection,
/// linearization, the one or two output passes, the final xref, and the
/// deferred signature patch once the file is closed.
pub fn save_document(doc: &mut Document, path: &Path, opts: &SaveOptions) -> Result<SaveStats> {
    if opts.incremental && opts.garbage != GarbageLevel::None {
        return Err(Error::argument(
            "cannot combine incremental writes with garbage collection",
        ));
    }
    if opts.incremental && opts.linear {
        return Err(Error::argument(
            "cannot combine incremental writes with linearization",
        ));
    }

    if opts.clean {
        if let Some(cleaner) = &opts.cleaner {
            cleaner.clean_pages(doc, opts.ascii)?;
        }
    }
    finish_edit(doc);

    doc.freeze_updates = true;
    let result = save_inner(doc, path, opts);
    doc.freeze_updates = false;
    result
}

fn save_inner(doc: &mut Document, path: &Path, opts: &SaveOptions) -> Result<SaveStats> {
    presize_unsaved_signature_byteranges(doc)?;

    if opts.incremental && doc.pending().is_empty() {
        // nothing changed, nothing to write
        return Ok(SaveStats::default());
    }

    let mut out = if opts.incremental {
        let mut out = Output::from_path(path, true)?;
        out.seek(SeekFrom::End(0))?;
        out.write_byte(b'\n')?;
        out
    } else {
        Output::from_path(path, false)?
    };

    let mut state = WriteState::new(doc, opts);

    if !state.do_incremental {
        preload_object_streams(doc)?;
    }

    // sweep and mark from the trailer, or keep everything
    if state.do_garbage >= GarbageLevel::Sweep || state.do_linear {
        let mut trailer = Object::Dict(std::mem::take(doc.trailer_mut()));
        let marked = mark_obj(doc, &mut state, &mut trailer);
        *doc.trailer_mut() = match trailer {
            Object::Dict(d) => d,
            _ => unreachable!(),
        };
        marked?;
    } else {
        for num in 0..doc.xref_len() as usize {
            state.use_list[num] = 1;
        }
    }

    if state.do_garbage >= GarbageLevel::Dedupe {
        remove_duplicate_objs(doc, &mut state);
    }

    if state.do_garbage >= GarbageLevel::Compact || state.do_linear {
        compact_xref(doc, &mut state);
        renumber_objs(doc, &mut state);
    }

    if state.do_linear {
        linearize(doc, &mut state)?;
    }

    if state.do_incremental {
        write_objects(doc, &mut state, &mut out, 0)?;

        let len = doc.xref_len();
        for num in 0..len {
            let n = num as usize;
            if state.use_list[n] == 0 && doc.is_incremental(num) {
                // deleted in this increment: make the slot unreusable
                state.gen_list[n] = 65535;
                state.ofs_list[n] = 0;
            }
        }
        state.first_xref_offset = out.tell()?;
        let startxref = state.first_xref_offset;
        if doc.has_xref_streams {
            write_xref_stream(doc, &mut state, &mut out, 0, len, true, 0, startxref)?;
        } else {
            write_xref(doc, &mut state, &mut out, 0, len, true, 0, startxref)?;
        }
        doc.pending_mut().end_ofs = out.tell()?;
    } else {
        write_objects(doc, &mut state, &mut out, 0)?;

        // chain the free slots together; the head keeps its 65535
        let len = doc.xref_len();
        let mut lastfree = 0usize;
        for num in 0..len as usize {
            if state.use_list[num] == 0 {
                if num == 0 {
                    state.gen_list[0] = 65535;
                } else {
                    state.gen_list[num] = state.gen_list[num].saturating_add(1);
                }
                state.ofs_list[lastfree] = num as i64;
                lastfree = num;
            }
        }

        if state.do_linear {
            state.main_xref_offset = out.tell()?;
            let (start, first_xref_offset) = (state.start, state.first_xref_offset);
            write_xref(doc, &mut state, &mut out, 0, start, false, 0, first_xref_offset)?;
            state.file_len = out.tell()?;

            make_hint_stream(doc, &mut state)?;
            state.file_len += state.hintstream_len;
            state.main_xref_offset += state.hintstream_len;
            update_linearization_params(doc, &state)?;

            out.seek(SeekFrom::Start(0))?;
            write_objects(doc, &mut state, &mut out, 1)?;
            padto(&mut out, state.main_xref_offset)?;
            write_xref(doc, &mut state, &mut out, 0, start, false, 0, first_xref_offset)?;
        } else {
            state.first_xref_offset = out.tell()?;
            let startxref = state.first_xref_offset;
            write_xref(doc, &mut state, &mut out, 0, len, true, 0, startxref)?;
        }
        doc.startxref = state.first_xref_offset;
        doc.pending_mut().end_ofs = out.tell()?;
    }

    out.close()?;
    drop(out);

    // the signer re-opens the file, so the sink must be gone by now
    complete_signatures(doc, &mut state, path)?;
    doc.clear_pending_changes();
    Ok(SaveStats {
        errors: state.errors,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_option_combinations() {
        let mut doc = test_support::minimal_doc();
        let opts = SaveOptions {
            incremental: true,
            garbage: GarbageLevel::Sweep,
            ..SaveOptions::default()
        };
        assert!(matches!(
            save_document(&mut doc, Path::new("/nonexistent/x.pdf"), &opts),
            Err(Error::Argument(_))
        ));
        let opts = SaveOptions {
            incremental: true,
            linear: true,
            ..SaveOptions::default()
        };
        assert!(matches!(
            save_document(&mut doc, Path::new("/nonexistent/x.pdf"), &opts),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_expand_flags() {
        assert!(ExpandFlags::ALL.contains(ExpandFlags::IMAGES));
        assert!(ExpandFlags::ALL.contains(ExpandFlags::FONTS));
        assert!(!ExpandFlags::IMAGES.contains(ExpandFlags::FONTS));
        assert!(ExpandFlags::NONE.is_none());
        assert_eq!(ExpandFlags::IMAGES | ExpandFlags::FONTS, ExpandFlags::ALL);
    }

    #[test]
    fn test_garbage_levels_ordered() {
        assert!(GarbageLevel::None < GarbageLevel::Sweep);
        assert!(GarbageLevel::Sweep < GarbageLevel::Compact);
        assert!(GarbageLevel::Compact < GarbageLevel::Dedupe);
        assert!(GarbageLevel::Dedupe < GarbageLevel::DedupeStreams);
    }

    #[test]
    fn test_derived_tight_flag() {
        let doc = test_support::minimal_doc();
        let opts = SaveOptions::default();
        assert!(WriteState::new(&doc, &opts).do_tight);
        let opts = SaveOptions {
            expand: ExpandFlags::ALL,
            ..SaveOptions::default()
        };
        assert!(!WriteState::new(&doc, &opts).do_tight);
        let opts = SaveOptions {
            expand: ExpandFlags::ALL,
            deflate: true,
            ..SaveOptions::default()
        };
        assert!(WriteState::new(&doc, &opts).do_tight);
    }

    #[test]
    fn test_linear_forces_sweep() {
        let doc = test_support::minimal_doc();
        let opts = SaveOptions {
            linear: true,
            ..SaveOptions::default()
        };
        assert_eq!(WriteState::new(&doc, &opts).do_garbage, GarbageLevel::Sweep);
    }
}
