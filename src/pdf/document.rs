//! PDF document
//!
//! Owns the cross-reference table, the trailer dictionary and the pending
//! incremental section. Objects are created and edited through this API;
//! `pdf::write::save_document` serializes the result.

use crate::fitz::error::{Error, Result};
use crate::pdf::filter::decode_stream;
use crate::pdf::object::{Dict, Object};
use crate::pdf::xref::{XrefEntry, XrefTable};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::path::Path;

static NULL_OBJ: Object = Object::Null;

/// Produces the cryptographic digest for a signature field after the file
/// bytes are final. Opaque to the writer.
pub trait Signer {
    fn write_digest(
        &self,
        path: &Path,
        byte_range: &[(i64, i64)],
        contents_ofs: i64,
        contents_len: i64,
    ) -> Result<()>;
}

/// A signature field whose byte range and digest still have to be patched
/// into the saved file.
pub struct UnsavedSig {
    /// Object number of the signature field dictionary
    pub field: i32,
    pub signer: Box<dyn Signer>,
    pub(crate) byte_range_start: i64,
    pub(crate) byte_range_end: i64,
    pub(crate) contents_start: i64,
    pub(crate) contents_end: i64,
}

/// Objects touched since the last save, plus the signatures awaiting
/// completion. An incremental save appends exactly this set.
#[derive(Default)]
pub struct IncrementalSection {
    pub(crate) changed: BTreeSet<i32>,
    pub(crate) unsaved_sigs: Vec<UnsavedSig>,
    pub(crate) end_ofs: i64,
}

impl IncrementalSection {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.unsaved_sigs.is_empty()
    }
}

/// An in-memory PDF document
pub struct Document {
    version: i32,
    xref: XrefTable,
    trailer: Dict,
    pub(crate) has_xref_streams: bool,
    pub(crate) startxref: i64,
    pub(crate) freeze_updates: bool,
    pub(crate) resources_localised: bool,
    pub(crate) pending: IncrementalSection,
}

impl Document {
    /// Create an empty document. `version` is the PDF version times ten,
    /// e.g. 17 for PDF 1.7.
    pub fn new(version: i32) -> Self {
        Self {
            version,
            xref: XrefTable::new(),
            trailer: Dict::new(),
            has_xref_streams: false,
            startxref: 0,
            freeze_updates: false,
            resources_localised: false,
            pending: IncrementalSection::default(),
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Whether the document originally used cross-reference streams; an
    /// incremental save then appends an xref stream instead of a classic
    /// table.
    pub fn set_has_xref_streams(&mut self, value: bool) {
        self.has_xref_streams = value;
    }

    pub fn startxref(&self) -> i64 {
        self.startxref
    }

    pub fn set_startxref(&mut self, ofs: i64) {
        self.startxref = ofs;
    }

    // ------------------------------------------------------------------
    // xref access
    // ------------------------------------------------------------------

    pub fn xref_len(&self) -> i32 {
        self.xref.len() as i32
    }

    pub fn entry(&self, num: i32) -> Option<&XrefEntry> {
        self.xref.get(num)
    }

    pub fn entry_mut(&mut self, num: i32) -> Option<&mut XrefEntry> {
        self.xref.get_mut(num)
    }

    pub(crate) fn replace_xref(&mut self, entries: Vec<XrefEntry>) {
        self.xref = XrefTable::from_entries(entries);
    }

    /// Take the whole table for a rebuild, leaving a fresh empty one behind.
    pub(crate) fn take_xref_entries(&mut self) -> Vec<XrefEntry> {
        std::mem::take(&mut self.xref).into_entries()
    }

    // ------------------------------------------------------------------
    // object access and editing
    // ------------------------------------------------------------------

    pub fn object(&self, num: i32) -> Option<&Object> {
        self.xref.get(num).and_then(|e| e.obj.as_ref())
    }

    pub fn object_mut(&mut self, num: i32) -> Option<&mut Object> {
        self.xref.get_mut(num).and_then(|e| e.obj.as_mut())
    }

    /// Temporarily take an object out of its slot for a mutating traversal.
    /// Pair with [`Document::put_object`].
    pub(crate) fn take_object(&mut self, num: i32) -> Option<Object> {
        self.xref.get_mut(num).and_then(|e| e.obj.take())
    }

    pub(crate) fn put_object(&mut self, num: i32, obj: Object) {
        if let Some(entry) = self.xref.get_mut(num) {
            entry.obj = Some(obj);
        }
    }

    /// Allocate a new object number.
    pub fn create_object(&mut self) -> i32 {
        let num = self.xref.allocate();
        self.pending.changed.insert(num);
        num
    }

    /// Replace the object stored under `num`.
    pub fn update_object(&mut self, num: i32, obj: Object) -> Result<()> {
        if self.freeze_updates {
            return Err(Error::generic("document is frozen during save"));
        }
        self.update_object_raw(num, obj)
    }

    pub(crate) fn update_object_raw(&mut self, num: i32, obj: Object) -> Result<()> {
        let entry = self
            .xref
            .get_mut(num)
            .ok_or_else(|| Error::argument(format!("object {} not in xref", num)))?;
        entry.kind = crate::pdf::xref::EntryKind::InUse;
        entry.obj = Some(obj);
        self.pending.changed.insert(num);
        Ok(())
    }

    /// Attach a body to the stream object `num`. With `compressed` false the
    /// data is raw: any `/Filter` and `/DecodeParms` are dropped. `/Length`
    /// is updated either way.
    pub fn update_stream(&mut self, num: i32, data: Bytes, compressed: bool) -> Result<()> {
        if self.freeze_updates {
            return Err(Error::generic("document is frozen during save"));
        }
        self.update_stream_raw(num, data, compressed)
    }

    pub(crate) fn update_stream_raw(
        &mut self,
        num: i32,
        data: Bytes,
        compressed: bool,
    ) -> Result<()> {
        let len = data.len() as i64;
        let obj = self
            .object_mut(num)
            .ok_or_else(|| Error::argument(format!("object {} not loaded", num)))?;
        match obj {
            Object::Stream { dict, data: body } => {
                *body = Some(data);
                if !compressed {
                    dict.remove("Filter");
                    dict.remove("DecodeParms");
                }
                dict.put("Length", Object::Int(len));
            }
            Object::Dict(dict) => {
                let mut dict = std::mem::take(dict);
                if !compressed {
                    dict.remove("Filter");
                    dict.remove("DecodeParms");
                }
                dict.put("Length", Object::Int(len));
                *obj = Object::Stream {
                    dict,
                    data: Some(data),
                };
            }
            _ => return Err(Error::argument(format!("object {} is not a stream", num))),
        }
        self.pending.changed.insert(num);
        Ok(())
    }

    // ------------------------------------------------------------------
    // resolution
    // ------------------------------------------------------------------

    /// Follow indirect references to the target object. Unresolvable
    /// references yield null.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut cur = obj;
        // reference chains are rare and never deep in sane files
        for _ in 0..32 {
            match cur {
                Object::Ref(r) => match self.object(r.num) {
                    Some(target) => cur = target,
                    None => return &NULL_OBJ,
                },
                _ => return cur,
            }
        }
        &NULL_OBJ
    }

    pub fn resolve_num(&self, num: i32) -> Option<&Object> {
        let obj = self.object(num)?;
        match obj {
            Object::Ref(_) => {
                let r = self.resolve(obj);
                if r.is_null() {
                    None
                } else {
                    Some(r)
                }
            }
            _ => Some(obj),
        }
    }

    pub fn is_stream(&self, num: i32) -> bool {
        self.resolve_num(num).map(Object::is_stream).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // stream loading
    // ------------------------------------------------------------------

    /// Load the raw (still filtered) stream body. The original identity
    /// selects the pre-renumber slot when bodies live in an external file;
    /// the in-memory model stores bodies with the entry, so the current
    /// number is authoritative.
    pub fn load_raw_stream(
        &self,
        num: i32,
        _gen: u16,
        _orig_num: i32,
        _orig_gen: u16,
    ) -> Result<Bytes> {
        match self.resolve_num(num) {
            Some(Object::Stream { data, .. }) => Ok(data.clone().unwrap_or_default()),
            Some(_) => Err(Error::argument(format!("object {} is not a stream", num))),
            None => Err(Error::argument(format!("object {} not loaded", num))),
        }
    }

    /// Load a stream body with its filter chain undone. With `truncated`
    /// supplied, damage yields the salvageable prefix and sets the flag.
    pub fn load_stream_decoded(
        &self,
        num: i32,
        _gen: u16,
        _orig_num: i32,
        _orig_gen: u16,
        truncated: Option<&mut bool>,
    ) -> Result<Vec<u8>> {
        match self.resolve_num(num) {
            Some(Object::Stream { dict, data }) => {
                let raw = data.clone().unwrap_or_default();
                decode_stream(dict, &raw, truncated)
            }
            Some(_) => Err(Error::argument(format!("object {} is not a stream", num))),
            None => Err(Error::argument(format!("object {} not loaded", num))),
        }
    }

    // ------------------------------------------------------------------
    // trailer
    // ------------------------------------------------------------------

    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dict {
        &mut self.trailer
    }

    // ------------------------------------------------------------------
    // incremental bookkeeping
    // ------------------------------------------------------------------

    /// True when `num` was touched since the last save and so belongs to the
    /// pending incremental section.
    pub fn is_incremental(&self, num: i32) -> bool {
        self.pending.changed.contains(&num)
    }

    pub fn pending(&self) -> &IncrementalSection {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut IncrementalSection {
        &mut self.pending
    }

    pub(crate) fn clear_pending_changes(&mut self) {
        self.pending.changed.clear();
    }

    /// Register a signature field for deferred byte-range and digest
    /// patching after the next incremental save. The field and its value
    /// dictionary count as edited.
    pub fn add_unsaved_signature(&mut self, field: i32, signer: Box<dyn Signer>) {
        self.pending.changed.insert(field);
        if let Some(vnum) = self.signature_value_num(field) {
            self.pending.changed.insert(vnum);
        }
        self.pending.unsaved_sigs.push(UnsavedSig {
            field,
            signer,
            byte_range_start: 0,
            byte_range_end: 0,
            contents_start: 0,
            contents_end: 0,
        });
    }

    /// Object number whose serialization holds the field's `/V` dictionary
    /// (the field itself when `/V` is direct).
    pub(crate) fn signature_value_num(&self, field: i32) -> Option<i32> {
        let field_obj = self.object(field)?;
        match field_obj.as_dict()?.get("V") {
            Some(Object::Ref(r)) => Some(r.num),
            Some(_) => Some(field),
            None => None,
        }
    }
}
