//! Cross-reference table
//!
//! A solid table: one slot per object number, so renumbering is a slot move
//! and the writer's parallel arrays index directly.

use crate::pdf::object::Object;

/// Type of xref entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Free object (available for reuse)
    Free,
    /// In-use object written directly in the file
    InUse,
    /// Object stored inside an object stream
    ObjStm,
}

/// One slot of the cross-reference table
#[derive(Debug, Clone)]
pub struct XrefEntry {
    pub kind: EntryKind,
    pub gen: u16,
    /// Byte offset (in-use) or object stream number (compressed)
    pub ofs: i64,
    /// The resolved object, when materialized. Stream bodies live inside
    /// `Object::Stream`.
    pub obj: Option<Object>,
}

impl XrefEntry {
    pub fn free(gen: u16) -> Self {
        Self {
            kind: EntryKind::Free,
            gen,
            ofs: 0,
            obj: None,
        }
    }

    pub fn in_use(ofs: i64, gen: u16, obj: Option<Object>) -> Self {
        Self {
            kind: EntryKind::InUse,
            gen,
            ofs,
            obj,
        }
    }

    pub fn compressed(stm_num: i64, obj: Option<Object>) -> Self {
        Self {
            kind: EntryKind::ObjStm,
            gen: 0,
            ofs: stm_num,
            obj,
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind == EntryKind::Free
    }

    pub fn is_in_use(&self) -> bool {
        self.kind == EntryKind::InUse
    }

    pub fn is_compressed(&self) -> bool {
        self.kind == EntryKind::ObjStm
    }
}

/// Cross-reference table, indexed by object number.
///
/// Slot 0 is always the head of the free list, generation 65535.
#[derive(Debug, Clone)]
pub struct XrefTable {
    entries: Vec<XrefEntry>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self {
            entries: vec![XrefEntry::free(65535)],
        }
    }

    pub fn from_entries(entries: Vec<XrefEntry>) -> Self {
        debug_assert!(!entries.is_empty());
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        // slot 0 always exists
        self.entries.len() <= 1
    }

    pub fn get(&self, num: i32) -> Option<&XrefEntry> {
        usize::try_from(num).ok().and_then(|n| self.entries.get(n))
    }

    pub fn get_mut(&mut self, num: i32) -> Option<&mut XrefEntry> {
        usize::try_from(num)
            .ok()
            .and_then(|n| self.entries.get_mut(n))
    }

    /// Allocate the next object number, with an in-use placeholder slot.
    pub fn allocate(&mut self) -> i32 {
        let num = self.entries.len() as i32;
        self.entries.push(XrefEntry::in_use(0, 0, Some(Object::Null)));
        num
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len.max(1));
    }

    pub fn entries(&self) -> &[XrefEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<XrefEntry> {
        self.entries
    }
}

impl Default for XrefTable {
    fn default() -> Self {
        Self::new()
    }
}
