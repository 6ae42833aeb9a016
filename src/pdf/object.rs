//! PDF object types

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Interned Name implementation
// ============================================================================

/// Interned PDF Name with shared storage
///
/// PDF names repeat constantly (Type, Length, Filter, ...). This uses
/// `Arc<str>` for zero-copy cloning, with the names the writer touches
/// pre-interned for pointer-equality comparison.
#[derive(Debug, Clone, Eq)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(s: &str) -> Self {
        if let Some(interned) = Self::get_interned(s) {
            return interned;
        }
        Self(Arc::from(s))
    }

    pub fn from_string(s: String) -> Self {
        if let Some(interned) = Self::get_interned(&s) {
            return interned;
        }
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is a pre-interned name (cheap pointer comparison)
    pub fn is_interned(&self) -> bool {
        COMMON_NAMES
            .iter()
            .any(|(_, arc)| Arc::ptr_eq(&self.0, arc))
    }

    fn get_interned(s: &str) -> Option<Self> {
        COMMON_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, arc)| Self(Arc::clone(arc)))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.as_ref() == other.0.as_ref()
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

use std::sync::LazyLock;

/// Names the writer deals in, pre-interned for fast comparison
static COMMON_NAMES: LazyLock<Vec<(&'static str, Arc<str>)>> = LazyLock::new(|| {
    [
        // Document structure
        "Type", "Subtype", "Length", "Filter", "DecodeParms", "Parent", "Kids", "Count",
        // Trailer
        "Root", "Info", "ID", "Size", "Prev", "Encrypt",
        // Catalogue
        "Catalog", "Pages", "Page", "Names", "Dests", "Outlines", "PageMode", "UseOutlines",
        // Page attributes
        "Resources", "Contents", "MediaBox", "CropBox", "BleedBox", "TrimBox", "ArtBox", "Rotate",
        // Resource sub-dictionaries
        "ExtGState", "ColorSpace", "Pattern", "Shading", "XObject", "Font", "ProcSet", "Properties",
        // Streams and filters
        "FlateDecode", "ASCIIHexDecode", "DCTDecode", "CCITTFaxDecode", "RunLengthDecode",
        "JBIG2Decode", "JPXDecode", "LZWDecode",
        // Image / font stream detection
        "Image", "Width", "Height", "FontDescriptor", "Length1", "Length2", "Length3",
        "Type1C", "CIDFontType0C",
        // Cross reference
        "XRef", "ObjStm", "Index", "W",
        // Linearization
        "Linearized", "L", "H", "O", "E", "N", "T", "S", "P",
        // Signatures
        "ByteRange", "V", "FT", "Sig", "AcroForm", "Fields",
    ]
    .iter()
    .map(|&name| (name, Arc::from(name)))
    .collect()
});

// ============================================================================
// Strings, references, dictionaries
// ============================================================================

/// A PDF string: raw bytes, not necessarily text
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(Vec<u8>);

impl PdfString {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

/// An indirect reference: `num gen R`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub num: i32,
    pub gen: u16,
}

impl ObjRef {
    pub fn new(num: i32, gen: u16) -> Self {
        Self { num, gen }
    }
}

/// An insertion-ordered dictionary.
///
/// Key order is preserved so that re-serializing an object is byte-stable
/// (the two-pass linearized write depends on it) and so that the signature
/// patcher can rely on `/ByteRange` preceding `/Contents` preceding
/// `/Filter` in the emitted bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(Name, Object)>,
}

impl Dict {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, preserving the position of an existing key.
    pub fn put<N: Into<Name>>(&mut self, key: N, value: Object) {
        let key = key.into();
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        let idx = self.entries.iter().position(|(k, _)| k.as_str() == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn key_at(&self, idx: usize) -> &Name {
        &self.entries[idx].0
    }

    pub fn value_at(&self, idx: usize) -> &Object {
        &self.entries[idx].1
    }

    pub fn value_at_mut(&mut self, idx: usize) -> &mut Object {
        &mut self.entries[idx].1
    }
}

pub type Array = Vec<Object>;

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Object {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Array(Array),
    Dict(Dict),
    /// A stream. `data` is `None` while the body has not been attached yet
    /// (distinct from an attached empty body).
    Stream {
        dict: Dict,
        data: Option<Bytes>,
    },
    Ref(ObjRef),
}

impl Object {
    pub fn name(s: &str) -> Self {
        Object::Name(Name::new(s))
    }

    pub fn string(bytes: &[u8]) -> Self {
        Object::String(PdfString::new(bytes.to_vec()))
    }

    pub fn reference(num: i32) -> Self {
        Object::Ref(ObjRef::new(num, 0))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self, Object::Ref(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Object::Stream { .. })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            Object::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Object::Dict(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_ref_obj(&self) -> Option<ObjRef> {
        match self {
            Object::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// True when the dictionary's `/Type` is the given name.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.as_dict()
            .and_then(|d| d.get("Type"))
            .and_then(|t| t.as_name())
            .map(|n| n.as_str() == type_name)
            .unwrap_or(false)
    }
}
