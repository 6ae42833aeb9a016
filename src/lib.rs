//! pdfwrite - a native Rust PDF writer core
//!
//! This library serializes an in-memory PDF document model (a cross-reference
//! table of numbered objects plus a trailer dictionary) back to a file. On
//! the way out it can garbage-collect unreachable objects, coalesce
//! duplicates, compact and renumber the xref, recompress streams, append
//! incremental updates, and produce fast-web-view (linearized) output with a
//! primary hint stream.
//!
//! # Modules
//!
//! - `fitz` - Core infrastructure: errors, the output sink, bit packing
//! - `pdf` - The object model, xref, document and the writer itself
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfwrite::pdf::document::Document;
//! use pdfwrite::pdf::write::{save_document, GarbageLevel, SaveOptions};
//!
//! let mut doc = Document::new(17);
//! // ... populate objects and the trailer ...
//! let opts = SaveOptions { garbage: GarbageLevel::Compact, ..SaveOptions::default() };
//! save_document(&mut doc, "out.pdf".as_ref(), &opts)?;
//! ```

pub mod fitz;
pub mod pdf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
