mod access;
mod bhead;
mod block;
mod bytes;
mod compression;
mod decl;
mod dna;
mod error;
mod file;
mod header;
mod pointer;
mod version;

/// Block view, field paths and list/array iterators.
pub use access::{Block, FieldPath, FieldSpan, ListIter, PtrArrayIter};
/// Parsed block header record.
pub use bhead::BHead;
/// Block records and iterator.
pub use block::{BlockIter, BlockRecord};
/// Compression detection result.
pub use compression::Compression;
/// SDNA schema and derived struct layouts.
pub use dna::{Dna, DnaField, DnaStruct, FieldKind, FieldLayout, Layouts, ResolvedField, StructLayout};
/// Error and result aliases.
pub use error::{BlendError, Result};
/// Opened document.
pub use file::BlendFile;
/// File header representation.
pub use header::{BlendHeader, Endianness};
/// Old-address index.
pub use pointer::PointerIndex;
/// Version-gated field renames.
pub use version::{FIELD_GATES, FieldGate, FieldGates};
