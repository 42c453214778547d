/// Blender `//` path notation and lexical normalization.
pub mod bpath;
/// Enum and flag values read from documents.
pub mod cdefs;
mod expand;
/// Sequence, UDIM and cache-directory expansion.
pub mod sequence;
mod session;
mod usage;
mod walk;

use std::path::PathBuf;

use thiserror::Error;

use crate::blend::BlendError;

/// Per-type expanders and placeholder resolution.
pub use expand::{BlockKind, CollectionWalk, Concrete, Expansion, StripIter, expand, resolve_concrete};
/// Document table and field-read context.
pub use session::{BlockKey, DocId, Session, TraceCtx};
/// File usages found on blocks.
pub use usage::{AssetKind, PathSlot, SlotStyle, Usage, collect, is_packed, library_path};
/// Graph walk entry point.
pub use walk::{TraceOptions, TraceReport, TraceRoots, trace};

/// Trace-local result type.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that stop a trace.
///
/// Unreadable libraries and absent fields are recorded or logged instead.
#[derive(Debug, Error)]
pub enum TraceError {
	/// The main document could not be opened.
	#[error("cannot read main document {}: {source}", path.display())]
	MainDocument {
		/// Main document path as given.
		path: PathBuf,
		/// Reader failure.
		#[source]
		source: BlendError,
	},
	/// The cancel flag was raised during the walk.
	#[error("trace cancelled")]
	Cancelled,
}
