mod archive;
mod job;
mod keys;
mod manifest;
mod plan;
mod readability;
mod rewrite;
mod root;
mod validate;

use std::path::PathBuf;

use thiserror::Error;

use crate::blend::BlendError;
use crate::trace::TraceError;

/// Zip archive mode.
pub use archive::{ArchiveSummary, archive_plan, is_store_only, write_archive};
/// Job-registration payload.
pub use job::{JobPayload, JobSettings, JobTarget};
/// Manifest key rules.
pub use keys::{OUTSIDE_PROJECT, clean_key, is_inside, key_for, nfc, outside_relpath, select_main_key};
/// Manifest file IO.
pub use manifest::{read_manifest, render_manifest, write_manifest};
/// Pack planning.
pub use plan::{ManifestEntry, PackOptions, PackPlan, build_plan};
/// File probing.
pub use readability::{FileStatus, ReadabilityCache, probe};
/// Document path rewrites.
pub use rewrite::{SlotPatch, patch_bytes, rewrite_value};
/// Project-root inference.
pub use root::{RootDecision, RootSource, decide_root, drive_tag, infer_project_root, is_filesystem_root};
/// Pre-upload validation.
pub use validate::{
	IssueCode, ManifestValidation, ManifestValidationStats, ValidationDetails, ValidationIssue, ValidationReport, ValidationStats,
	validate_manifest_entries, validate_project_upload,
};

/// Pack-local result type.
pub type Result<T> = std::result::Result<T, PackError>;

/// Errors that stop planning, rewriting or archiving.
///
/// Missing and unreadable dependencies are data on the plan, not errors.
#[derive(Debug, Error)]
pub enum PackError {
	/// The trace that feeds the plan failed.
	#[error(transparent)]
	Trace(#[from] TraceError),
	/// Filesystem failure on a specific path.
	#[error("io error on {}: {source}", path.display())]
	Io {
		/// Path being read or written.
		path: PathBuf,
		/// Underlying failure.
		#[source]
		source: std::io::Error,
	},
	/// A rewritten path does not fit its char-array field.
	#[error("rewritten path {value:?} does not fit {capacity} bytes in {}", doc.display())]
	RewriteTooLong {
		/// Document being rewritten.
		doc: PathBuf,
		/// New path value.
		value: String,
		/// Field capacity including the terminator.
		capacity: usize,
	},
	/// Writing the zip archive failed.
	#[error("archive {}: {source}", path.display())]
	Archive {
		/// Archive path.
		path: PathBuf,
		/// Zip writer failure.
		#[source]
		source: zip::result::ZipError,
	},
	/// The cancel flag was raised while planning.
	#[error("pack cancelled")]
	Cancelled,
	/// A document could not be re-read for rewriting.
	#[error("cannot read document {}: {source}", path.display())]
	Blend {
		/// Document path.
		path: PathBuf,
		/// Reader failure.
		#[source]
		source: BlendError,
	},
}

impl PackError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path: path.into(), source }
	}
}
