mod local;
mod orchestrator;
mod rclone;
mod retry;
mod sync;

use std::path::PathBuf;

use thiserror::Error;

use crate::pack::PackError;

/// Directory-backed store for dry runs.
pub use local::LocalSync;
/// Upload sequencing.
pub use orchestrator::{Orchestrator, StepReport, UploadPlan, UploadReport, split_by_first_dir};
/// rclone-compatible subprocess backend.
pub use rclone::{RcloneSync, parse_stats};
/// Bounded retries with backoff.
pub use retry::RetryPolicy;
/// Sync capability and remote addressing.
pub use sync::{RemoteUri, SyncError, SyncOptions, SyncStats, SyncTool};

/// Transfer-local result type.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors that stop an upload.
///
/// Steps that completed before the failure stay uploaded.
#[derive(Debug, Error)]
pub enum TransferError {
	/// A sync call kept failing or failed permanently.
	#[error("{step} failed after {attempts} attempt(s): {message}")]
	StepFailed {
		/// Step label.
		step: String,
		/// Attempts made, the last one included.
		attempts: u32,
		/// Last sync error.
		message: String,
	},
	/// The cancel flag was raised between sync calls.
	#[error("upload cancelled")]
	Cancelled,
	/// Local filesystem failure while staging a step.
	#[error("io error on {}: {source}", path.display())]
	Io {
		/// Path being read or written.
		path: PathBuf,
		/// Underlying failure.
		#[source]
		source: std::io::Error,
	},
	/// Remote address is not `[:backend]:bucket/prefix`.
	#[error("invalid remote {value:?}")]
	InvalidRemote {
		/// Text as given.
		value: String,
	},
	/// Writing the manifest file failed.
	#[error(transparent)]
	Manifest(#[from] PackError),
}

impl TransferError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path: path.into(), source }
	}
}
