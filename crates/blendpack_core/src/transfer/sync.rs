//! The sync capability the orchestrator drives, and remote addressing.

use std::fmt;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::transfer::{Result, TransferError};

/// Counters reported by one sync call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
	/// Bytes sent.
	pub bytes: u64,
	/// Files found already present and identical.
	pub checks: u64,
	/// Files sent.
	pub transfers: u64,
	/// Files that failed.
	pub errors: u64,
}

impl SyncStats {
	/// Files the call looked at, skipped or sent.
	pub fn touched(&self) -> u64 {
		self.checks + self.transfers
	}
}

impl AddAssign for SyncStats {
	fn add_assign(&mut self, other: Self) {
		self.bytes += other.bytes;
		self.checks += other.checks;
		self.transfers += other.transfers;
		self.errors += other.errors;
	}
}

/// Per-call switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
	/// Only copy the source-relative paths listed in this file.
	pub files_from: Option<PathBuf>,
	/// Source is one file and the destination is its exact remote name.
	pub single_file: bool,
	/// Compare by content hash instead of size and modification time.
	pub checksum: bool,
}

/// Failure of one sync call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyncError {
	/// Tool output or OS error.
	pub message: String,
	/// Retrying the same call may succeed.
	pub transient: bool,
}

impl SyncError {
	/// Failure worth retrying.
	pub fn transient(message: impl Into<String>) -> Self {
		Self { message: message.into(), transient: true }
	}

	/// Failure a retry cannot fix.
	pub fn fatal(message: impl Into<String>) -> Self {
		Self { message: message.into(), transient: false }
	}
}

/// Copy and move into a remote object store.
pub trait SyncTool {
	/// Copy `source` to `destination`.
	///
	/// With `single_file` the source is one file and `destination` its
	/// remote name. Otherwise the source is a folder copied under
	/// `destination`, filtered by `files_from` when set.
	fn copy(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> std::result::Result<SyncStats, SyncError>;

	/// Like [`SyncTool::copy`], removing the source once it is uploaded.
	fn move_file(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> std::result::Result<SyncStats, SyncError>;
}

/// Address in a remote store: `:s3:bucket/prefix` or `remote:bucket/prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteUri {
	backend: String,
	bucket: String,
	path: Vec<String>,
}

impl RemoteUri {
	/// Parse `[:]backend:bucket[/prefix...]`.
	pub fn parse(value: &str) -> Result<Self> {
		let invalid = || TransferError::InvalidRemote { value: value.to_owned() };
		let (on_the_fly, rest) = match value.strip_prefix(':') {
			Some(rest) => (true, rest),
			None => (false, value),
		};
		let (name, location) = rest.split_once(':').ok_or_else(invalid)?;
		if name.is_empty() || name.contains('/') {
			return Err(invalid());
		}
		let mut segments = location.split(['/', '\\']).filter(|segment| !segment.is_empty());
		let bucket = segments.next().ok_or_else(invalid)?.to_owned();
		let backend = if on_the_fly { format!(":{name}") } else { name.to_owned() };
		Ok(Self {
			backend,
			bucket,
			path: segments.map(str::to_owned).collect(),
		})
	}

	/// Backend part, `:s3` for on-the-fly remotes.
	pub fn backend(&self) -> &str {
		&self.backend
	}

	/// Bucket name.
	pub fn bucket(&self) -> &str {
		&self.bucket
	}

	/// Object path below the bucket, `/`-separated.
	pub fn key(&self) -> String {
		self.path.join("/")
	}

	/// Path segments below the bucket.
	pub fn segments(&self) -> impl Iterator<Item = &str> {
		self.path.iter().map(String::as_str)
	}

	/// Append a `/`-separated key; empty segments and separators at either end are ignored.
	pub fn join(&self, key: &str) -> Self {
		let mut joined = self.clone();
		joined.path.extend(key.split(['/', '\\']).filter(|segment| !segment.is_empty()).map(str::to_owned));
		joined
	}
}

impl fmt::Display for RemoteUri {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.backend, self.bucket)?;
		for segment in &self.path {
			write!(f, "/{segment}")?;
		}
		Ok(())
	}
}
