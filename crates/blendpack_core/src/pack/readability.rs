//! Probing dependency files on disk.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Result of probing one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum FileStatus {
	/// Opened and read.
	Ok,
	/// Not on disk. Empty directories count as missing.
	Missing,
	/// Present but not readable, with the OS error.
	Unreadable(String),
}

impl FileStatus {
	/// Whether the file can be uploaded.
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Ok)
	}
}

/// Open `path` and read one byte.
pub fn probe(path: &Path) -> FileStatus {
	if path.is_dir() {
		return FileStatus::Missing;
	}
	let result = File::open(path).and_then(|mut file| file.read(&mut [0u8; 1]));
	match result {
		Ok(_) => FileStatus::Ok,
		Err(err) if err.kind() == ErrorKind::NotFound => FileStatus::Missing,
		Err(err) => FileStatus::Unreadable(err.to_string()),
	}
}

/// Probe results cached per path for one pack run.
#[derive(Debug, Default)]
pub struct ReadabilityCache {
	seen: HashMap<PathBuf, FileStatus>,
}

impl ReadabilityCache {
	/// Empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Status of `path`, probing it on first use.
	pub fn check(&mut self, path: &Path) -> FileStatus {
		self.seen.entry(path.to_path_buf()).or_insert_with(|| probe(path)).clone()
	}
}
