//! A local folder standing in for the remote store.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::transfer::{RemoteUri, SyncError, SyncOptions, SyncStats, SyncTool};

/// Maps `backend:bucket/key` to `<root>/bucket/key`.
///
/// Files already present with identical content are counted as checks and
/// left alone, so repeated uploads only send what changed.
#[derive(Debug, Clone)]
pub struct LocalSync {
	root: PathBuf,
}

impl LocalSync {
	/// Store rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Local path a remote address maps to.
	pub fn path_of(&self, remote: &RemoteUri) -> PathBuf {
		let mut path = self.root.join(remote.bucket());
		path.extend(remote.segments());
		path
	}

	fn listing(source: &Path, options: &SyncOptions) -> Result<Vec<String>, SyncError> {
		if let Some(list) = &options.files_from {
			let text = fs::read_to_string(list).map_err(|err| SyncError::fatal(format!("cannot read {}: {err}", list.display())))?;
			return Ok(text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_owned).collect());
		}
		let mut keys = Vec::new();
		for entry in WalkDir::new(source).sort_by_file_name() {
			let entry = entry.map_err(|err| SyncError::fatal(err.to_string()))?;
			if entry.file_type().is_file()
				&& let Ok(relative) = entry.path().strip_prefix(source)
			{
				keys.push(relative.to_string_lossy().replace('\\', "/"));
			}
		}
		Ok(keys)
	}

	fn transfer(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Result<(SyncStats, Vec<PathBuf>), SyncError> {
		let target = self.path_of(destination);
		if options.single_file {
			let stats = put(source, &target).map_err(|err| SyncError::fatal(format!("{}: {err}", source.display())))?;
			return Ok((stats, vec![source.to_path_buf()]));
		}

		let mut stats = SyncStats::default();
		let mut sent = Vec::new();
		for key in Self::listing(source, options)? {
			let from = source.join(&key);
			match put(&from, &target.join(&key)) {
				Ok(file) => {
					stats += file;
					sent.push(from);
				}
				Err(err) => {
					warn!(path = %from.display(), error = %err, "local sync skipped file");
					stats.errors += 1;
				}
			}
		}
		Ok((stats, sent))
	}
}

impl SyncTool for LocalSync {
	fn copy(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Result<SyncStats, SyncError> {
		self.transfer(source, destination, options).map(|(stats, _)| stats)
	}

	fn move_file(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Result<SyncStats, SyncError> {
		let (stats, sent) = self.transfer(source, destination, options)?;
		for path in sent {
			fs::remove_file(&path).map_err(|err| SyncError::fatal(format!("cannot remove {}: {err}", path.display())))?;
		}
		Ok(stats)
	}
}

/// Copy one file unless `to` already holds the same bytes.
fn put(from: &Path, to: &Path) -> io::Result<SyncStats> {
	let size = fs::metadata(from)?.len();
	if let Ok(existing) = fs::metadata(to)
		&& existing.len() == size
		&& digest(from)? == digest(to)?
	{
		debug!(path = %to.display(), "identical, skipped");
		return Ok(SyncStats { checks: 1, ..SyncStats::default() });
	}
	if let Some(parent) = to.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::copy(from, to)?;
	Ok(SyncStats {
		bytes: size,
		transfers: 1,
		..SyncStats::default()
	})
}

fn digest(path: &Path) -> io::Result<blake3::Hash> {
	let mut hasher = blake3::Hasher::new();
	io::copy(&mut File::open(path)?, &mut hasher)?;
	Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::LocalSync;
	use crate::transfer::{RemoteUri, SyncOptions, SyncStats, SyncTool};

	fn single() -> SyncOptions {
		SyncOptions { single_file: true, ..SyncOptions::default() }
	}

	#[test]
	fn repeated_copies_skip_identical_files() {
		let dir = TempDir::new().expect("tempdir");
		let source = dir.path().join("main.blend");
		fs::write(&source, b"BLENDER").expect("write");
		let store = LocalSync::new(dir.path().join("store"));
		let remote = RemoteUri::parse(":s3:bucket/p1/main.blend").expect("valid remote");

		let first = store.copy(&source, &remote, &single()).expect("copies");
		assert_eq!(first, SyncStats { bytes: 7, checks: 0, transfers: 1, errors: 0 });
		assert_eq!(fs::read(dir.path().join("store/bucket/p1/main.blend")).expect("uploaded"), b"BLENDER");

		let second = store.copy(&source, &remote, &single()).expect("copies");
		assert_eq!(second, SyncStats { bytes: 0, checks: 1, transfers: 0, errors: 0 });

		fs::write(&source, b"BLENDEX").expect("write");
		let third = store.copy(&source, &remote, &single()).expect("copies");
		assert_eq!(third.transfers, 1, "same size, different content");
	}

	#[test]
	fn files_from_limits_a_folder_copy_and_counts_absent_entries() {
		let dir = TempDir::new().expect("tempdir");
		let project = dir.path().join("proj");
		fs::create_dir_all(project.join("tex")).expect("mkdir");
		fs::write(project.join("tex/a.png"), b"a").expect("write");
		fs::write(project.join("tex/b.png"), b"bb").expect("write");
		let list = dir.path().join("list.txt");
		fs::write(&list, "tex/a.png\ntex/gone.png\n").expect("write");

		let store = LocalSync::new(dir.path().join("store"));
		let remote = RemoteUri::parse(":s3:bucket/p1").expect("valid remote");
		let options = SyncOptions {
			files_from: Some(list),
			..SyncOptions::default()
		};
		let stats = store.copy(&project, &remote, &options).expect("copies");
		assert_eq!(stats, SyncStats { bytes: 1, checks: 0, transfers: 1, errors: 1 });
		assert!(dir.path().join("store/bucket/p1/tex/a.png").is_file());
		assert!(!dir.path().join("store/bucket/p1/tex/b.png").exists());
	}

	#[test]
	fn move_removes_the_source() {
		let dir = TempDir::new().expect("tempdir");
		let source = dir.path().join("manifest.txt");
		fs::write(&source, "main.blend\n").expect("write");
		let store = LocalSync::new(dir.path().join("store"));
		let remote = RemoteUri::parse(":s3:bucket/p1/manifest.txt").expect("valid remote");

		store.move_file(&source, &remote, &single()).expect("moves");
		assert!(!source.exists());
		assert_eq!(fs::read_to_string(dir.path().join("store/bucket/p1/manifest.txt")).expect("uploaded"), "main.blend\n");
	}
}
