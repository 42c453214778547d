//! Manifest file: one UTF-8 key per line.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::pack::{PackError, Result};

/// Sorted, de-duplicated keys, each terminated by `\n`.
pub fn render_manifest<S: AsRef<str>>(keys: &[S]) -> String {
	let keys: BTreeSet<&str> = keys.iter().map(AsRef::as_ref).filter(|key| !key.is_empty()).collect();
	keys.into_iter().flat_map(|key| [key, "\n"]).collect()
}

/// Write the manifest atomically: a temp file in the same folder renamed over `path`.
///
/// Missing parent folders are created.
pub fn write_manifest<S: AsRef<str>>(path: &Path, keys: &[S]) -> Result<()> {
	let dir = match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};
	fs::create_dir_all(dir).map_err(|err| PackError::io(dir, err))?;
	let text = render_manifest(keys);
	let mut tmp = NamedTempFile::new_in(dir).map_err(|err| PackError::io(dir, err))?;
	tmp.write_all(text.as_bytes()).map_err(|err| PackError::io(tmp.path(), err))?;
	tmp.persist(path).map_err(|err| PackError::io(path, err.error))?;
	info!(path = %path.display(), entries = text.lines().count(), "wrote manifest");
	Ok(())
}

/// Non-empty lines of a manifest file, as stored.
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
	let text = fs::read_to_string(path).map_err(|err| PackError::io(path, err))?;
	Ok(text.lines().map(|line| line.trim_end_matches('\r')).filter(|line| !line.trim().is_empty()).map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::{read_manifest, render_manifest, write_manifest};

	#[test]
	fn manifest_text_is_sorted_unique_and_newline_terminated() {
		assert_eq!(render_manifest(&["b/x.png", "a.blend", "b/x.png"]), "a.blend\nb/x.png\n");
		assert_eq!(render_manifest::<&str>(&[]), "");
	}

	#[test]
	fn write_replaces_existing_manifest() {
		let dir = TempDir::new().expect("tempdir");
		let path = dir.path().join("manifest.txt");
		std::fs::write(&path, "stale\n").expect("seed");
		write_manifest(&path, &["tex/a.png", "main.blend"]).expect("writes");
		assert_eq!(std::fs::read_to_string(&path).expect("reads"), "main.blend\ntex/a.png\n");
		assert_eq!(read_manifest(&path).expect("reads"), ["main.blend", "tex/a.png"]);
		assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 1, "no temp file left behind");
	}

	#[test]
	fn write_creates_missing_folders() {
		let dir = TempDir::new().expect("tempdir");
		let path = dir.path().join("out/nested/manifest.txt");
		write_manifest(&path, &["main.blend"]).expect("writes");
		assert_eq!(std::fs::read_to_string(&path).expect("reads"), "main.blend\n");
	}
}
