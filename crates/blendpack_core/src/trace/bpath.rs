//! Blender path notation: `//` document-relative paths and lexical normalization.

use std::path::{Component, Path, PathBuf};

/// Prefix marking a path relative to the owning document's folder.
pub const BLEND_RELATIVE_PREFIX: &str = "//";

/// Whether stored path bytes use `//` document-relative notation.
pub fn is_blend_relative(raw: &[u8]) -> bool {
	raw.starts_with(BLEND_RELATIVE_PREFIX.as_bytes())
}

/// Whether `text` is a Windows drive or UNC path (`C:\x`, `\\srv\share`).
pub fn is_windows_absolute(text: &str) -> bool {
	let bytes = text.as_bytes();
	let drive = bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/');
	drive || text.starts_with("\\\\")
}

/// Resolve stored path bytes against the folder of the document that owns them.
pub fn resolve(raw: &[u8], anchor: &Path) -> PathBuf {
	let text = String::from_utf8_lossy(raw);
	if let Some(rest) = text.strip_prefix(BLEND_RELATIVE_PREFIX) {
		return normalize(&anchor.join(rest.replace('\\', "/")));
	}
	if is_windows_absolute(&text) {
		return PathBuf::from(text.replace('\\', "/"));
	}
	let path = Path::new(text.as_ref());
	if path.is_absolute() {
		normalize(path)
	} else {
		normalize(&anchor.join(path))
	}
}

/// Lexically remove `.` and `..` segments without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				let popped = matches!(out.components().next_back(), Some(Component::Normal(_))) && out.pop();
				if !popped && !out.has_root() {
					out.push("..");
				}
			}
			other => out.push(other.as_os_str()),
		}
	}
	out
}

/// Make `path` absolute against the working directory, then normalize it.
pub fn absolute(path: &Path) -> PathBuf {
	normalize(&std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
}

/// Forward-slash relative path from directory key `from_dir` to key `to`.
pub fn relative_between(from_dir: &str, to: &str) -> String {
	let from: Vec<&str> = from_dir.split('/').filter(|part| !part.is_empty()).collect();
	let target: Vec<&str> = to.split('/').filter(|part| !part.is_empty()).collect();
	let common = from.iter().zip(&target).take_while(|(a, b)| a == b).count();
	let mut parts: Vec<&str> = vec![".."; from.len() - common];
	parts.extend_from_slice(&target[common..]);
	parts.join("/")
}

#[cfg(test)]
mod tests {
	use std::path::{Path, PathBuf};

	use super::{is_blend_relative, normalize, relative_between, resolve};

	#[test]
	fn blend_relative_paths_use_the_owning_folder() {
		let lib_dir = Path::new("/proj/libs");
		assert_eq!(resolve(b"//tex/wood.png", lib_dir), PathBuf::from("/proj/libs/tex/wood.png"));
		assert_eq!(resolve(b"//../shared/a.png", lib_dir), PathBuf::from("/proj/shared/a.png"));
		assert_eq!(resolve(b"//tex\\win.png", lib_dir), PathBuf::from("/proj/libs/tex/win.png"));
		assert!(is_blend_relative(b"//x"));
		assert!(!is_blend_relative(b"/x"));
	}

	#[test]
	fn absolute_and_windows_paths_are_kept() {
		let dir = Path::new("/proj");
		assert_eq!(resolve(b"/mnt/assets/./a.exr", dir), PathBuf::from("/mnt/assets/a.exr"));
		assert_eq!(resolve(b"C:\\assets\\a.exr", dir), PathBuf::from("C:/assets/a.exr"));
		assert_eq!(resolve(b"rel/a.exr", dir), PathBuf::from("/proj/rel/a.exr"));
	}

	#[test]
	fn normalize_clamps_at_root() {
		assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
		assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
	}

	#[test]
	fn relative_between_keys() {
		assert_eq!(relative_between("scenes", "textures/wood.png"), "../textures/wood.png");
		assert_eq!(relative_between("", "textures/wood.png"), "textures/wood.png");
		assert_eq!(relative_between("a/b", "a/b/c.png"), "c.png");
		assert_eq!(relative_between("a/b", "_outside_project/mnt/x.png"), "../../_outside_project/mnt/x.png");
	}
}
