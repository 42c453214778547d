//! Manifest key rules.

use std::path::Path;

use unicode_normalization::UnicodeNormalization;

/// Key prefix for files outside the project root.
pub const OUTSIDE_PROJECT: &str = "_outside_project";

/// NFC form of `text`.
pub fn nfc(text: &str) -> String {
	text.nfc().collect()
}

/// Forward slashes, no empty or `.` segments, no leading `/`, NFC.
///
/// `..` segments are kept so validation can reject them.
pub fn clean_key(raw: &str) -> String {
	let text = raw.trim().replace('\\', "/");
	let parts: Vec<&str> = text.split('/').filter(|part| !part.is_empty() && *part != ".").collect();
	nfc(&parts.join("/"))
}

/// Drive-safe relative form of an absolute path.
///
/// `/a/b` becomes `a/b`, `C:\a` becomes `C/a` and `\\srv\share\a` becomes `UNC/srv/share/a`.
pub fn outside_relpath(path: &Path) -> String {
	let text = path.to_string_lossy().replace('\\', "/");
	let bytes = text.as_bytes();
	if text.starts_with("//") {
		return clean_key(&format!("UNC/{}", text.trim_start_matches('/')));
	}
	if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
		return clean_key(&format!("{}/{}", char::from(bytes[0].to_ascii_uppercase()), &text[2..]));
	}
	clean_key(&text)
}

/// Whether `path` lies strictly inside `root`.
pub fn is_inside(path: &Path, root: &Path) -> bool {
	path.strip_prefix(root).is_ok_and(|rel| !rel.as_os_str().is_empty())
}

/// Manifest key of `path`: root-relative when inside `root`, else under `_outside_project/`.
pub fn key_for(path: &Path, root: &Path) -> String {
	match path.strip_prefix(root) {
		Ok(rel) if !rel.as_os_str().is_empty() => clean_key(&rel.to_string_lossy()),
		_ => format!("{OUTSIDE_PROJECT}/{}", outside_relpath(path)),
	}
}

/// Manifest key of the main document.
///
/// `expected` wins when present. Otherwise the candidate with the same file
/// name outside `_outside_project/` with the fewest segments, then the
/// shortest, then the lexically first.
pub fn select_main_key<'k>(expected: &str, keys: impl IntoIterator<Item = &'k str>) -> Option<String> {
	let name = expected.rsplit('/').next().unwrap_or(expected);
	let outside = format!("{OUTSIDE_PROJECT}/");
	let mut best: Option<&str> = None;
	for key in keys {
		if key == expected {
			return Some(key.to_owned());
		}
		if key.starts_with(&outside) || key.rsplit('/').next() != Some(name) {
			continue;
		}
		let rank = |key: &str| (key.split('/').count(), key.len(), key.to_owned());
		if best.is_none_or(|current| rank(key) < rank(current)) {
			best = Some(key);
		}
	}
	best.map(str::to_owned)
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use super::{clean_key, is_inside, key_for, outside_relpath, select_main_key};

	#[test]
	fn keys_are_clean_relative_and_nfc() {
		assert_eq!(clean_key(" ./tex\\wood.png "), "tex/wood.png");
		assert_eq!(clean_key("/a//b/./c"), "a/b/c");
		assert_eq!(clean_key("Cafe\u{301}/x.png"), "Caf\u{e9}/x.png");
		assert_eq!(clean_key("a/../b"), "a/../b");
	}

	#[test]
	fn outside_paths_are_drive_safe() {
		assert_eq!(outside_relpath(Path::new("/mnt/lib/a.png")), "mnt/lib/a.png");
		assert_eq!(outside_relpath(Path::new("C:/assets/a.png")), "C/assets/a.png");
		assert_eq!(outside_relpath(Path::new("c:\\assets\\a.png")), "C/assets/a.png");
		assert_eq!(outside_relpath(Path::new("//srv/share/a.png")), "UNC/srv/share/a.png");
	}

	#[test]
	fn keys_depend_on_the_root_side() {
		let root = Path::new("/proj");
		assert_eq!(key_for(Path::new("/proj/tex/a.png"), root), "tex/a.png");
		assert_eq!(key_for(Path::new("/lib/a.png"), root), "_outside_project/lib/a.png");
		assert_eq!(key_for(Path::new("/project2/a.png"), root), "_outside_project/project2/a.png");
		assert!(is_inside(Path::new("/proj/a"), root));
		assert!(!is_inside(root, root));
	}

	#[test]
	fn main_key_prefers_expected_then_shallowest_then_shortest() {
		let keys = ["deep/dir/main.blend", "_outside_project/main.blend", "ab/main.blend", "a/main.blend", "tex/a.png"];
		assert_eq!(select_main_key("shots/main.blend", keys).as_deref(), Some("a/main.blend"));
		assert_eq!(select_main_key("deep/dir/main.blend", keys).as_deref(), Some("deep/dir/main.blend"));
		assert_eq!(select_main_key("shots/other.blend", keys), None);
	}
}
