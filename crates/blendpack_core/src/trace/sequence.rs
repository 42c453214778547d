//! Expansion of frame sequences, UDIM tile sets and cache directories into files.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Token Blender writes in place of a UDIM tile number.
pub const UDIM_TOKEN: &str = "<UDIM>";
const FIRST_UDIM_TILE: u32 = 1001;

/// Lazily expanded files of one pattern path.
///
/// When nothing matches, the pattern path itself is yielded once so callers
/// can report it as missing.
pub struct SequenceFiles {
	inner: Box<dyn Iterator<Item = PathBuf>>,
	fallback: Option<PathBuf>,
}

impl Iterator for SequenceFiles {
	type Item = PathBuf;

	fn next(&mut self) -> Option<Self::Item> {
		match self.inner.next() {
			Some(path) => {
				self.fallback = None;
				Some(path)
			}
			None => self.fallback.take(),
		}
	}
}

/// Expand a sequence path into the concrete files on disk.
///
/// * `<UDIM>` becomes `*`, each `#` matches one digit and `*` globs one directory.
/// * A directory expands recursively.
/// * Otherwise trailing frame digits are stripped from the stem and `stem*suffix` is matched.
pub fn expand_sequence(path: &Path) -> SequenceFiles {
	let fallback = Some(path.to_path_buf());
	let name = file_name(path);
	let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

	let inner: Box<dyn Iterator<Item = PathBuf>> = if name.contains(UDIM_TOKEN) || has_wildcard(&name) {
		lazy_glob(dir, name.replace(UDIM_TOKEN, "*"))
	} else if path.is_dir() {
		let walk = WalkDir::new(path).sort_by_file_name().into_iter();
		Box::new(walk.filter_map(Result::ok).filter(|entry| entry.file_type().is_file()).map(|entry| entry.into_path()))
	} else if let Some(pattern) = frame_pattern(&name) {
		lazy_glob(dir, pattern)
	} else {
		Box::new(std::iter::once(path.to_path_buf()).filter(|path| path.exists()))
	};
	SequenceFiles { inner, fallback }
}

/// Tiles of a UDIM set, when `path` names one tile (or `<UDIM>`) and at least two tiles exist.
pub fn udim_tiles(path: &Path) -> Option<Vec<PathBuf>> {
	let name = file_name(path);
	let pattern = if name.contains(UDIM_TOKEN) {
		name.replace(UDIM_TOKEN, "####")
	} else {
		let (start, end) = last_tile_token(&name)?;
		format!("{}####{}", &name[..start], &name[end..])
	};
	let tiles = glob_dir(path.parent()?, &pattern);
	(tiles.len() >= 2).then_some(tiles)
}

fn file_name(path: &Path) -> String {
	path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

fn has_wildcard(name: &str) -> bool {
	name.contains('*') || name.contains('#')
}

fn frame_pattern(name: &str) -> Option<String> {
	let (stem, suffix) = match name.rfind('.') {
		Some(dot) if dot > 0 => name.split_at(dot),
		_ => (name, ""),
	};
	let trimmed = stem.trim_end_matches(|c: char| c.is_ascii_digit());
	(trimmed.len() != stem.len()).then(|| format!("{trimmed}*{suffix}"))
}

fn last_tile_token(name: &str) -> Option<(usize, usize)> {
	let bytes = name.as_bytes();
	let mut end = bytes.len();
	while end > 0 {
		if !bytes[end - 1].is_ascii_digit() {
			end -= 1;
			continue;
		}
		let mut start = end;
		while start > 0 && bytes[start - 1].is_ascii_digit() {
			start -= 1;
		}
		if end - start == 4 && name[start..end].parse::<u32>().is_ok_and(|tile| tile >= FIRST_UDIM_TILE) {
			return Some((start, end));
		}
		end = start;
	}
	None
}

fn lazy_glob(dir: PathBuf, pattern: String) -> Box<dyn Iterator<Item = PathBuf>> {
	Box::new(std::iter::once(()).flat_map(move |()| glob_dir(&dir, &pattern)))
}

fn glob_dir(dir: &Path, pattern: &str) -> Vec<PathBuf> {
	let Ok(entries) = fs::read_dir(if dir.as_os_str().is_empty() { Path::new(".") } else { dir }) else {
		return Vec::new();
	};
	let mut out: Vec<PathBuf> = entries
		.filter_map(Result::ok)
		.filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
		.filter(|entry| wildcard_match(pattern, &entry.file_name().to_string_lossy()))
		.map(|entry| dir.join(entry.file_name()))
		.collect();
	out.sort();
	out
}

/// Match `name` against a pattern where `*` is any run, `?` any char and `#` one digit.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
	let pattern: Vec<char> = pattern.chars().collect();
	let name: Vec<char> = name.chars().collect();
	let (mut p, mut n) = (0, 0);
	let mut star: Option<(usize, usize)> = None;
	while n < name.len() {
		match pattern.get(p) {
			Some('*') => {
				star = Some((p, n));
				p += 1;
			}
			Some('?') => {
				p += 1;
				n += 1;
			}
			Some('#') if name[n].is_ascii_digit() => {
				p += 1;
				n += 1;
			}
			Some(c) if *c != '#' && *c == name[n] => {
				p += 1;
				n += 1;
			}
			_ => match star {
				Some((star_p, star_n)) => {
					p = star_p + 1;
					n = star_n + 1;
					star = Some((star_p, star_n + 1));
				}
				None => return false,
			},
		}
	}
	pattern[p..].iter().all(|c| *c == '*')
}
