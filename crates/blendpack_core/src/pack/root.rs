//! Project-root inference and drive classification.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::trace::bpath;

/// How the project root was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootSource {
	/// The caller's root, which contains the main document.
	Custom,
	/// Common ancestor of the main document and its same-drive dependencies.
	Automatic,
	/// The main document's folder.
	ParentFallback,
}

/// Chosen project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootDecision {
	/// Root folder; manifest keys are relative to it.
	pub root: PathBuf,
	/// Which rule produced `root`.
	pub source: RootSource,
}

/// Short tag naming the device a path lives on.
///
/// `C:`, `//server/share`, `/Volumes/X`, `/media/user/x`, `/mnt/x`, else `/`.
pub fn drive_tag(path: &Path) -> String {
	let text = path.to_string_lossy().replace('\\', "/");
	let bytes = text.as_bytes();
	if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
		return format!("{}:", char::from(bytes[0].to_ascii_uppercase()));
	}
	let parts: Vec<&str> = text.split('/').collect();
	if text.starts_with("//") && parts.len() >= 4 {
		return format!("//{}/{}", parts[2], parts[3]);
	}
	match parts.get(1).copied() {
		Some("Volumes") if parts.len() >= 3 => format!("/Volumes/{}", parts[2]),
		Some("media") if parts.len() >= 4 => format!("/media/{}/{}", parts[2], parts[3]),
		Some("mnt") if parts.len() >= 3 => format!("/mnt/{}", parts[2]),
		_ => "/".to_owned(),
	}
}

/// Whether `path` is the top of its device.
pub fn is_filesystem_root(path: &Path) -> bool {
	let text = path.to_string_lossy().replace('\\', "/");
	let text = text.trim_end_matches('/');
	let parts: Vec<&str> = text.split('/').collect();
	match parts.as_slice() {
		[""] => true,
		[drive] => drive.len() == 2 && drive.ends_with(':'),
		["", "Volumes" | "mnt", _] | ["", "media", _, _] => true,
		_ => false,
	}
}

/// Common ancestor of `main` and the dependencies on its drive.
///
/// A result naming a file (or the document itself) is replaced by its parent.
/// `None` when no non-empty ancestor exists.
pub fn infer_project_root<'p>(main: &Path, deps: impl IntoIterator<Item = &'p Path>) -> Option<PathBuf> {
	let tag = drive_tag(main);
	let mut common = main.to_path_buf();
	let mut same_drive = 0usize;
	for dep in deps {
		if drive_tag(dep) != tag {
			continue;
		}
		same_drive += 1;
		common = common_ancestor(&common, dep);
	}
	if same_drive == 0 || common == main || common.is_file() {
		common = main.parent()?.to_path_buf();
	}
	(!common.as_os_str().is_empty()).then_some(common)
}

/// Pick the project root: a custom root containing `main`, else inference,
/// else the document's folder. Never fails.
pub fn decide_root<'p>(main: &Path, custom: Option<&Path>, deps: impl IntoIterator<Item = &'p Path>) -> RootDecision {
	if let Some(custom) = custom {
		let custom = bpath::absolute(custom);
		if main.starts_with(&custom) {
			return RootDecision {
				root: custom,
				source: RootSource::Custom,
			};
		}
		warn!(root = %custom.display(), main = %main.display(), "project root does not contain the main document, inferring one");
	}

	if let Some(root) = infer_project_root(main, deps)
		&& main.starts_with(&root)
	{
		info!(root = %root.display(), "inferred project root");
		return RootDecision {
			root,
			source: RootSource::Automatic,
		};
	}

	let root = main.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or(Path::new(".")).to_path_buf();
	warn!(root = %root.display(), "root inference failed, using the document folder");
	RootDecision {
		root,
		source: RootSource::ParentFallback,
	}
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
	a.components().zip(b.components()).take_while(|(x, y)| x == y).map(|(x, _)| x).collect()
}
