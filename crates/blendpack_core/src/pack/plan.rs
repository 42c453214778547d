//! Turning a trace into a relocatable, collision-free file set.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::CancelFlag;
use crate::blend::BlendFile;
use crate::pack::keys::{clean_key, is_inside, key_for};
use crate::pack::readability::{FileStatus, ReadabilityCache};
use crate::pack::rewrite::{SlotPatch, patch_bytes, rewrite_value};
use crate::pack::root::{RootDecision, decide_root};
use crate::pack::{PackError, Result};
use crate::trace::sequence::wildcard_match;
use crate::trace::{TraceReport, Usage};

/// Planning settings.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
	/// Requested project root, used only when it contains the main document.
	pub project_root: Option<PathBuf>,
	/// Globs matched against file names and path tails.
	pub exclude: Vec<String>,
	/// Leave out usages not stored `//`-relative.
	pub relative_only: bool,
	/// Polled once per usage and per rewritten document.
	pub cancel: CancelFlag,
}

/// One planned file.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
	/// Manifest key.
	pub key: String,
	/// File to upload: the original or its rewritten copy.
	pub source: PathBuf,
	/// Path found by the trace.
	pub original: PathBuf,
	/// Bytes of `source`, 0 unless readable.
	pub size: u64,
	/// Probe result of `original`.
	pub status: FileStatus,
	/// Every usage of the file is optional.
	pub optional: bool,
}

/// Relocatable file set for one main document.
///
/// Rewritten copies live in a temporary directory owned by the plan and are
/// removed when it drops.
#[derive(Debug, Serialize)]
pub struct PackPlan {
	/// Chosen project root.
	pub root: RootDecision,
	/// Main document as traced.
	pub main: PathBuf,
	/// Manifest key of the main document.
	pub main_key: String,
	/// Every planned file sorted by key, main document included.
	pub entries: Vec<ManifestEntry>,
	/// Keys copied in one bulk sync from the root: in-root and unmodified.
	pub bulk: Vec<String>,
	/// Keys uploaded one by one: rewritten copies and outside-root files.
	pub individual: Vec<String>,
	/// Keys of documents whose stored paths were rewritten.
	pub rewritten: Vec<String>,
	/// Bytes of readable dependencies.
	pub dependency_size: u64,
	/// Dependency bytes plus the main document.
	pub required_storage: u64,
	#[serde(skip)]
	scratch: Option<TempDir>,
}

impl PackPlan {
	/// Readable keys, sorted and unique.
	pub fn manifest(&self) -> Vec<&str> {
		self.readable().map(|entry| entry.key.as_str()).collect()
	}

	/// Key to upload source for every readable entry.
	pub fn source_map(&self) -> BTreeMap<String, PathBuf> {
		self.readable().map(|entry| (entry.key.clone(), entry.source.clone())).collect()
	}

	/// Entry stored under `key`.
	pub fn entry(&self, key: &str) -> Option<&ManifestEntry> {
		self.entries.binary_search_by(|entry| entry.key.as_str().cmp(key)).ok().map(|index| &self.entries[index])
	}

	/// File to upload for the main document.
	pub fn main_source(&self) -> &Path {
		self.entry(&self.main_key).map_or(self.main.as_path(), |entry| entry.source.as_path())
	}

	/// Required dependencies absent from disk.
	pub fn missing(&self) -> impl Iterator<Item = &ManifestEntry> {
		self.entries.iter().filter(|entry| entry.status == FileStatus::Missing)
	}

	/// Required dependencies present but unreadable.
	pub fn unreadable(&self) -> impl Iterator<Item = &ManifestEntry> {
		self.entries.iter().filter(|entry| matches!(entry.status, FileStatus::Unreadable(_)))
	}

	/// Folder holding rewritten copies, when any were made.
	pub fn scratch_dir(&self) -> Option<&Path> {
		self.scratch.as_ref().map(TempDir::path)
	}

	fn readable(&self) -> impl Iterator<Item = &ManifestEntry> {
		self.entries.iter().filter(|entry| entry.status.is_ok())
	}
}

/// Plan the upload of everything `report` found.
pub fn build_plan(report: &TraceReport, options: &PackOptions) -> Result<PackPlan> {
	let main = report.main.clone();
	let selected: Vec<&Usage> = report.usages.iter().filter(|usage| is_selected(usage, options)).collect();

	let mut files: BTreeMap<PathBuf, bool> = BTreeMap::new();
	for usage in &selected {
		if options.cancel.is_cancelled() {
			return Err(PackError::Cancelled);
		}
		for file in usage.files() {
			if file == main {
				continue;
			}
			files.entry(file).and_modify(|optional| *optional &= usage.is_optional).or_insert(usage.is_optional);
		}
	}

	let root = decide_root(&main, options.project_root.as_deref(), files.keys().map(PathBuf::as_path));
	let main_key = main_key(&main, &root.root);

	let mut cache = ReadabilityCache::new();
	let mut entries: BTreeMap<String, ManifestEntry> = BTreeMap::new();
	for (file, optional) in files {
		let status = cache.check(&file);
		if optional && !status.is_ok() {
			debug!(path = %file.display(), "optional dependency absent");
			continue;
		}
		let size = if status.is_ok() { file_size(&file)? } else { 0 };
		let key = key_for(&file, &root.root);
		if key == main_key || entries.contains_key(&key) {
			warn!(key = %key, path = %file.display(), "manifest key already taken, skipping");
			continue;
		}
		entries.insert(key.clone(), ManifestEntry {
			key,
			source: file.clone(),
			original: file,
			size,
			status,
			optional,
		});
	}
	entries.insert(main_key.clone(), ManifestEntry {
		key: main_key.clone(),
		source: main.clone(),
		original: main.clone(),
		size: file_size(&main)?,
		status: FileStatus::Ok,
		optional: false,
	});

	let mut scratch = None;
	let rewritten = rewrite_documents(&selected, &root.root, &main, &main_key, &mut entries, &mut scratch, &options.cancel)?;

	let mut bulk = Vec::new();
	let mut individual = Vec::new();
	let mut dependency_size = 0;
	for entry in entries.values().filter(|entry| entry.status.is_ok() && entry.key != main_key) {
		dependency_size += entry.size;
		if entry.source == entry.original && is_inside(&entry.original, &root.root) {
			bulk.push(entry.key.clone());
		} else {
			individual.push(entry.key.clone());
		}
	}
	let main_size = entries.get(&main_key).map_or(0, |entry| entry.size);

	let plan = PackPlan {
		root,
		main,
		main_key,
		entries: entries.into_values().collect(),
		bulk,
		individual,
		rewritten,
		dependency_size,
		required_storage: dependency_size + main_size,
		scratch,
	};
	info!(
		root = %plan.root.root.display(),
		main_key = %plan.main_key,
		files = plan.manifest().len(),
		bulk = plan.bulk.len(),
		individual = plan.individual.len(),
		rewritten = plan.rewritten.len(),
		missing = plan.missing().count(),
		unreadable = plan.unreadable().count(),
		required_storage = plan.required_storage,
		"pack plan ready"
	);
	Ok(plan)
}

fn is_selected(usage: &Usage, options: &PackOptions) -> bool {
	if options.relative_only && !usage.is_blend_relative() {
		debug!(raw = %usage.raw, "not blend-relative, left out");
		return false;
	}
	if is_excluded(&usage.path, &options.exclude) {
		debug!(path = %usage.path.display(), "excluded");
		return false;
	}
	true
}

fn is_excluded(path: &Path, patterns: &[String]) -> bool {
	let text = path.to_string_lossy().replace('\\', "/");
	let name = text.rsplit('/').next().unwrap_or(&text);
	patterns.iter().any(|pattern| wildcard_match(pattern, name) || wildcard_match(&format!("*/{pattern}"), &text))
}

/// Root-relative key, or the bare file name when the root does not hold the document.
fn main_key(main: &Path, root: &Path) -> String {
	if is_inside(main, root) {
		return key_for(main, root);
	}
	clean_key(&main.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default())
}

/// Whether a stored path stays valid after packing without a rewrite.
fn keeps_relation(usage: &Usage, root: &Path) -> bool {
	usage.is_blend_relative() && is_inside(&usage.path, root) == is_inside(&usage.doc, root)
}

/// Write patched copies of every document holding a path that packing breaks.
fn rewrite_documents(
	usages: &[&Usage],
	root: &Path,
	main: &Path,
	main_key: &str,
	entries: &mut BTreeMap<String, ManifestEntry>,
	scratch: &mut Option<TempDir>,
	cancel: &CancelFlag,
) -> Result<Vec<String>> {
	let doc_key = |doc: &Path| if doc == main { main_key.to_owned() } else { key_for(doc, root) };

	let mut patches: BTreeMap<&Path, Vec<SlotPatch>> = BTreeMap::new();
	for usage in usages.iter().filter(|usage| !keeps_relation(usage, root)) {
		let Some(slot) = usage.slot else {
			debug!(raw = %usage.raw, "path has no field to rewrite");
			continue;
		};
		let value = rewrite_value(&doc_key(&usage.doc), &key_for(&usage.path, root), slot.style, &usage.raw);
		if value != usage.raw {
			patches.entry(usage.doc.as_path()).or_default().push(SlotPatch { slot, value });
		}
	}

	let mut rewritten = Vec::new();
	for (doc, doc_patches) in patches {
		if cancel.is_cancelled() {
			return Err(PackError::Cancelled);
		}
		let key = doc_key(doc);
		let Some(entry) = entries.get_mut(&key).filter(|entry| entry.status.is_ok()) else {
			debug!(doc = %doc.display(), "document not uploaded, not rewritten");
			continue;
		};
		let file = BlendFile::open(doc).map_err(|source| PackError::Blend {
			path: doc.to_path_buf(),
			source,
		})?;
		let bytes = patch_bytes(doc, file.bytes(), &doc_patches)?;

		let dir = match scratch {
			Some(dir) => dir.path().to_path_buf(),
			None => {
				let dir = tempfile::Builder::new().prefix("blendpack-").tempdir().map_err(|err| PackError::io(std::env::temp_dir(), err))?;
				let path = dir.path().to_path_buf();
				*scratch = Some(dir);
				path
			}
		};
		let dest = dir.join(&key);
		if let Some(parent) = dest.parent() {
			fs::create_dir_all(parent).map_err(|err| PackError::io(parent, err))?;
		}
		fs::write(&dest, &bytes).map_err(|err| PackError::io(&dest, err))?;
		info!(doc = %doc.display(), key = %key, paths = doc_patches.len(), "rewrote stored paths");

		entry.size = bytes.len() as u64;
		entry.source = dest;
		rewritten.push(key);
	}
	Ok(rewritten)
}

fn file_size(path: &Path) -> Result<u64> {
	fs::metadata(path).map(|meta| meta.len()).map_err(|err| PackError::io(path, err))
}
