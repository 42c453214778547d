//! Pre-upload checks on the traced paths and on manifest entries.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::pack::keys::{OUTSIDE_PROJECT, clean_key, is_inside};
use crate::pack::plan::PackPlan;
use crate::pack::readability::FileStatus;
use crate::pack::root::drive_tag;
use crate::trace::{TraceReport, bpath};

/// Machine-readable issue identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
	/// A required dependency is stored as an absolute path.
	ProjectAbsolutePathReference,
	/// A required dependency sits outside the project root.
	ProjectOutOfRootExcluded,
	/// A `//` path from inside the root walks out of it.
	ProjectRootEscape,
	/// A manifest entry is empty, absolute or traversing.
	ManifestEntryInvalid,
	/// A manifest entry has no readable source file.
	ManifestSourceMismatch,
}

impl IssueCode {
	/// Stable upper-case identifier.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ProjectAbsolutePathReference => "PROJECT_ABSOLUTE_PATH_REFERENCE",
			Self::ProjectOutOfRootExcluded => "PROJECT_OUT_OF_ROOT_EXCLUDED",
			Self::ProjectRootEscape => "PROJECT_ROOT_ESCAPE",
			Self::ManifestEntryInvalid => "MANIFEST_ENTRY_INVALID",
			Self::ManifestSourceMismatch => "MANIFEST_SOURCE_MISMATCH",
		}
	}

	/// Suggested fix.
	pub fn action(self) -> &'static str {
		match self {
			Self::ProjectAbsolutePathReference => "Make all asset paths relative or switch to Zip upload.",
			Self::ProjectOutOfRootExcluded => "Broaden project root or switch to Zip upload.",
			Self::ProjectRootEscape => "Fix path traversal outside project root before Project upload.",
			Self::ManifestEntryInvalid => "Regenerate manifest from a valid project root.",
			Self::ManifestSourceMismatch => "Manifest entries did not map to readable local files.",
		}
	}
}

/// One raised issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
	/// Identifier.
	pub code: IssueCode,
	/// Suggested fix.
	pub action: &'static str,
	/// Human-readable warning.
	pub message: String,
}

impl ValidationIssue {
	fn new(code: IssueCode, message: impl Into<String>) -> Self {
		Self {
			code,
			action: code.action(),
			message: message.into(),
		}
	}
}

/// Counters of a project validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
	/// Distinct present files referenced by absolute paths.
	pub absolute_path_count: usize,
	/// Readable required files outside the root.
	pub out_of_root_count: usize,
	/// Out-of-root files reached through `//` traversal from inside the root.
	pub root_escape_count: usize,
	/// Files on another drive than the main document.
	pub cross_drive_count: usize,
	/// Required files absent from disk.
	pub missing_count: usize,
	/// Required files present but unreadable.
	pub unreadable_count: usize,
}

/// Example paths per issue class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationDetails {
	/// Files referenced by absolute paths.
	pub absolute_path_files: Vec<PathBuf>,
	/// Files outside the root.
	pub out_of_root_files: Vec<PathBuf>,
	/// Files escaping the root through `//` traversal.
	pub root_escape_files: Vec<PathBuf>,
	/// Files on another drive.
	pub cross_drive_files: Vec<PathBuf>,
}

/// Outcome of [`validate_project_upload`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
	/// Raised issues in a fixed order.
	pub issues: Vec<ValidationIssue>,
	/// Counters.
	pub stats: ValidationStats,
	/// Example paths.
	pub details: ValidationDetails,
	/// Project upload would likely break on the farm.
	pub has_blocking_risk: bool,
}

impl ValidationReport {
	/// Whether `code` was raised.
	pub fn has(&self, code: IssueCode) -> bool {
		self.issues.iter().any(|issue| issue.code == code)
	}
}

/// Check a planned project upload for paths that break after relocation.
pub fn validate_project_upload(report: &TraceReport, plan: &PackPlan) -> ValidationReport {
	let root = plan.root.root.as_path();
	let status: HashMap<&Path, &FileStatus> = plan.entries.iter().map(|entry| (entry.original.as_path(), &entry.status)).collect();
	let present = |path: &Path| status.get(path).is_some_and(|status| status.is_ok());

	let mut absolute = BTreeSet::new();
	let mut escaping = BTreeSet::new();
	for usage in report.usages.iter().filter(|usage| !usage.is_optional) {
		let files: Vec<PathBuf> = usage.files().filter(|file| present(file.as_path())).collect();
		if !usage.is_blend_relative() {
			absolute.extend(files);
		} else if is_inside(&usage.doc, root) {
			escaping.extend(files.into_iter().filter(|file| !is_inside(file, root)));
		}
	}

	let required = plan.entries.iter().filter(|entry| entry.status.is_ok() && !entry.optional && entry.key != plan.main_key);
	let outside_prefix = format!("{OUTSIDE_PROJECT}/");
	let out_of_root: BTreeSet<PathBuf> = required.filter(|entry| entry.key.starts_with(&outside_prefix)).map(|entry| entry.original.clone()).collect();
	let main_drive = drive_tag(&plan.main);
	let cross_drive: BTreeSet<PathBuf> = plan.entries.iter().filter(|entry| drive_tag(&entry.original) != main_drive).map(|entry| entry.original.clone()).collect();

	let stats = ValidationStats {
		absolute_path_count: absolute.len(),
		out_of_root_count: out_of_root.len(),
		root_escape_count: escaping.len(),
		cross_drive_count: cross_drive.len(),
		missing_count: plan.missing().count(),
		unreadable_count: plan.unreadable().count(),
	};

	let mut issues = Vec::new();
	if !absolute.is_empty() {
		issues.push(ValidationIssue::new(
			IssueCode::ProjectAbsolutePathReference,
			"Project upload references absolute paths that farm workers cannot resolve.",
		));
	}
	if !out_of_root.is_empty() {
		issues.push(ValidationIssue::new(
			IssueCode::ProjectOutOfRootExcluded,
			"Some required dependencies are outside the selected project root.",
		));
	}
	if !escaping.is_empty() {
		issues.push(ValidationIssue::new(
			IssueCode::ProjectRootEscape,
			"At least one dependency resolves outside project root via relative traversal.",
		));
	}

	let validation = ValidationReport {
		has_blocking_risk: !issues.is_empty(),
		issues,
		stats,
		details: ValidationDetails {
			absolute_path_files: absolute.into_iter().collect(),
			out_of_root_files: out_of_root.into_iter().collect(),
			root_escape_files: escaping.into_iter().collect(),
			cross_drive_files: cross_drive.into_iter().collect(),
		},
	};
	for issue in &validation.issues {
		warn!(code = issue.code.as_str(), action = issue.action, "{}", issue.message);
	}
	info!(blocking = validation.has_blocking_risk, stats = ?validation.stats, "project validation finished");
	validation
}

/// Counters of a manifest validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestValidationStats {
	/// Entries given.
	pub manifest_entries_in: usize,
	/// Entries kept.
	pub manifest_entries_out: usize,
	/// Repeated entries dropped.
	pub duplicate_entries_removed: usize,
	/// Empty, absolute or traversing entries dropped.
	pub invalid_entry_count: usize,
	/// Kept entries without a source file.
	pub source_mismatch_count: usize,
	/// Kept entries with a source file.
	pub source_match_count: usize,
}

/// Outcome of [`validate_manifest_entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestValidation {
	/// Cleaned, de-duplicated entries in input order.
	pub entries: Vec<String>,
	/// Dropped entries as given.
	pub invalid_entries: Vec<String>,
	/// Kept entries whose source does not exist.
	pub source_mismatches: Vec<String>,
	/// Raised issues.
	pub issues: Vec<ValidationIssue>,
	/// Counters.
	pub stats: ManifestValidationStats,
	/// Uploading these entries would leave files behind.
	pub has_blocking_risk: bool,
}

/// Clean and check manifest keys before upload.
///
/// A key maps to `sources[key]` when present, else to `root/key`.
pub fn validate_manifest_entries<S: AsRef<str>>(entries: &[S], root: &Path, sources: Option<&BTreeMap<String, PathBuf>>) -> ManifestValidation {
	let mut out = ManifestValidation::default();
	let mut seen = HashSet::new();
	for raw in entries {
		let raw = raw.as_ref();
		let cleaned = clean_key(raw);
		if is_invalid_key(raw, &cleaned) {
			out.invalid_entries.push(raw.to_owned());
			continue;
		}
		if !seen.insert(cleaned.clone()) {
			out.stats.duplicate_entries_removed += 1;
			continue;
		}
		let source = sources.and_then(|sources| sources.get(&cleaned)).cloned().unwrap_or_else(|| root.join(&cleaned));
		if !source.exists() {
			out.source_mismatches.push(cleaned.clone());
		}
		out.entries.push(cleaned);
	}

	out.stats.manifest_entries_in = entries.len();
	out.stats.manifest_entries_out = out.entries.len();
	out.stats.invalid_entry_count = out.invalid_entries.len();
	out.stats.source_mismatch_count = out.source_mismatches.len();
	out.stats.source_match_count = out.entries.len() - out.source_mismatches.len();

	if !out.invalid_entries.is_empty() {
		let message = format!("{} manifest entries were invalid and ignored.", out.invalid_entries.len());
		out.issues.push(ValidationIssue::new(IssueCode::ManifestEntryInvalid, message));
	}
	if !out.source_mismatches.is_empty() {
		let message = format!("{} manifest entries do not match local source files.", out.source_mismatches.len());
		out.issues.push(ValidationIssue::new(IssueCode::ManifestSourceMismatch, message));
	}
	out.has_blocking_risk = !out.issues.is_empty();
	for issue in &out.issues {
		warn!(code = issue.code.as_str(), "{}", issue.message);
	}
	out
}

fn is_invalid_key(raw: &str, cleaned: &str) -> bool {
	let raw = raw.trim().replace('\\', "/");
	cleaned.is_empty()
		|| cleaned == "."
		|| cleaned == ".."
		|| raw.starts_with('/')
		|| bpath::is_windows_absolute(&raw)
		|| cleaned.starts_with("../")
		|| cleaned.ends_with("/..")
		|| cleaned.contains("/../")
}
