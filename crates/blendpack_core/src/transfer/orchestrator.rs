//! Upload sequencing: main document, individual files, bulk set, manifest last.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::CancelFlag;
use crate::pack::{
	ManifestValidation, PackPlan, clean_key, is_filesystem_root, is_inside, key_for, render_manifest, select_main_key, validate_manifest_entries,
	write_manifest,
};
use crate::transfer::{RemoteUri, Result, RetryPolicy, SyncError, SyncOptions, SyncStats, SyncTool, TransferError};

/// Everything one upload sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
	/// Local folder the bulk keys are relative to.
	pub root: PathBuf,
	/// Remote folder of the project.
	pub remote: RemoteUri,
	/// Remote key of the main document.
	pub main_key: String,
	/// File uploaded as the main document.
	pub main_source: PathBuf,
	/// Keys uploaded one by one, with their local source.
	pub individual: Vec<(String, PathBuf)>,
	/// Root-relative keys copied in bulk.
	pub bulk: Vec<String>,
	/// Keys listed in the uploaded manifest.
	pub manifest: Vec<String>,
	/// Remote name of the manifest file.
	pub manifest_name: String,
}

impl UploadPlan {
	/// Upload of a pack plan.
	///
	/// Sources may point into the plan's scratch folder, so `plan` must
	/// outlive the upload.
	pub fn from_pack(plan: &PackPlan, remote: RemoteUri, manifest_name: &str) -> Self {
		Self {
			root: plan.root.root.clone(),
			remote,
			main_key: plan.main_key.clone(),
			main_source: plan.main_source().to_path_buf(),
			individual: plan.individual.iter().filter_map(|key| plan.entry(key).map(|entry| (key.clone(), entry.source.clone()))).collect(),
			bulk: plan.bulk.clone(),
			manifest: plan.manifest().into_iter().map(str::to_owned).collect(),
			manifest_name: manifest_name.to_owned(),
		}
	}

	/// Upload of an existing manifest whose keys are relative to `root`.
	///
	/// Entries are cleaned first. The main document's key is the entry that
	/// best matches where `main` sits under `root`. Entries without a local
	/// source are left out of the bulk copy.
	pub fn from_manifest<S: AsRef<str>>(entries: &[S], root: &Path, main: &Path, remote: RemoteUri, manifest_name: &str) -> (Self, ManifestValidation) {
		let validation = validate_manifest_entries(entries, root, None);
		let expected = if is_inside(main, root) {
			key_for(main, root)
		} else {
			clean_key(&main.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default())
		};
		let main_key = select_main_key(&expected, validation.entries.iter().map(String::as_str)).unwrap_or(expected);

		let bulk: Vec<String> = validation.entries.iter().filter(|key| **key != main_key && !validation.source_mismatches.contains(key)).cloned().collect();
		let mut manifest = bulk.clone();
		manifest.push(main_key.clone());
		manifest.sort();
		manifest.dedup();

		let plan = Self {
			root: root.to_path_buf(),
			remote,
			main_key,
			main_source: main.to_path_buf(),
			individual: Vec::new(),
			bulk,
			manifest,
			manifest_name: manifest_name.to_owned(),
		};
		(plan, validation)
	}
}

/// Outcome of one sync call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
	/// Step label.
	pub label: String,
	/// Local source.
	pub source: PathBuf,
	/// Remote destination.
	pub destination: String,
	/// Files the step should have touched.
	pub expected_files: usize,
	/// Counters reported by the tool.
	pub stats: SyncStats,
	/// Set when the counters do not add up.
	pub warning: Option<String>,
}

/// Every step of one upload, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
	/// Steps run.
	pub steps: Vec<StepReport>,
}

impl UploadReport {
	/// Counters summed over every step.
	pub fn totals(&self) -> SyncStats {
		let mut totals = SyncStats::default();
		for step in &self.steps {
			totals += step.stats;
		}
		totals
	}

	/// Steps carrying a warning.
	pub fn warnings(&self) -> impl Iterator<Item = &StepReport> {
		self.steps.iter().filter(|step| step.warning.is_some())
	}
}

/// Drives a [`SyncTool`] through the upload of one [`UploadPlan`].
pub struct Orchestrator<'t, T: SyncTool + ?Sized> {
	tool: &'t T,
	retry: RetryPolicy,
	checksum: bool,
	cancel: CancelFlag,
}

impl<'t, T: SyncTool + ?Sized> Orchestrator<'t, T> {
	/// Orchestrator over `tool` with default retries.
	pub fn new(tool: &'t T) -> Self {
		Self {
			tool,
			retry: RetryPolicy::default(),
			checksum: false,
			cancel: CancelFlag::new(),
		}
	}

	/// Replace the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// Ask the tool to compare content hashes.
	pub fn with_checksum(mut self, checksum: bool) -> Self {
		self.checksum = checksum;
		self
	}

	/// Poll `cancel` between sync calls.
	pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
		self.cancel = cancel;
		self
	}

	/// Upload `plan`: main document, individual files, bulk set, then the manifest.
	///
	/// The first failing step aborts the upload; files sent by earlier steps
	/// stay on the remote and the manifest is not uploaded.
	/// A step whose tool reports per-file errors counts as failed.
	pub fn upload(&self, plan: &UploadPlan) -> Result<UploadReport> {
		let staging = tempfile::Builder::new().prefix("blendpack-upload-").tempdir().map_err(|err| TransferError::io(std::env::temp_dir(), err))?;
		let mut report = UploadReport::default();

		let single = SyncOptions {
			files_from: None,
			single_file: true,
			checksum: self.checksum,
		};
		report.steps.push(self.step("main", &plan.main_source, &plan.remote.join(&plan.main_key), 1, &single, false)?);

		for (key, source) in &plan.individual {
			report.steps.push(self.step(&format!("file {key}"), source, &plan.remote.join(key), 1, &single, false)?);
		}

		if !plan.bulk.is_empty() {
			let groups = if is_filesystem_root(&plan.root) {
				info!(root = %plan.root.display(), "project root is a filesystem root, splitting bulk copy by folder");
				split_by_first_dir(&plan.bulk)
			} else {
				BTreeMap::from([(String::new(), plan.bulk.clone())])
			};
			for (index, (group, keys)) in groups.iter().enumerate() {
				let list = staging.path().join(format!("files-{index}.txt"));
				fs::write(&list, render_manifest(keys)).map_err(|err| TransferError::io(&list, err))?;
				let options = SyncOptions {
					files_from: Some(list),
					single_file: false,
					checksum: self.checksum,
				};
				let (label, source, destination) = if group.is_empty() {
					("bulk".to_owned(), plan.root.clone(), plan.remote.clone())
				} else {
					(format!("bulk {group}"), plan.root.join(group), plan.remote.join(group))
				};
				report.steps.push(self.step(&label, &source, &destination, keys.len(), &options, false)?);
			}
		}

		let manifest = staging.path().join(&plan.manifest_name);
		write_manifest(&manifest, &plan.manifest)?;
		report.steps.push(self.step("manifest", &manifest, &plan.remote.join(&plan.manifest_name), 1, &single, true)?);

		let totals = report.totals();
		info!(
			steps = report.steps.len(),
			bytes = totals.bytes,
			transfers = totals.transfers,
			checks = totals.checks,
			errors = totals.errors,
			"upload finished"
		);
		Ok(report)
	}

	fn step(&self, label: &str, source: &Path, destination: &RemoteUri, expected_files: usize, options: &SyncOptions, move_file: bool) -> Result<StepReport> {
		let stats = self.retry.run(label, &self.cancel, || {
			let stats = if move_file {
				self.tool.move_file(source, destination, options)?
			} else {
				self.tool.copy(source, destination, options)?
			};
			match stats.errors {
				0 => Ok(stats),
				errors => Err(SyncError::fatal(format!("{errors} file(s) failed"))),
			}
		})?;
		let warning = step_warning(expected_files, &stats);
		match &warning {
			Some(message) => warn!(step = label, %destination, message = %message, "upload count mismatch"),
			None => info!(step = label, %destination, bytes = stats.bytes, transfers = stats.transfers, checks = stats.checks, "uploaded"),
		}
		Ok(StepReport {
			label: label.to_owned(),
			source: source.to_path_buf(),
			destination: destination.to_string(),
			expected_files,
			stats,
			warning,
		})
	}
}

/// Group keys by first folder; the remainder is relative to that folder.
///
/// Keys without a folder land in the `""` group unchanged.
pub fn split_by_first_dir<S: AsRef<str>>(keys: &[S]) -> BTreeMap<String, Vec<String>> {
	let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for key in keys {
		let key = key.as_ref();
		let (group, rest) = match key.split_once('/') {
			Some((group, rest)) if !group.is_empty() => (group, rest),
			_ => ("", key),
		};
		groups.entry(group.to_owned()).or_default().push(rest.to_owned());
	}
	groups
}

fn step_warning(expected_files: usize, stats: &SyncStats) -> Option<String> {
	let expected = expected_files as u64;
	let touched = stats.touched();
	if expected > 0 && touched == 0 {
		Some(format!("expected {expected} file(s) but none were transferred"))
	} else if touched < expected {
		Some(format!("touched {touched} of {expected} file(s); some dependencies may have been skipped"))
	} else {
		None
	}
}
