use std::fs;
use std::path::{Path, PathBuf};

use blendpack::config::{PackConfig, RiskPolicy};
use blendpack::pack::{PackOptions, ValidationIssue};
use blendpack::trace::{TraceOptions, TraceReport, TraceRoots, trace};
use serde::Serialize;

use crate::cmd::{CliError, Result};

/// Trace root selection flag.
#[derive(Clone, Copy, clap::ValueEnum)]
pub(crate) enum RootsArg {
	AllIds,
	ActiveScene,
}

impl From<RootsArg> for TraceRoots {
	fn from(value: RootsArg) -> Self {
		match value {
			RootsArg::AllIds => Self::AllIds,
			RootsArg::ActiveScene => Self::ActiveScene,
		}
	}
}

/// Risk policy flag.
#[derive(Clone, Copy, clap::ValueEnum)]
pub(crate) enum RiskArg {
	Abort,
	Proceed,
	Archive,
}

impl From<RiskArg> for RiskPolicy {
	fn from(value: RiskArg) -> Self {
		match value {
			RiskArg::Abort => Self::Abort,
			RiskArg::Proceed => Self::Proceed,
			RiskArg::Archive => Self::Archive,
		}
	}
}

/// Planning flags shared by `pack`, `validate` and `upload`.
#[derive(clap::Args)]
pub(crate) struct PlanArgs {
	/// Project root; inferred from the dependencies when omitted.
	#[arg(long = "project-root")]
	pub project_root: Option<PathBuf>,
	/// Glob of files to leave out (repeatable).
	#[arg(long)]
	pub exclude: Vec<String>,
	/// Only pack `//`-relative references.
	#[arg(long = "relative-only")]
	pub relative_only: bool,
}

impl PlanArgs {
	/// Config options with these flags layered on top.
	pub fn options(&self, config: &PackConfig) -> PackOptions {
		let mut options = config.pack_options();
		if let Some(root) = &self.project_root {
			options.project_root = Some(root.clone());
		}
		options.exclude.extend(self.exclude.iter().cloned());
		options.relative_only |= self.relative_only;
		options
	}
}

/// Settings file, or the defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<PackConfig> {
	match path {
		Some(path) => Ok(PackConfig::load(path)?),
		None => Ok(PackConfig::default()),
	}
}

/// Trace `file` with the configured roots, overridden by `roots`.
pub(crate) fn trace_file(file: &Path, roots: Option<RootsArg>, config: &PackConfig) -> Result<TraceReport> {
	let options = TraceOptions {
		roots: roots.map_or(config.roots, TraceRoots::from),
		..TraceOptions::default()
	};
	Ok(trace(file, &options)?)
}

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

/// Write `text` to `path`, creating parent folders.
pub(crate) fn write_text(path: &Path, text: &str) -> Result<()> {
	let write = || -> std::io::Result<()> {
		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, text)
	};
	write().map_err(|source| CliError::Write { path: path.to_path_buf(), source })
}

/// One issue per line with its suggested action.
pub(crate) fn print_issues(issues: &[ValidationIssue]) {
	for issue in issues {
		println!("{}: {}", issue.code.as_str(), issue.message);
		println!("  -> {}", issue.action);
	}
}
