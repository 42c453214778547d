//! Settings file for the packer and uploader.
//!
//! Every field is optional; an empty file yields [`PackConfig::default`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pack::{JobSettings, PackOptions};
use crate::trace::TraceRoots;
use crate::transfer::RetryPolicy;

/// Config-local result type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors loading a settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The file could not be read.
	#[error("cannot read config {}: {source}", path.display())]
	Read {
		/// Config path.
		path: PathBuf,
		/// Underlying failure.
		#[source]
		source: std::io::Error,
	},
	/// The file is not valid YAML for [`PackConfig`].
	#[error("invalid config {}: {source}", path.display())]
	Parse {
		/// Config path.
		path: PathBuf,
		/// Parser failure, with location.
		#[source]
		source: serde_yaml::Error,
	},
}

/// What to do when validation finds a blocking risk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskPolicy {
	/// Stop before uploading anything.
	#[default]
	Abort,
	/// Upload the project as planned.
	Proceed,
	/// Upload a single archive instead.
	Archive,
}

/// Sync tool and remote settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
	/// rclone-compatible binary.
	pub rclone_bin: PathBuf,
	/// Remote project folder, `:s3:bucket/prefix`.
	pub remote: Option<String>,
	/// Remote name of the manifest file.
	pub manifest_name: String,
	/// Flags appended to every sync call.
	pub extra_flags: Vec<String>,
	/// Compare by content hash.
	pub checksum: bool,
	/// Retry settings for sync calls.
	pub retry: RetryPolicy,
}

impl Default for TransferConfig {
	fn default() -> Self {
		Self {
			rclone_bin: PathBuf::from("rclone"),
			remote: None,
			manifest_name: "manifest.txt".to_owned(),
			extra_flags: Vec::new(),
			checksum: true,
			retry: RetryPolicy::default(),
		}
	}
}

/// Top-level settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
	/// Project root override.
	pub project_root: Option<PathBuf>,
	/// Which blocks seed the trace.
	pub roots: TraceRoots,
	/// Glob patterns of files left out.
	pub exclude: Vec<String>,
	/// Only pack `//`-relative references.
	pub relative_only: bool,
	/// Reaction to blocking validation issues.
	pub on_risk: RiskPolicy,
	/// Upload settings.
	pub transfer: TransferConfig,
	/// Render job settings.
	pub job: JobSettings,
}

impl PackConfig {
	/// Parse a settings file.
	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
		Self::parse(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
	}

	/// Parse settings from YAML text; blank text gives the defaults.
	pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
		if text.trim().is_empty() {
			return Ok(Self::default());
		}
		serde_yaml::from_str(text)
	}

	/// Planning options from these settings.
	pub fn pack_options(&self) -> PackOptions {
		PackOptions {
			project_root: self.project_root.clone(),
			exclude: self.exclude.clone(),
			relative_only: self.relative_only,
			..PackOptions::default()
		}
	}
}
