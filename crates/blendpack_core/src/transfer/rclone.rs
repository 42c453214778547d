//! rclone-compatible subprocess backend.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::transfer::{RemoteUri, SyncError, SyncOptions, SyncStats, SyncTool};

/// Flags appended to every call so the final stats arrive as JSON.
const STATS_FLAGS: [&str; 4] = ["--stats=0.1s", "--use-json-log", "--stats-log-level", "NOTICE"];

/// Exit codes documented as worth retrying: uncategorised and temporary errors.
const TRANSIENT_EXIT_CODES: [i32; 2] = [2, 5];

/// Runs an rclone-compatible binary once per sync call.
#[derive(Debug, Clone)]
pub struct RcloneSync {
	binary: PathBuf,
	extra_flags: Vec<String>,
}

#[derive(Deserialize)]
struct LogLine {
	#[serde(default)]
	level: Option<String>,
	#[serde(default)]
	msg: Option<String>,
	#[serde(default)]
	stats: Option<RawStats>,
}

#[derive(Deserialize)]
struct RawStats {
	#[serde(default)]
	bytes: u64,
	#[serde(default)]
	checks: u64,
	#[serde(default)]
	transfers: u64,
	#[serde(default)]
	errors: u64,
}

impl RcloneSync {
	/// Backend running `binary`.
	pub fn new(binary: impl Into<PathBuf>) -> Self {
		Self {
			binary: binary.into(),
			extra_flags: Vec::new(),
		}
	}

	/// Extra flags passed to every call, after the per-call ones.
	pub fn with_flags(mut self, flags: impl IntoIterator<Item = String>) -> Self {
		self.extra_flags.extend(flags);
		self
	}

	/// Command-line arguments for one call, binary excluded.
	pub fn arguments(&self, verb: &str, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Vec<OsString> {
		let mut args: Vec<OsString> = vec![verb.into(), source.into(), destination.to_string().into()];
		if let Some(list) = &options.files_from {
			args.push("--files-from".into());
			args.push(list.into());
		}
		if options.checksum {
			args.push("--checksum".into());
		}
		args.extend(self.extra_flags.iter().map(OsString::from));
		args.extend(STATS_FLAGS.iter().map(OsString::from));
		args
	}

	fn run(&self, verb: &str, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Result<SyncStats, SyncError> {
		let args = self.arguments(verb, source, destination, options);
		info!(verb, source = %source.display(), destination = %destination, "rclone");
		let output = Command::new(&self.binary)
			.args(&args)
			.output()
			.map_err(|err| SyncError::fatal(format!("cannot run {}: {err}", self.binary.display())))?;

		let stderr = String::from_utf8_lossy(&output.stderr);
		let stdout = String::from_utf8_lossy(&output.stdout);
		let log = format!("{stdout}\n{stderr}");
		let stats = parse_stats(&log).unwrap_or_default();
		debug!(verb, ?stats, status = %output.status, "rclone finished");

		if output.status.success() {
			return Ok(stats);
		}
		let message = last_error(&log).unwrap_or_else(|| format!("{} {verb} exited with {}", self.binary.display(), output.status));
		match output.status.code() {
			Some(code) if TRANSIENT_EXIT_CODES.contains(&code) => Err(SyncError::transient(message)),
			_ => Err(SyncError::fatal(message)),
		}
	}
}

impl SyncTool for RcloneSync {
	fn copy(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Result<SyncStats, SyncError> {
		self.run(if options.single_file { "copyto" } else { "copy" }, source, destination, options)
	}

	fn move_file(&self, source: &Path, destination: &RemoteUri, options: &SyncOptions) -> Result<SyncStats, SyncError> {
		self.run(if options.single_file { "moveto" } else { "move" }, source, destination, options)
	}
}

fn log_lines(log: &str) -> impl Iterator<Item = LogLine> + '_ {
	log.split(['\n', '\r']).map(str::trim).filter(|line| line.starts_with('{')).filter_map(|line| serde_json::from_str(line).ok())
}

/// Counters from the last JSON log line carrying `stats`.
pub fn parse_stats(log: &str) -> Option<SyncStats> {
	log_lines(log).filter_map(|line| line.stats).last().map(|raw| SyncStats {
		bytes: raw.bytes,
		checks: raw.checks,
		transfers: raw.transfers,
		errors: raw.errors,
	})
}

fn last_error(log: &str) -> Option<String> {
	log_lines(log).filter(|line| line.level.as_deref() == Some("error")).filter_map(|line| line.msg).last()
}

#[cfg(test)]
mod tests {
	use std::ffi::OsString;
	use std::path::{Path, PathBuf};

	use super::{RcloneSync, last_error, parse_stats};
	use crate::transfer::{RemoteUri, SyncOptions, SyncStats, SyncTool};

	#[test]
	fn stats_come_from_the_last_json_stats_line() {
		let log = concat!(
			"Transferred: 0 B\n",
			"{\"level\":\"notice\",\"msg\":\"\",\"stats\":{\"bytes\":10,\"totalBytes\":40,\"checks\":0,\"transfers\":0,\"errors\":0}}\r",
			"{\"level\":\"info\",\"msg\":\"Copied (new)\"}\n",
			"{\"level\":\"notice\",\"msg\":\"\",\"stats\":{\"bytes\":40,\"totalBytes\":40,\"checks\":2,\"transfers\":3,\"errors\":1}}\n",
		);
		assert_eq!(parse_stats(log), Some(SyncStats { bytes: 40, checks: 2, transfers: 3, errors: 1 }));
		assert_eq!(parse_stats("plain text only"), None);
	}

	#[test]
	fn error_message_is_the_last_error_level_line() {
		let log = "{\"level\":\"error\",\"msg\":\"first\"}\n{\"level\":\"error\",\"msg\":\"403 Forbidden\"}\n";
		assert_eq!(last_error(log).as_deref(), Some("403 Forbidden"));
	}

	#[test]
	fn arguments_put_call_flags_before_extra_and_stats_flags() {
		let sync = RcloneSync::new("rclone").with_flags(["--s3-provider=Cloudflare".to_owned()]);
		let remote = RemoteUri::parse(":s3:bucket/p1").expect("valid remote");
		let options = SyncOptions {
			files_from: Some(PathBuf::from("/tmp/list.txt")),
			single_file: false,
			checksum: true,
		};
		let args = sync.arguments("copy", Path::new("/proj"), &remote, &options);
		let expected: Vec<OsString> = [
			"copy",
			"/proj",
			":s3:bucket/p1",
			"--files-from",
			"/tmp/list.txt",
			"--checksum",
			"--s3-provider=Cloudflare",
			"--stats=0.1s",
			"--use-json-log",
			"--stats-log-level",
			"NOTICE",
		]
		.into_iter()
		.map(OsString::from)
		.collect();
		assert_eq!(args, expected);
	}

	#[test]
	fn missing_binary_is_not_retried() {
		let sync = RcloneSync::new("/nonexistent/blendpack-rclone");
		let remote = RemoteUri::parse(":s3:bucket").expect("valid remote");
		let options = SyncOptions { single_file: true, ..SyncOptions::default() };
		let err = sync.copy(Path::new("main.blend"), &remote, &options).expect_err("spawn fails");
		assert!(!err.transient);
		assert!(err.message.contains("cannot run"), "{}", err.message);
	}
}
