use std::path::PathBuf;

use blendpack::blend::BlendError;
use blendpack::config::ConfigError;
use blendpack::pack::PackError;
use blendpack::trace::TraceError;
use blendpack::transfer::TransferError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Archive mode command.
pub mod archive;
/// Pack planning command.
pub mod pack;
/// Dependency listing command.
pub mod trace;
/// Upload command.
pub mod upload;
/// Shared helpers.
pub(crate) mod util;
/// Project validation command.
pub mod validate;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Trace(#[from] TraceError),
	#[error(transparent)]
	Pack(#[from] PackError),
	#[error(transparent)]
	Transfer(#[from] TransferError),
	#[error(transparent)]
	Blend(#[from] BlendError),
	#[error("cannot write {}: {source}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("json encoding failed: {0}")]
	Json(#[from] serde_json::Error),
	#[error("{0}")]
	Usage(String),
	#[error("{count} blocking issue(s) found; pass --on-risk proceed or --on-risk archive to upload anyway")]
	Blocked { count: usize },
}

/// Install the stderr log subscriber.
///
/// `-v`/`-q` pick the level; without them `RUST_LOG` is honored, then `blendpack=info`.
pub fn init_logging(verbose: u8, quiet: bool) {
	let level = match (quiet, verbose) {
		(true, _) => Some("blendpack=warn"),
		(false, 0) => None,
		(false, 1) => Some("blendpack=debug"),
		(false, _) => Some("blendpack=trace"),
	};
	let filter = match level {
		Some(level) => EnvFilter::new(level),
		None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blendpack=info")),
	};
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
