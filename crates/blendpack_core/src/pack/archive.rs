//! Single-archive mode: the whole file set in one zip.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::pack::plan::{PackOptions, PackPlan, build_plan};
use crate::pack::{PackError, Result};
use crate::trace::TraceReport;

/// Extensions already compressed; deflating them wastes time.
const STORE_ONLY: &[&str] = &[
	"jpg", "jpeg", "png", "webp", "exr", "mp4", "mov", "mkv", "avi", "mp3", "ogg", "flac", "zip", "rar", "7z", "gz", "bz2", "xz", "ktx2", "dds", "blend",
];

/// What [`write_archive`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
	/// Archive written.
	pub path: PathBuf,
	/// Archive member name of the main document.
	pub main_file: String,
	/// Members written.
	pub files: usize,
	/// Members stored without compression.
	pub stored: usize,
	/// Uncompressed bytes written.
	pub bytes: u64,
}

/// Whether a member named `name` is stored rather than deflated.
pub fn is_store_only(name: &str) -> bool {
	name.rsplit_once('.').is_some_and(|(_, ext)| STORE_ONLY.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Plan an archive: the root is fixed to the main document's folder.
pub fn archive_plan(report: &TraceReport, options: &PackOptions) -> Result<PackPlan> {
	let options = PackOptions {
		project_root: report.main.parent().map(Path::to_path_buf),
		..options.clone()
	};
	build_plan(report, &options)
}

/// Write every readable entry of `plan` into a zip at `out`.
///
/// The archive is assembled next to `out` and renamed into place. Missing
/// parent folders are created.
pub fn write_archive(plan: &PackPlan, out: &Path) -> Result<ArchiveSummary> {
	let dir = match out.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};
	fs::create_dir_all(dir).map_err(|err| PackError::io(dir, err))?;
	let tmp = NamedTempFile::new_in(dir).map_err(|err| PackError::io(dir, err))?;
	let archive_err = |source| PackError::Archive { path: out.to_path_buf(), source };
	let mut writer = ZipWriter::new(tmp.reopen().map_err(|err| PackError::io(tmp.path(), err))?);

	let mut summary = ArchiveSummary {
		path: out.to_path_buf(),
		main_file: plan.main_key.clone(),
		files: 0,
		stored: 0,
		bytes: 0,
	};
	for entry in plan.entries.iter().filter(|entry| entry.status.is_ok()) {
		let method = if is_store_only(&entry.key) {
			summary.stored += 1;
			CompressionMethod::Stored
		} else {
			CompressionMethod::Deflated
		};
		let options = SimpleFileOptions::default().compression_method(method).large_file(entry.size >= u64::from(u32::MAX));
		writer.start_file(entry.key.as_str(), options).map_err(archive_err)?;
		let mut source = File::open(&entry.source).map_err(|err| PackError::io(&entry.source, err))?;
		summary.bytes += io::copy(&mut source, &mut writer).map_err(|err| PackError::io(&entry.source, err))?;
		summary.files += 1;
		debug!(key = %entry.key, method = ?method, "archived");
	}
	writer.finish().map_err(archive_err)?;
	tmp.persist(out).map_err(|err| PackError::io(out, err.error))?;

	info!(path = %out.display(), files = summary.files, stored = summary.stored, bytes = summary.bytes, "wrote archive");
	Ok(summary)
}
