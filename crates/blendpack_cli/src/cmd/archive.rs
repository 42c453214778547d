use std::path::PathBuf;

use blendpack::config::PackConfig;
use blendpack::pack::{JobPayload, archive_plan, write_archive};

use crate::cmd::Result;
use crate::cmd::util::{print_json, trace_file, write_text};

#[derive(clap::Args)]
pub struct Args {
	/// Main .blend document.
	pub file: PathBuf,
	/// Archive to write.
	pub out: PathBuf,
	/// Also write the job payload here.
	#[arg(long = "job-out")]
	pub job_out: Option<PathBuf>,
	#[arg(long)]
	pub json: bool,
}

/// Write every dependency into one zip archive.
pub fn run(args: Args, config: &PackConfig) -> Result<i32> {
	let report = trace_file(&args.file, None, config)?;
	let plan = archive_plan(&report, &config.pack_options())?;
	let summary = write_archive(&plan, &args.out)?;
	if let Some(path) = &args.job_out {
		let payload = JobPayload::new(&config.job, &plan, report.version, true);
		write_text(path, &payload.to_json()?)?;
	}

	if args.json {
		print_json(&summary)?;
	} else {
		println!("{}: {} file(s), {} stored, {} bytes", summary.path.display(), summary.files, summary.stored, summary.bytes);
		for entry in plan.missing() {
			println!("  missing: {}", entry.original.display());
		}
	}
	Ok(0)
}
