use std::path::PathBuf;

use blendpack::config::PackConfig;
use blendpack::pack::{FileStatus, build_plan, write_manifest};

use crate::cmd::Result;
use crate::cmd::util::{PlanArgs, print_json, trace_file};

#[derive(clap::Args)]
pub struct Args {
	/// Main .blend document.
	pub file: PathBuf,
	#[command(flatten)]
	pub plan: PlanArgs,
	/// Write the manifest to this file.
	#[arg(long)]
	pub manifest: Option<PathBuf>,
	#[arg(long)]
	pub json: bool,
}

/// Build the pack plan and print its manifest.
pub fn run(args: Args, config: &PackConfig) -> Result<i32> {
	let report = trace_file(&args.file, None, config)?;
	let plan = build_plan(&report, &args.plan.options(config))?;
	let manifest = plan.manifest();
	if let Some(path) = &args.manifest {
		write_manifest(path, &manifest)?;
	}

	if args.json {
		print_json(&plan)?;
		return Ok(0);
	}

	println!("root: {} ({:?})", plan.root.root.display(), plan.root.source);
	println!("main: {}", plan.main_key);
	println!(
		"files: {} (bulk {}, individual {}, rewritten {})",
		manifest.len(),
		plan.bulk.len(),
		plan.individual.len(),
		plan.rewritten.len()
	);
	println!("required storage: {} bytes", plan.required_storage);
	for entry in &plan.entries {
		match &entry.status {
			FileStatus::Ok => println!("  {}", entry.key),
			FileStatus::Missing => println!("  {} [missing: {}]", entry.key, entry.original.display()),
			FileStatus::Unreadable(reason) => println!("  {} [unreadable: {reason}]", entry.key),
		}
	}
	Ok(0)
}
