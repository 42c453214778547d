use std::path::PathBuf;

use blendpack::config::PackConfig;
use blendpack::pack::{build_plan, validate_project_upload};

use crate::cmd::Result;
use crate::cmd::util::{PlanArgs, print_issues, print_json, trace_file};

/// Exit status when a blocking issue is found.
pub const BLOCKING_EXIT: i32 = 2;

#[derive(clap::Args)]
pub struct Args {
	/// Main .blend document.
	pub file: PathBuf,
	#[command(flatten)]
	pub plan: PlanArgs,
	#[arg(long)]
	pub json: bool,
}

/// Report project-upload risks; exits with [`BLOCKING_EXIT`] when one blocks.
pub fn run(args: Args, config: &PackConfig) -> Result<i32> {
	let report = trace_file(&args.file, None, config)?;
	let plan = build_plan(&report, &args.plan.options(config))?;
	let validation = validate_project_upload(&report, &plan);

	if args.json {
		print_json(&validation)?;
	} else if validation.issues.is_empty() {
		println!("ok: {} file(s) under {}", plan.manifest().len(), plan.root.root.display());
	} else {
		print_issues(&validation.issues);
	}
	Ok(if validation.has_blocking_risk { BLOCKING_EXIT } else { 0 })
}
