use std::path::PathBuf;

use blendpack::config::PackConfig;

use crate::cmd::Result;
use crate::cmd::util::{RootsArg, print_json, trace_file};

#[derive(clap::Args)]
pub struct Args {
	/// Main .blend document.
	pub file: PathBuf,
	/// Which blocks seed the walk.
	#[arg(long, value_enum)]
	pub roots: Option<RootsArg>,
	#[arg(long)]
	pub json: bool,
}

/// Print every file usage reachable from the document.
pub fn run(args: Args, config: &PackConfig) -> Result<i32> {
	let report = trace_file(&args.file, args.roots, config)?;
	if args.json {
		print_json(&report)?;
		return Ok(0);
	}

	println!("main: {} (version {})", report.main.display(), report.version);
	println!("documents: {}", report.documents.len());
	println!("blocks visited: {}", report.visited);
	for usage in &report.usages {
		let mut flags = String::new();
		if usage.is_sequence {
			flags.push_str(" [sequence]");
		}
		if usage.is_optional {
			flags.push_str(" [optional]");
		}
		println!(
			"{:<5} {:<24} {:<8} {} -> {}{flags}",
			usage.block_code,
			usage.id_name.as_deref().unwrap_or("-"),
			usage.kind.as_str(),
			usage.raw,
			usage.path.display()
		);
	}
	for (library, reason) in &report.unreadable {
		println!("unreadable library: {} ({reason})", library.display());
	}
	Ok(0)
}
