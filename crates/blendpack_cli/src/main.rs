#![allow(missing_docs)]

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

mod cmd;

#[derive(Parser)]
#[command(name = "blendpack", about = "Trace, pack and upload the file dependencies of Blender .blend files")]
struct Cli {
	/// YAML settings file.
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	/// More log output; repeat for trace level.
	#[arg(short, long, action = ArgAction::Count, global = true)]
	verbose: u8,
	/// Only log warnings and errors.
	#[arg(short, long, global = true, conflicts_with = "verbose")]
	quiet: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// List every file a document depends on.
	Trace(cmd::trace::Args),
	/// Plan a relocatable file set and its manifest.
	Pack(cmd::pack::Args),
	/// Check a project upload for blocking risks.
	Validate(cmd::validate::Args),
	/// Write the whole dependency set into one zip archive.
	Zip(cmd::archive::Args),
	/// Upload a project through the sync tool.
	Upload(cmd::upload::Args),
}

fn main() {
	match run() {
		Ok(code) => std::process::exit(code),
		Err(err) => {
			eprintln!("error: {err}");
			std::process::exit(1);
		}
	}
}

fn run() -> cmd::Result<i32> {
	let cli = Cli::parse();
	cmd::init_logging(cli.verbose, cli.quiet);
	let config = cmd::util::load_config(cli.config.as_deref())?;

	match cli.command {
		Commands::Trace(args) => cmd::trace::run(args, &config),
		Commands::Pack(args) => cmd::pack::run(args, &config),
		Commands::Validate(args) => cmd::validate::run(args, &config),
		Commands::Zip(args) => cmd::archive::run(args, &config),
		Commands::Upload(args) => cmd::upload::run(args, &config),
	}
}
