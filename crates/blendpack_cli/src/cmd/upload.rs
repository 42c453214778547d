use std::fs;
use std::iter;
use std::path::{Path, PathBuf};

use blendpack::blend::BlendFile;
use blendpack::config::{PackConfig, RiskPolicy};
use blendpack::pack::{JobPayload, JobTarget, ValidationIssue, archive_plan, build_plan, read_manifest, validate_project_upload, write_archive};
use blendpack::transfer::{LocalSync, Orchestrator, RcloneSync, RemoteUri, SyncTool, UploadPlan, UploadReport};
use serde::Serialize;
use tracing::warn;

use crate::cmd::util::{PlanArgs, RiskArg, print_issues, print_json, trace_file, write_text};
use crate::cmd::{CliError, Result};

#[derive(clap::Args)]
pub struct Args {
	/// Main .blend document.
	pub file: PathBuf,
	#[command(flatten)]
	pub plan: PlanArgs,
	/// Remote project folder, `:s3:bucket/prefix`.
	#[arg(long)]
	pub remote: Option<String>,
	/// Upload the keys of this manifest, relative to `--project-root`, instead of tracing.
	#[arg(long)]
	pub manifest: Option<PathBuf>,
	/// Use this folder as the remote store instead of the sync tool.
	#[arg(long = "local-store")]
	pub local_store: Option<PathBuf>,
	/// Write the job payload here.
	#[arg(long = "job-out")]
	pub job_out: Option<PathBuf>,
	/// Reaction to blocking validation issues.
	#[arg(long = "on-risk", value_enum)]
	pub on_risk: Option<RiskArg>,
	#[arg(long)]
	pub json: bool,
}

#[derive(Serialize)]
struct Outcome<'a> {
	zip: bool,
	upload: &'a UploadReport,
	job: &'a JobPayload,
	issues: &'a [ValidationIssue],
}

/// Validate, apply the risk policy, upload and emit the job payload.
pub fn run(args: Args, config: &PackConfig) -> Result<i32> {
	let remote = args
		.remote
		.as_deref()
		.or(config.transfer.remote.as_deref())
		.ok_or_else(|| CliError::Usage("no remote given; pass --remote or set transfer.remote".to_owned()))?;
	let remote = RemoteUri::parse(remote)?;
	let policy = args.on_risk.map_or(config.on_risk, RiskPolicy::from);

	let tool: Box<dyn SyncTool> = match &args.local_store {
		Some(dir) => Box::new(LocalSync::new(dir)),
		None => Box::new(RcloneSync::new(&config.transfer.rclone_bin).with_flags(config.transfer.extra_flags.iter().cloned())),
	};
	let orchestrator = Orchestrator::new(tool.as_ref()).with_retry(config.transfer.retry).with_checksum(config.transfer.checksum);

	if let Some(manifest) = &args.manifest {
		return upload_manifest(&args, manifest, remote, policy, &orchestrator, config);
	}

	let report = trace_file(&args.file, None, config)?;
	let options = args.plan.options(config);
	let plan = build_plan(&report, &options)?;
	let validation = validate_project_upload(&report, &plan);
	let zip = match policy {
		_ if !validation.has_blocking_risk => false,
		RiskPolicy::Abort => {
			print_issues(&validation.issues);
			return Err(CliError::Blocked {
				count: validation.issues.len(),
			});
		}
		RiskPolicy::Proceed => {
			warn!(issues = validation.issues.len(), "uploading despite blocking issues");
			false
		}
		RiskPolicy::Archive => {
			warn!(issues = validation.issues.len(), "blocking issues found, uploading one archive instead");
			true
		}
	};

	if zip {
		let archive = archive_plan(&report, &options)?;
		let staging = tempfile::Builder::new().prefix("blendpack-zip-").tempdir().map_err(|source| CliError::Write {
			path: std::env::temp_dir(),
			source,
		})?;
		let stem = args.file.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| "project".to_owned());
		let name = format!("{stem}.zip");
		let path = staging.path().join(&name);
		write_archive(&archive, &path)?;
		let upload_plan = UploadPlan {
			root: staging.path().to_path_buf(),
			remote,
			main_key: name.clone(),
			main_source: path,
			individual: Vec::new(),
			bulk: Vec::new(),
			manifest: vec![name],
			manifest_name: config.transfer.manifest_name.clone(),
		};
		let upload = orchestrator.upload(&upload_plan)?;
		let job = JobPayload::new(&config.job, &archive, report.version, true);
		return finish(&args, &upload, &job, &validation.issues, true);
	}

	let upload = orchestrator.upload(&UploadPlan::from_pack(&plan, remote, &config.transfer.manifest_name))?;
	let job = JobPayload::new(&config.job, &plan, report.version, false);
	finish(&args, &upload, &job, &validation.issues, false)
}

fn upload_manifest(args: &Args, manifest: &Path, remote: RemoteUri, policy: RiskPolicy, orchestrator: &Orchestrator<'_, dyn SyncTool>, config: &PackConfig) -> Result<i32> {
	let root = args
		.plan
		.project_root
		.as_ref()
		.or(config.project_root.as_ref())
		.ok_or_else(|| CliError::Usage("--manifest needs --project-root".to_owned()))?;
	let version = BlendFile::open(&args.file)?.header.version;
	let entries = read_manifest(manifest)?;
	let (plan, validation) = UploadPlan::from_manifest(&entries, root, &args.file, remote, &config.transfer.manifest_name);
	if validation.has_blocking_risk {
		if policy != RiskPolicy::Proceed {
			print_issues(&validation.issues);
			return Err(CliError::Blocked {
				count: validation.issues.len(),
			});
		}
		warn!(issues = validation.issues.len(), "uploading manifest despite blocking issues");
	}

	let upload = orchestrator.upload(&plan)?;
	let required_storage: u64 = plan
		.bulk
		.iter()
		.map(|key| root.join(key))
		.chain(iter::once(args.file.clone()))
		.filter_map(|path| fs::metadata(path).ok())
		.map(|meta| meta.len())
		.sum();
	let target = JobTarget {
		main: &args.file,
		main_key: &plan.main_key,
		root,
		required_storage,
		version,
	};
	let job = JobPayload::for_target(&config.job, &target, false);
	finish(args, &upload, &job, &validation.issues, false)
}

fn finish(args: &Args, upload: &UploadReport, job: &JobPayload, issues: &[ValidationIssue], zip: bool) -> Result<i32> {
	if let Some(path) = &args.job_out {
		write_text(path, &job.to_json()?)?;
	}
	if args.json {
		print_json(&Outcome { zip, upload, job, issues })?;
		return Ok(0);
	}

	for step in &upload.steps {
		println!(
			"{}: {} sent, {} already present, {} bytes -> {}",
			step.label, step.stats.transfers, step.stats.checks, step.stats.bytes, step.destination
		);
		if let Some(warning) = &step.warning {
			println!("  warning: {warning}");
		}
	}
	let totals = upload.totals();
	println!("uploaded {} file(s), {} bytes; job {} main_file {}", totals.transfers, totals.bytes, job.id, job.main_file);
	Ok(0)
}
