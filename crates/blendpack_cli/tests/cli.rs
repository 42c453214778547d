#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use blendpack_testkit::BlendBuilder;
use serde_json::Value;
use tempfile::TempDir;

/// `proj/shots/main.blend` with one image per `(name, path)`; every `//` target is created.
fn project(dir: &TempDir, images: &[(&str, &str)]) -> PathBuf {
	let shots = dir.path().join("proj/shots");
	let mut builder = BlendBuilder::new();
	for (index, (name, path)) in images.iter().enumerate() {
		if let Some(relative) = path.strip_prefix("//") {
			let file = shots.join(relative);
			fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
			fs::write(&file, b"pixels").expect("write asset");
		}
		let mut image = builder.record("Image");
		image.id_name(name).string(&["filepath"], path);
		builder.push("IM", 0x100 + index as u64 * 0x10, &image);
	}
	builder.write(shots.join("main.blend"))
}

fn blendpack(args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_blendpack")).args(args).env_remove("RUST_LOG").output().expect("command executes")
}

fn json(output: &Output) -> Value {
	serde_json::from_slice(&output.stdout).expect("stdout should be valid json")
}

fn arg(path: &Path) -> String {
	path.display().to_string()
}

#[test]
fn trace_json_lists_usages_and_version() {
	let dir = TempDir::new().expect("tempdir");
	let main = project(&dir, &[("IMWood", "//tex/wood.png")]);

	let output = blendpack(&["trace", &arg(&main), "--json"]);
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	let report = json(&output);
	assert_eq!(report["version"], 500);
	assert_eq!(report["usages"][0]["raw"], "//tex/wood.png");
	assert_eq!(report["usages"][0]["kind"], "image");
}

#[test]
fn pack_writes_a_sorted_manifest() {
	let dir = TempDir::new().expect("tempdir");
	let main = project(&dir, &[("IMWood", "//tex/wood.png"), ("IMBark", "//tex/bark.png")]);
	let manifest = dir.path().join("out/manifest.txt");

	let output = blendpack(&["pack", &arg(&main), "--manifest", &arg(&manifest)]);
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	assert_eq!(fs::read_to_string(&manifest).expect("manifest written"), "main.blend\ntex/bark.png\ntex/wood.png\n");
}

#[test]
fn validate_exits_with_two_on_blocking_risk() {
	let dir = TempDir::new().expect("tempdir");
	let clean = project(&dir, &[("IMWood", "//tex/wood.png")]);
	let output = blendpack(&["validate", &arg(&clean), "--json"]);
	assert_eq!(output.status.code(), Some(0));
	assert_eq!(json(&output)["has_blocking_risk"], false);

	let other = TempDir::new().expect("tempdir");
	let absolute = dir.path().join("proj/shots/tex/wood.png");
	let risky = project(&other, &[("IMAbs", arg(&absolute).as_str())]);
	let output = blendpack(&["validate", &arg(&risky), "--json"]);
	assert_eq!(output.status.code(), Some(2));
	let report = json(&output);
	assert_eq!(report["issues"][0]["code"], "PROJECT_ABSOLUTE_PATH_REFERENCE");
	assert_eq!(report["stats"]["absolute_path_count"], 1);
}

#[test]
fn zip_writes_archive_and_job_payload() {
	let dir = TempDir::new().expect("tempdir");
	let main = project(&dir, &[("IMWood", "//tex/wood.png")]);
	let out = dir.path().join("out/job.zip");
	let job = dir.path().join("out/job.json");
	fs::create_dir_all(dir.path().join("out")).expect("mkdir");

	let output = blendpack(&["zip", &arg(&main), &arg(&out), "--job-out", &arg(&job), "--json"]);
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	assert_eq!(json(&output)["files"], 2);
	let payload: Value = serde_json::from_str(&fs::read_to_string(&job).expect("job written")).expect("job json");
	assert_eq!(payload["job_data"]["zip"], true);
	assert_eq!(payload["job_data"]["main_file"], "main.blend");
	assert_eq!(payload["job_data"]["blender_version"], "5.0");
}

#[test]
fn upload_to_a_local_store_sends_files_and_manifest() {
	let dir = TempDir::new().expect("tempdir");
	let main = project(&dir, &[("IMWood", "//tex/wood.png")]);
	let store = dir.path().join("store");
	let job = dir.path().join("job.json");

	let output = blendpack(&[
		"upload",
		&arg(&main),
		"--remote",
		":s3:farm/p1",
		"--local-store",
		&arg(&store),
		"--job-out",
		&arg(&job),
		"--json",
	]);
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	let outcome = json(&output);
	assert_eq!(outcome["zip"], false);
	assert_eq!(outcome["upload"]["steps"].as_array().map(Vec::len), Some(3));
	assert_eq!(outcome["upload"]["steps"][2]["label"], "manifest");

	assert!(store.join("farm/p1/main.blend").is_file());
	assert_eq!(fs::read(store.join("farm/p1/tex/wood.png")).expect("bulk file"), b"pixels");
	assert_eq!(fs::read_to_string(store.join("farm/p1/manifest.txt")).expect("manifest"), "main.blend\ntex/wood.png\n");
	let payload: Value = serde_json::from_str(&fs::read_to_string(&job).expect("job written")).expect("job json");
	assert_eq!(payload["job_data"]["main_file"], "main.blend");
	assert_eq!(payload["job_data"]["project_path"], "shots");
}

#[test]
fn upload_aborts_or_archives_on_blocking_risk() {
	let dir = TempDir::new().expect("tempdir");
	let asset = dir.path().join("assets/wood.png");
	fs::create_dir_all(asset.parent().expect("parent")).expect("mkdir");
	fs::write(&asset, b"pixels").expect("write asset");
	let main = project(&dir, &[("IMAbs", arg(&asset).as_str())]);
	let store = dir.path().join("store");
	let base = ["upload", &arg(&main), "--remote", ":s3:farm/p1", "--local-store", &arg(&store)].map(str::to_owned);
	let with = |extra: &[&str]| -> Output {
		let mut args: Vec<&str> = base.iter().map(String::as_str).collect();
		args.extend_from_slice(extra);
		blendpack(&args)
	};

	let output = with(&[]);
	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stderr).contains("blocking issue"));
	assert!(!store.exists(), "nothing uploaded");

	let output = with(&["--on-risk", "archive", "--json"]);
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	assert_eq!(json(&output)["zip"], true);
	assert!(store.join("farm/p1/main.zip").is_file());
	assert_eq!(fs::read_to_string(store.join("farm/p1/manifest.txt")).expect("manifest"), "main.zip\n");
}

#[test]
fn archive_fallback_honors_exclusions() {
	let dir = TempDir::new().expect("tempdir");
	let asset = dir.path().join("assets/wood.png");
	fs::create_dir_all(asset.parent().expect("parent")).expect("mkdir");
	fs::write(&asset, b"pixels").expect("write asset");
	let main = project(&dir, &[("IMAbs", arg(&asset).as_str()), ("IMSkip", "//tex/skip.tmp")]);
	let store = dir.path().join("store");

	let output = blendpack(&[
		"upload",
		&arg(&main),
		"--remote",
		":s3:farm/p1",
		"--local-store",
		&arg(&store),
		"--on-risk",
		"archive",
		"--exclude",
		"*.tmp",
		"--json",
	]);
	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	let outcome = json(&output);
	assert_eq!(outcome["zip"], true);
	let main_size = fs::metadata(&main).expect("main").len();
	assert_eq!(outcome["job"]["required_storage"], main_size + 6, "only the main document and wood.png");
}

#[test]
fn invalid_config_is_reported() {
	let dir = TempDir::new().expect("tempdir");
	let main = project(&dir, &[]);
	let config = dir.path().join("blendpack.yaml");
	fs::write(&config, "on_risk: sometimes\n").expect("write config");

	let output = blendpack(&["--config", &arg(&config), "trace", &arg(&main)]);
	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}
