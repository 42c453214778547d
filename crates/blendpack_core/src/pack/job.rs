//! Job-registration payload handed to the farm API collaborator.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pack::plan::PackPlan;

/// Render settings supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobSettings {
	/// Job identifier; derived from the main file name when unset.
	pub id: Option<String>,
	/// Farm project the job belongs to.
	pub project_id: String,
	/// Display name; the main file stem when unset.
	pub name: Option<String>,
	/// First frame.
	pub start: i64,
	/// Last frame.
	pub end: i64,
	/// Frame increment.
	pub frame_step: i64,
	/// Output image format.
	pub image_format: String,
	/// Render engine identifier.
	pub render_engine: String,
	/// Blender version to render with; the document's own version when unset.
	pub blender_version: Option<String>,
}

impl Default for JobSettings {
	fn default() -> Self {
		Self {
			id: None,
			project_id: String::new(),
			name: None,
			start: 1,
			end: 250,
			frame_step: 1,
			image_format: "PNG".to_owned(),
			render_engine: "CYCLES".to_owned(),
			blender_version: None,
		}
	}
}

/// Payload registering one render job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPayload {
	/// Job identifier.
	pub id: String,
	/// Farm project.
	pub project_id: String,
	/// Main key in project mode, archive member name in zip mode.
	pub main_file: String,
	/// Name of the project root folder.
	pub project_path: String,
	/// Display name.
	pub name: String,
	/// First frame.
	pub start: i64,
	/// Last frame.
	pub end: i64,
	/// Frame increment.
	pub frame_step: i64,
	/// Output image format.
	pub image_format: String,
	/// Render engine identifier.
	pub render_engine: String,
	/// Blender version, `major.minor`.
	pub blender_version: String,
	/// Bytes the job needs on the farm.
	pub required_storage: u64,
	/// Uploaded as one archive.
	pub zip: bool,
}

#[derive(Serialize)]
struct Envelope<'a> {
	job_data: &'a JobPayload,
}

/// File-side facts a payload is built from.
#[derive(Debug, Clone, Copy)]
pub struct JobTarget<'a> {
	/// Main document on disk.
	pub main: &'a Path,
	/// Remote key of the main document.
	pub main_key: &'a str,
	/// Project root.
	pub root: &'a Path,
	/// Bytes the job needs on the farm.
	pub required_storage: u64,
	/// Blender version digits of the main document, e.g. `405`.
	pub version: u16,
}

impl JobPayload {
	/// Payload for an upload of `plan`; `version` is the document's version digits.
	pub fn new(settings: &JobSettings, plan: &PackPlan, version: u16, zip: bool) -> Self {
		let target = JobTarget {
			main: &plan.main,
			main_key: &plan.main_key,
			root: &plan.root.root,
			required_storage: plan.required_storage,
			version,
		};
		Self::for_target(settings, &target, zip)
	}

	/// Payload for files described by `target`.
	///
	/// `main_file` is the main key, or the bare file name for archive uploads.
	pub fn for_target(settings: &JobSettings, target: &JobTarget<'_>, zip: bool) -> Self {
		let file_name = target.main.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
		let stem = target.main.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
		let project_path = target.root.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
		Self {
			id: settings.id.clone().unwrap_or_else(|| format!("{stem}-{}", target.required_storage)),
			project_id: settings.project_id.clone(),
			main_file: if zip { file_name } else { target.main_key.to_owned() },
			project_path,
			name: settings.name.clone().unwrap_or(stem),
			start: settings.start,
			end: settings.end,
			frame_step: settings.frame_step,
			image_format: settings.image_format.clone(),
			render_engine: settings.render_engine.clone(),
			blender_version: settings.blender_version.clone().unwrap_or_else(|| version_label(target.version)),
			required_storage: target.required_storage,
			zip,
		}
	}

	/// `{"job_data": {...}}` as pretty JSON.
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(&Envelope { job_data: self })
	}
}

/// `405` becomes `4.5`.
fn version_label(version: u16) -> String {
	format!("{}.{}", version / 100, version % 100)
}

#[cfg(test)]
mod tests {
	use blendpack_testkit::BlendBuilder;
	use serde_json::Value;
	use tempfile::TempDir;

	use super::{JobPayload, JobSettings, version_label};
	use crate::pack::{PackOptions, build_plan};
	use crate::trace::{TraceOptions, trace};

	#[test]
	fn versions_are_major_dot_minor() {
		assert_eq!(version_label(405), "4.5");
		assert_eq!(version_label(279), "2.79");
		assert_eq!(version_label(500), "5.0");
	}

	#[test]
	fn payload_uses_the_main_key_in_project_mode_and_the_file_name_in_zip_mode() {
		let dir = TempDir::new().expect("tempdir");
		let main = BlendBuilder::new().write(dir.path().join("proj/shots/shot.blend"));
		let report = trace(&main, &TraceOptions::default()).expect("trace succeeds");
		let options = PackOptions {
			project_root: Some(dir.path().join("proj")),
			..PackOptions::default()
		};
		let plan = build_plan(&report, &options).expect("plan builds");
		let settings = JobSettings {
			id: Some("job-1".to_owned()),
			project_id: "p1".to_owned(),
			..JobSettings::default()
		};

		let project = JobPayload::new(&settings, &plan, report.version, false);
		assert_eq!(project.main_file, "shots/shot.blend");
		assert_eq!(project.project_path, "proj");
		assert_eq!(project.name, "shot");
		assert_eq!(project.blender_version, "5.0");
		assert_eq!(project.required_storage, plan.required_storage);

		let zipped = JobPayload::new(&settings, &plan, report.version, true);
		assert_eq!(zipped.main_file, "shot.blend");

		let json: Value = serde_json::from_str(&project.to_json().expect("serializes")).expect("valid json");
		assert_eq!(json["job_data"]["id"], "job-1");
		assert_eq!(json["job_data"]["zip"], false);
		assert_eq!(json["job_data"]["frame_step"], 1);
	}
}
