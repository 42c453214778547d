use std::path::{Path, PathBuf};

use blendpack_testkit::BlendBuilder;
use tempfile::TempDir;

use super::root_blocks;
use crate::CancelFlag;
use crate::blend::BlendFile;
use crate::trace::{TraceError, TraceOptions, TraceReport, TraceRoots, bpath, trace};

fn root(dir: &TempDir) -> PathBuf {
	bpath::absolute(dir.path())
}

fn run(main: &Path, roots: TraceRoots) -> TraceReport {
	let options = TraceOptions {
		roots,
		..TraceOptions::default()
	};
	trace(main, &options).expect("trace succeeds")
}

fn raws(report: &TraceReport) -> Vec<&str> {
	report.usages.iter().map(|usage| usage.raw.as_str()).collect()
}

fn image(builder: &mut BlendBuilder, addr: u64, name: &str, path: &str) {
	let mut record = builder.record("Image");
	record.id_name(name).string(&["filepath"], path);
	builder.push("IM", addr, &record);
}

/// Scene -> object -> mesh -> material -> embedded tree -> image, plus one unreferenced image.
fn shading_chain() -> BlendBuilder {
	let mut builder = BlendBuilder::new();
	let mut scene = builder.record("Scene");
	scene.id_name("SCMain").ptr(&["base", "first"], 0x110);
	builder.push("SC", 0x100, &scene);
	let mut base = builder.record("Base");
	base.ptr(&["object"], 0x200);
	builder.push("DATA", 0x110, &base);

	let mut ob = builder.record("Object");
	ob.id_name("OBCube").ptr(&["data"], 0x300);
	builder.push("OB", 0x200, &ob);
	let mut mesh = builder.record("Mesh");
	mesh.id_name("MECube").int(&["totcol"], 1).ptr(&["mat"], 0x310);
	builder.push("ME", 0x300, &mesh);
	builder.pointer_array(0x310, &[0x400]);
	let mut material = builder.record("Material");
	material.id_name("MAWood").ptr(&["nodetree"], 0x500);
	builder.push("MA", 0x400, &material);
	let mut tree = builder.record("bNodeTree");
	tree.ptr(&["nodes", "first"], 0x510);
	builder.push("DATA", 0x500, &tree);
	let mut node = builder.record("bNode");
	node.ptr(&["id"], 0x600);
	builder.push("DATA", 0x510, &node);

	image(&mut builder, 0x600, "IMWood", "//tex/wood.png");
	image(&mut builder, 0x700, "IMUnused", "//tex/unused.png");
	builder
}

#[test]
fn active_scene_walk_follows_edges_and_visits_each_block_once() {
	let dir = TempDir::new().expect("tempdir");
	let main = shading_chain().write(dir.path().join("main.blend"));

	let report = run(&main, TraceRoots::ActiveScene);
	assert_eq!(raws(&report), ["//tex/wood.png"]);
	assert_eq!(report.visited, 6, "scene, object, mesh, material, tree, image");
	assert_eq!(report.main, root(&dir).join("main.blend"));
	assert_eq!(report.documents, [root(&dir).join("main.blend")]);
	assert!(report.unreadable.is_empty());
}

#[test]
fn all_ids_roots_include_unreferenced_datablocks() {
	let dir = TempDir::new().expect("tempdir");
	let main = shading_chain().write(dir.path().join("main.blend"));

	let report = run(&main, TraceRoots::AllIds);
	let mut found = raws(&report);
	found.sort_unstable();
	assert_eq!(found, ["//tex/unused.png", "//tex/wood.png"]);
	assert_eq!(report.visited, 7);
}

#[test]
fn shared_blocks_reached_from_two_parents_are_expanded_once() {
	let mut builder = BlendBuilder::new();
	let mut scene = builder.record("Scene");
	scene.id_name("SCMain").ptr(&["base", "first"], 0x110);
	builder.push("SC", 0x100, &scene);
	for (addr, next, object) in [(0x110, 0x120, 0x200), (0x120, 0, 0x250)] {
		let mut base = builder.record("Base");
		base.ptr(&["next"], next).ptr(&["object"], object);
		builder.push("DATA", addr, &base);
	}
	for (addr, name) in [(0x200, "OBLeft"), (0x250, "OBRight")] {
		let mut ob = builder.record("Object");
		ob.id_name(name).ptr(&["data"], 0x300);
		builder.push("OB", addr, &ob);
	}
	let mut mesh = builder.record("Mesh");
	mesh.id_name("MEShared").int(&["totcol"], 1).ptr(&["mat"], 0x310);
	builder.push("ME", 0x300, &mesh);
	builder.pointer_array(0x310, &[0x400]);
	let mut material = builder.record("Material");
	material.id_name("MAWood").ptr(&["nodetree"], 0x500);
	builder.push("MA", 0x400, &material);
	let mut tree = builder.record("bNodeTree");
	tree.ptr(&["nodes", "first"], 0x510);
	builder.push("DATA", 0x500, &tree);
	let mut node = builder.record("bNode");
	node.ptr(&["id"], 0x600);
	builder.push("DATA", 0x510, &node);
	image(&mut builder, 0x600, "IMWood", "//tex/wood.png");

	let dir = TempDir::new().expect("tempdir");
	let main = builder.write(dir.path().join("main.blend"));
	let report = run(&main, TraceRoots::ActiveScene);
	assert_eq!(raws(&report), ["//tex/wood.png"]);
	assert_eq!(report.visited, 7, "scene, two objects, mesh, material, tree, image");
}

#[test]
fn active_scene_prefers_glob_curscene_over_the_first_scene() {
	let mut builder = BlendBuilder::new().curscene(0x200);
	for (addr, name) in [(0x100, "SCFirst"), (0x200, "SCActive")] {
		let mut scene = builder.record("Scene");
		scene.id_name(name);
		builder.push("SC", addr, &scene);
	}
	let file = BlendFile::from_bytes("/p/main.blend", builder.build()).expect("opens");
	assert_eq!(root_blocks(&file, TraceRoots::ActiveScene), [0x200]);

	let mut builder = BlendBuilder::new();
	let mut scene = builder.record("Scene");
	scene.id_name("SCOnly");
	builder.push("SC", 0x300, &scene);
	let file = BlendFile::from_bytes("/p/main.blend", builder.build()).expect("opens");
	assert_eq!(root_blocks(&file, TraceRoots::ActiveScene), [0x300]);
}

fn linking_main(library_path: &str, packed: bool) -> BlendBuilder {
	let mut builder = BlendBuilder::new();
	let mut scene = builder.record("Scene");
	scene.id_name("SCMain").ptr(&["base", "first"], 0x110);
	builder.push("SC", 0x100, &scene);
	let mut base = builder.record("Base");
	base.ptr(&["object"], 0x200);
	builder.push("DATA", 0x110, &base);
	let mut placeholder = builder.record("ID");
	placeholder.string(&["name"], "OBHero").ptr(&["lib"], 0x900);
	builder.push("OB", 0x200, &placeholder);
	let mut lib = builder.record("Library");
	lib.id_name("LIchars.blend").string(&["filepath"], library_path);
	if packed {
		lib.ptr(&["packedfile"], 0x990);
		builder.raw("DATA", 0, 0x990, vec![0; 16]);
	}
	builder.push("LI", 0x900, &lib);
	builder
}

fn hero_library(back_link: Option<&str>) -> BlendBuilder {
	let mut builder = BlendBuilder::new();
	let mut hero = builder.record("Object");
	hero.id_name("OBHero").ptr(&["modifiers", "first"], 0x110);
	if back_link.is_some() {
		hero.ptr(&["proxy"], 0x300);
	}
	builder.push("OB", 0x100, &hero);
	let mut md = builder.record("MeshCacheModifierData");
	md.int(&["modifier", "type"], 46).string(&["filepath"], "//cache/hero.pc2");
	builder.push("DATA", 0x110, &md);
	if let Some(path) = back_link {
		let mut placeholder = builder.record("ID");
		placeholder.string(&["name"], "OBCube").ptr(&["lib"], 0x900);
		builder.push("OB", 0x300, &placeholder);
		let mut lib = builder.record("Library");
		lib.id_name("LImain.blend").string(&["filepath"], path);
		builder.push("LI", 0x900, &lib);
	}
	builder
}

#[test]
fn linked_datablocks_resolve_paths_against_their_own_library() {
	let dir = TempDir::new().expect("tempdir");
	let main = linking_main("//libs/chars.blend", false).write(dir.path().join("main.blend"));
	hero_library(None).write(dir.path().join("libs/chars.blend"));

	let report = run(&main, TraceRoots::ActiveScene);
	assert_eq!(raws(&report), ["//cache/hero.pc2", "//libs/chars.blend"]);
	assert_eq!(report.usages[0].path, root(&dir).join("libs/cache/hero.pc2"));
	assert_eq!(report.usages[0].doc, root(&dir).join("libs/chars.blend"));
	assert_eq!(report.documents.len(), 2);
}

#[test]
fn linked_placeholders_follow_their_library_even_when_a_local_id_shares_the_name() {
	let dir = TempDir::new().expect("tempdir");
	let mut main = linking_main("//libs/chars.blend", false);
	let mut local = main.record("Object");
	local.id_name("OBHero");
	main.push("OB", 0x400, &local);
	let main = main.write(dir.path().join("main.blend"));
	hero_library(None).write(dir.path().join("libs/chars.blend"));

	let report = run(&main, TraceRoots::ActiveScene);
	assert_eq!(report.documents, [root(&dir).join("main.blend"), root(&dir).join("libs/chars.blend")]);
	assert_eq!(raws(&report), ["//cache/hero.pc2", "//libs/chars.blend"]);
}

#[test]
fn library_cycles_terminate_and_open_each_document_once() {
	let dir = TempDir::new().expect("tempdir");
	let mut main = linking_main("//libs/chars.blend", false);
	let mut cube = main.record("Object");
	cube.id_name("OBCube");
	main.push("OB", 0x400, &cube);
	let main = main.write(dir.path().join("main.blend"));
	hero_library(Some("//../main.blend")).write(dir.path().join("libs/chars.blend"));

	let report = run(&main, TraceRoots::AllIds);
	assert_eq!(report.documents, [root(&dir).join("main.blend"), root(&dir).join("libs/chars.blend")]);
	let mut found = raws(&report);
	found.sort_unstable();
	found.dedup();
	assert_eq!(found, ["//../main.blend", "//cache/hero.pc2", "//libs/chars.blend"]);
}

#[test]
fn unreadable_libraries_are_recorded_and_the_walk_continues() {
	let dir = TempDir::new().expect("tempdir");
	let main = linking_main("//libs/missing.blend", false).write(dir.path().join("main.blend"));

	let report = run(&main, TraceRoots::ActiveScene);
	let missing = root(&dir).join("libs/missing.blend");
	assert!(report.unreadable.contains_key(&missing), "{:?}", report.unreadable);
	assert_eq!(raws(&report), ["//libs/missing.blend"]);
	assert_eq!(report.documents.len(), 1);
}

#[test]
fn packed_libraries_are_not_opened() {
	let dir = TempDir::new().expect("tempdir");
	let main = linking_main("//libs/chars.blend", true).write(dir.path().join("main.blend"));
	hero_library(None).write(dir.path().join("libs/chars.blend"));

	let report = run(&main, TraceRoots::ActiveScene);
	assert_eq!(report.documents.len(), 1);
	assert_eq!(report.usages.len(), 1);
	assert!(report.usages[0].is_optional);
}

#[test]
fn cancellation_and_unreadable_main_documents_stop_the_trace() {
	let dir = TempDir::new().expect("tempdir");
	let main = shading_chain().write(dir.path().join("main.blend"));
	let cancel = CancelFlag::new();
	cancel.cancel();
	let options = TraceOptions {
		roots: TraceRoots::AllIds,
		cancel,
	};
	assert!(matches!(trace(&main, &options), Err(TraceError::Cancelled)));

	let broken = blendpack_testkit::write_file(dir.path().join("broken.blend"), b"BLENDER?");
	let err = trace(&broken, &TraceOptions::default()).expect_err("main must be readable");
	assert!(matches!(err, TraceError::MainDocument { .. }));
}
