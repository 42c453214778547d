use std::fs;
use std::path::{Path, PathBuf};

use blendpack_testkit::BlendBuilder;
use tempfile::TempDir;

use crate::trace::{AssetKind, DocId, Session, SlotStyle, TraceCtx, Usage, collect};

struct Fixture {
	dir: TempDir,
	session: Session,
	doc: DocId,
}

fn open(builder: &BlendBuilder) -> Fixture {
	let dir = TempDir::new().expect("tempdir");
	let path = builder.write(dir.path().join("shot.blend"));
	let mut session = Session::new();
	let doc = session.open(&path).expect("document opens");
	Fixture { dir, session, doc }
}

impl Fixture {
	fn usages(&self, addr: u64) -> Vec<Usage> {
		let block = self.session.doc(self.doc).resolve(addr).expect("block resolves");
		collect(TraceCtx::new(&self.session), block)
	}

	fn root(&self) -> PathBuf {
		crate::trace::bpath::absolute(self.dir.path())
	}
}

fn path_block(builder: &BlendBuilder, code: &str, struct_name: &str, addr: u64, path: &str) -> blendpack_testkit::Record {
	let mut record = builder.record(struct_name);
	record.id_name(&format!("{code}{addr:x}")).string(&["filepath"], path);
	record
}

#[test]
fn image_paths_resolve_against_the_owning_document() {
	let mut builder = BlendBuilder::new();
	let plain = path_block(&builder, "IM", "Image", 0x100, "//tex/wood.png");
	builder.push("IM", 0x100, &plain);
	let mut frames = path_block(&builder, "IM", "Image", 0x200, "//render/frame_0001.exr");
	frames.int(&["source"], 2);
	builder.push("IM", 0x200, &frames);
	let mut generated = path_block(&builder, "IM", "Image", 0x300, "//gen.png");
	generated.int(&["source"], 4);
	builder.push("IM", 0x300, &generated);
	let mut packed = path_block(&builder, "IM", "Image", 0x400, "//packed.png");
	packed.ptr(&["packedfile"], 0x990);
	builder.push("IM", 0x400, &packed);
	builder.raw("DATA", 0, 0x990, vec![0; 16]);

	let fixture = open(&builder);
	let usages = fixture.usages(0x100);
	assert_eq!(usages.len(), 1);
	let usage = &usages[0];
	assert_eq!(usage.raw, "//tex/wood.png");
	assert_eq!(usage.path, fixture.root().join("tex/wood.png"));
	assert_eq!(usage.block_code, "IM");
	assert_eq!(usage.id_name.as_deref(), Some("IM100"));
	assert_eq!(usage.kind, AssetKind::Image);
	assert!(usage.is_blend_relative());
	assert!(!usage.is_sequence && !usage.is_optional);

	let slot = usage.slot.expect("stored in a field");
	assert_eq!(slot.style, SlotStyle::FullPath);
	assert_eq!(slot.capacity, 1024);
	let bytes = fixture.session.doc(fixture.doc).bytes();
	assert_eq!(&bytes[slot.offset..slot.offset + usage.raw.len()], usage.raw.as_bytes());

	assert!(fixture.usages(0x200)[0].is_sequence);
	assert!(fixture.usages(0x300).is_empty(), "generated images have no file");
	assert!(fixture.usages(0x400).is_empty(), "packed images travel inside the document");
}

#[test]
fn packed_libraries_are_optional_and_builtin_fonts_skipped() {
	let mut builder = BlendBuilder::new();
	let mut lib = path_block(&builder, "LI", "Library", 0x100, "//libs/props.blend");
	lib.ptr(&["packedfile"], 0x990);
	builder.push("LI", 0x100, &lib);
	builder.raw("DATA", 0, 0x990, vec![0; 16]);
	let font = path_block(&builder, "VF", "VFont", 0x200, "<builtin>");
	builder.push("VF", 0x200, &font);
	let mut cache = path_block(&builder, "CF", "CacheFile", 0x300, "/abs/sim_0001.abc");
	cache.int(&["is_sequence"], 1);
	builder.push("CF", 0x300, &cache);

	let fixture = open(&builder);
	let lib = &fixture.usages(0x100)[0];
	assert!(lib.is_optional);
	assert_eq!(lib.kind, AssetKind::Library);
	assert!(fixture.usages(0x200).is_empty());
	let cache = &fixture.usages(0x300)[0];
	assert!(cache.is_sequence && !cache.is_blend_relative());
	assert_eq!(cache.path, Path::new("/abs/sim_0001.abc"));
	assert_eq!(cache.kind, AssetKind::Cache);
}

#[test]
fn object_modifiers_and_point_caches_report_their_files() {
	let mut builder = BlendBuilder::new();
	let mut ob = builder.record("Object");
	ob.id_name("OBSim").ptr(&["modifiers", "first"], 0x110).ptr(&["particlesystem", "first"], 0x150);
	builder.push("OB", 0x100, &ob);

	let mut mesh_cache = builder.record("MeshCacheModifierData");
	mesh_cache.int(&["modifier", "type"], 46).string(&["filepath"], "//cache/anim.pc2").ptr(&["modifier", "next"], 0x120);
	builder.push("DATA", 0x110, &mesh_cache);
	let mut ocean = builder.record("OceanModifierData");
	ocean.int(&["modifier", "type"], 39).string(&["cachepath"], "//ocean/").ptr(&["modifier", "next"], 0x130);
	builder.push("DATA", 0x120, &ocean);
	let mut fluid = builder.record("FluidModifierData");
	fluid.int(&["modifier", "type"], 56).ptr(&["domain"], 0x140);
	builder.push("DATA", 0x130, &fluid);
	let mut domain = builder.record("FluidDomainSettings");
	domain.string(&["cache_directory"], "//fluid/");
	builder.push("DATA", 0x140, &domain);

	let mut disk = builder.record("ParticleSystem");
	disk.ptr(&["pointcache"], 0x160).ptr(&["next"], 0x170);
	builder.push("DATA", 0x150, &disk);
	let mut disk_cache = builder.record("PointCache");
	disk_cache.int(&["flag"], 0x40);
	builder.push("DATA", 0x160, &disk_cache);
	let mut external = builder.record("ParticleSystem");
	external.ptr(&["pointcache"], 0x180);
	builder.push("DATA", 0x170, &external);
	let mut external_cache = builder.record("PointCache");
	external_cache.int(&["flag"], 0x200).string(&["path"], "/farm/caches/");
	builder.push("DATA", 0x180, &external_cache);

	let fixture = open(&builder);
	let usages = fixture.usages(0x100);
	let raws: Vec<_> = usages.iter().map(|usage| usage.raw.as_str()).collect();
	assert_eq!(raws, ["//cache/anim.pc2", "//fluid/", "//blendcache_shot/", "/farm/caches/"], "uncached ocean is skipped");

	assert!(!usages[0].is_optional);
	assert!(usages[1].is_optional && usages[1].is_sequence);
	assert_eq!(usages[1].kind, AssetKind::Cache);
	assert!(usages[2].slot.is_none(), "disk cache directory is implied by the document name");
	assert!(usages[2].is_optional);
	assert_eq!(usages[2].path, fixture.root().join("blendcache_shot"));
	assert!(usages[3].is_sequence && !usages[3].is_optional);
}

#[test]
fn cached_ocean_is_reported() {
	let mut builder = BlendBuilder::new();
	let mut ob = builder.record("Object");
	ob.id_name("OBSea").ptr(&["modifiers", "first"], 0x110);
	builder.push("OB", 0x100, &ob);
	let mut ocean = builder.record("OceanModifierData");
	ocean.int(&["modifier", "type"], 39).int(&["cached"], 1).string(&["cachepath"], "//ocean/");
	builder.push("DATA", 0x110, &ocean);

	let usages = open(&builder).usages(0x100);
	assert_eq!(usages.len(), 1);
	assert!(usages[0].is_optional && usages[0].is_sequence);
}

#[test]
fn strips_join_directory_and_element_name() {
	let mut builder = BlendBuilder::new();
	let mut scene = builder.record("Scene");
	scene.id_name("SCEdit").ptr(&["ed"], 0x110);
	builder.push("SC", 0x100, &scene);
	let mut ed = builder.record("Editing");
	ed.ptr(&["seqbase", "first"], 0x120);
	builder.push("DATA", 0x110, &ed);

	let mut image = builder.record("Strip");
	image.int(&["type"], 0).ptr(&["data"], 0x130).ptr(&["next"], 0x150);
	builder.push("DATA", 0x120, &image);
	let mut image_data = builder.record("StripData");
	image_data.string(&["dir"], "//frames").ptr(&["stripdata"], 0x140);
	builder.push("DATA", 0x130, &image_data);
	let mut elem = builder.record("StripElem");
	elem.string(&["name"], "f_0001.png");
	builder.push("DATA", 0x140, &elem);

	let mut movie = builder.record("Strip");
	movie.int(&["type"], 3).ptr(&["data"], 0x160);
	builder.push("DATA", 0x150, &movie);
	let mut movie_data = builder.record("StripData");
	movie_data.string(&["dir"], "/footage/").ptr(&["stripdata"], 0x170);
	builder.push("DATA", 0x160, &movie_data);
	let mut clip = builder.record("StripElem");
	clip.string(&["name"], "take.mov");
	builder.push("DATA", 0x170, &clip);

	let fixture = open(&builder);
	let usages = fixture.usages(0x100);
	assert_eq!(usages.len(), 2);
	assert_eq!(usages[0].raw, "//frames/f_0001.png");
	assert!(usages[0].is_sequence);
	assert_eq!(usages[0].slot.expect("dir slot").style, SlotStyle::DirOnly);
	assert_eq!(usages[0].slot.expect("dir slot").capacity, 768);
	assert_eq!(usages[1].raw, "/footage/take.mov");
	assert_eq!(usages[1].kind, AssetKind::Movie);
	assert!(!usages[1].is_sequence);
	assert_eq!(usages[1].block_code, "SC");
}

#[test]
fn shader_nodes_report_external_storage_only() {
	let mut builder = BlendBuilder::new();
	let mut tree = builder.record("bNodeTree");
	tree.id_name("NTLamp").ptr(&["nodes", "first"], 0x110);
	builder.push("DATA", 0x100, &tree);

	let mut ies = builder.record("bNode");
	ies.string(&["idname"], "ShaderNodeTexIES").ptr(&["storage"], 0x120).ptr(&["next"], 0x130);
	builder.push("DATA", 0x110, &ies);
	let mut ies_storage = builder.record("NodeShaderTexIES");
	ies_storage.int(&["mode"], 1).string(&["filepath"], "//ies/spot.ies");
	builder.push("DATA", 0x120, &ies_storage);

	let mut script = builder.record("bNode");
	script.string(&["idname"], "ShaderNodeScript").ptr(&["storage"], 0x140);
	builder.push("DATA", 0x130, &script);
	let mut internal = builder.record("NodeShaderScript");
	internal.int(&["mode"], 0).string(&["filepath"], "//internal.osl");
	builder.push("DATA", 0x140, &internal);

	let usages = open(&builder).usages(0x100);
	assert_eq!(usages.len(), 1);
	assert_eq!(usages[0].raw, "//ies/spot.ies");
	assert_eq!(usages[0].kind, AssetKind::Ies);
	assert_eq!(usages[0].block_code, "DATA");
}

#[test]
fn files_expand_sequences_tiles_and_missing_patterns() {
	let mut builder = BlendBuilder::new();
	let mut frames = path_block(&builder, "IM", "Image", 0x100, "//seq/frame_0001.png");
	frames.int(&["source"], 2);
	builder.push("IM", 0x100, &frames);
	let tiles = path_block(&builder, "IM", "Image", 0x200, "//tiles/albedo.1001.png");
	builder.push("IM", 0x200, &tiles);
	let mut missing = path_block(&builder, "IM", "Image", 0x300, "//gone/shot_####.png");
	missing.int(&["source"], 2);
	builder.push("IM", 0x300, &missing);

	let fixture = open(&builder);
	let root = fixture.root();
	for name in ["seq/frame_0001.png", "seq/frame_0002.png", "tiles/albedo.1001.png", "tiles/albedo.1002.png"] {
		let path = root.join(name);
		fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
		fs::write(path, b"px").expect("write");
	}

	let files: Vec<_> = fixture.usages(0x100)[0].files().collect();
	assert_eq!(files, [root.join("seq/frame_0001.png"), root.join("seq/frame_0002.png")]);
	let files: Vec<_> = fixture.usages(0x200)[0].files().collect();
	assert_eq!(files, [root.join("tiles/albedo.1001.png"), root.join("tiles/albedo.1002.png")]);
	let files: Vec<_> = fixture.usages(0x300)[0].files().collect();
	assert_eq!(files, [root.join("gone/shot_####.png")], "unmatched pattern is reported as itself");
}

#[test]
fn asset_kinds_follow_extensions() {
	assert_eq!(AssetKind::from_path("//a/B.EXR"), AssetKind::Image);
	assert_eq!(AssetKind::from_path("C:\\clips\\take.mov"), AssetKind::Movie);
	assert_eq!(AssetKind::from_path("//vol/smoke_0001.vdb"), AssetKind::Volume);
	assert_eq!(AssetKind::from_path("//fonts/Inter.ttf"), AssetKind::Font);
	assert_eq!(AssetKind::from_path("//cache/"), AssetKind::Cache);
	assert_eq!(AssetKind::from_path("//noext"), AssetKind::Other);
	assert_eq!(AssetKind::Library.as_str(), "library");
}
