use blendpack_testkit::{BlendBuilder, Endian, gzip, zstd};

use crate::blend::{BlendError, BlendFile, Compression, Endianness};

fn scene_file(builder: &mut BlendBuilder) -> Vec<u8> {
	let mut ob = builder.record("Object");
	ob.id_name("OBCube");
	builder.push("OB", 0x1000, &ob);
	let mut ma = builder.record("Material");
	ma.id_name("MAPaint");
	builder.push("MA", 0x2000, &ma);
	builder.build()
}

#[test]
fn opens_raw_gzip_and_zstd_containers() {
	let raw = scene_file(&mut BlendBuilder::new().subversion(7));
	for (bytes, expected) in [
		(raw.clone(), Compression::None),
		(gzip(&raw), Compression::Gzip),
		(zstd(&raw), Compression::Zstd),
	] {
		let file = BlendFile::from_bytes("/proj/scene.blend", bytes).expect("document opens");
		assert_eq!(file.compression, expected);
		assert_eq!(file.header.version, 500);
		assert_eq!(file.subversion(), 7);
		assert_eq!(file.bytes(), raw.as_slice());
		assert!(file.find_id("OBCube").is_some());
		assert!(file.find_id("MAPaint").is_some());
		assert!(file.find_id("OBMissing").is_none());
	}
}

#[test]
fn legacy_big_endian_32_bit_document_reads_fields() {
	let mut builder = BlendBuilder::legacy(4, Endian::Big, 279);
	let mut me = builder.record("Mesh");
	me.id_name("MEPlane").int(&["totcol"], 3).ptr(&["mat"], 0x0300);
	builder.push("ME", 0x0200, &me);
	let file = BlendFile::from_bytes("/proj/old.blend", builder.build()).expect("legacy document opens");

	assert_eq!(file.pointer_size(), 4);
	assert_eq!(file.endianness(), Endianness::Big);
	assert_eq!(file.subversion(), 0);
	let mesh = file.find_id("MEPlane").expect("mesh found");
	assert_eq!(mesh.get_int("totcol").expect("totcol"), 3);
	assert_eq!(mesh.get_ptr("mat").expect("mat"), 0x0300);
}

#[test]
fn id_blocks_include_placeholders() {
	let mut builder = BlendBuilder::new();
	let mut ob = builder.record("Object");
	ob.id_name("OBCube");
	builder.push("OB", 0x1000, &ob);
	let mut stand_in = builder.record("ID");
	stand_in.string(&["name"], "GRLinked");
	builder.push("ID", 0x1100, &stand_in);
	let file = BlendFile::from_bytes("/proj/a.blend", builder.build()).expect("opens");

	let ids: Vec<_> = file.id_blocks().map(|block| (block.id_name(), block.is_placeholder())).collect();
	assert_eq!(ids, vec![(Some("OBCube".to_owned()), false), (Some("GRLinked".to_owned()), true)]);
	assert!(file.find_id("GRLinked").is_none(), "placeholders are not concrete IDs");
}

#[test]
fn find_id_returns_the_first_concrete_block_per_name() {
	let mut builder = BlendBuilder::new();
	let mut stand_in = builder.record("ID");
	stand_in.string(&["name"], "OBCube");
	builder.push("OB", 0x1000, &stand_in);
	for addr in [0x1100, 0x1200] {
		let mut ob = builder.record("Object");
		ob.id_name("OBCube");
		builder.push("OB", addr, &ob);
	}
	let file = BlendFile::from_bytes("/proj/a.blend", builder.build()).expect("opens");

	assert_eq!(file.find_id("OBCube").map(|block| block.addr()), Some(0x1100));
}

#[test]
fn unknown_magic_is_corrupt() {
	let err = BlendFile::from_bytes("/x.blend", b"PK\x03\x04rest".to_vec()).err().expect("zip is rejected");
	assert!(matches!(err, BlendError::UnknownMagic { magic } if magic == *b"PK\x03\x04"));
	assert!(err.is_corrupt_document());
}

#[test]
fn truncated_block_is_corrupt() {
	let mut bytes = scene_file(&mut BlendBuilder::new());
	bytes.truncate(bytes.len() / 2);
	let err = BlendFile::from_bytes("/x.blend", bytes).err().expect("truncated file fails");
	assert!(err.is_corrupt_document(), "unexpected error {err}");
}

#[test]
fn document_without_catalog_is_rejected() {
	let mut bytes = b"BLENDER-v279".to_vec();
	bytes.extend_from_slice(b"ENDB");
	bytes.extend_from_slice(&[0_u8; 20]);
	let err = BlendFile::from_bytes("/x.blend", bytes).err().expect("missing DNA1 fails");
	assert!(matches!(err, BlendError::DnaNotFound));
}

#[test]
fn duplicate_addresses_are_corrupt() {
	let mut builder = BlendBuilder::new();
	let ob = builder.record("Object");
	builder.push("OB", 0x1000, &ob);
	let ma = builder.record("Material");
	builder.push("MA", 0x1000, &ma);
	let err = BlendFile::from_bytes("/x.blend", builder.build()).err().expect("collision fails");
	assert!(matches!(err, BlendError::DuplicateBlockAddress { addr: 0x1000, .. }));
}

#[test]
fn open_reads_from_disk() {
	let dir = tempfile::tempdir().expect("tempdir");
	let mut builder = BlendBuilder::new();
	let path = {
		let mut ob = builder.record("Object");
		ob.id_name("OBDisk");
		builder.push("OB", 0x1000, &ob);
		builder.write(dir.path().join("disk.blend"))
	};
	let file = BlendFile::open(&path).expect("opens from disk");
	assert_eq!(file.path(), path.as_path());
	assert_eq!(file.dir(), dir.path());
	assert!(file.find_id("OBDisk").is_some());
}
