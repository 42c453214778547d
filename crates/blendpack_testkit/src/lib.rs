//! Shared test helpers for workspace crates.
//!
//! [`BlendBuilder`] writes small but structurally valid `.blend` files: a
//! header, data blocks laid out against a synthetic SDNA catalog, a `DNA1`
//! block and the `ENDB` terminator.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Byte order written into synthetic files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
	/// Little-endian (`v`).
	Little,
	/// Big-endian (`V`).
	Big,
}

/// Header flavour written by [`BlendBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
	/// 12-byte `BLENDER_v279` style header.
	Legacy {
		/// Pointer width, 4 or 8.
		pointer_size: usize,
		/// Byte order.
		endian: Endian,
	},
	/// 17-byte `BLENDER17-01v0500` header with large block headers.
	V1,
}

#[derive(Debug, Clone)]
struct StructDef {
	name: String,
	fields: Vec<(String, String)>,
}

/// Synthetic SDNA catalog: primitive sizes plus struct declarations.
#[derive(Debug, Clone)]
pub struct Catalog {
	primitives: Vec<(String, u16)>,
	structs: Vec<StructDef>,
}

impl Default for Catalog {
	fn default() -> Self {
		let primitives = [
			("char", 1),
			("uchar", 1),
			("short", 2),
			("ushort", 2),
			("int", 4),
			("float", 4),
			("int64_t", 8),
			("uint64_t", 8),
			("double", 8),
			("void", 0),
		];
		Self {
			primitives: primitives.iter().map(|(name, size)| ((*name).to_owned(), *size)).collect(),
			structs: Vec::new(),
		}
	}
}

/// Resolved location of one field inside a struct payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpot {
	/// Byte offset from the start of the outermost struct.
	pub offset: usize,
	/// Size of one element.
	pub elem_size: usize,
	/// Number of inline array elements.
	pub count: usize,
	/// Whether the field is a pointer.
	pub is_ptr: bool,
}

impl Catalog {
	/// Declare (or replace) a struct with `(type, declarator)` fields.
	pub fn def(&mut self, name: &str, fields: &[(&str, &str)]) -> &mut Self {
		let fields = fields.iter().map(|(ty, decl)| ((*ty).to_owned(), (*decl).to_owned())).collect();
		if let Some(existing) = self.structs.iter_mut().find(|item| item.name == name) {
			existing.fields = fields;
		} else {
			self.structs.push(StructDef { name: name.to_owned(), fields });
		}
		self
	}

	/// Return the struct declaration index, usable as a block SDNA number.
	pub fn sdna(&self, name: &str) -> u32 {
		self.structs
			.iter()
			.position(|item| item.name == name)
			.unwrap_or_else(|| panic!("struct {name} is not declared")) as u32
	}

	/// Byte size of a named type for a given pointer width.
	pub fn type_size(&self, name: &str, pointer_size: usize) -> usize {
		if let Some((_, size)) = self.primitives.iter().find(|(prim, _)| prim == name) {
			return usize::from(*size);
		}
		let def = self
			.structs
			.iter()
			.find(|item| item.name == name)
			.unwrap_or_else(|| panic!("type {name} is not declared"));
		def.fields.iter().map(|(ty, decl)| self.field_size(ty, decl, pointer_size)).sum()
	}

	fn field_size(&self, ty: &str, decl: &str, pointer_size: usize) -> usize {
		let parsed = Decl::parse(decl);
		let elem = if parsed.is_ptr { pointer_size } else { self.type_size(ty, pointer_size) };
		elem * parsed.count
	}

	/// Locate a (possibly nested) field path inside `struct_name`.
	pub fn locate(&self, struct_name: &str, path: &[&str], pointer_size: usize) -> FieldSpot {
		let mut current = struct_name.to_owned();
		let mut base = 0_usize;
		for (depth, segment) in path.iter().enumerate() {
			let def = self
				.structs
				.iter()
				.find(|item| item.name == current)
				.unwrap_or_else(|| panic!("struct {current} is not declared"));
			let mut offset = 0_usize;
			let mut found = None;
			for (ty, decl) in &def.fields {
				let parsed = Decl::parse(decl);
				if parsed.ident == *segment {
					found = Some((ty.clone(), parsed));
					break;
				}
				offset += self.field_size(ty, decl, pointer_size);
			}
			let (ty, parsed) = found.unwrap_or_else(|| panic!("field {segment} not found on {current}"));
			base += offset;
			if depth + 1 == path.len() {
				let elem_size = if parsed.is_ptr { pointer_size } else { self.type_size(&ty, pointer_size) };
				return FieldSpot {
					offset: base,
					elem_size,
					count: parsed.count,
					is_ptr: parsed.is_ptr,
				};
			}
			current = ty;
		}
		panic!("empty field path");
	}
}

struct Decl<'a> {
	ident: &'a str,
	is_ptr: bool,
	count: usize,
}

impl<'a> Decl<'a> {
	fn parse(raw: &'a str) -> Self {
		if let Some(rest) = raw.strip_prefix("(*") {
			let ident = rest.split(')').next().unwrap_or(rest);
			return Self { ident, is_ptr: true, count: 1 };
		}
		let is_ptr = raw.starts_with('*');
		let tail = raw.trim_start_matches('*');
		let ident_end = tail.find('[').unwrap_or(tail.len());
		let ident = &tail[..ident_end];
		let mut count = 1_usize;
		let mut dims = &tail[ident_end..];
		while let Some(start) = dims.find('[') {
			let Some(end) = dims[start..].find(']') else {
				break;
			};
			count *= dims[start + 1..start + end].parse::<usize>().unwrap_or(1);
			dims = &dims[start + end + 1..];
		}
		Self { ident, is_ptr, count }
	}
}

/// Compact Blender-like catalog covering the structs the tracer reads.
pub fn blend_dna() -> Catalog {
	let mut dna = Catalog::default();
	dna.def("ListBase", &[("void", "*first"), ("void", "*last")])
		.def(
			"ID",
			&[("void", "*next"), ("void", "*prev"), ("Library", "*lib"), ("char", "name[66]"), ("short", "flag")],
		)
		.def("PackedFile", &[("int", "size"), ("int", "seek"), ("void", "*data")])
		.def("Library", &[("ID", "id"), ("char", "filepath[1024]"), ("PackedFile", "*packedfile")])
		.def(
			"FileGlobal",
			&[
				("char", "subvstr[4]"),
				("short", "subversion"),
				("short", "minversion"),
				("short", "minsubversion"),
				("short", "pad"),
				("Scene", "*curscene"),
			],
		)
		.def("bAction", &[("ID", "id")])
		.def("AnimData", &[("bAction", "*action")])
		.def(
			"Image",
			&[
				("ID", "id"),
				("AnimData", "*adt"),
				("char", "filepath[1024]"),
				("short", "source"),
				("short", "pad"),
				("PackedFile", "*packedfile"),
			],
		)
		.def("MTex", &[("short", "texco"), ("short", "mapto"), ("Tex", "*tex"), ("Object", "*object")])
		.def("Tex", &[("ID", "id"), ("AnimData", "*adt"), ("bNodeTree", "*nodetree"), ("Image", "*ima")])
		.def("Material", &[("ID", "id"), ("AnimData", "*adt"), ("bNodeTree", "*nodetree")])
		.def(
			"World",
			&[("ID", "id"), ("AnimData", "*adt"), ("bNodeTree", "*nodetree"), ("MTex", "*mtex[18]")],
		)
		.def("Light", &[("ID", "id"), ("AnimData", "*adt"), ("bNodeTree", "*nodetree")])
		.def("Camera", &[("ID", "id"), ("AnimData", "*adt")])
		.def("bArmature", &[("ID", "id"), ("AnimData", "*adt")])
		.def("Mask", &[("ID", "id")])
		.def("bNodeTree", &[("ID", "id"), ("AnimData", "*adt"), ("ListBase", "nodes")])
		.def(
			"bNode",
			&[
				("bNode", "*next"),
				("bNode", "*prev"),
				("ListBase", "inputs"),
				("ListBase", "outputs"),
				("char", "idname[64]"),
				("ID", "*id"),
				("void", "*storage"),
				("short", "type"),
				("short", "flag"),
				("int", "pad"),
			],
		)
		.def(
			"bNodeSocket",
			&[
				("bNodeSocket", "*next"),
				("bNodeSocket", "*prev"),
				("char", "identifier[64]"),
				("void", "*default_value"),
				("short", "type"),
				("short", "flag"),
				("int", "pad"),
			],
		)
		.def("bNodeSocketValueObject", &[("Object", "*value")])
		.def("bNodeSocketValueImage", &[("Image", "*value")])
		.def("bNodeSocketValueCollection", &[("Collection", "*value")])
		.def("bNodeSocketValueTexture", &[("Tex", "*value")])
		.def("bNodeSocketValueMaterial", &[("Material", "*value")])
		.def("NodeShaderTexIES", &[("int", "mode"), ("char", "filepath[1024]")])
		.def("NodeShaderScript", &[("int", "mode"), ("int", "flag"), ("char", "filepath[1024]")])
		.def(
			"Mesh",
			&[
				("ID", "id"),
				("AnimData", "*adt"),
				("Material", "**mat"),
				("short", "totcol"),
				("short", "pad"),
				("int", "pad2"),
				("Mesh", "*texcomesh"),
			],
		)
		.def(
			"Curve",
			&[
				("ID", "id"),
				("AnimData", "*adt"),
				("Material", "**mat"),
				("short", "totcol"),
				("short", "pad"),
				("int", "pad2"),
				("VFont", "*vfont"),
				("VFont", "*vfontb"),
				("VFont", "*vfonti"),
				("VFont", "*vfontbi"),
				("Object", "*bevobj"),
				("Object", "*taperobj"),
				("Object", "*textoncurve"),
			],
		)
		.def(
			"MetaBall",
			&[("ID", "id"), ("AnimData", "*adt"), ("Material", "**mat"), ("short", "totcol"), ("short", "pad"), ("int", "pad2")],
		)
		.def("VFont", &[("ID", "id"), ("char", "filepath[1024]"), ("PackedFile", "*packedfile")])
		.def("bSound", &[("ID", "id"), ("char", "filepath[1024]"), ("PackedFile", "*packedfile")])
		.def("MovieClip", &[("ID", "id"), ("AnimData", "*adt"), ("char", "filepath[1024]"), ("int", "source"), ("int", "pad")])
		.def("CacheFile", &[("ID", "id"), ("char", "filepath[1024]"), ("char", "is_sequence"), ("char", "pad[7]")])
		.def(
			"Volume",
			&[
				("ID", "id"),
				("char", "filepath[1024]"),
				("PackedFile", "*packedfile"),
				("char", "is_sequence"),
				("char", "pad[7]"),
			],
		)
		.def(
			"Object",
			&[
				("ID", "id"),
				("AnimData", "*adt"),
				("void", "*data"),
				("Material", "**mat"),
				("short", "totcol"),
				("short", "transflag"),
				("int", "pad"),
				("Collection", "*instance_collection"),
				("Object", "*proxy"),
				("Object", "*proxy_group"),
				("bPose", "*pose"),
				("ListBase", "particlesystem"),
				("ListBase", "modifiers"),
			],
		)
		.def("bPose", &[("ListBase", "chanbase")])
		.def(
			"bPoseChannel",
			&[("bPoseChannel", "*next"), ("bPoseChannel", "*prev"), ("char", "name[64]"), ("Object", "*custom")],
		)
		.def(
			"ParticleSystem",
			&[
				("ParticleSystem", "*next"),
				("ParticleSystem", "*prev"),
				("ParticleSettings", "*part"),
				("PointCache", "*pointcache"),
				("char", "name[64]"),
			],
		)
		.def("PointCache", &[("int", "flag"), ("int", "pad"), ("char", "name[64]"), ("char", "path[1024]")])
		.def(
			"ParticleSettings",
			&[
				("ID", "id"),
				("AnimData", "*adt"),
				("short", "ren_as"),
				("short", "pad"),
				("int", "pad2"),
				("Collection", "*instance_collection"),
				("Object", "*instance_object"),
			],
		)
		.def(
			"ModifierData",
			&[("ModifierData", "*next"), ("ModifierData", "*prev"), ("int", "type"), ("int", "mode"), ("char", "name[64]")],
		)
		.def("NodesModifierSettings", &[("IDProperty", "*properties")])
		.def(
			"NodesModifierData",
			&[("ModifierData", "modifier"), ("bNodeTree", "*node_group"), ("NodesModifierSettings", "settings")],
		)
		.def("IDPropertyData", &[("void", "*pointer"), ("ListBase", "group"), ("int", "val"), ("int", "val2")])
		.def(
			"IDProperty",
			&[
				("IDProperty", "*next"),
				("IDProperty", "*prev"),
				("char", "type"),
				("char", "subtype"),
				("short", "flag"),
				("char", "name[64]"),
				("int", "pad"),
				("IDPropertyData", "data"),
			],
		)
		.def("MeshCacheModifierData", &[("ModifierData", "modifier"), ("char", "filepath[1024]")])
		.def(
			"OceanModifierData",
			&[("ModifierData", "modifier"), ("char", "cachepath[1024]"), ("char", "cached"), ("char", "pad[7]")],
		)
		.def("FluidDomainSettings", &[("char", "cache_directory[1024]")])
		.def("FluidModifierData", &[("ModifierData", "modifier"), ("FluidDomainSettings", "*domain")])
		.def("Collection", &[("ID", "id"), ("ListBase", "gobject"), ("ListBase", "children")])
		.def("CollectionObject", &[("CollectionObject", "*next"), ("CollectionObject", "*prev"), ("Object", "*ob")])
		.def(
			"CollectionChild",
			&[("CollectionChild", "*next"), ("CollectionChild", "*prev"), ("Collection", "*collection")],
		)
		.def("Base", &[("Base", "*next"), ("Base", "*prev"), ("Object", "*object")])
		.def("Editing", &[("ListBase", "seqbase")])
		.def("StripElem", &[("char", "name[256]"), ("int", "orx"), ("int", "ory")])
		.def("StripData", &[("char", "dir[768]"), ("StripElem", "*stripdata")])
		.def(
			"Strip",
			&[
				("Strip", "*next"),
				("Strip", "*prev"),
				("StripData", "*data"),
				("char", "name[64]"),
				("int", "type"),
				("int", "pad"),
				("Scene", "*scene"),
				("MovieClip", "*clip"),
				("Mask", "*mask"),
				("bSound", "*sound"),
				("ListBase", "seqbase"),
			],
		)
		.def(
			"Scene",
			&[
				("ID", "id"),
				("AnimData", "*adt"),
				("Object", "*camera"),
				("World", "*world"),
				("Scene", "*set"),
				("bNodeTree", "*nodetree"),
				("bNodeTree", "*compositing_node_group"),
				("MovieClip", "*clip"),
				("ListBase", "base"),
				("Collection", "*master_collection"),
				("Editing", "*ed"),
			],
		);
	dna
}

/// Zero-initialised struct payload with path-based setters.
#[derive(Debug, Clone)]
pub struct Record {
	struct_name: String,
	catalog: Catalog,
	pointer_size: usize,
	endian: Endian,
	bytes: Vec<u8>,
}

impl Record {
	/// Write a pointer value into a pointer field.
	pub fn ptr(&mut self, path: &[&str], addr: u64) -> &mut Self {
		self.ptr_at(path, 0, addr)
	}

	/// Write one element of a fixed pointer array (`*mtex[18]`).
	pub fn ptr_at(&mut self, path: &[&str], index: usize, addr: u64) -> &mut Self {
		let spot = self.catalog.locate(&self.struct_name, path, self.pointer_size);
		assert!(spot.is_ptr, "{path:?} is not a pointer field");
		assert!(index < spot.count, "{path:?} index {index} out of range");
		let at = spot.offset + index * self.pointer_size;
		let raw = encode_uint(addr, self.pointer_size, self.endian);
		self.bytes[at..at + self.pointer_size].copy_from_slice(&raw);
		self
	}

	/// Write an integer into a 1/2/4/8-byte primitive field.
	pub fn int(&mut self, path: &[&str], value: i64) -> &mut Self {
		let spot = self.catalog.locate(&self.struct_name, path, self.pointer_size);
		let raw = encode_uint(value as u64, spot.elem_size, self.endian);
		self.bytes[spot.offset..spot.offset + spot.elem_size].copy_from_slice(&raw);
		self
	}

	/// Write a NUL-terminated string into a char array field.
	pub fn string(&mut self, path: &[&str], value: &str) -> &mut Self {
		let spot = self.catalog.locate(&self.struct_name, path, self.pointer_size);
		let capacity = spot.elem_size * spot.count;
		let take = value.len().min(capacity.saturating_sub(1));
		let field = &mut self.bytes[spot.offset..spot.offset + capacity];
		field.fill(0);
		field[..take].copy_from_slice(&value.as_bytes()[..take]);
		self
	}

	/// Shorthand for `string(&["id", "name"], name)`.
	pub fn id_name(&mut self, name: &str) -> &mut Self {
		self.string(&["id", "name"], name)
	}

	/// Raw payload bytes.
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}
}

#[derive(Debug, Clone)]
struct RawBlock {
	code: [u8; 4],
	sdna: u32,
	old: u64,
	nr: u64,
	payload: Vec<u8>,
}

/// Builder for synthetic `.blend` files.
#[derive(Debug, Clone)]
pub struct BlendBuilder {
	header: HeaderKind,
	version: u16,
	subversion: Option<u16>,
	curscene: u64,
	catalog: Catalog,
	blocks: Vec<RawBlock>,
}

impl Default for BlendBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl BlendBuilder {
	/// v1 header, version 500, little-endian 8-byte pointers, [`blend_dna`] catalog.
	pub fn new() -> Self {
		Self {
			header: HeaderKind::V1,
			version: 500,
			subversion: None,
			curscene: 0,
			catalog: blend_dna(),
			blocks: Vec::new(),
		}
	}

	/// Legacy header with explicit pointer width, byte order and version.
	pub fn legacy(pointer_size: usize, endian: Endian, version: u16) -> Self {
		assert!(pointer_size == 4 || pointer_size == 8);
		Self {
			header: HeaderKind::Legacy { pointer_size, endian },
			version,
			..Self::new()
		}
	}

	/// Set the three/four digit version stored in the header.
	pub fn version(mut self, version: u16) -> Self {
		self.version = version;
		self
	}

	/// Emit a `GLOB` block carrying this subversion.
	pub fn subversion(mut self, subversion: u16) -> Self {
		self.subversion = Some(subversion);
		self
	}

	/// Emit a `GLOB` block whose `curscene` points at `addr`.
	pub fn curscene(mut self, addr: u64) -> Self {
		self.curscene = addr;
		self
	}

	/// Mutable access to the SDNA catalog before records are created.
	pub fn catalog_mut(&mut self) -> &mut Catalog {
		&mut self.catalog
	}

	/// Pointer width for this file.
	pub fn pointer_size(&self) -> usize {
		match self.header {
			HeaderKind::Legacy { pointer_size, .. } => pointer_size,
			HeaderKind::V1 => 8,
		}
	}

	fn endian(&self) -> Endian {
		match self.header {
			HeaderKind::Legacy { endian, .. } => endian,
			HeaderKind::V1 => Endian::Little,
		}
	}

	/// Create a zeroed payload for `struct_name`.
	pub fn record(&self, struct_name: &str) -> Record {
		let size = self.catalog.type_size(struct_name, self.pointer_size());
		Record {
			struct_name: struct_name.to_owned(),
			catalog: self.catalog.clone(),
			pointer_size: self.pointer_size(),
			endian: self.endian(),
			bytes: vec![0; size],
		}
	}

	/// Append a struct block. Two-letter codes are NUL padded.
	pub fn push(&mut self, code: &str, old: u64, record: &Record) -> &mut Self {
		let sdna = self.catalog.sdna(&record.struct_name);
		self.blocks.push(RawBlock {
			code: code4(code),
			sdna,
			old,
			nr: 1,
			payload: record.bytes.clone(),
		});
		self
	}

	/// Append a `DATA` block holding consecutive pointer values.
	pub fn pointer_array(&mut self, old: u64, addrs: &[u64]) -> &mut Self {
		let mut payload = Vec::new();
		for addr in addrs {
			payload.extend_from_slice(&encode_uint(*addr, self.pointer_size(), self.endian()));
		}
		self.blocks.push(RawBlock {
			code: *b"DATA",
			sdna: 0,
			old,
			nr: addrs.len() as u64,
			payload,
		});
		self
	}

	/// Append an arbitrary raw block.
	pub fn raw(&mut self, code: &str, sdna: u32, old: u64, payload: Vec<u8>) -> &mut Self {
		self.blocks.push(RawBlock {
			code: code4(code),
			sdna,
			old,
			nr: 1,
			payload,
		});
		self
	}

	/// Serialize header, blocks, `DNA1` and `ENDB`.
	pub fn build(&self) -> Vec<u8> {
		let mut out = Vec::new();
		let endian = self.endian();
		match self.header {
			HeaderKind::Legacy { pointer_size, endian } => {
				out.extend_from_slice(b"BLENDER");
				out.push(if pointer_size == 4 { b'_' } else { b'-' });
				out.push(if endian == Endian::Little { b'v' } else { b'V' });
				out.extend_from_slice(format!("{:03}", self.version).as_bytes());
			}
			HeaderKind::V1 => {
				out.extend_from_slice(b"BLENDER17-01v");
				out.extend_from_slice(format!("{:04}", self.version).as_bytes());
			}
		}

		if self.subversion.is_some() || self.curscene != 0 {
			let mut glob = self.record("FileGlobal");
			glob.int(&["subversion"], i64::from(self.subversion.unwrap_or(0)));
			glob.ptr(&["curscene"], self.curscene);
			let sdna = self.catalog.sdna("FileGlobal");
			self.write_block(&mut out, &RawBlock {
				code: *b"GLOB",
				sdna,
				old: 0x7fff_0000,
				nr: 1,
				payload: glob.bytes,
			});
		}

		for block in &self.blocks {
			self.write_block(&mut out, block);
		}

		let dna = self.dna_payload(endian);
		self.write_block(&mut out, &RawBlock {
			code: *b"DNA1",
			sdna: 0,
			old: 0,
			nr: 1,
			payload: dna,
		});
		self.write_block(&mut out, &RawBlock {
			code: *b"ENDB",
			sdna: 0,
			old: 0,
			nr: 0,
			payload: Vec::new(),
		});
		out
	}

	/// Write the built file to `path` and return it.
	pub fn write(&self, path: impl AsRef<Path>) -> PathBuf {
		let path = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).expect("create parent dir");
		}
		std::fs::write(&path, self.build()).expect("write blend");
		path
	}

	fn write_block(&self, out: &mut Vec<u8>, block: &RawBlock) {
		let endian = self.endian();
		out.extend_from_slice(&block.code);
		match self.header {
			HeaderKind::Legacy { pointer_size, .. } => {
				out.extend_from_slice(&encode_uint(block.payload.len() as u64, 4, endian));
				out.extend_from_slice(&encode_uint(block.old, pointer_size, endian));
				out.extend_from_slice(&encode_uint(u64::from(block.sdna), 4, endian));
				out.extend_from_slice(&encode_uint(block.nr, 4, endian));
			}
			HeaderKind::V1 => {
				out.extend_from_slice(&encode_uint(u64::from(block.sdna), 4, endian));
				out.extend_from_slice(&encode_uint(block.old, 8, endian));
				out.extend_from_slice(&encode_uint(block.payload.len() as u64, 8, endian));
				out.extend_from_slice(&encode_uint(block.nr, 8, endian));
			}
		}
		out.extend_from_slice(&block.payload);
	}

	fn dna_payload(&self, endian: Endian) -> Vec<u8> {
		let pointer_size = self.pointer_size();
		let mut types: Vec<String> = self.catalog.primitives.iter().map(|(name, _)| name.clone()).collect();
		for def in &self.catalog.structs {
			if !types.contains(&def.name) {
				types.push(def.name.clone());
			}
		}
		// Referenced-but-undeclared struct names become opaque zero-size types.
		for def in &self.catalog.structs {
			for (ty, _) in &def.fields {
				if !types.contains(ty) {
					types.push(ty.clone());
				}
			}
		}
		let type_index: HashMap<&str, u16> = types.iter().enumerate().map(|(idx, name)| (name.as_str(), idx as u16)).collect();

		let mut names: Vec<String> = Vec::new();
		let mut name_index: HashMap<String, u16> = HashMap::new();
		let mut strc = Vec::new();
		for def in &self.catalog.structs {
			strc.extend_from_slice(&encode_uint(u64::from(type_index[def.name.as_str()]), 2, endian));
			strc.extend_from_slice(&encode_uint(def.fields.len() as u64, 2, endian));
			for (ty, decl) in &def.fields {
				let name_idx = *name_index.entry(decl.clone()).or_insert_with(|| {
					names.push(decl.clone());
					(names.len() - 1) as u16
				});
				strc.extend_from_slice(&encode_uint(u64::from(type_index[ty.as_str()]), 2, endian));
				strc.extend_from_slice(&encode_uint(u64::from(name_idx), 2, endian));
			}
		}

		let mut out = Vec::new();
		out.extend_from_slice(b"SDNA");
		out.extend_from_slice(b"NAME");
		out.extend_from_slice(&encode_uint(names.len() as u64, 4, endian));
		for name in &names {
			out.extend_from_slice(name.as_bytes());
			out.push(0);
		}
		pad4(&mut out);

		out.extend_from_slice(b"TYPE");
		out.extend_from_slice(&encode_uint(types.len() as u64, 4, endian));
		for name in &types {
			out.extend_from_slice(name.as_bytes());
			out.push(0);
		}
		pad4(&mut out);

		out.extend_from_slice(b"TLEN");
		for name in &types {
			let declared = self.catalog.primitives.iter().any(|(prim, _)| prim == name) || self.catalog.structs.iter().any(|def| &def.name == name);
			let size = if declared { self.catalog.type_size(name, pointer_size) } else { 0 };
			out.extend_from_slice(&encode_uint(size as u64, 2, endian));
		}
		pad4(&mut out);

		out.extend_from_slice(b"STRC");
		out.extend_from_slice(&encode_uint(self.catalog.structs.len() as u64, 4, endian));
		out.extend_from_slice(&strc);
		out
	}
}

fn pad4(out: &mut Vec<u8>) {
	while out.len() % 4 != 0 {
		out.push(0);
	}
}

fn code4(code: &str) -> [u8; 4] {
	assert!(code.len() <= 4, "block code {code} longer than 4 bytes");
	let mut out = [0_u8; 4];
	out[..code.len()].copy_from_slice(code.as_bytes());
	out
}

fn encode_uint(value: u64, size: usize, endian: Endian) -> Vec<u8> {
	let bytes = match endian {
		Endian::Little => value.to_le_bytes(),
		Endian::Big => value.to_be_bytes(),
	};
	match endian {
		Endian::Little => bytes[..size].to_vec(),
		Endian::Big => bytes[8 - size..].to_vec(),
	}
}

/// Wrap bytes in a gzip stream.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
	let mut encoder = libflate::gzip::Encoder::new(Vec::new()).expect("gzip encoder");
	encoder.write_all(bytes).expect("gzip write");
	encoder.finish().into_result().expect("gzip finish")
}

/// Wrap bytes in a zstd frame.
pub fn zstd(bytes: &[u8]) -> Vec<u8> {
	zstd::encode_all(bytes, 3).expect("zstd encode")
}

/// Write `bytes` to `path`, creating parent directories.
pub fn write_file(path: impl AsRef<Path>, bytes: &[u8]) -> PathBuf {
	let path = path.as_ref().to_path_buf();
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).expect("create parent dir");
	}
	std::fs::write(&path, bytes).expect("write file");
	path
}
