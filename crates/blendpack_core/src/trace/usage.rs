//! External file paths stored on datablocks.

use std::iter;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::blend::Block;
use crate::trace::bpath;
use crate::trace::cdefs::{
	IMA_SRC_GENERATED, IMA_SRC_SEQUENCE, IMA_SRC_TILED, IMA_SRC_VIEWER, MCLIP_SRC_SEQUENCE, MOD_FLUID, MOD_MESH_CACHE, MOD_OCEAN, NODE_EXTERNAL,
	PTCACHE_DISK_CACHE, PTCACHE_EXTERNAL, SEQ_TYPE_IMAGE, SEQ_TYPE_MOVIE, SEQ_TYPE_SOUND_HD,
};
use crate::trace::expand::{BlockKind, STRIP_DATA, StripIter};
use crate::trace::sequence::{expand_sequence, udim_tiles};
use crate::trace::session::TraceCtx;

const PATH_FIELDS: &[&str] = &["filepath", "name"];
const BUILTIN_FONT: &[u8] = b"<builtin>";
const EXTERNAL_NODES: &[&str] = &["ShaderNodeTexIES", "ShaderNodeScript"];

/// Broad asset family derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
	/// Still images and texture tiles.
	Image,
	/// Video containers.
	Movie,
	/// Audio files.
	Sound,
	/// OpenVDB volumes.
	Volume,
	/// Simulation and geometry caches, cache directories.
	Cache,
	/// Fonts.
	Font,
	/// IES light profiles.
	Ies,
	/// Linked `.blend` libraries.
	Library,
	/// Scripts and text.
	Text,
	/// Anything else.
	Other,
}

impl AssetKind {
	/// Classify a stored path. A trailing separator marks a cache directory.
	pub fn from_path(raw: &str) -> Self {
		if raw.ends_with('/') || raw.ends_with('\\') {
			return Self::Cache;
		}
		let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
		let Some((_, ext)) = name.rsplit_once('.') else {
			return Self::Other;
		};
		match ext.to_ascii_lowercase().as_str() {
			"png" | "jpg" | "jpeg" | "tga" | "tif" | "tiff" | "exr" | "hdr" | "bmp" | "dds" | "psd" | "webp" | "jp2" | "j2c" | "cin" | "dpx" | "rgb"
			| "sgi" => Self::Image,
			"mp4" | "mov" | "avi" | "mkv" | "webm" | "mpg" | "mpeg" | "m4v" | "ogv" | "flv" => Self::Movie,
			"wav" | "mp3" | "ogg" | "flac" | "aac" | "m4a" | "aif" | "aiff" => Self::Sound,
			"vdb" => Self::Volume,
			"abc" | "usd" | "usda" | "usdc" | "usdz" | "pc2" | "mdd" | "bphys" => Self::Cache,
			"ttf" | "otf" | "pfb" | "woff" | "woff2" => Self::Font,
			"ies" => Self::Ies,
			"blend" => Self::Library,
			"py" | "osl" | "txt" => Self::Text,
			_ => Self::Other,
		}
	}

	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Image => "image",
			Self::Movie => "movie",
			Self::Sound => "sound",
			Self::Volume => "volume",
			Self::Cache => "cache",
			Self::Font => "font",
			Self::Ies => "ies",
			Self::Library => "library",
			Self::Text => "text",
			Self::Other => "other",
		}
	}
}

/// What a char-array slot stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotStyle {
	/// A complete path.
	FullPath,
	/// Only the directory half; the file name lives elsewhere.
	DirOnly,
}

/// Location of a stored path inside its decoded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathSlot {
	/// Absolute offset of the char array.
	pub offset: usize,
	/// Char array capacity including the NUL terminator.
	pub capacity: usize,
	/// Stored content.
	pub style: SlotStyle,
}

/// One external file reference found on a block.
#[derive(Debug, Clone, Serialize)]
pub struct Usage {
	/// Document that stores the path.
	pub doc: PathBuf,
	/// Code of the owning block (`IM`, `OB`, `DATA`, ...).
	pub block_code: String,
	/// `ID.name` of the owning block, when it is an ID.
	pub id_name: Option<String>,
	/// Stored path text.
	pub raw: String,
	/// Absolute, lexically normalized path.
	pub path: PathBuf,
	/// Frame sequence, tile set or cache directory.
	pub is_sequence: bool,
	/// Absence is expected and never reported as missing.
	pub is_optional: bool,
	/// Asset family.
	pub kind: AssetKind,
	/// Field holding the path; synthesized paths have none.
	pub slot: Option<PathSlot>,
}

impl Usage {
	fn new(owner: Block<'_>, raw: &[u8], flags: Flags, slot: Option<PathSlot>) -> Self {
		let text = String::from_utf8_lossy(raw).into_owned();
		Self {
			doc: owner.file().path().to_path_buf(),
			block_code: owner.record().head.code_str(),
			id_name: owner.id_name(),
			path: bpath::resolve(raw, owner.file().dir()),
			kind: AssetKind::from_path(&text),
			raw: text,
			is_sequence: flags.sequence,
			is_optional: flags.optional,
			slot,
		}
	}

	/// Whether the stored path is `//`-relative.
	pub fn is_blend_relative(&self) -> bool {
		bpath::is_blend_relative(self.raw.as_bytes())
	}

	/// Concrete files this usage stands for.
	///
	/// Sequences expand lazily; an unmatched pattern yields itself once. Plain
	/// paths that name one tile of a UDIM set yield every sibling tile.
	pub fn files(&self) -> Box<dyn Iterator<Item = PathBuf>> {
		if self.is_sequence {
			return Box::new(expand_sequence(&self.path));
		}
		match udim_tiles(&self.path) {
			Some(tiles) => Box::new(tiles.into_iter()),
			None => Box::new(iter::once(self.path.clone())),
		}
	}
}

#[derive(Debug, Clone, Copy)]
struct Flags {
	sequence: bool,
	optional: bool,
}

impl Flags {
	const PLAIN: Self = Self {
		sequence: false,
		optional: false,
	};
	const CACHE: Self = Self {
		sequence: true,
		optional: true,
	};

	fn sequence(sequence: bool) -> Self {
		Self { sequence, optional: false }
	}
}

/// Every external path stored on `block`.
pub fn collect<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> Vec<Usage> {
	match BlockKind::of(&block) {
		BlockKind::Object => return object_usages(ctx, block),
		BlockKind::Scene => return strip_usages(ctx, block),
		BlockKind::NodeTree => return node_usages(ctx, block),
		BlockKind::Placeholder => return Vec::new(),
		_ => {}
	}
	let Some(code) = block.record().head.id_code() else {
		return Vec::new();
	};
	let usage = match &code {
		b"IM" => image_usage(ctx, block),
		b"LI" => {
			let optional = is_packed(&block);
			path_usage(ctx, block, PATH_FIELDS, Flags { sequence: false, optional })
		}
		b"SO" if !is_packed(&block) => path_usage(ctx, block, PATH_FIELDS, Flags::PLAIN),
		b"VF" if !is_packed(&block) => path_usage(ctx, block, PATH_FIELDS, Flags::PLAIN).filter(|usage| usage.raw.as_bytes() != BUILTIN_FONT),
		b"MC" => {
			let sequence = ctx.int(block, "source") == Some(MCLIP_SRC_SEQUENCE);
			path_usage(ctx, block, PATH_FIELDS, Flags::sequence(sequence))
		}
		b"CF" => {
			let sequence = ctx.int(block, "is_sequence").unwrap_or(0) != 0;
			path_usage(ctx, block, &["filepath"], Flags::sequence(sequence))
		}
		b"VO" if !is_packed(&block) => {
			let sequence = ctx.int(block, "is_sequence").unwrap_or(0) != 0;
			path_usage(ctx, block, &["filepath"], Flags::sequence(sequence))
		}
		_ => None,
	};
	usage.into_iter().collect()
}

/// Absolute path of the document an `LI` block names.
pub fn library_path<'a>(ctx: TraceCtx<'a>, library: Block<'a>) -> Option<PathBuf> {
	let field = ctx.pick(library, PATH_FIELDS)?;
	let raw = library.get_path_bytes(field).ok().filter(|raw| !raw.is_empty())?;
	Some(bpath::resolve(raw, library.file().dir()))
}

/// Whether the block's file data is packed into its document.
pub fn is_packed(block: &Block<'_>) -> bool {
	block.get_ptr("packedfile").is_ok_and(|addr| addr != 0)
}

fn image_usage<'a>(ctx: TraceCtx<'a>, image: Block<'a>) -> Option<Usage> {
	if is_packed(&image) {
		return None;
	}
	let source = ctx.int(image, "source").unwrap_or(0);
	if matches!(source, IMA_SRC_GENERATED | IMA_SRC_VIEWER) {
		return None;
	}
	let sequence = matches!(source, IMA_SRC_SEQUENCE | IMA_SRC_TILED);
	path_usage(ctx, image, PATH_FIELDS, Flags::sequence(sequence))
}

fn path_usage<'a>(ctx: TraceCtx<'a>, block: Block<'a>, fields: &[&str], flags: Flags) -> Option<Usage> {
	let field = ctx.pick(block, fields)?;
	field_usage(block, block, field, flags)
}

/// Usage read from `holder.field`, attributed to `owner`.
fn field_usage(owner: Block<'_>, holder: Block<'_>, field: &str, flags: Flags) -> Option<Usage> {
	let raw = holder.get_path_bytes(field).ok().filter(|raw| !raw.is_empty())?;
	let span = holder.field_span(field).ok()?;
	let slot = PathSlot {
		offset: span.offset,
		capacity: span.len,
		style: SlotStyle::FullPath,
	};
	Some(Usage::new(owner, raw, flags, Some(slot)))
}

fn object_usages<'a>(ctx: TraceCtx<'a>, ob: Block<'a>) -> Vec<Usage> {
	let modifiers = ctx.list(ob, "modifiers").filter_map(|md| match ctx.int(md, ["modifier", "type"])? {
		MOD_MESH_CACHE => field_usage(ob, md, "filepath", Flags::PLAIN),
		MOD_OCEAN if ctx.int(md, "cached").unwrap_or(0) != 0 => field_usage(ob, md, "cachepath", Flags::CACHE),
		MOD_FLUID => ctx.ptr(md, "domain").and_then(|domain| field_usage(ob, domain, "cache_directory", Flags::CACHE)),
		_ => None,
	});
	let caches = ctx.list(ob, "particlesystem").filter_map(|psys| {
		let cache = ctx.ptr(psys, "pointcache")?;
		let flag = ctx.int(cache, "flag").unwrap_or(0);
		if flag & PTCACHE_EXTERNAL != 0 {
			field_usage(ob, cache, "path", Flags::sequence(true))
		} else if flag & PTCACHE_DISK_CACHE != 0 {
			let raw = disk_cache_dir(ob.file().path());
			Some(Usage::new(ob, raw.as_bytes(), Flags::CACHE, None))
		} else {
			None
		}
	});
	modifiers.chain(caches).collect()
}

/// `//blendcache_<stem>/` next to the document.
fn disk_cache_dir(doc: &Path) -> String {
	let stem = doc.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
	format!("{}blendcache_{stem}/", bpath::BLEND_RELATIVE_PREFIX)
}

fn strip_usages<'a>(ctx: TraceCtx<'a>, scene: Block<'a>) -> Vec<Usage> {
	StripIter::new(ctx, scene)
		.filter_map(|strip| match ctx.int(strip, "type")? {
			SEQ_TYPE_IMAGE => strip_usage(ctx, scene, strip, true),
			SEQ_TYPE_MOVIE | SEQ_TYPE_SOUND_HD => strip_usage(ctx, scene, strip, false),
			_ => None,
		})
		.collect()
}

/// Strip file stored as a directory field plus the first element's name.
fn strip_usage<'a>(ctx: TraceCtx<'a>, scene: Block<'a>, strip: Block<'a>, sequence: bool) -> Option<Usage> {
	let data = ctx.ptr_any(strip, STRIP_DATA)?;
	let dir = data.get_path_bytes("dir").ok()?;
	let name = ctx.ptr(data, "stripdata").and_then(|elem| elem.get_path_bytes("name").ok()).unwrap_or_default();
	if dir.is_empty() && name.is_empty() {
		return None;
	}
	let mut raw = dir.to_vec();
	if !raw.is_empty() && !raw.ends_with(b"/") && !raw.ends_with(b"\\") {
		raw.push(b'/');
	}
	raw.extend_from_slice(name);
	let span = data.field_span("dir").ok()?;
	let slot = PathSlot {
		offset: span.offset,
		capacity: span.len,
		style: SlotStyle::DirOnly,
	};
	Some(Usage::new(scene, &raw, Flags::sequence(sequence), Some(slot)))
}

fn node_usages<'a>(ctx: TraceCtx<'a>, tree: Block<'a>) -> Vec<Usage> {
	ctx.list(tree, "nodes")
		.filter(|node| node.get_string("idname").is_ok_and(|idname| EXTERNAL_NODES.contains(&idname.as_str())))
		.filter_map(|node| {
			let storage = ctx.ptr(node, "storage")?;
			if ctx.int(storage, "mode") != Some(NODE_EXTERNAL) {
				return None;
			}
			field_usage(tree, storage, "filepath", Flags::PLAIN)
		})
		.collect()
}

#[cfg(test)]
mod tests;
