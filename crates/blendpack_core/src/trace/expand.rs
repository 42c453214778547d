//! Per-datablock-type dependency expansion.
//!
//! Every expander is a lazy chain over the block's fields. Fields missing in
//! the document's version contribute no edges instead of failing the walk.

use std::collections::HashSet;
use std::iter;

use tracing::debug;

use crate::blend::{Block, ListIter};
use crate::trace::cdefs::{
	CMP_NODE_R_LAYERS, IDP_ID, MOD_MESH_SEQUENCE_CACHE, MOD_NODES, OB_DUPLIGROUP, PART_DRAW_GR, PART_DRAW_OB, SEQ_TYPE_MASK, SEQ_TYPE_META,
	SEQ_TYPE_MOVIECLIP, SEQ_TYPE_SCENE, SEQ_TYPE_SOUND_RAM, SOCK_COLLECTION, SOCK_IMAGE, SOCK_MATERIAL, SOCK_OBJECT, SOCK_TEXTURE,
};
use crate::trace::session::TraceCtx;

/// Lazy sequence of blocks one datablock depends on.
pub type Expansion<'a> = Box<dyn Iterator<Item = Block<'a>> + 'a>;

/// Candidate names across Blender versions, newest first.
pub(crate) const INSTANCE_COLLECTION: &[&str] = &["instance_collection", "dup_group"];
pub(crate) const INSTANCE_OBJECT: &[&str] = &["instance_object", "dup_ob"];
pub(crate) const NODE_TYPE: &[&str] = &["type_legacy", "type"];
pub(crate) const STRIP_DATA: &[&str] = &["data", "strip"];

/// Datablock families with a dedicated expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
	/// Bare `ID` stand-in for a linked datablock.
	Placeholder,
	/// `OB`
	Object,
	/// `MA`
	Material,
	/// `TE`
	Texture,
	/// `WO`
	World,
	/// `LA`
	Light,
	/// `NT` or any `bNodeTree` block.
	NodeTree,
	/// `ME`
	Mesh,
	/// `CU`
	Curve,
	/// `MB`
	MetaBall,
	/// `PA`
	ParticleSettings,
	/// `GR` or any `Collection` block.
	Collection,
	/// `SC`
	Scene,
	/// `AR`: animation data only.
	Armature,
	/// Anything else: no outgoing edges besides animation data.
	Other,
}

impl BlockKind {
	/// Classify a block by placeholder-ness, then ID code, then struct name.
	pub fn of(block: &Block<'_>) -> Self {
		if block.is_placeholder() {
			return Self::Placeholder;
		}
		let by_code = block.record().head.id_code().and_then(|code| match &code {
			b"OB" => Some(Self::Object),
			b"MA" => Some(Self::Material),
			b"TE" => Some(Self::Texture),
			b"WO" => Some(Self::World),
			b"LA" => Some(Self::Light),
			b"NT" => Some(Self::NodeTree),
			b"ME" => Some(Self::Mesh),
			b"CU" => Some(Self::Curve),
			b"MB" => Some(Self::MetaBall),
			b"PA" => Some(Self::ParticleSettings),
			b"GR" => Some(Self::Collection),
			b"SC" => Some(Self::Scene),
			b"AR" => Some(Self::Armature),
			_ => None,
		});
		by_code.unwrap_or_else(|| match block.struct_name() {
			"bNodeTree" => Self::NodeTree,
			"Collection" => Self::Collection,
			_ => Self::Other,
		})
	}
}

/// Blocks `block` directly depends on, in field order.
pub fn expand<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> Expansion<'a> {
	let kind = BlockKind::of(&block);
	let edges: Expansion<'a> = match kind {
		BlockKind::Placeholder => Box::new(block.library().into_iter()),
		BlockKind::Object => expand_object(ctx, block),
		BlockKind::Material | BlockKind::World | BlockKind::Light => Box::new(shading(ctx, block)),
		BlockKind::Texture => Box::new(shading(ctx, block).chain(lazy(move || ctx.ptr(block, "ima")))),
		BlockKind::NodeTree => expand_node_tree(ctx, block),
		BlockKind::Mesh => Box::new(material_slots(ctx, block).chain(lazy(move || ctx.ptr(block, "texcomesh")))),
		BlockKind::Curve => expand_curve(ctx, block),
		BlockKind::MetaBall => Box::new(material_slots(ctx, block)),
		BlockKind::ParticleSettings => expand_particle_settings(ctx, block),
		BlockKind::Collection => Box::new(CollectionWalk::new(ctx, block)),
		BlockKind::Scene => expand_scene(ctx, block),
		BlockKind::Armature => Box::new(iter::empty()),
		BlockKind::Other => {
			let code = block.record().head.code_str();
			if ctx.session().note_once(format!("kind:{code}")) {
				debug!(code = %code, struct_name = block.struct_name(), "no expander for block type");
			}
			Box::new(iter::empty())
		}
	};
	if kind != BlockKind::Placeholder && block.is_id() {
		return Box::new(animation(ctx, block).chain(edges));
	}
	edges
}

/// Defer reading until the iterator is first polled.
fn lazy<'a, F, I>(read: F) -> impl Iterator<Item = Block<'a>> + 'a
where
	F: FnOnce() -> I + 'a,
	I: IntoIterator<Item = Block<'a>> + 'a,
	I::IntoIter: 'a,
{
	iter::once(read).flat_map(|read| read())
}

fn animation<'a>(ctx: TraceCtx<'a>, id: Block<'a>) -> impl Iterator<Item = Block<'a>> + 'a {
	lazy(move || ctx.ptr(id, "adt").and_then(|adt| ctx.ptr(adt, "action")))
}

/// Embedded node tree; the field name follows the document's version gates.
fn node_tree<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> Option<Block<'a>> {
	let field = block.file().gates().field(block.struct_name(), "nodetree");
	ctx.ptr(block, field)
}

fn material_slots<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> impl Iterator<Item = Block<'a>> + 'a {
	lazy(move || {
		let count = ctx.int(block, "totcol").unwrap_or(0).max(0) as usize;
		ctx.ptr_array(block, "mat", count)
	})
}

fn texture_slots<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> impl Iterator<Item = Block<'a>> + 'a {
	lazy(move || {
		let slots = block.has_field("mtex").then(|| ctx.fixed_ptrs(block, "mtex"));
		slots.into_iter().flatten().flat_map(move |mtex| ctx.ptr(mtex, "tex").into_iter().chain(ctx.ptr(mtex, "object")))
	})
}

fn shading<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> impl Iterator<Item = Block<'a>> + 'a {
	lazy(move || node_tree(ctx, block)).chain(texture_slots(ctx, block))
}

fn expand_object<'a>(ctx: TraceCtx<'a>, ob: Block<'a>) -> Expansion<'a> {
	let direct = ["data", "proxy", "proxy_group"].into_iter().filter_map(move |field| ctx.ptr(ob, field));
	let instanced = lazy(move || {
		let flag = ctx.int(ob, "transflag").unwrap_or(0);
		(flag & OB_DUPLIGROUP != 0).then(|| ctx.ptr_any(ob, INSTANCE_COLLECTION)).flatten()
	});
	let bones = lazy(move || {
		let channels = ctx.ptr(ob, "pose").into_iter().flat_map(move |pose| ctx.list(pose, "chanbase"));
		channels.filter_map(move |channel| ctx.ptr(channel, "custom"))
	});
	let particles = lazy(move || ctx.list(ob, "particlesystem").filter_map(move |psys| ctx.ptr(psys, "part")));
	let modifiers = lazy(move || ctx.list(ob, "modifiers").flat_map(move |md| modifier_refs(ctx, md)));
	Box::new(direct.chain(material_slots(ctx, ob)).chain(instanced).chain(bones).chain(particles).chain(modifiers))
}

fn modifier_refs<'a>(ctx: TraceCtx<'a>, md: Block<'a>) -> Expansion<'a> {
	match ctx.int(md, ["modifier", "type"]) {
		Some(MOD_NODES) => {
			let group = ctx.ptr(md, "node_group");
			let props = ctx
				.ptr(md, ["settings", "properties"])
				.into_iter()
				.flat_map(move |root| ctx.list(root, ["data", "group"]))
				.filter(move |prop| ctx.int(*prop, "type") == Some(IDP_ID))
				.filter_map(move |prop| ctx.ptr(prop, ["data", "pointer"]));
			Box::new(group.into_iter().chain(props))
		}
		Some(MOD_MESH_SEQUENCE_CACHE) => Box::new(ctx.ptr(md, "cache_file").into_iter()),
		_ => Box::new(iter::empty()),
	}
}

fn expand_curve<'a>(ctx: TraceCtx<'a>, cu: Block<'a>) -> Expansion<'a> {
	const FIELDS: [&str; 7] = ["vfont", "vfontb", "vfonti", "vfontbi", "bevobj", "taperobj", "textoncurve"];
	Box::new(material_slots(ctx, cu).chain(FIELDS.into_iter().filter_map(move |field| ctx.ptr(cu, field))))
}

fn expand_particle_settings<'a>(ctx: TraceCtx<'a>, part: Block<'a>) -> Expansion<'a> {
	let instance = lazy(move || match ctx.int(part, "ren_as") {
		Some(PART_DRAW_GR) => ctx.ptr_any(part, INSTANCE_COLLECTION),
		Some(PART_DRAW_OB) => ctx.ptr_any(part, INSTANCE_OBJECT),
		_ => None,
	});
	Box::new(instance.chain(texture_slots(ctx, part)))
}

fn expand_node_tree<'a>(ctx: TraceCtx<'a>, tree: Block<'a>) -> Expansion<'a> {
	let nodes = ctx.list(tree, "nodes").filter(move |node| ctx.int_any(*node, NODE_TYPE) != Some(CMP_NODE_R_LAYERS));
	Box::new(nodes.flat_map(move |node| {
		let inputs = ctx.list(node, "inputs").filter_map(move |socket| socket_value(ctx, socket));
		ctx.ptr(node, "id").into_iter().chain(inputs)
	}))
}

fn socket_value<'a>(ctx: TraceCtx<'a>, socket: Block<'a>) -> Option<Block<'a>> {
	let kind = ctx.int(socket, "type")?;
	if !matches!(kind, SOCK_OBJECT | SOCK_IMAGE | SOCK_COLLECTION | SOCK_TEXTURE | SOCK_MATERIAL) {
		return None;
	}
	let value = ctx.ptr(socket, "default_value")?;
	ctx.ptr(value, "value")
}

fn expand_scene<'a>(ctx: TraceCtx<'a>, sce: Block<'a>) -> Expansion<'a> {
	let direct = ["camera", "world", "set", "clip"].into_iter().filter_map(move |field| ctx.ptr(sce, field));
	let tree = lazy(move || node_tree(ctx, sce));
	let bases = lazy(move || ctx.list(sce, "base").filter_map(move |base| ctx.ptr(base, "object")));
	let master = lazy(move || ctx.ptr(sce, "master_collection").into_iter().flat_map(move |coll| CollectionWalk::new(ctx, coll)));
	let strips = lazy(move || StripIter::new(ctx, sce).filter_map(move |strip| strip_ref(ctx, strip)));
	Box::new(direct.chain(tree).chain(bases).chain(master).chain(strips))
}

fn strip_ref<'a>(ctx: TraceCtx<'a>, strip: Block<'a>) -> Option<Block<'a>> {
	let field = match ctx.int(strip, "type")? {
		SEQ_TYPE_SCENE => "scene",
		SEQ_TYPE_MOVIECLIP => "clip",
		SEQ_TYPE_MASK => "mask",
		SEQ_TYPE_SOUND_RAM => "sound",
		_ => return None,
	};
	ctx.ptr(strip, field)
}

/// Objects and child collections of a collection hierarchy.
///
/// Child collections are yielded themselves and also descended into, each at
/// most once per walk.
pub struct CollectionWalk<'a> {
	ctx: TraceCtx<'a>,
	stack: Vec<Block<'a>>,
	seen: HashSet<u64>,
	ready: Vec<Block<'a>>,
}

impl<'a> CollectionWalk<'a> {
	/// Walk below `root`.
	pub fn new(ctx: TraceCtx<'a>, root: Block<'a>) -> Self {
		Self {
			ctx,
			stack: vec![root],
			seen: HashSet::from([root.addr()]),
			ready: Vec::new(),
		}
	}

	fn descend(&mut self, coll: Block<'a>) {
		let ctx = self.ctx;
		let objects = ctx.list(coll, "gobject").filter_map(|link| ctx.ptr(link, "ob"));
		let children: Vec<_> = ctx.list(coll, "children").filter_map(|link| ctx.ptr(link, "collection")).collect();
		let mut found: Vec<_> = objects.chain(children.iter().copied()).collect();
		for child in children {
			if !child.is_placeholder() && self.seen.insert(child.addr()) {
				self.stack.push(child);
			}
		}
		found.reverse();
		self.ready = found;
	}
}

impl<'a> Iterator for CollectionWalk<'a> {
	type Item = Block<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(block) = self.ready.pop() {
				return Some(block);
			}
			let coll = self.stack.pop()?;
			self.descend(coll);
		}
	}
}

/// Every strip of a scene's sequencer, meta strips descended depth-first.
pub struct StripIter<'a> {
	ctx: TraceCtx<'a>,
	lists: Vec<ListIter<'a>>,
	seen: HashSet<u64>,
}

impl<'a> StripIter<'a> {
	/// Strips of `scene`; empty when it has no sequencer data.
	pub fn new(ctx: TraceCtx<'a>, scene: Block<'a>) -> Self {
		let lists = ctx.ptr(scene, "ed").map(|ed| ctx.list(ed, "seqbase")).into_iter().collect();
		Self {
			ctx,
			lists,
			seen: HashSet::new(),
		}
	}
}

impl<'a> Iterator for StripIter<'a> {
	type Item = Block<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let list = self.lists.last_mut()?;
			let Some(strip) = list.next() else {
				self.lists.pop();
				continue;
			};
			if !self.seen.insert(strip.addr()) {
				continue;
			}
			if self.ctx.int(strip, "type") == Some(SEQ_TYPE_META) {
				self.lists.push(self.ctx.list(strip, "seqbase"));
			}
			return Some(strip);
		}
	}
}

/// Where a block's real data lives.
#[derive(Debug, Clone)]
pub enum Concrete<'a> {
	/// A block whose fields can be read directly.
	Local(Block<'a>),
	/// A placeholder whose datablock lives in the document named by `library`.
	Linked {
		/// Placeholder block in the referencing document.
		placeholder: Block<'a>,
		/// `LI` block naming the library document.
		library: Block<'a>,
		/// `ID.name` to look up inside the library.
		name: String,
	},
}

/// Resolve placeholders to the library they name, or to a concrete block of the same document.
///
/// A placeholder carrying `ID.lib` is always linked, even when the document
/// holds a local datablock of the same name. Placeholders without a library
/// or name stay local and expand to nothing.
pub fn resolve_concrete<'a>(block: Block<'a>) -> Concrete<'a> {
	if !block.is_placeholder() {
		return Concrete::Local(block);
	}
	let Some(name) = block.id_name().filter(|name| !name.is_empty()) else {
		return Concrete::Local(block);
	};
	if let Some(library) = block.library() {
		return Concrete::Linked {
			placeholder: block,
			library,
			name,
		};
	}
	Concrete::Local(block.file().find_id(&name).unwrap_or(block))
}
