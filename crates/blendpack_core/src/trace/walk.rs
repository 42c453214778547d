use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::CancelFlag;
use crate::blend::{BlendFile, Block};
use crate::trace::expand::{Concrete, expand, resolve_concrete};
use crate::trace::session::{BlockKey, Session, TraceCtx};
use crate::trace::usage::{self, Usage};
use crate::trace::{Result, TraceError};

/// Which blocks of the main document seed the walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceRoots {
	/// Every concrete ID datablock of the main document.
	#[default]
	AllIds,
	/// The active scene (`GLOB.curscene`), else the first scene.
	ActiveScene,
}

/// Walk settings.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
	/// Root selection.
	pub roots: TraceRoots,
	/// Polled once per visited block.
	pub cancel: CancelFlag,
}

/// Everything one trace found.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
	/// Absolute path of the main document.
	pub main: PathBuf,
	/// Blender version digits of the main document, e.g. `405`.
	pub version: u16,
	/// File usages in visit order.
	pub usages: Vec<Usage>,
	/// Libraries that failed to open, with the reader error.
	pub unreadable: BTreeMap<PathBuf, String>,
	/// Every document opened, main first.
	pub documents: Vec<PathBuf>,
	/// Distinct blocks visited.
	pub visited: usize,
}

/// Outgoing edge collected while the session is borrowed.
enum Edge {
	Local(BlockKey),
	Linked { library: PathBuf, name: String },
}

/// Walk every block reachable from the main document's roots, following
/// linked libraries, and collect the file usages of each visited block.
pub fn trace(main: &Path, options: &TraceOptions) -> Result<TraceReport> {
	let mut session = Session::new();
	let main_doc = session.open(main).map_err(|source| TraceError::MainDocument {
		path: main.to_path_buf(),
		source,
	})?;

	let mut queue: VecDeque<BlockKey> = root_blocks(session.doc(main_doc), options.roots)
		.into_iter()
		.map(|addr| BlockKey { doc: main_doc, addr })
		.collect();
	let mut visited = HashSet::new();
	let mut usages = Vec::new();
	let mut unreadable = BTreeMap::new();

	while let Some(key) = queue.pop_front() {
		if options.cancel.is_cancelled() {
			return Err(TraceError::Cancelled);
		}
		if !visited.insert(key) {
			continue;
		}
		let Some(block) = session.block(key) else {
			continue;
		};
		let ctx = TraceCtx::new(&session);
		let found = usage::collect(ctx, block);
		debug!(block = ?block, usages = found.len(), "visited block");
		usages.extend(found);
		let edges = edges_of(ctx, block);

		for edge in edges {
			let next = match edge {
				Edge::Local(next) => Some(next),
				Edge::Linked { library, name } => open_linked(&mut session, &mut unreadable, &library, &name),
			};
			if let Some(next) = next
				&& !visited.contains(&next)
			{
				queue.push_back(next);
			}
		}
	}

	let report = TraceReport {
		main: session.doc(main_doc).path().to_path_buf(),
		version: session.doc(main_doc).header.version,
		usages,
		unreadable,
		documents: session.documents().map(|(_, file)| file.path().to_path_buf()).collect(),
		visited: visited.len(),
	};
	info!(
		main = %report.main.display(),
		documents = report.documents.len(),
		blocks = report.visited,
		usages = report.usages.len(),
		unreadable = report.unreadable.len(),
		"trace finished"
	);
	Ok(report)
}

/// Root addresses in file order.
fn root_blocks(file: &BlendFile, roots: TraceRoots) -> Vec<u64> {
	let blocks: Vec<Block<'_>> = match roots {
		TraceRoots::AllIds => file.id_blocks().filter(|block| !block.is_placeholder()).collect(),
		TraceRoots::ActiveScene => active_scene(file).into_iter().collect(),
	};
	blocks.iter().map(Block::addr).filter(|addr| *addr != 0).collect()
}

fn active_scene(file: &BlendFile) -> Option<Block<'_>> {
	file.find_code(*b"GLOB")
		.and_then(|glob| glob.get_pointer("curscene").ok().flatten())
		.or_else(|| file.find_code(*b"SC\0\0"))
}

fn edges_of<'a>(ctx: TraceCtx<'a>, block: Block<'a>) -> Vec<Edge> {
	let session = ctx.session();
	let mut edges = Vec::new();
	for target in expand(ctx, block) {
		match resolve_concrete(target) {
			Concrete::Local(found) => edges.extend(session.key_of(&found).map(Edge::Local)),
			Concrete::Linked { placeholder, library, name } => {
				edges.extend(session.key_of(&placeholder).map(Edge::Local));
				if usage::is_packed(&library) {
					debug!(name = %name, "library is packed, not following");
					continue;
				}
				match usage::library_path(ctx, library) {
					Some(path) => edges.push(Edge::Linked { library: path, name }),
					None => debug!(name = %name, "library has no path"),
				}
			}
		}
	}
	edges
}

/// Open `library` through the session and find `name` in it.
///
/// Failures are recorded once per library path and never stop the walk.
fn open_linked(session: &mut Session, unreadable: &mut BTreeMap<PathBuf, String>, library: &Path, name: &str) -> Option<BlockKey> {
	if unreadable.contains_key(library) {
		return None;
	}
	let doc = match session.open(library) {
		Ok(doc) => doc,
		Err(err) => {
			warn!(library = %library.display(), error = %err, "library unreadable, skipping");
			unreadable.insert(library.to_path_buf(), err.to_string());
			return None;
		}
	};
	let Some(found) = session.doc(doc).find_id(name) else {
		debug!(library = %library.display(), name = %name, "linked datablock not found in library");
		return None;
	};
	Some(BlockKey { doc, addr: found.addr() })
}

#[cfg(test)]
mod tests;
