use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::blend::{BlendError, BlendFile, Block, FieldPath, ListIter, PtrArrayIter};
use crate::trace::bpath;

/// Index of a document inside one [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(u32);

impl DocId {
	/// Position in the session's document table.
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// Global identity of a block: owning document plus stored address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
	/// Owning document.
	pub doc: DocId,
	/// Stored old address inside that document.
	pub addr: u64,
}

/// Every document opened during one trace, plus the trace's log-once set.
///
/// Documents are released together when the session drops.
#[derive(Default)]
pub struct Session {
	docs: Vec<BlendFile>,
	by_path: HashMap<PathBuf, DocId>,
	warned: RefCell<HashSet<String>>,
}

impl Session {
	/// Empty session.
	pub fn new() -> Self {
		Self::default()
	}

	/// Open `path`, or return the already-open document with the same normalized path.
	pub fn open(&mut self, path: &Path) -> Result<DocId, BlendError> {
		let key = bpath::absolute(path);
		if let Some(id) = self.by_path.get(&key) {
			return Ok(*id);
		}
		let file = BlendFile::open(&key)?;
		let id = DocId(self.docs.len() as u32);
		self.docs.push(file);
		self.by_path.insert(key, id);
		Ok(id)
	}

	/// Document by id.
	pub fn doc(&self, id: DocId) -> &BlendFile {
		&self.docs[id.index()]
	}

	/// Every open document in open order.
	pub fn documents(&self) -> impl Iterator<Item = (DocId, &BlendFile)> {
		self.docs.iter().enumerate().map(|(idx, file)| (DocId(idx as u32), file))
	}

	/// Resolve a key to a block view.
	pub fn block(&self, key: BlockKey) -> Option<Block<'_>> {
		self.docs.get(key.doc.index())?.resolve(key.addr)
	}

	/// Key of a block borrowed from this session. Unaddressed blocks have no key.
	pub fn key_of(&self, block: &Block<'_>) -> Option<BlockKey> {
		if block.addr() == 0 {
			return None;
		}
		let idx = self.docs.iter().position(|file| std::ptr::eq(file, block.file()))?;
		Some(BlockKey {
			doc: DocId(idx as u32),
			addr: block.addr(),
		})
	}

	/// Record `topic` and return `true` the first time it is seen in this session.
	pub fn note_once(&self, topic: impl Into<String>) -> bool {
		self.warned.borrow_mut().insert(topic.into())
	}
}

/// Field reads for expanders and resolvers that treat absent fields as "no edge".
#[derive(Clone, Copy)]
pub struct TraceCtx<'a> {
	session: &'a Session,
}

impl<'a> TraceCtx<'a> {
	/// Context over `session`.
	pub fn new(session: &'a Session) -> Self {
		Self { session }
	}

	/// Owning session.
	pub fn session(self) -> &'a Session {
		self.session
	}

	fn absent(self, err: BlendError) {
		match &err {
			BlendError::FieldNotFound { struct_name, field } => {
				if self.session.note_once(format!("field:{struct_name}.{field}")) {
					debug!(struct_name = %struct_name, field = %field, "field absent in this document version");
				}
			}
			_ => debug!(error = %err, "field read failed"),
		}
	}

	/// Follow a pointer field.
	pub fn ptr(self, block: Block<'a>, path: impl FieldPath) -> Option<Block<'a>> {
		block.get_pointer(path).unwrap_or_else(|err| {
			self.absent(err);
			None
		})
	}

	/// Follow the first of several candidate pointer fields that exists.
	pub fn ptr_any(self, block: Block<'a>, names: &[&str]) -> Option<Block<'a>> {
		let name = self.pick(block, names)?;
		self.ptr(block, name)
	}

	/// Read an integer field.
	pub fn int(self, block: Block<'a>, path: impl FieldPath) -> Option<i64> {
		block.get_int(path).map_err(|err| self.absent(err)).ok()
	}

	/// Read the first of several candidate integer fields that exists.
	pub fn int_any(self, block: Block<'a>, names: &[&str]) -> Option<i64> {
		let name = self.pick(block, names)?;
		self.int(block, name)
	}

	/// First candidate field name present on the block's struct.
	pub fn pick<'n>(self, block: Block<'a>, names: &[&'n str]) -> Option<&'n str> {
		let found = names.iter().copied().find(|name| block.has_field(*name));
		if found.is_none()
			&& let Some(first) = names.first()
		{
			self.absent(BlendError::FieldNotFound {
				struct_name: block.struct_name().to_owned(),
				field: (*first).to_owned(),
			});
		}
		found
	}

	/// Walk a list base; absent fields give an empty walk.
	pub fn list(self, block: Block<'a>, path: impl FieldPath) -> ListIter<'a> {
		block.get_list(path).unwrap_or_else(|err| {
			self.absent(err);
			ListIter::empty(block.file())
		})
	}

	/// Count-driven pointer array; absent fields give nothing.
	pub fn ptr_array(self, block: Block<'a>, path: impl FieldPath, count: usize) -> PtrArrayIter<'a> {
		block.iter_array_of_pointers(path, count).unwrap_or_else(|err| {
			self.absent(err);
			PtrArrayIter::empty(block.file())
		})
	}

	/// Inline pointer array; absent fields give nothing.
	pub fn fixed_ptrs(self, block: Block<'a>, path: impl FieldPath) -> PtrArrayIter<'a> {
		block.iter_fixed_array_of_pointers(path).unwrap_or_else(|err| {
			self.absent(err);
			PtrArrayIter::empty(block.file())
		})
	}
}
