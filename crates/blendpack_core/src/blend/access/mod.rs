use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::blend::bytes::read_uint;
use crate::blend::{BlendError, BlendFile, BlockRecord, FieldKind, ResolvedField, Result, StructLayout};

/// A field path: one name or a tuple of names following inline structs.
pub trait FieldPath {
	/// Path segments, outermost first.
	fn segments(&self) -> &[&str];
}

impl FieldPath for &str {
	fn segments(&self) -> &[&str] {
		std::slice::from_ref(self)
	}
}

impl<const N: usize> FieldPath for [&str; N] {
	fn segments(&self) -> &[&str] {
		self
	}
}

impl FieldPath for &[&str] {
	fn segments(&self) -> &[&str] {
		self
	}
}

/// Absolute byte span of a field inside the decoded document bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
	/// Offset from the start of the decoded document.
	pub offset: usize,
	/// Field capacity in bytes.
	pub len: usize,
}

/// Borrowed view of one block together with its owning document.
#[derive(Clone, Copy)]
pub struct Block<'a> {
	file: &'a BlendFile,
	index: usize,
}

impl fmt::Debug for Block<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Block")
			.field("code", &self.record().head.code_str())
			.field("addr", &format_args!("{:#x}", self.addr()))
			.field("struct", &self.struct_name())
			.finish()
	}
}

impl<'a> Block<'a> {
	pub(crate) fn new(file: &'a BlendFile, index: usize) -> Self {
		Self { file, index }
	}

	/// Owning document.
	pub fn file(&self) -> &'a BlendFile {
		self.file
	}

	/// Position of this block in the document's block table.
	pub fn index(&self) -> usize {
		self.index
	}

	/// Underlying block record.
	pub fn record(&self) -> &'a BlockRecord {
		&self.file.records()[self.index]
	}

	/// Four-byte block code.
	pub fn code(&self) -> [u8; 4] {
		self.record().head.code
	}

	/// Stored old address.
	pub fn addr(&self) -> u64 {
		self.record().head.old
	}

	/// Raw payload bytes.
	pub fn payload(&self) -> &'a [u8] {
		let range = self.record().payload.clone();
		&self.file.bytes()[range]
	}

	/// SDNA layout of the block's struct, if the index is valid.
	pub fn layout(&self) -> Option<&'a StructLayout> {
		self.file.layouts().get(self.record().head.sdna_nr)
	}

	/// Struct type name, empty when the SDNA index is unknown.
	pub fn struct_name(&self) -> &'a str {
		self.layout().map_or("", |layout| &layout.name)
	}

	/// Whether this block is a bare `ID` stand-in for a linked or overridden datablock.
	pub fn is_placeholder(&self) -> bool {
		self.struct_name() == "ID"
	}

	/// Whether this is an ID datablock (two-letter code with an `ID` header).
	pub fn is_id(&self) -> bool {
		self.record().head.id_code().is_some() && (self.is_placeholder() || self.layout().is_some_and(StructLayout::is_id_root))
	}

	/// `ID.name` including the two-letter prefix (`OBCube`).
	pub fn id_name(&self) -> Option<String> {
		if self.is_placeholder() {
			return self.get_string("name").ok();
		}
		self.get_string(["id", "name"]).ok()
	}

	/// Library block referenced by `ID.lib`.
	pub fn library(&self) -> Option<Block<'a>> {
		let lib = if self.is_placeholder() { self.get_pointer("lib") } else { self.get_pointer(["id", "lib"]) };
		lib.ok().flatten()
	}

	/// Whether the struct has a field at `path`.
	pub fn has_field(&self, path: impl FieldPath) -> bool {
		self.resolve(path.segments()).is_ok()
	}

	fn resolve(&self, path: &[&str]) -> Result<ResolvedField<'a>> {
		let head = &self.record().head;
		if self.layout().is_none() {
			return Err(BlendError::MissingLayout {
				at: self.record().file_offset,
				sdna_nr: head.sdna_nr,
			});
		}
		self.file.layouts().resolve(head.sdna_nr, path)
	}

	fn field_bytes(&self, resolved: &ResolvedField<'a>, len: usize) -> Result<&'a [u8]> {
		let payload = self.payload();
		payload.get(resolved.offset..resolved.offset + len).ok_or(BlendError::UnexpectedEof {
			at: self.record().payload.start + resolved.offset,
			need: len,
			rem: payload.len().saturating_sub(resolved.offset),
		})
	}

	/// Read a signed integer field. One-byte fields read as unsigned.
	pub fn get_int(&self, path: impl FieldPath) -> Result<i64> {
		let resolved = self.resolve(path.segments())?;
		let size = resolved.field.elem_size;
		if resolved.field.kind != FieldKind::Primitive || !matches!(size, 1 | 2 | 4 | 8) {
			return Err(mismatch(&resolved, "an integer"));
		}
		let raw = read_uint(self.field_bytes(&resolved, size)?, 0, size, self.file.endianness())?;
		Ok(match size {
			1 => raw as i64,
			2 => i64::from(raw as u16 as i16),
			4 => i64::from(raw as u32 as i32),
			_ => raw as i64,
		})
	}

	/// Read the raw stored address of a pointer field.
	pub fn get_ptr(&self, path: impl FieldPath) -> Result<u64> {
		let resolved = self.resolve(path.segments())?;
		if !matches!(resolved.field.kind, FieldKind::Pointer { .. } | FieldKind::FuncPtr) {
			return Err(mismatch(&resolved, "a pointer"));
		}
		let size = self.file.pointer_size();
		read_uint(self.field_bytes(&resolved, size)?, 0, size, self.file.endianness())
	}

	/// Follow a pointer field. Null and dangling addresses yield `None`.
	pub fn get_pointer(&self, path: impl FieldPath) -> Result<Option<Block<'a>>> {
		Ok(self.file.resolve(self.get_ptr(path)?))
	}

	/// Raw bytes of a field including any inline array.
	pub fn get_bytes(&self, path: impl FieldPath) -> Result<&'a [u8]> {
		let resolved = self.resolve(path.segments())?;
		self.field_bytes(&resolved, resolved.field.size())
	}

	/// Bytes of a char array up to the first NUL.
	pub fn get_path_bytes(&self, path: impl FieldPath) -> Result<&'a [u8]> {
		let raw = self.get_bytes(path)?;
		let end = raw.iter().position(|byte| *byte == 0).unwrap_or(raw.len());
		Ok(&raw[..end])
	}

	/// Char array decoded lossily as UTF-8.
	pub fn get_string(&self, path: impl FieldPath) -> Result<String> {
		Ok(String::from_utf8_lossy(self.get_path_bytes(path)?).into_owned())
	}

	/// Absolute span of a field in the decoded document bytes.
	pub fn field_span(&self, path: impl FieldPath) -> Result<FieldSpan> {
		let resolved = self.resolve(path.segments())?;
		self.field_bytes(&resolved, resolved.field.size())?;
		Ok(FieldSpan {
			offset: self.record().payload.start + resolved.offset,
			len: resolved.field.size(),
		})
	}

	/// Follow a `T **field` and iterate `count` pointers stored in the pointed-to block.
	pub fn iter_array_of_pointers(&self, path: impl FieldPath, count: usize) -> Result<PtrArrayIter<'a>> {
		let Some(array) = self.get_pointer(path)? else {
			return Ok(PtrArrayIter::empty(self.file));
		};
		Ok(PtrArrayIter::new(self.file, array.payload(), count))
	}

	/// Iterate an inline `T *field[N]` array.
	pub fn iter_fixed_array_of_pointers(&self, path: impl FieldPath) -> Result<PtrArrayIter<'a>> {
		let resolved = self.resolve(path.segments())?;
		if !resolved.field.is_pointer() {
			return Err(mismatch(&resolved, "a pointer array"));
		}
		let raw = self.field_bytes(&resolved, resolved.field.size())?;
		Ok(PtrArrayIter::new(self.file, raw, resolved.field.array_len))
	}

	/// Walk the `ListBase` at `path` through each node's `next` pointer.
	pub fn get_list(&self, path: impl FieldPath) -> Result<ListIter<'a>> {
		let resolved = self.resolve(path.segments())?;
		let FieldKind::Struct { sdna } = resolved.field.kind else {
			return Err(mismatch(&resolved, "a list base"));
		};
		let first = self
			.file
			.layouts()
			.get(sdna)
			.and_then(|list| list.field("first"))
			.ok_or_else(|| mismatch(&resolved, "a list base"))?;
		let at = resolved.offset + first.offset;
		let size = self.file.pointer_size();
		let raw = self.payload().get(at..at + size).ok_or(BlendError::UnexpectedEof {
			at: self.record().payload.start + at,
			need: size,
			rem: self.payload().len().saturating_sub(at),
		})?;
		let head = read_uint(raw, 0, size, self.file.endianness())?;
		Ok(ListIter::new(self.file, head))
	}
}

fn mismatch(resolved: &ResolvedField<'_>, expected: &'static str) -> BlendError {
	BlendError::FieldKindMismatch {
		struct_name: resolved.owner.name.to_string(),
		field: resolved.field.name.to_string(),
		expected,
	}
}

/// Iterator over resolved, non-null entries of a pointer array.
pub struct PtrArrayIter<'a> {
	file: &'a BlendFile,
	raw: &'a [u8],
	remaining: usize,
}

impl<'a> PtrArrayIter<'a> {
	fn new(file: &'a BlendFile, raw: &'a [u8], count: usize) -> Self {
		Self {
			file,
			raw,
			remaining: count.min(raw.len() / file.pointer_size()),
		}
	}

	/// Iterator that yields nothing.
	pub fn empty(file: &'a BlendFile) -> Self {
		Self { file, raw: &[], remaining: 0 }
	}
}

impl<'a> Iterator for PtrArrayIter<'a> {
	type Item = Block<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let size = self.file.pointer_size();
		while self.remaining > 0 {
			self.remaining -= 1;
			let (head, rest) = self.raw.split_at(size);
			self.raw = rest;
			let addr = read_uint(head, 0, size, self.file.endianness()).unwrap_or(0);
			if let Some(block) = self.file.resolve(addr) {
				return Some(block);
			}
		}
		None
	}
}

/// Singly linked list walker with a revisit guard.
pub struct ListIter<'a> {
	file: &'a BlendFile,
	next: u64,
	visited: HashSet<u64>,
}

impl<'a> ListIter<'a> {
	/// Start walking at `head`.
	pub fn new(file: &'a BlendFile, head: u64) -> Self {
		Self {
			file,
			next: head,
			visited: HashSet::new(),
		}
	}

	/// Iterator that yields nothing.
	pub fn empty(file: &'a BlendFile) -> Self {
		Self::new(file, 0)
	}
}

impl<'a> Iterator for ListIter<'a> {
	type Item = Block<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let addr = std::mem::take(&mut self.next);
		if addr == 0 {
			return None;
		}
		if !self.visited.insert(addr) {
			let err = BlendError::MalformedList { addr };
			warn!(path = %self.file.path().display(), error = %err, "stopping list walk");
			return None;
		}
		let node = self.file.resolve(addr)?;
		self.next = link_next(&node);
		Some(node)
	}
}

/// `next` of a list node, also through an embedded header such as `ModifierData modifier`.
fn link_next(node: &Block<'_>) -> u64 {
	if let Ok(next) = node.get_ptr("next") {
		return next;
	}
	node.layout()
		.and_then(|layout| layout.fields.first())
		.filter(|head| matches!(head.kind, FieldKind::Struct { .. }))
		.and_then(|head| node.get_ptr([&*head.name, "next"]).ok())
		.unwrap_or(0)
}
