use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::blend::compression::decode_bytes;
use crate::blend::{
	BlendError, BlendHeader, Block, BlockIter, BlockRecord, Compression, Dna, Endianness, FieldGates, Layouts, PointerIndex, Result,
};

/// One opened document: decoded bytes, catalog, layouts and address index.
pub struct BlendFile {
	/// Parsed file header.
	pub header: BlendHeader,
	/// Compression detected on the source bytes.
	pub compression: Compression,
	path: PathBuf,
	bytes: Vec<u8>,
	records: Vec<BlockRecord>,
	dna: Dna,
	layouts: Layouts,
	index: PointerIndex,
	names: HashMap<String, usize>,
	subversion: u16,
	gates: FieldGates,
}

impl BlendFile {
	/// Read, decode and index a blend file from disk.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = fs::read(path)?;
		Self::from_bytes(path, raw)
	}

	/// Decode and index in-memory bytes, recording `path` as the document location.
	pub fn from_bytes(path: impl Into<PathBuf>, raw: Vec<u8>) -> Result<Self> {
		let path = path.into();
		let (compression, bytes) = decode_bytes(raw)?;
		let header = BlendHeader::parse(&bytes)?;
		let records = BlockIter::new(&bytes, header.header_size, header).collect::<Result<Vec<_>>>()?;

		let dna_record = records.iter().find(|record| record.head.code == *b"DNA1").ok_or(BlendError::DnaNotFound)?;
		let dna = Dna::parse(&bytes[dna_record.payload.clone()], header.endianness)?;
		let layouts = Layouts::build(&dna, header.pointer_size)?;
		let index = PointerIndex::build(&records)?;

		let mut file = Self {
			header,
			compression,
			path,
			bytes,
			records,
			dna,
			layouts,
			index,
			names: HashMap::new(),
			subversion: 0,
			gates: FieldGates::default(),
		};
		file.subversion = file
			.find_code(*b"GLOB")
			.and_then(|glob| glob.get_int("subversion").ok())
			.and_then(|value| u16::try_from(value).ok())
			.unwrap_or(0);
		file.gates = FieldGates::resolve(file.header.version, file.subversion);
		file.names = file.name_index();

		info!(
			path = %file.path.display(),
			version = file.header.version,
			subversion = file.subversion,
			compression = file.compression.as_str(),
			blocks = file.records.len(),
			"opened blend document"
		);
		Ok(file)
	}

	/// Location this document was opened from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Folder containing the document, the anchor for `//` paths.
	pub fn dir(&self) -> &Path {
		self.path.parent().unwrap_or_else(|| Path::new(""))
	}

	/// Decoded document bytes.
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Every block record in file order.
	pub fn records(&self) -> &[BlockRecord] {
		&self.records
	}

	/// Parsed SDNA tables.
	pub fn dna(&self) -> &Dna {
		&self.dna
	}

	/// Struct layouts derived from the catalog.
	pub fn layouts(&self) -> &Layouts {
		&self.layouts
	}

	/// Subversion from `GLOB`, 0 when absent.
	pub fn subversion(&self) -> u16 {
		self.subversion
	}

	/// Field renames active for this document's version.
	pub fn gates(&self) -> &FieldGates {
		&self.gates
	}

	/// Pointer width in bytes.
	pub fn pointer_size(&self) -> usize {
		self.header.pointer_size
	}

	/// File byte order.
	pub fn endianness(&self) -> Endianness {
		self.header.endianness
	}

	/// Block view by table position.
	pub fn block(&self, index: usize) -> Option<Block<'_>> {
		(index < self.records.len()).then(|| Block::new(self, index))
	}

	/// Iterate block views in file order.
	pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> {
		(0..self.records.len()).map(|index| Block::new(self, index))
	}

	/// Resolve a stored address. Null and unknown addresses yield `None`.
	pub fn resolve(&self, addr: u64) -> Option<Block<'_>> {
		self.index.resolve(addr).map(|index| Block::new(self, index))
	}

	/// First block with the given code.
	pub fn find_code(&self, code: [u8; 4]) -> Option<Block<'_>> {
		self.blocks().find(|block| block.code() == code)
	}

	/// Every ID datablock, placeholders included.
	pub fn id_blocks(&self) -> impl Iterator<Item = Block<'_>> {
		self.blocks().filter(Block::is_id)
	}

	/// Concrete (non-placeholder) ID block whose `ID.name` equals `name`.
	pub fn find_id(&self, name: &str) -> Option<Block<'_>> {
		self.names.get(name).and_then(|index| self.block(*index))
	}

	/// First concrete ID block per name, in file order.
	fn name_index(&self) -> HashMap<String, usize> {
		let mut names = HashMap::new();
		for block in self.id_blocks().filter(|block| !block.is_placeholder()) {
			if let Some(name) = block.id_name() {
				names.entry(name).or_insert(block.index());
			}
		}
		names
	}
}

#[cfg(test)]
mod tests;
