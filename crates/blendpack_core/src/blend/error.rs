use thiserror::Error;

/// Reader-local result type.
pub type Result<T> = std::result::Result<T, BlendError>;

/// Errors produced while reading `.blend` containers and accessing their fields.
#[derive(Debug, Error)]
pub enum BlendError {
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Unknown leading file magic.
	#[error("unsupported compression or not a .blend (magic={magic:?})")]
	UnknownMagic {
		/// First up-to-4 bytes of the stream.
		magic: [u8; 4],
	},
	/// Decompressed stream did not start with `BLENDER`.
	#[error("decompressed data does not start with BLENDER magic")]
	NotBlendAfterDecompress,
	/// Decompression output exceeded the safety limit.
	#[error("decompressed output exceeded limit {limit} bytes")]
	DecompressedTooLarge {
		/// Maximum allowed output bytes.
		limit: usize,
	},
	/// Invalid or malformed file header.
	#[error("invalid header")]
	InvalidHeader,
	/// Unsupported container format version.
	#[error("unsupported file format version {version} (expected 1)")]
	UnsupportedFormatVersion {
		/// Parsed format version.
		version: u16,
	},
	/// Header declared a pointer width this reader does not handle.
	#[error("unsupported pointer size for header size {header_size}")]
	UnsupportedPointerSize {
		/// Header size or pointer width that was rejected.
		header_size: usize,
	},
	/// Not enough bytes remained for a requested read.
	#[error("unexpected eof at offset {at}, need {need} bytes, remaining {rem}")]
	UnexpectedEof {
		/// Byte offset where the read was attempted.
		at: usize,
		/// Requested bytes.
		need: usize,
		/// Bytes still available.
		rem: usize,
	},
	/// Block payload length was negative.
	#[error("negative block length {len}")]
	NegativeBlockLength {
		/// Parsed signed length.
		len: i64,
	},
	/// Block element count was negative.
	#[error("negative block count {nr}")]
	NegativeBlockCount {
		/// Parsed signed element count.
		nr: i64,
	},
	/// Block payload would exceed remaining file data.
	#[error("block length {len} at offset {at} exceeds remaining {rem}")]
	BlockLenOutOfRange {
		/// Block header file offset.
		at: usize,
		/// Declared payload length.
		len: u64,
		/// Remaining bytes in cursor.
		rem: usize,
	},
	/// Two indexable blocks claimed the same old address.
	#[error("duplicate block address {addr:#x} at offsets {first} and {second}")]
	DuplicateBlockAddress {
		/// Colliding old address.
		addr: u64,
		/// File offset of the first block header.
		first: usize,
		/// File offset of the second block header.
		second: usize,
	},
	/// No DNA1 block was found.
	#[error("DNA1 block not found")]
	DnaNotFound,
	/// Unexpected DNA section tag.
	#[error("DNA tag mismatch at {at}: expected {expected:?}, got {got:?}")]
	DnaBadTag {
		/// Expected section tag.
		expected: [u8; 4],
		/// Actual section tag.
		got: [u8; 4],
		/// Cursor offset of the tag read.
		at: usize,
	},
	/// Out-of-range index inside DNA tables.
	#[error("DNA index out of range for {kind}: idx={idx}, max={max}")]
	DnaIndexOutOfRange {
		/// Logical index kind being validated.
		kind: &'static str,
		/// Offending index value.
		idx: u32,
		/// Maximum valid index.
		max: u32,
	},
	/// Duplicate type->struct mapping in DNA `STRC` section.
	#[error("DNA duplicate struct type index {type_idx}: first={first}, second={second}")]
	DnaDuplicateStructType {
		/// Duplicate type index.
		type_idx: u16,
		/// First struct index observed.
		first: u32,
		/// Second struct index observed.
		second: u32,
	},
	/// Field size or offset overflowed while laying out a DNA struct.
	#[error("DNA field {struct_name}.{field} overflows the address space")]
	DnaFieldOverflow {
		/// Struct being laid out.
		struct_name: String,
		/// Field whose size or offset overflowed.
		field: String,
	},
	/// Requested field does not exist on the struct layout.
	#[error("field not found: {struct_name}.{field}")]
	FieldNotFound {
		/// Struct type that was searched.
		struct_name: String,
		/// Missing field segment.
		field: String,
	},
	/// Field exists but has the wrong shape for the requested access.
	#[error("field {struct_name}.{field} is not {expected}")]
	FieldKindMismatch {
		/// Struct type that owns the field.
		struct_name: String,
		/// Field name.
		field: String,
		/// Shape the caller asked for.
		expected: &'static str,
	},
	/// Block has no SDNA struct layout.
	#[error("block at offset {at} has unknown SDNA index {sdna_nr}")]
	MissingLayout {
		/// Block header file offset.
		at: usize,
		/// Unresolvable SDNA index.
		sdna_nr: u32,
	},
	/// Linked list revisited a node.
	#[error("malformed list: node {addr:#x} visited twice")]
	MalformedList {
		/// Address where the cycle was detected.
		addr: u64,
	},
}

impl BlendError {
	/// Whether this error means the document itself cannot be trusted.
	///
	/// Field and list errors are local to one access and never poison a document.
	pub fn is_corrupt_document(&self) -> bool {
		!matches!(
			self,
			Self::Io(_) | Self::FieldNotFound { .. } | Self::FieldKindMismatch { .. } | Self::MissingLayout { .. } | Self::MalformedList { .. }
		)
	}
}
