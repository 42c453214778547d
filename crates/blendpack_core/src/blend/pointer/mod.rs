use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::blend::{BlendError, BlockRecord, Result};

/// Block codes that never participate in pointer relocation.
const UNINDEXED_CODES: [[u8; 4]; 6] = [*b"DNA1", *b"ENDB", *b"REND", *b"TEST", *b"GLOB", *b"USER"];

/// Exact old-address index from stored address to block record.
#[derive(Debug, Default)]
pub struct PointerIndex {
	by_addr: HashMap<u64, usize>,
}

impl PointerIndex {
	/// Index every addressable record.
	///
	/// Two indexable records sharing one address make the document corrupt.
	pub fn build(records: &[BlockRecord]) -> Result<Self> {
		let mut by_addr = HashMap::with_capacity(records.len());
		for (idx, record) in records.iter().enumerate() {
			if record.head.old == 0 || UNINDEXED_CODES.contains(&record.head.code) {
				continue;
			}
			match by_addr.entry(record.head.old) {
				Entry::Vacant(slot) => {
					slot.insert(idx);
				}
				Entry::Occupied(slot) => {
					return Err(BlendError::DuplicateBlockAddress {
						addr: record.head.old,
						first: records[*slot.get()].file_offset,
						second: record.file_offset,
					});
				}
			}
		}
		Ok(Self { by_addr })
	}

	/// Record index for an address. Null and unknown addresses resolve to `None`.
	pub fn resolve(&self, addr: u64) -> Option<usize> {
		if addr == 0 {
			return None;
		}
		self.by_addr.get(&addr).copied()
	}

	/// Number of indexed addresses.
	pub fn len(&self) -> usize {
		self.by_addr.len()
	}

	/// Whether nothing was indexed.
	pub fn is_empty(&self) -> bool {
		self.by_addr.is_empty()
	}
}
