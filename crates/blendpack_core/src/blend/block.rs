use std::ops::Range;

use crate::blend::bytes::Cursor;
use crate::blend::{BHead, BlendError, BlendHeader, Result};

/// Location of one block inside the decoded document bytes.
#[derive(Debug, Clone)]
pub struct BlockRecord {
	/// Parsed block header.
	pub head: BHead,
	/// Absolute byte offset where the block header starts.
	pub file_offset: usize,
	/// Absolute byte range of the payload.
	pub payload: Range<usize>,
}

/// Iterator over contiguous block records.
pub struct BlockIter<'a> {
	cursor: Cursor<'a>,
	offset_base: usize,
	header: BlendHeader,
	done: bool,
}

impl<'a> BlockIter<'a> {
	/// Create a block iterator starting at `offset`.
	pub fn new(bytes: &'a [u8], offset: usize, header: BlendHeader) -> Self {
		Self {
			cursor: Cursor::new(bytes.get(offset..).unwrap_or(&[])),
			offset_base: offset,
			header,
			done: false,
		}
	}

	fn next_record(&mut self) -> Result<BlockRecord> {
		let file_offset = self.offset_base + self.cursor.pos();
		let head = BHead::parse(&mut self.cursor, self.header)?;
		let rem = self.cursor.remaining();
		let len = usize::try_from(head.len)
			.ok()
			.filter(|len| *len <= rem)
			.ok_or(BlendError::BlockLenOutOfRange { at: file_offset, len: head.len, rem })?;
		let start = self.offset_base + self.cursor.pos();
		self.cursor.read_exact(len)?;
		Ok(BlockRecord {
			head,
			file_offset,
			payload: start..start + len,
		})
	}
}

impl Iterator for BlockIter<'_> {
	type Item = Result<BlockRecord>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done || self.cursor.remaining() == 0 {
			self.done = true;
			return None;
		}
		let record = self.next_record();
		self.done = match &record {
			Ok(record) => record.head.is_endb(),
			Err(_) => true,
		};
		Some(record)
	}
}
