use crate::blend::bytes::Cursor;
use crate::blend::{BlendError, BlendHeader, Result};

/// Parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BHead {
	/// Four-byte block code. ID blocks use two letters padded with NUL.
	pub code: [u8; 4],
	/// SDNA struct index for payload interpretation.
	pub sdna_nr: u32,
	/// Stored address identifier used for pointer relocation.
	///
	/// This is an opaque per-document key, never a dereferenceable address.
	pub old: u64,
	/// Payload byte length.
	pub len: u64,
	/// Number of struct elements stored in the payload.
	pub nr: u64,
}

impl BHead {
	/// Parse a block header at the cursor position.
	pub fn parse(cursor: &mut Cursor<'_>, header: BlendHeader) -> Result<Self> {
		let code = cursor.read_code4()?;
		let endianness = header.endianness;
		let (sdna_nr, old, len, nr) = if header.is_v1() {
			let sdna_nr = cursor.read_u32(endianness)?;
			let old = cursor.read_u64(endianness)?;
			(sdna_nr, old, cursor.read_i64(endianness)?, cursor.read_i64(endianness)?)
		} else {
			let len = i64::from(cursor.read_i32(endianness)?);
			let old = cursor.read_ptr(header.pointer_size, endianness)?;
			let sdna_nr = cursor.read_u32(endianness)?;
			(sdna_nr, old, len, i64::from(cursor.read_i32(endianness)?))
		};
		if len < 0 {
			return Err(BlendError::NegativeBlockLength { len });
		}
		if nr < 0 {
			return Err(BlendError::NegativeBlockCount { nr });
		}
		Ok(Self {
			code,
			sdna_nr,
			old,
			len: len as u64,
			nr: nr as u64,
		})
	}

	/// Whether this is the terminal `ENDB` block.
	pub fn is_endb(&self) -> bool {
		self.code == *b"ENDB"
	}

	/// Two-letter ID code, or `None` for four-letter system codes.
	pub fn id_code(&self) -> Option<[u8; 2]> {
		(self.code[2] == 0 && self.code[3] == 0).then_some([self.code[0], self.code[1]])
	}

	/// Block code rendered for logs (`OB`, `DATA`, ...).
	pub fn code_str(&self) -> String {
		let end = self.code.iter().position(|byte| *byte == 0).unwrap_or(4);
		String::from_utf8_lossy(&self.code[..end]).into_owned()
	}
}

#[cfg(test)]
mod tests;
