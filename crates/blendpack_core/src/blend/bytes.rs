use crate::blend::{BlendError, Endianness, Result};

/// Bounded cursor over an immutable byte slice.
pub struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

macro_rules! read_int {
	($name:ident, $ty:ty, $n:literal) => {
		#[doc = concat!("Read a `", stringify!($ty), "` in the given byte order.")]
		pub fn $name(&mut self, endianness: Endianness) -> Result<$ty> {
			let mut buf = [0_u8; $n];
			buf.copy_from_slice(self.read_exact($n)?);
			Ok(match endianness {
				Endianness::Little => <$ty>::from_le_bytes(buf),
				Endianness::Big => <$ty>::from_be_bytes(buf),
			})
		}
	};
}

impl<'a> Cursor<'a> {
	/// Create a cursor at position 0.
	pub fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	/// Current byte offset.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Remaining unread bytes.
	pub fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Read exactly `n` bytes and advance.
	pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
		if n > self.remaining() {
			return Err(BlendError::UnexpectedEof {
				at: self.pos,
				need: n,
				rem: self.remaining(),
			});
		}
		let start = self.pos;
		self.pos += n;
		Ok(&self.bytes[start..self.pos])
	}

	/// Read a four-byte block or section code.
	pub fn read_code4(&mut self) -> Result<[u8; 4]> {
		let mut out = [0_u8; 4];
		out.copy_from_slice(self.read_exact(4)?);
		Ok(out)
	}

	read_int!(read_u16, u16, 2);
	read_int!(read_u32, u32, 4);
	read_int!(read_u64, u64, 8);
	read_int!(read_i32, i32, 4);
	read_int!(read_i64, i64, 8);

	/// Read a pointer-sized unsigned integer widened to `u64`.
	pub fn read_ptr(&mut self, pointer_size: usize, endianness: Endianness) -> Result<u64> {
		match pointer_size {
			4 => Ok(u64::from(self.read_u32(endianness)?)),
			8 => self.read_u64(endianness),
			_ => Err(BlendError::UnsupportedPointerSize { header_size: pointer_size }),
		}
	}

	/// Skip to the next 4-byte aligned position.
	pub fn align4(&mut self) -> Result<()> {
		let aligned = (self.pos + 3) & !3;
		self.read_exact(aligned - self.pos)?;
		Ok(())
	}

	/// Read a NUL-terminated byte string without the terminator.
	pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
		let rest = &self.bytes[self.pos.min(self.bytes.len())..];
		let Some(len) = rest.iter().position(|byte| *byte == 0) else {
			return Err(BlendError::UnexpectedEof {
				at: self.pos,
				need: 1,
				rem: self.remaining(),
			});
		};
		let out = &rest[..len];
		self.pos += len + 1;
		Ok(out)
	}
}

/// Decode an unsigned integer of `size` bytes from `raw` at `at`.
pub(crate) fn read_uint(raw: &[u8], at: usize, size: usize, endianness: Endianness) -> Result<u64> {
	let slice = raw.get(at..at + size).ok_or(BlendError::UnexpectedEof {
		at,
		need: size,
		rem: raw.len().saturating_sub(at),
	})?;
	let mut value = 0_u64;
	match endianness {
		Endianness::Little => {
			for byte in slice.iter().rev() {
				value = (value << 8) | u64::from(*byte);
			}
		}
		Endianness::Big => {
			for byte in slice {
				value = (value << 8) | u64::from(*byte);
			}
		}
	}
	Ok(value)
}
