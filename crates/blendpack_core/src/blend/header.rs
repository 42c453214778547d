use crate::blend::{BlendError, Result};

/// Byte endianness marker stored in blend headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
	/// Little-endian byte order (`v` marker).
	Little,
	/// Big-endian byte order (`V` marker).
	Big,
}

impl Endianness {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Little => "little",
			Self::Big => "big",
		}
	}

	fn from_marker(byte: u8) -> Option<Self> {
		match byte {
			b'v' => Some(Self::Little),
			b'V' => Some(Self::Big),
			_ => None,
		}
	}
}

/// Parsed blend file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendHeader {
	/// Total header size in bytes.
	pub header_size: usize,
	/// Container format (`0` legacy, `1` large block headers).
	pub format_version: u16,
	/// Blender version digits, e.g. `500` or `279`.
	pub version: u16,
	/// Pointer width in bytes.
	pub pointer_size: usize,
	/// File byte order.
	pub endianness: Endianness,
}

impl BlendHeader {
	/// Size of legacy `BLENDER-v302` headers.
	pub const LEGACY_SIZE: usize = 12;
	/// Size of `BLENDER17-01v0500` headers.
	pub const V1_SIZE: usize = 17;
	/// Format marker for legacy headers.
	pub const LEGACY_FORMAT_VERSION: u16 = 0;
	/// Format marker for large block headers.
	pub const V1_FORMAT_VERSION: u16 = 1;

	/// Parse a header from the start of `bytes`.
	pub fn parse(bytes: &[u8]) -> Result<Self> {
		if bytes.get(0..7) != Some(b"BLENDER".as_slice()) {
			return Err(BlendError::InvalidHeader);
		}
		match bytes.get(7) {
			Some(byte) if byte.is_ascii_digit() => Self::parse_v1(bytes),
			Some(_) => Self::parse_legacy(bytes),
			None => Err(BlendError::InvalidHeader),
		}
	}

	/// Whether block headers use the large 64-bit layout.
	pub fn is_v1(self) -> bool {
		self.format_version == Self::V1_FORMAT_VERSION
	}

	fn parse_v1(bytes: &[u8]) -> Result<Self> {
		let header = bytes.get(0..Self::V1_SIZE).ok_or(BlendError::InvalidHeader)?;
		let header_size = usize::from(parse_digits(&header[7..9]).ok_or(BlendError::InvalidHeader)?);
		if header_size != Self::V1_SIZE {
			return Err(BlendError::UnsupportedPointerSize { header_size });
		}
		if header[9] != b'-' {
			return Err(BlendError::InvalidHeader);
		}
		let format_version = parse_digits(&header[10..12]).ok_or(BlendError::InvalidHeader)?;
		if format_version != Self::V1_FORMAT_VERSION {
			return Err(BlendError::UnsupportedFormatVersion { version: format_version });
		}
		Ok(Self {
			header_size,
			format_version,
			version: parse_digits(&header[13..17]).ok_or(BlendError::InvalidHeader)?,
			pointer_size: 8,
			endianness: Endianness::from_marker(header[12]).ok_or(BlendError::InvalidHeader)?,
		})
	}

	fn parse_legacy(bytes: &[u8]) -> Result<Self> {
		let header = bytes.get(0..Self::LEGACY_SIZE).ok_or(BlendError::InvalidHeader)?;
		let pointer_size = match header[7] {
			b'_' => 4,
			b'-' => 8,
			_ => return Err(BlendError::InvalidHeader),
		};
		Ok(Self {
			header_size: Self::LEGACY_SIZE,
			format_version: Self::LEGACY_FORMAT_VERSION,
			version: parse_digits(&header[9..12]).ok_or(BlendError::InvalidHeader)?,
			pointer_size,
			endianness: Endianness::from_marker(header[8]).ok_or(BlendError::InvalidHeader)?,
		})
	}
}

fn parse_digits(bytes: &[u8]) -> Option<u16> {
	if bytes.is_empty() {
		return None;
	}
	bytes.iter().try_fold(0_u16, |acc, byte| {
		byte.is_ascii_digit().then(|| acc * 10 + u16::from(byte - b'0'))
	})
}

#[cfg(test)]
mod tests;
