use crate::blend::bytes::Cursor;
use crate::blend::{BlendError, Endianness, Result};

mod layout;

pub use layout::{FieldKind, FieldLayout, Layouts, ResolvedField, StructLayout};

/// Parsed SDNA schema tables.
#[derive(Debug)]
pub struct Dna {
	/// Field declarator strings from `NAME`.
	pub names: Vec<Box<str>>,
	/// Type name strings from `TYPE`.
	pub types: Vec<Box<str>>,
	/// Type byte sizes from `TLEN`.
	pub tlen: Vec<u16>,
	/// Struct declarations from `STRC`.
	pub structs: Vec<DnaStruct>,
	/// Mapping `type_idx -> sdna struct index`.
	pub struct_for_type: Vec<Option<u32>>,
}

/// One struct declaration.
#[derive(Debug)]
pub struct DnaStruct {
	/// Type index of the struct name.
	pub type_idx: u16,
	/// Field declarations in source order.
	pub fields: Vec<DnaField>,
}

/// One field declaration.
#[derive(Debug, Clone, Copy)]
pub struct DnaField {
	/// Type table index.
	pub type_idx: u16,
	/// Name table index.
	pub name_idx: u16,
}

impl Dna {
	/// Parse a `DNA1` payload written in `endianness`.
	pub fn parse(payload: &[u8], endianness: Endianness) -> Result<Self> {
		let mut cursor = Cursor::new(payload);

		expect_tag(&mut cursor, *b"SDNA")?;
		expect_tag(&mut cursor, *b"NAME")?;
		let names = read_string_table(&mut cursor, endianness)?;

		expect_tag(&mut cursor, *b"TYPE")?;
		let types = read_string_table(&mut cursor, endianness)?;

		expect_tag(&mut cursor, *b"TLEN")?;
		let tlen = (0..types.len()).map(|_| cursor.read_u16(endianness)).collect::<Result<Vec<_>>>()?;
		cursor.align4()?;

		expect_tag(&mut cursor, *b"STRC")?;
		let struct_count = cursor.read_u32(endianness)? as usize;
		let mut structs = Vec::with_capacity(struct_count.min(payload.len() / 4));
		for _ in 0..struct_count {
			let type_idx = cursor.read_u16(endianness)?;
			check_index("struct.type_idx", u32::from(type_idx), types.len())?;

			let field_count = cursor.read_u16(endianness)? as usize;
			let mut fields = Vec::with_capacity(field_count);
			for _ in 0..field_count {
				let field = DnaField {
					type_idx: cursor.read_u16(endianness)?,
					name_idx: cursor.read_u16(endianness)?,
				};
				check_index("field.type_idx", u32::from(field.type_idx), types.len())?;
				check_index("field.name_idx", u32::from(field.name_idx), names.len())?;
				fields.push(field);
			}
			structs.push(DnaStruct { type_idx, fields });
		}

		let mut struct_for_type = vec![None; types.len()];
		for (idx, item) in structs.iter().enumerate() {
			let slot = &mut struct_for_type[item.type_idx as usize];
			if let Some(first) = *slot {
				return Err(BlendError::DnaDuplicateStructType {
					type_idx: item.type_idx,
					first,
					second: idx as u32,
				});
			}
			*slot = Some(idx as u32);
		}

		Ok(Self {
			names,
			types,
			tlen,
			structs,
			struct_for_type,
		})
	}

	/// Type name by type index.
	pub fn type_name(&self, type_idx: u16) -> &str {
		&self.types[type_idx as usize]
	}

	/// Field declarator by name index.
	pub fn field_name(&self, name_idx: u16) -> &str {
		&self.names[name_idx as usize]
	}
}

fn expect_tag(cursor: &mut Cursor<'_>, expected: [u8; 4]) -> Result<()> {
	let at = cursor.pos();
	let got = cursor.read_code4()?;
	if got != expected {
		return Err(BlendError::DnaBadTag { expected, got, at });
	}
	Ok(())
}

fn read_string_table(cursor: &mut Cursor<'_>, endianness: Endianness) -> Result<Vec<Box<str>>> {
	let count = cursor.read_u32(endianness)? as usize;
	let mut out = Vec::with_capacity(count.min(cursor.remaining()));
	for _ in 0..count {
		let bytes = cursor.read_cstring_bytes()?;
		out.push(String::from_utf8_lossy(bytes).into_owned().into_boxed_str());
	}
	cursor.align4()?;
	Ok(out)
}

fn check_index(kind: &'static str, idx: u32, len: usize) -> Result<()> {
	if (idx as usize) >= len {
		return Err(BlendError::DnaIndexOutOfRange {
			kind,
			idx,
			max: len.saturating_sub(1) as u32,
		});
	}
	Ok(())
}

#[cfg(test)]
mod tests;
