use std::collections::HashMap;

use crate::blend::decl::parse_field_decl;
use crate::blend::{BlendError, Dna, Result};

/// Storage shape of one struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	/// Primitive scalar or char array.
	Primitive,
	/// Inline nested struct.
	Struct {
		/// SDNA index of the nested struct.
		sdna: u32,
	},
	/// Pointer of the given depth.
	Pointer {
		/// Number of `*` in the declarator.
		depth: u8,
	},
	/// Function pointer, stored as one pointer-sized slot.
	FuncPtr,
}

/// Resolved field with byte offset inside its owning struct.
#[derive(Debug, Clone)]
pub struct FieldLayout {
	/// Field identifier.
	pub name: Box<str>,
	/// Declared type name.
	pub type_name: Box<str>,
	/// Storage shape.
	pub kind: FieldKind,
	/// Byte offset inside the owning struct.
	pub offset: usize,
	/// Size of one element.
	pub elem_size: usize,
	/// Inline array length (1 for scalars).
	pub array_len: usize,
}

impl FieldLayout {
	/// Total byte size including inline array dimensions.
	pub fn size(&self) -> usize {
		self.elem_size * self.array_len
	}

	/// Whether the field is a data pointer.
	pub fn is_pointer(&self) -> bool {
		matches!(self.kind, FieldKind::Pointer { .. })
	}
}

/// Field table for one SDNA struct.
#[derive(Debug, Clone)]
pub struct StructLayout {
	/// SDNA struct index.
	pub sdna: u32,
	/// Struct type name.
	pub name: Box<str>,
	/// Struct size from `TLEN`.
	pub size: usize,
	/// Fields in declaration order.
	pub fields: Vec<FieldLayout>,
	by_field: HashMap<Box<str>, usize>,
}

impl StructLayout {
	/// Look up a direct field by identifier.
	pub fn field(&self, name: &str) -> Option<&FieldLayout> {
		self.by_field.get(name).map(|idx| &self.fields[*idx])
	}

	/// Whether the struct starts with an inline `ID id` header.
	pub fn is_id_root(&self) -> bool {
		self.fields
			.first()
			.is_some_and(|field| &*field.name == "id" && &*field.type_name == "ID" && matches!(field.kind, FieldKind::Struct { .. }))
	}
}

/// A field path resolved to an offset relative to the outermost struct.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
	/// Byte offset from the start of the outermost struct element.
	pub offset: usize,
	/// Final field in the path.
	pub field: &'a FieldLayout,
	/// Struct that declares the final field.
	pub owner: &'a StructLayout,
}

/// Struct layouts for every SDNA struct of one document.
#[derive(Debug, Default)]
pub struct Layouts {
	structs: Vec<StructLayout>,
	by_name: HashMap<Box<str>, u32>,
}

impl Layouts {
	/// Build layouts in two passes so structs may reference types declared later.
	///
	/// Field sizes or offsets that overflow `usize` reject the catalog.
	pub fn build(dna: &Dna, pointer_size: usize) -> Result<Self> {
		let by_name: HashMap<Box<str>, u32> = dna
			.structs
			.iter()
			.enumerate()
			.map(|(sdna, item)| (dna.type_name(item.type_idx).into(), sdna as u32))
			.collect();

		let structs = dna
			.structs
			.iter()
			.enumerate()
			.map(|(sdna, item)| {
				let struct_name = dna.type_name(item.type_idx);
				let mut offset = 0_usize;
				let mut fields = Vec::with_capacity(item.fields.len());
				let mut by_field = HashMap::with_capacity(item.fields.len());
				for field in &item.fields {
					let decl = parse_field_decl(dna.field_name(field.name_idx));
					let type_name = dna.type_name(field.type_idx);
					let kind = if decl.is_func_ptr {
						FieldKind::FuncPtr
					} else if decl.ptr_depth > 0 {
						FieldKind::Pointer { depth: decl.ptr_depth }
					} else if let Some(nested) = by_name.get(type_name) {
						FieldKind::Struct { sdna: *nested }
					} else {
						FieldKind::Primitive
					};
					let elem_size = match kind {
						FieldKind::Pointer { .. } | FieldKind::FuncPtr => pointer_size,
						_ => usize::from(dna.tlen[field.type_idx as usize]),
					};
					let size = elem_size
						.checked_mul(decl.inline_array)
						.and_then(|size| size.checked_add(offset))
						.ok_or_else(|| BlendError::DnaFieldOverflow {
							struct_name: struct_name.to_owned(),
							field: decl.ident.to_owned(),
						})?;
					by_field.entry(decl.ident.into()).or_insert(fields.len());
					fields.push(FieldLayout {
						name: decl.ident.into(),
						type_name: type_name.into(),
						kind,
						offset,
						elem_size,
						array_len: decl.inline_array,
					});
					offset = size;
				}
				Ok(StructLayout {
					sdna: sdna as u32,
					name: struct_name.into(),
					size: usize::from(dna.tlen[item.type_idx as usize]),
					fields,
					by_field,
				})
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(Self { structs, by_name })
	}

	/// Layout by SDNA index.
	pub fn get(&self, sdna: u32) -> Option<&StructLayout> {
		self.structs.get(sdna as usize)
	}

	/// Layout by struct type name.
	pub fn by_name(&self, name: &str) -> Option<&StructLayout> {
		self.by_name.get(name).and_then(|sdna| self.get(*sdna))
	}

	/// Number of struct layouts.
	pub fn len(&self) -> usize {
		self.structs.len()
	}

	/// Whether no layouts were parsed.
	pub fn is_empty(&self) -> bool {
		self.structs.is_empty()
	}

	/// Resolve a field path, following inline structs for every segment but the last.
	pub fn resolve(&self, sdna: u32, path: &[&str]) -> Result<ResolvedField<'_>> {
		let mut owner = self.get(sdna).ok_or_else(|| BlendError::FieldNotFound {
			struct_name: format!("sdna#{sdna}"),
			field: path.join("."),
		})?;
		let Some((last, parents)) = path.split_last() else {
			return Err(BlendError::FieldNotFound {
				struct_name: owner.name.to_string(),
				field: String::new(),
			});
		};

		let mut base = 0_usize;
		for segment in parents {
			let field = lookup(owner, segment)?;
			let FieldKind::Struct { sdna: nested } = field.kind else {
				return Err(BlendError::FieldKindMismatch {
					struct_name: owner.name.to_string(),
					field: (*segment).to_owned(),
					expected: "an inline struct",
				});
			};
			base = base.saturating_add(field.offset);
			owner = self.get(nested).ok_or_else(|| BlendError::FieldNotFound {
				struct_name: field.type_name.to_string(),
				field: (*segment).to_owned(),
			})?;
		}

		let field = lookup(owner, last)?;
		Ok(ResolvedField {
			offset: base.saturating_add(field.offset),
			field,
			owner,
		})
	}
}

fn lookup<'a>(owner: &'a StructLayout, name: &str) -> Result<&'a FieldLayout> {
	owner.field(name).ok_or_else(|| BlendError::FieldNotFound {
		struct_name: owner.name.to_string(),
		field: name.to_owned(),
	})
}
