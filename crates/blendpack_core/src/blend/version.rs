//! Field renames keyed on the document's declared version.

/// One renamed field: from `since` onwards `field` is stored as `renamed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGate {
	/// Struct that owns the field.
	pub struct_name: &'static str,
	/// Name used by older documents, which callers pass in.
	pub field: &'static str,
	/// First `(version, subversion)` that uses the new name.
	///
	/// Compared lexicographically, so a later version with a lower
	/// subversion (`501.0`) still uses the new name.
	pub since: (u16, u16),
	/// Name used from `since` onwards.
	pub renamed: &'static str,
}

/// Every known version-gated field rename.
pub const FIELD_GATES: &[FieldGate] = &[FieldGate {
	struct_name: "Scene",
	field: "nodetree",
	since: (500, 4),
	renamed: "compositing_node_group",
}];

/// Gates that apply to one document, evaluated once when it is opened.
#[derive(Debug, Clone, Default)]
pub struct FieldGates {
	active: Vec<&'static FieldGate>,
}

impl FieldGates {
	/// Select the renames active for `(version, subversion)`.
	pub fn resolve(version: u16, subversion: u16) -> Self {
		Self::from_table(FIELD_GATES, version, subversion)
	}

	/// Select active renames from an explicit table.
	pub fn from_table(table: &'static [FieldGate], version: u16, subversion: u16) -> Self {
		Self {
			active: table.iter().filter(|gate| (version, subversion) >= gate.since).collect(),
		}
	}

	/// Stored name of `field` on `struct_name` for this document.
	pub fn field<'a>(&self, struct_name: &str, field: &'a str) -> &'a str {
		self.active
			.iter()
			.find(|gate| gate.struct_name == struct_name && gate.field == field)
			.map_or(field, |gate| gate.renamed)
	}
}
