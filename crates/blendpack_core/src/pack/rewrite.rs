//! Patching stored paths in decoded document bytes.

use std::path::Path;

use crate::blend::BlendError;
use crate::pack::{PackError, Result};
use crate::trace::bpath::{BLEND_RELATIVE_PREFIX, relative_between};
use crate::trace::{PathSlot, SlotStyle};

/// New value for one char-array slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPatch {
	/// Field location in the decoded document.
	pub slot: PathSlot,
	/// Replacement path text, without terminator.
	pub value: String,
}

/// `//`-relative value to store in `slot` of the document keyed `doc_key`
/// so it points at `asset_key` after packing.
///
/// Directory-style slots get the asset's folder with a trailing `/`. Full
/// paths keep a trailing `/` when `raw` had one.
pub fn rewrite_value(doc_key: &str, asset_key: &str, style: SlotStyle, raw: &str) -> String {
	let doc_dir = parent_key(doc_key);
	match style {
		SlotStyle::DirOnly => {
			let rel = relative_between(doc_dir, parent_key(asset_key));
			if rel.is_empty() {
				BLEND_RELATIVE_PREFIX.to_owned()
			} else {
				format!("{BLEND_RELATIVE_PREFIX}{rel}/")
			}
		}
		SlotStyle::FullPath => {
			let rel = relative_between(doc_dir, asset_key);
			let slash = if raw.ends_with(['/', '\\']) { "/" } else { "" };
			format!("{BLEND_RELATIVE_PREFIX}{rel}{slash}")
		}
	}
}

/// Apply `patches` to a copy of `bytes`.
///
/// Each value is written NUL-terminated and the rest of the slot is zeroed.
pub fn patch_bytes(doc: &Path, bytes: &[u8], patches: &[SlotPatch]) -> Result<Vec<u8>> {
	let mut out = bytes.to_vec();
	for patch in patches {
		let PathSlot { offset, capacity, .. } = patch.slot;
		let value = patch.value.as_bytes();
		if value.len() >= capacity {
			return Err(PackError::RewriteTooLong {
				doc: doc.to_path_buf(),
				value: patch.value.clone(),
				capacity,
			});
		}
		let rem = out.len().saturating_sub(offset);
		let Some(field) = out.get_mut(offset..offset + capacity) else {
			return Err(PackError::Blend {
				path: doc.to_path_buf(),
				source: BlendError::UnexpectedEof { at: offset, need: capacity, rem },
			});
		};
		field.fill(0);
		field[..value.len()].copy_from_slice(value);
	}
	Ok(out)
}

fn parent_key(key: &str) -> &str {
	key.rsplit_once('/').map_or("", |(dir, _)| dir)
}
