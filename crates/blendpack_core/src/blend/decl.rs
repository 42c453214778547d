/// Parsed SDNA field declarator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldDecl<'a> {
	/// Identifier without stars or dimensions.
	pub ident: &'a str,
	/// Pointer nesting depth (`*`, `**`, ...).
	pub ptr_depth: u8,
	/// Flattened inline array element count.
	pub inline_array: usize,
	/// Whether the declarator is a function pointer (`(*fn)()`).
	pub is_func_ptr: bool,
}

/// Parse SDNA declarator text such as `*next`, `name[66]` or `(*draw)()`.
pub(crate) fn parse_field_decl(raw: &str) -> FieldDecl<'_> {
	let trimmed = raw.trim();

	if let Some(after) = trimmed.strip_prefix("(")
		&& let Some(close) = after.find(')')
	{
		let inside = &after[..close];
		let stars = inside.chars().take_while(|c| *c == '*').count();
		return FieldDecl {
			ident: inside[stars..].trim(),
			ptr_depth: stars.max(1) as u8,
			inline_array: 1,
			is_func_ptr: after[close..].contains('('),
		};
	}

	let stars = trimmed.chars().take_while(|c| *c == '*').count();
	let tail = &trimmed[stars..];
	let ident_end = tail.find('[').unwrap_or(tail.len());

	let mut dims = &tail[ident_end..];
	let mut total = 1_usize;
	while let Some(start) = dims.find('[') {
		let Some(len) = dims[start + 1..].find(']') else {
			break;
		};
		let end = start + 1 + len;
		total = total.saturating_mul(dims[start + 1..end].trim().parse::<usize>().unwrap_or(1));
		dims = &dims[end + 1..];
	}

	FieldDecl {
		ident: tail[..ident_end].trim(),
		ptr_depth: stars as u8,
		inline_array: total,
		is_func_ptr: false,
	}
}
