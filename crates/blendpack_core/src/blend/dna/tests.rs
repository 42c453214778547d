use blendpack_testkit::{BlendBuilder, Endian};

use crate::blend::{BlendError, BlendFile, Dna, DnaField, DnaStruct, FieldKind, Layouts};

#[test]
fn layouts_resolve_forward_references_and_offsets() {
	let builder = BlendBuilder::new();
	let file = BlendFile::from_bytes("/a.blend", builder.build()).expect("opens");
	let layouts = file.layouts();

	let id = layouts.by_name("ID").expect("ID layout");
	// next, prev and lib pointers precede the name.
	assert_eq!(id.field("name").expect("name").offset, 24);
	assert_eq!(id.field("name").expect("name").array_len, 66);
	assert!(matches!(id.field("lib").expect("lib").kind, FieldKind::Pointer { depth: 1 }));

	let object = layouts.by_name("Object").expect("Object layout");
	assert!(object.is_id_root());
	assert!(matches!(object.field("id").expect("id").kind, FieldKind::Struct { .. }));
	assert_eq!(object.field("adt").expect("adt").offset, id.size);
	assert!(matches!(object.field("mat").expect("mat").kind, FieldKind::Pointer { depth: 2 }));

	let world = layouts.by_name("World").expect("World layout");
	let mtex = world.field("mtex").expect("mtex");
	assert_eq!((mtex.elem_size, mtex.array_len), (8, 18));
}

#[test]
fn nested_path_offsets_accumulate() {
	let builder = BlendBuilder::legacy(4, Endian::Little, 279);
	let file = BlendFile::from_bytes("/a.blend", builder.build()).expect("opens");
	let layouts = file.layouts();
	let nodes = layouts.by_name("NodesModifierData").expect("layout");
	let resolved = layouts.resolve(nodes.sdna, &["settings", "properties"]).expect("nested path");
	let modifier_size = layouts.by_name("ModifierData").expect("ModifierData").size;
	// modifier header, then the node_group pointer, then settings.properties.
	assert_eq!(resolved.offset, modifier_size + 4);
	assert_eq!(&*resolved.owner.name, "NodesModifierSettings");
}

#[test]
fn struct_sizes_come_from_tlen() {
	let builder = BlendBuilder::new();
	let file = BlendFile::from_bytes("/a.blend", builder.build()).expect("opens");
	let list = file.layouts().by_name("ListBase").expect("ListBase");
	assert_eq!(list.size, 16);
	let fields: usize = file.layouts().by_name("Scene").expect("Scene").fields.iter().map(|field| field.size()).sum();
	assert_eq!(fields, file.layouts().by_name("Scene").expect("Scene").size);
}

#[test]
fn oversized_inline_arrays_reject_the_catalog() {
	let dna = Dna {
		names: vec!["huge[4294967296][4294967296]".into()],
		types: vec!["int".into(), "Bloated".into()],
		tlen: vec![4, 8],
		structs: vec![DnaStruct {
			type_idx: 1,
			fields: vec![DnaField { type_idx: 0, name_idx: 0 }],
		}],
		struct_for_type: vec![None, Some(0)],
	};
	let err = Layouts::build(&dna, 8).expect_err("overflow rejected");
	assert!(matches!(err, BlendError::DnaFieldOverflow { ref struct_name, ref field } if struct_name == "Bloated" && field == "huge"));
	assert!(err.is_corrupt_document());
}
