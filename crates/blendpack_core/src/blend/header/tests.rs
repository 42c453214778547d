use crate::blend::{BlendError, BlendHeader, Endianness};

#[test]
fn parses_large_bhead8_header() {
	let header = BlendHeader::parse(b"BLENDER17-01v0500").expect("header parses");
	assert_eq!(header.header_size, 17);
	assert!(header.is_v1());
	assert_eq!(header.version, 500);
	assert_eq!(header.pointer_size, 8);
	assert_eq!(header.endianness, Endianness::Little);
}

#[test]
fn rejects_unknown_header_size_marker() {
	let err = BlendHeader::parse(b"BLENDER18-01v0500X").expect_err("non-17 size marker should fail");
	assert!(matches!(err, BlendError::UnsupportedPointerSize { header_size: 18 }));
}

#[test]
fn parses_legacy_headers_in_both_byte_orders() {
	let little = BlendHeader::parse(b"BLENDER-v302").expect("legacy header parses");
	assert_eq!(little.header_size, BlendHeader::LEGACY_SIZE);
	assert!(!little.is_v1());
	assert_eq!(little.version, 302);
	assert_eq!(little.pointer_size, 8);
	assert_eq!(little.endianness, Endianness::Little);

	let big = BlendHeader::parse(b"BLENDER_V248").expect("legacy big-endian header parses");
	assert_eq!(big.version, 248);
	assert_eq!(big.pointer_size, 4);
	assert_eq!(big.endianness, Endianness::Big);
}

#[test]
fn rejects_unknown_pointer_and_endianness_markers() {
	assert!(matches!(BlendHeader::parse(b"BLENDER?v302"), Err(BlendError::InvalidHeader)));
	assert!(matches!(BlendHeader::parse(b"BLENDER-x302"), Err(BlendError::InvalidHeader)));
	assert!(matches!(BlendHeader::parse(b"NOTBLEND-v302"), Err(BlendError::InvalidHeader)));
	assert!(matches!(BlendHeader::parse(b"BLENDER"), Err(BlendError::InvalidHeader)));
}
