//! Blender enum and flag values read from documents.

/// Compositor "Render Layers" node; its `id` points back at the scene.
pub const CMP_NODE_R_LAYERS: i64 = 221;

/// Socket types whose default value stores an ID pointer.
pub const SOCK_OBJECT: i64 = 8;
/// Image socket.
pub const SOCK_IMAGE: i64 = 9;
/// Collection socket.
pub const SOCK_COLLECTION: i64 = 11;
/// Texture socket.
pub const SOCK_TEXTURE: i64 = 12;
/// Material socket.
pub const SOCK_MATERIAL: i64 = 13;

/// ID-pointer custom property.
pub const IDP_ID: i64 = 7;

/// `eModifierType` values.
pub const MOD_OCEAN: i64 = 39;
/// Mesh cache modifier.
pub const MOD_MESH_CACHE: i64 = 46;
/// Mesh sequence cache modifier.
pub const MOD_MESH_SEQUENCE_CACHE: i64 = 52;
/// Fluid modifier.
pub const MOD_FLUID: i64 = 56;
/// Geometry nodes modifier.
pub const MOD_NODES: i64 = 57;

/// `Object.transflag` bit for collection instancing.
pub const OB_DUPLIGROUP: i64 = 0x100;

/// `ParticleSettings.ren_as` values.
pub const PART_DRAW_OB: i64 = 7;
/// Render particles as collection instances.
pub const PART_DRAW_GR: i64 = 8;

/// Sequencer strip types.
pub const SEQ_TYPE_IMAGE: i64 = 0;
/// Meta strip containing nested strips.
pub const SEQ_TYPE_META: i64 = 1;
/// Scene strip.
pub const SEQ_TYPE_SCENE: i64 = 2;
/// Movie strip.
pub const SEQ_TYPE_MOVIE: i64 = 3;
/// Sound strip held in memory.
pub const SEQ_TYPE_SOUND_RAM: i64 = 4;
/// Sound strip streamed from disk.
pub const SEQ_TYPE_SOUND_HD: i64 = 5;
/// Movie clip strip.
pub const SEQ_TYPE_MOVIECLIP: i64 = 6;
/// Mask strip.
pub const SEQ_TYPE_MASK: i64 = 7;

/// `Image.source` values.
pub const IMA_SRC_SEQUENCE: i64 = 2;
/// Generated image, no file.
pub const IMA_SRC_GENERATED: i64 = 4;
/// Viewer image, no file.
pub const IMA_SRC_VIEWER: i64 = 5;
/// UDIM tiled image.
pub const IMA_SRC_TILED: i64 = 6;

/// `MovieClip.source` image sequence.
pub const MCLIP_SRC_SEQUENCE: i64 = 1;

/// Point cache stored on disk next to the document.
pub const PTCACHE_DISK_CACHE: i64 = 0x40;
/// Point cache stored at an external path.
pub const PTCACHE_EXTERNAL: i64 = 0x200;

/// Shader node storage mode for an external file.
pub const NODE_EXTERNAL: i64 = 1;
