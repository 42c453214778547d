//! Dependency tracing and packing for Blender `.blend` documents.
//!
//! The pipeline reads documents ([`blend`]), walks every datablock they
//! reference across linked libraries ([`trace`]), turns the discovered file
//! usages into a relocatable manifest ([`pack`]) and drives the upload
//! through an external sync tool ([`transfer`]).

/// Blend container reader, SDNA layouts and field access.
pub mod blend;
/// Cooperative cancellation flag.
pub mod cancel;
/// YAML configuration.
pub mod config;
/// Project-root inference, manifest building, rewrites and archive mode.
pub mod pack;
/// Dependency graph walk and usage resolution.
pub mod trace;
/// Upload orchestration over a sync tool.
pub mod transfer;

pub use cancel::CancelFlag;
