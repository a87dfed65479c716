//! # DELVE Shared
//!
//! Math and format constants shared by the geometry builder, the binary
//! writer and the round-trip reader.
//!
//! ## RULE
//!
//! This crate must NEVER touch the file system. If it needs a path, it
//! belongs in `delve_dungeon`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{DEFAULT_FILE_EXTENSION, FORMAT_VERSION, GEOMETRY_EPSILON, MAX_CHAMBER_SIDES};
pub use math::{Aabb, Color, Plane, Quaternion, Vec2, Vec3};
