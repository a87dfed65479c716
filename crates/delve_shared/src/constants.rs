//! # Format & Geometry Constants
//!
//! Values baked into every file the writer produces. Changing
//! [`FORMAT_VERSION`] makes previously built dungeons unreadable.

// =============================================================================
// WORLD-OBJECT FORMAT
// =============================================================================

/// Version stored in the `MVER` chunk of root and group files.
pub const FORMAT_VERSION: u32 = 1;

/// Extension used when the build config does not name one.
pub const DEFAULT_FILE_EXTENSION: &str = "wmo";

// =============================================================================
// GEOMETRY
// =============================================================================

/// Distances below this are treated as zero (plane classification,
/// degenerate triangle detection).
pub const GEOMETRY_EPSILON: f32 = 1.0e-4;

/// Upper bound for `Chamber { sides }`. Larger polygons should be declared
/// as `Circular`.
pub const MAX_CHAMBER_SIDES: u32 = 12;

/// Lower bound for any polygonal footprint.
pub const MIN_POLYGON_SIDES: u32 = 3;
