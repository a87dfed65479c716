//! # Dungeon Error Types
//!
//! Fatal errors abort a build or a read. Recoverable problems never become
//! errors; they are reported as [`Diagnostic`] values next to the result.

use std::path::PathBuf;

use thiserror::Error;

/// Problems in the declarative input or the build config.
///
/// Always raised before any geometry is written to disk.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A connection names a room id that was never declared.
    #[error("room '{room}' connects to unknown room '{target}'")]
    UnknownConnectionTarget {
        /// Room declaring the connection.
        room: String,
        /// The id that could not be resolved.
        target: String,
    },

    /// Two rooms share an id (includes synthesized corridor ids).
    #[error("duplicate room id '{room}'")]
    DuplicateRoomId {
        /// The repeated id.
        room: String,
    },

    /// A room connects to itself.
    #[error("room '{room}' connects to itself")]
    SelfConnection {
        /// The offending room.
        room: String,
    },

    /// A shape parameter is missing, non-finite or out of range.
    #[error("room '{room}' has an invalid shape: {reason}")]
    InvalidShape {
        /// The offending room.
        room: String,
        /// What is wrong with the parameters.
        reason: String,
    },

    /// A light or doodad declaration is malformed.
    #[error("room '{room}' has an invalid placement: {reason}")]
    InvalidPlacement {
        /// The offending room.
        room: String,
        /// What is wrong with the declaration.
        reason: String,
    },

    /// The dungeon definition could not be parsed.
    #[error("invalid dungeon definition: {0}")]
    InvalidDefinition(String),

    /// The build config could not be parsed or holds unusable values.
    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur while building, writing or reading a dungeon.
#[derive(Error, Debug)]
pub enum DungeonError {
    /// Input or config rejected before any I/O.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Writing an output file failed. No partial file is left behind.
    #[error("failed to write '{}': {source}", path.display())]
    Serialization {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Reading an input file failed at the file system level.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A required chunk is missing, truncated or malformed.
    #[error("malformed chunk {chunk} in '{}': {reason}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Four-character chunk tag.
        chunk: String,
        /// What went wrong.
        reason: String,
    },

    /// The assembly violates an invariant the writer depends on.
    #[error("room '{room}' cannot be serialized: {reason}")]
    InvalidAssembly {
        /// Offending room.
        room: String,
        /// Violated invariant.
        reason: String,
    },
}

/// Result type for dungeon operations.
pub type DungeonResult<T> = Result<T, DungeonError>;

/// Kinds of degenerate geometry recovered during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// Triangle with (near) zero area was dropped from the collision mesh.
    ZeroAreaFace,
    /// Triangle repeating an earlier one was dropped from the collision mesh.
    DuplicateFace,
    /// No plane separated the face set; the node became a single leaf.
    LeafCollapse,
    /// No chamber rotation puts every exit fully on one wall; corridors
    /// may overlap a corner.
    MisalignedExit,
}

/// Non-fatal findings surfaced next to a build or read result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Geometry problem recovered locally during a build.
    #[error("geometry degeneracy in room '{room}': {kind:?} ({count} affected)")]
    GeometryDegeneracy {
        /// Room whose geometry was degenerate.
        room: String,
        /// What was recovered.
        kind: Degeneracy,
        /// Number of faces or exits affected.
        count: usize,
    },

    /// Problem recovered while reading an existing file set.
    #[error("round-trip warning in '{}': {detail}", path.display())]
    RoundTripParse {
        /// File the warning refers to.
        path: PathBuf,
        /// Description of the recovered problem.
        detail: String,
    },
}
