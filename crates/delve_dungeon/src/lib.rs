//! # DELVE Dungeon
//!
//! Procedural instance geometry: a declarative room graph goes in, a chunked
//! root + group world-object file set comes out.
//!
//! ## Pipeline
//!
//! 1. **Definition** - rooms, shapes, connections, lights, doodads (TOML/JSON)
//! 2. **Primitives** - closed, inward-wound meshes per room
//! 3. **Layout** - corridors synthesized between connected rooms
//! 4. **Materials** - per-build registry, stable first-seen indices
//! 5. **Collision** - simplified mesh + BSP per room, portals between rooms
//! 6. **Format** - atomic writer and round-trip reader
//!
//! ## Determinism
//!
//! A build never consults clocks, randomness or hash iteration order. The
//! same definition and config always produce the same bytes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use delve_dungeon::{DungeonBuilder, DungeonDefinition, DungeonWriter};
//!
//! let definition = DungeonDefinition::load("data/dungeons/crypt.toml")?;
//! let output = DungeonBuilder::default().build(&definition)?;
//! for diagnostic in &output.diagnostics {
//!     eprintln!("warning: {diagnostic}");
//! }
//! DungeonWriter::default().write(&output.assembly, "out/crypt")?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod assembly;
pub mod bsp;
pub mod config;
pub mod definition;
pub mod error;
pub mod export;
pub mod format;
pub mod layout;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod portal;
pub mod primitives;

pub use assembly::{BuildOutput, DungeonAssembly, DungeonBuilder, Room, RoomSource};
pub use bsp::{BspTree, CollisionData, CollisionMesh, CollisionNode};
pub use config::BuildConfig;
pub use definition::{
    BossMarker, DoodadPlacement, DungeonDefinition, InstanceCategory, LightDef, LightKind,
    MaterialDesc, Placement, RoomDefinition, ShaderMode, Shape, ZoneMaterials,
};
pub use error::{ConfigurationError, Degeneracy, Diagnostic, DungeonError, DungeonResult};
pub use export::{BossSpawn, CoordinateExport, RoomCoordinates};
pub use format::reader::{read, ReadOutput};
pub use format::writer::{DungeonWriter, EncodedDungeon, WrittenFiles};
pub use lighting::{ResolvedDoodad, ResolvedLight};
pub use material::{MaterialId, MaterialRegistry};
pub use mesh::{MaterialZone, Mesh};
pub use portal::Portal;
