//! # Coordinate Export
//!
//! Read-only projection of room centers and boss spawns, for the tools that
//! place entrances, teleports and encounter scripts.
//!
//! ```json
//! {
//!   "dungeon": "Crypt",
//!   "map_id": 4100,
//!   "rooms": {
//!     "entry": { "center": { "x": 0.0, "y": 0.0, "z": 0.0 } },
//!     "hall":  { "center": { ... }, "boss_spawn": { "entry": 1701, "position": { ... } } }
//!   }
//! }
//! ```
//!
//! Rooms appear in room index order.

use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::assembly::DungeonAssembly;
use crate::error::{DungeonError, DungeonResult};
use delve_shared::Vec3;

/// Boss spawn in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BossSpawn {
    /// External creature entry id.
    pub entry: u32,
    /// World-space spawn position.
    pub position: Vec3,
}

/// Exported coordinates of one room.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoomCoordinates {
    /// Room id; serialized as the map key.
    #[serde(skip)]
    pub id: String,
    /// World-space floor center.
    pub center: Vec3,
    /// Boss spawn, if the room has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boss_spawn: Option<BossSpawn>,
}

/// Coordinates of every room of one dungeon.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoordinateExport {
    /// Dungeon name.
    pub dungeon: String,
    /// External map id.
    pub map_id: u32,
    /// Rooms in index order.
    #[serde(serialize_with = "serialize_rooms")]
    pub rooms: Vec<RoomCoordinates>,
}

fn serialize_rooms<S: Serializer>(rooms: &[RoomCoordinates], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(rooms.len()))?;
    for room in rooms {
        map.serialize_entry(&room.id, room)?;
    }
    map.end()
}

impl CoordinateExport {
    /// Projects `assembly`. Never mutates it; call as often as needed.
    #[must_use]
    pub fn from_assembly(assembly: &DungeonAssembly) -> Self {
        let rooms = assembly
            .rooms
            .iter()
            .map(|room| RoomCoordinates {
                id: room.id.clone(),
                center: room.center,
                boss_spawn: room.boss.map(|boss| BossSpawn {
                    entry: boss.entry,
                    position: room.center + boss.offset,
                }),
            })
            .collect();
        Self {
            dungeon: assembly.name.clone(),
            map_id: assembly.map_id,
            rooms,
        }
    }

    /// Coordinates of room `id`.
    #[must_use]
    pub fn room(&self, id: &str) -> Option<&RoomCoordinates> {
        self.rooms.iter().find(|room| room.id == id)
    }

    /// Equal up to `epsilon` per coordinate; ids, order and entries exact.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.dungeon == other.dungeon
            && self.map_id == other.map_id
            && self.rooms.len() == other.rooms.len()
            && self.rooms.iter().zip(&other.rooms).all(|(a, b)| {
                a.id == b.id
                    && a.center.approx_eq(b.center, epsilon)
                    && match (a.boss_spawn, b.boss_spawn) {
                        (Some(x), Some(y)) => {
                            x.entry == y.entry && x.position.approx_eq(y.position, epsilon)
                        }
                        (None, None) => true,
                        _ => false,
                    }
            })
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if a coordinate cannot be represented in JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the JSON document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Serialization`] if encoding or writing fails.
    pub fn write_json(&self, path: impl AsRef<Path>) -> DungeonResult<()> {
        let path = path.as_ref();
        let serialization = |source: std::io::Error| DungeonError::Serialization {
            path: path.to_path_buf(),
            source,
        };
        let json = self.to_json().map_err(|e| serialization(e.into()))?;
        std::fs::write(path, json).map_err(serialization)?;
        tracing::info!("Exported {} room coordinates to {}", self.rooms.len(), path.display());
        Ok(())
    }
}
