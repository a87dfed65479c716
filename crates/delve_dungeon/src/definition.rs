//! # Dungeon Definitions
//!
//! The declarative input of a build: rooms, their shapes, materials,
//! connections, lights and doodads, plus dungeon metadata.
//!
//! Definitions are plain serde data. TOML is the authoring format; JSON is
//! accepted for definitions produced by other tools.
//!
//! ```toml
//! name = "Crypt"
//! map_id = 4201
//! category = "dungeon"
//!
//! [[rooms]]
//! id = "entrance"
//! center = { x = 0.0, y = 0.0, z = 0.0 }
//! shape = { kind = "box", width = 30.0, length = 40.0, height = 10.0 }
//! connections = ["hall"]
//!
//! [[rooms]]
//! id = "hall"
//! center = { x = 0.0, y = 110.0, z = 0.0 }
//! shape = { kind = "circular", radius = 25.0, height = 15.0, segments = 16 }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DungeonError, DungeonResult};
use delve_shared::constants::MIN_POLYGON_SIDES;
use delve_shared::{Color, Quaternion, Vec3, MAX_CHAMBER_SIDES};

/// Upper bound on polygon segments and ramp steps, against runaway meshes.
pub const MAX_SEGMENTS: u32 = 1024;

/// Instance category of the dungeon map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum InstanceCategory {
    /// Small-group instance.
    #[default]
    Dungeon = 0,
    /// Large-group instance.
    Raid = 1,
    /// Team versus team map.
    Battleground = 2,
    /// Small arena map.
    Arena = 3,
    /// Scripted scenario map.
    Scenario = 4,
}

impl InstanceCategory {
    /// Converts from the stored u32.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Dungeon),
            1 => Some(Self::Raid),
            2 => Some(Self::Battleground),
            3 => Some(Self::Arena),
            4 => Some(Self::Scenario),
            _ => None,
        }
    }
}

/// Generative shape of a room.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Shape {
    /// Axis-aligned box; width along X, length along Y.
    Box {
        /// Extent along X.
        width: f32,
        /// Extent along Y.
        length: f32,
        /// Floor to ceiling.
        height: f32,
    },
    /// Smooth round room approximated by `segments` sides.
    Circular {
        /// Circumradius of the footprint.
        radius: f32,
        /// Floor to ceiling.
        height: f32,
        /// Number of wall quads.
        segments: u32,
    },
    /// Long thin box, yawed along its first connection.
    Corridor {
        /// Extent across the walking direction.
        width: f32,
        /// Extent along the walking direction.
        length: f32,
        /// Floor to ceiling.
        height: f32,
    },
    /// Low-sided polygonal room whose walls face its exits.
    Chamber {
        /// Circumradius of the footprint.
        radius: f32,
        /// Floor to ceiling.
        height: f32,
        /// Number of walls.
        sides: u32,
    },
    /// Helical walkway climbing `height` over `turns` revolutions.
    SpiralRamp {
        /// Outer radius of the walkway.
        radius: f32,
        /// Total rise from bottom to top of the walking surface.
        height: f32,
        /// Number of revolutions.
        turns: f32,
        /// Steps per revolution.
        segments: u32,
    },
}

impl Shape {
    /// Lowercase name of the variant, as written in definitions.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Circular { .. } => "circular",
            Self::Corridor { .. } => "corridor",
            Self::Chamber { .. } => "chamber",
            Self::SpiralRamp { .. } => "spiral_ramp",
        }
    }

    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid parameter.
    pub fn validate(&self) -> Result<(), String> {
        fn positive(name: &str, value: f32) -> Result<(), String> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(format!("{name} must be a positive number, got {value}"))
            }
        }
        fn sides(name: &str, value: u32, max: u32) -> Result<(), String> {
            if (MIN_POLYGON_SIDES..=max).contains(&value) {
                Ok(())
            } else {
                Err(format!("{name} must be between {MIN_POLYGON_SIDES} and {max}, got {value}"))
            }
        }

        match *self {
            Self::Box { width, length, height } | Self::Corridor { width, length, height } => {
                positive("width", width)?;
                positive("length", length)?;
                positive("height", height)
            }
            Self::Circular { radius, height, segments } => {
                positive("radius", radius)?;
                positive("height", height)?;
                sides("segments", segments, MAX_SEGMENTS)
            }
            Self::Chamber { radius, height, sides: n } => {
                positive("radius", radius)?;
                positive("height", height)?;
                sides("sides", n, MAX_CHAMBER_SIDES)
            }
            Self::SpiralRamp { radius, height, turns, segments } => {
                positive("radius", radius)?;
                positive("height", height)?;
                positive("turns", turns)?;
                sides("segments", segments, MAX_SEGMENTS)?;
                if turns * segments as f32 > MAX_SEGMENTS as f32 * 4.0 {
                    return Err(format!("turns x segments exceeds {}", MAX_SEGMENTS * 4));
                }
                Ok(())
            }
        }
    }
}

/// Shader / blend mode of a material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum ShaderMode {
    /// Lit, opaque.
    #[default]
    Diffuse = 0,
    /// Lit with specular highlight.
    Specular = 1,
    /// Unlit, self-illuminated.
    Emissive = 2,
    /// Opaque with alpha-tested holes.
    AlphaKey = 3,
    /// Alpha blended.
    AlphaBlend = 4,
    /// Additive blend.
    Additive = 5,
}

impl ShaderMode {
    /// Converts from the stored u32.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Diffuse),
            1 => Some(Self::Specular),
            2 => Some(Self::Emissive),
            3 => Some(Self::AlphaKey),
            4 => Some(Self::AlphaBlend),
            5 => Some(Self::Additive),
            _ => None,
        }
    }
}

/// Everything that makes two materials distinct.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialDesc {
    /// Texture reference, resolved by the client.
    pub texture: String,
    /// Shader / blend mode.
    #[serde(default)]
    pub shader: ShaderMode,
    /// Opaque render flags passed through to the client.
    #[serde(default)]
    pub flags: u32,
    /// Tint multiplied into the texture.
    #[serde(default)]
    pub tint: Color,
}

impl MaterialDesc {
    /// Diffuse, untinted material for a texture.
    #[must_use]
    pub fn textured(texture: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
            shader: ShaderMode::Diffuse,
            flags: 0,
            tint: Color::WHITE,
        }
    }
}

/// Material assignment per zone of a room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneMaterials {
    /// Walking surface.
    pub floor: MaterialDesc,
    /// Vertical surfaces.
    pub wall: MaterialDesc,
    /// Overhead surface.
    pub ceiling: MaterialDesc,
}

impl Default for ZoneMaterials {
    fn default() -> Self {
        Self {
            floor: MaterialDesc::textured("dungeon/stone_floor"),
            wall: MaterialDesc::textured("dungeon/stone_wall"),
            ceiling: MaterialDesc::textured("dungeon/stone_ceiling"),
        }
    }
}

/// Boss spawn marker: an externally registered encounter entry placed
/// relative to the room center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BossMarker {
    /// Encounter entry id owned by the external record system.
    pub entry: u32,
    /// Offset from the room center.
    #[serde(default)]
    pub offset: Vec3,
}

/// Where a light or doodad sits. The mode is always explicit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum Placement {
    /// Offset from the owning room's center.
    Relative {
        /// Offset in world units.
        offset: Vec3,
    },
    /// World-space position, independent of the room.
    Absolute {
        /// Position in world units.
        position: Vec3,
    },
}

impl Placement {
    /// World-space position for a room centered at `room_center`.
    #[must_use]
    pub fn resolve(&self, room_center: Vec3) -> Vec3 {
        match *self {
            Self::Relative { offset } => room_center + offset,
            Self::Absolute { position } => position,
        }
    }

    fn vector(&self) -> Vec3 {
        match *self {
            Self::Relative { offset } => offset,
            Self::Absolute { position } => position,
        }
    }
}

/// Light kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum LightKind {
    /// Omnidirectional.
    #[default]
    Point = 0,
    /// Cone.
    Spot = 1,
    /// Uniform room fill.
    Ambient = 2,
}

impl LightKind {
    /// Converts from the stored u32.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Point),
            1 => Some(Self::Spot),
            2 => Some(Self::Ambient),
            _ => None,
        }
    }
}

/// Light declaration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightDef {
    /// Light kind.
    #[serde(default)]
    pub kind: LightKind,
    /// Position.
    pub position: Placement,
    /// Light color.
    #[serde(default)]
    pub color: Color,
    /// Brightness multiplier.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Distance where falloff begins.
    #[serde(default)]
    pub attenuation_start: f32,
    /// Distance where the light reaches zero.
    #[serde(default = "default_attenuation_end")]
    pub attenuation_end: f32,
}

const fn default_intensity() -> f32 {
    1.0
}

const fn default_attenuation_end() -> f32 {
    20.0
}

const fn default_scale() -> f32 {
    1.0
}

/// Decorative model instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoodadPlacement {
    /// Model reference, resolved by the client.
    pub model: String,
    /// Position.
    pub position: Placement,
    /// Orientation.
    #[serde(default)]
    pub rotation: Quaternion,
    /// Uniform scale.
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Tint multiplied into the model.
    #[serde(default)]
    pub tint: Color,
}

/// One declared room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomDefinition {
    /// Unique id, also used for coordinate exports.
    pub id: String,
    /// Generative shape.
    pub shape: Shape,
    /// World-space center of the floor.
    pub center: Vec3,
    /// Per-zone materials.
    #[serde(default)]
    pub materials: ZoneMaterials,
    /// Optional boss spawn marker.
    #[serde(default)]
    pub boss: Option<BossMarker>,
    /// Ids of rooms this room opens into.
    #[serde(default)]
    pub connections: Vec<String>,
    /// Lights.
    #[serde(default)]
    pub lights: Vec<LightDef>,
    /// Doodads.
    #[serde(default)]
    pub doodads: Vec<DoodadPlacement>,
}

impl RoomDefinition {
    /// Room with default materials and nothing attached.
    #[must_use]
    pub fn new(id: impl Into<String>, shape: Shape, center: Vec3) -> Self {
        Self {
            id: id.into(),
            shape,
            center,
            materials: ZoneMaterials::default(),
            boss: None,
            connections: Vec::new(),
            lights: Vec::new(),
            doodads: Vec::new(),
        }
    }

    /// Adds an outgoing connection.
    #[must_use]
    pub fn connect(mut self, target: impl Into<String>) -> Self {
        self.connections.push(target.into());
        self
    }

    /// Sets the boss marker.
    #[must_use]
    pub fn with_boss(mut self, entry: u32, offset: Vec3) -> Self {
        self.boss = Some(BossMarker { entry, offset });
        self
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid_placement = |reason: String| ConfigurationError::InvalidPlacement {
            room: self.id.clone(),
            reason,
        };

        self.shape.validate().map_err(|reason| ConfigurationError::InvalidShape {
            room: self.id.clone(),
            reason: format!("{} {reason}", self.shape.kind_name()),
        })?;
        if !self.center.is_finite() {
            return Err(ConfigurationError::InvalidShape {
                room: self.id.clone(),
                reason: "center must be finite".to_string(),
            });
        }
        if let Some(boss) = &self.boss {
            if !boss.offset.is_finite() {
                return Err(invalid_placement("boss offset must be finite".to_string()));
            }
        }
        for (i, light) in self.lights.iter().enumerate() {
            if !light.position.vector().is_finite() {
                return Err(invalid_placement(format!("light {i} position must be finite")));
            }
            if !(light.intensity.is_finite() && light.intensity >= 0.0) {
                return Err(invalid_placement(format!("light {i} intensity must be >= 0")));
            }
            if !(light.attenuation_start >= 0.0 && light.attenuation_end >= light.attenuation_start)
            {
                return Err(invalid_placement(format!(
                    "light {i} attenuation must satisfy 0 <= start <= end"
                )));
            }
        }
        for (i, doodad) in self.doodads.iter().enumerate() {
            if doodad.model.is_empty() {
                return Err(invalid_placement(format!("doodad {i} has no model")));
            }
            if !doodad.position.vector().is_finite() {
                return Err(invalid_placement(format!("doodad {i} position must be finite")));
            }
            if !(doodad.scale.is_finite() && doodad.scale > 0.0) {
                return Err(invalid_placement(format!("doodad {i} scale must be positive")));
            }
        }
        Ok(())
    }
}

/// Complete input of one build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DungeonDefinition {
    /// Dungeon name; also the stem of every output file.
    pub name: String,
    /// Numeric map identifier owned by the external record system.
    pub map_id: u32,
    /// Instance category.
    #[serde(default)]
    pub category: InstanceCategory,
    /// Rooms in declaration order.
    pub rooms: Vec<RoomDefinition>,
}

impl DungeonDefinition {
    /// Empty dungeon.
    #[must_use]
    pub fn new(name: impl Into<String>, map_id: u32) -> Self {
        Self {
            name: name.into(),
            map_id,
            category: InstanceCategory::Dungeon,
            rooms: Vec::new(),
        }
    }

    /// Appends a room.
    #[must_use]
    pub fn with_room(mut self, room: RoomDefinition) -> Self {
        self.rooms.push(room);
        self
    }

    /// Parses a TOML definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidDefinition`] on syntax errors or
    /// missing required fields (including shape parameters).
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(text).map_err(|e| ConfigurationError::InvalidDefinition(e.to_string()))
    }

    /// Parses a JSON definition.
    ///
    /// # Errors
    ///
    /// Same as [`DungeonDefinition::from_toml_str`].
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::InvalidDefinition(e.to_string()))
    }

    /// Loads a definition file; `.json` files are parsed as JSON, anything
    /// else as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Io`] if the file cannot be read, otherwise a
    /// parse error.
    pub fn load(path: impl AsRef<Path>) -> DungeonResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DungeonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let definition = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        Ok(definition)
    }

    /// Semantic validation: ids, connections, shapes, placements.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found, in declaration order.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.is_empty()
            || self.name.contains(['/', '\\'])
            || self.name.starts_with('.')
        {
            return Err(ConfigurationError::InvalidDefinition(format!(
                "dungeon name '{}' cannot be used as a file name",
                self.name
            )));
        }
        if self.rooms.is_empty() {
            return Err(ConfigurationError::InvalidDefinition(
                "dungeon declares no rooms".to_string(),
            ));
        }

        let mut ids = HashSet::with_capacity(self.rooms.len());
        for room in &self.rooms {
            if room.id.is_empty() {
                return Err(ConfigurationError::InvalidDefinition(
                    "room id must not be empty".to_string(),
                ));
            }
            if !ids.insert(room.id.as_str()) {
                return Err(ConfigurationError::DuplicateRoomId { room: room.id.clone() });
            }
        }

        for room in &self.rooms {
            for target in &room.connections {
                if target == &room.id {
                    return Err(ConfigurationError::SelfConnection { room: room.id.clone() });
                }
                if !ids.contains(target.as_str()) {
                    return Err(ConfigurationError::UnknownConnectionTarget {
                        room: room.id.clone(),
                        target: target.clone(),
                    });
                }
            }
            room.validate()?;
        }
        Ok(())
    }

    /// Index of the room with `id`.
    #[must_use]
    pub fn room_index(&self, id: &str) -> Option<usize> {
        self.rooms.iter().position(|r| r.id == id)
    }
}
