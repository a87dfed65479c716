//! # Dungeon Assembly
//!
//! [`DungeonBuilder`] runs the staged build pipeline and produces a
//! [`DungeonAssembly`], the single owner of everything one build produced.
//!
//! ```text
//! validate -> connections -> primitives -> materials -> collision/portals
//!          -> lights/doodads
//! ```
//!
//! Connections resolve before any mesh is generated: they fix the corridor
//! ids and the heading each chamber and ramp is generated with.
//!
//! Every [`ConfigurationError`](crate::error::ConfigurationError) is raised
//! by the first stages, before any geometry exists, so a rejected definition
//! never reaches the writer.

use crate::bsp::{self, CollisionData};
use crate::config::BuildConfig;
use crate::definition::{BossMarker, DungeonDefinition, InstanceCategory, MaterialDesc, Shape, ZoneMaterials};
use crate::error::{ConfigurationError, Diagnostic, DungeonError, DungeonResult};
use crate::layout;
use crate::lighting::{self, ResolvedDoodad, ResolvedLight};
use crate::material::{MaterialId, MaterialRegistry};
use crate::mesh::Mesh;
use crate::portal::{self, Portal};
use crate::primitives;
use delve_shared::{Aabb, Vec3};

/// Where a room's geometry came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoomSource {
    /// Generated from shape parameters during a build.
    Generated(Shape),
    /// Loaded from disk; generative parameters are not recoverable.
    RawMesh,
}

/// One room group.
#[derive(Clone, Debug, PartialEq)]
pub struct Room {
    /// Unique room id.
    pub id: String,
    /// World-space floor center.
    pub center: Vec3,
    /// Geometry origin.
    pub source: RoomSource,
    /// True for corridors synthesized from connections.
    pub is_corridor: bool,
    /// Render mesh with zone and material tags.
    pub mesh: Mesh,
    /// Collision mesh and BSP tree.
    pub collision: CollisionData,
    /// Optional boss spawn marker.
    pub boss: Option<BossMarker>,
    /// Bounds of the render mesh.
    pub bounds: Aabb,
}

impl Room {
    /// World-space boss spawn position.
    #[must_use]
    pub fn boss_position(&self) -> Option<Vec3> {
        self.boss.map(|boss| self.center + boss.offset)
    }
}

/// Everything one build produced. Immutable once handed to the writer.
#[derive(Clone, Debug, PartialEq)]
pub struct DungeonAssembly {
    /// Dungeon name.
    pub name: String,
    /// External map id.
    pub map_id: u32,
    /// Instance category.
    pub category: InstanceCategory,
    /// Rooms: declared rooms in declaration order, then corridors.
    pub rooms: Vec<Room>,
    /// Openings between adjoining rooms.
    pub portals: Vec<Portal>,
    /// Material table; mesh material ids index into it.
    pub materials: Vec<MaterialDesc>,
    /// World-space lights.
    pub lights: Vec<ResolvedLight>,
    /// World-space doodads.
    pub doodads: Vec<ResolvedDoodad>,
}

impl DungeonAssembly {
    /// Index of the room with `id`.
    #[must_use]
    pub fn room_index(&self, id: &str) -> Option<usize> {
        self.rooms.iter().position(|room| room.id == id)
    }

    /// Room with `id`.
    #[must_use]
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == id)
    }

    /// Total render triangles over all rooms.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.rooms.iter().map(|room| room.mesh.triangle_count()).sum()
    }

    /// Bounds of every room.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.rooms.iter().fold(Aabb::EMPTY, |b, room| b.union(room.bounds))
    }

    /// Portal indices touching `room`.
    pub fn portals_of(&self, room: usize) -> impl Iterator<Item = usize> + '_ {
        self.portals
            .iter()
            .enumerate()
            .filter(move |(_, portal)| portal.rooms.contains(&room))
            .map(|(i, _)| i)
    }

    /// Rooms potentially visible from `eye` standing in `room`, starting room
    /// first, in breadth-first discovery order over the portal graph.
    #[must_use]
    pub fn potentially_visible(&self, room: usize, eye: Vec3) -> Vec<usize> {
        portal::potentially_visible(&self.portals, self.rooms.len(), room, eye)
    }

    /// Checks the cross references the writer relies on.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::InvalidAssembly`] naming the offending room.
    pub fn validate(&self) -> DungeonResult<()> {
        let invalid = |room: &str, reason: String| DungeonError::InvalidAssembly {
            room: room.to_string(),
            reason,
        };

        if self.rooms.is_empty() {
            return Err(invalid(&self.name, "dungeon has no rooms".to_string()));
        }
        for room in &self.rooms {
            if !room.mesh.is_consistent() {
                return Err(invalid(&room.id, "mesh arrays are inconsistent".to_string()));
            }
            if let Some(id) = room.mesh.materials.iter().find(|m| m.index() >= self.materials.len()) {
                return Err(invalid(
                    &room.id,
                    format!("material {} out of range ({} materials)", id.raw(), self.materials.len()),
                ));
            }
        }
        for (i, portal) in self.portals.iter().enumerate() {
            if portal.rooms.iter().any(|&r| r >= self.rooms.len()) {
                return Err(invalid(&self.name, format!("portal {i} references a missing room")));
            }
        }
        let owners = self
            .lights
            .iter()
            .map(|l| l.room)
            .chain(self.doodads.iter().map(|d| d.room));
        for owner in owners {
            if owner >= self.rooms.len() {
                return Err(invalid(&self.name, format!("placement references missing room {owner}")));
            }
        }
        Ok(())
    }
}

/// Assembly plus the non-fatal findings of the build.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    /// The built dungeon.
    pub assembly: DungeonAssembly,
    /// Recovered degeneracies, in stage order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs builds with one configuration. Holds no state between builds.
#[derive(Clone, Debug, Default)]
pub struct DungeonBuilder {
    config: BuildConfig,
}

impl DungeonBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds a dungeon from its definition.
    ///
    /// # Errors
    ///
    /// Returns [`DungeonError::Configuration`] for any invalid input. No
    /// other error is possible; geometry problems are recovered and
    /// reported in [`BuildOutput::diagnostics`].
    pub fn build(&self, definition: &DungeonDefinition) -> DungeonResult<BuildOutput> {
        let config = &self.config;
        config.validate()?;
        definition.validate()?;
        tracing::info!(
            "Building dungeon {} (map {}, {} rooms)",
            definition.name,
            definition.map_id,
            definition.rooms.len()
        );

        // Connections first: they fix corridor ids and room headings
        let layout = layout::resolve(definition, config)?;

        let mut rooms = Vec::with_capacity(definition.rooms.len() + layout.corridors.len());
        let mut zone_materials: Vec<&ZoneMaterials> = Vec::with_capacity(rooms.capacity());
        for (i, def) in definition.rooms.iter().enumerate() {
            let mesh = primitives::generate(&def.shape, def.center, layout.headings[i], config);
            rooms.push(Room {
                id: def.id.clone(),
                center: def.center,
                source: RoomSource::Generated(def.shape),
                is_corridor: false,
                bounds: mesh.bounds(),
                mesh,
                collision: CollisionData::default(),
                boss: def.boss,
            });
            zone_materials.push(&def.materials);
        }
        for plan in &layout.corridors {
            let mesh = primitives::generate_sloped(&plan.shape, plan.center, plan.heading, plan.rise, config);
            rooms.push(Room {
                id: plan.id.clone(),
                center: plan.center,
                source: RoomSource::Generated(plan.shape),
                is_corridor: true,
                bounds: mesh.bounds(),
                mesh,
                collision: CollisionData::default(),
                boss: None,
            });
            zone_materials.push(&definition.rooms[plan.source].materials);
        }
        tracing::debug!("Generated {} room meshes ({} corridors)", rooms.len(), layout.corridors.len());

        let mut registry = MaterialRegistry::new();
        for (room, zones) in rooms.iter_mut().zip(&zone_materials) {
            let ids = register_zones(&mut registry, zones)?;
            for (material, zone) in room.mesh.materials.iter_mut().zip(&room.mesh.zones) {
                *material = ids[*zone as usize];
            }
            room.mesh.sort_by_material();
        }
        tracing::debug!("Registered {} materials", registry.len());

        let mut diagnostics = layout.diagnostics.clone();
        for room in &mut rooms {
            room.collision = bsp::build_collision(&room.id, &room.mesh, config, &mut diagnostics);
        }
        let portals: Vec<Portal> = layout.candidates.iter().map(Portal::from_candidate).collect();

        let (lights, doodads) = lighting::resolve(definition);

        let assembly = DungeonAssembly {
            name: definition.name.clone(),
            map_id: definition.map_id,
            category: definition.category,
            rooms,
            portals,
            materials: registry.into_materials(),
            lights,
            doodads,
        };
        tracing::info!(
            "Built dungeon {}: {} rooms, {} portals, {} triangles, {} diagnostics",
            assembly.name,
            assembly.rooms.len(),
            assembly.portals.len(),
            assembly.triangle_count(),
            diagnostics.len()
        );

        Ok(BuildOutput { assembly, diagnostics })
    }
}

/// Registers floor, wall and ceiling materials, indexed by zone.
fn register_zones(
    registry: &mut MaterialRegistry,
    zones: &ZoneMaterials,
) -> Result<[MaterialId; 3], ConfigurationError> {
    let mut ids = [MaterialId::default(); 3];
    for (slot, material) in ids.iter_mut().zip([&zones.floor, &zones.wall, &zones.ceiling]) {
        *slot = registry.register(material).ok_or_else(|| {
            ConfigurationError::InvalidDefinition("too many distinct materials".to_string())
        })?;
    }
    Ok(ids)
}
