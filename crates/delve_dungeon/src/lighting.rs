//! Lighting/Doodad Resolver
//!
//! Converts declared lights and doodads into world-space placements. Every
//! declaration states whether its position is relative to the room center
//! or absolute, and is resolved exactly once here.

use crate::definition::{DungeonDefinition, LightKind};
use delve_shared::{Color, Quaternion, Vec3};

/// Light with a world-space position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedLight {
    /// Index of the owning room.
    pub room: usize,
    /// Light kind.
    pub kind: LightKind,
    /// World-space position.
    pub position: Vec3,
    /// Light color.
    pub color: Color,
    /// Brightness multiplier.
    pub intensity: f32,
    /// Distance where falloff begins.
    pub attenuation_start: f32,
    /// Distance where the light reaches zero.
    pub attenuation_end: f32,
}

/// Doodad with a world-space position.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedDoodad {
    /// Index of the owning room.
    pub room: usize,
    /// Model reference.
    pub model: String,
    /// World-space position.
    pub position: Vec3,
    /// Orientation.
    pub rotation: Quaternion,
    /// Uniform scale.
    pub scale: f32,
    /// Tint.
    pub tint: Color,
}

/// Resolves every light and doodad, in room order then declaration order.
#[must_use]
pub fn resolve(definition: &DungeonDefinition) -> (Vec<ResolvedLight>, Vec<ResolvedDoodad>) {
    let mut lights = Vec::new();
    let mut doodads = Vec::new();

    for (room, def) in definition.rooms.iter().enumerate() {
        lights.extend(def.lights.iter().map(|light| ResolvedLight {
            room,
            kind: light.kind,
            position: light.position.resolve(def.center),
            color: light.color,
            intensity: light.intensity,
            attenuation_start: light.attenuation_start,
            attenuation_end: light.attenuation_end,
        }));
        doodads.extend(def.doodads.iter().map(|doodad| ResolvedDoodad {
            room,
            model: doodad.model.clone(),
            position: doodad.position.resolve(def.center),
            rotation: doodad.rotation,
            scale: doodad.scale,
            tint: doodad.tint,
        }));
    }

    tracing::debug!("Resolved {} lights, {} doodads", lights.len(), doodads.len());
    (lights, doodads)
}
