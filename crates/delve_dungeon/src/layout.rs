//! # Room Connector / Layout Resolver
//!
//! Turns the declared connection list into corridor rooms and portal
//! candidates.
//!
//! Connections are resolved by iterating the explicit list in declaration
//! order; the room graph is never traversed, so cycles need no special
//! handling. Each unordered pair is resolved once: the first declaration
//! wins and later repeats (including the reverse direction) are skipped.
//!
//! For a pair `A -> B` with horizontal direction `d`, the corridor spans the
//! gap between the point where `d` leaves A's footprint and the point where
//! `-d` leaves B's footprint. Its floor ramps from A's floor height to B's,
//! so each end opens onto its room at floor level.
//!
//! Chambers are rotated so their exits land as close to wall midpoints as
//! possible; spiral ramps face their first exit.

use std::collections::{HashMap, HashSet};
use std::f32::consts::{PI, TAU};

use crate::config::BuildConfig;
use crate::definition::{DungeonDefinition, Shape};
use crate::error::{ConfigurationError, Degeneracy, Diagnostic};
use crate::primitives;
use delve_shared::{Vec2, Vec3, GEOMETRY_EPSILON};

/// A corridor synthesized for one connection.
#[derive(Clone, Debug, PartialEq)]
pub struct CorridorPlan {
    /// Room id, `"<source>-><target>"`.
    pub id: String,
    /// Index of the declaring room.
    pub source: usize,
    /// Index of the target room.
    pub target: usize,
    /// Floor center of the corridor, halfway up its slope.
    pub center: Vec3,
    /// Yaw of the walking direction, source to target.
    pub heading: f32,
    /// Floor height gained from the source end to the target end.
    pub rise: f32,
    /// Corridor shape; its length runs along `heading`.
    pub shape: Shape,
}

impl CorridorPlan {
    /// Length along the walking direction.
    #[must_use]
    pub fn length(&self) -> f32 {
        match self.shape {
            Shape::Corridor { length, .. } => length,
            _ => 0.0,
        }
    }
}

/// An opening between two adjoining rooms, before polygon construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortalCandidate {
    /// Room indices; walking from `rooms[0]` into `rooms[1]` follows `direction`.
    pub rooms: [usize; 2],
    /// Floor-level center of the opening.
    pub anchor: Vec3,
    /// Horizontal unit vector from `rooms[0]` into `rooms[1]`.
    pub direction: Vec3,
    /// Opening width.
    pub width: f32,
    /// Opening height.
    pub height: f32,
}

/// Result of connection resolution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layout {
    /// Orientation of each declared room (0 when unconnected).
    pub headings: Vec<f32>,
    /// Corridors in connection declaration order.
    pub corridors: Vec<CorridorPlan>,
    /// Two candidates per corridor: `{source, corridor}`, `{corridor, target}`.
    pub candidates: Vec<PortalCandidate>,
    /// Chambers whose exits could not all be centered on a wall.
    pub diagnostics: Vec<Diagnostic>,
}

/// Distance from `origin` along `dir` to the boundary of a convex outline.
///
/// Returns 0 when the ray misses, which only happens for an origin outside
/// the outline.
#[must_use]
pub fn ray_extent(outline: &[Vec2], origin: Vec2, dir: Vec2) -> f32 {
    let mut best = f32::INFINITY;
    for (i, &p) in outline.iter().enumerate() {
        let q = outline[(i + 1) % outline.len()];
        let edge = q - p;
        let denom = dir.perp_dot(edge);
        if denom.abs() < GEOMETRY_EPSILON {
            continue;
        }
        let w = p - origin;
        let t = w.perp_dot(edge) / denom;
        let s = w.perp_dot(dir) / denom;
        if t >= 0.0 && (-GEOMETRY_EPSILON..=1.0 + GEOMETRY_EPSILON).contains(&s) {
            best = best.min(t);
        }
    }
    if best.is_finite() {
        best
    } else {
        0.0
    }
}

/// Resolves every declared connection into a corridor and two portal
/// candidates. Corridor `k` gets room index `rooms.len() + k`.
///
/// # Errors
///
/// - [`ConfigurationError::UnknownConnectionTarget`] for an undeclared target
/// - [`ConfigurationError::SelfConnection`] for a room naming itself
/// - [`ConfigurationError::DuplicateRoomId`] when a corridor id collides
/// - [`ConfigurationError::InvalidPlacement`] when two connected rooms share
///   a horizontal center and no direction exists
pub fn resolve(
    definition: &DungeonDefinition,
    config: &BuildConfig,
) -> Result<Layout, ConfigurationError> {
    let index: HashMap<&str, usize> = definition
        .rooms
        .iter()
        .enumerate()
        .map(|(i, room)| (room.id.as_str(), i))
        .collect();

    let pairs = connection_pairs(definition, &index)?;
    let width = config.effective_corridor_width();
    let mut diagnostics = Vec::new();
    let headings = room_headings(definition, &pairs, width, &mut diagnostics);

    let mut layout = Layout {
        headings,
        corridors: Vec::with_capacity(pairs.len()),
        candidates: Vec::with_capacity(pairs.len() * 2),
        diagnostics,
    };
    let mut corridor_ids: HashSet<String> = HashSet::with_capacity(pairs.len());

    for (a, b) in pairs {
        let room_a = &definition.rooms[a];
        let room_b = &definition.rooms[b];
        let delta = (room_b.center - room_a.center).xy();
        let distance = delta.length();
        if distance < GEOMETRY_EPSILON {
            return Err(ConfigurationError::InvalidPlacement {
                room: room_a.id.clone(),
                reason: format!("connected room '{}' shares its horizontal center", room_b.id),
            });
        }
        let dir = delta * (1.0 / distance);

        let extent_a = ray_extent(
            &primitives::footprint(&room_a.shape, room_a.center, layout.headings[a]),
            room_a.center.xy(),
            dir,
        );
        let extent_b = ray_extent(
            &primitives::footprint(&room_b.shape, room_b.center, layout.headings[b]),
            room_b.center.xy(),
            dir * -1.0,
        );
        let length = (distance - extent_a - extent_b).max(config.min_walkable_width);
        let exit_a = room_a.center.xy() + dir * extent_a;
        let exit_b = room_b.center.xy() - dir * extent_b;
        let midpoint = (exit_a + exit_b) * 0.5;
        let floor_a = room_a.center.z;
        let floor_b = room_b.center.z;
        let center = midpoint.extend((floor_a + floor_b) * 0.5);
        let height = config
            .corridor_height
            .min(primitives::clearance(&room_a.shape, config))
            .min(primitives::clearance(&room_b.shape, config));

        let id = format!("{}->{}", room_a.id, room_b.id);
        if index.contains_key(id.as_str()) || !corridor_ids.insert(id.clone()) {
            return Err(ConfigurationError::DuplicateRoomId { room: id });
        }

        let corridor_index = definition.rooms.len() + layout.corridors.len();
        // Each opening sits at its own room's floor; the corridor height
        // never exceeds either room's clearance
        let direction = dir.extend(0.0);
        let half = dir * (length * 0.5);
        layout.candidates.push(PortalCandidate {
            rooms: [a, corridor_index],
            anchor: (midpoint - half).extend(floor_a),
            direction,
            width,
            height,
        });
        layout.candidates.push(PortalCandidate {
            rooms: [corridor_index, b],
            anchor: (midpoint + half).extend(floor_b),
            direction,
            width,
            height,
        });

        tracing::debug!(
            "Corridor {}: length={:.3} rise={:.3} (gap {:.3}, extents {:.3}/{:.3})",
            id,
            length,
            floor_b - floor_a,
            distance,
            extent_a,
            extent_b
        );
        layout.corridors.push(CorridorPlan {
            id,
            source: a,
            target: b,
            center,
            heading: dir.angle(),
            rise: floor_b - floor_a,
            shape: Shape::Corridor { width, length, height },
        });
    }

    Ok(layout)
}

/// Declared connections as index pairs, first declaration of each unordered
/// pair only.
fn connection_pairs(
    definition: &DungeonDefinition,
    index: &HashMap<&str, usize>,
) -> Result<Vec<(usize, usize)>, ConfigurationError> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();

    for (a, room) in definition.rooms.iter().enumerate() {
        for target in &room.connections {
            let b = *index.get(target.as_str()).ok_or_else(|| {
                ConfigurationError::UnknownConnectionTarget {
                    room: room.id.clone(),
                    target: target.clone(),
                }
            })?;
            if a == b {
                return Err(ConfigurationError::SelfConnection { room: room.id.clone() });
            }
            if seen.insert((a.min(b), a.max(b))) {
                pairs.push((a, b));
            } else {
                tracing::debug!("Skipping repeated connection {} -> {}", room.id, target);
            }
        }
    }
    Ok(pairs)
}

/// Orientation of each declared room, from the directions of its exits.
///
/// Chambers take the rotation that minimizes the largest angle between any
/// exit and its nearest wall midpoint. Every other shape faces its first
/// exit.
fn room_headings(
    definition: &DungeonDefinition,
    pairs: &[(usize, usize)],
    corridor_width: f32,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<f32> {
    let mut exits: Vec<Vec<f32>> = vec![Vec::new(); definition.rooms.len()];
    for &(a, b) in pairs {
        let delta = (definition.rooms[b].center - definition.rooms[a].center).xy();
        if delta.length() < GEOMETRY_EPSILON {
            continue;
        }
        exits[a].push(delta.angle());
        exits[b].push((delta * -1.0).angle());
    }

    definition
        .rooms
        .iter()
        .zip(&exits)
        .map(|(room, exits)| match (room.shape, exits.first()) {
            (_, None) => 0.0,
            (Shape::Chamber { radius, sides, .. }, Some(_)) => {
                let (heading, worst) = chamber_heading(exits, sides);
                if !exit_fits(radius, sides, worst, corridor_width) {
                    tracing::warn!(
                        "Chamber '{}' cannot center all {} exits on its walls (worst offset {:.1} deg)",
                        room.id,
                        exits.len(),
                        worst.to_degrees()
                    );
                    diagnostics.push(Diagnostic::GeometryDegeneracy {
                        room: room.id.clone(),
                        kind: Degeneracy::MisalignedExit,
                        count: exits.len(),
                    });
                }
                heading
            }
            (_, Some(&first)) => first,
        })
        .collect()
}

/// Rotation of a `sides`-gon that brings `exits` closest to wall midpoints,
/// and the largest remaining angle between an exit and its midpoint.
///
/// Midpoints repeat every `TAU / sides`, so only each exit's angle modulo
/// that step matters. The best rotation is the center of the shortest arc
/// covering those residues, i.e. opposite the widest gap between them.
fn chamber_heading(exits: &[f32], sides: u32) -> (f32, f32) {
    let step = TAU / sides as f32;
    let first = exits[0];
    let mut residues: Vec<f32> = exits.iter().map(|&e| (e - first).rem_euclid(step)).collect();
    residues.sort_by(f32::total_cmp);

    let last = residues[residues.len() - 1];
    let mut widest_gap = residues[0] + step - last;
    let mut arc_start = residues[0];
    for pair in residues.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > widest_gap {
            widest_gap = gap;
            arc_start = pair[1];
        }
    }
    let spread = (step - widest_gap).max(0.0);
    (first + arc_start + spread * 0.5, spread * 0.5)
}

/// True when a corridor of `width` leaving a chamber `offset` radians from a
/// wall midpoint stays within that wall.
fn exit_fits(radius: f32, sides: u32, offset: f32, width: f32) -> bool {
    let half_angle = PI / sides as f32;
    let apothem = radius * half_angle.cos();
    let half_wall = radius * half_angle.sin();
    offset < half_angle && apothem * offset.tan() + width * 0.5 <= half_wall + GEOMETRY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::RoomDefinition;

    fn two_rooms() -> DungeonDefinition {
        DungeonDefinition::new("Pair", 1)
            .with_room(
                RoomDefinition::new(
                    "A",
                    Shape::Box { width: 30.0, length: 40.0, height: 10.0 },
                    Vec3::ZERO,
                )
                .connect("B"),
            )
            .with_room(RoomDefinition::new(
                "B",
                Shape::Circular { radius: 25.0, height: 15.0, segments: 16 },
                Vec3::new(0.0, 110.0, 0.0),
            ))
    }

    #[test]
    fn test_ray_extent_box() {
        let outline = primitives::footprint(
            &Shape::Box { width: 30.0, length: 40.0, height: 10.0 },
            Vec3::ZERO,
            0.0,
        );
        assert!((ray_extent(&outline, Vec2::ZERO, Vec2::new(0.0, 1.0)) - 20.0).abs() < 1e-4);
        assert!((ray_extent(&outline, Vec2::ZERO, Vec2::new(-1.0, 0.0)) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_corridor_between_box_and_cylinder() {
        let config = BuildConfig::default();
        let layout = resolve(&two_rooms(), &config).unwrap();

        assert_eq!(layout.corridors.len(), 1);
        let corridor = &layout.corridors[0];
        assert_eq!(corridor.id, "A->B");
        assert!((corridor.length() - 65.0).abs() < 1e-3);
        // Corridor spans y = 20 .. 85
        assert!((corridor.center.y - 52.5).abs() < 1e-3);
        assert_eq!(corridor.center.z, 0.0);
        assert!(matches!(corridor.shape, Shape::Corridor { height, .. } if height == 8.0));

        assert_eq!(layout.candidates.len(), 2);
        assert_eq!(layout.candidates[0].rooms, [0, 2]);
        assert_eq!(layout.candidates[1].rooms, [2, 1]);
        assert!((layout.candidates[0].anchor.y - 20.0).abs() < 1e-3);
        assert!((layout.candidates[1].anchor.y - 85.0).abs() < 1e-3);
    }

    #[test]
    fn test_overlapping_rooms_get_minimum_corridor() {
        let mut def = two_rooms();
        def.rooms[1].center = Vec3::new(0.0, 30.0, 0.0);
        let config = BuildConfig::default();
        let layout = resolve(&def, &config).unwrap();
        assert_eq!(layout.corridors[0].length(), config.min_walkable_width);
    }

    #[test]
    fn test_repeated_pair_resolved_once() {
        let mut def = two_rooms();
        def.rooms[0].connections.push("B".to_string());
        def.rooms[1].connections.push("A".to_string());
        let layout = resolve(&def, &BuildConfig::default()).unwrap();
        assert_eq!(layout.corridors.len(), 1);
        assert_eq!(layout.corridors[0].source, 0);
    }

    #[test]
    fn test_cycle_resolves_every_edge() {
        let shape = Shape::Box { width: 10.0, length: 10.0, height: 5.0 };
        let def = DungeonDefinition::new("Ring", 1)
            .with_room(RoomDefinition::new("a", shape, Vec3::ZERO).connect("b"))
            .with_room(RoomDefinition::new("b", shape, Vec3::new(50.0, 0.0, 0.0)).connect("c"))
            .with_room(RoomDefinition::new("c", shape, Vec3::new(25.0, 50.0, 0.0)).connect("a"));
        let layout = resolve(&def, &BuildConfig::default()).unwrap();
        let ids: Vec<&str> = layout.corridors.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a->b", "b->c", "c->a"]);
    }

    #[test]
    fn test_corridor_id_collision() {
        let shape = Shape::Box { width: 10.0, length: 10.0, height: 5.0 };
        let def = DungeonDefinition::new("Clash", 1)
            .with_room(RoomDefinition::new("a", shape, Vec3::ZERO).connect("b"))
            .with_room(RoomDefinition::new("b", shape, Vec3::new(50.0, 0.0, 0.0)))
            .with_room(RoomDefinition::new("a->b", shape, Vec3::new(0.0, 50.0, 0.0)));
        assert_eq!(
            resolve(&def, &BuildConfig::default()),
            Err(ConfigurationError::DuplicateRoomId { room: "a->b".to_string() })
        );
    }

    #[test]
    fn test_stacked_rooms_rejected() {
        let mut def = two_rooms();
        def.rooms[1].center = Vec3::new(0.0, 0.0, 40.0);
        assert!(matches!(
            resolve(&def, &BuildConfig::default()),
            Err(ConfigurationError::InvalidPlacement { .. })
        ));
    }

    #[test]
    fn test_corridor_ramps_between_floor_heights() {
        let shape = Shape::Box { width: 30.0, length: 30.0, height: 10.0 };
        let def = DungeonDefinition::new("Steps", 1)
            .with_room(RoomDefinition::new("low", shape, Vec3::ZERO).connect("high"))
            .with_room(RoomDefinition::new("high", shape, Vec3::new(0.0, 100.0, 12.0)));
        let layout = resolve(&def, &BuildConfig::default()).unwrap();

        let corridor = &layout.corridors[0];
        assert_eq!(corridor.rise, 12.0);
        assert_eq!(corridor.center.z, 6.0);
        assert_eq!(layout.candidates[0].anchor.z, 0.0);
        assert_eq!(layout.candidates[1].anchor.z, 12.0);
        assert!(layout.candidates.iter().all(|c| c.height <= 10.0));
    }

    /// Inside or on a counter-clockwise convex outline.
    fn inside(outline: &[Vec2], point: Vec2) -> bool {
        outline.iter().enumerate().all(|(i, &p)| {
            let q = outline[(i + 1) % outline.len()];
            (q - p).perp_dot(point - p) >= -1e-3
        })
    }

    fn hub_with_exits(shape: Shape, angles: &[f32]) -> DungeonDefinition {
        let spoke = Shape::Box { width: 10.0, length: 10.0, height: 5.0 };
        let mut hub = RoomDefinition::new("hub", shape, Vec3::ZERO);
        let mut def = DungeonDefinition::new("Hub", 1);
        for (i, &angle) in angles.iter().enumerate() {
            let id = format!("spoke{i}");
            hub = hub.connect(id.as_str());
            let center = Vec2::from_angle(angle) * 100.0;
            def = def.with_room(RoomDefinition::new(id, spoke, center.extend(0.0)));
        }
        def.rooms.insert(0, hub);
        def
    }

    #[test]
    fn test_chamber_turns_to_fit_every_exit() {
        let shape = Shape::Chamber { radius: 20.0, height: 12.0, sides: 6 };
        // 30 degrees apart: facing the first exit would put the second on a corner
        let def = hub_with_exits(shape, &[0.0, PI / 6.0]);
        let config = BuildConfig::default();
        let layout = resolve(&def, &config).unwrap();

        assert!(layout.diagnostics.is_empty(), "{:?}", layout.diagnostics);
        assert!((layout.headings[0] - PI / 12.0).abs() < 1e-5);

        let outline = primitives::footprint(&shape, Vec3::ZERO, layout.headings[0]);
        let openings: Vec<_> = layout.candidates.iter().filter(|c| c.rooms[0] == 0).collect();
        assert_eq!(openings.len(), 2);
        for opening in openings {
            let dir = opening.direction.xy();
            let side = Vec2::new(-dir.y, dir.x) * (opening.width * 0.5);
            let anchor = opening.anchor.xy();
            assert!(inside(&outline, anchor + side), "opening leaves the wall at {anchor:?}");
            assert!(inside(&outline, anchor - side), "opening leaves the wall at {anchor:?}");
        }
    }

    #[test]
    fn test_crowded_chamber_reports_misaligned_exit() {
        let shape = Shape::Chamber { radius: 6.0, height: 5.0, sides: 4 };
        let def = hub_with_exits(shape, &[0.0, PI / 4.0]);
        let layout = resolve(&def, &BuildConfig::default()).unwrap();

        assert_eq!(
            layout.diagnostics,
            [Diagnostic::GeometryDegeneracy {
                room: "hub".to_string(),
                kind: Degeneracy::MisalignedExit,
                count: 2,
            }]
        );
        assert_eq!(layout.corridors.len(), 2);
    }

    #[test]
    fn test_chamber_heading_single_exit_faces_it() {
        assert_eq!(chamber_heading(&[1.25], 5), (1.25, 0.0));
        assert!(exit_fits(20.0, 6, 0.0, 8.0));
        assert!(!exit_fits(20.0, 6, PI / 6.0, 8.0));
    }

    #[test]
    fn test_corridor_height_capped_by_rooms() {
        let mut def = two_rooms();
        def.rooms[0].shape = Shape::Box { width: 30.0, length: 40.0, height: 5.0 };
        let layout = resolve(&def, &BuildConfig::default()).unwrap();
        assert_eq!(layout.candidates[0].height, 5.0);
    }
}
