//! # Room Primitive Generators
//!
//! Pure functions from shape parameters to closed, inward-facing meshes.
//!
//! ## Conventions
//!
//! - Z is up; the floor sits at `center.z`, the ceiling at `center.z + height`
//! - Every triangle is wound so its normal points into the room volume
//! - Each triangle carries exactly one [`MaterialZone`]
//! - Output depends only on the inputs, never on global state
//!
//! `heading` is a yaw in radians from +X. It orients corridors along their
//! span, turns chambers so that direction meets the middle of a wall, and
//! starts spiral ramps facing it. Boxes and circular rooms ignore it.
//! The layout resolver picks the heading of each room from its exits.

use std::f32::consts::{PI, TAU};

use crate::config::BuildConfig;
use crate::definition::Shape;
use crate::mesh::{MaterialZone, Mesh};
use delve_shared::{Vec2, Vec3};

/// Generates the mesh for `shape` centered at `center`.
///
/// Parameters are assumed validated (see [`Shape::validate`]).
#[must_use]
pub fn generate(shape: &Shape, center: Vec3, heading: f32, config: &BuildConfig) -> Mesh {
    generate_sloped(shape, center, heading, 0.0, config)
}

/// Like [`generate`], with the floor and ceiling of a corridor climbing
/// `rise` over its length in the direction of `heading`. `center.z` is the
/// floor height at the corridor's midpoint. Other shapes ignore `rise`.
#[must_use]
pub fn generate_sloped(shape: &Shape, center: Vec3, heading: f32, rise: f32, config: &BuildConfig) -> Mesh {
    let mut mesh = match *shape {
        Shape::Box { .. } => {
            let ring = footprint(shape, center, heading);
            cuboid(&ring, center, shape_height(shape), Vec2::ZERO)
        }
        Shape::Corridor { length, height, .. } => {
            let ring = footprint(shape, center, heading);
            let slope = Vec2::from_angle(heading) * (rise / length);
            cuboid(&ring, center, height, slope)
        }
        Shape::Circular { height, .. } | Shape::Chamber { height, .. } => {
            let ring = footprint(shape, center, heading);
            prism(&ring, center, height)
        }
        Shape::SpiralRamp { radius, height, turns, segments } => {
            spiral_ramp(center, radius, height, turns, segments, heading, config)
        }
    };
    mesh.recompute_normals();
    mesh.apply_planar_uvs(config.uv_scale);
    mesh
}

/// Floor outline of a shape, counter-clockwise seen from above.
///
/// For spiral ramps this is the outer circle of the walkway.
#[must_use]
pub fn footprint(shape: &Shape, center: Vec3, heading: f32) -> Vec<Vec2> {
    let origin = center.xy();
    match *shape {
        Shape::Box { width, length, .. } => {
            rectangle(origin, Vec2::new(width * 0.5, 0.0), Vec2::new(0.0, length * 0.5)).to_vec()
        }
        Shape::Corridor { width, length, .. } => {
            let forward = Vec2::from_angle(heading);
            let side = Vec2::new(-forward.y, forward.x);
            rectangle(origin, forward * (length * 0.5), side * (width * 0.5)).to_vec()
        }
        Shape::Circular { radius, segments, .. } => ring(origin, radius, segments, 0.0),
        Shape::Chamber { radius, sides, .. } => {
            ring(origin, radius, sides, heading + PI / sides as f32)
        }
        Shape::SpiralRamp { radius, segments, .. } => ring(origin, radius, segments, heading),
    }
}

/// Walkable floor-to-ceiling clearance of a room.
#[must_use]
pub fn clearance(shape: &Shape, config: &BuildConfig) -> f32 {
    match *shape {
        Shape::SpiralRamp { height, turns, .. } => spiral_headroom(height, turns, config),
        _ => shape_height(shape),
    }
}

/// Cross-section steps of a spiral ramp.
#[must_use]
pub fn spiral_steps(turns: f32, segments: u32) -> u32 {
    ((turns * segments as f32).ceil() as u32).max(1)
}

/// Vertical gap between a spiral ramp's walking surface and its ceiling.
///
/// A fraction of the rise per revolution, so successive loops never touch.
#[must_use]
pub fn spiral_headroom(height: f32, turns: f32, config: &BuildConfig) -> f32 {
    config.ramp_headroom_ratio * height / turns.max(1.0)
}

fn shape_height(shape: &Shape) -> f32 {
    match *shape {
        Shape::Box { height, .. }
        | Shape::Corridor { height, .. }
        | Shape::Circular { height, .. }
        | Shape::Chamber { height, .. }
        | Shape::SpiralRamp { height, .. } => height,
    }
}

/// Parallelogram `origin ± u ± v`, counter-clockwise when `u x v` points up.
fn rectangle(origin: Vec2, u: Vec2, v: Vec2) -> [Vec2; 4] {
    [origin - u - v, origin + u - v, origin + u + v, origin - u + v]
}

/// Regular polygon, first vertex at angle `phase`.
fn ring(origin: Vec2, radius: f32, count: u32, phase: f32) -> Vec<Vec2> {
    (0..count)
        .map(|k| origin + Vec2::from_angle(phase + TAU * k as f32 / count as f32) * radius)
        .collect()
}

/// Closed box over a four-point outline: 8 shared vertices, 12 triangles.
///
/// Floor and ceiling are raised by `slope · (p - center)` at each outline
/// point `p`; walls stay vertical.
fn cuboid(outline: &[Vec2], center: Vec3, height: f32, slope: Vec2) -> Mesh {
    let mut mesh = Mesh::new();
    let interior = center + Vec3::Z * (height * 0.5);
    let floor_at = |p: Vec2| center.z + slope.dot(p - center.xy());

    for &p in outline {
        mesh.push_vertex(p.extend(floor_at(p)));
    }
    for &p in outline {
        mesh.push_vertex(p.extend(floor_at(p) + height));
    }

    mesh.push_quad_facing([0, 1, 2, 3], MaterialZone::Floor, interior);
    mesh.push_quad_facing([4, 5, 6, 7], MaterialZone::Ceiling, interior);
    for i in 0..4 {
        let j = (i + 1) % 4;
        mesh.push_quad_facing([i, j, j + 4, i + 4], MaterialZone::Wall, interior);
    }
    mesh
}

/// Closed prism over an N-point outline: fan floor and ceiling around a
/// center vertex each, one quad per wall. `2N + 2` vertices, `4N` triangles.
fn prism(outline: &[Vec2], center: Vec3, height: f32) -> Mesh {
    let mut mesh = Mesh::new();
    let n = outline.len() as u32;
    let floor = center.z;
    let ceiling = center.z + height;
    let interior = center + Vec3::Z * (height * 0.5);

    for p in outline {
        mesh.push_vertex(p.extend(floor));
    }
    for p in outline {
        mesh.push_vertex(p.extend(ceiling));
    }
    let floor_hub = mesh.push_vertex(center.xy().extend(floor));
    let ceiling_hub = mesh.push_vertex(center.xy().extend(ceiling));

    for i in 0..n {
        let j = (i + 1) % n;
        mesh.push_triangle_facing([floor_hub, i, j], MaterialZone::Floor, interior);
    }
    for i in 0..n {
        let j = (i + 1) % n;
        mesh.push_triangle_facing([ceiling_hub, i + n, j + n], MaterialZone::Ceiling, interior);
    }
    for i in 0..n {
        let j = (i + 1) % n;
        mesh.push_quad_facing([i, j, j + n, i + n], MaterialZone::Wall, interior);
    }
    mesh
}

/// Helical walkway: a rectangular tube swept around the room axis.
///
/// Each cross-section holds four vertices (inner floor, outer floor, outer
/// ceiling, inner ceiling). Consecutive sections are joined by four quads and
/// both ends are capped: `8S + 4` triangles for `S` steps.
fn spiral_ramp(
    center: Vec3,
    radius: f32,
    height: f32,
    turns: f32,
    segments: u32,
    phase: f32,
    config: &BuildConfig,
) -> Mesh {
    let steps = spiral_steps(turns, segments);
    let inner = radius * config.ramp_inner_ratio;
    let headroom = spiral_headroom(height, turns, config);
    let sweep = turns * TAU;
    let axis = center.xy();

    let mut mesh = Mesh::new();
    for k in 0..=steps {
        let t = k as f32 / steps as f32;
        let dir = Vec2::from_angle(phase + sweep * t);
        let z = center.z + height * t;
        mesh.push_vertex((axis + dir * inner).extend(z));
        mesh.push_vertex((axis + dir * radius).extend(z));
        mesh.push_vertex((axis + dir * radius).extend(z + headroom));
        mesh.push_vertex((axis + dir * inner).extend(z + headroom));
    }

    let section_center = |mesh: &Mesh, k: u32| {
        let base = (4 * k) as usize;
        mesh.positions[base..base + 4]
            .iter()
            .fold(Vec3::ZERO, |acc, &p| acc + p)
            * 0.25
    };

    for k in 0..steps {
        let a = 4 * k;
        let b = 4 * (k + 1);
        let interior = (section_center(&mesh, k) + section_center(&mesh, k + 1)) * 0.5;
        mesh.push_quad_facing([a, a + 1, b + 1, b], MaterialZone::Floor, interior);
        mesh.push_quad_facing([a + 1, a + 2, b + 2, b + 1], MaterialZone::Wall, interior);
        mesh.push_quad_facing([a + 2, a + 3, b + 3, b + 2], MaterialZone::Ceiling, interior);
        mesh.push_quad_facing([a + 3, a, b, b + 3], MaterialZone::Wall, interior);
    }

    let start_interior = (section_center(&mesh, 0) + section_center(&mesh, 1)) * 0.5;
    mesh.push_quad_facing([0, 1, 2, 3], MaterialZone::Wall, start_interior);
    let last = 4 * steps;
    let end_interior = (section_center(&mesh, steps - 1) + section_center(&mesh, steps)) * 0.5;
    mesh.push_quad_facing([last, last + 1, last + 2, last + 3], MaterialZone::Wall, end_interior);

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BuildConfig {
        BuildConfig::default()
    }

    /// Every face normal points towards `interior`.
    fn faces_point_at(mesh: &Mesh, interior: Vec3) -> bool {
        (0..mesh.triangle_count()).all(|i| {
            let [a, b, c] = mesh.triangle_positions(i);
            let centroid = (a + b + c) * (1.0 / 3.0);
            mesh.face_cross(i).dot(interior - centroid) > 0.0
        })
    }

    fn assert_closed_room(mesh: &Mesh) {
        assert!(mesh.is_consistent());
        assert!(mesh.is_closed_manifold(), "{} manifold defects", mesh.manifold_defects());
        assert!(mesh.is_inward_wound());
        assert!(mesh.zone_area(MaterialZone::Floor) > 0.0);
    }

    #[test]
    fn test_box_room() {
        let shape = Shape::Box { width: 30.0, length: 40.0, height: 10.0 };
        let mesh = generate(&shape, Vec3::ZERO, 0.0, &config());

        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.zone_count(MaterialZone::Floor), 2);
        assert_eq!(mesh.zone_count(MaterialZone::Ceiling), 2);
        assert_eq!(mesh.zone_count(MaterialZone::Wall), 8);
        assert_closed_room(&mesh);
        assert!((mesh.zone_area(MaterialZone::Floor) - 1200.0).abs() < 1e-2);

        let bounds = mesh.bounds();
        assert_eq!(bounds.min, Vec3::new(-15.0, -20.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(15.0, 20.0, 10.0));
        assert!(faces_point_at(&mesh, Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_circular_room() {
        let shape = Shape::Circular { radius: 25.0, height: 15.0, segments: 16 };
        let center = Vec3::new(0.0, 110.0, 0.0);
        let mesh = generate(&shape, center, 0.0, &config());

        assert_eq!(mesh.triangle_count(), 64);
        assert_eq!(mesh.vertex_count(), 34);
        assert_eq!(mesh.zone_count(MaterialZone::Floor), 16);
        assert_closed_room(&mesh);
        assert!(faces_point_at(&mesh, center + Vec3::new(0.0, 0.0, 7.5)));
    }

    #[test]
    fn test_chamber_wall_faces_first_exit() {
        let shape = Shape::Chamber { radius: 10.0, height: 6.0, sides: 6 };
        let heading = 0.3;
        let ring = footprint(&shape, Vec3::ZERO, heading);

        // The exit direction bisects the edge between the last and first vertex
        let midpoint = (ring[5] + ring[0]) * 0.5;
        assert!((midpoint.angle() - heading).abs() < 1e-5);

        let mesh = generate(&shape, Vec3::ZERO, heading, &config());
        assert_eq!(mesh.triangle_count(), 24);
        assert_closed_room(&mesh);
    }

    #[test]
    fn test_corridor_follows_heading() {
        let shape = Shape::Corridor { width: 8.0, length: 50.0, height: 8.0 };
        let mesh = generate(&shape, Vec3::ZERO, std::f32::consts::FRAC_PI_2, &config());
        let bounds = mesh.bounds();

        assert!((bounds.extents().y - 50.0).abs() < 1e-3);
        assert!((bounds.extents().x - 8.0).abs() < 1e-3);
        assert_eq!(mesh.triangle_count(), 12);
        assert_closed_room(&mesh);
    }

    #[test]
    fn test_sloped_corridor_climbs_along_heading() {
        let shape = Shape::Corridor { width: 8.0, length: 40.0, height: 6.0 };
        let center = Vec3::new(0.0, 0.0, 5.0);
        let mesh = generate_sloped(&shape, center, 0.0, 10.0, &config());

        assert_eq!(mesh.triangle_count(), 12);
        assert_closed_room(&mesh);
        let bounds = mesh.bounds();
        assert!((bounds.min.z - 0.0).abs() < 1e-4);
        assert!((bounds.max.z - 16.0).abs() < 1e-4);
        // Back end at the low floor, front end at the high floor
        for p in &mesh.positions[..4] {
            let expected = if p.x < 0.0 { 0.0 } else { 10.0 };
            assert!((p.z - expected).abs() < 1e-4, "floor vertex {p:?}");
        }
        assert_eq!(generate_sloped(&shape, center, 0.0, 0.0, &config()), generate(&shape, center, 0.0, &config()));
    }

    #[test]
    fn test_spiral_ramp() {
        let shape = Shape::SpiralRamp { radius: 10.0, height: 20.0, turns: 2.0, segments: 8 };
        let mesh = generate(&shape, Vec3::new(5.0, 5.0, 2.0), 0.0, &config());
        let steps = spiral_steps(2.0, 8);

        assert_eq!(steps, 16);
        assert_eq!(mesh.vertex_count(), 4 * (steps as usize + 1));
        assert_eq!(mesh.triangle_count(), 8 * steps as usize + 4);
        assert_closed_room(&mesh);

        let bounds = mesh.bounds();
        assert!((bounds.min.z - 2.0).abs() < 1e-5);
        assert!((bounds.max.z - (22.0 + spiral_headroom(20.0, 2.0, &config()))).abs() < 1e-4);
    }

    #[test]
    fn test_fractional_turns_round_up() {
        assert_eq!(spiral_steps(0.5, 7), 4);
        let shape = Shape::SpiralRamp { radius: 6.0, height: 4.0, turns: 0.5, segments: 7 };
        assert_closed_room(&generate(&shape, Vec3::ZERO, 1.0, &config()));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let shape = Shape::Chamber { radius: 12.0, height: 5.0, sides: 5 };
        let a = generate(&shape, Vec3::new(1.0, 2.0, 3.0), 0.7, &config());
        let b = generate(&shape, Vec3::new(1.0, 2.0, 3.0), 0.7, &config());
        assert_eq!(a, b);
    }

    #[test]
    fn test_normals_and_uvs_are_filled() {
        let shape = Shape::Box { width: 8.0, length: 8.0, height: 4.0 };
        let mesh = generate(&shape, Vec3::ZERO, 0.0, &config());
        assert!(mesh.normals.iter().all(|n| (n.length() - 1.0).abs() < 1e-4));
        // Corner (-4, -4, 4) with uv_scale 4
        assert_eq!(mesh.uvs[4], Vec2::new(-2.0, 1.0));
    }
}
