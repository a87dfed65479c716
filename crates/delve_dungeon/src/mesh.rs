//! Triangle meshes shared by every stage.
//!
//! A [`Mesh`] is an indexed triangle list with per-vertex normals and UVs and
//! two per-triangle tags: the [`MaterialZone`] assigned by the generator and
//! the [`MaterialId`] assigned by the registry stage.

use std::collections::HashMap;

use crate::material::MaterialId;
use delve_shared::{Aabb, Vec2, Vec3, GEOMETRY_EPSILON};

/// Surface category of a triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MaterialZone {
    /// Walking surface.
    #[default]
    Floor = 0,
    /// Vertical or sloped side surface.
    Wall = 1,
    /// Overhead surface.
    Ceiling = 2,
}

impl MaterialZone {
    /// All zones in storage order.
    pub const ALL: [Self; 3] = [Self::Floor, Self::Wall, Self::Ceiling];

    /// Converts from the stored byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Floor),
            1 => Some(Self::Wall),
            2 => Some(Self::Ceiling),
            _ => None,
        }
    }
}

/// Indexed triangle mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions in world space.
    pub positions: Vec<Vec3>,
    /// Per-vertex unit normals.
    pub normals: Vec<Vec3>,
    /// Per-vertex texture coordinates.
    pub uvs: Vec<Vec2>,
    /// Triangles as vertex index triplets.
    pub triangles: Vec<[u32; 3]>,
    /// Zone of each triangle.
    pub zones: Vec<MaterialZone>,
    /// Registry index of each triangle's material.
    pub materials: Vec<MaterialId>,
}

impl Mesh {
    /// Creates an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Appends a vertex and returns its index. Normal and UV are filled in
    /// by [`Mesh::recompute_normals`] and [`Mesh::apply_planar_uvs`].
    pub fn push_vertex(&mut self, position: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(Vec3::ZERO);
        self.uvs.push(Vec2::ZERO);
        index
    }

    /// Appends a triangle as given.
    pub fn push_triangle(&mut self, triangle: [u32; 3], zone: MaterialZone) {
        self.triangles.push(triangle);
        self.zones.push(zone);
        self.materials.push(MaterialId::default());
    }

    /// Appends a triangle wound so that its normal faces `interior`.
    pub fn push_triangle_facing(&mut self, [a, b, c]: [u32; 3], zone: MaterialZone, interior: Vec3) {
        let [pa, pb, pc] = self.corners([a, b, c]);
        let normal = (pb - pa).cross(pc - pa);
        let centroid = (pa + pb + pc) * (1.0 / 3.0);
        if normal.dot(interior - centroid) < 0.0 {
            self.push_triangle([a, c, b], zone);
        } else {
            self.push_triangle([a, b, c], zone);
        }
    }

    /// Appends the quad `a b c d` (in ring order) as two triangles sharing
    /// the `a c` diagonal, wound so the quad faces `interior`.
    pub fn push_quad_facing(&mut self, [a, b, c, d]: [u32; 4], zone: MaterialZone, interior: Vec3) {
        let [pa, pb, pc] = self.corners([a, b, c]);
        let pd = self.positions[d as usize];
        let normal = (pc - pa).cross(pd - pb);
        let centroid = (pa + pb + pc + pd) * 0.25;
        if normal.dot(interior - centroid) < 0.0 {
            self.push_triangle([a, d, c], zone);
            self.push_triangle([a, c, b], zone);
        } else {
            self.push_triangle([a, b, c], zone);
            self.push_triangle([a, c, d], zone);
        }
    }

    fn corners(&self, [a, b, c]: [u32; 3]) -> [Vec3; 3] {
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Corner positions of triangle `index`.
    #[must_use]
    pub fn triangle_positions(&self, index: usize) -> [Vec3; 3] {
        self.corners(self.triangles[index])
    }

    /// Unnormalized normal of triangle `index`; its length is twice the area.
    #[must_use]
    pub fn face_cross(&self, index: usize) -> Vec3 {
        let [a, b, c] = self.triangle_positions(index);
        (b - a).cross(c - a)
    }

    /// Area of triangle `index`.
    #[must_use]
    pub fn triangle_area(&self, index: usize) -> f32 {
        self.face_cross(index).length() * 0.5
    }

    /// Total area of the triangles tagged `zone`.
    #[must_use]
    pub fn zone_area(&self, zone: MaterialZone) -> f32 {
        (0..self.triangle_count())
            .filter(|&i| self.zones[i] == zone)
            .map(|i| self.triangle_area(i))
            .sum()
    }

    /// Number of triangles tagged `zone`.
    #[must_use]
    pub fn zone_count(&self, zone: MaterialZone) -> usize {
        self.zones.iter().filter(|&&z| z == zone).count()
    }

    /// Bounding box of all vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.positions)
    }

    /// Recomputes vertex normals as the normalized sum of area-weighted
    /// incident face normals.
    pub fn recompute_normals(&mut self) {
        let mut sums = vec![Vec3::ZERO; self.positions.len()];
        for i in 0..self.triangle_count() {
            let cross = self.face_cross(i);
            for &v in &self.triangles[i] {
                sums[v as usize] += cross;
            }
        }
        self.normals = sums.into_iter().map(Vec3::normalize_or_zero).collect();
    }

    /// Assigns planar UVs: `u = (x + y) / scale`, `v = z / scale`.
    pub fn apply_planar_uvs(&mut self, scale: f32) {
        let inv = 1.0 / scale;
        self.uvs = self
            .positions
            .iter()
            .map(|p| Vec2::new((p.x + p.y) * inv, p.z * inv))
            .collect();
    }

    /// Stably reorders triangles so equal materials are contiguous.
    pub fn sort_by_material(&mut self) {
        let mut order: Vec<usize> = (0..self.triangle_count()).collect();
        order.sort_by_key(|&i| self.materials[i]);
        self.triangles = order.iter().map(|&i| self.triangles[i]).collect();
        self.zones = order.iter().map(|&i| self.zones[i]).collect();
        self.materials = order.iter().map(|&i| self.materials[i]).collect();
    }

    /// Runs of equal material as `(material, first triangle, triangle count)`.
    #[must_use]
    pub fn batches(&self) -> Vec<(MaterialId, u32, u32)> {
        let mut batches: Vec<(MaterialId, u32, u32)> = Vec::new();
        for (i, &material) in self.materials.iter().enumerate() {
            match batches.last_mut() {
                Some((current, _, count)) if *current == material => *count += 1,
                _ => batches.push((material, i as u32, 1)),
            }
        }
        batches
    }

    /// Count of directed edges that break closed two-manifoldness.
    ///
    /// A closed, consistently wound mesh uses every directed edge exactly
    /// once and its reverse exactly once. Each directed edge that repeats or
    /// lacks its twin counts as one defect.
    #[must_use]
    pub fn manifold_defects(&self) -> usize {
        let mut edges: HashMap<(u32, u32), u32> = HashMap::with_capacity(self.triangles.len() * 3);
        for &[a, b, c] in &self.triangles {
            for edge in [(a, b), (b, c), (c, a)] {
                *edges.entry(edge).or_insert(0) += 1;
            }
        }
        edges
            .iter()
            .filter(|&(&(a, b), &count)| count != 1 || edges.get(&(b, a)) != Some(&1))
            .count()
    }

    /// True when the mesh is a closed, consistently wound two-manifold.
    #[must_use]
    pub fn is_closed_manifold(&self) -> bool {
        !self.triangles.is_empty() && self.manifold_defects() == 0
    }

    /// True when every triangle's normal points into the enclosed volume,
    /// judged by the signed volume of the closed shell.
    ///
    /// An inward-wound closed mesh has negative signed volume.
    #[must_use]
    pub fn is_inward_wound(&self) -> bool {
        self.signed_volume() < -GEOMETRY_EPSILON
    }

    /// Signed volume enclosed by the triangles (positive for outward winding).
    #[must_use]
    pub fn signed_volume(&self) -> f32 {
        let origin = self.bounds().center();
        (0..self.triangle_count())
            .map(|i| {
                let [a, b, c] = self.triangle_positions(i);
                (a - origin).dot((b - origin).cross(c - origin)) / 6.0
            })
            .sum()
    }

    /// True when every triangle index addresses an existing vertex and the
    /// per-triangle and per-vertex arrays line up.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let n = self.positions.len();
        self.normals.len() == n
            && self.uvs.len() == n
            && self.zones.len() == self.triangles.len()
            && self.materials.len() == self.triangles.len()
            && self
                .triangles
                .iter()
                .all(|t| t.iter().all(|&v| (v as usize) < n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit tetrahedron wound inward.
    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.push_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = mesh.push_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = mesh.push_vertex(Vec3::new(0.0, 1.0, 0.0));
        let d = mesh.push_vertex(Vec3::new(0.0, 0.0, 1.0));
        let inside = Vec3::new(0.2, 0.2, 0.2);
        mesh.push_triangle_facing([a, b, c], MaterialZone::Floor, inside);
        mesh.push_triangle_facing([a, b, d], MaterialZone::Wall, inside);
        mesh.push_triangle_facing([a, c, d], MaterialZone::Wall, inside);
        mesh.push_triangle_facing([b, c, d], MaterialZone::Ceiling, inside);
        mesh
    }

    #[test]
    fn test_facing_rule_produces_closed_inward_shell() {
        let mesh = tetrahedron();
        assert!(mesh.is_closed_manifold());
        assert!(mesh.is_inward_wound());
        assert!((mesh.signed_volume() + 1.0 / 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_open_mesh_reports_defects() {
        let mut mesh = tetrahedron();
        mesh.triangles.pop();
        mesh.zones.pop();
        mesh.materials.pop();
        assert!(!mesh.is_closed_manifold());
        assert_eq!(mesh.manifold_defects(), 3);
    }

    #[test]
    fn test_zone_area_and_count() {
        let mesh = tetrahedron();
        assert_eq!(mesh.zone_count(MaterialZone::Wall), 2);
        assert!((mesh.zone_area(MaterialZone::Floor) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normals_point_inward() {
        let mut mesh = tetrahedron();
        mesh.recompute_normals();
        // The origin corner is surrounded by three inward faces
        let n = mesh.normals[0];
        assert!(n.x > 0.0 && n.y > 0.0 && n.z > 0.0);
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sort_by_material_is_stable() {
        let mut mesh = tetrahedron();
        mesh.materials = vec![MaterialId(1), MaterialId(0), MaterialId(1), MaterialId(0)];
        let original = mesh.triangles.clone();
        mesh.sort_by_material();

        assert_eq!(mesh.triangles, vec![original[1], original[3], original[0], original[2]]);
        assert_eq!(mesh.batches(), vec![(MaterialId(0), 0, 2), (MaterialId(1), 2, 2)]);
        assert!(mesh.is_closed_manifold());
    }

    #[test]
    fn test_planar_uvs() {
        let mut mesh = tetrahedron();
        mesh.apply_planar_uvs(2.0);
        assert_eq!(mesh.uvs[1], Vec2::new(0.5, 0.0));
        assert_eq!(mesh.uvs[3], Vec2::new(0.0, 0.5));
        assert!(mesh.is_consistent());
    }
}
