//! # Collision BSP
//!
//! Per-room collision data: a simplified triangle soup and a BSP tree over
//! it.
//!
//! ## Construction
//!
//! 1. Copy the render mesh, dropping zero-area and duplicate triangles
//! 2. At each node, sample up to [`PLANE_SAMPLES`] faces evenly and score
//!    the candidate planes of each sample: the face's own plane, then the
//!    axis-aligned planes through its centroid (node's longest axis first).
//!    Lowest cost wins; ties keep the earlier candidate
//! 3. Partition faces by the best plane; straddling faces are cut in two
//! 4. Stop at the configured leaf size or depth cap
//!
//! A node with no plane that leaves faces on both sides becomes a leaf and is
//! reported as [`Degeneracy::LeafCollapse`].
//!
//! Nodes are stored flat with the root at index 0. Leaves own contiguous
//! ranges of the face-reference table; every collision face is referenced by
//! exactly one leaf.

use std::collections::HashSet;

use crate::config::BuildConfig;
use crate::error::{Degeneracy, Diagnostic};
use crate::mesh::Mesh;
use delve_shared::{Aabb, Plane, Vec3, GEOMETRY_EPSILON};

/// Faces sampled for candidate planes at each node.
pub const PLANE_SAMPLES: usize = 16;

/// Cost of one straddling face relative to one face of imbalance.
const SPLIT_COST: usize = 8;

/// Triangle soup used for collision.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Triangles as vertex index triplets.
    pub triangles: Vec<[u32; 3]>,
}

impl CollisionMesh {
    /// Corner positions of face `index`.
    #[must_use]
    pub fn face(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }
}

/// One node of the flat tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollisionNode {
    /// Interior node. Points with `signed_distance >= 0` go to `front`.
    Split {
        /// Splitting plane.
        plane: Plane,
        /// Index of the front child.
        front: u32,
        /// Index of the back child.
        back: u32,
    },
    /// Leaf owning `face_refs[first..first + count]`.
    Leaf {
        /// First entry in the face-reference table.
        first: u32,
        /// Number of entries.
        count: u32,
    },
}

/// Flat BSP tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BspTree {
    /// Nodes; index 0 is the root.
    pub nodes: Vec<CollisionNode>,
    /// Collision face indices, grouped by leaf.
    pub face_refs: Vec<u32>,
}

impl BspTree {
    /// Index of the leaf containing `point`.
    ///
    /// Returns None for an empty or malformed tree.
    #[must_use]
    pub fn locate(&self, point: Vec3) -> Option<usize> {
        let mut index = 0usize;
        // A well-formed tree reaches a leaf in at most `nodes.len()` steps
        for _ in 0..self.nodes.len() {
            match *self.nodes.get(index)? {
                CollisionNode::Split { plane, front, back } => {
                    let next = if plane.signed_distance(point) >= 0.0 { front } else { back };
                    index = next as usize;
                }
                CollisionNode::Leaf { .. } => return Some(index),
            }
        }
        None
    }

    /// Faces of the leaf containing `point`.
    #[must_use]
    pub fn faces_at(&self, point: Vec3) -> &[u32] {
        match self.locate(point).map(|i| self.nodes[i]) {
            Some(CollisionNode::Leaf { first, count }) => self
                .face_refs
                .get(first as usize..(first + count) as usize)
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, CollisionNode::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, counted in nodes.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(tree: &BspTree, index: usize, budget: usize) -> usize {
            match tree.nodes.get(index) {
                Some(CollisionNode::Split { front, back, .. }) if budget > 0 => {
                    1 + walk(tree, *front as usize, budget - 1)
                        .max(walk(tree, *back as usize, budget - 1))
                }
                Some(_) => 1,
                None => 0,
            }
        }
        walk(self, 0, self.nodes.len())
    }
}

/// Collision data for one room.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionData {
    /// Simplified (and split) collision triangles.
    pub mesh: CollisionMesh,
    /// Tree over `mesh`.
    pub tree: BspTree,
}

/// Builds the collision mesh and BSP tree for a room mesh.
///
/// Recovered degeneracies are appended to `diagnostics`.
pub fn build_collision(
    room: &str,
    mesh: &Mesh,
    config: &BuildConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> CollisionData {
    let simplified = simplify(room, mesh, diagnostics);
    let face_count = simplified.triangles.len() as u32;

    let mut builder = TreeBuilder {
        mesh: simplified,
        tree: BspTree::default(),
        leaf_faces: config.bsp_leaf_faces,
        max_depth: config.bsp_max_depth,
        collapsed_faces: 0,
    };
    builder.build((0..face_count).collect(), 0);

    if builder.collapsed_faces > 0 {
        tracing::warn!(
            "Room {}: {} faces left in leaves with no separating plane",
            room,
            builder.collapsed_faces
        );
        diagnostics.push(Diagnostic::GeometryDegeneracy {
            room: room.to_string(),
            kind: Degeneracy::LeafCollapse,
            count: builder.collapsed_faces,
        });
    }
    tracing::debug!(
        "Room {}: BSP {} nodes, {} leaves, {} faces",
        room,
        builder.tree.nodes.len(),
        builder.tree.leaf_count(),
        builder.mesh.triangles.len()
    );

    CollisionData {
        mesh: builder.mesh,
        tree: builder.tree,
    }
}

/// Copies `mesh` without zero-area or repeated triangles.
fn simplify(room: &str, mesh: &Mesh, diagnostics: &mut Vec<Diagnostic>) -> CollisionMesh {
    let mut out = CollisionMesh {
        positions: mesh.positions.clone(),
        triangles: Vec::with_capacity(mesh.triangles.len()),
    };
    let mut seen = HashSet::with_capacity(mesh.triangles.len());
    let mut zero_area = 0usize;
    let mut duplicates = 0usize;

    for (i, &triangle) in mesh.triangles.iter().enumerate() {
        if mesh.triangle_area(i) <= GEOMETRY_EPSILON {
            zero_area += 1;
            continue;
        }
        let mut key = mesh.triangle_positions(i).map(|p| p.to_array().map(f32::to_bits));
        key.sort_unstable();
        if !seen.insert(key) {
            duplicates += 1;
            continue;
        }
        out.triangles.push(triangle);
    }

    for (kind, count) in [
        (Degeneracy::ZeroAreaFace, zero_area),
        (Degeneracy::DuplicateFace, duplicates),
    ] {
        if count > 0 {
            tracing::warn!("Room {}: dropped {} faces ({:?})", room, count, kind);
            diagnostics.push(Diagnostic::GeometryDegeneracy {
                room: room.to_string(),
                kind,
                count,
            });
        }
    }
    out
}

/// Side of a plane a face lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Front,
    Back,
    Straddle,
}

/// Face counts for one candidate plane.
#[derive(Clone, Copy, Debug, Default)]
struct PlaneScore {
    front: usize,
    back: usize,
    straddle: usize,
}

impl PlaneScore {
    fn is_valid(&self, total: usize) -> bool {
        self.front + self.straddle > 0
            && self.back + self.straddle > 0
            && self.front + self.straddle < total
            && self.back + self.straddle < total
    }

    fn cost(&self) -> usize {
        self.straddle * SPLIT_COST + self.front.abs_diff(self.back)
    }
}

struct TreeBuilder {
    mesh: CollisionMesh,
    tree: BspTree,
    leaf_faces: usize,
    max_depth: u32,
    collapsed_faces: usize,
}

impl TreeBuilder {
    fn build(&mut self, faces: Vec<u32>, depth: u32) -> u32 {
        if faces.len() <= self.leaf_faces || depth >= self.max_depth {
            return self.leaf(&faces);
        }
        let Some(plane) = self.choose_plane(&faces) else {
            self.collapsed_faces += faces.len();
            return self.leaf(&faces);
        };

        let (front_faces, back_faces) = self.partition(&faces, plane);
        let index = self.tree.nodes.len() as u32;
        self.tree.nodes.push(CollisionNode::Leaf { first: 0, count: 0 });
        let front = self.build(front_faces, depth + 1);
        let back = self.build(back_faces, depth + 1);
        self.tree.nodes[index as usize] = CollisionNode::Split { plane, front, back };
        index
    }

    fn leaf(&mut self, faces: &[u32]) -> u32 {
        let index = self.tree.nodes.len() as u32;
        self.tree.nodes.push(CollisionNode::Leaf {
            first: self.tree.face_refs.len() as u32,
            count: faces.len() as u32,
        });
        self.tree.face_refs.extend_from_slice(faces);
        index
    }

    fn choose_plane(&self, faces: &[u32]) -> Option<Plane> {
        let bounds = faces.iter().fold(Aabb::EMPTY, |b, &f| {
            self.mesh.face(f as usize).iter().fold(b, |b, &p| b.including(p))
        });
        let longest = bounds.longest_axis();
        let axes = [longest, (longest + 1) % 3, (longest + 2) % 3];
        let stride = faces.len().div_ceil(PLANE_SAMPLES).max(1);

        let mut best: Option<(usize, Plane)> = None;
        for &face in faces.iter().step_by(stride).take(PLANE_SAMPLES) {
            let [a, b, c] = self.mesh.face(face as usize);
            let centroid = (a + b + c) * (1.0 / 3.0);
            let face_plane = Plane::from_triangle(a, b, c);
            let axis_planes = axes
                .iter()
                .map(|&axis| Some(Plane::axis_aligned(axis, centroid.axis(axis))));
            for plane in std::iter::once(face_plane).chain(axis_planes).flatten() {
                let score = self.score(faces, plane);
                if !score.is_valid(faces.len()) {
                    continue;
                }
                let cost = score.cost();
                if best.map_or(true, |(c, _)| cost < c) {
                    best = Some((cost, plane));
                }
            }
        }
        best.map(|(_, plane)| plane)
    }

    fn score(&self, faces: &[u32], plane: Plane) -> PlaneScore {
        let mut score = PlaneScore::default();
        for &face in faces {
            match self.classify(face, plane) {
                Side::Front => score.front += 1,
                Side::Back => score.back += 1,
                Side::Straddle => score.straddle += 1,
            }
        }
        score
    }

    fn classify(&self, face: u32, plane: Plane) -> Side {
        let corners = self.mesh.face(face as usize);
        let distances = corners.map(|p| plane.signed_distance(p));
        let any_front = distances.iter().any(|&d| d > GEOMETRY_EPSILON);
        let any_back = distances.iter().any(|&d| d < -GEOMETRY_EPSILON);
        match (any_front, any_back) {
            (true, true) => Side::Straddle,
            (true, false) => Side::Front,
            (false, true) => Side::Back,
            (false, false) => {
                // Coplanar: side follows the face's own orientation
                let [a, b, c] = corners;
                if (b - a).cross(c - a).dot(plane.normal) >= 0.0 {
                    Side::Front
                } else {
                    Side::Back
                }
            }
        }
    }

    fn partition(&mut self, faces: &[u32], plane: Plane) -> (Vec<u32>, Vec<u32>) {
        let mut front = Vec::new();
        let mut back = Vec::new();
        for &face in faces {
            match self.classify(face, plane) {
                Side::Front => front.push(face),
                Side::Back => back.push(face),
                Side::Straddle => self.split_face(face, plane, &mut front, &mut back),
            }
        }
        (front, back)
    }

    /// Cuts a straddling face along `plane`. The original triangle is
    /// replaced in place by its first front piece; the other pieces are
    /// appended.
    fn split_face(&mut self, face: u32, plane: Plane, front: &mut Vec<u32>, back: &mut Vec<u32>) {
        let corners = self.mesh.triangles[face as usize];
        let mut front_poly: Vec<u32> = Vec::with_capacity(4);
        let mut back_poly: Vec<u32> = Vec::with_capacity(4);

        for i in 0..3 {
            let current = corners[i];
            let next = corners[(i + 1) % 3];
            let p = self.mesh.positions[current as usize];
            let q = self.mesh.positions[next as usize];
            let dp = plane.signed_distance(p);
            let dq = plane.signed_distance(q);

            if dp >= -GEOMETRY_EPSILON {
                front_poly.push(current);
            }
            if dp <= GEOMETRY_EPSILON {
                back_poly.push(current);
            }
            let crosses = (dp > GEOMETRY_EPSILON && dq < -GEOMETRY_EPSILON)
                || (dp < -GEOMETRY_EPSILON && dq > GEOMETRY_EPSILON);
            if crosses {
                let cut = self.mesh.positions.len() as u32;
                self.mesh.positions.push(p.lerp(q, dp / (dp - dq)));
                front_poly.push(cut);
                back_poly.push(cut);
            }
        }

        let mut reuse = Some(face);
        for (poly, out) in [(front_poly, front), (back_poly, back)] {
            for k in 1..poly.len().saturating_sub(1) {
                let triangle = [poly[0], poly[k], poly[k + 1]];
                let index = match reuse.take() {
                    Some(original) => {
                        self.mesh.triangles[original as usize] = triangle;
                        original
                    }
                    None => {
                        self.mesh.triangles.push(triangle);
                        (self.mesh.triangles.len() - 1) as u32
                    }
                };
                out.push(index);
            }
        }
    }
}
