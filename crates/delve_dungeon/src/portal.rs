//! Portals: the openings where two rooms meet, and the coarse visibility
//! walk over them.

use std::collections::VecDeque;

use crate::layout::PortalCandidate;
use delve_shared::{Plane, Vec3};

/// Opening between two adjoining rooms.
#[derive(Clone, Debug, PartialEq)]
pub struct Portal {
    /// Room indices. The plane normal points from `rooms[0]` into `rooms[1]`.
    pub rooms: [usize; 2],
    /// Boundary polygon, wound counter-clockwise around the normal.
    pub vertices: Vec<Vec3>,
    /// Plane of the polygon, facing out of `rooms[0]`.
    pub plane: Plane,
}

impl Portal {
    /// Builds the rectangular opening described by a candidate.
    #[must_use]
    pub fn from_candidate(candidate: &PortalCandidate) -> Self {
        let normal = candidate.direction;
        let side = Vec3::Z.cross(normal) * (candidate.width * 0.5);
        let up = Vec3::Z * candidate.height;
        let base = candidate.anchor;
        Self {
            rooms: candidate.rooms,
            vertices: vec![base - side, base + side, base + side + up, base - side + up],
            plane: Plane::from_point_normal(base, normal),
        }
    }

    /// The room on the other side from `room`, if this portal touches it.
    #[must_use]
    pub fn other(&self, room: usize) -> Option<usize> {
        match self.rooms {
            [a, b] if a == room => Some(b),
            [a, b] if b == room => Some(a),
            _ => None,
        }
    }

    /// True when an eye in `room` at `eye` can look through this portal,
    /// i.e. the eye is not past the portal plane.
    #[must_use]
    pub fn visible_from(&self, room: usize, eye: Vec3) -> bool {
        let distance = self.plane.signed_distance(eye);
        if self.rooms[0] == room {
            distance <= 0.0
        } else {
            distance >= 0.0
        }
    }

    /// Area-weighted polygon normal (Newell's method).
    #[must_use]
    pub fn polygon_normal(&self) -> Vec3 {
        let n = self.vertices.len();
        let mut normal = Vec3::ZERO;
        for (i, &p) in self.vertices.iter().enumerate() {
            let q = self.vertices[(i + 1) % n];
            normal += Vec3::new(
                (p.y - q.y) * (p.z + q.z),
                (p.z - q.z) * (p.x + q.x),
                (p.x - q.x) * (p.y + q.y),
            );
        }
        normal.normalize_or_zero()
    }
}

/// Rooms potentially visible from `eye` standing in `start`, in discovery
/// order with `start` first.
///
/// Breadth-first over portals; a portal is crossed only when the eye is on
/// the near side of it for the direction of travel.
#[must_use]
pub fn potentially_visible(portals: &[Portal], room_count: usize, start: usize, eye: Vec3) -> Vec<usize> {
    if start >= room_count {
        return Vec::new();
    }
    let mut visited = vec![false; room_count];
    let mut order = vec![start];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(room) = queue.pop_front() {
        for portal in portals {
            let Some(next) = portal.other(room) else {
                continue;
            };
            if next >= room_count || visited[next] || !portal.visible_from(room, eye) {
                continue;
            }
            visited[next] = true;
            order.push(next);
            queue.push_back(next);
        }
    }
    order
}
