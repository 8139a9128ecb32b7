//! Clipping of triangle meshes against an implicit plane.
//!
//! Triangles are clipped independently in parallel. Vertices created on a cut
//! edge are keyed by the edge so that neighbouring triangles share them, which
//! keeps the output watertight where the input was.

use std::collections::HashMap;

use crate::{enums::ClipSide, plane::ImplicitPlane, surface::SurfaceMesh};

use glam::Vec3;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Corner {
    Vertex(u32),
    /// Crossing on the edge between two input vertices, lower index first.
    Edge(u32, u32),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaneClipper {
    pub side: ClipSide,
}

impl PlaneClipper {
    pub fn new(side: ClipSide) -> Self {
        Self { side }
    }

    /// Keeps the part of `mesh` on the configured side of `plane`.
    ///
    /// Triangle orientation is preserved. Normals of cut vertices are
    /// interpolated along the edge. Input vertices that no triangle keeps are
    /// dropped from the output.
    pub fn clip(&self, mesh: &SurfaceMesh, plane: &ImplicitPlane) -> SurfaceMesh {
        if mesh.is_empty() {
            return SurfaceMesh::default();
        }

        let distances: Vec<f32> = mesh
            .positions
            .par_iter()
            .map(|&p| plane.evaluate(p))
            .collect();
        let side = self.side;
        let triangles: Vec<[Corner; 3]> = mesh
            .indices
            .par_chunks_exact(3)
            .flat_map_iter(|t| clip_triangle([t[0], t[1], t[2]], &distances, side).into_iter().flatten())
            .collect();

        let with_normals = mesh.has_normals();
        let mut output = SurfaceMesh {
            indices: Vec::with_capacity(triangles.len() * 3),
            ..SurfaceMesh::default()
        };
        let mut remap: HashMap<Corner, u32> = HashMap::new();
        for &corner in triangles.iter().flatten() {
            let next = output.positions.len() as u32;
            let index = *remap.entry(corner).or_insert_with(|| {
                let (position, normal) = corner_vertex(mesh, &distances, corner);
                output.positions.push(position);
                if with_normals {
                    output.normals.push(normal);
                }
                next
            });
            output.indices.push(index);
        }
        output
    }
}

/// Points on the plane belong to the negative side.
#[inline]
fn keeps(side: ClipSide, distance: f32) -> bool {
    match side {
        ClipSide::Positive => distance > 0.0,
        ClipSide::Negative => distance <= 0.0,
    }
}

/// Sutherland-Hodgman against a single plane. A triangle clips to at most a
/// quad, which is split into two triangles.
fn clip_triangle(triangle: [u32; 3], distances: &[f32], side: ClipSide) -> [Option<[Corner; 3]>; 2] {
    let inside = triangle.map(|i| keeps(side, distances[i as usize]));
    if inside.iter().all(|&k| k) {
        return [Some(triangle.map(Corner::Vertex)), None];
    }
    if !inside.iter().any(|&k| k) {
        return [None, None];
    }

    let mut polygon = [Corner::Vertex(0); 4];
    let mut len = 0;
    let mut push = |corner: Corner| {
        if len < polygon.len() && (len == 0 || polygon[len - 1] != corner) {
            polygon[len] = corner;
            len += 1;
        }
    };
    for k in 0..3 {
        let next = (k + 1) % 3;
        if inside[k] {
            push(Corner::Vertex(triangle[k]));
        }
        if inside[k] != inside[next] {
            push(crossing(triangle[k], triangle[next], distances));
        }
    }
    if len > 1 && polygon[0] == polygon[len - 1] {
        len -= 1;
    }

    let mut output = [None, None];
    if len >= 3 {
        output[0] = non_degenerate([polygon[0], polygon[1], polygon[2]]);
    }
    if len == 4 {
        output[1] = non_degenerate([polygon[0], polygon[2], polygon[3]]);
    }
    output
}

/// A crossing exactly on an input vertex reuses that vertex.
fn crossing(a: u32, b: u32, distances: &[f32]) -> Corner {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if distances[lo as usize] == 0.0 {
        Corner::Vertex(lo)
    } else if distances[hi as usize] == 0.0 {
        Corner::Vertex(hi)
    } else {
        Corner::Edge(lo, hi)
    }
}

fn non_degenerate(t: [Corner; 3]) -> Option<[Corner; 3]> {
    (t[0] != t[1] && t[1] != t[2] && t[0] != t[2]).then_some(t)
}

fn corner_vertex(mesh: &SurfaceMesh, distances: &[f32], corner: Corner) -> (Vec3, Vec3) {
    let normal_at = |i: usize| mesh.normals.get(i).copied().unwrap_or(Vec3::ZERO);
    match corner {
        Corner::Vertex(i) => (mesh.positions[i as usize], normal_at(i as usize)),
        Corner::Edge(a, b) => {
            let (a, b) = (a as usize, b as usize);
            let t = distances[a] / (distances[a] - distances[b]);
            let position = mesh.positions[a].lerp(mesh.positions[b], t);
            let normal = normal_at(a)
                .lerp(normal_at(b), t)
                .try_normalize()
                .unwrap_or_else(|| normal_at(a));
            (position, normal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 square in the z = 0 plane split along its diagonal.
    fn square() -> SurfaceMesh {
        SurfaceMesh {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 2.0, 0.0),
                Vec3::new(0.0, 2.0, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    fn area(mesh: &SurfaceMesh) -> f32 {
        mesh.triangles()
            .map(|[a, b, c]| {
                let (a, b, c) = (
                    mesh.positions[a as usize],
                    mesh.positions[b as usize],
                    mesh.positions[c as usize],
                );
                (b - a).cross(c - a).length() * 0.5
            })
            .sum()
    }

    fn face_normals(mesh: &SurfaceMesh) -> Vec<Vec3> {
        mesh.triangles()
            .map(|[a, b, c]| {
                let (a, b, c) = (
                    mesh.positions[a as usize],
                    mesh.positions[b as usize],
                    mesh.positions[c as usize],
                );
                (b - a).cross(c - a).normalize()
            })
            .collect()
    }

    #[test]
    fn keeps_positive_half() {
        let plane = ImplicitPlane::new(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        let output = PlaneClipper::default().clip(&square(), &plane);

        assert_eq!(output.num_triangles(), 3);
        // The crossing on the shared diagonal is emitted once.
        assert_eq!(output.num_vertices(), 5);
        assert!((area(&output) - 2.0).abs() < 1e-5);
        assert!(output.positions.iter().all(|p| p.x >= 1.0 - 1e-6));
        assert!(face_normals(&output).iter().all(|n| n.z > 0.99));
        assert!(output.normals.iter().all(|&n| n == Vec3::Z));
    }

    #[test]
    fn keeps_negative_half() {
        let plane = ImplicitPlane::new(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        let output = PlaneClipper::new(ClipSide::Negative).clip(&square(), &plane);

        assert_eq!(output.num_vertices(), 5);
        assert!((area(&output) - 2.0).abs() < 1e-5);
        assert!(output.positions.iter().all(|p| p.x <= 1.0 + 1e-6));
        assert!(face_normals(&output).iter().all(|n| n.z > 0.99));
    }

    #[test]
    fn plane_outside_mesh() {
        let mesh = square();
        let below = ImplicitPlane::new(Vec3::new(0.0, 0.0, -1.0), Vec3::Z);
        let kept = PlaneClipper::default().clip(&mesh, &below);
        assert_eq!(kept.indices, mesh.indices);
        assert_eq!(kept.positions, mesh.positions);

        let removed = PlaneClipper::new(ClipSide::Negative).clip(&mesh, &below);
        assert!(removed.is_empty());
        assert_eq!(removed.num_vertices(), 0);
    }

    #[test]
    fn vertices_on_plane() {
        let mesh = SurfaceMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: Vec::new(),
            indices: vec![0, 1, 2],
        };
        let plane = ImplicitPlane::new(Vec3::ZERO, Vec3::X);

        // Two vertices on the plane, the third on the positive side.
        let kept = PlaneClipper::default().clip(&mesh, &plane);
        assert_eq!(kept.num_triangles(), 1);
        assert!((area(&kept) - 0.5).abs() < 1e-6);
        assert!(!kept.has_normals());

        // Only the edge on the plane is left, which is no triangle.
        assert!(PlaneClipper::new(ClipSide::Negative).clip(&mesh, &plane).is_empty());
    }

    #[test]
    fn triangle_in_plane_belongs_to_negative_side() {
        let mesh = SurfaceMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            indices: vec![0, 1, 2],
        };
        let plane = ImplicitPlane::default();

        assert!(PlaneClipper::default().clip(&mesh, &plane).is_empty());

        let kept = PlaneClipper::new(ClipSide::Negative).clip(&mesh, &plane);
        assert_eq!(kept.indices, mesh.indices);
        assert_eq!(kept.positions, mesh.positions);
    }

    #[test]
    fn crossing_through_vertex_reuses_it() {
        // Vertex 1 lies on the plane, 0 is negative and 2 positive.
        let mesh = SurfaceMesh {
            positions: vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            normals: Vec::new(),
            indices: vec![0, 1, 2],
        };
        let plane = ImplicitPlane::new(Vec3::ZERO, Vec3::X);

        for side in [ClipSide::Positive, ClipSide::Negative] {
            let output = PlaneClipper::new(side).clip(&mesh, &plane);
            assert_eq!(output.num_triangles(), 1);
            assert_eq!(output.num_vertices(), 3);
            assert!((area(&output) - 0.5).abs() < 1e-5);
            assert!(output.positions.contains(&Vec3::new(0.0, 1.0, 0.0)));
            assert!(output.positions.contains(&Vec3::ZERO));
        }
    }

    #[test]
    fn interpolates_normals_on_cut_edges() {
        let mut mesh = square();
        mesh.normals = vec![Vec3::X, Vec3::Z, Vec3::Z, Vec3::X];
        let plane = ImplicitPlane::new(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        let output = PlaneClipper::default().clip(&mesh, &plane);

        for (p, n) in output.positions.iter().zip(&output.normals) {
            assert!((n.length() - 1.0).abs() < 1e-5);
            if (p.x - 1.0).abs() < 1e-6 && p.y == 0.0 {
                let expected = (Vec3::X + Vec3::Z).normalize();
                assert!(n.abs_diff_eq(expected, 1e-5));
            }
        }
    }
}
