use crate::surface::SurfaceMesh;

use glam::Vec3;
use std::{fs::File, io::BufWriter, path::Path};

/// Writes `mesh` as a binary STL file with per-face normals from the
/// triangle winding.
pub fn write_stl(path: &Path, mesh: &SurfaceMesh) -> std::io::Result<()> {
    let triangles = mesh.indices.chunks_exact(3).map(|t| {
        let [a, b, c] = [t[0], t[1], t[2]].map(|i| mesh.positions[i as usize]);
        let normal = (b - a).cross(c - a).try_normalize().unwrap_or(Vec3::Z);
        stl_io::Triangle {
            normal: stl_io::Normal::new(normal.to_array()),
            vertices: [a, b, c].map(|v| stl_io::Vertex::new(v.to_array())),
        }
    });

    let mut writer = BufWriter::new(File::create(path)?);
    stl_io::write_stl(&mut writer, triangles)?;
    log::info!(
        "Wrote {} triangles to {}",
        mesh.num_triangles(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn writes_binary_layout() {
        let mesh = SurfaceMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            normals: Vec::new(),
            indices: vec![0, 1, 2, 0, 3, 1],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.stl");
        write_stl(&path, &mesh).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 80 + 4 + 2 * 50);
        assert_eq!(u32::from_le_bytes(bytes[80..84].try_into().unwrap()), 2);
        // First face: normal +Z, then its vertices.
        assert_eq!(f32_at(&bytes, 84 + 8), 1.0);
        assert_eq!(f32_at(&bytes, 84 + 24), 1.0);
        // Second face normal is +Y.
        assert_eq!(f32_at(&bytes, 134 + 4), 1.0);
    }

    #[test]
    fn empty_mesh_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.stl");
        write_stl(&path, &SurfaceMesh::default()).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 84);
    }
}
