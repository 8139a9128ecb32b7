use crate::bounds::Bounds;

use glam::{Mat3, Vec3};
use ndarray::Array3;

/// A signed 16-bit scalar volume with its patient-space geometry.
#[derive(Clone, Debug)]
pub struct Volume {
    /// Voxels indexed as (slice, row, column).
    pub data: Array3<i16>,
    /// Spacing between columns, rows and slices in millimetres.
    pub spacing: (f32, f32, f32),
    /// World position of voxel (0, 0, 0).
    pub origin: Vec3,
    /// Column vectors: row direction, column direction, slice normal.
    pub direction: Mat3,
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Array3::zeros((0, 0, 0)), (1.0, 1.0, 1.0))
    }
}

impl Volume {
    pub fn new(data: Array3<i16>, spacing: (f32, f32, f32)) -> Self {
        Self {
            data,
            spacing,
            origin: Vec3::ZERO,
            direction: Mat3::IDENTITY,
        }
    }

    pub fn with_geometry(mut self, origin: Vec3, direction: Mat3) -> Self {
        self.origin = origin;
        self.direction = direction;
        self
    }

    /// A volume sharing this volume's geometry but holding other voxels.
    pub fn with_data(&self, data: Array3<i16>) -> Self {
        Self {
            data,
            spacing: self.spacing,
            origin: self.origin,
            direction: self.direction,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<i16> {
        &mut self.data
    }

    /// Linear part of the index (column, row, slice) to world mapping.
    pub fn index_to_world_matrix(&self) -> Mat3 {
        let (sx, sy, sz) = self.spacing;
        self.direction * Mat3::from_diagonal(Vec3::new(sx, sy, sz))
    }

    /// World position of a (possibly fractional) voxel index.
    pub fn index_to_world(&self, column: f32, row: f32, slice: f32) -> Vec3 {
        self.origin + self.index_to_world_matrix() * Vec3::new(column, row, slice)
    }

    /// World bounds of the voxel centres, `None` for an empty volume.
    pub fn bounds(&self) -> Option<Bounds> {
        let (depth, height, width) = self.dim();
        if depth == 0 || height == 0 || width == 0 {
            return None;
        }
        let last = Vec3::new(
            (width - 1) as f32,
            (height - 1) as f32,
            (depth - 1) as f32,
        );
        let corners = Bounds::new(Vec3::ZERO, last).corners();
        Bounds::from_points(
            corners
                .iter()
                .map(|c| self.index_to_world(c.x, c.y, c.z)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_to_world_applies_spacing_and_origin() {
        let volume = Volume::new(Array3::zeros((3, 4, 5)), (0.5, 0.25, 2.0))
            .with_geometry(Vec3::new(10.0, 20.0, -30.0), Mat3::IDENTITY);
        let p = volume.index_to_world(2.0, 4.0, 1.0);
        assert_eq!(p, Vec3::new(11.0, 21.0, -28.0));
    }

    #[test]
    fn bounds_follow_direction() {
        // Slices stacked along -Z.
        let direction = Mat3::from_cols(Vec3::X, Vec3::Y, -Vec3::Z);
        let volume =
            Volume::new(Array3::zeros((3, 2, 2)), (1.0, 1.0, 2.0)).with_geometry(Vec3::ZERO, direction);
        let bounds = volume.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -4.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn empty_volume_has_no_bounds() {
        assert!(Volume::default().bounds().is_none());
    }
}
