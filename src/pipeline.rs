//! The processing chain from a volume to the clipped surface.
//!
//! Thresholding and contouring run once. Clipping re-runs lazily whenever the
//! plane or the kept side changed since the last [`Pipeline::update`].

use crate::{
    bounds::Bounds,
    clip::PlaneClipper,
    config::ViewerConfig,
    enums::ClipSide,
    plane::ImplicitPlane,
    surface::SurfaceMesh,
    threshold::ThresholdError,
    volume::Volume,
    volume_loader::{VolumeLoader, VolumeLoaderError},
};

use log::{debug, info, warn};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] VolumeLoaderError),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}

pub struct Pipeline {
    surface: SurfaceMesh,
    volume_bounds: Option<Bounds>,
    clipper: PlaneClipper,
    plane: ImplicitPlane,
    output: SurfaceMesh,
    dirty: bool,
}

impl Pipeline {
    /// Reads the configured series and runs it through the pipeline.
    pub fn load(config: &ViewerConfig) -> Result<Self, PipelineError> {
        let volume = VolumeLoader::load_from_directory(
            &config.dicom_directory,
            config.series_name.as_deref(),
        )?;
        Self::from_volume(&volume, config)
    }

    pub fn from_volume(volume: &Volume, config: &ViewerConfig) -> Result<Self, PipelineError> {
        let (depth, height, width) = volume.dim();
        info!(
            "Volume {}x{}x{}, spacing {:?}",
            width, height, depth, volume.spacing
        );

        let start = Instant::now();
        let thresholded = config.threshold()?.apply(volume)?;
        debug!("Threshold took {:?}", start.elapsed());

        let start = Instant::now();
        let surface = config.extractor().extract(&thresholded);
        info!(
            "Isosurface: {} vertices, {} triangles ({:?})",
            surface.num_vertices(),
            surface.num_triangles(),
            start.elapsed()
        );
        if surface.is_empty() {
            warn!("The isosurface at {} is empty", config.iso);
        }

        Ok(Self {
            surface,
            volume_bounds: volume.bounds(),
            clipper: PlaneClipper::new(config.clip_side()),
            plane: ImplicitPlane::default(),
            output: SurfaceMesh::default(),
            dirty: true,
        })
    }

    /// The unclipped isosurface.
    pub fn surface(&self) -> &SurfaceMesh {
        &self.surface
    }

    /// Bounds of the isosurface, or of the volume when the surface is empty.
    pub fn bounds(&self) -> Option<Bounds> {
        self.surface.bounds().or(self.volume_bounds)
    }

    pub fn plane(&self) -> &ImplicitPlane {
        &self.plane
    }

    /// Marks the clip output stale.
    pub fn plane_mut(&mut self) -> &mut ImplicitPlane {
        self.dirty = true;
        &mut self.plane
    }

    pub fn side(&self) -> ClipSide {
        self.clipper.side
    }

    pub fn set_side(&mut self, side: ClipSide) {
        if self.clipper.side != side {
            self.clipper.side = side;
            self.dirty = true;
        }
    }

    /// Re-runs the clip if needed. Returns `true` when the output changed.
    pub fn update(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let start = Instant::now();
        self.output = self.clipper.clip(&self.surface, &self.plane);
        self.dirty = false;
        debug!(
            "Clipped to {} triangles in {:?}",
            self.output.num_triangles(),
            start.elapsed()
        );
        true
    }

    /// The clipped surface as of the last [`update`](Self::update).
    pub fn output(&self) -> &SurfaceMesh {
        &self.output
    }
}
