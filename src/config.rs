use crate::{
    enums::ClipSide,
    surface::SurfaceExtractor,
    threshold::{BinaryThreshold, ThresholdError},
};

use clap::Parser;
use std::path::PathBuf;

/// Extract an isosurface from a DICOM series and clip it interactively with
/// a plane widget.
///
/// Drag the plane to push it along its normal, the arrow to rotate it and
/// the centre handle to move it. Keys: X/Y/Z snap the normal to an axis,
/// R resets the widget, I flips the kept side, P toggles the widget, W writes
/// the clipped surface to the output file, Q or Escape quits.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about, long_about = None)]
pub struct ViewerConfig {
    /// Directory holding the DICOM files.
    #[arg(default_value = ".")]
    pub dicom_directory: PathBuf,

    /// STL file written when the clipped surface is exported.
    pub output_file: Option<PathBuf>,

    /// Series to read. The first series found is used when absent.
    pub series_name: Option<String>,

    /// Lowest voxel value inside the object.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub lower: i16,

    /// Highest voxel value inside the object.
    #[arg(long, default_value_t = i16::MAX, allow_negative_numbers = true)]
    pub upper: i16,

    /// Value written for voxels inside the threshold range.
    #[arg(long, default_value_t = 255, allow_negative_numbers = true)]
    pub inside: i16,

    /// Value written for all other voxels.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub outside: i16,

    /// Contour value of the extracted surface.
    #[arg(long, default_value_t = 100.0, allow_negative_numbers = true)]
    pub iso: f32,

    /// Enlargement of the widget bounds relative to the surface bounds.
    #[arg(long, default_value_t = 1.25)]
    pub place_factor: f32,

    /// Keep the part of the surface behind the plane.
    #[arg(long)]
    pub inside_out: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            dicom_directory: PathBuf::from("."),
            output_file: None,
            series_name: None,
            lower: 0,
            upper: i16::MAX,
            inside: 255,
            outside: 0,
            iso: 100.0,
            place_factor: 1.25,
            inside_out: false,
        }
    }
}

impl ViewerConfig {
    pub fn threshold(&self) -> Result<BinaryThreshold, ThresholdError> {
        Ok(BinaryThreshold::new(self.lower, self.upper)?.with_values(self.inside, self.outside))
    }

    pub fn extractor(&self) -> SurfaceExtractor {
        SurfaceExtractor::new(self.iso)
    }

    pub fn clip_side(&self) -> ClipSide {
        if self.inside_out {
            ClipSide::Negative
        } else {
            ClipSide::Positive
        }
    }
}
