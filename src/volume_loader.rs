use crate::{
    enums::SortBy,
    series::{DicomSeries, SeriesScanner, SliceGeometry, sort_slices},
    volume::Volume,
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use glam::{Mat3, Vec3};
use log::{debug, info, warn};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No DICOMs in: {}", .0.display())]
    NoSeries(PathBuf),

    #[error("DICOM series not found: {0}")]
    SeriesNotFound(String),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// A decoded slice together with the attributes that place it in the volume.
struct DecodedSlice {
    geometry: SliceGeometry,
    image: Array2<i16>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Scan `path`, list its series and read one of them.
    ///
    /// `series_name` picks a series by identifier or UID; the first series is
    /// read when it is `None`.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        series_name: Option<&str>,
    ) -> Result<Volume, VolumeLoaderError> {
        let catalog = SeriesScanner::default().scan(path)?;
        catalog.log_summary();
        let series = catalog.select(series_name)?;
        Self::load_series(series)
    }

    /// Read an already scanned series. Its files are assumed to be sorted.
    pub fn load_series(series: &DicomSeries) -> Result<Volume, VolumeLoaderError> {
        info!("Reading: {}", series.key());
        let paths: Vec<&Path> = series.files().collect();
        Self::load_from_file_paths(&paths, SortBy::None)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut slices: Vec<DecodedSlice> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| {
                Some(DecodedSlice {
                    geometry: SliceGeometry::read(dicom_object),
                    image: Self::decode_image(dicom_object)?,
                })
            })
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        sort_slices(&mut slices, sort_by, |slice| &slice.geometry);
        Self::validate_dimensions(&slices)?;

        let volume_array = Self::build_volume_array(&slices);
        let (row_direction, column_direction, normal) = Self::get_orientation(&slices);
        let (slice_spacing, slice_sign) = Self::get_slice_spacing(dicom_objects, &slices, normal);
        let (column_spacing, row_spacing) = Self::get_pixel_spacing(dicom_objects);

        let origin = slices[0].geometry.position.unwrap_or(Vec3::ZERO);
        let direction = Mat3::from_cols(row_direction, column_direction, normal * slice_sign);

        let volume = Volume::new(volume_array, (column_spacing, row_spacing, slice_spacing))
            .with_geometry(origin, direction);
        let (depth, height, width) = volume.dim();
        info!(
            "Volume: {width}x{height}x{depth} voxels, spacing {:.3}x{:.3}x{:.3} mm",
            column_spacing, row_spacing, slice_spacing
        );
        Ok(volume)
    }

    /// First frame, first sample, rescaled to modality units and saturated
    /// into `i16`.
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<i16>> {
        let pixel_data = match dicom_object.decode_pixel_data() {
            Ok(pixel_data) => pixel_data,
            Err(e) => {
                debug!("Skipping image without decodable pixel data: {e}");
                return None;
            }
        };
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::Default)
            .with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]).mapv(saturate_i16))
    }

    fn validate_dimensions(slices: &[DecodedSlice]) -> Result<(), VolumeLoaderError> {
        let first_dim = slices[0].image.dim();
        if slices.iter().any(|slice| slice.image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(slices: &[DecodedSlice]) -> Array3<i16> {
        let (height, width) = slices[0].image.dim();
        let depth = slices.len();
        let mut volume = Array3::<i16>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.image);
        }

        volume
    }

    /// Row direction, column direction and slice normal of the first slice
    /// carrying an orientation; the identity frame otherwise.
    fn get_orientation(slices: &[DecodedSlice]) -> (Vec3, Vec3, Vec3) {
        slices
            .iter()
            .find_map(|slice| {
                let (row, column) = slice.geometry.orientation?;
                let normal = slice.geometry.normal()?;
                Some((row.normalize(), column.normalize(), normal))
            })
            .unwrap_or((Vec3::X, Vec3::Y, Vec3::Z))
    }

    /// Distance between consecutive slices along the normal, and whether the
    /// slices advance along (+1) or against (-1) it.
    fn get_slice_spacing(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        slices: &[DecodedSlice],
        normal: Vec3,
    ) -> (f32, f32) {
        let offsets: Vec<f32> = slices
            .iter()
            .filter_map(|slice| slice.geometry.position.map(|p| p.dot(normal)))
            .collect();

        if offsets.len() >= 2 && offsets.len() == slices.len() {
            let mean = (offsets[offsets.len() - 1] - offsets[0]) / (offsets.len() - 1) as f32;
            if mean.abs() > 1e-4 {
                return (mean.abs(), mean.signum());
            }
        }

        let fallback = dicom_objects.iter().find_map(|dicom_object| {
            [tags::SPACING_BETWEEN_SLICES, tags::SLICE_THICKNESS]
                .iter()
                .find_map(|tag| {
                    dicom_object
                        .element(*tag)
                        .ok()?
                        .to_float32()
                        .ok()
                        .filter(|v| *v > 0.0)
                })
        });
        (fallback.unwrap_or(1.0), 1.0)
    }

    /// (column spacing, row spacing). Pixel Spacing stores the row spacing
    /// first.
    fn get_pixel_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> (f32, f32) {
        let spacing = dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;
            (pixel_spacing.len() >= 2).then(|| (pixel_spacing[1], pixel_spacing[0]))
        });
        spacing.unwrap_or_else(|| {
            warn!("Missing pixel spacing, assuming 1.0 mm");
            (1.0, 1.0)
        })
    }
}

#[inline]
fn saturate_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
