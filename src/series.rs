//! Directory scanning and grouping of DICOM files into series.

use crate::{enums::SortBy, volume_loader::VolumeLoaderError};

use dicom::core::Tag;
use dicom::object::{InMemDicomObject, OpenFileOptions};
use dicom_dictionary_std::tags;
use glam::Vec3;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

/// Attributes that split files sharing a Series Instance UID into separate
/// series. Series Date comes last as an extra restriction.
const SERIES_DETAIL_TAGS: [Tag; 6] = [
    tags::SERIES_NUMBER,
    tags::SEQUENCE_NAME,
    tags::SLICE_THICKNESS,
    tags::ROWS,
    tags::COLUMNS,
    tags::SERIES_DATE,
];

/// Identifies one series: its UID refined by the detail attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesKey {
    pub uid: String,
    pub details: Vec<String>,
}

impl SeriesKey {
    fn read(obj: &InMemDicomObject) -> Option<Self> {
        let uid = read_string(obj, tags::SERIES_INSTANCE_UID)?;
        let details = SERIES_DETAIL_TAGS
            .iter()
            .filter_map(|tag| read_string(obj, *tag))
            .collect();
        Some(Self { uid, details })
    }

    /// UID and details joined with `.`, keeping only ASCII letters, digits
    /// and dots.
    pub fn identifier(&self) -> String {
        let mut id = self.uid.clone();
        for detail in &self.details {
            id.push('.');
            id.push_str(detail);
        }
        id.retain(|c| c.is_ascii_alphanumeric() || c == '.');
        id
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Position and orientation attributes used to order slices.
#[derive(Clone, Debug, Default)]
pub(crate) struct SliceGeometry {
    pub position: Option<Vec3>,
    pub orientation: Option<(Vec3, Vec3)>,
    pub instance_number: Option<i32>,
}

impl SliceGeometry {
    pub(crate) fn read(obj: &InMemDicomObject) -> Self {
        Self {
            position: read_vec3(obj, tags::IMAGE_POSITION_PATIENT),
            orientation: read_orientation(obj),
            instance_number: obj
                .element(tags::INSTANCE_NUMBER)
                .ok()
                .and_then(|e| e.to_int::<i32>().ok()),
        }
    }

    /// Slice normal, the cross product of the row and column directions.
    pub(crate) fn normal(&self) -> Option<Vec3> {
        self.orientation
            .map(|(row, column)| row.cross(column))
            .filter(|n| n.length_squared() > f32::EPSILON)
            .map(Vec3::normalize)
    }
}

/// One file of a series.
#[derive(Clone, Debug)]
pub struct SeriesFile {
    pub path: PathBuf,
    pub(crate) geometry: SliceGeometry,
}

/// The files of one series, in slice order.
#[derive(Clone, Debug)]
pub struct DicomSeries {
    key: SeriesKey,
    files: Vec<SeriesFile>,
}

impl DicomSeries {
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }
}

/// All series found in a directory, ordered by identifier.
#[derive(Debug)]
pub struct SeriesCatalog {
    directory: PathBuf,
    series: Vec<DicomSeries>,
}

impl SeriesCatalog {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn series(&self) -> &[DicomSeries] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.series.iter().map(|s| s.key.identifier()).collect()
    }

    pub fn log_summary(&self) {
        if self.series.is_empty() {
            warn!("No DICOMs in: {}", self.directory.display());
            return;
        }
        info!("The directory: {}", self.directory.display());
        info!("Contains the following DICOM Series:");
        for series in &self.series {
            info!("{} ({} files)", series.key, series.len());
        }
    }

    /// The series named `name` (full identifier or bare UID), or the first
    /// series when no name is given.
    pub fn select(&self, name: Option<&str>) -> Result<&DicomSeries, VolumeLoaderError> {
        match name {
            None => self
                .series
                .first()
                .ok_or_else(|| VolumeLoaderError::NoSeries(self.directory.clone())),
            Some(name) => self
                .series
                .iter()
                .find(|s| s.key.identifier() == name)
                .or_else(|| self.series.iter().find(|s| s.key.uid == name))
                .ok_or_else(|| VolumeLoaderError::SeriesNotFound(name.to_string())),
        }
    }
}

pub struct SeriesScanner {
    sort_by: SortBy,
}

impl Default for SeriesScanner {
    fn default() -> Self {
        Self::new(SortBy::default())
    }
}

impl SeriesScanner {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }

    /// Group the DICOM files directly inside `directory` by series.
    ///
    /// Files that cannot be parsed as DICOM are skipped. Subdirectories are
    /// not visited.
    pub fn scan(&self, directory: impl AsRef<Path>) -> Result<SeriesCatalog, VolumeLoaderError> {
        let directory = directory.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(directory)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let headers: Vec<(SeriesKey, SeriesFile)> = paths
            .par_iter()
            .filter_map(|path| Self::read_header(path))
            .collect();

        Ok(SeriesCatalog {
            directory: directory.to_path_buf(),
            series: self.group(headers),
        })
    }

    /// Files with the same identifier form one series. Series come out in
    /// ascending identifier order.
    fn group(&self, headers: Vec<(SeriesKey, SeriesFile)>) -> Vec<DicomSeries> {
        let mut grouped: BTreeMap<String, (SeriesKey, Vec<SeriesFile>)> = BTreeMap::new();
        for (key, file) in headers {
            grouped
                .entry(key.identifier())
                .or_insert_with(|| (key, Vec::new()))
                .1
                .push(file);
        }

        grouped
            .into_values()
            .map(|(key, mut files)| {
                sort_slices(&mut files, self.sort_by, |f| &f.geometry);
                DicomSeries { key, files }
            })
            .collect()
    }

    fn read_header(path: &Path) -> Option<(SeriesKey, SeriesFile)> {
        let obj = match OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
        {
            Ok(obj) => obj,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };
        let key = SeriesKey::read(&obj)?;
        let file = SeriesFile {
            path: path.to_path_buf(),
            geometry: SliceGeometry::read(&obj),
        };
        Some((key, file))
    }
}

/// Stable sort of slices. Slices lacking the sort attribute go last.
pub(crate) fn sort_slices<T>(items: &mut [T], sort_by: SortBy, geometry: impl Fn(&T) -> &SliceGeometry) {
    let normal = items
        .iter()
        .find_map(|item| geometry(item).normal())
        .unwrap_or(Vec3::Z);

    let key = |item: &T| -> Option<f32> {
        let g = geometry(item);
        match sort_by {
            SortBy::ImagePositionPatient => g.position.map(|p| p.dot(normal)),
            SortBy::InstanceNumber => g.instance_number.map(|n| n as f32),
            SortBy::None => Some(0.0),
        }
    };

    if matches!(sort_by, SortBy::None) {
        return;
    }

    items.sort_by(|a, b| match (key(a), key(b)) {
        (Some(ka), Some(kb)) => ka
            .partial_cmp(&kb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| geometry(a).instance_number.cmp(&geometry(b).instance_number)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

pub(crate) fn read_string(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    let value = obj.element(tag).ok()?.to_str().ok()?;
    let value = value.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!value.is_empty()).then(|| value.to_string())
}

fn read_vec3(obj: &InMemDicomObject, tag: Tag) -> Option<Vec3> {
    let values = obj.element(tag).ok()?.to_multi_float32().ok()?;
    (values.len() >= 3).then(|| Vec3::new(values[0], values[1], values[2]))
}

fn read_orientation(obj: &InMemDicomObject) -> Option<(Vec3, Vec3)> {
    let values = obj
        .element(tags::IMAGE_ORIENTATION_PATIENT)
        .ok()?
        .to_multi_float32()
        .ok()?;
    if values.len() < 6 {
        return None;
    }
    let row = Vec3::new(values[0], values[1], values[2]);
    let column = Vec3::new(values[3], values[4], values[5]);
    Some((row, column))
}
