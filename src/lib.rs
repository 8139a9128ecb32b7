//! # dicom-isoclip
//!
//! Reads a series of DICOM slices into a signed 16-bit volume, segments it
//! with a binary threshold, extracts an isosurface with marching cubes and
//! clips that surface with a plane the user drags around in a window.
//!
//! The stages can be used without the viewer:
//!
//!  - [`series`] scans a directory and groups its files by series
//!  - [`volume_loader`] decodes one series into a [`volume::Volume`]
//!  - [`threshold`] segments the volume
//!  - [`surface`] contours any [`surface::ScalarField`]
//!  - [`clip`] cuts a mesh with an [`plane::ImplicitPlane`]
//!  - [`export`] writes a mesh as binary STL
//!
//! Slices are decoded in parallel using rayon. DICOM files are assumed to
//! hold a single frame each; only the first frame is used otherwise.
//!
//! # Examples
//!
//! ## Extracting and clipping a surface
//!
//! ```no_run
//! # use dicom_isoclip::{
//! #     clip::PlaneClipper, plane::ImplicitPlane, surface::SurfaceExtractor,
//! #     threshold::BinaryThreshold, volume_loader::VolumeLoader,
//! # };
//! # use glam::Vec3;
//! let volume = VolumeLoader::load_from_directory("dicom", None)
//!     .expect("should have loaded the first series");
//! let segmented = BinaryThreshold::new(300, i16::MAX)
//!     .expect("should be a valid range")
//!     .apply(&volume)
//!     .expect("should have thresholded the volume");
//! let surface = SurfaceExtractor::new(100.0).extract(&segmented);
//! let plane = ImplicitPlane::new(Vec3::new(0.0, 0.0, 50.0), Vec3::Z);
//! let clipped = PlaneClipper::default().clip(&surface, &plane);
//! println!("{} of {} triangles kept", clipped.num_triangles(), surface.num_triangles());
//! ```

pub mod app;
pub mod bounds;
pub mod camera;
pub mod clip;
pub mod config;
pub mod enums;
pub mod export;
pub mod pipeline;
pub mod plane;
pub mod renderer;
pub mod series;
pub mod surface;
pub mod threshold;
pub mod volume;
pub mod volume_loader;
pub mod widget;
