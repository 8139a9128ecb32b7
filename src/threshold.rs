use crate::volume::Volume;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("Lower threshold {lower} is above upper threshold {upper}")]
    InvalidRange { lower: i16, upper: i16 },
}

/// Maps voxels inside `[lower, upper]` to `inside` and all others to
/// `outside`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryThreshold {
    pub lower: i16,
    pub upper: i16,
    pub inside: i16,
    pub outside: i16,
}

impl Default for BinaryThreshold {
    fn default() -> Self {
        Self {
            lower: 0,
            upper: i16::MAX,
            inside: 255,
            outside: 0,
        }
    }
}

impl BinaryThreshold {
    pub fn new(lower: i16, upper: i16) -> Result<Self, ThresholdError> {
        if lower > upper {
            return Err(ThresholdError::InvalidRange { lower, upper });
        }
        Ok(Self {
            lower,
            upper,
            ..Self::default()
        })
    }

    pub fn with_values(mut self, inside: i16, outside: i16) -> Self {
        self.inside = inside;
        self.outside = outside;
        self
    }

    #[inline]
    pub fn classify(&self, value: i16) -> i16 {
        if (self.lower..=self.upper).contains(&value) {
            self.inside
        } else {
            self.outside
        }
    }

    /// A new volume with the same geometry and every voxel classified.
    pub fn apply(&self, volume: &Volume) -> Result<Volume, ThresholdError> {
        if self.lower > self.upper {
            return Err(ThresholdError::InvalidRange {
                lower: self.lower,
                upper: self.upper,
            });
        }
        let mut output = volume.with_data(volume.data().clone());
        output.data_mut().par_mapv_inplace(|v| self.classify(v));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn classifies_inclusive_range() {
        let threshold = BinaryThreshold::new(-10, 10).unwrap();
        assert_eq!(threshold.classify(-11), 0);
        assert_eq!(threshold.classify(-10), 255);
        assert_eq!(threshold.classify(10), 255);
        assert_eq!(threshold.classify(11), 0);
    }

    #[test]
    fn default_keeps_non_negative_values() {
        let threshold = BinaryThreshold::default();
        assert_eq!(threshold.classify(-1), 0);
        assert_eq!(threshold.classify(0), 255);
        assert_eq!(threshold.classify(i16::MAX), 255);
    }

    #[test]
    fn apply_preserves_geometry() {
        let data = Array3::from_shape_vec((1, 2, 2), vec![-1000, 0, 40, 3000]).unwrap();
        let volume = Volume::new(data, (0.5, 0.5, 2.0))
            .with_geometry(glam::Vec3::new(1.0, 2.0, 3.0), glam::Mat3::IDENTITY);
        let output = BinaryThreshold::new(0, 100)
            .unwrap()
            .with_values(1, -1)
            .apply(&volume)
            .unwrap();

        assert_eq!(output.data.as_slice().unwrap(), &[-1, 1, 1, -1]);
        assert_eq!(output.spacing, volume.spacing);
        assert_eq!(output.origin, volume.origin);
    }

    #[test]
    fn rejects_inverted_range() {
        assert_eq!(
            BinaryThreshold::new(5, 4),
            Err(ThresholdError::InvalidRange { lower: 5, upper: 4 })
        );
        let inverted = BinaryThreshold {
            lower: 5,
            upper: 4,
            ..BinaryThreshold::default()
        };
        assert!(inverted.apply(&Volume::default()).is_err());
    }
}
