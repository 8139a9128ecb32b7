/// Slice ordering used when stacking the files of a series into a volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Position along the slice normal (Image Position Patient projected on
    /// the normal derived from Image Orientation Patient).
    #[default]
    ImagePositionPatient,
    InstanceNumber,
    /// Keep the order the files were given in.
    None,
}

/// World axes the widget normal can be snapped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Which side of the implicit plane the clipper keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipSide {
    /// Keep geometry where the plane function is positive.
    #[default]
    Positive,
    /// Keep geometry where the plane function is negative or zero.
    Negative,
}

impl ClipSide {
    pub fn toggled(self) -> Self {
        match self {
            ClipSide::Positive => ClipSide::Negative,
            ClipSide::Negative => ClipSide::Positive,
        }
    }
}
