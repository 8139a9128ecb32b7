use glam::Vec3;

/// Axis-aligned world bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Smallest bounds containing every point, `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the diagonal.
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    /// Bounds scaled about their centre.
    pub fn scaled(&self, factor: f32) -> Self {
        let center = self.center();
        let half = self.size() * 0.5 * factor;
        Self::new(center - half, center + half)
    }

    pub fn contains(&self, p: Vec3, tolerance: f32) -> bool {
        p.cmpge(self.min - Vec3::splat(tolerance)).all()
            && p.cmple(self.max + Vec3::splat(tolerance)).all()
    }

    pub fn clamp(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// The 12 box edges as pairs of corner indices into [`Bounds::corners`].
    pub const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (2, 3),
        (4, 5),
        (6, 7),
        (0, 2),
        (1, 3),
        (4, 6),
        (5, 7),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_covers_all_points() {
        let bounds = Bounds::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 4.0, 3.0));
        assert!(Bounds::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn scaling_keeps_center() {
        let bounds = Bounds::new(Vec3::ZERO, Vec3::new(2.0, 4.0, 8.0));
        let scaled = bounds.scaled(1.25);
        assert_eq!(scaled.center(), bounds.center());
        assert!((scaled.size() - Vec3::new(2.5, 5.0, 10.0)).length() < 1e-6);
    }

    #[test]
    fn clamp_and_contains() {
        let bounds = Bounds::new(Vec3::ZERO, Vec3::ONE);
        assert!(bounds.contains(Vec3::splat(0.5), 0.0));
        assert!(!bounds.contains(Vec3::new(1.5, 0.5, 0.5), 0.0));
        assert!(bounds.contains(Vec3::new(1.05, 0.5, 0.5), 0.1));
        assert_eq!(bounds.clamp(Vec3::new(2.0, -1.0, 0.5)), Vec3::new(1.0, 0.0, 0.5));
    }
}
