use glam::Vec3;

/// Implicit plane function `f(p) = (p - origin) . normal`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImplicitPlane {
    origin: Vec3,
    normal: Vec3,
}

impl Default for ImplicitPlane {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            normal: Vec3::Z,
        }
    }
}

impl ImplicitPlane {
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        let mut plane = Self {
            origin,
            ..Self::default()
        };
        plane.set_normal(normal);
        plane
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Normalises `normal`; a zero vector leaves the plane unchanged.
    pub fn set_normal(&mut self, normal: Vec3) {
        if let Some(n) = normal.try_normalize() {
            self.normal = n;
        }
    }

    /// Signed distance, positive on the side the normal points to.
    #[inline]
    pub fn evaluate(&self, p: Vec3) -> f32 {
        (p - self.origin).dot(self.normal)
    }

    pub fn project(&self, p: Vec3) -> Vec3 {
        p - self.evaluate(p) * self.normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plane_is_xy() {
        let plane = ImplicitPlane::default();
        assert_eq!(plane.origin(), Vec3::ZERO);
        assert_eq!(plane.normal(), Vec3::Z);
        assert_eq!(plane.evaluate(Vec3::new(3.0, 4.0, -2.0)), -2.0);
    }

    #[test]
    fn normal_is_normalised_and_zero_ignored() {
        let mut plane = ImplicitPlane::new(Vec3::ONE, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(plane.normal(), Vec3::Y);
        plane.set_normal(Vec3::ZERO);
        assert_eq!(plane.normal(), Vec3::Y);
    }

    #[test]
    fn project_lands_on_plane() {
        let plane = ImplicitPlane::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 0.0, 1.0));
        let p = plane.project(Vec3::new(10.0, -3.0, 2.0));
        assert!(plane.evaluate(p).abs() < 1e-5);
    }
}
