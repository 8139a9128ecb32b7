//! Interactive implicit plane widget.
//!
//! [`PlaneRepresentation`] holds the plane geometry and the placed bounds
//! and knows how to pick and move its handles. [`PlaneWidget`] turns mouse
//! rays into state transitions and reports [`WidgetEvent`]s to the caller,
//! which copies the plane out with [`PlaneRepresentation::get_plane`].

use crate::{bounds::Bounds, enums::Axis, plane::ImplicitPlane};

use glam::{Quat, Vec3};

/// Half length of the two-sided normal arrow, as a fraction of the diagonal.
const ARROW_FACTOR: f32 = 0.3;
/// Radius of the origin handle and pick tolerance of the arrow.
const HANDLE_FACTOR: f32 = 0.025;

/// A half-line in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// `None` when `direction` has no length.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        Some(Self {
            origin,
            direction: direction.try_normalize()?,
        })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Point on the line through the ray closest to `p`.
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        self.at((p - self.origin).dot(self.direction))
    }

    pub fn distance_to_point(&self, p: Vec3) -> f32 {
        if (p - self.origin).dot(self.direction) < 0.0 {
            return p.distance(self.origin);
        }
        p.distance(self.closest_point(p))
    }

    /// Shortest distance between the ray and the segment `a..b`.
    pub fn distance_to_segment(&self, a: Vec3, b: Vec3) -> f32 {
        let u = self.direction;
        let v = b - a;
        let w = self.origin - a;
        let (uv, vv, uw, vw) = (u.dot(v), v.dot(v), u.dot(w), v.dot(w));
        let denom = vv - uv * uv;
        if vv <= f32::EPSILON {
            return self.distance_to_point(a);
        }
        // Parameters of the closest points on the ray (s) and segment (t).
        let (s, t) = if denom.abs() <= f32::EPSILON * vv {
            (0.0, (vw / vv).clamp(0.0, 1.0))
        } else {
            let t = ((vw - uv * uw) / denom).clamp(0.0, 1.0);
            ((t * uv - uw).max(0.0), t)
        };
        // Refine the segment parameter for a clamped ray parameter.
        let t = ((self.at(s) - a).dot(v) / vv).clamp(0.0, 1.0);
        self.at(s).distance(a + v * t)
    }

    /// Ray parameter of the hit with a plane, `None` when parallel or behind.
    pub fn intersect_plane(&self, origin: Vec3, normal: Vec3) -> Option<f32> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (origin - self.origin).dot(normal) / denom;
        (t >= 0.0).then_some(t)
    }
}

/// Parts of the widget that can be grabbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    Origin,
    Normal,
    Plane,
}

#[derive(Clone, Debug)]
pub struct PlaneRepresentation {
    place_factor: f32,
    bounds: Bounds,
    origin: Vec3,
    normal: Vec3,
    placed_normal: Vec3,
}

impl Default for PlaneRepresentation {
    fn default() -> Self {
        Self {
            place_factor: 1.25,
            bounds: Bounds::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
            origin: Vec3::ZERO,
            normal: Vec3::Z,
            placed_normal: Vec3::Z,
        }
    }
}

impl PlaneRepresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_factor(&self) -> f32 {
        self.place_factor
    }

    /// Only affects the next [`place_widget`](Self::place_widget).
    pub fn set_place_factor(&mut self, factor: f32) {
        self.place_factor = factor.max(0.01);
    }

    /// Scales `bounds` about their centre by the place factor and moves the
    /// origin to the centre. The current normal is kept.
    pub fn place_widget(&mut self, bounds: Bounds) {
        self.bounds = bounds.scaled(self.place_factor);
        self.origin = self.bounds.center();
        self.placed_normal = self.normal;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// The origin is constrained to the placed bounds.
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = self.bounds.clamp(origin);
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn set_normal(&mut self, normal: Vec3) {
        if let Some(n) = normal.try_normalize() {
            self.normal = n;
        }
    }

    pub fn normal_to_axis(&mut self, axis: Axis) {
        self.normal = match axis {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        };
    }

    /// Back to the state right after the last placement.
    pub fn reset(&mut self) {
        self.origin = self.bounds.center();
        self.normal = self.placed_normal;
    }

    pub fn get_plane(&self, plane: &mut ImplicitPlane) {
        plane.set_origin(self.origin);
        plane.set_normal(self.normal);
    }

    pub fn diagonal(&self) -> f32 {
        self.bounds.diagonal()
    }

    pub fn handle_radius(&self) -> f32 {
        HANDLE_FACTOR * self.diagonal()
    }

    /// End points of the two-sided normal arrow.
    pub fn arrow(&self) -> [Vec3; 2] {
        let half = self.normal * ARROW_FACTOR * self.diagonal();
        [self.origin - half, self.origin + half]
    }

    /// The twelve edges of the placed bounds.
    pub fn outline(&self) -> [[Vec3; 2]; 12] {
        let corners = self.bounds.corners();
        Bounds::EDGES.map(|(a, b)| [corners[a], corners[b]])
    }

    /// Intersection of the plane with the placed bounds as a convex polygon,
    /// counter-clockwise around the normal. Empty when the plane misses the
    /// bounds.
    pub fn polygon(&self) -> Vec<Vec3> {
        let plane = ImplicitPlane::new(self.origin, self.normal);
        let corners = self.bounds.corners();
        let d = corners.map(|c| plane.evaluate(c));
        let eps = (1e-5 * self.diagonal()).powi(2);

        let mut points: Vec<Vec3> = Vec::with_capacity(6);
        for (a, b) in Bounds::EDGES {
            let (da, db) = (d[a], d[b]);
            let straddles = (da <= 0.0 && db >= 0.0) || (da >= 0.0 && db <= 0.0);
            if !straddles || da == db {
                continue;
            }
            let p = corners[a].lerp(corners[b], da / (da - db));
            if !points.iter().any(|q| q.distance_squared(p) <= eps) {
                points.push(p);
            }
        }
        if points.len() < 3 {
            return Vec::new();
        }

        let center = points.iter().sum::<Vec3>() / points.len() as f32;
        let u = self.normal.any_orthonormal_vector();
        let v = self.normal.cross(u);
        let angle = |p: &Vec3| {
            let r = *p - center;
            r.dot(v).atan2(r.dot(u))
        };
        points.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
        points
    }

    /// Handle under `ray`, checked in the order origin, arrow, plane.
    pub fn pick(&self, ray: &Ray) -> Option<Handle> {
        let radius = self.handle_radius();
        if ray.distance_to_point(self.origin) <= radius {
            return Some(Handle::Origin);
        }
        let [a, b] = self.arrow();
        if ray.distance_to_segment(a, b) <= radius {
            return Some(Handle::Normal);
        }
        let t = ray.intersect_plane(self.origin, self.normal)?;
        self.bounds
            .contains(ray.at(t), 1e-4 * self.diagonal())
            .then_some(Handle::Plane)
    }

    /// Moves the plane along its normal by the motion between the rays.
    pub fn push(&mut self, from: &Ray, to: &Ray) {
        let motion = self.motion(from, to);
        self.set_origin(self.origin + self.normal * motion.dot(self.normal));
    }

    /// Moves the origin within the plane.
    pub fn translate_origin(&mut self, from: &Ray, to: &Ray) {
        let motion = self.motion(from, to);
        let plane = ImplicitPlane::new(self.origin, self.normal);
        self.set_origin(plane.project(self.origin + motion));
    }

    /// Trackball rotation of the normal. A motion as long as the diagonal is
    /// a full turn.
    pub fn rotate(&mut self, from: &Ray, to: &Ray) {
        let motion = self.motion(from, to);
        let Some(axis) = (-to.direction).cross(motion).try_normalize() else {
            return;
        };
        let diagonal = self.diagonal();
        if diagonal <= f32::EPSILON {
            return;
        }
        let angle = std::f32::consts::TAU * motion.length() / diagonal;
        self.set_normal(Quat::from_axis_angle(axis, angle) * self.normal);
    }

    /// World motion between two rays, measured at the depth of the origin.
    fn motion(&self, from: &Ray, to: &Ray) -> Vec3 {
        to.closest_point(self.origin) - from.closest_point(self.origin)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WidgetState {
    #[default]
    Start,
    Pushing,
    Rotating,
    Moving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetEvent {
    StartInteraction,
    Interaction,
    EndInteraction,
}

#[derive(Clone, Debug)]
pub struct PlaneWidget {
    representation: PlaneRepresentation,
    enabled: bool,
    state: WidgetState,
    last_ray: Option<Ray>,
}

impl PlaneWidget {
    pub fn new(representation: PlaneRepresentation) -> Self {
        Self {
            representation,
            enabled: false,
            state: WidgetState::Start,
            last_ray: None,
        }
    }

    pub fn representation(&self) -> &PlaneRepresentation {
        &self.representation
    }

    pub fn representation_mut(&mut self) -> &mut PlaneRepresentation {
        &mut self.representation
    }

    pub fn on(&mut self) {
        self.enabled = true;
    }

    /// Disabling also abandons an interaction in progress.
    pub fn off(&mut self) {
        self.enabled = false;
        self.state = WidgetState::Start;
        self.last_ray = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    /// Handle being dragged, if any.
    pub fn active_handle(&self) -> Option<Handle> {
        match self.state {
            WidgetState::Start => None,
            WidgetState::Pushing => Some(Handle::Plane),
            WidgetState::Rotating => Some(Handle::Normal),
            WidgetState::Moving => Some(Handle::Origin),
        }
    }

    /// Button press. `None` means the press is not for the widget.
    pub fn on_press(&mut self, ray: Ray) -> Option<WidgetEvent> {
        if !self.enabled || self.state != WidgetState::Start {
            return None;
        }
        self.state = match self.representation.pick(&ray)? {
            Handle::Origin => WidgetState::Moving,
            Handle::Normal => WidgetState::Rotating,
            Handle::Plane => WidgetState::Pushing,
        };
        self.last_ray = Some(ray);
        Some(WidgetEvent::StartInteraction)
    }

    pub fn on_move(&mut self, ray: Ray) -> Option<WidgetEvent> {
        let last = self.last_ray?;
        let representation = &mut self.representation;
        match self.state {
            WidgetState::Start => return None,
            WidgetState::Pushing => representation.push(&last, &ray),
            WidgetState::Rotating => representation.rotate(&last, &ray),
            WidgetState::Moving => representation.translate_origin(&last, &ray),
        }
        self.last_ray = Some(ray);
        Some(WidgetEvent::Interaction)
    }

    pub fn on_release(&mut self) -> Option<WidgetEvent> {
        if self.state == WidgetState::Start {
            return None;
        }
        self.state = WidgetState::Start;
        self.last_ray = None;
        Some(WidgetEvent::EndInteraction)
    }
}
