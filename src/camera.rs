use crate::{bounds::Bounds, widget::Ray};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Perspective camera looking at a focal point.
///
/// Operations follow the usual turntable conventions: azimuth rotates about
/// the view-up vector through the focal point, elevation about the right
/// vector, and zoom narrows the view angle.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub focal_point: Vec3,
    pub view_up: Vec3,
    /// Vertical field of view in degrees.
    pub view_angle: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::Z,
            focal_point: Vec3::ZERO,
            view_up: Vec3::Y,
            view_angle: 30.0,
            aspect: 1.0,
            near: 0.01,
            far: 1000.01,
        }
    }
}

impl Camera {
    pub fn distance(&self) -> f32 {
        self.position.distance(self.focal_point)
    }

    /// Unit vector from the position to the focal point.
    pub fn direction_of_projection(&self) -> Vec3 {
        (self.focal_point - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        self.direction_of_projection()
            .cross(self.view_up)
            .normalize_or(Vec3::X)
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn azimuth(&mut self, degrees: f32) {
        let rotation = Quat::from_axis_angle(self.view_up.normalize_or(Vec3::Y), degrees.to_radians());
        self.position = self.focal_point + rotation * (self.position - self.focal_point);
    }

    /// Rotates about the right vector and re-orthogonalises the view-up.
    pub fn elevation(&mut self, degrees: f32) {
        let rotation = Quat::from_axis_angle(-self.right(), degrees.to_radians());
        self.position = self.focal_point + rotation * (self.position - self.focal_point);
        self.orthogonalize_view_up();
    }

    pub fn orthogonalize_view_up(&mut self) {
        self.view_up = self
            .right()
            .cross(self.direction_of_projection())
            .normalize_or(Vec3::Y);
    }

    /// Narrows (factor > 1) or widens the view angle.
    pub fn zoom(&mut self, factor: f32) {
        if factor > 0.0 {
            self.view_angle = (self.view_angle / factor).clamp(0.01, 179.0);
        }
    }

    /// Moves the position towards (factor > 1) or away from the focal point.
    pub fn dolly(&mut self, factor: f32) {
        if factor <= 0.0 {
            return;
        }
        let distance = self.distance() / factor;
        self.position = self.focal_point - self.direction_of_projection() * distance;
    }

    /// Translates position and focal point together, in world units.
    pub fn pan(&mut self, offset: Vec3) {
        self.position += offset;
        self.focal_point += offset;
    }

    /// Centres the focal point on `bounds` and backs off along the current
    /// direction until the bounding sphere fits the view angle.
    pub fn reset_camera(&mut self, bounds: &Bounds) {
        let center = bounds.center();
        let mut radius = bounds.diagonal() * 0.5;
        if radius <= f32::EPSILON {
            radius = 1.0;
        }
        let distance = radius / (self.view_angle.to_radians() * 0.5).sin();
        let direction = self.direction_of_projection();
        if self.view_up.cross(direction).length_squared() < 1e-6 {
            self.view_up = direction.any_orthonormal_vector();
        }
        self.focal_point = center;
        self.position = center - direction * distance;
        self.orthogonalize_view_up();
        self.reset_clipping_range(bounds);
    }

    /// Fits near and far around `bounds` along the view direction.
    pub fn reset_clipping_range(&mut self, bounds: &Bounds) {
        let direction = self.direction_of_projection();
        let (min, max) = bounds
            .corners()
            .iter()
            .map(|&c| (c - self.position).dot(direction))
            .fold((f32::MAX, f32::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let far = (max * 1.01).max(1e-3);
        self.far = far;
        self.near = (min * 0.99).max(far * 1e-3);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.focal_point, self.view_up)
    }

    /// Projection with depth in [0, 1].
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.view_angle.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// World ray through a cursor position given in physical pixels, origin
    /// top-left.
    pub fn ray(&self, cursor: Vec2, viewport: Vec2) -> Option<Ray> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }
        let ndc_x = cursor.x / viewport.x * 2.0 - 1.0;
        let ndc_y = 1.0 - cursor.y / viewport.y * 2.0;
        let inv_view_proj = self.view_proj().inverse();

        let near = inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        if near.w.abs() < 1e-6 || far.w.abs() < 1e-6 {
            return None;
        }
        let origin = near.truncate() / near.w;
        Ray::new(origin, far.truncate() / far.w - origin)
    }
}

/// Mouse driven camera motion: left drag orbits, right or middle drag pans,
/// the wheel dollies.
#[derive(Debug, Default)]
pub struct CameraController {
    orbiting: bool,
    panning: bool,
    last_mouse: Option<Vec2>,
}

impl CameraController {
    /// Degrees of rotation for a drag across the full viewport.
    const ORBIT_DEGREES: f32 = 200.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.orbiting || self.panning
    }

    /// Handles window events and updates the camera. Returns `true` when the
    /// camera moved.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera, viewport: Vec2) -> bool {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                let pressed = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.orbiting = pressed,
                    MouseButton::Right | MouseButton::Middle => self.panning = pressed,
                    _ => {}
                }
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let xy = Vec2::new(position.x as f32, position.y as f32);
                self.handle_cursor(xy, camera, viewport)
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                // Scroll up moves closer.
                camera.dolly(1.1_f32.powf(scroll));
                true
            }
            _ => false,
        }
    }

    fn handle_cursor(&mut self, xy: Vec2, camera: &mut Camera, viewport: Vec2) -> bool {
        let last = self.last_mouse.replace(xy);
        let Some(last) = last else {
            return false;
        };
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return false;
        }
        let delta = xy - last;
        if self.orbiting {
            camera.azimuth(-delta.x / viewport.x * Self::ORBIT_DEGREES);
            camera.elevation(delta.y / viewport.y * Self::ORBIT_DEGREES);
            true
        } else if self.panning {
            // World units per pixel at the focal depth.
            let scale = 2.0 * camera.distance() * (camera.view_angle.to_radians() * 0.5).tan() / viewport.y;
            let offset = (-camera.right() * delta.x + camera.view_up * delta.y) * scale;
            camera.pan(offset);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Bounds {
        Bounds::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn reset_fits_bounding_sphere() {
        let mut camera = Camera::default();
        camera.reset_camera(&cube());

        let expected = 3.0_f32.sqrt() / 15.0_f32.to_radians().sin();
        assert_eq!(camera.focal_point, Vec3::ZERO);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, expected), 1e-4));
        // Nearest and farthest corners sit one unit off the focal plane.
        assert!(camera.near > 0.0 && camera.near < expected - 1.0);
        assert!(camera.far > expected + 1.0);
    }

    #[test]
    fn azimuth_rotates_about_view_up() {
        let mut camera = Camera::default();
        camera.azimuth(90.0);
        assert!(camera.position.abs_diff_eq(Vec3::X, 1e-6));
        assert_eq!(camera.view_up, Vec3::Y);
    }

    #[test]
    fn elevation_keeps_view_up_orthogonal() {
        let mut camera = Camera::default();
        camera.elevation(30.0);
        let expected = Vec3::new(0.0, 30.0_f32.to_radians().sin(), 30.0_f32.to_radians().cos());
        assert!(camera.position.abs_diff_eq(expected, 1e-6));
        assert!(camera.view_up.dot(camera.direction_of_projection()).abs() < 1e-6);
        assert!(camera.view_up.y > 0.0);
    }

    #[test]
    fn zoom_and_dolly() {
        let mut camera = Camera::default();
        camera.zoom(2.0);
        assert_eq!(camera.view_angle, 15.0);
        camera.zoom(0.75);
        assert!((camera.view_angle - 20.0).abs() < 1e-5);

        camera.position = Vec3::new(0.0, 0.0, 10.0);
        camera.dolly(2.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-6));
    }

    #[test]
    fn centre_ray_follows_view_direction() {
        let mut camera = Camera::default();
        camera.reset_camera(&cube());
        camera.azimuth(-60.0);
        camera.elevation(30.0);

        let ray = camera.ray(Vec2::new(640.0, 360.0), Vec2::new(1280.0, 720.0)).unwrap();
        assert!(ray.direction.abs_diff_eq(camera.direction_of_projection(), 1e-4));
        assert!(ray.distance_to_point(camera.focal_point) < 1e-3);
        assert!(camera.ray(Vec2::ZERO, Vec2::ZERO).is_none());
    }

    #[test]
    fn controller_orbits_only_while_dragging() {
        let mut controller = CameraController::new();
        let mut camera = Camera::default();
        let viewport = Vec2::new(800.0, 600.0);

        assert!(!controller.handle_cursor(Vec2::new(10.0, 10.0), &mut camera, viewport));
        assert!(!controller.handle_cursor(Vec2::new(50.0, 10.0), &mut camera, viewport));
        assert_eq!(camera.position, Vec3::Z);

        controller.orbiting = true;
        assert!(controller.is_active());
        assert!(controller.handle_cursor(Vec2::new(90.0, 10.0), &mut camera, viewport));
        assert!(camera.position.x < 0.0);
        assert!((camera.distance() - 1.0).abs() < 1e-5);
    }
}
