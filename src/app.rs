//! Window, interaction and the wiring between the widget and the clipper.

use crate::{
    bounds::Bounds,
    camera::{Camera, CameraController},
    config::ViewerConfig,
    enums::Axis,
    export::write_stl,
    pipeline::Pipeline,
    renderer::{RenderError, Renderer, pipelines::widget::WidgetGeometry},
    widget::{PlaneRepresentation, PlaneWidget, WidgetEvent, WidgetState},
};

use glam::{Vec2, Vec3};
use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const WINDOW_TITLE: &str = "ImplicitPlaneWidget2";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("WGPU out of memory")]
    OutOfMemory,
}

/// What the event loop should do after a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyAction {
    Ignore,
    Redraw,
    Exit,
}

pub struct App {
    config: ViewerConfig,
    pipeline: Pipeline,
    camera: Camera,
    controller: CameraController,
    widget: PlaneWidget,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    cursor: Vec2,
    error: Option<AppError>,
}

impl App {
    /// Places the widget on the surface bounds, copies its plane into the
    /// clipper and frames the camera.
    pub fn new(config: ViewerConfig, mut pipeline: Pipeline) -> Self {
        let bounds = pipeline
            .bounds()
            .unwrap_or_else(|| Bounds::new(Vec3::splat(-0.5), Vec3::splat(0.5)));

        let mut representation = PlaneRepresentation::new();
        representation.set_place_factor(config.place_factor);
        representation.place_widget(bounds);
        representation.get_plane(pipeline.plane_mut());
        let mut widget = PlaneWidget::new(representation);
        widget.on();

        let mut camera = Camera::default();
        camera.azimuth(-60.0);
        camera.elevation(30.0);
        camera.reset_camera(&bounds);
        camera.zoom(0.75);

        Self {
            config,
            pipeline,
            camera,
            controller: CameraController::new(),
            widget,
            window: None,
            renderer: None,
            cursor: Vec2::ZERO,
            error: None,
        }
    }

    /// The error that ended the event loop, if any.
    pub fn into_result(self) -> Result<(), AppError> {
        self.error.map_or(Ok(()), Err)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        error!("{err}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn viewport(&self) -> Vec2 {
        self.renderer
            .as_ref()
            .map(|r| Vec2::new(r.gfx.size.width as f32, r.gfx.size.height as f32))
            .unwrap_or(Vec2::ZERO)
    }

    /// Copies the widget plane into the clipper's implicit plane.
    fn sync_plane(&mut self) {
        self.widget
            .representation()
            .get_plane(self.pipeline.plane_mut());
    }

    fn handle_widget_event(&mut self, event: WidgetEvent) {
        match event {
            WidgetEvent::Interaction => self.sync_plane(),
            WidgetEvent::StartInteraction | WidgetEvent::EndInteraction => {
                debug!("Widget {:?}", event);
            }
        }
        self.request_redraw();
    }

    fn apply_key(&mut self, code: KeyCode) -> KeyAction {
        let axis = match code {
            KeyCode::KeyX => Some(Axis::X),
            KeyCode::KeyY => Some(Axis::Y),
            KeyCode::KeyZ => Some(Axis::Z),
            _ => None,
        };
        if let Some(axis) = axis {
            self.widget.representation_mut().normal_to_axis(axis);
            self.sync_plane();
            return KeyAction::Redraw;
        }

        match code {
            KeyCode::Escape | KeyCode::KeyQ => KeyAction::Exit,
            KeyCode::KeyR => {
                self.widget.representation_mut().reset();
                self.sync_plane();
                KeyAction::Redraw
            }
            KeyCode::KeyI => {
                let side = self.pipeline.side().toggled();
                info!("Keeping the {:?} side of the plane", side);
                self.pipeline.set_side(side);
                KeyAction::Redraw
            }
            KeyCode::KeyP => {
                if self.widget.is_enabled() {
                    self.widget.off();
                } else {
                    self.widget.on();
                }
                KeyAction::Redraw
            }
            KeyCode::KeyW => {
                self.export();
                KeyAction::Ignore
            }
            _ => KeyAction::Ignore,
        }
    }

    fn export(&mut self) {
        let Some(path) = self.config.output_file.clone() else {
            warn!("No output file given, nothing exported");
            return;
        };
        self.pipeline.update();
        if let Err(err) = write_stl(&path, self.pipeline.output()) {
            error!("Failed to write {}: {}", path.display(), err);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if self.pipeline.update() {
            renderer.upload_surface(self.pipeline.output());
        }
        let geometry = self.widget.is_enabled().then(|| {
            WidgetGeometry::build(self.widget.representation(), self.widget.active_handle())
        });
        renderer.upload_widget(geometry);
        self.camera
            .reset_clipping_range(&self.widget.representation().bounds());

        match renderer.render(&self.camera) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.gfx.reconfigure();
                self.request_redraw();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => self.fail(event_loop, AppError::OutOfMemory),
            Err(err) => warn!("Dropped frame: {err}"),
        }
    }

    fn handle_mouse_button(&mut self, event: &WindowEvent, button: MouseButton, state: ElementState) {
        let viewport = self.viewport();
        if button == MouseButton::Left {
            match state {
                // A press during a camera drag stays with the camera.
                ElementState::Pressed if !self.controller.is_active() => {
                    let consumed = self
                        .camera
                        .ray(self.cursor, viewport)
                        .and_then(|ray| self.widget.on_press(ray));
                    if let Some(widget_event) = consumed {
                        self.handle_widget_event(widget_event);
                        return;
                    }
                }
                ElementState::Pressed => {}
                ElementState::Released => {
                    if let Some(widget_event) = self.widget.on_release() {
                        self.handle_widget_event(widget_event);
                    }
                }
            }
        }
        self.controller.handle_event(event, &mut self.camera, viewport);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };

        let mut renderer = match futures::executor::block_on(Renderer::new(window.clone())) {
            Ok(renderer) => renderer,
            Err(err) => return self.fail(event_loop, err.into()),
        };
        renderer.upload_surface(self.pipeline.output());
        self.camera
            .set_aspect(renderer.gfx.size.width, renderer.gfx.size.height);

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(*size);
                }
                self.camera.set_aspect(size.width, size.height);
                self.request_redraw();
            }
            WindowEvent::KeyboardInput { event: key, .. } => {
                if key.state != ElementState::Pressed || key.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = key.physical_key {
                    match self.apply_key(code) {
                        KeyAction::Exit => event_loop.exit(),
                        KeyAction::Redraw => self.request_redraw(),
                        KeyAction::Ignore => {}
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(&event, *button, *state);
                self.request_redraw();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                let viewport = self.viewport();
                if self.widget.state() != WidgetState::Start {
                    let moved = self
                        .camera
                        .ray(self.cursor, viewport)
                        .and_then(|ray| self.widget.on_move(ray));
                    if let Some(widget_event) = moved {
                        self.handle_widget_event(widget_event);
                    }
                }
                // Keeps the controller's last position current during widget drags.
                if self.controller.handle_event(&event, &mut self.camera, viewport) {
                    self.request_redraw();
                }
            }
            WindowEvent::MouseWheel { .. } => {
                let viewport = self.viewport();
                if self.controller.handle_event(&event, &mut self.camera, viewport) {
                    self.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{enums::ClipSide, volume::Volume};
    use ndarray::Array3;

    fn app(config: ViewerConfig) -> App {
        let data = Array3::from_shape_fn((8, 8, 8), |(z, y, x)| {
            if [x, y, z].iter().all(|i| (2..6).contains(i)) { 1000 } else { -1000 }
        });
        let volume = Volume::new(data, (1.0, 1.0, 1.0));
        let pipeline = Pipeline::from_volume(&volume, &config).unwrap();
        App::new(config, pipeline)
    }

    #[test]
    fn starts_with_plane_through_surface_centre() {
        let app = app(ViewerConfig::default());
        let center = app.pipeline.bounds().unwrap().center();

        assert!(app.widget.is_enabled());
        assert!(app.pipeline.plane().origin().abs_diff_eq(center, 1e-5));
        assert_eq!(app.pipeline.plane().normal(), Vec3::Z);
        assert_eq!(app.camera.focal_point, center);
        assert!((app.camera.view_angle - 40.0).abs() < 1e-4);
    }

    #[test]
    fn widget_bounds_use_place_factor() {
        let config = ViewerConfig {
            place_factor: 2.0,
            ..ViewerConfig::default()
        };
        let app = app(config);
        let surface = app.pipeline.bounds().unwrap();
        let placed = app.widget.representation().bounds();
        assert!((placed.size() - surface.size() * 2.0).length() < 1e-4);
    }

    #[test]
    fn keys_drive_widget_and_clipper() {
        let mut app = app(ViewerConfig::default());

        assert_eq!(app.apply_key(KeyCode::KeyX), KeyAction::Redraw);
        assert_eq!(app.pipeline.plane().normal(), Vec3::X);

        assert_eq!(app.apply_key(KeyCode::KeyI), KeyAction::Redraw);
        assert_eq!(app.pipeline.side(), ClipSide::Negative);

        app.widget.representation_mut().set_origin(Vec3::splat(2.0));
        app.apply_key(KeyCode::KeyR);
        assert_eq!(app.pipeline.plane().normal(), Vec3::Z);
        assert_eq!(
            app.pipeline.plane().origin(),
            app.widget.representation().bounds().center()
        );

        app.apply_key(KeyCode::KeyP);
        assert!(!app.widget.is_enabled());
        assert_eq!(app.apply_key(KeyCode::KeyQ), KeyAction::Exit);
        assert_eq!(app.apply_key(KeyCode::Escape), KeyAction::Exit);
    }

    #[test]
    fn export_writes_clipped_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipped.stl");
        let mut app = app(ViewerConfig {
            output_file: Some(path.clone()),
            ..ViewerConfig::default()
        });

        assert_eq!(app.apply_key(KeyCode::KeyW), KeyAction::Ignore);
        let bytes = std::fs::read(&path).unwrap();
        let triangles = u32::from_le_bytes(bytes[80..84].try_into().unwrap()) as usize;
        assert_eq!(triangles, app.pipeline.output().num_triangles());
        assert!(triangles > 0);
        assert!(triangles < app.pipeline.surface().num_triangles());
    }
}
