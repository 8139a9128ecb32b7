//! The rendering orchestrator. Owns the GPU context, the depth target and the
//! surface and widget pipelines.

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::{
        surface::SurfacePipeline,
        widget::{WidgetGeometry, WidgetPipeline},
    },
    targets::Targets,
};
use crate::{camera::Camera, surface::SurfaceMesh};

use std::sync::Arc;
use thiserror::Error;
use winit::window::Window;

/// SlateGray.
pub const BACKGROUND: [f32; 3] = [0.439, 0.502, 0.565];
pub const FRONT_FACE: [f32; 3] = [1.0, 1.0, 1.0];
/// Gold.
pub const BACK_FACE: [f32; 3] = [1.0, 0.843, 0.0];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("Failed to find a suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,
}

/// sRGB transfer function inverse.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Colours are given in sRGB; an sRGB surface expects linear values.
fn surface_color(rgb: [f32; 3], srgb_surface: bool) -> [f32; 3] {
    if srgb_surface {
        rgb.map(srgb_to_linear)
    } else {
        rgb
    }
}

/// Owns all rendering-related state.
pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    surface: SurfacePipeline,
    widget: WidgetPipeline,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let gfx = GfxContext::new(window).await?;
        let targets = Targets::new(&gfx.device, gfx.size);
        let surface = SurfacePipeline::new(&gfx.device, gfx.config.format, targets.depth_fmt);
        let widget = WidgetPipeline::new(&gfx.device, gfx.config.format, targets.depth_fmt);

        Ok(Self {
            gfx,
            targets,
            surface,
            widget,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    pub fn upload_surface(&mut self, mesh: &SurfaceMesh) {
        self.surface.upload(&self.gfx.device, mesh);
    }

    /// `None` hides the widget. Colours are converted like the surface
    /// colours so the translucent plane blends in linear space.
    pub fn upload_widget(&mut self, geometry: Option<WidgetGeometry>) {
        let srgb = self.gfx.is_srgb();
        let geometry = geometry.map(|mut geometry| {
            if srgb {
                geometry.map_colors(srgb_to_linear);
            }
            geometry
        });
        self.widget.upload(&self.gfx.device, geometry.as_ref());
    }

    pub fn render(&mut self, camera: &Camera) -> Result<(), wgpu::SurfaceError> {
        let frame = self.gfx.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let srgb = self.gfx.is_srgb();
        self.surface.update_uniforms(
            &self.gfx.queue,
            camera,
            surface_color(FRONT_FACE, srgb),
            surface_color(BACK_FACE, srgb),
        );
        self.widget.update_uniforms(&self.gfx.queue, camera);

        let [r, g, b] = surface_color(BACKGROUND, srgb).map(f64::from);
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // The widget is translucent, so it goes after the surface.
            self.surface.draw(&mut pass);
            self.widget.draw(&mut pass);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_conversion() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!((srgb_to_linear(0.5) - 0.214).abs() < 1e-3);
    }

    #[test]
    fn colours_pass_through_for_linear_surfaces() {
        assert_eq!(surface_color(BACK_FACE, false), BACK_FACE);
        let linear = surface_color(BACKGROUND, true);
        assert!(linear.iter().zip(BACKGROUND).all(|(l, s)| *l < s));
    }
}
