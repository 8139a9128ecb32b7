// Draws the plane widget: translucent plane polygon, bounds outline, normal
// arrow and origin handle.

use std::borrow::Cow;

use crate::{
    camera::Camera,
    widget::{Handle, PlaneRepresentation},
};

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

// sRGB with straight alpha.
const PLANE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.3];
const HANDLE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const SELECTED_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const SELECTED_PLANE_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 0.3];

/// Segments around the cones and the handle sphere.
const SEGMENTS: usize = 12;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl ColorVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    fn new(position: Vec3, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            color,
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Triangle list and line list making up the widget.
#[derive(Debug, Default)]
pub struct WidgetGeometry {
    pub triangles: Vec<ColorVertex>,
    pub lines: Vec<ColorVertex>,
}

impl WidgetGeometry {
    pub fn build(rep: &PlaneRepresentation, active: Option<Handle>) -> Self {
        let mut geometry = Self::default();
        let pick = |handle: Handle, normal: [f32; 4], selected: [f32; 4]| {
            if active == Some(handle) { selected } else { normal }
        };

        let plane_color = pick(Handle::Plane, PLANE_COLOR, SELECTED_PLANE_COLOR);
        let polygon = rep.polygon();
        for i in 1..polygon.len().saturating_sub(1) {
            for p in [polygon[0], polygon[i], polygon[i + 1]] {
                geometry.triangles.push(ColorVertex::new(p, plane_color));
            }
        }

        for [a, b] in rep.outline() {
            geometry.lines.push(ColorVertex::new(a, HANDLE_COLOR));
            geometry.lines.push(ColorVertex::new(b, HANDLE_COLOR));
        }

        let arrow_color = pick(Handle::Normal, HANDLE_COLOR, SELECTED_COLOR);
        let [tail, head] = rep.arrow();
        geometry.lines.push(ColorVertex::new(tail, arrow_color));
        geometry.lines.push(ColorVertex::new(head, arrow_color));
        let radius = rep.handle_radius();
        geometry.cone(head, rep.normal(), radius, arrow_color);
        geometry.cone(tail, -rep.normal(), radius, arrow_color);

        let origin_color = pick(Handle::Origin, HANDLE_COLOR, SELECTED_COLOR);
        geometry.sphere(rep.origin(), radius, origin_color);
        geometry
    }

    /// Applies `f` to the colour channels of every vertex. Alpha is kept.
    pub fn map_colors(&mut self, f: impl Fn(f32) -> f32) {
        for vertex in self.triangles.iter_mut().chain(&mut self.lines) {
            for c in &mut vertex.color[..3] {
                *c = f(*c);
            }
        }
    }

    /// Cone with its tip at `tip`, pointing along `direction`.
    fn cone(&mut self, tip: Vec3, direction: Vec3, radius: f32, color: [f32; 4]) {
        let Some(axis) = direction.try_normalize() else {
            return;
        };
        let base = tip - axis * radius * 4.0;
        let u = axis.any_orthonormal_vector();
        let v = axis.cross(u);
        let rim = |k: usize| {
            let angle = std::f32::consts::TAU * k as f32 / SEGMENTS as f32;
            base + (u * angle.cos() + v * angle.sin()) * radius * 1.5
        };
        for k in 0..SEGMENTS {
            for p in [rim(k), rim(k + 1), tip] {
                self.triangles.push(ColorVertex::new(p, color));
            }
        }
    }

    fn sphere(&mut self, center: Vec3, radius: f32, color: [f32; 4]) {
        let rings = SEGMENTS / 2;
        let point = |ring: usize, k: usize| {
            let theta = std::f32::consts::PI * ring as f32 / rings as f32;
            let phi = std::f32::consts::TAU * k as f32 / SEGMENTS as f32;
            center
                + Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()) * radius
        };
        for ring in 0..rings {
            for k in 0..SEGMENTS {
                let (a, b) = (point(ring, k), point(ring, k + 1));
                let (c, d) = (point(ring + 1, k), point(ring + 1, k + 1));
                for p in [a, c, d, a, d, b] {
                    self.triangles.push(ColorVertex::new(p, color));
                }
            }
        }
    }
}

struct GeometryBuffers {
    triangles: Option<(wgpu::Buffer, u32)>,
    lines: Option<(wgpu::Buffer, u32)>,
}

pub struct WidgetPipeline {
    triangles: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    geometry: Option<GeometryBuffers>,
}

impl WidgetPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Widget Uniform Buffer"),
            size: std::mem::size_of::<Mat4>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Widget BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Widget Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Widget Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "../../shaders/widget.wgsl"
            ))),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Widget Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let create = |label: &str, topology: wgpu::PrimitiveTopology| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[ColorVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_fmt,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                // Tested against the surface but never occluding it.
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_fmt,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            triangles: create("Widget Triangle Pipeline", wgpu::PrimitiveTopology::TriangleList),
            lines: create("Widget Line Pipeline", wgpu::PrimitiveTopology::LineList),
            bind_group,
            uniform_buffer,
            geometry: None,
        }
    }

    /// `None` hides the widget.
    pub fn upload(&mut self, device: &wgpu::Device, geometry: Option<&WidgetGeometry>) {
        let buffer = |label: &str, vertices: &[ColorVertex]| {
            (!vertices.is_empty()).then(|| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                (buffer, vertices.len() as u32)
            })
        };
        self.geometry = geometry.map(|g| GeometryBuffers {
            triangles: buffer("Widget Triangle VB", &g.triangles),
            lines: buffer("Widget Line VB", &g.lines),
        });
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, camera: &Camera) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&camera.view_proj()));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(geometry) = &self.geometry else {
            return;
        };
        pass.set_bind_group(0, &self.bind_group, &[]);
        for (pipeline, buffers) in [(&self.lines, &geometry.lines), (&self.triangles, &geometry.triangles)] {
            if let Some((buffer, count)) = buffers {
                pass.set_pipeline(pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..*count, 0..1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;

    fn placed() -> PlaneRepresentation {
        let mut rep = PlaneRepresentation::new();
        rep.place_widget(Bounds::new(Vec3::ZERO, Vec3::splat(10.0)));
        rep
    }

    #[test]
    fn builds_all_parts() {
        let geometry = WidgetGeometry::build(&placed(), None);

        // Outline and arrow.
        assert_eq!(geometry.lines.len(), 12 * 2 + 2);
        assert_eq!(geometry.triangles.len() % 3, 0);
        // Square polygon, two cones and the sphere.
        let expected = 2 * 3 + 2 * SEGMENTS * 3 + (SEGMENTS / 2) * SEGMENTS * 6;
        assert_eq!(geometry.triangles.len(), expected);
        assert!(geometry.triangles.iter().all(|v| v.color != SELECTED_COLOR));
    }

    #[test]
    fn highlights_active_handle() {
        let geometry = WidgetGeometry::build(&placed(), Some(Handle::Normal));
        let arrow = &geometry.lines[24..];
        assert!(arrow.iter().all(|v| v.color == SELECTED_COLOR));
        assert!(geometry.lines[..24].iter().all(|v| v.color == HANDLE_COLOR));
    }

    #[test]
    fn colour_mapping_keeps_alpha() {
        let mut geometry = WidgetGeometry::build(&placed(), Some(Handle::Plane));
        geometry.lines.push(ColorVertex::new(Vec3::ZERO, [0.5, 0.5, 0.5, 0.3]));
        geometry.map_colors(crate::renderer::srgb_to_linear);

        // The plane polygon comes first.
        assert!(geometry.triangles[..6].iter().all(|v| v.color[3] == SELECTED_PLANE_COLOR[3]));
        let grey = geometry.lines.last().unwrap().color;
        assert!((grey[0] - 0.214).abs() < 1e-3);
        assert_eq!(grey[3], 0.3);
    }

    #[test]
    fn clamped_origin_keeps_polygon() {
        let mut rep = placed();
        rep.set_normal(Vec3::X);
        let with_plane = WidgetGeometry::build(&rep, None).triangles.len();
        rep.set_origin(Vec3::splat(100.0));
        // Origin is clamped to the bounds, so the plane touches a face.
        let on_face = WidgetGeometry::build(&rep, None).triangles.len();
        assert_eq!(with_plane, on_face);
    }
}
