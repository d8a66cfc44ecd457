// src/rendering_lib/renderer.rs

use std::collections::HashMap;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use wgpu::util::DeviceExt;

use super::shader::{WGSL_SHADER_SOURCE, WGSL_SURFACE_SHADER_SOURCE};
use super::vertex::{SurfaceVertex, Vertex};
use crate::engine_lib::camera::Camera;
use crate::engine_lib::world::WorldQuad;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ScreenDimensionsUniform {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

/// Camera-space vertex carried through near-plane clipping.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ClipVertex {
    p: Vec3,
    uv: Vec2,
}

impl ClipVertex {
    fn lerp(self, other: ClipVertex, t: f32) -> ClipVertex {
        ClipVertex {
            p: self.p.lerp(other.p, t),
            uv: self.uv.lerp(other.uv, t),
        }
    }
}

// Sutherland-Hodgman against the single plane z_cam = -znear.
// A point is visible if z < -znear.
fn clip_polygon_near_plane_3d(polygon: &[ClipVertex], znear: f32) -> Vec<ClipVertex> {
    let Some(&last) = polygon.last() else {
        return Vec::new();
    };

    let mut output = Vec::with_capacity(polygon.len() + 1);
    let mut s = last;
    for &p in polygon {
        let s_inside = s.p.z < -znear;
        let p_inside = p.p.z < -znear;

        if s_inside != p_inside && (p.p.z - s.p.z).abs() > 1e-6 {
            let t = (-znear - s.p.z) / (p.p.z - s.p.z);
            if (0.0..=1.0).contains(&t) {
                let mut crossing = s.lerp(p, t);
                crossing.p.z = -znear;
                output.push(crossing);
            }
        }
        if p_inside {
            output.push(p);
        }
        s = p;
    }
    output
}

/// Screen position, depth-buffer value and uv of one projected vertex.
type Projected = (Vec2, f32, Vec2);

fn project_polygon(camera: &Camera, polygon: &[ClipVertex], width: f32, height: f32) -> Vec<Projected> {
    let clipped = clip_polygon_near_plane_3d(polygon, camera.znear);
    if clipped.len() < 3 {
        return Vec::new();
    }
    let projected: Vec<Projected> = clipped
        .iter()
        .filter_map(|v| {
            camera
                .project_camera_space_to_screen_direct(v.p, width, height)
                .map(|screen| (screen, camera.screen_depth(v.p), v.uv))
        })
        .collect();
    if projected.len() < 3 {
        return Vec::new();
    }
    projected
}

fn push_fan(indices: &mut Vec<u32>, start: u32, count: u32) {
    for i in 1..count.saturating_sub(1) {
        indices.extend_from_slice(&[start, start + i, start + i + 1]);
    }
}

/// Color and optional depth attachment of one pass.
pub struct PassTarget<'a> {
    pub label: &'a str,
    pub color: &'a wgpu::TextureView,
    pub color_format: wgpu::TextureFormat,
    pub depth: Option<(&'a wgpu::TextureView, wgpu::TextureFormat)>,
    pub width: u32,
    pub height: u32,
}

/// Portal surface to draw in a pass. Without a texture it is drawn flat.
pub struct SurfaceDraw<'a> {
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: [Vec3; 4],
    pub texture: Option<&'a wgpu::BindGroup>,
    pub screen_mapped: bool,
    pub fallback_color: [f32; 4],
}

struct PassPipelines {
    flat: wgpu::RenderPipeline,
    surface: wgpu::RenderPipeline,
}

type PipelineKey = (wgpu::TextureFormat, Option<wgpu::TextureFormat>);

/// Draws world quads and portal surfaces into any target, the window or a rig texture.
/// Each pass builds its own buffers, so several passes can be encoded per frame.
pub struct Renderer {
    flat_shader: wgpu::ShaderModule,
    surface_shader: wgpu::ShaderModule,
    screen_layout: wgpu::BindGroupLayout,
    flat_pipeline_layout: wgpu::PipelineLayout,
    surface_pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, PassPipelines>,
}

impl Renderer {
    pub fn new(device: &wgpu::Device, sample_layout: &wgpu::BindGroupLayout) -> Self {
        let flat_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flat Shader Module"),
            source: wgpu::ShaderSource::Wgsl(WGSL_SHADER_SOURCE.into()),
        });
        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Portal Surface Shader Module"),
            source: wgpu::ShaderSource::Wgsl(WGSL_SURFACE_SHADER_SOURCE.into()),
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("screen_dimensions_bind_group_layout"),
        });

        let flat_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flat Pipeline Layout"),
            bind_group_layouts: &[&screen_layout],
            push_constant_ranges: &[],
        });
        let surface_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Portal Surface Pipeline Layout"),
            bind_group_layouts: &[&screen_layout, sample_layout],
            push_constant_ranges: &[],
        });

        Self {
            flat_shader,
            surface_shader,
            screen_layout,
            flat_pipeline_layout,
            surface_pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    fn create_pipeline(
        &self,
        device: &wgpu::Device,
        (color_format, depth_format): PipelineKey,
        surface: bool,
    ) -> wgpu::RenderPipeline {
        let (label, layout, module, buffers, blend) = if surface {
            (
                "Portal Surface Pipeline",
                &self.surface_pipeline_layout,
                &self.surface_shader,
                [SurfaceVertex::desc()],
                None,
            )
        } else {
            (
                "Flat Pipeline",
                &self.flat_pipeline_layout,
                &self.flat_shader,
                [Vertex::desc()],
                Some(wgpu::BlendState::ALPHA_BLENDING),
            )
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: "vs_main",
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    fn ensure_pipelines(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        log::debug!("[Renderer] Building pipelines for {:?} / {:?}", key.0, key.1);
        let pipelines = PassPipelines {
            flat: self.create_pipeline(device, key, false),
            surface: self.create_pipeline(device, key, true),
        };
        self.pipelines.insert(key, pipelines);
    }

    /// Encodes one pass of `camera` into `target`: the quads its mask allows, then the
    /// portal surfaces.
    pub fn render_pass<'q>(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &PassTarget,
        camera: &Camera,
        quads: impl IntoIterator<Item = &'q WorldQuad>,
        surfaces: &[SurfaceDraw],
        clear_color: wgpu::Color,
    ) {
        let width = target.width.max(1) as f32;
        let height = target.height.max(1) as f32;

        let mut flat_vertices: Vec<Vertex> = Vec::new();
        let mut flat_indices: Vec<u32> = Vec::new();
        let mut add_flat = |polygon: &[Projected], color: [f32; 4]| {
            let start = flat_vertices.len() as u32;
            flat_vertices.extend(polygon.iter().map(|(p, depth, _)| Vertex::new([p.x, p.y], *depth, color)));
            push_fan(&mut flat_indices, start, polygon.len() as u32);
        };

        for quad in quads {
            if !camera.visibility_mask.contains_layer(quad.layer) {
                continue;
            }
            let polygon = quad.corners.map(|corner| ClipVertex {
                p: camera.to_camera_space(corner),
                uv: Vec2::ZERO,
            });
            let projected = project_polygon(camera, &polygon, width, height);
            if !projected.is_empty() {
                add_flat(&projected, quad.color);
            }
        }

        let mut surface_vertices: Vec<SurfaceVertex> = Vec::new();
        let mut surface_indices: Vec<u32> = Vec::new();
        let mut surface_ranges: Vec<(Range<u32>, &wgpu::BindGroup)> = Vec::new();
        const QUAD_UVS: [Vec2; 4] = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

        for surface in surfaces {
            let mut polygon = [ClipVertex { p: Vec3::ZERO, uv: Vec2::ZERO }; 4];
            for (slot, (corner, uv)) in polygon.iter_mut().zip(surface.corners.iter().zip(QUAD_UVS)) {
                *slot = ClipVertex {
                    p: camera.to_camera_space(*corner),
                    uv,
                };
            }
            let projected = project_polygon(camera, &polygon, width, height);
            if projected.is_empty() {
                continue;
            }
            match surface.texture {
                Some(bind_group) => {
                    let start = surface_vertices.len() as u32;
                    let first_index = surface_indices.len() as u32;
                    surface_vertices.extend(projected.iter().map(|(p, depth, uv)| {
                        let uv = if surface.screen_mapped { Vec2::new(p.x / width, p.y / height) } else { *uv };
                        SurfaceVertex::new([p.x, p.y], *depth, uv.to_array())
                    }));
                    push_fan(&mut surface_indices, start, projected.len() as u32);
                    surface_ranges.push((first_index..surface_indices.len() as u32, bind_group));
                }
                None => add_flat(&projected, surface.fallback_color),
            }
        }

        let screen_uniform_data = ScreenDimensionsUniform {
            width,
            height,
            _padding1: 0.0,
            _padding2: 0.0,
        };
        let screen_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Dimensions Uniform Buffer"),
            contents: bytemuck::bytes_of(&screen_uniform_data),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_uniform_buffer.as_entire_binding(),
            }],
            label: Some("screen_dimensions_bind_group"),
        });

        let flat_buffers = (!flat_indices.is_empty()).then(|| {
            (
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Flat Vertex Buffer"),
                    contents: bytemuck::cast_slice(&flat_vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Flat Index Buffer"),
                    contents: bytemuck::cast_slice(&flat_indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
            )
        });
        let surface_buffers = (!surface_indices.is_empty()).then(|| {
            (
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Portal Surface Vertex Buffer"),
                    contents: bytemuck::cast_slice(&surface_vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Portal Surface Index Buffer"),
                    contents: bytemuck::cast_slice(&surface_indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
            )
        });

        let key = (target.color_format, target.depth.map(|(_, format)| format));
        self.ensure_pipelines(device, key);
        let Some(pipelines) = self.pipelines.get(&key) else {
            return;
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(target.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: target.depth.map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_bind_group(0, &screen_bind_group, &[]);

        if let Some((vertex_buffer, index_buffer)) = &flat_buffers {
            render_pass.set_pipeline(&pipelines.flat);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..flat_indices.len() as u32, 0, 0..1);
        }

        if let Some((vertex_buffer, index_buffer)) = &surface_buffers {
            render_pass.set_pipeline(&pipelines.surface);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            for (range, bind_group) in surface_ranges.iter() {
                render_pass.set_bind_group(1, *bind_group, &[]);
                render_pass.draw_indexed(range.clone(), 0, 0..1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_lib::pose::Pose;
    use glam::Quat;

    fn cv(x: f32, y: f32, z: f32) -> ClipVertex {
        ClipVertex {
            p: Vec3::new(x, y, z),
            uv: Vec2::new(x, y),
        }
    }

    #[test]
    fn polygon_in_front_is_untouched() {
        let polygon = [cv(-1.0, -1.0, -5.0), cv(1.0, -1.0, -5.0), cv(1.0, 1.0, -5.0), cv(-1.0, 1.0, -5.0)];
        assert_eq!(clip_polygon_near_plane_3d(&polygon, 0.1), polygon.to_vec());
    }

    #[test]
    fn polygon_behind_is_dropped() {
        let polygon = [cv(-1.0, -1.0, 1.0), cv(1.0, -1.0, 1.0), cv(0.0, 1.0, 1.0)];
        assert!(clip_polygon_near_plane_3d(&polygon, 0.1).is_empty());
    }

    #[test]
    fn straddling_polygon_is_cut_at_near_plane() {
        // Floor strip running from behind the camera to well in front of it.
        let polygon = [cv(-1.0, -1.0, 1.0), cv(1.0, -1.0, 1.0), cv(1.0, -1.0, -3.0), cv(-1.0, -1.0, -3.0)];
        let clipped = clip_polygon_near_plane_3d(&polygon, 1.0);

        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|v| v.p.z <= -1.0 + 1e-6));
        let on_plane: Vec<_> = clipped.iter().filter(|v| (v.p.z + 1.0).abs() < 1e-6).collect();
        assert_eq!(on_plane.len(), 2);
        // uv follows the position along the cut edge.
        for v in on_plane {
            assert!((v.uv.x - v.p.x).abs() < 1e-6);
        }
    }

    #[test]
    fn projection_of_visible_quad_has_depth_in_range() {
        let mut camera = Camera::new(60.0, 0.1, 100.0);
        camera.pose = Pose::new(Vec3::new(0.0, 0.0, 5.0), Quat::IDENTITY);
        let polygon = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ]
        .map(|p| ClipVertex {
            p: camera.to_camera_space(p),
            uv: Vec2::ZERO,
        });

        let projected = project_polygon(&camera, &polygon, 800.0, 600.0);
        assert_eq!(projected.len(), 4);
        for (screen, depth, _) in projected {
            assert!(screen.x > 0.0 && screen.x < 800.0);
            assert!(screen.y > 0.0 && screen.y < 600.0);
            assert!(depth > 0.0 && depth < 1.0);
        }
    }

    #[test]
    fn fan_indices() {
        let mut indices = Vec::new();
        push_fan(&mut indices, 4, 5);
        assert_eq!(indices, vec![4, 5, 6, 4, 6, 7, 4, 7, 8]);
    }
}
