// src/rendering_lib/gpu_targets.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PortalError, PortalResult};
use crate::rendering_lib::render_target::{RenderTargetDescriptor, RenderTargetFactory, RenderTargetHandle};

pub struct GpuTarget {
    pub descriptor: RenderTargetDescriptor,
    color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
    pub sample_bind_group: wgpu::BindGroup,
}

impl GpuTarget {
    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|(_, view)| view)
    }
}

/// wgpu-backed render target factory. Each allocation gets its own color texture,
/// optional depth texture and a bind group for sampling it onto a portal surface.
pub struct GpuTargets {
    device: Arc<wgpu::Device>,
    sample_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    live: HashMap<RenderTargetHandle, GpuTarget>,
    next: u64,
}

impl GpuTargets {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        let sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("portal_target_sample_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Portal Target Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            sample_layout,
            sampler,
            live: HashMap::new(),
            next: 0,
        }
    }

    pub fn sample_layout(&self) -> &wgpu::BindGroupLayout {
        &self.sample_layout
    }

    pub fn get(&self, handle: RenderTargetHandle) -> Option<&GpuTarget> {
        self.live.get(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl RenderTargetFactory for GpuTargets {
    fn allocate(&mut self, label: &str, descriptor: &RenderTargetDescriptor) -> PortalResult<RenderTargetHandle> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(PortalError::TargetAllocation(format!(
                "{label}: zero-sized target {}x{}",
                descriptor.width, descriptor.height
            )));
        }
        let limits = self.device.limits();
        if descriptor.width > limits.max_texture_dimension_2d || descriptor.height > limits.max_texture_dimension_2d {
            return Err(PortalError::TargetAllocation(format!(
                "{label}: {}x{} exceeds device limit {}",
                descriptor.width, descriptor.height, limits.max_texture_dimension_2d
            )));
        }

        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };
        let color_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = descriptor.depth_format().map(|format| {
            let depth_label = format!("{label}_depth");
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&depth_label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        });

        let sample_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.sample_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let handle = RenderTargetHandle(self.next);
        self.next += 1;
        self.live.insert(
            handle,
            GpuTarget {
                descriptor: *descriptor,
                color_texture,
                color_view,
                depth,
                sample_bind_group,
            },
        );
        Ok(handle)
    }

    fn release(&mut self, handle: RenderTargetHandle) {
        match self.live.remove(&handle) {
            Some(target) => {
                target.color_texture.destroy();
                if let Some((texture, _)) = target.depth {
                    texture.destroy();
                }
            }
            None => log::warn!("[GpuTargets] Release of unknown target {:?}", handle),
        }
    }
}
