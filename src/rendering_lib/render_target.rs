// src/rendering_lib/render_target.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PortalResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
}

impl ColorFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            ColorFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            ColorFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }

    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(ColorFormat::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8UnormSrgb => Some(ColorFormat::Rgba8UnormSrgb),
            wgpu::TextureFormat::Bgra8Unorm => Some(ColorFormat::Bgra8Unorm),
            wgpu::TextureFormat::Bgra8UnormSrgb => Some(ColorFormat::Bgra8UnormSrgb),
            _ => None,
        }
    }
}

/// Size and format of a render target. Cloned, never shared, when a rig allocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTargetDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub depth_bits: u8,
}

impl Default for RenderTargetDescriptor {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            format: ColorFormat::Rgba8UnormSrgb,
            depth_bits: 16,
        }
    }
}

impl RenderTargetDescriptor {
    /// Fallback descriptor sized like the screen.
    pub fn for_screen(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            ..Self::default()
        }
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        match self.depth_bits {
            0 => None,
            1..=16 => Some(wgpu::TextureFormat::Depth16Unorm),
            17..=24 => Some(wgpu::TextureFormat::Depth24Plus),
            _ => Some(wgpu::TextureFormat::Depth32Float),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Opaque handle to an allocated target. Never reused by a factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub u64);

pub trait RenderTargetFactory {
    fn allocate(&mut self, label: &str, descriptor: &RenderTargetDescriptor) -> PortalResult<RenderTargetHandle>;
    fn release(&mut self, handle: RenderTargetHandle);
}

/// Bookkeeping-only factory for runs without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessTargetFactory {
    next: u64,
    live: HashMap<RenderTargetHandle, (String, RenderTargetDescriptor)>,
}

impl HeadlessTargetFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: RenderTargetHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn descriptor(&self, handle: RenderTargetHandle) -> Option<&RenderTargetDescriptor> {
        self.live.get(&handle).map(|(_, descriptor)| descriptor)
    }
}

impl RenderTargetFactory for HeadlessTargetFactory {
    fn allocate(&mut self, label: &str, descriptor: &RenderTargetDescriptor) -> PortalResult<RenderTargetHandle> {
        let handle = RenderTargetHandle(self.next);
        self.next += 1;
        self.live.insert(handle, (label.to_string(), *descriptor));
        Ok(handle)
    }

    fn release(&mut self, handle: RenderTargetHandle) {
        if self.live.remove(&handle).is_none() {
            log::warn!("[RenderTarget] Release of unknown target {:?}", handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_bits_map_to_formats() {
        let mut desc = RenderTargetDescriptor::default();
        assert_eq!(desc.depth_format(), Some(wgpu::TextureFormat::Depth16Unorm));
        desc.depth_bits = 24;
        assert_eq!(desc.depth_format(), Some(wgpu::TextureFormat::Depth24Plus));
        desc.depth_bits = 0;
        assert_eq!(desc.depth_format(), None);
    }

    #[test]
    fn headless_handles_are_unique() {
        let mut factory = HeadlessTargetFactory::new();
        let desc = RenderTargetDescriptor::default();
        let a = factory.allocate("a", &desc).unwrap();
        factory.release(a);
        let b = factory.allocate("b", &desc).unwrap();
        assert_ne!(a, b);
        assert_eq!(factory.live_count(), 1);
    }
}
