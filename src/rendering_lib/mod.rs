// src/rendering_lib/mod.rs

pub mod gpu_targets;
pub mod portal_rig;
pub mod render_target;
pub mod renderer;
pub mod shader;
pub mod vertex;

pub use portal_rig::{PortalCameraRig, PoseMode, RigSet};
pub use render_target::{HeadlessTargetFactory, RenderTargetFactory};
pub use renderer::Renderer;
