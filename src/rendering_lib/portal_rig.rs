// src/rendering_lib/portal_rig.rs

use std::collections::BTreeMap;
use std::f32::consts::PI;

use glam::Quat;
use serde::{Deserialize, Serialize};

use crate::engine_lib::anchor::{AnchorId, AnchorSet};
use crate::engine_lib::camera::Camera;
use crate::engine_lib::pose::Pose;
use crate::error::PortalResult;
use crate::rendering_lib::render_target::{RenderTargetDescriptor, RenderTargetFactory, RenderTargetHandle};

/// Push off the linked surface so the fixed camera does not clip into backing geometry.
pub const FIXED_MOUNT_OFFSET: f32 = 0.05;

/// How a rig derives its secondary camera pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PoseMode {
    /// Static view mounted at the linked anchor, looking straight out of it.
    FixedMount { forward_offset: f32 },
    /// Viewer pose carried from this anchor's frame into the linked anchor's frame.
    /// `invert_facing` turns the local pose half way around the anchor's up axis,
    /// so the view looks through the portal instead of back at it. The turn negates the
    /// local right (X) and forward (Z) axes and keeps up (Y).
    ViewerRelative { invert_facing: bool },
}

impl Default for PoseMode {
    fn default() -> Self {
        PoseMode::FixedMount {
            forward_offset: FIXED_MOUNT_OFFSET,
        }
    }
}

/// Secondary camera pose for one frame. `None` when the mode needs a viewer and there is none.
pub fn derive_secondary_pose(
    mode: PoseMode,
    viewer: Option<&Pose>,
    this_anchor: &Pose,
    linked_anchor: &Pose,
) -> Option<Pose> {
    match mode {
        PoseMode::FixedMount { forward_offset } => Some(Pose::new(
            linked_anchor.position + linked_anchor.forward() * forward_offset,
            linked_anchor.orientation,
        )),
        PoseMode::ViewerRelative { invert_facing } => {
            let mut local = viewer?.relative_to(this_anchor);
            if invert_facing {
                let half_turn = Quat::from_rotation_y(PI);
                local.position = half_turn * local.position;
                local.orientation = half_turn * local.orientation;
            }
            Some(local.in_frame(linked_anchor))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub mode: PoseMode,
    /// Template the private target is cloned from. Falls back to the default descriptor.
    pub target: Option<RenderTargetDescriptor>,
}

/// A posed secondary camera ready to be rendered into its target this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RigRender {
    pub anchor: AnchorId,
    pub target: RenderTargetHandle,
    pub descriptor: RenderTargetDescriptor,
    pub camera: Camera,
    pub first_frame: bool,
}

/// Secondary camera plus its privately owned render target, attached to one anchor.
#[derive(Debug)]
pub struct PortalCameraRig {
    anchor: AnchorId,
    linked: Option<AnchorId>,
    mode: PoseMode,
    camera: Camera,
    target: Option<RenderTargetHandle>,
    descriptor: RenderTargetDescriptor,
    enabled: bool,
    rendered_once: bool,
    warned_missing_viewer: bool,
}

impl PortalCameraRig {
    /// Allocates a fresh target from `template` (or the default descriptor). Targets are
    /// never shared between rigs.
    pub fn new(
        anchor: AnchorId,
        mode: PoseMode,
        template: Option<&RenderTargetDescriptor>,
        factory: &mut dyn RenderTargetFactory,
    ) -> PortalResult<Self> {
        let descriptor = template.copied().unwrap_or_default();
        let label = format!("PortalRT_{}", anchor.0);
        let target = factory.allocate(&label, &descriptor)?;
        log::debug!("[PortalRig] {} allocated {:?} ({}x{})", anchor, target, descriptor.width, descriptor.height);

        Ok(Self {
            anchor,
            linked: None,
            mode,
            camera: Camera::new(60.0, 0.05, 500.0),
            target: Some(target),
            descriptor,
            // Stays off until the first correct pose.
            enabled: false,
            rendered_once: false,
            warned_missing_viewer: false,
        })
    }

    pub fn anchor(&self) -> AnchorId {
        self.anchor
    }

    pub fn linked(&self) -> Option<AnchorId> {
        self.linked
    }

    pub fn set_linked(&mut self, linked: Option<AnchorId>) {
        self.linked = linked;
    }

    pub fn mode(&self) -> PoseMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PoseMode) {
        self.mode = mode;
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn target(&self) -> Option<RenderTargetHandle> {
        self.target
    }

    pub fn descriptor(&self) -> &RenderTargetDescriptor {
        &self.descriptor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_rendered_once(&self) -> bool {
        self.rendered_once
    }

    /// Late-frame update; call after the viewer's pose is final.
    pub fn sync(&mut self, anchors: &AnchorSet, viewer: Option<&Camera>) -> Option<RigRender> {
        let target = self.target?;
        let linked_id = self.linked?;
        let (Some(this), Some(linked)) = (anchors.get(self.anchor), anchors.get(linked_id)) else {
            return None;
        };

        let viewer_pose = viewer.map(|camera| camera.pose);
        let Some(pose) = derive_secondary_pose(self.mode, viewer_pose.as_ref(), &this.pose, &linked.pose) else {
            self.warn_missing_viewer();
            return None;
        };
        self.camera.pose = pose;
        match viewer {
            Some(viewer) => self.camera.copy_lens_from(viewer),
            None => self.warn_missing_viewer(),
        }

        let first_frame = !self.rendered_once;
        self.enabled = true;
        self.rendered_once = true;

        Some(RigRender {
            anchor: self.anchor,
            target,
            descriptor: self.descriptor,
            camera: self.camera.clone(),
            first_frame,
        })
    }

    /// Detaches the target from the camera, then frees it.
    pub fn release(&mut self, factory: &mut dyn RenderTargetFactory) {
        if let Some(target) = self.target.take() {
            self.enabled = false;
            factory.release(target);
            log::debug!("[PortalRig] {} released {:?}", self.anchor, target);
        }
    }

    fn warn_missing_viewer(&mut self) {
        if !self.warned_missing_viewer {
            log::warn!("[PortalRig] {} has no viewer camera", self.anchor);
            self.warned_missing_viewer = true;
        }
    }
}

impl Drop for PortalCameraRig {
    fn drop(&mut self) {
        if let Some(target) = self.target {
            log::warn!("[PortalRig] {} dropped without releasing {:?}", self.anchor, target);
        }
    }
}

/// All rigs of the loaded world, keyed by the anchor they are attached to.
#[derive(Debug, Default)]
pub struct RigSet {
    rigs: BTreeMap<AnchorId, PortalCameraRig>,
}

impl RigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `rig`, releasing any rig it replaces on the same anchor.
    pub fn insert(&mut self, rig: PortalCameraRig, factory: &mut dyn RenderTargetFactory) {
        if let Some(mut old) = self.rigs.insert(rig.anchor, rig) {
            old.release(factory);
        }
    }

    pub fn get(&self, anchor: AnchorId) -> Option<&PortalCameraRig> {
        self.rigs.get(&anchor)
    }

    pub fn get_mut(&mut self, anchor: AnchorId) -> Option<&mut PortalCameraRig> {
        self.rigs.get_mut(&anchor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortalCameraRig> {
        self.rigs.values()
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }

    pub fn remove(&mut self, anchor: AnchorId, factory: &mut dyn RenderTargetFactory) -> bool {
        match self.rigs.remove(&anchor) {
            Some(mut rig) => {
                rig.release(factory);
                true
            }
            None => false,
        }
    }

    /// Points the rigs on `a` and `b` (whichever exist) at each other.
    pub fn link_pair(&mut self, a: AnchorId, b: AnchorId) {
        if let Some(rig) = self.rigs.get_mut(&a) {
            rig.set_linked(Some(b));
        }
        if let Some(rig) = self.rigs.get_mut(&b) {
            rig.set_linked(Some(a));
        }
    }

    pub fn sync_all(&mut self, anchors: &AnchorSet, viewer: Option<&Camera>) -> Vec<RigRender> {
        self.rigs
            .values_mut()
            .filter_map(|rig| rig.sync(anchors, viewer))
            .collect()
    }

    pub fn release_all(&mut self, factory: &mut dyn RenderTargetFactory) {
        for (_, mut rig) in std::mem::take(&mut self.rigs) {
            rig.release(factory);
        }
    }
}
