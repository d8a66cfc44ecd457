// src/engine_lib/camera.rs

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::engine_lib::pose::Pose;

/// Bit set of render layers a camera draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(u32::MAX);
    pub const NONE: LayerMask = LayerMask(0);

    pub fn from_layers(layers: &[u8]) -> Self {
        LayerMask(layers.iter().fold(0, |bits, layer| bits | (1u32 << (layer % 32))))
    }

    pub fn contains_layer(self, layer: u8) -> bool {
        self.0 & (1u32 << (layer % 32)) != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::ALL
    }
}

/// Perspective camera. Used for the viewer and for every portal rig's secondary camera.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub pose: Pose,
    pub fov_y_rad: f32,
    pub znear: f32,
    pub zfar: f32,
    pub visibility_mask: LayerMask,
}

impl Camera {
    pub fn new(fov_y_deg: f32, znear: f32, zfar: f32) -> Self {
        Self {
            pose: Pose::IDENTITY,
            fov_y_rad: fov_y_deg.to_radians(),
            znear,
            zfar,
            visibility_mask: LayerMask::ALL,
        }
    }

    /// Copies the lens and visibility settings of `other`, leaving the pose alone.
    pub fn copy_lens_from(&mut self, other: &Camera) {
        self.fov_y_rad = other.fov_y_rad;
        self.znear = other.znear;
        self.zfar = other.zfar;
        self.visibility_mask = other.visibility_mask;
    }

    // World -> camera view space.
    pub fn view_matrix(&self) -> Mat4 {
        self.pose.to_mat4().inverse()
    }

    pub fn to_camera_space(&self, world_point: Vec3) -> Vec3 {
        self.view_matrix().transform_point3(world_point)
    }

    /// Depth-buffer value of a camera-space point: 0 at the near plane, 1 at the far plane.
    /// Hyperbolic in view depth so it interpolates correctly across screen space.
    pub fn screen_depth(&self, p_cam: Vec3) -> f32 {
        let view_depth = (-p_cam.z).max(self.znear);
        (self.zfar * (view_depth - self.znear) / ((self.zfar - self.znear) * view_depth)).clamp(0.0, 1.0)
    }

    // Projects points that are ALREADY in camera view space to screen space.
    pub fn project_camera_space_to_screen_direct(
        &self,
        p_cam: Vec3,
        screen_width: f32,
        screen_height: f32,
    ) -> Option<Vec2> {
        if p_cam.z > -self.znear + 1e-6 {
            return None;
        }
        if -p_cam.z < 1e-6 {
            return None;
        }

        let aspect_ratio = screen_width / screen_height;
        let focal_length_y = 1.0 / (self.fov_y_rad / 2.0).tan();
        let focal_length_x = focal_length_y / aspect_ratio;

        let ndc_x = (p_cam.x * focal_length_x) / -p_cam.z;
        let ndc_y = (p_cam.y * focal_length_y) / -p_cam.z;

        let screen_x = (ndc_x + 1.0) * 0.5 * screen_width;
        let screen_y = (1.0 - ndc_y) * 0.5 * screen_height; // Invert Y for screen space

        Some(Vec2::new(screen_x, screen_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn point_ahead_projects_to_screen_center() {
        let mut camera = Camera::new(90.0, 0.1, 100.0);
        camera.pose = Pose::new(Vec3::new(0.0, 0.0, 5.0), Quat::IDENTITY);

        let p_cam = camera.to_camera_space(Vec3::ZERO);
        let screen = camera.project_camera_space_to_screen_direct(p_cam, 800.0, 600.0).unwrap();

        assert!(screen.abs_diff_eq(Vec2::new(400.0, 300.0), 1e-3));
    }

    #[test]
    fn point_behind_is_rejected() {
        let camera = Camera::new(90.0, 0.1, 100.0);
        let behind = camera.to_camera_space(Vec3::new(0.0, 0.0, 1.0));
        assert!(camera.project_camera_space_to_screen_direct(behind, 800.0, 600.0).is_none());
    }

    #[test]
    fn screen_depth_spans_near_to_far() {
        let camera = Camera::new(60.0, 0.5, 50.0);
        assert!(camera.screen_depth(Vec3::new(0.0, 0.0, -0.5)).abs() < 1e-6);
        assert!((camera.screen_depth(Vec3::new(0.0, 0.0, -50.0)) - 1.0).abs() < 1e-6);
        let mid = camera.screen_depth(Vec3::new(0.0, 0.0, -5.0));
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn layer_mask_bits() {
        let mask = LayerMask::from_layers(&[0, 3]);
        assert!(mask.contains_layer(0));
        assert!(mask.contains_layer(3));
        assert!(!mask.contains_layer(1));
        assert!(LayerMask::ALL.contains_layer(31));
        assert!(!LayerMask::NONE.contains_layer(0));
    }
}
