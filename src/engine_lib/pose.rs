// src/engine_lib/pose.rs

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local forward axis of every frame (anchors, agents, cameras).
pub const FORWARD: Vec3 = Vec3::NEG_Z;
pub const UP: Vec3 = Vec3::Y;
pub const RIGHT: Vec3 = Vec3::X;

/// A rigid frame: position plus orientation, no scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self { position, orientation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * FORWARD
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * RIGHT
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * UP
    }

    /// Expresses this pose in the local coordinate frame of `frame`.
    pub fn relative_to(&self, frame: &Pose) -> Pose {
        let inverse = frame.orientation.inverse();
        Pose {
            position: inverse * (self.position - frame.position),
            orientation: (inverse * self.orientation).normalize(),
        }
    }

    /// Re-projects a pose given in `frame`'s local coordinates back into world space.
    /// Inverse of [`Pose::relative_to`].
    pub fn in_frame(&self, frame: &Pose) -> Pose {
        Pose {
            position: frame.position + frame.orientation * self.position,
            orientation: (frame.orientation * self.orientation).normalize(),
        }
    }

    pub fn translated(&self, offset: Vec3) -> Pose {
        Pose::new(self.position + offset, self.orientation)
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    pub fn abs_diff_eq(&self, other: &Pose, max_abs_diff: f32) -> bool {
        self.position.abs_diff_eq(other.position, max_abs_diff)
            // q and -q encode the same rotation
            && (self.orientation.abs_diff_eq(other.orientation, max_abs_diff)
                || self.orientation.abs_diff_eq(-other.orientation, max_abs_diff))
    }
}

/// Yaw-only orientation whose forward axis points along the horizontal part of `direction`.
/// Returns `None` when `direction` is (nearly) vertical.
pub fn facing(direction: Vec3) -> Option<Quat> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() < 1e-8 {
        return None;
    }
    let flat = flat.normalize();
    // forward(yaw) = (-sin yaw, 0, -cos yaw)
    let yaw = (-flat.x).atan2(-flat.z);
    Some(Quat::from_rotation_y(yaw))
}

/// Yaw angle of an orientation about the up axis.
pub fn yaw_of(orientation: Quat) -> f32 {
    let (yaw, _pitch, _roll) = orientation.to_euler(glam::EulerRot::YXZ);
    yaw
}
