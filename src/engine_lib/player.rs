// src/engine_lib/player.rs

use glam::{Quat, Vec3};

use crate::engine_lib::agent::{place_agent, Agent};
use crate::engine_lib::pose::{yaw_of, Pose, UP};
use crate::engine_lib::world::World;

const GRAVITY: f32 = 9.81;
const JUMP_SPEED: f32 = 4.5;
const STEP_HEIGHT: f32 = 0.3;
const FALL_LIMIT: f32 = 60.0;

pub const PLAYER_TAG: &str = "Player";

/// Demo agent: a capsule with gravity and floor collision.
#[derive(Clone, Debug)]
pub struct PlayerBody {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    vertical_velocity: f32,
    collision_enabled: bool,
    grounded: bool,
    tag: String,
    pub half_height: f32,
    pub eye_height: f32,
    pub move_speed: f32,
}

impl PlayerBody {
    pub fn spawn(pose: Pose) -> Self {
        Self {
            position: pose.position,
            yaw: yaw_of(pose.orientation),
            pitch: 0.0,
            vertical_velocity: 0.0,
            collision_enabled: true,
            grounded: false,
            tag: PLAYER_TAG.to_string(),
            half_height: 0.9,
            eye_height: 1.6,
            move_speed: 3.0,
        }
    }

    pub fn look(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        let pitch_limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = (self.pitch + pitch_delta).clamp(-pitch_limit, pitch_limit);
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    /// Moves by `local_move` (x right, z backward, in units of `move_speed`) and resolves
    /// against the world's floors.
    pub fn step(&mut self, local_move: Vec3, jump: bool, dt: f32, world: &World) {
        let heading = Quat::from_rotation_y(self.yaw);
        let horizontal = heading * Vec3::new(local_move.x, 0.0, local_move.z);
        self.position += horizontal * self.move_speed * dt;

        if !self.collision_enabled {
            return;
        }

        if jump && self.grounded {
            self.vertical_velocity = JUMP_SPEED;
            self.grounded = false;
        }
        self.vertical_velocity -= GRAVITY * dt;
        self.position.y += self.vertical_velocity * dt;

        match world.floor_below(self.position, STEP_HEIGHT) {
            Some(floor) if self.position.y <= floor => {
                self.position.y = floor;
                self.vertical_velocity = 0.0;
                self.grounded = true;
            }
            Some(_) => self.grounded = false,
            None => {
                self.grounded = false;
                let lowest = world.floors.iter().map(|floor| floor.height).reduce(f32::min).unwrap_or(0.0);
                if self.position.y < lowest - FALL_LIMIT {
                    log::info!("[Player] Fell out of world '{}'; respawning", world.name);
                    place_agent(self, world.spawn);
                }
            }
        }
    }

    pub fn eye_pose(&self) -> Pose {
        Pose::new(
            self.position + UP * self.eye_height,
            Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch),
        )
    }
}

impl Agent for PlayerBody {
    fn pose(&self) -> Pose {
        Pose::new(self.position, Quat::from_rotation_y(self.yaw))
    }

    fn probe_point(&self) -> Vec3 {
        self.position + UP * self.half_height
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn set_collision_enabled(&mut self, enabled: bool) {
        self.collision_enabled = enabled;
    }

    fn write_pose(&mut self, pose: Pose) {
        if self.collision_enabled {
            log::warn!("[Player] Pose written while collision resolution is active");
        }
        self.position = pose.position;
        self.yaw = yaw_of(pose.orientation);
        self.vertical_velocity = 0.0;
        self.grounded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_lib::anchor::WorldId;
    use crate::engine_lib::world::FloorPatch;
    use glam::Vec2;

    fn flat_world() -> World {
        World {
            id: WorldId::A,
            name: "flat".into(),
            quads: Vec::new(),
            floors: vec![FloorPatch { min: Vec2::splat(-20.0), max: Vec2::splat(20.0), height: 0.0 }],
            portals: Vec::new(),
            spawn: Pose::IDENTITY,
        }
    }

    #[test]
    fn settles_on_floor() {
        let world = flat_world();
        let mut player = PlayerBody::spawn(Pose::from_position(Vec3::new(0.0, 2.0, 0.0)));
        for _ in 0..120 {
            player.step(Vec3::ZERO, false, 1.0 / 60.0, &world);
        }
        assert!(player.is_grounded());
        assert_eq!(player.pose().position.y, 0.0);
    }

    #[test]
    fn probe_point_is_above_root() {
        let player = PlayerBody::spawn(Pose::IDENTITY);
        assert!(player.probe_point().y > player.pose().position.y);
    }

    #[test]
    fn placed_pose_keeps_collision_on_afterwards() {
        let mut player = PlayerBody::spawn(Pose::IDENTITY);
        let target = Pose::new(Vec3::new(4.0, 0.0, 1.0), Quat::from_rotation_y(0.5));
        place_agent(&mut player, target);
        assert!(player.collision_enabled());
        assert!(player.pose().abs_diff_eq(&target, 1e-5));
    }
}
