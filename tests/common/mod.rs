// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};

use glam::{Quat, Vec3};
use worldgate::engine_lib::agent::Agent;
use worldgate::engine_lib::anchor::WorldId;
use worldgate::engine_lib::pose::Pose;
use worldgate::engine_lib::world_switch::{LoadMode, WorldLoaded, WorldLoader, WorldSwitchCoordinator};

/// Agent double that records every pose write.
#[derive(Debug)]
pub struct TestAgent {
    pub pose: Pose,
    pub probe_height: f32,
    pub tag: String,
    pub collision_enabled: bool,
    /// Pose written, and whether collision was active at the time.
    pub writes: Vec<(Pose, bool)>,
}

impl TestAgent {
    pub fn at(position: Vec3) -> Self {
        Self {
            pose: Pose::from_position(position),
            probe_height: 0.0,
            tag: "Player".to_string(),
            collision_enabled: true,
            writes: Vec::new(),
        }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }
}

impl Agent for TestAgent {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn probe_point(&self) -> Vec3 {
        self.pose.position + Vec3::Y * self.probe_height
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn set_collision_enabled(&mut self, enabled: bool) {
        self.collision_enabled = enabled;
    }

    fn write_pose(&mut self, pose: Pose) {
        self.writes.push((pose, self.collision_enabled));
        self.pose = pose;
    }
}

/// Loader double: requests are recorded and only complete when the test says so.
#[derive(Debug, Default)]
pub struct ManualLoader {
    pub current: Option<WorldId>,
    pub loaded: BTreeSet<WorldId>,
    pub requests: Vec<(WorldId, LoadMode)>,
    outstanding: VecDeque<(WorldId, LoadMode)>,
    ready: VecDeque<WorldLoaded>,
}

impl ManualLoader {
    pub fn starting_in(world: WorldId) -> Self {
        Self {
            current: Some(world),
            loaded: BTreeSet::from([world]),
            ..Self::default()
        }
    }

    /// Completes every outstanding request, in order.
    pub fn finish_all(&mut self) {
        while let Some((world, mode)) = self.outstanding.pop_front() {
            if mode == LoadMode::Single {
                self.loaded.clear();
                self.current = Some(world);
            }
            self.loaded.insert(world);
            self.ready.push_back(WorldLoaded { world, mode });
        }
    }
}

impl WorldLoader for ManualLoader {
    fn load_world(&mut self, world: WorldId, mode: LoadMode) {
        self.requests.push((world, mode));
        self.outstanding.push_back((world, mode));
    }

    fn current_world_id(&self) -> Option<WorldId> {
        self.current
    }

    fn is_loaded(&self, world: WorldId) -> bool {
        self.loaded.contains(&world)
    }

    fn poll_loaded(&mut self) -> Option<WorldLoaded> {
        self.ready.pop_front()
    }
}

/// Finishes all loads and delivers the notifications to `coordinator`, like a frame would.
pub fn complete_loads(coordinator: &mut WorldSwitchCoordinator, loader: &mut ManualLoader) {
    loop {
        loader.finish_all();
        let Some(loaded) = loader.poll_loaded() else {
            break;
        };
        coordinator.on_world_loaded(loaded, loader);
    }
}

pub fn yawed(position: Vec3, yaw: f32) -> Pose {
    Pose::new(position, Quat::from_rotation_y(yaw))
}
