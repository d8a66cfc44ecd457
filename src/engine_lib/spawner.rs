// src/engine_lib/spawner.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::engine_lib::anchor::{AnchorId, AnchorSet};
use crate::engine_lib::pose::{facing, Pose, FORWARD, UP};
use crate::error::PortalResult;
use crate::rendering_lib::portal_rig::RigSet;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Offset between the base world and the parallel world.
    pub world_offset: Vec3,
    /// Horizontal distance in front of the agent.
    pub spawn_distance: f32,
    /// Added to chest height. Negative values lower the portal so it can be walked through.
    pub spawn_height_offset: f32,
    /// Height above the agent's root the placement starts from.
    pub chest_height: f32,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            world_offset: Vec3::new(0.0, 1000.0, 0.0),
            spawn_distance: 3.0,
            spawn_height_offset: -0.15,
            chest_height: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnedPair {
    pub a: AnchorId,
    pub b: AnchorId,
    /// Pair removed to make room for this one.
    pub replaced: Option<(AnchorId, AnchorId)>,
}

/// Places linked anchor pairs at runtime; at most one pair is active at a time.
#[derive(Debug, Default)]
pub struct PortalPairSpawner {
    pub config: SpawnerConfig,
    active: Option<(AnchorId, AnchorId)>,
}

impl PortalPairSpawner {
    pub fn new(config: SpawnerConfig) -> Self {
        Self { config, active: None }
    }

    pub fn active_pair(&self) -> Option<(AnchorId, AnchorId)> {
        self.active
    }

    /// Estimates which world `position` is in by comparing its component along the
    /// offset against half the offset's length.
    pub fn is_in_base_world(&self, position: Vec3) -> bool {
        let offset = self.config.world_offset;
        let length = offset.length();
        if length < 1e-6 {
            return true;
        }
        position.dot(offset / length) < length * 0.5
    }

    /// Placement of the local anchor: in front of the agent, facing back toward it.
    pub fn entrance_pose(&self, agent: &Pose) -> Pose {
        let origin = agent.position + UP * self.config.chest_height;
        let forward = agent.forward();
        let direction = Vec3::new(forward.x, 0.0, forward.z).try_normalize().unwrap_or(FORWARD);

        let mut position = origin + direction * self.config.spawn_distance;
        position.y = origin.y + self.config.spawn_height_offset;

        let orientation = facing(-direction).unwrap_or(agent.orientation);
        Pose::new(position, orientation)
    }

    /// Removes the previous pair, places a new one and links it symmetrically.
    pub fn spawn(&mut self, agent: &Pose, anchors: &mut AnchorSet) -> PortalResult<SpawnedPair> {
        let replaced = self.clear(anchors);

        let entrance = self.entrance_pose(agent);
        let offset = if self.is_in_base_world(agent.position) {
            self.config.world_offset
        } else {
            -self.config.world_offset
        };
        let exit = entrance.translated(offset);

        let a = anchors.insert("spawned_entrance", entrance, None);
        let b = anchors.insert("spawned_exit", exit, None);
        anchors.link_pair(a, b)?;
        self.active = Some((a, b));

        log::info!("[Spawner] Placed pair {} at {} <-> {} at {}", a, entrance.position, b, exit.position);
        Ok(SpawnedPair { a, b, replaced })
    }

    /// Wires the rendering rigs on a spawned pair, if it has any.
    pub fn link_views(&self, pair: &SpawnedPair, rigs: &mut RigSet) {
        rigs.link_pair(pair.a, pair.b);
    }

    /// Removes the active pair from `anchors`, returning its ids.
    pub fn clear(&mut self, anchors: &mut AnchorSet) -> Option<(AnchorId, AnchorId)> {
        let (a, b) = self.active.take()?;
        anchors.remove(a);
        anchors.remove(b);
        Some((a, b))
    }
}
