// src/engine_lib/agent.rs

use glam::Vec3;

use crate::engine_lib::pose::Pose;

/// The moving agent as seen by the portal subsystem. Locomotion lives elsewhere;
/// this is only what traversal reads and writes.
pub trait Agent {
    /// Root frame of the agent (ground-level origin).
    fn pose(&self) -> Pose;

    /// Center of the collision volume. Proximity checks use this, not the root origin.
    fn probe_point(&self) -> Vec3;

    /// Tag/category used by trigger filters.
    fn tag(&self) -> &str;

    fn set_collision_enabled(&mut self, enabled: bool);

    /// Direct root-frame write. Callers go through [`place_agent`].
    fn write_pose(&mut self, pose: Pose);
}

/// Writes `pose` with collision resolution suspended around the write.
pub fn place_agent(agent: &mut dyn Agent, pose: Pose) {
    agent.set_collision_enabled(false);
    agent.write_pose(pose);
    agent.set_collision_enabled(true);
}
