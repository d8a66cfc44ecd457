// src/engine_lib/trigger.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::engine_lib::agent::{place_agent, Agent};
use crate::engine_lib::anchor::{Anchor, AnchorId, AnchorSet, WorldId};
use crate::engine_lib::pose::Pose;
use crate::engine_lib::world_switch::{WorldLoader, WorldSwitchCoordinator};

/// Extra clearance past the destination's trigger radius.
pub const EXIT_EPSILON: f32 = 0.05;

/// Where the agent reappears after a cross-world switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossWorldExit {
    /// In front of the linked anchor, like an in-place teleport.
    #[default]
    LinkedAnchor,
    /// Same coordinates the agent had when entering; for aligned world copies.
    SameCoordinates,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub trigger_radius: f32,
    pub exit_offset: f32,
    /// Only agents with this tag may trigger. `None` or empty accepts everyone.
    pub allowed_tag: Option<String>,
    pub cross_world_exit: CrossWorldExit,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_radius: 1.0,
            exit_offset: 1.5,
            allowed_tag: Some("Player".to_string()),
            cross_world_exit: CrossWorldExit::LinkedAnchor,
        }
    }
}

impl TriggerConfig {
    pub fn accepts(&self, tag: &str) -> bool {
        match self.allowed_tag.as_deref() {
            None | Some("") => true,
            Some(allowed) => allowed == tag,
        }
    }
}

/// Distance in front of the destination anchor that keeps the agent outside its trigger volume.
pub fn safe_exit_offset(exit_offset: f32, destination_radius: f32) -> f32 {
    exit_offset.max(destination_radius + EXIT_EPSILON)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriggerOutcome {
    /// Agent is not inside the trigger volume.
    Outside,
    /// Agent is inside but its tag is not accepted.
    Filtered,
    /// Agent is inside but the anchor has no linked anchor.
    Inert,
    /// Agent was moved in place.
    Teleported(Pose),
    /// A world switch was started.
    SwitchRequested(WorldId),
    /// The teleport was refused by a collaborator (or one was missing); nothing moved.
    Absorbed,
}

impl TriggerOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, TriggerOutcome::Teleported(_) | TriggerOutcome::SwitchRequested(_))
    }
}

pub struct TriggerContext<'a> {
    pub anchors: &'a AnchorSet,
    /// Trigger radius of the destination anchor, if it has a trigger.
    pub destination_radius: Option<f32>,
    pub agent: &'a mut dyn Agent,
    pub coordinator: Option<&'a mut WorldSwitchCoordinator>,
    pub loader: &'a mut dyn WorldLoader,
}

/// Proximity trigger attached to one anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct PortalTrigger {
    pub anchor: AnchorId,
    pub config: TriggerConfig,
}

impl PortalTrigger {
    pub fn new(anchor: AnchorId, config: TriggerConfig) -> Self {
        Self { anchor, config }
    }

    pub fn contains(&self, anchor: &Anchor, probe: Vec3) -> bool {
        let r = self.config.trigger_radius;
        probe.distance_squared(anchor.pose.position) <= r * r
    }

    pub fn exit_pose(&self, destination: &Anchor, destination_radius: f32) -> Pose {
        let offset = safe_exit_offset(self.config.exit_offset, destination_radius);
        Pose::new(
            destination.pose.position + destination.pose.forward() * offset,
            destination.pose.orientation,
        )
    }

    pub fn check(&self, ctx: &mut TriggerContext) -> TriggerOutcome {
        let anchors = ctx.anchors;
        let Some(anchor) = anchors.get(self.anchor) else {
            return TriggerOutcome::Outside;
        };
        if !self.contains(anchor, ctx.agent.probe_point()) {
            return TriggerOutcome::Outside;
        }
        if !self.config.accepts(ctx.agent.tag()) {
            return TriggerOutcome::Filtered;
        }
        let Some(destination) = anchors.linked(self.anchor) else {
            log::debug!("[Trigger] {} '{}' entered but not linked", anchor.id, anchor.name);
            return TriggerOutcome::Inert;
        };

        let destination_radius = ctx.destination_radius.unwrap_or(self.config.trigger_radius);
        let exit = self.exit_pose(destination, destination_radius);

        let Some(target_world) = destination.world else {
            place_agent(ctx.agent, exit);
            log::info!("[Trigger] {} -> {} teleported agent to {}", anchor.id, destination.id, exit.position);
            return TriggerOutcome::Teleported(exit);
        };

        let Some(coordinator) = ctx.coordinator.as_deref_mut() else {
            log::warn!("[Trigger] {} leads to world {} but no coordinator is present", anchor.id, target_world);
            return TriggerOutcome::Absorbed;
        };
        // Nothing writes the agent between saving its pose and the load completing.
        if let Some(pending) = coordinator.pending_load() {
            log::warn!(
                "[Trigger] {} entered while load of world {} is pending; ignoring",
                anchor.id,
                pending
            );
            return TriggerOutcome::Absorbed;
        }
        if coordinator.current_world() == target_world {
            place_agent(ctx.agent, exit);
            return TriggerOutcome::Teleported(exit);
        }

        let saved = match self.config.cross_world_exit {
            CrossWorldExit::LinkedAnchor => exit,
            CrossWorldExit::SameCoordinates => ctx.agent.pose(),
        };
        match coordinator.switch_world(Some(saved), ctx.loader) {
            Ok(world) => TriggerOutcome::SwitchRequested(world),
            Err(err) => {
                log::warn!("[Trigger] {}: {}", anchor.id, err);
                TriggerOutcome::Absorbed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_offset_clears_destination_radius() {
        assert_eq!(safe_exit_offset(3.0, 1.0), 3.0);
        assert!(safe_exit_offset(0.2, 1.0) > 1.0);
        assert!(safe_exit_offset(1.0, 1.0) > 1.0);
    }

    #[test]
    fn tag_filter() {
        let mut config = TriggerConfig::default();
        assert!(config.accepts("Player"));
        assert!(!config.accepts("Crate"));

        config.allowed_tag = Some(String::new());
        assert!(config.accepts("Crate"));

        config.allowed_tag = None;
        assert!(config.accepts("anything"));
    }
}
