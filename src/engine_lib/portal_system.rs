// src/engine_lib/portal_system.rs

use std::collections::BTreeMap;

use glam::Vec3;

use crate::engine_lib::agent::Agent;
use crate::engine_lib::anchor::{AnchorId, AnchorSet, WorldId};
use crate::engine_lib::camera::Camera;
use crate::engine_lib::pose::Pose;
use crate::engine_lib::spawner::{PortalPairSpawner, SpawnedPair, SpawnerConfig};
use crate::engine_lib::trigger::{PortalTrigger, TriggerConfig, TriggerContext, TriggerOutcome};
use crate::engine_lib::world::World;
use crate::engine_lib::world_switch::{WorldLoader, WorldSwitchCoordinator};
use crate::error::PortalResult;
use crate::rendering_lib::portal_rig::{PortalCameraRig, PoseMode, RigConfig, RigRender, RigSet};
use crate::rendering_lib::render_target::{RenderTargetFactory, RenderTargetHandle};

/// Portal surface to draw in the viewer pass.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceQuad {
    pub anchor: AnchorId,
    /// Top-left, top-right, bottom-right, bottom-left as seen from the front.
    pub corners: [Vec3; 4],
    /// Rig target shown on the surface. `None` for portals without a view.
    pub target: Option<RenderTargetHandle>,
    /// Sample the target at screen coordinates instead of stretching it over the quad.
    /// Set for viewer-relative rigs, whose camera shares the viewer's lens.
    pub screen_mapped: bool,
}

/// Owns the anchors, triggers and rigs of the loaded world.
///
/// Frame order: move the agent, then [`PortalSystem::run_triggers`], then
/// [`PortalSystem::sync_rigs`] once the viewer pose is final, then render.
#[derive(Debug)]
pub struct PortalSystem {
    anchors: AnchorSet,
    triggers: BTreeMap<AnchorId, PortalTrigger>,
    rigs: RigSet,
    spawner: PortalPairSpawner,
    trigger_template: TriggerConfig,
    rig_config: RigConfig,
}

impl PortalSystem {
    pub fn new(trigger_template: TriggerConfig, rig_config: RigConfig, spawner: SpawnerConfig) -> Self {
        Self {
            anchors: AnchorSet::new(),
            triggers: BTreeMap::new(),
            rigs: RigSet::new(),
            spawner: PortalPairSpawner::new(spawner),
            trigger_template,
            rig_config,
        }
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn rigs(&self) -> &RigSet {
        &self.rigs
    }

    pub fn trigger(&self, anchor: AnchorId) -> Option<&PortalTrigger> {
        self.triggers.get(&anchor)
    }

    pub fn spawner(&self) -> &PortalPairSpawner {
        &self.spawner
    }

    pub fn rig_config(&self) -> &RigConfig {
        &self.rig_config
    }

    /// Adds one anchor with an optional trigger and optional view.
    pub fn add_portal(
        &mut self,
        name: &str,
        pose: Pose,
        world: Option<WorldId>,
        trigger: Option<TriggerConfig>,
        view: Option<PoseMode>,
        factory: &mut dyn RenderTargetFactory,
    ) -> PortalResult<AnchorId> {
        let id = self.anchors.insert(name, pose, world);
        if let Some(config) = trigger {
            self.triggers.insert(id, PortalTrigger::new(id, config));
        }
        if let Some(mode) = view {
            let rig = PortalCameraRig::new(id, mode, self.rig_config.target.as_ref(), factory)?;
            self.rigs.insert(rig, factory);
        }
        Ok(id)
    }

    pub fn link(&mut self, a: AnchorId, b: AnchorId) -> PortalResult<()> {
        self.anchors.link_pair(a, b)?;
        self.rigs.link_pair(a, b);
        Ok(())
    }

    /// Replaces everything with the portals of `world`.
    pub fn install_world(&mut self, world: &World, factory: &mut dyn RenderTargetFactory) -> PortalResult<()> {
        self.clear(factory);

        let mut ids = Vec::with_capacity(world.portals.len());
        for spec in &world.portals {
            let id = self.add_portal(&spec.name, spec.pose, spec.world, spec.trigger.clone(), spec.view, factory)?;
            if let Some(anchor) = self.anchors.get_mut(id) {
                anchor.surface_half_extents = spec.half_extents;
            }
            ids.push(id);
        }
        for (index, spec) in world.portals.iter().enumerate() {
            if let Some(&other) = spec.link.and_then(|link| ids.get(link)) {
                self.link(ids[index], other)?;
            }
        }
        log::info!(
            "[PortalSystem] Installed {} portals ({} views) for world '{}'",
            self.anchors.len(),
            self.rigs.len(),
            world.name
        );
        Ok(())
    }

    pub fn clear(&mut self, factory: &mut dyn RenderTargetFactory) {
        self.spawner.clear(&mut self.anchors);
        self.rigs.release_all(factory);
        self.triggers.clear();
        self.anchors.clear();
    }

    /// Spawns a linked pair in front of the agent, replacing the previous one.
    pub fn spawn_pair(&mut self, agent: &Pose, factory: &mut dyn RenderTargetFactory) -> PortalResult<SpawnedPair> {
        let pair = self.spawner.spawn(agent, &mut self.anchors)?;
        if let Some((old_a, old_b)) = pair.replaced {
            for old in [old_a, old_b] {
                self.triggers.remove(&old);
                self.rigs.remove(old, factory);
            }
        }

        // Both views exist before anything of the pair is registered.
        let views = match self.allocate_pair_views(&pair, factory) {
            Ok(views) => views,
            Err(err) => {
                self.spawner.clear(&mut self.anchors);
                log::warn!("[PortalSystem] Spawned pair {} / {} rolled back: {}", pair.a, pair.b, err);
                return Err(err);
            }
        };
        for rig in views {
            let id = rig.anchor();
            self.triggers.insert(id, PortalTrigger::new(id, self.trigger_template.clone()));
            self.rigs.insert(rig, factory);
        }
        self.spawner.link_views(&pair, &mut self.rigs);
        Ok(pair)
    }

    fn allocate_pair_views(
        &self,
        pair: &SpawnedPair,
        factory: &mut dyn RenderTargetFactory,
    ) -> PortalResult<[PortalCameraRig; 2]> {
        let mode = self.rig_config.mode;
        let template = self.rig_config.target.as_ref();
        let mut first = PortalCameraRig::new(pair.a, mode, template, factory)?;
        match PortalCameraRig::new(pair.b, mode, template, factory) {
            Ok(second) => Ok([first, second]),
            Err(err) => {
                first.release(factory);
                Err(err)
            }
        }
    }

    /// Stage 2: proximity checks. At most one trigger fires per frame.
    pub fn run_triggers(
        &mut self,
        agent: &mut dyn Agent,
        mut coordinator: Option<&mut WorldSwitchCoordinator>,
        loader: &mut dyn WorldLoader,
    ) -> TriggerOutcome {
        let mut result = TriggerOutcome::Outside;
        for trigger in self.triggers.values() {
            let destination_radius = self
                .anchors
                .get(trigger.anchor)
                .and_then(|anchor| anchor.linked())
                .and_then(|linked| self.triggers.get(&linked))
                .map(|destination| destination.config.trigger_radius);

            let mut ctx = TriggerContext {
                anchors: &self.anchors,
                destination_radius,
                agent: &mut *agent,
                coordinator: coordinator.as_deref_mut(),
                loader: &mut *loader,
            };
            let outcome = trigger.check(&mut ctx);
            if outcome.fired() {
                return outcome;
            }
            if outcome != TriggerOutcome::Outside {
                result = outcome;
            }
        }
        result
    }

    /// Stage 3: pose every rig from the finalized viewer camera.
    pub fn sync_rigs(&mut self, viewer: Option<&Camera>) -> Vec<RigRender> {
        self.rigs.sync_all(&self.anchors, viewer)
    }

    /// Stage 4 input: one quad per anchor in the loaded world.
    pub fn surfaces(&self) -> Vec<SurfaceQuad> {
        self.anchors
            .iter()
            .filter(|anchor| anchor.world.is_none())
            .map(|anchor| {
                let right = anchor.pose.right() * anchor.surface_half_extents.x;
                let up = anchor.pose.up() * anchor.surface_half_extents.y;
                let center = anchor.pose.position;
                let rig = self.rigs.get(anchor.id).filter(|rig| rig.is_enabled());
                // Seen from the front the anchor's right axis points left.
                SurfaceQuad {
                    anchor: anchor.id,
                    corners: [center + up + right, center + up - right, center - up - right, center - up + right],
                    target: rig.and_then(|rig| rig.target()),
                    screen_mapped: rig.is_some_and(|rig| matches!(rig.mode(), PoseMode::ViewerRelative { .. })),
                }
            })
            .collect()
    }
}
