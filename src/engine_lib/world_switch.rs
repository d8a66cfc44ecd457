// src/engine_lib/world_switch.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine_lib::agent::{place_agent, Agent};
use crate::engine_lib::anchor::WorldId;
use crate::engine_lib::camera::{Camera, LayerMask};
use crate::engine_lib::pose::Pose;
use crate::error::{PortalError, PortalResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Replaces every loaded world.
    Single,
    /// Loads alongside the active world.
    Additive,
}

/// Completion notification from a [`WorldLoader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldLoaded {
    pub world: WorldId,
    pub mode: LoadMode,
}

/// Scene-loading primitive. Loads are asynchronous; completions are polled once per frame.
pub trait WorldLoader {
    fn load_world(&mut self, world: WorldId, mode: LoadMode);
    fn current_world_id(&self) -> Option<WorldId>;
    fn is_loaded(&self, world: WorldId) -> bool;
    fn poll_loaded(&mut self) -> Option<WorldLoaded>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// World assumed at startup when the loader cannot report one.
    pub startup_world: WorldId,
    /// Keep the saved pose after applying it, so late-initializing agents still pick it up.
    pub retain_saved_pose: bool,
    /// Viewer visibility mask per world. Worlds without an entry leave the mask untouched.
    pub world_layers: HashMap<WorldId, LayerMask>,
    /// Worlds loaded additively next to the active one.
    pub additive_worlds: Vec<WorldId>,
    /// Active worlds that trigger the additive preload. Empty means every world.
    pub preload_when_active: Vec<WorldId>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            startup_world: WorldId::A,
            retain_saved_pose: false,
            world_layers: HashMap::new(),
            additive_worlds: Vec::new(),
            preload_when_active: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldState {
    pub current_world: WorldId,
    pub last_saved_pose: Option<Pose>,
}

/// Tracks the current world and carries the agent pose across full world reloads.
///
/// Lives in a [`PersistentArena`] so it survives the destruction of the reloaded world.
#[derive(Debug)]
pub struct WorldSwitchCoordinator {
    state: WorldState,
    config: CoordinatorConfig,
    pending: Option<WorldId>,
    running: bool,
}

impl WorldSwitchCoordinator {
    pub fn init(config: CoordinatorConfig, loader: &mut dyn WorldLoader) -> Self {
        let current_world = loader.current_world_id().unwrap_or(config.startup_world);
        let mut coordinator = Self {
            state: WorldState {
                current_world,
                last_saved_pose: None,
            },
            config,
            pending: None,
            running: true,
        };
        log::info!("[WorldSwitch] Active world at startup: {}", current_world);
        coordinator.ensure_additive_worlds(loader);
        coordinator
    }

    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.pending = None;
        self.state.last_saved_pose = None;
        log::info!("[WorldSwitch] Shut down in world {}", self.state.current_world);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_world(&self) -> WorldId {
        self.state.current_world
    }

    pub fn pending_load(&self) -> Option<WorldId> {
        self.pending
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Saves `agent_pose`, flips to the paired world and starts a full load of it.
    pub fn switch_world(
        &mut self,
        agent_pose: Option<Pose>,
        loader: &mut dyn WorldLoader,
    ) -> PortalResult<WorldId> {
        if !self.running {
            log::warn!("[WorldSwitch] switch_world called after shutdown");
            return Err(PortalError::MissingCollaborator("world switch coordinator"));
        }
        let requested = self.state.current_world.paired();
        if let Some(pending) = self.pending {
            log::warn!(
                "[WorldSwitch] Rejecting switch to {}: load of {} still pending",
                requested,
                pending
            );
            return Err(PortalError::ReentrantSwitch { requested, pending });
        }
        let Some(pose) = agent_pose else {
            log::warn!("[WorldSwitch] switch_world called without an agent; ignoring");
            return Err(PortalError::MissingCollaborator("agent"));
        };

        self.state.last_saved_pose = Some(pose);
        self.state.current_world = requested;
        self.pending = Some(requested);
        log::info!("[WorldSwitch] Switching to world {} (saved pose at {})", requested, pose.position);
        loader.load_world(requested, LoadMode::Single);
        Ok(requested)
    }

    /// Handles a load-complete notification.
    pub fn on_world_loaded(&mut self, loaded: WorldLoaded, loader: &mut dyn WorldLoader) {
        match loaded.mode {
            LoadMode::Single => {
                if self.pending == Some(loaded.world) {
                    self.pending = None;
                } else if let Some(pending) = self.pending {
                    log::warn!(
                        "[WorldSwitch] World {} finished loading while {} was pending",
                        loaded.world,
                        pending
                    );
                }
                if self.state.current_world != loaded.world {
                    log::info!("[WorldSwitch] Active world changed to {}", loaded.world);
                }
                self.state.current_world = loaded.world;
                self.ensure_additive_worlds(loader);
            }
            LoadMode::Additive => {
                log::debug!("[WorldSwitch] Additive world {} loaded", loaded.world);
            }
        }
    }

    /// Applies the saved pose to a freshly built agent. Refused while a load is pending.
    pub fn apply_saved_pose(&mut self, agent: &mut dyn Agent) -> bool {
        if self.pending.is_some() {
            log::debug!("[WorldSwitch] Saved pose held until the pending load completes");
            return false;
        }
        let pose = if self.config.retain_saved_pose {
            self.state.last_saved_pose
        } else {
            self.state.last_saved_pose.take()
        };
        match pose {
            Some(pose) => {
                place_agent(agent, pose);
                log::info!("[WorldSwitch] Restored agent pose at {}", pose.position);
                true
            }
            None => false,
        }
    }

    /// Assigns the current world's layer set to the viewer camera, when one is configured.
    pub fn sync_viewer_mask(&self, camera: &mut Camera) -> bool {
        match self.config.world_layers.get(&self.state.current_world) {
            Some(mask) => {
                camera.visibility_mask = *mask;
                true
            }
            None => false,
        }
    }

    pub fn ensure_additive_worlds(&mut self, loader: &mut dyn WorldLoader) {
        if self.config.additive_worlds.is_empty() {
            return;
        }
        let active = self.state.current_world;
        if !self.config.preload_when_active.is_empty()
            && !self.config.preload_when_active.contains(&active)
        {
            return;
        }
        for &world in &self.config.additive_worlds {
            if world == active || loader.is_loaded(world) {
                continue;
            }
            log::info!("[WorldSwitch] Loading additive world {}...", world);
            loader.load_world(world, LoadMode::Additive);
        }
    }
}

/// State that outlives world reloads. Holds at most one coordinator.
#[derive(Debug, Default)]
pub struct PersistentArena {
    coordinator: Option<WorldSwitchCoordinator>,
}

impl PersistentArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `candidate` unless a coordinator already survives, in which case the
    /// candidate is discarded and the survivor returned.
    pub fn adopt(&mut self, candidate: WorldSwitchCoordinator) -> &mut WorldSwitchCoordinator {
        if self.coordinator.is_some() {
            log::debug!("[WorldSwitch] Discarding duplicate coordinator");
        }
        self.coordinator.get_or_insert(candidate)
    }

    pub fn coordinator(&self) -> Option<&WorldSwitchCoordinator> {
        self.coordinator.as_ref()
    }

    pub fn coordinator_mut(&mut self) -> Option<&mut WorldSwitchCoordinator> {
        self.coordinator.as_mut()
    }

    pub fn shutdown(&mut self) {
        if let Some(mut coordinator) = self.coordinator.take() {
            coordinator.shutdown();
        }
    }
}
