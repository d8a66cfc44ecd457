// src/demo_scene.rs

use std::collections::{BTreeSet, HashMap};
use std::f32::consts::{FRAC_PI_2, PI};
use std::time::Duration;

use glam::{Quat, Vec2, Vec3};
use tokio::sync::mpsc;

use crate::engine_lib::anchor::WorldId;
use crate::engine_lib::pose::Pose;
use crate::engine_lib::trigger::TriggerConfig;
use crate::engine_lib::world::{FloorPatch, PortalSpec, World, WorldQuad};
use crate::engine_lib::world_switch::{LoadMode, WorldLoaded, WorldLoader};

const WALL_HEIGHT: f32 = 4.0;

struct Palette {
    floor: [f32; 4],
    walls: [[f32; 4]; 4],
    pillar: [f32; 4],
}

const PALETTE_A: Palette = Palette {
    floor: [0.25, 0.45, 0.25, 1.0],
    walls: [[0.3, 0.3, 0.8, 1.0], [0.8, 0.8, 0.3, 1.0], [0.9, 0.9, 0.9, 1.0], [0.5, 0.5, 0.5, 1.0]],
    pillar: [0.9, 0.5, 0.2, 1.0],
};

const PALETTE_B: Palette = Palette {
    floor: [0.45, 0.2, 0.2, 1.0],
    walls: [[0.2, 0.6, 0.6, 1.0], [0.6, 0.2, 0.6, 1.0], [0.15, 0.15, 0.2, 1.0], [0.7, 0.65, 0.55, 1.0]],
    pillar: [0.3, 0.8, 0.4, 1.0],
};

/// Render layer of a world's geometry.
pub fn world_layer(id: WorldId) -> u8 {
    match id {
        WorldId::A => 0,
        WorldId::B => 1,
    }
}

fn floor_quad(min: Vec2, max: Vec2, height: f32, color: [f32; 4], layer: u8) -> WorldQuad {
    WorldQuad {
        corners: [
            Vec3::new(min.x, height, min.y),
            Vec3::new(max.x, height, min.y),
            Vec3::new(max.x, height, max.y),
            Vec3::new(min.x, height, max.y),
        ],
        color,
        layer,
    }
}

// Vertical quad along the ground segment a -> b.
fn wall(a: Vec2, b: Vec2, bottom: f32, top: f32, color: [f32; 4], layer: u8) -> WorldQuad {
    WorldQuad {
        corners: [
            Vec3::new(a.x, bottom, a.y),
            Vec3::new(b.x, bottom, b.y),
            Vec3::new(b.x, top, b.y),
            Vec3::new(a.x, top, a.y),
        ],
        color,
        layer,
    }
}

fn pillar(center: Vec2, half: f32, height: f32, color: [f32; 4], layer: u8) -> [WorldQuad; 4] {
    let c = [
        center + Vec2::new(-half, -half),
        center + Vec2::new(half, -half),
        center + Vec2::new(half, half),
        center + Vec2::new(-half, half),
    ];
    [0, 1, 2, 3].map(|i| wall(c[i], c[(i + 1) % 4], 0.0, height, color, layer))
}

fn room(id: WorldId, name: &str, half_size: f32, palette: &Palette, pillars: &[Vec2], spawn: Pose) -> World {
    let layer = world_layer(id);
    let min = Vec2::splat(-half_size);
    let max = Vec2::splat(half_size);
    let corners = [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)];

    let mut quads = vec![floor_quad(min, max, 0.0, palette.floor, layer)];
    for i in 0..4 {
        quads.push(wall(corners[i], corners[(i + 1) % 4], 0.0, WALL_HEIGHT, palette.walls[i], layer));
    }
    for &center in pillars {
        quads.extend(pillar(center, 0.4, WALL_HEIGHT * 0.75, palette.pillar, layer));
    }

    World {
        id,
        name: name.to_string(),
        quads,
        floors: vec![FloorPatch { min, max, height: 0.0 }],
        portals: Vec::new(),
        spawn,
    }
}

fn gate_pose(id: WorldId) -> Pose {
    match id {
        // Faces +Z, back against the far wall.
        WorldId::A => Pose::new(Vec3::new(0.0, 1.1, -9.0), Quat::from_rotation_y(PI)),
        // Faces +X.
        WorldId::B => Pose::new(Vec3::new(-11.0, 1.1, 0.0), Quat::from_rotation_y(-FRAC_PI_2)),
    }
}

/// Builds one demo world. Each world has a fixed gate into the other world, linked to a
/// record of the other world's gate.
pub fn build_world(id: WorldId, trigger: &TriggerConfig) -> World {
    let mut world = match id {
        WorldId::A => room(
            id,
            "Courtyard",
            10.0,
            &PALETTE_A,
            &[Vec2::new(-4.0, -3.0), Vec2::new(4.0, -3.0), Vec2::new(-4.0, 3.0), Vec2::new(4.0, 3.0)],
            Pose::new(Vec3::new(0.0, 0.0, 5.0), Quat::IDENTITY),
        ),
        WorldId::B => room(
            id,
            "Hall",
            12.0,
            &PALETTE_B,
            &[Vec2::new(0.0, -6.0), Vec2::new(0.0, 6.0), Vec2::new(6.0, 0.0)],
            Pose::new(Vec3::new(0.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2)),
        ),
    };

    let other = id.paired();
    let mut gate = PortalSpec::new(format!("gate_to_{}", other), gate_pose(id));
    gate.trigger = Some(trigger.clone());
    gate.link = Some(1);

    let mut record = PortalSpec::new(format!("gate_of_{}", other), gate_pose(other));
    record.world = Some(other);
    record.link = Some(0);

    world.portals = vec![gate, record];
    world
}

struct Completed {
    loaded: WorldLoaded,
    generation: u64,
    world: World,
}

/// Builds demo worlds on the tokio runtime. Completions arrive through a channel and are
/// drained by [`WorldLoader::poll_loaded`]; the built world is then picked up with
/// [`AsyncWorldLoader::take_world`].
///
/// Additive loads are shifted by `world_offset` so they sit in their own region. A single
/// load supersedes everything requested before it; additive requests made while it is in
/// flight are deferred until it completes.
pub struct AsyncWorldLoader {
    runtime: tokio::runtime::Handle,
    tx: mpsc::UnboundedSender<Completed>,
    rx: mpsc::UnboundedReceiver<Completed>,
    trigger: TriggerConfig,
    world_offset: Vec3,
    load_delay: Duration,
    generation: u64,
    current: Option<WorldId>,
    single_in_flight: Option<WorldId>,
    additive_in_flight: BTreeSet<WorldId>,
    deferred_additive: Vec<WorldId>,
    loaded: BTreeSet<WorldId>,
    ready: HashMap<WorldId, World>,
}

impl AsyncWorldLoader {
    pub fn new(runtime: tokio::runtime::Handle, trigger: TriggerConfig, world_offset: Vec3) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            tx,
            rx,
            trigger,
            world_offset,
            load_delay: Duration::ZERO,
            generation: 0,
            current: None,
            single_in_flight: None,
            additive_in_flight: BTreeSet::new(),
            deferred_additive: Vec::new(),
            loaded: BTreeSet::new(),
            ready: HashMap::new(),
        }
    }

    /// Artificial latency before each world is built.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// World built by the load just reported by `poll_loaded`.
    pub fn take_world(&mut self, world: WorldId) -> Option<World> {
        self.ready.remove(&world)
    }

    fn spawn_load(&self, world: WorldId, mode: LoadMode) {
        let tx = self.tx.clone();
        let trigger = self.trigger.clone();
        let offset = self.world_offset;
        let delay = self.load_delay;
        let generation = self.generation;

        self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let built = build_world(world, &trigger);
            let built = match mode {
                LoadMode::Single => built,
                LoadMode::Additive => built.offset_by(offset),
            };
            let done = Completed {
                loaded: WorldLoaded { world, mode },
                generation,
                world: built,
            };
            if tx.send(done).is_err() {
                log::debug!("[Loader] Receiver gone; dropping load of {}", world);
            }
        });
    }
}

impl WorldLoader for AsyncWorldLoader {
    fn load_world(&mut self, world: WorldId, mode: LoadMode) {
        match mode {
            LoadMode::Single => {
                self.generation += 1;
                self.single_in_flight = Some(world);
                self.additive_in_flight.clear();
                self.deferred_additive.clear();
                log::info!("[Loader] Loading world {}...", world);
                self.spawn_load(world, mode);
            }
            LoadMode::Additive if self.single_in_flight.is_some() => {
                if !self.deferred_additive.contains(&world) {
                    self.deferred_additive.push(world);
                }
            }
            LoadMode::Additive => {
                self.additive_in_flight.insert(world);
                self.spawn_load(world, mode);
            }
        }
    }

    fn current_world_id(&self) -> Option<WorldId> {
        self.current
    }

    /// Loaded, or already on its way.
    fn is_loaded(&self, world: WorldId) -> bool {
        self.loaded.contains(&world)
            || self.single_in_flight == Some(world)
            || self.additive_in_flight.contains(&world)
            || self.deferred_additive.contains(&world)
    }

    fn poll_loaded(&mut self) -> Option<WorldLoaded> {
        while let Ok(done) = self.rx.try_recv() {
            if done.generation != self.generation {
                log::debug!("[Loader] Discarding superseded load of {}", done.loaded.world);
                continue;
            }
            let world = done.loaded.world;
            match done.loaded.mode {
                LoadMode::Single => {
                    self.single_in_flight = None;
                    self.current = Some(world);
                    self.loaded.clear();
                    self.ready.clear();
                    self.loaded.insert(world);
                    for additive in std::mem::take(&mut self.deferred_additive) {
                        if additive != world {
                            self.additive_in_flight.insert(additive);
                            self.spawn_load(additive, LoadMode::Additive);
                        }
                    }
                }
                LoadMode::Additive => {
                    self.additive_in_flight.remove(&world);
                    if self.current == Some(world) {
                        continue;
                    }
                    self.loaded.insert(world);
                }
            }
            self.ready.insert(world, done.world);
            return Some(done.loaded);
        }
        None
    }
}
