// src/engine_lib/world.rs

use glam::{Vec2, Vec3};

use crate::engine_lib::anchor::{WorldId, DEFAULT_SURFACE_HALF_EXTENTS};
use crate::engine_lib::pose::Pose;
use crate::engine_lib::trigger::TriggerConfig;
use crate::rendering_lib::portal_rig::PoseMode;

#[derive(Clone, Debug, PartialEq)]
pub struct WorldQuad {
    pub corners: [Vec3; 4],
    pub color: [f32; 4],
    pub layer: u8,
}

/// Axis-aligned walkable rectangle (xz extents) at a fixed height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloorPatch {
    pub min: Vec2,
    pub max: Vec2,
    pub height: f32,
}

impl FloorPatch {
    pub fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.y && p.z <= self.max.y
    }
}

/// Portal placed by world content. `link` indexes into the same world's portal list.
#[derive(Clone, Debug, PartialEq)]
pub struct PortalSpec {
    pub name: String,
    pub pose: Pose,
    pub world: Option<WorldId>,
    pub link: Option<usize>,
    pub trigger: Option<TriggerConfig>,
    pub view: Option<PoseMode>,
    pub half_extents: Vec2,
}

impl PortalSpec {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
            world: None,
            link: None,
            trigger: None,
            view: None,
            half_extents: DEFAULT_SURFACE_HALF_EXTENTS,
        }
    }
}

/// Everything a world load instantiates.
#[derive(Clone, Debug)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    pub quads: Vec<WorldQuad>,
    pub floors: Vec<FloorPatch>,
    pub portals: Vec<PortalSpec>,
    pub spawn: Pose,
}

impl World {
    /// Highest floor under `p` that is at most `step` above it.
    pub fn floor_below(&self, p: Vec3, step: f32) -> Option<f32> {
        self.floors
            .iter()
            .filter(|floor| floor.contains_xz(p) && floor.height <= p.y + step)
            .map(|floor| floor.height)
            .reduce(f32::max)
    }

    /// Shifts all geometry by `offset`. Used for worlds loaded next to the active one.
    pub fn offset_by(mut self, offset: Vec3) -> World {
        for quad in &mut self.quads {
            for corner in &mut quad.corners {
                *corner += offset;
            }
        }
        for floor in &mut self.floors {
            floor.min += Vec2::new(offset.x, offset.z);
            floor.max += Vec2::new(offset.x, offset.z);
            floor.height += offset.y;
        }
        for portal in &mut self.portals {
            portal.pose = portal.pose.translated(offset);
        }
        self.spawn = self.spawn.translated(offset);
        self
    }

    /// Adds the quads and floors of an additively loaded world. Portals and spawn stay ours.
    pub fn merge_geometry(&mut self, other: &World) {
        self.quads.extend(other.quads.iter().cloned());
        self.floors.extend(other.floors.iter().copied());
    }
}
