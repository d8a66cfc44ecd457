// src/engine_lib/mod.rs

pub mod agent;
pub mod anchor;
pub mod camera;
pub mod controller;
pub mod player;
pub mod portal_system;
pub mod pose;
pub mod spawner;
pub mod trigger;
pub mod world;
pub mod world_switch;

pub use anchor::{Anchor, AnchorId, AnchorSet, WorldId};
pub use camera::Camera;
pub use pose::Pose;
pub use portal_system::PortalSystem;
