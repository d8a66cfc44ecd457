// src/engine_lib/anchor.rs

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::engine_lib::pose::Pose;
use crate::error::{PortalError, PortalResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorId(pub u32);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a persistent world. Worlds come in a current/other pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorldId {
    A,
    B,
}

impl WorldId {
    pub const ALL: [WorldId; 2] = [WorldId::A, WorldId::B];

    pub fn paired(self) -> WorldId {
        match self {
            WorldId::A => WorldId::B,
            WorldId::B => WorldId::A,
        }
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldId::A => f.write_str("A"),
            WorldId::B => f.write_str("B"),
        }
    }
}

pub const DEFAULT_SURFACE_HALF_EXTENTS: Vec2 = Vec2::new(0.75, 1.1);

/// One portal endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Anchor {
    pub id: AnchorId,
    pub name: String,
    pub pose: Pose,
    linked: Option<AnchorId>,
    /// Set only for anchors that stand for an endpoint in another world.
    pub world: Option<WorldId>,
    /// Half width/height of the visible portal surface.
    pub surface_half_extents: Vec2,
}

impl Anchor {
    pub fn linked(&self) -> Option<AnchorId> {
        self.linked
    }
}

/// Owns every anchor of the loaded world and is the only place links are written.
#[derive(Debug, Default)]
pub struct AnchorSet {
    anchors: BTreeMap<AnchorId, Anchor>,
    next_id: u32,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, pose: Pose, world: Option<WorldId>) -> AnchorId {
        let id = AnchorId(self.next_id);
        self.next_id += 1;
        self.anchors.insert(
            id,
            Anchor {
                id,
                name: name.into(),
                pose,
                linked: None,
                world,
                surface_half_extents: DEFAULT_SURFACE_HALF_EXTENTS,
            },
        );
        id
    }

    pub fn get(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: AnchorId) -> Option<&mut Anchor> {
        self.anchors.get_mut(&id)
    }

    /// The anchor `id` links to, if both exist.
    pub fn linked(&self, id: AnchorId) -> Option<&Anchor> {
        self.get(id)?.linked.and_then(|other| self.get(other))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Links `a` and `b` to each other. Any previous partner of either side is unlinked
    /// so the relation stays symmetric.
    pub fn link_pair(&mut self, a: AnchorId, b: AnchorId) -> PortalResult<()> {
        if !self.anchors.contains_key(&a) {
            return Err(PortalError::UnknownAnchor(a));
        }
        if !self.anchors.contains_key(&b) {
            return Err(PortalError::UnknownAnchor(b));
        }
        self.unlink(a);
        self.unlink(b);
        if let Some(anchor) = self.anchors.get_mut(&a) {
            anchor.linked = Some(b);
        }
        if let Some(anchor) = self.anchors.get_mut(&b) {
            anchor.linked = Some(a);
        }
        Ok(())
    }

    /// Breaks the link of `id` on both sides.
    pub fn unlink(&mut self, id: AnchorId) {
        let partner = match self.anchors.get_mut(&id) {
            Some(anchor) => anchor.linked.take(),
            None => return,
        };
        if let Some(partner) = partner.and_then(|p| self.anchors.get_mut(&p)) {
            if partner.linked == Some(id) {
                partner.linked = None;
            }
        }
    }

    pub fn remove(&mut self, id: AnchorId) -> Option<Anchor> {
        self.unlink(id);
        self.anchors.remove(&id)
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn set_with(n: usize) -> (AnchorSet, Vec<AnchorId>) {
        let mut set = AnchorSet::new();
        let ids = (0..n)
            .map(|i| set.insert(format!("a{i}"), Pose::from_position(Vec3::X * i as f32), None))
            .collect();
        (set, ids)
    }

    #[test]
    fn link_pair_is_symmetric() {
        let (mut set, ids) = set_with(2);
        set.link_pair(ids[0], ids[1]).unwrap();
        assert_eq!(set.get(ids[0]).unwrap().linked(), Some(ids[1]));
        assert_eq!(set.get(ids[1]).unwrap().linked(), Some(ids[0]));
        assert_eq!(set.linked(ids[0]).unwrap().id, ids[1]);
    }

    #[test]
    fn relinking_breaks_old_partner() {
        let (mut set, ids) = set_with(3);
        set.link_pair(ids[0], ids[1]).unwrap();
        set.link_pair(ids[0], ids[2]).unwrap();
        assert_eq!(set.get(ids[1]).unwrap().linked(), None);
        assert_eq!(set.get(ids[2]).unwrap().linked(), Some(ids[0]));
    }

    #[test]
    fn remove_clears_back_reference() {
        let (mut set, ids) = set_with(2);
        set.link_pair(ids[0], ids[1]).unwrap();
        set.remove(ids[1]);
        assert_eq!(set.get(ids[0]).unwrap().linked(), None);
        assert!(set.linked(ids[0]).is_none());
    }

    #[test]
    fn ids_are_not_reused() {
        let (mut set, ids) = set_with(1);
        set.remove(ids[0]);
        let fresh = set.insert("again", Pose::IDENTITY, None);
        assert_ne!(fresh, ids[0]);
    }

    #[test]
    fn linking_unknown_anchor_fails() {
        let (mut set, ids) = set_with(1);
        let err = set.link_pair(ids[0], AnchorId(99)).unwrap_err();
        assert!(matches!(err, PortalError::UnknownAnchor(AnchorId(99))));
    }
}
