//! Scene registry: drawable entities indexed by role
//!
//! Positions are mutated in place by motion controllers. Every mutation is
//! also recorded as a `SceneChange` so the game can forward it to the
//! rendering surface.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Opaque entity identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// What an entity is, which also decides which controller kind may move it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Player-controlled car
    Car,
    /// Ambient traffic
    Npc,
    /// Dashed lane marker
    MovingLine,
    /// Checkered finish-line cell
    FinishSegment,
    /// Static bar at the field edge
    ClosingBar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub role: Role,
    pub pos: Vec2,
}

/// A mutation the rendering surface has not seen yet
#[derive(Debug, Clone, PartialEq)]
pub enum SceneChange {
    Created { id: EntityId, role: Role, pos: Vec2 },
    Moved { id: EntityId, pos: Vec2 },
    Removed { id: EntityId },
}

#[derive(Debug, Default)]
pub struct Scene {
    entities: BTreeMap<EntityId, Entity>,
    by_role: BTreeMap<Role, BTreeSet<EntityId>>,
    changes: Vec<SceneChange>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn spawn(&mut self, role: Role, pos: Vec2) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, Entity { id, role, pos });
        self.by_role.entry(role).or_default().insert(id);
        self.changes.push(SceneChange::Created { id, role, pos });
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.entities.get(&id).map(|e| e.pos)
    }

    pub fn role(&self, id: EntityId) -> Option<Role> {
        self.entities.get(&id).map(|e| e.role)
    }

    pub fn set_position(&mut self, id: EntityId, pos: Vec2) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.pos = pos;
                self.changes.push(SceneChange::Moved { id, pos });
                true
            }
            None => false,
        }
    }

    /// Move an entity by `delta`, returning its new position
    pub fn translate(&mut self, id: EntityId, delta: Vec2) -> Option<Vec2> {
        let entity = self.entities.get_mut(&id)?;
        entity.pos += delta;
        let pos = entity.pos;
        self.changes.push(SceneChange::Moved { id, pos });
        Some(pos)
    }

    /// Change an entity's role, keeping the index in sync
    pub fn retag(&mut self, id: EntityId, role: Role) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        let old = std::mem::replace(&mut entity.role, role);
        if let Some(set) = self.by_role.get_mut(&old) {
            set.remove(&id);
        }
        self.by_role.entry(role).or_default().insert(id);
        true
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(set) = self.by_role.get_mut(&entity.role) {
            set.remove(&id);
        }
        self.changes.push(SceneChange::Removed { id });
        Some(entity)
    }

    /// Entities holding `role`, in id order
    pub fn with_role(&self, role: Role) -> Vec<EntityId> {
        self.by_role
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, role: Role) -> usize {
        self.by_role.get(&role).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Take the changes recorded since the last drain
    pub fn drain_changes(&mut self) -> Vec<SceneChange> {
        std::mem::take(&mut self.changes)
    }
}
