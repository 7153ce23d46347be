use std::collections::HashMap;

use crate::components::{
    Attributes, ComponentBounds, Extrusion, FeatureKey, Footprint, Visibility,
};
use crate::entity::EntityId;

/// Column store for map features.
///
/// Every column is indexed by `EntityId::index()`. Entities are never despawned;
/// a reload builds a fresh `World`.
#[derive(Debug, Default)]
pub struct World {
    next_index: u32,
    keys: Vec<Option<FeatureKey>>,
    attributes: Vec<Option<Attributes>>,
    footprints: Vec<Option<Footprint>>,
    extrusions: Vec<Option<Extrusion>>,
    bounds: Vec<Option<ComponentBounds>>,
    visibility: Vec<Option<Visibility>>,
    by_key: HashMap<FeatureKey, EntityId>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId::from_index(self.next_index);
        self.next_index += 1;
        self.ensure_capacity(id.index() as usize);
        id
    }

    /// Number of spawned entities.
    pub fn len(&self) -> usize {
        self.next_index as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Assigns the renderer-facing identity of `entity`.
    ///
    /// Returns `false` (and leaves the world unchanged) if another entity
    /// already owns `key`.
    pub fn set_feature(&mut self, entity: EntityId, key: FeatureKey) -> bool {
        if let Some(owner) = self.by_key.get(&key)
            && *owner != entity
        {
            return false;
        }
        self.ensure_capacity(entity.index() as usize);
        let slot = &mut self.keys[entity.index() as usize];
        if let Some(old) = slot.take() {
            self.by_key.remove(&old);
        }
        self.by_key.insert(key.clone(), entity);
        *slot = Some(key);
        true
    }

    pub fn feature(&self, entity: EntityId) -> Option<&FeatureKey> {
        self.keys.get(entity.index() as usize).and_then(Option::as_ref)
    }

    pub fn entity_for_key(&self, key: &FeatureKey) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    pub fn set_attributes(&mut self, entity: EntityId, attributes: Attributes) {
        self.ensure_capacity(entity.index() as usize);
        self.attributes[entity.index() as usize] = Some(attributes);
    }

    pub fn attributes(&self, entity: EntityId) -> Option<&Attributes> {
        self.attributes
            .get(entity.index() as usize)
            .and_then(Option::as_ref)
    }

    pub fn set_footprint(&mut self, entity: EntityId, footprint: Footprint) {
        self.ensure_capacity(entity.index() as usize);
        self.footprints[entity.index() as usize] = Some(footprint);
    }

    pub fn footprint(&self, entity: EntityId) -> Option<&Footprint> {
        self.footprints
            .get(entity.index() as usize)
            .and_then(Option::as_ref)
    }

    pub fn set_extrusion(&mut self, entity: EntityId, extrusion: Extrusion) {
        self.ensure_capacity(entity.index() as usize);
        self.extrusions[entity.index() as usize] = Some(extrusion);
    }

    pub fn extrusion(&self, entity: EntityId) -> Option<Extrusion> {
        self.extrusions.get(entity.index() as usize).and_then(|e| *e)
    }

    pub fn set_bounds(&mut self, entity: EntityId, bounds: ComponentBounds) {
        self.ensure_capacity(entity.index() as usize);
        self.bounds[entity.index() as usize] = Some(bounds);
    }

    pub fn bounds(&self, entity: EntityId) -> Option<ComponentBounds> {
        self.bounds.get(entity.index() as usize).and_then(|b| *b)
    }

    pub fn set_visibility(&mut self, entity: EntityId, visibility: Visibility) {
        self.ensure_capacity(entity.index() as usize);
        self.visibility[entity.index() as usize] = Some(visibility);
    }

    pub fn is_visible(&self, entity: EntityId) -> bool {
        self.visibility
            .get(entity.index() as usize)
            .and_then(|v| *v)
            .map(|v| v.visible)
            .unwrap_or(true)
    }

    /// Entities with a footprint, in ascending index order. Hidden entities are skipped.
    pub fn footprints_by_entity(&self) -> Vec<(EntityId, &Footprint)> {
        let mut out = Vec::new();
        for (idx, footprint) in self.footprints.iter().enumerate() {
            let Some(footprint) = footprint else { continue };
            let entity = EntityId::from_index(idx as u32);
            if !self.is_visible(entity) {
                continue;
            }
            out.push((entity, footprint));
        }
        out
    }

    /// Visible entities that can be hit-tested: they need a footprint and bounds.
    pub fn pickable_entities(&self) -> Vec<(EntityId, ComponentBounds)> {
        self.footprints_by_entity()
            .into_iter()
            .filter_map(|(entity, _)| self.bounds(entity).map(|b| (entity, b)))
            .collect()
    }

    fn ensure_capacity(&mut self, idx: usize) {
        if self.keys.len() <= idx {
            let new_len = idx + 1;
            self.keys.resize(new_len, None);
            self.attributes.resize(new_len, None);
            self.footprints.resize(new_len, None);
            self.extrusions.resize(new_len, None);
            self.bounds.resize(new_len, None);
            self.visibility.resize(new_len, None);
        }
    }
}
