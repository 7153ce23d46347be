use std::collections::BTreeMap;

use crate::components::FeatureKey;

/// Per-feature render state set by the application, not by the data.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FeatureState {
    pub selected: bool,
}

/// Feature-state table keyed by `(source, id)`.
///
/// Data-driven paint reads `["feature-state", "selected"]` from here. The
/// generation counter lets renderers skip re-extraction when nothing changed.
#[derive(Debug, Clone, Default)]
pub struct FeatureStateStore {
    states: BTreeMap<FeatureKey, FeatureState>,
    generation: u64,
}

impl FeatureStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FeatureKey) -> Option<FeatureState> {
        self.states.get(key).copied()
    }

    /// Entries that return to the default state are dropped.
    pub fn set_selected(&mut self, key: &FeatureKey, selected: bool) {
        let changed = if selected {
            let state = self.states.entry(key.clone()).or_default();
            !std::mem::replace(&mut state.selected, true)
        } else {
            match self.states.get_mut(key) {
                Some(state) if state.selected => {
                    state.selected = false;
                    if *state == FeatureState::default() {
                        self.states.remove(key);
                    }
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.generation += 1;
        }
    }

    pub fn is_selected(&self, key: &FeatureKey) -> bool {
        self.states.get(key).is_some_and(|s| s.selected)
    }

    pub fn remove(&mut self, key: &FeatureKey) -> Option<FeatureState> {
        let removed = self.states.remove(key);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    /// Drops every state of `source`, as happens when its tiles are reloaded.
    pub fn clear_source(&mut self, source: &str) {
        let before = self.states.len();
        self.states.retain(|key, _| key.source != source);
        if self.states.len() != before {
            self.generation += 1;
        }
    }

    /// Keys whose `selected` flag is set, in key order.
    pub fn selected_keys(&self) -> Vec<&FeatureKey> {
        self.states
            .iter()
            .filter(|(_, s)| s.selected)
            .map(|(k, _)| k)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureStateStore;
    use crate::components::FeatureKey;

    #[test]
    fn selected_flag_round_trip() {
        let mut store = FeatureStateStore::new();
        let key = FeatureKey::new("osm-buildings", 42);
        assert!(!store.is_selected(&key));

        store.set_selected(&key, true);
        assert!(store.is_selected(&key));
        assert_eq!(store.selected_keys(), vec![&key]);

        store.set_selected(&key, false);
        assert!(!store.is_selected(&key));
        assert!(store.selected_keys().is_empty());
    }

    #[test]
    fn deselected_entries_are_dropped() {
        let mut store = FeatureStateStore::new();
        for id in 0..50 {
            let key = FeatureKey::new("osm-buildings", id);
            store.set_selected(&key, true);
            store.set_selected(&key, false);
        }
        assert!(store.is_empty());

        let g = store.generation();
        store.set_selected(&FeatureKey::new("osm-buildings", 7), false);
        assert_eq!(store.len(), 0);
        assert_eq!(store.generation(), g);
    }

    #[test]
    fn generation_only_moves_on_change() {
        let mut store = FeatureStateStore::new();
        let key = FeatureKey::new("osm-buildings", 1);
        store.set_selected(&key, true);
        let g = store.generation();
        store.set_selected(&key, true);
        assert_eq!(store.generation(), g);
        store.remove(&key);
        assert_eq!(store.generation(), g + 1);
        assert!(store.remove(&key).is_none());
        assert_eq!(store.generation(), g + 1);
    }

    #[test]
    fn clear_source_keeps_other_sources() {
        let mut store = FeatureStateStore::new();
        let a = FeatureKey::new("osm-buildings", 1);
        let b = FeatureKey::new("tileset", 1);
        store.set_selected(&a, true);
        store.set_selected(&b, true);
        store.clear_source("osm-buildings");
        assert_eq!(store.selected_keys(), vec![&b]);
    }
}
