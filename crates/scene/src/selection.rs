use foundation::math::LngLat;
use tracing::debug;

use crate::components::{Attributes, FeatureKey};
use crate::feature_state::FeatureStateStore;

/// A feature reported by a successful pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedFeature {
    pub key: FeatureKey,
    pub attributes: Attributes,
    pub coordinate: LngLat,
    /// Whether the picking layer supports feature state (vector buildings do, tilesets don't).
    pub feature_state: bool,
}

/// The feature shown in the info dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub key: FeatureKey,
    pub attributes: Attributes,
    pub coordinate: LngLat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    /// The click missed; nothing changed.
    Ignored,
    Opened(FeatureKey),
    Replaced { previous: FeatureKey, current: FeatureKey },
}

/// Holds at most one selection. The dialog is open exactly while a selection exists.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    current: Option<Selection>,
    flagged: Option<FeatureKey>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    pub fn is_dialog_open(&self) -> bool {
        self.current.is_some()
    }

    /// Applies a pick result. The previous `selected` flag is cleared before the new one is set.
    pub fn select(
        &mut self,
        pick: Option<PickedFeature>,
        states: &mut FeatureStateStore,
    ) -> SelectionChange {
        let Some(pick) = pick else {
            return SelectionChange::Ignored;
        };

        let previous = self.current.take().map(|s| s.key);
        if let Some(old) = self.flagged.take() {
            states.set_selected(&old, false);
        }
        if pick.feature_state {
            states.set_selected(&pick.key, true);
            self.flagged = Some(pick.key.clone());
        }

        debug!(feature = %pick.key, lng = pick.coordinate.lng, lat = pick.coordinate.lat, "feature selected");
        let current = pick.key.clone();
        self.current = Some(Selection {
            key: pick.key,
            attributes: pick.attributes,
            coordinate: pick.coordinate,
        });

        match previous {
            Some(previous) => SelectionChange::Replaced { previous, current },
            None => SelectionChange::Opened(current),
        }
    }

    /// Closes the dialog, clearing the stored selection and its `selected` flag.
    pub fn close(&mut self, states: &mut FeatureStateStore) -> Option<Selection> {
        if let Some(key) = self.flagged.take() {
            states.set_selected(&key, false);
        }
        let closed = self.current.take();
        if let Some(closed) = &closed {
            debug!(feature = %closed.key, "selection cleared");
        }
        closed
    }

    /// Dialog open-state callback. Opening without a selection is a no-op.
    pub fn set_dialog_open(
        &mut self,
        open: bool,
        states: &mut FeatureStateStore,
    ) -> Option<Selection> {
        if open {
            None
        } else {
            self.close(states)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PickedFeature, SelectionChange, SelectionState};
    use crate::components::{Attributes, FeatureKey};
    use crate::feature_state::FeatureStateStore;
    use foundation::math::LngLat;
    use pretty_assertions::assert_eq;

    fn pick(id: u64, feature_state: bool) -> PickedFeature {
        PickedFeature {
            key: FeatureKey::new("osm-buildings", id),
            attributes: [("name", "X")].into_iter().collect::<Attributes>(),
            coordinate: LngLat::new(15.9819, 45.815),
            feature_state,
        }
    }

    #[test]
    fn miss_is_ignored() {
        let mut state = SelectionState::new();
        let mut states = FeatureStateStore::new();
        assert_eq!(state.select(None, &mut states), SelectionChange::Ignored);
        assert!(!state.is_dialog_open());
        assert_eq!(states.generation(), 0);
    }

    #[test]
    fn pick_opens_dialog_and_flags_feature() {
        let mut state = SelectionState::new();
        let mut states = FeatureStateStore::new();
        let change = state.select(Some(pick(1, true)), &mut states);
        assert_eq!(change, SelectionChange::Opened(FeatureKey::new("osm-buildings", 1)));
        assert!(state.is_dialog_open());
        assert!(states.is_selected(&FeatureKey::new("osm-buildings", 1)));
        assert_eq!(state.selection().map(|s| s.attributes.get_str("name")), Some(Some("X")));
    }

    #[test]
    fn new_pick_moves_the_flag() {
        let mut state = SelectionState::new();
        let mut states = FeatureStateStore::new();
        state.select(Some(pick(1, true)), &mut states);
        let change = state.select(Some(pick(2, true)), &mut states);
        assert_eq!(
            change,
            SelectionChange::Replaced {
                previous: FeatureKey::new("osm-buildings", 1),
                current: FeatureKey::new("osm-buildings", 2),
            }
        );
        assert_eq!(states.selected_keys(), vec![&FeatureKey::new("osm-buildings", 2)]);
    }

    #[test]
    fn close_clears_selection_and_flag() {
        let mut state = SelectionState::new();
        let mut states = FeatureStateStore::new();
        state.select(Some(pick(1, true)), &mut states);
        let closed = state.set_dialog_open(false, &mut states);
        assert_eq!(closed.map(|s| s.key), Some(FeatureKey::new("osm-buildings", 1)));
        assert!(state.selection().is_none());
        assert!(states.selected_keys().is_empty());
        assert!(state.close(&mut states).is_none());
    }

    #[test]
    fn tileset_picks_do_not_touch_feature_state() {
        let mut state = SelectionState::new();
        let mut states = FeatureStateStore::new();
        state.select(Some(pick(5, false)), &mut states);
        assert!(state.is_dialog_open());
        assert!(states.selected_keys().is_empty());
        assert!(state.set_dialog_open(true, &mut states).is_none());
        assert!(state.is_dialog_open());
    }
}
