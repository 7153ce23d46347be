use std::collections::VecDeque;

use foundation::math::LngLat;
use scene::components::FeatureKey;
use serde::{Serialize, Serializer};
use tracing::trace;

/// Things that happen on the map, in the order the host observed them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MapEvent {
    /// Style and data are in place; picking is live from here on.
    Loaded,
    /// `screen` is absent for clicks given as a geographic position.
    Click {
        screen: Option<[f64; 2]>,
        #[serde(serialize_with = "lng_lat_pair")]
        coordinate: Option<LngLat>,
    },
    FeaturePicked { key: FeatureKey },
    PickMissed,
    DialogOpened { key: FeatureKey },
    DialogClosed,
}

fn lng_lat_pair<S: Serializer>(value: &Option<LngLat>, s: S) -> Result<S::Ok, S::Error> {
    value.map(|p| [p.lng, p.lat]).serialize(s)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: MapEvent,
}

/// Events kept when nobody drains the bus.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Bounded event log. When full, the oldest event is dropped; gaps in the
/// sequence numbers show what a slow reader missed.
#[derive(Debug)]
pub struct EventBus {
    next_sequence: u64,
    capacity: usize,
    events: VecDeque<RecordedEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            next_sequence: 0,
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Records `event` and returns its sequence number. Numbers keep rising
    /// across `drain` calls.
    pub fn emit(&mut self, event: MapEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        trace!(sequence, ?event, "map event");
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(RecordedEvent { sequence, event });
        sequence
    }

    pub fn events(&self) -> &VecDeque<RecordedEvent> {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, MapEvent};
    use foundation::math::LngLat;
    use pretty_assertions::assert_eq;
    use scene::components::FeatureKey;
    use serde_json::json;

    #[test]
    fn sequence_numbers_survive_drain() {
        let mut bus = EventBus::new();
        assert_eq!(bus.emit(MapEvent::Loaded), 0);
        assert_eq!(bus.emit(MapEvent::PickMissed), 1);
        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(bus.events().is_empty());
        assert_eq!(bus.emit(MapEvent::DialogClosed), 2);
        assert_eq!(bus.events()[0].sequence, 2);
    }

    #[test]
    fn full_bus_drops_the_oldest_event() {
        let mut bus = EventBus::with_capacity(3);
        for _ in 0..5 {
            bus.emit(MapEvent::PickMissed);
        }
        let sequences: Vec<u64> = bus.events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
        assert_eq!(bus.drain().len(), 3);
        assert_eq!(bus.emit(MapEvent::Loaded), 5);
    }

    #[test]
    fn events_serialize_flat() {
        let mut bus = EventBus::new();
        bus.emit(MapEvent::Click {
            screen: Some([10.0, 20.0]),
            coordinate: Some(LngLat::new(15.9819, 45.815)),
        });
        bus.emit(MapEvent::DialogOpened {
            key: FeatureKey::new("osm-buildings", 42),
        });
        let value = serde_json::to_value(bus.events()).expect("json");
        assert_eq!(
            value,
            json!([
                {"sequence": 0, "type": "click", "screen": [10.0, 20.0], "coordinate": [15.9819, 45.815]},
                {"sequence": 1, "type": "dialog-opened", "key": {"source": "osm-buildings", "id": 42}}
            ])
        );
    }
}
