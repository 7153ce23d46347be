use std::fmt;

use serde::Serialize;

pub type FeatureId = u64;

/// Identity of a feature as the renderer addresses it: feature state is keyed
/// by source and id, never by entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FeatureKey {
    pub source: String,
    pub id: FeatureId,
}

impl FeatureKey {
    pub fn new(source: impl Into<String>, id: FeatureId) -> Self {
        Self {
            source: source.into(),
            id,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source, self.id)
    }
}
