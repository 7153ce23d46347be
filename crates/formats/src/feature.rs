use foundation::math::LngLat;
use scene::components::{AttributeValue, Attributes, FeatureId};
use serde_json::Value;

/// Geometry of a decoded feature. Multi-geometries are stored as lists.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Points(Vec<LngLat>),
    Lines(Vec<Vec<LngLat>>),
    /// Polygons, each an outer ring followed by its holes.
    Polygons(Vec<Vec<Vec<LngLat>>>),
}

impl FeatureGeometry {
    pub fn is_polygon(&self) -> bool {
        matches!(self, FeatureGeometry::Polygons(_))
    }
}

/// A feature as delivered by a data source, before it enters the world.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    pub id: Option<FeatureId>,
    pub attributes: Attributes,
    pub geometry: FeatureGeometry,
}

/// Converts a JSON property to an attribute value. Arrays and objects are kept
/// as their compact JSON text.
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Number),
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(_) | Value::Object(_) => AttributeValue::String(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::json_to_attribute;
    use scene::components::AttributeValue;
    use serde_json::json;

    #[test]
    fn nested_values_become_json_text() {
        assert_eq!(json_to_attribute(&json!([1, 2])), AttributeValue::from("[1,2]"));
        assert_eq!(json_to_attribute(&json!(3)), AttributeValue::Number(3.0));
        assert_eq!(json_to_attribute(&json!(null)), AttributeValue::Null);
    }
}
