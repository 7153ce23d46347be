use foundation::math::LngLat;
use scene::components::{Attributes, FeatureId};
use serde_json::{Map, Value};

use crate::feature::{FeatureGeometry, SourceFeature, json_to_attribute};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<SourceFeature>,
}

#[derive(Debug)]
pub enum GeoJsonError {
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

impl FeatureCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GeoJsonError::InvalidFeature {
                index: 0,
                reason: format!("JSON parse error: {e}"),
            })?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        let obj = value.as_object().ok_or(GeoJsonError::NotAFeatureCollection)?;
        if obj.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(GeoJsonError::NotAFeatureCollection);
        }
        let items = obj
            .get("features")
            .and_then(Value::as_array)
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let features = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                parse_feature(item).map_err(|reason| GeoJsonError::InvalidFeature { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn parse_feature(value: &Value) -> Result<SourceFeature, String> {
    let obj = value.as_object().ok_or("feature must be an object")?;
    match obj.get("type").and_then(Value::as_str) {
        Some("Feature") => {}
        Some(other) => return Err(format!("unexpected feature type: {other}")),
        None => return Err("feature missing type".to_string()),
    }

    let attributes = obj
        .get("properties")
        .and_then(Value::as_object)
        .map(properties_to_attributes)
        .unwrap_or_default();
    let geometry = parse_geometry(obj.get("geometry").ok_or("feature missing geometry")?)?;

    Ok(SourceFeature {
        id: obj.get("id").and_then(parse_id),
        attributes,
        geometry,
    })
}

/// Integer ids (or integer strings) become feature ids; anything else is left for the ingest to number.
fn parse_id(value: &Value) -> Option<FeatureId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn properties_to_attributes(props: &Map<String, Value>) -> Attributes {
    props.iter().map(|(k, v)| (k.as_str(), json_to_attribute(v))).collect()
}

fn parse_geometry(value: &Value) -> Result<FeatureGeometry, String> {
    let obj = value.as_object().ok_or("geometry must be an object")?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry missing type")?;
    let coords = obj.get("coordinates").ok_or("geometry missing coordinates")?;

    match ty {
        "Point" => Ok(FeatureGeometry::Points(vec![parse_point(coords)?])),
        "MultiPoint" => Ok(FeatureGeometry::Points(parse_points(coords)?)),
        "LineString" => Ok(FeatureGeometry::Lines(vec![parse_points(coords)?])),
        "MultiLineString" => Ok(FeatureGeometry::Lines(parse_rings(coords)?)),
        "Polygon" => Ok(FeatureGeometry::Polygons(vec![parse_rings(coords)?])),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array of polygons")?;
            Ok(FeatureGeometry::Polygons(
                polys.iter().map(parse_rings).collect::<Result<_, _>>()?,
            ))
        }
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<LngLat, String> {
    let arr = coords.as_array().ok_or("position must be an array")?;
    match arr.as_slice() {
        [lng, lat, ..] => {
            let lng = lng.as_f64().ok_or("longitude must be a number")?;
            let lat = lat.as_f64().ok_or("latitude must be a number")?;
            Ok(LngLat::new(lng, lat))
        }
        _ => Err("position must have [lng, lat]".to_string()),
    }
}

fn parse_points(coords: &Value) -> Result<Vec<LngLat>, String> {
    coords
        .as_array()
        .ok_or("coordinates must be an array")?
        .iter()
        .map(parse_point)
        .collect()
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<LngLat>>, String> {
    coords
        .as_array()
        .ok_or("coordinates must be an array of rings")?
        .iter()
        .map(parse_points)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{FeatureCollection, GeoJsonError};
    use crate::feature::FeatureGeometry;
    use pretty_assertions::assert_eq;
    use scene::components::AttributeValue;
    use serde_json::json;

    #[test]
    fn parses_buildings() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": 12,
                    "properties": {"name": "Zagreb Cathedral", "height": 108, "note": ""},
                    "geometry": {"type": "Polygon", "coordinates": [[[15.98, 45.81], [15.981, 45.81], [15.981, 45.811], [15.98, 45.81]]]}
                },
                {
                    "type": "Feature",
                    "id": "node/5",
                    "properties": null,
                    "geometry": {"type": "Point", "coordinates": [15.98, 45.81]}
                }
            ]
        })
        .to_string();

        let fc = FeatureCollection::from_geojson_str(&payload).expect("parse");
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].id, Some(12));
        assert_eq!(fc.features[0].attributes.get("height"), Some(&AttributeValue::Number(108.0)));
        assert!(fc.features[0].geometry.is_polygon());
        assert_eq!(fc.features[1].id, None);
        assert!(fc.features[1].attributes.is_empty());
        assert!(matches!(&fc.features[1].geometry, FeatureGeometry::Points(p) if p.len() == 1));
    }

    #[test]
    fn rejects_non_collections() {
        let err = FeatureCollection::from_geojson_str(r#"{"type": "Feature"}"#).unwrap_err();
        assert!(matches!(err, GeoJsonError::NotAFeatureCollection));

        let bad = json!({"type": "FeatureCollection", "features": [{"type": "Feature", "geometry": {"type": "Circle", "coordinates": []}}]});
        let err = FeatureCollection::from_geojson_value(&bad).unwrap_err();
        assert_eq!(err.to_string(), "invalid feature at index 0: unsupported geometry type: Circle");
    }
}
