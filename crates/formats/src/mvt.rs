//! Mapbox Vector Tile (v2) decoding.

use foundation::math::{LngLat, TileCoord, Vec2};
use prost::Message;
use scene::components::{AttributeValue, Attributes, ring_signed_area};
use tracing::warn;

use crate::feature::{FeatureGeometry, SourceFeature};

const DEFAULT_EXTENT: u32 = 4096;

#[derive(Clone, PartialEq, prost::Message)]
struct VectorTile {
    #[prost(message, repeated, tag = "3")]
    layers: Vec<VectorTileLayer>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct VectorTileLayer {
    #[prost(string, required, tag = "1")]
    name: String,
    #[prost(message, repeated, tag = "2")]
    features: Vec<VectorTileFeature>,
    #[prost(string, repeated, tag = "3")]
    keys: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    values: Vec<VectorTileValue>,
    #[prost(uint32, optional, tag = "5")]
    extent: Option<u32>,
    #[prost(uint32, required, tag = "15")]
    version: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
struct VectorTileFeature {
    #[prost(uint64, optional, tag = "1")]
    id: Option<u64>,
    #[prost(uint32, repeated, tag = "2")]
    tags: Vec<u32>,
    #[prost(enumeration = "GeomType", optional, tag = "3")]
    geometry_type: Option<i32>,
    #[prost(uint32, repeated, tag = "4")]
    geometry: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct VectorTileValue {
    #[prost(string, optional, tag = "1")]
    string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    bool_value: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum GeomType {
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

#[derive(Debug)]
pub enum MvtError {
    Decode(prost::DecodeError),
}

impl std::fmt::Display for MvtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MvtError::Decode(err) => write!(f, "invalid vector tile: {err}"),
        }
    }
}

impl std::error::Error for MvtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MvtError::Decode(err) => Some(err),
        }
    }
}

impl From<prost::DecodeError> for MvtError {
    fn from(err: prost::DecodeError) -> Self {
        MvtError::Decode(err)
    }
}

/// A feature together with the source layer it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub layer: String,
    pub feature: SourceFeature,
}

/// Decodes every layer of a tile. Coordinates are mapped through `tile` to longitude/latitude.
pub fn decode_tile(bytes: &[u8], tile: TileCoord) -> Result<Vec<TileFeature>, MvtError> {
    let decoded = VectorTile::decode(bytes)?;
    let mut out = Vec::new();
    for layer in &decoded.layers {
        let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
        for (index, feature) in layer.features.iter().enumerate() {
            let paths = decode_paths(&feature.geometry);
            let to_geo = |path: &[(i32, i32)]| -> Vec<LngLat> {
                path.iter()
                    .map(|(x, y)| tile.point_to_lng_lat(f64::from(*x), f64::from(*y), extent))
                    .collect()
            };
            let geometry = match feature.geometry_type.and_then(|t| GeomType::try_from(t).ok()) {
                Some(GeomType::Point) => {
                    FeatureGeometry::Points(paths.iter().flat_map(|p| to_geo(p)).collect())
                }
                Some(GeomType::LineString) => {
                    FeatureGeometry::Lines(paths.iter().map(|p| to_geo(p)).collect())
                }
                Some(GeomType::Polygon) => FeatureGeometry::Polygons(
                    group_rings(&paths)
                        .into_iter()
                        .map(|rings| rings.iter().map(|r| to_geo(r)).collect())
                        .collect(),
                ),
                Some(GeomType::Unknown) | None => {
                    warn!(layer = %layer.name, index, "skipping feature with unknown geometry type");
                    continue;
                }
            };
            out.push(TileFeature {
                layer: layer.name.clone(),
                feature: SourceFeature {
                    id: feature.id,
                    attributes: decode_tags(layer, feature),
                    geometry,
                },
            });
        }
    }
    Ok(out)
}

/// Features of one source layer, e.g. `building`.
pub fn layer_features(features: Vec<TileFeature>, layer: &str) -> Vec<SourceFeature> {
    features
        .into_iter()
        .filter(|f| f.layer == layer)
        .map(|f| f.feature)
        .collect()
}

fn decode_tags(layer: &VectorTileLayer, feature: &VectorTileFeature) -> Attributes {
    let mut attrs = Attributes::new();
    for pair in feature.tags.chunks_exact(2) {
        let Some(key) = layer.keys.get(pair[0] as usize) else {
            continue;
        };
        let Some(value) = layer.values.get(pair[1] as usize) else {
            continue;
        };
        attrs.insert(key.clone(), tile_value(value));
    }
    attrs
}

fn tile_value(value: &VectorTileValue) -> AttributeValue {
    if let Some(v) = &value.string_value {
        return AttributeValue::String(v.clone());
    }
    if let Some(v) = value.bool_value {
        return AttributeValue::Bool(v);
    }
    if let Some(v) = value.int_value.or(value.sint_value) {
        return AttributeValue::Number(v as f64);
    }
    if let Some(v) = value.uint_value {
        return AttributeValue::Number(v as f64);
    }
    if let Some(v) = value.double_value {
        return AttributeValue::Number(v);
    }
    if let Some(v) = value.float_value {
        return AttributeValue::Number(f64::from(v));
    }
    AttributeValue::Null
}

/// Runs MoveTo / LineTo / ClosePath commands. Closed paths repeat their first vertex.
fn decode_paths(commands: &[u32]) -> Vec<Vec<(i32, i32)>> {
    let mut paths: Vec<Vec<(i32, i32)>> = Vec::new();
    let mut path: Vec<(i32, i32)> = Vec::new();
    let mut cursor = 0usize;
    let (mut x, mut y) = (0i32, 0i32);

    while cursor < commands.len() {
        let command = commands[cursor];
        cursor += 1;
        let id = command & 0x7;
        let count = command >> 3;
        match id {
            1 | 2 => {
                for _ in 0..count {
                    if cursor + 1 >= commands.len() {
                        break;
                    }
                    x = x.wrapping_add(decode_zigzag(commands[cursor]));
                    y = y.wrapping_add(decode_zigzag(commands[cursor + 1]));
                    cursor += 2;
                    if id == 1 && !path.is_empty() {
                        paths.push(std::mem::take(&mut path));
                    }
                    path.push((x, y));
                }
            }
            7 => {
                if let Some(first) = path.first().copied() {
                    path.push(first);
                }
            }
            _ => break,
        }
    }
    if !path.is_empty() {
        paths.push(path);
    }
    paths
}

fn decode_zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Splits rings into polygons. In tile space (y down) exterior rings have
/// positive shoelace area and holes negative; zero-area rings are dropped.
fn group_rings(paths: &[Vec<(i32, i32)>]) -> Vec<Vec<Vec<(i32, i32)>>> {
    let mut polygons: Vec<Vec<Vec<(i32, i32)>>> = Vec::new();
    for path in paths {
        let ring: Vec<Vec2> = path
            .iter()
            .map(|(x, y)| Vec2::new(f64::from(*x), f64::from(*y)))
            .collect();
        let area = ring_signed_area(&ring);
        if area > 0.0 {
            polygons.push(vec![path.clone()]);
        } else if area < 0.0 {
            match polygons.last_mut() {
                Some(poly) => poly.push(path.clone()),
                None => warn!("vector tile hole without exterior ring"),
            }
        }
    }
    polygons
}

#[cfg(test)]
mod tests {
    use super::{
        GeomType, VectorTile, VectorTileFeature, VectorTileLayer, VectorTileValue, decode_paths,
        decode_tile, decode_zigzag, group_rings, layer_features,
    };
    use crate::feature::FeatureGeometry;
    use foundation::math::TileCoord;
    use pretty_assertions::assert_eq;
    use prost::Message;
    use scene::components::AttributeValue;

    fn zz(v: i32) -> u32 {
        ((v << 1) ^ (v >> 31)) as u32
    }

    fn command(id: u32, count: u32) -> u32 {
        (count << 3) | id
    }

    /// Square ring from (x0, y0) with side `s`, clockwise on screen.
    fn square(x0: i32, y0: i32, s: i32, cursor: &mut (i32, i32)) -> Vec<u32> {
        let mut out = vec![command(1, 1), zz(x0 - cursor.0), zz(y0 - cursor.1), command(2, 3)];
        out.extend([zz(s), zz(0), zz(0), zz(s), zz(-s), zz(0)]);
        out.push(command(7, 1));
        *cursor = (x0, y0 + s);
        out
    }

    fn str_value(s: &str) -> VectorTileValue {
        VectorTileValue {
            string_value: Some(s.to_string()),
            ..Default::default()
        }
    }

    fn building_tile() -> Vec<u8> {
        let mut cursor = (0, 0);
        let geometry = square(100, 100, 200, &mut cursor);
        let layer = VectorTileLayer {
            name: "building".to_string(),
            features: vec![
                VectorTileFeature {
                    id: Some(77),
                    tags: vec![0, 0, 1, 1],
                    geometry_type: Some(GeomType::Polygon as i32),
                    geometry,
                },
                VectorTileFeature {
                    id: Some(78),
                    tags: vec![],
                    geometry_type: Some(GeomType::Point as i32),
                    geometry: vec![command(1, 1), zz(5), zz(5)],
                },
            ],
            keys: vec!["type".to_string(), "levels".to_string()],
            values: vec![
                str_value("office"),
                VectorTileValue {
                    int_value: Some(4),
                    ..Default::default()
                },
            ],
            extent: Some(4096),
            version: 2,
        };
        let water = VectorTileLayer {
            name: "water".to_string(),
            version: 2,
            ..Default::default()
        };
        VectorTile {
            layers: vec![layer, water],
        }
        .encode_to_vec()
    }

    #[test]
    fn zigzag_decoding() {
        assert_eq!(decode_zigzag(0), 0);
        assert_eq!(decode_zigzag(1), -1);
        assert_eq!(decode_zigzag(2), 1);
        assert_eq!(decode_zigzag(zz(-300)), -300);
    }

    #[test]
    fn close_path_repeats_first_vertex() {
        let mut cursor = (0, 0);
        let paths = decode_paths(&square(10, 10, 5, &mut cursor));
        assert_eq!(paths, vec![vec![(10, 10), (15, 10), (15, 15), (10, 15), (10, 10)]]);
    }

    #[test]
    fn holes_attach_to_previous_exterior() {
        let outer = vec![(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)];
        let hole = vec![(2, 2), (2, 8), (8, 8), (8, 2), (2, 2)];
        let second = vec![(20, 0), (30, 0), (30, 10), (20, 10), (20, 0)];
        let polys = group_rings(&[outer, hole, second]);
        assert_eq!(polys.len(), 2);
        assert_eq!(polys[0].len(), 2);
        assert_eq!(polys[1].len(), 1);
    }

    #[test]
    fn decodes_building_layer() {
        let tile = TileCoord::new(14, 8919, 5840);
        let features = decode_tile(&building_tile(), tile).expect("decode");
        assert_eq!(features.len(), 2);

        let buildings = layer_features(features, "building");
        let b = &buildings[0];
        assert_eq!(b.id, Some(77));
        assert_eq!(b.attributes.get_str("type"), Some("office"));
        assert_eq!(b.attributes.get("levels"), Some(&AttributeValue::Number(4.0)));

        let FeatureGeometry::Polygons(polys) = &b.geometry else {
            panic!("expected polygons");
        };
        assert_eq!(polys.len(), 1);
        let (w, s, e, n) = tile.bounds_lng_lat();
        for p in &polys[0][0] {
            assert!(p.lng > w && p.lng < e && p.lat > s && p.lat < n);
        }
        assert!(matches!(buildings[1].geometry, FeatureGeometry::Points(_)));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_tile(&[0xff, 0xff, 0xff], TileCoord::new(0, 0, 0)).is_err());
    }
}
