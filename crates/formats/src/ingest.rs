use foundation::bounds::Aabb3;
use foundation::math::{LngLat, LocalFrame, Vec2};
use scene::World;
use scene::components::{
    AttributeValue, Attributes, ComponentBounds, Extrusion, FeatureId, FeatureKey, Footprint, Polygon,
};
use tracing::{debug, warn};

use crate::feature::{FeatureGeometry, SourceFeature, json_to_attribute};
use crate::tileset::{Tile, TileContent, Tileset};

/// First id handed to features that arrive without one. Above the range a
/// JavaScript number holds exactly, so it never collides with a source id.
pub const SYNTHETIC_ID_BASE: FeatureId = 1 << 53;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub spawned: usize,
    /// Features whose key already existed; their polygons joined the existing footprint.
    pub merged: usize,
    pub skipped: usize,
}

/// Spawns one entity per polygon feature of `source`.
///
/// Buildings split across tile boundaries arrive once per tile with the same
/// id; the pieces are merged into one footprint so the building picks as a unit.
pub fn ingest_buildings(world: &mut World, frame: &LocalFrame, source: &str, features: &[SourceFeature]) -> IngestReport {
    let mut report = IngestReport::default();
    let mut next_synthetic = SYNTHETIC_ID_BASE;

    for feature in features {
        let FeatureGeometry::Polygons(polygons) = &feature.geometry else {
            report.skipped += 1;
            continue;
        };
        let polygons: Vec<Polygon> = polygons
            .iter()
            .map(|rings| {
                Polygon::new(
                    rings
                        .iter()
                        .map(|ring| ring.iter().map(|p| frame.to_local(*p, 0.0).xy()).collect())
                        .collect(),
                )
            })
            .filter(|p| !p.rings.is_empty())
            .collect();
        if polygons.is_empty() {
            report.skipped += 1;
            continue;
        }

        let id = match feature.id {
            Some(id) => id,
            None => {
                while world.entity_for_key(&FeatureKey::new(source, next_synthetic)).is_some() {
                    next_synthetic += 1;
                }
                next_synthetic += 1;
                next_synthetic - 1
            }
        };
        let key = FeatureKey::new(source, id);

        if let Some(existing) = world.entity_for_key(&key) {
            let mut footprint = world.footprint(existing).cloned().unwrap_or_default();
            footprint.polygons.extend(polygons);
            world.set_footprint(existing, footprint);
            report.merged += 1;
            continue;
        }

        let entity = world.spawn();
        world.set_feature(entity, key);
        world.set_attributes(entity, feature.attributes.clone());
        world.set_footprint(entity, Footprint::new(polygons));
        report.spawned += 1;
    }

    debug!(source, spawned = report.spawned, merged = report.merged, skipped = report.skipped, "ingested buildings");
    report
}

/// Spawns one box per leaf tile of `tileset`, ids numbered in traversal order.
pub fn ingest_tileset(world: &mut World, frame: &LocalFrame, source: &str, tileset: &Tileset) -> IngestReport {
    let mut report = IngestReport::default();

    for (index, tile) in tileset.leaf_contents().into_iter().enumerate() {
        let Some(region) = tile.bounding_volume.approximate_region() else {
            warn!(index, "tile bounding volume is not georeferenced");
            report.skipped += 1;
            continue;
        };
        let key = FeatureKey::new(source, index as FeatureId);
        if world.entity_for_key(&key).is_some() {
            report.skipped += 1;
            continue;
        }

        let sw = frame.to_local(LngLat::new(region.west, region.south), 0.0).xy();
        let ne = frame.to_local(LngLat::new(region.east, region.north), 0.0).xy();
        let min = Vec2::new(sw.x.min(ne.x), sw.y.min(ne.y));
        let max = Vec2::new(sw.x.max(ne.x), sw.y.max(ne.y));
        let footprint = Footprint::rect(min, max);
        let extrusion = Extrusion::new(region.min_height, region.max_height);

        let entity = world.spawn();
        world.set_feature(entity, key);
        world.set_attributes(entity, tile_attributes(tile));
        if let Some(b) = footprint.bounds() {
            let (base, height) = extrusion.span();
            world.set_bounds(entity, ComponentBounds::from(Aabb3::from_footprint(b, base, height)));
        }
        world.set_footprint(entity, footprint);
        world.set_extrusion(entity, extrusion);
        report.spawned += 1;
    }

    debug!(source, spawned = report.spawned, skipped = report.skipped, "ingested tileset");
    report
}

fn tile_attributes(tile: &Tile) -> Attributes {
    let mut attrs: Attributes = tile.extras.iter().map(|(k, v)| (k.clone(), json_to_attribute(v))).collect();
    if let Some(uri) = tile.content.as_ref().and_then(TileContent::uri) {
        attrs.insert("content_uri", AttributeValue::String(uri.to_string()));
    }
    attrs
}
