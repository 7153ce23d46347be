use scene::World;
use scene::components::Attributes;

use crate::buildings::BuildingMesh;
use crate::layer::Layer;
use crate::style::{TILESET_LAYER_ID, TILESET_SOURCE_ID};
use crate::symbology::{Color, FillExtrusionPaint};

/// Streamed 3D tileset layer.
///
/// Tile content is not decoded; each leaf tile is drawn as its bounding
/// region, using the extrusion written at ingest time.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetLayer {
    id: String,
    source: String,
    pub url: String,
    pub color: Color,
    pub opacity: f32,
}

impl TilesetLayer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: TILESET_LAYER_ID.to_string(),
            source: TILESET_SOURCE_ID.to_string(),
            url: url.into(),
            color: Color::rgba(0.63, 0.56, 0.50, 1.0),
            opacity: 0.6,
        }
    }

    pub fn extract(&self, world: &World) -> BuildingMesh {
        let paint = FillExtrusionPaint {
            opacity: self.opacity,
            ..FillExtrusionPaint::buildings(Some(self.color))
        };
        let empty = Attributes::new();
        let mut mesh = BuildingMesh::default();
        for (entity, footprint) in world.footprints_by_entity() {
            if world.feature(entity).is_none_or(|k| k.source != self.source) {
                continue;
            }
            let Some(extrusion) = world.extrusion(entity) else {
                continue;
            };
            // Tile regions carry no building attributes; only the color and gradient matter.
            let mut resolved = paint.resolve(&empty, true);
            (resolved.base, resolved.height) = extrusion.span();
            mesh.push_prism(entity, footprint, &resolved);
        }
        mesh
    }
}

impl Layer for TilesetLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn pickable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::TilesetLayer;
    use crate::layer::Layer;
    use foundation::math::Vec2;
    use scene::World;
    use scene::components::{Extrusion, FeatureKey, Footprint};

    #[test]
    fn draws_leaf_regions_with_stored_extrusion() {
        let mut world = World::new();
        let e = world.spawn();
        world.set_feature(e, FeatureKey::new("tileset", 0));
        world.set_footprint(e, Footprint::rect(Vec2::new(-50.0, -50.0), Vec2::new(50.0, 50.0)));
        world.set_extrusion(e, Extrusion::new(100.0, 180.0));

        let layer = TilesetLayer::new("https://example.com/tileset.json");
        assert!(layer.pickable());
        let mesh = layer.extract(&world);
        assert_eq!(mesh.triangle_count(), 10);
        let zs: Vec<f32> = mesh.positions.iter().map(|p| p[2]).collect();
        assert!(zs.iter().all(|z| *z == 100.0 || *z == 180.0));
        assert!((mesh.colors[0][3] - 0.6).abs() < 1e-6);
    }
}
