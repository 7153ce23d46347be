use earcutr::earcut;
use foundation::bounds::Aabb3;
use scene::World;
use scene::components::{Attributes, ComponentBounds, Extrusion, Footprint};
use scene::entity::EntityId;
use scene::feature_state::FeatureStateStore;
use tracing::warn;

use crate::layer::Layer;
use crate::style::{BUILDINGS_LAYER_ID, BUILDINGS_SOURCE_ID};
use crate::symbology::{FillExtrusionPaint, ResolvedExtrusion};

/// Flat triangle list: three consecutive vertices per triangle.
///
/// Positions are local frame meters. `entities` carries the owning entity of
/// every vertex so renderers can map a fragment back to its feature.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildingMesh {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub entities: Vec<u32>,
}

impl BuildingMesh {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn append(&mut self, other: BuildingMesh) {
        self.positions.extend(other.positions);
        self.colors.extend(other.colors);
        self.entities.extend(other.entities);
    }

    fn push(&mut self, entity: EntityId, p: [f64; 3], color: [f32; 4]) {
        self.positions.push([p[0] as f32, p[1] as f32, p[2] as f32]);
        self.colors.push(color);
        self.entities.push(entity.index());
    }

    /// Appends roof and walls of `footprint` extruded over `resolved.base..resolved.height`.
    pub fn push_prism(&mut self, entity: EntityId, footprint: &Footprint, resolved: &ResolvedExtrusion) -> bool {
        let (bottom, top) = Extrusion::new(resolved.base, resolved.height).span();
        let top_color = resolved.top_color();
        let bottom_color = resolved.bottom_color();
        let before = self.vertex_count();

        for polygon in &footprint.polygons {
            let mut coords: Vec<f64> = Vec::new();
            let mut hole_indices: Vec<usize> = Vec::new();
            for (ring_i, ring) in polygon.rings.iter().enumerate() {
                if ring_i > 0 {
                    hole_indices.push(coords.len() / 2);
                }
                for v in ring {
                    coords.push(v.x);
                    coords.push(v.y);
                }
            }
            match earcut(&coords, &hole_indices, 2) {
                Ok(indices) => {
                    for idx in indices {
                        self.push(entity, [coords[idx * 2], coords[idx * 2 + 1], top], top_color);
                    }
                }
                Err(err) => warn!(entity = entity.index(), ?err, "roof triangulation failed"),
            }
        }

        if top > bottom {
            for (a, b) in footprint.edges() {
                let quad = [
                    ([a.x, a.y, bottom], bottom_color),
                    ([b.x, b.y, bottom], bottom_color),
                    ([b.x, b.y, top], top_color),
                    ([a.x, a.y, bottom], bottom_color),
                    ([b.x, b.y, top], top_color),
                    ([a.x, a.y, top], top_color),
                ];
                for (p, c) in quad {
                    self.push(entity, p, c);
                }
            }
        }

        self.vertex_count() > before
    }
}

/// The `buildings-3d` fill-extrusion layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingLayer {
    id: String,
    source: String,
    pub paint: FillExtrusionPaint,
}

impl BuildingLayer {
    pub fn new(id: impl Into<String>, source: impl Into<String>, paint: FillExtrusionPaint) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            paint,
        }
    }

    pub fn osm(paint: FillExtrusionPaint) -> Self {
        Self::new(BUILDINGS_LAYER_ID, BUILDINGS_SOURCE_ID, paint)
    }

    /// Resolves paint for every visible feature of this layer's source, stores
    /// the resulting extrusion and bounds on the entity, and builds the mesh.
    pub fn extract(&self, world: &mut World, states: &FeatureStateStore) -> BuildingMesh {
        let empty = Attributes::new();
        let mut mesh = BuildingMesh::default();
        let mut updates: Vec<(EntityId, ResolvedExtrusion, Option<ComponentBounds>)> = Vec::new();

        for (entity, footprint) in world.footprints_by_entity() {
            let Some(key) = world.feature(entity) else {
                continue;
            };
            if key.source != self.source {
                continue;
            }
            let attributes = world.attributes(entity).unwrap_or(&empty);
            let resolved = self.paint.resolve(attributes, states.is_selected(key));
            mesh.push_prism(entity, footprint, &resolved);

            let bounds = footprint
                .bounds()
                .map(|b| ComponentBounds::from(Aabb3::from_footprint(b, resolved.base, resolved.height)));
            updates.push((entity, resolved, bounds));
        }

        for (entity, resolved, bounds) in updates {
            world.set_extrusion(entity, Extrusion::new(resolved.base, resolved.height));
            if let Some(bounds) = bounds {
                world.set_bounds(entity, bounds);
            }
        }
        mesh
    }
}

impl Layer for BuildingLayer {
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
    use super::BuildingLayer;
    use crate::symbology::FillExtrusionPaint;
    use foundation::math::Vec2;
    use scene::World;
    use scene::components::{Attributes, Extrusion, FeatureKey, Footprint, Polygon};
    use scene::feature_state::FeatureStateStore;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-5, "expected {a} ~= {b}");
    }

    fn spawn(world: &mut World, source: &str, id: u64, attrs: Attributes) -> scene::entity::EntityId {
        let e = world.spawn();
        world.set_feature(e, FeatureKey::new(source, id));
        world.set_attributes(e, attrs);
        world.set_footprint(e, Footprint::rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)));
        e
    }

    #[test]
    fn extract_writes_extrusion_and_bounds() {
        let mut world = World::new();
        let e = spawn(&mut world, "osm-buildings", 1, [("levels", 4.0)].into_iter().collect());
        let layer = BuildingLayer::osm(FillExtrusionPaint::buildings(None));
        let mesh = layer.extract(&mut world, &FeatureStateStore::new());

        assert_eq!(world.extrusion(e), Some(Extrusion::new(0.0, 12.0)));
        let bounds = world.bounds(e).expect("bounds");
        assert_eq!(bounds.max.z, 12.0);
        assert_eq!(world.pickable_entities().len(), 1);

        // Square roof: 2 triangles. Four walls: 2 triangles each.
        assert_eq!(mesh.triangle_count(), 2 + 8);
        assert!(mesh.entities.iter().all(|i| *i == e.index()));
    }

    #[test]
    fn walls_get_the_vertical_gradient() {
        let mut world = World::new();
        spawn(&mut world, "osm-buildings", 1, [("type", "residential")].into_iter().collect());
        let mesh = BuildingLayer::osm(FillExtrusionPaint::buildings(None)).extract(&mut world, &FeatureStateStore::new());

        let roof = mesh.colors[0];
        let wall_base = mesh.colors[6];
        assert_eq!(mesh.positions[6][2], 0.0);
        assert_close(wall_base[0], roof[0] * 0.72);
        assert_close(roof[3], 0.85);
    }

    #[test]
    fn selected_feature_uses_highlight() {
        let mut world = World::new();
        spawn(&mut world, "osm-buildings", 7, Attributes::new());
        let mut states = FeatureStateStore::new();
        states.set_selected(&FeatureKey::new("osm-buildings", 7), true);
        let mesh = BuildingLayer::osm(FillExtrusionPaint::buildings(None)).extract(&mut world, &states);
        // #f5a524
        assert_close(mesh.colors[0][0], 245.0 / 255.0);
        assert_close(mesh.colors[0][1], 165.0 / 255.0);
    }

    #[test]
    fn other_sources_are_skipped() {
        let mut world = World::new();
        let e = spawn(&mut world, "tileset", 1, Attributes::new());
        let mesh = BuildingLayer::osm(FillExtrusionPaint::buildings(None)).extract(&mut world, &FeatureStateStore::new());
        assert!(mesh.is_empty());
        assert!(world.extrusion(e).is_none());
    }

    #[test]
    fn roofs_with_holes_triangulate() {
        let mut world = World::new();
        let e = world.spawn();
        world.set_feature(e, FeatureKey::new("osm-buildings", 1));
        let outer = vec![Vec2::new(0.0, 0.0), Vec2::new(30.0, 0.0), Vec2::new(30.0, 30.0), Vec2::new(0.0, 30.0)];
        let hole = vec![Vec2::new(10.0, 10.0), Vec2::new(10.0, 20.0), Vec2::new(20.0, 20.0), Vec2::new(20.0, 10.0)];
        world.set_footprint(e, Footprint::new(vec![Polygon::new(vec![outer, hole])]));
        let mesh = BuildingLayer::osm(FillExtrusionPaint::buildings(None)).extract(&mut world, &FeatureStateStore::new());
        // Ring with a hole: 8 roof triangles, 8 wall quads.
        assert_eq!(mesh.triangle_count(), 8 + 16);
    }
}
