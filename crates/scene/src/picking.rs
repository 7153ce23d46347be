use foundation::math::precision::stable_total_cmp_f64;
use foundation::math::{LngLat, LocalFrame, Vec2, Vec3};

use crate::World;
use crate::components::{Extrusion, Footprint};
use crate::entity::EntityId;
use crate::spatial::{Bvh, Item as BvhItem, ray_aabb_entry};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub entity: EntityId,
    /// Distance along the normalized ray; zero for top-down picks.
    pub distance: f64,
    pub point: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    pub max_distance: f64,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_distance: 1.0e30,
        }
    }
}

/// Ray picking against extruded footprints.
///
/// The BVH narrows candidates to boxes the ray crosses, then each candidate is
/// tested exactly: roof and floor caps inside the footprint, or a wall segment
/// between base and top. The closest hit wins; equal distances go to the lower
/// `EntityId::index()`.
pub fn pick_ray(world: &World, ray: Ray, opts: PickOptions) -> Option<PickHit> {
    let dir = ray.dir.normalized()?;
    let ray = Ray::new(ray.origin, dir);

    let items: Vec<BvhItem> = world
        .pickable_entities()
        .into_iter()
        .map(|(entity, bounds)| BvhItem {
            entity,
            bounds: bounds.to_aabb(),
        })
        .collect();
    if items.is_empty() {
        return None;
    }

    let bvh = Bvh::build(items);
    let origin = ray.origin.as_array();
    let dir_a = dir.as_array();

    let mut best: Option<(f64, EntityId)> = None;
    for entity in bvh.query_ray(origin, dir_a, 0.0, opts.max_distance) {
        let Some(bounds) = world.bounds(entity) else {
            continue;
        };
        let t = match world.footprint(entity) {
            Some(footprint) => {
                let span = world
                    .extrusion(entity)
                    .map(|e| e.span())
                    .unwrap_or((bounds.min.z, bounds.max.z));
                prism_hit(&ray, footprint, span)
            }
            None => ray_aabb_entry(origin, dir_a, &bounds.to_aabb(), 0.0, opts.max_distance),
        };
        let Some(t) = t.filter(|t| *t <= opts.max_distance) else {
            continue;
        };

        let better = match best {
            None => true,
            Some((bt, be)) => stable_total_cmp_f64(t, bt)
                .then_with(|| entity.index().cmp(&be.index()))
                .is_lt(),
        };
        if better {
            best = Some((t, entity));
        }
    }

    let (t, entity) = best?;
    Some(PickHit {
        entity,
        distance: t,
        point: ray.at(t),
    })
}

/// Top-down pick at a geographic position.
///
/// Among features whose footprint contains the point the tallest wins, then
/// the lower entity index.
pub fn pick_lng_lat(world: &World, frame: &LocalFrame, p: LngLat) -> Option<PickHit> {
    let local = frame.to_local(p, 0.0).xy();
    let mut best: Option<(f64, EntityId)> = None;

    for (entity, bounds) in world.pickable_entities() {
        let Some(footprint) = world.footprint(entity) else {
            continue;
        };
        if !footprint.contains_xy(local) {
            continue;
        }
        let top = world
            .extrusion(entity)
            .map(|e| e.span().1)
            .unwrap_or(bounds.max.z);
        let better = match best {
            None => true,
            Some((bt, be)) => stable_total_cmp_f64(top, bt)
                .reverse()
                .then_with(|| entity.index().cmp(&be.index()))
                .is_lt(),
        };
        if better {
            best = Some((top, entity));
        }
    }

    let (top, entity) = best?;
    Some(PickHit {
        entity,
        distance: 0.0,
        point: Vec3::new(local.x, local.y, top),
    })
}

/// Screen picking wrapper.
///
/// The caller supplies the screen->ray mapping via `make_ray`.
pub fn pick_screen<F>(
    world: &World,
    x_px: f64,
    y_px: f64,
    mut make_ray: F,
    opts: PickOptions,
) -> Option<PickHit>
where
    F: FnMut(f64, f64) -> Option<Ray>,
{
    let ray = make_ray(x_px, y_px)?;
    pick_ray(world, ray, opts)
}

/// Nearest `t >= 0` where `ray` meets the prism `footprint × [bottom, top]`.
fn prism_hit(ray: &Ray, footprint: &Footprint, (bottom, top): (f64, f64)) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut consider = |t: f64| {
        if t >= 0.0 && best.is_none_or(|b| t < b) {
            best = Some(t);
        }
    };

    if ray.dir.z.abs() > 1e-12 {
        for z in [top, bottom] {
            let t = (z - ray.origin.z) / ray.dir.z;
            if t >= 0.0 && footprint.contains_xy(ray.at(t).xy()) {
                consider(t);
            }
        }
    }

    let o = ray.origin.xy();
    let d = ray.dir.xy();
    for (a, b) in footprint.edges() {
        let Some(t) = wall_hit(o, d, a, b) else {
            continue;
        };
        let z = ray.origin.z + ray.dir.z * t;
        if (bottom..=top).contains(&z) {
            consider(t);
        }
    }
    best
}

/// Parameter along the 2D ray `o + t * d` where it crosses segment `a..b`.
fn wall_hit(o: Vec2, d: Vec2, a: Vec2, b: Vec2) -> Option<f64> {
    let e = b - a;
    let denom = d.perp_dot(e);
    if denom.abs() < 1e-12 {
        return None;
    }
    let ao = a - o;
    let t = ao.perp_dot(e) / denom;
    let s = ao.perp_dot(d) / denom;
    (t >= 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
}

/// Convenience for callers holding an `Extrusion` but no world.
pub fn ray_hits_extrusion(ray: &Ray, footprint: &Footprint, extrusion: Extrusion) -> Option<f64> {
    let dir = ray.dir.normalized()?;
    prism_hit(&Ray::new(ray.origin, dir), footprint, extrusion.span())
}
