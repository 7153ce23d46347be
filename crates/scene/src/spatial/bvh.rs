use foundation::bounds::Aabb3;
use foundation::math::precision::stable_total_cmp_f64;

use crate::entity::EntityId;

/// Bounding volume hierarchy over extruded feature boxes.
///
/// Queries return entities in ascending `EntityId::index()` order regardless of
/// the order items were inserted in.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { bounds: Aabb3, items: Vec<Item> },
    Internal { bounds: Aabb3, left: usize, right: usize },
}

impl Node {
    fn bounds(&self) -> &Aabb3 {
        match self {
            Node::Leaf { bounds, .. } | Node::Internal { bounds, .. } => bounds,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Item {
    pub entity: EntityId,
    pub bounds: Aabb3,
}

const LEAF_MAX: usize = 8;

impl Bvh {
    pub fn build(mut items: Vec<Item>) -> Self {
        let mut nodes = Vec::new();
        if !items.is_empty() {
            build_node(&mut nodes, &mut items);
        }
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn query_aabb(&self, query: &Aabb3) -> Vec<EntityId> {
        self.collect(|b| b.intersects(query))
    }

    /// Entities whose boxes the ray `origin + t * dir` enters for some `t` in `[t_min, t_max]`.
    pub fn query_ray(&self, origin: [f64; 3], dir: [f64; 3], t_min: f64, t_max: f64) -> Vec<EntityId> {
        self.collect(|b| ray_aabb_entry(origin, dir, b, t_min, t_max).is_some())
    }

    fn collect(&self, mut test: impl FnMut(&Aabb3) -> bool) -> Vec<EntityId> {
        let mut hits = Vec::new();
        if self.nodes.is_empty() {
            return hits;
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !test(node.bounds()) {
                continue;
            }
            match node {
                Node::Leaf { items, .. } => {
                    hits.extend(items.iter().filter(|i| test(&i.bounds)).map(|i| i.entity));
                }
                Node::Internal { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        hits.sort_by_key(|e| e.index());
        hits.dedup();
        hits
    }
}

fn build_node(nodes: &mut Vec<Node>, items: &mut [Item]) -> usize {
    let bounds = items[1..]
        .iter()
        .fold(items[0].bounds, |acc, item| acc.union(&item.bounds));

    if items.len() <= LEAF_MAX {
        nodes.push(Node::Leaf {
            bounds,
            items: items.to_vec(),
        });
        return nodes.len() - 1;
    }

    let axis = longest_axis(&bounds);
    items.sort_by(|a, b| {
        stable_total_cmp_f64(centroid(&a.bounds, axis), centroid(&b.bounds, axis))
            .then_with(|| a.entity.index().cmp(&b.entity.index()))
    });

    let idx = nodes.len();
    // Patched once both children exist.
    nodes.push(Node::Leaf {
        bounds,
        items: Vec::new(),
    });
    let (left_items, right_items) = items.split_at_mut(items.len() / 2);
    let left = build_node(nodes, left_items);
    let right = build_node(nodes, right_items);
    nodes[idx] = Node::Internal {
        bounds,
        left,
        right,
    };
    idx
}

fn centroid(aabb: &Aabb3, axis: usize) -> f64 {
    (aabb.min[axis] + aabb.max[axis]) * 0.5
}

/// Ties prefer x, then y.
fn longest_axis(bounds: &Aabb3) -> usize {
    let ex = bounds.max[0] - bounds.min[0];
    let ey = bounds.max[1] - bounds.min[1];
    let ez = bounds.max[2] - bounds.min[2];
    if ex >= ey && ex >= ez {
        0
    } else if ey >= ez {
        1
    } else {
        2
    }
}

/// Slab test. Returns the parameter at which the ray enters `aabb`, clamped to `t_min`.
pub fn ray_aabb_entry(
    origin: [f64; 3],
    dir: [f64; 3],
    aabb: &Aabb3,
    mut t_min: f64,
    mut t_max: f64,
) -> Option<f64> {
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let (min, max) = (aabb.min[axis], aabb.max[axis]);

        if d.abs() < 1e-12 {
            if o < min || o > max {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (min - o) * inv;
        let mut t2 = (max - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_max < t_min {
            return None;
        }
    }
    Some(t_min)
}

#[cfg(test)]
mod tests {
    use super::{Bvh, Item, ray_aabb_entry};
    use crate::entity::EntityId;
    use foundation::bounds::Aabb3;

    fn e(idx: u32) -> EntityId {
        EntityId::from_index(idx)
    }

    fn building(idx: u32, x: f64, height: f64) -> Item {
        Item {
            entity: e(idx),
            bounds: Aabb3::new([x, 0.0, 0.0], [x + 10.0, 10.0, height]),
        }
    }

    #[test]
    fn query_returns_entities_in_index_order() {
        let bvh = Bvh::build(vec![
            building(2, 100.0, 15.0),
            building(1, 0.0, 15.0),
            building(3, 5.0, 30.0),
        ]);
        let hits = bvh.query_aabb(&Aabb3::new([2.0, 2.0, 0.0], [12.0, 8.0, 1.0]));
        assert_eq!(hits, vec![e(1), e(3)]);
    }

    #[test]
    fn ray_query_matches_across_many_leaves() {
        let items: Vec<Item> = (0..40).map(|i| building(i, f64::from(i) * 20.0, 15.0)).collect();
        let mut reversed = items.clone();
        reversed.reverse();

        // Straight down onto the 6th building.
        let origin = [105.0, 5.0, 500.0];
        let dir = [0.0, 0.0, -1.0];
        let a = Bvh::build(items).query_ray(origin, dir, 0.0, f64::INFINITY);
        let b = Bvh::build(reversed).query_ray(origin, dir, 0.0, f64::INFINITY);
        assert_eq!(a, vec![e(5)]);
        assert_eq!(a, b);
    }

    #[test]
    fn slab_entry_distance() {
        let aabb = Aabb3::new([4.0, -1.0, -1.0], [6.0, 1.0, 1.0]);
        assert_eq!(ray_aabb_entry([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], &aabb, 0.0, 100.0), Some(4.0));
        assert_eq!(ray_aabb_entry([0.0, 5.0, 0.0], [1.0, 0.0, 0.0], &aabb, 0.0, 100.0), None);
        assert_eq!(ray_aabb_entry([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], &aabb, 0.0, 3.0), None);
    }

    #[test]
    fn empty_tree_has_no_hits() {
        let bvh = Bvh::build(Vec::new());
        assert!(bvh.is_empty());
        assert!(bvh.query_ray([0.0; 3], [0.0, 0.0, -1.0], 0.0, 1.0).is_empty());
    }
}
