use foundation::bounds::Aabb2;
use foundation::math::Vec2;

/// One polygon: the first ring is the outer boundary, the rest are holes.
///
/// Rings are stored open (no repeated closing vertex), in local meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub rings: Vec<Vec<Vec2>>,
}

impl Polygon {
    pub fn new(rings: Vec<Vec<Vec2>>) -> Self {
        let rings = rings
            .into_iter()
            .map(|mut ring| {
                drop_closing_duplicate(&mut ring);
                ring
            })
            .filter(|ring| ring.len() >= 3)
            .collect();
        Self { rings }
    }

    pub fn outer(&self) -> Option<&[Vec2]> {
        self.rings.first().map(Vec::as_slice)
    }

    /// Even-odd containment over all rings, so holes are excluded.
    pub fn contains(&self, p: Vec2) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            if ring_crossings_odd(ring, p) {
                inside = !inside;
            }
        }
        inside
    }
}

/// Ground footprint of a feature: a polygon or a multi-polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    pub polygons: Vec<Polygon>,
}

impl Footprint {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self {
            polygons: polygons
                .into_iter()
                .filter(|p| !p.rings.is_empty())
                .collect(),
        }
    }

    /// Axis-aligned rectangle footprint, counter-clockwise.
    pub fn rect(min: Vec2, max: Vec2) -> Self {
        Self::new(vec![Polygon::new(vec![vec![
            Vec2::new(min.x, min.y),
            Vec2::new(max.x, min.y),
            Vec2::new(max.x, max.y),
            Vec2::new(min.x, max.y),
        ]])])
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn contains_xy(&self, p: Vec2) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_points(
            self.polygons
                .iter()
                .flat_map(|poly| poly.rings.iter().flatten())
                .map(|v| [v.x, v.y]),
        )
    }

    /// Every ring edge (a, b), including the closing edge of each ring.
    pub fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.polygons
            .iter()
            .flat_map(|poly| poly.rings.iter())
            .flat_map(|ring| {
                let n = ring.len();
                (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
            })
    }
}

/// Shoelace signed area; positive for counter-clockwise rings (y up).
pub fn ring_signed_area(ring: &[Vec2]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        acc += ring[i].perp_dot(ring[(i + 1) % n]);
    }
    acc * 0.5
}

fn ring_crossings_odd(ring: &[Vec2], p: Vec2) -> bool {
    let n = ring.len();
    let mut odd = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_at = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_at {
                odd = !odd;
            }
        }
        j = i;
    }
    odd
}

fn drop_closing_duplicate(points: &mut Vec<Vec2>) {
    if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied())
        && points.len() >= 2
        && (first.x - last.x).abs() < 1e-9
        && (first.y - last.y).abs() < 1e-9
    {
        points.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::{Footprint, Polygon, ring_signed_area};
    use foundation::math::Vec2;

    fn square(min: f64, max: f64) -> Vec<Vec2> {
        vec![
            Vec2::new(min, min),
            Vec2::new(max, min),
            Vec2::new(max, max),
            Vec2::new(min, max),
            Vec2::new(min, min),
        ]
    }

    #[test]
    fn closing_vertex_is_dropped() {
        let poly = Polygon::new(vec![square(0.0, 10.0)]);
        assert_eq!(poly.outer().map(<[Vec2]>::len), Some(4));
    }

    #[test]
    fn holes_are_excluded() {
        let footprint = Footprint::new(vec![Polygon::new(vec![square(0.0, 10.0), square(4.0, 6.0)])]);
        assert!(footprint.contains_xy(Vec2::new(1.0, 1.0)));
        assert!(!footprint.contains_xy(Vec2::new(5.0, 5.0)));
        assert!(!footprint.contains_xy(Vec2::new(11.0, 5.0)));
    }

    #[test]
    fn degenerate_rings_are_discarded() {
        let footprint = Footprint::new(vec![Polygon::new(vec![vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
        ]])]);
        assert!(footprint.is_empty());
        assert!(footprint.bounds().is_none());
    }

    #[test]
    fn edges_close_each_ring() {
        let footprint = Footprint::rect(Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0));
        let edges: Vec<_> = footprint.edges().collect();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[3], (Vec2::new(0.0, 1.0), Vec2::new(0.0, 0.0)));
        assert_eq!(ring_signed_area(&footprint.polygons[0].rings[0]), 2.0);
    }
}
