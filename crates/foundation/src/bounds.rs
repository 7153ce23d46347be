/// Axis-aligned bounding boxes
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut out = Aabb2::new(first, first);
        for p in iter {
            for axis in 0..2 {
                out.min[axis] = out.min[axis].min(p[axis]);
                out.max[axis] = out.max[axis].max(p[axis]);
            }
        }
        Some(out)
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    pub fn intersects(&self, other: &Aabb2) -> bool {
        (0..2).all(|axis| self.min[axis] <= other.max[axis] && self.max[axis] >= other.min[axis])
    }
}

impl Aabb3 {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Aabb3 { min, max }
    }

    /// Extrudes a 2D box between `z_min` and `z_max`.
    pub fn from_footprint(footprint: Aabb2, z_min: f64, z_max: f64) -> Self {
        Aabb3 {
            min: [footprint.min[0], footprint.min[1], z_min.min(z_max)],
            max: [footprint.max[0], footprint.max[1], z_min.max(z_max)],
        }
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    pub fn intersects(&self, other: &Aabb3) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && self.max[axis] >= other.min[axis])
    }

    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = out.min[axis].min(other.min[axis]);
            out.max[axis] = out.max[axis].max(other.max[axis]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Aabb2, Aabb3};

    #[test]
    fn from_points_spans_all_inputs() {
        let b = Aabb2::from_points([[1.0, 5.0], [-2.0, 3.0], [4.0, -1.0]]).expect("bounds");
        assert_eq!(b, Aabb2::new([-2.0, -1.0], [4.0, 5.0]));
        assert!(Aabb2::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn extruded_box_intersection() {
        let footprint = Aabb2::new([0.0, 0.0], [10.0, 10.0]);
        let a = Aabb3::from_footprint(footprint, 0.0, 15.0);
        let b = Aabb3::new([9.0, 9.0, 14.0], [20.0, 20.0, 30.0]);
        let c = Aabb3::new([11.0, 0.0, 0.0], [12.0, 1.0, 1.0]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains([5.0, 5.0, 15.0]));
        assert_eq!(a.union(&c).max, [12.0, 10.0, 15.0]);
    }
}
