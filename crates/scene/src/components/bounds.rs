use foundation::bounds::Aabb3;
use foundation::math::Vec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ComponentBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ComponentBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    pub fn to_aabb(&self) -> Aabb3 {
        Aabb3::new(self.min.as_array(), self.max.as_array())
    }
}

impl From<Aabb3> for ComponentBounds {
    fn from(b: Aabb3) -> Self {
        Self::new(
            Vec3::new(b.min[0], b.min[1], b.min[2]),
            Vec3::new(b.max[0], b.max[1], b.max[2]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ComponentBounds;
    use foundation::bounds::Aabb3;
    use foundation::math::Vec3;

    #[test]
    fn contains_point_inside() {
        let bounds = ComponentBounds::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(bounds.contains(Vec3::new(0.5, 0.0, -0.5)));
        assert!(!bounds.contains(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn converts_to_and_from_aabb() {
        let aabb = Aabb3::new([0.0, 1.0, 2.0], [3.0, 4.0, 5.0]);
        assert_eq!(ComponentBounds::from(aabb).to_aabb(), aabb);
    }
}
