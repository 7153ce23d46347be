/// Vertical extent of an extruded footprint, in meters above ground.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Extrusion {
    pub base: f64,
    pub height: f64,
}

impl Extrusion {
    pub fn new(base: f64, height: f64) -> Self {
        Self { base, height }
    }

    /// Ordered (bottom, top), tolerating a base above the height.
    pub fn span(&self) -> (f64, f64) {
        (self.base.min(self.height), self.base.max(self.height))
    }
}
