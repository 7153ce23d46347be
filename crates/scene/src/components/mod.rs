pub mod attributes;
pub mod bounds;
pub mod extrusion;
pub mod feature;
pub mod footprint;
pub mod visibility;

pub use attributes::*;
pub use bounds::*;
pub use extrusion::*;
pub use feature::*;
pub use footprint::*;
pub use visibility::*;
