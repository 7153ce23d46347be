pub mod buildings;
pub mod expression;
pub mod layer;
pub mod raster;
pub mod source;
pub mod style;
pub mod symbology;
pub mod tileset;

pub use layer::*;
