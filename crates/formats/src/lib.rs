pub mod feature;
pub mod geojson;
pub mod ingest;
pub mod mvt;
pub mod tileset;

pub use feature::*;
pub use geojson::*;
pub use ingest::*;
pub use mvt::*;
pub use tileset::*;
