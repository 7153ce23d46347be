pub mod ecef;
pub mod geodesy;
pub mod local;
pub mod mercator;
pub mod precision;
pub mod vec;

pub use ecef::*;
pub use geodesy::*;
pub use local::*;
pub use mercator::*;
pub use precision::*;
pub use vec::*;
