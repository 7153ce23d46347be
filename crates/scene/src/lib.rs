pub mod camera;
pub mod components;
pub mod entity;
pub mod feature_state;
pub mod picking;
pub mod selection;
pub mod spatial;
pub mod world;

pub use world::*;
