// src/utils/mod.rs
pub mod geo;
pub mod id_generator;

pub use geo::GeoPoint;
pub use id_generator::{IdGenerator, IdType};
