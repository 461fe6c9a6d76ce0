pub mod curve;
pub mod surface;
