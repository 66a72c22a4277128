pub mod constants;
pub mod geometry;
