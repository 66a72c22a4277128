pub mod camera;
pub mod detection;
pub mod overlay;
pub mod session;
pub mod shared;
