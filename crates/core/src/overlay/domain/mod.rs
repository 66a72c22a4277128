pub mod coordinate_scaler;
pub mod overlay_painter;
