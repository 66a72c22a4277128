/// Clockwise rotation that turns the sensor image upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl ImageRotation {
    /// Maps a sensor orientation in degrees to a rotation state.
    ///
    /// Total: anything other than 0/90/180/270 maps to `Rotation0`.
    pub fn from_sensor_orientation(degrees: i32) -> Self {
        match degrees {
            90 => ImageRotation::Rotation90,
            180 => ImageRotation::Rotation180,
            270 => ImageRotation::Rotation270,
            _ => ImageRotation::Rotation0,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            ImageRotation::Rotation0 => 0,
            ImageRotation::Rotation90 => 90,
            ImageRotation::Rotation180 => 180,
            ImageRotation::Rotation270 => 270,
        }
    }

    /// True when the upright image has width and height exchanged.
    pub fn swaps_axes(self) -> bool {
        matches!(self, ImageRotation::Rotation90 | ImageRotation::Rotation270)
    }
}
