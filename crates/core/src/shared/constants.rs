pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Environment variable consulted for the detector model path.
pub const MODEL_ENV_VAR: &str = "FACECAM_MODEL";

/// Smile highlight is drawn only for probabilities strictly above this.
pub const SMILE_THRESHOLD: f32 = 0.5;

/// Sensor mounting of the reference phone: landscape sensor, portrait UI.
pub const DEFAULT_SENSOR_ORIENTATION: i32 = 90;

pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;

/// Frames a track may go unmatched before its id is retired (~1s at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
