pub mod detected_face;
pub mod detection_error;
pub mod detector_options;
pub mod face_detector;
pub mod input_image;
