pub mod camera_frame;
pub mod frame_assembler;
pub mod frame_source;
pub mod image_rotation;
