pub mod ffmpeg_frame_source;
pub mod image_sequence_source;
pub mod pixel_layout;
