pub mod detection_gate;
pub mod live_detection_session;
pub mod overlay_state;
pub mod session_logger;
