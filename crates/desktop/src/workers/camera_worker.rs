use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::{ImageBuffer, Rgb, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use facecam_core::camera::domain::camera_frame::{CameraFrame, PixelFormat};
use facecam_core::camera::domain::image_rotation::ImageRotation;
use facecam_core::camera::infrastructure::pixel_layout::{pack_rgb, rotate_to_sensor};
use facecam_core::session::live_detection_session::{FrameDisposition, LiveDetectionSession};

/// Preview frames waiting for the UI; older ones are skipped when it lags.
const PREVIEW_QUEUE: usize = 2;

pub enum CameraMessage {
    Opened { width: u32, height: u32, fps: u32 },
    Preview(PreviewFrame),
}

/// Upright RGBA pixels for the preview widget.
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct CameraParams {
    pub device_index: u32,
    pub format: PixelFormat,
    pub sensor_orientation: i32,
}

/// Owns the capture thread. Dropping it stops the camera and waits for the
/// thread, which releases its share of the detection session.
///
/// A capture failure travels on its own single-slot channel so a full
/// preview queue can never swallow it.
pub struct CameraHandle {
    pub messages: Receiver<CameraMessage>,
    errors: Receiver<String>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CameraHandle {
    /// The capture failure, if the thread has reported one.
    pub fn take_error(&self) -> Option<String> {
        self.errors.try_recv().ok()
    }

    /// True once the capture thread has exited, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Camera thread panicked");
            }
        }
    }
}

pub fn spawn(params: CameraParams, session: Arc<LiveDetectionSession>) -> CameraHandle {
    spawn_capture(move |tx, stop| {
        run_capture(params, &session, tx, stop)
            .map_err(|e| format!("Camera {}: {e}", params.device_index))
    })
}

fn spawn_capture<F>(capture: F) -> CameraHandle
where
    F: FnOnce(&Sender<CameraMessage>, &AtomicBool) -> Result<(), String> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded::<CameraMessage>(PREVIEW_QUEUE);
    let (error_tx, error_rx) = crossbeam_channel::bounded::<String>(1);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();

    let thread = thread::spawn(move || {
        if let Err(e) = capture(&tx, &stop_clone) {
            log::error!("{e}");
            // The only message ever sent on this channel, so the slot is free.
            let _ = error_tx.try_send(e);
        }
    });

    CameraHandle {
        messages: rx,
        errors: error_rx,
        stop,
        thread: Some(thread),
    }
}

fn run_capture(
    params: CameraParams,
    session: &LiveDetectionSession,
    tx: &Sender<CameraMessage>,
    stop: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = Camera::new(CameraIndex::Index(params.device_index), requested)?;
    camera.open_stream()?;

    let resolution = camera.resolution();
    log::info!(
        "Webcam {} opened: {}x{} @ {} fps",
        params.device_index,
        resolution.width(),
        resolution.height(),
        camera.frame_rate()
    );
    let _ = tx.try_send(CameraMessage::Opened {
        width: resolution.width(),
        height: resolution.height(),
        fps: camera.frame_rate(),
    });

    let rotation = ImageRotation::from_sensor_orientation(params.sensor_orientation);
    let mut index = 0usize;
    while !stop.load(Ordering::Relaxed) {
        let decoded = camera.frame()?.decode_image::<RgbFormat>()?;
        let (w, h) = (decoded.width(), decoded.height());
        let upright: RgbImage = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(w, h, decoded.into_raw())
            .ok_or("webcam frame does not match its resolution")?;

        let frame = to_camera_frame(&upright, rotation, params, index);
        match session.submit_frame(frame) {
            FrameDisposition::Dispatched => log::trace!("Frame {index}: detecting"),
            FrameDisposition::DroppedBusy | FrameDisposition::DroppedDisabled => {}
            FrameDisposition::DroppedClosed => return Err("detection worker stopped".into()),
        }

        let preview = PreviewFrame {
            width: w,
            height: h,
            rgba: image::DynamicImage::ImageRgb8(upright).into_rgba8().into_raw(),
        };
        match tx.try_send(CameraMessage::Preview(preview)) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
        index += 1;
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Failed to stop webcam stream: {e}");
    }
    log::info!("Webcam {} stopped after {index} frames", params.device_index);
    Ok(())
}

/// Lays the upright webcam picture out as a phone sensor mounted at
/// `rotation` would deliver it, in the configured pixel layout.
fn to_camera_frame(
    upright: &RgbImage,
    rotation: ImageRotation,
    params: CameraParams,
    index: usize,
) -> CameraFrame {
    let sensor = rotate_to_sensor(upright.clone(), rotation);
    let (w, h) = sensor.dimensions();
    let planes = pack_rgb(sensor.as_raw(), w, h, params.format);
    CameraFrame::new(planes, w, h, params.sensor_orientation, params.format, index)
}
