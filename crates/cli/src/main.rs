mod render;

use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{select, Receiver, Sender};

use facecam_core::camera::domain::camera_frame::{CameraFrame, PixelFormat};
use facecam_core::camera::domain::frame_source::{FrameSource, FrameSourceError};
use facecam_core::camera::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facecam_core::camera::infrastructure::image_sequence_source::{is_image, ImageSequenceSource};
use facecam_core::detection::domain::detector_options::FaceDetectorOptions;
use facecam_core::detection::domain::face_detector::FaceDetector;
use facecam_core::detection::infrastructure::model_resolver;
use facecam_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facecam_core::overlay::domain::overlay_painter::OverlayStyle;
use facecam_core::session::live_detection_session::{
    DetectionEvent, FrameDisposition, LiveDetectionSession,
};
use facecam_core::session::overlay_state::OverlayState;
use facecam_core::session::session_logger::LogSessionLogger;
use facecam_core::shared::constants::{BLAZEFACE_MODEL_NAME, DEFAULT_SENSOR_ORIENTATION};

use render::{OverlayRenderer, RunReport};

/// Replays images or a video as a live camera feed and renders the face overlay.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Input image, directory of images, or video file.
    input: PathBuf,

    /// Directory for rendered overlay frames.
    output_dir: PathBuf,

    /// Preview widget width in pixels.
    #[arg(long, default_value = "400")]
    widget_width: u32,

    /// Preview widget height in pixels.
    #[arg(long, default_value = "800")]
    widget_height: u32,

    /// Sensor orientation in degrees (0, 90, 180, 270). Images default to 90;
    /// videos default to their rotation metadata.
    #[arg(long)]
    sensor_orientation: Option<i32>,

    /// Camera pixel layout: nv21, yuv420, bgra8888 or rgb888.
    #[arg(long, default_value = "nv21")]
    format: PixelFormat,

    /// BlazeFace ONNX model (falls back to FACECAM_MODEL, then the cache dir).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f32,

    /// Smallest face to report, as a fraction of the upright frame width.
    #[arg(long, default_value = "0.1")]
    min_face_size: f32,

    /// Skip keypoint contours.
    #[arg(long)]
    no_contours: bool,

    /// Assign stable ids to faces across detections.
    #[arg(long)]
    tracking: bool,

    /// Playback rate for image sequences.
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Feed frames as fast as they decode instead of at the source rate.
    #[arg(long)]
    no_pacing: bool,

    /// Start with detection switched off (frames are still rendered).
    #[arg(long)]
    detection_off: bool,

    /// Write a JSON report of every repaint and the session counters.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let options = detector_options(&cli);
    validate(&cli, &options)?;

    std::fs::create_dir_all(&cli.output_dir)?;
    let detector = build_detector(&cli, options)?;

    let mut source = open_source(&cli.input, &cli);
    let metadata = source.open(&cli.input)?;
    log::info!(
        "Camera: {}x{} @ {:.1} fps, sensor orientation {}",
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.sensor_orientation
    );
    let frame_interval = (!cli.no_pacing && metadata.fps > 0.0)
        .then(|| Duration::from_secs_f64(1.0 / metadata.fps));

    let (session, events) = LiveDetectionSession::start(
        detector,
        !cli.detection_off,
        Box::new(LogSessionLogger::default()),
    );
    let mut state = OverlayState::new(!cli.detection_off);
    let mut renderer = OverlayRenderer::new(
        &cli.output_dir,
        cli.widget_width,
        cli.widget_height,
        OverlayStyle::default(),
    );

    let (preview_tx, preview_rx) = crossbeam_channel::unbounded::<CameraFrame>();
    let (ui_result, camera_result) = std::thread::scope(|s| {
        let camera = s.spawn(|| run_camera(source.as_mut(), &session, preview_tx, frame_interval));
        let ui = run_ui(&session, &preview_rx, &events, &mut state, &mut renderer);
        let camera: Result<(), Box<dyn std::error::Error>> = match camera.join() {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err("camera thread panicked".into()),
        };
        (ui, camera)
    });
    source.close();
    let stats = session.stats();
    drop(session);
    ui_result?;
    camera_result?;

    log::info!(
        "{} frames: {} detected, {} dropped busy, {} dropped disabled, {} dropped closed, {} failed",
        stats.received,
        stats.completed,
        stats.dropped_busy,
        stats.dropped_disabled,
        stats.dropped_closed,
        stats.failed
    );
    log::info!(
        "{} overlay frames written to {}",
        renderer.entries().len(),
        cli.output_dir.display()
    );

    if let Some(report_path) = &cli.report {
        let report = RunReport {
            stats,
            renders: renderer.entries(),
        };
        std::fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
        log::info!("Report written to {}", report_path.display());
    }
    Ok(())
}

/// Camera callback thread: every frame goes to the preview and is offered to
/// the detection session. A decode failure ends the stream and is returned.
fn run_camera(
    source: &mut dyn FrameSource,
    session: &LiveDetectionSession,
    preview_tx: Sender<CameraFrame>,
    frame_interval: Option<Duration>,
) -> Result<(), FrameSourceError> {
    let mut next_due = Instant::now();
    for frame_result in source.frames() {
        let frame = frame_result?;
        if let Some(interval) = frame_interval {
            let now = Instant::now();
            if next_due > now {
                std::thread::sleep(next_due - now);
            }
            next_due += interval;
        }

        let index = frame.index();
        if preview_tx.send(frame.clone()).is_err() {
            break;
        }
        match session.submit_frame(frame) {
            FrameDisposition::Dispatched => log::debug!("Frame {index}: detecting"),
            FrameDisposition::DroppedBusy => log::trace!("Frame {index}: detector busy"),
            FrameDisposition::DroppedDisabled => log::trace!("Frame {index}: detection off"),
            FrameDisposition::DroppedClosed => log::warn!("Frame {index}: detector stopped"),
        }
    }
    Ok(())
}

/// UI thread: keeps the newest frame and repaints whenever the overlay state
/// changes. Returns once the camera has finished and no detection is pending.
fn run_ui(
    session: &LiveDetectionSession,
    preview_rx: &Receiver<CameraFrame>,
    events: &Receiver<DetectionEvent>,
    state: &mut OverlayState,
    renderer: &mut OverlayRenderer,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut latest: Option<CameraFrame> = None;
    let mut painted_revision = None;

    loop {
        select! {
            recv(preview_rx) -> msg => match msg {
                Ok(frame) => {
                    if painted_revision.is_none() {
                        renderer.repaint(Some(&frame), state)?;
                        painted_revision = Some(state.revision());
                    }
                    latest = Some(frame);
                }
                Err(_) => break,
            },
            recv(events) -> msg => {
                if let Ok(event) = msg {
                    on_event(event, latest.as_ref(), state, renderer)?;
                }
            },
        }
    }

    // Camera is done; let the outstanding detection publish.
    loop {
        match events.recv_timeout(Duration::from_millis(20)) {
            Ok(event) => on_event(event, latest.as_ref(), state, renderer)?,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) if session.is_busy() => {}
            Err(_) => break,
        }
    }
    while let Ok(event) = events.try_recv() {
        on_event(event, latest.as_ref(), state, renderer)?;
    }
    Ok(())
}

fn on_event(
    event: DetectionEvent,
    frame: Option<&CameraFrame>,
    state: &mut OverlayState,
    renderer: &mut OverlayRenderer,
) -> Result<(), Box<dyn std::error::Error>> {
    state.apply(event);
    renderer.repaint(frame, state)?;
    if let Some(notice) = state.notice() {
        log::warn!("{notice}");
        // No one to click it away; the notice lives for exactly one repaint.
        state.dismiss_notice();
    }
    Ok(())
}

fn detector_options(cli: &Cli) -> FaceDetectorOptions {
    FaceDetectorOptions {
        confidence: cli.confidence,
        min_face_size: cli.min_face_size,
        enable_contours: !cli.no_contours,
        enable_tracking: cli.tracking,
        ..Default::default()
    }
}

fn build_detector(
    cli: &Cli,
    options: FaceDetectorOptions,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let bundled = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")));
    let model_path =
        model_resolver::resolve(BLAZEFACE_MODEL_NAME, cli.model.as_deref(), bundled.as_deref())?;
    Ok(Box::new(OnnxBlazefaceDetector::new(&model_path, options)?))
}

fn open_source(input: &Path, cli: &Cli) -> Box<dyn FrameSource> {
    if input.is_dir() || is_image(input) {
        let orientation = cli.sensor_orientation.unwrap_or(DEFAULT_SENSOR_ORIENTATION);
        Box::new(ImageSequenceSource::new(cli.format, orientation, cli.fps))
    } else {
        Box::new(FfmpegFrameSource::new(cli.format, cli.sensor_orientation))
    }
}

fn validate(cli: &Cli, options: &FaceDetectorOptions) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if cli.widget_width == 0 || cli.widget_height == 0 {
        return Err(format!(
            "Widget size must be positive, got {}x{}",
            cli.widget_width, cli.widget_height
        )
        .into());
    }
    if let Some(degrees) = cli.sensor_orientation {
        if ![0, 90, 180, 270].contains(&degrees) {
            log::warn!("Sensor orientation {degrees} is not a right angle; treating as 0");
        }
    }
    if cli.fps <= 0.0 {
        return Err(format!("FPS must be positive, got {}", cli.fps).into());
    }
    options.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecam_core::camera::domain::camera_frame::Plane;
    use facecam_core::camera::domain::frame_source::SourceMetadata;
    use facecam_core::detection::domain::detected_face::DetectedFace;
    use facecam_core::detection::domain::detection_error::DetectionError;
    use facecam_core::detection::domain::input_image::InputImage;
    use facecam_core::session::session_logger::NullSessionLogger;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("facecam").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["in.png", "out"]);
        assert_eq!((cli.widget_width, cli.widget_height), (400, 800));
        assert_eq!(cli.format, PixelFormat::Nv21);
        assert!(cli.sensor_orientation.is_none());

        let options = detector_options(&cli);
        assert!(options.enable_contours);
        assert!(!options.enable_tracking);
    }

    #[test]
    fn test_format_parses_aliases() {
        let cli = parse(&["in.png", "out", "--format", "bgra"]);
        assert_eq!(cli.format, PixelFormat::Bgra8888);
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        let cli = parse(&["/definitely/missing.png", "out"]);
        let err = validate(&cli, &detector_options(&cli)).unwrap_err();
        assert!(err.to_string().contains("Input not found"));
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        let cli = parse(&[input, "out", "--confidence", "1.5"]);
        assert!(validate(&cli, &detector_options(&cli)).is_err());
    }

    #[test]
    fn test_directory_input_uses_image_source() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(4, 2)
            .save(dir.path().join("a.png"))
            .unwrap();
        let cli = parse(&[dir.path().to_str().unwrap(), "out"]);
        let mut source = open_source(&cli.input, &cli);
        let meta = source.open(&cli.input).unwrap();
        assert_eq!(meta.sensor_orientation, DEFAULT_SENSOR_ORIENTATION);
        assert_eq!(meta.total_frames, Some(1));
    }

    /// Yields one good frame, then a decode error.
    struct BrokenSource;

    impl FrameSource for BrokenSource {
        fn open(&mut self, _path: &Path) -> Result<SourceMetadata, FrameSourceError> {
            Err(FrameSourceError::NotOpened)
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<CameraFrame, FrameSourceError>> + '_> {
            let good = CameraFrame::new(
                vec![Plane::new(vec![0; 4 * 2 * 3], 4 * 3)],
                4,
                2,
                90,
                PixelFormat::Rgb888,
                0,
            );
            let bad = FrameSourceError::Decode {
                path: PathBuf::from("clip.mp4"),
                message: "corrupt packet".into(),
            };
            Box::new(vec![Ok(good), Err(bad)].into_iter())
        }

        fn close(&mut self) {}
    }

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn detect(&mut self, _image: &InputImage) -> Result<Vec<DetectedFace>, DetectionError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_run_camera_returns_decode_error() {
        let (session, _events) =
            LiveDetectionSession::start(Box::new(NoFaces), true, Box::new(NullSessionLogger));
        let (preview_tx, preview_rx) = crossbeam_channel::unbounded();

        let err = run_camera(&mut BrokenSource, &session, preview_tx, None).unwrap_err();

        assert!(err.to_string().contains("corrupt packet"));
        assert_eq!(preview_rx.try_iter().count(), 1);
        assert_eq!(session.stats().received, 1);
    }
}
