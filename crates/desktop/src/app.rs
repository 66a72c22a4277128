use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use iced::widget::{button, column, container, image, row, text};
use iced::{Element, Length, Subscription, Task, Theme};

use facecam_core::camera::domain::camera_frame::PixelFormat;
use facecam_core::detection::infrastructure::model_resolver;
use facecam_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facecam_core::session::live_detection_session::{DetectionEvent, LiveDetectionSession};
use facecam_core::session::overlay_state::OverlayState;
use facecam_core::session::session_logger::NullSessionLogger;
use facecam_core::shared::constants::BLAZEFACE_MODEL_NAME;

use crate::settings::{Appearance, Settings};
use crate::tabs;
use crate::theme;
use crate::workers::camera_worker::{self, CameraHandle, CameraMessage, CameraParams};

/// Roughly one UI refresh per display frame.
const TICK: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// Tab enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Preview,
    Settings,
}

impl Tab {
    const ALL: &[Tab] = &[Tab::Preview, Tab::Settings];

    fn label(self) -> &'static str {
        match self {
            Tab::Preview => "Camera",
            Tab::Settings => "Settings",
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    Tick,
    StartCamera,
    StopCamera,
    ToggleDetection,
    DismissNotice,
    SelectModel,
    ModelSelected(Option<PathBuf>),
    CameraIndexChanged(u32),
    PixelFormatChanged(PixelFormat),
    OrientationChanged(i32),
    ConfidenceChanged(u32),
    MinFaceSizeChanged(u32),
    ContoursChanged(bool),
    TrackingChanged(bool),
    PreviewWidthChanged(u32),
    AppearanceChanged(Appearance),
    RestoreDefaults,
    PollSystemTheme,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraState {
    Stopped,
    Running,
    Error(String),
}

/// Latest upright camera picture, ready for the image widget.
pub struct Preview {
    pub handle: image::Handle,
    pub width: u32,
    pub height: u32,
}

pub struct App {
    active_tab: Tab,
    pub settings: Settings,
    // Declared before `session`: the camera thread holds a session clone and
    // must be gone before the session joins its worker.
    camera: Option<CameraHandle>,
    session: Option<Arc<LiveDetectionSession>>,
    events: Option<Receiver<DetectionEvent>>,
    pub overlay: OverlayState,
    pub preview: Option<Preview>,
    pub camera_state: CameraState,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let overlay = OverlayState::new(settings.detection_on_start);
        (
            Self {
                active_tab: Tab::Preview,
                settings,
                camera: None,
                session: None,
                events: None,
                overlay,
                preview: None,
                camera_state: CameraState::Stopped,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.active_tab = tab;
            }
            Message::Tick => self.poll_workers(),
            Message::StartCamera => self.start_camera(),
            Message::StopCamera => self.stop_camera(),
            Message::ToggleDetection => {
                let enabled = !self.overlay.detection_enabled();
                self.overlay.set_detection_enabled(enabled);
                if let Some(session) = &self.session {
                    session.set_detection_enabled(enabled);
                }
            }
            Message::DismissNotice => self.overlay.dismiss_notice(),
            Message::SelectModel => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Select BlazeFace model")
                            .add_filter("ONNX model", &["onnx"])
                            .pick_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::ModelSelected,
                );
            }
            Message::ModelSelected(Some(path)) => {
                self.settings.model_path = Some(path);
                self.settings_changed(true);
            }
            Message::ModelSelected(None) => {}
            Message::CameraIndexChanged(index) => {
                self.settings.camera_index = index;
                self.settings_changed(true);
            }
            Message::PixelFormatChanged(format) => {
                self.settings.pixel_format = format;
                self.settings_changed(true);
            }
            Message::OrientationChanged(degrees) => {
                self.settings.sensor_orientation = degrees;
                self.settings_changed(true);
            }
            Message::ConfidenceChanged(val) => {
                self.settings.confidence = val;
                self.settings_changed(true);
            }
            Message::MinFaceSizeChanged(val) => {
                self.settings.min_face_size = val;
                self.settings_changed(true);
            }
            Message::ContoursChanged(enabled) => {
                self.settings.enable_contours = enabled;
                self.settings_changed(true);
            }
            Message::TrackingChanged(enabled) => {
                self.settings.enable_tracking = enabled;
                self.settings_changed(true);
            }
            Message::PreviewWidthChanged(width) => {
                self.settings.preview_width = width;
                self.settings_changed(false);
            }
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings_changed(false);
            }
            Message::RestoreDefaults => {
                let appearance = self.settings.appearance;
                self.settings = Settings {
                    appearance,
                    ..Settings::default()
                };
                self.settings_changed(true);
            }
            Message::PollSystemTheme => {
                // Theme is resolved fresh in theme() on every render,
                // so just requesting a redraw is enough.
            }
        }
        Task::none()
    }

    /// Persists settings; pipeline changes restart a running camera.
    fn settings_changed(&mut self, restart: bool) {
        self.settings.save();
        if restart && self.camera_state == CameraState::Running {
            self.stop_camera();
            self.start_camera();
        }
    }

    fn start_camera(&mut self) {
        self.stop_camera();
        match self.build_session() {
            Ok((session, events)) => {
                let session = Arc::new(session);
                let params = CameraParams {
                    device_index: self.settings.camera_index,
                    format: self.settings.pixel_format,
                    sensor_orientation: self.settings.sensor_orientation,
                };
                self.camera = Some(camera_worker::spawn(params, Arc::clone(&session)));
                self.session = Some(session);
                self.events = Some(events);
                self.camera_state = CameraState::Running;
            }
            Err(e) => {
                log::error!("Cannot start camera: {e}");
                self.camera_state = CameraState::Error(e.to_string());
            }
        }
    }

    fn build_session(
        &self,
    ) -> Result<(LiveDetectionSession, Receiver<DetectionEvent>), Box<dyn std::error::Error>> {
        let bundled = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("models")));
        let model_path = model_resolver::resolve(
            BLAZEFACE_MODEL_NAME,
            self.settings.model_path.as_deref(),
            bundled.as_deref(),
        )?;
        let detector = OnnxBlazefaceDetector::new(&model_path, self.settings.detector_options())?;
        Ok(LiveDetectionSession::start(
            Box::new(detector),
            self.overlay.detection_enabled(),
            Box::new(NullSessionLogger),
        ))
    }

    fn stop_camera(&mut self) {
        // Order matters: camera thread first, then the session joins its worker.
        self.camera = None;
        self.session = None;
        self.events = None;
        if self.camera_state == CameraState::Running {
            self.camera_state = CameraState::Stopped;
        }
    }

    /// Drains camera and detection channels on the UI thread.
    fn poll_workers(&mut self) {
        let mut camera_error = None;
        if let Some(camera) = &self.camera {
            for message in camera.messages.try_iter() {
                match message {
                    CameraMessage::Opened { width, height, fps } => {
                        log::debug!("Preview stream {width}x{height} @ {fps} fps");
                    }
                    CameraMessage::Preview(frame) => {
                        self.preview = Some(Preview {
                            handle: image::Handle::from_rgba(frame.width, frame.height, frame.rgba),
                            width: frame.width,
                            height: frame.height,
                        });
                    }
                }
            }
            // The thread reports its error before exiting, so check liveness first.
            if camera.is_finished() {
                camera_error = Some(
                    camera
                        .take_error()
                        .unwrap_or_else(|| "Camera stream ended unexpectedly".to_string()),
                );
            }
        }

        if let Some(events) = &self.events {
            for event in events.try_iter() {
                self.overlay.apply(event);
            }
        }

        if let Some(e) = camera_error {
            self.stop_camera();
            self.camera_state = CameraState::Error(e);
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let tab_bar = row(Tab::ALL
            .iter()
            .map(|&tab| {
                let btn = button(text(tab.label()).size(13))
                    .on_press(Message::TabSelected(tab))
                    .padding([6, 14]);
                if tab == self.active_tab {
                    btn.style(button::primary).into()
                } else {
                    btn.style(button::text).into()
                }
            })
            .collect::<Vec<_>>())
        .spacing(2);

        let content: Element<'_, Message> = match self.active_tab {
            Tab::Preview => tabs::preview_tab::view(
                &self.settings,
                &self.overlay,
                self.preview.as_ref(),
                &self.camera_state,
            ),
            Tab::Settings => tabs::settings_tab::view(&self.settings),
        };

        column![
            tab_bar,
            container(content).padding(16).height(Length::Fill)
        ]
        .height(Length::Fill)
        .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let tick = if self.camera.is_some() {
            iced::time::every(TICK).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };
        let theme_poll = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };
        Subscription::batch([tick, theme_poll])
    }
}
