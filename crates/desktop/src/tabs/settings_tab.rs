use iced::widget::{button, checkbox, column, pick_list, row, slider, text, Space};
use iced::Element;

use facecam_core::camera::domain::camera_frame::PixelFormat;

use crate::app::Message;
use crate::settings::{Appearance, Settings, ORIENTATIONS};

const CAMERA_INDICES: &[u32] = &[0, 1, 2, 3];

pub fn view<'a>(settings: &'a Settings) -> Element<'a, Message> {
    let model_label = settings
        .model_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "Automatic (FACECAM_MODEL or cache)".to_string());

    column![
        text("Camera").size(16),
        Space::new().height(8),
        labeled(
            "Device",
            pick_list(CAMERA_INDICES, Some(settings.camera_index), Message::CameraIndexChanged)
                .text_size(13)
                .into(),
        ),
        labeled(
            "Pixel format",
            pick_list(PixelFormat::ALL, Some(settings.pixel_format), Message::PixelFormatChanged)
                .text_size(13)
                .into(),
        ),
        labeled(
            "Sensor orientation",
            pick_list(ORIENTATIONS, Some(settings.sensor_orientation), Message::OrientationChanged)
                .text_size(13)
                .into(),
        ),
        labeled(
            "Preview width",
            row![
                slider(200..=800, settings.preview_width, Message::PreviewWidthChanged).step(20u32),
                text(format!("{} px", settings.preview_width)).size(13),
            ]
            .spacing(12)
            .into(),
        ),
        Space::new().height(20),
        text("Detection").size(16),
        Space::new().height(8),
        labeled(
            "Model",
            row![
                text(model_label).size(12),
                button(text("Choose\u{2026}").size(12)).on_press(Message::SelectModel),
            ]
            .spacing(8)
            .align_y(iced::Alignment::Center)
            .into(),
        ),
        labeled(
            "Confidence",
            row![
                slider(5..=95, settings.confidence, Message::ConfidenceChanged).step(5u32),
                text(format!("{}%", settings.confidence)).size(13),
            ]
            .spacing(12)
            .into(),
        ),
        labeled(
            "Minimum face size",
            row![
                slider(0..=50, settings.min_face_size, Message::MinFaceSizeChanged),
                text(format!("{}%", settings.min_face_size)).size(13),
            ]
            .spacing(12)
            .into(),
        ),
        checkbox(settings.enable_contours)
            .label("Facial keypoints")
            .on_toggle(Message::ContoursChanged)
            .text_size(13),
        checkbox(settings.enable_tracking)
            .label("Track faces across frames")
            .on_toggle(Message::TrackingChanged)
            .text_size(13),
        Space::new().height(20),
        text("Appearance").size(16),
        Space::new().height(8),
        labeled(
            "Mode",
            pick_list(Appearance::ALL, Some(settings.appearance), Message::AppearanceChanged)
                .text_size(13)
                .into(),
        ),
        Space::new().height(20),
        button(text("Restore defaults").size(13))
            .on_press(Message::RestoreDefaults)
            .style(button::secondary),
    ]
    .spacing(6)
    .into()
}

fn labeled<'a>(label: &'a str, control: Element<'a, Message>) -> Element<'a, Message> {
    row![text(label).size(13).width(140), control]
        .spacing(12)
        .align_y(iced::Alignment::Center)
        .into()
}
