use iced::widget::{button, canvas, column, container, image, row, stack, text, Space};
use iced::{ContentFit, Element, Length};

use facecam_core::overlay::domain::overlay_painter::OverlayStyle;
use facecam_core::session::overlay_state::OverlayState;

use crate::app::{CameraState, Message, Preview};
use crate::settings::Settings;
use crate::theme::{notice_style, preview_placeholder_style};
use crate::widgets::face_overlay::FaceOverlay;

/// Aspect used for the placeholder before the first frame arrives.
const PLACEHOLDER_ASPECT: f32 = 3.0 / 4.0;

pub fn view<'a>(
    settings: &'a Settings,
    overlay: &'a OverlayState,
    preview: Option<&'a Preview>,
    camera_state: &'a CameraState,
) -> Element<'a, Message> {
    let width = settings.preview_width as f32;

    let preview_area: Element<'a, Message> = match preview {
        Some(p) => {
            let height = width * p.height as f32 / p.width.max(1) as f32;
            let picture = image(p.handle.clone())
                .width(width)
                .height(height)
                .content_fit(ContentFit::Fill);
            let faces = canvas(FaceOverlay {
                faces: overlay.faces(),
                image_size: overlay.image_size(),
                style: OverlayStyle::default(),
            })
            .width(width)
            .height(height);
            stack![picture, faces].into()
        }
        None => container(text(placeholder_text(camera_state)).size(13))
            .width(width)
            .height(width * PLACEHOLDER_ASPECT)
            .center_x(width)
            .center_y(width * PLACEHOLDER_ASPECT)
            .style(preview_placeholder_style)
            .into(),
    };

    let camera_button = match camera_state {
        CameraState::Running => button(text("Stop camera").size(13)).on_press(Message::StopCamera),
        _ => button(text("Start camera").size(13)).on_press(Message::StartCamera),
    };
    let toggle_label = if overlay.detection_enabled() {
        "Detection: on"
    } else {
        "Detection: off"
    };
    let toggle = button(text(toggle_label).size(13))
        .on_press(Message::ToggleDetection)
        .style(if overlay.detection_enabled() {
            button::primary
        } else {
            button::secondary
        });

    let controls = row![
        camera_button,
        toggle,
        Space::new().width(Length::Fill),
        face_count(overlay)
    ]
    .spacing(8)
    .align_y(iced::Alignment::Center);

    let mut content = column![controls].spacing(12);
    if let Some(notice) = overlay.notice() {
        content = content.push(notice_banner(notice, true));
    }
    if let CameraState::Error(e) = camera_state {
        content = content.push(notice_banner(e, false));
    }
    content.push(preview_area).into()
}

fn notice_banner<'a>(message: &'a str, dismissable: bool) -> Element<'a, Message> {
    let mut line = row![text(message).size(12).width(Length::Fill)]
        .spacing(8)
        .align_y(iced::Alignment::Center);
    if dismissable {
        line = line.push(
            button(text("Dismiss").size(12))
                .on_press(Message::DismissNotice)
                .style(button::text),
        );
    }
    container(line)
        .padding([6, 10])
        .width(Length::Fill)
        .style(notice_style)
        .into()
}

fn face_count<'a>(overlay: &OverlayState) -> Element<'a, Message> {
    let n = overlay.faces().len();
    let smiling = overlay.faces().iter().filter(|f| f.is_smiling()).count();
    let label = match (n, smiling) {
        (0, _) => "No faces".to_string(),
        (1, 0) => "1 face".to_string(),
        (n, 0) => format!("{n} faces"),
        (n, s) => format!("{n} face(s), {s} smiling"),
    };
    text(label).size(12).into()
}

fn placeholder_text(camera_state: &CameraState) -> &'static str {
    match camera_state {
        CameraState::Running => "Waiting for camera\u{2026}",
        CameraState::Stopped => "Camera is off",
        CameraState::Error(_) => "Camera unavailable",
    }
}
