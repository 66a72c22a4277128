use iced::color;
use iced::theme::Palette;
use iced::widget::container;
use iced::{Border, Color, Theme};

use crate::settings::Appearance;

pub fn resolve_theme(appearance: Appearance) -> Theme {
    let is_dark = match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => detect_system_dark_mode(),
    };
    if is_dark {
        Theme::custom("Facecam Dark", dark_palette())
    } else {
        Theme::custom("Facecam Light", light_palette())
    }
}

fn dark_palette() -> Palette {
    Palette {
        background: color!(0x1c, 0x1c, 0x1e),
        text: color!(0xcc, 0xcc, 0xcc),
        primary: color!(0x5e, 0x9f, 0xf5),
        success: color!(0x30, 0xd1, 0x58),
        warning: color!(0xff, 0xcc, 0x00),
        danger: color!(0xff, 0x45, 0x3a),
    }
}

fn light_palette() -> Palette {
    Palette {
        background: color!(0xf5, 0xf5, 0xf7),
        text: color!(0x1d, 0x1d, 0x1f),
        primary: color!(0x34, 0x78, 0xf6),
        success: color!(0x34, 0xc7, 0x59),
        warning: color!(0xff, 0x9f, 0x0a),
        danger: color!(0xff, 0x3b, 0x30),
    }
}

/// Banner for the transient detection-failure notice.
pub fn notice_style(theme: &Theme) -> container::Style {
    let danger = theme.palette().danger;
    container::Style {
        background: Some(Color { a: 0.15, ..danger }.into()),
        text_color: Some(theme.palette().text),
        border: Border {
            color: danger,
            width: 1.0,
            radius: 6.0.into(),
        },
        ..container::Style::default()
    }
}

/// Backdrop shown where the preview goes before the camera delivers.
pub fn preview_placeholder_style(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();
    container::Style {
        background: Some(palette.background.weak.color.into()),
        border: Border {
            radius: 8.0.into(),
            ..Border::default()
        },
        ..container::Style::default()
    }
}

fn detect_system_dark_mode() -> bool {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout)
                    .trim()
                    .eq_ignore_ascii_case("dark")
            })
            .unwrap_or(true)
    }
    #[cfg(not(target_os = "macos"))]
    {
        true
    }
}
