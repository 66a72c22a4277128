use crate::shared::geometry::{Rect, Size};

/// Maps a detector rectangle into widget space.
///
/// `image_size` is the raw sensor size as reported with the result. The
/// detector's boxes are upright, so for a landscape sensor shown in a
/// portrait widget the axes swap: horizontal scale is `widget.width /
/// image.height` and vertical scale is `widget.height / image.width`. No other
/// rotation is corrected.
pub fn scale_rect(rect: Rect, image_size: Size, widget_size: Size) -> Rect {
    if image_size.is_empty() {
        return Rect::default();
    }
    let sx = widget_size.width / image_size.height;
    let sy = widget_size.height / image_size.width;
    Rect::new(
        rect.left * sx,
        rect.top * sy,
        rect.right * sx,
        rect.bottom * sy,
    )
}
