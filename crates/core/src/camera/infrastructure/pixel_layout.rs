//! Conversions between tightly packed RGB24 pixels and camera plane layouts.
//!
//! Frame sources use [`pack_rgb`] to imitate what a phone camera hands over;
//! detectors use [`unpack_to_rgb`] on the assembled buffer. YUV math is
//! full-range BT.601, chroma subsampled 2x2 with ceiling division so odd
//! dimensions keep their last column and row.

use image::{imageops, ImageBuffer, Pixel};

use crate::camera::domain::camera_frame::{PixelFormat, Plane};
use crate::camera::domain::image_rotation::ImageRotation;
use crate::detection::domain::detection_error::DetectionError;

/// Splits RGB24 pixels into the planes a camera would deliver for `format`.
pub fn pack_rgb(rgb: &[u8], width: u32, height: u32, format: PixelFormat) -> Vec<Plane> {
    let w = width as usize;
    let h = height as usize;
    debug_assert_eq!(rgb.len(), w * h * 3, "rgb length must equal width * height * 3");

    match format {
        PixelFormat::Nv21 => pack_nv21(rgb, w, h),
        PixelFormat::Yuv420 => pack_yuv420(rgb, w, h),
        PixelFormat::Bgra8888 => {
            let mut bgra = Vec::with_capacity(w * h * 4);
            for px in rgb.chunks_exact(3) {
                bgra.extend_from_slice(&[px[2], px[1], px[0], 255]);
            }
            vec![Plane::new(bgra, w * 4).with_bytes_per_pixel(4)]
        }
        PixelFormat::Rgb888 => vec![Plane::new(rgb.to_vec(), w * 3).with_bytes_per_pixel(3)],
    }
}

/// Decodes an assembled frame buffer back to RGB24.
///
/// Only the first plane's stride is known at this point; chroma strides are
/// derived from it the same way [`pack_rgb`] lays them out.
pub fn unpack_to_rgb(
    bytes: &[u8],
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
) -> Result<Vec<u8>, DetectionError> {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 {
        return Err(DetectionError::new(format!(
            "invalid frame dimensions {width}x{height}"
        )));
    }

    match format {
        PixelFormat::Nv21 => unpack_nv21(bytes, w, h, bytes_per_row),
        PixelFormat::Yuv420 => unpack_yuv420(bytes, w, h, bytes_per_row),
        PixelFormat::Bgra8888 => unpack_interleaved(bytes, w, h, bytes_per_row, 4, [2, 1, 0]),
        PixelFormat::Rgb888 => unpack_interleaved(bytes, w, h, bytes_per_row, 3, [0, 1, 2]),
    }
}

// ---------------------------------------------------------------------------
// Packing
// ---------------------------------------------------------------------------

fn pack_nv21(rgb: &[u8], w: usize, h: usize) -> Vec<Plane> {
    let (cw, ch) = chroma_dims(w, h);
    // Y and VU share one stride wide enough for cw interleaved pairs.
    let stride = cw * 2;

    let mut y_plane = vec![0u8; stride * h];
    for j in 0..h {
        for i in 0..w {
            y_plane[j * stride + i] = luma(pixel(rgb, w, i, j));
        }
    }

    let mut vu_plane = vec![0u8; stride * ch];
    for cj in 0..ch {
        for ci in 0..cw {
            let (u, v) = block_chroma(rgb, w, h, ci, cj);
            vu_plane[cj * stride + ci * 2] = v;
            vu_plane[cj * stride + ci * 2 + 1] = u;
        }
    }

    vec![
        Plane::new(y_plane, stride).with_bytes_per_pixel(1),
        Plane::new(vu_plane, stride).with_bytes_per_pixel(2),
    ]
}

fn pack_yuv420(rgb: &[u8], w: usize, h: usize) -> Vec<Plane> {
    let (cw, ch) = chroma_dims(w, h);

    let mut y_plane = vec![0u8; w * h];
    for j in 0..h {
        for i in 0..w {
            y_plane[j * w + i] = luma(pixel(rgb, w, i, j));
        }
    }

    let mut u_plane = vec![0u8; cw * ch];
    let mut v_plane = vec![0u8; cw * ch];
    for cj in 0..ch {
        for ci in 0..cw {
            let (u, v) = block_chroma(rgb, w, h, ci, cj);
            u_plane[cj * cw + ci] = u;
            v_plane[cj * cw + ci] = v;
        }
    }

    vec![
        Plane::new(y_plane, w).with_bytes_per_pixel(1),
        Plane::new(u_plane, cw).with_bytes_per_pixel(1),
        Plane::new(v_plane, cw).with_bytes_per_pixel(1),
    ]
}

/// Mean U/V over the 2x2 block at chroma coordinates `(ci, cj)`.
fn block_chroma(rgb: &[u8], w: usize, h: usize, ci: usize, cj: usize) -> (u8, u8) {
    let mut u_sum = 0.0f32;
    let mut v_sum = 0.0f32;
    let mut n = 0.0f32;
    for j in (cj * 2)..((cj * 2 + 2).min(h)) {
        for i in (ci * 2)..((ci * 2 + 2).min(w)) {
            let [r, g, b] = pixel(rgb, w, i, j);
            let (r, g, b) = (r as f32, g as f32, b as f32);
            u_sum += -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
            v_sum += 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
            n += 1.0;
        }
    }
    (clamp_to_u8(u_sum / n), clamp_to_u8(v_sum / n))
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    clamp_to_u8(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
}

fn pixel(rgb: &[u8], w: usize, i: usize, j: usize) -> [u8; 3] {
    let o = (j * w + i) * 3;
    [rgb[o], rgb[o + 1], rgb[o + 2]]
}

// ---------------------------------------------------------------------------
// Unpacking
// ---------------------------------------------------------------------------

fn unpack_nv21(
    bytes: &[u8],
    w: usize,
    h: usize,
    stride: usize,
) -> Result<Vec<u8>, DetectionError> {
    let (cw, ch) = chroma_dims(w, h);
    if stride < cw * 2 {
        return Err(stride_error(stride, cw * 2));
    }
    let y_len = stride * h;
    check_len(bytes, y_len + stride * ch)?;

    let mut rgb = vec![0u8; w * h * 3];
    for j in 0..h {
        for i in 0..w {
            let vu = y_len + (j / 2) * stride + (i / 2) * 2;
            let y = bytes[j * stride + i];
            write_yuv(&mut rgb, (j * w + i) * 3, y, bytes[vu + 1], bytes[vu]);
        }
    }
    Ok(rgb)
}

fn unpack_yuv420(
    bytes: &[u8],
    w: usize,
    h: usize,
    stride: usize,
) -> Result<Vec<u8>, DetectionError> {
    let (cw, ch) = chroma_dims(w, h);
    let chroma_stride = stride.div_ceil(2);
    if stride < w || chroma_stride < cw {
        return Err(stride_error(stride, w));
    }
    let y_len = stride * h;
    let c_len = chroma_stride * ch;
    check_len(bytes, y_len + c_len * 2)?;

    let mut rgb = vec![0u8; w * h * 3];
    for j in 0..h {
        for i in 0..w {
            let c = (j / 2) * chroma_stride + i / 2;
            let y = bytes[j * stride + i];
            let u = bytes[y_len + c];
            let v = bytes[y_len + c_len + c];
            write_yuv(&mut rgb, (j * w + i) * 3, y, u, v);
        }
    }
    Ok(rgb)
}

fn unpack_interleaved(
    bytes: &[u8],
    w: usize,
    h: usize,
    stride: usize,
    bpp: usize,
    rgb_offsets: [usize; 3],
) -> Result<Vec<u8>, DetectionError> {
    if stride < w * bpp {
        return Err(stride_error(stride, w * bpp));
    }
    check_len(bytes, stride * (h - 1) + w * bpp)?;

    let mut rgb = Vec::with_capacity(w * h * 3);
    for j in 0..h {
        let row = &bytes[j * stride..j * stride + w * bpp];
        for px in row.chunks_exact(bpp) {
            rgb.extend(rgb_offsets.iter().map(|&o| px[o]));
        }
    }
    Ok(rgb)
}

fn write_yuv(rgb: &mut [u8], offset: usize, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    rgb[offset] = clamp_to_u8(y + 1.402 * v);
    rgb[offset + 1] = clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v);
    rgb[offset + 2] = clamp_to_u8(y + 1.772 * u);
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), DetectionError> {
    if bytes.len() < expected {
        return Err(DetectionError::new(format!(
            "frame buffer too short: expected {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

fn stride_error(stride: usize, min: usize) -> DetectionError {
    DetectionError::new(format!("row stride {stride} is smaller than {min}"))
}

fn chroma_dims(w: usize, h: usize) -> (usize, usize) {
    (w.div_ceil(2), h.div_ceil(2))
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Rotates a sensor-oriented image clockwise so it reads upright.
pub fn rotate_upright<P>(
    image: ImageBuffer<P, Vec<P::Subpixel>>,
    rotation: ImageRotation,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    match rotation {
        ImageRotation::Rotation0 => image,
        ImageRotation::Rotation90 => imageops::rotate90(&image),
        ImageRotation::Rotation180 => imageops::rotate180(&image),
        ImageRotation::Rotation270 => imageops::rotate270(&image),
    }
}

/// Inverse of [`rotate_upright`]: lays an upright picture out the way a
/// sensor mounted at `rotation` would capture it.
pub fn rotate_to_sensor<P>(
    image: ImageBuffer<P, Vec<P::Subpixel>>,
    rotation: ImageRotation,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    match rotation {
        ImageRotation::Rotation0 => image,
        ImageRotation::Rotation90 => imageops::rotate270(&image),
        ImageRotation::Rotation180 => imageops::rotate180(&image),
        ImageRotation::Rotation270 => imageops::rotate90(&image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use crate::camera::domain::frame_assembler::assemble;

    fn solid(w: usize, h: usize, color: [u8; 3]) -> Vec<u8> {
        color.iter().copied().cycle().take(w * h * 3).collect()
    }

    fn assert_close(actual: &[u8], expected: &[u8], tolerance: u8) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(*e) <= tolerance, "{a} vs {e}");
        }
    }

    #[test]
    fn test_nv21_white_layout() {
        let planes = pack_rgb(&solid(2, 2, [255, 255, 255]), 2, 2, PixelFormat::Nv21);
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].bytes(), &[255, 255, 255, 255]);
        assert_eq!(planes[1].bytes(), &[128, 128]);
        assert_eq!(planes[0].bytes_per_row(), 2);
    }

    #[test]
    fn test_nv21_stores_v_before_u() {
        // Pure red: V well above 128, U below.
        let planes = pack_rgb(&solid(2, 2, [255, 0, 0]), 2, 2, PixelFormat::Nv21);
        let vu = planes[1].bytes();
        assert!(vu[0] > 200);
        assert!(vu[1] < 128);
    }

    #[test]
    fn test_yuv420_has_three_planes() {
        let planes = pack_rgb(&solid(4, 2, [0, 0, 0]), 4, 2, PixelFormat::Yuv420);
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[0].bytes().len(), 8);
        assert_eq!(planes[1].bytes().len(), 2);
        assert_eq!(planes[2].bytes().len(), 2);
        assert_eq!(planes[1].bytes_per_row(), 2);
    }

    #[test]
    fn test_bgra_swaps_channels_and_adds_alpha() {
        let planes = pack_rgb(&[10, 20, 30], 1, 1, PixelFormat::Bgra8888);
        assert_eq!(planes[0].bytes(), &[30, 20, 10, 255]);
        assert_eq!(planes[0].bytes_per_row(), 4);
    }

    #[rstest]
    #[case(PixelFormat::Nv21, 4)]
    #[case(PixelFormat::Yuv420, 4)]
    #[case(PixelFormat::Bgra8888, 0)]
    #[case(PixelFormat::Rgb888, 0)]
    fn test_assembled_buffer_decodes_to_source(
        #[case] format: PixelFormat,
        #[case] tolerance: u8,
    ) {
        let (w, h) = (5u32, 3u32);
        let rgb = solid(w as usize, h as usize, [200, 120, 40]);
        let planes = pack_rgb(&rgb, w, h, format);
        let assembled = assemble(&planes).unwrap();

        let decoded =
            unpack_to_rgb(&assembled.bytes, w, h, assembled.bytes_per_row, format).unwrap();

        assert_close(&decoded, &rgb, tolerance);
    }

    #[test]
    fn test_rgb_stride_padding_is_skipped() {
        // 1x2 image, stride 4 leaves one padding byte per row.
        let bytes = [1, 2, 3, 0, 4, 5, 6, 0];
        let rgb = unpack_to_rgb(&bytes, 1, 2, 4, PixelFormat::Rgb888).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let err = unpack_to_rgb(&[0; 5], 2, 2, 2, PixelFormat::Nv21).unwrap_err();
        assert!(err.message().contains("too short"));
    }

    #[test]
    fn test_narrow_stride_is_rejected() {
        let err = unpack_to_rgb(&[0; 64], 4, 4, 2, PixelFormat::Rgb888).unwrap_err();
        assert!(err.message().contains("stride"));
    }

    #[test]
    fn test_zero_dimensions_are_rejected() {
        assert!(unpack_to_rgb(&[], 0, 4, 0, PixelFormat::Rgb888).is_err());
    }

    #[test]
    fn test_rotate_upright_quarter_turn() {
        // 2x1: red then blue. A clockwise quarter turn stacks them with red on top.
        let img = image::RgbImage::from_raw(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let upright = rotate_upright(img, ImageRotation::Rotation90);
        assert_eq!(upright.dimensions(), (1, 2));
        assert_eq!(upright.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(upright.get_pixel(0, 1).0, [0, 0, 255]);
    }

    #[rstest]
    #[case(ImageRotation::Rotation0, (3, 2))]
    #[case(ImageRotation::Rotation90, (2, 3))]
    #[case(ImageRotation::Rotation180, (3, 2))]
    #[case(ImageRotation::Rotation270, (2, 3))]
    fn test_rotate_upright_dimensions(#[case] rotation: ImageRotation, #[case] dims: (u32, u32)) {
        let img = image::RgbaImage::new(3, 2);
        assert_eq!(rotate_upright(img, rotation).dimensions(), dims);
    }

    #[rstest]
    #[case(ImageRotation::Rotation90)]
    #[case(ImageRotation::Rotation180)]
    #[case(ImageRotation::Rotation270)]
    fn test_sensor_then_upright_is_identity(#[case] rotation: ImageRotation) {
        let img = image::RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8, y as u8, 7]));
        let back = rotate_upright(rotate_to_sensor(img.clone(), rotation), rotation);
        assert_eq!(back, img);
    }
}
