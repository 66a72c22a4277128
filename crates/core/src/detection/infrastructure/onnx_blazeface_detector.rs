/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Decodes the camera buffer, turns it upright and reports boxes and the six
/// BlazeFace keypoints in upright pixel coordinates. The short-range model has
/// no classification head, so smile probabilities are never produced.
use std::path::Path;

use image::RgbImage;

use crate::camera::infrastructure::pixel_layout::{rotate_upright, unpack_to_rgb};
use crate::detection::domain::detected_face::{DetectedFace, FaceContour, FaceContourType};
use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::detector_options::FaceDetectorOptions;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::input_image::InputImage;
use crate::detection::infrastructure::execution_provider::open_session;
use crate::detection::infrastructure::face_tracker::FaceTracker;
use crate::shared::constants::TRACKER_MAX_LOST;
use crate::shared::geometry::{Point, Rect};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: 4 box + 6 keypoints * 2.
const REG_STRIDE: usize = 16;

/// Keypoint order of the regressor output.
const KEYPOINT_KINDS: [FaceContourType; 6] = [
    FaceContourType::RightEye,
    FaceContourType::LeftEye,
    FaceContourType::NoseBase,
    FaceContourType::Mouth,
    FaceContourType::RightEar,
    FaceContourType::LeftEar,
];

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    options: FaceDetectorOptions,
    anchors: Vec<[f32; 2]>,
    tracker: Option<FaceTracker>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    pub fn new(model_path: &Path, options: FaceDetectorOptions) -> Result<Self, DetectionError> {
        options.validate().map_err(DetectionError::new)?;
        let session = open_session(model_path).map_err(|e| {
            DetectionError::new(format!("cannot load {}: {e}", model_path.display()))
        })?;
        if options.enable_classification {
            log::warn!("BlazeFace has no classification head; smile probabilities stay empty");
        }
        log::info!(
            "BlazeFace loaded from {} (confidence {:.2}, min face {:.2})",
            model_path.display(),
            options.confidence,
            options.min_face_size
        );
        Ok(Self {
            session,
            options,
            anchors: generate_anchors(),
            tracker: options
                .enable_tracking
                .then(|| FaceTracker::new(TRACKER_MAX_LOST)),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, image: &InputImage) -> Result<Vec<DetectedFace>, DetectionError> {
        let meta = image.metadata();

        // 1. Decode the camera layout and turn it upright
        let rgb = unpack_to_rgb(
            image.bytes(),
            meta.width,
            meta.height,
            meta.bytes_per_row,
            meta.format,
        )?;
        let raw = RgbImage::from_raw(meta.width, meta.height, rgb)
            .ok_or_else(|| DetectionError::new("decoded buffer does not match frame size"))?;
        let upright = rotate_upright(raw, meta.rotation);
        let (uw, uh) = upright.dimensions();

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(preprocess(&upright, INPUT_SIZE))?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence scores)
        if outputs.len() < 2 {
            return Err(DetectionError::new(format!(
                "BlazeFace model expected 2 outputs, got {}",
                outputs.len()
            )));
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors
            .as_slice()
            .ok_or_else(|| DetectionError::new("cannot read regressor tensor"))?;
        let score_data = scores
            .as_slice()
            .ok_or_else(|| DetectionError::new("cannot read score tensor"))?;

        // 3. Decode, suppress overlaps, drop faces below the size floor
        let mut candidates = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.options.confidence,
            (uw as f32, uh as f32),
        );
        let min_width = self.options.min_face_size * uw as f32;
        let kept: Vec<Candidate> = nms(&mut candidates, NMS_IOU_THRESH)
            .into_iter()
            .filter(|c| c.rect.width() >= min_width)
            .collect();

        // 4. Build faces
        let ids = self.tracker.as_mut().map(|t| {
            let boxes: Vec<Rect> = kept.iter().map(|c| c.rect).collect();
            t.update(&boxes)
        });
        let faces = kept
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let mut face = DetectedFace::new(c.rect);
                face.tracking_id = ids.as_ref().map(|ids| ids[i]);
                if self.options.enable_contours {
                    face.contours = KEYPOINT_KINDS
                        .iter()
                        .zip(c.keypoints)
                        .map(|(&kind, point)| FaceContour {
                            kind,
                            points: vec![point],
                        })
                        .collect();
                }
                face
            })
            .collect::<Vec<_>>();

        log::trace!("BlazeFace found {} face(s) in {uw}x{uh}", faces.len());
        Ok(faces)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(image: &RgbImage, size: u32) -> ndarray::Array4<f32> {
    let (src_w, src_h) = image.dimensions();
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as u32).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as u32).min(src_w - 1);
            let px = image.get_pixel(src_x, src_y).0;
            for c in 0..3 {
                tensor[[0, c, y, x]] = px[c] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// The short-range model uses two feature map sizes, 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding + NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    rect: Rect,
    score: f32,
    keypoints: [Point; 6],
}

/// Turns raw anchor outputs into boxes in `frame` (upright) pixel space.
fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f32,
    frame: (f32, f32),
) -> Vec<Candidate> {
    let (fw, fh) = frame;
    let scale = INPUT_SIZE as f32;
    let mut out = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if score < confidence {
            continue;
        }
        let Some(reg) = reg_data.get(i * REG_STRIDE..(i + 1) * REG_STRIDE) else {
            break;
        };
        let [ax, ay] = anchors[i];

        let cx = ax + reg[0] / scale;
        let cy = ay + reg[1] / scale;
        let w = reg[2] / scale;
        let h = reg[3] / scale;

        let rect = Rect::new(
            ((cx - w / 2.0) * fw).max(0.0),
            ((cy - h / 2.0) * fh).max(0.0),
            ((cx + w / 2.0) * fw).min(fw),
            ((cy + h / 2.0) * fh).min(fh),
        );

        let mut keypoints = [Point::default(); 6];
        for (k, point) in keypoints.iter_mut().enumerate() {
            let kx = ax + reg[4 + k * 2] / scale;
            let ky = ay + reg[5 + k * 2] / scale;
            *point = Point::new(kx * fw, ky * fh);
        }

        out.push(Candidate {
            rect,
            score,
            keypoints,
        });
    }

    out
}

fn nms(dets: &mut [Candidate], iou_thresh: f32) -> Vec<Candidate> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| k.rect.iou(&det.rect) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
