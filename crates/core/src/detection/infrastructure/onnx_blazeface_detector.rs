//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! Produces bounding boxes plus the model's six keypoints mapped onto
//! named landmarks. No tracking and no classification probabilities; wrap
//! in `TrackingFaceDetector` for stable ids.

use std::path::Path;

use crate::detection::domain::detector_options::DetectorOptions;
use crate::detection::domain::face::{Face, FaceLandmark};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::geometry::{BoundingBox, Point};

use super::execution_provider::execution_providers_for;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// Keypoint order in the regressor output.
const KEYPOINTS: [FaceLandmark; 6] = [
    FaceLandmark::RightEye,
    FaceLandmark::LeftEye,
    FaceLandmark::NoseBase,
    FaceLandmark::MouthBottom,
    FaceLandmark::RightEar,
    FaceLandmark::LeftEar,
];

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    options: DetectorOptions,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    pub fn new(
        model_path: &Path,
        options: DetectorOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers_for(options.performance_mode))?
            .commit_from_file(model_path)?;
        if options.contours {
            log::warn!("BlazeFace does not produce contours; only boxes will be drawn");
        }
        if options.classifications {
            log::debug!("BlazeFace has no classification head; probabilities stay empty");
        }
        Ok(Self {
            session,
            options,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        // `outputs` keeps `self.session` mutably borrowed until it drops.
        let DetectorOptions {
            confidence,
            min_face_size,
            landmarks,
            ..
        } = self.options;

        // 1. Preprocess: resize to 128x128, normalize to [0,1], NCHW
        let input_tensor = preprocess(frame, INPUT_SIZE)?;

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        // 3. Decode anchors above the confidence threshold
        let mut raw_dets = Vec::new();
        let num_anchors = self.anchors.len().min(NUM_ANCHORS);

        for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
            let score = sigmoid(raw_score);
            if score < confidence {
                continue;
            }

            let offset = i * REGRESSOR_STRIDE;
            if offset + REGRESSOR_STRIDE > reg_data.len() {
                break;
            }
            let row = &reg_data[offset..offset + REGRESSOR_STRIDE];
            raw_dets.push(decode(&self.anchors[i], row, score, fw, fh));
        }

        // 4. NMS, then size filter
        let min_width = min_face_size * fw;
        let faces = nms(&mut raw_dets, NMS_IOU_THRESH)
            .into_iter()
            .filter(|d| d.x2 - d.x1 >= min_width)
            .map(|d| to_face(&d, landmarks))
            .collect();

        Ok(faces)
    }
}

fn to_face(det: &RawDet, with_landmarks: bool) -> Face {
    let mut face = Face::new(BoundingBox::new(
        det.x1.round() as i32,
        det.y1.round() as i32,
        det.x2.round() as i32,
        det.y2.round() as i32,
    ));
    if with_landmarks {
        for (kind, point) in KEYPOINTS.iter().zip(det.keypoints.iter()) {
            face.landmarks.insert(*kind, *point);
        }
    }
    face
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> Result<ndarray::Array4<f32>, Box<dyn std::error::Error>> {
    let src = frame.as_ndarray()?;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Ok(tensor)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Generate anchors for the short-range model: a 16×16 grid with 2 anchors
/// per cell and an 8×8 grid with 6.
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

#[derive(Clone, Debug)]
struct RawDet {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    keypoints: [Point; 6],
}

/// Decodes one anchor's regressor row into frame coordinates.
fn decode(anchor: &[f32; 2], reg: &[f32], score: f32, fw: f32, fh: f32) -> RawDet {
    let input = INPUT_SIZE as f32;
    let cx = anchor[0] + reg[0] / input;
    let cy = anchor[1] + reg[1] / input;
    let w = reg[2] / input;
    let h = reg[3] / input;

    let mut keypoints = [Point::new(0.0, 0.0); 6];
    for (k, kp) in keypoints.iter_mut().enumerate() {
        let kx = anchor[0] + reg[4 + k * 2] / input;
        let ky = anchor[1] + reg[5 + k * 2] / input;
        *kp = Point::new(kx * fw, ky * fh);
    }

    RawDet {
        x1: ((cx - w / 2.0) * fw).max(0.0),
        y1: ((cy - h / 2.0) * fh).max(0.0),
        x2: ((cx + w / 2.0) * fw).min(fw),
        y2: ((cy + h / 2.0) * fh).min(fh),
        score,
        keypoints,
    }
}

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDet> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| bbox_iou(k, det) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = ((x2 - x1).max(0.0) * (y2 - y1).max(0.0)) as f64;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = ((a.x2 - a.x1) * (a.y2 - a.y1)) as f64;
    let area_b = ((b.x2 - b.x1) * (b.y2 - b.y1)) as f64;
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
