use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::geometry::{BoundingBox, Point};

/// Named facial landmark positions a detector may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceLandmark {
    MouthBottom,
    MouthLeft,
    MouthRight,
    LeftCheek,
    RightCheek,
    LeftEar,
    RightEar,
    LeftEye,
    RightEye,
    NoseBase,
}

impl FaceLandmark {
    /// Landmarks drawn as plain dots. The nose base is drawn as a bitmap.
    pub const DOTTED: [FaceLandmark; 9] = [
        FaceLandmark::MouthBottom,
        FaceLandmark::LeftCheek,
        FaceLandmark::LeftEar,
        FaceLandmark::MouthLeft,
        FaceLandmark::LeftEye,
        FaceLandmark::RightCheek,
        FaceLandmark::RightEar,
        FaceLandmark::RightEye,
        FaceLandmark::MouthRight,
    ];
}

/// Named contour polylines a contour-capable detector may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceContour {
    Face,
    LeftEyebrowTop,
    LeftEyebrowBottom,
    RightEyebrowTop,
    RightEyebrowBottom,
    LeftEye,
    RightEye,
    UpperLipTop,
    UpperLipBottom,
    LowerLipTop,
    LowerLipBottom,
    NoseBridge,
    NoseBottom,
}

/// One detected face. Probabilities are `None` when classification was
/// not requested or the detector cannot produce it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub tracking_id: Option<u32>,
    #[serde(default)]
    pub landmarks: BTreeMap<FaceLandmark, Point>,
    #[serde(default)]
    pub contours: BTreeMap<FaceContour, Vec<Point>>,
    #[serde(default)]
    pub smiling_probability: Option<f32>,
    #[serde(default)]
    pub left_eye_open_probability: Option<f32>,
    #[serde(default)]
    pub right_eye_open_probability: Option<f32>,
}

impl Face {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            ..Default::default()
        }
    }

    pub fn landmark(&self, kind: FaceLandmark) -> Option<Point> {
        self.landmarks.get(&kind).copied()
    }

    pub fn contour(&self, kind: FaceContour) -> Option<&[Point]> {
        self.contours.get(&kind).map(|v| v.as_slice())
    }

    /// Every contour point, in contour order.
    pub fn all_contour_points(&self) -> impl Iterator<Item = &Point> {
        self.contours.values().flatten()
    }
}
