use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::detection::domain::face::Face;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

/// On-disk layout: faces keyed by frame index (`{"frames": {"0": [...]}}`).
#[derive(Deserialize)]
struct Recording {
    frames: HashMap<usize, Vec<Face>>,
}

/// Replays recorded detection results by frame index.
///
/// Lets the pipeline run without a model, e.g. to demo the overlay or
/// to reproduce a captured session. With `looping`, indices past the last
/// recorded frame wrap around so a short recording can drive a live feed.
pub struct ReplayFaceDetector {
    frames: HashMap<usize, Vec<Face>>,
    period: usize,
    looping: bool,
}

impl ReplayFaceDetector {
    pub fn new(frames: HashMap<usize, Vec<Face>>, looping: bool) -> Self {
        let period = frames.keys().max().map_or(0, |max| max + 1);
        Self {
            frames,
            period,
            looping,
        }
    }

    /// Loads a JSON recording.
    pub fn from_file(path: &Path, looping: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read detections {}: {e}", path.display()))?;
        let recording: Recording = serde_json::from_str(&text)?;
        log::info!(
            "Loaded {} recorded frames from {}",
            recording.frames.len(),
            path.display()
        );
        Ok(Self::new(recording.frames, looping))
    }

    fn lookup_index(&self, index: usize) -> usize {
        if self.looping && self.period > 0 {
            index % self.period
        } else {
            index
        }
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
        let index = self.lookup_index(frame.index());
        Ok(self.frames.get(&index).cloned().unwrap_or_default())
    }
}
