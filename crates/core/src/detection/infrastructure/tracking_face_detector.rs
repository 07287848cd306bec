use crate::detection::domain::face::Face;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::geometry::BoundingBox;

pub const DEFAULT_MATCH_IOU: f64 = 0.3;

struct Track {
    id: u32,
    bbox: BoundingBox,
    lost: usize,
}

/// Decorator that assigns stable tracking ids to faces from an inner
/// detector that does not track.
///
/// Each frame, detections are matched to existing tracks greedily by
/// descending IoU. Unmatched detections start new tracks; tracks unmatched
/// for more than `max_lost` consecutive frames are retired. Faces that
/// already carry a tracking id pass through unchanged.
pub struct TrackingFaceDetector {
    inner: Box<dyn FaceDetector>,
    tracks: Vec<Track>,
    next_id: u32,
    match_iou: f64,
    max_lost: usize,
}

impl TrackingFaceDetector {
    pub fn new(inner: Box<dyn FaceDetector>, max_lost: usize) -> Self {
        Self {
            inner,
            tracks: Vec::new(),
            next_id: 0,
            match_iou: DEFAULT_MATCH_IOU,
            max_lost,
        }
    }

    fn assign_ids(&mut self, faces: &mut [Face]) {
        let untracked: Vec<usize> = (0..faces.len())
            .filter(|&i| faces[i].tracking_id.is_none())
            .collect();

        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for &fi in &untracked {
            for (ti, track) in self.tracks.iter().enumerate() {
                let iou = faces[fi].bounding_box.iou(&track.bbox);
                if iou > self.match_iou {
                    pairs.push((iou, fi, ti));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut face_done = vec![false; faces.len()];
        let mut track_done = vec![false; self.tracks.len()];
        for (_, fi, ti) in pairs {
            if face_done[fi] || track_done[ti] {
                continue;
            }
            face_done[fi] = true;
            track_done[ti] = true;
            let track = &mut self.tracks[ti];
            track.bbox = faces[fi].bounding_box;
            track.lost = 0;
            faces[fi].tracking_id = Some(track.id);
        }

        for (track, matched) in self.tracks.iter_mut().zip(track_done.iter()) {
            if !matched {
                track.lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.lost <= max_lost);

        for &fi in &untracked {
            if face_done[fi] {
                continue;
            }
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            self.tracks.push(Track {
                id,
                bbox: faces[fi].bounding_box,
                lost: 0,
            });
            faces[fi].tracking_id = Some(id);
        }
    }
}

impl FaceDetector for TrackingFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
        let mut faces = self.inner.detect(frame)?;
        self.assign_ids(&mut faces);
        Ok(faces)
    }

    fn close(&mut self) {
        self.tracks.clear();
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDetector {
        results: Vec<Vec<Face>>,
        call_count: usize,
    }

    impl FakeDetector {
        fn boxed(results: Vec<Vec<Face>>) -> Box<Self> {
            Box::new(Self {
                results,
                call_count: 0,
            })
        }
    }

    impl FaceDetector for FakeDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
            let result = self.results[self.call_count % self.results.len()].clone();
            self.call_count += 1;
            Ok(result)
        }
    }

    fn frame() -> Frame {
        Frame::rgb(vec![0u8; 10 * 10 * 3], 10, 10, 0).unwrap()
    }

    fn face_at(x: i32, y: i32) -> Face {
        Face::new(BoundingBox::from_xywh(x, y, 50, 50))
    }

    #[test]
    fn test_new_faces_get_distinct_ids() {
        let inner = FakeDetector::boxed(vec![vec![face_at(0, 0), face_at(200, 0)]]);
        let mut detector = TrackingFaceDetector::new(inner, 5);

        let faces = detector.detect(&frame()).unwrap();

        assert_eq!(faces[0].tracking_id, Some(0));
        assert_eq!(faces[1].tracking_id, Some(1));
    }

    #[test]
    fn test_moving_face_keeps_id() {
        let inner = FakeDetector::boxed(vec![vec![face_at(0, 0)], vec![face_at(5, 5)]]);
        let mut detector = TrackingFaceDetector::new(inner, 5);

        let first = detector.detect(&frame()).unwrap();
        let second = detector.detect(&frame()).unwrap();

        assert_eq!(first[0].tracking_id, second[0].tracking_id);
    }

    #[test]
    fn test_disjoint_face_gets_new_id() {
        let inner = FakeDetector::boxed(vec![vec![face_at(0, 0)], vec![face_at(300, 300)]]);
        let mut detector = TrackingFaceDetector::new(inner, 5);

        detector.detect(&frame()).unwrap();
        let second = detector.detect(&frame()).unwrap();

        assert_eq!(second[0].tracking_id, Some(1));
    }

    #[test]
    fn test_track_survives_short_gap() {
        let inner = FakeDetector::boxed(vec![vec![face_at(0, 0)], vec![], vec![face_at(2, 2)]]);
        let mut detector = TrackingFaceDetector::new(inner, 1);

        detector.detect(&frame()).unwrap();
        detector.detect(&frame()).unwrap();
        let third = detector.detect(&frame()).unwrap();

        assert_eq!(third[0].tracking_id, Some(0));
    }

    #[test]
    fn test_track_retired_after_max_lost() {
        let inner = FakeDetector::boxed(vec![
            vec![face_at(0, 0)],
            vec![],
            vec![],
            vec![face_at(2, 2)],
        ]);
        let mut detector = TrackingFaceDetector::new(inner, 1);

        for _ in 0..3 {
            detector.detect(&frame()).unwrap();
        }
        let fourth = detector.detect(&frame()).unwrap();

        assert_eq!(fourth[0].tracking_id, Some(1));
    }

    #[test]
    fn test_existing_ids_pass_through() {
        let tracked = Face {
            tracking_id: Some(42),
            ..face_at(0, 0)
        };
        let inner = FakeDetector::boxed(vec![vec![tracked]]);
        let mut detector = TrackingFaceDetector::new(inner, 5);

        let faces = detector.detect(&frame()).unwrap();

        assert_eq!(faces[0].tracking_id, Some(42));
    }

    #[test]
    fn test_each_track_matches_at_most_one_face() {
        // Two overlapping faces near one existing track: only one inherits it
        let inner = FakeDetector::boxed(vec![
            vec![face_at(0, 0)],
            vec![face_at(2, 0), face_at(4, 0)],
        ]);
        let mut detector = TrackingFaceDetector::new(inner, 5);

        detector.detect(&frame()).unwrap();
        let second = detector.detect(&frame()).unwrap();

        let ids: Vec<_> = second.iter().filter_map(|f| f.tracking_id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(ids.contains(&0));
    }
}
