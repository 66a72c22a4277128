/// Assigns stable ids to faces across consecutive detections.
///
/// Greedy IoU association against the boxes seen last time. A track that
/// goes unmatched is kept for `max_lost` detections so a face that flickers
/// out for a frame or two gets its old id back.
use std::collections::HashSet;

use crate::shared::geometry::Rect;

const MATCH_THRESH: f32 = 0.3;

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: Rect,
    frames_lost: usize,
}

pub struct FaceTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl FaceTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Returns one id per input box, in input order.
    pub fn update(&mut self, boxes: &[Rect]) -> Vec<u32> {
        let mut ids: Vec<Option<u32>> = vec![None; boxes.len()];
        let mut matched_tracks = HashSet::new();

        for (ti, bi) in greedy_match(&self.tracks, boxes) {
            let track = &mut self.tracks[ti];
            track.bbox = boxes[bi];
            track.frames_lost = 0;
            ids[bi] = Some(track.id);
            matched_tracks.insert(ti);
        }

        for (ti, track) in self.tracks.iter_mut().enumerate() {
            if !matched_tracks.contains(&ti) {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        ids.iter()
            .zip(boxes)
            .map(|(id, bbox)| id.unwrap_or_else(|| self.start_track(*bbox)))
            .collect()
    }

    fn start_track(&mut self, bbox: Rect) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.push(TrackState {
            id,
            bbox,
            frames_lost: 0,
        });
        id
    }
}

/// Pairs sorted by descending IoU; each track and box used at most once.
fn greedy_match(tracks: &[TrackState], boxes: &[Rect]) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
    for (ti, track) in tracks.iter().enumerate() {
        for (bi, bbox) in boxes.iter().enumerate() {
            let score = track.bbox.iou(bbox);
            if score >= MATCH_THRESH {
                pairs.push((ti, bi, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_boxes = HashSet::new();
    let mut matches = Vec::new();
    for (ti, bi, _) in pairs {
        if used_tracks.insert(ti) {
            if used_boxes.insert(bi) {
                matches.push((ti, bi));
            } else {
                used_tracks.remove(&ti);
            }
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(l: f32, t: f32, r: f32, b: f32) -> Rect {
        Rect::new(l, t, r, b)
    }

    #[test]
    fn test_new_faces_get_unique_ids() {
        let mut tracker = FaceTracker::new(5);
        let ids = tracker.update(&[rect(0.0, 0.0, 50.0, 50.0), rect(100.0, 100.0, 150.0, 150.0)]);
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_consistent_id_across_detections() {
        let mut tracker = FaceTracker::new(5);
        let first = tracker.update(&[rect(10.0, 10.0, 60.0, 60.0)]);
        let second = tracker.update(&[rect(12.0, 12.0, 62.0, 62.0)]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_ids_follow_input_order() {
        let mut tracker = FaceTracker::new(5);
        let a = rect(0.0, 0.0, 50.0, 50.0);
        let b = rect(200.0, 200.0, 250.0, 250.0);
        let first = tracker.update(&[a, b]);
        let swapped = tracker.update(&[b, a]);
        assert_eq!(swapped, vec![first[1], first[0]]);
    }

    #[test]
    fn test_track_survives_within_max_lost() {
        let mut tracker = FaceTracker::new(2);
        let id = tracker.update(&[rect(10.0, 10.0, 60.0, 60.0)])[0];
        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.update(&[rect(11.0, 11.0, 61.0, 61.0)])[0], id);
    }

    #[test]
    fn test_lost_track_is_retired() {
        let mut tracker = FaceTracker::new(1);
        let id = tracker.update(&[rect(10.0, 10.0, 60.0, 60.0)])[0];
        tracker.update(&[]);
        tracker.update(&[]);
        assert_ne!(tracker.update(&[rect(10.0, 10.0, 60.0, 60.0)])[0], id);
    }

    #[test]
    fn test_empty_update() {
        let mut tracker = FaceTracker::new(5);
        assert!(tracker.update(&[]).is_empty());
    }
}
