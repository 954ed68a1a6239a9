use anyhow::{anyhow, Result};
use cv2::prelude::*;
use opencv as cv2;
use tracing::{debug, info, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::Config;
use crate::detector::{Detection, ObjectDetector};
use crate::image::DepthMap;
use crate::obstacle::{Obstacle, ObstacleTracker};
use crate::visualization::*;

/// Classes tinted when tracking highlights are on
pub const HIGHLIGHT_CLASSES: [&str; 2] = ["car", "person"];

/// A detection resolved against one frame
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub class_index: usize,
    pub confidence: f32,
    /// start_x, start_y, end_x, end_y in pixels
    pub rect: [i32; 4],
    pub obstacle: Obstacle,
    pub highlight: bool,
    /// this observation became the tracked obstacle
    pub switched: bool,
}

pub struct Pipeline {
    tracker: ObstacleTracker,
    colors: Vec<cv2::core::Scalar>,
    confidence: f64,
    track: bool,
    recorder: Option<Recorder>,
    // Incremented after each processed frame.
    frame_number: u64,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let recorder = config.record.as_deref().map(Recorder::new).transpose()?;
        Ok(Self {
            tracker: ObstacleTracker::new(),
            colors: class_colors(config.seed),
            confidence: config.confidence,
            track: config.track,
            recorder,
            frame_number: 0,
        })
    }

    pub fn tracker(&self) -> &ObstacleTracker {
        &self.tracker
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Turn detections above the confidence threshold into obstacles and feed
    /// them to the tracker. `depth` must be on the `width` x `height` grid.
    pub fn observe(
        &mut self,
        detections: &[Detection],
        width: i32,
        height: i32,
        depth: &DepthMap,
    ) -> Result<Vec<Observation>> {
        let (w, h) = (width as f64, height as f64);
        let mut observations = vec![];
        for detection in detections {
            if detection.confidence as f64 <= self.confidence {
                continue;
            }
            let [x1, y1, x2, y2] = detection.bbox.map(|v| v as f64);
            let rect = [
                (x1 * w) as i32,
                (y1 * h) as i32,
                (x2 * w) as i32,
                (y2 * h) as i32,
            ];
            let center_x = ((x1 + x2) / 2. * w) as i32;
            let center_y = ((y1 + y2) / 2. * h) as i32;

            let size = ((rect[2] - rect[0]) as i64 * (rect[3] - rect[1]) as i64).max(0);
            let distance = depth
                .value_clamped(center_x, center_y)
                .ok_or(anyhow!("no depth readings for this frame"))?;

            let label = detection.label();
            let obstacle = Obstacle::new(label, size, center_x, center_y, distance as i32);
            let switched = self.tracker.evaluate(obstacle.clone());
            if switched {
                info!(
                    label,
                    size,
                    center_x,
                    center_y,
                    distance,
                    "switched tracking to a more dangerous obstacle"
                );
            }

            observations.push(Observation {
                class_index: detection.class_index,
                confidence: detection.confidence,
                rect,
                obstacle,
                highlight: self.track && HIGHLIGHT_CLASSES.contains(&label),
                switched,
            });
        }
        Ok(observations)
    }

    /// Detect, track and draw on one frame
    pub fn process<D: ObjectDetector + ?Sized>(
        &mut self,
        frame: &mut cv2::core::Mat,
        depth: &DepthMap,
        detector: &mut D,
    ) -> Result<Vec<Observation>> {
        let width = frame.cols();
        let height = frame.rows();
        let depth = depth.resized(width as usize, height as usize)?;

        let detections = detector.detect(frame)?;
        let observations = self.observe(&detections, width, height, &depth)?;
        debug!(
            frame = self.frame_number,
            detections = detections.len(),
            kept = observations.len()
        );

        for observation in &observations {
            let color = self
                .colors
                .get(observation.class_index)
                .copied()
                .unwrap_or(cv2::core::Scalar::all(255.));
            draw_observation(frame, observation, color)?;
        }
        draw_tracked(frame, self.tracker.current())?;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.log(self.frame_number, frame, self.tracker.threat_level())?;
        }

        self.frame_number += 1;
        Span::current().pb_inc(1);
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::prelude::*;

    struct FixedDetector(Vec<Detection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&mut self, _image: &cv2::core::Mat) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    fn detection(class_index: usize, confidence: f32, bbox: [f32; 4]) -> Detection {
        Detection {
            class_index,
            confidence,
            bbox,
        }
    }

    fn config() -> Config {
        Config {
            confidence: 0.2,
            track: true,
            ..Default::default()
        }
    }

    /// 100 x 50 grid reading 7 everywhere except 0 in the bottom right corner
    fn depth() -> DepthMap {
        let mut data = vec![7; 100 * 50];
        data[100 * 50 - 1] = 0;
        DepthMap::from_u8(100, 50, data).unwrap()
    }

    #[test]
    fn test_observe_scales_and_filters() -> Result<()> {
        let mut pipeline = Pipeline::new(&config())?;
        let detections = vec![
            detection(15, 0.9, [0.1, 0.2, 0.5, 0.6]),
            detection(7, 0.15, [0.0, 0.0, 1.0, 1.0]),
            detection(7, 0.19, [0.0, 0.0, 1.0, 1.0]),
            detection(12, 0.5, [0.0, 0.0, 0.25, 0.5]),
        ];
        let observations = pipeline.observe(&detections, 100, 50, &depth())?;
        assert_eq!(observations.len(), 2);

        let person = &observations[0];
        assert_eq!(person.rect, [10, 10, 50, 30]);
        assert_eq!(person.obstacle, Obstacle::new("person", 800, 30, 20, 7));
        assert!(person.highlight);
        assert!(person.switched);

        // 625 / 8 < 800 / 8
        let dog = &observations[1];
        assert_eq!(dog.rect, [0, 0, 25, 25]);
        assert_eq!(dog.obstacle.size, 625);
        assert!(!dog.highlight);
        assert!(!dog.switched);

        assert_eq!(pipeline.tracker().current(), &person.obstacle);
        assert_eq!(pipeline.tracker().threat_level(), 100.);
        Ok(())
    }

    #[test]
    fn test_threshold_compares_in_double_precision() -> Result<()> {
        // 0.2f32 is 0.20000000298..., just above the 0.2 threshold
        let mut pipeline = Pipeline::new(&config())?;
        let observations =
            pipeline.observe(&[detection(7, 0.2, [0.1, 0.1, 0.2, 0.2])], 100, 50, &depth())?;
        assert_eq!(observations.len(), 1);

        let mut pipeline = Pipeline::new(&Config {
            confidence: 0.5,
            ..config()
        })?;
        let observations =
            pipeline.observe(&[detection(7, 0.5, [0.1, 0.1, 0.2, 0.2])], 100, 50, &depth())?;
        assert!(observations.is_empty());
        Ok(())
    }

    #[test]
    fn test_tracker_persists_across_frames() -> Result<()> {
        let mut pipeline = Pipeline::new(&config())?;
        let depth = depth();
        pipeline.observe(&[detection(15, 0.9, [0.1, 0.2, 0.5, 0.6])], 100, 50, &depth)?;

        // a smaller object on the next frame does not take over
        let next = pipeline.observe(&[detection(5, 0.9, [0.1, 0.2, 0.2, 0.3])], 100, 50, &depth)?;
        assert!(!next[0].switched);
        assert_eq!(pipeline.tracker().current().label, "person");

        // center beyond the frame reads the corner, which is closest
        let next = pipeline.observe(&[detection(6, 0.9, [0.75, 0.75, 1.25, 1.25])], 100, 50, &depth)?;
        assert_eq!(next[0].obstacle.center_x, 100);
        assert_eq!(next[0].obstacle.size, 1250);
        assert_eq!(next[0].obstacle.distance, 0);
        assert!(next[0].switched);
        assert_eq!(pipeline.tracker().current().label, "bus");
        Ok(())
    }

    #[test]
    fn test_inverted_box_has_no_size() -> Result<()> {
        let mut pipeline = Pipeline::new(&config())?;
        let observations =
            pipeline.observe(&[detection(7, 0.9, [0.5, 0.5, 0.2, 0.8])], 100, 50, &depth())?;
        assert_eq!(observations[0].obstacle.size, 0);
        assert!(!observations[0].switched);
        assert_eq!(pipeline.tracker().current(), &Obstacle::none());
        Ok(())
    }

    #[test]
    fn test_highlight_needs_track_flag() -> Result<()> {
        let mut pipeline = Pipeline::new(&Config {
            track: false,
            ..config()
        })?;
        let observations =
            pipeline.observe(&[detection(7, 0.9, [0.1, 0.1, 0.2, 0.2])], 100, 50, &depth())?;
        assert!(!observations[0].highlight);
        Ok(())
    }

    #[test]
    fn test_empty_depth_is_an_error() -> Result<()> {
        let mut pipeline = Pipeline::new(&config())?;
        let result = pipeline.observe(
            &[detection(7, 0.9, [0.1, 0.1, 0.2, 0.2])],
            100,
            50,
            &DepthMap::empty(),
        );
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_process_aligns_depth_and_draws() -> Result<()> {
        let mut pipeline = Pipeline::new(&config())?;
        let mut frame = cv2::core::Mat::new_rows_cols_with_default(
            100,
            200,
            cv2::core::CV_8UC3,
            cv2::core::Scalar::all(0.),
        )?;
        let mut detector = FixedDetector(vec![detection(15, 0.9, [0.1, 0.2, 0.5, 0.6])]);

        // the 100 x 50 depth grid is stretched onto the 200 x 100 frame
        let observations = pipeline.process(&mut frame, &depth(), &mut detector)?;
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].rect, [20, 20, 100, 60]);
        assert_eq!(observations[0].obstacle.distance, 7);
        assert_eq!(pipeline.frame_number(), 1);

        // highlighted persons get a red tint inside the box
        let inside = frame.at_2d::<cv2::core::Vec3b>(55, 30)?;
        assert_eq!(inside.0[2], 76);
        Ok(())
    }
}
