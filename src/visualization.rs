use cv2::prelude::*;
use opencv as cv2;

use anyhow::{bail, Context as AnyhowContext, Result};
use ndarray as nd;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rerun::{RecordingStream, RecordingStreamBuilder};

use crate::detector::CLASSES;
use crate::obstacle::Obstacle;
use crate::pipeline::Observation;

/// red channel value inside highlighted boxes, 255 * .3
const TINT: u8 = 76;
const LABEL_OFFSET: i32 = 15;

trait AsArray {
    fn try_as_array(&self) -> Result<nd::Array3<u8>>;
}

impl AsArray for cv2::core::Mat {
    fn try_as_array(&self) -> Result<nd::Array3<u8>> {
        let bytes = self.data_bytes()?;
        let size = self.size()?;
        let a = nd::ArrayView3::from_shape((size.height as usize, size.width as usize, 3), bytes)?;
        Ok(a.to_owned())
    }
}

/// Resize to `width` pixels wide, keeping the aspect ratio
pub fn resize_to_width(
    src: &cv2::core::Mat,
    dst: &mut cv2::core::Mat,
    width: i32,
) -> Result<()> {
    if src.empty() {
        bail!("cannot resize an empty frame");
    }
    let size = scaled_size(src.cols(), src.rows(), width);
    cv2::imgproc::resize(src, dst, size, 0., 0., cv2::imgproc::INTER_AREA)?;
    Ok(())
}

fn scaled_size(cols: i32, rows: i32, width: i32) -> cv2::core::Size {
    let ratio = width as f64 / cols as f64;
    cv2::core::Size::new(width, (rows as f64 * ratio) as i32)
}

/// One random color per class
pub fn class_colors(seed: u64) -> Vec<cv2::core::Scalar> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..CLASSES.len())
        .map(|_| {
            cv2::core::Scalar::new(
                rng.gen_range(0.0..255.0),
                rng.gen_range(0.0..255.0),
                rng.gen_range(0.0..255.0),
                0.,
            )
        })
        .collect()
}

/// Text baseline above the box, or inside it when the box touches the top edge
pub fn label_y(start_y: i32) -> i32 {
    if start_y - LABEL_OFFSET > LABEL_OFFSET {
        start_y - LABEL_OFFSET
    } else {
        start_y + LABEL_OFFSET
    }
}

/// Set the red channel of a BGR frame inside the box
pub fn tint_region(
    frame: &mut cv2::core::Mat,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> Result<()> {
    let start_x = start_x.max(0);
    let start_y = start_y.max(0);
    let end_x = end_x.min(frame.cols());
    let end_y = end_y.min(frame.rows());
    if end_x <= start_x || end_y <= start_y {
        return Ok(());
    }
    let rect = cv2::core::Rect::new(start_x, start_y, end_x - start_x, end_y - start_y);
    // the roi header shares the frame's pixels
    let mut roi = cv2::core::Mat::roi(frame, rect)?;
    let red = cv2::core::Mat::new_rows_cols_with_default(
        rect.height,
        rect.width,
        cv2::core::CV_8UC1,
        cv2::core::Scalar::all(TINT as f64),
    )?;
    cv2::core::insert_channel(&red, &mut roi, 2)?;
    Ok(())
}

pub fn draw_observation(
    frame: &mut cv2::core::Mat,
    observation: &Observation,
    color: cv2::core::Scalar,
) -> Result<()> {
    let [start_x, start_y, end_x, end_y] = observation.rect;
    if observation.highlight {
        tint_region(frame, start_x, start_y, end_x, end_y)?;
    }

    cv2::imgproc::rectangle_points(
        frame,
        cv2::core::Point::new(start_x, start_y),
        cv2::core::Point::new(end_x, end_y),
        color,
        2,
        cv2::imgproc::LINE_8,
        0,
    )?;

    let label = format!(
        "{}: {:.2}%",
        observation.obstacle.label,
        observation.confidence * 100.
    );
    cv2::imgproc::put_text(
        frame,
        &label,
        cv2::core::Point::new(start_x, label_y(start_y)),
        cv2::imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        color,
        2,
        cv2::imgproc::LINE_8,
        false,
    )?;

    let center = cv2::core::Point::new(observation.obstacle.center_x, observation.obstacle.center_y);
    cv2::imgproc::circle(frame, center, 5, color, -1, cv2::imgproc::LINE_8, 0)?;
    Ok(())
}

/// Status line with the obstacle currently tracked
pub fn draw_tracked(frame: &mut cv2::core::Mat, obstacle: &Obstacle) -> Result<()> {
    let text = if obstacle == &Obstacle::none() {
        "tracking: none".to_owned()
    } else {
        format!(
            "tracking: {} threat {:.2}",
            obstacle.label,
            obstacle.threat_level()
        )
    };
    cv2::imgproc::put_text(
        frame,
        &text,
        cv2::core::Point::new(10, 20),
        cv2::imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        cv2::core::Scalar::new(255., 255., 255., 0.),
        1,
        cv2::imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

/// Writes annotated frames and the threat level to a rerun recording
pub struct Recorder {
    stream: RecordingStream,
    rgb: cv2::core::Mat,
}

impl Recorder {
    pub fn new(path: &str) -> Result<Self> {
        let stream = RecordingStreamBuilder::new("threat_tracker")
            .save(path)
            .with_context(|| format!("cannot create recording {path}"))?;
        Ok(Self {
            stream,
            rgb: cv2::core::Mat::default(),
        })
    }

    pub fn log(&mut self, frame_number: u64, frame: &cv2::core::Mat, threat_level: f64) -> Result<()> {
        self.stream.set_time_sequence("frame", frame_number as i64);

        cv2::imgproc::cvt_color(frame, &mut self.rgb, cv2::imgproc::COLOR_BGR2RGB, 0)?;
        self.stream.log(
            "camera/annotated",
            &rerun::Image::try_from(self.rgb.try_as_array()?)?,
        )?;
        self.stream.log(
            "tracking/threat_level",
            &rerun::TimeSeriesScalar::new(threat_level),
        )?;
        Ok(())
    }
}
