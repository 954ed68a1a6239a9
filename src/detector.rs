use anyhow::{Context as AnyhowContext, Result};
use cv2::prelude::*;
use opencv as cv2;
use tracing::info;

/// Class labels MobileNet SSD was trained to detect
pub const CLASSES: [&str; 21] = [
    "background",
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

pub fn class_label(class_index: usize) -> &'static str {
    CLASSES.get(class_index).copied().unwrap_or("unknown")
}

const INPUT_SIZE: i32 = 300;
const SCALE_FACTOR: f64 = 0.007843;
const MEAN: f64 = 127.5;
/// image_id, class_id, confidence, x1, y1, x2, y2
const ROW_LEN: usize = 7;

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_index: usize,
    pub confidence: f32,
    /// x1, y1, x2, y2 as fractions of the image width and height
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn label(&self) -> &'static str {
        class_label(self.class_index)
    }
}

pub trait ObjectDetector {
    fn detect(&mut self, image: &cv2::core::Mat) -> Result<Vec<Detection>>;
}

/// MobileNet SSD running on the OpenCV dnn module
pub struct MobileNetSsd {
    net: cv2::dnn::Net,
    resized: cv2::core::Mat,
}

impl MobileNetSsd {
    pub fn new(prototxt: &str, model: &str) -> Result<Self> {
        info!("loading model {model}");
        let net = cv2::dnn::read_net_from_caffe(prototxt, model)
            .with_context(|| format!("failed to load Caffe model {model} with {prototxt}"))?;
        Ok(Self {
            net,
            resized: cv2::core::Mat::default(),
        })
    }
}

impl ObjectDetector for MobileNetSsd {
    fn detect(&mut self, image: &cv2::core::Mat) -> Result<Vec<Detection>> {
        let size = cv2::core::Size::new(INPUT_SIZE, INPUT_SIZE);
        cv2::imgproc::resize(
            image,
            &mut self.resized,
            size,
            0.,
            0.,
            cv2::imgproc::INTER_LINEAR,
        )?;
        let blob = cv2::dnn::blob_from_image(
            &self.resized,
            SCALE_FACTOR,
            size,
            cv2::core::Scalar::all(MEAN),
            false,
            false,
            cv2::core::CV_32F,
        )?;
        self.net
            .set_input(&blob, "", 1., cv2::core::Scalar::default())?;
        let output = self.net.forward_single("")?;
        Ok(parse_detections(output.data_typed::<f32>()?))
    }
}

/// Decode the flat `[1, 1, N, 7]` SSD output
pub fn parse_detections(raw: &[f32]) -> Vec<Detection> {
    raw.chunks_exact(ROW_LEN)
        .filter(|row| row[1] >= 0.)
        .map(|row| Detection {
            class_index: row[1] as usize,
            confidence: row[2],
            bbox: [row[3], row[4], row[5], row[6]],
        })
        .collect()
}
