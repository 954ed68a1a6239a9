use std::time::Duration;

use anyhow::{bail, Result};
use cv2::prelude::*;
use opencv as cv2;
use tracing::info;

use crate::config::CameraConfig;
use crate::image::{DepthMap, DepthScale};

/// Source of color frames with depth readings for the same instant
pub trait DepthCamera {
    /// Next BGR frame, `None` once the input is exhausted
    fn color_frame(&mut self) -> Result<Option<cv2::core::Mat>>;

    /// Depth map belonging to the last color frame
    fn depth_frame(&mut self) -> Result<DepthMap>;

    /// Number of frames, if known in advance
    fn length(&self) -> Option<u64> {
        None
    }
}

/// Convert a single channel depth image; 16-bit readings go through `scale`
pub fn depth_from_mat(mat: &cv2::core::Mat, scale: DepthScale) -> Result<DepthMap> {
    let width = mat.cols() as usize;
    let height = mat.rows() as usize;
    match mat.typ() {
        cv2::core::CV_16UC1 => {
            DepthMap::from_raw(width, height, mat.data_typed::<u16>()?, scale)
        }
        cv2::core::CV_8UC1 => DepthMap::from_u8(width, height, mat.data_bytes()?.to_vec()),
        other => bail!("unsupported depth image type {other}"),
    }
}

/// Kinect style sensor read through the OpenNI2 backend of OpenCV.
/// The depth map arrives in millimetres.
pub struct OpenNiCamera {
    capture: cv2::videoio::VideoCapture,
    depth_scale: DepthScale,
}

impl OpenNiCamera {
    pub fn new(config: &CameraConfig, depth_scale: DepthScale) -> Result<Self> {
        info!("starting video stream on device {}", config.device);
        let capture = cv2::videoio::VideoCapture::new(config.device, cv2::videoio::CAP_OPENNI2)?;
        if !capture.is_opened()? {
            bail!("cannot open OpenNI device {}", config.device);
        }
        // allow the sensor to warm up
        std::thread::sleep(Duration::from_millis(config.warmup_ms));
        Ok(Self {
            capture,
            depth_scale,
        })
    }
}

impl DepthCamera for OpenNiCamera {
    fn color_frame(&mut self) -> Result<Option<cv2::core::Mat>> {
        if !self.capture.grab()? {
            return Ok(None);
        }
        let mut image = cv2::core::Mat::default();
        if !self
            .capture
            .retrieve(&mut image, cv2::videoio::CAP_OPENNI_BGR_IMAGE)?
        {
            return Ok(None);
        }
        Ok(Some(image))
    }

    fn depth_frame(&mut self) -> Result<DepthMap> {
        let mut depth = cv2::core::Mat::default();
        if !self
            .capture
            .retrieve(&mut depth, cv2::videoio::CAP_OPENNI_DEPTH_MAP)?
        {
            bail!("no depth map for the current frame");
        }
        depth_from_mat(&depth, self.depth_scale)
    }
}
