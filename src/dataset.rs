use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as AnyhowContext, Result};
use cv2::prelude::*;
use log::{debug, warn};
use opencv as cv2;
use serde::Deserialize;

use crate::camera::{depth_from_mat, DepthCamera};
use crate::image::{DepthMap, DepthScale};

/// One line of `data.jsonl`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FrameRecord {
    pub time: f64,
    /// color image, relative to the dataset folder
    pub color: String,
    /// depth image, relative to the dataset folder
    pub depth: String,
}

/// Recorded color and depth frames listed in `data.jsonl`
pub struct Dataset {
    root: PathBuf,
    records: Vec<FrameRecord>,
    next: usize,
    depth_scale: DepthScale,
    pub length: u64,
}

impl Dataset {
    pub fn new(path: &Path, depth_scale: DepthScale) -> Result<Dataset> {
        let file = File::open(path.join("data.jsonl"))
            .with_context(|| format!("no data.jsonl in {}", path.display()))?;
        let records = read_records(BufReader::new(file))?;
        debug!("{} frames in {}", records.len(), path.display());
        Ok(Dataset {
            root: path.to_path_buf(),
            length: records.len() as u64,
            records,
            next: 0,
            depth_scale,
        })
    }

    fn current(&self) -> Result<&FrameRecord> {
        self.next
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
            .ok_or(anyhow!("no frame has been read yet"))
    }

    fn read_image(&self, relative: &str, flags: i32) -> Result<cv2::core::Mat> {
        let path = self.root.join(relative);
        let path_str = path
            .to_str()
            .ok_or(anyhow!("path is not valid UTF-8: {}", path.display()))?;
        let image = cv2::imgcodecs::imread(path_str, flags)?;
        if image.empty() {
            return Err(anyhow!("failed to read image {}", path.display()));
        }
        Ok(image)
    }
}

impl DepthCamera for Dataset {
    fn color_frame(&mut self) -> Result<Option<cv2::core::Mat>> {
        let Some(record) = self.records.get(self.next) else {
            return Ok(None);
        };
        let color = record.color.clone();
        self.next += 1;
        let image = self.read_image(&color, cv2::imgcodecs::IMREAD_COLOR)?;
        Ok(Some(image))
    }

    fn depth_frame(&mut self) -> Result<DepthMap> {
        let depth = self.current()?.depth.clone();
        let image = self.read_image(&depth, cv2::imgcodecs::IMREAD_ANYDEPTH)?;
        depth_from_mat(&image, self.depth_scale)
    }

    fn length(&self) -> Option<u64> {
        Some(self.length)
    }
}

/// Parse every frame record, skipping lines that do not describe a frame
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<FrameRecord>> {
    let mut records = vec![];
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("failed to read data.jsonl")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FrameRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => warn!("skipping line {}: {err}", number + 1),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_records() {
        let jsonl = r#"{"time": 0.0, "color": "color/0.png", "depth": "depth/0.png"}

{"time": 0.1, "sensor": {"type": "gyroscope", "values": [0, 0, 0]}}
{"time": 0.2, "color": "color/1.png", "depth": "depth/1.png"}
not json
"#;
        let records = read_records(jsonl.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1],
            FrameRecord {
                time: 0.2,
                color: "color/1.png".into(),
                depth: "depth/1.png".into(),
            }
        );
    }

    #[test]
    fn test_depth_before_color_fails() {
        let mut dataset = Dataset {
            root: PathBuf::from("."),
            records: vec![],
            next: 0,
            depth_scale: DepthScale::Linear { max: 10000 },
            length: 0,
        };
        assert!(dataset.depth_frame().is_err());
        assert!(dataset.color_frame().unwrap().is_none());
    }
}
