use anyhow::{bail, Result};

/// How raw 16-bit sensor readings are squeezed into a byte
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DepthScale {
    /// clip to `max`, then scale linearly so `max` reads 255 (millimetre sensors)
    Linear { max: u16 },
    /// clip to `max`, then drop `shift` low bits (raw 11-bit Kinect readings)
    Shift { max: u16, shift: u32 },
}

impl DepthScale {
    pub fn apply(&self, raw: u16) -> u8 {
        match *self {
            DepthScale::Linear { max } => {
                if max == 0 {
                    return 0;
                }
                (raw.min(max) as u32 * u8::MAX as u32 / max as u32) as u8
            }
            DepthScale::Shift { max, shift } => {
                (raw.min(max) >> shift).min(u8::MAX as u16) as u8
            }
        }
    }
}

/// Row-major 8-bit depth readings aligned to a color frame
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl DepthMap {
    /// Create an empty depth map
    pub fn empty() -> DepthMap {
        DepthMap {
            data: vec![],
            width: 0,
            height: 0,
        }
    }

    pub fn from_u8(width: usize, height: usize, data: Vec<u8>) -> Result<DepthMap> {
        if data.len() != width * height {
            bail!(
                "depth data has {} values, expected {width} x {height}",
                data.len()
            );
        }
        Ok(DepthMap {
            data,
            width,
            height,
        })
    }

    pub fn from_raw(
        width: usize,
        height: usize,
        raw: &[u16],
        scale: DepthScale,
    ) -> Result<DepthMap> {
        let data = raw.iter().map(|&v| scale.apply(v)).collect();
        Self::from_u8(width, height, data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Reading at (x, y) with the coordinates clamped onto the grid
    pub fn value_clamped(&self, x: i32, y: i32) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        Some(self.value(x, y))
    }

    /// Nearest-neighbour resample onto a `width` x `height` grid
    pub fn resized(&self, width: usize, height: usize) -> Result<DepthMap> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        if self.is_empty() {
            bail!("cannot resize an empty depth map");
        }
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let src_y = (y * self.height / height).min(self.height - 1);
            for x in 0..width {
                let src_x = (x * self.width / width).min(self.width - 1);
                data.push(self.value(src_x, src_y));
            }
        }
        Self::from_u8(width, height, data)
    }
}
