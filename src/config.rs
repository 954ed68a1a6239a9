use crate::image::DepthScale;

#[derive(Debug, Default, clap::Args)]
pub struct Config {
    /// path to Caffe 'deploy' prototxt file
    #[clap(short, long)]
    pub prototxt: String,

    /// path to Caffe pre-trained model
    #[clap(short, long)]
    pub model: String,

    /// minimum probability to filter weak detections
    #[clap(short, long, default_value = "0.2")]
    pub confidence: f64,

    /// highlight cars and people
    #[clap(short, long)]
    pub track: bool,

    /// display width, the frame height follows the aspect ratio
    #[clap(long, default_value = "600")]
    pub width: i32,

    /// raw depth readings are clipped to this value, millimetres for OpenNI2
    #[clap(long, default_value = "10000")]
    pub depth_max: u16,

    /// drop this many low bits instead of scaling linearly up to depth-max
    /// (2 with depth-max 1023 for raw 11-bit Kinect recordings)
    #[clap(long)]
    pub depth_shift: Option<u32>,

    /// seed for the class colors
    #[clap(long, default_value = "0")]
    pub seed: u64,

    #[clap(long)]
    pub headless: bool,

    /// write annotated frames to a rerun recording
    #[clap(long)]
    pub record: Option<String>,
}

impl Config {
    pub fn depth_scale(&self) -> DepthScale {
        match self.depth_shift {
            Some(shift) => DepthScale::Shift {
                max: self.depth_max,
                shift,
            },
            None => DepthScale::Linear {
                max: self.depth_max,
            },
        }
    }
}

/// Live camera settings
#[derive(Debug, Default, clap::Args)]
pub struct CameraConfig {
    #[clap(long, default_value = "0")]
    pub device: i32,

    /// sensor warm-up after opening the device
    #[clap(long, default_value = "2000")]
    pub warmup_ms: u64,
}
