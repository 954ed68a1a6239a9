use anyhow::Result;
use clap::Parser;
use opencv as cv2;
use std::path::Path;

use indicatif::ProgressStyle;
use tracing::{info, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::LevelFilter;

use threat_tracker::camera::{DepthCamera, OpenNiCamera};
use threat_tracker::config::*;
use threat_tracker::dataset::Dataset;
use threat_tracker::detector::MobileNetSsd;
use threat_tracker::fps::FpsCounter;
use threat_tracker::pipeline::Pipeline;
use threat_tracker::visualization::resize_to_width;

const WINDOW: &str = "Frame";

#[derive(Parser)]
#[clap(about = "Track the most threatening object in front of a depth camera")]
pub struct Args {
    /// recorded dataset folder, the live camera is used when absent
    #[clap(short, long)]
    pub input_folder: Option<String>,
    /// debug logging
    #[clap(short, long)]
    pub verbose: bool,
    #[clap(flatten)]
    pub config: Config,
    #[clap(flatten)]
    pub camera: CameraConfig,
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();
    let config = &args.config;

    // setup logging
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(level)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    let mut detector = MobileNetSsd::new(&config.prototxt, &config.model)?;
    let mut camera: Box<dyn DepthCamera> = match &args.input_folder {
        Some(folder) => Box::new(Dataset::new(Path::new(folder), config.depth_scale())?),
        None => Box::new(OpenNiCamera::new(&args.camera, config.depth_scale())?),
    };
    let mut pipeline = Pipeline::new(config)?;

    let header_span = info_span!("header");
    match camera.length() {
        Some(length) => {
            header_span.pb_set_style(&ProgressStyle::default_bar());
            header_span.pb_set_length(length);
        }
        None => header_span.pb_set_style(&ProgressStyle::default_spinner()),
    }
    let header_span_enter = header_span.enter();

    let mut fps = FpsCounter::start();
    let mut frame = cv2::core::Mat::default();
    while let Some(color) = camera.color_frame()? {
        resize_to_width(&color, &mut frame, config.width)?;
        let depth = camera.depth_frame()?;
        pipeline.process(&mut frame, &depth, &mut detector)?;

        if !config.headless {
            cv2::highgui::imshow(WINDOW, &frame)?;
            let key = cv2::highgui::wait_key(1)? & 0xFF;
            if key == 'q' as i32 {
                break;
            }
        }
        fps.update();
    }
    fps.stop();

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    info!("tracked obstacle: {:?}", pipeline.tracker().current());
    info!("elapsed time: {:.2}", fps.elapsed());
    info!("approx. FPS: {:.2}", fps.fps());

    if !config.headless {
        cv2::highgui::destroy_all_windows()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_folder_flags() {
        let base = ["threat-tracker", "-p", "deploy.prototxt", "-m", "net.caffemodel"];
        for flag in ["-i", "--input-folder"] {
            let args = Args::try_parse_from(base.iter().chain(&[flag, "data/run1"])).unwrap();
            assert_eq!(args.input_folder.as_deref(), Some("data/run1"));
        }
        let args = Args::try_parse_from(base).unwrap();
        assert!(args.input_folder.is_none());
    }
}
