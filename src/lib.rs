pub mod camera;
pub mod config;
pub mod dataset;
pub mod detector;
pub mod fps;
pub mod image;
pub mod obstacle;
pub mod pipeline;
pub mod visualization;
