//! Microphone capture adapters

pub mod analyser;
pub mod cpal_platform;
pub mod feed;
pub mod ogg_opus;
pub mod stream_encoder;
pub mod wav;

pub use analyser::SpectrumAnalyser;
pub use cpal_platform::{CpalCapturePlatform, CpalStream};
pub use stream_encoder::StreamEncoder;
