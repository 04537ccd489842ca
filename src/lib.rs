//! star-capture
//!
//! Fixed-count USB camera acquisition for star-tracker imaging. One run opens
//! a camera, applies a fixed tuning (manual exposure, gain, frame rate,
//! resolution), waits for the hardware to settle, then captures N frames at a
//! fixed interval, converting each to grayscale and writing it as a
//! sequentially numbered JPEG.
//!
//! # Module Structure
//!
//! - `config`: run configuration (defaults, JSON file, env overrides)
//! - `frame`: transient RGB and grayscale frame containers
//! - `source`: camera device handle (V4L2 device or synthetic stub)
//! - `store`: output directory and sequential JPEG files
//! - `acquire`: the acquisition loop itself

pub mod acquire;
pub mod config;
pub mod frame;
pub mod source;
pub mod store;

pub use acquire::{run, AcquisitionReport};
pub use config::{CameraTuning, CaptureConfig, OutputSettings};
pub use frame::{Frame, GrayFrame};
pub use source::{CameraSource, SourceStats};
pub use store::FrameStore;
