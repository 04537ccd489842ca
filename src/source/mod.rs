//! Camera frame sources.
//!
//! This module provides the device handle the acquisition loop owns:
//! - USB/V4L2 devices (feature: capture-v4l2)
//! - Synthetic `stub://` source (testing and hardware-free runs)
//!
//! The source is opened once, tuned once, and read synchronously. It is
//! released when the handle goes out of scope, on every exit path.

pub mod usb;

pub use usb::{CameraSource, SourceStats};
