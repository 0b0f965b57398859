//! tally-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access, pixel-format conversion to RGB,
//! and frame quality checks used to gate submission.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::RgbFrame;
