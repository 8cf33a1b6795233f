//! memtrace-hw: camera capture for the installation.
//!
//! Streams frames from a V4L2 device and converts them to RGB for display
//! plus a luma plane for the face detector.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameStream, PixelFormat};
pub use frame::{Frame, FrameError};
