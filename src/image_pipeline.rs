//! Raw image decode pipeline.
//!
//! Turns the heterogeneous binary buffers delivered by a capture session
//! into calibrated images: packed 10/12-bit raw buffers are unpacked to
//! 16-bit samples, split into canonical color planes, normalized against
//! black/white levels, optionally lens-shading corrected, and converted to
//! float RGB. YUV, Y8 and JPEG buffers take their own conversion paths.

pub mod bayer;
pub mod color;
pub mod common;
pub mod convert;
pub mod raw;
pub mod tiff;

pub use bayer::{CfaOrder, Plane, RgbImage};
pub use common::{DecodeError, Result};
pub use convert::{
    capture_to_planes, capture_to_raw16, capture_to_rgb, capture_to_stats, stats_to_mean_planes,
};
pub use raw::{RawBuffer, RawStats, unpack_raw10, unpack_raw12};
pub use tiff::{ImageWriter, StandardTiffWriter, TiffCompression, WriterConfig};
