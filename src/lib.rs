//! Host-side client for a device-side camera service.
//!
//! The [`session`] module drives the service over a forwarded TCP socket:
//! structured capture commands out, precisely accounted image buffers and
//! capture metadata back. The [`image_pipeline`] module decodes the
//! returned buffers, most notably packed raw sensor data, into calibrated
//! RGB for downstream analysis.

pub mod image_pipeline;
pub mod logger;
pub mod properties;
pub mod session;
