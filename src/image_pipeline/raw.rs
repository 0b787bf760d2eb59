//! Packed raw sensor buffer decoding.
//!
//! This module turns the packed 10/12-bit buffers delivered over the wire
//! into plain 16-bit sample arrays for the Bayer pipeline.

pub mod types;
mod unpack;

pub use types::{RawBuffer, RawStats};
pub use unpack::{
    raw16_from_bytes, repack_raw10, repack_raw12, unpack_raw10, unpack_raw12, unpack_raw_stats,
};
