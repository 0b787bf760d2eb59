//! Bit-unpacking of packed raw sensor buffers.
//!
//! RAW10 lays out each group of 4 pixels in 5 bytes: 4 bytes carrying the
//! 8 most significant bits of each pixel, then 1 byte carrying the four
//! 2-bit remainders in MSB-to-LSB pixel order. RAW12 is the 2-pixels-in-3-
//! bytes analog with 4-bit remainders. Both are unpacked into 16-bit words
//! with the upper bits zeroed.

use tracing::debug;

use crate::image_pipeline::common::{DecodeError, Result};
use crate::image_pipeline::raw::types::{RawBuffer, RawStats};

/// Unpack a packed RAW10 buffer into 16-bit samples.
///
/// The buffer must hold exactly `height * width * 5 / 4` bytes and the
/// width must be a multiple of 4.
pub fn unpack_raw10(data: &[u8], width: usize, height: usize) -> Result<RawBuffer> {
    if width % 4 != 0 {
        return Err(DecodeError::InvalidRaw10Width(width));
    }
    let expected = height * width * 5 / 4;
    if data.len() != expected {
        return Err(DecodeError::BufferLengthMismatch {
            expected,
            actual: data.len(),
            width,
            height,
        });
    }

    debug!(width, height, "unpacking raw10 buffer");
    let mut out = Vec::with_capacity(width * height);
    for group in data.chunks_exact(5) {
        let lsbs = group[4];
        for (i, &msb) in group[..4].iter().enumerate() {
            // LSB lanes are packed MSB-to-LSB: pixel 0 occupies bits 7..6.
            let lsb = (lsbs >> (6 - 2 * i)) & 0x3;
            out.push(((msb as u16) << 2) | lsb as u16);
        }
    }
    Ok(RawBuffer {
        width,
        height,
        data: out,
        bits_per_sample: 10,
    })
}

/// Unpack a packed RAW12 buffer into 16-bit samples.
///
/// The buffer must hold exactly `height * width * 3 / 2` bytes and the
/// width must be a multiple of 2.
pub fn unpack_raw12(data: &[u8], width: usize, height: usize) -> Result<RawBuffer> {
    if width % 2 != 0 {
        return Err(DecodeError::InvalidRaw12Width(width));
    }
    let expected = height * width * 3 / 2;
    if data.len() != expected {
        return Err(DecodeError::BufferLengthMismatch {
            expected,
            actual: data.len(),
            width,
            height,
        });
    }

    debug!(width, height, "unpacking raw12 buffer");
    let mut out = Vec::with_capacity(width * height);
    for group in data.chunks_exact(3) {
        let lsbs = group[2];
        out.push(((group[0] as u16) << 4) | (lsbs >> 4) as u16);
        out.push(((group[1] as u16) << 4) | (lsbs & 0xf) as u16);
    }
    Ok(RawBuffer {
        width,
        height,
        data: out,
        bits_per_sample: 12,
    })
}

/// Interpret an unpacked little-endian raw16 buffer delivered by the device.
pub fn raw16_from_bytes(data: &[u8], width: usize, height: usize) -> Result<RawBuffer> {
    let expected = width * height * 2;
    if data.len() < expected {
        return Err(DecodeError::BufferLengthMismatch {
            expected,
            actual: data.len(),
            width,
            height,
        });
    }
    let samples = data[..expected]
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    Ok(RawBuffer {
        width,
        height,
        data: samples,
        bits_per_sample: 16,
    })
}

/// Unpack an on-device raw statistics buffer into mean and variance images.
///
/// The payload is two back-to-back height x width x channels float images,
/// little-endian: the 4- (or 16-) channel means followed by the variances.
pub fn unpack_raw_stats(
    data: &[u8],
    width: usize,
    height: usize,
    num_channels: usize,
) -> Result<RawStats> {
    let floats = 2 * width * height * num_channels;
    let expected = floats * 4;
    if data.len() != expected {
        return Err(DecodeError::BufferLengthMismatch {
            expected,
            actual: data.len(),
            width,
            height,
        });
    }
    let mut values = Vec::with_capacity(floats);
    for b in data.chunks_exact(4) {
        values.push(f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
    }
    let variances = values.split_off(floats / 2);
    Ok(RawStats {
        width,
        height,
        num_channels,
        means: values,
        variances,
    })
}

/// Repack 16-bit samples into the RAW10 wire layout. Inverse of
/// [`unpack_raw10`] for in-range samples.
pub fn repack_raw10(buffer: &RawBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.data.len() * 5 / 4);
    for group in buffer.data.chunks_exact(4) {
        let mut lsbs = 0u8;
        for (i, &sample) in group.iter().enumerate() {
            out.push((sample >> 2) as u8);
            lsbs |= ((sample & 0x3) as u8) << (6 - 2 * i);
        }
        out.push(lsbs);
    }
    out
}

/// Repack 16-bit samples into the RAW12 wire layout. Inverse of
/// [`unpack_raw12`] for in-range samples.
pub fn repack_raw12(buffer: &RawBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.data.len() * 3 / 2);
    for pair in buffer.data.chunks_exact(2) {
        out.push((pair[0] >> 4) as u8);
        out.push((pair[1] >> 4) as u8);
        out.push((((pair[0] & 0xf) as u8) << 4) | (pair[1] & 0xf) as u8);
    }
    out
}
