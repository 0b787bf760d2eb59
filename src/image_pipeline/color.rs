//! Non-raw buffer conversions: planar YUV420, Y8 luma and JPEG.

use jpeg_decoder::{Decoder, PixelFormat};
use tracing::debug;

use crate::image_pipeline::bayer::types::RgbImage;
use crate::image_pipeline::common::{DecodeError, Result};

/// BT.601 full-range YUV to RGB matrix.
const YUV_TO_RGB: [[f32; 3]; 3] = [
    [1.0, 0.0, 1.402],
    [1.0, -0.34414, -0.71414],
    [1.0, 1.772, 0.0],
];

/// Convert a planar YUV420 buffer (full-res Y then quarter-res U and V) to
/// an RGB image in [0, 1].
pub fn yuv420_planar_to_rgb(data: &[u8], width: usize, height: usize) -> Result<RgbImage> {
    let y_len = width * height;
    let expected = y_len * 3 / 2;
    if data.len() < expected {
        return Err(DecodeError::BufferLengthMismatch {
            expected,
            actual: data.len(),
            width,
            height,
        });
    }
    debug!(width, height, "converting yuv420 planar buffer to RGB");
    let y_plane = &data[..y_len];
    let u_plane = &data[y_len..y_len * 5 / 4];
    let v_plane = &data[y_len * 5 / 4..y_len * 3 / 2];

    let half_w = width / 2;
    let mut out = Vec::with_capacity(y_len * 3);
    for row in 0..height {
        for col in 0..width {
            let y = y_plane[row * width + col] as f32;
            let chroma = (row / 2) * half_w + col / 2;
            let u = u_plane[chroma] as f32 - 128.0;
            let v = v_plane[chroma] as f32 - 128.0;
            for coeffs in &YUV_TO_RGB {
                let value = coeffs[0] * y + coeffs[1] * u + coeffs[2] * v;
                // Quantize through u8 like the 8-bit output path it mirrors.
                out.push(value.clamp(0.0, 255.0) as u8 as f32 / 255.0);
            }
        }
    }
    Ok(RgbImage {
        width,
        height,
        data: out,
    })
}

/// Convert an 8-bit luma buffer to a gray RGB image in [0, 1].
pub fn y8_to_rgb(data: &[u8], width: usize, height: usize) -> Result<RgbImage> {
    let expected = width * height;
    if data.len() < expected {
        return Err(DecodeError::BufferLengthMismatch {
            expected,
            actual: data.len(),
            width,
            height,
        });
    }
    let mut out = Vec::with_capacity(expected * 3);
    for &y in &data[..expected] {
        let v = y as f32 / 255.0;
        out.extend_from_slice(&[v, v, v]);
    }
    Ok(RgbImage {
        width,
        height,
        data: out,
    })
}

/// Decompress a JPEG stream to an RGB image in [0, 1].
pub fn jpeg_to_rgb(data: &[u8]) -> Result<RgbImage> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder
        .decode()
        .map_err(|e| DecodeError::JpegDecode(e.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| DecodeError::JpegDecode("missing image info".into()))?;
    let width = info.width as usize;
    let height = info.height as usize;
    debug!(width, height, format = ?info.pixel_format, "decoded JPEG buffer");

    let rgb: Vec<f32> = match info.pixel_format {
        PixelFormat::RGB24 => pixels.iter().map(|&v| v as f32 / 255.0).collect(),
        PixelFormat::L8 => pixels
            .iter()
            .flat_map(|&v| {
                let f = v as f32 / 255.0;
                [f, f, f]
            })
            .collect(),
        other => {
            return Err(DecodeError::JpegDecode(format!(
                "unsupported pixel format {other:?}"
            )));
        }
    };
    if rgb.len() != width * height * 3 {
        return Err(DecodeError::JpegDecode("truncated pixel data".into()));
    }
    Ok(RgbImage {
        width,
        height,
        data: rgb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv_gray_midpoint() {
        // U = V = 128 means zero chroma: output equals Y / 255 on all channels.
        let mut data = vec![100u8; 4];
        data.extend_from_slice(&[128, 128]);
        let rgb = yuv420_planar_to_rgb(&data, 2, 2).unwrap();
        for px in rgb.data.chunks(3) {
            for &c in px {
                assert!((c - 100.0 / 255.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn yuv_red_chroma() {
        // Strong V pushes red above luma and green/blue below it.
        let mut data = vec![128u8; 4];
        data.extend_from_slice(&[128, 255]);
        let rgb = yuv420_planar_to_rgb(&data, 2, 2).unwrap();
        let [r, g, b] = rgb.pixel(0, 0);
        assert!(r > 0.9);
        assert!(g < 128.0 / 255.0);
        assert!((b - 128.0 / 255.0).abs() < 1e-2);
    }

    #[test]
    fn yuv_rejects_short_buffer() {
        let err = yuv420_planar_to_rgb(&[0u8; 5], 2, 2).unwrap_err();
        assert!(matches!(err, DecodeError::BufferLengthMismatch { .. }));
    }

    #[test]
    fn y8_replicates_luma() {
        let rgb = y8_to_rgb(&[0, 255], 2, 1).unwrap();
        assert_eq!(rgb.pixel(0, 0), [0.0, 0.0, 0.0]);
        assert_eq!(rgb.pixel(0, 1), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn jpeg_garbage_is_an_error() {
        assert!(matches!(
            jpeg_to_rgb(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err(),
            DecodeError::JpegDecode(_)
        ));
    }
}
