//! Decoding dispatch: from delivered captures to planes and RGB.
//!
//! Pure, synchronous transforms over one capture; nothing here touches the
//! transport, so per-capture decoding can run in parallel freely.

use tracing::{debug, instrument};

use crate::image_pipeline::bayer::cfa::CfaOrder;
use crate::image_pipeline::bayer::levels::{black_levels, white_level};
use crate::image_pipeline::bayer::planes::{
    crop_to_active_array, normalize_raw, split_bayer_planes, split_quad_bayer_planes,
};
use crate::image_pipeline::bayer::rgb::raw_planes_to_rgb;
use crate::image_pipeline::bayer::shading::{apply_lens_shading, upsample_shading_channel};
use crate::image_pipeline::bayer::types::{Plane, RgbImage};
use crate::image_pipeline::color::{jpeg_to_rgb, y8_to_rgb, yuv420_planar_to_rgb};
use crate::image_pipeline::common::{DecodeError, Result};
use crate::image_pipeline::raw::{
    RawBuffer, RawStats, raw16_from_bytes, unpack_raw10, unpack_raw12, unpack_raw_stats,
};
use crate::properties::CameraProperties;
use crate::session::capture::Capture;
use crate::session::format::SurfaceFormat;

/// Lens shading map mode value meaning a map is delivered per frame.
const LENS_SHADING_MAP_ON: i64 = 1;

/// Unpack a raw-family capture into 16-bit samples.
pub fn capture_to_raw16(capture: &Capture) -> Result<RawBuffer> {
    let width = capture.width as usize;
    let height = capture.height as usize;
    match capture.format {
        SurfaceFormat::Raw | SurfaceFormat::RawQuadBayer => {
            raw16_from_bytes(&capture.data, width, height)
        }
        SurfaceFormat::Raw10 | SurfaceFormat::Raw10QuadBayer => {
            unpack_raw10(&capture.data, width, height)
        }
        SurfaceFormat::Raw12 => unpack_raw12(&capture.data, width, height),
        other => Err(DecodeError::UnsupportedFormat(other.to_string())),
    }
}

/// Decompose a raw-family capture into canonical (R, Gr, Gb, B) planes,
/// normalized to [0, 1] and cropped to the active pixel array.
#[instrument(skip(capture, props), fields(format = %capture.format))]
pub fn capture_to_planes(capture: &Capture, props: &CameraProperties) -> Result<[Plane; 4]> {
    let quad = capture.format.is_quad_bayer();
    let raw = capture_to_raw16(capture)?;
    let white = white_level(props, Some(&capture.metadata))?;
    let img = normalize_raw(&raw, white);
    let img = crop_to_active_array(img, props, quad)?;
    let order = CfaOrder::from_properties(props, quad)?;
    if quad {
        Ok(split_quad_bayer_planes(&img, &order))
    } else {
        Ok(split_bayer_planes(&img, &order))
    }
}

/// Decode any displayable capture to a float RGB image in [0, 1].
///
/// Raw-family captures run the full Bayer pipeline including lens shading
/// (when the frame carries a map) and, if `apply_ccm` is set, the color
/// correction matrix from the capture result.
#[instrument(skip(capture, props), fields(format = %capture.format))]
pub fn capture_to_rgb(
    capture: &Capture,
    props: &CameraProperties,
    apply_ccm: bool,
) -> Result<RgbImage> {
    let width = capture.width as usize;
    let height = capture.height as usize;
    match capture.format {
        SurfaceFormat::Yuv => yuv420_planar_to_rgb(&capture.data, width, height),
        SurfaceFormat::Y8 => y8_to_rgb(&capture.data, width, height),
        SurfaceFormat::Jpeg | SurfaceFormat::JpegR => jpeg_to_rgb(&capture.data),
        SurfaceFormat::Raw
        | SurfaceFormat::Raw10
        | SurfaceFormat::Raw12
        | SurfaceFormat::RawQuadBayer
        | SurfaceFormat::Raw10QuadBayer => raw_capture_to_rgb(capture, props, apply_ccm),
        other => Err(DecodeError::UnsupportedFormat(other.to_string())),
    }
}

fn raw_capture_to_rgb(
    capture: &Capture,
    props: &CameraProperties,
    apply_ccm: bool,
) -> Result<RgbImage> {
    let mut planes = capture_to_planes(capture, props)?;

    if capture.metadata.lens_shading_map_mode() == Some(LENS_SHADING_MAP_ON) {
        if let Some(grid) = capture.metadata.lens_shading_grid() {
            debug!(
                grid_w = grid.width,
                grid_h = grid.height,
                "applying lens shading map"
            );
            let order = CfaOrder::from_properties(props, false)?;
            let white = white_level(props, Some(&capture.metadata))?;
            let blacks = black_levels(props, Some(&capture.metadata), &order)?;
            for (channel, plane) in planes.iter_mut().enumerate() {
                let map = upsample_shading_channel(&grid, channel, plane.width, plane.height);
                apply_lens_shading(plane, blacks[channel], white, &map);
            }
        }
    }

    raw_planes_to_rgb(&planes, props, &capture.metadata, apply_ccm)
}

/// Unpack an on-device statistics capture into mean/variance images.
pub fn capture_to_stats(capture: &Capture) -> Result<RawStats> {
    if !capture.format.is_stats() {
        return Err(DecodeError::UnsupportedFormat(capture.format.to_string()));
    }
    let channels = if capture.format.is_quad_bayer() { 16 } else { 4 };
    unpack_raw_stats(
        &capture.data,
        capture.width as usize,
        capture.height as usize,
        channels,
    )
}

/// Mean planes of a statistics capture in canonical order, normalized by
/// the white level. The black level is deliberately not subtracted.
pub fn stats_to_mean_planes(capture: &Capture, props: &CameraProperties) -> Result<[Plane; 4]> {
    let stats = capture_to_stats(capture)?;
    let white = white_level(props, Some(&capture.metadata))? as f32;
    let quad = capture.format.is_quad_bayer();
    let order = CfaOrder::from_properties(props, quad)?;
    let idx = order.indices();

    let channel_plane = |channel: usize| -> Plane {
        let mut plane = Plane::zeros(stats.width, stats.height);
        for i in 0..stats.width * stats.height {
            plane.data[i] = stats.means[i * stats.num_channels + channel];
        }
        plane
    };

    let planes = std::array::from_fn(|color| {
        if quad {
            let mut avg = Plane::zeros(stats.width, stats.height);
            for &ch in &idx[color * 4..(color + 1) * 4] {
                let plane = channel_plane(ch);
                for (dst, src) in avg.data.iter_mut().zip(&plane.data) {
                    *dst += src;
                }
            }
            for v in &mut avg.data {
                *v = *v / 4.0 / white;
            }
            avg
        } else {
            let mut plane = channel_plane(idx[color]);
            for v in &mut plane.data {
                *v /= white;
            }
            plane
        }
    });
    Ok(planes)
}
