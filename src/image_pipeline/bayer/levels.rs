//! Black/white level and gain resolution for raw decoding.
//!
//! Per-frame dynamic values from the capture result take precedence over
//! the static calibration values in the camera characteristics. Black
//! levels and gains are reported in sensor-native order and must pass
//! through [`CfaOrder`] before they line up with canonical planes.

use tracing::debug;

use crate::image_pipeline::bayer::cfa::CfaOrder;
use crate::image_pipeline::common::{DecodeError, Result};
use crate::properties::{CameraProperties, CaptureMetadata};

/// White level for a capture: dynamic if reported, else static.
pub fn white_level(props: &CameraProperties, metadata: Option<&CaptureMetadata>) -> Result<f64> {
    if let Some(dynamic) = metadata.and_then(CaptureMetadata::dynamic_white_level) {
        debug!(white_level = dynamic, "using dynamic white level");
        return Ok(dynamic);
    }
    props
        .white_level()
        .ok_or(DecodeError::MissingMetadata("android.sensor.info.whiteLevel"))
}

/// Black levels for a capture in canonical channel order.
///
/// Standard Bayer yields 4 values; quad-Bayer yields 16, one per photosite
/// channel, drawn from the 4-entry pattern.
pub fn black_levels(
    props: &CameraProperties,
    metadata: Option<&CaptureMetadata>,
    order: &CfaOrder,
) -> Result<Vec<f64>> {
    let pattern = match metadata.and_then(CaptureMetadata::dynamic_black_levels) {
        Some(dynamic) => {
            debug!(levels = ?dynamic, "using dynamic black levels");
            dynamic
        }
        None => props
            .black_level_pattern()
            .ok_or(DecodeError::MissingMetadata("android.sensor.blackLevelPattern"))?,
    };

    let levels = if order.len() == 16 {
        order.indices().iter().map(|&i| pattern[i / 4]).collect()
    } else {
        order.reorder(&pattern)
    };
    Ok(levels)
}

/// Reorder white-balance gains from (R, G_even, G_odd, B) to canonical
/// (R, Gr, Gb, B). For GBRG/BGGR sensors the even-row green is Gb, so the
/// two green gains swap.
pub fn gains_in_canonical_order(props: &CameraProperties, gains: [f64; 4]) -> Result<[f64; 4]> {
    let code = props
        .color_filter_arrangement()
        .ok_or(DecodeError::MissingMetadata(
            "android.sensor.info.colorFilterArrangement",
        ))?;
    match code {
        0 | 1 => Ok(gains),
        2 | 3 => Ok([gains[0], gains[2], gains[1], gains[3]]),
        _ => Err(DecodeError::UnsupportedCfa(code)),
    }
}
