//! Final raw-to-RGB stage: level subtraction, white-balance gains and the
//! color correction matrix.

use tracing::debug;

use crate::image_pipeline::bayer::cfa::CfaOrder;
use crate::image_pipeline::bayer::levels::{black_levels, gains_in_canonical_order, white_level};
use crate::image_pipeline::bayer::types::{Plane, RgbImage};
use crate::image_pipeline::common::{DecodeError, Result};
use crate::properties::{CameraProperties, CaptureMetadata};

/// Convert canonical (R, Gr, Gb, B) planes to an RGB image in [0, 1].
///
/// This is rudimentary color processing (half-res green averaging, no
/// demosaic); the output is meant for analysis, not display quality.
pub fn raw_planes_to_rgb(
    planes: &[Plane; 4],
    props: &CameraProperties,
    metadata: &CaptureMetadata,
    apply_ccm: bool,
) -> Result<RgbImage> {
    let order = CfaOrder::from_properties(props, false)?;
    let white = white_level(props, Some(metadata))?;
    let blacks = black_levels(props, Some(metadata), &order)?;
    let gains = metadata
        .color_correction_gains()
        .ok_or(DecodeError::MissingMetadata("android.colorCorrection.gains"))?;
    let gains = gains_in_canonical_order(props, gains)?;
    debug!(?blacks, ?gains, white, "raw to RGB conversion parameters");

    // Rescale to fill [0, 1] after the per-channel black subtraction.
    let max_black = blacks.iter().cloned().fold(0.0f64, f64::max);
    let scale = (white / (white - max_black)) as f32;

    // Collapse to three channels: R, averaged G (Gr black/gain), B.
    let channel_black = [blacks[0], blacks[1], blacks[3]].map(|b| (b / white) as f32);
    let channel_gain = [gains[0], gains[1], gains[3]].map(|g| g as f32);

    let ccm = if apply_ccm {
        let m = metadata
            .color_correction_transform()
            .ok_or(DecodeError::MissingMetadata("android.colorCorrection.transform"))?;
        Some(m.map(|row| row.map(|v| v as f32)))
    } else {
        None
    };

    let [r, gr, gb, b] = planes;
    let width = r.width;
    let height = r.height;
    let mut data = Vec::with_capacity(width * height * 3);
    for i in 0..width * height {
        let raw = [r.data[i], (gr.data[i] + gb.data[i]) / 2.0, b.data[i]];
        let mut px = [0.0f32; 3];
        for c in 0..3 {
            px[c] = ((raw[c] - channel_black[c]) * scale * channel_gain[c]).clamp(0.0, 1.0);
        }
        if let Some(m) = &ccm {
            let [pr, pg, pb] = px;
            for c in 0..3 {
                px[c] = (m[c][0] * pr + m[c][1] * pg + m[c][2] * pb).clamp(0.0, 1.0);
            }
        }
        data.extend_from_slice(&px);
    }
    Ok(RgbImage {
        width,
        height,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props() -> CameraProperties {
        CameraProperties::from(json!({
            "android.sensor.info.colorFilterArrangement": 0,
            "android.sensor.info.whiteLevel": 1000,
            "android.sensor.blackLevelPattern": [100, 100, 100, 100],
        }))
    }

    fn metadata(with_ccm: bool) -> CaptureMetadata {
        let mut obj = json!({
            "android.colorCorrection.gains": [2.0, 1.0, 1.0, 1.5],
        });
        if with_ccm {
            let identity: Vec<_> = [1, 0, 0, 0, 1, 0, 0, 0, 1]
                .iter()
                .map(|&n| json!({"numerator": n, "denominator": 1}))
                .collect();
            obj.as_object_mut()
                .unwrap()
                .insert("android.colorCorrection.transform".into(), json!(identity));
        }
        CaptureMetadata::from(obj)
    }

    fn uniform_planes(values: [f32; 4]) -> [Plane; 4] {
        values.map(|v| {
            let mut p = Plane::zeros(2, 2);
            p.data.fill(v);
            p
        })
    }

    #[test]
    fn levels_gains_and_clipping() {
        // Normalized sample 0.6 with black 0.1 and scale 1000/900.
        let planes = uniform_planes([0.6, 0.6, 0.6, 0.6]);
        let rgb = raw_planes_to_rgb(&planes, &props(), &metadata(false), false).unwrap();
        let expected_g = (0.6 - 0.1) * (1000.0 / 900.0);
        let px = rgb.pixel(0, 0);
        assert!((px[0] - 1.0).abs() < 1e-6, "red gain 2.0 clips to 1.0");
        assert!((px[1] - expected_g).abs() < 1e-5);
        assert!((px[2] - expected_g * 1.5).abs() < 1e-5);
    }

    #[test]
    fn identity_ccm_changes_nothing() {
        let planes = uniform_planes([0.3, 0.4, 0.2, 0.5]);
        let without = raw_planes_to_rgb(&planes, &props(), &metadata(false), false).unwrap();
        let with = raw_planes_to_rgb(&planes, &props(), &metadata(true), true).unwrap();
        for (a, b) in with.data.iter().zip(&without.data) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn green_planes_average() {
        let planes = uniform_planes([0.1, 0.2, 0.4, 0.1]);
        let rgb = raw_planes_to_rgb(&planes, &props(), &metadata(false), false).unwrap();
        let expected = (0.3 - 0.1) * (1000.0 / 900.0);
        assert!((rgb.pixel(1, 1)[1] - expected).abs() < 1e-5);
    }

    #[test]
    fn missing_gains_is_an_error() {
        let planes = uniform_planes([0.5; 4]);
        let meta = CaptureMetadata::from(json!({}));
        let err = raw_planes_to_rgb(&planes, &props(), &meta, false).unwrap_err();
        assert!(matches!(err, DecodeError::MissingMetadata(_)));
    }
}
