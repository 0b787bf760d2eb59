//! Typed, read-only views over device-reported camera metadata.
//!
//! The device reports camera characteristics and per-capture results as flat
//! JSON objects keyed by qualified metadata names. These wrappers keep the
//! raw object available for callers that need uncommon keys, while exposing
//! typed accessors for the values the session and decode pipeline consume.

use serde::Deserialize;
use serde_json::Value;

/// Capability id reported for logical multi-cameras.
const CAPABILITY_LOGICAL_MULTI_CAMERA: i64 = 11;

/// Stream-configuration format codes used by the device's scaler metadata.
fn stream_config_code(format: &str) -> Option<i64> {
    match format {
        "raw" => Some(0x20),
        "raw10" => Some(0x25),
        "raw12" => Some(0x26),
        "yuv" => Some(0x23),
        "jpeg" | "jpg" => Some(0x100),
        "jpeg_r" => Some(0x1005),
        "priv" => Some(0x22),
        "y8" => Some(0x2020_3859),
        _ => None,
    }
}

/// A rational number as reported in capture metadata.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }
}

/// A rectangle in sensor coordinates. The left/top edges are inside the
/// rectangle while right/bottom are outside, so width is right - left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Low-resolution per-channel lens shading correction grid, as delivered in
/// a capture result. Values are stored per grid cell in channel-interleaved
/// order (R, Gr, Gb, B).
#[derive(Debug, Clone, PartialEq)]
pub struct LensShadingGrid {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl LensShadingGrid {
    /// Correction factor at grid cell (y, x) for the given channel (0..4).
    pub fn value(&self, y: usize, x: usize, channel: usize) -> f32 {
        self.values[(y * self.width + x) * 4 + channel]
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_i64().map(|i| i as f64))
}

fn f64_quad(v: &Value) -> Option<[f64; 4]> {
    let arr = v.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (dst, src) in out.iter_mut().zip(arr) {
        *dst = as_f64(src)?;
    }
    Some(out)
}

/// Static camera characteristics for one (logical or physical) camera.
#[derive(Debug, Clone, Default)]
pub struct CameraProperties {
    inner: Value,
}

impl From<Value> for CameraProperties {
    fn from(inner: Value) -> Self {
        Self { inner }
    }
}

impl CameraProperties {
    /// Raw metadata value for an arbitrary key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.inner
    }

    /// Static sensor white level.
    pub fn white_level(&self) -> Option<f64> {
        self.get("android.sensor.info.whiteLevel").and_then(as_f64)
    }

    /// Static per-channel black levels in sensor 2x2 cell order.
    pub fn black_level_pattern(&self) -> Option<[f64; 4]> {
        self.get("android.sensor.blackLevelPattern")
            .and_then(f64_quad)
    }

    /// 2-bit color filter arrangement code (0 RGGB, 1 GRBG, 2 GBRG, 3 BGGR).
    pub fn color_filter_arrangement(&self) -> Option<i64> {
        self.get("android.sensor.info.colorFilterArrangement")?
            .as_i64()
    }

    /// Whether the sensor already applies lens shading to raw output.
    pub fn lens_shading_applied(&self) -> bool {
        self.get("android.sensor.info.lensShadingApplied")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn rect(&self, key: &str) -> Option<Rect> {
        serde_json::from_value(self.get(key)?.clone()).ok()
    }

    fn size(&self, key: &str) -> Option<Size> {
        serde_json::from_value(self.get(key)?.clone()).ok()
    }

    /// Pre-correction active array rectangle. `maximum_resolution` selects
    /// the full-resolution variant used for quad-Bayer sensors.
    pub fn active_array_rect(&self, maximum_resolution: bool) -> Option<Rect> {
        if maximum_resolution {
            self.rect("android.sensor.info.preCorrectionActiveArraySizeMaximumResolution")
        } else {
            self.rect("android.sensor.info.preCorrectionActiveArraySize")
        }
    }

    /// Full pixel array dimensions.
    pub fn pixel_array_size(&self, maximum_resolution: bool) -> Option<Size> {
        if maximum_resolution {
            self.size("android.sensor.info.pixelArraySizeMaximumResolution")
        } else {
            self.size("android.sensor.info.pixelArraySize")
        }
    }

    pub fn is_logical_multi_camera(&self) -> bool {
        self.get("android.request.availableCapabilities")
            .and_then(Value::as_array)
            .map(|caps| {
                caps.iter()
                    .any(|c| c.as_i64() == Some(CAPABILITY_LOGICAL_MULTI_CAMERA))
            })
            .unwrap_or(false)
    }

    /// Physical sub-camera ids backing a logical multi-camera.
    pub fn physical_ids(&self) -> Vec<String> {
        self.get("camera.characteristics.physical_ids")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn zoom_ratio_range(&self) -> Option<(f64, f64)> {
        let range = self.get("android.control.zoomRatioRange")?.as_array()?;
        match range.as_slice() {
            [lo, hi] => Some((as_f64(lo)?, as_f64(hi)?)),
            _ => None,
        }
    }

    /// Output sizes available for a wire format name, largest area first.
    pub fn available_output_sizes(&self, format: &str) -> Vec<Size> {
        let Some(code) = stream_config_code(format) else {
            return Vec::new();
        };
        let Some(configs) = self
            .get("android.scaler.streamConfigurationMap.availableStreamConfigurations")
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };
        let mut sizes: Vec<Size> = configs
            .iter()
            .filter(|c| c.get("format").and_then(Value::as_i64) == Some(code))
            .filter(|c| !c.get("input").and_then(Value::as_bool).unwrap_or(false))
            .filter_map(|c| {
                Some(Size {
                    width: c.get("width")?.as_u64()? as u32,
                    height: c.get("height")?.as_u64()? as u32,
                })
            })
            .collect();
        sizes.sort_by_key(|s| std::cmp::Reverse(s.width as u64 * s.height as u64));
        sizes
    }

    /// Largest available output size for a wire format name.
    pub fn max_output_size(&self, format: &str) -> Option<Size> {
        self.available_output_sizes(format).into_iter().next()
    }
}

/// Per-frame capture result metadata for one camera.
#[derive(Debug, Clone, Default)]
pub struct CaptureMetadata {
    inner: Value,
}

impl From<Value> for CaptureMetadata {
    fn from(inner: Value) -> Self {
        Self { inner }
    }
}

impl CaptureMetadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.inner
    }

    /// Per-frame black levels, if the device reported them.
    pub fn dynamic_black_levels(&self) -> Option<[f64; 4]> {
        self.get("android.sensor.dynamicBlackLevel")
            .and_then(f64_quad)
    }

    /// Per-frame white level, if the device reported one.
    pub fn dynamic_white_level(&self) -> Option<f64> {
        self.get("android.sensor.dynamicWhiteLevel").and_then(as_f64)
    }

    /// White-balance gains in R, G_even, G_odd, B order.
    pub fn color_correction_gains(&self) -> Option<[f64; 4]> {
        self.get("android.colorCorrection.gains").and_then(f64_quad)
    }

    /// 3x3 color correction matrix, row-major, converted from rationals.
    pub fn color_correction_transform(&self) -> Option<[[f64; 3]; 3]> {
        let entries: Vec<Rational> =
            serde_json::from_value(self.get("android.colorCorrection.transform")?.clone()).ok()?;
        if entries.len() != 9 {
            return None;
        }
        let mut ccm = [[0.0; 3]; 3];
        for (i, r) in entries.iter().enumerate() {
            ccm[i / 3][i % 3] = r.as_f64();
        }
        Some(ccm)
    }

    /// Lens shading map mode for this frame (1 = map delivered in results).
    pub fn lens_shading_map_mode(&self) -> Option<i64> {
        self.get("android.statistics.lensShadingMapMode")?.as_i64()
    }

    pub fn lens_shading_grid(&self) -> Option<LensShadingGrid> {
        let map = self.get("android.statistics.lensShadingCorrectionMap")?;
        let width = map.get("width")?.as_u64()? as usize;
        let height = map.get("height")?.as_u64()? as usize;
        let values: Vec<f32> = map
            .get("map")?
            .as_array()?
            .iter()
            .filter_map(|v| as_f64(v).map(|f| f as f32))
            .collect();
        if values.len() != width * height * 4 {
            return None;
        }
        Some(LensShadingGrid {
            width,
            height,
            values,
        })
    }

    pub fn exposure_time_ns(&self) -> Option<i64> {
        self.get("android.sensor.exposureTime")?.as_i64()
    }
}
