//! Canonical color-filter-arrangement ordering.
//!
//! The sensor reports its 2x2 cell layout as a 2-bit arrangement code. All
//! downstream processing works on planes in canonical (R, Gr, Gb, B) order,
//! so the code is resolved once into a channel permutation and applied to
//! planes, black levels and gains alike.

use crate::image_pipeline::common::{DecodeError, Result};
use crate::properties::CameraProperties;

/// Sensor-native channel indices for each canonical color, resolved from a
/// color filter arrangement code.
///
/// For standard Bayer the permutation has 4 entries (R, Gr, Gb, B); for
/// quad-Bayer sensors it has 16, grouping the four same-color photosites of
/// each canonical channel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaOrder {
    indices: Vec<usize>,
}

/// Native 2x2 cell position of (R, Gr, Gb, B) for each arrangement code:
/// 0 = RGGB, 1 = GRBG, 2 = GBRG, 3 = BGGR.
fn bayer_positions(code: i64) -> Result<[usize; 4]> {
    match code {
        0 => Ok([0, 1, 2, 3]),
        1 => Ok([1, 0, 3, 2]),
        2 => Ok([2, 3, 0, 1]),
        3 => Ok([3, 2, 1, 0]),
        _ => Err(DecodeError::UnsupportedCfa(code)),
    }
}

impl CfaOrder {
    pub fn bayer(code: i64) -> Result<Self> {
        Ok(Self {
            indices: bayer_positions(code)?.to_vec(),
        })
    }

    /// Quad-Bayer extension: each canonical color maps to the 4 channels of
    /// its 2x2 photosite block within the sensor's 4x4 repeating cell.
    pub fn quad_bayer(code: i64) -> Result<Self> {
        let positions = bayer_positions(code)?;
        let mut indices = Vec::with_capacity(16);
        for p in positions {
            let base = 8 * (p / 2) + 2 * (p % 2);
            indices.extend_from_slice(&[base, base + 1, base + 4, base + 5]);
        }
        Ok(Self { indices })
    }

    pub fn from_properties(props: &CameraProperties, quad: bool) -> Result<Self> {
        let code = props
            .color_filter_arrangement()
            .ok_or(DecodeError::MissingMetadata(
                "android.sensor.info.colorFilterArrangement",
            ))?;
        if quad {
            Self::quad_bayer(code)
        } else {
            Self::bayer(code)
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Reorder sensor-native items into canonical order.
    pub fn reorder<T: Copy>(&self, items: &[T]) -> Vec<T> {
        self.indices.iter().map(|&i| items[i]).collect()
    }

    /// The permutation mapping canonical order back to sensor-native order.
    pub fn inverse(&self) -> Self {
        let mut indices = vec![0; self.indices.len()];
        for (canonical, &native) in self.indices.iter().enumerate() {
            indices[native] = canonical;
        }
        Self { indices }
    }
}
