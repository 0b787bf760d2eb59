//! Lens shading correction.
//!
//! The capture result carries a coarse per-channel correction grid. It is
//! bilinearly upsampled to full plane resolution and applied in sensor
//! sample space, so the black level has to be backed out and restored
//! around the multiply.

use tracing::debug;

use crate::image_pipeline::bayer::types::Plane;
use crate::properties::LensShadingGrid;

/// Bilinearly upsample one channel of the shading grid to plane size.
///
/// Grid anchor points map exactly onto the image corners, so the corner
/// output values equal the grid values with no interpolation error.
pub fn upsample_shading_channel(
    grid: &LensShadingGrid,
    channel: usize,
    width: usize,
    height: usize,
) -> Plane {
    let mut out = Plane::zeros(width, height);
    let u_scale = if width > 1 {
        (grid.width - 1) as f32 / (width - 1) as f32
    } else {
        0.0
    };
    let v_scale = if height > 1 {
        (grid.height - 1) as f32 / (height - 1) as f32
    } else {
        0.0
    };

    for y in 0..height {
        let v = y as f32 * v_scale;
        let v_min = v.floor() as usize;
        let v_frac = v - v_min as f32;
        let v_max = if v_frac > 0.0 { v_min + 1 } else { v_min };
        for x in 0..width {
            let u = x as f32 * u_scale;
            let u_min = u.floor() as usize;
            let u_frac = u - u_min as f32;
            let u_max = if u_frac > 0.0 { u_min + 1 } else { u_min };

            let tl = grid.value(v_min, u_min, channel);
            let tr = grid.value(v_min, u_max, channel);
            let bl = grid.value(v_max, u_min, channel);
            let br = grid.value(v_max, u_max, channel);
            let top = tl * (1.0 - u_frac) + tr * u_frac;
            let bottom = bl * (1.0 - u_frac) + br * u_frac;
            out.set(y, x, top * (1.0 - v_frac) + bottom * v_frac);
        }
    }
    out
}

/// Apply a full-resolution shading map to a normalized color plane:
/// `v' = ((v * white - black) * c + black) / white`.
pub fn apply_lens_shading(plane: &mut Plane, black_level: f64, white_level: f64, map: &Plane) {
    debug!(
        black_level,
        white_level, "applying lens shading correction to plane"
    );
    let black = black_level as f32;
    let white = white_level as f32;
    for (v, &c) in plane.data.iter_mut().zip(&map.data) {
        *v = ((*v * white - black) * c + black) / white;
    }
}
