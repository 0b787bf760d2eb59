//! Raw buffer to color plane decomposition.

use tracing::debug;

use crate::image_pipeline::bayer::cfa::CfaOrder;
use crate::image_pipeline::bayer::types::Plane;
use crate::image_pipeline::common::{DecodeError, Result};
use crate::image_pipeline::raw::RawBuffer;
use crate::properties::CameraProperties;

/// Normalize raw samples into a [0, 1] float plane by the white level.
pub fn normalize_raw(buffer: &RawBuffer, white_level: f64) -> Plane {
    let scale = 1.0 / white_level as f32;
    Plane {
        width: buffer.width,
        height: buffer.height,
        data: buffer.data.iter().map(|&s| s as f32 * scale).collect(),
    }
}

/// Crop a full-pixel-array image down to the active array region.
///
/// Buffers already delivered at the active array size pass through; any
/// other size is rejected since the geometry metadata cannot be trusted
/// for it. When the characteristics lack array geometry the image is
/// returned unchanged.
pub fn crop_to_active_array(
    img: Plane,
    props: &CameraProperties,
    maximum_resolution: bool,
) -> Result<Plane> {
    let (Some(pixel_array), Some(active)) = (
        props.pixel_array_size(maximum_resolution),
        props.active_array_rect(maximum_resolution),
    ) else {
        return Ok(img);
    };

    let full_w = pixel_array.width as usize;
    let full_h = pixel_array.height as usize;
    let x = active.left as usize;
    let y = active.top as usize;
    let crop_w = active.width() as usize;
    let crop_h = active.height() as usize;
    if crop_w > full_w || crop_h > full_h || x > full_w - crop_w || y > full_h - crop_h {
        return Err(DecodeError::CropOutOfBounds {
            crop_width: crop_w,
            crop_height: crop_h,
            x,
            y,
            width: full_w,
            height: full_h,
        });
    }

    if img.width == crop_w && img.height == crop_h {
        debug!("image already at active array size, no crop needed");
        return Ok(img);
    }
    if img.width != full_w || img.height != full_h {
        return Err(DecodeError::UnexpectedImageSize {
            width: img.width,
            height: img.height,
        });
    }

    debug!(crop_w, crop_h, x, y, "cropping to active array");
    let mut out = Plane::zeros(crop_w, crop_h);
    for row in 0..crop_h {
        let src = (y + row) * img.width + x;
        out.data[row * crop_w..(row + 1) * crop_w]
            .copy_from_slice(&img.data[src..src + crop_w]);
    }
    Ok(out)
}

/// Subsample one channel of a repeating `stride` x `stride` cell.
fn subsample_channel(img: &Plane, channel: usize, stride: usize) -> Plane {
    let out_w = img.width / stride;
    let out_h = img.height / stride;
    let row0 = channel / stride;
    let col0 = channel % stride;
    let mut out = Plane::zeros(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            out.set(y, x, img.at(y * stride + row0, x * stride + col0));
        }
    }
    out
}

/// Split a Bayer image into canonical (R, Gr, Gb, B) quarter-res planes.
pub fn split_bayer_planes(img: &Plane, order: &CfaOrder) -> [Plane; 4] {
    let idx = order.indices();
    std::array::from_fn(|color| subsample_channel(img, idx[color], 2))
}

/// Split a quad-Bayer image into canonical (R, Gr, Gb, B) planes.
///
/// The 16 photosite channels are subsampled on the 4x4 cell, reordered to
/// group same-color channels, and each group of four is averaged down to
/// one plane at 1/4 x 1/4 of the full resolution.
pub fn split_quad_bayer_planes(img: &Plane, order: &CfaOrder) -> [Plane; 4] {
    let idx = order.indices();
    std::array::from_fn(|color| {
        let group = &idx[color * 4..(color + 1) * 4];
        let mut avg = Plane::zeros(img.width / 4, img.height / 4);
        for &ch in group {
            let channel = subsample_channel(img, ch, 4);
            for (dst, src) in avg.data.iter_mut().zip(&channel.data) {
                *dst += src;
            }
        }
        for v in &mut avg.data {
            *v /= 4.0;
        }
        avg
    })
}
