//! Bayer pipeline: canonical plane ordering, level normalization, lens
//! shading correction and RGB conversion for decoded raw buffers.

pub mod cfa;
pub mod levels;
pub mod planes;
pub mod rgb;
pub mod shading;
pub mod types;

pub use cfa::CfaOrder;
pub use planes::{crop_to_active_array, normalize_raw, split_bayer_planes, split_quad_bayer_planes};
pub use rgb::raw_planes_to_rgb;
pub use shading::{apply_lens_shading, upsample_shading_channel};
pub use types::{Plane, RgbImage};
