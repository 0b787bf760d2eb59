use std::io::Write;

use crate::image_pipeline::bayer::types::RgbImage;
use crate::image_pipeline::common::Result;
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::tiff::types::WriterConfig;

/// Sink for decoded images. Raw buffers persist as 16-bit grayscale,
/// pipeline output as 16-bit RGB.
pub trait ImageWriter {
    fn write_raw(
        &self,
        image: &RawBuffer,
        output: &mut dyn Write,
        config: &WriterConfig,
    ) -> Result<()>;

    fn write_rgb(
        &self,
        image: &RgbImage,
        output: &mut dyn Write,
        config: &WriterConfig,
    ) -> Result<()>;
}
