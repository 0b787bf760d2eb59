//! TIFF persistence for decoded images.

mod standard_tiff_writer;
pub mod types;
mod writer;

pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{TiffCompression, WriterConfig, WriterConfigBuilder};
pub use writer::ImageWriter;
