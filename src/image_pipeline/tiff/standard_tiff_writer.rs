use std::io::Write;

use tracing::debug;

use crate::image_pipeline::bayer::types::RgbImage;
use crate::image_pipeline::common::{DecodeError, Result};
use crate::image_pipeline::raw::RawBuffer;
use crate::image_pipeline::tiff::types::{TiffCompression, WriterConfig};
use crate::image_pipeline::tiff::writer::ImageWriter;

pub struct StandardTiffWriter;

fn build_encoder<W: Write + std::io::Seek>(
    sink: W,
    config: &WriterConfig,
) -> Result<tiff::encoder::TiffEncoder<W>> {
    let compression = match config.compression {
        TiffCompression::None => tiff::encoder::Compression::Uncompressed,
        TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
        TiffCompression::Deflate => tiff::encoder::Compression::Deflate(
            tiff::encoder::compression::DeflateLevel::Balanced,
        ),
    };
    let mut encoder = tiff::encoder::TiffEncoder::new(sink)
        .map_err(|e| DecodeError::Encode(e.to_string()))?
        .with_compression(compression);
    if let Some(predictor_val) = config.predictor {
        let predictor = match predictor_val {
            2 => tiff::tags::Predictor::Horizontal,
            _ => tiff::tags::Predictor::None,
        };
        encoder = encoder.with_predictor(predictor);
    }
    Ok(encoder)
}

impl ImageWriter for StandardTiffWriter {
    fn write_raw(
        &self,
        image: &RawBuffer,
        output: &mut dyn Write,
        config: &WriterConfig,
    ) -> Result<()> {
        debug!(
            width = image.width,
            height = image.height,
            "encoding raw buffer as Gray16 TIFF"
        );
        let mut buffer = Vec::new();
        let mut encoder = build_encoder(std::io::Cursor::new(&mut buffer), config)?;
        encoder
            .write_image::<tiff::encoder::colortype::Gray16>(
                image.width as u32,
                image.height as u32,
                &image.data,
            )
            .map_err(|e| DecodeError::Encode(e.to_string()))?;
        output.write_all(&buffer)?;
        Ok(())
    }

    fn write_rgb(
        &self,
        image: &RgbImage,
        output: &mut dyn Write,
        config: &WriterConfig,
    ) -> Result<()> {
        debug!(
            width = image.width,
            height = image.height,
            "encoding RGB image as RGB16 TIFF"
        );
        let samples: Vec<u16> = image
            .data
            .iter()
            .map(|&v| (v * u16::MAX as f32).clamp(0.0, u16::MAX as f32) as u16)
            .collect();
        let mut buffer = Vec::new();
        let mut encoder = build_encoder(std::io::Cursor::new(&mut buffer), config)?;
        encoder
            .write_image::<tiff::encoder::colortype::RGB16>(
                image.width as u32,
                image.height as u32,
                &samples,
            )
            .map_err(|e| DecodeError::Encode(e.to_string()))?;
        output.write_all(&buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips_through_gray16() {
        let image = RawBuffer {
            width: 3,
            height: 2,
            data: vec![0, 1, 2, 1021, 1022, 1023],
            bits_per_sample: 10,
        };
        let mut encoded = Vec::new();
        StandardTiffWriter
            .write_raw(&image, &mut encoded, &WriterConfig::default())
            .unwrap();

        let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(encoded)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U16(data) => assert_eq!(data, image.data),
            other => panic!("unexpected decoding result {other:?}"),
        }
    }

    #[test]
    fn rgb_scales_unit_floats_to_u16() {
        let image = RgbImage {
            width: 1,
            height: 1,
            data: vec![0.0, 0.5, 1.0],
        };
        let mut encoded = Vec::new();
        StandardTiffWriter
            .write_rgb(&image, &mut encoded, &WriterConfig::default())
            .unwrap();

        let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(encoded)).unwrap();
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U16(data) => {
                assert_eq!(data[0], 0);
                assert_eq!(data[2], u16::MAX);
                assert!((data[1] as f32 - 0.5 * u16::MAX as f32).abs() <= 1.0);
            }
            other => panic!("unexpected decoding result {other:?}"),
        }
    }

    #[test]
    fn compressed_file_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.tiff");
        let image = RawBuffer {
            width: 4,
            height: 4,
            data: (0u16..16).collect(),
            bits_per_sample: 16,
        };
        let config = WriterConfig::builder()
            .compression(TiffCompression::Lzw)
            .predictor(Some(2))
            .build();
        let mut file = std::fs::File::create(&path).unwrap();
        StandardTiffWriter
            .write_raw(&image, &mut file, &config)
            .unwrap();
        drop(file);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
