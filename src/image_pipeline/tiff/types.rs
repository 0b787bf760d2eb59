//! TIFF output configuration.

/// TIFF compression methods.
#[derive(Debug, Clone, Copy)]
pub enum TiffCompression {
    /// No compression (fastest, largest file).
    None,
    /// LZW compression.
    Lzw,
    /// Deflate compression, balanced level.
    Deflate,
}

/// Configuration for persisting decoded images.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub compression: TiffCompression,
    /// Predictor value for compression (2 enables horizontal differencing).
    pub predictor: Option<u16>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}

impl WriterConfig {
    pub fn builder() -> WriterConfigBuilder {
        WriterConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct WriterConfigBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
}

impl WriterConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> WriterConfig {
        let default = WriterConfig::default();
        WriterConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}
