use thiserror::Error;

/// Errors raised by the decode pipeline. Every variant is fatal for the
/// capture being decoded: a misaligned unpack or out-of-range crop corrupts
/// every downstream pixel, so there is no partial decode.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid raw10 width {0}: must be a multiple of 4")]
    InvalidRaw10Width(usize),

    #[error("invalid raw12 width {0}: must be a multiple of 2")]
    InvalidRaw12Width(usize),

    #[error("buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferLengthMismatch {
        expected: usize,
        actual: usize,
        width: usize,
        height: usize,
    },

    #[error("crop rectangle {crop_width}x{crop_height}+{x}+{y} does not fit in {width}x{height}")]
    CropOutOfBounds {
        crop_width: usize,
        crop_height: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("image size {width}x{height} matches neither pixel array nor active array")]
    UnexpectedImageSize { width: usize, height: usize },

    #[error("unsupported color filter arrangement code {0}")]
    UnsupportedCfa(i64),

    #[error("format {0} cannot be decoded to RGB")]
    UnsupportedFormat(String),

    #[error("capture metadata is missing {0}")]
    MissingMetadata(&'static str),

    #[error("failed to decode JPEG buffer: {0}")]
    JpegDecode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
