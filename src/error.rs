use std::io;
use thiserror::Error;

/// Error type shared by every format adapter.
///
/// The bit-level primitives (`bitdepth`, `interleave`, `lut`, `rle`) are
/// infallible given correctly-sized buffers; sizing those buffers is the
/// adapter's job, so all failures surface here, before or after the raw
/// sample transforms run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    #[error("unsupported component count: {0}")]
    UnsupportedComponentCount(u32),

    #[error("unsupported compression mode: {0}")]
    UnsupportedCompression(u32),

    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("truncated file: {0}")]
    Truncated(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("image layout not representable in this format: {0}")]
    BadLayout(String),
}

pub type ConvertResult<T> = Result<T, ConvertError>;
