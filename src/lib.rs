//! Raster pixel-format conversion: planar component images, packed
//! sample streams, palette expansion, precision rescaling and a set of
//! file format adapters (BMP, PGX, PNM, RAW, TGA, plus PNG and TIFF
//! behind features of the same name).

pub mod bitdepth;
pub mod error;
pub mod formats;
pub mod image;
pub mod interleave;
pub mod lut;
pub mod rescale;
pub mod rle;

pub use bitdepth::SampleWidth;
pub use error::{ConvertError, ConvertResult};
pub use image::{ColorSpace, Component, ComponentParams, Image};
