//! Headerless raw sample reader and writer.
//!
//! A raw file is a planar dump: every sample of component 0, then every
//! sample of component 1, and so on. The caller describes the layout with
//! [`RawParams`] since the file carries no metadata. Samples are 1 byte up
//! to 8 bits of precision and 2 bytes up to 16; wider data is not
//! supported.

use std::path::Path;

use crate::error::{ConvertError, ConvertResult};
use crate::image::{ColorSpace, ComponentParams, Image};

/// Byte order of multi-byte raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Per-component subsampling of a raw file.
#[derive(Debug, Clone, Copy)]
pub struct RawSubsampling {
    pub dx: u32,
    pub dy: u32,
}

/// Caller-supplied description of a headerless raw file.
#[derive(Debug, Clone)]
pub struct RawParams {
    /// Full-resolution image width.
    pub width: u32,
    /// Full-resolution image height.
    pub height: u32,
    /// Bits per sample, 1..=16.
    pub precision: u32,
    /// Two's-complement signed samples.
    pub sgnd: bool,
    /// One entry per component; `[RawSubsampling { dx: 1, dy: 1 }]` for a
    /// plain grayscale file.
    pub comps: Vec<RawSubsampling>,
}

impl RawParams {
    fn validate(&self) -> ConvertResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConvertError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.precision == 0 || self.precision > 16 {
            return Err(ConvertError::UnsupportedBitDepth(self.precision));
        }
        if self.comps.is_empty() || self.comps.len() > 4 {
            return Err(ConvertError::UnsupportedComponentCount(self.comps.len() as u32));
        }
        if self.comps.iter().any(|c| c.dx == 0 || c.dy == 0) {
            return Err(ConvertError::InvalidHeader("zero raw subsampling factor".into()));
        }
        Ok(())
    }
}

pub fn decode(src: &[u8], params: &RawParams, order: ByteOrder) -> ConvertResult<Image> {
    params.validate()?;
    let numcomps = params.comps.len();
    let color_space = match numcomps {
        1 => ColorSpace::Gray,
        3 | 4 => ColorSpace::Srgb,
        _ => ColorSpace::Unknown,
    };

    let cparams: Vec<ComponentParams> = params
        .comps
        .iter()
        .map(|c| ComponentParams {
            dx: c.dx,
            dy: c.dy,
            w: (params.width + c.dx - 1) / c.dx,
            h: (params.height + c.dy - 1) / c.dy,
            x0: 0,
            y0: 0,
            prec: params.precision,
            sgnd: params.sgnd,
        })
        .collect();
    let mut image = Image::new(0, 0, &cparams, color_space)?;

    let two = params.precision > 8;
    let sample_bytes = if two { 2 } else { 1 };
    let total: usize = image
        .comps
        .iter()
        .map(|c| c.w as usize * c.h as usize)
        .sum();
    if src.len() < total * sample_bytes {
        return Err(ConvertError::Truncated(format!(
            "raw file needs {} bytes, found {}",
            total * sample_bytes,
            src.len()
        )));
    }

    let mut s = 0;
    for comp in image.comps.iter_mut() {
        for v in comp.data.iter_mut() {
            *v = if two {
                let pair = [src[s], src[s + 1]];
                s += 2;
                let raw = match order {
                    ByteOrder::BigEndian => u16::from_be_bytes(pair),
                    ByteOrder::LittleEndian => u16::from_le_bytes(pair),
                };
                if params.sgnd { raw as i16 as i32 } else { raw as i32 }
            } else {
                let raw = src[s];
                s += 1;
                if params.sgnd { raw as i8 as i32 } else { raw as i32 }
            };
        }
    }
    Ok(image)
}

pub fn encode(image: &Image, order: ByteOrder) -> ConvertResult<Vec<u8>> {
    let mut out = Vec::new();
    for comp in &image.comps {
        let prec = comp.precision();
        if prec > 16 {
            return Err(ConvertError::UnsupportedBitDepth(prec));
        }
        let mask = (1i32 << prec) - 1;
        let two = prec > 8;
        for &v in &comp.data {
            if two {
                let clamped = if comp.sgnd {
                    v.clamp(-32768, 32767)
                } else {
                    v.clamp(0, 65535)
                };
                let raw = (clamped & mask) as u16;
                match order {
                    ByteOrder::BigEndian => out.extend_from_slice(&raw.to_be_bytes()),
                    ByteOrder::LittleEndian => out.extend_from_slice(&raw.to_le_bytes()),
                }
            } else {
                let clamped = if comp.sgnd {
                    v.clamp(-128, 127)
                } else {
                    v.clamp(0, 255)
                };
                out.push((clamped & mask) as u8);
            }
        }
    }
    Ok(out)
}

pub fn read(path: impl AsRef<Path>, params: &RawParams, order: ByteOrder) -> ConvertResult<Image> {
    decode(&std::fs::read(path)?, params, order)
}

pub fn write(path: impl AsRef<Path>, image: &Image, order: ByteOrder) -> ConvertResult<()> {
    std::fs::write(path, encode(image, order)?)?;
    Ok(())
}
