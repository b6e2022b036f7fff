//! Targa reader and writer.
//!
//! Only uncompressed truecolor files are handled: a fixed 18-byte
//! little-endian header, optional image identifier, then 24-bit BGR or
//! 32-bit BGRA pixels. Bit 5 of the image descriptor selects a top-left
//! origin; files without it are stored bottom-up and get flipped while
//! reading. The writer always emits top-left ordered rows and rescales
//! samples to 8 bits from the declared precision.

use std::path::Path;

use crate::error::{ConvertError, ConvertResult};
use crate::formats::ByteReader;
use crate::image::{ColorSpace, ComponentParams, Image};

const TOP_LEFT_ORIGIN: u8 = 32;

pub fn decode(src: &[u8]) -> ConvertResult<Image> {
    let mut r = ByteReader::new(src);
    let id_len = r.read_u8()?;
    let _cmap_type = r.read_u8()?;
    let image_type = r.read_u8()?;
    let _cmap_index = r.read_u16_le()?;
    let cmap_len = r.read_u16_le()?;
    let cmap_entry_size = r.read_u8()?;
    let _x_origin = r.read_u16_le()?;
    let _y_origin = r.read_u16_le()?;
    let width = r.read_u16_le()? as u32;
    let height = r.read_u16_le()? as u32;
    let pixel_depth = r.read_u8()?;
    let image_desc = r.read_u8()?;

    r.advance(id_len as usize)?;
    if image_type > 8 {
        // 9 and 10 are the RLE variants.
        return Err(ConvertError::UnsupportedCompression(image_type as u32));
    }
    // Palettized files: skip the color map, the pixels are not indexed
    // for types 2/3 anyway.
    r.advance(cmap_len as usize * (cmap_entry_size as usize / 8))?;

    let numcomps = match pixel_depth {
        24 => 3,
        32 => 4,
        other => return Err(ConvertError::UnsupportedBitDepth(other as u32)),
    };
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidDimensions { width, height });
    }
    let flip = image_desc & TOP_LEFT_ORIGIN == 0;

    let params = ComponentParams {
        dx: 1,
        dy: 1,
        w: width,
        h: height,
        x0: 0,
        y0: 0,
        prec: 8,
        sgnd: false,
    };
    let mut image = Image::new(0, 0, &vec![params; numcomps], ColorSpace::Srgb)?;

    let (w, h) = (width as usize, height as usize);
    let pixels = r.read_bytes(w * h * numcomps)?;
    let mut s = 0;
    for y in 0..h {
        let mut index = if flip { (h - 1 - y) * w } else { y * w };
        for _ in 0..w {
            let px = &pixels[s..s + numcomps];
            s += numcomps;
            image.comps[0].data[index] = px[2] as i32;
            image.comps[1].data[index] = px[1] as i32;
            image.comps[2].data[index] = px[0] as i32;
            if numcomps == 4 {
                image.comps[3].data[index] = px[3] as i32;
            }
            index += 1;
        }
    }
    Ok(image)
}

fn write_header(out: &mut Vec<u8>, bits_per_pixel: u8, width: u16, height: u16) {
    out.push(0); // id_length
    out.push(0); // color_map_type
    out.push(2); // uncompressed truecolor
    out.extend_from_slice(&0u16.to_le_bytes()); // color_map_index
    out.extend_from_slice(&0u16.to_le_bytes()); // color_map_length
    out.push(0); // color_map_entry_size
    out.extend_from_slice(&0u16.to_le_bytes()); // x_origin
    out.extend_from_slice(&0u16.to_le_bytes()); // y_origin
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.push(bits_per_pixel);
    out.push(8 | TOP_LEFT_ORIGIN); // 8 bits per channel, top-left origin
}

pub fn encode(image: &Image) -> ConvertResult<Vec<u8>> {
    let c0 = &image.comps[0];
    if image.comps.iter().any(|c| {
        c.dx != c0.dx || c.dy != c0.dy || c.precision() != c0.precision()
    }) {
        return Err(ConvertError::BadLayout(
            "TGA requires components with identical geometry and precision".into(),
        ));
    }
    let (w, h) = (c0.w, c0.h);
    if w > u16::MAX as u32 || h > u16::MAX as u32 {
        return Err(ConvertError::InvalidDimensions { width: w, height: h });
    }

    let ncomp = image.comps.len();
    let write_alpha = ncomp == 2 || ncomp == 4;
    let triple = ncomp > 2;
    let scale = 255.0f32 / (((1u64 << c0.precision()) - 1) as f32);

    let biases: Vec<f32> = image
        .comps
        .iter()
        .map(|c| if c.sgnd { (1i32 << (c.precision() - 1)) as f32 } else { 0.0 })
        .collect();

    let mut out = Vec::with_capacity(18 + (w as usize) * (h as usize) * if write_alpha { 4 } else { 3 });
    write_header(&mut out, if write_alpha { 32 } else { 24 }, w as u16, h as u16);

    let scale_to_byte = |v: f32| -> u8 { (v * scale).clamp(0.0, 255.0) as u8 };
    let count = (w as usize) * (h as usize);
    for i in 0..count {
        let r = image.comps[0].data[i] as f32 + biases[0];
        let (g, b) = if triple {
            (
                image.comps[1].data[i] as f32 + biases[1],
                image.comps[2].data[i] as f32 + biases[2],
            )
        } else {
            (r, r)
        };
        out.push(scale_to_byte(b));
        out.push(scale_to_byte(g));
        out.push(scale_to_byte(r));
        if write_alpha {
            out.push(scale_to_byte(image.comps[ncomp - 1].data[i] as f32));
        }
    }
    Ok(out)
}

pub fn read(path: impl AsRef<Path>) -> ConvertResult<Image> {
    decode(&std::fs::read(path)?)
}

pub fn write(path: impl AsRef<Path>, image: &Image) -> ConvertResult<()> {
    std::fs::write(path, encode(image)?)?;
    Ok(())
}
