//! Windows bitmap reader and writer.
//!
//! The reader accepts info headers of 40/52/56/108/124 bytes, bit counts
//! 1/4/8 (palette), 24 and 32, and compression modes none, RLE8 and RLE4.
//! Bitfield compression is rejected. The writer emits either 24-bit BGR or
//! 8-bit grayscale with a fixed 256-entry palette.

use std::path::Path;

use num_enum::TryFromPrimitive;

use crate::bitdepth::SampleWidth;
use crate::error::{ConvertError, ConvertResult};
use crate::formats::ByteReader;
use crate::image::{ColorSpace, ComponentParams, Image};
use crate::lut::{Lut, apply_lut8_gray, apply_lut8_rgb};
use crate::rle::{decode_rle4, decode_rle8};

const FILE_HEADER_LEN: usize = 14;
const BMP_MAGIC: u16 = 0x4D42; // "BM"

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
enum Compression {
    None = 0,
    Rle8 = 1,
    Rle4 = 2,
    Bitfields = 3,
}

struct FileHeader {
    off_bits: u32,
}

struct InfoHeader {
    width: u32,
    height: u32,
    bit_count: u16,
    compression: Compression,
    clr_used: u32,
}

fn read_file_header(r: &mut ByteReader) -> ConvertResult<FileHeader> {
    if r.read_u16_le()? != BMP_MAGIC {
        return Err(ConvertError::InvalidHeader("not a BMP file".into()));
    }
    let _size = r.read_u32_le()?;
    let _reserved1 = r.read_u16_le()?;
    let _reserved2 = r.read_u16_le()?;
    let off_bits = r.read_u32_le()?;
    Ok(FileHeader { off_bits })
}

fn read_info_header(r: &mut ByteReader) -> ConvertResult<InfoHeader> {
    let size = r.read_u32_le()?;
    match size {
        40 | 52 | 56 | 108 | 124 => {}
        other => {
            return Err(ConvertError::InvalidHeader(format!(
                "unknown BMP info header size {other}"
            )));
        }
    }
    let width = r.read_u32_le()?;
    let height = r.read_u32_le()?;
    let _planes = r.read_u16_le()?;
    let bit_count = r.read_u16_le()?;
    let compression_raw = r.read_u32_le()?;
    let _size_image = r.read_u32_le()?;
    let _x_pels = r.read_u32_le()?;
    let _y_pels = r.read_u32_le()?;
    let clr_used = r.read_u32_le()?;
    let _clr_important = r.read_u32_le()?;
    // Color masks, gamma and ICC fields of the larger variants.
    r.advance(size as usize - 40)?;

    let compression = Compression::try_from(compression_raw)
        .map_err(|_| ConvertError::UnsupportedCompression(compression_raw))?;
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidDimensions { width, height });
    }
    Ok(InfoHeader {
        width,
        height,
        bit_count,
        compression,
        clr_used,
    })
}

/// Reads the BGRX palette that follows the info header. Returns the three
/// channel LUTs and whether any entry is non-gray.
fn read_palette(r: &mut ByteReader, info: &InfoHeader) -> ConvertResult<([Lut; 3], bool)> {
    let mut luts = [[0u8; 256]; 3];
    let mut palette_len = info.clr_used;
    if palette_len == 0 {
        palette_len = 1u32 << info.bit_count;
    }
    let palette_len = palette_len.min(256) as usize;

    let mut has_color = false;
    for i in 0..palette_len {
        let quad = r.read_bytes(4)?;
        let (b, g, red) = (quad[0], quad[1], quad[2]);
        luts[0][i] = red;
        luts[1][i] = g;
        luts[2][i] = b;
        has_color |= red != g || g != b;
    }
    Ok((luts, has_color))
}

fn row_stride(width: u32, bit_count: u32) -> usize {
    (((width as usize) * bit_count as usize + 31) / 32) * 4
}

/// Unpacks a bottom-up 1- or 4-bit raster into top-down 8-bit indices.
fn expand_indices(
    raw: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    bit_count: u16,
) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let sw = if bit_count == 1 {
        SampleWidth::W1
    } else {
        SampleWidth::W4
    };
    let mut indices = vec![0u8; w * h];
    let mut row = vec![0i32; w];
    for y in 0..h {
        let src = &raw[(h - 1 - y) * stride..];
        sw.unpack(src, &mut row);
        for (d, s) in indices[y * w..(y + 1) * w].iter_mut().zip(&row) {
            *d = *s as u8;
        }
    }
    indices
}

pub fn decode(src: &[u8]) -> ConvertResult<Image> {
    let mut r = ByteReader::new(src);
    let file_h = read_file_header(&mut r)?;
    let info = read_info_header(&mut r)?;

    match info.bit_count {
        1 | 4 | 8 | 24 | 32 => {}
        other => return Err(ConvertError::UnsupportedBitDepth(other as u32)),
    }
    if info.compression == Compression::Bitfields {
        return Err(ConvertError::UnsupportedCompression(info.compression as u32));
    }
    if info.compression == Compression::Rle8 && info.bit_count != 8
        || info.compression == Compression::Rle4 && info.bit_count != 4
    {
        return Err(ConvertError::InvalidHeader(format!(
            "compression {:?} with {} bits per pixel",
            info.compression, info.bit_count
        )));
    }

    let (width, height) = (info.width, info.height);
    let (luts, has_color) = if info.bit_count <= 8 {
        let (luts, has_color) = read_palette(&mut r, &info)?;
        (Some(luts), has_color)
    } else {
        (None, true)
    };
    let numcomps = if has_color { 3 } else { 1 };

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
    let color_space = if numcomps == 1 {
        ColorSpace::Gray
    } else {
        ColorSpace::Srgb
    };
    let mut image = Image::new(0, 0, &vec![params; numcomps], color_space)?;

    r.seek(file_h.off_bits as usize)?;
    let (w, h) = (width as usize, height as usize);

    // Normalize every layout to a top-down 8-bit index raster, or split
    // truecolor rows directly.
    match (info.bit_count, info.compression) {
        (1 | 4, Compression::None) => {
            let stride = row_stride(width, info.bit_count as u32);
            let raw = r.read_bytes(stride * h)?;
            let indices = expand_indices(raw, stride, width, height, info.bit_count);
            apply_palette(&indices, 0, w as isize, &luts, &mut image, width, height);
        }
        (8, Compression::None) => {
            let stride = row_stride(width, 8);
            let raw = r.read_bytes(stride * h)?;
            apply_palette(
                raw,
                (h - 1) * stride,
                -(stride as isize),
                &luts,
                &mut image,
                width,
                height,
            );
        }
        (8, Compression::Rle8) => {
            let indices = decode_rle8(r.remaining(), width, height);
            apply_palette(&indices, 0, w as isize, &luts, &mut image, width, height);
        }
        (4, Compression::Rle4) => {
            let indices = decode_rle4(r.remaining(), width, height);
            apply_palette(&indices, 0, w as isize, &luts, &mut image, width, height);
        }
        (24, Compression::None) => {
            let stride = row_stride(width, 24);
            let raw = r.read_bytes(stride * h)?;
            split_truecolor(raw, stride, 3, &mut image, width, height);
        }
        (32, Compression::None) => {
            let stride = row_stride(width, 32);
            let raw = r.read_bytes(stride * h)?;
            split_truecolor(raw, stride, 4, &mut image, width, height);
        }
        (bits, comp) => {
            return Err(ConvertError::InvalidHeader(format!(
                "unsupported combination of {bits} bits per pixel and compression {comp:?}"
            )));
        }
    }
    Ok(image)
}

fn apply_palette(
    indices: &[u8],
    offset: usize,
    stride: isize,
    luts: &Option<[Lut; 3]>,
    image: &mut Image,
    width: u32,
    height: u32,
) {
    let Some(luts) = luts else { return };
    if image.comps.len() == 1 {
        apply_lut8_gray(
            indices,
            offset,
            stride,
            &luts[0],
            &mut image.comps[0].data,
            width,
            height,
        );
    } else {
        let (r, rest) = image.comps.split_at_mut(1);
        let (g, b) = rest.split_at_mut(1);
        apply_lut8_rgb(
            indices,
            offset,
            stride,
            luts,
            &mut r[0].data,
            &mut g[0].data,
            &mut b[0].data,
            width,
            height,
        );
    }
}

/// Splits bottom-up BGR(X) rows into top-down R, G, B planes. The fourth
/// byte of 32-bit pixels is padding and ignored.
fn split_truecolor(
    raw: &[u8],
    stride: usize,
    bytes_per_pixel: usize,
    image: &mut Image,
    width: u32,
    height: u32,
) {
    let (w, h) = (width as usize, height as usize);
    let mut index = 0;
    for y in 0..h {
        let row = &raw[(h - 1 - y) * stride..];
        for x in 0..w {
            let px = &row[bytes_per_pixel * x..];
            image.comps[0].data[index] = px[2] as i32;
            image.comps[1].data[index] = px[1] as i32;
            image.comps[2].data[index] = px[0] as i32;
            index += 1;
        }
    }
}

/// Reduces a sample to 8 bits: sign re-bias, truncating shift with simple
/// rounding, then clamp.
fn to_byte(v: i32, prec: u32, sgnd: bool, adjust: u32) -> u8 {
    let mut v = v + if sgnd { 1 << (prec - 1) } else { 0 };
    if adjust > 0 {
        v = (v >> adjust) + ((v >> (adjust - 1)) % 2);
    }
    v.clamp(0, 255) as u8
}

fn write_headers(out: &mut Vec<u8>, w: u32, h: u32, bit_count: u16, palette_bytes: u32, image_size: u32) {
    let data_offset = FILE_HEADER_LEN as u32 + 40 + palette_bytes;
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(data_offset + image_size).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data_offset.to_le_bytes());

    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&w.to_le_bytes());
    out.extend_from_slice(&h.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&bit_count.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // compression: none
    out.extend_from_slice(&image_size.to_le_bytes());
    out.extend_from_slice(&7834u32.to_le_bytes()); // pels per meter
    out.extend_from_slice(&7834u32.to_le_bytes());
    let colors = if bit_count == 8 { 256u32 } else { 0 };
    out.extend_from_slice(&colors.to_le_bytes());
    out.extend_from_slice(&colors.to_le_bytes());
}

pub fn encode(image: &Image) -> ConvertResult<Vec<u8>> {
    let c0 = &image.comps[0];
    if c0.precision() < 8 {
        return Err(ConvertError::UnsupportedBitDepth(c0.precision()));
    }
    let (w, h) = (c0.w, c0.h);
    let rgb = image.comps.len() >= 3
        && image.comps[..3]
            .windows(2)
            .all(|p| p[0].dx == p[1].dx && p[0].dy == p[1].dy && p[0].precision() == p[1].precision());

    let mut out = Vec::new();
    if rgb {
        let stride = row_stride(w, 24);
        let image_size = (stride as u32) * h;
        write_headers(&mut out, w, h, 24, 0, image_size);

        let adjust: Vec<u32> = image.comps[..3]
            .iter()
            .map(|c| c.precision().saturating_sub(8))
            .collect();
        for y in (0..h as usize).rev() {
            let row_base = y * w as usize;
            for x in 0..w as usize {
                for c in [2usize, 1, 0] {
                    let comp = &image.comps[c];
                    out.push(to_byte(
                        comp.data[row_base + x],
                        comp.precision(),
                        comp.sgnd,
                        adjust[c],
                    ));
                }
            }
            out.resize(out.len() + (stride - 3 * w as usize), 0);
        }
    } else {
        let stride = row_stride(w, 8);
        let image_size = (stride as u32) * h;
        write_headers(&mut out, w, h, 8, 1024, image_size);
        for i in 0..=255u8 {
            out.extend_from_slice(&[i, i, i, 0]);
        }

        let adjust = c0.precision().saturating_sub(8);
        for y in (0..h as usize).rev() {
            let row_base = y * w as usize;
            for x in 0..w as usize {
                out.push(to_byte(c0.data[row_base + x], c0.precision(), c0.sgnd, adjust));
            }
            out.resize(out.len() + (stride - w as usize), 0);
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
