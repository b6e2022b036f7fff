//! Portable anymap reader and writer (P1 through P7).
//!
//! The reader handles ASCII bitmaps/graymaps/pixmaps (P1, P2, P3), raw
//! bitmaps (P4), raw graymaps/pixmaps with 1- or 2-byte big-endian samples
//! (P5, P6), and the PAM keyed-header format (P7). The writer emits P6 for
//! plain color, P7 when an alpha plane is present, and P5 per component
//! otherwise.
//!
//! Following netpbm convention, bitmap values are inverted (1 is black) and
//! ASCII graymap/pixmap samples are rescaled from `maxval` to 255.

use std::path::{Path, PathBuf};

use crate::error::{ConvertError, ConvertResult};
use crate::image::{ColorSpace, ComponentParams, Image};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TupleType {
    BlackAndWhite,
    Gray,
    GrayAlpha,
    Rgb,
    RgbAlpha,
}

struct Header {
    format: u8,
    width: u32,
    height: u32,
    maxval: u32,
    depth: u32,
    tuple: Option<TupleType>,
}

struct Tokenizer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn skip_space(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            if b == b'#' {
                while self.src.get(self.pos).is_some_and(|&b| b != b'\n') {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> ConvertResult<&'a [u8]> {
        self.skip_space();
        let start = self.pos;
        while self.src.get(self.pos).is_some_and(|b| !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ConvertError::Truncated("PNM header ended early".into()));
        }
        Ok(&self.src[start..self.pos])
    }

    fn int(&mut self) -> ConvertResult<u32> {
        let tok = self.token()?;
        std::str::from_utf8(tok)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ConvertError::InvalidHeader("bad number in PNM header".into()))
    }
}

fn parse_tuple_type(tok: &[u8]) -> ConvertResult<TupleType> {
    match tok {
        b"BLACKANDWHITE" => Ok(TupleType::BlackAndWhite),
        b"GRAYSCALE" => Ok(TupleType::Gray),
        b"GRAYSCALE_ALPHA" => Ok(TupleType::GrayAlpha),
        b"RGB" => Ok(TupleType::Rgb),
        b"RGB_ALPHA" => Ok(TupleType::RgbAlpha),
        other => Err(ConvertError::InvalidHeader(format!(
            "unknown P7 TUPLTYPE {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn parse_header<'a>(t: &mut Tokenizer<'a>) -> ConvertResult<Header> {
    let magic = t.token()?;
    if magic.len() != 2 || magic[0] != b'P' || !(b'1'..=b'7').contains(&magic[1]) {
        return Err(ConvertError::InvalidHeader("not a PNM file".into()));
    }
    let format = magic[1] - b'0';

    let mut header = Header {
        format,
        width: 0,
        height: 0,
        maxval: 255,
        depth: 0,
        tuple: None,
    };

    if format == 7 {
        loop {
            let key = t.token()?;
            match key {
                b"ENDHDR" => break,
                b"WIDTH" => header.width = t.int()?,
                b"HEIGHT" => header.height = t.int()?,
                b"DEPTH" => header.depth = t.int()?,
                b"MAXVAL" => header.maxval = t.int()?,
                b"TUPLTYPE" => header.tuple = Some(parse_tuple_type(t.token()?)?),
                other => {
                    return Err(ConvertError::InvalidHeader(format!(
                        "unknown P7 field {}",
                        String::from_utf8_lossy(other)
                    )));
                }
            }
        }
        if header.tuple.is_none() || header.depth < 1 || header.depth > 4 {
            return Err(ConvertError::InvalidHeader("incomplete P7 header".into()));
        }
    } else {
        header.width = t.int()?;
        header.height = t.int()?;
        if matches!(format, 2 | 3 | 5 | 6) {
            header.maxval = t.int()?;
        }
    }

    if header.width == 0 || header.height == 0 {
        return Err(ConvertError::InvalidDimensions {
            width: header.width,
            height: header.height,
        });
    }
    if matches!(format, 2 | 3 | 5 | 6 | 7) && (header.maxval < 1 || header.maxval > 65535) {
        return Err(ConvertError::InvalidHeader(format!(
            "PNM maxval {} out of range",
            header.maxval
        )));
    }
    Ok(header)
}

/// Bits needed to represent `maxval`, capped at 16.
fn bits_for(maxval: u32) -> u32 {
    let mut prec = 1;
    while prec < 16 && (1u32 << prec) - 1 < maxval {
        prec += 1;
    }
    prec
}

pub fn decode(src: &[u8]) -> ConvertResult<Image> {
    let mut t = Tokenizer { src, pos: 0 };
    let header = parse_header(&mut t)?;

    let numcomps = match header.format {
        1 | 2 | 4 | 5 => 1,
        3 | 6 => 3,
        7 => header.depth as usize,
        _ => unreachable!(),
    };
    let color_space = if numcomps < 3 {
        ColorSpace::Gray
    } else {
        ColorSpace::Srgb
    };
    let prec = bits_for(header.maxval).max(8);

    let params = ComponentParams {
        dx: 1,
        dy: 1,
        w: header.width,
        h: header.height,
        x0: 0,
        y0: 0,
        prec,
        sgnd: false,
    };
    let mut image = Image::new(0, 0, &vec![params; numcomps], color_space)?;
    let count = (header.width as usize) * (header.height as usize);

    match header.format {
        1 => {
            // ASCII bitmap, 1 is black.
            for i in 0..count {
                let v = t.int()?;
                image.comps[0].data[i] = if v != 0 { 0 } else { 255 };
            }
        }
        2 | 3 => {
            for i in 0..count {
                for comp in image.comps.iter_mut() {
                    let v = t.int()? as i32;
                    comp.data[i] = (v * 255) / header.maxval as i32;
                }
            }
        }
        4 => {
            // Raw bitmap, rows padded to whole bytes.
            let pos = data_start(&t)?;
            let (w, h) = (header.width as usize, header.height as usize);
            let row_bytes = (w + 7) / 8;
            if src.len() - pos < row_bytes * h {
                return Err(ConvertError::Truncated("P4 pixel data".into()));
            }
            for y in 0..h {
                let row = &src[pos + y * row_bytes..];
                for x in 0..w {
                    let bit = (row[x / 8] >> (7 - x % 8)) & 1;
                    image.comps[0].data[y * w + x] = if bit != 0 { 0 } else { 255 };
                }
            }
        }
        5 | 6 | 7 => {
            let pos = data_start(&t)?;
            let data = &src[pos..];
            if header.format == 7 && header.tuple == Some(TupleType::BlackAndWhite) {
                if data.len() < count {
                    return Err(ConvertError::Truncated("P7 pixel data".into()));
                }
                for i in 0..count {
                    image.comps[0].data[i] = if data[i] & 1 != 0 { 0 } else { 255 };
                }
            } else {
                let two = prec > 8;
                let sample_bytes = if two { 2 } else { 1 };
                if data.len() < count * numcomps * sample_bytes {
                    return Err(ConvertError::Truncated("PNM pixel data".into()));
                }
                let mut s = 0;
                for i in 0..count {
                    for comp in image.comps.iter_mut() {
                        comp.data[i] = if two {
                            let v = ((data[s] as i32) << 8) | data[s + 1] as i32;
                            s += 2;
                            v
                        } else {
                            let v = data[s] as i32;
                            s += 1;
                            v
                        };
                    }
                }
            }
        }
        _ => unreachable!(),
    }
    Ok(image)
}

/// Offset of the first sample byte: one whitespace character after the
/// final header token.
fn data_start(t: &Tokenizer) -> ConvertResult<usize> {
    if t.pos >= t.src.len() {
        return Err(ConvertError::Truncated("no PNM pixel data".into()));
    }
    Ok(t.pos + 1)
}

fn push_sample(out: &mut Vec<u8>, v: i32, two: bool) {
    if two {
        let v = v.clamp(0, 65535);
        out.push((v >> 8) as u8);
        out.push(v as u8);
    } else {
        out.push(v.clamp(0, 255) as u8);
    }
}

fn sign_bias(image: &Image, index: usize) -> i32 {
    let c = &image.comps[index];
    if c.sgnd { 1 << (c.precision() - 1) } else { 0 }
}

/// True when the leading components share one geometry and precision, so
/// they can be interleaved into a single P6/P7 file.
fn packable(image: &Image) -> bool {
    let n = image.comps.len();
    n == 2
        || (n > 2
            && image.comps[..3].windows(2).all(|p| {
                p[0].dx == p[1].dx
                    && p[0].dy == p[1].dy
                    && p[0].precision() == p[1].precision()
            }))
}

/// Encodes the image as P6 (plain color), P7 (with alpha) or P5 (single
/// component).
pub fn encode(image: &Image) -> ConvertResult<Vec<u8>> {
    let prec = image.comps[0].precision();
    if prec > 16 {
        return Err(ConvertError::UnsupportedBitDepth(prec));
    }
    if !packable(image) {
        return encode_component_p5(image, 0);
    }
    let ncomp = image.comps.len();
    let has_alpha = ncomp == 2 || ncomp == 4;
    let (w, h) = (image.comps[0].w, image.comps[0].h);
    let max = (1i32 << prec) - 1;
    let two = prec > 8;

    let mut out = if has_alpha {
        let tt = if ncomp > 2 { "RGB_ALPHA" } else { "GRAYSCALE_ALPHA" };
        format!(
            "P7\nWIDTH {w}\nHEIGHT {h}\nDEPTH {ncomp}\nMAXVAL {max}\nTUPLTYPE {tt}\nENDHDR\n"
        )
        .into_bytes()
    } else {
        format!("P6\n{w} {h}\n{max}\n").into_bytes()
    };

    let biases: Vec<i32> = (0..ncomp).map(|c| sign_bias(image, c)).collect();
    let count = (w as usize) * (h as usize);
    for i in 0..count {
        for c in 0..ncomp {
            push_sample(&mut out, image.comps[c].data[i] + biases[c], two);
        }
    }
    Ok(out)
}

/// Encodes one component as a P5 graymap.
pub fn encode_component_p5(image: &Image, index: usize) -> ConvertResult<Vec<u8>> {
    let comp = image
        .comps
        .get(index)
        .ok_or(ConvertError::UnsupportedComponentCount(index as u32))?;
    let prec = comp.precision();
    if prec > 16 {
        return Err(ConvertError::UnsupportedBitDepth(prec));
    }
    let max = (1i32 << prec) - 1;
    let two = prec > 8;
    let bias = sign_bias(image, index);

    let mut out = format!("P5\n{} {}\n{max}\n", comp.w, comp.h).into_bytes();
    for &v in &comp.data {
        push_sample(&mut out, v + bias, two);
    }
    Ok(out)
}

fn component_path(path: &Path, index: usize, count: usize) -> PathBuf {
    if count == 1 {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    path.with_file_name(format!("{stem}_{index}.pgm"))
}

pub fn read(path: impl AsRef<Path>) -> ConvertResult<Image> {
    decode(&std::fs::read(path)?)
}

/// Writes the image to `path`. A `.pgm` extension forces per-component
/// graymaps; otherwise a packable image lands in one file and anything
/// else is split into numbered P5 files.
pub fn write(path: impl AsRef<Path>, image: &Image) -> ConvertResult<()> {
    let path = path.as_ref();
    let want_gray = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pgm"));
    if !want_gray && packable(image) {
        std::fs::write(path, encode(image)?)?;
        return Ok(());
    }
    let count = if want_gray { 1 } else { image.comps.len() };
    for index in 0..count {
        let bytes = encode_component_p5(image, index)?;
        std::fs::write(component_path(path, index, count), bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(prec: u32, sgnd: bool, w: u32, h: u32, data: &[i32]) -> Image {
        let params = ComponentParams {
            dx: 1,
            dy: 1,
            w,
            h,
            x0: 0,
            y0: 0,
            prec,
            sgnd,
        };
        let mut img = Image::new(0, 0, &[params], ColorSpace::Gray).unwrap();
        img.comps[0].data.copy_from_slice(data);
        img
    }

    #[test]
    fn p1_ascii_bitmap_inverts() {
        let img = decode(b"P1\n2 2\n0 1 1 0\n").unwrap();
        assert_eq!(img.comps[0].data, [255, 0, 0, 255]);
        assert_eq!(img.comps[0].precision(), 8);
    }

    #[test]
    fn p2_ascii_rescales_to_255() {
        let img = decode(b"P2\n# a comment\n3 1\n100\n0 50 100\n").unwrap();
        assert_eq!(img.comps[0].data, [0, 127, 255]);
    }

    #[test]
    fn p3_ascii_pixmap() {
        let img = decode(b"P3\n1 1\n255\n10 20 30\n").unwrap();
        assert_eq!(img.comps.len(), 3);
        assert_eq!(img.color_space, ColorSpace::Srgb);
        let px: Vec<i32> = img.comps.iter().map(|c| c.data[0]).collect();
        assert_eq!(px, [10, 20, 30]);
    }

    #[test]
    fn p4_raw_bitmap_rows_are_byte_aligned() {
        let img = decode(b"P4\n4 2\n\xA0\x50").unwrap();
        assert_eq!(img.comps[0].data, [0, 255, 0, 255, 255, 0, 255, 0]);
    }

    #[test]
    fn p5_raw_16bit_big_endian() {
        let mut data = b"P5\n2 1\n1023\n".to_vec();
        data.extend_from_slice(&[0x03, 0xFF, 0x00, 0x01]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps[0].data, [1023, 1]);
        assert_eq!(img.comps[0].precision(), 10);
    }

    #[test]
    fn p6_raw_pixmap() {
        let mut data = b"P6\n2 1\n255\n".to_vec();
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps[0].data, [1, 4]);
        assert_eq!(img.comps[1].data, [2, 5]);
        assert_eq!(img.comps[2].data, [3, 6]);
    }

    #[test]
    fn p7_grayscale_alpha() {
        let mut data =
            b"P7\nWIDTH 2\nHEIGHT 1\nDEPTH 2\nMAXVAL 255\nTUPLTYPE GRAYSCALE_ALPHA\nENDHDR\n"
                .to_vec();
        data.extend_from_slice(&[9, 255, 10, 128]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps.len(), 2);
        assert_eq!(img.color_space, ColorSpace::Gray);
        assert_eq!(img.comps[0].data, [9, 10]);
        assert_eq!(img.comps[1].data, [255, 128]);
    }

    #[test]
    fn p7_requires_endhdr_and_tupltype() {
        assert!(decode(b"P7\nWIDTH 1\nHEIGHT 1\nDEPTH 1\nMAXVAL 255\n").is_err());
    }

    #[test]
    fn rejects_oversized_maxval() {
        assert!(matches!(
            decode(b"P5\n1 1\n70000\n\x00"),
            Err(ConvertError::InvalidHeader(_))
        ));
    }

    #[test]
    fn rejects_truncated_raw_data() {
        assert!(matches!(
            decode(b"P6\n4 4\n255\n\x01\x02"),
            Err(ConvertError::Truncated(_))
        ));
    }

    #[test]
    fn encode_decode_p6_round_trip() {
        let params = ComponentParams {
            dx: 1,
            dy: 1,
            w: 2,
            h: 2,
            x0: 0,
            y0: 0,
            prec: 8,
            sgnd: false,
        };
        let mut img = Image::new(0, 0, &[params; 3], ColorSpace::Srgb).unwrap();
        for (i, c) in img.comps.iter_mut().enumerate() {
            for (j, v) in c.data.iter_mut().enumerate() {
                *v = (i * 50 + j) as i32;
            }
        }
        let back = decode(&encode(&img).unwrap()).unwrap();
        for (a, b) in img.comps.iter().zip(&back.comps) {
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn encode_decode_p5_16bit_round_trip() {
        let img = gray_image(12, false, 2, 1, &[0, 4095]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].data, [0, 4095]);
        assert_eq!(back.comps[0].precision(), 12);
    }

    #[test]
    fn encode_alpha_uses_p7() {
        let params = ComponentParams {
            dx: 1,
            dy: 1,
            w: 1,
            h: 1,
            x0: 0,
            y0: 0,
            prec: 8,
            sgnd: false,
        };
        let mut img = Image::new(0, 0, &[params; 4], ColorSpace::Srgb).unwrap();
        for (i, c) in img.comps.iter_mut().enumerate() {
            c.data[0] = i as i32 * 3;
        }
        let bytes = encode(&img).unwrap();
        assert!(bytes.starts_with(b"P7\n"));
        let back = decode(&bytes).unwrap();
        assert_eq!(back.comps.len(), 4);
        for (i, c) in back.comps.iter().enumerate() {
            assert_eq!(c.data[0], i as i32 * 3);
        }
    }

    #[test]
    fn encode_signed_samples_are_rebiased() {
        let img = gray_image(8, true, 2, 1, &[-128, 127]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].data, [0, 255]);
    }
}
