//! PGX reader and writer.
//!
//! PGX is the single-component raw format used by the JPEG 2000 conformance
//! suite: an ASCII header `PG <ML|LM> <+|-> <prec> <width> <height>`, one
//! whitespace byte, then samples at 1, 2 or 4 bytes each in the declared
//! byte order. Precisions below 8 are promoted to 8 bits on read by bit
//! replication.

use std::path::{Path, PathBuf};

use crate::error::{ConvertError, ConvertResult};
use crate::image::{ColorSpace, ComponentParams, Image};

struct HeaderCursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> HeaderCursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Skips blanks and sign characters, reporting whether a '-' occurred.
    fn skip_sign_run(&mut self) -> bool {
        let mut negative = false;
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'+' => {}
                b'-' => negative = true,
                _ => break,
            }
            self.pos += 1;
        }
        negative
    }

    fn parse_u32(&mut self) -> ConvertResult<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| ConvertError::InvalidHeader("non-ASCII PGX header".into()))?;
        digits
            .parse()
            .map_err(|_| ConvertError::InvalidHeader("bad number in PGX header".into()))
    }
}

pub fn decode(src: &[u8]) -> ConvertResult<Image> {
    let mut c = HeaderCursor { src, pos: 0 };
    if src.len() < 2 || &src[..2] != b"PG" {
        return Err(ConvertError::InvalidHeader("missing PG magic".into()));
    }
    c.pos = 2;
    c.skip_blanks();
    let endian1 = c.bump();
    let endian2 = c.bump();
    let big_endian = match (endian1, endian2) {
        (Some(b'M'), Some(b'L')) => true,
        (Some(b'L'), Some(b'M')) => false,
        _ => return Err(ConvertError::InvalidHeader("bad PGX endian tag".into())),
    };
    let sgnd = c.skip_sign_run();
    let mut prec = c.parse_u32()?;
    c.skip_blanks();
    let w = c.parse_u32()?;
    c.skip_blanks();
    let h = c.parse_u32()?;
    // Single separator byte between header and sample data.
    c.bump();

    if prec == 0 || prec > 32 {
        return Err(ConvertError::UnsupportedBitDepth(prec));
    }

    // Sub-byte precisions are stored one byte per sample and widened to a
    // full 8 bits by replicating the top bits.
    let force8 = prec < 8;
    let (ushift, dshift, bias) = if force8 {
        let ushift = 8 - prec;
        (ushift, prec - ushift, if sgnd { 1i32 << (prec - 1) } else { 0 })
    } else {
        (0, 0, 0)
    };
    let stored_sgnd = if force8 { false } else { sgnd };
    let stored_prec = if force8 { 8 } else { prec };
    if force8 {
        prec = 8;
    }

    let params = ComponentParams {
        dx: 1,
        dy: 1,
        w,
        h,
        x0: 0,
        y0: 0,
        prec: stored_prec,
        sgnd: stored_sgnd,
    };
    let mut image = Image::new(0, 0, &[params], ColorSpace::Gray)?;

    let count = (w as usize) * (h as usize);
    let bytes_per_sample = if prec <= 8 {
        1
    } else if prec <= 16 {
        2
    } else {
        4
    };
    let data = &src[c.pos..];
    if data.len() < count * bytes_per_sample {
        return Err(ConvertError::Truncated(format!(
            "PGX needs {} sample bytes, found {}",
            count * bytes_per_sample,
            data.len()
        )));
    }

    let plane = &mut image.comps[0].data;
    for i in 0..count {
        let v = if force8 {
            let v = data[i] as i32 + bias;
            ((v << ushift) + (v >> dshift)) as u8 as i32
        } else if prec <= 8 {
            if stored_sgnd {
                data[i] as i8 as i32
            } else {
                data[i] as i32
            }
        } else if prec <= 16 {
            let pair = [data[2 * i], data[2 * i + 1]];
            let v = if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            };
            if stored_sgnd { v as i16 as i32 } else { v as i32 }
        } else {
            let quad = [data[4 * i], data[4 * i + 1], data[4 * i + 2], data[4 * i + 3]];
            let v = if big_endian {
                u32::from_be_bytes(quad)
            } else {
                u32::from_le_bytes(quad)
            };
            v as i32
        };
        plane[i] = v;
    }
    Ok(image)
}

fn clamp_to_precision(v: i32, prec: u32, sgnd: bool) -> i32 {
    if sgnd {
        if prec <= 8 {
            v.clamp(-128, 127)
        } else if prec <= 16 {
            v.clamp(-32768, 32767)
        } else {
            v
        }
    } else if prec <= 8 {
        v.clamp(0, 255)
    } else if prec <= 16 {
        v.clamp(0, 65535)
    } else {
        v
    }
}

/// Encodes one component as a big-endian PGX file.
pub fn encode_component(image: &Image, index: usize) -> ConvertResult<Vec<u8>> {
    let comp = image
        .comps
        .get(index)
        .ok_or(ConvertError::UnsupportedComponentCount(index as u32))?;
    let prec = comp.precision();
    let mut out = format!(
        "PG ML {} {} {} {}\n",
        if comp.sgnd { '-' } else { '+' },
        prec,
        comp.w,
        comp.h
    )
    .into_bytes();

    let nbytes = if prec <= 8 {
        1
    } else if prec <= 16 {
        2
    } else {
        4
    };
    for &s in &comp.data {
        let v = clamp_to_precision(s, prec, comp.sgnd);
        for j in (0..nbytes).rev() {
            out.push((v >> (j * 8)) as u8);
        }
    }
    Ok(out)
}

/// Output path for component `index`: the given path for single-component
/// images, otherwise the stem with a `_N` suffix.
pub fn component_path(path: &Path, index: usize, count: usize) -> PathBuf {
    if count == 1 {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    path.with_file_name(format!("{stem}_{index}.pgx"))
}

pub fn read(path: impl AsRef<Path>) -> ConvertResult<Image> {
    decode(&std::fs::read(path)?)
}

/// Writes one PGX file per component.
pub fn write(path: impl AsRef<Path>, image: &Image) -> ConvertResult<()> {
    let path = path.as_ref();
    for index in 0..image.comps.len() {
        let bytes = encode_component(image, index)?;
        std::fs::write(component_path(path, index, image.comps.len()), bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_8bit_unsigned() {
        let mut data = b"PG ML + 8 2 2\n".to_vec();
        data.extend_from_slice(&[1, 2, 3, 4]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps[0].data, [1, 2, 3, 4]);
        assert_eq!(img.comps[0].precision(), 8);
        assert!(!img.comps[0].sgnd);
        assert_eq!(img.color_space, ColorSpace::Gray);
    }

    #[test]
    fn decode_signed_16bit_big_endian() {
        let mut data = b"PG ML - 12 2 1\n".to_vec();
        data.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x10]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps[0].data, [-1, 16]);
        assert!(img.comps[0].sgnd);
        assert_eq!(img.comps[0].precision(), 12);
    }

    #[test]
    fn decode_little_endian_tag() {
        let mut data = b"PG LM + 16 1 1\n".to_vec();
        data.extend_from_slice(&[0x34, 0x12]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps[0].data, [0x1234]);
    }

    #[test]
    fn sub_byte_precision_promotes_by_replication() {
        let mut data = b"PG ML + 4 2 1\n".to_vec();
        data.extend_from_slice(&[0x0A, 0x0F]);
        let img = decode(&data).unwrap();
        assert_eq!(img.comps[0].data, [0xAA, 0xFF]);
        assert_eq!(img.comps[0].precision(), 8);
        assert!(!img.comps[0].sgnd);
    }

    #[test]
    fn rejects_bad_endian_tag() {
        assert!(matches!(
            decode(b"PG XX + 8 1 1\n\x00"),
            Err(ConvertError::InvalidHeader(_))
        ));
    }

    #[test]
    fn rejects_short_sample_data() {
        let data = b"PG ML + 8 4 4\n\x01\x02".to_vec();
        assert!(matches!(decode(&data), Err(ConvertError::Truncated(_))));
    }

    #[test]
    fn encode_decode_round_trip_12bit_signed() {
        let params = ComponentParams {
            dx: 1,
            dy: 1,
            w: 3,
            h: 1,
            x0: 0,
            y0: 0,
            prec: 12,
            sgnd: true,
        };
        let mut img = Image::new(0, 0, &[params], ColorSpace::Gray).unwrap();
        img.comps[0].data.copy_from_slice(&[-2048, 0, 2047]);
        let bytes = encode_component(&img, 0).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back.comps[0].data, [-2048, 0, 2047]);
        assert_eq!(back.comps[0].precision(), 12);
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
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
        let mut img = Image::new(0, 0, &[params], ColorSpace::Gray).unwrap();
        img.comps[0].data[0] = 300;
        let bytes = encode_component(&img, 0).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back.comps[0].data, [255]);
    }

    #[test]
    fn component_paths_split_multi_component_images() {
        let p = Path::new("/tmp/out.pgx");
        assert_eq!(component_path(p, 0, 1), PathBuf::from("/tmp/out.pgx"));
        assert_eq!(component_path(p, 2, 3), PathBuf::from("/tmp/out_2.pgx"));
    }
}
