//! TIFF reader and writer built on the `tiff` crate.
//!
//! The decoder accepts 8- and 16-bit grayscale, grayscale-alpha, RGB and
//! RGBA strips; the crate hands samples over in host order so the
//! big-endian unpackers are not involved. The encoder emits 8- or 16-bit
//! files only, widening in-between precisions to 16 bits by shifted
//! replication.

use std::io::Cursor;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

use crate::error::{ConvertError, ConvertResult};
use crate::image::{ColorSpace, ComponentParams, Image};
use crate::interleave::{interleaved_to_planar, planar_to_interleaved};

fn tiff_err(e: tiff::TiffError) -> ConvertError {
    ConvertError::Decode(e.to_string())
}

fn tiff_encode_err(e: tiff::TiffError) -> ConvertError {
    ConvertError::Encode(e.to_string())
}

pub fn decode(src: &[u8]) -> ConvertResult<Image> {
    let mut decoder = Decoder::new(Cursor::new(src)).map_err(tiff_err)?;
    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let color_type = decoder.colortype().map_err(tiff_err)?;
    let result = decoder.read_image().map_err(tiff_err)?;

    let (numcomps, bits) = match color_type {
        tiff::ColorType::Gray(b) => (1usize, b as u32),
        tiff::ColorType::GrayA(b) => (2, b as u32),
        tiff::ColorType::RGB(b) => (3, b as u32),
        tiff::ColorType::RGBA(b) => (4, b as u32),
        other => {
            return Err(ConvertError::Decode(format!(
                "unsupported TIFF color type {other:?}"
            )))
        }
    };
    if bits != 8 && bits != 16 {
        return Err(ConvertError::UnsupportedBitDepth(bits));
    }

    let samples: Vec<i32> = match result {
        DecodingResult::U8(buf) => buf.iter().map(|&v| v as i32).collect(),
        DecodingResult::U16(buf) => buf.iter().map(|&v| v as i32).collect(),
        _ => {
            return Err(ConvertError::Decode(
                "unsupported TIFF sample format".into(),
            ))
        }
    };
    let expected = width as usize * height as usize * numcomps;
    if samples.len() < expected {
        return Err(ConvertError::Truncated(format!(
            "TIFF strips hold {} samples, need {}",
            samples.len(),
            expected
        )));
    }

    let params = ComponentParams {
        dx: 1,
        dy: 1,
        w: width,
        h: height,
        x0: 0,
        y0: 0,
        prec: bits,
        sgnd: false,
    };
    let color_space = if numcomps <= 2 { ColorSpace::Gray } else { ColorSpace::Srgb };
    let mut image = Image::new(0, 0, &vec![params; numcomps], color_space)?;

    let mut planes: Vec<&mut [i32]> = image
        .comps
        .iter_mut()
        .map(|c| c.data.as_mut_slice())
        .collect();
    interleaved_to_planar(&samples[..expected], &mut planes);
    Ok(image)
}

pub fn encode(image: &Image) -> ConvertResult<Vec<u8>> {
    let c0 = &image.comps[0];
    if image.comps.iter().any(|c| {
        c.dx != c0.dx || c.dy != c0.dy || c.precision() != c0.precision()
    }) {
        return Err(ConvertError::BadLayout(
            "TIFF requires components with identical geometry and precision".into(),
        ));
    }

    let prec = c0.precision();
    let mut bps = prec;
    let (mut ushift, mut dshift) = (0, 0);
    if bps > 8 && bps < 16 {
        ushift = 16 - bps;
        dshift = (bps - ushift) >> 1;
        bps = 16;
    }
    if bps != 8 && bps != 16 {
        return Err(ConvertError::UnsupportedBitDepth(prec));
    }
    let adjust = if c0.sgnd { 1i32 << (prec - 1) } else { 0 };
    let max = ((1u32 << prec) - 1) as i32;

    let numcomps = image.comps.len();
    if numcomps == 2 {
        return Err(ConvertError::UnsupportedComponentCount(2));
    }
    let (w, h) = (c0.w as usize, c0.h as usize);

    let mut inter = vec![0i32; w * h * numcomps];
    {
        let planes: Vec<&[i32]> = image.comps.iter().map(|c| c.data.as_slice()).collect();
        planar_to_interleaved(&planes, &mut inter, adjust);
    }
    for v in inter.iter_mut() {
        let c = (*v).clamp(0, max);
        *v = if ushift > 0 { (c << ushift) + (c >> dshift) } else { c };
    }

    let mut out = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut out).map_err(tiff_encode_err)?;
        let (width, height) = (c0.w, c0.h);
        match (numcomps, bps) {
            (1, 8) => {
                let buf: Vec<u8> = inter.iter().map(|&v| v as u8).collect();
                encoder
                    .write_image::<colortype::Gray8>(width, height, &buf)
                    .map_err(tiff_encode_err)?;
            }
            (1, 16) => {
                let buf: Vec<u16> = inter.iter().map(|&v| v as u16).collect();
                encoder
                    .write_image::<colortype::Gray16>(width, height, &buf)
                    .map_err(tiff_encode_err)?;
            }
            (3, 8) => {
                let buf: Vec<u8> = inter.iter().map(|&v| v as u8).collect();
                encoder
                    .write_image::<colortype::RGB8>(width, height, &buf)
                    .map_err(tiff_encode_err)?;
            }
            (3, 16) => {
                let buf: Vec<u16> = inter.iter().map(|&v| v as u16).collect();
                encoder
                    .write_image::<colortype::RGB16>(width, height, &buf)
                    .map_err(tiff_encode_err)?;
            }
            (4, 8) => {
                let buf: Vec<u8> = inter.iter().map(|&v| v as u8).collect();
                encoder
                    .write_image::<colortype::RGBA8>(width, height, &buf)
                    .map_err(tiff_encode_err)?;
            }
            (4, 16) => {
                let buf: Vec<u16> = inter.iter().map(|&v| v as u16).collect();
                encoder
                    .write_image::<colortype::RGBA16>(width, height, &buf)
                    .map_err(tiff_encode_err)?;
            }
            (n, _) => return Err(ConvertError::UnsupportedComponentCount(n as u32)),
        }
    }
    Ok(out.into_inner())
}

pub fn read(path: impl AsRef<Path>) -> ConvertResult<Image> {
    decode(&std::fs::read(path)?)
}

pub fn write(path: impl AsRef<Path>, image: &Image) -> ConvertResult<()> {
    std::fs::write(path, encode(image)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(numcomps: usize, prec: u32, sgnd: bool, w: u32, h: u32) -> Image {
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
        let cs = if numcomps == 1 { ColorSpace::Gray } else { ColorSpace::Srgb };
        Image::new(0, 0, &vec![params; numcomps], cs).unwrap()
    }

    #[test]
    fn rgb8_round_trip() {
        let mut img = make_image(3, 8, false, 4, 3);
        for (i, c) in img.comps.iter_mut().enumerate() {
            for (j, v) in c.data.iter_mut().enumerate() {
                *v = (i * 50 + j * 3) as i32;
            }
        }
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps.len(), 3);
        assert_eq!(back.color_space, ColorSpace::Srgb);
        for (a, b) in img.comps.iter().zip(&back.comps) {
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn gray16_round_trip() {
        let mut img = make_image(1, 16, false, 2, 2);
        img.comps[0].data.copy_from_slice(&[0, 1, 40000, 65535]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].precision(), 16);
        assert_eq!(back.comps[0].data, [0, 1, 40000, 65535]);
    }

    #[test]
    fn rgba_keeps_alpha_plane() {
        let mut img = make_image(4, 8, false, 2, 1);
        for (i, c) in img.comps.iter_mut().enumerate() {
            c.data.copy_from_slice(&[i as i32 * 10, i as i32 * 10 + 1]);
        }
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps.len(), 4);
        assert_eq!(back.comps[3].data, [30, 31]);
    }

    #[test]
    fn twelve_bit_widens_to_sixteen() {
        let mut img = make_image(1, 12, false, 2, 1);
        img.comps[0].data.copy_from_slice(&[0, 0xFFF]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].precision(), 16);
        assert_eq!(back.comps[0].data[0], 0);
        // 0xFFF << 4 plus the replicated top bits.
        assert_eq!(back.comps[0].data[1], (0xFFF << 4) + (0xFFF >> 4));
    }

    #[test]
    fn signed_samples_are_rebiased() {
        let mut img = make_image(1, 8, true, 3, 1);
        img.comps[0].data.copy_from_slice(&[-128, 0, 127]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert!(!back.comps[0].sgnd);
        assert_eq!(back.comps[0].data, [0, 128, 255]);
    }

    #[test]
    fn rejects_unsupported_shapes() {
        let wide = make_image(1, 17, false, 1, 1);
        assert!(matches!(
            encode(&wide),
            Err(ConvertError::UnsupportedBitDepth(17))
        ));
        let two = make_image(2, 8, false, 1, 1);
        assert!(matches!(
            encode(&two),
            Err(ConvertError::UnsupportedComponentCount(2))
        ));
    }
}
