//! PNG reader and writer built on the `png` crate.
//!
//! Decoding asks the crate for untransformed rows and does the sample
//! handling here: sub-byte grayscale depths stay at their native precision,
//! palette images expand through the PLTE chunk into three 8-bit planes,
//! and 16-bit channels arrive as big-endian pairs. Encoding writes
//! grayscale at depths 1, 2, 4, 8 or 16 and color at 8 or 16, promoting
//! in-between precisions by bit replication.

use std::path::Path;

use crate::bitdepth::SampleWidth;
use crate::error::{ConvertError, ConvertResult};
use crate::image::{ColorSpace, ComponentParams, Image};
use crate::interleave::{interleaved_to_planar, planar_to_interleaved};
use crate::lut::{apply_lut8_rgb, Lut};

fn decode_err(e: png::DecodingError) -> ConvertError {
    ConvertError::Decode(e.to_string())
}

fn encode_err(e: png::EncodingError) -> ConvertError {
    ConvertError::Encode(e.to_string())
}

fn component_params(w: u32, h: u32, prec: u32) -> ComponentParams {
    ComponentParams {
        dx: 1,
        dy: 1,
        w,
        h,
        x0: 0,
        y0: 0,
        prec,
        sgnd: false,
    }
}

pub fn decode(src: &[u8]) -> ConvertResult<Image> {
    let mut decoder = png::Decoder::new(std::io::Cursor::new(src));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().map_err(decode_err)?;
    let size = reader
        .output_buffer_size()
        .ok_or_else(|| ConvertError::Decode("PNG output size overflows usize".into()))?;
    let mut buf = vec![0u8; size];
    let frame = reader.next_frame(&mut buf).map_err(decode_err)?;

    let (width, height) = (frame.width, frame.height);
    let bits = frame.bit_depth as u32;
    let line = frame.line_size;
    let (w, h) = (width as usize, height as usize);
    let data = &buf[..frame.buffer_size()];

    match frame.color_type {
        png::ColorType::Indexed => {
            let info = reader.info();
            let palette = info
                .palette
                .as_ref()
                .ok_or_else(|| ConvertError::InvalidHeader("indexed PNG without PLTE".into()))?;

            let mut luts: [Lut; 3] = [[0u8; 256]; 3];
            for (i, rgb) in palette.chunks_exact(3).take(256).enumerate() {
                luts[0][i] = rgb[0];
                luts[1][i] = rgb[1];
                luts[2][i] = rgb[2];
            }

            let sw = SampleWidth::try_from(bits)
                .map_err(|_| ConvertError::UnsupportedBitDepth(bits))?;
            let mut indices = vec![0u8; w * h];
            let mut row = vec![0i32; w];
            for y in 0..h {
                sw.unpack(&data[y * line..], &mut row);
                for (d, s) in indices[y * w..(y + 1) * w].iter_mut().zip(&row) {
                    *d = *s as u8;
                }
            }

            let mut image =
                Image::new(0, 0, &[component_params(width, height, 8); 3], ColorSpace::Srgb)?;
            let (first, rest) = image.comps.split_at_mut(1);
            let (second, third) = rest.split_at_mut(1);
            apply_lut8_rgb(
                &indices,
                0,
                w as isize,
                &luts,
                &mut first[0].data,
                &mut second[0].data,
                &mut third[0].data,
                width,
                height,
            );
            Ok(image)
        }
        color_type => {
            let numcomps = match color_type {
                png::ColorType::Grayscale => 1,
                png::ColorType::GrayscaleAlpha => 2,
                png::ColorType::Rgb => 3,
                png::ColorType::Rgba => 4,
                png::ColorType::Indexed => unreachable!(),
            };
            let color_space = if numcomps <= 2 { ColorSpace::Gray } else { ColorSpace::Srgb };
            let mut image = Image::new(
                0,
                0,
                &vec![component_params(width, height, bits); numcomps],
                color_space,
            )?;

            let mut inter = vec![0i32; w * numcomps];
            for y in 0..h {
                let src_row = &data[y * line..y * line + line];
                match bits {
                    1 | 2 | 4 => {
                        // Sub-byte depths only occur with a single channel.
                        let sw = SampleWidth::try_from(bits)
                            .map_err(|_| ConvertError::UnsupportedBitDepth(bits))?;
                        sw.unpack(src_row, &mut inter);
                    }
                    8 => {
                        for (d, s) in inter.iter_mut().zip(src_row) {
                            *d = *s as i32;
                        }
                    }
                    16 => {
                        for (d, p) in inter.iter_mut().zip(src_row.chunks_exact(2)) {
                            *d = u16::from_be_bytes([p[0], p[1]]) as i32;
                        }
                    }
                    other => return Err(ConvertError::UnsupportedBitDepth(other)),
                }
                let mut planes: Vec<&mut [i32]> = image
                    .comps
                    .iter_mut()
                    .map(|c| &mut c.data[y * w..(y + 1) * w])
                    .collect();
                interleaved_to_planar(&inter, &mut planes);
            }
            Ok(image)
        }
    }
}

/// Output depth and bit-replication shifts for a component precision.
///
/// Precisions with no native PNG depth are promoted to the next one up,
/// widening samples as `(v << ushift) + (v >> dshift)`.
fn promotion(prec: u32, gray: bool) -> ConvertResult<(u32, u32, u32)> {
    let native: &[u32] = if gray { &[1, 2, 4, 8, 16] } else { &[8, 16] };
    if native.contains(&prec) {
        return Ok((prec, 0, 0));
    }
    if prec == 0 || prec > 16 {
        return Err(ConvertError::UnsupportedBitDepth(prec));
    }
    let target = if prec < 8 { 8 } else { 16 };
    let ushift = target - prec;
    Ok((target, ushift, prec.saturating_sub(ushift)))
}

pub fn encode(image: &Image) -> ConvertResult<Vec<u8>> {
    let c0 = &image.comps[0];
    if image.comps.iter().any(|c| {
        c.w != c0.w || c.h != c0.h || c.precision() != c0.precision() || c.sgnd != c0.sgnd
    }) {
        return Err(ConvertError::BadLayout(
            "PNG requires components with identical size and precision".into(),
        ));
    }
    let numcomps = image.comps.len();
    let color_type = match numcomps {
        1 => png::ColorType::Grayscale,
        2 => png::ColorType::GrayscaleAlpha,
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => return Err(ConvertError::UnsupportedComponentCount(n as u32)),
    };

    let prec = c0.precision();
    let (depth_bits, ushift, dshift) = promotion(prec, numcomps == 1)?;
    let depth = png::BitDepth::from_u8(depth_bits as u8)
        .ok_or(ConvertError::UnsupportedBitDepth(depth_bits))?;
    let adjust = if c0.sgnd { 1i32 << (prec - 1) } else { 0 };
    let max = ((1u32 << prec) - 1) as i32;

    let (w, h) = (c0.w as usize, c0.h as usize);
    let sw = SampleWidth::try_from(depth_bits)
        .map_err(|_| ConvertError::UnsupportedBitDepth(depth_bits))?;
    let row_bytes = sw.packed_len(w * numcomps);

    let mut inter = vec![0i32; w * numcomps];
    let mut pixels = vec![0u8; row_bytes * h];
    for y in 0..h {
        let planes: Vec<&[i32]> = image
            .comps
            .iter()
            .map(|c| &c.data[y * w..(y + 1) * w])
            .collect();
        planar_to_interleaved(&planes, &mut inter, adjust);
        for v in inter.iter_mut() {
            let c = (*v).clamp(0, max);
            *v = if ushift > 0 { (c << ushift) + (c >> dshift) } else { c };
        }
        sw.pack(&inter, &mut pixels[y * row_bytes..(y + 1) * row_bytes]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, c0.w, c0.h);
        encoder.set_color(color_type);
        encoder.set_depth(depth);
        let mut writer = encoder.write_header().map_err(encode_err)?;
        writer.write_image_data(&pixels).map_err(encode_err)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(numcomps: usize, prec: u32, sgnd: bool, w: u32, h: u32) -> Image {
        let mut p = component_params(w, h, prec);
        p.sgnd = sgnd;
        let cs = if numcomps <= 2 { ColorSpace::Gray } else { ColorSpace::Srgb };
        Image::new(0, 0, &vec![p; numcomps], cs).unwrap()
    }

    #[test]
    fn rgb8_round_trip() {
        let mut img = make_image(3, 8, false, 3, 2);
        for (i, c) in img.comps.iter_mut().enumerate() {
            for (j, v) in c.data.iter_mut().enumerate() {
                *v = (i * 40 + j * 7) as i32;
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
        img.comps[0].data.copy_from_slice(&[0, 1, 0x1234, 65535]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].precision(), 16);
        assert_eq!(back.comps[0].data, [0, 1, 0x1234, 65535]);
    }

    #[test]
    fn gray1_keeps_native_depth() {
        let mut img = make_image(1, 1, false, 10, 1);
        for (i, v) in img.comps[0].data.iter_mut().enumerate() {
            *v = (i % 2) as i32;
        }
        let expected = img.comps[0].data.clone();
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].precision(), 1);
        assert_eq!(back.comps[0].data, expected);
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
    fn twelve_bit_promotes_to_sixteen() {
        let mut img = make_image(1, 12, false, 2, 1);
        img.comps[0].data.copy_from_slice(&[0, 0xFFF]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps[0].precision(), 16);
        // Full scale stays full scale under bit replication.
        assert_eq!(back.comps[0].data, [0, 0xFFFF]);
    }

    #[test]
    fn grayscale_alpha_round_trip() {
        let mut img = make_image(2, 8, false, 2, 2);
        img.comps[0].data.copy_from_slice(&[10, 20, 30, 40]);
        img.comps[1].data.copy_from_slice(&[255, 128, 64, 0]);
        let back = decode(&encode(&img).unwrap()).unwrap();
        assert_eq!(back.comps.len(), 2);
        assert_eq!(back.color_space, ColorSpace::Gray);
        assert_eq!(back.comps[1].data, [255, 128, 64, 0]);
    }

    #[test]
    fn indexed_png_expands_through_palette() {
        // Encoded with the crate directly since our writer never emits
        // indexed files.
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 2);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(vec![10, 11, 12, 20, 21, 22, 30, 31, 32]);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 1, 2, 1]).unwrap();
        }
        let img = decode(&bytes).unwrap();
        assert_eq!(img.comps.len(), 3);
        assert_eq!(img.comps[0].data, [10, 20, 30, 20]);
        assert_eq!(img.comps[1].data, [11, 21, 31, 21]);
        assert_eq!(img.comps[2].data, [12, 22, 32, 22]);
    }

    #[test]
    fn encode_rejects_wide_precision() {
        let img = make_image(1, 17, false, 1, 1);
        assert!(matches!(
            encode(&img),
            Err(ConvertError::UnsupportedBitDepth(17))
        ));
    }
}
