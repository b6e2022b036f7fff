//! Cross-format pipelines: decode with one adapter, re-encode with
//! another, and check that the planar samples survive unchanged.

use rasterconv::formats::{bmp, pgx, pnm, raw, tga};
use rasterconv::interleave::{interleaved_to_planar, planar_to_interleaved};
use rasterconv::{ColorSpace, ComponentParams, Image, SampleWidth};

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
    let cs = if numcomps < 3 { ColorSpace::Gray } else { ColorSpace::Srgb };
    Image::new(0, 0, &vec![params; numcomps], cs).expect("valid layout")
}

fn fill_gradient(image: &mut Image) {
    for (c, comp) in image.comps.iter_mut().enumerate() {
        for (i, v) in comp.data.iter_mut().enumerate() {
            *v = ((c * 37 + i * 11) % 251) as i32;
        }
    }
}

#[test]
fn bmp_rgb_survives_tga_rewrite() {
    let mut img = make_image(3, 8, false, 5, 3);
    fill_gradient(&mut img);

    let via_bmp = bmp::decode(&bmp::encode(&img).expect("bmp encode")).expect("bmp decode");
    let via_tga =
        tga::decode(&tga::encode(&via_bmp).expect("tga encode")).expect("tga decode");

    assert_eq!(via_tga.comps.len(), 3);
    for (a, b) in img.comps.iter().zip(&via_tga.comps) {
        assert_eq!(a.data, b.data);
    }
}

#[test]
fn gray_bmp_comes_back_as_one_component() {
    let mut img = make_image(1, 8, false, 4, 4);
    fill_gradient(&mut img);

    let back = bmp::decode(&bmp::encode(&img).expect("bmp encode")).expect("bmp decode");
    assert_eq!(back.comps.len(), 1);
    assert_eq!(back.comps[0].data, img.comps[0].data);
}

#[test]
fn signed_pgx_rebias_through_pnm() {
    let mut data = b"PG ML - 8 3 1\n".to_vec();
    data.extend_from_slice(&[0x80, 0x00, 0x7F]); // -128, 0, 127
    let img = pgx::decode(&data).expect("pgx decode");
    assert_eq!(img.comps[0].data, [-128, 0, 127]);

    let pgm = pnm::encode_component_p5(&img, 0).expect("pnm encode");
    let back = pnm::decode(&pgm).expect("pnm decode");
    assert!(!back.comps[0].sgnd);
    assert_eq!(back.comps[0].data, [0, 128, 255]);
}

#[test]
fn twelve_bit_raw_survives_pnm() {
    let params = raw::RawParams {
        width: 2,
        height: 2,
        precision: 12,
        sgnd: false,
        comps: vec![raw::RawSubsampling { dx: 1, dy: 1 }],
    };
    let bytes = [0x0F, 0xFF, 0x00, 0x01, 0x0A, 0xBC, 0x00, 0x00];
    let img = raw::decode(&bytes, &params, raw::ByteOrder::BigEndian).expect("raw decode");

    let pnm_bytes = pnm::encode(&img).expect("pnm encode");
    let back = pnm::decode(&pnm_bytes).expect("pnm decode");
    assert_eq!(back.comps[0].precision(), 12);
    assert_eq!(back.comps[0].data, img.comps[0].data);
}

#[test]
fn rescaled_component_fits_byte_formats() {
    let mut img = make_image(3, 12, false, 2, 2);
    for comp in img.comps.iter_mut() {
        comp.data.copy_from_slice(&[0, 0x123, 0xABC, 0xFFF]);
    }
    for comp in img.comps.iter_mut() {
        comp.scale_precision(8);
    }
    assert_eq!(img.comps[0].data, [0, 0x12, 0xAB, 0xFF]);

    let back = tga::decode(&tga::encode(&img).expect("tga encode")).expect("tga decode");
    assert_eq!(back.comps[0].data, [0, 0x12, 0xAB, 0xFF]);
}

#[test]
fn pnm_alpha_survives_tga() {
    let mut img = make_image(4, 8, false, 2, 2);
    fill_gradient(&mut img);

    let p7 = pnm::encode(&img).expect("pnm encode");
    assert!(p7.starts_with(b"P7"));
    let decoded = pnm::decode(&p7).expect("pnm decode");
    let back = tga::decode(&tga::encode(&decoded).expect("tga encode")).expect("tga decode");

    assert_eq!(back.comps.len(), 4);
    for (a, b) in img.comps.iter().zip(&back.comps) {
        assert_eq!(a.data, b.data);
    }
}

#[test]
fn packed_planes_round_trip_through_interleave() {
    // Interleaved 4-bit RGB: split to planes, pack each plane, unpack and
    // merge back.
    let src: Vec<i32> = (0..3 * 8).map(|i| i % 16).collect();
    let mut planes_data = vec![vec![0i32; 8]; 3];
    {
        let mut planes: Vec<&mut [i32]> =
            planes_data.iter_mut().map(|p| p.as_mut_slice()).collect();
        interleaved_to_planar(&src, &mut planes);
    }

    let w = SampleWidth::W4;
    let mut unpacked = vec![vec![0i32; 8]; 3];
    for (plane, out) in planes_data.iter().zip(unpacked.iter_mut()) {
        let mut packed = vec![0u8; w.packed_len(plane.len())];
        w.pack(plane, &mut packed);
        w.unpack(&packed, out);
    }

    let refs: Vec<&[i32]> = unpacked.iter().map(|p| p.as_slice()).collect();
    let mut merged = vec![0i32; src.len()];
    planar_to_interleaved(&refs, &mut merged, 0);
    assert_eq!(merged, src);
}

#[cfg(feature = "png")]
#[test]
fn png_rgb_survives_bmp_rewrite() {
    use rasterconv::formats::png;

    let mut img = make_image(3, 8, false, 4, 3);
    fill_gradient(&mut img);

    let via_png = png::decode(&png::encode(&img).expect("png encode")).expect("png decode");
    let via_bmp =
        bmp::decode(&bmp::encode(&via_png).expect("bmp encode")).expect("bmp decode");
    for (a, b) in img.comps.iter().zip(&via_bmp.comps) {
        assert_eq!(a.data, b.data);
    }
}

#[cfg(all(feature = "png", feature = "tiff"))]
#[test]
fn sixteen_bit_gray_survives_png_and_tiff() {
    use rasterconv::formats::{png, tiff};

    let mut img = make_image(1, 16, false, 3, 2);
    img.comps[0]
        .data
        .copy_from_slice(&[0, 1, 256, 4095, 40000, 65535]);

    let via_png = png::decode(&png::encode(&img).expect("png encode")).expect("png decode");
    let via_tiff =
        tiff::decode(&tiff::encode(&via_png).expect("tiff encode")).expect("tiff decode");
    assert_eq!(via_tiff.comps[0].precision(), 16);
    assert_eq!(via_tiff.comps[0].data, img.comps[0].data);
}
