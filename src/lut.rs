//! Palette lookup: expanding 8-bit index rasters through 256-entry tables.
//!
//! The source walks row by row with a signed stride so that bottom-up BMP
//! data can be consumed in place: pass the offset of the bottom row and a
//! negative stride. Destination planes always advance top-down by `width`.

/// One 256-entry palette channel.
pub type Lut = [u8; 256];

#[inline]
fn row_start(offset: usize, stride: isize, row: usize) -> usize {
    (offset as isize + row as isize * stride) as usize
}

/// Expands an index raster through a single LUT into one grayscale plane.
pub fn apply_lut8_gray(
    src: &[u8],
    src_offset: usize,
    src_stride: isize,
    lut: &Lut,
    dst: &mut [i32],
    width: u32,
    height: u32,
) {
    let w = width as usize;
    for row in 0..height as usize {
        let s = row_start(src_offset, src_stride, row);
        let d = row * w;
        for i in 0..w {
            dst[d + i] = lut[src[s + i] as usize] as i32;
        }
    }
}

/// Expands an index raster through three LUTs into separate R, G, B planes.
pub fn apply_lut8_rgb(
    src: &[u8],
    src_offset: usize,
    src_stride: isize,
    luts: &[Lut; 3],
    r: &mut [i32],
    g: &mut [i32],
    b: &mut [i32],
    width: u32,
    height: u32,
) {
    let w = width as usize;
    for row in 0..height as usize {
        let s = row_start(src_offset, src_stride, row);
        let d = row * w;
        for i in 0..w {
            let idx = src[s + i] as usize;
            r[d + i] = luts[0][idx] as i32;
            g[d + i] = luts[1][idx] as i32;
            b[d + i] = luts[2][idx] as i32;
        }
    }
}
