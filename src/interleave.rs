//! Conversion between interleaved pixel order and planar component order.
//!
//! Interleaved buffers hold `width * n` samples per row as
//! `c0 c1 .. cN-1 c0 c1 ..`; planar buffers hold one slice per component.
//! Both directions work on a single span (typically one row), with the
//! component count taken from the number of planes, 1 to 4.

/// Splits an interleaved sample run into per-component planes.
///
/// `src` must hold `planes.len()` samples per pixel; every plane receives
/// `src.len() / planes.len()` samples.
pub fn interleaved_to_planar(src: &[i32], planes: &mut [&mut [i32]]) {
    let n = planes.len();
    debug_assert!((1..=4).contains(&n));
    if n == 1 {
        planes[0][..src.len()].copy_from_slice(src);
        return;
    }
    for (i, px) in src.chunks_exact(n).enumerate() {
        for (c, plane) in planes.iter_mut().enumerate() {
            plane[i] = px[c];
        }
    }
}

/// Merges per-component planes into an interleaved run, adding `adjust`
/// to every sample.
///
/// `adjust` re-biases signed data for unsigned containers; no clamping is
/// applied here. Applied uniformly, including the single-plane case.
pub fn planar_to_interleaved(planes: &[&[i32]], dst: &mut [i32], adjust: i32) {
    let n = planes.len();
    debug_assert!((1..=4).contains(&n));
    let count = planes[0].len();
    for (c, plane) in planes.iter().enumerate() {
        for (i, s) in plane[..count].iter().enumerate() {
            dst[i * n + c] = *s + adjust;
        }
    }
}
