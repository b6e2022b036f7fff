//! Packing and unpacking of sub-byte and multi-byte sample streams.
//!
//! Samples travel MSB-first through the byte stream: the first sample of a
//! row occupies the most significant bits of the first byte. A partial final
//! group is unpacked by writing only the leading samples that exist, and
//! packed by zero-filling the missing trailing samples, emitting exactly
//! `ceil(n * width / 8)` bytes.
//!
//! 16-bit streams here are big-endian byte pairs (the PNG/PGX/PNM wire
//! convention). TIFF hands over host-order `u16` words and bypasses these
//! functions entirely.

use num_enum::TryFromPrimitive;

/// Supported packed sample widths in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum SampleWidth {
    W1 = 1,
    W2 = 2,
    W4 = 4,
    W6 = 6,
    W8 = 8,
    W10 = 10,
    W12 = 12,
    W14 = 14,
    W16 = 16,
}

impl SampleWidth {
    /// Width in bits.
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Number of bytes occupied by `samples` packed samples.
    pub fn packed_len(self, samples: usize) -> usize {
        (samples * self as usize + 7) / 8
    }

    /// Unpacks `dst.len()` samples from `src`.
    ///
    /// `src` must hold at least [`packed_len`](Self::packed_len) bytes for
    /// the requested sample count.
    pub fn unpack(self, src: &[u8], dst: &mut [i32]) {
        match self {
            SampleWidth::W1 => unpack_1u(src, dst),
            SampleWidth::W2 => unpack_2u(src, dst),
            SampleWidth::W4 => unpack_4u(src, dst),
            SampleWidth::W6 => unpack_6u(src, dst),
            SampleWidth::W8 => unpack_8u(src, dst),
            SampleWidth::W10 => unpack_10u(src, dst),
            SampleWidth::W12 => unpack_12u(src, dst),
            SampleWidth::W14 => unpack_14u(src, dst),
            SampleWidth::W16 => unpack_16u(src, dst),
        }
    }

    /// Packs `src.len()` samples into `dst`.
    ///
    /// `dst` must hold exactly [`packed_len`](Self::packed_len) bytes.
    /// Sample values must already fit the width; excess bits are truncated,
    /// never clamped.
    pub fn pack(self, src: &[i32], dst: &mut [u8]) {
        match self {
            SampleWidth::W1 => pack_1u(src, dst),
            SampleWidth::W2 => pack_2u(src, dst),
            SampleWidth::W4 => pack_4u(src, dst),
            SampleWidth::W6 => pack_6u(src, dst),
            SampleWidth::W8 => pack_8u(src, dst),
            SampleWidth::W10 => pack_10u(src, dst),
            SampleWidth::W12 => pack_12u(src, dst),
            SampleWidth::W14 => pack_14u(src, dst),
            SampleWidth::W16 => pack_16u(src, dst),
        }
    }
}

/// Narrows a sample to one byte by truncation.
///
/// Deliberately not a clamp: values wider than 8 bits wrap, matching the
/// byte-oriented writers that rely on the caller having rescaled first.
#[inline]
pub fn truncate_u8(v: i32) -> u8 {
    v as u8
}

fn unpack_1u(src: &[u8], dst: &mut [i32]) {
    for (i, d) in dst.iter_mut().enumerate() {
        *d = ((src[i / 8] >> (7 - (i % 8))) & 0x1) as i32;
    }
}

fn unpack_2u(src: &[u8], dst: &mut [i32]) {
    for (i, d) in dst.iter_mut().enumerate() {
        *d = ((src[i / 4] >> (6 - 2 * (i % 4))) & 0x3) as i32;
    }
}

fn unpack_4u(src: &[u8], dst: &mut [i32]) {
    for (i, d) in dst.iter_mut().enumerate() {
        *d = ((src[i / 2] >> (4 - 4 * (i % 2))) & 0xF) as i32;
    }
}

fn unpack_6u(src: &[u8], dst: &mut [i32]) {
    let mut si = 0;
    let mut groups = dst.chunks_exact_mut(4);
    for out in &mut groups {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        let v2 = src[si + 2] as i32;
        si += 3;
        out[0] = v0 >> 2;
        out[1] = ((v0 & 0x3) << 4) | (v1 >> 4);
        out[2] = ((v1 & 0xF) << 2) | (v2 >> 6);
        out[3] = v2 & 0x3F;
    }
    let rest = groups.into_remainder();
    if !rest.is_empty() {
        let v0 = src[si] as i32;
        rest[0] = v0 >> 2;
        if rest.len() > 1 {
            let v1 = src[si + 1] as i32;
            rest[1] = ((v0 & 0x3) << 4) | (v1 >> 4);
            if rest.len() > 2 {
                let v2 = src[si + 2] as i32;
                rest[2] = ((v1 & 0xF) << 2) | (v2 >> 6);
            }
        }
    }
}

fn unpack_8u(src: &[u8], dst: &mut [i32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *s as i32;
    }
}

fn unpack_10u(src: &[u8], dst: &mut [i32]) {
    let mut si = 0;
    let mut groups = dst.chunks_exact_mut(4);
    for out in &mut groups {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        let v2 = src[si + 2] as i32;
        let v3 = src[si + 3] as i32;
        let v4 = src[si + 4] as i32;
        si += 5;
        out[0] = (v0 << 2) | (v1 >> 6);
        out[1] = ((v1 & 0x3F) << 4) | (v2 >> 4);
        out[2] = ((v2 & 0xF) << 6) | (v3 >> 2);
        out[3] = ((v3 & 0x3) << 8) | v4;
    }
    let rest = groups.into_remainder();
    if !rest.is_empty() {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        rest[0] = (v0 << 2) | (v1 >> 6);
        if rest.len() > 1 {
            let v2 = src[si + 2] as i32;
            rest[1] = ((v1 & 0x3F) << 4) | (v2 >> 4);
            if rest.len() > 2 {
                let v3 = src[si + 3] as i32;
                rest[2] = ((v2 & 0xF) << 6) | (v3 >> 2);
            }
        }
    }
}

fn unpack_12u(src: &[u8], dst: &mut [i32]) {
    let mut si = 0;
    let mut groups = dst.chunks_exact_mut(2);
    for out in &mut groups {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        let v2 = src[si + 2] as i32;
        si += 3;
        out[0] = (v0 << 4) | (v1 >> 4);
        out[1] = ((v1 & 0xF) << 8) | v2;
    }
    let rest = groups.into_remainder();
    if !rest.is_empty() {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        rest[0] = (v0 << 4) | (v1 >> 4);
    }
}

fn unpack_14u(src: &[u8], dst: &mut [i32]) {
    let mut si = 0;
    let mut groups = dst.chunks_exact_mut(4);
    for out in &mut groups {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        let v2 = src[si + 2] as i32;
        let v3 = src[si + 3] as i32;
        let v4 = src[si + 4] as i32;
        let v5 = src[si + 5] as i32;
        let v6 = src[si + 6] as i32;
        si += 7;
        out[0] = (v0 << 6) | (v1 >> 2);
        out[1] = ((v1 & 0x3) << 12) | (v2 << 4) | (v3 >> 4);
        out[2] = ((v3 & 0xF) << 10) | (v4 << 2) | (v5 >> 6);
        out[3] = ((v5 & 0x3F) << 8) | v6;
    }
    let rest = groups.into_remainder();
    if !rest.is_empty() {
        let v0 = src[si] as i32;
        let v1 = src[si + 1] as i32;
        rest[0] = (v0 << 6) | (v1 >> 2);
        if rest.len() > 1 {
            let v2 = src[si + 2] as i32;
            let v3 = src[si + 3] as i32;
            rest[1] = ((v1 & 0x3) << 12) | (v2 << 4) | (v3 >> 4);
            if rest.len() > 2 {
                let v4 = src[si + 4] as i32;
                let v5 = src[si + 5] as i32;
                rest[2] = ((v3 & 0xF) << 10) | (v4 << 2) | (v5 >> 6);
            }
        }
    }
}

fn unpack_16u(src: &[u8], dst: &mut [i32]) {
    for (i, d) in dst.iter_mut().enumerate() {
        *d = ((src[2 * i] as i32) << 8) | (src[2 * i + 1] as i32);
    }
}

fn pack_1u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(8);
    for g in &mut groups {
        dst[di] = (((g[0] as u32) << 7)
            | ((g[1] as u32 & 0x1) << 6)
            | ((g[2] as u32 & 0x1) << 5)
            | ((g[3] as u32 & 0x1) << 4)
            | ((g[4] as u32 & 0x1) << 3)
            | ((g[5] as u32 & 0x1) << 2)
            | ((g[6] as u32 & 0x1) << 1)
            | (g[7] as u32 & 0x1)) as u8;
        di += 1;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        let mut b = 0u32;
        for (k, s) in rest.iter().enumerate() {
            b |= (*s as u32 & 0x1) << (7 - k);
        }
        dst[di] = b as u8;
    }
}

fn pack_2u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(4);
    for g in &mut groups {
        dst[di] = (((g[0] as u32) << 6)
            | ((g[1] as u32 & 0x3) << 4)
            | ((g[2] as u32 & 0x3) << 2)
            | (g[3] as u32 & 0x3)) as u8;
        di += 1;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        let mut b = 0u32;
        for (k, s) in rest.iter().enumerate() {
            b |= (*s as u32 & 0x3) << (6 - 2 * k);
        }
        dst[di] = b as u8;
    }
}

fn pack_4u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(2);
    for g in &mut groups {
        dst[di] = (((g[0] as u32) << 4) | (g[1] as u32 & 0xF)) as u8;
        di += 1;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        dst[di] = ((rest[0] as u32) << 4) as u8;
    }
}

fn pack_6u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(4);
    for g in &mut groups {
        let (s0, s1, s2, s3) = (g[0] as u32, g[1] as u32, g[2] as u32, g[3] as u32);
        dst[di] = ((s0 << 2) | ((s1 >> 4) & 0x3)) as u8;
        dst[di + 1] = (((s1 & 0xF) << 4) | ((s2 >> 2) & 0xF)) as u8;
        dst[di + 2] = (((s2 & 0x3) << 6) | (s3 & 0x3F)) as u8;
        di += 3;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        let s0 = rest[0] as u32;
        let s1 = if rest.len() > 1 { rest[1] as u32 } else { 0 };
        let s2 = if rest.len() > 2 { rest[2] as u32 } else { 0 };
        dst[di] = ((s0 << 2) | ((s1 >> 4) & 0x3)) as u8;
        if rest.len() > 1 {
            dst[di + 1] = (((s1 & 0xF) << 4) | ((s2 >> 2) & 0xF)) as u8;
        }
        if rest.len() > 2 {
            dst[di + 2] = ((s2 & 0x3) << 6) as u8;
        }
    }
}

fn pack_8u(src: &[i32], dst: &mut [u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = truncate_u8(*s);
    }
}

fn pack_10u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(4);
    for g in &mut groups {
        let (s0, s1, s2, s3) = (g[0] as u32, g[1] as u32, g[2] as u32, g[3] as u32);
        dst[di] = (s0 >> 2) as u8;
        dst[di + 1] = (((s0 & 0x3) << 6) | ((s1 >> 4) & 0x3F)) as u8;
        dst[di + 2] = (((s1 & 0xF) << 4) | ((s2 >> 6) & 0xF)) as u8;
        dst[di + 3] = (((s2 & 0x3F) << 2) | ((s3 >> 8) & 0x3)) as u8;
        dst[di + 4] = s3 as u8;
        di += 5;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        let s0 = rest[0] as u32;
        let s1 = if rest.len() > 1 { rest[1] as u32 } else { 0 };
        let s2 = if rest.len() > 2 { rest[2] as u32 } else { 0 };
        dst[di] = (s0 >> 2) as u8;
        dst[di + 1] = (((s0 & 0x3) << 6) | ((s1 >> 4) & 0x3F)) as u8;
        if rest.len() > 1 {
            dst[di + 2] = (((s1 & 0xF) << 4) | ((s2 >> 6) & 0xF)) as u8;
        }
        if rest.len() > 2 {
            dst[di + 3] = ((s2 & 0x3F) << 2) as u8;
        }
    }
}

fn pack_12u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(2);
    for g in &mut groups {
        let (s0, s1) = (g[0] as u32, g[1] as u32);
        dst[di] = (s0 >> 4) as u8;
        dst[di + 1] = (((s0 & 0xF) << 4) | ((s1 >> 8) & 0xF)) as u8;
        dst[di + 2] = s1 as u8;
        di += 3;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        let s0 = rest[0] as u32;
        dst[di] = (s0 >> 4) as u8;
        dst[di + 1] = ((s0 & 0xF) << 4) as u8;
    }
}

fn pack_14u(src: &[i32], dst: &mut [u8]) {
    let mut di = 0;
    let mut groups = src.chunks_exact(4);
    for g in &mut groups {
        let (s0, s1, s2, s3) = (g[0] as u32, g[1] as u32, g[2] as u32, g[3] as u32);
        dst[di] = (s0 >> 6) as u8;
        dst[di + 1] = (((s0 & 0x3F) << 2) | ((s1 >> 12) & 0x3)) as u8;
        dst[di + 2] = (s1 >> 4) as u8;
        dst[di + 3] = (((s1 & 0xF) << 4) | ((s2 >> 10) & 0xF)) as u8;
        dst[di + 4] = (s2 >> 2) as u8;
        dst[di + 5] = (((s2 & 0x3) << 6) | ((s3 >> 8) & 0x3F)) as u8;
        dst[di + 6] = s3 as u8;
        di += 7;
    }
    let rest = groups.remainder();
    if !rest.is_empty() {
        let s0 = rest[0] as u32;
        let s1 = if rest.len() > 1 { rest[1] as u32 } else { 0 };
        let s2 = if rest.len() > 2 { rest[2] as u32 } else { 0 };
        dst[di] = (s0 >> 6) as u8;
        dst[di + 1] = (((s0 & 0x3F) << 2) | ((s1 >> 12) & 0x3)) as u8;
        if rest.len() > 1 {
            dst[di + 2] = (s1 >> 4) as u8;
            dst[di + 3] = (((s1 & 0xF) << 4) | ((s2 >> 10) & 0xF)) as u8;
        }
        if rest.len() > 2 {
            dst[di + 4] = (s2 >> 2) as u8;
            dst[di + 5] = ((s2 & 0x3) << 6) as u8;
        }
    }
}

fn pack_16u(src: &[i32], dst: &mut [u8]) {
    for (i, s) in src.iter().enumerate() {
        let v = *s as u32;
        dst[2 * i] = (v >> 8) as u8;
        dst[2 * i + 1] = v as u8;
    }
}
