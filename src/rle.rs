//! BMP run-length decompression (RLE8 and RLE4).
//!
//! Both decoders consume the compressed stream with a small state machine:
//! a nonzero count byte starts an encoded run, a zero count byte escapes to
//! end-of-line, end-of-picture, delta or absolute mode. Compressed rows are
//! stored bottom-up; output is a top-down `width * height` index raster.
//! Running out of input is treated the same as end-of-picture, and every
//! pixel write is bounded, so malformed streams can only truncate output.

struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next(&mut self) -> Option<u8> {
        let b = self.buf.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }
}

#[inline]
fn put(pixels: &mut [u8], w: usize, h: usize, x: usize, y: usize, v: u8) {
    if x < w && y < h {
        pixels[(h - 1 - y) * w + x] = v;
    }
}

/// Decodes an RLE8-compressed BMP pixel stream into 8-bit palette indices.
pub fn decode_rle8(src: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut pixels = vec![0u8; w * h];
    let mut cur = ByteCursor::new(src);
    let (mut x, mut y) = (0usize, 0usize);

    'decode: while y < h {
        let Some(c) = cur.next() else { break };
        if c != 0 {
            // Encoded run: c copies of the next byte.
            let Some(c1) = cur.next() else { break };
            for _ in 0..c {
                if x >= w {
                    break;
                }
                put(&mut pixels, w, h, x, y, c1);
                x += 1;
            }
        } else {
            let Some(mode) = cur.next() else { break };
            match mode {
                0x00 => {
                    // End of line.
                    x = 0;
                    y += 1;
                }
                0x01 => break,
                0x02 => {
                    // Delta: unsigned offsets from the current position.
                    let Some(dx) = cur.next() else { break };
                    let Some(dy) = cur.next() else { break };
                    x += dx as usize;
                    y += dy as usize;
                }
                count => {
                    // Absolute: `count` literal bytes, padded to 16 bits.
                    for _ in 0..count {
                        if x >= w {
                            break;
                        }
                        let Some(c1) = cur.next() else { break 'decode };
                        put(&mut pixels, w, h, x, y, c1);
                        x += 1;
                    }
                    if count & 1 != 0 {
                        cur.next();
                    }
                }
            }
        }
    }
    pixels
}

/// Decodes an RLE4-compressed BMP pixel stream into 4-bit palette indices,
/// one index per output byte.
pub fn decode_rle4(src: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut pixels = vec![0u8; w * h];
    let mut cur = ByteCursor::new(src);
    let (mut x, mut y) = (0usize, 0usize);

    'decode: while y < h {
        let Some(c) = cur.next() else { break };
        if c != 0 {
            // Encoded run: the two nibbles of the next byte alternate.
            let Some(c1) = cur.next() else { break };
            for i in 0..c {
                if x >= w {
                    break;
                }
                let v = if i & 1 != 0 { c1 & 0x0F } else { c1 >> 4 };
                put(&mut pixels, w, h, x, y, v);
                x += 1;
            }
        } else {
            let Some(mode) = cur.next() else { break };
            match mode {
                0x00 => {
                    x = 0;
                    y += 1;
                }
                0x01 => break,
                0x02 => {
                    let Some(dx) = cur.next() else { break };
                    let Some(dy) = cur.next() else { break };
                    x += dx as usize;
                    y += dy as usize;
                }
                count => {
                    // Absolute: `count` literal nibbles, high nibble first,
                    // padded to 16 bits.
                    let mut c1 = 0u8;
                    for i in 0..count {
                        if x >= w {
                            break;
                        }
                        if i & 1 == 0 {
                            let Some(b) = cur.next() else { break 'decode };
                            c1 = b;
                        }
                        let v = if i & 1 != 0 { c1 & 0x0F } else { c1 >> 4 };
                        put(&mut pixels, w, h, x, y, v);
                        x += 1;
                    }
                    // Nibble counts 1 and 2 mod 4 leave the stream one byte
                    // short of 16-bit alignment.
                    if matches!(count & 3, 1 | 2) {
                        cur.next();
                    }
                }
            }
        }
    }
    pixels
}
