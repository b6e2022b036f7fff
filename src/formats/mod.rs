//! Format adapters: each submodule decodes one container into an
//! [`Image`](crate::Image) and encodes one back out.
//!
//! - `bmp` — Windows bitmaps, including RLE8/RLE4 and palettes
//! - `pgx` — the JPEG 2000 conformance raw format, one component per file
//! - `pnm` — portable anymap, P1 through P7
//! - `raw` — headerless planar samples described by caller parameters
//! - `tga` — uncompressed Targa truecolor
//! - `png` / `tiff` — delegated to the `png` and `tiff` crates (features)

pub mod bmp;
pub mod pgx;
pub mod pnm;
pub mod raw;
pub mod tga;

#[cfg(feature = "png")]
pub mod png;
#[cfg(feature = "tiff")]
pub mod tiff;

use crate::error::{ConvertError, ConvertResult};

/// Cursor over an in-memory file, shared by the hand-rolled header parsers.
pub(crate) struct ByteReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.source[self.position..]
    }

    fn truncated(&self, need: usize) -> ConvertError {
        ConvertError::Truncated(format!(
            "need {need} bytes at offset {}, have {}",
            self.position,
            self.source.len() - self.position
        ))
    }

    pub(crate) fn read_u8(&mut self) -> ConvertResult<u8> {
        let b = self
            .source
            .get(self.position)
            .copied()
            .ok_or_else(|| self.truncated(1))?;
        self.position += 1;
        Ok(b)
    }

    pub(crate) fn read_u16_le(&mut self) -> ConvertResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32_le(&mut self) -> ConvertResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> ConvertResult<&'a [u8]> {
        if self.source.len() - self.position < len {
            return Err(self.truncated(len));
        }
        let slice = &self.source[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub(crate) fn advance(&mut self, len: usize) -> ConvertResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub(crate) fn seek(&mut self, position: usize) -> ConvertResult<()> {
        if position > self.source.len() {
            return Err(ConvertError::Truncated(format!(
                "seek to {position} past end of {}-byte file",
                self.source.len()
            )));
        }
        self.position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reads_little_endian() {
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(r.read_u16_le().unwrap(), 0x0201);
        assert_eq!(r.read_u32_le().unwrap(), 0x06050403);
        assert_eq!(r.position(), 6);
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn reader_rejects_short_reads() {
        let mut r = ByteReader::new(&[0xAA]);
        assert!(matches!(
            r.read_u32_le(),
            Err(ConvertError::Truncated(_))
        ));
        // A failed read leaves the cursor in place.
        assert_eq!(r.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn reader_seek_bounds() {
        let mut r = ByteReader::new(&[0, 1, 2]);
        assert!(r.seek(3).is_ok());
        assert!(r.remaining().is_empty());
        assert!(r.seek(4).is_err());
    }
}
