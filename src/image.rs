//! Canonical in-memory raster representation.
//!
//! Every format adapter decodes into an [`Image`] and encodes from one.
//! Samples are stored as `i32` regardless of the declared precision, one
//! row-major plane per component.

use crate::error::{ConvertError, ConvertResult};

/// Color interpretation of an image's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Not specified by the source format.
    #[default]
    Unknown,
    /// Single luminance component (plus optional alpha).
    Gray,
    /// Standard RGB (plus optional alpha).
    Srgb,
    /// Luminance/chrominance.
    Ycc,
}

/// Parameters for building one [`Component`].
#[derive(Debug, Clone, Copy)]
pub struct ComponentParams {
    /// Horizontal subsampling factor relative to the reference grid.
    pub dx: u32,
    /// Vertical subsampling factor relative to the reference grid.
    pub dy: u32,
    /// Width in samples.
    pub w: u32,
    /// Height in samples.
    pub h: u32,
    /// Horizontal offset on the reference grid.
    pub x0: u32,
    /// Vertical offset on the reference grid.
    pub y0: u32,
    /// Declared precision in bits, 1..=32.
    pub prec: u32,
    /// Whether samples are two's-complement signed.
    pub sgnd: bool,
}

/// One image plane: `w * h` samples in row-major order.
///
/// The declared precision can only change through
/// [`Component::clip_precision`] and [`Component::scale_precision`], which
/// keep the sample data consistent with it.
#[derive(Debug, Clone)]
pub struct Component {
    pub dx: u32,
    pub dy: u32,
    pub w: u32,
    pub h: u32,
    pub x0: u32,
    pub y0: u32,
    prec: u32,
    pub sgnd: bool,
    /// Sample plane, `w * h` entries. Zero-initialized at construction so
    /// decoders that fill sparsely (RLE) leave zeros elsewhere.
    pub data: Vec<i32>,
}

impl Component {
    /// Allocates a zero-filled component.
    pub fn new(params: &ComponentParams) -> ConvertResult<Self> {
        if params.w == 0 || params.h == 0 {
            return Err(ConvertError::InvalidDimensions {
                width: params.w,
                height: params.h,
            });
        }
        if params.prec == 0 || params.prec > 32 {
            return Err(ConvertError::UnsupportedBitDepth(params.prec));
        }
        let len = (params.w as usize)
            .checked_mul(params.h as usize)
            .ok_or(ConvertError::InvalidDimensions {
                width: params.w,
                height: params.h,
            })?;
        Ok(Self {
            dx: params.dx,
            dy: params.dy,
            w: params.w,
            h: params.h,
            x0: params.x0,
            y0: params.y0,
            prec: params.prec,
            sgnd: params.sgnd,
            data: vec![0; len],
        })
    }

    /// Declared precision in bits.
    pub fn precision(&self) -> u32 {
        self.prec
    }

    pub(crate) fn set_precision(&mut self, prec: u32) {
        self.prec = prec;
    }
}

/// A decoded image: 1 to 4 components on a shared reference grid.
#[derive(Debug, Clone)]
pub struct Image {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub color_space: ColorSpace,
    pub comps: Vec<Component>,
}

impl Image {
    /// Builds an image from component parameters, allocating every plane.
    ///
    /// The reference grid extent is derived from the first component's
    /// subsampled size, matching the convention of single-tile codestreams.
    pub fn new(
        x0: u32,
        y0: u32,
        params: &[ComponentParams],
        color_space: ColorSpace,
    ) -> ConvertResult<Self> {
        if params.is_empty() || params.len() > 4 {
            return Err(ConvertError::UnsupportedComponentCount(params.len() as u32));
        }
        let comps = params
            .iter()
            .map(Component::new)
            .collect::<ConvertResult<Vec<_>>>()?;
        let c0 = &comps[0];
        let x1 = x0 + (c0.w - 1) * c0.dx + 1;
        let y1 = y0 + (c0.h - 1) * c0.dy + 1;
        Ok(Self {
            x0,
            y0,
            x1,
            y1,
            color_space,
            comps,
        })
    }

    /// Width of the reference grid area.
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height of the reference grid area.
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(w: u32, h: u32, prec: u32) -> ComponentParams {
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

    #[test]
    fn component_allocates_zeroed_plane() {
        let c = Component::new(&params(3, 2, 8)).unwrap();
        assert_eq!(c.data.len(), 6);
        assert!(c.data.iter().all(|&v| v == 0));
        assert_eq!(c.precision(), 8);
    }

    #[test]
    fn component_rejects_bad_precision() {
        assert!(Component::new(&params(1, 1, 0)).is_err());
        assert!(Component::new(&params(1, 1, 33)).is_err());
    }

    #[test]
    fn component_rejects_zero_dimensions() {
        assert!(Component::new(&params(0, 5, 8)).is_err());
        assert!(Component::new(&params(5, 0, 8)).is_err());
    }

    #[test]
    fn image_grid_extent_follows_subsampling() {
        let p = ComponentParams {
            dx: 2,
            dy: 2,
            w: 4,
            h: 3,
            x0: 0,
            y0: 0,
            prec: 8,
            sgnd: false,
        };
        let img = Image::new(0, 0, &[p], ColorSpace::Gray).unwrap();
        assert_eq!(img.x1, 7);
        assert_eq!(img.y1, 5);
    }

    #[test]
    fn image_rejects_too_many_components() {
        let p = params(2, 2, 8);
        assert!(Image::new(0, 0, &[p; 5], ColorSpace::Unknown).is_err());
        assert!(Image::new(0, 0, &[], ColorSpace::Unknown).is_err());
    }
}
