//! Component precision changes: clipping and scaling.
//!
//! Both operations rewrite the sample plane and the declared precision
//! together, which is why they are the only places allowed to touch it.

use crate::image::Component;

impl Component {
    /// Saturates every sample to the representable range of `precision`
    /// bits, then adopts that precision.
    ///
    /// Unsigned data is compared as `u32`, so a stray negative sample
    /// clamps to the maximum rather than to zero.
    pub fn clip_precision(&mut self, precision: u32) {
        debug_assert!(precision >= 1 && precision <= 32);
        let umax = if precision >= 32 {
            u32::MAX
        } else {
            (1u32 << precision) - 1
        };
        if self.sgnd {
            let max = (umax / 2) as i32;
            let min = -max - 1;
            for v in &mut self.data {
                *v = (*v).clamp(min, max);
            }
        } else {
            for v in &mut self.data {
                if *v as u32 > umax {
                    *v = umax as i32;
                }
            }
        }
        self.set_precision(precision);
    }

    /// Rescales samples from the current precision to `precision`.
    ///
    /// Widening multiplies by the ratio of the value ranges in 64-bit
    /// arithmetic; narrowing is a plain shift with no rounding.
    pub fn scale_precision(&mut self, precision: u32) {
        debug_assert!(precision >= 1 && precision <= 32);
        let old = self.precision();
        if old == precision {
            return;
        }
        if old < precision {
            if self.sgnd {
                let new_max = 1i64 << (precision - 1);
                let old_max = 1i64 << (old - 1);
                for v in &mut self.data {
                    *v = ((*v as i64 * new_max) / old_max) as i32;
                }
            } else {
                let new_max = (1u64 << precision) - 1;
                let old_max = (1u64 << old) - 1;
                for v in &mut self.data {
                    *v = ((*v as u32 as u64 * new_max) / old_max) as i32;
                }
            }
        } else {
            let shift = old - precision;
            if self.sgnd {
                for v in &mut self.data {
                    *v >>= shift;
                }
            } else {
                for v in &mut self.data {
                    *v = ((*v as u32) >> shift) as i32;
                }
            }
        }
        self.set_precision(precision);
    }
}
