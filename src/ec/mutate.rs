//! Scalar Shard Mutation
//!
//! In-place multiplication of a leading byte region by the field element 2,
//! and the division that undoes it.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gf::FieldWidth;

/// Multiply the first `nbytes` of `buf` by 2 in GF(2^`w_bits`).
///
/// An unsupported width is logged and reported; the buffer is not touched.
pub fn multiply_by_two(buf: &mut [u8], nbytes: usize, w_bits: u32) -> Result<()> {
    ScalarMutator::from_bits(w_bits)?.double(buf, nbytes)
}

/// Divide the first `nbytes` of `buf` by 2 in GF(2^`w_bits`).
pub fn divide_by_two(buf: &mut [u8], nbytes: usize, w_bits: u32) -> Result<()> {
    ScalarMutator::from_bits(w_bits)?.halve(buf, nbytes)
}

/// Scales a leading region of a stripe by a fixed field constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarMutator {
    width: FieldWidth,
}

impl ScalarMutator {
    pub fn new(width: FieldWidth) -> Self {
        Self { width }
    }

    /// Mutator for a raw bit width, rejecting anything but 8, 16 and 32.
    pub fn from_bits(w_bits: u32) -> Result<Self> {
        match FieldWidth::try_from(w_bits) {
            Ok(width) => Ok(Self::new(width)),
            Err(e) => {
                warn!(w = w_bits, "scalar mutation skipped: {}", e);
                Err(e)
            }
        }
    }

    pub fn width(&self) -> FieldWidth {
        self.width
    }

    /// Region `buf[..nbytes]` after alignment and bounds checks.
    fn region<'b>(&self, buf: &'b mut [u8], nbytes: usize) -> Result<&'b mut [u8]> {
        if nbytes > buf.len() {
            return Err(Error::SpanOutOfRange {
                span: nbytes,
                stripe_size: buf.len(),
            });
        }
        self.width.check_aligned(nbytes)?;
        Ok(&mut buf[..nbytes])
    }

    /// Scale every word of `buf[..nbytes]` by `c`.
    pub fn scale(&self, buf: &mut [u8], nbytes: usize, c: u32) -> Result<()> {
        let region = self.region(buf, nbytes)?;
        self.width.field().scale_region(region, c)?;
        debug!(w = self.width.bits(), nbytes, c, "scaled region");
        Ok(())
    }

    /// Multiply `buf[..nbytes]` by 2.
    pub fn double(&self, buf: &mut [u8], nbytes: usize) -> Result<()> {
        self.scale(buf, nbytes, 2)
    }

    /// Multiply `buf[..nbytes]` by the inverse of 2.
    pub fn halve(&self, buf: &mut [u8], nbytes: usize) -> Result<()> {
        let half = self.width.field().inv(2)?;
        self.scale(buf, nbytes, half)
    }
}
