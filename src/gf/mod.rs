//! Galois Field Arithmetic
//!
//! Field multiply, divide and bulk region operations over GF(2^w) for
//! w in {8, 16, 32}. Every other component reaches the arithmetic through
//! the [`GaloisField`] trait, obtained from a [`FieldWidth`].
//!
//! Regions are interpreted as consecutive little-endian w-bit words, so a
//! region's length must be a multiple of `w / 8` bytes.

pub mod tables;

use reed_solomon_erasure::galois_8;

use crate::error::{Error, Result};

// =============================================================================
// Field Width
// =============================================================================

/// Width of a field element in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldWidth {
    #[default]
    W8,
    W16,
    W32,
}

impl FieldWidth {
    /// Element size in bits.
    pub fn bits(self) -> u32 {
        match self {
            FieldWidth::W8 => 8,
            FieldWidth::W16 => 16,
            FieldWidth::W32 => 32,
        }
    }

    /// Element size in bytes (w / 8).
    pub fn word_bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Number of distinct elements, when it is small enough to bound k + m.
    ///
    /// GF(2^32) is treated as unbounded.
    pub fn max_shards(self) -> Option<u64> {
        match self {
            FieldWidth::W8 | FieldWidth::W16 => Some(1u64 << self.bits()),
            FieldWidth::W32 => None,
        }
    }

    /// Largest element value.
    pub fn max_element(self) -> u32 {
        match self {
            FieldWidth::W8 => 0xFF,
            FieldWidth::W16 => 0xFFFF,
            FieldWidth::W32 => 0xFFFF_FFFF,
        }
    }

    /// The arithmetic backend for this width.
    pub fn field(self) -> &'static dyn GaloisField {
        match self {
            FieldWidth::W8 => &Gf8,
            FieldWidth::W16 => &Gf16,
            FieldWidth::W32 => &Gf32,
        }
    }

    /// Reject a region that cannot be split into whole words.
    pub fn check_aligned(self, len: usize) -> Result<()> {
        let word = self.word_bytes();
        if len % word != 0 {
            return Err(Error::MisalignedRegion { len, word });
        }
        Ok(())
    }

    fn read_word(self, bytes: &[u8]) -> u32 {
        match self {
            FieldWidth::W8 => bytes[0] as u32,
            FieldWidth::W16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            FieldWidth::W32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    fn write_word(self, bytes: &mut [u8], value: u32) {
        match self {
            FieldWidth::W8 => bytes[0] = value as u8,
            FieldWidth::W16 => bytes.copy_from_slice(&(value as u16).to_le_bytes()),
            FieldWidth::W32 => bytes.copy_from_slice(&value.to_le_bytes()),
        }
    }
}

impl TryFrom<u32> for FieldWidth {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(FieldWidth::W8),
            16 => Ok(FieldWidth::W16),
            32 => Ok(FieldWidth::W32),
            other => Err(Error::UnsupportedFieldWidth(other)),
        }
    }
}

impl std::fmt::Display for FieldWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GF(2^{})", self.bits())
    }
}

// =============================================================================
// Arithmetic Provider
// =============================================================================

/// Arithmetic over one GF(2^w).
///
/// Elements are carried as `u32` regardless of width; values above
/// [`FieldWidth::max_element`] are never produced.
pub trait GaloisField: Send + Sync + std::fmt::Debug {
    /// The width this backend implements.
    fn width(&self) -> FieldWidth;

    /// Field product.
    fn mul(&self, a: u32, b: u32) -> u32;

    /// Multiplicative inverse.
    fn inv(&self, a: u32) -> Result<u32>;

    /// Field addition (XOR).
    fn add(&self, a: u32, b: u32) -> u32 {
        a ^ b
    }

    /// Field quotient `a / b`.
    fn div(&self, a: u32, b: u32) -> Result<u32> {
        if a == 0 {
            // still reject a zero divisor
            self.inv(b)?;
            return Ok(0);
        }
        Ok(self.mul(a, self.inv(b)?))
    }

    /// `a` raised to the `n`th power.
    fn pow(&self, a: u32, n: u64) -> u32 {
        let mut result = 1u32;
        let mut base = a;
        let mut n = n;
        while n != 0 {
            if n & 1 != 0 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            n >>= 1;
        }
        result
    }

    /// `dst = c * src` word by word, or `dst ^= c * src` when `accumulate`.
    fn region_multiply(&self, src: &[u8], dst: &mut [u8], c: u32, accumulate: bool) -> Result<()> {
        let width = self.width();
        check_regions(width, src, dst)?;
        let word = width.word_bytes();

        for (s, d) in src.chunks_exact(word).zip(dst.chunks_exact_mut(word)) {
            let mut product = self.mul(c, width.read_word(s));
            if accumulate {
                product ^= width.read_word(d);
            }
            width.write_word(d, product);
        }
        Ok(())
    }

    /// In-place `buf = c * buf`.
    fn scale_region(&self, buf: &mut [u8], c: u32) -> Result<()> {
        let width = self.width();
        width.check_aligned(buf.len())?;

        for chunk in buf.chunks_exact_mut(width.word_bytes()) {
            let value = self.mul(c, width.read_word(chunk));
            width.write_word(chunk, value);
        }
        Ok(())
    }
}

fn check_regions(width: FieldWidth, src: &[u8], dst: &[u8]) -> Result<()> {
    if src.len() != dst.len() {
        return Err(Error::StripeSizeMismatch {
            what: "destination region".to_string(),
            actual: dst.len(),
            expected: src.len(),
        });
    }
    width.check_aligned(src.len())
}

/// GF(2^8) backed by the `reed-solomon-erasure` tables.
#[derive(Debug, Clone, Copy)]
pub struct Gf8;

impl GaloisField for Gf8 {
    fn width(&self) -> FieldWidth {
        FieldWidth::W8
    }

    fn mul(&self, a: u32, b: u32) -> u32 {
        galois_8::mul(a as u8, b as u8) as u32
    }

    fn inv(&self, a: u32) -> Result<u32> {
        if a == 0 {
            return Err(Error::DivisionByZero { bits: 8 });
        }
        Ok(galois_8::div(1, a as u8) as u32)
    }

    fn region_multiply(&self, src: &[u8], dst: &mut [u8], c: u32, accumulate: bool) -> Result<()> {
        check_regions(FieldWidth::W8, src, dst)?;
        if accumulate {
            galois_8::mul_slice_xor(c as u8, src, dst);
        } else {
            galois_8::mul_slice(c as u8, src, dst);
        }
        Ok(())
    }
}

/// GF(2^16) using log/antilog tables.
#[derive(Debug, Clone, Copy)]
pub struct Gf16;

impl GaloisField for Gf16 {
    fn width(&self) -> FieldWidth {
        FieldWidth::W16
    }

    fn mul(&self, a: u32, b: u32) -> u32 {
        tables::mul_w16(a as u16, b as u16) as u32
    }

    fn inv(&self, a: u32) -> Result<u32> {
        if a == 0 {
            return Err(Error::DivisionByZero { bits: 16 });
        }
        Ok(tables::inv_w16(a as u16) as u32)
    }
}

/// GF(2^32) using shift-and-add multiplication.
#[derive(Debug, Clone, Copy)]
pub struct Gf32;

impl GaloisField for Gf32 {
    fn width(&self) -> FieldWidth {
        FieldWidth::W32
    }

    fn mul(&self, a: u32, b: u32) -> u32 {
        tables::mul_w32(a, b)
    }

    fn inv(&self, a: u32) -> Result<u32> {
        if a == 0 {
            return Err(Error::DivisionByZero { bits: 32 });
        }
        Ok(tables::inv_w32(a))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const WIDTHS: [FieldWidth; 3] = [FieldWidth::W8, FieldWidth::W16, FieldWidth::W32];

    #[test]
    fn test_width_from_bits() {
        assert_eq!(FieldWidth::try_from(8).unwrap(), FieldWidth::W8);
        assert_eq!(FieldWidth::try_from(16).unwrap(), FieldWidth::W16);
        assert_eq!(FieldWidth::try_from(32).unwrap(), FieldWidth::W32);
        assert_matches!(FieldWidth::try_from(4), Err(Error::UnsupportedFieldWidth(4)));
        assert_matches!(FieldWidth::try_from(64), Err(Error::UnsupportedFieldWidth(64)));
    }

    #[test]
    fn test_width_metrics() {
        assert_eq!(FieldWidth::W16.word_bytes(), 2);
        assert_eq!(FieldWidth::W8.max_shards(), Some(256));
        assert_eq!(FieldWidth::W16.max_shards(), Some(65536));
        assert_eq!(FieldWidth::W32.max_shards(), None);
        assert_eq!(format!("{}", FieldWidth::W32), "GF(2^32)");
    }

    #[test]
    fn test_gf8_matches_polynomial_0x11d() {
        let field = FieldWidth::W8.field();
        // x^7 * x = x^8 = x^4 + x^3 + x^2 + 1
        assert_eq!(field.mul(0x80, 2), tables::POLY_W8 & 0xFF);
        assert_eq!(field.mul(2, 2), 4);
    }

    #[test]
    fn test_inverse_roundtrip_all_widths() {
        for width in WIDTHS {
            let field = width.field();
            for a in [1u32, 2, 3, 0x53, width.max_element()] {
                let inv = field.inv(a).unwrap();
                assert_eq!(field.mul(a, inv), 1, "{width} a={a:#x}");
            }
        }
    }

    #[test]
    fn test_division_by_zero() {
        for width in WIDTHS {
            let field = width.field();
            assert_matches!(field.inv(0), Err(Error::DivisionByZero { .. }));
            assert_matches!(field.div(0, 0), Err(Error::DivisionByZero { .. }));
            assert_eq!(field.div(0, 7).unwrap(), 0);
        }
    }

    #[test]
    fn test_mul_commutes_and_distributes() {
        for width in WIDTHS {
            let field = width.field();
            let (a, b, c) = (0x1d, 0x47, 0xa3);
            assert_eq!(field.mul(a, b), field.mul(b, a));
            assert_eq!(
                field.mul(a, field.add(b, c)),
                field.add(field.mul(a, b), field.mul(a, c))
            );
        }
    }

    #[test]
    fn test_pow() {
        for width in WIDTHS {
            let field = width.field();
            assert_eq!(field.pow(2, 0), 1);
            assert_eq!(field.pow(2, 3), 8);
            assert_eq!(field.pow(3, 2), field.mul(3, 3));
        }
    }

    #[test]
    fn test_region_multiply_and_accumulate() {
        for width in WIDTHS {
            let field = width.field();
            let src: Vec<u8> = (1..=8).collect();
            let mut dst = vec![0u8; 8];

            field.region_multiply(&src, &mut dst, 1, false).unwrap();
            assert_eq!(dst, src);

            // x ^ x = 0
            field.region_multiply(&src, &mut dst, 1, true).unwrap();
            assert_eq!(dst, vec![0u8; 8]);

            field.region_multiply(&src, &mut dst, 0, false).unwrap();
            assert_eq!(dst, vec![0u8; 8]);
        }
    }

    #[test]
    fn test_region_words_are_little_endian() {
        let field = FieldWidth::W16.field();
        let src = [0x01, 0x00, 0x00, 0x80];
        let mut dst = [0u8; 4];
        field.region_multiply(&src, &mut dst, 2, false).unwrap();
        // 0x0001 * 2 = 0x0002, 0x8000 * 2 = 0x100b
        assert_eq!(dst, [0x02, 0x00, 0x0b, 0x10]);
    }

    #[test]
    fn test_region_rejects_misaligned() {
        let field = FieldWidth::W32.field();
        let src = [0u8; 6];
        let mut dst = [0u8; 6];
        assert_matches!(
            field.region_multiply(&src, &mut dst, 2, false),
            Err(Error::MisalignedRegion { len: 6, word: 4 })
        );
        let mut buf = [0u8; 3];
        assert_matches!(
            FieldWidth::W16.field().scale_region(&mut buf, 2),
            Err(Error::MisalignedRegion { .. })
        );
    }

    #[test]
    fn test_region_rejects_length_mismatch() {
        let field = FieldWidth::W8.field();
        let src = [0u8; 4];
        let mut dst = [0u8; 8];
        assert_matches!(
            field.region_multiply(&src, &mut dst, 2, false),
            Err(Error::StripeSizeMismatch { .. })
        );
    }
}
