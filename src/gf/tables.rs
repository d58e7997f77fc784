//! Primitive polynomials and lookup tables for the wide fields.
//!
//! GF(2^8) arithmetic comes from `reed_solomon_erasure::galois_8`, which is
//! generated from the same polynomial (0x11d) listed here for reference.

use once_cell::sync::Lazy;

/// x^8 + x^4 + x^3 + x^2 + 1
pub const POLY_W8: u32 = 0x11d;

/// x^16 + x^12 + x^3 + x + 1
pub const POLY_W16: u32 = 0x1_100b;

/// x^32 + x^22 + x^2 + x + 1 (the x^32 term is implicit)
pub const POLY_W32: u32 = 0x0040_0007;

const W16_ORDER: usize = (1 << 16) - 1;

/// Log/antilog tables for GF(2^16) with generator 2.
pub struct LogTables {
    /// Doubled so `exp[log a + log b]` never needs a modulo
    pub exp: Vec<u16>,
    pub log: Vec<u16>,
}

fn gen_w16_tables() -> LogTables {
    let mut exp = vec![0u16; W16_ORDER * 2];
    let mut log = vec![0u16; W16_ORDER + 1];
    let mut x: u32 = 1;

    for i in 0..W16_ORDER {
        exp[i] = x as u16;
        exp[i + W16_ORDER] = x as u16;
        log[x as usize] = i as u16;

        x <<= 1;
        if x & 0x1_0000 != 0 {
            x ^= POLY_W16;
        }
    }

    LogTables { exp, log }
}

/// Built on first use; 384 KiB.
pub static W16_TABLES: Lazy<LogTables> = Lazy::new(gen_w16_tables);

#[inline]
pub fn mul_w16(a: u16, b: u16) -> u16 {
    if a == 0 || b == 0 {
        return 0;
    }
    let tables = &*W16_TABLES;
    let idx = tables.log[a as usize] as usize + tables.log[b as usize] as usize;
    tables.exp[idx]
}

/// Inverse of a non-zero element.
#[inline]
pub fn inv_w16(a: u16) -> u16 {
    debug_assert!(a != 0);
    let tables = &*W16_TABLES;
    tables.exp[W16_ORDER - tables.log[a as usize] as usize]
}

/// Carry-less shift-and-add multiply, reduced on every shift.
#[inline]
pub fn mul_w32(a: u32, b: u32) -> u32 {
    let mut product = 0u32;
    let mut a = a;
    let mut b = b;

    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x8000_0000 != 0;
        a <<= 1;
        if carry {
            a ^= POLY_W32;
        }
        b >>= 1;
    }
    product
}

/// Inverse of a non-zero element: a^(2^32 - 2).
pub fn inv_w32(a: u32) -> u32 {
    debug_assert!(a != 0);
    let mut result = 1u32;
    let mut base = a;
    let mut exp: u32 = 0xFFFF_FFFE;

    while exp != 0 {
        if exp & 1 != 0 {
            result = mul_w32(result, base);
        }
        base = mul_w32(base, base);
        exp >>= 1;
    }
    result
}
