// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer and string hashes behind instance random ids.
//!
//! These must stay bit-for-bit stable: renderers use the resulting ids for
//! per-instance variation and expect the same values across runs.

/// Multiplicative string hash (`h = h * 37 + byte`, starting at zero).
#[must_use]
pub fn hash_string(s: &str) -> u32 {
    s.bytes()
        .fold(0_u32, |h, byte| h.wrapping_mul(37).wrapping_add(u32::from(byte)))
}

/// Bob Jenkins' final mix of two 32-bit keys.
#[must_use]
pub fn hash_int_2d(kx: u32, ky: u32) -> u32 {
    let mut a = 0xdead_beef_u32.wrapping_add(2 << 2).wrapping_add(13);
    let mut b = a;
    let mut c = a;
    a = a.wrapping_add(kx);
    b = b.wrapping_add(ky);

    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(24));
    c
}

/// [`hash_int_2d`] with a zero second key.
#[must_use]
pub fn hash_int(k: u32) -> u32 {
    hash_int_2d(k, 0)
}
