// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! 48-bit linear congruential generator for random collection picks.

const MULTIPLIER: u64 = 0x5_DEEC_E66D;
const ADDEND: u64 = 0xB;
const MASK: u64 = 0xFFFF_FFFF_FFFF;
const LOW_SEED: u64 = 0x330E;

/// Byte permutation that scrambles seeds.
#[rustfmt::skip]
const SCRAMBLE: [u8; 256] = [
    0xA2, 0xA0, 0x19, 0x3B, 0xF8, 0xEB, 0xAA, 0xEE, 0xF3, 0x1C, 0x67, 0x28, 0x1D, 0xED, 0x00, 0xDE,
    0x95, 0x2E, 0xDC, 0x3F, 0x3A, 0x82, 0x35, 0x4D, 0x6C, 0xBA, 0x36, 0xD0, 0xF6, 0x0C, 0x79, 0x32,
    0xD1, 0x59, 0xF4, 0x08, 0x8B, 0x63, 0x89, 0x2F, 0xB8, 0xB4, 0x97, 0x83, 0xF2, 0x8F, 0x18, 0xC7,
    0x51, 0x14, 0x65, 0x87, 0x48, 0x20, 0x42, 0xA8, 0x80, 0xB5, 0x40, 0x13, 0xB2, 0x22, 0x7E, 0x57,
    0xBC, 0x7F, 0x6B, 0x9D, 0x86, 0x4C, 0xC8, 0xDB, 0x7C, 0xD5, 0x25, 0x4E, 0x5A, 0x55, 0x74, 0x50,
    0xCD, 0xB3, 0x7A, 0xBB, 0xC3, 0xCB, 0xB6, 0xE2, 0xE4, 0xEC, 0xFD, 0x98, 0x0B, 0x96, 0xD3, 0x9E,
    0x5C, 0xA1, 0x64, 0xF1, 0x81, 0x61, 0xE1, 0xC4, 0x24, 0x72, 0x49, 0x8C, 0x90, 0x4B, 0x84, 0x34,
    0x38, 0xAB, 0x78, 0xCA, 0x1F, 0x01, 0xD7, 0x93, 0x11, 0xC1, 0x58, 0xA9, 0x31, 0xF9, 0x44, 0x6D,
    0xBF, 0x33, 0x9C, 0x5F, 0x09, 0x94, 0xA3, 0x85, 0x06, 0xC6, 0x9A, 0x1E, 0x7B, 0x46, 0x15, 0x30,
    0x27, 0x2B, 0x1B, 0x71, 0x3C, 0x5B, 0xD6, 0x6F, 0x62, 0xAC, 0x4F, 0xC2, 0xC0, 0x0E, 0xB1, 0x23,
    0xA7, 0xDF, 0x47, 0xB0, 0x77, 0x69, 0x05, 0xE9, 0xE6, 0xE7, 0x76, 0x73, 0x0F, 0xFE, 0x6E, 0x9B,
    0x56, 0xEF, 0x12, 0xA5, 0x37, 0xFC, 0xAE, 0xD9, 0x03, 0x8E, 0xDD, 0x10, 0xB9, 0xCE, 0xC9, 0x8D,
    0xDA, 0x2A, 0xBD, 0x68, 0x17, 0x9F, 0xBE, 0xD4, 0x0A, 0xCC, 0xD2, 0xE8, 0x43, 0x3D, 0x70, 0xB7,
    0x02, 0x7D, 0x99, 0xD8, 0x0D, 0x60, 0x8A, 0x04, 0x2C, 0x3E, 0x92, 0xE5, 0xAF, 0x53, 0x07, 0xE0,
    0x29, 0xA6, 0xC5, 0xE3, 0xF5, 0xF7, 0x4A, 0x41, 0x26, 0x6A, 0x16, 0x5E, 0x52, 0x2D, 0x21, 0xAD,
    0xF0, 0x91, 0xFF, 0xEA, 0x54, 0xFA, 0x66, 0x1A, 0x45, 0x39, 0xCF, 0x75, 0xA4, 0x88, 0xFB, 0x5D,
];

/// The `drand48` recurrence.
///
/// Particle systems seed one generator per system so picks only depend on
/// the system seed and the particle order.
#[derive(Clone, Debug)]
pub(crate) struct Rng {
    state: u64,
}

impl Rng {
    /// Seeds the generator from `seed` scrambled three times through
    /// [`SCRAMBLE`], so nearby seeds start far apart.
    pub(crate) fn new(seed: u32) -> Self {
        let mut rng = Self::seeded(seed);
        for _ in 0..2 {
            let next = rng.next_int();
            rng = Self::seeded(next);
        }
        rng
    }

    fn seeded(seed: u32) -> Self {
        let seed = seed.wrapping_add(u32::from(SCRAMBLE[(seed & 0xFF) as usize]));
        Self {
            state: (u64::from(seed) << 16) | LOW_SEED,
        }
    }

    /// Next value in `0..2^31`.
    pub(crate) fn next_int(&mut self) -> u32 {
        self.state = MULTIPLIER.wrapping_mul(self.state).wrapping_add(ADDEND) & MASK;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "the state is 48 bits wide, so 31 bits remain after the shift"
        )]
        let value = (self.state >> 17) as u32;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..8 {
            let value = a.next_int();
            assert_eq!(value, b.next_int());
            assert!(value < 1 << 31, "values fit in 31 bits");
        }
        assert_ne!(Rng::new(7).next_int(), Rng::new(8).next_int());
    }

    #[test]
    fn seeds_are_scrambled_before_use() {
        let mut rng = Rng::new(7);
        let values = [rng.next_int(), rng.next_int(), rng.next_int()];
        assert_eq!(values, [1_549_812_001, 1_706_216_183, 1_352_652_405]);

        let mut rng = Rng::new(31_415_926);
        assert_eq!(rng.next_int(), 630_869_765);
        // Unscrambled, seed 7 would start from its plain `drand48` state.
        assert_ne!(Rng::new(7).next_int(), Rng::seeded(7).next_int());
    }
}
