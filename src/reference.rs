//! Nucleotide base codes for a reference genome string.
//!
//! `A`, `C`, `G` and `T` (either case) become 0 to 3; everything else,
//! including `N` and line terminators, becomes 4. Annotation weights are
//! OR-ed on top of these codes, which is why bitwise weights start at 8.

/// Code for a base that is not A, C, G or T.
pub const UNKNOWN_BASE: u8 = 4;

const BASE_CODES: [u8; 256] = build_base_codes();

const fn build_base_codes() -> [u8; 256] {
    let mut table = [UNKNOWN_BASE; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table
}

/// Code of a single base.
#[inline(always)]
pub fn base_code(base: u8) -> u8 {
    BASE_CODES[base as usize]
}

/// Replace every byte with its base code, in place.
pub fn encode_bases(sequence: &mut [u8]) {
    for b in sequence.iter_mut() {
        *b = BASE_CODES[*b as usize];
    }
}
