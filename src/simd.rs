//! 16-lane byte comparisons used by the scanner.
//!
//! On x86 and x86_64 with SSE2 these map to `pcmpeqb`/`pmovmskb`. Other
//! targets get a lane-by-lane loop with identical results.

/// Number of bytes compared per block.
pub const LANES: usize = 16;

/// A block of [`LANES`] bytes.
pub type Block = [u8; LANES];

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
use core::arch::x86_64::{
    __m128i, _mm_and_si128, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
};

#[cfg(all(target_arch = "x86", target_feature = "sse2"))]
use core::arch::x86::{
    __m128i, _mm_and_si128, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
};

/// Compares every byte of `block` with `byte`.<br><br>
///
/// # Returns
/// A bitmask where bit `i` is set if `block[i] == byte`.
#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
#[inline(always)]
pub fn eq_mask(block: &Block, byte: u8) -> u16 {
    // SAFETY: sse2 is statically enabled and the unaligned load reads
    // exactly the 16 bytes behind the reference.
    unsafe {
        let chunk = _mm_loadu_si128(block.as_ptr().cast::<__m128i>());
        let needle = _mm_set1_epi8(byte as i8);
        _mm_movemask_epi8(_mm_cmpeq_epi8(chunk, needle)) as u16
    }
}

/// Checks that `pattern & mask == memory & mask` for all 16 lanes.
#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
#[inline(always)]
pub fn masked_eq(pattern: &Block, memory: &Block, mask: &Block) -> bool {
    // SAFETY: see `eq_mask`.
    unsafe {
        let pattern = _mm_loadu_si128(pattern.as_ptr().cast::<__m128i>());
        let memory = _mm_loadu_si128(memory.as_ptr().cast::<__m128i>());
        let mask = _mm_loadu_si128(mask.as_ptr().cast::<__m128i>());

        let comparison = _mm_cmpeq_epi8(_mm_and_si128(pattern, mask), _mm_and_si128(memory, mask));
        _mm_movemask_epi8(comparison) == 0xFFFF
    }
}

#[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2")))]
#[inline(always)]
pub fn eq_mask(block: &Block, byte: u8) -> u16 {
    block
        .iter()
        .enumerate()
        .fold(0, |bits, (i, b)| bits | (u16::from(*b == byte) << i))
}

#[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2")))]
#[inline(always)]
pub fn masked_eq(pattern: &Block, memory: &Block, mask: &Block) -> bool {
    pattern
        .iter()
        .zip(memory)
        .zip(mask)
        .all(|((p, m), k)| p & k == m & k)
}

/// Iterator over the indices of the set bits of a lane bitmask, lowest first.
pub struct SetBits(u16);

impl SetBits {
    pub fn new(bits: u16) -> Self {
        Self(bits)
    }
}

impl Iterator for SetBits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as usize;
        // Clear the lowest set bit.
        self.0 &= self.0 - 1;
        Some(index)
    }
}
