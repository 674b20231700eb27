use log::{debug, trace, warn};

use crate::image::ModuleImage;
use crate::pattern::{self, PatternEntry};
use crate::simd::{self, SetBits, LANES};
use crate::Error;

/// What the scanner does with a signature that contains no fixed byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WildcardPolicy {
    /// Fail with [`ScanError::NoFixedByte`].
    #[default]
    Reject,
    /// Report a match at the start of the scanned region, as long as the
    /// signature fits in it. No bytes are read.
    MatchStart,
}

/// An error in the signature scanner.<br>
/// These are caller contract violations. A signature that is simply absent
/// is not an error, and is reported as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// Thrown when the signature has no entries.
    #[error("the signature is empty")]
    EmptySignature,
    /// Thrown when the signature only contains wildcards and the scanner
    /// uses [`WildcardPolicy::Reject`].
    #[error("the signature has no fixed byte to anchor the search")]
    NoFixedByte,
}

/// Scratch buffers built from the signature for a single scan.<br><br>
///
/// `pattern[i]` holds the entry value and `mask[i]` is `0xFF` for fixed
/// entries and `0x00` for wildcards. `lead` is the index of the first fixed
/// entry, used to pre-filter candidates.
struct Needle {
    pattern: Vec<u8>,
    mask: Vec<u8>,
    lead: usize,
}

impl Needle {
    fn new(entries: &[PatternEntry], lead: usize) -> Self {
        let (pattern, mask) = entries
            .iter()
            .map(|entry| (entry.value, if entry.fixed { 0xFF } else { 0x00 }))
            .unzip();

        Self { pattern, mask, lead }
    }

    fn len(&self) -> usize {
        self.pattern.len()
    }

    /// Masked comparison of the needle against `memory`, which must be
    /// exactly as long as the needle.<br><br>
    ///
    /// Full blocks are compared 16 bytes at a time, the remainder byte by
    /// byte, skipping wildcard positions.
    #[inline(always)]
    fn matches(&self, memory: &[u8]) -> bool {
        let mut offset = 0;

        while let (Some(pattern), Some(chunk), Some(mask)) = (
            self.pattern[offset..].first_chunk::<LANES>(),
            memory[offset..].first_chunk::<LANES>(),
            self.mask[offset..].first_chunk::<LANES>(),
        ) {
            if !simd::masked_eq(pattern, chunk, mask) {
                return false;
            }
            offset += LANES;
        }

        (offset..self.len()).all(|i| self.mask[i] == 0 || memory[i] == self.pattern[i])
    }

    /// Finds the lowest offset of `data` at which the needle matches.
    fn find(&self, data: &[u8]) -> Option<usize> {
        let length = self.len();
        // Last offset at which the whole needle still fits.
        let last = data.len().checked_sub(length)?;
        let anchor = self.pattern[self.lead];

        trace!(
            "scanning {:#x} bytes for anchor {:#04x} at index {}",
            data.len(),
            anchor,
            self.lead
        );

        // Strided sweep. A stride is only taken while all of its 16 candidates
        // are valid starts, which also keeps the anchor load in bounds since
        // `lead < length`.
        let mut position = 0;
        while position + LANES <= last + 1 {
            let Some(block) = data[position + self.lead..].first_chunk::<LANES>() else {
                break;
            };

            for lane in SetBits::new(simd::eq_mask(block, anchor)) {
                let candidate = position + lane;
                if self.matches(&data[candidate..candidate + length]) {
                    return Some(candidate);
                }
            }

            position += LANES;
        }

        // Scalar tail for the starts the sweep could not cover.
        (position..=last).find(|&candidate| {
            data[candidate + self.lead] == anchor
                && self.matches(&data[candidate..candidate + length])
        })
    }
}

/// Single-result signature scanner.<br><br>
///
/// Finds the first occurrence of a signature in a byte region, comparing 16
/// bytes at a time and falling back to single bytes at the end of the region.
///
/// # Examples
///
/// ```
/// let data = b"\xCC\xCC\x48\x8B\x05\x10\x20\x30\x40\xC3";
/// let signature = sigscan::parse("48 8B 05 ?? ?? ?? ??");
///
/// let offset = sigscan::Scanner::new().find(data, &signature).unwrap();
/// assert_eq!(offset, Some(2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Scanner {
    wildcard_policy: WildcardPolicy,
}

impl Scanner {
    /// Creates a scanner that rejects signatures without a fixed byte.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how signatures made only of wildcards are handled.<br><br>
    ///
    /// # Arguments
    /// * `policy` - The policy to use.
    ///
    /// # Returns
    /// The current instance of the scanner.
    pub fn with_wildcard_policy(mut self, policy: WildcardPolicy) -> Self {
        self.wildcard_policy = policy;
        self
    }

    pub fn wildcard_policy(&self) -> WildcardPolicy {
        self.wildcard_policy
    }

    /// Finds the first occurrence of a signature in `data`.<br><br>
    ///
    /// No byte outside of `data` is ever read.<br><br>
    ///
    /// # Arguments
    /// * `data` - The region to scan.
    /// * `entries` - The signature to search for.
    ///
    /// # Returns
    /// `Ok(Some(offset))` for the lowest matching offset in `data`,
    /// `Ok(None)` if the signature does not occur, or an error if the
    /// signature is unusable.
    pub fn find(&self, data: &[u8], entries: &[PatternEntry]) -> Result<Option<usize>, ScanError> {
        if entries.is_empty() {
            return Err(ScanError::EmptySignature);
        }

        let Some(lead) = pattern::lead(entries) else {
            return match self.wildcard_policy {
                WildcardPolicy::Reject => Err(ScanError::NoFixedByte),
                WildcardPolicy::MatchStart => {
                    warn!(
                        "signature of {} bytes has no fixed byte, matching the region start",
                        entries.len()
                    );
                    Ok((entries.len() <= data.len()).then_some(0))
                }
            };
        };

        let found = Needle::new(entries, lead).find(data);
        match found {
            Some(offset) => debug!("signature matched at offset {:#x}", offset),
            None => debug!("signature not found in {:#x} bytes", data.len()),
        }

        Ok(found)
    }

    /// Finds the first occurrence of a signature in the code section of a
    /// module image.<br><br>
    ///
    /// # Arguments
    /// * `image` - The module image.
    /// * `entries` - The signature to search for.
    ///
    /// # Returns
    /// The absolute address of the match, `Ok(None)` if there is none, or an
    /// error if the image has no usable code section or the signature is
    /// unusable.
    pub fn find_in_image(
        &self,
        image: &ModuleImage<'_>,
        entries: &[PatternEntry],
    ) -> Result<Option<usize>, Error> {
        let section = image.code_section()?;
        let data = image.section_data(section)?;

        debug!(
            "scanning section {} at {:#x} ({:#x} bytes)",
            section.name(),
            section.start(),
            section.size()
        );

        Ok(self
            .find(data, entries)?
            .map(|offset| section.start() + offset))
    }
}
