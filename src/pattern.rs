use std::fmt;
use std::ops::Deref;

/// A single position of a signature.<br><br>
///
/// If `fixed` is `false` the position is a wildcard, and `value` carries no meaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatternEntry {
    /// The byte that must be found at this position.
    pub value: u8,
    /// Whether this position must match `value` exactly.
    pub fixed: bool,
}

impl PatternEntry {
    /// Creates an entry that only matches `value`.
    pub const fn fixed(value: u8) -> Self {
        Self { value, fixed: true }
    }

    /// Creates an entry that matches any byte.
    pub const fn wildcard() -> Self {
        Self { value: 0, fixed: false }
    }
}

/// An ordered sequence of pattern entries, in the same order as the text
/// it was parsed from.<br><br>
///
/// Dereferences to `[PatternEntry]`, so it can be passed directly to the
/// scanning functions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    entries: Vec<PatternEntry>,
}

impl Signature {
    /// The entries of the signature.
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Index of the first fixed entry, or `None` if the signature only
    /// contains wildcards.
    pub fn lead(&self) -> Option<usize> {
        lead(&self.entries)
    }

    /// Consumes the signature and returns its entries.
    pub fn into_entries(self) -> Vec<PatternEntry> {
        self.entries
    }
}

impl Deref for Signature {
    type Target = [PatternEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl From<Vec<PatternEntry>> for Signature {
    fn from(entries: Vec<PatternEntry>) -> Self {
        Self { entries }
    }
}

impl FromIterator<PatternEntry> for Signature {
    fn from_iter<I: IntoIterator<Item = PatternEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Signature {
    /// Formats the signature as hexadecimal bytes (or `??`) separated by spaces.<br><br>
    ///
    /// The output can be parsed back with [`parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if entry.fixed {
                write!(f, "{:02X}", entry.value)?;
            } else {
                write!(f, "??")?;
            }
        }
        Ok(())
    }
}

/// Index of the first fixed entry in `entries`.
pub(crate) fn lead(entries: &[PatternEntry]) -> Option<usize> {
    entries.iter().position(|entry| entry.fixed)
}

/// Marks an invalid hexadecimal digit. It is combined like any other
/// nibble, so malformed text produces garbage entries instead of an error.
const INVALID_DIGIT: u8 = 0xFF;

fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        b'a'..=b'f' => c - b'a' + 10,
        _ => INVALID_DIGIT,
    }
}

/// Single-pass tokenizer over the text of an IDA-style signature.<br><br>
///
/// Spaces are skipped. A `?` yields a wildcard and swallows an immediately
/// following `?`. Any other character is paired with the next one and read
/// as two hexadecimal digits.
struct Tokens<'a> {
    bytes: &'a [u8],
}

impl Iterator for Tokens<'_> {
    type Item = PatternEntry;

    fn next(&mut self) -> Option<PatternEntry> {
        loop {
            match self.bytes {
                [] => return None,
                [b' ', rest @ ..] => self.bytes = rest,
                [b'?', b'?', rest @ ..] | [b'?', rest @ ..] => {
                    self.bytes = rest;
                    return Some(PatternEntry::wildcard());
                }
                [high, low, rest @ ..] => {
                    self.bytes = rest;
                    return Some(PatternEntry::fixed((hex_digit(*high) << 4) | hex_digit(*low)));
                }
                [high] => {
                    // Dangling digit: the missing low nibble reads as invalid.
                    self.bytes = &[];
                    return Some(PatternEntry::fixed((hex_digit(*high) << 4) | INVALID_DIGIT));
                }
            }
        }
    }
}

fn tokens(text: &str) -> Tokens<'_> {
    Tokens {
        bytes: text.as_bytes(),
    }
}

/// Parses an IDA-style signature such as `"48 8B ?? ?? 05"`.<br><br>
///
/// The input is trusted: no validation is performed, and malformed tokens
/// produce meaningless entries rather than an error. Use
/// [`SignatureBuilder`](crate::SignatureBuilder) for validated parsing.<br><br>
///
/// # Arguments
/// * `text` - The signature text.
///
/// # Returns
/// The parsed signature, with one entry per token.
pub fn parse(text: &str) -> Signature {
    tokens(text).collect()
}

/// Parses an IDA-style signature into a caller-provided buffer.<br><br>
///
/// Behaves exactly like [`parse`], but writes the entries into `out` instead
/// of allocating. The buffer can be sized with [`token_count`].<br><br>
///
/// # Arguments
/// * `text` - The signature text.
/// * `out` - The buffer receiving the entries.
///
/// # Returns
/// The number of entries written.
///
/// # Panics
/// If `out` is shorter than `token_count(text)`.
pub fn parse_into(text: &str, out: &mut [PatternEntry]) -> usize {
    let mut length = 0;
    for entry in tokens(text) {
        out[length] = entry;
        length += 1;
    }
    length
}

/// Number of entries [`parse`] produces for `text`.
pub fn token_count(text: &str) -> usize {
    tokens(text).count()
}
