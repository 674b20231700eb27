use crate::pattern::{self, PatternEntry, Signature};

/// An error in the signature builder.<br>
/// This encapsulates all possible errors that can occur when building a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    /// Thrown when the signature has no bytes.
    #[error("the signature is empty")]
    EmptySignature,
    /// Thrown when a token of an IDA-style signature is neither two
    /// hexadecimal digits nor a wildcard.
    #[error("invalid token `{token}` at position {position}")]
    InvalidToken { position: usize, token: String },
    /// Thrown when the size of the signature differs from the size of the mask.
    #[error("the size of signature and mask do not match")]
    SizeMismatch,
    /// Thrown when a fixed byte is required but the signature only has wildcards.
    #[error("the signature has no fixed byte")]
    NoFixedByte,
}

/// Validating builder for [`Signature`].<br><br>
///
/// Unlike [`parse`](crate::parse), which trusts its input, the builder
/// checks every token and reports malformed signatures as errors.<br><br>
///
/// # Examples
///
/// ## IDA-style signature
/// ```
/// let signature = sigscan::SignatureBuilder::from_ida_style("48 8B 05 ? ? ? ? 48 8B 88 ?? ?? ?? ??")
///     .unwrap()
///     .require_fixed_byte()
///     .build()
///     .unwrap();
///
/// assert_eq!(signature.len(), 14);
/// ```
///
/// ## Code-style signature
/// ```
/// let signature = sigscan::SignatureBuilder::from_code_style(b"\x48\x8B\x05\x00\x00\x00\x00", "...????")
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(signature.to_string(), "48 8B 05 ?? ?? ?? ??");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureBuilder {
    entries: Vec<PatternEntry>,
    require_fixed: bool,
}

impl SignatureBuilder {
    /// Creates an empty signature builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder initialized with an IDA-style signature.<br>
    /// See [`ida_style`](Self::ida_style).
    pub fn from_ida_style(pattern: &str) -> Result<Self, BuilderError> {
        Self::new().ida_style(pattern)
    }

    /// Creates a builder initialized with a code-style signature.<br>
    /// See [`code_style`](Self::code_style).
    pub fn from_code_style(signature: &[u8], mask: &str) -> Result<Self, BuilderError> {
        Self::new().code_style(signature, mask)
    }

    /// Creates a builder initialized with a signature without wildcards.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            entries: bytes.iter().copied().map(PatternEntry::fixed).collect(),
            require_fixed: false,
        }
    }

    /// Initializes the signature with an IDA-style pattern.<br><br>
    ///
    /// An IDA-style signature is a single string of hexadecimal bytes
    /// separated by whitespace, where `?` or `??` represent a wildcard byte.<br><br>
    ///
    /// # Arguments
    /// * `pattern` - The IDA-style pattern string.
    ///
    /// # Returns
    /// The current instance of the builder, or an error naming the first
    /// invalid token.
    ///
    /// # Format
    /// ```ignore
    /// pattern:    "48 8B 05 ? ? ?? ??"
    /// ```
    pub fn ida_style(mut self, pattern: &str) -> Result<Self, BuilderError> {
        let entries = pattern
            .split_whitespace()
            .enumerate()
            .map(|(position, token)| {
                parse_token(token).ok_or_else(|| BuilderError::InvalidToken {
                    position,
                    token: token.to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if entries.is_empty() {
            return Err(BuilderError::EmptySignature);
        }

        self.entries = entries;
        Ok(self)
    }

    /// Initializes the signature with a code-style pattern.<br><br>
    ///
    /// A code-style signature is characterized by a byte array and a mask string.<br>
    /// The mask string has one character per byte, where `?` marks a wildcard
    /// and any other character a fixed byte.<br><br>
    ///
    /// # Arguments
    /// * `signature` - The byte array containing the bytes to search for.
    /// * `mask` - The mask string.
    ///
    /// # Returns
    /// The current instance of the builder, or an error if the sizes differ.
    ///
    /// # Good Practices
    /// * In the mask string, use a `[?]` for each wildcard byte, and `[.]` for each non-wildcard byte.
    /// * In the byte array, use `\x00` for each wildcard byte.
    pub fn code_style(mut self, signature: &[u8], mask: &str) -> Result<Self, BuilderError> {
        if signature.len() != mask.chars().count() {
            return Err(BuilderError::SizeMismatch);
        }

        self.entries = signature
            .iter()
            .zip(mask.chars())
            .map(|(&value, m)| {
                if m == '?' {
                    PatternEntry::wildcard()
                } else {
                    PatternEntry::fixed(value)
                }
            })
            .collect();
        Ok(self)
    }

    /// Makes [`build`](Self::build) fail for signatures made only of wildcards.<br><br>
    ///
    /// # Returns
    /// The current instance of the builder.
    pub fn require_fixed_byte(mut self) -> Self {
        self.require_fixed = true;
        self
    }

    /// Builds the signature.<br><br>
    ///
    /// # Returns
    /// The signature, or an error if it is empty or lacks a required fixed byte.
    pub fn build(self) -> Result<Signature, BuilderError> {
        if self.entries.is_empty() {
            return Err(BuilderError::EmptySignature);
        }
        if self.require_fixed && pattern::lead(&self.entries).is_none() {
            return Err(BuilderError::NoFixedByte);
        }

        Ok(Signature::from(self.entries))
    }
}

/// Parses a single whitespace-separated token.
fn parse_token(token: &str) -> Option<PatternEntry> {
    match token {
        "?" | "??" => Some(PatternEntry::wildcard()),
        _ if token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u8::from_str_radix(token, 16).ok().map(PatternEntry::fixed)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_parsing() {
        assert_eq!(parse_token("?"), Some(PatternEntry::wildcard()));
        assert_eq!(parse_token("??"), Some(PatternEntry::wildcard()));
        assert_eq!(parse_token("e8"), Some(PatternEntry::fixed(0xE8)));
        assert_eq!(parse_token("???"), None);
        assert_eq!(parse_token("A"), None);
        assert_eq!(parse_token("+F"), None);
        assert_eq!(parse_token("0x"), None);
        assert_eq!(parse_token("123"), None);
    }

    #[test]
    fn strict_and_lenient_parsing_agree_on_valid_input() {
        let text = "48 8B ?? ? 05 ff";
        assert_eq!(
            SignatureBuilder::from_ida_style(text).unwrap().build().unwrap(),
            pattern::parse(text)
        );
    }

    #[test]
    fn reports_position_of_invalid_token() {
        assert_eq!(
            SignatureBuilder::from_ida_style("48 8B ZA ??"),
            Err(BuilderError::InvalidToken {
                position: 2,
                token: "ZA".into(),
            })
        );
    }

    #[test]
    fn empty_builder_does_not_build() {
        assert_eq!(SignatureBuilder::new().build(), Err(BuilderError::EmptySignature));
        assert_eq!(
            SignatureBuilder::from_bytes(&[]).build(),
            Err(BuilderError::EmptySignature)
        );
    }

    #[test]
    fn fixed_byte_is_only_required_on_request() {
        let builder = SignatureBuilder::from_ida_style("?? ??").unwrap();
        assert!(builder.clone().build().is_ok());
        assert_eq!(
            builder.require_fixed_byte().build(),
            Err(BuilderError::NoFixedByte)
        );
    }
}
