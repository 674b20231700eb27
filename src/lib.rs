//! Locates wildcard byte signatures in the code section of a loaded module.
//!
//! A signature is written as IDA-style text, such as `"48 8B 05 ?? ?? ?? ??"`,
//! where each token is either two hexadecimal digits or a `?`/`??` wildcard.
//! The scanner returns the address of the first position in the module's
//! `.text` section where every fixed byte of the signature matches.
//!
//! # Examples
//!
//! ```
//! let code = b"\x90\x90\x48\x8B\x05\x00\x00\x00\x00\xC3";
//! let signature = sigscan::parse("48 8B 05 ?? ?? ?? ??");
//!
//! let offset = sigscan::Scanner::new().find(code, &signature).unwrap();
//! assert_eq!(offset, Some(2));
//! ```
//!
//! Scanning a module loaded in the current process:
//!
//! ```no_run
//! # fn module_base() -> *const u8 { std::ptr::null() }
//! let image = unsafe { sigscan::ModuleImage::from_loaded(module_base()) }?;
//! let signature = sigscan::SignatureBuilder::from_ida_style("E8 ?? ?? ?? ?? 48 8B D8")?.build()?;
//!
//! match sigscan::find_signature(&image, &signature)? {
//!     Some(address) => println!("found at {:#x}", address),
//!     None => println!("not found"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod image;
mod pattern;
mod scan;
mod simd;

#[cfg(feature = "object-scan")]
pub mod object_scan;

pub use builder::{BuilderError, SignatureBuilder};
pub use image::{ImageError, ModuleImage, Section, CODE_SECTION};
pub use pattern::{parse, parse_into, token_count, PatternEntry, Signature};
pub use scan::{ScanError, Scanner, WildcardPolicy};

/// An error returned when scanning a module image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Finds the first occurrence of a signature in the code section of a
/// module image, using the default [`Scanner`].<br><br>
///
/// # Arguments
/// * `image` - The module image.
/// * `entries` - The signature to search for.
///
/// # Returns
/// The absolute address of the first match, `Ok(None)` if there is none, or
/// an error if the image has no code section or the signature is empty or
/// made only of wildcards.
pub fn find_signature(image: &ModuleImage<'_>, entries: &[PatternEntry]) -> Result<Option<usize>, Error> {
    Scanner::new().find_in_image(image, entries)
}
