use log::debug;
use object::{BinaryFormat, Object, ObjectSection};

use crate::pattern::PatternEntry;
use crate::scan::{ScanError, Scanner};

/// Information about a match found in the code section of an object file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMatch {
    /// The offset of the match in the raw data slice. (section file offset + match offset)
    pub raw_offset: usize,

    /// The offset of the match from the start of the code section.
    pub section_offset: usize,

    /// The virtual address of the match. (section address + match offset)
    pub address: u64,
}

/// An error in the object signature scanner.<br>
/// This encapsulates all possible errors that can occur when scanning for
/// a signature in an object file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    /// Thrown when the content of the data to scan is not a valid object file.
    #[error("the content of the data to scan is not a valid object file")]
    InvalidObject,
    /// Thrown when the object file has no code section.
    #[error("the code section `{0}` is not found")]
    SectionNotFound(&'static str),
    /// Thrown when the data of the code section is not available.
    #[error("the data of the code section is not available")]
    SectionDataNotFound,
    /// Thrown when the signature cannot be scanned for.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Name of the section holding executable code for a binary format.
pub fn code_section_name(format: BinaryFormat) -> &'static str {
    match format {
        BinaryFormat::MachO => "__text",
        _ => ".text",
    }
}

impl Scanner {
    /// Finds the first occurrence of a signature in the code section of an
    /// object file (PE, ELF, Mach-O, ...) read from disk.<br><br>
    ///
    /// This restricts the scan to the bytes that hold executable code, and
    /// reports where the match lies both in the file and in memory.<br><br>
    ///
    /// # Arguments
    /// * `data` - The content of the object file.
    /// * `entries` - The signature to search for.
    ///
    /// # Returns
    /// The first match, `Ok(None)` if the signature does not occur in the
    /// code section, or an error if the file or signature is unusable.
    pub fn scan_object(
        &self,
        data: &[u8],
        entries: &[PatternEntry],
    ) -> Result<Option<ObjectMatch>, ObjectError> {
        // Parse the object file from the data slice.
        let file = object::File::parse(data).or(Err(ObjectError::InvalidObject))?;

        // Some binary files may contain multiple sections with the same name;
        // in this case, the first section with the specified name is used.
        let section_name = code_section_name(file.format());
        let section = file
            .section_by_name(section_name)
            .ok_or(ObjectError::SectionNotFound(section_name))?;

        let section_data = section.data().or(Err(ObjectError::SectionDataNotFound))?;
        let (file_offset, _) = section
            .file_range()
            .ok_or(ObjectError::SectionDataNotFound)?;

        debug!(
            "scanning {:?} section {} at file offset {:#x} ({:#x} bytes)",
            file.format(),
            section_name,
            file_offset,
            section_data.len()
        );

        Ok(self.find(section_data, entries)?.map(|offset| ObjectMatch {
            raw_offset: file_offset as usize + offset,
            section_offset: offset,
            address: section.address() + offset as u64,
        }))
    }
}

/// Finds the first occurrence of a signature in the code section of an
/// object file, using the default [`Scanner`].
pub fn scan_object(data: &[u8], entries: &[PatternEntry]) -> Result<Option<ObjectMatch>, ObjectError> {
    Scanner::new().scan_object(data, entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_section_names() {
        assert_eq!(code_section_name(BinaryFormat::Pe), ".text");
        assert_eq!(code_section_name(BinaryFormat::Elf), ".text");
        assert_eq!(code_section_name(BinaryFormat::MachO), "__text");
    }

    #[test]
    fn rejects_invalid_objects() {
        assert_eq!(
            scan_object(&[0u8; 64], &crate::parse("48 8B")),
            Err(ObjectError::InvalidObject)
        );
    }
}
