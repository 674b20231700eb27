use std::ops::Range;

use log::debug;
use object::pe::{ImageDosHeader, ImageNtHeaders32, ImageNtHeaders64};
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader};
use object::{FileKind, LittleEndian as LE};

/// Name of the section holding executable code in PE images.
pub const CODE_SECTION: &str = ".text";

/// Headers of a loaded module always occupy at least its first page.
const HEADER_PAGE: usize = 0x1000;

/// An error in the module image reader.<br>
/// This encapsulates all possible errors that can occur when reading the
/// section table of a module.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Thrown when the headers of the image cannot be parsed.
    #[error("malformed image headers: {0}")]
    Malformed(#[from] object::read::Error),
    /// Thrown when the image is a valid object of a format other than PE.
    #[error("the image is not a PE32 or PE32+ module")]
    UnsupportedFormat,
    /// Thrown when a section extends past the end of the mapped image.
    #[error("section `{name}` lies outside of the mapped image")]
    SectionOutOfBounds { name: String },
    /// Thrown when the image has no code section.
    #[error("the image has no `.text` section")]
    CodeSectionNotFound,
}

/// A section of a module image, as mapped in memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Section {
    name: String,
    start: usize,
    rva: usize,
    size: usize,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute address of the first byte of the section.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Size of the section in memory.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Absolute address one past the last byte of the section.
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    pub fn contains(&self, address: usize) -> bool {
        (self.start..self.end()).contains(&address)
    }

    /// Range of the section relative to the image base.
    fn relative_range(&self) -> Range<usize> {
        self.rva..self.rva + self.size
    }
}

/// A bounds-checked view of a PE module mapped in memory.<br><br>
///
/// The section table is read once when the view is created, and every
/// section is checked to lie inside the mapped image. Sections are addressed
/// by their virtual address, so the bytes must be in loaded layout, not in
/// file layout.<br><br>
///
/// # Examples
///
/// ```no_run
/// # fn module_base() -> *const u8 { std::ptr::null() }
/// let image = unsafe { sigscan::ModuleImage::from_loaded(module_base()) }.unwrap();
/// let signature = sigscan::parse("48 8B 05 ?? ?? ?? ?? 48 85 C0");
///
/// if let Some(address) = sigscan::find_signature(&image, &signature).unwrap() {
///     println!("found at {:#x}", address);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ModuleImage<'data> {
    data: &'data [u8],
    sections: Vec<Section>,
}

impl<'data> ModuleImage<'data> {
    /// Reads the section table of an image whose bytes are already in
    /// loaded layout, such as a copy of a module's memory.<br><br>
    ///
    /// Addresses reported for this image are relative to `data.as_ptr()`.<br><br>
    ///
    /// # Arguments
    /// * `data` - The image bytes, starting at the DOS header.
    ///
    /// # Returns
    /// The image view, or an error if the headers are invalid or a section
    /// lies outside of `data`.
    pub fn from_mapped(data: &'data [u8]) -> Result<Self, ImageError> {
        let headers = match FileKind::parse(data)? {
            FileKind::Pe32 => read_sections::<ImageNtHeaders32>(data)?,
            FileKind::Pe64 => read_sections::<ImageNtHeaders64>(data)?,
            _ => return Err(ImageError::UnsupportedFormat),
        };

        let base = data.as_ptr() as usize;
        let sections = headers
            .into_iter()
            .map(|(name, rva, size)| {
                match rva.checked_add(size) {
                    Some(end) if end <= data.len() => Ok(Section {
                        name,
                        start: base + rva,
                        rva,
                        size,
                    }),
                    _ => Err(ImageError::SectionOutOfBounds { name }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "read {} sections from image at {:#x} ({:#x} bytes)",
            sections.len(),
            base,
            data.len()
        );

        Ok(Self { data, sections })
    }

    /// Reads the section table of a module loaded in the current process.<br><br>
    ///
    /// The extent of the image is taken from `SizeOfImage` in its optional
    /// header.<br><br>
    ///
    /// # Arguments
    /// * `base` - The base address of the module.
    ///
    /// # Safety
    /// `base` must point to a module image mapped by the loader (or an
    /// equivalent loaded-layout copy of at least one page), and the whole
    /// image must stay mapped and unmodified for `'data`.
    pub unsafe fn from_loaded(base: *const u8) -> Result<Self, ImageError> {
        // SAFETY: the caller guarantees a mapped image, whose headers span
        // at least the first page.
        let headers = unsafe { std::slice::from_raw_parts(base, HEADER_PAGE) };

        let size = match FileKind::parse(headers)? {
            FileKind::Pe32 => size_of_image::<ImageNtHeaders32>(headers)?,
            FileKind::Pe64 => size_of_image::<ImageNtHeaders64>(headers)?,
            _ => return Err(ImageError::UnsupportedFormat),
        };

        // SAFETY: `SizeOfImage` covers every mapped section of the module.
        let data = unsafe { std::slice::from_raw_parts(base, size) };
        Self::from_mapped(data)
    }

    /// Base address of the image.
    pub fn base(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Size of the mapped image.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sections in the order of the section table.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Finds a section by name. (name is case-sensitive)<br>
    /// If several sections share the name, the first one is returned.
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// The section holding the executable code of the module.
    pub fn code_section(&self) -> Result<&Section, ImageError> {
        self.section_by_name(CODE_SECTION)
            .ok_or(ImageError::CodeSectionNotFound)
    }

    /// The bytes of `section`.<br><br>
    ///
    /// Fails if the section does not belong to this image.
    pub fn section_data(&self, section: &Section) -> Result<&'data [u8], ImageError> {
        self.data
            .get(section.relative_range())
            .ok_or_else(|| ImageError::SectionOutOfBounds {
                name: section.name.clone(),
            })
    }
}

/// Locates the NT headers of the image.<br><br>
///
/// # Returns
/// The headers and the offset of the section table that follows them.
fn nt_headers<Pe: ImageNtHeaders>(data: &[u8]) -> Result<(&Pe, u64), ImageError> {
    let dos_header = ImageDosHeader::parse(data)?;
    let mut offset = dos_header.nt_headers_offset().into();
    let (nt_headers, _) = Pe::parse(data, &mut offset)?;
    Ok((nt_headers, offset))
}

fn size_of_image<Pe: ImageNtHeaders>(data: &[u8]) -> Result<usize, ImageError> {
    let (nt_headers, _) = nt_headers::<Pe>(data)?;
    Ok(nt_headers.optional_header().size_of_image() as usize)
}

/// Reads `(name, virtual address, virtual size)` for every section.
fn read_sections<Pe: ImageNtHeaders>(data: &[u8]) -> Result<Vec<(String, usize, usize)>, ImageError> {
    let (nt_headers, offset) = nt_headers::<Pe>(data)?;
    let table = nt_headers.sections(data, offset)?;

    Ok(table
        .iter()
        .map(|header| {
            // Names are padded with NULs up to 8 bytes.
            let length = header.name.iter().position(|&b| b == 0).unwrap_or(header.name.len());
            (
                String::from_utf8_lossy(&header.name[..length]).into_owned(),
                header.virtual_address.get(LE) as usize,
                header.virtual_size.get(LE) as usize,
            )
        })
        .collect())
}
