#![allow(dead_code)]

use rand::RngCore;

/// Routes library logs to the test output. (`RUST_LOG=sigscan=trace`)
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

//noinspection ALL
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Byte-by-byte reference search.
pub fn naive_find(data: &[u8], entries: &[sigscan::PatternEntry]) -> Option<usize> {
    if entries.len() > data.len() {
        return None;
    }
    (0..=data.len() - entries.len()).find(|&start| {
        entries
            .iter()
            .enumerate()
            .all(|(i, entry)| !entry.fixed || data[start + i] == entry.value)
    })
}

const NT_OFFSET: usize = 0x40;
const DATA_DIRECTORIES: usize = 16;

/// A section of a synthetic image.
pub struct TestSection {
    pub name: &'static [u8],
    pub rva: u32,
    pub size: u32,
}

/// Builds a minimal PE image in loaded layout, with every section filled
/// with `0xCC`.<br><br>
///
/// # Arguments
/// * `pe64` - PE32+ if true, PE32 otherwise.
/// * `size_of_image` - Total size of the image.
/// * `sections` - The section table.
pub fn build_image(pe64: bool, size_of_image: usize, sections: &[TestSection]) -> Vec<u8> {
    let mut image = vec![0u8; size_of_image];

    // DOS header.
    image[0..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3C, NT_OFFSET as u32);

    // NT signature and file header.
    let optional_size = (if pe64 { 112 } else { 96 }) + DATA_DIRECTORIES * 8;
    image[NT_OFFSET..NT_OFFSET + 4].copy_from_slice(b"PE\0\0");
    let file_header = NT_OFFSET + 4;
    put_u16(&mut image, file_header, if pe64 { 0x8664 } else { 0x014C });
    put_u16(&mut image, file_header + 2, sections.len() as u16);
    put_u16(&mut image, file_header + 16, optional_size as u16);
    put_u16(&mut image, file_header + 18, 0x2022);

    // Optional header. Field offsets agree between PE32 and PE32+ up to
    // `SizeOfHeaders`.
    let optional = file_header + 20;
    put_u16(&mut image, optional, if pe64 { 0x20B } else { 0x10B });
    put_u32(&mut image, optional + 32, 0x1000);
    put_u32(&mut image, optional + 36, 0x200);
    put_u32(&mut image, optional + 56, size_of_image as u32);
    put_u32(&mut image, optional + 60, 0x400);
    let directory_count = optional + if pe64 { 108 } else { 92 };
    put_u32(&mut image, directory_count, DATA_DIRECTORIES as u32);

    // Section table.
    let table = optional + optional_size;
    for (i, section) in sections.iter().enumerate() {
        let header = table + i * 40;
        image[header..header + section.name.len()].copy_from_slice(section.name);
        put_u32(&mut image, header + 8, section.size);
        put_u32(&mut image, header + 12, section.rva);
        put_u32(&mut image, header + 16, section.size);
        put_u32(&mut image, header + 20, section.rva);
        put_u32(&mut image, header + 36, 0x6000_0020);

        let start = section.rva as usize;
        let end = (start + section.size as usize).min(size_of_image);
        image[start..end].fill(0xCC);
    }

    image
}

/// A PE32+ image with `.text` at 0x1000 (0x800 bytes) and `.data` at 0x2000.
pub fn default_image() -> Vec<u8> {
    build_image(
        true,
        0x3000,
        &[
            TestSection { name: b".text", rva: 0x1000, size: 0x800 },
            TestSection { name: b".data", rva: 0x2000, size: 0x100 },
        ],
    )
}

fn put_u16(image: &mut [u8], offset: usize, value: u16) {
    image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
