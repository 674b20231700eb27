#![cfg(feature = "object-scan")]

use common::*;
use object::{Object, ObjectSection};
use sigscan::object_scan::{code_section_name, scan_object, ObjectError};

mod common;

#[test]
/// Tests scanning the code section of the running test executable for bytes
/// taken from its own code section.
fn scan_own_executable() {
    init_logger();

    let data = std::fs::read(std::env::current_exe().unwrap()).unwrap();
    let file = object::File::parse(&*data).unwrap();
    let section = file.section_by_name(code_section_name(file.format())).unwrap();
    let code = section.data().unwrap();
    let (file_offset, _) = section.file_range().unwrap();

    // Take 40 bytes from the middle, with a few wildcards in between.
    let middle = code.len() / 2;
    let mut signature = sigscan::SignatureBuilder::from_bytes(&code[middle..middle + 40])
        .build()
        .unwrap()
        .into_entries();
    for i in [1, 2, 17, 33] {
        signature[i] = sigscan::PatternEntry::wildcard();
    }

    let expected = naive_find(code, &signature).unwrap();
    assert!(expected <= middle);

    let found = scan_object(&data, &signature).unwrap().unwrap();
    assert_eq!(found.section_offset, expected);
    assert_eq!(found.raw_offset, file_offset as usize + expected);
    assert_eq!(found.address, section.address() + expected as u64);
}

#[test]
/// Tests that a signature absent from the code section is not found.
fn scan_own_executable_no_match() {
    let data = std::fs::read(std::env::current_exe().unwrap()).unwrap();
    let file = object::File::parse(&*data).unwrap();
    let section = file.section_by_name(code_section_name(file.format())).unwrap();

    // One byte longer than the section can never match.
    let signature = vec![sigscan::PatternEntry::fixed(0xCC); section.size() as usize + 1];
    assert_eq!(scan_object(&data, &signature), Ok(None));
}

#[test]
fn scan_invalid_object() {
    assert_eq!(
        scan_object(&[0xAA; 64], &sigscan::parse("48 8B")),
        Err(ObjectError::InvalidObject)
    );
}
