use sfdt_core::archive::{
    build, crc32, ArchiveBuilder, ArchiveEntry, CENTRAL_HEADER_LEN, END_OF_CENTRAL_DIRECTORY_LEN,
    LOCAL_HEADER_LEN,
};
use sfdt_core::translation::{PicklistTranslation, TranslationPayload};

/// dir `d/`, `d/a.txt` = "hi", `package.xml` = "<p/>"
const GOLDEN_HEX: &str = concat!(
    "504b03041400000000000000000000000000000000000000000002000000642f",
    "504b030414000000000000000000ac2a93d8020000000200000007000000642f",
    "612e7478746869504b03041400000000000000000093d5351c04000000040000",
    "000b0000007061636b6167652e786d6c3c702f3e504b01021400140000000000",
    "0000000000000000000000000000000002000000000000000000100000000000",
    "0000642f504b0102140014000000000000000000ac2a93d80200000002000000",
    "070000000000000000000000000020000000642f612e747874504b0102140014",
    "00000000000000000093d5351c04000000040000000b00000000000000000000",
    "000000470000007061636b6167652e786d6c504b050600000000030003009e00",
    "0000740000000000",
);

fn decode_hex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

struct CentralRecord {
    name: String,
    crc: u32,
    size: u32,
    external_attributes: u32,
    offset: u32,
}

/// Reads the end record and every central directory record.
fn read_index(bytes: &[u8]) -> (u16, u32, u32, Vec<CentralRecord>) {
    let eocd = bytes.len() - END_OF_CENTRAL_DIRECTORY_LEN;
    assert_eq!(u32_at(bytes, eocd), 0x0605_4B50, "end record signature");
    let count = u16_at(bytes, eocd + 10);
    assert_eq!(count, u16_at(bytes, eocd + 8), "single-disk counts agree");
    let central_size = u32_at(bytes, eocd + 12);
    let central_offset = u32_at(bytes, eocd + 16);

    let mut records = Vec::new();
    let mut at = central_offset as usize;
    for _ in 0..count {
        assert_eq!(u32_at(bytes, at), 0x0201_4B50, "central record signature");
        let name_len = u16_at(bytes, at + 28) as usize;
        records.push(CentralRecord {
            name: String::from_utf8(bytes[at + 46..at + 46 + name_len].to_vec()).unwrap(),
            crc: u32_at(bytes, at + 16),
            size: u32_at(bytes, at + 24),
            external_attributes: u32_at(bytes, at + 38),
            offset: u32_at(bytes, at + 42),
        });
        at += CENTRAL_HEADER_LEN + name_len;
    }
    assert_eq!(at, eocd, "central directory ends where the end record begins");
    (count, central_size, central_offset, records)
}

fn translation_payload() -> TranslationPayload {
    TranslationPayload::new("Account", "Rating__c", "es")
        .with_label("Calificación")
        .with_picklist_values(vec![PicklistTranslation {
            master_label: "Hot".to_string(),
            translation: "Caliente".to_string(),
        }])
}

#[test]
fn fixed_entries_produce_golden_bytes() {
    let bytes = ArchiveBuilder::new()
        .add_directory("d/")
        .add_file("d/a.txt", "hi")
        .add_file("package.xml", "<p/>")
        .build()
        .expect("archive builds");

    assert_eq!(bytes, decode_hex(GOLDEN_HEX));
}

#[test]
fn builder_and_entry_list_agree() {
    let entries = vec![
        ArchiveEntry::directory("d"),
        ArchiveEntry::file("d/a.txt", "hi"),
        ArchiveEntry::file("package.xml", "<p/>"),
    ];
    assert_eq!(build(&entries).unwrap(), decode_hex(GOLDEN_HEX));
}

#[test]
fn translation_archive_is_byte_identical_across_runs() {
    let payload = translation_payload();
    let first = payload.build_archive("62.0").unwrap();
    let second = payload.build_archive("62.0").unwrap();
    assert_eq!(first, second);
}

#[test]
fn recorded_offsets_point_at_local_headers() {
    let payload = translation_payload();
    let entries = payload.archive_entries("62.0");
    let bytes = payload.build_archive("62.0").unwrap();

    let (count, central_size, central_offset, records) = read_index(&bytes);
    assert_eq!(count as usize, entries.len());
    assert_eq!(records.len(), entries.len());

    let mut running = 0usize;
    for (entry, record) in entries.iter().zip(&records) {
        assert_eq!(record.offset as usize, running, "offset of {}", entry.name);
        assert_eq!(u32_at(&bytes, running), 0x0403_4B50);
        assert_eq!(u16_at(&bytes, running + 8), 0, "stored method");
        assert_eq!(record.name, entry.name);

        let data_len = if entry.is_directory() { 0 } else { entry.bytes.len() };
        running += LOCAL_HEADER_LEN + entry.name.len() + data_len;
    }
    assert_eq!(central_offset as usize, running);

    let expected_central: usize = entries
        .iter()
        .map(|e| CENTRAL_HEADER_LEN + e.name.len())
        .sum();
    assert_eq!(central_size as usize, expected_central);
    assert_eq!(
        bytes.len(),
        running + expected_central + END_OF_CENTRAL_DIRECTORY_LEN
    );
}

#[test]
fn directory_entries_are_empty_and_flagged() {
    let bytes = ArchiveBuilder::new()
        .add(ArchiveEntry {
            name: "objectTranslations/".to_string(),
            bytes: b"ignored".to_vec(),
        })
        .add_file("objectTranslations/Account-es.objectTranslation", "<x/>")
        .build()
        .unwrap();

    let (_, _, _, records) = read_index(&bytes);
    assert_eq!(records[0].size, 0);
    assert_eq!(records[0].crc, 0);
    assert_eq!(records[0].external_attributes, 0x10);
    assert_eq!(records[1].external_attributes, 0);
    assert_eq!(records[1].crc, crc32(b"<x/>"));
    assert_eq!(records[1].size, 4);
    assert_eq!(records[1].offset as usize, LOCAL_HEADER_LEN + "objectTranslations/".len());
}
