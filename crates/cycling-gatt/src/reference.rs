//! Expected catalog listing for the Cycling Power profile.
//!
//! Both tables describe the same listing. The checksum table is what bring-up compares
//! against; the text table exists for debugging a mismatch by eye. Any change to the
//! provisioned profile must be mirrored here.

use crate::comparator::ReferenceTable;

pub const EXPECTED_GATT_LINES: [&str; 5] = [
    "ID=01,UUID=0x1818",
    "  ID=01,UUID=0x2A65,PROPERTIES=0x02,MIN_LEN=4,MAX_LEN=4,DATATYPE=0,VALUE=0",
    "  ID=02,UUID=0x2A63,PROPERTIES=0x10,MIN_LEN=6,MAX_LEN=6,DATATYPE=0,VALUE=00-00-00-00-00-00",
    "  ID=03,UUID=0x2A5D,PROPERTIES=0x02,MIN_LEN=1,MAX_LEN=1,DATATYPE=0,VALUE=0",
    "OK",
];

pub const EXPECTED_GATT_FLETCHER16: [u16; 5] = [0xAC45, 0x389C, 0x228F, 0x39A6, 0xE99A];

pub const EXPECTED_GATT_LINE_COUNT: usize = EXPECTED_GATT_FLETCHER16.len();

pub fn expected_checksums() -> ReferenceTable<'static> {
    ReferenceTable::Checksums(&EXPECTED_GATT_FLETCHER16)
}

pub fn expected_text() -> ReferenceTable<'static> {
    ReferenceTable::TextLines(&EXPECTED_GATT_LINES)
}
