#![no_main]

use aqstore::record::{read_fixed, STATION_NAME_WIDTH};
use aqstore::CsvRecordParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Rejections are fine; we only care about panics or UB.
        if let Ok(record) = CsvRecordParser::new().parse_line(input) {
            assert!(read_fixed(&record.station_name).len() < STATION_NAME_WIDTH);
            let _ = record.day();
            let _ = record.hour();
        }
    }
});
