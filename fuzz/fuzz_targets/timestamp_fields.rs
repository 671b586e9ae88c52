#![no_main]

use aqstore::timestamp::{day_of, hour_of};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(day) = day_of(data) {
        assert_eq!(day.len(), 10);
    }
    if let Some(hour) = hour_of(data) {
        assert!(hour <= 23);
    }
});
