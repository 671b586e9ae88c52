//! Fixed-layout environmental reading
//!
//! `EnvironmentalRecord` is the unit stored in the shared region. Its layout is a
//! binary contract between the ingesting and the analyzing process, so every
//! field has a width known at compile time and the struct is `#[repr(C)]`.

use std::borrow::Cow;

use crate::timestamp;

/// Sentinel for "no reading" in `air_quality_index`
pub const MISSING_AQI: i32 = -999;

pub const TIMESTAMP_WIDTH: usize = 20;
pub const POLLUTANT_WIDTH: usize = 20;
pub const UNIT_WIDTH: usize = 10;
pub const RISK_CATEGORY_WIDTH: usize = 50;
pub const STATION_NAME_WIDTH: usize = 100;
pub const AGENCY_NAME_WIDTH: usize = 100;
pub const STATION_CODE_WIDTH: usize = 20;
pub const DETAILED_STATION_CODE_WIDTH: usize = 20;

/// One sensor reading
#[repr(C)]
#[derive(Clone, Copy, PartialEq)]
pub struct EnvironmentalRecord {
    pub lat: f64,
    pub lon: f64,
    pub timestamp_utc: [u8; TIMESTAMP_WIDTH],
    pub pollutant_code: [u8; POLLUTANT_WIDTH],
    pub measured_value: f64,
    pub measurement_unit: [u8; UNIT_WIDTH],
    pub baseline_value: f64,
    pub air_quality_index: i32,
    pub risk_category: [u8; RISK_CATEGORY_WIDTH],
    pub station_name: [u8; STATION_NAME_WIDTH],
    pub agency_name: [u8; AGENCY_NAME_WIDTH],
    pub station_code: [u8; STATION_CODE_WIDTH],
    pub detailed_station_code: [u8; DETAILED_STATION_CODE_WIDTH],
}

/// Size of one record slot in the shared region
pub const RECORD_SIZE: usize = std::mem::size_of::<EnvironmentalRecord>();

const _: () = assert!(RECORD_SIZE == 384);
const _: () = assert!(std::mem::align_of::<EnvironmentalRecord>() == 8);

impl Default for EnvironmentalRecord {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            timestamp_utc: [0; TIMESTAMP_WIDTH],
            pollutant_code: [0; POLLUTANT_WIDTH],
            measured_value: 0.0,
            measurement_unit: [0; UNIT_WIDTH],
            baseline_value: 0.0,
            air_quality_index: MISSING_AQI,
            risk_category: [0; RISK_CATEGORY_WIDTH],
            station_name: [0; STATION_NAME_WIDTH],
            agency_name: [0; AGENCY_NAME_WIDTH],
            station_code: [0; STATION_CODE_WIDTH],
            detailed_station_code: [0; DETAILED_STATION_CODE_WIDTH],
        }
    }
}

impl std::fmt::Debug for EnvironmentalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentalRecord")
            .field("lat", &self.lat)
            .field("lon", &self.lon)
            .field("timestamp_utc", &self.timestamp())
            .field("pollutant_code", &read_fixed(&self.pollutant_code))
            .field("measured_value", &self.measured_value)
            .field("measurement_unit", &read_fixed(&self.measurement_unit))
            .field("baseline_value", &self.baseline_value)
            .field("air_quality_index", &self.air_quality_index)
            .field("risk_category", &read_fixed(&self.risk_category))
            .field("station_name", &read_fixed(&self.station_name))
            .field("agency_name", &read_fixed(&self.agency_name))
            .field("station_code", &read_fixed(&self.station_code))
            .field(
                "detailed_station_code",
                &read_fixed(&self.detailed_station_code),
            )
            .finish()
    }
}

impl EnvironmentalRecord {
    pub fn timestamp(&self) -> Cow<'_, str> {
        read_fixed(&self.timestamp_utc)
    }

    /// Calendar day (`YYYY-MM-DD`) of the reading, if the timestamp carries one
    pub fn day(&self) -> Option<&str> {
        timestamp::day_of(fixed_bytes(&self.timestamp_utc))
    }

    /// Hour of day (0-23), if derivable from the timestamp
    pub fn hour(&self) -> Option<u8> {
        timestamp::hour_of(fixed_bytes(&self.timestamp_utc))
    }

    /// The AQI value, or `None` for the missing-reading sentinel
    pub fn aqi(&self) -> Option<i32> {
        (self.air_quality_index != MISSING_AQI).then_some(self.air_quality_index)
    }

    /// All string fields in column order, for dumping
    pub fn text_fields(&self) -> [Cow<'_, str>; 8] {
        [
            self.timestamp(),
            read_fixed(&self.pollutant_code),
            read_fixed(&self.measurement_unit),
            read_fixed(&self.risk_category),
            read_fixed(&self.station_name),
            read_fixed(&self.agency_name),
            read_fixed(&self.station_code),
            read_fixed(&self.detailed_station_code),
        ]
    }
}

/// Copy `value` into a fixed-width field.
///
/// At most `N - 1` bytes are kept so the field is always NUL-terminated; the cut
/// never splits a UTF-8 character. Remaining bytes are zeroed.
pub fn write_fixed<const N: usize>(dest: &mut [u8; N], value: &str) {
    let mut len = value.len().min(N.saturating_sub(1));
    while len > 0 && !value.is_char_boundary(len) {
        len -= 1;
    }
    dest.fill(0);
    dest[..len].copy_from_slice(&value.as_bytes()[..len]);
}

/// Bytes of a fixed-width field up to its terminator
pub fn fixed_bytes(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Read a fixed-width field back as text
pub fn read_fixed(field: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(fixed_bytes(field))
}
