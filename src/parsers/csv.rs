use std::borrow::Cow;

use thiserror::Error;

use super::type_conversion::{parse_float, parse_int};
use crate::record::{write_fixed, EnvironmentalRecord};

/// Number of comma-separated columns in one reading
pub const FIELD_COUNT: usize = 13;

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected 13 fields, found {found}")]
    FieldCount { found: usize },
    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Strip every whitespace character, then at most one leading and one trailing `"`.
///
/// This is intentionally not CSV unquoting: escaped quotes and delimiters inside
/// quoted fields are not recognized.
pub fn sanitize_field(raw: &str) -> Cow<'_, str> {
    let stripped: Cow<'_, str> = if raw.chars().any(is_c_space) {
        Cow::Owned(raw.chars().filter(|c| !is_c_space(*c)).collect())
    } else {
        Cow::Borrowed(raw)
    };

    let quoted_start = stripped.starts_with('"');
    let after_start = usize::from(quoted_start);
    let quoted_end = stripped.len() > after_start && stripped.ends_with('"');
    if !quoted_start && !quoted_end {
        return stripped;
    }
    let end = stripped.len() - usize::from(quoted_end);
    match stripped {
        Cow::Borrowed(s) => Cow::Borrowed(&s[after_start..end]),
        Cow::Owned(s) => Cow::Owned(s[after_start..end].to_string()),
    }
}

// Same set as C isspace() in the "C" locale
fn is_c_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

/// Decoder for the 13-column reading format
///
/// Columns: lat, lon, timestamp, pollutant, value, unit, baseline, index,
/// risk category, station, agency, station code, detailed station code.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRecordParser;

impl CsvRecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode one line into a record. Any failure rejects the whole line.
    pub fn parse_line(&self, line: &str) -> Result<EnvironmentalRecord, DecodeError> {
        let mut raw = [""; FIELD_COUNT];
        let mut found = 0;
        for piece in line.split(',') {
            if found < FIELD_COUNT {
                raw[found] = piece;
            }
            found += 1;
        }
        if found != FIELD_COUNT {
            return Err(DecodeError::FieldCount { found });
        }

        let f: Vec<Cow<'_, str>> = raw.iter().map(|r| sanitize_field(r)).collect();

        let mut record = EnvironmentalRecord {
            lat: parse_float("lat", &f[0])?,
            lon: parse_float("lon", &f[1])?,
            measured_value: parse_float("value", &f[4])?,
            baseline_value: parse_float("baseline", &f[6])?,
            air_quality_index: parse_int("index", &f[7])?,
            ..EnvironmentalRecord::default()
        };
        write_fixed(&mut record.timestamp_utc, &f[2]);
        write_fixed(&mut record.pollutant_code, &f[3]);
        write_fixed(&mut record.measurement_unit, &f[5]);
        write_fixed(&mut record.risk_category, &f[8]);
        write_fixed(&mut record.station_name, &f[9]);
        write_fixed(&mut record.agency_name, &f[10]);
        write_fixed(&mut record.station_code, &f[11]);
        write_fixed(&mut record.detailed_station_code, &f[12]);

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::read_fixed;
    use proptest::prelude::*;

    const SAMPLE: &str = r#""34.0522","-118.2437","2020-08-14T10:00:00Z","PM2.5","12.3","UG/M3","12.1","51","2","Los Angeles - N. Main","South Coast AQMD","060370016","840060370016""#;

    #[test]
    fn test_sanitize_strips_whitespace_and_single_quotes() {
        assert_eq!(sanitize_field(" \"abc\" "), "abc");
        assert_eq!(sanitize_field("a b\tc"), "abc");
        assert_eq!(sanitize_field("\"\"x\"\""), "\"x\"");
        assert_eq!(sanitize_field("plain"), "plain");
        assert_eq!(sanitize_field("\"open"), "open");
        assert_eq!(sanitize_field("close\""), "close");
    }

    #[test]
    fn test_sanitize_single_quote_char() {
        assert_eq!(sanitize_field("\""), "");
        assert_eq!(sanitize_field(""), "");
    }

    #[test]
    fn test_parse_line_full_record() {
        let record = CsvRecordParser::new().parse_line(SAMPLE).unwrap();
        assert_eq!(record.lat, 34.0522);
        assert_eq!(record.lon, -118.2437);
        assert_eq!(record.timestamp(), "2020-08-14T10:00:00");
        assert_eq!(read_fixed(&record.pollutant_code), "PM2.5");
        assert_eq!(record.measured_value, 12.3);
        assert_eq!(read_fixed(&record.measurement_unit), "UG/M3");
        assert_eq!(record.baseline_value, 12.1);
        assert_eq!(record.air_quality_index, 51);
        assert_eq!(read_fixed(&record.risk_category), "2");
        // whitespace inside values is stripped as well
        assert_eq!(read_fixed(&record.station_name), "LosAngeles-N.Main");
        assert_eq!(read_fixed(&record.agency_name), "SouthCoastAQMD");
        assert_eq!(read_fixed(&record.station_code), "060370016");
        assert_eq!(read_fixed(&record.detailed_station_code), "840060370016");
        assert_eq!(record.day(), Some("2020-08-14"));
        assert_eq!(record.hour(), Some(10));
    }

    #[test]
    fn test_parse_line_too_few_fields() {
        let err = CsvRecordParser::new()
            .parse_line("1.0,2.0,2024-01-01T00:00:00Z")
            .unwrap_err();
        assert_eq!(err, DecodeError::FieldCount { found: 3 });
    }

    #[test]
    fn test_parse_line_too_many_fields() {
        let line = format!("{},extra", SAMPLE);
        let err = CsvRecordParser::new().parse_line(&line).unwrap_err();
        assert_eq!(err, DecodeError::FieldCount { found: 14 });
    }

    #[test]
    fn test_quoted_comma_is_not_supported() {
        // The embedded comma splits the station name into two fields
        let line = r#"1,2,2024-01-01T00:00:00Z,O3,1,PPB,1,10,1,"Main St, North",Agency,A,B"#;
        let err = CsvRecordParser::new().parse_line(line).unwrap_err();
        assert_eq!(err, DecodeError::FieldCount { found: 14 });
    }

    #[test]
    fn test_parse_line_non_numeric_latitude() {
        let line = SAMPLE.replacen("34.0522", "north", 1);
        let err = CsvRecordParser::new().parse_line(&line).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidNumber {
                field: "lat",
                value: "north".to_string()
            }
        );
    }

    #[test]
    fn test_parse_line_bad_index() {
        let line = SAMPLE.replacen("\"51\"", "\"n/a\"", 1);
        assert!(matches!(
            CsvRecordParser::new().parse_line(&line),
            Err(DecodeError::InvalidNumber { field: "index", .. })
        ));
    }

    #[test]
    fn test_parse_line_with_crlf() {
        let line = format!("{}\r", SAMPLE);
        let record = CsvRecordParser::new().parse_line(&line).unwrap();
        assert_eq!(read_fixed(&record.detailed_station_code), "840060370016");
    }

    #[test]
    fn test_long_text_fields_are_truncated() {
        let long_station = "S".repeat(250);
        let line = format!(
            "1,2,2024-01-01T00:00:00Z,O3,1,MICROGRAMS,1,10,1,{},Agency,A,B",
            long_station
        );
        let record = CsvRecordParser::new().parse_line(&line).unwrap();
        assert_eq!(read_fixed(&record.station_name).len(), 99);
        assert_eq!(read_fixed(&record.measurement_unit), "MICROGRAM");
    }

    proptest! {
        #[test]
        fn prop_numeric_fields_round_trip(
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
            value in -1.0e6f64..1.0e6,
            baseline in -1.0e6f64..1.0e6,
            index in -1000i32..1000,
        ) {
            let line = format!(
                "\"{}\",\"{}\",\"2024-03-01T12:00:00Z\",\"NO2\",\"{}\",\"PPB\",\"{}\",\"{}\",\"1\",\"S\",\"A\",\"C\",\"D\"",
                lat, lon, value, baseline, index
            );
            let record = CsvRecordParser::new().parse_line(&line).unwrap();
            prop_assert!((record.lat - lat).abs() <= f64::EPSILON * lat.abs().max(1.0));
            prop_assert!((record.lon - lon).abs() <= f64::EPSILON * lon.abs().max(1.0));
            prop_assert!((record.measured_value - value).abs() <= f64::EPSILON * value.abs().max(1.0));
            prop_assert!((record.baseline_value - baseline).abs() <= f64::EPSILON * baseline.abs().max(1.0));
            prop_assert_eq!(record.air_quality_index, index);
        }

        #[test]
        fn prop_parse_line_never_panics(line in ".{0,300}") {
            let _ = CsvRecordParser::new().parse_line(&line);
        }
    }
}
