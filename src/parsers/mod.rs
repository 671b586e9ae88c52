pub mod csv;
pub mod type_conversion;

pub use csv::{sanitize_field, CsvRecordParser, DecodeError, FIELD_COUNT};
