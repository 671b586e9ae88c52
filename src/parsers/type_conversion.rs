//! Numeric conversion of sanitized CSV fields

use super::csv::DecodeError;

/// Parse a floating point column
pub fn parse_float(field: &'static str, value: &str) -> Result<f64, DecodeError> {
    value.parse::<f64>().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parse an integer column
pub fn parse_int(field: &'static str, value: &str) -> Result<i32, DecodeError> {
    value.parse::<i32>().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("lat", "34.0522").unwrap(), 34.0522);
        assert_eq!(parse_float("lon", "-118.25").unwrap(), -118.25);
        assert_eq!(parse_float("value", "1e3").unwrap(), 1000.0);
    }

    #[test]
    fn test_parse_float_rejects_text() {
        let err = parse_float("lat", "north").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidNumber {
                field: "lat",
                value: "north".to_string()
            }
        );
        assert!(parse_float("lat", "").is_err());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("index", "-999").unwrap(), -999);
        assert_eq!(parse_int("index", "42").unwrap(), 42);
        assert!(parse_int("index", "42.5").is_err());
        assert!(parse_int("index", "abc").is_err());
    }
}
