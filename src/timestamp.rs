// Day and hour extraction from ISO-8601 reading timestamps.
//
// Only the leading characters are inspected: a timestamp contributes a day when its
// first 10 characters look like `YYYY-MM-DD`, and an hour when the two characters at
// offset 11 form an integer in 0..=23. Calendar validity is not checked.

use once_cell::sync::Lazy;
use regex::Regex;

static DAY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("day pattern is a valid regex")
});

const DAY_LEN: usize = 10;
const HOUR_OFFSET: usize = 11;

/// Calendar day prefix of a timestamp
pub fn day_of(timestamp: &[u8]) -> Option<&str> {
    let prefix = timestamp.get(..DAY_LEN)?;
    let prefix = std::str::from_utf8(prefix).ok()?;
    DAY_PATTERN.is_match(prefix).then_some(prefix)
}

/// Hour of day at offset 11 of a timestamp
pub fn hour_of(timestamp: &[u8]) -> Option<u8> {
    let digits = timestamp.get(HOUR_OFFSET..HOUR_OFFSET + 2)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let hour = (digits[0] - b'0') * 10 + (digits[1] - b'0');
    (hour <= 23).then_some(hour)
}
