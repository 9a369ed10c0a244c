//! Line codec for `<key>:<value>` records
//!
//! A record line is a decimal `u64` key, the first `:` on the line, and the
//! rest of the line taken verbatim as the value. Values may contain further
//! `:` characters and need not be UTF-8; they never contain a newline since
//! input is split on `\n`.

use crate::error::{SortError, SortResult};
use std::io::{self, Write};

/// Separates the key from the value
pub const DELIMITER: u8 = b':';

/// One parsed key-value line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: u64,
    pub value: Vec<u8>,
    /// Position among all parsed records of the input; breaks key ties
    pub origin_index: u64,
}

impl Record {
    pub fn new(key: u64, value: impl Into<Vec<u8>>, origin_index: u64) -> Self {
        Self {
            key,
            value: value.into(),
            origin_index,
        }
    }

    /// Parse a line (without its trailing newline) into a record.
    ///
    /// Fails when the line has no delimiter, or when the text before it is
    /// empty, contains anything but ASCII digits, or overflows `u64`.
    pub fn parse(line: &[u8], origin_index: u64) -> SortResult<Self> {
        let colon = line
            .iter()
            .position(|&b| b == DELIMITER)
            .ok_or_else(|| SortError::malformed_record("missing ':' delimiter"))?;

        let key = parse_key(&line[..colon])?;

        Ok(Self {
            key,
            value: line[colon + 1..].to_vec(),
            origin_index,
        })
    }

    /// Serialized form without the line terminator
    pub fn format(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(20 + 1 + self.value.len());
        line.extend_from_slice(self.key.to_string().as_bytes());
        line.push(DELIMITER);
        line.extend_from_slice(&self.value);
        line
    }

    /// Write `<key>:<value>\n`
    #[inline]
    pub fn write_line<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "{}", self.key)?;
        writer.write_all(&[DELIMITER])?;
        writer.write_all(&self.value)?;
        writer.write_all(b"\n")
    }

    /// Total order used by run sorting and merging
    #[inline]
    pub fn sort_key(&self) -> (u64, u64) {
        (self.key, self.origin_index)
    }
}

fn parse_key(bytes: &[u8]) -> SortResult<u64> {
    if bytes.is_empty() {
        return Err(SortError::malformed_record("empty key"));
    }

    // `u64::from_str` would also take a leading '+', which is not a valid key
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(SortError::malformed_record(format!(
            "invalid key '{}'",
            String::from_utf8_lossy(bytes)
        )));
    }

    bytes.iter().try_fold(0u64, |acc, &digit| {
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(u64::from(digit - b'0')))
            .ok_or_else(|| {
                SortError::malformed_record(format!(
                    "key '{}' out of range",
                    String::from_utf8_lossy(bytes)
                ))
            })
    })
}

/// Strip a single trailing `\n` left by `read_until`
#[inline]
pub fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_record() {
        let record = Record::parse(b"42:hello", 7).expect("valid record");
        assert_eq!(record.key, 42);
        assert_eq!(record.value, b"hello");
        assert_eq!(record.origin_index, 7);
    }

    #[test]
    fn test_parse_splits_on_first_delimiter() {
        let record = Record::parse(b"1:a:b:c", 0).expect("valid record");
        assert_eq!(record.key, 1);
        assert_eq!(record.value, b"a:b:c");
    }

    #[test]
    fn test_parse_empty_value() {
        let record = Record::parse(b"9:", 0).expect("valid record");
        assert_eq!(record.key, 9);
        assert!(record.value.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in [
            &b"xyz"[..],
            &b""[..],
            &b":value"[..],
            &b"12a:value"[..],
            &b"+5:value"[..],
            &b"-5:value"[..],
            &b" 5:value"[..],
            &b"18446744073709551616:overflow"[..],
        ] {
            let err = Record::parse(line, 0).expect_err("line should be rejected");
            assert!(err.is_malformed_record(), "{err}");
        }
    }

    #[test]
    fn test_parse_max_key() {
        let record = Record::parse(b"18446744073709551615:max", 0).expect("u64::MAX fits");
        assert_eq!(record.key, u64::MAX);
    }

    #[test]
    fn test_parse_keeps_non_utf8_value() {
        let record = Record::parse(b"3:\xff\xfe", 0).expect("value is not validated");
        assert_eq!(record.value, vec![0xff, 0xfe]);
    }

    #[test]
    fn test_format_round_trip() {
        let original = Record::new(1234, "some:value with spaces", 99);
        let reparsed = Record::parse(&original.format(), 0).expect("formatted line parses");
        assert_eq!(reparsed.key, original.key);
        assert_eq!(reparsed.value, original.value);
    }

    #[test]
    fn test_write_line_appends_newline() {
        let mut out: Vec<u8> = Vec::new();
        Record::new(5, "a", 0)
            .write_line(&mut out)
            .expect("write to vec");
        Record::new(3, "", 1)
            .write_line(&mut out)
            .expect("write to vec");
        assert_eq!(out, b"5:a\n3:\n");
    }

    #[test]
    fn test_leading_zeros_are_normalized() {
        let record = Record::parse(b"007:bond", 0).expect("leading zeros are digits");
        assert_eq!(record.format(), b"7:bond");
    }

    #[test]
    fn test_trim_newline() {
        assert_eq!(trim_newline(b"1:a\n"), b"1:a");
        assert_eq!(trim_newline(b"1:a"), b"1:a");
        assert_eq!(trim_newline(b"1:a\r\n"), b"1:a\r");
    }
}
