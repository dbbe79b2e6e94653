//! Per-field value extraction from a decoded record buffer.
//!
//! Each extractor is bound to a byte offset (and sometimes a field length) at
//! schema-compile time and thereafter only reads from the record buffer handed
//! to it by [`crate::decode::reader::Reader`]. None of them touch the byte
//! source.

use time::macros::{datetime, format_description};
use time::PrimitiveDateTime;

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");
const DATE_TIME_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

fn fallback_datetime() -> PrimitiveDateTime {
    datetime!(0001-01-01 0:00)
}

/// Extracts `bool` fields: one byte, `0`/`1` for value, `2` for null.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoolExtractor {
    pub start: usize,
}

impl BoolExtractor {
    pub fn extract(&self, buf: &[u8]) -> (bool, bool) {
        match buf[self.start] {
            2 => (false, true),
            v => (v == 1, false),
        }
    }
}

/// Extracts `byte` fields: one value byte followed by a null-flag byte.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteExtractor {
    pub start: usize,
}

impl ByteExtractor {
    pub fn extract(&self, buf: &[u8]) -> (u8, bool) {
        if buf[self.start + 1] == 1 {
            (0, true)
        } else {
            (buf[self.start], false)
        }
    }
}

/// Extracts the three integer kinds (`Int16`/`Int32`/`Int64`), all widened to `i64`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Int64Extractor {
    Int16 { start: usize },
    Int32 { start: usize },
    Int64 { start: usize },
}

impl Int64Extractor {
    pub fn extract(&self, buf: &[u8]) -> (i64, bool) {
        match *self {
            Int64Extractor::Int16 { start } => {
                if buf[start + 2] == 1 {
                    (0, true)
                } else {
                    (u16::from_le_bytes([buf[start], buf[start + 1]]) as i64, false)
                }
            }
            Int64Extractor::Int32 { start } => {
                if buf[start + 4] == 1 {
                    (0, true)
                } else {
                    let bytes = [buf[start], buf[start + 1], buf[start + 2], buf[start + 3]];
                    (u32::from_le_bytes(bytes) as i64, false)
                }
            }
            Int64Extractor::Int64 { start } => {
                if buf[start + 8] == 1 {
                    (0, true)
                } else {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&buf[start..start + 8]);
                    (u64::from_le_bytes(bytes) as i64, false)
                }
            }
        }
    }
}

/// Extracts `Float`/`Double`/`FixedDecimal` fields, all widened to `f64`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Float64Extractor {
    Float { start: usize },
    Double { start: usize },
    FixedDecimal { start: usize, field_length: usize },
}

impl Float64Extractor {
    pub fn extract(&self, buf: &[u8]) -> (f64, bool) {
        match *self {
            Float64Extractor::Float { start } => {
                if buf[start + 4] == 1 {
                    (0.0, true)
                } else {
                    let bytes = [buf[start], buf[start + 1], buf[start + 2], buf[start + 3]];
                    (f32::from_le_bytes(bytes) as f64, false)
                }
            }
            Float64Extractor::Double { start } => {
                if buf[start + 8] == 1 {
                    (0.0, true)
                } else {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&buf[start..start + 8]);
                    (f64::from_le_bytes(bytes), false)
                }
            }
            Float64Extractor::FixedDecimal {
                start,
                field_length,
            } => {
                if buf[start + field_length] == 1 {
                    (0.0, true)
                } else {
                    let text = fixed_string(buf, start, field_length, 1);
                    (text.parse::<f64>().unwrap_or(0.0), false)
                }
            }
        }
    }
}

/// Extracts `Date`/`DateTime` fields as a [`PrimitiveDateTime`].
///
/// Parse failures on a non-null value are tolerated: the epoch is returned rather
/// than an error, matching the permissive behavior relied on by existing files.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TimeExtractor {
    Date { start: usize },
    DateTime { start: usize },
}

impl TimeExtractor {
    pub fn extract(&self, buf: &[u8]) -> (PrimitiveDateTime, bool) {
        match *self {
            TimeExtractor::Date { start } => {
                if buf[start + 10] == 1 {
                    (fallback_datetime(), true)
                } else {
                    let text = std::str::from_utf8(&buf[start..start + 10]).unwrap_or("");
                    let value = time::Date::parse(text, DATE_FORMAT)
                        .ok()
                        .and_then(|d| d.with_hms(0, 0, 0).ok())
                        .unwrap_or_else(fallback_datetime);
                    (value, false)
                }
            }
            TimeExtractor::DateTime { start } => {
                if buf[start + 19] == 1 {
                    (fallback_datetime(), true)
                } else {
                    let text = std::str::from_utf8(&buf[start..start + 19]).unwrap_or("");
                    let value = PrimitiveDateTime::parse(text, DATE_TIME_FORMAT)
                        .unwrap_or_else(|_| fallback_datetime());
                    (value, false)
                }
            }
        }
    }
}

/// Extracts `String`/`WString`/`V_String`/`V_WString` fields as an owned `String`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StringExtractor {
    Fixed { start: usize, field_length: usize },
    WString { start: usize, field_length: usize },
    VString { start: usize },
    VWString { start: usize },
}

impl StringExtractor {
    pub fn extract(&self, buf: &[u8]) -> (String, bool) {
        match *self {
            StringExtractor::Fixed {
                start,
                field_length,
            } => {
                if buf[start + field_length] == 1 {
                    (String::new(), true)
                } else {
                    (fixed_string(buf, start, field_length, 1), false)
                }
            }
            StringExtractor::WString {
                start,
                field_length,
            } => {
                if buf[start + field_length * 2] == 1 {
                    (String::new(), true)
                } else {
                    (fixed_string(buf, start, field_length, 2), false)
                }
            }
            StringExtractor::VString { start } => match parse_blob(buf, start) {
                None => (String::new(), true),
                Some(bytes) => (String::from_utf8_lossy(bytes).into_owned(), false),
            },
            StringExtractor::VWString { start } => match parse_blob(buf, start) {
                None => (String::new(), true),
                Some(bytes) if bytes.is_empty() => (String::new(), false),
                Some(bytes) => (decode_utf16_field(bytes), false),
            },
        }
    }
}

/// Extracts `Blob`/`SpatialObj` fields as a borrowed byte slice. `None` means null;
/// `Some(&[])` means an explicitly empty (non-null) value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlobExtractor {
    pub start: usize,
}

impl BlobExtractor {
    pub fn extract<'a>(&self, buf: &'a [u8]) -> Option<&'a [u8]> {
        parse_blob(buf, self.start)
    }
}

/// Reads an ASCII or UTF-16LE fixed-width string, stopping at the first all-zero
/// code unit. If no terminator is found, the full `field_length` is returned.
fn fixed_string(buf: &[u8], start: usize, field_length: usize, char_size: usize) -> String {
    let field_to = start + field_length * char_size;
    let mut str_len = 0usize;
    let mut i = start;
    while i < field_to {
        if buf[i] == 0 && buf[i + char_size - 1] == 0 {
            break;
        }
        str_len += 1;
        i += char_size;
    }
    if str_len == 0 {
        return String::new();
    }
    if char_size == 1 {
        let end = start + str_len;
        String::from_utf8_lossy(&buf[start..end]).into_owned()
    } else {
        let end = start + str_len * 2;
        decode_utf16_field(&buf[start..end])
    }
}

fn decode_utf16_field(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Resolves the 4-byte variable-length descriptor at `start` into the referenced
/// byte slice, per the tiny/small/normal block layouts. `None` means null.
fn parse_blob(buf: &[u8], start: usize) -> Option<&[u8]> {
    let descriptor =
        u32::from_le_bytes([buf[start], buf[start + 1], buf[start + 2], buf[start + 3]]);
    if descriptor == 0 {
        return Some(&[]);
    }
    if descriptor == 1 {
        return None;
    }
    if is_tiny(descriptor) {
        let length = (descriptor >> 28) as usize;
        return Some(&buf[start..start + length]);
    }

    let block_start = start + (descriptor & 0x7fff_ffff) as usize;
    let block_first_byte = buf[block_start];
    if is_small_block(block_first_byte) {
        Some(get_small_blob(buf, block_start))
    } else {
        Some(get_normal_blob(buf, block_start))
    }
}

fn is_tiny(descriptor: u32) -> bool {
    let bit_check1 = descriptor & 0x8000_0000;
    let bit_check2 = descriptor & 0x3000_0000;
    bit_check1 == 0 && bit_check2 != 0
}

fn is_small_block(value: u8) -> bool {
    value & 1 == 1
}

fn get_small_blob(buf: &[u8], block_start: usize) -> &[u8] {
    let blob_len = (buf[block_start] >> 1) as usize;
    let blob_start = block_start + 1;
    &buf[blob_start..blob_start + blob_len]
}

fn get_normal_blob(buf: &[u8], block_start: usize) -> &[u8] {
    let prefix = u32::from_le_bytes([
        buf[block_start],
        buf[block_start + 1],
        buf[block_start + 2],
        buf[block_start + 3],
    ]);
    let blob_len = (prefix / 2) as usize;
    let blob_start = block_start + 4;
    &buf[blob_start..blob_start + blob_len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn extracts_int16() {
        let extractor = Int64Extractor::Int16 { start: 2 };
        let (value, is_null) = extractor.extract(&[0, 0, 10, 0, 0, 0]);
        assert_eq!((value, is_null), (10, false));
    }

    #[test]
    fn extracts_null_int16() {
        let extractor = Int64Extractor::Int16 { start: 2 };
        let (value, is_null) = extractor.extract(&[0, 0, 10, 0, 1, 0]);
        assert_eq!((value, is_null), (0, true));
    }

    #[rstest]
    #[case::zero_value(0u8, false, 0)]
    #[case::one_value(1u8, false, 1)]
    #[case::null_value(2u8, true, 0)]
    fn extracts_bool(#[case] byte: u8, #[case] expect_null: bool, #[case] expect_value: u8) {
        let extractor = BoolExtractor { start: 0 };
        let (value, is_null) = extractor.extract(&[byte]);
        assert_eq!(is_null, expect_null);
        assert_eq!(value, expect_value == 1);
    }

    #[test]
    fn blob_descriptor_empty_is_not_null() {
        let buf = [0u8, 0, 0, 0];
        let extractor = BlobExtractor { start: 0 };
        assert_eq!(extractor.extract(&buf), Some(&b""[..]));
    }

    #[test]
    fn blob_descriptor_one_is_null() {
        let buf = [1u8, 0, 0, 0];
        let extractor = BlobExtractor { start: 0 };
        assert_eq!(extractor.extract(&buf), None);
    }

    #[test]
    fn blob_descriptor_tiny_inline() {
        let descriptor: u32 = 0x2000_0042;
        let buf = descriptor.to_le_bytes().to_vec();
        let extractor = BlobExtractor { start: 0 };
        assert_eq!(extractor.extract(&buf), Some(&[0x42u8, 0x00][..]));
    }

    #[test]
    fn blob_descriptor_small_block() {
        // descriptor points at offset 4 relative to start=0
        let mut buf = vec![4u8, 0, 0, 0];
        // small block: first byte odd => length = byte >> 1
        buf.push((3u8 << 1) | 1);
        buf.extend_from_slice(b"abc");
        let extractor = BlobExtractor { start: 0 };
        assert_eq!(extractor.extract(&buf), Some(&b"abc"[..]));
    }

    #[test]
    fn blob_descriptor_normal_block() {
        let mut buf = vec![4u8, 0, 0, 0];
        buf.extend_from_slice(&(6u32).to_le_bytes()); // length*2 = 6 -> length 3
        buf.extend_from_slice(b"xyz");
        let extractor = BlobExtractor { start: 0 };
        assert_eq!(extractor.extract(&buf), Some(&b"xyz"[..]));
    }

    #[test]
    fn fixed_string_without_terminator_returns_full_length() {
        let buf = b"abcd".to_vec();
        let s = fixed_string(&buf, 0, 4, 1);
        assert_eq!(s, "abcd");
    }

    #[test]
    fn fixed_string_stops_at_terminator() {
        let mut buf = b"ab".to_vec();
        buf.extend_from_slice(&[0, 0]);
        let s = fixed_string(&buf, 0, 4, 1);
        assert_eq!(s, "ab");
    }

    #[test]
    fn fixed_decimal_swallows_parse_errors() {
        let extractor = Float64Extractor::FixedDecimal {
            start: 0,
            field_length: 3,
        };
        let mut buf = b"abc".to_vec();
        buf.push(0); // not null
        let (value, is_null) = extractor.extract(&buf);
        assert_eq!((value, is_null), (0.0, false));
    }
}
