//! Shared low-level helpers: little-endian field access, fixed-width ASCII
//! numeric formatting, case-insensitive name matching and Julian-day
//! conversion for date arithmetic.

use chrono::{Datelike, NaiveDate};

// ── Little-Endian Field Access ─────────────────────────────────────

/// Read u16 from byte slice at offset (little-endian).
#[inline]
pub fn read_u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

/// Read u32 from byte slice at offset (little-endian).
#[inline]
pub fn read_u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

/// Write u16 into byte slice at offset (little-endian).
#[inline]
pub fn write_u16_at(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Write u32 into byte slice at offset (little-endian).
#[inline]
pub fn write_u32_at(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

// ── Name Matching ──────────────────────────────────────────────────

/// Case-insensitive ASCII equality for field and variable names.
#[inline]
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

// ── Fixed-Width Numeric Formatting ─────────────────────────────────

/// Format a number right-aligned in exactly `width` ASCII characters with
/// `decimals` fractional digits. A value wider than the field is truncated
/// on the left, keeping the rightmost `width` characters (lossy).
pub fn format_fixed(value: f64, width: usize, decimals: usize) -> String {
    let s = if decimals == 0 {
        format!("{:>width$}", value.round() as i64, width = width)
    } else {
        format!("{:>width$.decimals$}", value, width = width, decimals = decimals)
    };
    if s.len() > width {
        s[s.len() - width..].to_string()
    } else {
        s
    }
}

/// Display form of a number: integral values print without a fractional
/// part, everything else prints with its shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Parse ASCII decimal text to f64; blank or unparseable text reads as 0.
pub fn parse_number(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(0.0)
}

// ── Julian Day Conversion ──────────────────────────────────────────

/// Offset between chrono's day-from-CE serial and the Julian day number.
const JDN_CE_OFFSET: i64 = 1_721_425;

/// Convert an 8-char YYYYMMDD date string to a Julian day number.
/// Empty or malformed dates return None.
pub fn date_to_julian(yyyymmdd: &str) -> Option<i64> {
    let d = parse_yyyymmdd(yyyymmdd)?;
    Some(d.num_days_from_ce() as i64 + JDN_CE_OFFSET)
}

/// Convert a Julian day number back to an 8-char YYYYMMDD string.
pub fn julian_to_date(julian: i64) -> Option<String> {
    let days = i32::try_from(julian - JDN_CE_OFFSET).ok()?;
    let d = NaiveDate::from_num_days_from_ce_opt(days)?;
    Some(format!("{:04}{:02}{:02}", d.year(), d.month(), d.day()))
}

/// Parse an 8-char YYYYMMDD string into a NaiveDate.
pub fn parse_yyyymmdd(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = text[0..4].parse().ok()?;
    let month: u32 = text[4..6].parse().ok()?;
    let day: u32 = text[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Today's date as YYYYMMDD.
pub fn today_yyyymmdd() -> String {
    let d = chrono::Local::now().date_naive();
    format!("{:04}{:02}{:02}", d.year(), d.month(), d.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_roundtrip() {
        let mut buf = [0u8; 8];
        write_u16_at(&mut buf, 1, 0xBEEF);
        write_u32_at(&mut buf, 3, 0xCAFE_F00D);
        assert_eq!(read_u16_at(&buf, 1), 0xBEEF);
        assert_eq!(read_u32_at(&buf, 3), 0xCAFE_F00D);
    }

    #[test]
    fn test_names_equal_ignores_case() {
        assert!(names_equal("name", "NAME"));
        assert!(names_equal("Last_Name", "LAST_NAME"));
        assert!(!names_equal("NAME", "NAMES"));
    }

    #[test]
    fn test_format_fixed_right_aligned() {
        assert_eq!(format_fixed(25.0, 3, 0), " 25");
        assert_eq!(format_fixed(3.5, 6, 2), "  3.50");
        assert_eq!(format_fixed(-7.0, 4, 0), "  -7");
    }

    #[test]
    fn test_format_fixed_truncates_left_on_overflow() {
        // 12345 in a 3-wide field keeps the rightmost 3 digits
        assert_eq!(format_fixed(12345.0, 3, 0), "345");
    }

    #[test]
    fn test_format_number_drops_integral_fraction() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_parse_number_blank_is_zero() {
        assert_eq!(parse_number("   "), 0.0);
        assert_eq!(parse_number(" 25 "), 25.0);
        assert_eq!(parse_number("x"), 0.0);
    }

    #[test]
    fn test_julian_roundtrip() {
        let j = date_to_julian("20240131").unwrap();
        assert_eq!(julian_to_date(j).unwrap(), "20240131");
        assert_eq!(julian_to_date(j + 1).unwrap(), "20240201");
    }

    #[test]
    fn test_julian_known_value() {
        // 2000-01-01 is JDN 2451545 (at noon; civil-date convention here)
        assert_eq!(date_to_julian("20000101").unwrap(), 2_451_545);
    }

    #[test]
    fn test_julian_day_difference_across_leap() {
        let a = date_to_julian("20240301").unwrap();
        let b = date_to_julian("20240229").unwrap();
        assert_eq!(a - b, 1);
    }

    #[test]
    fn test_bad_dates_rejected() {
        assert!(date_to_julian("").is_none());
        assert!(date_to_julian("2024013").is_none());
        assert!(date_to_julian("20241301").is_none());
        assert!(date_to_julian("2024AB01").is_none());
    }
}
