//! DBF file format types and constants.
//!
//! Defines the binary layout of the dBASE III+ table header and field
//! descriptors. All multi-byte integers are little-endian.

use crate::error::{DbError, Result};
use crate::util::{read_u16_at, read_u32_at, write_u16_at, write_u32_at};

// ── Constants ──────────────────────────────────────────────────────

/// Header size in bytes (fixed).
pub const HEADER_SIZE: usize = 32;

/// Field descriptor size in bytes.
pub const DESCRIPTOR_SIZE: usize = 32;

/// Byte terminating the descriptor area.
pub const HEADER_TERMINATOR: u8 = 0x0D;

/// End-of-file marker written after the last record.
pub const EOF_MARKER: u8 = 0x1A;

/// Version byte for a plain table.
pub const VERSION_PLAIN: u8 = 0x03;

/// Version byte for a table with a memo file.
pub const VERSION_MEMO: u8 = 0x83;

/// Delete flag values: first byte of every record.
pub const FLAG_ACTIVE: u8 = 0x20;
pub const FLAG_DELETED: u8 = 0x2A;

/// Longest field name stored in a descriptor.
pub const MAX_FIELD_NAME: usize = 10;

// ── Field Type ─────────────────────────────────────────────────────

/// Field type letter stored in each descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Date,
    Logical,
    Memo,
}

impl FieldType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            b'C' => Some(Self::Character),
            b'N' => Some(Self::Numeric),
            b'D' => Some(Self::Date),
            b'L' => Some(Self::Logical),
            b'M' => Some(Self::Memo),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Character => b'C',
            Self::Numeric => b'N',
            Self::Date => b'D',
            Self::Logical => b'L',
            Self::Memo => b'M',
        }
    }
}

// ── Header ─────────────────────────────────────────────────────────

/// DBF header — exactly 32 bytes on disk.
///
/// ```text
/// Offset  Size  Field
/// 0       1     version: 0x03 plain, 0x83 with memo
/// 1       1     last update year (offset from 1900)
/// 2       1     last update month
/// 3       1     last update day
/// 4       4     record_count: u32
/// 8       2     header_size: u16 (32 + 32*fields + 1)
/// 10      2     record_size: u16 (1 + sum of field lengths)
/// 12      20    reserved: 0x00
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DbfHeader {
    pub version: u8,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub record_count: u32,
    pub header_size: u16,
    pub record_size: u16,
}

impl DbfHeader {
    /// Parse header from byte slice (>= HEADER_SIZE bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DbError::InvalidDbf("file too small for header".into()));
        }
        let header = Self {
            version: bytes[0],
            year: bytes[1],
            month: bytes[2],
            day: bytes[3],
            record_count: read_u32_at(bytes, 4),
            header_size: read_u16_at(bytes, 8),
            record_size: read_u16_at(bytes, 10),
        };
        header.validate()?;
        Ok(header)
    }

    /// Serialize header into exactly HEADER_SIZE bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.version;
        buf[1] = self.year;
        buf[2] = self.month;
        buf[3] = self.day;
        write_u32_at(&mut buf, 4, self.record_count);
        write_u16_at(&mut buf, 8, self.header_size);
        write_u16_at(&mut buf, 10, self.record_size);
        buf
    }

    /// Validate version and structural sizes.
    pub fn validate(&self) -> Result<()> {
        if self.version != VERSION_PLAIN && self.version != VERSION_MEMO {
            return Err(DbError::InvalidDbf(format!(
                "unsupported version byte 0x{:02X}",
                self.version
            )));
        }
        if (self.header_size as usize) < HEADER_SIZE + DESCRIPTOR_SIZE + 1 {
            return Err(DbError::InvalidDbf(format!(
                "header size {} too small",
                self.header_size
            )));
        }
        if (self.header_size as usize - HEADER_SIZE - 1) % DESCRIPTOR_SIZE != 0 {
            return Err(DbError::InvalidDbf(format!(
                "header size {} does not align to descriptors",
                self.header_size
            )));
        }
        if self.record_size < 2 {
            return Err(DbError::InvalidDbf(format!(
                "record size {} too small",
                self.record_size
            )));
        }
        Ok(())
    }

    /// Number of field descriptors implied by header_size.
    pub fn field_count(&self) -> usize {
        (self.header_size as usize - HEADER_SIZE - 1) / DESCRIPTOR_SIZE
    }

    /// Stamp the last-update date from today's date.
    pub fn touch(&mut self) {
        let today = crate::util::today_yyyymmdd();
        let year: i32 = today[0..4].parse().unwrap_or(1900);
        self.year = (year - 1900).clamp(0, 255) as u8;
        self.month = today[4..6].parse().unwrap_or(1);
        self.day = today[6..8].parse().unwrap_or(1);
    }
}

// ── Field Descriptor ───────────────────────────────────────────────

/// Requested field shape, as given to `Table::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ftype: FieldType,
    pub length: u8,
    pub decimals: u8,
}

impl FieldSpec {
    pub fn new(name: &str, ftype: FieldType, length: u8, decimals: u8) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            ftype,
            length,
            decimals,
        }
    }

    /// Validate and normalize per type: C 1..=254; N 1..=20; D forced to
    /// 8/0; L to 1/0; M to 10/0.
    pub fn validated(mut self) -> Result<Self> {
        if self.name.is_empty() || self.name.len() > MAX_FIELD_NAME {
            return Err(DbError::InvalidField(format!(
                "bad field name {:?}",
                self.name
            )));
        }
        let first = self.name.as_bytes()[0];
        if !(first.is_ascii_alphabetic() || first == b'_')
            || !self
                .name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(DbError::InvalidField(format!(
                "bad field name {:?}",
                self.name
            )));
        }
        match self.ftype {
            FieldType::Character => {
                if self.length == 0 || self.length == 255 {
                    return Err(DbError::InvalidField(format!(
                        "{}: character length must be 1-254",
                        self.name
                    )));
                }
                self.decimals = 0;
            }
            FieldType::Numeric => {
                if self.length == 0 || self.length > 20 {
                    return Err(DbError::InvalidField(format!(
                        "{}: numeric length must be 1-20",
                        self.name
                    )));
                }
                if self.decimals != 0 && self.decimals as u16 + 2 > self.length as u16 {
                    return Err(DbError::InvalidField(format!(
                        "{}: decimals do not fit in length {}",
                        self.name, self.length
                    )));
                }
            }
            FieldType::Date => {
                self.length = 8;
                self.decimals = 0;
            }
            FieldType::Logical => {
                self.length = 1;
                self.decimals = 0;
            }
            FieldType::Memo => {
                self.length = 10;
                self.decimals = 0;
            }
        }
        Ok(self)
    }
}

/// One field of an open table: descriptor data plus its byte offset within
/// the record buffer (computed at open, not stored on disk).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ftype: FieldType,
    pub length: u8,
    pub decimals: u8,
    pub offset: usize,
}

impl FieldDescriptor {
    /// Parse a 32-byte descriptor. `offset` is supplied by the caller,
    /// accumulated over preceding field lengths starting at 1.
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<Self> {
        if bytes.len() < DESCRIPTOR_SIZE {
            return Err(DbError::InvalidDbf("truncated field descriptor".into()));
        }
        let name_end = bytes[..MAX_FIELD_NAME + 1]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_FIELD_NAME + 1)
            .min(MAX_FIELD_NAME);
        let name = String::from_utf8_lossy(&bytes[..name_end])
            .trim_end()
            .to_ascii_uppercase();
        if name.is_empty() {
            return Err(DbError::InvalidDbf("empty field name".into()));
        }
        let ftype = FieldType::from_u8(bytes[11]).ok_or_else(|| {
            DbError::InvalidDbf(format!("unknown field type 0x{:02X}", bytes[11]))
        })?;
        Ok(Self {
            name,
            ftype,
            length: bytes[16],
            decimals: bytes[17],
            offset,
        })
    }

    /// Serialize into exactly DESCRIPTOR_SIZE bytes.
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        let name = self.name.as_bytes();
        buf[..name.len().min(MAX_FIELD_NAME)]
            .copy_from_slice(&name[..name.len().min(MAX_FIELD_NAME)]);
        buf[11] = self.ftype.as_u8();
        buf[16] = self.length;
        buf[17] = self.decimals;
        buf
    }

    pub fn from_spec(spec: &FieldSpec, offset: usize) -> Self {
        Self {
            name: spec.name.clone(),
            ftype: spec.ftype,
            length: spec.length,
            decimals: spec.decimals,
            offset,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut h = DbfHeader {
            version: VERSION_PLAIN,
            year: 124,
            month: 6,
            day: 15,
            record_count: 3,
            header_size: (32 + 32 * 2 + 1) as u16,
            record_size: 25,
        };
        h.touch();
        let buf = h.to_bytes();
        let parsed = DbfHeader::from_bytes(&buf).unwrap();
        assert_eq!(parsed.version, VERSION_PLAIN);
        assert_eq!(parsed.record_count, 3);
        assert_eq!(parsed.header_size, 97);
        assert_eq!(parsed.record_size, 25);
        assert_eq!(parsed.field_count(), 2);
    }

    #[test]
    fn test_header_rejects_bad_version() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = 0x07;
        buf[8] = 65; // header_size 65
        buf[10] = 2;
        let err = DbfHeader::from_bytes(&buf).unwrap_err();
        assert_eq!(err.code(), "INVALID_DBF");
    }

    #[test]
    fn test_header_rejects_truncated() {
        let err = DbfHeader::from_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(err.code(), "INVALID_DBF");
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let spec = FieldSpec::new("name", FieldType::Character, 20, 0)
            .validated()
            .unwrap();
        let desc = FieldDescriptor::from_spec(&spec, 1);
        let buf = desc.to_bytes();
        let parsed = FieldDescriptor::from_bytes(&buf, 1).unwrap();
        assert_eq!(parsed.name, "NAME");
        assert_eq!(parsed.ftype, FieldType::Character);
        assert_eq!(parsed.length, 20);
        assert_eq!(parsed.offset, 1);
    }

    #[test]
    fn test_descriptor_unknown_type() {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[0] = b'X';
        buf[11] = b'Q';
        let err = FieldDescriptor::from_bytes(&buf, 1).unwrap_err();
        assert_eq!(err.code(), "INVALID_DBF");
    }

    #[test]
    fn test_spec_normalization() {
        let d = FieldSpec::new("when", FieldType::Date, 3, 2).validated().unwrap();
        assert_eq!((d.length, d.decimals), (8, 0));
        let l = FieldSpec::new("ok", FieldType::Logical, 5, 1).validated().unwrap();
        assert_eq!((l.length, l.decimals), (1, 0));
        let m = FieldSpec::new("notes", FieldType::Memo, 0, 0).validated().unwrap();
        assert_eq!((m.length, m.decimals), (10, 0));
    }

    #[test]
    fn test_spec_rejects_bad_shapes() {
        assert!(FieldSpec::new("c", FieldType::Character, 0, 0).validated().is_err());
        assert!(FieldSpec::new("n", FieldType::Numeric, 21, 0).validated().is_err());
        assert!(FieldSpec::new("n", FieldType::Numeric, 5, 4).validated().is_err());
        assert!(FieldSpec::new("", FieldType::Character, 5, 0).validated().is_err());
        assert!(FieldSpec::new("BAD NAME", FieldType::Character, 5, 0).validated().is_err());
        assert!(FieldSpec::new("TOOLONGNAME", FieldType::Character, 5, 0).validated().is_err());
    }

    #[test]
    fn test_descriptor_name_uppercased() {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[..4].copy_from_slice(b"name");
        buf[11] = b'N';
        buf[16] = 5;
        let parsed = FieldDescriptor::from_bytes(&buf, 1).unwrap();
        assert_eq!(parsed.name, "NAME");
    }
}
