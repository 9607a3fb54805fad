//! Table handle over a DBF file.
//!
//! One `Table` owns the file descriptor, the field table and a single
//! full-record buffer. Field writes mark the buffer dirty; navigating away
//! from the record flushes it. Record numbers are 1-based; 0 is
//! before-first (BOF) and `record_count + 1` is past-last (EOF).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dbf::header::{
    DbfHeader, FieldDescriptor, FieldSpec, FieldType, DESCRIPTOR_SIZE, EOF_MARKER, FLAG_ACTIVE,
    FLAG_DELETED, HEADER_SIZE, HEADER_TERMINATOR, VERSION_PLAIN,
};
use crate::error::{DbError, Result};
use crate::util;
use crate::value::Value;

// ── Table Handle ───────────────────────────────────────────────────

/// An open DBF table.
#[derive(Debug)]
pub struct Table {
    file: File,
    path: PathBuf,
    read_only: bool,
    header: DbfHeader,
    fields: Vec<FieldDescriptor>,
    /// Current record buffer (delete flag + field bytes).
    buffer: Vec<u8>,
    /// 1-based current record; 0 at BOF, record_count+1 past the end.
    recno: u32,
    bof: bool,
    eof: bool,
    dirty: bool,
}

impl Table {
    // ── Open / Create / Close ──────────────────────────────────────

    /// Open an existing table. Validates the header, builds the field
    /// table with computed offsets, and positions at record 1 (BOF+EOF
    /// when the table is empty).
    pub fn open(path: &Path, read_only: bool) -> Result<Table> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    DbError::FileNotFound(path.display().to_string())
                }
                _ => DbError::FileRead(format!("{}: {}", path.display(), e)),
            })?;

        let mut head = [0u8; HEADER_SIZE];
        file.read_exact(&mut head)
            .map_err(|e| DbError::InvalidDbf(format!("{}: {}", path.display(), e)))?;
        let header = DbfHeader::from_bytes(&head)?;

        let mut fields = Vec::with_capacity(header.field_count());
        let mut offset = 1usize;
        let mut desc = [0u8; DESCRIPTOR_SIZE];
        for _ in 0..header.field_count() {
            file.read_exact(&mut desc)
                .map_err(|e| DbError::InvalidDbf(format!("truncated descriptors: {}", e)))?;
            let field = FieldDescriptor::from_bytes(&desc, offset)?;
            offset += field.length as usize;
            fields.push(field);
        }
        if offset != header.record_size as usize {
            return Err(DbError::InvalidDbf(format!(
                "record size {} does not match field lengths (expected {})",
                header.record_size, offset
            )));
        }

        let mut term = [0u8; 1];
        file.read_exact(&mut term)
            .map_err(|e| DbError::InvalidDbf(format!("missing header terminator: {}", e)))?;
        if term[0] != HEADER_TERMINATOR {
            return Err(DbError::InvalidDbf(format!(
                "bad header terminator 0x{:02X}",
                term[0]
            )));
        }

        let file_len = file
            .metadata()
            .map_err(|e| DbError::FileRead(e.to_string()))?
            .len();
        let needed = header.header_size as u64
            + header.record_size as u64 * header.record_count as u64
            + 1;
        if file_len < needed {
            return Err(DbError::InvalidDbf(format!(
                "file length {} below {} required by header",
                file_len, needed
            )));
        }

        debug!(
            path = %path.display(),
            records = header.record_count,
            fields = fields.len(),
            read_only,
            "opened table"
        );

        let mut table = Table {
            file,
            path: path.to_path_buf(),
            read_only,
            header,
            fields,
            buffer: Vec::new(),
            recno: 0,
            bof: true,
            eof: true,
            dirty: false,
        };
        table.buffer = table.blank_record();
        table.goto(1)?;
        Ok(table)
    }

    /// Create a new table file with the given fields, then open it
    /// read-write positioned at BOF+EOF.
    pub fn create(path: &Path, specs: &[FieldSpec]) -> Result<Table> {
        if specs.is_empty() {
            return Err(DbError::InvalidField("table needs at least one field".into()));
        }
        let mut fields = Vec::with_capacity(specs.len());
        let mut offset = 1usize;
        for spec in specs {
            let spec = spec.clone().validated()?;
            if fields
                .iter()
                .any(|f: &FieldDescriptor| util::names_equal(&f.name, &spec.name))
            {
                return Err(DbError::InvalidField(format!(
                    "duplicate field name {}",
                    spec.name
                )));
            }
            let field = FieldDescriptor::from_spec(&spec, offset);
            offset += field.length as usize;
            fields.push(field);
        }
        if offset > u16::MAX as usize {
            return Err(DbError::InvalidField("record size exceeds 65535".into()));
        }

        let mut header = DbfHeader {
            version: VERSION_PLAIN,
            year: 0,
            month: 0,
            day: 0,
            record_count: 0,
            header_size: (HEADER_SIZE + DESCRIPTOR_SIZE * fields.len() + 1) as u16,
            record_size: offset as u16,
        };
        header.touch();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| DbError::FileCreate(format!("{}: {}", path.display(), e)))?;
        file.write_all(&header.to_bytes())
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        for field in &fields {
            file.write_all(&field.to_bytes())
                .map_err(|e| DbError::FileWrite(e.to_string()))?;
        }
        file.write_all(&[HEADER_TERMINATOR, EOF_MARKER])
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        file.sync_all().map_err(|e| DbError::FileWrite(e.to_string()))?;

        debug!(path = %path.display(), fields = fields.len(), "created table");

        let mut table = Table {
            file,
            path: path.to_path_buf(),
            read_only: false,
            header,
            fields,
            buffer: Vec::new(),
            recno: 0,
            bof: true,
            eof: true,
            dirty: false,
        };
        table.buffer = table.blank_record();
        Ok(table)
    }

    /// Flush any pending modification and close the handle.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        debug!(path = %self.path.display(), "closed table");
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    pub fn record_size(&self) -> usize {
        self.header.record_size as usize
    }

    /// 1-based current record number; 0 at BOF.
    pub fn recno(&self) -> u32 {
        self.recno
    }

    pub fn at_eof(&self) -> bool {
        self.eof
    }

    pub fn at_bof(&self) -> bool {
        self.bof
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Case-insensitive field lookup.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| util::names_equal(&f.name, name))
    }

    /// Whether the current record carries the delete flag.
    pub fn is_deleted(&self) -> bool {
        self.buffer.first() == Some(&FLAG_DELETED)
    }

    fn blank_record(&self) -> Vec<u8> {
        let mut buf = vec![b' '; self.record_size()];
        buf[0] = FLAG_ACTIVE;
        buf
    }

    fn record_offset(&self, recno: u32) -> u64 {
        self.header.header_size as u64 + self.record_size() as u64 * (recno as u64 - 1)
    }

    fn on_valid_record(&self) -> bool {
        self.recno >= 1 && self.recno <= self.header.record_count
    }

    // ── Navigation ─────────────────────────────────────────────────

    /// Seek to record `n` and load it. `n == 0` positions at BOF with a
    /// blank buffer; `n > record_count` positions one past the last record
    /// with EOF set.
    pub fn goto(&mut self, n: u32) -> Result<()> {
        self.flush()?;
        let count = self.header.record_count;
        if count == 0 {
            self.recno = 0;
            self.bof = true;
            self.eof = true;
            self.buffer = self.blank_record();
            return Ok(());
        }
        if n == 0 {
            self.recno = 0;
            self.bof = true;
            self.eof = false;
            self.buffer = self.blank_record();
            return Ok(());
        }
        if n > count {
            self.recno = count + 1;
            self.bof = false;
            self.eof = true;
            self.buffer = self.blank_record();
            return Ok(());
        }
        let offset = self.record_offset(n);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| DbError::FileRead(e.to_string()))?;
        let size = self.record_size();
        self.buffer.resize(size, b' ');
        self.file
            .read_exact(&mut self.buffer)
            .map_err(|e| DbError::FileRead(e.to_string()))?;
        if self.buffer[0] != FLAG_ACTIVE && self.buffer[0] != FLAG_DELETED {
            return Err(DbError::InvalidRecord(n));
        }
        self.recno = n;
        self.bof = false;
        self.eof = false;
        Ok(())
    }

    /// Signed move from the current record, clamped to BOF at 0 and EOF at
    /// record_count + 1.
    pub fn skip(&mut self, delta: i64) -> Result<()> {
        let count = self.header.record_count as i64;
        let target = (self.recno as i64 + delta).clamp(0, count + 1);
        self.goto(target as u32)
    }

    /// Position at record 1, or BOF+EOF if the table is empty.
    pub fn go_top(&mut self) -> Result<()> {
        self.goto(1)
    }

    /// Position at the last record, or BOF+EOF if the table is empty.
    pub fn go_bottom(&mut self) -> Result<()> {
        self.goto(self.header.record_count)
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Append a blank active record at the end and move the cursor to it.
    pub fn append_blank(&mut self) -> Result<()> {
        self.require_writable()?;
        self.flush()?;
        let new_recno = self.header.record_count + 1;
        let offset = self.record_offset(new_recno);
        self.buffer = self.blank_record();
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&self.buffer)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&[EOF_MARKER])
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.header.record_count = new_recno;
        self.write_header()?;
        self.recno = new_recno;
        self.bof = false;
        self.eof = false;
        self.dirty = false;
        Ok(())
    }

    /// Mark the current record deleted.
    pub fn delete(&mut self) -> Result<()> {
        self.require_writable()?;
        if !self.on_valid_record() {
            return Err(DbError::InvalidRecord(self.recno));
        }
        self.buffer[0] = FLAG_DELETED;
        self.dirty = true;
        Ok(())
    }

    /// Clear the delete flag on the current record.
    pub fn recall(&mut self) -> Result<()> {
        self.require_writable()?;
        if !self.on_valid_record() {
            return Err(DbError::InvalidRecord(self.recno));
        }
        self.buffer[0] = FLAG_ACTIVE;
        self.dirty = true;
        Ok(())
    }

    /// Write the buffer back if dirty, refresh the header date and sync.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty || self.read_only {
            self.dirty = false;
            return Ok(());
        }
        if !self.on_valid_record() {
            self.dirty = false;
            return Ok(());
        }
        let offset = self.record_offset(self.recno);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&self.buffer)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.write_header()?;
        self.file
            .sync_data()
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.dirty = false;
        Ok(())
    }

    /// Remove deleted records in place, preserving the relative order of
    /// survivors, then truncate the file to the new size.
    pub fn pack(&mut self) -> Result<()> {
        self.require_writable()?;
        self.flush()?;
        let count = self.header.record_count;
        let size = self.record_size();
        let mut record = vec![0u8; size];
        let mut kept: u32 = 0;
        for n in 1..=count {
            self.file
                .seek(SeekFrom::Start(self.record_offset(n)))
                .map_err(|e| DbError::FileRead(e.to_string()))?;
            self.file
                .read_exact(&mut record)
                .map_err(|e| DbError::FileRead(e.to_string()))?;
            if record[0] == FLAG_DELETED {
                continue;
            }
            kept += 1;
            if kept != n {
                self.file
                    .seek(SeekFrom::Start(self.record_offset(kept)))
                    .map_err(|e| DbError::FileWrite(e.to_string()))?;
                self.file
                    .write_all(&record)
                    .map_err(|e| DbError::FileWrite(e.to_string()))?;
            }
        }
        let data_end = self.header.header_size as u64 + size as u64 * kept as u64;
        self.file
            .seek(SeekFrom::Start(data_end))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&[EOF_MARKER])
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .set_len(data_end + 1)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        debug!(
            path = %self.path.display(),
            before = count,
            after = kept,
            "packed table"
        );
        self.header.record_count = kept;
        self.write_header()?;
        self.file
            .sync_data()
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.go_top()
    }

    /// Drop every record: count goes to zero, descriptors stay, the file
    /// keeps header + EOF marker.
    pub fn zap(&mut self) -> Result<()> {
        self.require_writable()?;
        self.dirty = false;
        let data_end = self.header.header_size as u64;
        self.file
            .seek(SeekFrom::Start(data_end))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&[EOF_MARKER])
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .set_len(data_end + 1)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.header.record_count = 0;
        self.write_header()?;
        self.file
            .sync_data()
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        debug!(path = %self.path.display(), "zapped table");
        self.goto(0)
    }

    fn write_header(&mut self) -> Result<()> {
        self.header.touch();
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&self.header.to_bytes())
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        Ok(())
    }

    fn require_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DbError::FileWrite(format!(
                "{} is open read-only",
                self.path.display()
            )));
        }
        Ok(())
    }

    // ── Field Access ───────────────────────────────────────────────

    fn field(&self, index: usize) -> Result<&FieldDescriptor> {
        self.fields
            .get(index)
            .ok_or_else(|| DbError::InvalidField(format!("no field #{}", index)))
    }

    fn field_bytes(&self, index: usize) -> Result<&[u8]> {
        let f = self.field(index)?;
        Ok(&self.buffer[f.offset..f.offset + f.length as usize])
    }

    /// Raw character content of a field, space padding included.
    pub fn get_string(&self, index: usize) -> Result<String> {
        let bytes = self.field_bytes(index)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Numeric content; blank or unparseable text reads as 0.
    pub fn get_number(&self, index: usize) -> Result<f64> {
        let bytes = self.field_bytes(index)?;
        Ok(util::parse_number(&String::from_utf8_lossy(bytes)))
    }

    /// Logical content; T/t/Y/y are true, everything else false.
    pub fn get_logical(&self, index: usize) -> Result<bool> {
        let bytes = self.field_bytes(index)?;
        Ok(matches!(bytes.first(), Some(b'T' | b't' | b'Y' | b'y')))
    }

    /// Date content: the raw 8 bytes, or empty when the field is blank.
    pub fn get_date(&self, index: usize) -> Result<String> {
        let bytes = self.field_bytes(index)?;
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            Ok(String::new())
        } else {
            Ok(text.into_owned())
        }
    }

    /// Decode a field into a `Value` according to its declared type.
    /// Memo fields surface as their 10-char block reference text.
    pub fn get_value(&self, index: usize) -> Result<Value> {
        let f = self.field(index)?;
        match f.ftype {
            FieldType::Character | FieldType::Memo => Ok(Value::Str(self.get_string(index)?)),
            FieldType::Numeric => Ok(Value::Number(self.get_number(index)?)),
            FieldType::Logical => Ok(Value::Logical(self.get_logical(index)?)),
            FieldType::Date => Ok(Value::Date(self.get_date(index)?)),
        }
    }

    fn field_slot(&mut self, index: usize) -> Result<(usize, usize)> {
        if !self.on_valid_record() {
            return Err(DbError::InvalidRecord(self.recno));
        }
        let f = self.field(index)?;
        Ok((f.offset, f.length as usize))
    }

    /// Store text left-aligned, space padded, truncated to field length.
    pub fn put_string(&mut self, index: usize, text: &str) -> Result<()> {
        self.require_writable()?;
        let (offset, length) = self.field_slot(index)?;
        let bytes = text.as_bytes();
        for i in 0..length {
            self.buffer[offset + i] = *bytes.get(i).unwrap_or(&b' ');
        }
        self.dirty = true;
        Ok(())
    }

    /// Store a number right-aligned in the field width; a value wider than
    /// the field is truncated on the left (lossy).
    pub fn put_number(&mut self, index: usize, value: f64) -> Result<()> {
        self.require_writable()?;
        let decimals = self.field(index)?.decimals as usize;
        let (offset, length) = self.field_slot(index)?;
        let text = util::format_fixed(value, length, decimals);
        self.buffer[offset..offset + length].copy_from_slice(text.as_bytes());
        self.dirty = true;
        Ok(())
    }

    pub fn put_logical(&mut self, index: usize, value: bool) -> Result<()> {
        self.require_writable()?;
        let (offset, _) = self.field_slot(index)?;
        self.buffer[offset] = if value { b'T' } else { b'F' };
        self.dirty = true;
        Ok(())
    }

    /// Store exactly 8 ASCII digits, or 8 spaces for an empty date.
    pub fn put_date(&mut self, index: usize, yyyymmdd: &str) -> Result<()> {
        self.require_writable()?;
        let (offset, length) = self.field_slot(index)?;
        if yyyymmdd.is_empty() {
            self.buffer[offset..offset + length].fill(b' ');
        } else {
            if yyyymmdd.len() != 8 || !yyyymmdd.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DbError::TypeMismatch(format!(
                    "bad date literal {:?}",
                    yyyymmdd
                )));
            }
            self.buffer[offset..offset + length].copy_from_slice(yyyymmdd.as_bytes());
        }
        self.dirty = true;
        Ok(())
    }

    /// Store a `Value` with coercion appropriate to the field type.
    pub fn put_value(&mut self, index: usize, value: &Value) -> Result<()> {
        let ftype = self.field(index)?.ftype;
        match ftype {
            FieldType::Character | FieldType::Memo => self.put_string(index, &value.as_string()),
            FieldType::Numeric => self.put_number(index, value.as_number()),
            FieldType::Logical => self.put_logical(index, value.is_true()),
            FieldType::Date => match value {
                Value::Date(d) => self.put_date(index, d),
                Value::Str(s) => self.put_date(index, s.trim()),
                other => Err(DbError::TypeMismatch(format!(
                    "cannot store type {} into a date field",
                    other.type_char()
                ))),
            },
        }
    }

    // ── Bulk Copy ──────────────────────────────────────────────────

    /// Append every active record of `other`, copying fields by matching
    /// name (case-insensitive) with type coercion. Returns the number of
    /// records appended.
    pub fn append_from(&mut self, other: &mut Table) -> Result<u32> {
        self.require_writable()?;
        let pairs: Vec<(usize, usize)> = other
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(src, f)| self.field_index(&f.name).map(|dst| (src, dst)))
            .collect();
        let mut copied = 0u32;
        for n in 1..=other.record_count() {
            other.goto(n)?;
            if other.is_deleted() {
                continue;
            }
            self.append_blank()?;
            for &(src, dst) in &pairs {
                let value = other.get_value(src)?;
                self.put_value(dst, &value)?;
            }
            self.flush()?;
            copied += 1;
        }
        Ok(copied)
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn people_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("NAME", FieldType::Character, 20, 0),
            FieldSpec::new("AGE", FieldType::Numeric, 3, 0),
            FieldSpec::new("ACTIVE", FieldType::Logical, 1, 0),
        ]
    }

    fn make_people(dir: &TempDir) -> Table {
        let path = dir.path().join("people.dbf");
        let mut t = Table::create(&path, &people_fields()).unwrap();
        for (name, age, active) in [
            ("John Doe", 25.0, true),
            ("Jane Smith", 30.0, false),
            ("Bob", 35.0, true),
        ] {
            t.append_blank().unwrap();
            t.put_string(0, name).unwrap();
            t.put_number(1, age).unwrap();
            t.put_logical(2, active).unwrap();
        }
        t.flush().unwrap();
        t
    }

    #[test]
    fn test_create_then_open_same_structure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.dbf");
        let t = Table::create(&path, &people_fields()).unwrap();
        let fields: Vec<_> = t.fields().to_vec();
        t.close().unwrap();

        let t2 = Table::open(&path, true).unwrap();
        assert_eq!(t2.record_count(), 0);
        assert!(t2.at_bof() && t2.at_eof());
        assert_eq!(t2.fields(), &fields[..]);
        assert_eq!(t2.record_size(), 1 + 20 + 3 + 1);
    }

    #[test]
    fn test_header_invariants_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.flush().unwrap();
        let path = t.path().to_path_buf();
        let header_size = 32 + 32 * 3 + 1;
        let record_size = t.record_size() as u64;
        t.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert!(data.len() as u64 >= header_size as u64 + record_size * 3 + 1);
        assert_eq!(data[header_size + record_size as usize * 3], EOF_MARKER);
    }

    #[test]
    fn test_field_roundtrip_padded() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.goto(1).unwrap();
        let s = t.get_string(0).unwrap();
        assert_eq!(s, format!("{:<20}", "John Doe"));
        assert_eq!(s.trim_end(), "John Doe");
        assert_eq!(t.get_number(1).unwrap(), 25.0);
        assert!(t.get_logical(2).unwrap());
    }

    #[test]
    fn test_reopen_sees_flushed_writes() {
        let dir = TempDir::new().unwrap();
        let t = make_people(&dir);
        let path = t.path().to_path_buf();
        t.close().unwrap();

        let mut t = Table::open(&path, false).unwrap();
        assert_eq!(t.record_count(), 3);
        t.goto(2).unwrap();
        assert_eq!(t.get_string(0).unwrap().trim_end(), "Jane Smith");
        assert_eq!(t.get_number(1).unwrap(), 30.0);
        t.close().unwrap();
    }

    #[test]
    fn test_navigation_bounds() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.go_top().unwrap();
        assert_eq!(t.recno(), 1);
        t.skip(2).unwrap();
        assert_eq!(t.recno(), 3);
        t.skip(1).unwrap();
        assert!(t.at_eof());
        assert_eq!(t.recno(), 4);
        t.skip(10).unwrap();
        assert!(t.at_eof());
        t.go_bottom().unwrap();
        assert_eq!(t.recno(), 3);
        t.skip(-5).unwrap();
        assert!(t.at_bof());
        assert_eq!(t.recno(), 0);
    }

    #[test]
    fn test_empty_table_is_bof_and_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("e.dbf");
        let mut t = Table::create(&path, &people_fields()).unwrap();
        t.go_top().unwrap();
        assert!(t.at_bof() && t.at_eof());
        t.go_bottom().unwrap();
        assert!(t.at_bof() && t.at_eof());
    }

    #[test]
    fn test_delete_recall_identity() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.goto(2).unwrap();
        assert!(!t.is_deleted());
        t.delete().unwrap();
        assert!(t.is_deleted());
        t.recall().unwrap();
        assert!(!t.is_deleted());
    }

    #[test]
    fn test_dirty_buffer_survives_reads_and_flushes_on_navigation() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.goto(1).unwrap();
        t.put_string(0, "Johnny").unwrap();
        // Un-flushed write visible through another field read of the same record
        assert_eq!(t.get_number(1).unwrap(), 25.0);
        assert_eq!(t.get_string(0).unwrap().trim_end(), "Johnny");
        // Navigation away flushes
        t.goto(2).unwrap();
        t.goto(1).unwrap();
        assert_eq!(t.get_string(0).unwrap().trim_end(), "Johnny");
    }

    #[test]
    fn test_numeric_overflow_truncates_left() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.goto(1).unwrap();
        t.put_number(1, 12345.0).unwrap();
        assert_eq!(t.get_string(1).unwrap(), "345");
    }

    #[test]
    fn test_pack_preserves_survivor_order() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.goto(2).unwrap();
        t.delete().unwrap();
        t.pack().unwrap();
        assert_eq!(t.record_count(), 2);
        t.goto(1).unwrap();
        assert_eq!(t.get_string(0).unwrap().trim_end(), "John Doe");
        t.goto(2).unwrap();
        assert_eq!(t.get_string(0).unwrap().trim_end(), "Bob");
    }

    #[test]
    fn test_pack_without_deleted_is_identity() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        let before: Vec<String> = (1..=3)
            .map(|n| {
                t.goto(n).unwrap();
                t.get_string(0).unwrap()
            })
            .collect();
        t.pack().unwrap();
        assert_eq!(t.record_count(), 3);
        let after: Vec<String> = (1..=3)
            .map(|n| {
                t.goto(n).unwrap();
                t.get_string(0).unwrap()
            })
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_pack_truncates_file() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.goto(3).unwrap();
        t.delete().unwrap();
        t.pack().unwrap();
        let expected = 32 + 32 * 3 + 1 + t.record_size() as u64 * 2 + 1;
        let path = t.path().to_path_buf();
        t.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), expected);
    }

    #[test]
    fn test_zap_keeps_structure() {
        let dir = TempDir::new().unwrap();
        let mut t = make_people(&dir);
        t.zap().unwrap();
        assert_eq!(t.record_count(), 0);
        assert!(t.at_bof() && t.at_eof());
        assert_eq!(t.field_count(), 3);
        let path = t.path().to_path_buf();
        t.close().unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 32 + 32 * 3 + 1 + 1);
        assert_eq!(data[data.len() - 1], EOF_MARKER);
    }

    #[test]
    fn test_date_field_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.dbf");
        let mut t = Table::create(
            &path,
            &[FieldSpec::new("WHEN", FieldType::Date, 8, 0)],
        )
        .unwrap();
        t.append_blank().unwrap();
        t.put_date(0, "20240131").unwrap();
        assert_eq!(t.get_date(0).unwrap(), "20240131");
        t.put_date(0, "").unwrap();
        assert_eq!(t.get_date(0).unwrap(), "");
        assert!(t.put_date(0, "2024x131").is_err());
    }

    #[test]
    fn test_open_rejects_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.dbf");
        std::fs::write(&path, b"not a dbf").unwrap();
        let err = Table::open(&path, true).unwrap_err();
        assert_eq!(err.code(), "INVALID_DBF");

        let missing = dir.path().join("missing.dbf");
        let err = Table::open(&missing, true).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_open_rejects_short_file() {
        let dir = TempDir::new().unwrap();
        let t = make_people(&dir);
        let path = t.path().to_path_buf();
        t.close().unwrap();
        // Chop off the last record + EOF marker: header now overstates count
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 10]).unwrap();
        let err = Table::open(&path, true).unwrap_err();
        assert_eq!(err.code(), "INVALID_DBF");
    }

    #[test]
    fn test_read_only_refuses_writes() {
        let dir = TempDir::new().unwrap();
        let t = make_people(&dir);
        let path = t.path().to_path_buf();
        t.close().unwrap();
        let mut t = Table::open(&path, true).unwrap();
        assert_eq!(t.append_blank().unwrap_err().code(), "FILE_WRITE");
        assert_eq!(t.delete().unwrap_err().code(), "FILE_WRITE");
    }

    #[test]
    fn test_append_from_matches_by_name() {
        let dir = TempDir::new().unwrap();
        let mut src = make_people(&dir);
        src.goto(2).unwrap();
        src.delete().unwrap();
        src.flush().unwrap();

        let dst_path = dir.path().join("subset.dbf");
        let mut dst = Table::create(
            &dst_path,
            &[
                FieldSpec::new("AGE", FieldType::Numeric, 3, 0),
                FieldSpec::new("NAME", FieldType::Character, 10, 0),
            ],
        )
        .unwrap();
        let copied = dst.append_from(&mut src).unwrap();
        assert_eq!(copied, 2);
        dst.goto(1).unwrap();
        assert_eq!(dst.get_number(0).unwrap(), 25.0);
        assert_eq!(dst.get_string(1).unwrap().trim_end(), "John Doe");
        dst.goto(2).unwrap();
        assert_eq!(dst.get_string(1).unwrap().trim_end(), "Bob");
    }

    #[test]
    fn test_field_index_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let t = make_people(&dir);
        assert_eq!(t.field_index("name"), Some(0));
        assert_eq!(t.field_index("Age"), Some(1));
        assert_eq!(t.field_index("missing"), None);
    }
}
