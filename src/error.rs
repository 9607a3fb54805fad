//! Error types for the xdb engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cannot create file: {0}")]
    FileCreate(String),

    #[error("Read error: {0}")]
    FileRead(String),

    #[error("Write error: {0}")]
    FileWrite(String),

    #[error("Not a valid DBF file: {0}")]
    InvalidDbf(String),

    #[error("Not a valid index file: {0}")]
    InvalidIndex(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid record number: {0}")]
    InvalidRecord(u32),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow: {0}")]
    Overflow(String),

    #[error("No database open")]
    NoDatabaseOpen,

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("End of file reached")]
    Eof,

    #[error("Beginning of file reached")]
    Bof,

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Get the stable kind code for diagnostics and hosts
    pub fn code(&self) -> &'static str {
        match self {
            DbError::FileNotFound(_) => "FILE_NOT_FOUND",
            DbError::FileCreate(_) => "FILE_CREATE",
            DbError::FileRead(_) => "FILE_READ",
            DbError::FileWrite(_) => "FILE_WRITE",
            DbError::InvalidDbf(_) => "INVALID_DBF",
            DbError::InvalidIndex(_) => "INVALID_INDEX",
            DbError::InvalidField(_) => "INVALID_FIELD",
            DbError::InvalidRecord(_) => "INVALID_RECORD",
            DbError::OutOfMemory => "OUT_OF_MEMORY",
            DbError::Syntax(_) => "SYNTAX",
            DbError::TypeMismatch(_) => "TYPE_MISMATCH",
            DbError::UndefinedVariable(_) => "UNDEFINED_VARIABLE",
            DbError::UndefinedFunction(_) => "UNDEFINED_FUNCTION",
            DbError::DivisionByZero => "DIVISION_BY_ZERO",
            DbError::Overflow(_) => "OVERFLOW",
            DbError::NoDatabaseOpen => "NO_DATABASE_OPEN",
            DbError::DuplicateKey(_) => "DUPLICATE_KEY",
            DbError::Eof => "EOF",
            DbError::Bof => "BOF",
            DbError::NotImplemented(_) => "NOT_IMPLEMENTED",
            DbError::Internal(_) => "INTERNAL",
            DbError::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(DbError::NoDatabaseOpen.code(), "NO_DATABASE_OPEN");
        assert_eq!(DbError::DuplicateKey("X".into()).code(), "DUPLICATE_KEY");
        assert_eq!(DbError::DivisionByZero.code(), "DIVISION_BY_ZERO");
    }

    #[test]
    fn test_display_carries_message() {
        let err = DbError::InvalidDbf("bad version byte 0x07".into());
        assert!(err.to_string().contains("bad version byte"));
    }
}
