//! DBF table engine: dBASE III+ binary table files.

pub mod header;
pub mod table;

pub use header::{FieldDescriptor, FieldSpec, FieldType};
pub use table::Table;
