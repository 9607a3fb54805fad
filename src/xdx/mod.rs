//! XDX B-tree index engine: paged on-disk indexes over derived keys.

pub mod format;
pub mod tree;

pub use format::{IndexHeader, KeyType};
pub use tree::{Index, SeekResult};
