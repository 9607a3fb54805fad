//! B-tree index handle over an XDX file.
//!
//! The root node is cached; every other node is read on demand and never
//! retained across disk reads — traversal state is a stack of
//! (node offset, slot) pairs. Deletion does not rebalance: the tree stays
//! key-ordered but may lose balance until REINDEX rebuilds it.

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DbError, Result};
use crate::util;
use crate::xdx::format::{
    default_order, IndexHeader, KeyType, Node, NodeEntry, FLAG_DESCENDING, FLAG_UNIQUE,
    XDX_HEADER_SIZE,
};

// ── Types ──────────────────────────────────────────────────────────

/// Outcome of a key search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekResult {
    pub found: bool,
    /// Record of the match, or of the in-order successor; 0 past the end.
    pub recno: u32,
}

/// One step of a descent: node offset plus a slot within it. For the
/// deepest frame the slot is an entry index; for ancestors it is the
/// child slot the descent took (slot k sits between entries k-1 and k).
#[derive(Debug, Clone, Copy)]
struct Frame {
    offset: u32,
    pos: usize,
}

/// An open XDX index.
#[derive(Debug)]
pub struct Index {
    file: File,
    path: PathBuf,
    header: IndexHeader,
    root: Node,
    base_cmp: fn(&[u8], &[u8]) -> Ordering,
    cursor: Option<Vec<Frame>>,
}

fn cmp_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn cmp_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let pa = util::parse_number(&String::from_utf8_lossy(a));
    let pb = util::parse_number(&String::from_utf8_lossy(b));
    pa.partial_cmp(&pb).unwrap_or(Ordering::Equal)
}

fn comparator_for(key_type: KeyType) -> fn(&[u8], &[u8]) -> Ordering {
    match key_type {
        KeyType::Character | KeyType::Date => cmp_bytes,
        KeyType::Numeric => cmp_numeric,
    }
}

impl Index {
    // ── Create / Open ──────────────────────────────────────────────

    /// Create a fresh index file: header plus a single empty leaf root.
    pub fn create(
        path: &Path,
        key_type: KeyType,
        key_len: u16,
        unique: bool,
        descending: bool,
        key_expr: &str,
    ) -> Result<Index> {
        if key_len == 0 || key_len > 240 {
            return Err(DbError::InvalidIndex(format!(
                "key length {} out of range 1-240",
                key_len
            )));
        }
        let mut flags = 0u16;
        if unique {
            flags |= FLAG_UNIQUE;
        }
        if descending {
            flags |= FLAG_DESCENDING;
        }
        let header = IndexHeader {
            key_type,
            key_len,
            root_offset: XDX_HEADER_SIZE as u32,
            node_count: 0,
            order: default_order(key_len),
            flags,
            key_expr: key_expr.to_string(),
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| DbError::FileCreate(format!("{}: {}", path.display(), e)))?;

        let mut index = Index {
            file,
            path: path.to_path_buf(),
            root: Node::new(XDX_HEADER_SIZE as u32, true, 0),
            base_cmp: comparator_for(key_type),
            header,
            cursor: None,
        };
        index
            .file
            .write_all(&index.header.to_bytes())
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        let root = index.alloc_node(true, 0)?;
        index.root = root;
        index.write_header()?;
        debug!(
            path = %path.display(),
            key_type = %(key_type.as_u8() as char),
            key_len,
            unique,
            descending,
            "created index"
        );
        Ok(index)
    }

    /// Open an existing index; rejects files without the XDX magic or with
    /// an unsupported version.
    pub fn open(path: &Path) -> Result<Index> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    DbError::FileNotFound(path.display().to_string())
                }
                _ => DbError::FileRead(format!("{}: {}", path.display(), e)),
            })?;
        let mut head = vec![0u8; XDX_HEADER_SIZE];
        file.read_exact(&mut head)
            .map_err(|e| DbError::InvalidIndex(format!("{}: {}", path.display(), e)))?;
        let header = IndexHeader::from_bytes(&head)?;
        let mut index = Index {
            file,
            path: path.to_path_buf(),
            // Placeholder off any valid offset so the first read_node of
            // the root misses the cache and hits the disk
            root: Node::new(u32::MAX, true, 0),
            base_cmp: comparator_for(header.key_type),
            header,
            cursor: None,
        };
        index.root = index.read_node(index.header.root_offset)?;
        Ok(index)
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_type(&self) -> KeyType {
        self.header.key_type
    }

    pub fn key_len(&self) -> u16 {
        self.header.key_len
    }

    pub fn unique(&self) -> bool {
        self.header.unique()
    }

    pub fn descending(&self) -> bool {
        self.header.descending()
    }

    pub fn key_expr(&self) -> &str {
        &self.header.key_expr
    }

    pub fn node_count(&self) -> u32 {
        self.header.node_count
    }

    /// Pad or truncate a key to the index key length.
    pub fn normalize_key(&self, key: &[u8]) -> Vec<u8> {
        let mut out = key.to_vec();
        out.resize(self.header.key_len as usize, b' ');
        out
    }

    fn key_compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let ord = (self.base_cmp)(a, b);
        if self.header.descending() {
            ord.reverse()
        } else {
            ord
        }
    }

    /// First position whose key sorts >= `key`.
    fn lower_bound(&self, node: &Node, key: &[u8]) -> usize {
        let mut lo = 0;
        let mut hi = node.entries.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_compare(&node.entries[mid].key, key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// First position whose key sorts > `key`.
    fn upper_bound(&self, node: &Node, key: &[u8]) -> usize {
        let mut lo = 0;
        let mut hi = node.entries.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_compare(&node.entries[mid].key, key) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    // ── Node I/O ───────────────────────────────────────────────────

    fn read_node(&mut self, offset: u32) -> Result<Node> {
        if offset == self.header.root_offset && self.root.offset == offset {
            return Ok(self.root.clone());
        }
        let mut head = [0u8; 8];
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(|e| DbError::FileRead(e.to_string()))?;
        self.file
            .read_exact(&mut head)
            .map_err(|e| DbError::FileRead(e.to_string()))?;
        let leaf = head[2] != 0;
        let size = self.header.node_size(leaf);
        let mut buf = vec![0u8; size];
        buf[..8].copy_from_slice(&head);
        self.file
            .read_exact(&mut buf[8..])
            .map_err(|e| DbError::FileRead(e.to_string()))?;
        Node::from_bytes(&buf, offset, &self.header)
    }

    fn write_node(&mut self, node: &Node) -> Result<()> {
        let buf = node.to_bytes(&self.header);
        self.file
            .seek(SeekFrom::Start(node.offset as u64))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&buf)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        if node.offset == self.header.root_offset {
            self.root = node.clone();
        }
        Ok(())
    }

    /// Reserve a node's capacity at the end of the file.
    fn alloc_node(&mut self, leaf: bool, parent: u32) -> Result<Node> {
        let offset = self
            .file
            .seek(SeekFrom::End(0))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        let offset = u32::try_from(offset)
            .map_err(|_| DbError::InvalidIndex("index file exceeds 4 GiB".into()))?;
        let node = Node::new(offset, leaf, parent);
        self.file
            .write_all(&node.to_bytes(&self.header))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.header.node_count += 1;
        Ok(node)
    }

    /// Patch the stored parent offset of the node at `offset`.
    fn patch_parent(&mut self, offset: u32, parent: u32) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset as u64 + 4))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&parent.to_le_bytes())
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        if offset == self.root.offset {
            self.root.parent = parent;
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let buf = self.header.to_bytes();
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&buf)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        Ok(())
    }

    // ── Insert ─────────────────────────────────────────────────────

    /// Insert a (key, recno) pair. On a unique index an equal key refuses
    /// with duplicate-key before anything is written.
    pub fn insert(&mut self, key: &[u8], recno: u32) -> Result<()> {
        let key = self.normalize_key(key);
        self.cursor = None;
        let nodes_before = self.header.node_count;

        let mut path: Vec<(u32, usize)> = Vec::new();
        let mut node = self.read_node(self.header.root_offset)?;
        loop {
            if self.header.unique() {
                let pos = self.lower_bound(&node, &key);
                if pos < node.entries.len()
                    && self.key_compare(&node.entries[pos].key, &key) == Ordering::Equal
                {
                    return Err(DbError::DuplicateKey(
                        String::from_utf8_lossy(&key).trim_end().to_string(),
                    ));
                }
            }
            if node.leaf {
                break;
            }
            let pos = self.upper_bound(&node, &key);
            path.push((node.offset, pos));
            let child = node.child_at(pos);
            node = self.read_node(child)?;
        }

        let pos = self.upper_bound(&node, &key);
        node.entries.insert(
            pos,
            NodeEntry {
                key,
                recno,
                child: 0,
            },
        );

        // Split upward while overfull
        let max = self.header.max_keys();
        while node.entries.len() > max {
            let mid = node.entries.len() / 2;
            let mut sibling = self.alloc_node(node.leaf, node.parent)?;
            sibling.entries = node.entries.split_off(mid + 1);
            let mut median = node.entries.pop().expect("median exists after split_off");
            if !node.leaf {
                sibling.right_child = node.right_child;
                node.right_child = median.child;
            }
            median.child = node.offset;
            if !sibling.leaf {
                let children: Vec<u32> = sibling
                    .entries
                    .iter()
                    .map(|e| e.child)
                    .chain(std::iter::once(sibling.right_child))
                    .collect();
                for child in children {
                    self.patch_parent(child, sibling.offset)?;
                }
            }
            match path.pop() {
                None => {
                    // The split node was the root: grow a new one
                    let mut new_root = self.alloc_node(false, 0)?;
                    node.parent = new_root.offset;
                    sibling.parent = new_root.offset;
                    new_root.entries.push(median);
                    new_root.right_child = sibling.offset;
                    self.write_node(&node)?;
                    self.write_node(&sibling)?;
                    self.write_node(&new_root)?;
                    self.header.root_offset = new_root.offset;
                    self.root = new_root;
                    self.write_header()?;
                    return Ok(());
                }
                Some((parent_offset, parent_pos)) => {
                    let mut parent = self.read_node(parent_offset)?;
                    node.parent = parent.offset;
                    sibling.parent = parent.offset;
                    parent.entries.insert(parent_pos, median);
                    if parent_pos + 1 < parent.entries.len() {
                        parent.entries[parent_pos + 1].child = sibling.offset;
                    } else {
                        parent.right_child = sibling.offset;
                    }
                    self.write_node(&node)?;
                    self.write_node(&sibling)?;
                    node = parent;
                }
            }
        }
        self.write_node(&node)?;
        if self.header.node_count != nodes_before {
            self.write_header()?;
        }
        Ok(())
    }

    // ── Delete ─────────────────────────────────────────────────────

    /// Remove the entry matching both key and recno. Equal keys with
    /// different recnos are distinct entries. Returns whether a match was
    /// removed; no rebalancing happens.
    pub fn delete(&mut self, key: &[u8], recno: u32) -> Result<bool> {
        let key = self.normalize_key(key);
        self.cursor = None;
        self.remove_rec(self.header.root_offset, &key, recno)
    }

    fn remove_rec(&mut self, offset: u32, key: &[u8], recno: u32) -> Result<bool> {
        let mut node = self.read_node(offset)?;
        let lo = self.lower_bound(&node, key);
        let mut hi = lo;
        while hi < node.entries.len()
            && self.key_compare(&node.entries[hi].key, key) == Ordering::Equal
        {
            if node.entries[hi].recno == recno {
                if node.leaf {
                    node.entries.remove(hi);
                } else {
                    // Keep the slot search-correct: pull up the in-order
                    // predecessor from the left subtree
                    match self.take_rightmost(node.entries[hi].child)? {
                        Some((pk, pr)) => {
                            node.entries[hi].key = pk;
                            node.entries[hi].recno = pr;
                        }
                        None => {
                            // Left subtree holds nothing; drop the slot
                            node.entries.remove(hi);
                        }
                    }
                }
                self.write_node(&node)?;
                return Ok(true);
            }
            hi += 1;
        }
        if node.leaf {
            return Ok(false);
        }
        for pos in lo..=hi {
            let child = node.child_at(pos);
            if self.remove_rec(child, key, recno)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Detach and return the in-order last (key, recno) of a subtree.
    fn take_rightmost(&mut self, offset: u32) -> Result<Option<(Vec<u8>, u32)>> {
        let mut node = self.read_node(offset)?;
        if node.leaf {
            if let Some(entry) = node.entries.pop() {
                self.write_node(&node)?;
                return Ok(Some((entry.key, entry.recno)));
            }
            return Ok(None);
        }
        if let Some(found) = self.take_rightmost(node.right_child)? {
            return Ok(Some(found));
        }
        if let Some(entry) = node.entries.pop() {
            node.right_child = entry.child;
            self.write_node(&node)?;
            return Ok(Some((entry.key, entry.recno)));
        }
        Ok(None)
    }

    // ── Seek / Positioning ─────────────────────────────────────────

    /// Find the smallest entry whose key sorts >= the search key, leaving
    /// the traversal cursor on it. Among duplicates the first in key order
    /// wins.
    pub fn seek(&mut self, key: &[u8]) -> Result<SeekResult> {
        let key = self.normalize_key(key);
        let mut path: Vec<Frame> = Vec::new();
        let mut offset = self.header.root_offset;
        loop {
            let node = self.read_node(offset)?;
            let pos = self.lower_bound(&node, &key);
            path.push(Frame { offset, pos });
            if node.leaf {
                if pos < node.entries.len() {
                    let found =
                        self.key_compare(&node.entries[pos].key, &key) == Ordering::Equal;
                    let recno = node.entries[pos].recno;
                    self.cursor = Some(path);
                    return Ok(SeekResult { found, recno });
                }
                // Leaf exhausted: the successor is the nearest ancestor entry
                return match self.climb(path)? {
                    Some(p) => {
                        let entry = self.entry_at(*p.last().expect("climb keeps a frame"))?;
                        let found = self.key_compare(&entry.key, &key) == Ordering::Equal;
                        self.cursor = Some(p);
                        Ok(SeekResult {
                            found,
                            recno: entry.recno,
                        })
                    }
                    None => {
                        self.cursor = None;
                        Ok(SeekResult {
                            found: false,
                            recno: 0,
                        })
                    }
                };
            }
            offset = node.child_at(pos);
        }
    }

    /// Move to the first entry in key order. Returns its recno, or None
    /// for an empty index.
    pub fn go_top(&mut self) -> Result<Option<u32>> {
        let mut path: Vec<Frame> = Vec::new();
        let mut offset = self.header.root_offset;
        loop {
            let node = self.read_node(offset)?;
            path.push(Frame { offset, pos: 0 });
            if node.leaf {
                if let Some(entry) = node.entries.first() {
                    let recno = entry.recno;
                    self.cursor = Some(path);
                    return Ok(Some(recno));
                }
                return match self.climb(path)? {
                    Some(p) => {
                        let entry = self.entry_at(*p.last().expect("climb keeps a frame"))?;
                        self.cursor = Some(p);
                        Ok(Some(entry.recno))
                    }
                    None => {
                        self.cursor = None;
                        Ok(None)
                    }
                };
            }
            offset = node.child_at(0);
        }
    }

    /// Move to the last entry in key order. Returns its recno, or None
    /// for an empty index.
    pub fn go_bottom(&mut self) -> Result<Option<u32>> {
        let mut path: Vec<Frame> = Vec::new();
        let mut offset = self.header.root_offset;
        loop {
            let node = self.read_node(offset)?;
            if node.leaf {
                if node.entries.is_empty() {
                    path.push(Frame { offset, pos: 0 });
                    return match self.climb_back(path)? {
                        Some(p) => {
                            let entry =
                                self.entry_at(*p.last().expect("climb keeps a frame"))?;
                            self.cursor = Some(p);
                            Ok(Some(entry.recno))
                        }
                        None => {
                            self.cursor = None;
                            Ok(None)
                        }
                    };
                }
                let pos = node.entries.len() - 1;
                let recno = node.entries[pos].recno;
                path.push(Frame { offset, pos });
                self.cursor = Some(path);
                return Ok(Some(recno));
            }
            path.push(Frame {
                offset,
                pos: node.entries.len(),
            });
            offset = node.right_child;
        }
    }

    /// Advance the cursor `delta` entries in key order (negative moves
    /// backward). Returns the recno landed on, or None when the cursor
    /// runs off either end.
    pub fn skip(&mut self, delta: i64) -> Result<Option<u32>> {
        let mut remaining = delta;
        while remaining > 0 {
            if !self.advance()? {
                return Ok(None);
            }
            remaining -= 1;
        }
        while remaining < 0 {
            if !self.retreat()? {
                return Ok(None);
            }
            remaining += 1;
        }
        self.current()
    }

    /// Recno under the cursor, if positioned.
    pub fn current(&mut self) -> Result<Option<u32>> {
        let Some(path) = self.cursor.clone() else {
            return Ok(None);
        };
        let top = *path.last().expect("cursor path is never empty");
        let node = self.read_node(top.offset)?;
        Ok(node.entries.get(top.pos).map(|e| e.recno))
    }

    fn entry_at(&mut self, frame: Frame) -> Result<NodeEntry> {
        let node = self.read_node(frame.offset)?;
        node.entries
            .get(frame.pos)
            .cloned()
            .ok_or_else(|| DbError::Internal("cursor frame out of range".into()))
    }

    /// Pop exhausted frames until one points left of a pending entry.
    fn climb(&mut self, mut path: Vec<Frame>) -> Result<Option<Vec<Frame>>> {
        loop {
            path.pop();
            let Some(top) = path.last().copied() else {
                return Ok(None);
            };
            let node = self.read_node(top.offset)?;
            if top.pos < node.entries.len() {
                return Ok(Some(path));
            }
        }
    }

    /// Pop frames until one has an entry to its left, then step onto it.
    fn climb_back(&mut self, mut path: Vec<Frame>) -> Result<Option<Vec<Frame>>> {
        loop {
            path.pop();
            if path.is_empty() {
                return Ok(None);
            }
            let last = path.len() - 1;
            if path[last].pos > 0 {
                path[last].pos -= 1;
                return Ok(Some(path));
            }
        }
    }

    fn advance(&mut self) -> Result<bool> {
        let Some(mut path) = self.cursor.take() else {
            return Ok(false);
        };
        let top = *path.last().expect("cursor path is never empty");
        let node = self.read_node(top.offset)?;
        let last = path.len() - 1;
        if node.leaf {
            path[last].pos += 1;
            if path[last].pos < node.entries.len() {
                self.cursor = Some(path);
                return Ok(true);
            }
            self.cursor = self.climb(path)?;
            return Ok(self.cursor.is_some());
        }
        // Descend to the leftmost entry right of the current one
        path[last].pos += 1;
        let mut offset = node.child_at(path[last].pos);
        loop {
            let child = self.read_node(offset)?;
            path.push(Frame { offset, pos: 0 });
            if child.leaf {
                if child.entries.is_empty() {
                    self.cursor = self.climb(path)?;
                    return Ok(self.cursor.is_some());
                }
                self.cursor = Some(path);
                return Ok(true);
            }
            offset = child.child_at(0);
        }
    }

    fn retreat(&mut self) -> Result<bool> {
        let Some(mut path) = self.cursor.take() else {
            return Ok(false);
        };
        let top = *path.last().expect("cursor path is never empty");
        let node = self.read_node(top.offset)?;
        if node.leaf {
            if top.pos > 0 {
                let last = path.len() - 1;
                path[last].pos -= 1;
                self.cursor = Some(path);
                return Ok(true);
            }
            self.cursor = self.climb_back(path)?;
            return Ok(self.cursor.is_some());
        }
        // Descend to the rightmost entry of the left subtree
        let mut offset = node.child_at(top.pos);
        loop {
            let child = self.read_node(offset)?;
            if child.leaf {
                if child.entries.is_empty() {
                    path.push(Frame { offset, pos: 0 });
                    self.cursor = self.climb_back(path)?;
                    return Ok(self.cursor.is_some());
                }
                path.push(Frame {
                    offset,
                    pos: child.entries.len() - 1,
                });
                self.cursor = Some(path);
                return Ok(true);
            }
            path.push(Frame {
                offset,
                pos: child.entries.len(),
            });
            offset = child.right_child;
        }
    }

    // ── Traversal / Rebuild ────────────────────────────────────────

    /// All (key, recno) pairs in key order.
    pub fn in_order(&mut self) -> Result<Vec<(Vec<u8>, u32)>> {
        let mut out = Vec::new();
        self.walk(self.header.root_offset, &mut out)?;
        Ok(out)
    }

    fn walk(&mut self, offset: u32, out: &mut Vec<(Vec<u8>, u32)>) -> Result<()> {
        let node = self.read_node(offset)?;
        if node.leaf {
            out.extend(node.entries.into_iter().map(|e| (e.key, e.recno)));
            return Ok(());
        }
        for entry in &node.entries {
            self.walk(entry.child, out)?;
            out.push((entry.key.clone(), entry.recno));
        }
        self.walk(node.right_child, out)
    }

    /// Throw away every node and rebuild from `pairs`, in the order given.
    pub fn reindex<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (Vec<u8>, u32)>,
    {
        self.cursor = None;
        self.file
            .set_len(XDX_HEADER_SIZE as u64)
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        self.header.node_count = 0;
        self.header.root_offset = XDX_HEADER_SIZE as u32;
        let root = self.alloc_node(true, 0)?;
        self.root = root;
        self.write_header()?;
        let mut inserted = 0u32;
        for (key, recno) in pairs {
            self.insert(&key, recno)?;
            inserted += 1;
        }
        debug!(path = %self.path.display(), entries = inserted, "rebuilt index");
        Ok(())
    }

    /// Flush the header and sync file contents.
    pub fn flush(&mut self) -> Result<()> {
        self.write_header()?;
        self.file
            .sync_data()
            .map_err(|e| DbError::FileWrite(e.to_string()))?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn char_index(dir: &TempDir, name: &str, unique: bool, descending: bool) -> Index {
        Index::create(
            &dir.path().join(name),
            KeyType::Character,
            10,
            unique,
            descending,
            "NAME",
        )
        .unwrap()
    }

    fn keys_of(index: &mut Index) -> Vec<String> {
        index
            .in_order()
            .unwrap()
            .into_iter()
            .map(|(k, _)| String::from_utf8_lossy(&k).trim_end().to_string())
            .collect()
    }

    #[test]
    fn test_create_then_open_preserves_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.xdx");
        let idx = Index::create(&path, KeyType::Numeric, 20, true, true, "AGE * 2").unwrap();
        drop(idx);
        let idx = Index::open(&path).unwrap();
        assert_eq!(idx.key_type(), KeyType::Numeric);
        assert_eq!(idx.key_len(), 20);
        assert!(idx.unique());
        assert!(idx.descending());
        assert_eq!(idx.key_expr(), "AGE * 2");
        assert_eq!(idx.node_count(), 1);
    }

    #[test]
    fn test_open_rejects_foreign_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.xdx");
        std::fs::write(&path, vec![0u8; 600]).unwrap();
        assert_eq!(Index::open(&path).unwrap_err().code(), "INVALID_INDEX");

        let short = dir.path().join("short.xdx");
        std::fs::write(&short, b"XDX\0").unwrap();
        assert_eq!(Index::open(&short).unwrap_err().code(), "INVALID_INDEX");
    }

    #[test]
    fn test_insert_and_seek() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "t.xdx", false, false);
        for (i, name) in ["delta", "alpha", "echo", "bravo", "charlie"]
            .iter()
            .enumerate()
        {
            idx.insert(name.as_bytes(), i as u32 + 1).unwrap();
        }
        assert_eq!(keys_of(&mut idx), ["alpha", "bravo", "charlie", "delta", "echo"]);

        let hit = idx.seek(b"charlie").unwrap();
        assert!(hit.found);
        assert_eq!(hit.recno, 5);

        let miss = idx.seek(b"chz").unwrap();
        assert!(!miss.found);
        assert_eq!(miss.recno, 1); // successor is "delta", recno 1

        let past = idx.seek(b"zzz").unwrap();
        assert!(!past.found);
        assert_eq!(past.recno, 0);
    }

    #[test]
    fn test_many_inserts_stay_sorted_and_split() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "t.xdx", false, false);
        for i in 0..500u32 {
            let key = format!("k{:05}", (i * 7919) % 100_000);
            idx.insert(key.as_bytes(), i + 1).unwrap();
        }
        assert!(idx.node_count() > 1, "expected splits");
        let keys = keys_of(&mut idx);
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 500);
    }

    #[test]
    fn test_unique_refuses_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "u.xdx", true, false);
        idx.insert(b"alpha", 1).unwrap();
        let err = idx.insert(b"alpha", 2).unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_KEY");
        assert_eq!(idx.in_order().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicates_first_match_wins() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "d.xdx", false, false);
        idx.insert(b"same", 10).unwrap();
        idx.insert(b"same", 20).unwrap();
        idx.insert(b"same", 30).unwrap();
        let hit = idx.seek(b"same").unwrap();
        assert!(hit.found);
        assert_eq!(hit.recno, 10);
        assert_eq!(idx.skip(1).unwrap(), Some(20));
        assert_eq!(idx.skip(1).unwrap(), Some(30));
    }

    #[test]
    fn test_descending_order() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "desc.xdx", false, true);
        for (i, name) in ["alpha", "charlie", "bravo"].iter().enumerate() {
            idx.insert(name.as_bytes(), i as u32 + 1).unwrap();
        }
        assert_eq!(keys_of(&mut idx), ["charlie", "bravo", "alpha"]);
        assert_eq!(idx.go_top().unwrap(), Some(2)); // charlie
        assert_eq!(idx.go_bottom().unwrap(), Some(1)); // alpha
    }

    #[test]
    fn test_numeric_keys_compare_numerically() {
        let dir = TempDir::new().unwrap();
        let mut idx = Index::create(
            &dir.path().join("n.xdx"),
            KeyType::Numeric,
            20,
            false,
            false,
            "AGE",
        )
        .unwrap();
        // ASCII order would put "100" before "25"
        idx.insert(format!("{:>20}", 100).as_bytes(), 1).unwrap();
        idx.insert(format!("{:>20}", 25).as_bytes(), 2).unwrap();
        idx.insert(format!("{:>20}", 9).as_bytes(), 3).unwrap();
        let order: Vec<u32> = idx.in_order().unwrap().iter().map(|(_, r)| *r).collect();
        assert_eq!(order, [3, 2, 1]);
        let hit = idx.seek(format!("{:>20}", 25).as_bytes()).unwrap();
        assert!(hit.found);
        assert_eq!(hit.recno, 2);
    }

    #[test]
    fn test_delete_exact_pair() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "del.xdx", false, false);
        idx.insert(b"same", 10).unwrap();
        idx.insert(b"same", 20).unwrap();
        idx.insert(b"other", 30).unwrap();
        assert!(!idx.delete(b"same", 99).unwrap());
        assert!(idx.delete(b"same", 10).unwrap());
        let left: Vec<u32> = idx.in_order().unwrap().iter().map(|(_, r)| *r).collect();
        assert_eq!(left, [30, 20]);
        let hit = idx.seek(b"same").unwrap();
        assert!(hit.found);
        assert_eq!(hit.recno, 20);
    }

    #[test]
    fn test_delete_from_split_tree_keeps_order() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "big.xdx", false, false);
        for i in 0..200u32 {
            idx.insert(format!("k{:04}", i).as_bytes(), i + 1).unwrap();
        }
        // Delete every third key, including ones promoted to internal nodes
        for i in (0..200u32).step_by(3) {
            assert!(idx.delete(format!("k{:04}", i).as_bytes(), i + 1).unwrap());
        }
        let keys = keys_of(&mut idx);
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 200 - 67);
        // Survivors are still found
        let hit = idx.seek(b"k0001").unwrap();
        assert!(hit.found);
        assert_eq!(hit.recno, 2);
    }

    #[test]
    fn test_skip_walks_in_key_order() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "walk.xdx", false, false);
        for i in 0..100u32 {
            idx.insert(format!("k{:04}", i).as_bytes(), i + 1).unwrap();
        }
        let mut seen = vec![idx.go_top().unwrap().unwrap()];
        while let Some(recno) = idx.skip(1).unwrap() {
            seen.push(recno);
        }
        assert_eq!(seen, (1..=100).collect::<Vec<u32>>());

        // And backward from the bottom
        let mut back = vec![idx.go_bottom().unwrap().unwrap()];
        while let Some(recno) = idx.skip(-1).unwrap() {
            back.push(recno);
        }
        back.reverse();
        assert_eq!(back, (1..=100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_empty_index_positions_nowhere() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "empty.xdx", false, false);
        assert_eq!(idx.go_top().unwrap(), None);
        assert_eq!(idx.go_bottom().unwrap(), None);
        let miss = idx.seek(b"x").unwrap();
        assert!(!miss.found);
        assert_eq!(miss.recno, 0);
    }

    #[test]
    fn test_reindex_rebuilds_balanced() {
        let dir = TempDir::new().unwrap();
        let mut idx = char_index(&dir, "re.xdx", false, false);
        for i in 0..300u32 {
            idx.insert(format!("k{:04}", i).as_bytes(), i + 1).unwrap();
        }
        for i in 0..250u32 {
            idx.delete(format!("k{:04}", i).as_bytes(), i + 1).unwrap();
        }
        let survivors: Vec<(Vec<u8>, u32)> = idx.in_order().unwrap();
        idx.reindex(survivors.clone()).unwrap();
        assert_eq!(idx.in_order().unwrap(), survivors);
        assert_eq!(keys_of(&mut idx).len(), 50);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_traversal_sorted_for_any_insert_order(seed in 0u64..10_000) {
            let dir = TempDir::new().unwrap();
            let mut idx = char_index(&dir, "p.xdx", false, false);
            let mut state = seed;
            for i in 0..120u32 {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let key = format!("k{:06}", state % 1_000_000);
                idx.insert(key.as_bytes(), i + 1).unwrap();
            }
            let pairs = idx.in_order().unwrap();
            prop_assert_eq!(pairs.len(), 120);
            for window in pairs.windows(2) {
                prop_assert!(window[0].0 <= window[1].0);
            }
        }

        #[test]
        fn prop_unique_holds_under_shuffles(seed in 0u64..10_000) {
            let dir = TempDir::new().unwrap();
            let mut idx = char_index(&dir, "pu.xdx", true, false);
            let mut state = seed;
            let mut accepted = std::collections::HashSet::new();
            for i in 0..80u32 {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let key = format!("k{:02}", state % 40);
                match idx.insert(key.as_bytes(), i + 1) {
                    Ok(()) => { prop_assert!(accepted.insert(key)); }
                    Err(err) => {
                        prop_assert_eq!(err.code(), "DUPLICATE_KEY");
                        prop_assert!(accepted.contains(&key));
                    }
                }
            }
            prop_assert_eq!(idx.in_order().unwrap().len(), accepted.len());
        }
    }
}
