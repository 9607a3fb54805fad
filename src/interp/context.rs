//! Interpreter context: the single work area, open index slots, settings,
//! the variable store, and the I/O channels a host can redirect.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::dbf::Table;
use crate::error::{DbError, Result};
use crate::lang::ast::Expr;
use crate::interp::vars::VarStore;
use crate::xdx::Index;

/// How many indexes may be open against the work area at once.
pub const MAX_INDEXES: usize = 10;

// ── Settings ───────────────────────────────────────────────────────

/// SET flags honored by the executor.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SET DELETED ON hides deleted records from iteration.
    pub deleted: bool,
    /// SET EXACT ON requires full-string equality for `=`.
    pub exact: bool,
    /// SET UNIQUE ON makes INDEX create unique indexes by default.
    pub unique: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            deleted: false,
            exact: false,
            unique: false,
        }
    }
}

// ── Output Capture ─────────────────────────────────────────────────

/// Clonable in-memory sink, used by hosts and tests to capture output.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the captured bytes as text.
    pub fn take_string(&self) -> String {
        let mut guard = self.0.lock().expect("output buffer poisoned");
        String::from_utf8_lossy(&std::mem::take(&mut *guard)).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("output buffer poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Index Slot ─────────────────────────────────────────────────────

/// An open index bound to the work area, with its parsed key expression.
pub struct IndexSlot {
    pub index: Index,
    pub key: Expr,
}

// ── Context ────────────────────────────────────────────────────────

/// Everything one interpreter instance owns. A host embedding the engine
/// serializes whole commands against one context.
pub struct Context {
    pub table: Option<Table>,
    pub indexes: Vec<IndexSlot>,
    /// Controlling index ordinal; 0 means natural record order.
    pub order: usize,
    pub vars: VarStore,
    pub settings: Settings,
    pub workdir: PathBuf,
    /// Polled between records of iterating commands.
    pub cancel: Arc<AtomicBool>,
    /// QUIT was executed.
    pub quit: bool,
    /// CANCEL or RETURN was executed; stops the current script.
    pub stopped: bool,
    /// Predicate of the last LOCATE, resumed by CONTINUE.
    pub locate: Option<Expr>,
    /// Variables registered by @...GET, consumed by READ.
    pub pending_gets: Vec<String>,
    out: Box<dyn Write + Send>,
    input: Box<dyn BufRead + Send>,
    soft_error: Option<DbError>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            table: None,
            indexes: Vec::new(),
            order: 0,
            vars: VarStore::new(),
            settings: Settings::default(),
            workdir: PathBuf::from("."),
            cancel: Arc::new(AtomicBool::new(false)),
            quit: false,
            stopped: false,
            locate: None,
            pending_gets: Vec::new(),
            out: Box::new(std::io::stdout()),
            input: Box::new(BufReader::new(std::io::stdin())),
            soft_error: None,
        }
    }

    /// Redirect printed text into the given sink.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    /// Redirect interactive reads (WAIT/ACCEPT/INPUT/READ).
    pub fn with_input(mut self, input: Box<dyn BufRead + Send>) -> Self {
        self.input = input;
        self
    }

    // ── Work Area ──────────────────────────────────────────────────

    pub fn table_mut(&mut self) -> Result<&mut Table> {
        self.table.as_mut().ok_or(DbError::NoDatabaseOpen)
    }

    pub fn table_ref(&self) -> Result<&Table> {
        self.table.as_ref().ok_or(DbError::NoDatabaseOpen)
    }

    /// Resolve a user-supplied file name against the working directory,
    /// appending `ext` when the name carries no extension.
    pub fn resolve_path(&self, name: &str, ext: &str) -> PathBuf {
        let mut path = PathBuf::from(name);
        if path.extension().is_none() {
            path.set_extension(ext);
        }
        if path.is_absolute() {
            path
        } else {
            self.workdir.join(path)
        }
    }

    // ── Output / Input ─────────────────────────────────────────────

    pub fn print(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    pub fn println(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.write_all(b"\n");
    }

    pub fn flush_output(&mut self) {
        let _ = self.out.flush();
    }

    /// Read one line from the interactive input, without the newline.
    pub fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| DbError::FileRead(format!("stdin: {}", e)))?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    // ── Soft Errors ────────────────────────────────────────────────

    /// Record a non-aborting evaluation error (division by zero keeps
    /// evaluating with 0); the executor reports it after the command.
    pub fn set_soft_error(&mut self, err: DbError) {
        if self.soft_error.is_none() {
            self.soft_error = Some(err);
        }
    }

    pub fn take_soft_error(&mut self) -> Option<DbError> {
        self.soft_error.take()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Close the work area and any indexes, flushing pending writes.
    pub fn close_table(&mut self) -> Result<()> {
        self.close_indexes()?;
        self.locate = None;
        if let Some(table) = self.table.take() {
            table.close()?;
        }
        Ok(())
    }

    pub fn close_indexes(&mut self) -> Result<()> {
        for slot in &mut self.indexes {
            slot.index.flush()?;
        }
        self.indexes.clear();
        self.order = 0;
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
