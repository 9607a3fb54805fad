//! Interpreter: execution context, variable store and command executor.

pub mod context;
pub mod exec;
pub mod vars;

pub use context::{Context, Settings, SharedBuf};
pub use exec::{execute, run_line, run_script};
pub use vars::VarStore;
