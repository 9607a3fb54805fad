//! xdb — embedded dBASE III+ compatible database engine.
//!
//! Three cooperating cores: the DBF table engine (`dbf`), the XDX B-tree
//! index engine (`xdx`), and the command language (`lang`) executed against
//! an interpreter context (`interp`).
//!
//! ```no_run
//! use xdb::interp::{run_line, Context};
//!
//! let mut ctx = Context::new();
//! run_line(&mut ctx, "CREATE people (NAME C(20), AGE N(3,0))");
//! run_line(&mut ctx, "APPEND BLANK");
//! run_line(&mut ctx, "REPLACE NAME WITH \"John Doe\", AGE WITH 25");
//! run_line(&mut ctx, "LIST NAME FOR AGE > 20");
//! ```

pub mod dbf;
pub mod error;
pub mod interp;
pub mod lang;
pub mod util;
pub mod value;
pub mod xdx;

pub use error::{DbError, Result};
pub use value::Value;
