//! xdb script driver.
//!
//! Runs a command script line by line against one interpreter context.
//!
//! Usage:
//!   xdb [--dir <path>] [--quiet] <script>
//!
//! Exit codes: 0 on normal completion, 1 on argument error or script open
//! failure. SIGINT sets the interpreter's cancel flag, which is observed
//! between lines and between records of iterating commands.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use xdb::interp::{run_line, Context};

struct Args {
    script: PathBuf,
    dir: Option<PathBuf>,
    quiet: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut script = None;
    let mut dir = None;
    let mut quiet = false;
    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--dir" => {
                let value = argv.next().ok_or("--dir needs a path")?;
                dir = Some(PathBuf::from(value));
            }
            "--quiet" => quiet = true,
            "--help" | "-h" => {
                return Err("usage: xdb [--dir <path>] [--quiet] <script>".into())
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option {}", other));
            }
            other => {
                if script.is_some() {
                    return Err("only one script may be given".into());
                }
                script = Some(PathBuf::from(other));
            }
        }
    }
    Ok(Args {
        script: script.ok_or("usage: xdb [--dir <path>] [--quiet] <script>")?,
        dir,
        quiet,
    })
}

fn run(args: Args) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("cannot open script {}", args.script.display()))?;

    let mut ctx = Context::new();
    if let Some(dir) = args.dir {
        ctx.workdir = dir;
    }
    if args.quiet {
        ctx = ctx.with_output(Box::new(std::io::sink()));
    }

    let cancel = ctx.cancel.clone();
    signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.clone())
        .context("cannot install SIGINT handler")?;

    for line in source.lines() {
        if ctx.quit || ctx.stopped {
            break;
        }
        if cancel.load(Ordering::Relaxed) {
            eprintln!("Interrupted");
            break;
        }
        run_line(&mut ctx, line);
    }
    ctx.close_table().ok();
    ctx.flush_output();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(1);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(1)
        }
    }
}
