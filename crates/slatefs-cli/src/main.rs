//! SlateFs CLI - interactive shell over the shared namespace
//!
//! Usage:
//!   slatefs                          # default snapshot file in the cwd
//!   slatefs --snapshot /tmp/fs.img   # explicit snapshot location
//!   slatefs --autosave-secs 5        # flush dirty state more often

mod shell;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use slatefs::worker::{self, TaskWorker};
use slatefs::SlateFs;

/// SlateFs - in-memory multi-user filesystem
#[derive(Parser, Debug)]
#[command(name = "slatefs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Snapshot file to load on start and save to
    #[arg(long, default_value = "slatefs.img")]
    snapshot: PathBuf,

    /// Seconds between automatic snapshot flushes
    #[arg(long, default_value_t = 30)]
    autosave_secs: u64,

    /// Log filter, e.g. "debug" or "slatefs=trace"
    #[arg(long, default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    let fs = Arc::new(SlateFs::builder().snapshot_path(&args.snapshot).build());

    let (worker, worker_handle) = TaskWorker::spawn(Arc::clone(&fs));
    let autosave = worker::spawn_autosave(
        Arc::clone(&fs),
        Duration::from_secs(args.autosave_secs.max(1)),
    );

    shell::menu(&worker).await?;

    // Flush anything the autosave has not picked up yet.
    if fs.is_dirty() {
        fs.save()?;
    }
    autosave.abort();
    drop(worker);
    worker_handle.await?;
    Ok(())
}
