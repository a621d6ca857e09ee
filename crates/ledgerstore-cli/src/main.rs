//! `ledgerstore`: a small inspection/maintenance CLI over a database file
//! (spec §6.A). Exit code 0 on success, nonzero on any fatal
//! [`ledgerstore_error::StoreError`] surfaced to the top level, per
//! spec.md §6's guidance for implementations that expose a CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ledgerstore::Database;
use ledgerstore_types::PageId;

#[derive(Parser)]
#[command(name = "ledgerstore", about = "Inspect and operate on a ledgerstore database file")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open (running recovery if needed) and report basic status.
    Open {
        /// Path to the database's data file.
        path: PathBuf,
    },
    /// Run a checkpoint, migrating durable WAL pages into the data file.
    Checkpoint {
        /// Path to the database's data file.
        path: PathBuf,
    },
    /// Print the bytes of a single page, as seen by a fresh reader snapshot.
    Dump {
        /// Path to the database's data file.
        path: PathBuf,
        /// The page id to dump.
        page_id: u32,
    },
}

fn run(cli: Cli) -> ledgerstore_error::Result<()> {
    match cli.command {
        Command::Open { path } => {
            let db = Database::open(&path)?;
            println!(
                "opened {} (live readers: {})",
                path.display(),
                db.live_reader_count()
            );
        }
        Command::Checkpoint { path } => {
            let db = Database::open(&path)?;
            let horizon = db.checkpoint()?;
            println!("checkpoint advanced to offset {}", horizon.get());
        }
        Command::Dump { path, page_id } => {
            let db = Database::open(&path)?;
            let rtxn = db.begin_read()?;
            let page = db.read_page(&rtxn, PageId::new(page_id))?;
            db.end_read(rtxn);
            println!("{}", hex_dump(page.as_slice()));
        }
    }
    Ok(())
}

/// A minimal hex dump, 32 bytes per line, for `dump`'s output.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for chunk in bytes.chunks(32) {
        for byte in chunk {
            out.push_str(&format!("{byte:02x}"));
        }
        out.push('\n');
    }
    out
}

fn main() -> ExitCode {
    ledgerstore_observability::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "ledgerstore-cli: fatal error");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
