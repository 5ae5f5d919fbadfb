//! # CLI — offline archive dump
//!
//! Decodes one archive file and prints every record to stdout, one lossy
//! UTF-8 line per record. Damaged records are reported on stderr and
//! skipped by resynchronizing at the next sync marker, so one bad record
//! never hides the rest of the file.
//!
//! ## Usage
//!
//! ```text
//! $ cargo run -p cli -- app-20260807.bin
//! ```
//!
//! ## Configuration
//!
//! Settings come from environment variables:
//!
//! ```text
//! ARCHIVE_SERVER_KEY   hex server private key for encrypted archives
//! ARCHIVE_PROTO_NAME   expected producer name; mismatch aborts
//! ```

use anyhow::{bail, Context, Result};
use archive::{ArchiveError, ArchiveReader};
use std::env;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let path = env::args().nth(1).context("usage: cli <archive-file>")?;
    let server_key = env::var("ARCHIVE_SERVER_KEY").ok();
    let expected_proto = env::var("ARCHIVE_PROTO_NAME").ok();

    let mut reader = ArchiveReader::open(&path, server_key.as_deref())
        .with_context(|| format!("failed to open archive [{}]", path))?;

    if let Some(expected) = expected_proto {
        if reader.proto_name() != expected {
            bail!(
                "proto name mismatch: archive was written by {:?}, expected {:?}",
                reader.proto_name(),
                expected
            );
        }
    }

    let mut decoded = 0usize;
    let mut rejected = 0usize;
    loop {
        match reader.read_next() {
            Ok(Some(record)) => {
                decoded += 1;
                println!("{}", String::from_utf8_lossy(&record));
            }
            Ok(None) => break,
            Err(ArchiveError::Record(e)) => {
                rejected += 1;
                eprintln!("record rejected at offset {}: {}", reader.position(), e);
                if !reader.resync() {
                    break;
                }
            }
            Err(e) => return Err(e).context("archive unreadable"),
        }
    }

    eprintln!("{}: {} records decoded, {} rejected", path, decoded, rejected);
    Ok(())
}
