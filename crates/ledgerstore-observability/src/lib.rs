//! Tracing setup for `ledgerstore`'s binaries and tests.
//!
//! Every component already emits `tracing` spans and events at its own
//! boundaries (pager I/O, WAL append/flush, commit, checkpoint, recovery);
//! this crate just wires a subscriber up once, the way the teacher's
//! workspace centralizes `tracing-subscriber` setup rather than letting each
//! binary configure it ad hoc.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a global `tracing` subscriber reading its filter from
/// `RUST_LOG`, defaulting to `info` when unset.
///
/// Idempotent in the sense that a second call is harmless (the underlying
/// `try_init` simply reports "already set" and is ignored) — callers in
/// tests that each want logging can call this unconditionally.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_does_not_panic_when_called_twice() {
        init_tracing();
        init_tracing();
    }
}
