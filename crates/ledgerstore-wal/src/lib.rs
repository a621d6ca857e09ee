//! WAL record layout, writer, and scanner (spec §3, §4.2, §4.3).

pub mod record;
pub mod scanner;
pub mod writer;

pub use record::{COMMIT_MAGIC, COMMIT_RECORD_SIZE, PAGE_RECORD_SIZE, WalRecord};
pub use scanner::WalScanner;
pub use writer::WalWriter;
