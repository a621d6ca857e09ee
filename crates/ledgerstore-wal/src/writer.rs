//! The WAL writer (spec §4.2): append-only, with the commit flush as the
//! single durability boundary.

use ledgerstore_error::Result;
use ledgerstore_types::{LogOffset, PageData, PageId, TxId};
use ledgerstore_vfs::VfsFile;

use crate::record::{COMMIT_MAGIC, WalRecord};

/// Append-only writer over a WAL file handle.
///
/// `append_page` performs no implicit flush; `append_commit` always
/// flushes before returning, which is the contract spec §4.2 calls out as
/// load-bearing: "on successful return of commit, all of that
/// transaction's page records and the commit marker are persistent".
pub struct WalWriter<'f, F: VfsFile> {
    file: &'f F,
    end_offset: LogOffset,
    durable: bool,
}

impl<'f, F: VfsFile> WalWriter<'f, F> {
    /// Wrap a WAL file handle whose current length is `initial_len` (the
    /// caller has typically just finished a recovery scan and already
    /// knows this).
    #[must_use]
    pub fn new(file: &'f F, initial_len: u64) -> Self {
        Self {
            file,
            end_offset: LogOffset::new(initial_len),
            durable: true,
        }
    }

    /// Disable the durable flush on `append_commit`. Only for tests that
    /// don't care about crash durability.
    #[must_use]
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Current end of the log. This is what `begin_read` captures as a
    /// reader's snapshot.
    #[must_use]
    pub fn end_offset(&self) -> LogOffset {
        self.end_offset
    }

    fn append(&mut self, record: &WalRecord) -> Result<LogOffset> {
        let bytes = record.encode();
        let start = self.end_offset;
        self.file.write_at(&bytes, start.get())?;
        let end = start + bytes.len() as u64;
        self.end_offset = end;
        Ok(end)
    }

    /// Append a page record. No implicit flush.
    pub fn append_page(&mut self, tx_id: TxId, page_id: PageId, data: PageData) -> Result<LogOffset> {
        let end = self.append(&WalRecord::Page {
            tx_id,
            page_id,
            data,
        })?;
        tracing::trace!(tx_id = tx_id.get(), page_id = page_id.get(), "append_page");
        Ok(end)
    }

    /// Append a commit record and durably flush. On successful return, the
    /// commit record and every page record written earlier for `tx_id` are
    /// persistent.
    pub fn append_commit(&mut self, tx_id: TxId) -> Result<LogOffset> {
        let end = self.append(&WalRecord::Commit {
            tx_id,
            magic: COMMIT_MAGIC,
        })?;
        if self.durable {
            self.file.sync_all()?;
        }
        tracing::debug!(tx_id = tx_id.get(), end_offset = end.get(), "append_commit");
        Ok(end)
    }
}
