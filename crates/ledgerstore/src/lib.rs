//! `ledgerstore`: the Storage API facade (spec §4.6, §6).
//!
//! [`Database`] wires together the pager, WAL writer/scanner, page cache,
//! and transaction manager into the ten operations spec §6 enumerates:
//! `open`, `close`, `begin_write`, `begin_read`, `write_page`, `read_page`,
//! `commit`, `abort`, `checkpoint`, `end_read`.
//!
//! Unlike the reference implementation this is distilled from, state lives
//! in an explicit handle rather than process-wide statics (spec §9: "a
//! reimplementation SHOULD wrap them in an explicit engine handle so
//! multiple independent databases can coexist in one process"), so more
//! than one `Database` can be open at once, each against its own files.

use std::path::{Path, PathBuf};

use ledgerstore_error::Result;
use ledgerstore_mvcc::{ReaderTxn, TransactionManager, WriteTxn};
pub use ledgerstore_pager::OpenOptions;
use ledgerstore_pager::{PageCache, Pager};
use ledgerstore_types::{LogOffset, PageData, PageId};
use ledgerstore_vfs::{OsFile, OsVfs, Vfs, VfsFile};
use ledgerstore_wal::{WalScanner, WalWriter};
use parking_lot::Mutex;

pub use ledgerstore_join as join;
pub use ledgerstore_mvcc::{ReaderTxn as ReaderHandle, WriteTxn as WriteHandle};

const CHECKPOINT_FILE_SUFFIX: &str = "-checkpoint";

fn sidecar_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// The open database: pager, WAL, page cache, and transaction manager
/// behind one handle.
///
/// Generic over the underlying file implementation so tests can swap in a
/// fault-injecting [`VfsFile`] without touching the real filesystem; the
/// default, [`OsFile`], is what [`Database::open`] uses.
pub struct Database<F: VfsFile = OsFile> {
    pager: Pager<F>,
    checkpoint_file: F,
    txn_mgr: TransactionManager,
    cache: Mutex<PageCache>,
    checkpoint_mutex: Mutex<()>,
    durable: bool,
}

impl Database<OsFile> {
    /// Open (creating if absent) the database at `path`, using the real
    /// filesystem and default [`OpenOptions`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(OsVfs, path, &OpenOptions::default())
    }

    /// Open with explicit [`OpenOptions`] (cache capacity, durability).
    pub fn open_with_options(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        Self::open_with(OsVfs, path, options)
    }
}

impl<F: VfsFile> Database<F> {
    /// Open through an arbitrary [`Vfs`] implementation. Runs forward
    /// recovery (spec §4.3) before returning: every committed page record
    /// found in the WAL is replayed into the data file, so a fresh
    /// `Database` handle always reflects the last durable state even after
    /// an unclean shutdown.
    pub fn open_with<V>(vfs: V, path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self>
    where
        V: Vfs<File = F> + Clone,
    {
        let data_path = path.as_ref().to_path_buf();
        let pager = Pager::open_with(vfs.clone(), &data_path, options)?;
        let checkpoint_path = sidecar_path(&data_path, CHECKPOINT_FILE_SUFFIX);
        let checkpoint_file = vfs.open(&checkpoint_path)?;

        tracing::info!(path = %data_path.display(), "running WAL recovery");
        let scanner = WalScanner::new(pager.wal_file());
        let replay = scanner.recover()?;
        let replayed = replay.len();
        for (page_id, data) in replay {
            pager.write_page_raw(page_id, &data)?;
        }
        if replayed > 0 {
            pager.sync_data()?;
        }
        tracing::info!(replayed, "WAL recovery complete");

        Ok(Self {
            pager,
            checkpoint_file,
            txn_mgr: TransactionManager::new(),
            cache: Mutex::new(PageCache::new(options.cache_capacity)),
            checkpoint_mutex: Mutex::new(()),
            durable: options.durable,
        })
    }

    /// Explicit lifecycle close, matching spec §9's `open → … → close`.
    /// File handles are released by `Drop` regardless; this exists as the
    /// documented, explicit counterpart to `open` in the operation list
    /// spec §6 enumerates.
    pub fn close(self) {
        tracing::info!("database closed");
    }

    fn wal_end(&self) -> Result<LogOffset> {
        Ok(LogOffset::new(self.pager.wal_file().len()?))
    }

    /// Begin a write transaction. Blocks until any other live write
    /// transaction commits or aborts (spec §5: one writer at a time).
    #[must_use]
    pub fn begin_write(&self) -> WriteTxn<'_> {
        self.txn_mgr.begin_write()
    }

    /// Begin a reader transaction, capturing the current WAL end as its
    /// snapshot.
    pub fn begin_read(&self) -> Result<ReaderTxn> {
        let end = self.wal_end()?;
        Ok(self.txn_mgr.begin_read(end))
    }

    /// Remove a reader's snapshot from the live set.
    pub fn end_read(&self, rxn: ReaderTxn) {
        self.txn_mgr.end_read(rxn);
    }

    /// Stage a page write in the cache, tagged as owned and dirty for
    /// `wtxn`. No log I/O happens here (spec §4.6).
    pub fn write_page(&self, wtxn: &WriteTxn<'_>, page_id: PageId, data: PageData) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.mark_dirty(page_id, wtxn.tx_id(), data)
    }

    /// Resolve a page for a reader transaction: WAL snapshot visibility
    /// scan bounded by `rtxn.snapshot()`, falling back to the main data
    /// file (spec §4.6 steps 2-3).
    ///
    /// Per `SPEC_FULL.md` §4.4.A, the page cache is writer-private: a
    /// reader never observes it, which is what makes snapshot isolation
    /// (spec §8 property 3) hold regardless of how a concurrent writer's
    /// staging interleaves with this call.
    pub fn read_page(&self, rtxn: &ReaderTxn, page_id: PageId) -> Result<PageData> {
        let scanner = WalScanner::new(self.pager.wal_file());
        if let Some(data) = scanner.resolve(rtxn.snapshot(), page_id)? {
            return Ok(data);
        }
        self.pager.read_page_raw(page_id)
    }

    /// Resolve a page for the live writer, preserving read-your-own-writes
    /// (spec §4.6 step 1) without leaking other transactions' state: this
    /// only ever consults `wtxn`'s own cache entry, then falls back to the
    /// same WAL-then-datafile path a reader would use, bounded by the
    /// current WAL end (the writer always sees everything durable so far).
    pub fn read_page_for_write(&self, wtxn: &WriteTxn<'_>, page_id: PageId) -> Result<PageData> {
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.lookup(page_id) {
                if entry.owner_tx == Some(wtxn.tx_id()) {
                    return Ok(entry.data.clone());
                }
            }
        }
        let end = self.wal_end()?;
        let scanner = WalScanner::new(self.pager.wal_file());
        if let Some(data) = scanner.resolve(end, page_id)? {
            return Ok(data);
        }
        self.pager.read_page_raw(page_id)
    }

    /// Commit `wtxn`: append its dirty pages as WAL page records, then a
    /// commit record, then flush (spec §4.2, §4.6). The writer mutex held
    /// by `wtxn` is released when this returns, since the handle is
    /// consumed by value.
    ///
    /// The commit record is appended unconditionally, even when `wtxn`
    /// staged no dirty pages: `commit_tx` in the reference this engine is
    /// distilled from always calls `wal_commit` after its page-record loop,
    /// as two separate unconditional steps, so an empty write transaction
    /// still durably records that `tx_id` committed.
    pub fn commit(&self, wtxn: WriteTxn<'_>) -> Result<()> {
        let tx_id = wtxn.tx_id();
        let dirty = {
            let cache = self.cache.lock();
            cache.dirty_entries_for(tx_id)
        };

        let start_len = self.pager.wal_file().len()?;
        let mut writer = WalWriter::new(self.pager.wal_file(), start_len).with_durable(self.durable);
        for (page_id, data) in &dirty {
            writer.append_page(tx_id, *page_id, data.clone())?;
        }
        writer.append_commit(tx_id)?;

        {
            let mut cache = self.cache.lock();
            cache.clear_dirty_for(tx_id);
        }

        tracing::info!(
            tx_id = tx_id.get(),
            pages = dirty.len(),
            end_offset = writer.end_offset().get(),
            "commit durable"
        );
        Ok(())
    }

    /// Abort `wtxn`: discard its staged cache entries. No log output; any
    /// partial page records it may have had no commit marker, so recovery
    /// ignores them anyway.
    pub fn abort(&self, wtxn: WriteTxn<'_>) {
        let tx_id = wtxn.tx_id();
        self.cache.lock().discard_for(tx_id);
        tracing::info!(tx_id = tx_id.get(), "transaction aborted");
    }

    /// Migrate durable, visible WAL pages into the data file and advance
    /// the persistent checkpoint pointer (spec §4.3, §4.6).
    ///
    /// The horizon is fixed once, under the readers-registry lock, for the
    /// duration of this call (spec §5): `min(live reader snapshots)`, or
    /// the current WAL end if no reader is live. Concurrent reads and
    /// writes are not blocked by the checkpoint itself — only two
    /// concurrent checkpoints are serialized, by `checkpoint_mutex`.
    pub fn checkpoint(&self) -> Result<LogOffset> {
        let _guard = self.checkpoint_mutex.lock();

        let horizon = match self.txn_mgr.oldest_live_snapshot() {
            Some(snapshot) => snapshot,
            None => self.wal_end()?,
        };

        let scanner = WalScanner::new(self.pager.wal_file());
        let pages = scanner.checkpoint_pages(horizon)?;
        let moved = pages.len();
        for (page_id, data) in pages {
            self.pager.write_page_raw(page_id, &data)?;
        }
        self.pager.sync_data()?;
        self.persist_checkpoint_offset(horizon)?;

        tracing::info!(horizon = horizon.get(), pages_moved = moved, "checkpoint complete");
        Ok(horizon)
    }

    /// The persisted checkpoint pointer, or zero if none has ever been
    /// written. Exposed for tests and the CLI's `inspect` command.
    pub fn checkpoint_offset(&self) -> Result<LogOffset> {
        let mut buf = [0u8; 8];
        let n = self.checkpoint_file.read_at(&mut buf, 0)?;
        if n < 8 {
            return Ok(LogOffset::zero());
        }
        Ok(LogOffset::new(u64::from_le_bytes(buf)))
    }

    fn persist_checkpoint_offset(&self, offset: LogOffset) -> Result<()> {
        self.checkpoint_file.write_at(&offset.get().to_le_bytes(), 0)?;
        self.checkpoint_file.sync_all()
    }

    /// Number of live reader snapshots currently registered. Exposed for
    /// the CLI's `inspect` command.
    #[must_use]
    pub fn live_reader_count(&self) -> usize {
        self.txn_mgr.live_reader_count()
    }
}
