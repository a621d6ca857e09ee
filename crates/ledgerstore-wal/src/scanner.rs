//! The WAL scanner (spec §4.3): recovery, snapshot visibility, and
//! checkpoint scans.
//!
//! Per spec §9 ("Reverse WAL scan correctness"), this does **not** walk the
//! log backward from a reader's snapshot decrementing by a fixed record
//! size — that is only correct if every record in the log has the same
//! size, which stops being true the moment a commit record (12 bytes)
//! appears between page records (`PAGE_RECORD_SIZE` bytes). Instead every
//! scan here is a single forward pass that builds an offset index (this
//! module's `ScanOutcome`), and visibility/checkpoint queries walk that
//! index rather than the file.

use std::collections::{HashMap, HashSet};

use ledgerstore_error::Result;
use ledgerstore_types::{LogOffset, PageData, PageId, TxId};
use ledgerstore_vfs::VfsFile;

use crate::record::{COMMIT_MAGIC, COMMIT_RECORD_SIZE, COMMIT_RECORD_TYPE, PAGE_RECORD_SIZE, PAGE_RECORD_TYPE, WalRecord};

/// A page record's location and payload, as seen during a forward scan.
#[derive(Debug, Clone)]
pub struct PageRecordEntry {
    pub end_offset: LogOffset,
    pub tx_id: TxId,
    pub page_id: PageId,
    pub data: PageData,
}

/// The result of one forward pass: every page record encountered (in log
/// order) and the set of transaction ids with a valid commit record in the
/// scanned region.
struct ScanOutcome {
    page_records: Vec<PageRecordEntry>,
    committed: HashSet<TxId>,
}

/// Reads WAL records through a shared file handle. Holds no mutable state;
/// every method is a fresh scan (or a scan bounded by a supplied offset).
pub struct WalScanner<'f, F: VfsFile> {
    file: &'f F,
}

impl<'f, F: VfsFile> WalScanner<'f, F> {
    #[must_use]
    pub fn new(file: &'f F) -> Self {
        Self { file }
    }

    /// Forward pass over `[0, bound)` (or the whole file, if `bound` is
    /// `None`). Stops cleanly — without error — at a torn tail (a record
    /// that needs more bytes than remain) or an unrecognized record type,
    /// per spec §4.3/§7.
    fn forward_scan(&self, bound: Option<LogOffset>) -> Result<ScanOutcome> {
        let len = self.file.len()?;
        let limit = match bound {
            Some(b) => b.get().min(len),
            None => len,
        };

        let mut offset = 0u64;
        let mut page_records = Vec::new();
        let mut committed = HashSet::new();

        loop {
            if offset >= limit {
                break;
            }

            let mut type_buf = [0u8; 4];
            let n = self.file.read_at(&mut type_buf, offset)?;
            if n < 4 {
                tracing::debug!(offset, "WAL scan stopped: torn tail at type tag");
                break;
            }
            let record_type = u32::from_le_bytes(type_buf);

            match record_type {
                PAGE_RECORD_TYPE => {
                    let mut buf = vec![0u8; PAGE_RECORD_SIZE];
                    let n = self.file.read_at(&mut buf, offset)?;
                    if n < PAGE_RECORD_SIZE {
                        tracing::debug!(offset, "WAL scan stopped: torn page record");
                        break;
                    }
                    let Some(WalRecord::Page {
                        tx_id,
                        page_id,
                        data,
                    }) = WalRecord::decode_page(&buf)
                    else {
                        tracing::warn!(offset, "WAL scan stopped: corrupt page record (zero tx_id)");
                        break;
                    };
                    let end = offset + PAGE_RECORD_SIZE as u64;
                    page_records.push(PageRecordEntry {
                        end_offset: LogOffset::new(end),
                        tx_id,
                        page_id,
                        data,
                    });
                    offset = end;
                }
                COMMIT_RECORD_TYPE => {
                    let mut buf = vec![0u8; COMMIT_RECORD_SIZE];
                    let n = self.file.read_at(&mut buf, offset)?;
                    if n < COMMIT_RECORD_SIZE {
                        tracing::debug!(offset, "WAL scan stopped: torn commit record");
                        break;
                    }
                    let Some(WalRecord::Commit { tx_id, magic }) = WalRecord::decode_commit(&buf) else {
                        tracing::warn!(offset, "WAL scan stopped: corrupt commit record (zero tx_id)");
                        break;
                    };
                    if magic == COMMIT_MAGIC {
                        committed.insert(tx_id);
                    } else {
                        tracing::warn!(offset, tx_id = tx_id.get(), "commit record with bad magic, treated as absent");
                    }
                    offset += COMMIT_RECORD_SIZE as u64;
                }
                other => {
                    tracing::warn!(offset, record_type = other, "WAL scan stopped: unrecognized record type");
                    break;
                }
            }
        }

        Ok(ScanOutcome {
            page_records,
            committed,
        })
    }

    /// Forward recovery scan: replay every committed transaction's page
    /// records, in log order, so a later write to the same page
    /// supersedes an earlier one. Uncommitted transactions' page records
    /// are discarded. Idempotent: running this twice over an unchanged WAL
    /// yields the same sequence of writes.
    pub fn recover(&self) -> Result<Vec<(PageId, PageData)>> {
        let outcome = self.forward_scan(None)?;
        let replay = outcome
            .page_records
            .into_iter()
            .filter(|rec| outcome.committed.contains(&rec.tx_id))
            .map(|rec| (rec.page_id, rec.data))
            .collect();
        Ok(replay)
    }

    /// Snapshot visibility scan bounded by `snapshot`: the latest
    /// committed page record for `page_id` whose commit record also lies
    /// within `[0, snapshot)`. `None` means the caller should fall back to
    /// the main data file.
    pub fn resolve(&self, snapshot: LogOffset, page_id: PageId) -> Result<Option<PageData>> {
        let outcome = self.forward_scan(Some(snapshot))?;
        let hit = outcome
            .page_records
            .into_iter()
            .rev()
            .find(|rec| rec.page_id == page_id && outcome.committed.contains(&rec.tx_id));
        Ok(hit.map(|rec| rec.data))
    }

    /// Checkpoint scan bounded by `horizon`: the latest committed version
    /// of every page touched in `[0, horizon)`, for the caller to write
    /// through the pager.
    pub fn checkpoint_pages(&self, horizon: LogOffset) -> Result<Vec<(PageId, PageData)>> {
        let outcome = self.forward_scan(Some(horizon))?;
        let mut latest: HashMap<PageId, PageData> = HashMap::new();
        for rec in outcome.page_records {
            if outcome.committed.contains(&rec.tx_id) {
                latest.insert(rec.page_id, rec.data);
            }
        }
        Ok(latest.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use ledgerstore_types::PAGE_SIZE;
    use ledgerstore_vfs::OsFile;

    use super::*;
    use crate::writer::WalWriter;

    fn page(byte: u8) -> PageData {
        PageData::from_slice(&[byte; PAGE_SIZE])
    }

    #[test]
    fn recover_replays_only_committed_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let mut writer = WalWriter::new(&file, 0);

        writer.append_page(TxId::new(1), PageId::new(0), page(0x01)).unwrap();
        writer.append_commit(TxId::new(1)).unwrap();

        // Uncommitted: page record with no matching commit.
        writer.append_page(TxId::new(2), PageId::new(0), page(0xAA)).unwrap();

        let scanner = WalScanner::new(&file);
        let replay = scanner.recover().unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].0, PageId::new(0));
        assert_eq!(replay[0].1.as_slice()[0], 0x01);
    }

    #[test]
    fn resolve_returns_latest_writer_wins_within_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let mut writer = WalWriter::new(&file, 0);

        writer.append_page(TxId::new(1), PageId::new(0), page(0x11)).unwrap();
        writer.append_commit(TxId::new(1)).unwrap();
        let snapshot_after_first = writer.end_offset();

        writer.append_page(TxId::new(2), PageId::new(0), page(0x22)).unwrap();
        writer.append_commit(TxId::new(2)).unwrap();

        let scanner = WalScanner::new(&file);
        let seen_by_r1 = scanner.resolve(snapshot_after_first, PageId::new(0)).unwrap();
        assert_eq!(seen_by_r1.unwrap().as_slice()[0], 0x11);

        let seen_by_r2 = scanner.resolve(writer.end_offset(), PageId::new(0)).unwrap();
        assert_eq!(seen_by_r2.unwrap().as_slice()[0], 0x22);
    }

    #[test]
    fn resolve_absent_when_no_qualifying_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let scanner = WalScanner::new(&file);
        let seen = scanner.resolve(LogOffset::zero(), PageId::new(9)).unwrap();
        assert!(seen.is_none());
    }

    #[test]
    fn torn_tail_is_discarded_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let mut writer = WalWriter::new(&file, 0);
        writer.append_page(TxId::new(1), PageId::new(0), page(0x01)).unwrap();
        writer.append_commit(TxId::new(1)).unwrap();

        // Simulate a torn write: append a handful of stray bytes after the
        // last good record.
        let good_len = file.len().unwrap();
        file.write_at(&[0xDEu8; 10], good_len).unwrap();

        let scanner = WalScanner::new(&file);
        let replay = scanner.recover().unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].1.as_slice()[0], 0x01);
    }

    #[test]
    fn zero_tx_id_page_record_stops_scan_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let mut writer = WalWriter::new(&file, 0);
        writer.append_page(TxId::new(1), PageId::new(0), page(0x01)).unwrap();
        writer.append_commit(TxId::new(1)).unwrap();

        // Simulate a bit-flip that zeroes a later record's tx_id field: a
        // well-formed, correctly-sized page record that is nonetheless
        // corrupt.
        let mut corrupt_buf = vec![0u8; PAGE_RECORD_SIZE];
        corrupt_buf[0..4].copy_from_slice(&PAGE_RECORD_TYPE.to_le_bytes());
        file.write_at(&corrupt_buf, writer.end_offset().get()).unwrap();

        let scanner = WalScanner::new(&file);
        let replay = scanner.recover().unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].1.as_slice()[0], 0x01);
    }

    #[test]
    fn bad_commit_magic_leaves_transaction_uncommitted() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let mut writer = WalWriter::new(&file, 0);
        writer.append_page(TxId::new(1), PageId::new(0), page(0x01)).unwrap();
        // Hand-craft a commit record with the wrong magic, bypassing the
        // writer (which always uses the correct one).
        let bad = WalRecord::Commit {
            tx_id: TxId::new(1),
            magic: 0xDEAD_BEEF,
        };
        file.write_at(&bad.encode(), writer.end_offset().get()).unwrap();

        let scanner = WalScanner::new(&file);
        let replay = scanner.recover().unwrap();
        assert!(replay.is_empty());
    }

    #[test]
    fn checkpoint_pages_takes_latest_committed_version_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("wal")).unwrap();
        let mut writer = WalWriter::new(&file, 0);

        writer.append_page(TxId::new(1), PageId::new(0), page(0x11)).unwrap();
        writer.append_commit(TxId::new(1)).unwrap();
        writer.append_page(TxId::new(2), PageId::new(0), page(0x22)).unwrap();
        writer.append_commit(TxId::new(2)).unwrap();
        let horizon = writer.end_offset();

        let scanner = WalScanner::new(&file);
        let pages = scanner.checkpoint_pages(horizon).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1.as_slice()[0], 0x22);
    }
}
