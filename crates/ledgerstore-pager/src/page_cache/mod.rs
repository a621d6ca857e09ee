//! The in-memory page cache (spec §4.4).
//!
//! Bounded, capacity 64 by default. Unlike the reference (which never
//! evicts and aborts once full), this implements the explicit policy spec
//! §4.4 asks reimplementations to define: LRU among clean pages. A dirty
//! entry is never evicted — it is pinned until its owning transaction
//! commits or aborts.

use std::collections::{HashMap, VecDeque};

use ledgerstore_error::{Result, StoreError};
use ledgerstore_types::{PageData, PageId, TxId};

/// One resident page: its id, which write transaction (if any) last staged
/// it, whether it has unflushed writes, and its bytes.
#[derive(Clone)]
pub struct CacheEntry {
    pub page_id: PageId,
    pub owner_tx: Option<TxId>,
    pub dirty: bool,
    pub data: PageData,
}

/// Bounded, LRU-among-clean page cache.
///
/// Per spec §4.4.A (see `SPEC_FULL.md`), this cache is writer-private: it is
/// populated only by a transaction's own staged writes, never by readers,
/// so it cannot leak uncommitted state across transactions.
pub struct PageCache {
    capacity: usize,
    entries: HashMap<PageId, CacheEntry>,
    /// Access order, oldest first. Only clean entries are eviction
    /// candidates; dirty entries stay in this list but are skipped.
    lru: VecDeque<PageId>,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "page cache capacity must be > 0");
        Self {
            capacity,
            entries: HashMap::new(),
            lru: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a resident entry without changing its eviction order (a pure
    /// cache hit/miss check; read-your-own-writes callers use this).
    #[must_use]
    pub fn lookup(&self, page_id: PageId) -> Option<&CacheEntry> {
        self.entries.get(&page_id)
    }

    fn touch(&mut self, page_id: PageId) {
        if let Some(pos) = self.lru.iter().position(|&id| id == page_id) {
            self.lru.remove(pos);
        }
        self.lru.push_back(page_id);
    }

    /// Get the entry for `page_id`, creating a zero-initialized one owned
    /// by `owner_tx` if absent. Does not mark it dirty.
    pub fn insert_or_get(&mut self, page_id: PageId, owner_tx: TxId) -> Result<&mut CacheEntry> {
        if !self.entries.contains_key(&page_id) {
            self.make_room()?;
            self.entries.insert(
                page_id,
                CacheEntry {
                    page_id,
                    owner_tx: Some(owner_tx),
                    dirty: false,
                    data: PageData::zeroed(),
                },
            );
        }
        self.touch(page_id);
        Ok(self.entries.get_mut(&page_id).expect("just inserted"))
    }

    /// Overwrite an entry's data, marking it dirty and owned by `tx_id`.
    /// Creates the entry if absent.
    pub fn mark_dirty(&mut self, page_id: PageId, tx_id: TxId, data: PageData) -> Result<()> {
        let entry = self.insert_or_get(page_id, tx_id)?;
        entry.data = data;
        entry.dirty = true;
        entry.owner_tx = Some(tx_id);
        Ok(())
    }

    /// Reset the dirty flag on every entry owned by `tx_id`. Called at
    /// commit time once the WAL append + flush has made those pages
    /// durable.
    pub fn clear_dirty_for(&mut self, tx_id: TxId) {
        for entry in self.entries.values_mut() {
            if entry.owner_tx == Some(tx_id) {
                entry.dirty = false;
            }
        }
    }

    /// Discard every entry owned by `tx_id`, in insertion-independent
    /// order. Used by `abort`.
    pub fn discard_for(&mut self, tx_id: TxId) {
        let victims: Vec<PageId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.owner_tx == Some(tx_id))
            .map(|(id, _)| *id)
            .collect();
        for id in victims {
            self.entries.remove(&id);
            if let Some(pos) = self.lru.iter().position(|&x| x == id) {
                self.lru.remove(pos);
            }
        }
    }

    /// Iterate the dirty entries owned by `tx_id`, in the order they were
    /// first staged (insertion order via the LRU list), for commit to
    /// append as WAL page records.
    #[must_use]
    pub fn dirty_entries_for(&self, tx_id: TxId) -> Vec<(PageId, PageData)> {
        self.lru
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.owner_tx == Some(tx_id) && e.dirty)
            .map(|e| (e.page_id, e.data.clone()))
            .collect()
    }

    fn make_room(&mut self) -> Result<()> {
        if self.entries.len() < self.capacity {
            return Ok(());
        }
        let victim = self
            .lru
            .iter()
            .find(|id| self.entries.get(id).is_some_and(|e| !e.dirty))
            .copied();
        match victim {
            Some(id) => {
                self.entries.remove(&id);
                if let Some(pos) = self.lru.iter().position(|&x| x == id) {
                    self.lru.remove(pos);
                }
                Ok(())
            }
            None => Err(StoreError::CacheFull),
        }
    }
}
