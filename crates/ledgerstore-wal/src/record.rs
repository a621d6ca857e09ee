//! WAL record layout (spec §3, §6).
//!
//! Two fixed-width record kinds, concatenated with no inter-record padding,
//! all fields little-endian. A record's position in the log is its byte
//! offset from the start of the WAL file.

use ledgerstore_types::{PAGE_SIZE, PageData, PageId, TxId};

/// `type` tag of a page record.
pub const PAGE_RECORD_TYPE: u32 = 1;
/// `type` tag of a commit record.
pub const COMMIT_RECORD_TYPE: u32 = 2;
/// Magic value a commit record must carry to be considered valid.
pub const COMMIT_MAGIC: u32 = 0xC0DE_CAFE;

/// `type(4) + tx_id(4) + page_id(4) + data(PAGE_SIZE)`.
pub const PAGE_RECORD_SIZE: usize = 4 + 4 + 4 + PAGE_SIZE;
/// `type(4) + tx_id(4) + magic(4)`.
pub const COMMIT_RECORD_SIZE: usize = 4 + 4 + 4;

/// The two WAL record kinds.
#[derive(Debug, Clone)]
pub enum WalRecord {
    Page {
        tx_id: TxId,
        page_id: PageId,
        data: PageData,
    },
    Commit {
        tx_id: TxId,
        /// The magic value actually present. Compare against
        /// [`COMMIT_MAGIC`] to decide whether the commit is valid; a
        /// mismatch is "treated as absent" per spec §4.3, not rejected
        /// outright — the caller decides what that means for the scan.
        magic: u32,
    },
}

impl WalRecord {
    /// Encoded size of this record on disk.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Page { .. } => PAGE_RECORD_SIZE,
            Self::Commit { .. } => COMMIT_RECORD_SIZE,
        }
    }

    /// Serialize this record to its on-disk little-endian form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Page {
                tx_id,
                page_id,
                data,
            } => {
                let mut buf = Vec::with_capacity(PAGE_RECORD_SIZE);
                buf.extend_from_slice(&PAGE_RECORD_TYPE.to_le_bytes());
                buf.extend_from_slice(&tx_id.get().to_le_bytes());
                buf.extend_from_slice(&page_id.get().to_le_bytes());
                buf.extend_from_slice(data.as_slice());
                buf
            }
            Self::Commit { tx_id, magic } => {
                let mut buf = Vec::with_capacity(COMMIT_RECORD_SIZE);
                buf.extend_from_slice(&COMMIT_RECORD_TYPE.to_le_bytes());
                buf.extend_from_slice(&tx_id.get().to_le_bytes());
                buf.extend_from_slice(&magic.to_le_bytes());
                buf
            }
        }
    }

    /// Decode a page record from exactly `PAGE_RECORD_SIZE` bytes,
    /// including its leading type tag.
    ///
    /// Returns `None` if the `tx_id` field is `0` — on-disk corruption, not
    /// a value this engine ever writes — so the caller can treat the record
    /// as corrupt rather than panicking on untrusted bytes.
    ///
    /// # Panics
    /// Panics if `buf.len() != PAGE_RECORD_SIZE` or the type tag does not
    /// match — callers must peek the type first.
    #[must_use]
    pub fn decode_page(buf: &[u8]) -> Option<Self> {
        assert_eq!(buf.len(), PAGE_RECORD_SIZE);
        debug_assert_eq!(u32::from_le_bytes(buf[0..4].try_into().unwrap()), PAGE_RECORD_TYPE);
        let tx_id = TxId::try_new(u32::from_le_bytes(buf[4..8].try_into().unwrap()))?;
        let page_id = PageId::new(u32::from_le_bytes(buf[8..12].try_into().unwrap()));
        let data = PageData::from_slice(&buf[12..12 + PAGE_SIZE]);
        Some(Self::Page {
            tx_id,
            page_id,
            data,
        })
    }

    /// Decode a commit record from exactly `COMMIT_RECORD_SIZE` bytes,
    /// including its leading type tag.
    ///
    /// Returns `None` if the `tx_id` field is `0`, for the same reason as
    /// [`WalRecord::decode_page`].
    #[must_use]
    pub fn decode_commit(buf: &[u8]) -> Option<Self> {
        assert_eq!(buf.len(), COMMIT_RECORD_SIZE);
        debug_assert_eq!(
            u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            COMMIT_RECORD_TYPE
        );
        let tx_id = TxId::try_new(u32::from_le_bytes(buf[4..8].try_into().unwrap()))?;
        let magic = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        Some(Self::Commit { tx_id, magic })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn page_record_round_trips_for_arbitrary_ids_and_data(
            tx_id in 1u32..=u32::MAX,
            page_id in any::<u32>(),
            byte in any::<u8>(),
        ) {
            let rec = WalRecord::Page {
                tx_id: TxId::new(tx_id),
                page_id: PageId::new(page_id),
                data: PageData::from_slice(&[byte; PAGE_SIZE]),
            };
            let bytes = rec.encode();
            prop_assert_eq!(bytes.len(), PAGE_RECORD_SIZE);
            match WalRecord::decode_page(&bytes) {
                Some(WalRecord::Page { tx_id: got_tx, page_id: got_page, data }) => {
                    prop_assert_eq!(got_tx.get(), tx_id);
                    prop_assert_eq!(got_page.get(), page_id);
                    prop_assert!(data.as_slice().iter().all(|&b| b == byte));
                }
                Some(WalRecord::Commit { .. }) => prop_assert!(false, "expected page record"),
                None => prop_assert!(false, "tx_id was nonzero by construction"),
            }
        }
    }

    #[test]
    fn page_record_round_trips() {
        let rec = WalRecord::Page {
            tx_id: TxId::new(3),
            page_id: PageId::new(7),
            data: PageData::from_slice(&[0xAB; 16]),
        };
        let bytes = rec.encode();
        assert_eq!(bytes.len(), PAGE_RECORD_SIZE);
        let decoded = WalRecord::decode_page(&bytes).unwrap();
        match decoded {
            WalRecord::Page {
                tx_id,
                page_id,
                data,
            } => {
                assert_eq!(tx_id.get(), 3);
                assert_eq!(page_id.get(), 7);
                assert_eq!(data.as_slice()[0], 0xAB);
            }
            WalRecord::Commit { .. } => panic!("expected page record"),
        }
    }

    #[test]
    fn commit_record_round_trips() {
        let rec = WalRecord::Commit {
            tx_id: TxId::new(5),
            magic: COMMIT_MAGIC,
        };
        let bytes = rec.encode();
        assert_eq!(bytes.len(), COMMIT_RECORD_SIZE);
        match WalRecord::decode_commit(&bytes).unwrap() {
            WalRecord::Commit { tx_id, magic } => {
                assert_eq!(tx_id.get(), 5);
                assert_eq!(magic, COMMIT_MAGIC);
            }
            WalRecord::Page { .. } => panic!("expected commit record"),
        }
    }

    #[test]
    fn zero_tx_id_is_reported_as_corrupt_not_a_panic() {
        let mut page_buf = vec![0u8; PAGE_RECORD_SIZE];
        page_buf[0..4].copy_from_slice(&PAGE_RECORD_TYPE.to_le_bytes());
        assert!(WalRecord::decode_page(&page_buf).is_none());

        let mut commit_buf = vec![0u8; COMMIT_RECORD_SIZE];
        commit_buf[0..4].copy_from_slice(&COMMIT_RECORD_TYPE.to_le_bytes());
        commit_buf[8..12].copy_from_slice(&COMMIT_MAGIC.to_le_bytes());
        assert!(WalRecord::decode_commit(&commit_buf).is_none());
    }
}
