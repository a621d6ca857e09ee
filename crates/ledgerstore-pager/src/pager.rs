//! The pager: raw, page-aligned access to the data file and the file handle
//! the WAL lives on (spec §4.1).
//!
//! `Pager` opens both files at `open()` time — the data file at the given
//! path, the WAL at `<path>-wal` — mirroring spec §4.1's "opens two files at
//! a user-supplied base path". The WAL file handle is exposed via
//! [`Pager::wal_file`] for `ledgerstore-wal`'s writer and scanner to use
//! directly; the pager itself only ever touches the data file.

use std::path::{Path, PathBuf};

use ledgerstore_error::Result;
use ledgerstore_types::{PAGE_SIZE, PageData, PageId};
use ledgerstore_vfs::{OsFile, Vfs, VfsFile, OsVfs};

/// Tuning knobs for opening a database. Durability is on by default and can
/// only be turned off explicitly, so it can never silently regress.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Page-cache capacity, in pages. Spec §4.4 reference value is 64.
    pub cache_capacity: usize,
    /// Whether `sync_data`/WAL flushes actually call `fsync`. Only ever
    /// disabled in tests that don't care about crash durability.
    pub durable: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            durable: true,
        }
    }
}

/// Raw page-aligned access to the data file, plus the WAL file handle.
pub struct Pager<F: VfsFile> {
    data_file: F,
    wal_file: F,
    data_path: PathBuf,
    wal_path: PathBuf,
    durable: bool,
}

impl Pager<OsFile> {
    /// Open (creating if absent) the data file at `path` and the WAL at
    /// `<path>-wal`, using the real filesystem.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        Self::open_with(OsVfs, path, options)
    }
}

impl<F: VfsFile> Pager<F> {
    /// Open both files through an arbitrary [`Vfs`] implementation.
    pub fn open_with<V>(vfs: V, path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self>
    where
        V: Vfs<File = F>,
    {
        let data_path = path.as_ref().to_path_buf();
        let mut wal_name = data_path.as_os_str().to_owned();
        wal_name.push("-wal");
        let wal_path = PathBuf::from(wal_name);

        let data_file = vfs.open(&data_path)?;
        let wal_file = vfs.open(&wal_path)?;

        tracing::info!(path = %data_path.display(), "pager opened");

        Ok(Self {
            data_file,
            wal_file,
            data_path,
            wal_path,
            durable: options.durable,
        })
    }

    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    #[must_use]
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// The WAL file handle, for `ledgerstore-wal`'s writer/scanner.
    #[must_use]
    pub fn wal_file(&self) -> &F {
        &self.wal_file
    }

    /// Read a page from the data file. Holes (past EOF) read back as zero,
    /// per spec §4.1.
    pub fn read_page_raw(&self, page_id: PageId) -> Result<PageData> {
        let mut buf = vec![0u8; PAGE_SIZE];
        let n = self.data_file.read_at(&mut buf, page_id.offset())?;
        tracing::trace!(page_id = page_id.get(), bytes_read = n, "read_page_raw");
        Ok(PageData::from_slice(&buf))
    }

    /// Write a page to the data file at its canonical offset. A short
    /// write is fatal (spec §4.1): `VfsFile::write_at` already surfaces
    /// that as `StoreError::ShortWrite`.
    pub fn write_page_raw(&self, page_id: PageId, data: &PageData) -> Result<()> {
        tracing::trace!(page_id = page_id.get(), "write_page_raw");
        self.data_file.write_at(data.as_slice(), page_id.offset())
    }

    /// Durably flush the data file.
    pub fn sync_data(&self) -> Result<()> {
        if !self.durable {
            return Ok(());
        }
        tracing::debug!("sync_data");
        self.data_file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_of_hole_is_zero_filled() {
        let dir = tempfile::tempdir().unwrap();
        let pager = Pager::open(dir.path().join("db"), &OpenOptions::default()).unwrap();

        let page = pager.read_page_raw(PageId::new(7)).unwrap();
        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let pager = Pager::open(dir.path().join("db"), &OpenOptions::default()).unwrap();

        let data = PageData::from_slice(&[0x42u8; PAGE_SIZE]);
        pager.write_page_raw(PageId::new(2), &data).unwrap();
        pager.sync_data().unwrap();

        let back = pager.read_page_raw(PageId::new(2)).unwrap();
        assert_eq!(back.as_slice(), data.as_slice());
    }

    #[test]
    fn wal_file_is_separate_from_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("db");
        let pager = Pager::open(&base, &OpenOptions::default()).unwrap();

        pager.wal_file().write_at(b"frame", 0).unwrap();
        assert!(dir.path().join("db-wal").exists());
        assert_eq!(pager.wal_file().len().unwrap(), 5);
        assert_eq!(pager.data_path(), base.as_path());
    }
}
