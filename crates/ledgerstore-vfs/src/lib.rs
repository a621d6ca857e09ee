//! Positional file I/O, split out of the pager the way the teacher keeps a
//! dedicated `fsqlite-vfs` crate between `fsqlite-pager` and the OS.
//!
//! Spec §5 requires that seeks never be shared across threads without a
//! lock: either use positional I/O (`pread`/`pwrite`) or confine seek+I/O
//! pairs to a critical section. This crate picks the former on Unix (via
//! `nix`) and falls back to the latter, behind a mutex, everywhere else.

use std::path::Path;

use ledgerstore_error::Result;

/// A file a pager or WAL writer can perform positional I/O against.
///
/// All methods take `&self`: concurrent callers synchronize through
/// `read_at`/`write_at` being genuinely positional (no shared cursor), not
/// through external locking of the file handle itself.
pub trait VfsFile: Send + Sync {
    /// Read into `buf` starting at `offset`. Returns the number of bytes
    /// actually read, which is less than `buf.len()` at or past EOF.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write all of `buf` starting at `offset`. A short write is reported
    /// as `StoreError::ShortWrite`, which is always fatal (spec §4.1).
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<()>;

    /// Durably flush the file's contents to storage.
    fn sync_all(&self) -> Result<()>;

    /// Current length of the file in bytes.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Opens [`VfsFile`] handles. The only implementation shipped is
/// [`OsVfs`]; tests that want to exercise torn-write or I/O-error paths
/// without touching a real filesystem can provide their own.
pub trait Vfs {
    type File: VfsFile;

    fn open(&self, path: &Path) -> Result<Self::File>;
}

/// The real filesystem, opened read-write and created if absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsVfs;

impl Vfs for OsVfs {
    type File = OsFile;

    fn open(&self, path: &Path) -> Result<Self::File> {
        OsFile::open(path)
    }
}

#[cfg(unix)]
mod imp {
    use std::fs::{File, OpenOptions};
    use std::os::fd::AsFd;
    use std::path::{Path, PathBuf};

    use ledgerstore_error::{Result, StoreError};

    use super::VfsFile;

    pub struct OsFile {
        file: File,
        path: PathBuf,
    }

    impl OsFile {
        pub fn open(path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .map_err(|source| StoreError::FatalIo {
                    path: path.to_path_buf(),
                    source,
                })?;
            tracing::debug!(path = %path.display(), "vfs file opened");
            Ok(Self {
                file,
                path: path.to_path_buf(),
            })
        }
    }

    impl VfsFile for OsFile {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
            let off = libc_off_t(offset)?;
            let n = nix::sys::uio::pread(self.file.as_fd(), buf, off).map_err(|errno| {
                StoreError::FatalIo {
                    path: self.path.clone(),
                    source: std::io::Error::from(errno),
                }
            })?;
            tracing::trace!(path = %self.path.display(), offset, bytes_read = n, "pread");
            Ok(n)
        }

        fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
            let off = libc_off_t(offset)?;
            let written =
                nix::sys::uio::pwrite(self.file.as_fd(), buf, off).map_err(|errno| {
                    StoreError::FatalIo {
                        path: self.path.clone(),
                        source: std::io::Error::from(errno),
                    }
                })?;
            if written != buf.len() {
                return Err(StoreError::ShortWrite {
                    path: self.path.clone(),
                    wrote: written,
                    expected: buf.len(),
                });
            }
            tracing::trace!(path = %self.path.display(), offset, bytes_written = written, "pwrite");
            Ok(())
        }

        fn sync_all(&self) -> Result<()> {
            self.file.sync_all().map_err(|source| StoreError::FatalIo {
                path: self.path.clone(),
                source,
            })?;
            tracing::trace!(path = %self.path.display(), "sync_all");
            Ok(())
        }

        fn len(&self) -> Result<u64> {
            self.file
                .metadata()
                .map(|m| m.len())
                .map_err(|source| StoreError::FatalIo {
                    path: self.path.clone(),
                    source,
                })
        }
    }

    fn libc_off_t(offset: u64) -> Result<i64> {
        i64::try_from(offset)
            .map_err(|_| StoreError::internal("offset exceeds platform off_t range"))
    }
}

#[cfg(not(unix))]
mod imp {
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use ledgerstore_error::{Result, StoreError};

    use super::VfsFile;

    /// Non-Unix fallback: confine each seek+I/O pair to a locked critical
    /// section, since there is no portable positional-I/O syscall here.
    pub struct OsFile {
        file: Mutex<File>,
        path: PathBuf,
    }

    impl OsFile {
        pub fn open(path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .map_err(|source| StoreError::FatalIo {
                    path: path.to_path_buf(),
                    source,
                })?;
            tracing::debug!(path = %path.display(), "vfs file opened");
            Ok(Self {
                file: Mutex::new(file),
                path: path.to_path_buf(),
            })
        }
    }

    impl VfsFile for OsFile {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
            let mut guard = self.file.lock().expect("file mutex poisoned");
            let n = guard
                .seek(SeekFrom::Start(offset))
                .and_then(|_| guard.read(buf))
                .map_err(|source| StoreError::FatalIo {
                    path: self.path.clone(),
                    source,
                })?;
            tracing::trace!(path = %self.path.display(), offset, bytes_read = n, "seek+read");
            Ok(n)
        }

        fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
            let mut guard = self.file.lock().expect("file mutex poisoned");
            guard
                .seek(SeekFrom::Start(offset))
                .map_err(|source| StoreError::FatalIo {
                    path: self.path.clone(),
                    source,
                })?;
            guard.write_all(buf).map_err(|source| StoreError::FatalIo {
                path: self.path.clone(),
                source,
            })?;
            tracing::trace!(path = %self.path.display(), offset, bytes_written = buf.len(), "seek+write");
            Ok(())
        }

        fn sync_all(&self) -> Result<()> {
            let guard = self.file.lock().expect("file mutex poisoned");
            guard.sync_all().map_err(|source| StoreError::FatalIo {
                path: self.path.clone(),
                source,
            })?;
            tracing::trace!(path = %self.path.display(), "sync_all");
            Ok(())
        }

        fn len(&self) -> Result<u64> {
            let guard = self.file.lock().expect("file mutex poisoned");
            guard
                .metadata()
                .map(|m| m.len())
                .map_err(|source| StoreError::FatalIo {
                    path: self.path.clone(),
                    source,
                })
        }
    }
}

pub use imp::OsFile;
