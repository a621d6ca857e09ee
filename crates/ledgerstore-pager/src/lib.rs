//! Page cache and raw data-file I/O (spec §4.1, §4.4).

pub mod page_cache;
pub mod pager;

pub use page_cache::{CacheEntry, PageCache};
pub use pager::{OpenOptions, Pager};
