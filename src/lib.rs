// Copyright (c) 2022 RBB S.r.l
// opensource@mintlayer.org
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://github.com/mintlayer/mintlayer-core/blob/master/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transactional multi-index key-value storage
//!
//! The store is a fixed set of key-value maps (see [DbIndex]) kept either in
//! an LMDB-backed file ([Lmdb]) or in memory ([InMemoryDb]), with caching
//! layers that stack over any backend — or over each other — without
//! changing the observable semantics:
//!
//! * [WriteCache] buffers writes and drains them in one transaction,
//! * [ReadCache] caches point reads and writes through,
//! * [LruCache] bounds its footprint by entry count with LRU eviction.
//!
//! # Example
//!
//! ```
//! use txdb::{Database, DbIndex, InMemoryDb, WriteCache};
//!
//! // A write-buffering cache over the in-memory backend
//! let db = WriteCache::new(InMemoryDb::new(), 0);
//!
//! db.write(DbIndex::Main, b"key1", b"val1")?;
//! assert_eq!(db.read(DbIndex::Main, b"key1")?, Some(b"val1".to_vec()));
//!
//! // Duplicate-keys maps accumulate values under one key
//! db.write(DbIndex::Ntp1TokenNames, b"TOKEN", b"tx1")?;
//! db.write(DbIndex::Ntp1TokenNames, b"TOKEN", b"tx2")?;
//! assert_eq!(db.read_multiple(DbIndex::Ntp1TokenNames, b"TOKEN")?.len(), 2);
//!
//! // Transactions stage writes until commit; abort discards them
//! db.begin_transaction(None)?;
//! db.write(DbIndex::Main, b"key2", b"val2")?;
//! db.abort_transaction()?;
//! assert!(!db.exists(DbIndex::Main, b"key2")?);
//!
//! // Drain the buffer into the backend and tear the stack down
//! db.flush(None)?;
//! Box::new(db).close()?;
//! # Ok::<(), txdb::Error>(())
//! ```

// Re-export core abstractions
pub use txdb_core::*;

// Re-export the backends and the cache layers
pub use txdb_cache::{LruCache, ReadCache, WriteCache};
pub use txdb_inmemory::InMemoryDb;
pub use txdb_lmdb::{Lmdb, LmdbDb, MemSize};

use std::path::Path;

/// Open the persistent backend at `path`
pub fn open_persistent(path: &Path, clear_before_open: bool) -> Result<LmdbDb> {
    let backend = Lmdb::new(path);
    let backend = if clear_before_open { backend.with_clear_db() } else { backend };
    backend.open()
}

/// Open the persistent backend behind a write-buffering cache
pub fn open_write_cached(
    path: &Path,
    clear_before_open: bool,
    cache_max_size: usize,
) -> Result<WriteCache<LmdbDb>> {
    Ok(WriteCache::new(open_persistent(path, clear_before_open)?, cache_max_size))
}

/// Open the persistent backend behind a read-through cache
pub fn open_read_cached(
    path: &Path,
    clear_before_open: bool,
    cache_max_size: usize,
) -> Result<ReadCache<LmdbDb>> {
    Ok(ReadCache::new(open_persistent(path, clear_before_open)?, cache_max_size))
}

/// Open the persistent backend behind an LRU-bounded cache
pub fn open_lru_cached(
    path: &Path,
    clear_before_open: bool,
    max_entries: usize,
) -> Result<LruCache<LmdbDb>> {
    Ok(LruCache::new(open_persistent(path, clear_before_open)?, max_entries))
}

#[cfg(test)]
mod test;
