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

//! LMDB-backed persistent storage backend
//!
//! One sub-database per [DbIndex], `DUP_SORT` on the duplicate-keys maps.
//! Write transactions opened through the [Database] interface are staged in
//! memory and replayed into a single lmdb read-write transaction on commit;
//! lmdb transaction handles borrow the environment, so holding one across
//! interface calls is not an option.
//!
//! The lmdb binding sizes the memory map only when an environment is
//! opened. Any write that runs into `MDB_MAP_FULL` therefore aborts its lmdb
//! transaction, closes the environment, reopens it with a doubled map and
//! retries, up to a bounded number of growth steps. The remap happens under
//! the instance's exclusive lock, so no transaction of this process is in
//! flight while the environment is down, and the advisory `.lock` file
//! keeps other processes away throughout.

mod error;
pub mod memsize;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use lmdb::{Cursor, Transaction};

use txdb_core::overlay::{resolve_entry, DbOverlay, KeyOverlay, ValueSet};
use txdb_core::{util, Data, Database, DbIndex, Error, PerIndex, Result};

pub use memsize::MemSize;

/// Default initial size of the memory map; grown on demand
const DEFAULT_MAP_SIZE: MemSize = MemSize::from_megabytes(8);

/// Granularity the map size is rounded up to
const PAGE_SIZE: u64 = 4096;

/// Upper bound on consecutive map growth steps for a single operation
const MAX_MAP_GROWTH_STEPS: usize = 16;

fn round_up_to_page(bytes: u64) -> u64 {
    bytes.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// Open the environment at `path` with the given map size and open all the
/// sub-databases
fn open_environment(
    path: &Path,
    map_size: usize,
) -> Result<(lmdb::Environment, PerIndex<lmdb::Database>)> {
    let env = lmdb::Environment::new()
        .set_max_dbs(DbIndex::COUNT as u32)
        .set_map_size(map_size)
        .open(path)
        .map_err(error::from_lmdb)?;

    let dbs = PerIndex::try_new(|idx| {
        let flags = if idx.duplicate_keys_allowed() {
            lmdb::DatabaseFlags::DUP_SORT
        } else {
            lmdb::DatabaseFlags::empty()
        };
        env.create_db(Some(idx.name()), flags).map_err(error::from_lmdb)
    })?;

    Ok((env, dbs))
}

/// LMDB database backend builder
pub struct Lmdb {
    path: PathBuf,
    clear_database: bool,
    map_size: MemSize,
}

impl Lmdb {
    /// New LMDB database backend at the given directory
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clear_database: false,
            map_size: DEFAULT_MAP_SIZE,
        }
    }

    /// Remove any existing database files before opening
    pub fn with_clear_db(mut self) -> Self {
        self.clear_database = true;
        self
    }

    /// Initial size of the memory map
    pub fn with_map_size(mut self, size: MemSize) -> Self {
        self.map_size = size;
        self
    }

    /// Open the database, creating the directory and files as needed.
    ///
    /// The directory is claimed exclusively via an advisory lock on a
    /// `.lock` file; a second open against the same directory fails with
    /// [Error::Conflict] as long as the first instance is alive.
    pub fn open(self) -> Result<LmdbDb> {
        if self.clear_database && self.path.exists() {
            fs::remove_dir_all(&self.path).map_err(error::process_io_error)?;
        }
        fs::create_dir_all(&self.path).map_err(error::process_io_error)?;

        let lock_file =
            fs::File::create(self.path.join(".lock")).map_err(error::process_io_error)?;
        fs4::FileExt::try_lock_exclusive(&lock_file).map_err(|_| Error::Conflict)?;

        let map_size = round_up_to_page(self.map_size.as_bytes()) as usize;
        let (env, dbs) = open_environment(&self.path, map_size)?;

        Ok(LmdbDb {
            state: RwLock::new(LmdbState {
                env: Some(env),
                dbs,
                path: self.path,
                map_size,
                staged: None,
            }),
            flushes: AtomicU64::new(0),
            _lock_file: lock_file,
        })
    }
}

/// An open LMDB-backed database
pub struct LmdbDb {
    state: RwLock<LmdbState>,
    flushes: AtomicU64,
    _lock_file: fs::File,
}

struct LmdbState {
    /// `None` only transiently, while a remap is replacing the environment
    env: Option<lmdb::Environment>,
    dbs: PerIndex<lmdb::Database>,
    path: PathBuf,
    map_size: usize,
    staged: Option<StagedTx>,
}

struct StagedTx {
    overlay: DbOverlay,
    size_hint: usize,
}

fn put_value(
    tx: &mut lmdb::RwTransaction,
    db: lmdb::Database,
    key: &[u8],
    value: &[u8],
) -> Result<()> {
    match tx.put(db, &key, &value, lmdb::WriteFlags::empty()) {
        Ok(()) | Err(lmdb::Error::KeyExist) => Ok(()),
        Err(e) => Err(error::from_lmdb(e)),
    }
}

fn del_value(
    tx: &mut lmdb::RwTransaction,
    db: lmdb::Database,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<()> {
    tx.del(db, &key, value).or_else(error::process_with_unit)
}

impl LmdbState {
    fn env(&self) -> Result<&lmdb::Environment> {
        self.env
            .as_ref()
            .ok_or_else(|| Error::Io("lmdb environment lost after a failed remap".into()))
    }

    /// Values of the key in the last committed state
    fn committed_values(&self, idx: DbIndex, key: &[u8]) -> Result<ValueSet> {
        let tx = self.env()?.begin_ro_txn().map_err(error::from_lmdb)?;
        let db = self.dbs[idx];
        if idx.duplicate_keys_allowed() {
            let mut vals = ValueSet::new();
            let mut cursor = tx.open_ro_cursor(db).map_err(error::from_lmdb)?;
            for item in cursor.iter_dup_of(&key) {
                let (_, v) = item.map_err(error::from_lmdb)?;
                vals.insert(v.to_vec());
            }
            Ok(vals)
        } else {
            match tx.get(db, &key) {
                Ok(v) => Ok(ValueSet::from([v.to_vec()])),
                Err(lmdb::Error::NotFound) => Ok(ValueSet::new()),
                Err(e) => Err(error::from_lmdb(e)),
            }
        }
    }

    /// Full dump of one map in the last committed state
    fn committed_map(&self, idx: DbIndex) -> Result<BTreeMap<Data, ValueSet>> {
        let tx = self.env()?.begin_ro_txn().map_err(error::from_lmdb)?;
        let mut out: BTreeMap<Data, ValueSet> = BTreeMap::new();
        let mut cursor = tx.open_ro_cursor(self.dbs[idx]).map_err(error::from_lmdb)?;
        for item in cursor.iter_start() {
            let (k, v) = item.map_err(error::from_lmdb)?;
            out.entry(k.to_vec()).or_default().insert(v.to_vec());
        }
        Ok(out)
    }

    /// Values of the key as visible to the caller, staged writes included
    fn visible_values(&self, idx: DbIndex, key: &[u8]) -> Result<ValueSet> {
        let entry = self.staged.as_ref().and_then(|tx| tx.overlay.get(idx, key));
        resolve_entry(entry, || self.committed_values(idx, key))
    }

    /// Run a modification inside one lmdb transaction, growing the memory
    /// map and retrying on `MDB_MAP_FULL`.
    fn update_committed(
        &mut self,
        size_hint: usize,
        apply: impl Fn(&mut lmdb::RwTransaction, &PerIndex<lmdb::Database>) -> Result<()>,
    ) -> Result<()> {
        for _ in 0..MAX_MAP_GROWTH_STEPS {
            let result = {
                let mut tx = self.env()?.begin_rw_txn().map_err(error::from_lmdb)?;
                match apply(&mut tx, &self.dbs) {
                    Ok(()) => tx.commit().map_err(error::from_lmdb),
                    Err(e) => {
                        drop(tx);
                        Err(e)
                    }
                }
            };
            match result {
                Ok(()) => return Ok(()),
                Err(Error::OutOfSpace) => self.grow_map(size_hint)?,
                Err(e) => return Err(e),
            }
        }
        log::error!("lmdb map growth budget exhausted after {MAX_MAP_GROWTH_STEPS} steps");
        Err(Error::OutOfSpace)
    }

    fn grow_map(&mut self, size_hint: usize) -> Result<()> {
        let target = std::cmp::max(self.map_size.saturating_mul(2), size_hint.saturating_mul(2));
        self.remap(target)
    }

    /// Grow the memory map to at least `target` bytes.
    ///
    /// The binding sizes the memory map only at environment open, so growing
    /// means closing the environment and mapping the data file again with
    /// the larger size. The caller holds the exclusive state lock, so no
    /// transaction of this process is in flight; the `.lock` file keeps
    /// other processes out while the environment is down.
    fn remap(&mut self, target: usize) -> Result<()> {
        let new_size = round_up_to_page(target as u64) as usize;
        if new_size <= self.map_size {
            return Ok(());
        }
        drop(self.env.take());
        let (env, dbs) = open_environment(&self.path, new_size)?;
        self.env = Some(env);
        self.dbs = dbs;
        log::debug!("lmdb map remapped from {}B to {}B", self.map_size, new_size);
        self.map_size = new_size;
        Ok(())
    }
}

impl Database for LmdbDb {
    fn read_slice(
        &self,
        idx: DbIndex,
        key: &[u8],
        offset: usize,
        size: Option<usize>,
    ) -> Result<Option<Data>> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        let vals = state.visible_values(idx, key)?;
        Ok(vals.into_iter().next().map(|v| util::slice_value(&v, offset, size).to_vec()))
    }

    fn read_multiple(&self, idx: DbIndex, key: &[u8]) -> Result<Vec<Data>> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        Ok(state.visible_values(idx, key)?.into_iter().collect())
    }

    fn read_all(&self, idx: DbIndex) -> Result<BTreeMap<Data, Vec<Data>>> {
        let state = self.state.read().expect("lock to be alive");
        let mut map = state.committed_map(idx)?;
        if let Some(staged) = &state.staged {
            staged.overlay.apply_to_map(idx, &mut map);
        }
        Ok(util::to_vec_map(map))
    }

    fn exists(&self, idx: DbIndex, key: &[u8]) -> Result<bool> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        Ok(!state.visible_values(idx, key)?.is_empty())
    }

    fn write(&self, idx: DbIndex, key: &[u8], value: &[u8]) -> Result<()> {
        util::check_key(key)?;
        util::check_value(idx, value)?;
        let mut state = self.state.write().expect("lock to be alive");
        match &mut state.staged {
            Some(staged) => {
                staged.overlay.write(idx, key, value);
                Ok(())
            }
            None => state.update_committed(key.len() + value.len(), |tx, dbs| {
                put_value(tx, dbs[idx], key, value)
            }),
        }
    }

    fn erase(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.write().expect("lock to be alive");
        if idx.duplicate_keys_allowed() {
            let mut vals = state.visible_values(idx, key)?;
            let victim = match vals.pop_first() {
                Some(v) => v,
                None => return Ok(()),
            };
            match &mut state.staged {
                Some(staged) => {
                    staged.overlay.set_values(idx, key, vals);
                    Ok(())
                }
                None => state.update_committed(key.len(), |tx, dbs| {
                    del_value(tx, dbs[idx], key, Some(&victim))
                }),
            }
        } else {
            match &mut state.staged {
                Some(staged) => {
                    staged.overlay.erase_all(idx, key);
                    Ok(())
                }
                None => state.update_committed(key.len(), |tx, dbs| {
                    del_value(tx, dbs[idx], key, None)
                }),
            }
        }
    }

    fn erase_all(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.write().expect("lock to be alive");
        match &mut state.staged {
            Some(staged) => {
                staged.overlay.erase_all(idx, key);
                Ok(())
            }
            None => {
                state.update_committed(key.len(), |tx, dbs| del_value(tx, dbs[idx], key, None))
            }
        }
    }

    fn begin_transaction(&self, size_hint: Option<usize>) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        if state.staged.is_some() {
            return Err(Error::TransactionState("transaction already active"));
        }
        let hint = size_hint.unwrap_or(0);
        if hint > 0 {
            let target = std::cmp::max(state.map_size, hint.saturating_mul(2));
            state.remap(target)?;
        }
        state.staged = Some(StagedTx { overlay: DbOverlay::new(), size_hint: hint });
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        let staged = state
            .staged
            .take()
            .ok_or(Error::TransactionState("no transaction to commit"))?;
        let hint = std::cmp::max(staged.size_hint, staged.overlay.byte_size());
        let overlay = staged.overlay;
        let result = state.update_committed(hint, |tx, dbs| {
            for (idx, key, entry) in overlay.entries() {
                match entry {
                    KeyOverlay::Erased => del_value(tx, dbs[idx], key, None)?,
                    KeyOverlay::Written(vals) => {
                        del_value(tx, dbs[idx], key, None)?;
                        for v in vals {
                            put_value(tx, dbs[idx], key, v)?;
                        }
                    }
                    KeyOverlay::Appended(vals) => {
                        for v in vals {
                            put_value(tx, dbs[idx], key, v)?;
                        }
                    }
                }
            }
            Ok(())
        });
        if result.is_err() {
            state.staged = Some(StagedTx { overlay, size_hint: hint });
        }
        result
    }

    fn abort_transaction(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        state
            .staged
            .take()
            .map(|_| ())
            .ok_or(Error::TransactionState("no transaction to abort"))
    }

    fn flush(&self, _size_hint: Option<usize>) -> Result<bool> {
        let state = self.state.read().expect("lock to be alive");
        state.env()?.sync(true).map_err(error::from_lmdb)?;
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn clear_cache(&self) -> Result<()> {
        // Nothing is cached above the memory map
        Ok(())
    }

    fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut state = this.state.write().expect("lock to be alive");
        if state.staged.take().is_some() {
            log::debug!("lmdb backend closed with an open transaction; staged writes discarded");
        }
        drop(state);
        // Dropping the environment closes the data files and releases the
        // directory lock
        Ok(())
    }
}

impl LmdbDb {
    #[cfg(test)]
    fn current_map_size(&self) -> usize {
        self.state.read().expect("lock to be alive").map_size
    }
}

#[cfg(test)]
mod resize_tests;
