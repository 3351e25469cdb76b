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

//! Read-through cache layer
//!
//! Caches the results of point reads; writes and erases go straight to the
//! layer below and update or invalidate the affected entries. Since this
//! layer buffers nothing, `begin`/`commit`/`abort` propagate to the layer
//! below; entries touched while a transaction is active reflect its staged
//! state and are invalidated if it aborts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use txdb_core::overlay::ValueSet;
use txdb_core::{util, Data, Database, DbIndex, Error, PerIndex, Result};

static TOTAL_FLUSHES: AtomicU64 = AtomicU64::new(0);

/// Flushes performed by all read-through cache instances of this process
pub fn total_flush_count() -> u64 {
    TOTAL_FLUSHES.load(Ordering::Relaxed)
}

/// Cached state of one key: its full value set, or confirmed absence
type CacheEntry = Option<ValueSet>;

/// A read-caching, write-through layer over the layer below
pub struct ReadCache<B> {
    pub(crate) lower: B,
    cache_max_size: usize,
    flushes: AtomicU64,
    state: Mutex<RcState>,
}

struct RcState {
    cache: PerIndex<BTreeMap<Data, CacheEntry>>,
    bytes: usize,
    txn_touched: Option<BTreeSet<(DbIndex, Data)>>,
}

fn entry_size(key: &[u8], entry: &CacheEntry) -> usize {
    key.len() + entry.as_ref().map_or(0, |vals| vals.iter().map(|v| v.len()).sum())
}

impl<B: Database> ReadCache<B> {
    /// New cache over `lower`, dropping all cached entries once their byte
    /// estimate exceeds `cache_max_size` (zero = unbounded).
    pub fn new(lower: B, cache_max_size: usize) -> Self {
        Self {
            lower,
            cache_max_size,
            flushes: AtomicU64::new(0),
            state: Mutex::new(RcState {
                cache: PerIndex::new(|_| BTreeMap::new()),
                bytes: 0,
                txn_touched: None,
            }),
        }
    }

    /// Values of the key, served from the cache or fetched and cached
    fn cached_values(&self, state: &mut RcState, idx: DbIndex, key: &[u8]) -> Result<ValueSet> {
        if let Some(entry) = state.cache[idx].get(key) {
            return Ok(entry.clone().unwrap_or_default());
        }
        let vals: ValueSet = self.lower.read_multiple(idx, key)?.into_iter().collect();
        let entry = (!vals.is_empty()).then(|| vals.clone());
        self.store(state, idx, key, entry);
        Ok(vals)
    }

    /// Install a cache entry, keeping the byte estimate and the transaction
    /// touch set up to date
    fn store(&self, state: &mut RcState, idx: DbIndex, key: &[u8], entry: CacheEntry) {
        if let Some(touched) = &mut state.txn_touched {
            touched.insert((idx, key.to_vec()));
        }
        if let Some(old) = state.cache[idx].get(key) {
            state.bytes -= entry_size(key, old);
        }
        state.bytes += entry_size(key, &entry);
        state.cache[idx].insert(key.to_vec(), entry);
        if self.cache_max_size > 0 && state.bytes > self.cache_max_size {
            Self::drop_entries(state);
        }
    }

    /// Forget whatever is cached for the key
    fn invalidate(state: &mut RcState, idx: DbIndex, key: &[u8]) {
        if let Some(old) = state.cache[idx].remove(key) {
            state.bytes -= entry_size(key, &old);
        }
    }

    fn drop_entries(state: &mut RcState) {
        for idx in DbIndex::ALL {
            state.cache[idx].clear();
        }
        state.bytes = 0;
    }
}

impl<B: Database> Database for ReadCache<B> {
    fn read_slice(
        &self,
        idx: DbIndex,
        key: &[u8],
        offset: usize,
        size: Option<usize>,
    ) -> Result<Option<Data>> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        let vals = self.cached_values(&mut state, idx, key)?;
        Ok(vals.into_iter().next().map(|v| util::slice_value(&v, offset, size).to_vec()))
    }

    fn read_multiple(&self, idx: DbIndex, key: &[u8]) -> Result<Vec<Data>> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        Ok(self.cached_values(&mut state, idx, key)?.into_iter().collect())
    }

    fn read_all(&self, idx: DbIndex) -> Result<BTreeMap<Data, Vec<Data>>> {
        // Whole-map dumps bypass the cache: the layer below is authoritative
        // since every mutation goes through it
        let _state = self.state.lock().expect("lock to be alive");
        self.lower.read_all(idx)
    }

    fn exists(&self, idx: DbIndex, key: &[u8]) -> Result<bool> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        Ok(!self.cached_values(&mut state, idx, key)?.is_empty())
    }

    fn write(&self, idx: DbIndex, key: &[u8], value: &[u8]) -> Result<()> {
        util::check_key(key)?;
        util::check_value(idx, value)?;
        let mut state = self.state.lock().expect("lock to be alive");
        self.lower.write(idx, key, value)?;
        let prior = state.cache[idx].get(key).cloned();
        match prior {
            Some(Some(mut vals)) => {
                if idx.duplicate_keys_allowed() {
                    vals.insert(value.to_vec());
                } else {
                    vals = ValueSet::from([value.to_vec()]);
                }
                self.store(&mut state, idx, key, Some(vals));
            }
            Some(None) => {
                self.store(&mut state, idx, key, Some(ValueSet::from([value.to_vec()])));
            }
            None => {
                if !idx.duplicate_keys_allowed() {
                    self.store(&mut state, idx, key, Some(ValueSet::from([value.to_vec()])));
                }
                // The full duplicate set below is unknown; leave it uncached
            }
        }
        Ok(())
    }

    fn erase(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        self.lower.erase(idx, key)?;
        if idx.duplicate_keys_allowed() {
            Self::invalidate(&mut state, idx, key);
        } else {
            self.store(&mut state, idx, key, None);
        }
        Ok(())
    }

    fn erase_all(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        self.lower.erase_all(idx, key)?;
        self.store(&mut state, idx, key, None);
        Ok(())
    }

    fn begin_transaction(&self, size_hint: Option<usize>) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        if state.txn_touched.is_some() {
            return Err(Error::TransactionState("transaction already active"));
        }
        self.lower.begin_transaction(size_hint)?;
        state.txn_touched = Some(BTreeSet::new());
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        let touched = state
            .txn_touched
            .take()
            .ok_or(Error::TransactionState("no transaction to commit"))?;
        match self.lower.commit_transaction() {
            Ok(()) => Ok(()),
            Err(e) => {
                state.txn_touched = Some(touched);
                Err(e)
            }
        }
    }

    fn abort_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        let touched = state
            .txn_touched
            .take()
            .ok_or(Error::TransactionState("no transaction to abort"))?;
        self.lower.abort_transaction()?;
        for (idx, key) in touched {
            Self::invalidate(&mut state, idx, &key);
        }
        Ok(())
    }

    fn flush(&self, size_hint: Option<usize>) -> Result<bool> {
        let _state = self.state.lock().expect("lock to be alive");
        self.lower.flush(size_hint)?;
        self.flushes.fetch_add(1, Ordering::Relaxed);
        TOTAL_FLUSHES.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn clear_cache(&self) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        Self::drop_entries(&mut state);
        Ok(())
    }

    fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self { lower, .. } = *self;
        Box::new(lower).close()
    }
}
