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

//! In-memory storage backend
//!
//! Semantically identical to the persistent backend but held entirely in
//! process memory, which makes it the reference implementation the test
//! suite compares every other backend and cache stack against. Transactions
//! work by copying the whole store on begin: commit swaps the copy in,
//! abort throws it away.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use txdb_core::overlay::ValueSet;
use txdb_core::{util, Data, Database, DbIndex, Error, PerIndex, Result};

type Map = BTreeMap<Data, ValueSet>;

/// The in-memory database
pub struct InMemoryDb {
    state: RwLock<MemState>,
    flushes: AtomicU64,
}

#[derive(Default)]
struct MemState {
    committed: PerIndex<Map>,
    staged: Option<PerIndex<Map>>,
}

impl MemState {
    fn maps(&self) -> &PerIndex<Map> {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    fn maps_mut(&mut self) -> &mut PerIndex<Map> {
        self.staged.as_mut().unwrap_or(&mut self.committed)
    }
}

impl InMemoryDb {
    /// Create a new empty in-memory database
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState::default()),
            flushes: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for InMemoryDb {
    fn read_slice(
        &self,
        idx: DbIndex,
        key: &[u8],
        offset: usize,
        size: Option<usize>,
    ) -> Result<Option<Data>> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        let val = state.maps()[idx]
            .get(key)
            .and_then(|vals| vals.first())
            .map(|v| util::slice_value(v, offset, size).to_vec());
        Ok(val)
    }

    fn read_multiple(&self, idx: DbIndex, key: &[u8]) -> Result<Vec<Data>> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        Ok(state.maps()[idx].get(key).map_or_else(Vec::new, |vals| vals.iter().cloned().collect()))
    }

    fn read_all(&self, idx: DbIndex) -> Result<BTreeMap<Data, Vec<Data>>> {
        let state = self.state.read().expect("lock to be alive");
        Ok(util::to_vec_map(state.maps()[idx].clone()))
    }

    fn exists(&self, idx: DbIndex, key: &[u8]) -> Result<bool> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        Ok(state.maps()[idx].contains_key(key))
    }

    fn write(&self, idx: DbIndex, key: &[u8], value: &[u8]) -> Result<()> {
        util::check_key(key)?;
        util::check_value(idx, value)?;
        let mut state = self.state.write().expect("lock to be alive");
        let map = &mut state.maps_mut()[idx];
        if idx.duplicate_keys_allowed() {
            map.entry(key.to_vec()).or_default().insert(value.to_vec());
        } else {
            map.insert(key.to_vec(), ValueSet::from([value.to_vec()]));
        }
        Ok(())
    }

    fn erase(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.write().expect("lock to be alive");
        let map = &mut state.maps_mut()[idx];
        if idx.duplicate_keys_allowed() {
            if let Some(vals) = map.get_mut(key) {
                vals.pop_first();
                if vals.is_empty() {
                    map.remove(key);
                }
            }
        } else {
            map.remove(key);
        }
        Ok(())
    }

    fn erase_all(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.write().expect("lock to be alive");
        state.maps_mut()[idx].remove(key);
        Ok(())
    }

    fn begin_transaction(&self, _size_hint: Option<usize>) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        if state.staged.is_some() {
            return Err(Error::TransactionState("transaction already active"));
        }
        state.staged = Some(state.committed.clone());
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        let staged = state
            .staged
            .take()
            .ok_or(Error::TransactionState("no transaction to commit"))?;
        state.committed = staged;
        Ok(())
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
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn clear_cache(&self) -> Result<()> {
        Ok(())
    }

    fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test;
