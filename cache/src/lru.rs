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

//! LRU-bounded cache layer
//!
//! A write-buffering cache like the write-through layer, but bounded by an
//! entry count instead of a byte budget. Every cached key occupies one slot;
//! reads populate clean slots, writes dirty them, and both promote the slot
//! to most-recently-used. Once the bound is exceeded the least-recently-used
//! slots are evicted; a dirty evictee is written back to the layer below
//! first. A bound of zero disables eviction entirely.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use txdb_core::overlay::{self, resolve_entry, DbOverlay, KeyOverlay, ValueSet};
use txdb_core::{util, Data, Database, DbIndex, Error, PerIndex, Result};

use crate::replay_entry;

static TOTAL_FLUSHES: AtomicU64 = AtomicU64::new(0);

/// Flushes performed by all LRU cache instances of this process
pub fn total_flush_count() -> u64 {
    TOTAL_FLUSHES.load(Ordering::Relaxed)
}

/// An LRU-bounded write-buffering cache over the layer below
pub struct LruCache<B> {
    pub(crate) lower: B,
    max_entries: usize,
    flushes: AtomicU64,
    state: Mutex<LruState>,
}

struct LruState {
    slots: PerIndex<BTreeMap<Data, CacheSlot>>,
    recency: BTreeMap<u64, (DbIndex, Data)>,
    next_tick: u64,
    entry_count: usize,
    staged: Option<DbOverlay>,
}

struct CacheSlot {
    overlay: KeyOverlay,
    dirty: bool,
    tick: u64,
}

impl<B: Database> LruCache<B> {
    /// New cache over `lower` holding at most `max_entries` keys; zero means
    /// unbounded.
    pub fn new(lower: B, max_entries: usize) -> Self {
        Self {
            lower,
            max_entries,
            flushes: AtomicU64::new(0),
            state: Mutex::new(LruState {
                slots: PerIndex::new(|_| BTreeMap::new()),
                recency: BTreeMap::new(),
                next_tick: 0,
                entry_count: 0,
                staged: None,
            }),
        }
    }

    /// Values of the key as visible through the transaction overlay, the
    /// cached slots and the layer below
    fn visible_values(&self, state: &LruState, idx: DbIndex, key: &[u8]) -> Result<ValueSet> {
        let staged_entry = state.staged.as_ref().and_then(|o| o.get(idx, key));
        resolve_entry(staged_entry, || {
            let slot_entry = state.slots[idx].get(key).map(|s| &s.overlay);
            resolve_entry(slot_entry, || {
                self.lower.read_multiple(idx, key).map(|v| v.into_iter().collect())
            })
        })
    }

    /// Move the key's slot to most-recently-used
    fn touch(state: &mut LruState, idx: DbIndex, key: &[u8]) {
        let tick = state.next_tick;
        state.next_tick += 1;
        if let Some(slot) = state.slots[idx].get_mut(key) {
            state.recency.remove(&slot.tick);
            slot.tick = tick;
            state.recency.insert(tick, (idx, key.to_vec()));
        }
    }

    /// Install or replace the key's slot at most-recently-used, without
    /// checking the entry bound
    fn place(state: &mut LruState, idx: DbIndex, key: &[u8], overlay: KeyOverlay, dirty: bool) {
        let tick = state.next_tick;
        state.next_tick += 1;
        match state.slots[idx].get_mut(key) {
            Some(slot) => {
                state.recency.remove(&slot.tick);
                slot.overlay = overlay;
                slot.dirty = dirty;
                slot.tick = tick;
            }
            None => {
                state.slots[idx].insert(key.to_vec(), CacheSlot { overlay, dirty, tick });
                state.entry_count += 1;
            }
        }
        state.recency.insert(tick, (idx, key.to_vec()));
    }

    /// Evict least-recently-used slots until the entry bound holds, writing
    /// dirty evictees back to the layer below
    fn evict_excess(&self, state: &mut LruState) -> Result<()> {
        if self.max_entries == 0 {
            return Ok(());
        }
        while state.entry_count > self.max_entries {
            let (tick, (idx, key)) = match state.recency.iter().next() {
                Some((tick, target)) => (*tick, target.clone()),
                None => break,
            };
            if let Some(slot) = state.slots[idx].get(&key) {
                if slot.dirty {
                    self.write_back(idx, &key, &slot.overlay)?;
                }
            }
            state.recency.remove(&tick);
            if state.slots[idx].remove(&key).is_some() {
                state.entry_count -= 1;
            }
        }
        Ok(())
    }

    /// Apply one dirty slot to the layer below in its own transaction
    fn write_back(&self, idx: DbIndex, key: &[u8], entry: &KeyOverlay) -> Result<()> {
        self.lower.begin_transaction(Some(key.len() + entry.byte_size()))?;
        match replay_entry(&self.lower, idx, key, entry)
            .and_then(|()| self.lower.commit_transaction())
        {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self.lower.abort_transaction();
                Err(e)
            }
        }
    }

    /// Promote the key's slot, or cache the resolved values in a clean slot
    fn promote_or_populate(
        &self,
        state: &mut LruState,
        idx: DbIndex,
        key: &[u8],
        vals: &ValueSet,
    ) -> Result<()> {
        if state.slots[idx].contains_key(key) {
            Self::touch(state, idx, key);
            Ok(())
        } else if state.staged.as_ref().and_then(|o| o.get(idx, key)).is_none() {
            let overlay = if vals.is_empty() {
                KeyOverlay::Erased
            } else {
                KeyOverlay::Written(vals.clone())
            };
            Self::place(state, idx, key, overlay, false);
            self.evict_excess(state)
        } else {
            // The resolved values include uncommitted transaction state, so
            // they must not be cached in a slot
            Ok(())
        }
    }

    /// Replay all dirty slots into one lower-layer transaction and mark them
    /// clean. The slots stay dirty if anything fails.
    fn flush_dirty(&self, state: &mut LruState, size_hint: Option<usize>) -> Result<()> {
        let mut dirty = Vec::new();
        for idx in DbIndex::ALL {
            for (key, slot) in &state.slots[idx] {
                if slot.dirty {
                    dirty.push((idx, key.clone(), slot.overlay.clone()));
                }
            }
        }
        if !dirty.is_empty() {
            let bytes: usize = dirty.iter().map(|(_, k, e)| k.len() + e.byte_size()).sum();
            let hint = std::cmp::max(size_hint.unwrap_or(0), bytes);
            log::debug!("lru cache flushing {} dirty entries (~{hint} bytes)", dirty.len());
            self.lower.begin_transaction(Some(hint))?;
            let replayed = dirty
                .iter()
                .try_for_each(|(idx, key, entry)| replay_entry(&self.lower, *idx, key, entry));
            match replayed.and_then(|()| self.lower.commit_transaction()) {
                Ok(()) => {
                    for (idx, key, _) in &dirty {
                        if let Some(slot) = state.slots[*idx].get_mut(key) {
                            slot.dirty = false;
                        }
                    }
                }
                Err(e) => {
                    let _ = self.lower.abort_transaction();
                    return Err(e);
                }
            }
        }
        self.flushes.fetch_add(1, Ordering::Relaxed);
        TOTAL_FLUSHES.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn erase_all_locked(&self, state: &mut LruState, idx: DbIndex, key: &[u8]) -> Result<()> {
        if let Some(staged) = &mut state.staged {
            staged.erase_all(idx, key);
            return Ok(());
        }
        Self::place(state, idx, key, KeyOverlay::Erased, true);
        self.evict_excess(state)
    }
}

impl<B: Database> Database for LruCache<B> {
    fn read_slice(
        &self,
        idx: DbIndex,
        key: &[u8],
        offset: usize,
        size: Option<usize>,
    ) -> Result<Option<Data>> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        let vals = self.visible_values(&state, idx, key)?;
        self.promote_or_populate(&mut state, idx, key, &vals)?;
        Ok(vals.into_iter().next().map(|v| util::slice_value(&v, offset, size).to_vec()))
    }

    fn read_multiple(&self, idx: DbIndex, key: &[u8]) -> Result<Vec<Data>> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        let vals = self.visible_values(&state, idx, key)?;
        self.promote_or_populate(&mut state, idx, key, &vals)?;
        Ok(vals.into_iter().collect())
    }

    fn read_all(&self, idx: DbIndex) -> Result<BTreeMap<Data, Vec<Data>>> {
        let state = self.state.lock().expect("lock to be alive");
        let mut map = util::to_set_map(self.lower.read_all(idx)?);
        for (key, slot) in &state.slots[idx] {
            overlay::apply_to_map(&mut map, key, &slot.overlay);
        }
        if let Some(staged) = &state.staged {
            staged.apply_to_map(idx, &mut map);
        }
        Ok(util::to_vec_map(map))
    }

    fn exists(&self, idx: DbIndex, key: &[u8]) -> Result<bool> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        let vals = self.visible_values(&state, idx, key)?;
        self.promote_or_populate(&mut state, idx, key, &vals)?;
        Ok(!vals.is_empty())
    }

    fn write(&self, idx: DbIndex, key: &[u8], value: &[u8]) -> Result<()> {
        util::check_key(key)?;
        util::check_value(idx, value)?;
        let mut state = self.state.lock().expect("lock to be alive");
        if let Some(staged) = &mut state.staged {
            staged.write(idx, key, value);
            return Ok(());
        }
        let existing = match state.slots[idx].get_mut(key) {
            Some(slot) => {
                if idx.duplicate_keys_allowed() {
                    match &mut slot.overlay {
                        KeyOverlay::Erased => {
                            slot.overlay = KeyOverlay::Written(ValueSet::from([value.to_vec()]));
                        }
                        KeyOverlay::Written(vals) | KeyOverlay::Appended(vals) => {
                            vals.insert(value.to_vec());
                        }
                    }
                } else {
                    slot.overlay = KeyOverlay::Written(ValueSet::from([value.to_vec()]));
                }
                slot.dirty = true;
                true
            }
            None => false,
        };
        if existing {
            Self::touch(&mut state, idx, key);
            Ok(())
        } else {
            let overlay = if idx.duplicate_keys_allowed() {
                KeyOverlay::Appended(ValueSet::from([value.to_vec()]))
            } else {
                KeyOverlay::Written(ValueSet::from([value.to_vec()]))
            };
            Self::place(&mut state, idx, key, overlay, true);
            self.evict_excess(&mut state)
        }
    }

    fn erase(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        if idx.duplicate_keys_allowed() {
            let mut vals = self.visible_values(&state, idx, key)?;
            if vals.pop_first().is_none() {
                return Ok(());
            }
            if let Some(staged) = &mut state.staged {
                staged.set_values(idx, key, vals);
                return Ok(());
            }
            let overlay =
                if vals.is_empty() { KeyOverlay::Erased } else { KeyOverlay::Written(vals) };
            Self::place(&mut state, idx, key, overlay, true);
            self.evict_excess(&mut state)
        } else {
            self.erase_all_locked(&mut state, idx, key)
        }
    }

    fn erase_all(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.lock().expect("lock to be alive");
        self.erase_all_locked(&mut state, idx, key)
    }

    fn begin_transaction(&self, _size_hint: Option<usize>) -> Result<()> {
        // Cache-level transaction; the layer below sees a write transaction
        // only when the cache flushes
        let mut state = self.state.lock().expect("lock to be alive");
        if state.staged.is_some() {
            return Err(Error::TransactionState("transaction already active"));
        }
        state.staged = Some(DbOverlay::new());
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        let staged = state
            .staged
            .take()
            .ok_or(Error::TransactionState("no transaction to commit"))?;
        for (idx, key, entry) in staged.into_entries() {
            if state.slots[idx].contains_key(&key) {
                {
                    let slot = state.slots[idx].get_mut(&key).expect("slot to be present");
                    slot.overlay.merge(entry);
                    slot.dirty = true;
                }
                Self::touch(&mut state, idx, &key);
            } else {
                Self::place(&mut state, idx, &key, entry, true);
            }
        }
        self.evict_excess(&mut state)
    }

    fn abort_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        state
            .staged
            .take()
            .map(|_| ())
            .ok_or(Error::TransactionState("no transaction to abort"))
    }

    fn flush(&self, size_hint: Option<usize>) -> Result<bool> {
        let mut state = self.state.lock().expect("lock to be alive");
        self.flush_dirty(&mut state, size_hint)?;
        Ok(true)
    }

    fn clear_cache(&self) -> Result<()> {
        let mut state = self.state.lock().expect("lock to be alive");
        for idx in DbIndex::ALL {
            state.slots[idx].clear();
        }
        state.recency.clear();
        state.entry_count = 0;
        if let Some(staged) = &mut state.staged {
            staged.clear();
        }
        Ok(())
    }

    fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        {
            let mut state = this.state.lock().expect("lock to be alive");
            // A transaction left open counts as aborted
            state.staged = None;
            this.flush_dirty(&mut state, None)?;
        }
        let Self { lower, .. } = this;
        Box::new(lower).close()
    }
}
