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

//! Write-through cache layer
//!
//! Buffers writes and erases as an in-memory overlay; reads resolve through
//! the buffer and fall through to the layer below. The buffer drains into a
//! single lower-layer transaction on [Database::flush], when it outgrows the
//! configured byte budget, or on close.
//!
//! Transactions at this layer are cache-level only: `begin` stacks a second
//! overlay on top of the buffer and never touches the layer below; `commit`
//! folds it into the buffer, `abort` drops it. The only lower-layer write
//! transaction ever opened is the one inside `flush`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use txdb_core::overlay::{resolve_entry, DbOverlay, ValueSet};
use txdb_core::{util, Data, Database, DbIndex, Error, Result};

use crate::replay_entry;

static TOTAL_FLUSHES: AtomicU64 = AtomicU64::new(0);

/// Flushes performed by all write-through cache instances of this process
pub fn total_flush_count() -> u64 {
    TOTAL_FLUSHES.load(Ordering::Relaxed)
}

/// A write-buffering cache over the layer below
pub struct WriteCache<B> {
    pub(crate) lower: B,
    cache_max_size: usize,
    flushes: AtomicU64,
    state: RwLock<WcState>,
}

struct WcState {
    buffer: DbOverlay,
    staged: Option<DbOverlay>,
}

impl<B: Database> WriteCache<B> {
    /// New cache over `lower`, auto-flushing once the buffered mutations
    /// exceed `cache_max_size` bytes. A budget of zero disables auto-flush;
    /// the buffer then drains only on an explicit flush or on close.
    pub fn new(lower: B, cache_max_size: usize) -> Self {
        Self {
            lower,
            cache_max_size,
            flushes: AtomicU64::new(0),
            state: RwLock::new(WcState { buffer: DbOverlay::new(), staged: None }),
        }
    }

    /// Values of the key as visible through both overlay levels
    fn visible_values(&self, state: &WcState, idx: DbIndex, key: &[u8]) -> Result<ValueSet> {
        let staged_entry = state.staged.as_ref().and_then(|o| o.get(idx, key));
        resolve_entry(staged_entry, || {
            resolve_entry(state.buffer.get(idx, key), || {
                self.lower.read_multiple(idx, key).map(|v| v.into_iter().collect())
            })
        })
    }

    /// The overlay new mutations go to: the transaction overlay when one is
    /// active, the flush buffer otherwise
    fn target_overlay<'a>(state: &'a mut WcState) -> &'a mut DbOverlay {
        state.staged.as_mut().unwrap_or(&mut state.buffer)
    }

    fn maybe_auto_flush(&self, state: &mut WcState) -> Result<()> {
        if self.cache_max_size > 0
            && state.staged.is_none()
            && state.buffer.byte_size() > self.cache_max_size
        {
            self.flush_buffer(state, None)?;
        }
        Ok(())
    }

    /// Drain the flush buffer into one lower-layer transaction. On failure
    /// the buffer stays intact so the caller can retry.
    fn flush_buffer(&self, state: &mut WcState, size_hint: Option<usize>) -> Result<()> {
        if !state.buffer.is_empty() {
            let hint = std::cmp::max(size_hint.unwrap_or(0), state.buffer.byte_size());
            log::debug!("write cache flushing ~{hint} buffered bytes");
            self.lower.begin_transaction(Some(hint))?;
            let replayed = state
                .buffer
                .entries()
                .try_for_each(|(idx, key, entry)| replay_entry(&self.lower, idx, key, entry));
            match replayed.and_then(|()| self.lower.commit_transaction()) {
                Ok(()) => state.buffer.clear(),
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
}

impl<B: Database> Database for WriteCache<B> {
    fn read_slice(
        &self,
        idx: DbIndex,
        key: &[u8],
        offset: usize,
        size: Option<usize>,
    ) -> Result<Option<Data>> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        let vals = self.visible_values(&state, idx, key)?;
        Ok(vals.into_iter().next().map(|v| util::slice_value(&v, offset, size).to_vec()))
    }

    fn read_multiple(&self, idx: DbIndex, key: &[u8]) -> Result<Vec<Data>> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        Ok(self.visible_values(&state, idx, key)?.into_iter().collect())
    }

    fn read_all(&self, idx: DbIndex) -> Result<BTreeMap<Data, Vec<Data>>> {
        let state = self.state.read().expect("lock to be alive");
        let mut map = util::to_set_map(self.lower.read_all(idx)?);
        state.buffer.apply_to_map(idx, &mut map);
        if let Some(staged) = &state.staged {
            staged.apply_to_map(idx, &mut map);
        }
        Ok(util::to_vec_map(map))
    }

    fn exists(&self, idx: DbIndex, key: &[u8]) -> Result<bool> {
        util::check_key(key)?;
        let state = self.state.read().expect("lock to be alive");
        let no_overlay = state.staged.as_ref().and_then(|o| o.get(idx, key)).is_none()
            && state.buffer.get(idx, key).is_none();
        if no_overlay {
            self.lower.exists(idx, key)
        } else {
            Ok(!self.visible_values(&state, idx, key)?.is_empty())
        }
    }

    fn write(&self, idx: DbIndex, key: &[u8], value: &[u8]) -> Result<()> {
        util::check_key(key)?;
        util::check_value(idx, value)?;
        let mut state = self.state.write().expect("lock to be alive");
        Self::target_overlay(&mut state).write(idx, key, value);
        self.maybe_auto_flush(&mut state)
    }

    fn erase(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.write().expect("lock to be alive");
        if idx.duplicate_keys_allowed() {
            let mut vals = self.visible_values(&state, idx, key)?;
            if vals.pop_first().is_none() {
                return Ok(());
            }
            Self::target_overlay(&mut state).set_values(idx, key, vals);
        } else {
            Self::target_overlay(&mut state).erase_all(idx, key);
        }
        self.maybe_auto_flush(&mut state)
    }

    fn erase_all(&self, idx: DbIndex, key: &[u8]) -> Result<()> {
        util::check_key(key)?;
        let mut state = self.state.write().expect("lock to be alive");
        Self::target_overlay(&mut state).erase_all(idx, key);
        self.maybe_auto_flush(&mut state)
    }

    fn begin_transaction(&self, _size_hint: Option<usize>) -> Result<()> {
        // The transaction lives purely in this layer, so the size hint has
        // nothing to pre-allocate; the lower layer gets its hint at flush
        // time
        let mut state = self.state.write().expect("lock to be alive");
        if state.staged.is_some() {
            return Err(Error::TransactionState("transaction already active"));
        }
        state.staged = Some(DbOverlay::new());
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        let staged = state
            .staged
            .take()
            .ok_or(Error::TransactionState("no transaction to commit"))?;
        state.buffer.merge_from(staged);
        self.maybe_auto_flush(&mut state)
    }

    fn abort_transaction(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        state
            .staged
            .take()
            .map(|_| ())
            .ok_or(Error::TransactionState("no transaction to abort"))
    }

    fn flush(&self, size_hint: Option<usize>) -> Result<bool> {
        let mut state = self.state.write().expect("lock to be alive");
        self.flush_buffer(&mut state, size_hint)?;
        Ok(true)
    }

    fn clear_cache(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock to be alive");
        state.buffer.clear();
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
            let mut state = this.state.write().expect("lock to be alive");
            // A transaction left open counts as aborted
            state.staged = None;
            this.flush_buffer(&mut state, None)?;
        }
        let Self { lower, .. } = this;
        Box::new(lower).close()
    }
}
