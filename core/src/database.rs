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

//! The uniform interface implemented by every backend and cache layer

use std::collections::BTreeMap;

use crate::{Data, DbIndex, Result};

/// A transactional, multi-index key-value store.
///
/// Instances are internally synchronized and shared across threads, so all
/// operations take `&self`. At most one write transaction is active per
/// instance at any time; reads outside a transaction observe the last
/// committed state, reads inside one additionally observe its staged writes.
///
/// Cache layers implement this trait over a lower layer they exclusively
/// own, with semantics indistinguishable from the bare backend once their
/// buffers are flushed. [Self::close] consumes the instance and tears the
/// whole stack down recursively.
pub trait Database: Send + Sync {
    /// Read the value stored under the key.
    ///
    /// On duplicate-keys maps one of the stored values is returned
    /// (deterministically per call). Absence is `Ok(None)`.
    fn read(&self, idx: DbIndex, key: &[u8]) -> Result<Option<Data>> {
        self.read_slice(idx, key, 0, None)
    }

    /// Like [Self::read], but returning only up to `size` bytes of the value
    /// starting at `offset`. The range is clamped to the value length; `None`
    /// size means "up to the end".
    fn read_slice(
        &self,
        idx: DbIndex,
        key: &[u8],
        offset: usize,
        size: Option<usize>,
    ) -> Result<Option<Data>>;

    /// Read all values stored under the key. Empty if the key is absent.
    fn read_multiple(&self, idx: DbIndex, key: &[u8]) -> Result<Vec<Data>>;

    /// Dump a whole key-value map.
    fn read_all(&self, idx: DbIndex) -> Result<BTreeMap<Data, Vec<Data>>>;

    /// Dump a whole key-value map with one value per key. On duplicate-keys
    /// maps, the value picked is one of the stored values.
    fn read_all_unique(&self, idx: DbIndex) -> Result<BTreeMap<Data, Data>> {
        let all = self.read_all(idx)?;
        Ok(all
            .into_iter()
            .filter_map(|(key, vals)| vals.into_iter().next().map(|v| (key, v)))
            .collect())
    }

    /// Whether the key holds at least one value.
    fn exists(&self, idx: DbIndex, key: &[u8]) -> Result<bool>;

    /// Store a value under the key: replaces on single-value maps, appends
    /// on duplicate-keys maps.
    fn write(&self, idx: DbIndex, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove one value stored under the key; every value on single-value
    /// maps. Succeeds if the key is absent.
    fn erase(&self, idx: DbIndex, key: &[u8]) -> Result<()>;

    /// Remove every value stored under the key. Succeeds if the key is
    /// absent.
    fn erase_all(&self, idx: DbIndex, key: &[u8]) -> Result<()>;

    /// Open a write transaction on this instance. `size_hint` is an estimate
    /// of the total bytes the transaction will write, letting the persistent
    /// backend pre-grow its map. Fails if a transaction is already active.
    fn begin_transaction(&self, size_hint: Option<usize>) -> Result<()>;

    /// Atomically apply the active transaction.
    fn commit_transaction(&self) -> Result<()>;

    /// Discard the active transaction.
    fn abort_transaction(&self) -> Result<()>;

    /// Drain any buffered writes into the layer below in one transaction and
    /// make the result durable. `size_hint` is passed down as the
    /// transaction size estimate.
    fn flush(&self, size_hint: Option<usize>) -> Result<bool>;

    /// Drop cached state of this layer. Buffered writes that have not been
    /// flushed are discarded too, so this is only sound right after a
    /// successful [Self::flush].
    fn clear_cache(&self) -> Result<()>;

    /// Number of successful flushes this instance has performed.
    fn flush_count(&self) -> u64;

    /// Flush outstanding state and release all resources of the stack.
    fn close(self: Box<Self>) -> Result<()>;
}
