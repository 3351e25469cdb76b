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

//! Caching layers stackable over any [txdb_core::Database]
//!
//! Each layer exclusively owns the layer below it and implements the full
//! [txdb_core::Database] contract itself, so layers compose freely: an LRU
//! cache over a read-through cache over the persistent backend behaves, to
//! the caller, exactly like the bare persistent backend once everything is
//! flushed. Closing the top layer closes the stack recursively.

pub mod lru;
pub mod read_cache;
pub mod write_cache;

pub use lru::LruCache;
pub use read_cache::ReadCache;
pub use write_cache::WriteCache;

use txdb_core::overlay::KeyOverlay;
use txdb_core::{Database, DbIndex, Result};

/// Replay one buffered entry into the layer below.
///
/// Runs inside a transaction the caller has opened on the lower layer, so a
/// replay of many entries applies atomically.
pub(crate) fn replay_entry<B: Database>(
    lower: &B,
    idx: DbIndex,
    key: &[u8],
    entry: &KeyOverlay,
) -> Result<()> {
    match entry {
        KeyOverlay::Erased => lower.erase_all(idx, key),
        KeyOverlay::Written(vals) => {
            lower.erase_all(idx, key)?;
            for val in vals {
                lower.write(idx, key, val)?;
            }
            Ok(())
        }
        KeyOverlay::Appended(vals) => {
            for val in vals {
                lower.write(idx, key, val)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod test;
