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

//! The big-flush oracle scenario
//!
//! Writes a stream of random mixed data across all maps into a cache stack
//! and into the in-memory oracle, then flushes the stack exactly once and
//! requires bytewise agreement before and after. Only meaningful for stacks
//! that do not auto-flush, so this is not part of the generic test list;
//! stack test binaries add it explicitly via [trial].

use libtest_mimic::Trial;

use crate::model::assert_equal_contents;
use crate::prelude::*;

const MAX_ENTRIES_PER_KEY: usize = 100;
const MAX_VALUE_LENGTH: usize = 10_000;
const MAX_KEY_LENGTH: usize = 500;

/// Fill `db` and the oracle with `target_bytes` of identical random data,
/// flush `db` once and compare contents at each stage.
pub fn cache_big_flush(db: &dyn Database, target_bytes: usize) {
    let mut rng = make_seedable_rng("cache_big_flush");
    let oracle = InMemoryDb::new();

    let mut written = 0usize;
    while written < target_bytes {
        let idx = DbIndex::ALL[rng.gen_range(0..DbIndex::COUNT)];
        let key = random_key(&mut rng, MAX_KEY_LENGTH);
        written += key.len();

        if idx.duplicate_keys_allowed() {
            let entry_count = 1 + rng.gen_range(0..MAX_ENTRIES_PER_KEY);
            for _ in 0..entry_count {
                let value = random_value_for(&mut rng, idx, MAX_VALUE_LENGTH);
                db.write(idx, &key, &value).unwrap();
                oracle.write(idx, &key, &value).unwrap();
                written += value.len();
            }
        } else {
            let value = random_value_for(&mut rng, idx, MAX_VALUE_LENGTH);
            db.write(idx, &key, &value).unwrap();
            oracle.write(idx, &key, &value).unwrap();
            written += value.len();
        }
    }

    // Nothing must have flushed on its own, we flush exactly once below
    assert_eq!(db.flush_count(), 0);
    assert_equal_contents(db, &oracle);

    // The caller provides no realistic size estimate; sizing the lower-layer
    // transaction is entirely on the cache
    assert!(db.flush(Some(1 << 22)).unwrap());
    assert_eq!(db.flush_count(), 1);
    db.clear_cache().unwrap();

    assert_equal_contents(db, &oracle);
}

/// Make a named big-flush trial for one stack composition
pub fn trial<F: BackendFn>(
    name: &'static str,
    backend_fn: Arc<F>,
    target_bytes: usize,
    ignored: bool,
) -> Trial {
    Trial::test(name, move || {
        let db = backend_fn.create();
        cache_big_flush(&*db, target_bytes);
        db.close().unwrap();
        Ok(())
    })
    .with_ignored_flag(ignored)
}
