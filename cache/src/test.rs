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

use txdb_core::{Database, DbIndex, Error};
use txdb_inmemory::InMemoryDb;

use crate::{LruCache, ReadCache, WriteCache};

const UNI: DbIndex = DbIndex::Main;
const DUP: DbIndex = DbIndex::Ntp1TokenNames;

#[test]
fn write_cache_defers_until_flush() {
    let cache = WriteCache::new(InMemoryDb::new(), 0);

    cache.write(UNI, b"k", b"v").unwrap();
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(cache.lower.read(UNI, b"k").unwrap(), None);

    assert!(cache.flush(None).unwrap());
    assert_eq!(cache.lower.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn write_cache_tombstone_hides_lower_values() {
    let lower = InMemoryDb::new();
    lower.write(UNI, b"k", b"old").unwrap();
    lower.write(DUP, b"d", b"x").unwrap();

    let cache = WriteCache::new(lower, 0);
    assert!(cache.exists(UNI, b"k").unwrap());

    cache.erase(UNI, b"k").unwrap();
    assert!(!cache.exists(UNI, b"k").unwrap());
    assert_eq!(cache.read(UNI, b"k").unwrap(), None);

    cache.erase_all(DUP, b"d").unwrap();
    assert_eq!(cache.read_multiple(DUP, b"d").unwrap(), Vec::<Vec<u8>>::new());

    cache.flush(None).unwrap();
    assert_eq!(cache.lower.read(UNI, b"k").unwrap(), None);
    assert!(!cache.lower.exists(DUP, b"d").unwrap());
}

#[test]
fn write_cache_append_merges_with_lower_values() {
    let lower = InMemoryDb::new();
    lower.write(DUP, b"k", b"below").unwrap();

    let cache = WriteCache::new(lower, 0);
    cache.write(DUP, b"k", b"above").unwrap();

    assert_eq!(
        cache.read_multiple(DUP, b"k").unwrap(),
        vec![b"above".to_vec(), b"below".to_vec()]
    );
    let all = cache.read_all(DUP).unwrap();
    assert_eq!(all[b"k".as_slice()], vec![b"above".to_vec(), b"below".to_vec()]);
}

#[test]
fn write_cache_auto_flushes_past_budget() {
    let cache = WriteCache::new(InMemoryDb::new(), 64);

    cache.write(UNI, b"small", b"x").unwrap();
    assert_eq!(cache.flush_count(), 0);

    cache.write(UNI, b"big", &[0u8; 100]).unwrap();
    assert_eq!(cache.flush_count(), 1);
    assert_eq!(cache.lower.read(UNI, b"small").unwrap(), Some(b"x".to_vec()));
    assert_eq!(cache.lower.read(UNI, b"big").unwrap(), Some(vec![0u8; 100]));
}

#[test]
fn write_cache_transaction_is_cache_level() {
    let cache = WriteCache::new(InMemoryDb::new(), 0);

    cache.write(UNI, b"pre", b"kept").unwrap();

    cache.begin_transaction(None).unwrap();
    cache.write(UNI, b"k", b"v").unwrap();
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    // Nothing reached the lower layer, not even a transaction
    assert_eq!(cache.lower.read(UNI, b"k").unwrap(), None);
    assert_eq!(
        cache.lower.commit_transaction(),
        Err(Error::TransactionState("no transaction to commit"))
    );

    cache.abort_transaction().unwrap();
    assert_eq!(cache.read(UNI, b"k").unwrap(), None);
    assert_eq!(cache.read(UNI, b"pre").unwrap(), Some(b"kept".to_vec()));

    cache.begin_transaction(None).unwrap();
    cache.write(UNI, b"k2", b"v2").unwrap();
    cache.commit_transaction().unwrap();
    assert_eq!(cache.read(UNI, b"k2").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn write_cache_flush_counter_and_aggregate() {
    let cache = WriteCache::new(InMemoryDb::new(), 0);
    let total_before = crate::write_cache::total_flush_count();

    cache.write(UNI, b"k", b"v").unwrap();
    cache.flush(None).unwrap();
    cache.flush(None).unwrap();

    assert_eq!(cache.flush_count(), 2);
    assert!(crate::write_cache::total_flush_count() >= total_before + 2);
}

#[test]
fn read_cache_serves_and_invalidates() {
    let lower = InMemoryDb::new();
    lower.write(UNI, b"k", b"v").unwrap();

    let cache = ReadCache::new(lower, 0);
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));

    // Writes go through and update the cached entry
    cache.write(UNI, b"k", b"v2").unwrap();
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(cache.lower.read(UNI, b"k").unwrap(), Some(b"v2".to_vec()));

    cache.erase(UNI, b"k").unwrap();
    assert!(!cache.exists(UNI, b"k").unwrap());
    assert!(!cache.lower.exists(UNI, b"k").unwrap());
}

#[test]
fn read_cache_abort_invalidates_touched_entries() {
    let lower = InMemoryDb::new();
    lower.write(UNI, b"stable", b"committed").unwrap();

    let cache = ReadCache::new(lower, 0);
    cache.begin_transaction(None).unwrap();
    cache.write(UNI, b"temp", b"staged").unwrap();
    assert_eq!(cache.read(UNI, b"temp").unwrap(), Some(b"staged".to_vec()));
    assert_eq!(cache.read(UNI, b"stable").unwrap(), Some(b"committed".to_vec()));
    cache.abort_transaction().unwrap();

    assert_eq!(cache.read(UNI, b"temp").unwrap(), None);
    assert_eq!(cache.read(UNI, b"stable").unwrap(), Some(b"committed".to_vec()));
}

#[test]
fn read_cache_negative_entries() {
    let cache = ReadCache::new(InMemoryDb::new(), 0);

    assert!(!cache.exists(UNI, b"missing").unwrap());
    // The absence is cached; a subsequent write must override it
    cache.write(UNI, b"missing", b"now present").unwrap();
    assert_eq!(cache.read(UNI, b"missing").unwrap(), Some(b"now present".to_vec()));
}

#[test]
fn lru_cache_evicts_in_recency_order() {
    let cache = LruCache::new(InMemoryDb::new(), 2);

    cache.write(UNI, b"a", b"1").unwrap();
    cache.write(UNI, b"b", b"2").unwrap();
    // Touch "a" so "b" becomes the eviction candidate
    assert_eq!(cache.read(UNI, b"a").unwrap(), Some(b"1".to_vec()));
    cache.write(UNI, b"c", b"3").unwrap();

    // "b" was dirty, so eviction wrote it back to the lower layer
    assert_eq!(cache.lower.read(UNI, b"b").unwrap(), Some(b"2".to_vec()));
    // "a" and "c" are still buffered only
    assert_eq!(cache.lower.read(UNI, b"a").unwrap(), None);
    assert_eq!(cache.lower.read(UNI, b"c").unwrap(), None);

    // All keys readable through the cache regardless of eviction
    for (k, v) in [(b"a", b"1"), (b"b", b"2"), (b"c", b"3")] {
        assert_eq!(cache.read(UNI, k).unwrap(), Some(v.to_vec()));
    }
}

#[test]
fn lru_cache_zero_bound_never_evicts() {
    let cache = LruCache::new(InMemoryDb::new(), 0);

    for i in 0..1000u32 {
        cache.write(UNI, &i.to_le_bytes(), b"v").unwrap();
    }
    // Nothing reached the lower layer
    assert_eq!(cache.lower.read_all(UNI).unwrap().len(), 0);

    cache.flush(None).unwrap();
    assert_eq!(cache.lower.read_all(UNI).unwrap().len(), 1000);
    assert_eq!(cache.flush_count(), 1);
}

#[test]
fn lru_cache_duplicate_append_and_erase() {
    let lower = InMemoryDb::new();
    lower.write(DUP, b"k", b"below").unwrap();

    let cache = LruCache::new(lower, 0);
    cache.write(DUP, b"k", b"above").unwrap();
    assert_eq!(
        cache.read_multiple(DUP, b"k").unwrap(),
        vec![b"above".to_vec(), b"below".to_vec()]
    );

    // Removes the smallest visible value
    cache.erase(DUP, b"k").unwrap();
    assert_eq!(cache.read_multiple(DUP, b"k").unwrap(), vec![b"below".to_vec()]);

    cache.erase_all(DUP, b"k").unwrap();
    assert!(!cache.exists(DUP, b"k").unwrap());

    cache.flush(None).unwrap();
    assert!(!cache.lower.exists(DUP, b"k").unwrap());
}

#[test]
fn lru_cache_transactions() {
    let cache = LruCache::new(InMemoryDb::new(), 0);

    cache.write(UNI, b"pre", b"kept").unwrap();

    cache.begin_transaction(None).unwrap();
    cache.write(UNI, b"k", b"v").unwrap();
    assert_eq!(cache.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    cache.abort_transaction().unwrap();
    assert_eq!(cache.read(UNI, b"k").unwrap(), None);
    assert_eq!(cache.read(UNI, b"pre").unwrap(), Some(b"kept".to_vec()));

    cache.begin_transaction(None).unwrap();
    cache.write(DUP, b"d", b"v1").unwrap();
    cache.write(DUP, b"d", b"v2").unwrap();
    cache.commit_transaction().unwrap();
    assert_eq!(cache.read_multiple(DUP, b"d").unwrap(), vec![b"v1".to_vec(), b"v2".to_vec()]);
}

#[test]
fn stacked_cache_flush_drains_one_level_at_a_time() {
    let bottom = InMemoryDb::new();
    let stack = LruCache::new(ReadCache::new(WriteCache::new(bottom, 0), 0), 0);

    stack.write(UNI, b"k", b"v").unwrap();
    stack.write(DUP, b"d", b"dv").unwrap();

    // A flush of the top drains the LRU buffer through the read-through
    // layer into the write cache's buffer
    stack.flush(None).unwrap();
    assert_eq!(stack.lower.lower.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(stack.lower.lower.lower.read(UNI, b"k").unwrap(), None);

    // Flushing the write cache takes it the rest of the way down
    stack.lower.lower.flush(None).unwrap();
    assert_eq!(stack.lower.lower.lower.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(stack.lower.lower.lower.read_multiple(DUP, b"d").unwrap(), vec![b"dv".to_vec()]);

    // The stack keeps serving the same state throughout
    assert_eq!(stack.read(UNI, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(stack.read_multiple(DUP, b"d").unwrap(), vec![b"dv".to_vec()]);
}
