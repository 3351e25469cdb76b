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

//! Some basic tests

use crate::prelude::*;

fn write_read_erase<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    assert!(db.write(DbIndex::Main, b"key1", b"val1").is_ok());
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), Some(b"val1".to_vec()));
    assert!(db.exists(DbIndex::Main, b"key1").unwrap());

    assert!(db.write(DbIndex::Main, b"key1", b"val2").is_ok());
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), Some(b"val2".to_vec()));
    assert!(db.exists(DbIndex::Main, b"key1").unwrap());

    assert!(db.erase(DbIndex::Main, b"key1").is_ok());
    assert!(!db.exists(DbIndex::Main, b"key1").unwrap());
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), None);

    db.close().unwrap();
}

fn erase_absent_key_is_ok<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    assert!(db.erase(DbIndex::Main, b"nothing").is_ok());
    assert!(db.erase_all(DbIndex::Main, b"nothing").is_ok());
    assert!(db.erase(DbIndex::Ntp1TokenNames, b"nothing").is_ok());
    assert!(db.erase_all(DbIndex::Ntp1TokenNames, b"nothing").is_ok());

    db.close().unwrap();
}

fn maps_are_independent<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.write(DbIndex::Tx, b"key", b"tx value").unwrap();
    assert!(!db.exists(DbIndex::Main, b"key").unwrap());
    assert!(!db.exists(DbIndex::Blocks, b"key").unwrap());
    assert_eq!(db.read(DbIndex::Tx, b"key").unwrap(), Some(b"tx value".to_vec()));

    for idx in DbIndex::ALL {
        if idx != DbIndex::Tx {
            assert_eq!(db.read_all(idx).unwrap().len(), 0, "{idx:?} expected empty");
        }
    }

    db.close().unwrap();
}

fn slice_reads<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.write(DbIndex::Main, b"k", b"abcdefghij").unwrap();
    assert_eq!(db.read_slice(DbIndex::Main, b"k", 2, Some(3)).unwrap(), Some(b"cde".to_vec()));
    assert_eq!(db.read_slice(DbIndex::Main, b"k", 9, Some(5)).unwrap(), Some(b"j".to_vec()));
    assert_eq!(db.read_slice(DbIndex::Main, b"k", 20, Some(5)).unwrap(), Some(b"".to_vec()));
    assert_eq!(db.read_slice(DbIndex::Main, b"k", 0, None).unwrap(), Some(b"abcdefghij".to_vec()));
    assert_eq!(db.read_slice(DbIndex::Main, b"k", 4, None).unwrap(), Some(b"efghij".to_vec()));
    assert_eq!(db.read_slice(DbIndex::Main, b"k", 0, Some(0)).unwrap(), Some(b"".to_vec()));
    assert_eq!(db.read_slice(DbIndex::Main, b"absent", 0, None).unwrap(), None);

    // Random offset/size pairs against the substring definition
    let mut rng = make_seedable_rng("slice_reads");
    let value = random_bytes(&mut rng, 1000);
    db.write(DbIndex::Main, b"sliced", &value).unwrap();
    for _ in 0..200 {
        let offset = rng.gen_range(0..=value.len() + 10);
        let size = rng.gen_range(0..=value.len() + 10);
        let start = offset.min(value.len());
        let end = (start + size).min(value.len());
        let expected = value[start..end].to_vec();
        assert_eq!(
            db.read_slice(DbIndex::Main, b"sliced", offset, Some(size)).unwrap(),
            Some(expected),
            "offset {offset}, size {size}",
        );
    }

    db.close().unwrap();
}

fn invalid_arguments_rejected<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    assert_eq!(db.write(DbIndex::Main, b"", b"v"), Err(Error::InvalidArgument("empty key")));
    assert_eq!(db.read(DbIndex::Main, b""), Err(Error::InvalidArgument("empty key")));
    assert_eq!(db.exists(DbIndex::Main, b""), Err(Error::InvalidArgument("empty key")));
    assert_eq!(db.erase(DbIndex::Main, b""), Err(Error::InvalidArgument("empty key")));

    let long_key = vec![7u8; MAX_KEY_SIZE + 1];
    assert_eq!(
        db.write(DbIndex::Main, &long_key, b"v"),
        Err(Error::InvalidArgument("key too long"))
    );
    let max_key = vec![7u8; MAX_KEY_SIZE];
    assert!(db.write(DbIndex::Main, &max_key, b"v").is_ok());

    let oversized = vec![7u8; MAX_DUP_VALUE_SIZE + 1];
    assert_eq!(
        db.write(DbIndex::Ntp1TokenNames, b"k", &oversized),
        Err(Error::InvalidArgument("value too long for a duplicate-keys map"))
    );
    assert!(!db.exists(DbIndex::Ntp1TokenNames, b"k").unwrap());

    // At the limit the write goes through
    let at_limit = vec![7u8; MAX_DUP_VALUE_SIZE];
    assert!(db.write(DbIndex::Ntp1TokenNames, b"k", &at_limit).is_ok());
    assert_eq!(db.read(DbIndex::Ntp1TokenNames, b"k").unwrap(), Some(at_limit));

    // Unique maps take the same value without complaint
    assert!(db.write(DbIndex::Main, b"k", &oversized).is_ok());

    db.close().unwrap();
}

fn large_values_on_unique_maps<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("large_values_on_unique_maps");

    let value = random_bytes(&mut rng, 1_000_000);
    db.write(DbIndex::Blocks, b"block", &value).unwrap();
    assert_eq!(db.read(DbIndex::Blocks, b"block").unwrap(), Some(value.clone()));
    assert_eq!(
        db.read_slice(DbIndex::Blocks, b"block", 999_990, None).unwrap(),
        Some(value[999_990..].to_vec())
    );

    db.close().unwrap();
}

fn many_entries<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("many_entries");

    let mut entries = BTreeMap::new();
    while entries.len() < 100 {
        let key = random_bytes(&mut rng, 100);
        let val = random_bytes(&mut rng, 10_000);
        db.write(DbIndex::Main, &key, &val).unwrap();
        assert_eq!(db.read(DbIndex::Main, &key).unwrap().as_ref(), Some(&val));
        entries.insert(key, val);
    }

    for (key, val) in &entries {
        assert_eq!(db.read(DbIndex::Main, key).unwrap().as_ref(), Some(val));
        assert!(db.exists(DbIndex::Main, key).unwrap());
    }

    let all = db.read_all(DbIndex::Main).unwrap();
    assert_eq!(all.len(), entries.len());
    for (key, vals) in &all {
        assert_eq!(vals, &vec![entries[key].clone()]);
    }

    db.close().unwrap();
}

fn flush_preserves_readable_state<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("flush_preserves_readable_state");

    for _ in 0..50 {
        let idx = DbIndex::ALL[rng.gen_range(0..DbIndex::COUNT)];
        let key = random_key(&mut rng, 50);
        let val = random_value_for(&mut rng, idx, 500);
        db.write(idx, &key, &val).unwrap();
    }

    let before: Vec<_> = DbIndex::ALL.iter().map(|idx| db.read_all(*idx).unwrap()).collect();
    let flushes_before = db.flush_count();

    assert!(db.flush(Some(1 << 16)).unwrap());
    assert!(db.flush_count() > flushes_before);

    for (idx, expected) in DbIndex::ALL.iter().zip(before) {
        assert_eq!(db.read_all(*idx).unwrap(), expected, "state changed across flush");
    }

    db.close().unwrap();
}

fn clear_cache_after_flush_keeps_state<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.write(DbIndex::Main, b"k", b"v").unwrap();
    db.write(DbIndex::Ntp1TokenNames, b"d", b"dv").unwrap();

    assert!(db.flush(None).unwrap());
    db.clear_cache().unwrap();

    assert_eq!(db.read(DbIndex::Main, b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(db.read_multiple(DbIndex::Ntp1TokenNames, b"d").unwrap(), vec![b"dv".to_vec()]);

    db.close().unwrap();
}

tests![
    clear_cache_after_flush_keeps_state,
    erase_absent_key_is_ok,
    flush_preserves_readable_state,
    invalid_arguments_rejected,
    large_values_on_unique_maps,
    many_entries,
    maps_are_independent,
    slice_reads,
    write_read_erase,
];
