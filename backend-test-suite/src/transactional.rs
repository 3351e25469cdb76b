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

//! Transaction isolation and atomicity tests

use crate::prelude::*;

fn abort_discards_staged_writes<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.begin_transaction(None).unwrap();
    db.write(DbIndex::Main, b"key1", b"val1").unwrap();
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), Some(b"val1".to_vec()));
    assert!(db.exists(DbIndex::Main, b"key1").unwrap());

    db.write(DbIndex::Main, b"key1", b"val2").unwrap();
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), Some(b"val2".to_vec()));

    db.abort_transaction().unwrap();

    // Uncommitted data must not exist
    assert!(!db.exists(DbIndex::Main, b"key1").unwrap());
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), None);

    db.close().unwrap();
}

fn commit_makes_writes_visible<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.begin_transaction(None).unwrap();
    db.write(DbIndex::Main, b"a", b"0").unwrap();
    db.write(DbIndex::Main, b"b", b"1").unwrap();
    db.commit_transaction().unwrap();

    assert_eq!(db.read(DbIndex::Main, b"a").unwrap(), Some(b"0".to_vec()));
    assert_eq!(db.read(DbIndex::Main, b"b").unwrap(), Some(b"1".to_vec()));

    db.close().unwrap();
}

fn values_written_before_begin_survive_abort<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.write(DbIndex::Main, b"stable", b"committed").unwrap();

    db.begin_transaction(None).unwrap();
    db.write(DbIndex::Main, b"stable", b"overwritten").unwrap();
    db.write(DbIndex::Main, b"temp", b"staged").unwrap();
    db.erase(DbIndex::Main, b"stable").unwrap();
    db.abort_transaction().unwrap();

    assert_eq!(db.read(DbIndex::Main, b"stable").unwrap(), Some(b"committed".to_vec()));
    assert!(!db.exists(DbIndex::Main, b"temp").unwrap());

    db.close().unwrap();
}

fn erase_inside_transaction<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.write(DbIndex::Main, b"gone", b"soon").unwrap();

    db.begin_transaction(None).unwrap();
    db.erase(DbIndex::Main, b"gone").unwrap();
    assert!(!db.exists(DbIndex::Main, b"gone").unwrap());
    db.commit_transaction().unwrap();

    assert!(!db.exists(DbIndex::Main, b"gone").unwrap());

    db.close().unwrap();
}

fn commit_atomicity_union<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("commit_atomicity_union");

    // Pre-state
    let mut expected = BTreeMap::new();
    for i in 0..20u32 {
        let key = format!("pre{i}").into_bytes();
        let val = random_bytes(&mut rng, 100);
        db.write(DbIndex::Main, &key, &val).unwrap();
        expected.insert(key, vec![val]);
    }

    // A transaction overwriting some keys, adding others, erasing a few
    db.begin_transaction(None).unwrap();
    for i in 0..10u32 {
        let key = format!("pre{i}").into_bytes();
        let val = random_bytes(&mut rng, 100);
        db.write(DbIndex::Main, &key, &val).unwrap();
        expected.insert(key, vec![val]);
    }
    for i in 0..10u32 {
        let key = format!("new{i}").into_bytes();
        let val = random_bytes(&mut rng, 100);
        db.write(DbIndex::Main, &key, &val).unwrap();
        expected.insert(key, vec![val]);
    }
    for i in 15..20u32 {
        let key = format!("pre{i}").into_bytes();
        db.erase(DbIndex::Main, &key).unwrap();
        expected.remove(&key);
    }
    db.commit_transaction().unwrap();

    assert_eq!(db.read_all(DbIndex::Main).unwrap(), expected);

    db.close().unwrap();
}

fn read_your_writes_inside_transaction<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.begin_transaction(None).unwrap();
    db.write(DbIndex::Main, b"hello", b"a").unwrap();
    assert_eq!(db.read(DbIndex::Main, b"hello").unwrap(), Some(b"a".to_vec()));
    db.write(DbIndex::Main, b"hello", b"b").unwrap();
    assert_eq!(db.read(DbIndex::Main, b"hello").unwrap(), Some(b"b".to_vec()));
    db.commit_transaction().unwrap();

    assert_eq!(db.read(DbIndex::Main, b"hello").unwrap(), Some(b"b".to_vec()));

    db.close().unwrap();
}

fn transaction_state_errors<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    assert_eq!(
        db.commit_transaction(),
        Err(Error::TransactionState("no transaction to commit"))
    );
    assert_eq!(db.abort_transaction(), Err(Error::TransactionState("no transaction to abort")));

    db.begin_transaction(None).unwrap();
    assert_eq!(
        db.begin_transaction(None),
        Err(Error::TransactionState("transaction already active"))
    );
    db.abort_transaction().unwrap();

    // The failed nested begin must not have clobbered anything; the cycle
    // works again from scratch
    db.begin_transaction(None).unwrap();
    db.write(DbIndex::Main, b"k", b"v").unwrap();
    db.commit_transaction().unwrap();
    assert_eq!(db.read(DbIndex::Main, b"k").unwrap(), Some(b"v".to_vec()));

    db.close().unwrap();
}

fn many_entries_in_one_transaction<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("many_entries_in_one_transaction");

    let key_size = 100;
    let val_size = 1_000_000;
    let count = 100;

    let mut entries = BTreeMap::new();
    db.begin_transaction(Some(count * (key_size + val_size) * 11 / 10)).unwrap();
    while entries.len() < count {
        let key = random_bytes(&mut rng, key_size);
        let val = random_bytes(&mut rng, val_size);
        db.write(DbIndex::Main, &key, &val).unwrap();
        assert_eq!(db.read(DbIndex::Main, &key).unwrap().as_ref(), Some(&val));
        assert!(db.exists(DbIndex::Main, &key).unwrap());
        entries.insert(key, val);
    }
    db.commit_transaction().unwrap();

    let all = db.read_all(DbIndex::Main).unwrap();
    assert_eq!(all.len(), count);
    for (key, val) in &entries {
        assert_eq!(db.read(DbIndex::Main, key).unwrap().as_ref(), Some(val));
    }

    db.close().unwrap();
}

tests![
    abort_discards_staged_writes,
    commit_atomicity_union,
    commit_makes_writes_visible,
    erase_inside_transaction,
    many_entries_in_one_transaction,
    read_your_writes_inside_transaction,
    transaction_state_errors,
    values_written_before_begin_survive_abort,
];
