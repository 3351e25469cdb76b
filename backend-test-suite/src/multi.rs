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

//! Duplicate-keys map tests

use crate::prelude::*;

const IDX: DbIndex = DbIndex::Ntp1TokenNames;

fn vals<const N: usize>(items: [&[u8]; N]) -> Vec<Data> {
    items.iter().map(|v| v.to_vec()).collect()
}

fn duplicate_fan_out<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    for val in [b"v1", b"v2", b"v3"] {
        db.write(IDX, b"k1", val).unwrap();
    }
    for val in [b"v4", b"v5", b"v6"] {
        db.write(IDX, b"k2", val).unwrap();
    }

    assert_eq!(db.read_multiple(IDX, b"k1").unwrap(), vals([b"v1", b"v2", b"v3"]));
    assert_eq!(db.read_multiple(IDX, b"k2").unwrap(), vals([b"v4", b"v5", b"v6"]));

    let all = db.read_all(IDX).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[b"k1".as_slice()], vals([b"v1", b"v2", b"v3"]));
    assert_eq!(all[b"k2".as_slice()], vals([b"v4", b"v5", b"v6"]));

    let unique = db.read_all_unique(IDX).unwrap();
    assert!(all[b"k1".as_slice()].contains(&unique[b"k1".as_slice()]));
    assert!(all[b"k2".as_slice()].contains(&unique[b"k2".as_slice()]));

    assert!(db.exists(IDX, b"k1").unwrap());
    db.erase_all(IDX, b"k1").unwrap();
    assert!(!db.exists(IDX, b"k1").unwrap());
    assert!(db.exists(IDX, b"k2").unwrap());

    db.close().unwrap();
}

fn duplicate_values_deduplicated<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    db.write(IDX, b"k", b"same").unwrap();
    db.write(IDX, b"k", b"same").unwrap();
    db.write(IDX, b"k", b"other").unwrap();

    assert_eq!(
        db.read_multiple(IDX, b"k").unwrap(),
        vec![b"other".to_vec(), b"same".to_vec()]
    );

    db.close().unwrap();
}

fn erase_removes_one_value<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();

    for val in [b"a", b"b", b"c"] {
        db.write(IDX, b"k", val).unwrap();
    }

    db.erase(IDX, b"k").unwrap();
    assert_eq!(db.read_multiple(IDX, b"k").unwrap().len(), 2);
    db.erase(IDX, b"k").unwrap();
    db.erase(IDX, b"k").unwrap();
    assert!(!db.exists(IDX, b"k").unwrap());
    db.erase(IDX, b"k").unwrap();

    db.close().unwrap();
}

fn read_returns_one_of_stored<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("read_returns_one_of_stored");

    let values: Vec<Data> = (0..10).map(|_| random_value_for(&mut rng, IDX, 200)).collect();
    for val in &values {
        db.write(IDX, b"k", val).unwrap();
    }

    let one = db.read(IDX, b"k").unwrap().unwrap();
    assert!(values.contains(&one));

    // Stable per call
    assert_eq!(db.read(IDX, b"k").unwrap().unwrap(), one);

    db.close().unwrap();
}

fn unique_dump_consistency<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    let mut rng = make_seedable_rng("unique_dump_consistency");

    for _ in 0..20 {
        let key = random_key(&mut rng, 100);
        for _ in 0..rng.gen_range(1..=5) {
            let val = random_value_for(&mut rng, IDX, 300);
            db.write(IDX, &key, &val).unwrap();
        }
    }

    crate::model::assert_unique_consistent(&*db, IDX);
    crate::model::assert_unique_consistent(&*db, DbIndex::AddrsVsPubKeys);

    db.close().unwrap();
}

fn duplicates_in_transaction(db: &dyn Database, commit: bool, erase: bool) {
    db.write(IDX, b"committed key", b"committed value").unwrap();

    db.begin_transaction(Some(100)).unwrap();

    for val in [b"v1", b"v2", b"v3"] {
        db.write(IDX, b"k1", val).unwrap();
    }
    for val in [b"v4", b"v5", b"v6"] {
        db.write(IDX, b"k2", val).unwrap();
    }

    assert_eq!(db.read_multiple(IDX, b"k1").unwrap(), vals([b"v1", b"v2", b"v3"]));
    assert_eq!(db.read_multiple(IDX, b"k2").unwrap(), vals([b"v4", b"v5", b"v6"]));

    let all = db.read_all(IDX).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[b"k1".as_slice()], vals([b"v1", b"v2", b"v3"]));

    if erase {
        db.erase_all(IDX, b"k1").unwrap();
        db.erase_all(IDX, b"k2").unwrap();
        assert!(!db.exists(IDX, b"k1").unwrap());
        assert!(!db.exists(IDX, b"k2").unwrap());
    }

    if commit {
        db.commit_transaction().unwrap();
    } else {
        db.abort_transaction().unwrap();
    }

    let survives = commit && !erase;
    assert_eq!(db.exists(IDX, b"k1").unwrap(), survives);
    assert_eq!(db.exists(IDX, b"k2").unwrap(), survives);
    if survives {
        assert_eq!(db.read_multiple(IDX, b"k1").unwrap(), vals([b"v1", b"v2", b"v3"]));
    } else {
        assert_eq!(db.read_multiple(IDX, b"k1").unwrap(), Vec::<Data>::new());
    }

    // The pre-transaction value is there no matter what happened
    assert_eq!(
        db.read_multiple(IDX, b"committed key").unwrap(),
        vec![b"committed value".to_vec()]
    );
}

fn duplicates_tx_committed<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    duplicates_in_transaction(&*db, true, false);
    db.close().unwrap();
}

fn duplicates_tx_committed_after_erase<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    duplicates_in_transaction(&*db, true, true);
    db.close().unwrap();
}

fn duplicates_tx_aborted<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    duplicates_in_transaction(&*db, false, false);
    db.close().unwrap();
}

fn duplicates_tx_aborted_after_erase<F: BackendFn>(backend_fn: Arc<F>) {
    let db = backend_fn.create();
    duplicates_in_transaction(&*db, false, true);
    db.close().unwrap();
}

tests![
    duplicate_fan_out,
    duplicate_values_deduplicated,
    duplicates_tx_aborted,
    duplicates_tx_aborted_after_erase,
    duplicates_tx_committed,
    duplicates_tx_committed_after_erase,
    erase_removes_one_value,
    read_returns_one_of_stored,
    unique_dump_consistency,
];
