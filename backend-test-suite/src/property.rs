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

//! Randomized property-based tests

use crate::model::{assert_equal_contents, assert_unique_consistent, WriteAction};
use crate::prelude::*;

/// Pick a key from a small pool so operations collide on purpose
fn pooled_key(rng: &mut impl Rng) -> Data {
    format!("key{:02}", rng.gen_range(0..20u32)).into_bytes()
}

fn random_action(rng: &mut impl Rng) -> WriteAction {
    let idx = DbIndex::ALL[rng.gen_range(0..DbIndex::COUNT)];
    let key = pooled_key(rng);
    match rng.gen_range(0..10) {
        0..=5 => {
            let val = random_value_for(rng, idx, 400);
            WriteAction::Write(idx, key, val)
        }
        6..=7 => WriteAction::Erase(idx, key),
        _ => WriteAction::EraseAll(idx, key),
    }
}

/// Apply an identical random operation sequence, including transaction
/// boundaries and flushes, to the backend under test and to the in-memory
/// oracle; their contents must agree at every step.
fn random_ops_match_oracle<F: BackendFn>(backend_fn: Arc<F>) {
    let mut rng = make_seedable_rng("random_ops_match_oracle");
    let db = backend_fn.create();
    let oracle = InMemoryDb::new();

    let mut in_tx = false;
    for _ in 0..300 {
        match rng.gen_range(0..100) {
            0..=74 => {
                let action = random_action(&mut rng);
                action.apply(&*db);
                action.apply(&oracle);
                let idx = action.index();
                assert_eq!(db.read_all(idx).unwrap(), oracle.read_all(idx).unwrap());
            }
            75..=84 => {
                if in_tx {
                    db.commit_transaction().unwrap();
                    oracle.commit_transaction().unwrap();
                } else {
                    db.begin_transaction(None).unwrap();
                    oracle.begin_transaction(None).unwrap();
                }
                in_tx = !in_tx;
            }
            85..=89 => {
                if in_tx {
                    db.abort_transaction().unwrap();
                    oracle.abort_transaction().unwrap();
                    in_tx = false;
                    assert_equal_contents(&*db, &oracle);
                }
            }
            90..=94 => {
                if !in_tx {
                    assert!(db.flush(None).unwrap());
                    assert_equal_contents(&*db, &oracle);
                }
            }
            _ => {
                let idx = DbIndex::ALL[rng.gen_range(0..DbIndex::COUNT)];
                let key = pooled_key(&mut rng);
                assert_eq!(db.exists(idx, &key).unwrap(), oracle.exists(idx, &key).unwrap());
                assert_eq!(db.read(idx, &key).unwrap(), oracle.read(idx, &key).unwrap());
                assert_eq!(
                    db.read_multiple(idx, &key).unwrap(),
                    oracle.read_multiple(idx, &key).unwrap()
                );
            }
        }
    }

    if in_tx {
        db.commit_transaction().unwrap();
        oracle.commit_transaction().unwrap();
    }

    assert!(db.flush(None).unwrap());
    assert_equal_contents(&*db, &oracle);
    for idx in DbIndex::ALL {
        assert_unique_consistent(&*db, idx);
    }

    db.close().unwrap();
}

/// Slice reads equal the substring definition for arbitrary values and
/// offset/size pairs
fn slice_matches_substring<F: BackendFn>(backend_fn: Arc<F>) {
    let config = proptest::test_runner::Config {
        cases: 64,
        source_file: Some(file!()),
        ..Default::default()
    };
    let mut runner = proptest::test_runner::TestRunner::new(config);

    let strategy = (
        proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64),
        proptest::collection::vec(proptest::prelude::any::<u8>(), 0..2000),
        0usize..2500,
        0usize..2500,
    );

    let result = runner.run(&strategy, |(key, val, offset, size)| {
        let db = backend_fn.create();
        db.write(DbIndex::Main, &key, &val).unwrap();

        let start = offset.min(val.len());
        let end = (start + size).min(val.len());
        assert_eq!(
            db.read_slice(DbIndex::Main, &key, offset, Some(size)).unwrap(),
            Some(val[start..end].to_vec())
        );
        assert_eq!(
            db.read_slice(DbIndex::Main, &key, offset, None).unwrap(),
            Some(val[start..].to_vec())
        );

        db.close().unwrap();
        Ok(())
    });
    result.unwrap_or_else(|e| panic!("{e}"));
}

/// Writing then overwriting then aborting leaves the first value in place
fn overwrite_and_abort<F: BackendFn>(backend_fn: Arc<F>) {
    let config = proptest::test_runner::Config {
        cases: 32,
        source_file: Some(file!()),
        ..Default::default()
    };
    let mut runner = proptest::test_runner::TestRunner::new(config);

    let strategy = (
        proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64),
        proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512),
        proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512),
    );

    let result = runner.run(&strategy, |(key, val0, val1)| {
        let db = backend_fn.create();

        assert_eq!(db.read(DbIndex::Main, &key).unwrap(), None);
        db.write(DbIndex::Main, &key, &val0).unwrap();

        db.begin_transaction(None).unwrap();
        db.write(DbIndex::Main, &key, &val1).unwrap();
        db.abort_transaction().unwrap();
        assert_eq!(db.read(DbIndex::Main, &key).unwrap(), Some(val0.clone()));

        db.begin_transaction(None).unwrap();
        db.write(DbIndex::Main, &key, &val1).unwrap();
        db.commit_transaction().unwrap();
        assert_eq!(db.read(DbIndex::Main, &key).unwrap(), Some(val1.clone()));

        db.close().unwrap();
        Ok(())
    });
    result.unwrap_or_else(|e| panic!("{e}"));
}

tests![overwrite_and_abort, random_ops_match_oracle, slice_matches_substring];
