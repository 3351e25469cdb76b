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

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rstest::rstest;

use super::*;

fn make_seedable_rng(seed: u64) -> ChaChaRng {
    ChaChaRng::seed_from_u64(seed)
}

fn entropy() -> u64 {
    rand::random()
}

#[must_use]
fn random_data_with_target_byte_size(
    rng: &mut impl Rng,
    required_size: usize,
    key_max_size: usize,
    val_max_size: usize,
) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut result = BTreeMap::new();
    let mut total_size = 0;

    while total_size < required_size {
        let key_size = 1 + rng.gen::<usize>() % key_max_size;
        let key = (0..key_size).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
        let val_size = 1 + rng.gen::<usize>() % val_max_size;
        let val = (0..val_size).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
        result.insert(key, val);

        total_size += key_size;
        total_size += val_size;
    }

    result
}

#[rstest]
#[trace]
#[case(entropy())]
fn auto_map_resize_between_writes(#[case] seed: u64) {
    let mut rng = make_seedable_rng(seed);

    let initial_map_size = 1 << 16;
    let data_dir = tempfile::TempDir::new().unwrap();
    let db = Lmdb::new(data_dir.path())
        .with_map_size(MemSize::from_bytes(initial_map_size))
        .open()
        .unwrap();

    // Generate random values with a target size well past the initial map
    let data = random_data_with_target_byte_size(
        &mut rng,
        (initial_map_size * 5) as usize,
        500,
        10000,
    );

    for (key, val) in &data {
        db.write(DbIndex::Main, key, val).unwrap();
    }

    assert!(db.current_map_size() > initial_map_size as usize);

    for (key, val) in &data {
        assert_eq!(db.read(DbIndex::Main, key).unwrap().as_deref(), Some(val.as_slice()));
    }
}

#[rstest]
#[trace]
#[case(entropy())]
fn auto_map_resize_within_one_transaction(#[case] seed: u64) {
    let mut rng = make_seedable_rng(seed);

    let initial_map_size = 1 << 16;
    let data_dir = tempfile::TempDir::new().unwrap();
    let db = Lmdb::new(data_dir.path())
        .with_map_size(MemSize::from_bytes(initial_map_size))
        .open()
        .unwrap();

    let data = random_data_with_target_byte_size(
        &mut rng,
        (initial_map_size * 5) as usize,
        500,
        10000,
    );

    // No size hint given, so the commit itself has to grow the map
    db.begin_transaction(None).unwrap();
    for (key, val) in &data {
        db.write(DbIndex::Main, key, val).unwrap();
    }
    db.commit_transaction().unwrap();

    assert!(db.current_map_size() > initial_map_size as usize);

    for (key, val) in &data {
        assert_eq!(db.read(DbIndex::Main, key).unwrap().as_deref(), Some(val.as_slice()));
    }
}

#[test]
fn transaction_size_hint_pregrows_map() {
    let data_dir = tempfile::TempDir::new().unwrap();
    let db = Lmdb::new(data_dir.path())
        .with_map_size(MemSize::from_kilobytes(64))
        .open()
        .unwrap();

    let hint = 1 << 22;
    db.begin_transaction(Some(hint)).unwrap();
    assert!(db.current_map_size() >= 2 * hint);
    db.abort_transaction().unwrap();
}

#[test]
fn reopen_observes_committed_state() {
    let data_dir = tempfile::TempDir::new().unwrap();

    let db = Lmdb::new(data_dir.path()).open().unwrap();
    db.write(DbIndex::Main, b"persistent", b"value").unwrap();
    Box::new(db).close().unwrap();

    let db = Lmdb::new(data_dir.path()).open().unwrap();
    assert_eq!(db.read(DbIndex::Main, b"persistent").unwrap(), Some(b"value".to_vec()));
    Box::new(db).close().unwrap();
}

#[test]
fn clear_db_wipes_prior_state() {
    let data_dir = tempfile::TempDir::new().unwrap();

    let db = Lmdb::new(data_dir.path()).open().unwrap();
    db.write(DbIndex::Main, b"stale", b"value").unwrap();
    Box::new(db).close().unwrap();

    let db = Lmdb::new(data_dir.path()).with_clear_db().open().unwrap();
    assert_eq!(db.read(DbIndex::Main, b"stale").unwrap(), None);
    Box::new(db).close().unwrap();
}

#[test]
fn second_open_conflicts() {
    let data_dir = tempfile::TempDir::new().unwrap();

    let db = Lmdb::new(data_dir.path()).open().unwrap();
    let second = Lmdb::new(data_dir.path()).open();
    assert!(matches!(second, Err(Error::Conflict)));

    Box::new(db).close().unwrap();
    let reopened = Lmdb::new(data_dir.path()).open().unwrap();
    Box::new(reopened).close().unwrap();
}

#[test]
fn concurrent_readers_during_writes() {
    let data_dir = tempfile::TempDir::new().unwrap();
    let db = std::sync::Arc::new(
        Lmdb::new(data_dir.path())
            .with_map_size(MemSize::from_kilobytes(64))
            .open()
            .unwrap(),
    );

    db.write(DbIndex::Main, b"shared", b"initial").unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let db = std::sync::Arc::clone(&db);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let val = db.read(DbIndex::Main, b"shared").unwrap();
                    assert!(val.is_some());
                }
            })
        })
        .collect();

    // Writes big enough to force map growth while readers are running
    for i in 0..50u32 {
        let key = i.to_le_bytes();
        db.write(DbIndex::Blocks, &key, &vec![0xab; 10000]).unwrap();
        db.write(DbIndex::Main, b"shared", &vec![0xcd; 1000]).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}
