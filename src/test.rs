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

use super::*;

#[test]
fn persistent_roundtrip_through_helpers() {
    let dir = tempfile::TempDir::new().unwrap();

    let db = open_persistent(dir.path(), true).unwrap();
    db.write(DbIndex::Main, b"key1", b"val1").unwrap();
    db.write(DbIndex::BlockIndex, b"hash", b"header").unwrap();
    Box::new(db).close().unwrap();

    // Reopening without clearing preserves the data
    let db = open_persistent(dir.path(), false).unwrap();
    assert_eq!(db.read(DbIndex::Main, b"key1").unwrap(), Some(b"val1".to_vec()));
    assert_eq!(db.read(DbIndex::BlockIndex, b"hash").unwrap(), Some(b"header".to_vec()));
    Box::new(db).close().unwrap();

    // Reopening with clearing starts fresh
    let db = open_persistent(dir.path(), true).unwrap();
    assert!(!db.exists(DbIndex::Main, b"key1").unwrap());
    Box::new(db).close().unwrap();
}

#[test]
fn write_cached_stack_flushes_on_close() {
    let dir = tempfile::TempDir::new().unwrap();

    let db = open_write_cached(dir.path(), true, 0).unwrap();
    db.write(DbIndex::Tx, b"txid", b"raw tx").unwrap();
    Box::new(db).close().unwrap();

    let db = open_persistent(dir.path(), false).unwrap();
    assert_eq!(db.read(DbIndex::Tx, b"txid").unwrap(), Some(b"raw tx".to_vec()));
    Box::new(db).close().unwrap();
}

#[test]
fn lru_over_read_cache_composition() {
    let dir = tempfile::TempDir::new().unwrap();

    let db = LruCache::new(
        ReadCache::new(open_persistent(dir.path(), true).unwrap(), 0),
        16,
    );
    for i in 0..100u32 {
        db.write(DbIndex::Blocks, &i.to_be_bytes(), &vec![i as u8; 100]).unwrap();
    }
    db.flush(None).unwrap();
    for i in 0..100u32 {
        assert_eq!(
            db.read(DbIndex::Blocks, &i.to_be_bytes()).unwrap(),
            Some(vec![i as u8; 100])
        );
    }
    Box::new(db).close().unwrap();
}
