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
fn aborted_write_leaves_no_trace() {
    let store = InMemoryDb::new();

    store.begin_transaction(None).unwrap();
    store.write(DbIndex::Main, b"hello", b"world").unwrap();
    assert_eq!(store.read(DbIndex::Main, b"hello").unwrap(), Some(b"world".to_vec()));
    store.abort_transaction().unwrap();

    assert_eq!(store.read(DbIndex::Main, b"hello").unwrap(), None);
    assert!(!store.exists(DbIndex::Main, b"hello").unwrap());
}

#[test]
fn committed_write_survives() {
    let store = InMemoryDb::new();

    store.write(DbIndex::Main, b"pre", b"existing").unwrap();

    store.begin_transaction(None).unwrap();
    store.write(DbIndex::Main, b"hello", b"world").unwrap();
    store.commit_transaction().unwrap();

    assert_eq!(store.read(DbIndex::Main, b"hello").unwrap(), Some(b"world".to_vec()));
    assert_eq!(store.read(DbIndex::Main, b"pre").unwrap(), Some(b"existing".to_vec()));
}

#[test]
fn duplicate_values_are_sorted_and_deduplicated() {
    let store = InMemoryDb::new();
    let idx = DbIndex::Ntp1TokenNames;

    store.write(idx, b"k", b"b").unwrap();
    store.write(idx, b"k", b"a").unwrap();
    store.write(idx, b"k", b"b").unwrap();

    assert_eq!(store.read_multiple(idx, b"k").unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(store.read(idx, b"k").unwrap(), Some(b"a".to_vec()));
}

#[test]
fn erase_removes_one_duplicate_value() {
    let store = InMemoryDb::new();
    let idx = DbIndex::AddrsVsPubKeys;

    store.write(idx, b"k", b"a").unwrap();
    store.write(idx, b"k", b"b").unwrap();

    store.erase(idx, b"k").unwrap();
    assert_eq!(store.read_multiple(idx, b"k").unwrap(), vec![b"b".to_vec()]);

    store.erase(idx, b"k").unwrap();
    assert!(!store.exists(idx, b"k").unwrap());

    // Absent key erase is fine
    store.erase(idx, b"k").unwrap();
}

#[test]
fn transaction_state_errors() {
    let store = InMemoryDb::new();

    assert_eq!(
        store.commit_transaction(),
        Err(Error::TransactionState("no transaction to commit"))
    );
    assert_eq!(
        store.abort_transaction(),
        Err(Error::TransactionState("no transaction to abort"))
    );

    store.begin_transaction(None).unwrap();
    assert_eq!(
        store.begin_transaction(None),
        Err(Error::TransactionState("transaction already active"))
    );
    store.abort_transaction().unwrap();
}
