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

//! Oracle comparison against the in-memory reference backend

use crate::prelude::*;

/// A modifying action applicable to any backend
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum WriteAction {
    /// Store a value
    Write(DbIndex, Data, Data),
    /// Remove one value of a key
    Erase(DbIndex, Data),
    /// Remove every value of a key
    EraseAll(DbIndex, Data),
}

impl WriteAction {
    /// The map the action applies to
    pub fn index(&self) -> DbIndex {
        match self {
            WriteAction::Write(idx, _, _)
            | WriteAction::Erase(idx, _)
            | WriteAction::EraseAll(idx, _) => *idx,
        }
    }

    /// Apply the action to a backend
    pub fn apply(&self, db: &dyn Database) {
        match self {
            WriteAction::Write(idx, key, val) => {
                db.write(*idx, key, val).expect("write to succeed")
            }
            WriteAction::Erase(idx, key) => db.erase(*idx, key).expect("erase to succeed"),
            WriteAction::EraseAll(idx, key) => {
                db.erase_all(*idx, key).expect("erase_all to succeed")
            }
        }
    }
}

/// Assert two backends hold bytewise identical contents on every map
pub fn assert_equal_contents(a: &dyn Database, b: &dyn Database) {
    for idx in DbIndex::ALL {
        assert_eq!(
            a.read_all(idx).unwrap(),
            b.read_all(idx).unwrap(),
            "full contents differ on {idx:?}",
        );
        assert_eq!(
            a.read_all_unique(idx).unwrap(),
            b.read_all_unique(idx).unwrap(),
            "unique contents differ on {idx:?}",
        );
    }
}

/// Assert the unique dump of a map picks a stored value for every key
pub fn assert_unique_consistent(db: &dyn Database, idx: DbIndex) {
    let all = db.read_all(idx).unwrap();
    let unique = db.read_all_unique(idx).unwrap();
    assert_eq!(all.len(), unique.len(), "key sets differ on {idx:?}");
    for (key, value) in &unique {
        let stored = &all[key];
        assert!(
            stored.contains(value),
            "unique value for key {key:?} on {idx:?} is not one of the stored values",
        );
        let multiple = db.read_multiple(idx, key).unwrap();
        assert_eq!(&multiple, stored, "read_multiple disagrees with read_all on {idx:?}");
    }
}
