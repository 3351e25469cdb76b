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

//! The fixed set of key-value maps the database consists of

/// Identifier of one key-value map of the database.
///
/// The set of maps is fixed: every backend creates all of them at open time
/// and all layers of a stack agree on the [duplicate-keys
/// flag](Self::duplicate_keys_allowed) of each map.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub enum DbIndex {
    /// Miscellaneous node bookkeeping
    Main,
    /// Block index entries by block hash
    BlockIndex,
    /// Raw block data by block hash
    Blocks,
    /// Transactions by txid
    Tx,
    /// Token transactions by txid
    Ntp1Tx,
    /// Token symbol to issuance transactions (a symbol may map to several)
    Ntp1TokenNames,
    /// Address to public keys seen for it (an address may map to several)
    AddrsVsPubKeys,
}

impl DbIndex {
    /// Number of key-value maps in the database
    pub const COUNT: usize = 7;

    /// All map identifiers, in storage order
    pub const ALL: [DbIndex; Self::COUNT] = [
        DbIndex::Main,
        DbIndex::BlockIndex,
        DbIndex::Blocks,
        DbIndex::Tx,
        DbIndex::Ntp1Tx,
        DbIndex::Ntp1TokenNames,
        DbIndex::AddrsVsPubKeys,
    ];

    /// Name of the map, used as the sub-database name by persistent backends
    pub const fn name(self) -> &'static str {
        match self {
            DbIndex::Main => "main",
            DbIndex::BlockIndex => "blockindex",
            DbIndex::Blocks => "blocks",
            DbIndex::Tx => "tx",
            DbIndex::Ntp1Tx => "ntp1tx",
            DbIndex::Ntp1TokenNames => "ntp1tokennames",
            DbIndex::AddrsVsPubKeys => "addrsvspubkeys",
        }
    }

    /// Whether a key of this map holds a set of values rather than a single one
    pub const fn duplicate_keys_allowed(self) -> bool {
        matches!(self, DbIndex::Ntp1TokenNames | DbIndex::AddrsVsPubKeys)
    }

    /// Get the map position as usize
    pub const fn get(self) -> usize {
        self as usize
    }
}

/// A value of type `T` held for each key-value map of the database
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct PerIndex<T>([T; DbIndex::COUNT]);

impl<T> PerIndex<T> {
    /// New collection with each element produced by the given function
    pub fn new(f: impl FnMut(DbIndex) -> T) -> Self {
        Self(DbIndex::ALL.map(f))
    }

    /// Like [Self::new] but for fallible element constructors
    pub fn try_new<E>(
        mut f: impl FnMut(DbIndex) -> std::result::Result<T, E>,
    ) -> std::result::Result<Self, E> {
        let mut items = Vec::with_capacity(DbIndex::COUNT);
        for idx in DbIndex::ALL {
            items.push(f(idx)?);
        }
        Ok(Self(items.try_into().unwrap_or_else(|_| unreachable!())))
    }

    /// Iterate over all elements together with their map identifiers
    pub fn iter(&self) -> impl Iterator<Item = (DbIndex, &T)> {
        DbIndex::ALL.into_iter().zip(self.0.iter())
    }

    /// Take the inner per-map array
    pub fn into_inner(self) -> [T; DbIndex::COUNT] {
        self.0
    }
}

impl<T: Default> Default for PerIndex<T> {
    fn default() -> Self {
        Self::new(|_| T::default())
    }
}

impl<T> std::ops::Index<DbIndex> for PerIndex<T> {
    type Output = T;
    fn index(&self, idx: DbIndex) -> &T {
        &self.0[idx.get()]
    }
}

impl<T> std::ops::IndexMut<DbIndex> for PerIndex<T> {
    fn index_mut(&mut self, idx: DbIndex) -> &mut T {
        &mut self.0[idx.get()]
    }
}
