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

//! Pending-mutation overlays
//!
//! A layer that defers writes keeps the deferred state as an overlay over
//! the layer below: the persistent backend stages an open transaction this
//! way, and the buffering cache layers hold their write buffers in the same
//! form. Reads resolve through the overlay first and fall through to the
//! layer below only where the overlay has nothing conclusive to say.

use std::collections::{BTreeMap, BTreeSet};

use crate::{index::PerIndex, Data, DbIndex, Result};

/// The set of values stored under one key, sorted and deduplicated
pub type ValueSet = BTreeSet<Data>;

/// Pending state of a single key at one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOverlay {
    /// All values erased; the layer below must not be consulted
    Erased,
    /// Values fully replacing whatever is stored below
    Written(ValueSet),
    /// Values merged into whatever is stored below (duplicate-keys maps)
    Appended(ValueSet),
}

impl KeyOverlay {
    /// Fold a newer overlay entry for the same key into this one
    pub fn merge(&mut self, newer: KeyOverlay) {
        match newer {
            KeyOverlay::Erased | KeyOverlay::Written(_) => *self = newer,
            KeyOverlay::Appended(vals) => match self {
                KeyOverlay::Erased => *self = KeyOverlay::Written(vals),
                KeyOverlay::Written(cur) | KeyOverlay::Appended(cur) => cur.extend(vals),
            },
        }
    }

    /// Approximate heap footprint, used for flush-threshold accounting
    pub fn byte_size(&self) -> usize {
        match self {
            KeyOverlay::Erased => 0,
            KeyOverlay::Written(vals) | KeyOverlay::Appended(vals) => {
                vals.iter().map(|v| v.len()).sum()
            }
        }
    }
}

/// Resolve the values visible for a key through an optional overlay entry,
/// fetching from the layer below only when needed.
pub fn resolve_entry(
    entry: Option<&KeyOverlay>,
    below: impl FnOnce() -> Result<ValueSet>,
) -> Result<ValueSet> {
    match entry {
        None => below(),
        Some(KeyOverlay::Erased) => Ok(ValueSet::new()),
        Some(KeyOverlay::Written(vals)) => Ok(vals.clone()),
        Some(KeyOverlay::Appended(vals)) => {
            let mut set = below()?;
            set.extend(vals.iter().cloned());
            Ok(set)
        }
    }
}

/// Apply one overlay entry to a full-map dump taken from the layer below.
pub fn apply_to_map(base: &mut BTreeMap<Data, ValueSet>, key: &Data, entry: &KeyOverlay) {
    match entry {
        KeyOverlay::Erased => {
            base.remove(key);
        }
        KeyOverlay::Written(vals) => {
            base.insert(key.clone(), vals.clone());
        }
        KeyOverlay::Appended(vals) => {
            base.entry(key.clone()).or_default().extend(vals.iter().cloned());
        }
    }
}

/// Pending mutations for the whole database, with a byte-size estimate
#[derive(Debug, Clone)]
pub struct DbOverlay {
    maps: PerIndex<BTreeMap<Data, KeyOverlay>>,
    bytes: usize,
}

impl DbOverlay {
    /// New empty overlay
    pub fn new() -> Self {
        Self { maps: PerIndex::new(|_| BTreeMap::new()), bytes: 0 }
    }

    /// Whether no mutations are pending
    pub fn is_empty(&self) -> bool {
        DbIndex::ALL.into_iter().all(|idx| self.maps[idx].is_empty())
    }

    /// Estimated byte footprint of the pending mutations
    pub fn byte_size(&self) -> usize {
        self.bytes
    }

    /// Pending entry for the key, if any
    pub fn get(&self, idx: DbIndex, key: &[u8]) -> Option<&KeyOverlay> {
        self.maps[idx].get(key)
    }

    /// Record a write. On duplicate-keys maps the value joins the pending
    /// set; elsewhere it replaces the key's value.
    pub fn write(&mut self, idx: DbIndex, key: &[u8], value: &[u8]) {
        self.bytes += key.len() + value.len();
        let map = &mut self.maps[idx];
        if idx.duplicate_keys_allowed() {
            match map.get_mut(key) {
                None => {
                    map.insert(key.to_vec(), KeyOverlay::Appended(ValueSet::from([value.to_vec()])));
                }
                Some(entry @ KeyOverlay::Erased) => {
                    *entry = KeyOverlay::Written(ValueSet::from([value.to_vec()]));
                }
                Some(KeyOverlay::Written(vals)) | Some(KeyOverlay::Appended(vals)) => {
                    vals.insert(value.to_vec());
                }
            }
        } else {
            map.insert(key.to_vec(), KeyOverlay::Written(ValueSet::from([value.to_vec()])));
        }
    }

    /// Record a full replacement of the key's value set. An empty set is a
    /// tombstone.
    pub fn set_values(&mut self, idx: DbIndex, key: &[u8], values: ValueSet) {
        self.bytes += key.len() + values.iter().map(|v| v.len()).sum::<usize>();
        let entry = if values.is_empty() { KeyOverlay::Erased } else { KeyOverlay::Written(values) };
        self.maps[idx].insert(key.to_vec(), entry);
    }

    /// Record erasure of every value under the key
    pub fn erase_all(&mut self, idx: DbIndex, key: &[u8]) {
        self.bytes += key.len();
        self.maps[idx].insert(key.to_vec(), KeyOverlay::Erased);
    }

    /// Fold a newer overlay (e.g. a committed nested transaction) into this
    /// one
    pub fn merge_from(&mut self, newer: DbOverlay) {
        let newer_bytes = newer.bytes;
        for (idx, key, entry) in newer.into_entries() {
            match self.maps[idx].get_mut(&key) {
                Some(cur) => cur.merge(entry),
                None => {
                    self.maps[idx].insert(key, entry);
                }
            }
        }
        self.bytes += newer_bytes;
    }

    /// Drop all pending mutations
    pub fn clear(&mut self) {
        for idx in DbIndex::ALL {
            self.maps[idx].clear();
        }
        self.bytes = 0;
    }

    /// Overlay a full-map dump of one key-value map
    pub fn apply_to_map(&self, idx: DbIndex, base: &mut BTreeMap<Data, ValueSet>) {
        for (key, entry) in &self.maps[idx] {
            apply_to_map(base, key, entry);
        }
    }

    /// Iterate over all pending entries
    pub fn entries(&self) -> impl Iterator<Item = (DbIndex, &Data, &KeyOverlay)> {
        DbIndex::ALL
            .into_iter()
            .flat_map(move |idx| self.maps[idx].iter().map(move |(k, e)| (idx, k, e)))
    }

    /// Consume the overlay, yielding all pending entries
    pub fn into_entries(self) -> impl Iterator<Item = (DbIndex, Data, KeyOverlay)> {
        DbIndex::ALL
            .into_iter()
            .zip(self.maps.into_inner())
            .flat_map(|(idx, map)| map.into_iter().map(move |(k, e)| (idx, k, e)))
    }
}

impl Default for DbOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DUP: DbIndex = DbIndex::Ntp1TokenNames;
    const UNI: DbIndex = DbIndex::Main;

    fn set<const N: usize>(values: [&[u8]; N]) -> ValueSet {
        values.iter().map(|v| v.to_vec()).collect()
    }

    #[test]
    fn unique_write_replaces() {
        let mut overlay = DbOverlay::new();
        overlay.write(UNI, b"k", b"v1");
        overlay.write(UNI, b"k", b"v2");
        assert_eq!(overlay.get(UNI, b"k"), Some(&KeyOverlay::Written(set([b"v2"]))));
    }

    #[test]
    fn duplicate_write_appends() {
        let mut overlay = DbOverlay::new();
        overlay.write(DUP, b"k", b"v1");
        overlay.write(DUP, b"k", b"v2");
        overlay.write(DUP, b"k", b"v2");
        assert_eq!(overlay.get(DUP, b"k"), Some(&KeyOverlay::Appended(set([b"v1", b"v2"]))));
    }

    #[test]
    fn write_after_erase_is_conclusive() {
        let mut overlay = DbOverlay::new();
        overlay.erase_all(DUP, b"k");
        overlay.write(DUP, b"k", b"v");
        assert_eq!(overlay.get(DUP, b"k"), Some(&KeyOverlay::Written(set([b"v"]))));
    }

    #[test]
    fn resolve_falls_through() {
        let below = || Ok(set([b"low"]));
        assert_eq!(resolve_entry(None, below), Ok(set([b"low"])));
        assert_eq!(resolve_entry(Some(&KeyOverlay::Erased), below), Ok(set([])));
        assert_eq!(
            resolve_entry(Some(&KeyOverlay::Written(set([b"w"]))), below),
            Ok(set([b"w"]))
        );
        assert_eq!(
            resolve_entry(Some(&KeyOverlay::Appended(set([b"a"]))), below),
            Ok(set([b"low", b"a"]))
        );
    }

    #[test]
    fn merge_nested_append_into_erased() {
        let mut parent = DbOverlay::new();
        parent.erase_all(DUP, b"k");

        let mut child = DbOverlay::new();
        child.write(DUP, b"k", b"v");

        parent.merge_from(child);
        assert_eq!(parent.get(DUP, b"k"), Some(&KeyOverlay::Written(set([b"v"]))));
    }

    #[test]
    fn merge_keeps_independent_keys() {
        let mut parent = DbOverlay::new();
        parent.write(UNI, b"a", b"1");

        let mut child = DbOverlay::new();
        child.write(UNI, b"b", b"2");

        parent.merge_from(child);
        assert_eq!(parent.get(UNI, b"a"), Some(&KeyOverlay::Written(set([b"1"]))));
        assert_eq!(parent.get(UNI, b"b"), Some(&KeyOverlay::Written(set([b"2"]))));
    }

    #[test]
    fn apply_to_map_dump() {
        let mut overlay = DbOverlay::new();
        overlay.write(DUP, b"a", b"new");
        overlay.erase_all(DUP, b"gone");
        overlay.set_values(DUP, b"b", set([b"only"]));

        let mut base = BTreeMap::new();
        base.insert(b"a".to_vec(), set([b"old"]));
        base.insert(b"gone".to_vec(), set([b"x"]));
        base.insert(b"b".to_vec(), set([b"p", b"q"]));

        overlay.apply_to_map(DUP, &mut base);
        assert_eq!(base.get(b"a".as_slice()), Some(&set([b"old", b"new"])));
        assert_eq!(base.get(b"gone".as_slice()), None);
        assert_eq!(base.get(b"b".as_slice()), Some(&set([b"only"])));
    }

    #[test]
    fn byte_size_tracks_mutations() {
        let mut overlay = DbOverlay::new();
        assert_eq!(overlay.byte_size(), 0);
        overlay.write(UNI, b"key", b"value");
        assert_eq!(overlay.byte_size(), 8);
        overlay.erase_all(UNI, b"key");
        assert_eq!(overlay.byte_size(), 11);
        overlay.clear();
        assert_eq!(overlay.byte_size(), 0);
    }
}
