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

//! Helpers shared by backend implementations

use std::collections::BTreeMap;

use crate::overlay::ValueSet;
use crate::{Data, DbIndex, Error, Result, MAX_DUP_VALUE_SIZE, MAX_KEY_SIZE};

/// Extract the `offset`/`size` byte range of a stored value.
///
/// `offset` is clamped to the value length, so an out-of-range offset yields
/// an empty slice. `size` of `None` means "up to the end".
pub fn slice_value(value: &[u8], offset: usize, size: Option<usize>) -> &[u8] {
    let start = offset.min(value.len());
    let end = match size {
        Some(size) => start.saturating_add(size).min(value.len()),
        None => value.len(),
    };
    &value[start..end]
}

/// Validate a key against the backend key constraints.
pub fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("empty key"));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::InvalidArgument("key too long"));
    }
    Ok(())
}

/// Validate a value against the constraints of the given map.
pub fn check_value(idx: DbIndex, value: &[u8]) -> Result<()> {
    if idx.duplicate_keys_allowed() && value.len() > MAX_DUP_VALUE_SIZE {
        return Err(Error::InvalidArgument("value too long for a duplicate-keys map"));
    }
    Ok(())
}

/// Convert an internal value-set map into the interface representation.
pub fn to_vec_map(map: BTreeMap<Data, ValueSet>) -> BTreeMap<Data, Vec<Data>> {
    map.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect()
}

/// Convert an interface map dump into the internal value-set representation.
pub fn to_set_map(map: BTreeMap<Data, Vec<Data>>) -> BTreeMap<Data, ValueSet> {
    map.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slice_clamps() {
        let val = b"abcdefghij";
        assert_eq!(slice_value(val, 0, None), b"abcdefghij");
        assert_eq!(slice_value(val, 2, Some(3)), b"cde");
        assert_eq!(slice_value(val, 9, Some(5)), b"j");
        assert_eq!(slice_value(val, 20, Some(5)), b"");
        assert_eq!(slice_value(val, 10, None), b"");
        assert_eq!(slice_value(val, 0, Some(0)), b"");
        assert_eq!(slice_value(val, 3, Some(usize::MAX)), b"defghij");
    }

    #[test]
    fn key_limits() {
        assert_eq!(check_key(b""), Err(Error::InvalidArgument("empty key")));
        assert_eq!(check_key(&[0u8; MAX_KEY_SIZE]), Ok(()));
        assert_eq!(check_key(&[0u8; MAX_KEY_SIZE + 1]), Err(Error::InvalidArgument("key too long")));
    }

    #[test]
    fn value_limits() {
        assert_eq!(check_value(DbIndex::Main, &vec![0u8; 1 << 20]), Ok(()));
        assert_eq!(check_value(DbIndex::Ntp1TokenNames, &[0u8; MAX_DUP_VALUE_SIZE]), Ok(()));
        assert_eq!(
            check_value(DbIndex::Ntp1TokenNames, &[0u8; MAX_DUP_VALUE_SIZE + 1]),
            Err(Error::InvalidArgument("value too long for a duplicate-keys map"))
        );
    }
}
