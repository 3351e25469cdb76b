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

//! Translation of lmdb errors into the storage error taxonomy

use txdb_core::Error;

/// Map an lmdb error to the corresponding storage error
pub fn from_lmdb(err: lmdb::Error) -> Error {
    match err {
        lmdb::Error::NotFound => Error::NotFound,
        lmdb::Error::MapFull => Error::OutOfSpace,
        lmdb::Error::BadValSize => Error::InvalidArgument("key or value size rejected by lmdb"),
        lmdb::Error::Corrupted | lmdb::Error::PageNotFound => Error::Corrupted,
        lmdb::Error::Other(code) => Error::Io(format!("lmdb error code {code}")),
        other => Error::Io(other.to_string()),
    }
}

/// Like [from_lmdb], but treating `NotFound` as success (idempotent deletes)
pub fn process_with_unit(err: lmdb::Error) -> txdb_core::Result<()> {
    match err {
        lmdb::Error::NotFound => Ok(()),
        other => Err(from_lmdb(other)),
    }
}

/// Map an OS-level error encountered while setting up database files
pub fn process_io_error(err: std::io::Error) -> Error {
    Error::Io(err.to_string())
}
