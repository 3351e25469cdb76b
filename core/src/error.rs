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

//! Storage errors

/// Database error
///
/// Cache layers never swallow or translate errors of the layer below; an
/// error produced anywhere in a stack surfaces to the caller unchanged.
#[derive(Debug, Ord, PartialOrd, PartialEq, Eq, Clone, thiserror::Error)]
pub enum Error {
    /// A lookup that promised presence found nothing. Plain reads report
    /// absence as a successful `None`/`false` instead.
    #[error("Entry not found")]
    NotFound,

    /// The operation was given arguments no backend accepts, e.g. an empty
    /// key or a value too large for a duplicate-keys map.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The persistent backend exhausted its map growth budget.
    #[error("Out of storage space")]
    OutOfSpace,

    /// Underlying OS read/write/sync failure.
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Structural inconsistency detected while reading.
    #[error("Database has been corrupted")]
    Corrupted,

    /// Transaction begun while one is active, or committed/aborted without
    /// one.
    #[error("Invalid transaction state: {0}")]
    TransactionState(&'static str),

    /// The database directory is locked by another process.
    #[error("Database is locked by another process")]
    Conflict,
}
