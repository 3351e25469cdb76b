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

//! Core definitions of the key-value storage subsystem
//!
//! # High-level overview
//!
//! The database is a fixed collection of key-value maps:
//!
//! ```notest
//! Map<DbIndex, Map<Key, Values>>
//! ```
//!
//! [DbIndex] identifies a particular key-value map. Keys and values are raw
//! byte sequences ([Data]). Maps come in two kinds: on most of them a key
//! holds a single value and writing replaces it, while on the
//! duplicate-keys maps ([DbIndex::duplicate_keys_allowed]) a key holds a set
//! of values and writing appends.
//!
//! Every backend, and every cache layer stacked on top of a backend,
//! implements the [Database] trait with identical semantics, so layers can
//! be composed freely and substituted for one another.

pub mod database;
pub mod error;
pub mod index;
pub mod overlay;
pub mod util;

// Re-export some commonly used items
pub use database::Database;
pub use error::Error;
pub use index::{DbIndex, PerIndex};

/// Raw byte sequences, used to represent store keys and values
pub type Data = Vec<u8>;

/// A `Result` type specialized for storage
pub type Result<T> = std::result::Result<T, Error>;

/// Longest key accepted by any backend, in bytes
pub const MAX_KEY_SIZE: usize = 511;

/// Longest value accepted on duplicate-keys maps, in bytes
pub const MAX_DUP_VALUE_SIZE: usize = 508;
