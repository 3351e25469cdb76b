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

// Re-export a bunch of often used items
pub use std::collections::BTreeMap;
pub use std::sync::Arc;

pub use rand::{Rng, SeedableRng};
pub use rand_chacha::ChaChaRng;

pub use txdb_core::{Data, Database, DbIndex, Error, MAX_DUP_VALUE_SIZE, MAX_KEY_SIZE};
pub use txdb_inmemory::InMemoryDb;

/// A factory producing a fresh backend or cache stack for each test case
pub trait BackendFn: 'static + Send + Sync {
    fn create(&self) -> Box<dyn Database>;
}

impl<F: 'static + Fn() -> Box<dyn Database> + Send + Sync> BackendFn for F {
    fn create(&self) -> Box<dyn Database> {
        self()
    }
}

/// Make a seedable RNG, logging the seed so failures can be replayed
pub fn make_seedable_rng(test_name: &str) -> ChaChaRng {
    let seed: u64 = rand::random();
    eprintln!("{test_name}: using seed {seed}");
    ChaChaRng::seed_from_u64(seed)
}

/// Random byte string of exactly `len` bytes
pub fn random_bytes(rng: &mut impl Rng, len: usize) -> Data {
    (0..len).map(|_| rng.gen()).collect()
}

/// Random key of 1 to `max_len` bytes
pub fn random_key(rng: &mut impl Rng, max_len: usize) -> Data {
    let len = rng.gen_range(1..=max_len);
    random_bytes(rng, len)
}

/// Random value respecting the size cap of the given map
pub fn random_value_for(rng: &mut impl Rng, idx: DbIndex, max_len: usize) -> Data {
    let cap = if idx.duplicate_keys_allowed() {
        max_len.min(MAX_DUP_VALUE_SIZE)
    } else {
        max_len
    };
    let len = rng.gen_range(1..=cap);
    random_bytes(rng, len)
}

/// Test helper functions not exported with the prelude
pub mod support {
    use super::*;
    use libtest_mimic::Trial;

    /// Create the test list
    pub fn create_tests<F: BackendFn>(
        backend_fn: Arc<F>,
        tests: impl IntoIterator<Item = (&'static str, fn(Arc<F>))>,
    ) -> impl Iterator<Item = Trial> {
        tests.into_iter().map(move |(name, test)| {
            let backend_fn = Arc::clone(&backend_fn);
            Trial::test(name, move || {
                test(backend_fn);
                Ok(())
            })
        })
    }
}

macro_rules! tests {
    ($($name:ident),* $(,)?) => {
        pub fn tests<F: $crate::prelude::BackendFn>(
            backend_fn: Arc<F>,
        ) -> impl std::iter::Iterator<Item = libtest_mimic::Trial> {
            $crate::prelude::support::create_tests(backend_fn, [
                $((concat!(module_path!(), "::", stringify!($name)), $name as fn(Arc<F>)),)*
            ])
        }
    }
}
