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

//! Conformance test suite for storage backends and cache stacks
//!
//! Every backend, and every cache composition over a backend, must pass the
//! same list of tests; a test binary provides a factory producing fresh
//! instances and hands it to [main]. The in-memory backend doubles as the
//! oracle the randomized tests compare against.

#![allow(clippy::unwrap_used)]

// Support modules
#[macro_use]
pub mod prelude;
pub mod big_flush;
pub mod model;

// Test modules
mod basic;
mod multi;
mod property;
mod transactional;

use prelude::*;

/// Get all tests
fn tests<F: BackendFn>(backend_fn: F) -> Vec<libtest_mimic::Trial> {
    let backend_fn = Arc::new(backend_fn);
    std::iter::empty()
        .chain(basic::tests(Arc::clone(&backend_fn)))
        .chain(transactional::tests(Arc::clone(&backend_fn)))
        .chain(multi::tests(Arc::clone(&backend_fn)))
        .chain(property::tests(backend_fn))
        .collect()
}

/// Main test suite entry point
pub fn main<F: BackendFn>(backend_fn: F) -> libtest_mimic::Conclusion {
    let args = libtest_mimic::Arguments::from_args();
    libtest_mimic::run(&args, tests(backend_fn))
}

/// The full test list tagged with a kind, letting one binary run the suite
/// over several stack compositions
pub fn tests_with_kind<F: BackendFn>(
    kind: &'static str,
    backend_fn: F,
) -> Vec<libtest_mimic::Trial> {
    tests(backend_fn).into_iter().map(|trial| trial.with_kind(kind)).collect()
}

/// Run a pre-assembled list of trials
pub fn run(trials: Vec<libtest_mimic::Trial>) -> libtest_mimic::Conclusion {
    let args = libtest_mimic::Arguments::from_args();
    libtest_mimic::run(&args, trials)
}
