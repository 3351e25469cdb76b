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

//! The conformance suite over every cache stack composition.
//!
//! Each composition must be indistinguishable from a bare backend, so the
//! whole suite runs once per stack. The write-buffering compositions
//! additionally run the big-flush oracle scenario; the full-size variant of
//! it is expensive and only runs with `--ignored`.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use txdb_backend_test_suite::big_flush;
use txdb_cache::{LruCache, ReadCache, WriteCache};
use txdb_core::Database;
use txdb_lmdb::Lmdb;

const TARGET_TMPDIR: &str = env!("CARGO_TARGET_TMPDIR");

/// Hands out a fresh database directory per stack instance
struct DirMaker {
    root: PathBuf,
    counter: AtomicU32,
}

impl DirMaker {
    fn new(root: PathBuf) -> Arc<Self> {
        Arc::new(Self { root, counter: AtomicU32::new(0) })
    }

    fn next(&self) -> PathBuf {
        let seq_no = self.counter.fetch_add(1, Ordering::AcqRel);
        self.root.join(format!("case_{seq_no:08x}"))
    }

    fn lmdb(&self) -> txdb_lmdb::LmdbDb {
        Lmdb::new(self.next()).with_clear_db().open().expect("db open to succeed")
    }
}

fn small_cache_budget() -> usize {
    rand::random::<usize>() % 5000
}

fn small_entry_budget() -> usize {
    rand::random::<usize>() % 100
}

fn main() {
    let test_root = {
        let mut dir = PathBuf::from(TARGET_TMPDIR);
        dir.push("cache_stack_tests");
        dir.push(format!("run_{:08x}", rand::random::<u32>()));
        fs::create_dir_all(dir.as_path()).expect("test run dir creation to succeed");
        dir
    };
    let dirs = DirMaker::new(test_root.clone());

    let mut trials = Vec::new();

    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "WriteCache<Lmdb>",
            move || -> Box<dyn Database> {
                Box::new(WriteCache::new(dirs.lmdb(), small_cache_budget()))
            },
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "WriteCache<Lmdb>/noflush",
            move || -> Box<dyn Database> { Box::new(WriteCache::new(dirs.lmdb(), 0)) },
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "ReadCache<Lmdb>",
            move || -> Box<dyn Database> { Box::new(ReadCache::new(dirs.lmdb(), 0)) },
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "LruCache<Lmdb>/unbounded",
            move || -> Box<dyn Database> { Box::new(LruCache::new(dirs.lmdb(), 0)) },
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "LruCache<ReadCache<Lmdb>>/unbounded",
            move || -> Box<dyn Database> {
                Box::new(LruCache::new(ReadCache::new(dirs.lmdb(), 0), 0))
            },
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "LruCache<Lmdb>/bounded",
            move || -> Box<dyn Database> {
                Box::new(LruCache::new(dirs.lmdb(), small_entry_budget()))
            },
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.extend(txdb_backend_test_suite::tests_with_kind(
            "LruCache<ReadCache<Lmdb>>/bounded",
            move || -> Box<dyn Database> {
                Box::new(LruCache::new(ReadCache::new(dirs.lmdb(), 0), small_entry_budget()))
            },
        ));
    }

    // The big-flush oracle scenario for the compositions that buffer until
    // an explicit flush
    let moderate = 1 << 24;
    {
        let dirs = Arc::clone(&dirs);
        trials.push(big_flush::trial(
            "big_flush::write_cache",
            Arc::new(move || -> Box<dyn Database> { Box::new(WriteCache::new(dirs.lmdb(), 0)) }),
            moderate,
            false,
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        // Write-through means one fsync'd lower-layer transaction per write,
        // so this composition gets a smaller data volume
        trials.push(big_flush::trial(
            "big_flush::read_cache",
            Arc::new(move || -> Box<dyn Database> { Box::new(ReadCache::new(dirs.lmdb(), 0)) }),
            1 << 22,
            false,
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.push(big_flush::trial(
            "big_flush::lru_cache",
            Arc::new(move || -> Box<dyn Database> { Box::new(LruCache::new(dirs.lmdb(), 0)) }),
            moderate,
            false,
        ));
    }
    {
        let dirs = Arc::clone(&dirs);
        trials.push(big_flush::trial(
            "big_flush::lru_over_read_cache",
            Arc::new(move || -> Box<dyn Database> {
                Box::new(LruCache::new(ReadCache::new(dirs.lmdb(), 0), 0))
            }),
            moderate,
            false,
        ));
    }
    {
        // The full-size scenario; takes gigabytes of RAM and a while to run
        let dirs = Arc::clone(&dirs);
        trials.push(big_flush::trial(
            "big_flush::write_cache_full_size",
            Arc::new(move || -> Box<dyn Database> { Box::new(WriteCache::new(dirs.lmdb(), 0)) }),
            1 << 30,
            true,
        ));
    }

    let result = txdb_backend_test_suite::run(trials);

    if !result.has_failed() {
        let _ = fs::remove_dir_all(test_root);
    }

    result.exit()
}
