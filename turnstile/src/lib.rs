// Copyright 2026 turnstile Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A bounded LRU cache that serializes every mutation through a single
//! controller thread, like passage through a turnstile.
//!
//! There is no lock around the cache state. Callers package each operation as
//! a request, push it onto a bounded queue, and block until the controller
//! thread has applied it and replied. The controller owns the recency index
//! outright, so at most one thread ever mutates it, and eviction happens
//! synchronously inside the insert that overflows the capacity.
//!
//! ```
//! use turnstile::LruCache;
//!
//! let cache: LruCache<String, u32> = LruCache::new(2);
//!
//! cache.put("alpha".to_string(), 1).unwrap();
//! cache.put("beta".to_string(), 2).unwrap();
//!
//! // Reading "alpha" promotes it, so inserting over capacity evicts "beta".
//! assert_eq!(cache.get(&"alpha".to_string()).unwrap(), Some(1));
//! cache.put("gamma".to_string(), 3).unwrap();
//! assert_eq!(cache.get(&"beta".to_string()).unwrap(), None);
//!
//! // Shutdown stops the controller; later calls fail fast instead of hanging.
//! cache.shutdown().unwrap();
//! assert!(cache.get(&"alpha".to_string()).is_err());
//! ```

mod cache;
mod code;
mod error;
mod index;
mod worker;

pub mod prelude;
pub use prelude::*;
