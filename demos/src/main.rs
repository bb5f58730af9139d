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

//! End-to-end walkthrough of the cache API.

use turnstile::{LruCache, LruCacheBuilder};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let cache: LruCache<String, String> = LruCacheBuilder::new(2).with_queue_depth(16).build();

    cache.put("alpha".to_string(), "a".to_string()).unwrap();
    cache.put("beta".to_string(), "b".to_string()).unwrap();

    // "alpha" is now the most recently used entry.
    let hit = cache.get(&"alpha".to_string()).unwrap();
    assert_eq!(hit.as_deref(), Some("a"));

    // Overflowing the capacity evicts the least recently used: "beta".
    cache.put("gamma".to_string(), "c".to_string()).unwrap();
    assert!(!cache.contains_key(&"beta".to_string()).unwrap());
    assert_eq!(cache.len(), 2);

    // After shutdown the controller is gone and calls fail fast.
    cache.shutdown().unwrap();
    assert!(cache.get(&"alpha".to_string()).is_err());
}
