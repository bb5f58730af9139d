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

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use parking_lot::Mutex;

use crate::{
    code::{DefaultHashBuilder, HashBuilder, Key, Value},
    error::{Error, Result},
    index::EntryIndex,
    worker::{reply, Request, Worker},
};

/// Builder for [`LruCache`].
pub struct LruCacheBuilder<S = DefaultHashBuilder> {
    capacity: usize,
    queue_depth: usize,
    hash_builder: S,
}

impl LruCacheBuilder {
    /// Creates a builder for a cache bounded to `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be a positive integer");
        Self {
            capacity,
            queue_depth: capacity,
            hash_builder: DefaultHashBuilder::default(),
        }
    }
}

impl<S> LruCacheBuilder<S>
where
    S: HashBuilder,
{
    /// Caps how many requests may wait in the controller queue.
    ///
    /// Defaults to the cache capacity. Submitters block for queue room once
    /// it is full, which bounds the memory pinned by in-flight requests.
    ///
    /// # Panics
    ///
    /// Panics if `queue_depth` is zero.
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        assert!(queue_depth > 0, "queue depth must be a positive integer");
        self.queue_depth = queue_depth;
        self
    }

    /// Replaces the hash builder.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> LruCacheBuilder<OS>
    where
        OS: HashBuilder,
    {
        LruCacheBuilder {
            capacity: self.capacity,
            queue_depth: self.queue_depth,
            hash_builder,
        }
    }

    /// Spawns the controller thread and returns the cache handle.
    pub fn build<K, V>(self) -> LruCache<K, V>
    where
        K: Key,
        V: Value,
    {
        let len = Arc::new(AtomicUsize::new(0));
        let index = EntryIndex::new(self.capacity, self.hash_builder);
        let (request_tx, shutdown_tx, worker) = Worker::spawn(index, self.queue_depth, len.clone());
        LruCache {
            inner: Arc::new(Inner {
                capacity: self.capacity,
                len,
                controller: Mutex::new(Some(Controller {
                    request_tx,
                    shutdown_tx,
                    worker,
                })),
            }),
        }
    }
}

struct Inner<K, V> {
    capacity: usize,
    len: Arc<AtomicUsize>,
    controller: Mutex<Option<Controller<K, V>>>,
}

/// The channel ends feeding the controller thread, plus its join handle.
///
/// `shutdown` takes the bundle out of the handle as one unit: with the
/// long-lived request sender gone, nothing new can enter the queue, and the
/// controller can treat a request-channel disconnect as the end of its work.
struct Controller<K, V> {
    request_tx: flume::Sender<Request<K, V>>,
    shutdown_tx: flume::Sender<()>,
    worker: JoinHandle<()>,
}

/// A bounded, thread-safe LRU cache.
///
/// Mutations never take a lock. Each call is packaged as a request, pushed
/// onto a bounded queue, and applied by a single controller thread that owns
/// all cache state; the caller blocks until the controller replies. Requests
/// are applied strictly in arrival order.
///
/// Handles are cheap to clone and share the same cache. Dropping the last
/// handle stops the controller; [`shutdown`](LruCache::shutdown) stops it
/// deterministically and waits for the thread to exit. After shutdown every
/// operation fails with [`Error::Closed`] instead of hanging.
pub struct LruCache<K, V>
where
    K: Key,
    V: Value,
{
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Debug for LruCache<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.inner.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> Clone for LruCache<K, V>
where
    K: Key,
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> LruCache<K, V>
where
    K: Key,
    V: Value,
{
    /// Creates a cache bounded to `capacity` entries with default settings.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        LruCacheBuilder::new(capacity).build()
    }

    /// Inserts `value` under `key`. Blocks until the write is applied.
    ///
    /// An existing key has its value replaced wholesale and counts as a use.
    /// A new key becomes the youngest entry, evicting from the oldest end if
    /// the cache would exceed capacity.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let (ack, applied) = reply();
        self.submit(Request::Put { key, value, ack })?;
        applied.recv().map_err(|_| Error::Closed)
    }

    /// Looks up `key`, promoting the entry to youngest on a hit.
    ///
    /// The value is cloned out of the cache.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let (tx, rx) = reply();
        self.submit(Request::Get {
            key: key.clone(),
            reply: tx,
        })?;
        rx.recv().map_err(|_| Error::Closed)
    }

    /// Removes `key`, returning the owned value if it was present. Removing
    /// an absent key is a no-op.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        let (tx, rx) = reply();
        self.submit(Request::Remove {
            key: key.clone(),
            reply: tx,
        })?;
        rx.recv().map_err(|_| Error::Closed)
    }

    /// Tells whether `key` is cached, without promoting it.
    ///
    /// The probe is serialized with mutations, so it reflects every write
    /// that completed before it was submitted.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let (tx, rx) = reply();
        self.submit(Request::Contains {
            key: key.clone(),
            reply: tx,
        })?;
        rx.recv().map_err(|_| Error::Closed)
    }

    /// Number of cached entries.
    ///
    /// Read from a mirror the controller republishes after each mutation:
    /// writes racing this call may not be reflected yet, but the caller's own
    /// completed calls always are. Reports zero once the cache is shut down.
    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Relaxed)
    }

    /// Tells whether the cache holds no entries, with the same consistency
    /// caveat as [`len`](LruCache::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries the cache holds.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Stops the controller and blocks until its thread has exited.
    ///
    /// Requests that were queued but not yet served are discarded; their
    /// callers fail with [`Error::Closed`] rather than hang. All entries are
    /// dropped. Every later operation, including a second `shutdown`, fails
    /// with [`Error::Closed`].
    pub fn shutdown(&self) -> Result<()> {
        let Controller {
            request_tx,
            shutdown_tx,
            worker,
        } = self.inner.controller.lock().take().ok_or(Error::Closed)?;
        // The intake closes before the signal is sent: the request channel
        // disconnects once in-flight submits finish, and the controller
        // receives up to that disconnect, so a request racing this shutdown
        // is served or discarded, never stranded in the queue.
        drop(request_tx);
        // The signal only fails if the controller is already gone; join
        // regardless.
        let _ = shutdown_tx.send(());
        if worker.join().is_err() {
            tracing::error!("[lru cache]: controller thread panicked");
        }
        Ok(())
    }

    fn submit(&self, request: Request<K, V>) -> Result<()> {
        tracing::trace!("[lru cache]: submit request: {request:?}");
        // `None` means `shutdown` already closed the intake. The short-lived
        // clone keeps the request channel connected across the send, so the
        // controller cannot stop receiving before this request lands.
        let request_tx = match self.inner.controller.lock().as_ref() {
            Some(controller) => controller.request_tx.clone(),
            None => return Err(Error::Closed),
        };
        request_tx.send(request).map_err(|_| Error::Closed)
    }
}
