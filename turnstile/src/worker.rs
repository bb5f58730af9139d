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

use flume::{Receiver, Sender, TryRecvError};

use crate::{
    code::{HashBuilder, Key, Value},
    index::EntryIndex,
};

/// Creates the single-use reply channel paired with a request.
pub(crate) fn reply<T>() -> (Sender<T>, Receiver<T>) {
    flume::bounded(1)
}

/// A unit of work submitted to the controller.
///
/// Each variant carries the sender half of a reply channel. The submitter
/// blocks on the receiver half, so a reply doubles as the happens-before edge
/// making the applied mutation visible to the caller. Dropping a request
/// unanswered closes its reply channel, which submitters surface as
/// [`Error::Closed`](crate::Error::Closed).
pub(crate) enum Request<K, V> {
    /// Insert or update. Acked once the write is applied.
    Put { key: K, value: V, ack: Sender<()> },
    /// Recency-bumping point read.
    Get { key: K, reply: Sender<Option<V>> },
    /// Drops a key, handing the value back.
    Remove { key: K, reply: Sender<Option<V>> },
    /// Membership probe. Does not bump recency.
    Contains { key: K, reply: Sender<bool> },
}

impl<K, V> Debug for Request<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put { .. } => f.debug_struct("Put").finish(),
            Self::Get { .. } => f.debug_struct("Get").finish(),
            Self::Remove { .. } => f.debug_struct("Remove").finish(),
            Self::Contains { .. } => f.debug_struct("Contains").finish(),
        }
    }
}

enum Turn<K, V> {
    Request(Request<K, V>),
    Shutdown,
    Hangup,
}

/// The controller loop. Owns the recency index outright; nothing else ever
/// touches it, so no lock guards it.
pub(crate) struct Worker<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    index: EntryIndex<K, V, S>,
    request_rx: Receiver<Request<K, V>>,
    shutdown_rx: Receiver<()>,
    len: Arc<AtomicUsize>,
}

impl<K, V, S> Worker<K, V, S>
where
    K: Key,
    V: Value,
    S: HashBuilder,
{
    /// Spawns the controller thread, returning the sender ends the handle
    /// keeps and the join handle `shutdown` waits on.
    pub fn spawn(
        index: EntryIndex<K, V, S>,
        queue_depth: usize,
        len: Arc<AtomicUsize>,
    ) -> (Sender<Request<K, V>>, Sender<()>, JoinHandle<()>) {
        let (request_tx, request_rx) = flume::bounded(queue_depth);
        let (shutdown_tx, shutdown_rx) = flume::bounded(1);

        let worker = Worker {
            index,
            request_rx,
            shutdown_rx,
            len,
        };
        let handle = std::thread::Builder::new()
            .name("turnstile-worker".to_string())
            .spawn(move || worker.run())
            .unwrap();

        (request_tx, shutdown_tx, handle)
    }

    fn run(mut self) {
        tracing::debug!("[lru worker]: up, capacity: {}", self.index.capacity());
        loop {
            // A shutdown signal outranks requests still waiting in the queue.
            match self.shutdown_rx.try_recv() {
                Ok(()) => return self.shutdown(),
                Err(TryRecvError::Disconnected) => return self.hangup(),
                Err(TryRecvError::Empty) => {}
            }

            let turn = flume::Selector::new()
                .recv(&self.shutdown_rx, |msg| match msg {
                    Ok(()) => Turn::Shutdown,
                    Err(_) => Turn::Hangup,
                })
                .recv(&self.request_rx, |msg| match msg {
                    Ok(request) => Turn::Request(request),
                    Err(_) => Turn::Hangup,
                })
                .wait();

            match turn {
                Turn::Request(request) => self.serve(request),
                Turn::Shutdown => return self.shutdown(),
                Turn::Hangup => return self.hangup(),
            }
        }
    }

    fn serve(&mut self, request: Request<K, V>) {
        match request {
            Request::Put { key, value, ack } => {
                let mut evicted = vec![];
                match self.index.lookup(&key) {
                    // An update replaces the value wholesale and counts as a
                    // use of the key.
                    Some(slot) => {
                        self.index.replace_value(slot, value);
                        self.index.touch(slot);
                    }
                    None => {
                        self.index.insert_front(key, value, &mut evicted);
                    }
                }
                if !evicted.is_empty() {
                    tracing::trace!("[lru worker]: evicted {} entries", evicted.len());
                }
                self.publish_len();
                let _ = ack.send(());
            }
            Request::Get { key, reply } => {
                let value = match self.index.lookup(&key) {
                    Some(slot) => {
                        self.index.touch(slot);
                        Some(self.index.value(slot).clone())
                    }
                    None => None,
                };
                let _ = reply.send(value);
            }
            Request::Remove { key, reply } => {
                let value = self.index.lookup(&key).map(|slot| self.index.unlink(slot).1);
                self.publish_len();
                let _ = reply.send(value);
            }
            Request::Contains { key, reply } => {
                let _ = reply.send(self.index.lookup(&key).is_some());
            }
        }
    }

    /// Republishes the observable length. Runs before the reply is sent, so
    /// a caller's own completed write is always visible to its next `len`.
    fn publish_len(&self) {
        self.len.store(self.index.len(), Ordering::Relaxed);
    }

    fn shutdown(self) {
        // The handle drops the intake sender before it signals, so the queue
        // ends with a disconnect once in-flight submits finish. Receiving up
        // to that disconnect drops every request that raced the signal; each
        // dropped request closes its reply channel and the blocked submitter
        // observes `Closed` instead of waiting forever.
        let discarded = self.request_rx.iter().count();
        if discarded > 0 {
            tracing::debug!("[lru worker]: {discarded} queued requests discarded at shutdown");
        }
        self.len.store(0, Ordering::Relaxed);
        tracing::debug!("[lru worker]: down");
    }

    fn hangup(self) {
        // Request-channel disconnect with an empty queue: every sender is
        // gone, either because all handles dropped or because `shutdown`
        // closed the intake ahead of its signal. Nothing is left to serve
        // or discard.
        self.len.store(0, Ordering::Relaxed);
        tracing::debug!("[lru worker]: intake closed, exiting");
    }
}
