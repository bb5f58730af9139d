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

/// Cache error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The cache was shut down and its controller no longer serves requests.
    ///
    /// Returned by every channel-backed operation once [`shutdown`] has been
    /// called, and by requests that were still queued when the controller
    /// stopped.
    ///
    /// [`shutdown`]: crate::LruCache::shutdown
    #[error("cache closed")]
    Closed,
}

/// Cache result.
pub type Result<T> = std::result::Result<T, Error>;
