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

use std::hash::{BuildHasher, BuildHasherDefault, Hash};

/// Key trait for the cache.
///
/// Requests carry owned keys across the controller channel, so keys must be
/// cloneable. Keep them small; intern or wrap large keys in an
/// [`Arc`](std::sync::Arc).
pub trait Key: Send + Sync + 'static + Hash + Eq + Clone {}

/// Value trait for the cache.
///
/// Point reads clone the value out of the controller. Wrap expensive payloads
/// in an [`Arc`](std::sync::Arc).
pub trait Value: Send + Sync + 'static + Clone {}

impl<T: Send + Sync + 'static + Hash + Eq + Clone> Key for T {}
impl<T: Send + Sync + 'static + Clone> Value for T {}

/// Hash builder trait.
pub trait HashBuilder: BuildHasher + Send + Sync + 'static {}

impl<T: BuildHasher + Send + Sync + 'static> HashBuilder for T {}

/// The default hash builder for the cache.
pub type DefaultHashBuilder = BuildHasherDefault<twox_hash::XxHash64>;
