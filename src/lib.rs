// Copyright 2025 Johann Kempter
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
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # memberscope
//!
//! A concurrent, identity-stable member reflection cache for .NET-style type systems.
//!
//! `memberscope` answers questions such as "all public instance methods of `C`" or "the
//! property `Item` taking an `Int32`" on top of an already-resolved metadata source. It
//! discovers the members of a type and its hierarchy, applies the runtime's inheritance
//! rules (virtual slot override suppression, private member hiding, property and event
//! hiding), caches the result per member kind and hands out the *same* record instances
//! to every caller, no matter how many threads race on the first query.
//!
//! ## Features
//!
//! - **Identity-stable records** - repeated and concurrent queries return the same `Arc`
//! - **Lock-free hits** - name indices and completed lists are read without locking
//! - **Inheritance-aware population** - override dedup through a virtual slot bitset
//! - **Runtime-compatible binding** - `BindingFlags` filtering, overload and ambiguity resolution
//! - **Fast default construction** - a 16-entry ring of lazily bound constructor invokers
//!
//! ## Quick Start
//!
//! ```rust
//! use memberscope::prelude::*;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(InMemoryProvider::new());
//! let a = provider
//!     .class("Demo", "A")
//!     .method(MethodDef::new("F").virtual_method())
//!     .build()?;
//! let b = provider
//!     .class("Demo", "B")
//!     .extends(a)
//!     .method(MethodDef::new("F").virtual_method())
//!     .build()?;
//! let c = provider.class("Demo", "C").extends(b).build()?;
//!
//! let context = ReflectionContext::new(provider);
//! let methods = context
//!     .get_type(c)?
//!     .methods(BindingFlags::PUBLIC | BindingFlags::INSTANCE)?;
//!
//! let f: Vec<_> = methods.iter().filter(|m| m.name() == "F").collect();
//! assert_eq!(f.len(), 1);
//! assert_eq!(f[0].declaring_type, b);
//! # Ok::<(), memberscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata::reflection`] - the reflection cache, population rules and binding
//! - [`metadata::typesystem`] - type handles and type descriptions
//! - [`metadata::member`] - member attributes and method signatures
//! - [`utils`] - [`utils::CompactList`], [`utils::AppendSafeTable`] and friends
//! - [`Error`] and [`Result`] - error handling
//!
//! The metadata itself is consumed through the [`metadata::reflection::MetadataProvider`]
//! trait. [`metadata::reflection::InMemoryProvider`] is a complete in-process implementation
//! that is handy for tests and for embedders that synthesize their own types.
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use memberscope::prelude::*;
/// use std::sync::Arc;
///
/// let provider = Arc::new(InMemoryProvider::new());
/// let context = ReflectionContext::new(provider.clone());
/// let object = context.get_type(provider.object_type())?;
/// assert_eq!(object.full_name()?, "System.Object");
/// # Ok::<(), memberscope::Error>(())
/// ```
pub mod prelude;

/// Type handles, member attributes and the reflection cache
///
/// # Key Components
///
/// - [`metadata::reflection::ReflectionContext`] - owner of all per-type caches
/// - [`metadata::reflection::RuntimeType`] - query surface for a single type
/// - [`metadata::reflection::TypeReflectionCache`] - per-type cache of every member kind
/// - [`metadata::reflection::MemberKindCache`] - name-indexed and complete member lists of one kind
/// - [`metadata::reflection::ConstructionCache`] - default-constructor invoker ring
pub mod metadata;

/// Data structures used by the reflection cache
///
/// - [`utils::CompactList`] - a sequence that stays off the heap for zero or one element
/// - [`utils::AppendSafeTable`] - an append-only hash table with lock-free reads
/// - [`utils::SlotSet`] - a bit set over virtual slot indices
pub mod utils;

/// `memberscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `memberscope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Main entry point for reflection queries.
///
/// See [`metadata::reflection::ReflectionContext`] for details.
pub use metadata::reflection::ReflectionContext;

/// Configuration of the reflection cache behavior.
pub use metadata::reflection::ReflectionConfig;
