//! Runtime member discovery and caching.
//!
//! This module answers reflection queries ("which methods named `Run` does this type
//! expose?") against metadata supplied by a [`MetadataProvider`], and caches every
//! answer so that repeated queries return the very same record objects.
//!
//! # Key Components
//!
//! - [`ReflectionContext`]: owner of every per-type cache and of the construction ring
//! - [`RuntimeType`]: query surface for a single type, applying [`BindingFlags`]
//! - [`TypeReflectionCache`]: per-type cache with one [`MemberKindCache`] per member kind
//! - [`MemberKindCache`]: name-indexed and complete member lists of one kind
//! - [`ConstructionCache`]: ring of bound default constructors
//! - [`InMemoryProvider`]: a provider holding hand-built types, used by tests and demos
//!
//! # Population
//!
//! Member lists are built lazily, one kind at a time. Methods, properties and events are
//! collected along the inheritance chain with overrides reported once, at their most
//! derived declaration. Constructors and nested types are never inherited. Private
//! members of base types are never visible through a derived type.
//!
//! # Thread Safety
//!
//! Every cache can be queried from any number of threads. Concurrent populations of the
//! same list may both run; only one result is ever published and all callers observe it.
//!
//! # Examples
//!
//! ```rust
//! use memberscope::prelude::*;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(InMemoryProvider::new());
//! let object = provider.object_type();
//! let shape = provider
//!     .class("Demo", "Shape")
//!     .method(MethodDef::new("Area").virtual_method())
//!     .method(MethodDef::new("Run"))
//!     .method(MethodDef::new("Run").param(object))
//!     .build()?;
//!
//! let context = ReflectionContext::new(provider);
//! let runtime = context.get_type(shape)?;
//! let flags = BindingFlags::PUBLIC | BindingFlags::INSTANCE;
//!
//! assert!(runtime.method("Area", flags)?.is_some());
//! assert!(matches!(runtime.method("Run", flags), Err(Error::AmbiguousMatch(_))));
//!
//! let run = runtime
//!     .method_with("Run", flags, CallingConventions::ANY, &[object])?
//!     .unwrap();
//! assert_eq!(run.parameters().len(), 1);
//! # Ok::<(), memberscope::Error>(())
//! ```

mod binding;
mod config;
mod construction;
mod context;
mod filter;
mod kindcache;
mod memory;
mod populate;
mod provider;
mod records;
mod typecache;

pub use binding::BindingFlags;
pub use config::{PropertyAmbiguity, ReflectionConfig};
pub use construction::{ConstructionCache, ConstructionEntry, CONSTRUCTION_CACHE_SIZE};
pub use context::{ReflectionContext, RuntimeType};
pub use filter::{MatchMode, MemberName, NameFilter};
pub use kindcache::{MemberArray, MemberKindCache, Population};
pub use memory::{
    EventDef, FieldDef, InMemoryProvider, MemoryInstance, MethodDef, PropertyDef, TypeDefBuilder,
};
pub use provider::{
    ConstructorInvoker, EventDetails, FieldDetails, Instance, MemberTable, MetadataProvider,
    MethodDetails, PropertyDetails, RawMember, WellKnownGeneric,
};
pub use records::{
    AccessorInfo, ConstructorRecord, EventRecord, FieldRecord, InterfaceRecord, Member,
    MemberKind, MemberRecord, MethodRecord, NestedTypeRecord, PropertyRecord,
};
pub use typecache::{CachedMember, InstantiationTable, TypeReflectionCache};
