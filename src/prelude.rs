//! # memberscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the library. Import it to get quick access to the context, the query surface, the
//! binding flags and the in-memory provider.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all memberscope operations
pub use crate::Error;

/// The result type used throughout memberscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Owner of all per-type caches and configuration
pub use crate::metadata::reflection::{ReflectionConfig, ReflectionContext, RuntimeType};

/// How ambiguous property pairs are resolved
pub use crate::metadata::reflection::PropertyAmbiguity;

/// Query options
pub use crate::metadata::reflection::BindingFlags;

// ================================================================================================
// Metadata Identities
// ================================================================================================

/// Metadata token type for referencing table rows
pub use crate::metadata::token::Token;

/// Type identities and shapes
pub use crate::metadata::typesystem::{TypeAttributes, TypeDescription, TypeFlavor, TypeHandle};

/// Member attributes and signatures
pub use crate::metadata::member::{
    CallingConventions, FieldModifiers, MemberAccess, MethodModifiers, MethodSignature,
    ParameterInfo,
};

// ================================================================================================
// Member Records
// ================================================================================================

/// The shared member trait, needed for `name()`, `declaring_type()` and friends
pub use crate::metadata::reflection::Member;

/// Member records returned by queries
pub use crate::metadata::reflection::{
    AccessorInfo, ConstructorRecord, EventRecord, FieldRecord, InterfaceRecord, MemberKind,
    MemberRecord, MethodRecord, NestedTypeRecord, PropertyRecord,
};

// ================================================================================================
// Metadata Providers
// ================================================================================================

/// The interface between the cache and a metadata source
pub use crate::metadata::reflection::{Instance, MetadataProvider, WellKnownGeneric};

/// In-memory provider and its builders
pub use crate::metadata::reflection::{
    EventDef, FieldDef, InMemoryProvider, MemoryInstance, MethodDef, PropertyDef, TypeDefBuilder,
};
