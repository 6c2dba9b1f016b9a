//! Metadata tokens, type handles, member attributes and the reflection cache.
//!
//! The binary metadata format itself is not parsed here. Everything below consumes
//! already-resolved metadata through [`reflection::MetadataProvider`].

/// Member attributes, access levels and method signatures
pub mod member;
/// Member discovery, caching and binding
pub mod reflection;
/// Metadata tokens identifying table rows
pub mod token;
/// Type handles and type descriptions
pub mod typesystem;
