//! Member attributes, access levels and method signatures.
//!
//! # Key Types
//! - [`MemberAccess`]: the access level shared by methods and fields
//! - [`MethodModifiers`], [`FieldModifiers`]: attribute flags of methods and fields
//! - [`MethodSignature`], [`ParameterInfo`], [`CallingConventions`]: invocation shape of methods

mod attributes;
mod signature;

pub use attributes::{
    FieldModifiers, MemberAccess, MethodModifiers, FIELD_ACCESS_MASK, METHOD_ACCESS_MASK,
};
pub use signature::{CallingConventions, MethodSignature, ParameterInfo};
