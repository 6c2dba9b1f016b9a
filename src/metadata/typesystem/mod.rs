//! Type identities and type descriptions.
//!
//! The reflection cache never owns type definitions. It addresses types through
//! [`TypeHandle`], an opaque identity handed out by the metadata provider, and reads their
//! shape through [`TypeDescription`].
//!
//! # Key Components
//!
//! - [`TypeHandle`]: identity of a type; equality is identity, never structure
//! - [`TypeDescription`]: name, flavor, base type and layout facts of one type
//! - [`TypeFlavor`]: the shape of a type (class, interface, array, generic parameter, ...)
//! - [`TypeAttributes`]: the `TypeAttributes` bitmask of ECMA-335 §II.23.1.15

mod description;
mod handle;

pub use description::{TypeAttributes, TypeDescription, TypeFlavor};
pub use handle::TypeHandle;
