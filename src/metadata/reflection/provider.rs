//! The downstream contract: where type shapes and member tables come from.
//!
//! The reflection cache never parses metadata itself. Everything it knows about a type is
//! obtained through [`MetadataProvider`], which hands out type descriptions, member tokens
//! per table and the details behind each token. Providers must be thread-safe; the cache
//! calls them concurrently from any thread and never while holding one of its own locks.

use std::{any::Any, sync::Arc};

use crate::{
    metadata::{
        member::{MethodSignature, ParameterInfo},
        reflection::filter::MemberName,
        token::Token,
        typesystem::{TypeDescription, TypeHandle},
    },
    Result,
};

/// The member tables a type owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberTable {
    /// `MethodDef` rows, including constructors and accessors
    Method,
    /// `Field` rows that occupy storage (literal fields are listed separately)
    Field,
    /// `Property` rows
    Property,
    /// `Event` rows
    Event,
    /// `NestedClass` rows naming this type as enclosing type
    NestedType,
}

/// The properties every member token resolves to
#[derive(Debug, Clone)]
pub struct RawMember {
    /// The member token
    pub token: Token,
    /// The member name and its folded hash
    pub name: MemberName,
    /// Raw attribute flags (`MethodAttributes`, `FieldAttributes`, ...)
    pub flags: u32,
    /// Virtual dispatch slot, for methods that have one
    pub slot: Option<u32>,
}

/// Resolution of a method or constructor token
#[derive(Debug, Clone)]
pub struct MethodDetails {
    /// The method signature
    pub signature: MethodSignature,
}

/// Resolution of a field token
#[derive(Debug, Clone)]
pub struct FieldDetails {
    /// The declared field type
    pub field_type: TypeHandle,
}

/// Resolution of a property token
#[derive(Debug, Clone)]
pub struct PropertyDetails {
    /// The property type
    pub property_type: TypeHandle,
    /// Index parameters of an indexer, empty otherwise
    pub index_parameters: Vec<ParameterInfo>,
    /// Method token of the getter
    pub getter: Option<Token>,
    /// Method token of the setter
    pub setter: Option<Token>,
}

/// Resolution of an event token
#[derive(Debug, Clone)]
pub struct EventDetails {
    /// The delegate type of the event
    pub handler_type: TypeHandle,
    /// Method token of the add accessor
    pub add: Option<Token>,
    /// Method token of the remove accessor
    pub remove: Option<Token>,
    /// Method token of the raise accessor
    pub raise: Option<Token>,
}

/// Generic interfaces the runtime attaches to single-dimension arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownGeneric {
    /// `System.Collections.Generic.IList<T>`
    IList,
    /// `System.Collections.Generic.IReadOnlyList<T>`
    IReadOnlyList,
    /// `System.Collections.Generic.IReadOnlyCollection<T>`
    IReadOnlyCollection,
}

/// An object produced by a constructor invoker
pub type Instance = Box<dyn Any + Send + Sync>;

/// A bound default constructor
pub type ConstructorInvoker = Arc<dyn Fn() -> Result<Instance> + Send + Sync>;

/// Source of type shapes and member tables.
///
/// All handles and tokens passed in were previously handed out by the same provider.
/// Tokens are always resolved in the context of the type level they were enumerated
/// from, so a provider that shares member tables between instantiations can redirect to
/// the shared representation internally.
///
/// Errors are propagated unchanged by the cache, with one exception: a
/// [`crate::Error::MemberNotResolved`] for a single member token drops that member from
/// the population result if the configuration allows it.
pub trait MetadataProvider: Send + Sync {
    /// Describe the shape of `ty`
    ///
    /// # Errors
    /// [`crate::Error::TypeNotFound`] if the handle is unknown.
    fn describe(&self, ty: TypeHandle) -> Result<Arc<TypeDescription>>;

    /// The tokens of the members `ty` declares itself in `table`
    ///
    /// # Errors
    /// [`crate::Error::TypeNotFound`] if the handle is unknown.
    fn member_tokens(&self, ty: TypeHandle, table: MemberTable) -> Result<Vec<Token>>;

    /// The tokens of the literal (constant) fields `ty` declares
    ///
    /// # Errors
    /// [`crate::Error::TypeNotFound`] if the handle is unknown.
    fn literal_field_tokens(&self, ty: TypeHandle) -> Result<Vec<Token>>;

    /// Name, attributes and slot of a member token
    ///
    /// # Errors
    /// [`crate::Error::MemberNotResolved`] if the token does not resolve.
    fn member(&self, ty: TypeHandle, token: Token) -> Result<RawMember>;

    /// Signature of a method or constructor token
    ///
    /// # Errors
    /// [`crate::Error::MemberNotResolved`] if the token does not resolve.
    fn method_details(&self, ty: TypeHandle, token: Token) -> Result<MethodDetails>;

    /// Type of a field token
    ///
    /// # Errors
    /// [`crate::Error::MemberNotResolved`] if the token does not resolve.
    fn field_details(&self, ty: TypeHandle, token: Token) -> Result<FieldDetails>;

    /// Type, index parameters and accessors of a property token
    ///
    /// # Errors
    /// [`crate::Error::MemberNotResolved`] if the token does not resolve.
    fn property_details(&self, ty: TypeHandle, token: Token) -> Result<PropertyDetails>;

    /// Handler type and accessors of an event token
    ///
    /// # Errors
    /// [`crate::Error::MemberNotResolved`] if the token does not resolve.
    fn event_details(&self, ty: TypeHandle, token: Token) -> Result<EventDetails>;

    /// The type a `NestedClass` token of `ty` names
    ///
    /// # Errors
    /// [`crate::Error::MemberNotResolved`] if the token does not resolve.
    fn resolve_nested_type(&self, ty: TypeHandle, token: Token) -> Result<TypeHandle>;

    /// Every interface `ty` implements, including inherited ones
    ///
    /// # Errors
    /// [`crate::Error::TypeNotFound`] if the handle is unknown.
    fn interfaces(&self, ty: TypeHandle) -> Result<Vec<TypeHandle>>;

    /// The constraints of a generic parameter
    ///
    /// # Errors
    /// [`crate::Error::TypeNotFound`] if the handle is unknown.
    fn generic_constraints(&self, ty: TypeHandle) -> Result<Vec<TypeHandle>>;

    /// Instantiate `definition` over `args`
    ///
    /// Providers are free to return a fresh handle on every call; the cache deduplicates.
    ///
    /// # Errors
    /// [`crate::Error::InvalidOperation`] if `definition` is not a generic definition or
    /// the argument count does not match.
    fn instantiate(&self, definition: TypeHandle, args: &[TypeHandle]) -> Result<TypeHandle>;

    /// The generic definition of a well-known interface, if the provider models it
    ///
    /// # Errors
    /// Provider specific.
    fn well_known_generic(&self, which: WellKnownGeneric) -> Result<Option<TypeHandle>>;

    /// The root of the type hierarchy (`System.Object`)
    fn system_object(&self) -> TypeHandle;

    /// Bind an invoker that creates instances of `ty` through `constructor`
    ///
    /// `None` means the zero-initialized instance of a value type.
    ///
    /// # Errors
    /// [`crate::Error::MissingMethod`] if the constructor cannot be bound.
    fn bind_constructor(
        &self,
        ty: TypeHandle,
        constructor: Option<Token>,
    ) -> Result<ConstructorInvoker>;
}
