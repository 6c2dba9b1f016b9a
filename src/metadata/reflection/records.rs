//! Member records handed out by the reflection cache.
//!
//! A record describes one member as seen through one reflected type. Records are created
//! by population, shared as `Arc`s and never mutated afterwards. The kind caches make sure
//! the same member is always represented by the same `Arc`, so callers may compare
//! records with [`Arc::ptr_eq`]. [`Member::same_member`] compares the underlying member
//! independently of instance identity.

use std::sync::Arc;

use strum::{Display, EnumCount, EnumIter};

use crate::metadata::{
    member::{FieldModifiers, MemberAccess, MethodModifiers, MethodSignature, ParameterInfo},
    reflection::filter::MemberName,
    token::Token,
    typesystem::{TypeAttributes, TypeHandle},
};

/// The member kinds a type is reflected over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, Display)]
pub enum MemberKind {
    /// Methods, excluding constructors
    Method,
    /// Instance constructors and type initializers
    Constructor,
    /// Fields, including literals
    Field,
    /// Properties
    Property,
    /// Events
    Event,
    /// Directly declared nested types
    NestedType,
    /// Implemented interfaces
    Interface,
}

/// Common surface of all member records
pub trait Member: Send + Sync + Sized + 'static {
    /// The kind this record type represents
    const KIND: MemberKind;

    /// The member name with its folded hash
    fn member_name(&self) -> &MemberName;

    /// The member name
    fn name(&self) -> &str {
        self.member_name().as_str()
    }

    /// The type that declares the member
    fn declaring_type(&self) -> TypeHandle;

    /// The type the member was reflected through
    fn reflected_type(&self) -> TypeHandle;

    /// The metadata token of the member
    fn token(&self) -> Token;

    /// Access level; for properties and events the most visible accessor
    fn access(&self) -> MemberAccess;

    /// Returns `true` if the member is public
    fn is_public(&self) -> bool {
        self.access().is_public()
    }

    /// Returns `true` for static members
    fn is_static(&self) -> bool;

    /// Returns `true` for virtual or abstract members
    fn is_overridable(&self) -> bool {
        false
    }

    /// Returns `true` if both records describe the same underlying member
    fn same_member(&self, other: &Self) -> bool {
        self.declaring_type() == other.declaring_type() && self.token() == other.token()
    }

    /// Wrap the record in the kind-tagged union
    fn into_record(self: Arc<Self>) -> MemberRecord;
}

/// A method, as seen through a reflected type
#[derive(Debug, Clone)]
pub struct MethodRecord {
    /// The `MethodDef` token
    pub token: Token,
    /// The method name
    pub name: MemberName,
    /// The type declaring the method
    pub declaring_type: TypeHandle,
    /// The type the method was reflected through
    pub reflected_type: TypeHandle,
    /// Access level
    pub access: MemberAccess,
    /// Method modifiers
    pub modifiers: MethodModifiers,
    /// Virtual dispatch slot of virtual methods
    pub slot: Option<u32>,
    /// The method signature
    pub signature: MethodSignature,
}

impl MethodRecord {
    /// Returns `true` if the method occupies a virtual slot
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers.contains(MethodModifiers::VIRTUAL)
    }

    /// Returns `true` if the method has no implementation
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns `true` if the runtime treats the method name specially
    #[must_use]
    pub fn is_rt_special_name(&self) -> bool {
        self.modifiers.contains(MethodModifiers::RT_SPECIAL_NAME)
    }

    /// The declared parameters
    #[must_use]
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.signature.parameters
    }
}

impl Member for MethodRecord {
    const KIND: MemberKind = MemberKind::Method;

    fn member_name(&self) -> &MemberName {
        &self.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn token(&self) -> Token {
        self.token
    }

    fn access(&self) -> MemberAccess {
        self.access
    }

    fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    fn is_overridable(&self) -> bool {
        self.modifiers
            .intersects(MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT)
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::Method(self)
    }
}

/// An instance constructor (`.ctor`) or type initializer (`.cctor`)
#[derive(Debug, Clone)]
pub struct ConstructorRecord {
    /// The underlying method
    pub method: MethodRecord,
}

impl ConstructorRecord {
    /// Name of instance constructors
    pub const CONSTRUCTOR_NAME: &'static str = ".ctor";
    /// Name of type initializers
    pub const TYPE_INITIALIZER_NAME: &'static str = ".cctor";

    /// Returns `true` for the type initializer
    #[must_use]
    pub fn is_type_initializer(&self) -> bool {
        self.method.name.as_str() == Self::TYPE_INITIALIZER_NAME
    }

    /// The constructor signature
    #[must_use]
    pub fn signature(&self) -> &MethodSignature {
        &self.method.signature
    }

    /// The declared parameters
    #[must_use]
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.method.signature.parameters
    }
}

impl Member for ConstructorRecord {
    const KIND: MemberKind = MemberKind::Constructor;

    fn member_name(&self) -> &MemberName {
        &self.method.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.method.declaring_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.method.reflected_type
    }

    fn token(&self) -> Token {
        self.method.token
    }

    fn access(&self) -> MemberAccess {
        self.method.access
    }

    fn is_static(&self) -> bool {
        self.method.is_static()
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::Constructor(self)
    }
}

/// A field, as seen through a reflected type
#[derive(Debug, Clone)]
pub struct FieldRecord {
    /// The `Field` token
    pub token: Token,
    /// The field name
    pub name: MemberName,
    /// The type declaring the field
    pub declaring_type: TypeHandle,
    /// The type the field was reflected through
    pub reflected_type: TypeHandle,
    /// Access level
    pub access: MemberAccess,
    /// Field modifiers
    pub modifiers: FieldModifiers,
    /// The declared field type
    pub field_type: TypeHandle,
    /// The type whose storage holds the field value.
    ///
    /// For static fields of a shared generic representation this is the concrete
    /// instantiation the field was enumerated through.
    pub storage_owner: TypeHandle,
}

impl FieldRecord {
    /// Returns `true` for compile-time constants
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.modifiers.contains(FieldModifiers::LITERAL)
    }

    /// Returns `true` for fields that can only be assigned during initialization
    #[must_use]
    pub fn is_init_only(&self) -> bool {
        self.modifiers.contains(FieldModifiers::INIT_ONLY)
    }
}

impl Member for FieldRecord {
    const KIND: MemberKind = MemberKind::Field;

    fn member_name(&self) -> &MemberName {
        &self.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn token(&self) -> Token {
        self.token
    }

    fn access(&self) -> MemberAccess {
        self.access
    }

    fn is_static(&self) -> bool {
        self.modifiers.contains(FieldModifiers::STATIC)
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::Field(self)
    }
}

/// An accessor method of a property or event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorInfo {
    /// The `MethodDef` token of the accessor
    pub token: Token,
    /// Access level of the accessor
    pub access: MemberAccess,
    /// Static accessor
    pub is_static: bool,
    /// The accessor occupies a virtual slot
    pub is_virtual: bool,
    /// Virtual dispatch slot
    pub slot: Option<u32>,
}

fn most_visible<'a>(accessors: impl Iterator<Item = &'a AccessorInfo>) -> MemberAccess {
    accessors
        .map(|a| a.access)
        .max()
        .unwrap_or(MemberAccess::CompilerControlled)
}

/// A property, as seen through a reflected type
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    /// The `Property` token
    pub token: Token,
    /// The property name
    pub name: MemberName,
    /// The type declaring the property
    pub declaring_type: TypeHandle,
    /// The type the property was reflected through
    pub reflected_type: TypeHandle,
    /// The property type
    pub property_type: TypeHandle,
    /// Index parameters of indexers
    pub index_parameters: Vec<ParameterInfo>,
    /// The getter
    pub getter: Option<AccessorInfo>,
    /// The setter
    pub setter: Option<AccessorInfo>,
}

impl PropertyRecord {
    /// Iterate the present accessors, getter first
    pub fn accessors(&self) -> impl Iterator<Item = &AccessorInfo> {
        self.getter.iter().chain(self.setter.iter())
    }

    /// Returns `true` if both properties take the same index parameter types
    #[must_use]
    pub fn same_signature(&self, other: &PropertyRecord) -> bool {
        self.index_parameters.len() == other.index_parameters.len()
            && self
                .index_parameters
                .iter()
                .zip(&other.index_parameters)
                .all(|(a, b)| a.ty == b.ty)
    }

    /// Returns `true` if getters and setters of both properties have the same access
    #[must_use]
    pub fn has_matching_accessibility(&self, other: &PropertyRecord) -> bool {
        self.getter.map(|a| a.access) == other.getter.map(|a| a.access)
            && self.setter.map(|a| a.access) == other.setter.map(|a| a.access)
    }

    /// Returns `true` if every accessor is private
    #[must_use]
    pub fn all_accessors_private(&self) -> bool {
        self.accessors().all(|a| a.access.is_private())
    }

    /// The virtual slot used to detect overrides: the getter's, else the setter's
    #[must_use]
    pub fn dedup_slot(&self) -> Option<u32> {
        self.accessors()
            .find(|a| a.is_virtual)
            .and_then(|a| a.slot)
    }
}

impl Member for PropertyRecord {
    const KIND: MemberKind = MemberKind::Property;

    fn member_name(&self) -> &MemberName {
        &self.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn token(&self) -> Token {
        self.token
    }

    fn access(&self) -> MemberAccess {
        most_visible(self.accessors())
    }

    fn is_static(&self) -> bool {
        self.accessors().any(|a| a.is_static)
    }

    fn is_overridable(&self) -> bool {
        self.accessors().any(|a| a.is_virtual)
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::Property(self)
    }
}

/// An event, as seen through a reflected type
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// The `Event` token
    pub token: Token,
    /// The event name
    pub name: MemberName,
    /// The type declaring the event
    pub declaring_type: TypeHandle,
    /// The type the event was reflected through
    pub reflected_type: TypeHandle,
    /// The delegate type of the event
    pub handler_type: TypeHandle,
    /// The add accessor
    pub add: Option<AccessorInfo>,
    /// The remove accessor
    pub remove: Option<AccessorInfo>,
    /// The raise accessor
    pub raise: Option<AccessorInfo>,
}

impl EventRecord {
    /// Iterate the present accessors
    pub fn accessors(&self) -> impl Iterator<Item = &AccessorInfo> {
        self.add
            .iter()
            .chain(self.remove.iter())
            .chain(self.raise.iter())
    }

    /// Returns `true` if every accessor is private
    #[must_use]
    pub fn all_accessors_private(&self) -> bool {
        self.accessors().all(|a| a.access.is_private())
    }
}

impl Member for EventRecord {
    const KIND: MemberKind = MemberKind::Event;

    fn member_name(&self) -> &MemberName {
        &self.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn token(&self) -> Token {
        self.token
    }

    fn access(&self) -> MemberAccess {
        most_visible(self.accessors())
    }

    fn is_static(&self) -> bool {
        self.accessors().any(|a| a.is_static)
    }

    fn is_overridable(&self) -> bool {
        self.accessors().any(|a| a.is_virtual)
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::Event(self)
    }
}

/// A directly declared nested type
#[derive(Debug, Clone)]
pub struct NestedTypeRecord {
    /// The `NestedClass` token
    pub token: Token,
    /// The simple name of the nested type
    pub name: MemberName,
    /// The enclosing type
    pub declaring_type: TypeHandle,
    /// The type the nested type was reflected through
    pub reflected_type: TypeHandle,
    /// The nested type itself
    pub nested_type: TypeHandle,
    /// Attributes of the nested type
    pub flags: TypeAttributes,
}

impl Member for NestedTypeRecord {
    const KIND: MemberKind = MemberKind::NestedType;

    fn member_name(&self) -> &MemberName {
        &self.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn token(&self) -> Token {
        self.token
    }

    fn access(&self) -> MemberAccess {
        match self.flags.visibility() {
            1 | 2 => MemberAccess::Public,
            3 => MemberAccess::Private,
            4 => MemberAccess::Family,
            5 => MemberAccess::Assembly,
            6 => MemberAccess::FamilyAndAssembly,
            7 => MemberAccess::FamilyOrAssembly,
            _ => MemberAccess::Assembly,
        }
    }

    fn is_static(&self) -> bool {
        false
    }

    fn same_member(&self, other: &Self) -> bool {
        self.nested_type == other.nested_type
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::NestedType(self)
    }
}

/// An interface implemented by the reflected type
#[derive(Debug, Clone)]
pub struct InterfaceRecord {
    /// The interface type
    pub interface: TypeHandle,
    /// The simple name of the interface
    pub name: MemberName,
    /// The namespace of the interface
    pub namespace: String,
    /// The type the interface was reflected through
    pub reflected_type: TypeHandle,
    /// Attributes of the interface type
    pub flags: TypeAttributes,
}

impl Member for InterfaceRecord {
    const KIND: MemberKind = MemberKind::Interface;

    fn member_name(&self) -> &MemberName {
        &self.name
    }

    fn declaring_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    fn token(&self) -> Token {
        self.interface.token()
    }

    fn access(&self) -> MemberAccess {
        if self.flags.is_visible() {
            MemberAccess::Public
        } else {
            MemberAccess::Assembly
        }
    }

    fn is_static(&self) -> bool {
        false
    }

    fn same_member(&self, other: &Self) -> bool {
        self.interface == other.interface
    }

    fn into_record(self: Arc<Self>) -> MemberRecord {
        MemberRecord::Interface(self)
    }
}

/// A member record of any kind
#[derive(Debug, Clone)]
pub enum MemberRecord {
    /// A method
    Method(Arc<MethodRecord>),
    /// A constructor or type initializer
    Constructor(Arc<ConstructorRecord>),
    /// A field
    Field(Arc<FieldRecord>),
    /// A property
    Property(Arc<PropertyRecord>),
    /// An event
    Event(Arc<EventRecord>),
    /// A nested type
    NestedType(Arc<NestedTypeRecord>),
    /// An implemented interface
    Interface(Arc<InterfaceRecord>),
}

macro_rules! each_record {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            MemberRecord::Method($inner) => $body,
            MemberRecord::Constructor($inner) => $body,
            MemberRecord::Field($inner) => $body,
            MemberRecord::Property($inner) => $body,
            MemberRecord::Event($inner) => $body,
            MemberRecord::NestedType($inner) => $body,
            MemberRecord::Interface($inner) => $body,
        }
    };
}

impl MemberRecord {
    /// The kind of the wrapped record
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        match self {
            MemberRecord::Method(_) => MemberKind::Method,
            MemberRecord::Constructor(_) => MemberKind::Constructor,
            MemberRecord::Field(_) => MemberKind::Field,
            MemberRecord::Property(_) => MemberKind::Property,
            MemberRecord::Event(_) => MemberKind::Event,
            MemberRecord::NestedType(_) => MemberKind::NestedType,
            MemberRecord::Interface(_) => MemberKind::Interface,
        }
    }

    /// The member name
    #[must_use]
    pub fn name(&self) -> &str {
        each_record!(self, r => r.name())
    }

    /// The type that declares the member
    #[must_use]
    pub fn declaring_type(&self) -> TypeHandle {
        each_record!(self, r => r.declaring_type())
    }

    /// The metadata token of the member
    #[must_use]
    pub fn token(&self) -> Token {
        each_record!(self, r => r.token())
    }

    /// Returns `true` if the member is public
    #[must_use]
    pub fn is_public(&self) -> bool {
        each_record!(self, r => r.is_public())
    }

    /// Returns `true` for static members
    #[must_use]
    pub fn is_static(&self) -> bool {
        each_record!(self, r => r.is_static())
    }

    /// Returns `true` if both wrap the very same record instance
    #[must_use]
    pub fn ptr_eq(&self, other: &MemberRecord) -> bool {
        match (self, other) {
            (MemberRecord::Method(a), MemberRecord::Method(b)) => Arc::ptr_eq(a, b),
            (MemberRecord::Constructor(a), MemberRecord::Constructor(b)) => Arc::ptr_eq(a, b),
            (MemberRecord::Field(a), MemberRecord::Field(b)) => Arc::ptr_eq(a, b),
            (MemberRecord::Property(a), MemberRecord::Property(b)) => Arc::ptr_eq(a, b),
            (MemberRecord::Event(a), MemberRecord::Event(b)) => Arc::ptr_eq(a, b),
            (MemberRecord::NestedType(a), MemberRecord::NestedType(b)) => Arc::ptr_eq(a, b),
            (MemberRecord::Interface(a), MemberRecord::Interface(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
