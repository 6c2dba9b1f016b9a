//! An in-process [`MetadataProvider`].
//!
//! [`InMemoryProvider`] keeps type definitions and member tables in concurrent maps and
//! hands out `TypeDef`-style tokens for everything defined through [`TypeDefBuilder`].
//! Arrays, pointers, generic instantiations and generic parameters receive artificial
//! tokens. The provider comes with a minimal `System` core (`Object`, `ValueType`,
//! `Array`, `String`, `Boolean`, `Int32`, `Type`) and the generic collection interfaces
//! the reflection cache attaches to single-dimension arrays.
//!
//! Virtual slots are laid out the way a runtime method table would: a virtual method
//! reuses the slot of an inherited virtual method with the same name and parameter types
//! unless it is marked `NEW_SLOT`, in which case it opens a new slot.
//!
//! # Examples
//!
//! ```rust
//! use memberscope::prelude::*;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(InMemoryProvider::new());
//! let int = provider.int32_type();
//! let point = provider
//!     .value_type("Demo", "Point")
//!     .field(FieldDef::new("X", int))
//!     .field(FieldDef::new("Y", int))
//!     .build()?;
//!
//! let context = ReflectionContext::new(provider);
//! let fields = context
//!     .get_type(point)?
//!     .fields(BindingFlags::PUBLIC | BindingFlags::INSTANCE)?;
//! assert_eq!(fields.len(), 2);
//! # Ok::<(), memberscope::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use dashmap::{DashMap, DashSet};
use log::debug;

use crate::{
    metadata::{
        member::{
            CallingConventions, FieldModifiers, MemberAccess, MethodModifiers, MethodSignature,
            ParameterInfo,
        },
        reflection::{
            filter::MemberName,
            provider::{
                ConstructorInvoker, EventDetails, FieldDetails, Instance, MemberTable,
                MetadataProvider, MethodDetails, PropertyDetails, RawMember, WellKnownGeneric,
            },
            records::ConstructorRecord,
        },
        token::Token,
        typesystem::{TypeAttributes, TypeDescription, TypeFlavor, TypeHandle},
    },
    Error, Result,
};

const OBJECT: u32 = 1;
const VALUE_TYPE: u32 = 2;
const ARRAY: u32 = 3;
const STRING: u32 = 4;
const BOOLEAN: u32 = 5;
const INT32: u32 = 6;
const TYPE: u32 = 7;
const IENUMERABLE: u32 = 8;
const ICOLLECTION: u32 = 9;
const ILIST: u32 = 10;
const IREADONLY_COLLECTION: u32 = 11;
const IREADONLY_LIST: u32 = 12;
/// First `TypeDef` row handed out to user defined types
const FIRST_USER_ROW: u32 = 0x20;

const GENERIC_COLLECTIONS: &str = "System.Collections.Generic";

fn builtin(row: u32) -> TypeHandle {
    TypeHandle::new(Token::from_parts(Token::TYPE_DEF, row))
}

/// The object a bound constructor of [`InMemoryProvider`] produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInstance {
    /// The constructed type
    pub ty: TypeHandle,
    /// The constructor that ran, `None` for zero-initialized value types
    pub constructor: Option<Token>,
}

#[derive(Debug, Clone)]
struct VirtualSlot {
    name: String,
    parameters: Vec<TypeHandle>,
}

#[derive(Debug, Clone, Default)]
struct Inheritance {
    vtable: Vec<VirtualSlot>,
    interfaces: Vec<TypeHandle>,
}

struct TypeEntry {
    description: Arc<TypeDescription>,
    vtable: Vec<VirtualSlot>,
    methods: Vec<Token>,
    fields: Vec<Token>,
    literals: Vec<Token>,
    properties: Vec<Token>,
    events: Vec<Token>,
    nested: Vec<Token>,
    interfaces: Vec<TypeHandle>,
    constraints: Vec<TypeHandle>,
}

impl TypeEntry {
    fn new(description: TypeDescription, inheritance: Inheritance) -> Self {
        TypeEntry {
            description: Arc::new(description),
            vtable: inheritance.vtable,
            methods: Vec::new(),
            fields: Vec::new(),
            literals: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            nested: Vec::new(),
            interfaces: inheritance.interfaces,
            constraints: Vec::new(),
        }
    }

    fn tokens(&self, table: MemberTable) -> &[Token] {
        match table {
            MemberTable::Method => &self.methods,
            MemberTable::Field => &self.fields,
            MemberTable::Property => &self.properties,
            MemberTable::Event => &self.events,
            MemberTable::NestedType => &self.nested,
        }
    }
}

enum MemberEntry {
    Method {
        raw: RawMember,
        signature: MethodSignature,
    },
    Field {
        raw: RawMember,
        field_type: TypeHandle,
    },
    Property {
        raw: RawMember,
        details: PropertyDetails,
    },
    Event {
        raw: RawMember,
        details: EventDetails,
    },
    Nested {
        nested: TypeHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DerivedKey {
    SzArray(TypeHandle),
    Pointer(TypeHandle),
    Instantiation(TypeHandle, Vec<TypeHandle>),
}

/// A thread-safe [`MetadataProvider`] backed by in-process tables
pub struct InMemoryProvider {
    types: DashMap<TypeHandle, TypeEntry>,
    members: DashMap<Token, MemberEntry>,
    derived: DashMap<DerivedKey, TypeHandle>,
    unresolvable: DashSet<Token>,
    next_type: AtomicU32,
    next_method: AtomicU32,
    next_field: AtomicU32,
    next_property: AtomicU32,
    next_event: AtomicU32,
    next_nested: AtomicU32,
    next_artificial: AtomicU32,
    scans: AtomicUsize,
    binds: AtomicUsize,
    instantiations: AtomicUsize,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    /// Create a provider that only knows the built-in core types
    #[must_use]
    pub fn new() -> Self {
        let provider = InMemoryProvider {
            types: DashMap::new(),
            members: DashMap::new(),
            derived: DashMap::new(),
            unresolvable: DashSet::new(),
            next_type: AtomicU32::new(FIRST_USER_ROW),
            next_method: AtomicU32::new(1),
            next_field: AtomicU32::new(1),
            next_property: AtomicU32::new(1),
            next_event: AtomicU32::new(1),
            next_nested: AtomicU32::new(1),
            next_artificial: AtomicU32::new(1),
            scans: AtomicUsize::new(0),
            binds: AtomicUsize::new(0),
            instantiations: AtomicUsize::new(0),
        };
        provider.install_core();
        provider
    }

    fn install_core(&self) {
        let object = builtin(OBJECT);
        let string = builtin(STRING);
        let boolean = builtin(BOOLEAN);
        let int32 = builtin(INT32);

        self.predefined(OBJECT, TypeFlavor::Class, "System", "Object")
            .root()
            .method(MethodDef::constructor())
            .method(MethodDef::new("ToString").virtual_method().returns(string))
            .method(
                MethodDef::new("Equals")
                    .virtual_method()
                    .param(object)
                    .returns(boolean),
            )
            .method(MethodDef::new("GetHashCode").virtual_method().returns(int32))
            .method(MethodDef::new("GetType").returns(builtin(TYPE)))
            .method(
                MethodDef::new("Finalize")
                    .access(MemberAccess::Family)
                    .virtual_method(),
            )
            .method(
                MethodDef::new("MemberwiseClone")
                    .access(MemberAccess::Family)
                    .returns(object),
            )
            .install();

        self.predefined(VALUE_TYPE, TypeFlavor::Class, "System", "ValueType")
            .abstract_type()
            .method(MethodDef::constructor().access(MemberAccess::Family))
            .method(MethodDef::new("ToString").virtual_method().returns(string))
            .method(
                MethodDef::new("Equals")
                    .virtual_method()
                    .param(object)
                    .returns(boolean),
            )
            .method(MethodDef::new("GetHashCode").virtual_method().returns(int32))
            .install();

        self.predefined(ARRAY, TypeFlavor::Class, "System", "Array")
            .abstract_type()
            .method(MethodDef::constructor().access(MemberAccess::Family))
            .method(MethodDef::new("Clone").virtual_method().returns(object))
            .method(MethodDef::new("GetValue").param(int32).returns(object))
            .property(PropertyDef::new("Length", int32))
            .install();

        self.predefined(STRING, TypeFlavor::Class, "System", "String")
            .sealed()
            .method(MethodDef::new("ToString").virtual_method().returns(string))
            .method(
                MethodDef::new("Equals")
                    .virtual_method()
                    .param(object)
                    .returns(boolean),
            )
            .method(MethodDef::new("GetHashCode").virtual_method().returns(int32))
            .property(PropertyDef::new("Length", int32))
            .install();

        for (row, name) in [(BOOLEAN, "Boolean"), (INT32, "Int32")] {
            self.predefined(row, TypeFlavor::ValueType, "System", name)
                .sealed()
                .method(MethodDef::new("ToString").virtual_method().returns(string))
                .method(MethodDef::new("GetHashCode").virtual_method().returns(int32))
                .install();
        }

        self.predefined(TYPE, TypeFlavor::Class, "System", "Type")
            .abstract_type()
            .method(MethodDef::constructor().access(MemberAccess::Family))
            .property(PropertyDef::new("Name", string).virtual_property())
            .install();

        self.predefined(IENUMERABLE, TypeFlavor::Interface, GENERIC_COLLECTIONS, "IEnumerable`1")
            .generic_params(1)
            .method(MethodDef::new("GetEnumerator").returns(object))
            .install();
        self.predefined(ICOLLECTION, TypeFlavor::Interface, GENERIC_COLLECTIONS, "ICollection`1")
            .generic_params(1)
            .implements(builtin(IENUMERABLE))
            .property(PropertyDef::new("Count", int32))
            .method(MethodDef::new("Add").param(object))
            .method(MethodDef::new("Clear"))
            .install();
        self.predefined(ILIST, TypeFlavor::Interface, GENERIC_COLLECTIONS, "IList`1")
            .generic_params(1)
            .implements(builtin(ICOLLECTION))
            .property(PropertyDef::new("Item", object).index(int32).with_setter())
            .method(MethodDef::new("IndexOf").param(object).returns(int32))
            .install();
        self.predefined(
            IREADONLY_COLLECTION,
            TypeFlavor::Interface,
            GENERIC_COLLECTIONS,
            "IReadOnlyCollection`1",
        )
        .generic_params(1)
        .implements(builtin(IENUMERABLE))
        .property(PropertyDef::new("Count", int32))
        .install();
        self.predefined(
            IREADONLY_LIST,
            TypeFlavor::Interface,
            GENERIC_COLLECTIONS,
            "IReadOnlyList`1",
        )
        .generic_params(1)
        .implements(builtin(IREADONLY_COLLECTION))
        .property(PropertyDef::new("Item", object).index(int32))
        .install();
    }

    fn predefined(
        &self,
        row: u32,
        flavor: TypeFlavor,
        namespace: &str,
        name: &str,
    ) -> TypeDefBuilder<'_> {
        let mut builder = TypeDefBuilder::new(self, flavor, namespace, name);
        builder.handle = Some(builtin(row));
        builder
    }

    /// Start defining a reference type; its base defaults to `System.Object`
    #[must_use]
    pub fn class(&self, namespace: &str, name: &str) -> TypeDefBuilder<'_> {
        TypeDefBuilder::new(self, TypeFlavor::Class, namespace, name)
    }

    /// Start defining a value type; its base is `System.ValueType` and it is sealed
    #[must_use]
    pub fn value_type(&self, namespace: &str, name: &str) -> TypeDefBuilder<'_> {
        TypeDefBuilder::new(self, TypeFlavor::ValueType, namespace, name).sealed()
    }

    /// Start defining an interface
    #[must_use]
    pub fn interface(&self, namespace: &str, name: &str) -> TypeDefBuilder<'_> {
        TypeDefBuilder::new(self, TypeFlavor::Interface, namespace, name)
    }

    /// `System.Object`
    #[must_use]
    pub fn object_type(&self) -> TypeHandle {
        builtin(OBJECT)
    }

    /// `System.ValueType`
    #[must_use]
    pub fn value_type_base(&self) -> TypeHandle {
        builtin(VALUE_TYPE)
    }

    /// `System.Array`
    #[must_use]
    pub fn array_type(&self) -> TypeHandle {
        builtin(ARRAY)
    }

    /// `System.String`
    #[must_use]
    pub fn string_type(&self) -> TypeHandle {
        builtin(STRING)
    }

    /// `System.Boolean`
    #[must_use]
    pub fn boolean_type(&self) -> TypeHandle {
        builtin(BOOLEAN)
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32_type(&self) -> TypeHandle {
        builtin(INT32)
    }

    /// The single-dimension, zero-based array of `element` (`element[]`)
    ///
    /// # Errors
    /// [`Error::TypeNotFound`] if `element` is unknown.
    pub fn sz_array(&self, element: TypeHandle) -> Result<TypeHandle> {
        let element_desc = self.describe(element)?;
        let key = DerivedKey::SzArray(element);
        if let Some(existing) = self.derived.get(&key) {
            return Ok(*existing);
        }

        let array = builtin(ARRAY);
        let inheritance = self.inheritance(array);
        let handle = self.next_artificial();
        let mut description = TypeDescription::new(
            handle,
            &element_desc.namespace,
            &format!("{}[]", element_desc.name),
            TypeFlavor::Array {
                element,
                rank: 1,
                sz: true,
            },
            TypeAttributes::PUBLIC | TypeAttributes::SEALED,
            Some(array),
        );
        description.virtual_slots = inheritance.vtable.len() as u32;
        Ok(self.register_derived(key, description, inheritance))
    }

    /// The unmanaged pointer to `element` (`element*`)
    ///
    /// # Errors
    /// [`Error::TypeNotFound`] if `element` is unknown.
    pub fn pointer(&self, element: TypeHandle) -> Result<TypeHandle> {
        let element_desc = self.describe(element)?;
        let key = DerivedKey::Pointer(element);
        if let Some(existing) = self.derived.get(&key) {
            return Ok(*existing);
        }

        let handle = self.next_artificial();
        let description = TypeDescription::new(
            handle,
            &element_desc.namespace,
            &format!("{}*", element_desc.name),
            TypeFlavor::Pointer { element },
            TypeAttributes::PUBLIC,
            None,
        );
        Ok(self.register_derived(key, description, Inheritance::default()))
    }

    /// Define a generic parameter at position `index`.
    ///
    /// The first non-interface constraint becomes the base type, `System.Object`
    /// otherwise.
    ///
    /// # Errors
    /// [`Error::TypeNotFound`] for unknown constraints or owner,
    /// [`Error::InvalidOperation`] if `owner` declares fewer than `index + 1` parameters.
    pub fn generic_parameter(
        &self,
        owner: Option<TypeHandle>,
        name: &str,
        index: u32,
        constraints: &[TypeHandle],
    ) -> Result<TypeHandle> {
        if let Some(owner) = owner {
            let owner_desc = self.describe(owner)?;
            if index >= owner_desc.generic_param_count {
                return Err(Error::InvalidOperation(format!(
                    "{} has no generic parameter at position {}",
                    owner_desc.fullname(),
                    index
                )));
            }
        }

        let mut base = None;
        let mut interfaces = Vec::new();
        for &constraint in constraints {
            let described = self.describe(constraint)?;
            if described.is_interface() {
                push_unique(&mut interfaces, constraint);
            } else if base.is_none() {
                base = Some(constraint);
            }
            for inherited in self.interfaces_of(constraint) {
                push_unique(&mut interfaces, inherited);
            }
        }
        let base = base.unwrap_or_else(|| builtin(OBJECT));

        let mut inheritance = self.inheritance(base);
        inheritance.interfaces = interfaces;

        let handle = self.next_artificial();
        let mut description = TypeDescription::new(
            handle,
            "",
            name,
            TypeFlavor::GenericParameter {
                index,
                method: false,
            },
            TypeAttributes::PUBLIC,
            Some(base),
        );
        description.virtual_slots = inheritance.vtable.len() as u32;

        let mut entry = TypeEntry::new(description, inheritance);
        entry.constraints = constraints.to_vec();
        self.types.insert(handle, entry);
        Ok(handle)
    }

    /// Make every lookup of `token` fail with [`Error::MemberNotResolved`]
    pub fn mark_unresolvable(&self, token: Token) {
        self.unresolvable.insert(token);
    }

    /// Number of member table scans served so far
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of constructor invokers bound so far
    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::Relaxed)
    }

    /// Number of instantiation requests served so far
    pub fn instantiate_count(&self) -> usize {
        self.instantiations.load(Ordering::Relaxed)
    }

    fn next_type_def(&self) -> TypeHandle {
        let row = self.next_type.fetch_add(1, Ordering::Relaxed);
        TypeHandle::new(Token::from_parts(Token::TYPE_DEF, row))
    }

    fn next_artificial(&self) -> TypeHandle {
        let row = self.next_artificial.fetch_add(1, Ordering::Relaxed);
        TypeHandle::new(Token::from_parts(Token::ARTIFICIAL, row))
    }

    fn next_token(counter: &AtomicU32, table: u8) -> Token {
        Token::from_parts(table, counter.fetch_add(1, Ordering::Relaxed))
    }

    fn inheritance(&self, base: TypeHandle) -> Inheritance {
        self.types
            .get(&base)
            .map(|entry| Inheritance {
                vtable: entry.vtable.clone(),
                interfaces: entry.interfaces.clone(),
            })
            .unwrap_or_default()
    }

    fn interfaces_of(&self, ty: TypeHandle) -> Vec<TypeHandle> {
        self.types
            .get(&ty)
            .map(|entry| entry.interfaces.clone())
            .unwrap_or_default()
    }

    fn register_derived(
        &self,
        key: DerivedKey,
        description: TypeDescription,
        inheritance: Inheritance,
    ) -> TypeHandle {
        let handle = description.handle;
        *self.derived.entry(key).or_insert_with(|| {
            self.types
                .insert(handle, TypeEntry::new(description, inheritance));
            handle
        })
    }

    /// Read the entry holding the member tables of `ty`
    fn with_tables<R>(&self, ty: TypeHandle, read: impl FnOnce(&TypeEntry) -> R) -> Result<R> {
        let canonical = {
            let entry = self
                .types
                .get(&ty)
                .ok_or(Error::TypeNotFound(ty.token()))?;
            entry.description.canonical
        };
        let entry = self
            .types
            .get(&canonical)
            .ok_or(Error::TypeNotFound(canonical.token()))?;
        Ok(read(&entry))
    }

    fn with_member<R>(
        &self,
        ty: TypeHandle,
        token: Token,
        read: impl FnOnce(&MemberEntry) -> Option<R>,
    ) -> Result<R> {
        if !self.types.contains_key(&ty) {
            return Err(Error::TypeNotFound(ty.token()));
        }
        if self.unresolvable.contains(&token) {
            return Err(Error::MemberNotResolved(token));
        }
        self.members
            .get(&token)
            .and_then(|entry| read(&entry))
            .ok_or(Error::MemberNotResolved(token))
    }

    fn instantiate_inner(&self, definition: TypeHandle, args: &[TypeHandle]) -> Result<TypeHandle> {
        let described = self.describe(definition)?;
        if !described.is_generic_definition() {
            return Err(Error::InvalidOperation(format!(
                "{} is not a generic type definition",
                described.fullname()
            )));
        }
        if described.generic_param_count as usize != args.len() {
            return Err(Error::InvalidOperation(format!(
                "{} expects {} generic arguments, got {}",
                described.fullname(),
                described.generic_param_count,
                args.len()
            )));
        }
        for &arg in args {
            self.describe(arg)?;
        }

        let key = DerivedKey::Instantiation(definition, args.to_vec());
        if let Some(existing) = self.derived.get(&key) {
            return Ok(*existing);
        }

        let mut inheritance = self.inheritance(definition);
        let mut interfaces = Vec::with_capacity(inheritance.interfaces.len());
        for interface in std::mem::take(&mut inheritance.interfaces) {
            let interface_desc = self.describe(interface)?;
            if interface_desc.is_generic_definition()
                && interface_desc.generic_param_count as usize == args.len()
            {
                push_unique(&mut interfaces, self.instantiate_inner(interface, args)?);
            } else {
                push_unique(&mut interfaces, interface);
            }
        }
        inheritance.interfaces = interfaces;

        let mut description = (*described).clone();
        description.handle = self.next_artificial();
        description.canonical = definition;
        description.generic_definition = Some(definition);
        description.generic_args = args.to_vec();

        debug!(
            "Instantiated {} over {} argument(s) as {}",
            described.fullname(),
            args.len(),
            description.handle
        );
        Ok(self.register_derived(key, description, inheritance))
    }
}

impl MetadataProvider for InMemoryProvider {
    fn describe(&self, ty: TypeHandle) -> Result<Arc<TypeDescription>> {
        self.types
            .get(&ty)
            .map(|entry| entry.description.clone())
            .ok_or(Error::TypeNotFound(ty.token()))
    }

    fn member_tokens(&self, ty: TypeHandle, table: MemberTable) -> Result<Vec<Token>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.with_tables(ty, |entry| entry.tokens(table).to_vec())
    }

    fn literal_field_tokens(&self, ty: TypeHandle) -> Result<Vec<Token>> {
        self.with_tables(ty, |entry| entry.literals.clone())
    }

    fn member(&self, ty: TypeHandle, token: Token) -> Result<RawMember> {
        self.with_member(ty, token, |entry| match entry {
            MemberEntry::Method { raw, .. }
            | MemberEntry::Field { raw, .. }
            | MemberEntry::Property { raw, .. }
            | MemberEntry::Event { raw, .. } => Some(raw.clone()),
            MemberEntry::Nested { .. } => None,
        })
    }

    fn method_details(&self, ty: TypeHandle, token: Token) -> Result<MethodDetails> {
        self.with_member(ty, token, |entry| match entry {
            MemberEntry::Method { signature, .. } => Some(MethodDetails {
                signature: signature.clone(),
            }),
            _ => None,
        })
    }

    fn field_details(&self, ty: TypeHandle, token: Token) -> Result<FieldDetails> {
        self.with_member(ty, token, |entry| match entry {
            MemberEntry::Field { field_type, .. } => Some(FieldDetails {
                field_type: *field_type,
            }),
            _ => None,
        })
    }

    fn property_details(&self, ty: TypeHandle, token: Token) -> Result<PropertyDetails> {
        self.with_member(ty, token, |entry| match entry {
            MemberEntry::Property { details, .. } => Some(details.clone()),
            _ => None,
        })
    }

    fn event_details(&self, ty: TypeHandle, token: Token) -> Result<EventDetails> {
        self.with_member(ty, token, |entry| match entry {
            MemberEntry::Event { details, .. } => Some(details.clone()),
            _ => None,
        })
    }

    fn resolve_nested_type(&self, ty: TypeHandle, token: Token) -> Result<TypeHandle> {
        self.with_member(ty, token, |entry| match entry {
            MemberEntry::Nested { nested } => Some(*nested),
            _ => None,
        })
    }

    fn interfaces(&self, ty: TypeHandle) -> Result<Vec<TypeHandle>> {
        self.types
            .get(&ty)
            .map(|entry| entry.interfaces.clone())
            .ok_or(Error::TypeNotFound(ty.token()))
    }

    fn generic_constraints(&self, ty: TypeHandle) -> Result<Vec<TypeHandle>> {
        self.types
            .get(&ty)
            .map(|entry| entry.constraints.clone())
            .ok_or(Error::TypeNotFound(ty.token()))
    }

    fn instantiate(&self, definition: TypeHandle, args: &[TypeHandle]) -> Result<TypeHandle> {
        self.instantiations.fetch_add(1, Ordering::Relaxed);
        self.instantiate_inner(definition, args)
    }

    fn well_known_generic(&self, which: WellKnownGeneric) -> Result<Option<TypeHandle>> {
        Ok(Some(match which {
            WellKnownGeneric::IList => builtin(ILIST),
            WellKnownGeneric::IReadOnlyList => builtin(IREADONLY_LIST),
            WellKnownGeneric::IReadOnlyCollection => builtin(IREADONLY_COLLECTION),
        }))
    }

    fn system_object(&self) -> TypeHandle {
        builtin(OBJECT)
    }

    fn bind_constructor(
        &self,
        ty: TypeHandle,
        constructor: Option<Token>,
    ) -> Result<ConstructorInvoker> {
        self.binds.fetch_add(1, Ordering::Relaxed);
        let described = self.describe(ty)?;
        match constructor {
            Some(token) => {
                let is_constructor = self.members.get(&token).is_some_and(|entry| {
                    matches!(&*entry, MemberEntry::Method { raw, .. }
                        if raw.name.as_str() == ConstructorRecord::CONSTRUCTOR_NAME)
                });
                if !is_constructor {
                    return Err(Error::MissingMethod(format!(
                        "{} is not a constructor of {}",
                        token,
                        described.fullname()
                    )));
                }
            }
            None if !described.is_value_type() => {
                return Err(Error::MissingMethod(format!(
                    "no parameterless constructor on {}",
                    described.fullname()
                )));
            }
            None => {}
        }

        let instance = MemoryInstance { ty, constructor };
        Ok(Arc::new(move || Ok(Box::new(instance) as Instance)))
    }
}

fn push_unique(list: &mut Vec<TypeHandle>, handle: TypeHandle) {
    if !list.contains(&handle) {
        list.push(handle);
    }
}

/// Builder for a type definition of [`InMemoryProvider`].
///
/// Methods, fields, properties and events are laid out in the order they are added.
/// Property and event accessors become ordinary `SPECIAL_NAME` methods of the type.
pub struct TypeDefBuilder<'a> {
    provider: &'a InMemoryProvider,
    handle: Option<TypeHandle>,
    namespace: String,
    name: String,
    flavor: TypeFlavor,
    attributes: TypeAttributes,
    public: bool,
    root: bool,
    base: Option<TypeHandle>,
    interfaces: Vec<TypeHandle>,
    enclosing: Option<TypeHandle>,
    generic_params: u32,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    properties: Vec<PropertyDef>,
    events: Vec<EventDef>,
}

impl<'a> TypeDefBuilder<'a> {
    fn new(provider: &'a InMemoryProvider, flavor: TypeFlavor, namespace: &str, name: &str) -> Self {
        TypeDefBuilder {
            provider,
            handle: None,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flavor,
            attributes: TypeAttributes::empty(),
            public: true,
            root: false,
            base: None,
            interfaces: Vec::new(),
            enclosing: None,
            generic_params: 0,
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
        }
    }

    fn root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Sets the base type.
    ///
    /// # Arguments
    ///
    /// * `base` - A previously defined class
    ///
    /// # Returns
    ///
    /// Self for method chaining.
    #[must_use]
    pub fn extends(mut self, base: TypeHandle) -> Self {
        self.base = Some(base);
        self
    }

    /// Adds an implemented interface; the interfaces it inherits are implied
    #[must_use]
    pub fn implements(mut self, interface: TypeHandle) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Nests the type inside `outer`
    #[must_use]
    pub fn nested_in(mut self, outer: TypeHandle) -> Self {
        self.enclosing = Some(outer);
        self
    }

    /// Restricts the visibility to the assembly
    #[must_use]
    pub fn non_public(mut self) -> Self {
        self.public = false;
        self
    }

    /// Marks the type abstract
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.attributes |= TypeAttributes::ABSTRACT;
        self
    }

    /// Marks the type sealed
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.attributes |= TypeAttributes::SEALED;
        self
    }

    /// Makes the type a generic definition with `count` parameters
    #[must_use]
    pub fn generic_params(mut self, count: u32) -> Self {
        self.generic_params = count;
        self
    }

    /// Adds a method or constructor
    #[must_use]
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a field
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a property together with its accessor methods
    #[must_use]
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an event together with its accessor methods
    #[must_use]
    pub fn event(mut self, event: EventDef) -> Self {
        self.events.push(event);
        self
    }

    /// Registers the type with the provider.
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] if the base, an interface or the enclosing type is unknown,
    /// [`Error::InvalidOperation`] if the base is an interface or an implemented type is not.
    pub fn build(self) -> Result<TypeHandle> {
        let provider = self.provider;
        if let Some(base) = self.base {
            if matches!(self.flavor, TypeFlavor::Interface) {
                return Err(Error::InvalidOperation(format!(
                    "interface {} can not extend a type",
                    self.name
                )));
            }
            if provider.describe(base)?.is_interface() {
                return Err(Error::InvalidOperation(format!(
                    "{} can not extend the interface {}",
                    self.name, base
                )));
            }
        }
        for &interface in &self.interfaces {
            if !provider.describe(interface)?.is_interface() {
                return Err(Error::InvalidOperation(format!(
                    "{} can not implement the non-interface {}",
                    self.name, interface
                )));
            }
        }
        if let Some(outer) = self.enclosing {
            provider.describe(outer)?;
        }
        Ok(self.install())
    }

    fn install(self) -> TypeHandle {
        let provider = self.provider;
        let handle = self.handle.unwrap_or_else(|| provider.next_type_def());
        let is_interface = matches!(self.flavor, TypeFlavor::Interface);

        let base = match self.flavor {
            _ if self.root => None,
            TypeFlavor::Interface => None,
            TypeFlavor::ValueType => Some(self.base.unwrap_or_else(|| builtin(VALUE_TYPE))),
            _ => Some(self.base.unwrap_or_else(|| builtin(OBJECT))),
        };
        let inherited = base.map(|b| provider.inheritance(b)).unwrap_or_default();

        let mut interfaces = Vec::new();
        for &declared in &self.interfaces {
            push_unique(&mut interfaces, declared);
            for implied in provider.interfaces_of(declared) {
                push_unique(&mut interfaces, implied);
            }
        }
        for implied in inherited.interfaces {
            push_unique(&mut interfaces, implied);
        }

        // Accessors are laid out after the plain methods
        let mut methods = self.methods;
        let mut properties = Vec::with_capacity(self.properties.len());
        for property in self.properties {
            let getter = property.getter_method().map(|m| push_index(&mut methods, m));
            let setter = property.setter_method().map(|m| push_index(&mut methods, m));
            properties.push((property, getter, setter));
        }
        let mut events = Vec::with_capacity(self.events.len());
        for event in self.events {
            let add = push_index(&mut methods, event.accessor("add"));
            let remove = push_index(&mut methods, event.accessor("remove"));
            let raise = event
                .raise
                .then(|| push_index(&mut methods, event.accessor("raise")));
            events.push((event, add, remove, raise));
        }

        let mut vtable = inherited.vtable;
        let mut method_tokens = Vec::with_capacity(methods.len());
        for method in methods {
            let mut modifiers = method.modifiers;
            if is_interface && !modifiers.contains(MethodModifiers::STATIC) {
                modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
            }
            let parameter_types: Vec<TypeHandle> = method.parameters.iter().map(|p| p.ty).collect();
            let slot = if modifiers.contains(MethodModifiers::VIRTUAL) {
                let reused = if modifiers.contains(MethodModifiers::NEW_SLOT) {
                    None
                } else {
                    vtable
                        .iter()
                        .rposition(|s| s.name == method.name && s.parameters == parameter_types)
                };
                Some(reused.unwrap_or_else(|| {
                    vtable.push(VirtualSlot {
                        name: method.name.clone(),
                        parameters: parameter_types,
                    });
                    vtable.len() - 1
                }) as u32)
            } else {
                None
            };

            let mut calling_convention = method.calling_convention;
            if !modifiers.contains(MethodModifiers::STATIC) {
                calling_convention |= CallingConventions::HAS_THIS;
            }

            let token = InMemoryProvider::next_token(&provider.next_method, Token::METHOD_DEF);
            provider.members.insert(
                token,
                MemberEntry::Method {
                    raw: RawMember {
                        token,
                        name: MemberName::new(method.name),
                        flags: method.access.bits() | modifiers.bits(),
                        slot,
                    },
                    signature: MethodSignature {
                        calling_convention,
                        return_type: method.return_type,
                        parameters: method.parameters,
                        generic_param_count: 0,
                    },
                },
            );
            method_tokens.push(token);
        }

        let mut field_tokens = Vec::new();
        let mut literal_tokens = Vec::new();
        for field in self.fields {
            let token = InMemoryProvider::next_token(&provider.next_field, Token::FIELD);
            if field.modifiers.contains(FieldModifiers::LITERAL) {
                literal_tokens.push(token);
            } else {
                field_tokens.push(token);
            }
            provider.members.insert(
                token,
                MemberEntry::Field {
                    raw: RawMember {
                        token,
                        name: MemberName::new(field.name),
                        flags: field.access.bits() | field.modifiers.bits(),
                        slot: None,
                    },
                    field_type: field.field_type,
                },
            );
        }

        let mut property_tokens = Vec::with_capacity(properties.len());
        for (property, getter, setter) in properties {
            let token = InMemoryProvider::next_token(&provider.next_property, Token::PROPERTY);
            provider.members.insert(
                token,
                MemberEntry::Property {
                    raw: RawMember {
                        token,
                        name: MemberName::new(property.name),
                        flags: 0,
                        slot: None,
                    },
                    details: PropertyDetails {
                        property_type: property.property_type,
                        index_parameters: property.index_parameters,
                        getter: getter.map(|i| method_tokens[i]),
                        setter: setter.map(|i| method_tokens[i]),
                    },
                },
            );
            property_tokens.push(token);
        }

        let mut event_tokens = Vec::with_capacity(events.len());
        for (event, add, remove, raise) in events {
            let token = InMemoryProvider::next_token(&provider.next_event, Token::EVENT);
            provider.members.insert(
                token,
                MemberEntry::Event {
                    raw: RawMember {
                        token,
                        name: MemberName::new(event.name),
                        flags: 0,
                        slot: None,
                    },
                    details: EventDetails {
                        handler_type: event.handler_type,
                        add: Some(method_tokens[add]),
                        remove: Some(method_tokens[remove]),
                        raise: raise.map(|i| method_tokens[i]),
                    },
                },
            );
            event_tokens.push(token);
        }

        let visibility = match (self.enclosing.is_some(), self.public) {
            (false, true) => TypeAttributes::PUBLIC,
            (false, false) => TypeAttributes::NOT_PUBLIC,
            (true, true) => TypeAttributes::NESTED_PUBLIC,
            (true, false) => TypeAttributes::NESTED_ASSEMBLY,
        };
        let mut flags = visibility | self.attributes;
        if is_interface {
            flags |= TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        }

        let mut description =
            TypeDescription::new(handle, &self.namespace, &self.name, self.flavor, flags, base);
        description.enclosing = self.enclosing;
        description.generic_param_count = self.generic_params;
        description.virtual_slots = vtable.len() as u32;

        let mut entry = TypeEntry::new(description, Inheritance { vtable, interfaces });
        entry.methods = method_tokens;
        entry.fields = field_tokens;
        entry.literals = literal_tokens;
        entry.properties = property_tokens;
        entry.events = event_tokens;
        provider.types.insert(handle, entry);

        if let Some(outer) = self.enclosing {
            let token = InMemoryProvider::next_token(&provider.next_nested, Token::NESTED_CLASS);
            provider
                .members
                .insert(token, MemberEntry::Nested { nested: handle });
            if let Some(mut outer_entry) = provider.types.get_mut(&outer) {
                outer_entry.nested.push(token);
            }
        }

        debug!("Defined {}.{} as {}", self.namespace, self.name, handle);
        handle
    }
}

fn push_index(methods: &mut Vec<MethodDef>, method: MethodDef) -> usize {
    methods.push(method);
    methods.len() - 1
}

/// Definition of a method or constructor
#[derive(Debug, Clone)]
pub struct MethodDef {
    name: String,
    access: MemberAccess,
    modifiers: MethodModifiers,
    parameters: Vec<ParameterInfo>,
    return_type: Option<TypeHandle>,
    calling_convention: CallingConventions,
}

impl MethodDef {
    /// A public instance method returning `void`
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodDef {
            name: name.to_string(),
            access: MemberAccess::Public,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            parameters: Vec::new(),
            return_type: None,
            calling_convention: CallingConventions::STANDARD,
        }
    }

    /// A public instance constructor (`.ctor`)
    #[must_use]
    pub fn constructor() -> Self {
        let mut method = Self::new(ConstructorRecord::CONSTRUCTOR_NAME);
        method.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RT_SPECIAL_NAME;
        method
    }

    /// A private static type initializer (`.cctor`)
    #[must_use]
    pub fn type_initializer() -> Self {
        let mut method = Self::new(ConstructorRecord::TYPE_INITIALIZER_NAME);
        method.access = MemberAccess::Private;
        method.modifiers |= MethodModifiers::STATIC
            | MethodModifiers::SPECIAL_NAME
            | MethodModifiers::RT_SPECIAL_NAME;
        method
    }

    /// Sets the access level
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for `access(MemberAccess::Private)`
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MemberAccess::Private)
    }

    /// Makes the method static
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Makes the method virtual; it overrides an inherited method with the same signature
    #[must_use]
    pub fn virtual_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// Gives a virtual method its own slot instead of overriding
    #[must_use]
    pub fn new_slot(mut self) -> Self {
        self.modifiers |= MethodModifiers::NEW_SLOT;
        self
    }

    /// Makes the method abstract (and virtual)
    #[must_use]
    pub fn abstract_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        self
    }

    /// Marks the method as special (accessors, operators)
    #[must_use]
    pub fn special_name(mut self) -> Self {
        self.modifiers |= MethodModifiers::SPECIAL_NAME;
        self
    }

    /// Appends a required parameter
    #[must_use]
    pub fn param(mut self, ty: TypeHandle) -> Self {
        self.parameters.push(ParameterInfo::new(ty));
        self
    }

    /// Appends an optional parameter
    #[must_use]
    pub fn optional_param(mut self, ty: TypeHandle) -> Self {
        self.parameters.push(ParameterInfo::optional(ty));
        self
    }

    /// Appends a trailing `params` array parameter
    #[must_use]
    pub fn param_array(mut self, array_type: TypeHandle, element: TypeHandle) -> Self {
        self.parameters
            .push(ParameterInfo::param_array(array_type, element));
        self
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, ty: TypeHandle) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Switches to the var-arg calling convention
    #[must_use]
    pub fn vararg(mut self) -> Self {
        self.calling_convention = CallingConventions::VAR_ARGS;
        self
    }
}

/// Definition of a field
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    field_type: TypeHandle,
    access: MemberAccess,
    modifiers: FieldModifiers,
}

impl FieldDef {
    /// A public instance field
    #[must_use]
    pub fn new(name: &str, field_type: TypeHandle) -> Self {
        FieldDef {
            name: name.to_string(),
            field_type,
            access: MemberAccess::Public,
            modifiers: FieldModifiers::empty(),
        }
    }

    /// Sets the access level
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for `access(MemberAccess::Private)`
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MemberAccess::Private)
    }

    /// Makes the field static
    #[must_use]
    pub fn static_field(mut self) -> Self {
        self.modifiers |= FieldModifiers::STATIC;
        self
    }

    /// Makes the field a compile time constant (implies static)
    #[must_use]
    pub fn literal(mut self) -> Self {
        self.modifiers |= FieldModifiers::STATIC | FieldModifiers::LITERAL | FieldModifiers::HAS_DEFAULT;
        self
    }

    /// Makes the field read-only after initialization
    #[must_use]
    pub fn init_only(mut self) -> Self {
        self.modifiers |= FieldModifiers::INIT_ONLY;
        self
    }
}

/// Definition of a property; accessors are named `get_<name>` and `set_<name>`
#[derive(Debug, Clone)]
pub struct PropertyDef {
    name: String,
    property_type: TypeHandle,
    index_parameters: Vec<ParameterInfo>,
    getter: Option<MemberAccess>,
    setter: Option<MemberAccess>,
    is_static: bool,
    is_virtual: bool,
}

impl PropertyDef {
    /// A read-only public instance property
    #[must_use]
    pub fn new(name: &str, property_type: TypeHandle) -> Self {
        PropertyDef {
            name: name.to_string(),
            property_type,
            index_parameters: Vec::new(),
            getter: Some(MemberAccess::Public),
            setter: None,
            is_static: false,
            is_virtual: false,
        }
    }

    /// Adds a public setter
    #[must_use]
    pub fn with_setter(mut self) -> Self {
        self.setter = Some(MemberAccess::Public);
        self
    }

    /// Removes the getter
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.getter = None;
        self.setter.get_or_insert(MemberAccess::Public);
        self
    }

    /// Sets the access level of the getter
    #[must_use]
    pub fn getter_access(mut self, access: MemberAccess) -> Self {
        self.getter = Some(access);
        self
    }

    /// Sets the access level of the setter, adding one if needed
    #[must_use]
    pub fn setter_access(mut self, access: MemberAccess) -> Self {
        self.setter = Some(access);
        self
    }

    /// Appends an index parameter, turning the property into an indexer
    #[must_use]
    pub fn index(mut self, ty: TypeHandle) -> Self {
        self.index_parameters.push(ParameterInfo::new(ty));
        self
    }

    /// Makes the accessors static
    #[must_use]
    pub fn static_property(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Makes the accessors virtual
    #[must_use]
    pub fn virtual_property(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    fn accessor(&self, prefix: &str, access: MemberAccess) -> MethodDef {
        let mut method = MethodDef::new(&format!("{}_{}", prefix, self.name))
            .access(access)
            .special_name();
        if self.is_static {
            method = method.static_method();
        }
        if self.is_virtual {
            method = method.virtual_method();
        }
        method.parameters = self.index_parameters.clone();
        method
    }

    fn getter_method(&self) -> Option<MethodDef> {
        self.getter
            .map(|access| self.accessor("get", access).returns(self.property_type))
    }

    fn setter_method(&self) -> Option<MethodDef> {
        self.setter
            .map(|access| self.accessor("set", access).param(self.property_type))
    }
}

/// Definition of an event; accessors are named `add_<name>`, `remove_<name>` and `raise_<name>`
#[derive(Debug, Clone)]
pub struct EventDef {
    name: String,
    handler_type: TypeHandle,
    access: MemberAccess,
    is_static: bool,
    is_virtual: bool,
    raise: bool,
}

impl EventDef {
    /// A public instance event with add and remove accessors
    #[must_use]
    pub fn new(name: &str, handler_type: TypeHandle) -> Self {
        EventDef {
            name: name.to_string(),
            handler_type,
            access: MemberAccess::Public,
            is_static: false,
            is_virtual: false,
            raise: false,
        }
    }

    /// Sets the access level of all accessors
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for `access(MemberAccess::Private)`
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MemberAccess::Private)
    }

    /// Makes the accessors static
    #[must_use]
    pub fn static_event(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Makes the accessors virtual
    #[must_use]
    pub fn virtual_event(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Adds a raise accessor
    #[must_use]
    pub fn with_raise(mut self) -> Self {
        self.raise = true;
        self
    }

    fn accessor(&self, prefix: &str) -> MethodDef {
        let mut method = MethodDef::new(&format!("{}_{}", prefix, self.name))
            .access(self.access)
            .special_name();
        if prefix != "raise" {
            method = method.param(self.handler_type);
        }
        if self.is_static {
            method = method.static_method();
        }
        if self.is_virtual {
            method = method.virtual_method();
        }
        method
    }
}
