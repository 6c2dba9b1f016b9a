use bitflags::bitflags;

use crate::metadata::typesystem::TypeHandle;

/// Bitmask for the visibility bits of `TypeAttributes`
pub const TYPE_VISIBILITY_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Type attributes, §II.23.1.15
    pub struct TypeAttributes: u32 {
        /// Type is not visible outside its assembly
        const NOT_PUBLIC = 0x0000;
        /// Type is visible everywhere
        const PUBLIC = 0x0001;
        /// Nested type with public visibility
        const NESTED_PUBLIC = 0x0002;
        /// Nested type with private visibility
        const NESTED_PRIVATE = 0x0003;
        /// Nested type visible to the enclosing type and its sub-types
        const NESTED_FAMILY = 0x0004;
        /// Nested type visible inside the assembly
        const NESTED_ASSEMBLY = 0x0005;
        /// Type is an interface
        const INTERFACE = 0x0020;
        /// Type is abstract
        const ABSTRACT = 0x0080;
        /// Type can not be derived from
        const SEALED = 0x0100;
        /// Type name is special
        const SPECIAL_NAME = 0x0400;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0800;
        /// Type initializer may run lazily
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

impl TypeAttributes {
    /// The visibility bits of the attributes
    #[must_use]
    pub fn visibility(self) -> u32 {
        self.bits() & TYPE_VISIBILITY_MASK
    }

    /// Returns `true` for top-level public types and nested public types
    #[must_use]
    pub fn is_visible(self) -> bool {
        matches!(
            self.visibility(),
            v if v == Self::PUBLIC.bits() || v == Self::NESTED_PUBLIC.bits()
        )
    }
}

/// The shape of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFlavor {
    /// Reference type
    Class,
    /// Value type (struct or enum)
    ValueType,
    /// Interface
    Interface,
    /// Array of `element`
    Array {
        /// The element type
        element: TypeHandle,
        /// The rank (number of dimensions)
        rank: u32,
        /// Single dimension with zero lower bound (`T[]`)
        sz: bool,
    },
    /// Unmanaged pointer to `element`
    Pointer {
        /// The pointee
        element: TypeHandle,
    },
    /// Managed reference to `element`
    ByRef {
        /// The referenced type
        element: TypeHandle,
    },
    /// An unresolved generic parameter
    GenericParameter {
        /// Position in the owner's parameter list
        index: u32,
        /// Owned by a method (true) or a type (false)
        method: bool,
    },
}

/// Everything the reflection cache needs to know about the shape of one type.
///
/// Descriptions are produced by the metadata provider and are immutable. For types that
/// share a canonical representation (instantiations of one generic definition) the member
/// tables are read through `canonical`, while `handle` stays the identity of the
/// concrete type.
#[derive(Debug, Clone)]
pub struct TypeDescription {
    /// Identity of the described type
    pub handle: TypeHandle,
    /// `TypeNamespace` (can be empty, e.g. for nested types)
    pub namespace: String,
    /// `TypeName`
    pub name: String,
    /// The shape of the type
    pub flavor: TypeFlavor,
    /// Attributes (a 4-byte bitmask of type `TypeAttributes`, §II.23.1.15)
    pub flags: TypeAttributes,
    /// The base type aka 'extends'; `None` for `System.Object`, interfaces and pointers
    pub base: Option<TypeHandle>,
    /// The enclosing type of a nested type
    pub enclosing: Option<TypeHandle>,
    /// The shared representation whose member tables describe this type
    pub canonical: TypeHandle,
    /// The generic definition this type instantiates
    pub generic_definition: Option<TypeHandle>,
    /// Generic arguments of an instantiation
    pub generic_args: Vec<TypeHandle>,
    /// Number of generic parameters of a generic definition
    pub generic_param_count: u32,
    /// Number of virtual dispatch slots of the type's method table
    pub virtual_slots: u32,
}

impl TypeDescription {
    /// Create a description of a plain, non-generic, non-nested type
    #[must_use]
    pub fn new(
        handle: TypeHandle,
        namespace: &str,
        name: &str,
        flavor: TypeFlavor,
        flags: TypeAttributes,
        base: Option<TypeHandle>,
    ) -> Self {
        TypeDescription {
            handle,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flavor,
            flags,
            base,
            enclosing: None,
            canonical: handle,
            generic_definition: None,
            generic_args: Vec::new(),
            generic_param_count: 0,
            virtual_slots: 0,
        }
    }

    /// Returns `true` if this type is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Interface)
    }

    /// Returns `true` if this type is a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(self.flavor, TypeFlavor::ValueType)
    }

    /// Returns `true` if this type is an unresolved generic parameter
    #[must_use]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(self.flavor, TypeFlavor::GenericParameter { .. })
    }

    /// Returns `true` if this type is an unmanaged pointer
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Pointer { .. })
    }

    /// Returns `true` if this type is an array of any rank
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Array { .. })
    }

    /// Returns `true` for single-dimension, zero-based arrays (`T[]`)
    #[must_use]
    pub fn is_sz_array(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Array { sz: true, .. })
    }

    /// Returns `true` if the type is marked abstract (interfaces always are)
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeAttributes::ABSTRACT) || self.is_interface()
    }

    /// Returns `true` if this type is an open generic definition
    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        self.generic_param_count > 0 && self.generic_definition.is_none()
    }

    /// Returns `true` if this type instantiates a generic definition
    #[must_use]
    pub fn is_instantiation(&self) -> bool {
        self.generic_definition.is_some()
    }

    /// Returns `true` if the members of this type are read through a shared representation
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.canonical != self.handle
    }

    /// The element type of arrays, pointers and by-refs
    #[must_use]
    pub fn element_type(&self) -> Option<TypeHandle> {
        match self.flavor {
            TypeFlavor::Array { element, .. }
            | TypeFlavor::Pointer { element }
            | TypeFlavor::ByRef { element } => Some(element),
            _ => None,
        }
    }

    /// Returns the full name (Namespace.Name) of the entity
    ///
    /// Nested types are not prefixed with their enclosing type here; use
    /// [`crate::metadata::reflection::TypeReflectionCache::full_name`] for that.
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{0}.{1}", self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    fn handle(row: u32) -> TypeHandle {
        TypeHandle::new(Token::from_parts(Token::TYPE_DEF, row))
    }

    #[test]
    fn test_description_shapes() {
        let element = handle(1);
        let mut array = TypeDescription::new(
            handle(2),
            "System",
            "Int32[]",
            TypeFlavor::Array {
                element,
                rank: 1,
                sz: true,
            },
            TypeAttributes::PUBLIC | TypeAttributes::SEALED,
            None,
        );
        assert!(array.is_array());
        assert!(array.is_sz_array());
        assert_eq!(array.element_type(), Some(element));
        assert!(!array.is_shared());

        array.canonical = handle(3);
        assert!(array.is_shared());

        let iface = TypeDescription::new(
            handle(4),
            "Demo",
            "IThing",
            TypeFlavor::Interface,
            TypeAttributes::PUBLIC | TypeAttributes::INTERFACE,
            None,
        );
        assert!(iface.is_interface());
        assert!(iface.is_abstract());
        assert_eq!(iface.fullname(), "Demo.IThing");
    }

    #[test]
    fn test_generic_shapes() {
        let mut definition = TypeDescription::new(
            handle(5),
            "Demo",
            "Box`1",
            TypeFlavor::Class,
            TypeAttributes::PUBLIC,
            None,
        );
        definition.generic_param_count = 1;
        assert!(definition.is_generic_definition());
        assert!(!definition.is_instantiation());

        let mut instance = definition.clone();
        instance.handle = handle(6);
        instance.generic_definition = Some(definition.handle);
        instance.generic_args = vec![handle(1)];
        assert!(!instance.is_generic_definition());
        assert!(instance.is_instantiation());
    }

    #[test]
    fn test_visibility() {
        assert!(TypeAttributes::PUBLIC.is_visible());
        assert!(TypeAttributes::NESTED_PUBLIC.is_visible());
        assert!(!TypeAttributes::NESTED_PRIVATE.is_visible());
        assert!(!(TypeAttributes::NESTED_ASSEMBLY | TypeAttributes::SEALED).is_visible());
    }
}
