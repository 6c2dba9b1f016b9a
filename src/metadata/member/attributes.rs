use bitflags::bitflags;

/// Bitmask for `ACCESS` state extraction of method attributes
pub const METHOD_ACCESS_MASK: u32 = 0x0007;
/// Bitmask for `ACCESS` state extraction of field attributes
pub const FIELD_ACCESS_MASK: u32 = 0x0007;

/// Access level of a method, field or accessor, §II.23.1.10 / §II.23.1.5
///
/// The discriminants are the raw values of the access bits, which are laid out the same
/// way for methods and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberAccess {
    /// Member not referenceable
    CompilerControlled = 0,
    /// Accessible only by the parent type
    Private = 1,
    /// Accessible by sub-types only in this Assembly
    FamilyAndAssembly = 2,
    /// Accessibly by anyone in the Assembly
    Assembly = 3,
    /// Accessible only by type and sub-types
    Family = 4,
    /// Accessibly by sub-types anywhere, plus anyone in assembly
    FamilyOrAssembly = 5,
    /// Accessibly by anyone who has visibility to this scope
    Public = 6,
}

impl MemberAccess {
    /// Extract the access level from raw member attributes
    #[must_use]
    pub fn from_flags(flags: u32) -> Self {
        match flags & METHOD_ACCESS_MASK {
            1 => MemberAccess::Private,
            2 => MemberAccess::FamilyAndAssembly,
            3 => MemberAccess::Assembly,
            4 => MemberAccess::Family,
            5 => MemberAccess::FamilyOrAssembly,
            6 => MemberAccess::Public,
            _ => MemberAccess::CompilerControlled,
        }
    }

    /// The raw attribute bits of this access level
    #[must_use]
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Returns `true` for [`MemberAccess::Public`]
    #[must_use]
    pub fn is_public(self) -> bool {
        self == MemberAccess::Public
    }

    /// Returns `true` for members that are invisible to derived types
    #[must_use]
    pub fn is_private(self) -> bool {
        matches!(
            self,
            MemberAccess::Private | MemberAccess::CompilerControlled
        )
    }

    /// Returns `true` for assembly-only access that is not widened by `family`
    #[must_use]
    pub fn is_non_protected_internal(self) -> bool {
        self == MemberAccess::Assembly
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method modifiers and properties
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method can only be overriden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, dpending upon the name of the method
        const RT_SPECIAL_NAME = 0x1000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field modifiers and properties, §II.23.1.5
    pub struct FieldModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field does not have to be serialized when type is remoted
        const NOT_SERIALIZED = 0x0080;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime should check name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Field has default
        const HAS_DEFAULT = 0x8000;
    }
}

impl FieldModifiers {
    /// Extract field modifiers from raw field attributes
    #[must_use]
    pub fn from_field_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & !FIELD_ACCESS_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_roundtrip() {
        for access in [
            MemberAccess::CompilerControlled,
            MemberAccess::Private,
            MemberAccess::FamilyAndAssembly,
            MemberAccess::Assembly,
            MemberAccess::Family,
            MemberAccess::FamilyOrAssembly,
            MemberAccess::Public,
        ] {
            assert_eq!(MemberAccess::from_flags(access.bits()), access);
        }
        // Modifier bits never leak into the access level
        assert_eq!(
            MemberAccess::from_flags(0x0040 | 0x0006),
            MemberAccess::Public
        );
    }

    #[test]
    fn test_access_predicates() {
        assert!(MemberAccess::Public.is_public());
        assert!(MemberAccess::Private.is_private());
        assert!(MemberAccess::CompilerControlled.is_private());
        assert!(!MemberAccess::Family.is_private());
        assert!(MemberAccess::Assembly.is_non_protected_internal());
        assert!(!MemberAccess::FamilyOrAssembly.is_non_protected_internal());
    }

    #[test]
    fn test_modifier_extraction() {
        let raw = 0x0006 | 0x0040 | 0x0100 | 0x0800;
        let modifiers = MethodModifiers::from_method_flags(raw);
        assert!(modifiers.contains(MethodModifiers::VIRTUAL));
        assert!(modifiers.contains(MethodModifiers::NEW_SLOT));
        assert!(modifiers.contains(MethodModifiers::SPECIAL_NAME));
        assert!(!modifiers.contains(MethodModifiers::STATIC));

        let field = FieldModifiers::from_field_flags(0x0001 | 0x0010 | 0x0040);
        assert!(field.contains(FieldModifiers::STATIC | FieldModifiers::LITERAL));
        assert!(!field.contains(FieldModifiers::INIT_ONLY));
    }
}
