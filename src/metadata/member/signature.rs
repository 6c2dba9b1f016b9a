use bitflags::bitflags;

use crate::metadata::typesystem::TypeHandle;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Calling conventions a method can be declared with, or a query can ask for
    pub struct CallingConventions: u32 {
        /// The default managed calling convention
        const STANDARD = 0x0001;
        /// Accepts a variable argument list after the declared parameters
        const VAR_ARGS = 0x0002;
        /// Either of the above (queries only)
        const ANY = Self::STANDARD.bits() | Self::VAR_ARGS.bits();
        /// Instance method, receives `this`
        const HAS_THIS = 0x0020;
        /// `this` is passed as an explicit first parameter
        const EXPLICIT_THIS = 0x0040;
    }
}

/// A declared parameter of a method, constructor or indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// The declared parameter type
    pub ty: TypeHandle,
    /// Has a default value and may be omitted by callers
    pub is_optional: bool,
    /// Element type of a trailing `params` array, if this parameter is one
    pub param_array_element: Option<TypeHandle>,
}

impl ParameterInfo {
    /// A plain, required parameter
    #[must_use]
    pub fn new(ty: TypeHandle) -> Self {
        ParameterInfo {
            ty,
            is_optional: false,
            param_array_element: None,
        }
    }

    /// A parameter that may be omitted
    #[must_use]
    pub fn optional(ty: TypeHandle) -> Self {
        ParameterInfo {
            ty,
            is_optional: true,
            param_array_element: None,
        }
    }

    /// A trailing `params` array of type `array_type` with elements of type `element`
    #[must_use]
    pub fn param_array(array_type: TypeHandle, element: TypeHandle) -> Self {
        ParameterInfo {
            ty: array_type,
            is_optional: false,
            param_array_element: Some(element),
        }
    }

    /// Returns `true` if this parameter is a `params` array
    #[must_use]
    pub fn is_param_array(&self) -> bool {
        self.param_array_element.is_some()
    }
}

/// Invocation shape of a method or constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// The declared calling convention
    pub calling_convention: CallingConventions,
    /// The return type, `None` for `void`
    pub return_type: Option<TypeHandle>,
    /// The declared parameters, in order
    pub parameters: Vec<ParameterInfo>,
    /// Number of generic parameters of a generic method
    pub generic_param_count: u32,
}

impl MethodSignature {
    /// A standard calling convention signature without parameters
    #[must_use]
    pub fn new(return_type: Option<TypeHandle>, parameters: Vec<ParameterInfo>) -> Self {
        MethodSignature {
            calling_convention: CallingConventions::STANDARD,
            return_type,
            parameters,
            generic_param_count: 0,
        }
    }

    /// Iterate the declared parameter types
    pub fn parameter_types(&self) -> impl Iterator<Item = TypeHandle> + '_ {
        self.parameters.iter().map(|p| p.ty)
    }

    /// Returns `true` if both signatures declare the same parameter types in the same order
    #[must_use]
    pub fn same_parameters(&self, other: &MethodSignature) -> bool {
        self.parameters.len() == other.parameters.len()
            && self.parameter_types().eq(other.parameter_types())
    }

    /// Returns `true` if the parameter types equal `types` exactly
    #[must_use]
    pub fn matches_exactly(&self, types: &[TypeHandle]) -> bool {
        self.parameters.len() == types.len() && self.parameter_types().eq(types.iter().copied())
    }

    /// Returns `true` if the method accepts a variable argument list
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.calling_convention
            .contains(CallingConventions::VAR_ARGS)
    }

    /// The trailing `params` array parameter, if any
    #[must_use]
    pub fn param_array(&self) -> Option<&ParameterInfo> {
        self.parameters.last().filter(|p| p.is_param_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    fn ty(row: u32) -> TypeHandle {
        TypeHandle::new(Token::from_parts(Token::TYPE_DEF, row))
    }

    #[test]
    fn test_same_parameters() {
        let a = MethodSignature::new(None, vec![ParameterInfo::new(ty(1))]);
        let b = MethodSignature::new(Some(ty(9)), vec![ParameterInfo::optional(ty(1))]);
        let c = MethodSignature::new(None, vec![ParameterInfo::new(ty(2))]);

        assert!(a.same_parameters(&b));
        assert!(!a.same_parameters(&c));
        assert!(a.matches_exactly(&[ty(1)]));
        assert!(!a.matches_exactly(&[ty(1), ty(1)]));
    }

    #[test]
    fn test_param_array_and_vararg() {
        let mut sig = MethodSignature::new(
            None,
            vec![
                ParameterInfo::new(ty(1)),
                ParameterInfo::param_array(ty(3), ty(2)),
            ],
        );
        assert_eq!(sig.param_array().map(|p| p.param_array_element), Some(Some(ty(2))));
        assert!(!sig.is_vararg());

        sig.calling_convention = CallingConventions::VAR_ARGS;
        assert!(sig.is_vararg());
        assert!(CallingConventions::ANY.contains(CallingConventions::VAR_ARGS));
    }
}
