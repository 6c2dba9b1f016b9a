use std::fmt;

use crate::metadata::token::Token;

/// Opaque identity of a type.
///
/// Two handles are equal if and only if they denote the very same type; nothing about the
/// structure of the type takes part in the comparison. `List<int>` obtained twice from the
/// provider must therefore be the same handle, which is why instantiations are
/// deduplicated (see [`crate::metadata::reflection::RuntimeType::make_generic_type`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(Token);

impl TypeHandle {
    /// Wrap a token as a type handle
    #[must_use]
    pub const fn new(token: Token) -> Self {
        TypeHandle(token)
    }

    /// The token that identifies this type
    #[must_use]
    pub const fn token(&self) -> Token {
        self.0
    }
}

impl From<Token> for TypeHandle {
    fn from(token: Token) -> Self {
        TypeHandle(token)
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.0)
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
