use std::fmt;
use std::hash::{Hash, Hasher};

/// A metadata token representing a reference to a metadata table entry.
///
/// Tokens in .NET metadata consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
///
/// Types that have no row of their own (arrays, pointers, instantiations, generic
/// parameters) are identified through artificial tokens whose table byte is
/// [`Token::ARTIFICIAL`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Table id of `TypeDef` rows
    pub const TYPE_DEF: u8 = 0x02;
    /// Table id of `Field` rows
    pub const FIELD: u8 = 0x04;
    /// Table id of `MethodDef` rows
    pub const METHOD_DEF: u8 = 0x06;
    /// Table id of `Event` rows
    pub const EVENT: u8 = 0x14;
    /// Table id of `Property` rows
    pub const PROPERTY: u8 = 0x17;
    /// Table id of `NestedClass` rows
    pub const NESTED_CLASS: u8 = 0x29;
    /// Table id used for tokens that do not point into any metadata table
    pub const ARTIFICIAL: u8 = 0xF0;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row index
    ///
    /// Only the low 24 bits of `row` are used.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (row 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }

    /// Returns true if the token does not point into a metadata table
    #[must_use]
    pub fn is_artificial(&self) -> bool {
        self.table() == Self::ARTIFICIAL
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_parts() {
        let token = Token::from_parts(Token::METHOD_DEF, 1);
        assert_eq!(token.value(), 0x06000001);
        assert_eq!(token.table(), Token::METHOD_DEF);
        assert_eq!(token.row(), 1);

        let truncated = Token::from_parts(Token::FIELD, 0x0100_0002);
        assert_eq!(truncated.row(), 2);
        assert_eq!(truncated.table(), Token::FIELD);
    }

    #[test]
    fn test_token_null_and_artificial() {
        assert!(Token::new(0).is_null());
        assert!(Token::from_parts(Token::TYPE_DEF, 0).is_null());
        assert!(!Token::from_parts(Token::TYPE_DEF, 3).is_null());

        let artificial = Token::from_parts(Token::ARTIFICIAL, 0x20);
        assert!(artificial.is_artificial());
        assert!(!Token::from_parts(Token::METHOD_DEF, 0x20).is_artificial());
    }

    #[test]
    fn test_token_formatting() {
        let token = Token(0x06000001);
        assert_eq!(format!("{token}"), "0x06000001");
        assert_eq!(
            format!("{token:?}"),
            "Token(0x06000001, table: 0x06, row: 1)"
        );
    }

    #[test]
    fn test_token_conversions_and_hash() {
        let token: Token = 0x17000004.into();
        let raw: u32 = token.into();
        assert_eq!(raw, 0x17000004);

        let mut set = HashSet::new();
        set.insert(Token(0x17000004));
        set.insert(Token(0x17000004));
        set.insert(Token(0x14000004));
        assert_eq!(set.len(), 2);
    }
}
