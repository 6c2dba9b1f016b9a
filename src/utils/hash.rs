//! Case-folded name hashing.
//!
//! Member names are hashed once when they are read from the metadata provider, and name
//! filters hash their query string once when they are built. A case-insensitive lookup
//! compares these hashes before it compares the strings; equal names always hash equal,
//! so the hash can only reject.

/// FNV-1a 32-bit offset basis
const FNV_OFFSET: u32 = 0x811c_9dc5;
/// FNV-1a 32-bit prime
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash `name` with FNV-1a over its lower-cased characters.
///
/// Folding uses the simple (one-to-one) lowercase mapping of each character, which makes
/// the hash agree with [`eq_ignore_case`].
#[must_use]
pub fn folded_hash(name: &str) -> u32 {
    let mut state = FNV_OFFSET;
    for c in name.chars().map(fold_char) {
        let mut buffer = [0u8; 4];
        for byte in c.encode_utf8(&mut buffer).bytes() {
            state ^= u32::from(byte);
            state = state.wrapping_mul(FNV_PRIME);
        }
    }
    state
}

/// Case-insensitive equality consistent with [`folded_hash`]
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.len() == b.len() && a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars().map(fold_char).eq(b.chars().map(fold_char))
}

/// Lower-case `name` with the same mapping used by [`folded_hash`]
#[must_use]
pub fn fold_case(name: &str) -> String {
    name.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_lowercase();
    }
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        // Multi-character expansions keep the original character
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folded_hash_ignores_case() {
        assert_eq!(folded_hash("ToString"), folded_hash("tostring"));
        assert_eq!(folded_hash("ÄRGER"), folded_hash("ärger"));
        assert_ne!(folded_hash("ToString"), folded_hash("ToStrings"));
        assert_eq!(folded_hash(""), FNV_OFFSET);
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("get_Item", "GET_ITEM"));
        assert!(eq_ignore_case("Straße", "STRAßE"));
        assert!(!eq_ignore_case("Item", "Items"));
        assert_eq!(fold_case("Get_Item"), "get_item");
    }
}
