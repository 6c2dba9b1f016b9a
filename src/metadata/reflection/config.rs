//! Configuration of the reflection cache.

/// How population treats two same-named, same-signature properties whose accessors
/// differ in accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyAmbiguity {
    /// Keep both properties and record the pair; single-result lookups that hit the pair
    /// fail with [`crate::Error::AmbiguousMatch`]
    #[default]
    Reject,
    /// Keep only the most derived property, as if the accessors matched
    MostDerivedWins,
}

/// Configuration for the reflection cache
///
/// Controls how population reacts to imperfect metadata and how eagerly the internal
/// tables are sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// Treatment of ambiguous property pairs (default: `Reject`)
    pub property_ambiguity: PropertyAmbiguity,

    /// Drop a member whose token the provider cannot resolve instead of failing the
    /// whole query (default: true)
    pub drop_unresolvable_members: bool,

    /// Run [`crate::metadata::reflection::BindingFlags::validate`] on every query mask
    /// (default: false)
    pub validate_binding_flags: bool,

    /// Maximum length of a base type chain before it is treated as a cycle (default: 512)
    pub max_hierarchy_depth: usize,

    /// Initial entry capacity of per-definition instantiation tables (default: 4)
    pub instantiation_table_capacity: usize,

    /// Initial entry capacity of the per-kind name indices (default: 4)
    pub name_index_capacity: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            property_ambiguity: PropertyAmbiguity::Reject,
            drop_unresolvable_members: true,
            validate_binding_flags: false,
            max_hierarchy_depth: 512,
            instantiation_table_capacity: 4,
            name_index_capacity: 4,
        }
    }
}

impl ReflectionConfig {
    /// Creates a strict configuration
    ///
    /// Unresolvable members fail the query, binding masks are validated and ambiguous
    /// properties are rejected.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            property_ambiguity: PropertyAmbiguity::Reject,
            drop_unresolvable_members: false,
            validate_binding_flags: true,
            max_hierarchy_depth: 256,
            ..Self::default()
        }
    }

    /// Creates a lenient configuration
    ///
    /// Unresolvable members are dropped and ambiguous properties resolve to the most
    /// derived declaration.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            property_ambiguity: PropertyAmbiguity::MostDerivedWins,
            drop_unresolvable_members: true,
            validate_binding_flags: false,
            max_hierarchy_depth: 4096,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = ReflectionConfig::default();
        assert_eq!(default.property_ambiguity, PropertyAmbiguity::Reject);
        assert!(default.drop_unresolvable_members);
        assert!(!default.validate_binding_flags);

        let strict = ReflectionConfig::strict();
        assert!(!strict.drop_unresolvable_members);
        assert!(strict.validate_binding_flags);
        assert!(strict.max_hierarchy_depth < default.max_hierarchy_depth);

        let lenient = ReflectionConfig::lenient();
        assert_eq!(lenient.property_ambiguity, PropertyAmbiguity::MostDerivedWins);
        assert_eq!(lenient.name_index_capacity, default.name_index_capacity);
    }
}
