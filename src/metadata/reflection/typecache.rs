//! Per-type reflection cache.
//!
//! A [`TypeReflectionCache`] exists once per type identity and owns one lazily created
//! [`MemberKindCache`] per member kind, the derived names of the type and, for generic
//! definitions, the table deduplicating instantiations.

use std::sync::{Arc, OnceLock};

use crate::{
    metadata::{
        reflection::{
            config::ReflectionConfig,
            context::ReflectionContext,
            filter::NameFilter,
            kindcache::{MemberArray, MemberKindCache},
            populate::{Populate, PopulateContext},
            records::{
                ConstructorRecord, EventRecord, FieldRecord, InterfaceRecord, MethodRecord,
                NestedTypeRecord, PropertyRecord,
            },
        },
        typesystem::{TypeDescription, TypeFlavor, TypeHandle},
    },
    utils::AppendSafeTable,
    Result,
};

/// A member kind with its own slot in [`TypeReflectionCache`]
pub trait CachedMember: Populate {
    /// The slot holding the kind cache of this member kind
    fn kind_slot(cache: &TypeReflectionCache) -> &OnceLock<MemberKindCache<Self>>;
}

macro_rules! cached_member {
    ($($record:ty => $field:ident),* $(,)?) => {
        $(
            impl CachedMember for $record {
                fn kind_slot(cache: &TypeReflectionCache) -> &OnceLock<MemberKindCache<Self>> {
                    &cache.$field
                }
            }
        )*
    };
}

cached_member! {
    MethodRecord => methods,
    ConstructorRecord => constructors,
    FieldRecord => fields,
    PropertyRecord => properties,
    EventRecord => events,
    NestedTypeRecord => nested_types,
    InterfaceRecord => interfaces,
}

/// Table mapping generic argument lists to the instantiation handle
pub type InstantiationTable = AppendSafeTable<Box<[TypeHandle]>, TypeHandle>;

/// Reflection cache of a single type identity
pub struct TypeReflectionCache {
    description: Arc<TypeDescription>,
    name_index_capacity: usize,
    instantiation_capacity: usize,
    methods: OnceLock<MemberKindCache<MethodRecord>>,
    constructors: OnceLock<MemberKindCache<ConstructorRecord>>,
    fields: OnceLock<MemberKindCache<FieldRecord>>,
    properties: OnceLock<MemberKindCache<PropertyRecord>>,
    events: OnceLock<MemberKindCache<EventRecord>>,
    nested_types: OnceLock<MemberKindCache<NestedTypeRecord>>,
    interfaces: OnceLock<MemberKindCache<InterfaceRecord>>,
    full_name: OnceLock<String>,
    display_name: OnceLock<String>,
    instantiations: OnceLock<InstantiationTable>,
}

impl TypeReflectionCache {
    /// Create the cache of the type described by `description`
    #[must_use]
    pub fn new(description: Arc<TypeDescription>, config: &ReflectionConfig) -> Self {
        TypeReflectionCache {
            description,
            name_index_capacity: config.name_index_capacity,
            instantiation_capacity: config.instantiation_table_capacity,
            methods: OnceLock::new(),
            constructors: OnceLock::new(),
            fields: OnceLock::new(),
            properties: OnceLock::new(),
            events: OnceLock::new(),
            nested_types: OnceLock::new(),
            interfaces: OnceLock::new(),
            full_name: OnceLock::new(),
            display_name: OnceLock::new(),
            instantiations: OnceLock::new(),
        }
    }

    /// The type identity
    #[must_use]
    pub fn handle(&self) -> TypeHandle {
        self.description.handle
    }

    /// The type description
    #[must_use]
    pub fn description(&self) -> &Arc<TypeDescription> {
        &self.description
    }

    /// The kind cache of `T`, created on first use
    pub fn kind_cache<T: CachedMember>(&self) -> &MemberKindCache<T> {
        T::kind_slot(self).get_or_init(|| MemberKindCache::new(self.name_index_capacity))
    }

    /// Returns `true` if the kind cache of `T` exists
    pub fn has_kind_cache<T: CachedMember>(&self) -> bool {
        T::kind_slot(self).get().is_some()
    }

    /// The members of kind `T` selected by `filter`
    ///
    /// # Errors
    ///
    /// Propagates population and cache errors.
    pub fn get_member_list<T: CachedMember>(
        &self,
        context: &ReflectionContext,
        filter: &NameFilter,
    ) -> Result<MemberArray<T>> {
        self.kind_cache::<T>().get_list(filter, |filter| {
            T::populate(&PopulateContext::new(context, &self.description), filter)
        })
    }

    /// Populate the complete list of every member kind
    ///
    /// # Errors
    ///
    /// Propagates population and cache errors.
    pub fn warm(&self, context: &ReflectionContext) -> Result<()> {
        let all = NameFilter::all();
        self.get_member_list::<MethodRecord>(context, &all)?;
        self.get_member_list::<ConstructorRecord>(context, &all)?;
        self.get_member_list::<FieldRecord>(context, &all)?;
        self.get_member_list::<PropertyRecord>(context, &all)?;
        self.get_member_list::<EventRecord>(context, &all)?;
        self.get_member_list::<NestedTypeRecord>(context, &all)?;
        self.get_member_list::<InterfaceRecord>(context, &all)?;
        Ok(())
    }

    /// The table deduplicating instantiations of this generic definition
    pub fn instantiations(&self) -> &InstantiationTable {
        self.instantiations
            .get_or_init(|| AppendSafeTable::with_capacity(self.instantiation_capacity))
    }

    /// The full name: namespace, enclosing types (`+`), generic arguments and type decorations
    ///
    /// # Errors
    ///
    /// Propagates provider errors for the types the name is composed of.
    pub fn full_name(&self, context: &ReflectionContext) -> Result<String> {
        if let Some(name) = self.full_name.get() {
            return Ok(name.clone());
        }
        let computed = self.compose_name(context, NameStyle::Full)?;
        Ok(self.full_name.get_or_init(|| computed).clone())
    }

    /// A readable name: no arity suffixes, generic arguments in angle brackets
    ///
    /// # Errors
    ///
    /// Propagates provider errors for the types the name is composed of.
    pub fn display_name(&self, context: &ReflectionContext) -> Result<String> {
        if let Some(name) = self.display_name.get() {
            return Ok(name.clone());
        }
        let computed = self.compose_name(context, NameStyle::Display)?;
        Ok(self.display_name.get_or_init(|| computed).clone())
    }

    fn compose_name(&self, context: &ReflectionContext, style: NameStyle) -> Result<String> {
        let desc = &self.description;
        let name_of = |ty: TypeHandle| -> Result<String> {
            let cache = context.cache(ty)?;
            match style {
                NameStyle::Full => cache.full_name(context),
                NameStyle::Display => cache.display_name(context),
            }
        };

        match &desc.flavor {
            TypeFlavor::GenericParameter { .. } => return Ok(desc.name.clone()),
            TypeFlavor::Array { element, rank, sz } => {
                let suffix = if *sz {
                    "[]".to_string()
                } else if *rank <= 1 {
                    "[*]".to_string()
                } else {
                    format!("[{}]", ",".repeat(*rank as usize - 1))
                };
                return Ok(format!("{}{}", name_of(*element)?, suffix));
            }
            TypeFlavor::Pointer { element } => return Ok(format!("{}*", name_of(*element)?)),
            TypeFlavor::ByRef { element } => return Ok(format!("{}&", name_of(*element)?)),
            _ => {}
        }

        if let Some(definition) = desc.generic_definition {
            let base = name_of(definition)?;
            let args = desc
                .generic_args
                .iter()
                .map(|&arg| name_of(arg))
                .collect::<Result<Vec<_>>>()?;
            return Ok(match style {
                NameStyle::Full => format!("{}[{}]", base, args.join(",")),
                NameStyle::Display => format!("{}<{}>", base, args.join(", ")),
            });
        }

        let simple = match style {
            NameStyle::Full => desc.name.as_str(),
            NameStyle::Display => desc
                .name
                .split_once('`')
                .map_or(desc.name.as_str(), |(head, _)| head),
        };

        if let Some(enclosing) = desc.enclosing {
            let separator = match style {
                NameStyle::Full => '+',
                NameStyle::Display => '.',
            };
            return Ok(format!("{}{}{}", name_of(enclosing)?, separator, simple));
        }

        if desc.namespace.is_empty() {
            Ok(simple.to_string())
        } else {
            Ok(format!("{}.{}", desc.namespace, simple))
        }
    }
}

#[derive(Clone, Copy)]
enum NameStyle {
    Full,
    Display,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::reflection::{InMemoryProvider, MethodDef};

    #[test]
    fn test_kind_caches_are_lazy() {
        let provider = Arc::new(InMemoryProvider::new());
        let ty = provider
            .class("Demo", "Lazy")
            .method(MethodDef::new("Run"))
            .build()
            .unwrap();
        let context = ReflectionContext::new(provider);
        let cache = context.cache(ty).unwrap();

        assert!(!cache.has_kind_cache::<MethodRecord>());
        cache
            .get_member_list::<MethodRecord>(&context, &NameFilter::exact("Run"))
            .unwrap();
        assert!(cache.has_kind_cache::<MethodRecord>());
        assert!(!cache.has_kind_cache::<FieldRecord>());

        cache.warm(&context).unwrap();
        assert!(cache.kind_cache::<FieldRecord>().is_complete());
        assert!(cache.kind_cache::<InterfaceRecord>().is_complete());
    }

    #[test]
    fn test_names() {
        let provider = Arc::new(InMemoryProvider::new());
        let int = provider.int32_type();
        let list = provider.class("Demo", "List`1").generic_params(1).build().unwrap();
        let context = ReflectionContext::new(provider.clone());

        let closed = context.make_generic_type(list, &[int]).unwrap();
        let cache = context.cache(closed).unwrap();
        assert_eq!(cache.full_name(&context).unwrap(), "Demo.List`1[System.Int32]");
        assert_eq!(cache.display_name(&context).unwrap(), "Demo.List<System.Int32>");

        let array = provider.sz_array(closed).unwrap();
        assert_eq!(
            context.cache(array).unwrap().display_name(&context).unwrap(),
            "Demo.List<System.Int32>[]"
        );
        let pointer = provider.pointer(int).unwrap();
        assert_eq!(
            context.cache(pointer).unwrap().full_name(&context).unwrap(),
            "System.Int32*"
        );
    }
}
