use std::{collections::HashMap, sync::Arc};

use crate::{
    metadata::reflection::{
        config::PropertyAmbiguity,
        filter::NameFilter,
        kindcache::Population,
        populate::{Populate, PopulateContext},
        provider::MemberTable,
        records::PropertyRecord,
    },
    utils::SlotSet,
    Result,
};

impl Populate for PropertyRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let provider = ctx.provider();
        let reflected = ctx.reflected();
        let policy = ctx.config().property_ambiguity;

        let levels = if reflected.is_interface() {
            vec![reflected.clone()]
        } else {
            ctx.hierarchy()?
        };
        let mut slots = SlotSet::new(ctx.slot_count(&levels)?);

        let mut population = Population::<PropertyRecord>::default();
        // Name -> (depth, index) of every property kept so far
        let mut seen: HashMap<String, Vec<(usize, usize)>> = HashMap::new();

        for (depth, level) in levels.iter().enumerate() {
            for token in provider.member_tokens(level.handle, MemberTable::Property)? {
                let Some(raw) = ctx.resolve(provider.member(level.handle, token))? else {
                    continue;
                };
                if !filter.matches_name(&raw.name) {
                    continue;
                }
                let Some(details) = ctx.resolve(provider.property_details(level.handle, token))?
                else {
                    continue;
                };

                let record = PropertyRecord {
                    token,
                    name: raw.name,
                    declaring_type: level.handle,
                    reflected_type: reflected.handle,
                    property_type: details.property_type,
                    index_parameters: details.index_parameters,
                    getter: ctx.accessor(level, details.getter)?,
                    setter: ctx.accessor(level, details.setter)?,
                };

                if depth > 0 && record.all_accessors_private() {
                    continue;
                }

                if let Some(slot) = record.dedup_slot() {
                    let slot = slot as usize;
                    if slots.covers(slot) && !slots.mark(slot) {
                        continue;
                    }
                }

                let mut hidden = false;
                let mut conflicts = Vec::new();
                if let Some(previous) = seen.get(record.name.as_str()) {
                    for &(seen_depth, index) in previous {
                        let existing = &population.members[index];
                        if seen_depth >= depth || !existing.same_signature(&record) {
                            continue;
                        }
                        if existing.has_matching_accessibility(&record)
                            || policy == PropertyAmbiguity::MostDerivedWins
                        {
                            hidden = true;
                            break;
                        }
                        conflicts.push(index);
                    }
                }
                if hidden {
                    continue;
                }

                let index = population.members.len();
                seen.entry(record.name.as_str().to_string())
                    .or_default()
                    .push((depth, index));
                population.members.push(Arc::new(record));
                population
                    .ambiguous
                    .extend(conflicts.into_iter().map(|other| (other, index)));
            }
        }
        Ok(ctx.finish(population))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        metadata::{
            member::MemberAccess,
            typesystem::TypeHandle,
            reflection::{
                BindingFlags, InMemoryProvider, PropertyAmbiguity, PropertyDef,
                ReflectionConfig, ReflectionContext,
            },
        },
        Error,
    };
    use std::sync::Arc;

    fn shadowed(provider: &InMemoryProvider, setter: MemberAccess) -> (TypeHandle, TypeHandle) {
        let int = provider.int32_type();
        let base = provider
            .class("Demo", "Base")
            .property(PropertyDef::new("Value", int).with_setter())
            .build()
            .unwrap();
        let derived = provider
            .class("Demo", "Derived")
            .extends(base)
            .property(PropertyDef::new("Value", int).with_setter().setter_access(setter))
            .build()
            .unwrap();
        (base, derived)
    }

    #[test]
    fn test_same_accessibility_hides_base() {
        let provider = Arc::new(InMemoryProvider::new());
        let (_, derived) = shadowed(&provider, MemberAccess::Public);
        let context = ReflectionContext::new(provider);
        let runtime = context.get_type(derived).unwrap();

        let value = runtime
            .property("Value", BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap()
            .unwrap();
        assert_eq!(value.declaring_type, derived);
        assert_eq!(
            runtime
                .properties(BindingFlags::PUBLIC | BindingFlags::INSTANCE)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_differing_accessibility_is_ambiguous() {
        let provider = Arc::new(InMemoryProvider::new());
        let (base, derived) = shadowed(&provider, MemberAccess::Private);
        let context = ReflectionContext::new(provider);
        let runtime = context.get_type(derived).unwrap();

        let all = runtime
            .properties(BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|p| p.declaring_type == base));

        assert!(matches!(
            runtime.property("Value", BindingFlags::PUBLIC | BindingFlags::INSTANCE),
            Err(Error::AmbiguousMatch(_))
        ));
    }

    #[test]
    fn test_most_derived_wins_policy() {
        let provider = Arc::new(InMemoryProvider::new());
        let (_, derived) = shadowed(&provider, MemberAccess::Private);
        let config = ReflectionConfig {
            property_ambiguity: PropertyAmbiguity::MostDerivedWins,
            ..ReflectionConfig::default()
        };
        let context = ReflectionContext::with_config(provider, config);
        let value = context
            .get_type(derived)
            .unwrap()
            .property("Value", BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap()
            .unwrap();
        assert_eq!(value.declaring_type, derived);
    }

    #[test]
    fn test_virtual_override_is_reported_once() {
        let provider = Arc::new(InMemoryProvider::new());
        let int = provider.int32_type();
        let base = provider
            .class("Demo", "Shape")
            .property(PropertyDef::new("Area", int).virtual_property())
            .build()
            .unwrap();
        let derived = provider
            .class("Demo", "Square")
            .extends(base)
            .property(PropertyDef::new("Area", int).virtual_property())
            .build()
            .unwrap();
        let context = ReflectionContext::new(provider);
        let props = context
            .get_type(derived)
            .unwrap()
            .properties(BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].declaring_type, derived);
    }
}
