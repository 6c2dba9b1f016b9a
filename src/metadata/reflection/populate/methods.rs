use std::sync::Arc;

use crate::{
    metadata::{
        member::{MemberAccess, MethodModifiers},
        reflection::{
            filter::NameFilter,
            kindcache::Population,
            populate::{Populate, PopulateContext},
            provider::MemberTable,
            records::MethodRecord,
        },
        typesystem::TypeDescription,
    },
    utils::SlotSet,
    Result,
};

impl Populate for MethodRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let reflected = ctx.reflected();
        if reflected.is_interface() {
            let mut members = Vec::new();
            scan_level(ctx, reflected, 0, filter, None, &mut members)?;
            return Ok(ctx.finish(Population::new(members)));
        }

        let levels = ctx.hierarchy()?;
        let mut slots = SlotSet::new(ctx.slot_count(&levels)?);
        let mut members = Vec::new();
        for (depth, level) in levels.iter().enumerate() {
            scan_level(ctx, level, depth, filter, Some(&mut slots), &mut members)?;
        }
        Ok(ctx.finish(Population::new(members)))
    }
}

fn scan_level(
    ctx: &PopulateContext<'_>,
    level: &TypeDescription,
    depth: usize,
    filter: &NameFilter,
    mut slots: Option<&mut SlotSet>,
    members: &mut Vec<Arc<MethodRecord>>,
) -> Result<()> {
    let provider = ctx.provider();
    for token in provider.member_tokens(level.handle, MemberTable::Method)? {
        let Some(raw) = ctx.resolve(provider.member(level.handle, token))? else {
            continue;
        };

        let modifiers = MethodModifiers::from_method_flags(raw.flags);
        if modifiers.contains(MethodModifiers::RT_SPECIAL_NAME) || !filter.matches_name(&raw.name)
        {
            continue;
        }

        let access = MemberAccess::from_flags(raw.flags);
        let in_slot_range = raw.slot.is_some_and(|slot| slot < level.virtual_slots);
        let is_virtual = modifiers.contains(MethodModifiers::VIRTUAL) && in_slot_range;

        // Unboxing stubs of value types live outside the slot range
        if level.is_value_type()
            && modifiers.intersects(MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT)
            && !in_slot_range
        {
            continue;
        }

        match (&mut slots, raw.slot) {
            (Some(slots), Some(slot)) if is_virtual => {
                let slot = slot as usize;
                if slots.covers(slot) && !slots.mark(slot) {
                    continue;
                }
            }
            _ => {
                if depth > 0 && access.is_private() {
                    continue;
                }
            }
        }

        let Some(details) = ctx.resolve(provider.method_details(level.handle, token))? else {
            continue;
        };

        members.push(Arc::new(MethodRecord {
            token,
            name: raw.name,
            declaring_type: level.handle,
            reflected_type: ctx.reflected().handle,
            access,
            modifiers,
            slot: if is_virtual { raw.slot } else { None },
            signature: details.signature,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        metadata::reflection::{BindingFlags, InMemoryProvider, MethodDef, ReflectionContext},
        test::fixtures::hierarchy,
    };
    use std::sync::Arc;

    #[test]
    fn test_override_is_reported_once() {
        let fixture = hierarchy();
        let context = ReflectionContext::new(fixture.provider.clone());
        let methods = context
            .get_type(fixture.derived)
            .unwrap()
            .methods(BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap();

        let describe: Vec<_> = methods.iter().filter(|m| m.name.as_str() == "Describe").collect();
        assert_eq!(describe.len(), 1);
        assert_eq!(describe[0].declaring_type, fixture.middle);
        assert_eq!(describe[0].reflected_type, fixture.derived);
    }

    #[test]
    fn test_private_base_methods_are_hidden() {
        let fixture = hierarchy();
        let context = ReflectionContext::new(fixture.provider.clone());
        let all = BindingFlags::PUBLIC
            | BindingFlags::NON_PUBLIC
            | BindingFlags::INSTANCE
            | BindingFlags::STATIC;

        let derived = context.get_type(fixture.derived).unwrap().methods(all).unwrap();
        assert!(!derived.iter().any(|m| m.name.as_str() == "Secret"));

        let base = context.get_type(fixture.base).unwrap().methods(all).unwrap();
        assert!(base.iter().any(|m| m.name.as_str() == "Secret"));
    }

    #[test]
    fn test_constructors_are_not_methods() {
        let provider = Arc::new(InMemoryProvider::new());
        let ty = provider
            .class("Demo", "Plain")
            .method(MethodDef::constructor())
            .method(MethodDef::new("Run"))
            .build()
            .unwrap();
        let context = ReflectionContext::new(provider);
        let methods = context
            .get_type(ty)
            .unwrap()
            .methods(BindingFlags::PUBLIC | BindingFlags::INSTANCE | BindingFlags::DECLARED_ONLY)
            .unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.as_str(), "Run");
    }

    #[test]
    fn test_new_slot_hides_nothing() {
        let provider = Arc::new(InMemoryProvider::new());
        let base = provider
            .class("Demo", "Base")
            .method(MethodDef::new("Run").virtual_method())
            .build()
            .unwrap();
        let derived = provider
            .class("Demo", "Derived")
            .extends(base)
            .method(MethodDef::new("Run").virtual_method().new_slot())
            .build()
            .unwrap();
        let context = ReflectionContext::new(provider);
        let methods = context
            .get_type(derived)
            .unwrap()
            .methods_named("Run", BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].declaring_type, derived);
        assert_eq!(methods[1].declaring_type, base);
    }
}
