use std::sync::Arc;

use crate::{
    metadata::{
        member::{FieldModifiers, MemberAccess},
        reflection::{
            filter::NameFilter,
            kindcache::Population,
            populate::{Populate, PopulateContext},
            provider::MemberTable,
            records::FieldRecord,
        },
        typesystem::{TypeDescription, TypeHandle},
    },
    Result,
};

impl Populate for FieldRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let mut levels = ctx.hierarchy()?;
        let reflected = ctx.reflected();

        if reflected.is_generic_parameter() {
            let provider = ctx.provider();
            let mut seen: Vec<TypeHandle> = levels.iter().map(|l| l.handle).collect();
            for constraint in provider.generic_constraints(reflected.handle)? {
                let described = provider.describe(constraint)?;
                let mut candidates = Vec::new();
                if described.is_interface() {
                    candidates.push(constraint);
                }
                candidates.extend(provider.interfaces(constraint)?);

                for interface in candidates {
                    if !seen.contains(&interface) {
                        seen.push(interface);
                        levels.push(provider.describe(interface)?);
                    }
                }
            }
        }

        let mut members = Vec::new();
        for (depth, level) in levels.iter().enumerate() {
            // Generic parameters own no fields; every level is inherited
            let inherited = depth > 0 || reflected.is_generic_parameter();
            scan_level(ctx, level, inherited, filter, &mut members)?;
        }
        Ok(ctx.finish(Population::new(members)))
    }
}

fn scan_level(
    ctx: &PopulateContext<'_>,
    level: &TypeDescription,
    inherited: bool,
    filter: &NameFilter,
    members: &mut Vec<Arc<FieldRecord>>,
) -> Result<()> {
    let provider = ctx.provider();
    let mut tokens = provider.member_tokens(level.handle, MemberTable::Field)?;
    tokens.extend(provider.literal_field_tokens(level.handle)?);

    for token in tokens {
        let Some(raw) = ctx.resolve(provider.member(level.handle, token))? else {
            continue;
        };

        let access = MemberAccess::from_flags(raw.flags);
        if (inherited && access.is_private()) || !filter.matches_name(&raw.name) {
            continue;
        }

        let Some(details) = ctx.resolve(provider.field_details(level.handle, token))? else {
            continue;
        };

        let modifiers = FieldModifiers::from_field_flags(raw.flags);
        // Statics of a shared representation live with the concrete instantiation
        let storage_owner = if modifiers.contains(FieldModifiers::STATIC) {
            level.handle
        } else {
            level.canonical
        };

        members.push(Arc::new(FieldRecord {
            token,
            name: raw.name,
            declaring_type: level.handle,
            reflected_type: ctx.reflected().handle,
            access,
            modifiers,
            field_type: details.field_type,
            storage_owner,
        }));
    }
    Ok(())
}
