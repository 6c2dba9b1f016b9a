use std::sync::Arc;

use crate::{
    metadata::reflection::{
        filter::{MemberName, NameFilter},
        kindcache::Population,
        populate::{Populate, PopulateContext},
        provider::MemberTable,
        records::NestedTypeRecord,
    },
    Result,
};

impl Populate for NestedTypeRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let provider = ctx.provider();
        let reflected = ctx.reflected();
        // Instantiations share the nested types of their definition
        let owner = reflected.canonical;

        let mut members = Vec::new();
        for token in provider.member_tokens(owner, MemberTable::NestedType)? {
            let Some(nested) = ctx.resolve(provider.resolve_nested_type(owner, token))? else {
                continue;
            };
            let described = provider.describe(nested)?;
            let name = MemberName::new(described.name.as_str());
            if !filter.matches_name(&name) {
                continue;
            }

            members.push(Arc::new(NestedTypeRecord {
                token,
                name,
                declaring_type: reflected.handle,
                reflected_type: reflected.handle,
                nested_type: nested,
                flags: described.flags,
            }));
        }
        Ok(ctx.finish(Population::new(members)))
    }
}
