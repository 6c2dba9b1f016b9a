use std::sync::Arc;

use crate::{
    metadata::{
        reflection::{
            filter::{MemberName, NameFilter},
            kindcache::Population,
            populate::{Populate, PopulateContext},
            provider::WellKnownGeneric,
            records::InterfaceRecord,
        },
        typesystem::TypeHandle,
    },
    Result,
};

/// Interfaces every `T[]` implements in addition to those of `System.Array`
const SZ_ARRAY_INTERFACES: [WellKnownGeneric; 3] = [
    WellKnownGeneric::IList,
    WellKnownGeneric::IReadOnlyList,
    WellKnownGeneric::IReadOnlyCollection,
];

impl Populate for InterfaceRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let provider = ctx.provider();
        let reflected = ctx.reflected();

        let mut interfaces: Vec<TypeHandle> = Vec::new();

        if reflected.is_generic_parameter() {
            for constraint in provider.generic_constraints(reflected.handle)? {
                if provider.describe(constraint)?.is_interface() {
                    push_unique(&mut interfaces, constraint);
                }
                for interface in provider.interfaces(constraint)? {
                    push_unique(&mut interfaces, interface);
                }
            }
        } else {
            for interface in provider.interfaces(reflected.handle)? {
                push_unique(&mut interfaces, interface);
            }
        }

        if let (true, Some(element)) = (reflected.is_sz_array(), reflected.element_type()) {
            if !provider.describe(element)?.is_pointer() {
                for which in SZ_ARRAY_INTERFACES {
                    let Some(definition) = provider.well_known_generic(which)? else {
                        continue;
                    };
                    let instantiated = ctx.context().make_generic_type(definition, &[element])?;
                    push_unique(&mut interfaces, instantiated);
                    if which == WellKnownGeneric::IList {
                        for inherited in provider.interfaces(instantiated)? {
                            push_unique(&mut interfaces, inherited);
                        }
                    }
                }
            }
        }

        let mut members = Vec::new();
        for interface in interfaces {
            let described = provider.describe(interface)?;
            let name = MemberName::new(described.name.as_str());
            if !filter.matches_name(&name) {
                continue;
            }
            members.push(Arc::new(InterfaceRecord {
                interface,
                name,
                namespace: described.namespace.clone(),
                reflected_type: reflected.handle,
                flags: described.flags,
            }));
        }
        Ok(ctx.finish(Population::new(members)))
    }
}

fn push_unique(list: &mut Vec<TypeHandle>, handle: TypeHandle) {
    if !list.contains(&handle) {
        list.push(handle);
    }
}
