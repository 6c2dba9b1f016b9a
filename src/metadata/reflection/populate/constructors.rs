use std::sync::Arc;

use crate::{
    metadata::{
        member::{MemberAccess, MethodModifiers},
        reflection::{
            filter::NameFilter,
            kindcache::Population,
            populate::{Populate, PopulateContext},
            provider::MemberTable,
            records::{ConstructorRecord, MethodRecord},
        },
    },
    Result,
};

impl Populate for ConstructorRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let reflected = ctx.reflected();
        if reflected.is_generic_parameter() {
            return Ok(Population::default());
        }

        let provider = ctx.provider();
        let mut members = Vec::new();
        for token in provider.member_tokens(reflected.handle, MemberTable::Method)? {
            let Some(raw) = ctx.resolve(provider.member(reflected.handle, token))? else {
                continue;
            };

            let modifiers = MethodModifiers::from_method_flags(raw.flags);
            let name = raw.name.as_str();
            if !modifiers.contains(MethodModifiers::RT_SPECIAL_NAME)
                || (name != ConstructorRecord::CONSTRUCTOR_NAME
                    && name != ConstructorRecord::TYPE_INITIALIZER_NAME)
                || !filter.matches_name(&raw.name)
            {
                continue;
            }

            let Some(details) = ctx.resolve(provider.method_details(reflected.handle, token))?
            else {
                continue;
            };

            members.push(Arc::new(ConstructorRecord {
                method: MethodRecord {
                    token,
                    name: raw.name,
                    declaring_type: reflected.handle,
                    reflected_type: reflected.handle,
                    access: MemberAccess::from_flags(raw.flags),
                    modifiers,
                    slot: None,
                    signature: details.signature,
                },
            }));
        }
        Ok(ctx.finish(Population::new(members)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        metadata::reflection::{BindingFlags, InMemoryProvider, MethodDef, ReflectionContext},
        test::fixtures::hierarchy,
    };
    use std::sync::Arc;

    #[test]
    fn test_only_declared_constructors() {
        let fixture = hierarchy();
        let context = ReflectionContext::new(fixture.provider.clone());
        let ctors = context
            .get_type(fixture.derived)
            .unwrap()
            .constructors(BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC | BindingFlags::INSTANCE)
            .unwrap();
        assert!(ctors.iter().all(|c| c.method.declaring_type == fixture.derived));
        assert_eq!(ctors.len(), 1);
    }

    #[test]
    fn test_type_initializer() {
        let provider = Arc::new(InMemoryProvider::new());
        let ty = provider
            .class("Demo", "WithCctor")
            .method(MethodDef::constructor())
            .method(MethodDef::type_initializer())
            .build()
            .unwrap();
        let context = ReflectionContext::new(provider);
        let runtime = context.get_type(ty).unwrap();

        let cctor = runtime.type_initializer().unwrap().unwrap();
        assert!(cctor.is_type_initializer());

        let instance_ctors = runtime
            .constructors(BindingFlags::PUBLIC | BindingFlags::INSTANCE)
            .unwrap();
        assert_eq!(instance_ctors.len(), 1);
        assert!(!instance_ctors[0].is_type_initializer());
    }
}
