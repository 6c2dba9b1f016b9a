use std::{collections::HashSet, sync::Arc};

use crate::{
    metadata::reflection::{
        filter::{MatchMode, NameFilter},
        kindcache::Population,
        populate::{Populate, PopulateContext},
        provider::MemberTable,
        records::EventRecord,
    },
    Result,
};

impl Populate for EventRecord {
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>> {
        let provider = ctx.provider();
        let reflected = ctx.reflected();
        let levels = if reflected.is_interface() {
            vec![reflected.clone()]
        } else {
            ctx.hierarchy()?
        };

        // A case-sensitive name can only match once per level; the first hit hides the rest
        let stop_at_first_match = filter.mode() == MatchMode::CaseSensitive && filter.is_indexed();

        let mut members = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        for (depth, level) in levels.iter().enumerate() {
            let mut level_names = Vec::new();
            for token in provider.member_tokens(level.handle, MemberTable::Event)? {
                let Some(raw) = ctx.resolve(provider.member(level.handle, token))? else {
                    continue;
                };
                if !filter.matches_name(&raw.name) || names.contains(raw.name.as_str()) {
                    continue;
                }
                let Some(details) = ctx.resolve(provider.event_details(level.handle, token))?
                else {
                    continue;
                };

                let record = EventRecord {
                    token,
                    name: raw.name,
                    declaring_type: level.handle,
                    reflected_type: reflected.handle,
                    handler_type: details.handler_type,
                    add: ctx.accessor(level, details.add)?,
                    remove: ctx.accessor(level, details.remove)?,
                    raise: ctx.accessor(level, details.raise)?,
                };
                if depth > 0 && record.all_accessors_private() {
                    continue;
                }

                level_names.push(record.name.as_str().to_string());
                members.push(Arc::new(record));
            }

            if stop_at_first_match && !level_names.is_empty() {
                break;
            }
            names.extend(level_names);
        }
        Ok(ctx.finish(Population::new(members)))
    }
}

#[cfg(test)]
mod tests {
    use crate::metadata::reflection::{
        BindingFlags, EventDef, InMemoryProvider, ReflectionContext,
    };
    use std::sync::Arc;

    #[test]
    fn test_events_are_hidden_by_name() {
        let provider = Arc::new(InMemoryProvider::new());
        let handler = provider.class("System", "EventHandler").build().unwrap();
        let base = provider
            .class("Demo", "Button")
            .event(EventDef::new("Click", handler))
            .event(EventDef::new("Hover", handler))
            .event(EventDef::new("Internal", handler).private())
            .build()
            .unwrap();
        let derived = provider
            .class("Demo", "FancyButton")
            .extends(base)
            .event(EventDef::new("Click", handler))
            .build()
            .unwrap();

        let context = ReflectionContext::new(provider);
        let runtime = context.get_type(derived).unwrap();
        let flags = BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC | BindingFlags::INSTANCE;

        let events = runtime.events(flags).unwrap();
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Click", "Hover"]);
        assert_eq!(events[0].declaring_type, derived);

        let click = runtime.event("Click", flags).unwrap().unwrap();
        assert!(Arc::ptr_eq(&click, &events[0]));

        let hover = runtime.event("hover", flags | BindingFlags::IGNORE_CASE).unwrap().unwrap();
        assert_eq!(hover.declaring_type, base);
    }
}
