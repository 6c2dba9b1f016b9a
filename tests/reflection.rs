//! Integration tests for member discovery through the public API.
//!
//! Every test builds its types with the in-memory provider and queries them through a
//! fresh `ReflectionContext`, the same way an embedding runtime would.

use memberscope::{metadata::reflection::CONSTRUCTION_CACHE_SIZE, prelude::*, Result};
use std::sync::Arc;

/// A small model of a UI control library:
///
/// ```text
/// Demo.Component            (virtual Name, private Id, protected Initialize)
///   Demo.Control            (overrides Name, Click event, Layout(int) / Layout(object))
///     Demo.Button           (sealed, overrides Name, nested Demo.Button+Style)
/// ```
struct Controls {
    provider: Arc<InMemoryProvider>,
    component: TypeHandle,
    control: TypeHandle,
    button: TypeHandle,
    style: TypeHandle,
}

fn controls() -> Result<Controls> {
    let provider = Arc::new(InMemoryProvider::new());
    let int = provider.int32_type();
    let string = provider.string_type();
    let object = provider.object_type();

    let handler = provider.class("Demo", "EventHandler").sealed().build()?;

    let component = provider
        .class("Demo", "Component")
        .abstract_type()
        .method(MethodDef::constructor().access(MemberAccess::Family))
        .method(MethodDef::new("Initialize").access(MemberAccess::Family))
        .property(PropertyDef::new("Name", string).virtual_property())
        .field(FieldDef::new("id", int).private())
        .field(FieldDef::new("Version", int).static_field().literal())
        .build()?;

    let control = provider
        .class("Demo", "Control")
        .extends(component)
        .method(MethodDef::constructor())
        .method(MethodDef::new("Layout").param(int))
        .method(MethodDef::new("Layout").param(object))
        .method(MethodDef::new("Reset").static_method())
        .property(PropertyDef::new("Name", string).virtual_property())
        .event(EventDef::new("Click", handler))
        .build()?;

    let button = provider
        .class("Demo", "Button")
        .extends(control)
        .sealed()
        .method(MethodDef::constructor())
        .method(MethodDef::constructor().param(string))
        .property(PropertyDef::new("Name", string).virtual_property())
        .build()?;

    let style = provider
        .class("Demo", "Style")
        .nested_in(button)
        .build()?;

    Ok(Controls {
        provider,
        component,
        control,
        button,
        style,
    })
}

const PUBLIC_INSTANCE: BindingFlags = BindingFlags::PUBLIC.union(BindingFlags::INSTANCE);

#[test]
fn test_named_and_complete_queries_share_records() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());
    let button = context.get_type(fixture.button)?;

    let named = button.methods_named("Layout", PUBLIC_INSTANCE)?;
    let again = button.methods_named("Layout", PUBLIC_INSTANCE)?;
    assert_eq!(named.len(), 2);
    for (a, b) in named.iter().zip(&again) {
        assert!(Arc::ptr_eq(a, b));
    }

    let all = button.methods(PUBLIC_INSTANCE)?;
    for layout in &named {
        assert!(all.iter().any(|m| Arc::ptr_eq(m, layout)));
    }

    // Once the complete list exists, name queries never go back to the provider
    let scans = fixture.provider.scan_count();
    let initialize = button.methods_named(
        "Initialize",
        BindingFlags::NON_PUBLIC | BindingFlags::INSTANCE,
    )?;
    assert_eq!(initialize.len(), 1);
    assert_eq!(fixture.provider.scan_count(), scans);
    Ok(())
}

#[test]
fn test_overrides_are_reported_at_the_most_derived_level() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());
    let button = context.get_type(fixture.button)?;

    let names: Vec<_> = button
        .properties(PUBLIC_INSTANCE)?
        .into_iter()
        .filter(|p| p.name() == "Name")
        .collect();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].declaring_type, fixture.button);
    assert_eq!(names[0].reflected_type, fixture.button);

    let getters: Vec<_> = button
        .methods_named("get_Name", PUBLIC_INSTANCE)?
        .into_iter()
        .collect();
    assert_eq!(getters.len(), 1);
    assert_eq!(getters[0].declaring_type, fixture.button);

    let control = context.get_type(fixture.control)?;
    let name = control.property("Name", PUBLIC_INSTANCE)?.unwrap();
    assert_eq!(name.declaring_type, fixture.control);
    Ok(())
}

#[test]
fn test_visibility_and_static_filters() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());
    let button = context.get_type(fixture.button)?;
    let all_instance = BindingFlags::PUBLIC | BindingFlags::NON_PUBLIC | BindingFlags::INSTANCE;

    // Inherited private fields are invisible, protected methods are not
    assert!(button.field("id", all_instance)?.is_none());
    assert!(button.method("Initialize", all_instance)?.is_some());
    assert!(button.method("Initialize", PUBLIC_INSTANCE)?.is_none());

    // Inherited statics need FLATTEN_HIERARCHY
    let statics = BindingFlags::PUBLIC | BindingFlags::STATIC;
    assert!(button.method("Reset", statics)?.is_none());
    let reset = button
        .method("Reset", statics | BindingFlags::FLATTEN_HIERARCHY)?
        .unwrap();
    assert_eq!(reset.declaring_type, fixture.control);

    let version = button
        .field("Version", statics | BindingFlags::FLATTEN_HIERARCHY)?
        .unwrap();
    assert!(version.is_literal());
    assert_eq!(version.declaring_type, fixture.component);

    // DECLARED_ONLY strips everything inherited
    let declared = button.methods(PUBLIC_INSTANCE | BindingFlags::DECLARED_ONLY)?;
    assert!(declared.iter().all(|m| m.declaring_type == fixture.button));
    assert!(declared.iter().any(|m| m.name() == "get_Name"));
    Ok(())
}

#[test]
fn test_case_insensitive_lookup() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());
    let control = context.get_type(fixture.control)?;

    assert!(control.event("click", PUBLIC_INSTANCE)?.is_none());
    let click = control
        .event("click", PUBLIC_INSTANCE | BindingFlags::IGNORE_CASE)?
        .unwrap();
    assert_eq!(click.name(), "Click");

    let button = context.get_type(fixture.button)?;
    let inherited = button.event("Click", PUBLIC_INSTANCE)?.unwrap();
    assert_eq!(inherited.declaring_type, fixture.control);
    Ok(())
}

#[test]
fn test_overload_resolution() -> Result<()> {
    let fixture = controls()?;
    let provider = fixture.provider.clone();
    let context = ReflectionContext::new(fixture.provider);
    let control = context.get_type(fixture.control)?;
    let any = CallingConventions::ANY;

    assert!(matches!(
        control.method("Layout", PUBLIC_INSTANCE),
        Err(Error::AmbiguousMatch(_))
    ));

    let exact = control
        .method_with("Layout", PUBLIC_INSTANCE, any, &[provider.int32_type()])?
        .unwrap();
    assert_eq!(exact.parameters()[0].ty, provider.int32_type());

    // A string only fits the object overload
    let widened = control
        .method_with("Layout", PUBLIC_INSTANCE, any, &[provider.string_type()])?
        .unwrap();
    assert_eq!(widened.parameters()[0].ty, provider.object_type());

    assert!(control
        .method_with(
            "Layout",
            PUBLIC_INSTANCE | BindingFlags::EXACT_BINDING,
            any,
            &[provider.string_type()],
        )?
        .is_none());

    // A single candidate still has to accept the arguments
    let button = context.get_type(fixture.button)?;
    assert!(button
        .constructor(PUBLIC_INSTANCE, &[provider.int32_type()])?
        .is_none());
    let with_caption = button
        .constructor(PUBLIC_INSTANCE, &[provider.string_type()])?
        .unwrap();
    assert_eq!(with_caption.parameters().len(), 1);
    Ok(())
}

#[test]
fn test_param_array_binding() -> Result<()> {
    let provider = Arc::new(InMemoryProvider::new());
    let int = provider.int32_type();
    let ints = provider.sz_array(int)?;
    let math = provider
        .class("Demo", "Math")
        .method(MethodDef::new("Sum").static_method().param_array(ints, int))
        .build()?;
    let context = ReflectionContext::new(provider);
    let runtime = context.get_type(math)?;
    let flags = BindingFlags::PUBLIC | BindingFlags::STATIC;

    assert!(runtime
        .method_with("Sum", flags, CallingConventions::ANY, &[int, int, int])?
        .is_none());

    let invoke = flags | BindingFlags::INVOKE_METHOD;
    assert!(runtime
        .method_with("Sum", invoke, CallingConventions::ANY, &[int, int, int])?
        .is_some());
    assert!(runtime
        .method_with("Sum", invoke, CallingConventions::ANY, &[])?
        .is_some());
    assert!(runtime
        .method_with("Sum", invoke, CallingConventions::ANY, &[ints])?
        .is_some());
    Ok(())
}

#[test]
fn test_nested_types_and_names() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());
    let button = context.get_type(fixture.button)?;

    let nested = button.nested_types(BindingFlags::PUBLIC)?;
    assert_eq!(nested.len(), 1);
    let style = button.nested_type("Style", BindingFlags::PUBLIC)?.unwrap();
    assert_eq!(style.nested_type, fixture.style);

    // Nested types are never inherited
    let control = context.get_type(fixture.control)?;
    assert!(control.nested_types(BindingFlags::PUBLIC)?.is_empty());

    let runtime = context.get_type(fixture.style)?;
    assert_eq!(runtime.full_name()?, "Demo.Button+Style");
    assert_eq!(runtime.display_name()?, "Demo.Button.Style");
    Ok(())
}

#[test]
fn test_interfaces_of_generic_instantiations() -> Result<()> {
    let provider = Arc::new(InMemoryProvider::new());
    let int = provider.int32_type();
    let enumerable = provider
        .interface("Demo.Collections", "ISequence`1")
        .generic_params(1)
        .build()?;
    let bag = provider
        .class("Demo.Collections", "Bag`1")
        .generic_params(1)
        .implements(enumerable)
        .build()?;
    let context = ReflectionContext::new(provider.clone());

    let closed = context.get_type(bag)?.make_generic_type(&[int])?;
    let interfaces = closed.interfaces()?;
    assert_eq!(interfaces.len(), 1);
    assert!(Arc::ptr_eq(&interfaces, &closed.interfaces()?));

    let found = closed.interface("Demo.Collections.ISequence`1", false)?.unwrap();
    assert!(context.is_assignable(closed.handle(), found.interface)?);
    assert!(closed.interface("demo.collections.isequence`1", true)?.is_some());
    assert!(closed.interface("Other.ISequence`1", false)?.is_none());
    Ok(())
}

#[test]
fn test_generic_parameters() -> Result<()> {
    let fixture = controls()?;
    let provider = fixture.provider.clone();
    let host = provider.class("Demo", "Host`1").generic_params(1).build()?;
    let parameter = provider.generic_parameter(Some(host), "T", 0, &[fixture.control])?;
    let context = ReflectionContext::new(fixture.provider);
    let runtime = context.get_type(parameter)?;

    assert_eq!(runtime.generic_parameter_constraints()?, vec![fixture.control]);
    assert!(runtime.constructors(PUBLIC_INSTANCE)?.is_empty());
    // Members are those of the class constraint
    assert!(runtime.event("Click", PUBLIC_INSTANCE)?.is_some());
    assert!(matches!(
        runtime.create_instance(true),
        Err(Error::InvalidOperation(_))
    ));

    let control = context.get_type(fixture.control)?;
    assert!(matches!(
        control.generic_parameter_constraints(),
        Err(Error::InvalidOperation(_))
    ));
    Ok(())
}

#[test]
fn test_construction_ring_evicts_oldest() -> Result<()> {
    let provider = Arc::new(InMemoryProvider::new());
    let count = CONSTRUCTION_CACHE_SIZE + 4;
    let types = (0..count)
        .map(|i| {
            provider
                .class("Demo", &format!("Widget{i}"))
                .method(MethodDef::constructor())
                .build()
        })
        .collect::<Result<Vec<_>>>()?;
    let context = ReflectionContext::new(provider.clone());

    for &ty in &types {
        let instance = context.get_type(ty)?.create_instance(false)?;
        assert_eq!(instance.downcast_ref::<MemoryInstance>().unwrap().ty, ty);
    }
    assert_eq!(provider.bind_count(), count);
    assert_eq!(context.construction_cache().len(), CONSTRUCTION_CACHE_SIZE);

    // Recently used types are served without binding again
    let last = types[count - 1];
    context.get_type(last)?.create_instance(false)?;
    assert_eq!(provider.bind_count(), count);

    // The oldest entries were evicted and are rebuilt on demand
    assert!(context.construction_cache().get(types[0]).is_none());
    context.get_type(types[0])?.create_instance(false)?;
    assert_eq!(provider.bind_count(), count + 1);
    assert!(context.construction_cache().get(types[0]).is_some());
    Ok(())
}

#[test]
fn test_create_instance_access_rules() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());

    assert!(matches!(
        context.get_type(fixture.component)?.create_instance(true),
        Err(Error::InvalidOperation(_))
    ));
    let instance = context.get_type(fixture.button)?.create_instance(false)?;
    let instance = instance.downcast_ref::<MemoryInstance>().unwrap();
    assert_eq!(instance.ty, fixture.button);
    Ok(())
}

#[test]
fn test_members_union() -> Result<()> {
    let fixture = controls()?;
    let context = ReflectionContext::new(fixture.provider.clone());
    let control = context.get_type(fixture.control)?;

    let members = control.members(PUBLIC_INSTANCE | BindingFlags::DECLARED_ONLY)?;
    let kinds: Vec<_> = members.iter().map(MemberRecord::kind).collect();
    let first_ctor = kinds.iter().position(|k| *k == MemberKind::Constructor).unwrap();
    let last_method = kinds.iter().rposition(|k| *k == MemberKind::Method).unwrap();
    assert!(last_method < first_ctor);
    assert!(kinds.contains(&MemberKind::Event));
    assert!(kinds.contains(&MemberKind::Property));

    let layout = control.member("Lay*", PUBLIC_INSTANCE)?;
    assert_eq!(layout.len(), 2);

    let statics = control.find_members(
        &[MemberKind::Method, MemberKind::Field],
        BindingFlags::PUBLIC | BindingFlags::STATIC,
        |m| m.name().starts_with('R'),
    )?;
    assert_eq!(statics.len(), 1);
    assert_eq!(statics[0].name(), "Reset");
    Ok(())
}

#[test]
fn test_unresolvable_members_are_dropped_or_reported() -> Result<()> {
    let provider = Arc::new(InMemoryProvider::new());
    let ty = provider
        .class("Demo", "Partial")
        .method(MethodDef::new("Good"))
        .method(MethodDef::new("Broken"))
        .build()?;

    let context = ReflectionContext::new(provider.clone());
    let broken = context
        .get_type(ty)?
        .method("Broken", PUBLIC_INSTANCE)?
        .unwrap()
        .token;
    provider.mark_unresolvable(broken);

    let lenient = ReflectionContext::new(provider.clone());
    let methods = lenient
        .get_type(ty)?
        .methods(PUBLIC_INSTANCE | BindingFlags::DECLARED_ONLY)?;
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].name(), "Good");

    let strict = ReflectionContext::with_config(provider, ReflectionConfig::strict());
    assert!(matches!(
        strict
            .get_type(ty)?
            .methods(PUBLIC_INSTANCE | BindingFlags::DECLARED_ONLY),
        Err(Error::MemberNotResolved(_))
    ));
    Ok(())
}
