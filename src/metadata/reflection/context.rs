//! The owner of all per-type caches and the upstream query API.
//!
//! A [`ReflectionContext`] maps type identities to their [`TypeReflectionCache`] and owns
//! the process-wide pieces of state the caches share: the metadata provider, the
//! configuration and the default-constructor ring. [`RuntimeType`] is the thin query
//! surface of a single type; it asks the per-type cache for raw member arrays and layers
//! [`BindingFlags`] filtering and single-result resolution on top.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use log::{debug, trace};
use rayon::prelude::*;

use crate::{
    metadata::{
        member::CallingConventions,
        reflection::{
            binding::{
                filter_apply_base, filter_apply_method_base, select_field, select_invocable,
                select_property, select_unique, BindingFlags,
            },
            config::ReflectionConfig,
            construction::{ConstructionCache, ConstructionEntry},
            filter::{MatchMode, NameFilter},
            kindcache::MemberArray,
            provider::{Instance, MetadataProvider},
            records::{
                ConstructorRecord, EventRecord, FieldRecord, InterfaceRecord, Member, MemberKind,
                MemberRecord, MethodRecord, NestedTypeRecord, PropertyRecord,
            },
            typecache::{CachedMember, TypeReflectionCache},
        },
        typesystem::{TypeDescription, TypeFlavor, TypeHandle},
    },
    utils::eq_ignore_case,
    Error, Result,
};

static GLOBAL: OnceLock<ReflectionContext> = OnceLock::new();

/// Member kinds returned by [`RuntimeType::members`], in result order
const MEMBER_KINDS: [MemberKind; 6] = [
    MemberKind::Method,
    MemberKind::Constructor,
    MemberKind::Property,
    MemberKind::Event,
    MemberKind::Field,
    MemberKind::NestedType,
];

/// The type system as seen by the reflection cache.
///
/// Every type touched by a query gets exactly one [`TypeReflectionCache`], created on
/// first use and kept until [`ReflectionContext::unload`] drops it. Contexts are cheap to
/// share between threads; all methods take `&self`.
///
/// # Examples
///
/// ```rust
/// use memberscope::prelude::*;
/// use std::sync::Arc;
///
/// let provider = Arc::new(InMemoryProvider::new());
/// let int = provider.int32_type();
/// let list = provider.class("Demo", "List`1").generic_params(1).build()?;
///
/// let context = ReflectionContext::new(provider);
/// let first = context.make_generic_type(list, &[int])?;
/// let second = context.make_generic_type(list, &[int])?;
/// assert_eq!(first, second);
/// assert_eq!(context.get_type(first)?.display_name()?, "Demo.List<System.Int32>");
/// # Ok::<(), memberscope::Error>(())
/// ```
pub struct ReflectionContext {
    provider: Arc<dyn MetadataProvider>,
    config: ReflectionConfig,
    caches: DashMap<TypeHandle, Arc<TypeReflectionCache>>,
    construction: ConstructionCache,
}

impl ReflectionContext {
    /// Create a context with the default configuration
    pub fn new<P: MetadataProvider + 'static>(provider: Arc<P>) -> Self {
        Self::with_provider(provider, ReflectionConfig::default())
    }

    /// Create a context with a custom configuration
    pub fn with_config<P: MetadataProvider + 'static>(
        provider: Arc<P>,
        config: ReflectionConfig,
    ) -> Self {
        Self::with_provider(provider, config)
    }

    /// Create a context over an already type-erased provider
    pub fn with_provider(provider: Arc<dyn MetadataProvider>, config: ReflectionConfig) -> Self {
        ReflectionContext {
            provider,
            config,
            caches: DashMap::new(),
            construction: ConstructionCache::new(),
        }
    }

    /// The process-wide context, created through `init` by the first caller
    pub fn global_or_init<F>(init: F) -> &'static ReflectionContext
    where
        F: FnOnce() -> ReflectionContext,
    {
        GLOBAL.get_or_init(init)
    }

    /// The process-wide context, if one was created
    pub fn global() -> Option<&'static ReflectionContext> {
        GLOBAL.get()
    }

    /// The metadata provider
    pub fn provider(&self) -> &dyn MetadataProvider {
        self.provider.as_ref()
    }

    /// The configuration
    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    /// The default-constructor ring
    pub fn construction_cache(&self) -> &ConstructionCache {
        &self.construction
    }

    /// The reflection cache of `ty`, created on first use
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] if the provider does not know `ty`.
    pub fn cache(&self, ty: TypeHandle) -> Result<Arc<TypeReflectionCache>> {
        if let Some(cache) = self.caches.get(&ty) {
            trace!("Type cache hit for {}", ty);
            return Ok(cache.clone());
        }

        let description = self.provider.describe(ty)?;
        let cache = self
            .caches
            .entry(ty)
            .or_insert_with(|| {
                debug!("Creating reflection cache for {}", ty);
                Arc::new(TypeReflectionCache::new(description, &self.config))
            })
            .clone();
        Ok(cache)
    }

    /// Returns `true` if a reflection cache for `ty` exists
    pub fn is_cached(&self, ty: TypeHandle) -> bool {
        self.caches.contains_key(&ty)
    }

    /// Number of types with a reflection cache
    pub fn cached_types(&self) -> usize {
        self.caches.len()
    }

    /// Describe `ty` through the provider
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] if the provider does not know `ty`.
    pub fn describe(&self, ty: TypeHandle) -> Result<Arc<TypeDescription>> {
        self.provider.describe(ty)
    }

    /// The query surface of `ty`
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] if the provider does not know `ty`.
    pub fn get_type(&self, ty: TypeHandle) -> Result<RuntimeType<'_>> {
        Ok(RuntimeType {
            context: self,
            cache: self.cache(ty)?,
        })
    }

    /// Drop the reflection cache of `ty` and its construction entry.
    ///
    /// Records handed out before stay valid; later queries populate a fresh cache.
    /// Returns `true` if a cache existed.
    pub fn unload(&self, ty: TypeHandle) -> bool {
        self.construction.evict(ty);
        let removed = self.caches.remove(&ty).is_some();
        if removed {
            debug!("Unloaded reflection cache of {}", ty);
        }
        removed
    }

    /// Populate every member kind of `types` in parallel
    ///
    /// # Errors
    ///
    /// Returns one of the errors raised while populating.
    pub fn preload(&self, types: &[TypeHandle]) -> Result<()> {
        types
            .par_iter()
            .try_for_each(|&ty| self.cache(ty)?.warm(self))
    }

    /// Instantiate `definition` over `args`; equal argument lists yield the same handle
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] if `definition` is not a generic definition or the
    /// argument count does not match, provider errors otherwise.
    pub fn make_generic_type(
        &self,
        definition: TypeHandle,
        args: &[TypeHandle],
    ) -> Result<TypeHandle> {
        let cache = self.cache(definition)?;
        let described = cache.description();
        if !described.is_generic_definition() {
            return Err(Error::InvalidOperation(format!(
                "{} is not a generic type definition",
                described.fullname()
            )));
        }
        if described.generic_param_count as usize != args.len() {
            return Err(Error::InvalidOperation(format!(
                "{} expects {} generic arguments, got {}",
                described.fullname(),
                described.generic_param_count,
                args.len()
            )));
        }

        let table = cache.instantiations();
        if let Some(existing) = table.get(args) {
            trace!("Instantiation cache hit for {}", definition);
            return Ok(existing);
        }
        let created = self.provider.instantiate(definition, args)?;
        table.get_or_insert(args.into(), created)
    }

    /// The base chain of `ty`, nearest base first
    fn base_chain(&self, ty: TypeHandle) -> Result<Vec<TypeHandle>> {
        let limit = self.config.max_hierarchy_depth;
        let mut chain = Vec::new();
        let mut current = self.describe(ty)?.base;
        while let Some(base) = current {
            if chain.len() >= limit {
                return Err(Error::RecursionLimit(limit));
            }
            chain.push(base);
            current = self.describe(base)?.base;
        }
        Ok(chain)
    }

    /// Number of base types above `ty`
    ///
    /// # Errors
    ///
    /// [`Error::RecursionLimit`] for chains deeper than the configured limit.
    pub fn hierarchy_depth(&self, ty: TypeHandle) -> Result<usize> {
        Ok(self.base_chain(ty)?.len())
    }

    /// Returns `true` if `base` is a proper base type of `ty`
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub fn is_subclass_of(&self, ty: TypeHandle, base: TypeHandle) -> Result<bool> {
        if ty == base {
            return Ok(false);
        }
        Ok(self.base_chain(ty)?.contains(&base))
    }

    /// Returns `true` if a value of type `from` can be passed where `to` is expected
    ///
    /// # Errors
    ///
    /// Propagates provider and population errors.
    pub fn is_assignable(&self, from: TypeHandle, to: TypeHandle) -> Result<bool> {
        if from == to {
            return Ok(true);
        }
        if self.describe(to)?.is_interface() {
            let interfaces = self
                .cache(from)?
                .get_member_list::<InterfaceRecord>(self, &NameFilter::all())?;
            return Ok(interfaces.iter().any(|i| i.interface == to));
        }
        self.is_subclass_of(from, to)
    }
}

/// The query surface of a single type
#[derive(Clone)]
pub struct RuntimeType<'a> {
    context: &'a ReflectionContext,
    cache: Arc<TypeReflectionCache>,
}

impl<'a> RuntimeType<'a> {
    /// The type identity
    pub fn handle(&self) -> TypeHandle {
        self.cache.handle()
    }

    /// The owning context
    pub fn context(&self) -> &'a ReflectionContext {
        self.context
    }

    /// The reflection cache of this type
    pub fn cache(&self) -> &Arc<TypeReflectionCache> {
        &self.cache
    }

    /// The type description
    pub fn description(&self) -> &Arc<TypeDescription> {
        self.cache.description()
    }

    /// The simple name
    pub fn name(&self) -> &str {
        &self.description().name
    }

    /// The namespace, empty for nested types
    pub fn namespace(&self) -> &str {
        &self.description().namespace
    }

    /// The base type
    pub fn base_type(&self) -> Option<TypeHandle> {
        self.description().base
    }

    /// The full name, e.g. `Demo.Outer+Inner` or ``Demo.List`1[System.Int32]``
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub fn full_name(&self) -> Result<String> {
        self.cache.full_name(self.context)
    }

    /// The readable name, e.g. `Demo.List<System.Int32>`
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub fn display_name(&self) -> Result<String> {
        self.cache.display_name(self.context)
    }

    /// Populate every member kind of this type
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn warm(&self) -> Result<()> {
        self.cache.warm(self.context)
    }

    fn check(&self, flags: BindingFlags, kind: MemberKind) -> Result<()> {
        if !self.context.config().validate_binding_flags {
            return Ok(());
        }
        match kind {
            MemberKind::NestedType | MemberKind::Interface => {
                (flags | BindingFlags::STATIC | BindingFlags::INSTANCE).validate()
            }
            _ => flags.validate(),
        }
    }

    fn select<T: CachedMember>(
        &self,
        filter: &NameFilter,
        flags: BindingFlags,
    ) -> Result<Vec<Arc<T>>> {
        self.check(flags, T::KIND)?;
        let handle = self.handle();
        let list = self.cache.get_member_list::<T>(self.context, filter)?;
        Ok(list
            .iter()
            .filter(|member| filter_apply_base(member.as_ref(), flags, handle))
            .cloned()
            .collect())
    }

    /// Methods matching `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors and [`Error::InvalidBindingFlags`] if validation is on.
    pub fn methods(&self, flags: BindingFlags) -> Result<Vec<Arc<MethodRecord>>> {
        self.select(&NameFilter::all(), flags)
    }

    /// Methods named `name` matching `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn methods_named(&self, name: &str, flags: BindingFlags) -> Result<Vec<Arc<MethodRecord>>> {
        self.select(&by_name(name, flags), flags)
    }

    /// The single method named `name`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] if the overloads can not be told apart.
    pub fn method(&self, name: &str, flags: BindingFlags) -> Result<Option<Arc<MethodRecord>>> {
        self.bind_method(name, flags, CallingConventions::ANY, None)
    }

    /// The method named `name` that accepts arguments of types `args`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] if more than one overload fits equally well.
    pub fn method_with(
        &self,
        name: &str,
        flags: BindingFlags,
        calling_convention: CallingConventions,
        args: &[TypeHandle],
    ) -> Result<Option<Arc<MethodRecord>>> {
        self.bind_method(name, flags, calling_convention, Some(args))
    }

    fn bind_method(
        &self,
        name: &str,
        flags: BindingFlags,
        calling_convention: CallingConventions,
        args: Option<&[TypeHandle]>,
    ) -> Result<Option<Arc<MethodRecord>>> {
        let candidates = self
            .methods_named(name, flags)?
            .into_iter()
            .filter(|m| {
                filter_apply_method_base(
                    m.parameters(),
                    m.signature.is_vararg(),
                    flags,
                    calling_convention,
                    args,
                )
            })
            .collect();
        select_invocable(
            self.context,
            candidates,
            args,
            flags,
            MethodRecord::parameters,
            self.handle(),
            name,
        )
    }

    /// Constructors matching `flags`; the type initializer is static
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn constructors(&self, flags: BindingFlags) -> Result<Vec<Arc<ConstructorRecord>>> {
        self.select(&NameFilter::all(), flags)
    }

    /// The constructor accepting arguments of types `args`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] if more than one constructor fits equally well.
    pub fn constructor(
        &self,
        flags: BindingFlags,
        args: &[TypeHandle],
    ) -> Result<Option<Arc<ConstructorRecord>>> {
        let filter = NameFilter::exact(ConstructorRecord::CONSTRUCTOR_NAME);
        let candidates = self
            .select::<ConstructorRecord>(&filter, flags)?
            .into_iter()
            .filter(|c| {
                filter_apply_method_base(
                    c.parameters(),
                    c.signature().is_vararg(),
                    flags,
                    CallingConventions::ANY,
                    Some(args),
                )
            })
            .collect();
        select_invocable(
            self.context,
            candidates,
            Some(args),
            flags,
            ConstructorRecord::parameters,
            self.handle(),
            ConstructorRecord::CONSTRUCTOR_NAME,
        )
    }

    /// The type initializer (`.cctor`)
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn type_initializer(&self) -> Result<Option<Arc<ConstructorRecord>>> {
        let flags = BindingFlags::PUBLIC
            | BindingFlags::NON_PUBLIC
            | BindingFlags::STATIC
            | BindingFlags::DECLARED_ONLY;
        let filter = NameFilter::exact(ConstructorRecord::TYPE_INITIALIZER_NAME);
        select_unique(
            self.select(&filter, flags)?,
            self.handle(),
            ConstructorRecord::TYPE_INITIALIZER_NAME,
        )
    }

    /// Fields matching `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn fields(&self, flags: BindingFlags) -> Result<Vec<Arc<FieldRecord>>> {
        self.select(&NameFilter::all(), flags)
    }

    /// The field named `name`; a field of a derived type hides one of its base
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] for two matches declared by the same type or by
    /// different interfaces only.
    pub fn field(&self, name: &str, flags: BindingFlags) -> Result<Option<Arc<FieldRecord>>> {
        let candidates = self.select(&by_name(name, flags), flags)?;
        select_field(self.context, candidates, self.handle(), name)
    }

    /// Properties matching `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn properties(&self, flags: BindingFlags) -> Result<Vec<Arc<PropertyRecord>>> {
        self.select(&NameFilter::all(), flags)
    }

    /// The property named `name`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] for recorded ambiguous pairs and indistinguishable
    /// indexers.
    pub fn property(&self, name: &str, flags: BindingFlags) -> Result<Option<Arc<PropertyRecord>>> {
        self.bind_property(name, flags, None)
    }

    /// The indexer named `name` taking index arguments of types `index_types`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] if more than one indexer fits equally well.
    pub fn property_with(
        &self,
        name: &str,
        flags: BindingFlags,
        index_types: &[TypeHandle],
    ) -> Result<Option<Arc<PropertyRecord>>> {
        self.bind_property(name, flags, Some(index_types))
    }

    fn bind_property(
        &self,
        name: &str,
        flags: BindingFlags,
        index_types: Option<&[TypeHandle]>,
    ) -> Result<Option<Arc<PropertyRecord>>> {
        let candidates = self
            .select::<PropertyRecord>(&by_name(name, flags), flags)?
            .into_iter()
            .filter(|p| {
                filter_apply_method_base(
                    &p.index_parameters,
                    false,
                    flags,
                    CallingConventions::ANY,
                    index_types,
                )
            })
            .collect();
        select_property(
            self.context,
            self.cache.kind_cache::<PropertyRecord>(),
            candidates,
            index_types,
            flags,
            self.handle(),
            name,
        )
    }

    /// Events matching `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn events(&self, flags: BindingFlags) -> Result<Vec<Arc<EventRecord>>> {
        self.select(&NameFilter::all(), flags)
    }

    /// The event named `name`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] for more than one match.
    pub fn event(&self, name: &str, flags: BindingFlags) -> Result<Option<Arc<EventRecord>>> {
        select_unique(
            self.select(&by_name(name, flags), flags)?,
            self.handle(),
            name,
        )
    }

    /// Directly nested types matching the visibility bits of `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn nested_types(&self, flags: BindingFlags) -> Result<Vec<Arc<NestedTypeRecord>>> {
        self.select(&NameFilter::all(), flags)
    }

    /// The nested type named `name`
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] for more than one match.
    pub fn nested_type(
        &self,
        name: &str,
        flags: BindingFlags,
    ) -> Result<Option<Arc<NestedTypeRecord>>> {
        select_unique(
            self.select(&by_name(name, flags), flags)?,
            self.handle(),
            name,
        )
    }

    /// Every interface the type implements, including inherited ones
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn interfaces(&self) -> Result<MemberArray<InterfaceRecord>> {
        self.cache
            .get_member_list::<InterfaceRecord>(self.context, &NameFilter::all())
    }

    /// The interface named `name`, optionally qualified by its namespace
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMatch`] for more than one match.
    pub fn interface(&self, name: &str, ignore_case: bool) -> Result<Option<Arc<InterfaceRecord>>> {
        let (namespace, simple) = match name.rsplit_once('.') {
            Some((namespace, simple)) => (Some(namespace), simple),
            None => (None, name),
        };
        let mode = if ignore_case {
            MatchMode::CaseInsensitive
        } else {
            MatchMode::CaseSensitive
        };

        let list = self
            .cache
            .get_member_list::<InterfaceRecord>(self.context, &NameFilter::new(Some(simple), mode))?;
        let candidates = list
            .iter()
            .filter(|i| match namespace {
                None => true,
                Some(ns) if ignore_case => eq_ignore_case(&i.namespace, ns),
                Some(ns) => i.namespace == ns,
            })
            .cloned()
            .collect();
        select_unique(candidates, self.handle(), name)
    }

    fn collect(
        &self,
        kind: MemberKind,
        filter: &NameFilter,
        flags: BindingFlags,
        out: &mut Vec<MemberRecord>,
    ) -> Result<()> {
        match kind {
            MemberKind::Method => self.collect_kind::<MethodRecord>(filter, flags, out),
            MemberKind::Constructor => self.collect_kind::<ConstructorRecord>(filter, flags, out),
            MemberKind::Field => self.collect_kind::<FieldRecord>(filter, flags, out),
            MemberKind::Property => self.collect_kind::<PropertyRecord>(filter, flags, out),
            MemberKind::Event => self.collect_kind::<EventRecord>(filter, flags, out),
            MemberKind::NestedType => self.collect_kind::<NestedTypeRecord>(filter, flags, out),
            MemberKind::Interface => self.collect_kind::<InterfaceRecord>(filter, flags, out),
        }
    }

    fn collect_kind<T: CachedMember>(
        &self,
        filter: &NameFilter,
        flags: BindingFlags,
        out: &mut Vec<MemberRecord>,
    ) -> Result<()> {
        out.extend(
            self.select::<T>(filter, flags)?
                .into_iter()
                .map(|member| member.into_record()),
        );
        Ok(())
    }

    /// Members of every kind except interfaces matching `flags`
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn members(&self, flags: BindingFlags) -> Result<Vec<MemberRecord>> {
        let mut out = Vec::new();
        for kind in MEMBER_KINDS {
            self.collect(kind, &NameFilter::all(), flags, &mut out)?;
        }
        Ok(out)
    }

    /// Members named `pattern`; a trailing `*` turns the name into a prefix
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn member(&self, pattern: &str, flags: BindingFlags) -> Result<Vec<MemberRecord>> {
        let filter = NameFilter::parse(pattern, flags.match_mode());
        let mut out = Vec::new();
        for kind in MEMBER_KINDS {
            self.collect(kind, &filter, flags, &mut out)?;
        }
        Ok(out)
    }

    /// Members of the given kinds matching `flags` that `predicate` accepts
    ///
    /// # Errors
    ///
    /// Propagates population errors.
    pub fn find_members<P>(
        &self,
        kinds: &[MemberKind],
        flags: BindingFlags,
        predicate: P,
    ) -> Result<Vec<MemberRecord>>
    where
        P: Fn(&MemberRecord) -> bool,
    {
        let mut out = Vec::new();
        for &kind in kinds {
            self.collect(kind, &NameFilter::all(), flags, &mut out)?;
        }
        out.retain(|member| predicate(member));
        Ok(out)
    }

    /// Like [`RuntimeType::method`], but a missing method is an error
    ///
    /// # Errors
    ///
    /// [`Error::MissingMethod`] if nothing matches, see [`RuntimeType::method`] otherwise.
    pub fn required_method(&self, name: &str, flags: BindingFlags) -> Result<Arc<MethodRecord>> {
        match self.method(name, flags)? {
            Some(method) => Ok(method),
            None => Err(Error::MissingMethod(format!(
                "{}.{}",
                self.full_name()?,
                name
            ))),
        }
    }

    /// Like [`RuntimeType::field`], but a missing field is an error
    ///
    /// # Errors
    ///
    /// [`Error::MissingField`] if nothing matches, see [`RuntimeType::field`] otherwise.
    pub fn required_field(&self, name: &str, flags: BindingFlags) -> Result<Arc<FieldRecord>> {
        match self.field(name, flags)? {
            Some(field) => Ok(field),
            None => Err(Error::MissingField(format!("{}.{}", self.full_name()?, name))),
        }
    }

    /// Like [`RuntimeType::member`], but an empty result is an error
    ///
    /// # Errors
    ///
    /// [`Error::MissingMember`] if nothing matches.
    pub fn required_member(&self, pattern: &str, flags: BindingFlags) -> Result<Vec<MemberRecord>> {
        let found = self.member(pattern, flags)?;
        if found.is_empty() {
            return Err(Error::MissingMember(format!(
                "{}.{}",
                self.full_name()?,
                pattern
            )));
        }
        Ok(found)
    }

    /// Create an instance through the parameterless constructor
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] for abstract types, interfaces, open generic types and
    /// generic parameters, [`Error::MissingMethod`] if there is no parameterless
    /// constructor or it is not public and `non_public` is not set.
    pub fn create_instance(&self, non_public: bool) -> Result<Instance> {
        let ty = self.handle();
        let entry = self
            .context
            .construction
            .get_or_init(ty, || self.construction_entry())?;
        if entry.needs_access_check() && !non_public {
            return Err(Error::MissingMethod(format!(
                "no public parameterless constructor on {}",
                self.full_name()?
            )));
        }
        entry.invoke(self.context.provider())
    }

    fn construction_entry(&self) -> Result<ConstructionEntry> {
        let described = self.description();
        let constructible = !described.is_abstract()
            && !described.is_generic_parameter()
            && !described.is_generic_definition()
            && !matches!(
                described.flavor,
                TypeFlavor::Pointer { .. } | TypeFlavor::ByRef { .. }
            );
        if !constructible {
            return Err(Error::InvalidOperation(format!(
                "can not create an instance of {}",
                self.full_name()?
            )));
        }

        let flags = BindingFlags::PUBLIC
            | BindingFlags::NON_PUBLIC
            | BindingFlags::INSTANCE
            | BindingFlags::DECLARED_ONLY;
        let constructors = self.constructors(flags)?;
        match constructors.iter().find(|c| c.parameters().is_empty()) {
            Some(constructor) => Ok(ConstructionEntry::new(
                self.handle(),
                Some(constructor.token()),
                !constructor.is_public(),
            )),
            None if described.is_value_type() => {
                Ok(ConstructionEntry::new(self.handle(), None, false))
            }
            None => Err(Error::MissingMethod(format!(
                "no parameterless constructor on {}",
                self.full_name()?
            ))),
        }
    }

    /// Instantiate this generic definition over `args`
    ///
    /// # Errors
    ///
    /// See [`ReflectionContext::make_generic_type`].
    pub fn make_generic_type(&self, args: &[TypeHandle]) -> Result<RuntimeType<'a>> {
        let instantiated = self.context.make_generic_type(self.handle(), args)?;
        self.context.get_type(instantiated)
    }

    /// The constraints of this generic parameter
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] if the type is not a generic parameter.
    pub fn generic_parameter_constraints(&self) -> Result<Vec<TypeHandle>> {
        if !self.description().is_generic_parameter() {
            return Err(Error::InvalidOperation(format!(
                "{} is not a generic parameter",
                self.full_name()?
            )));
        }
        self.context.provider().generic_constraints(self.handle())
    }
}

fn by_name(name: &str, flags: BindingFlags) -> NameFilter {
    NameFilter::new(Some(name), flags.match_mode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::reflection::{memory::MemoryInstance, FieldDef, InMemoryProvider, MethodDef},
        test::fixtures::hierarchy,
    };

    #[test]
    fn test_cache_identity_and_unload() {
        let fixture = hierarchy();
        let context = ReflectionContext::new(fixture.provider.clone());

        let first = context.cache(fixture.derived).unwrap();
        let second = context.cache(fixture.derived).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(context.is_cached(fixture.derived));

        let flags = BindingFlags::PUBLIC | BindingFlags::INSTANCE;
        let before = context.get_type(fixture.derived).unwrap().methods(flags).unwrap();
        assert!(context.unload(fixture.derived));
        assert!(!context.unload(fixture.derived));

        let after = context.get_type(fixture.derived).unwrap().methods(flags).unwrap();
        assert_eq!(before.len(), after.len());
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
    }

    #[test]
    fn test_assignability() {
        let fixture = hierarchy();
        let provider = fixture.provider.clone();
        let context = ReflectionContext::new(fixture.provider);
        let object = provider.object_type();

        assert!(context.is_assignable(fixture.derived, fixture.base).unwrap());
        assert!(context.is_assignable(fixture.derived, object).unwrap());
        assert!(!context.is_assignable(fixture.base, fixture.derived).unwrap());
        assert!(context.is_subclass_of(fixture.derived, fixture.middle).unwrap());
        assert!(!context.is_subclass_of(fixture.derived, fixture.derived).unwrap());
        assert_eq!(context.hierarchy_depth(fixture.derived).unwrap(), 3);
        assert_eq!(context.hierarchy_depth(object).unwrap(), 0);

        let int = provider.int32_type();
        let array = provider.sz_array(int).unwrap();
        let list = context
            .make_generic_type(
                context
                    .provider()
                    .well_known_generic(crate::metadata::reflection::WellKnownGeneric::IList)
                    .unwrap()
                    .unwrap(),
                &[int],
            )
            .unwrap();
        assert!(context.is_assignable(array, list).unwrap());
        assert!(context.is_assignable(array, provider.array_type()).unwrap());
    }

    #[test]
    fn test_generic_type_validation() {
        let provider = Arc::new(InMemoryProvider::new());
        let int = provider.int32_type();
        let pair = provider
            .class("Demo", "Pair`2")
            .generic_params(2)
            .build()
            .unwrap();
        let context = ReflectionContext::new(provider.clone());

        assert!(matches!(
            context.make_generic_type(pair, &[int]),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            context.make_generic_type(int, &[int]),
            Err(Error::InvalidOperation(_))
        ));

        let closed = context.make_generic_type(pair, &[int, int]).unwrap();
        for _ in 0..4 {
            assert_eq!(context.make_generic_type(pair, &[int, int]).unwrap(), closed);
        }
        assert_eq!(provider.instantiate_count(), 1);
        assert_eq!(
            context.get_type(closed).unwrap().full_name().unwrap(),
            "Demo.Pair`2[System.Int32,System.Int32]"
        );
    }

    #[test]
    fn test_create_instance() {
        let fixture = hierarchy();
        let provider = fixture.provider.clone();
        let context = ReflectionContext::new(fixture.provider);

        let instance = context
            .get_type(fixture.derived)
            .unwrap()
            .create_instance(false)
            .unwrap();
        let instance = instance.downcast_ref::<MemoryInstance>().unwrap();
        assert_eq!(instance.ty, fixture.derived);
        assert!(instance.constructor.is_some());

        let hidden = provider
            .class("Demo", "Hidden")
            .method(MethodDef::constructor().private())
            .build()
            .unwrap();
        let runtime = context.get_type(hidden).unwrap();
        assert!(matches!(runtime.create_instance(false), Err(Error::MissingMethod(_))));
        assert!(runtime.create_instance(true).is_ok());

        let point = provider
            .value_type("Demo", "Point")
            .field(FieldDef::new("X", provider.int32_type()))
            .build()
            .unwrap();
        let instance = context.get_type(point).unwrap().create_instance(false).unwrap();
        assert_eq!(
            instance.downcast_ref::<MemoryInstance>().unwrap().constructor,
            None
        );

        let abstract_type = provider.class("Demo", "Shape").abstract_type().build().unwrap();
        assert!(matches!(
            context.get_type(abstract_type).unwrap().create_instance(true),
            Err(Error::InvalidOperation(_))
        ));

        let no_default = provider
            .class("Demo", "NeedsArgs")
            .method(MethodDef::constructor().param(provider.int32_type()))
            .build()
            .unwrap();
        assert!(matches!(
            context.get_type(no_default).unwrap().create_instance(true),
            Err(Error::MissingMethod(_))
        ));
    }

    #[test]
    fn test_binding_flag_validation() {
        let fixture = hierarchy();
        let config = ReflectionConfig::strict();
        let context = ReflectionContext::with_config(fixture.provider.clone(), config);
        let runtime = context.get_type(fixture.derived).unwrap();

        assert!(matches!(
            runtime.methods(BindingFlags::PUBLIC),
            Err(Error::InvalidBindingFlags(_))
        ));
        assert!(runtime.nested_types(BindingFlags::PUBLIC).is_ok());

        let lenient = ReflectionContext::new(fixture.provider);
        assert!(lenient
            .get_type(fixture.derived)
            .unwrap()
            .methods(BindingFlags::PUBLIC)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_members_by_prefix() {
        let fixture = hierarchy();
        let context = ReflectionContext::new(fixture.provider.clone());
        let runtime = context.get_type(fixture.derived).unwrap();
        let flags = BindingFlags::PUBLIC | BindingFlags::INSTANCE;

        let all = runtime.members(flags).unwrap();
        assert!(all.iter().any(|m| m.kind() == MemberKind::Constructor));
        assert!(all.iter().any(|m| m.kind() == MemberKind::Field));

        let get = runtime.member("Get*", flags).unwrap();
        assert!(!get.is_empty());
        assert!(get.iter().all(|m| m.name().starts_with("Get")));

        let virtuals = runtime
            .find_members(&[MemberKind::Method], flags, |m| match m {
                MemberRecord::Method(method) => method.is_virtual(),
                _ => false,
            })
            .unwrap();
        assert!(virtuals.iter().any(|m| m.name() == "Describe"));
        assert!(virtuals.iter().all(|m| m.kind() == MemberKind::Method));
    }

    #[test]
    fn test_required_lookups() {
        let fixture = hierarchy();
        let context = ReflectionContext::new(fixture.provider.clone());
        let runtime = context.get_type(fixture.derived).unwrap();
        let flags = BindingFlags::PUBLIC | BindingFlags::INSTANCE;

        assert_eq!(runtime.required_field("Count", flags).unwrap().name(), "Count");
        assert!(matches!(
            runtime.required_field("Missing", flags),
            Err(Error::MissingField(message)) if message == "Demo.Derived.Missing"
        ));
        assert!(matches!(
            runtime.required_method("Missing", flags),
            Err(Error::MissingMethod(_))
        ));
        assert!(matches!(
            runtime.required_member("Nothing*", flags),
            Err(Error::MissingMember(_))
        ));
        assert!(!runtime.required_member("Desc*", flags).unwrap().is_empty());
    }
}
