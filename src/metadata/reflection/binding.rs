//! Candidate filtering and single-result resolution.
//!
//! The kind caches hand out raw member arrays. The functions here reduce such an array to
//! the members a caller asked for through [`BindingFlags`], an optional calling
//! convention and optional argument types, and resolve single-result queries. A
//! single-result query never picks an arbitrary candidate: when the candidates cannot be
//! narrowed down to one member it fails with [`Error::AmbiguousMatch`].

use std::sync::Arc;

use bitflags::bitflags;

use crate::{
    metadata::{
        member::{CallingConventions, ParameterInfo},
        reflection::{
            context::ReflectionContext,
            filter::MatchMode,
            kindcache::MemberKindCache,
            records::{FieldRecord, Member, MemberKind, PropertyRecord},
        },
        typesystem::TypeHandle,
    },
    Error, Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Options controlling which members a query returns
    pub struct BindingFlags: u32 {
        /// Compare names case-insensitively
        const IGNORE_CASE = 0x0000_0001;
        /// Only members declared by the reflected type itself
        const DECLARED_ONLY = 0x0000_0002;
        /// Instance members
        const INSTANCE = 0x0000_0004;
        /// Static members
        const STATIC = 0x0000_0008;
        /// Public members
        const PUBLIC = 0x0000_0010;
        /// Non-public members
        const NON_PUBLIC = 0x0000_0020;
        /// Static members of base types
        const FLATTEN_HIERARCHY = 0x0000_0040;
        /// The caller intends to invoke a method
        const INVOKE_METHOD = 0x0000_0100;
        /// The caller intends to create an instance
        const CREATE_INSTANCE = 0x0000_0200;
        /// The caller intends to read a property
        const GET_PROPERTY = 0x0000_1000;
        /// The caller intends to write a property
        const SET_PROPERTY = 0x0000_2000;
        /// Argument types must match parameter types exactly
        const EXACT_BINDING = 0x0001_0000;
        /// Omitted arguments may bind to optional parameters
        const OPTIONAL_PARAM_BINDING = 0x0004_0000;

        /// The invocation family, which relaxes the arity check
        const INVOCATION = Self::INVOKE_METHOD.bits()
            | Self::CREATE_INSTANCE.bits()
            | Self::GET_PROPERTY.bits()
            | Self::SET_PROPERTY.bits();
        /// Public static and instance members
        const DEFAULT_LOOKUP = Self::PUBLIC.bits() | Self::INSTANCE.bits() | Self::STATIC.bits();
    }
}

impl BindingFlags {
    /// Reject malformed masks
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBindingFlags`] if `GET_PROPERTY` and `SET_PROPERTY` are combined,
    /// or if neither visibility bit or neither of `STATIC` and `INSTANCE` is present.
    pub fn validate(self) -> Result<()> {
        if self.contains(Self::GET_PROPERTY | Self::SET_PROPERTY) {
            return Err(Error::InvalidBindingFlags(
                "GET_PROPERTY and SET_PROPERTY exclude each other".to_string(),
            ));
        }
        if !self.intersects(Self::PUBLIC | Self::NON_PUBLIC) {
            return Err(Error::InvalidBindingFlags(
                "PUBLIC or NON_PUBLIC is required".to_string(),
            ));
        }
        if !self.intersects(Self::STATIC | Self::INSTANCE) {
            return Err(Error::InvalidBindingFlags(
                "STATIC or INSTANCE is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The name match mode selected by `IGNORE_CASE`
    #[must_use]
    pub fn match_mode(self) -> MatchMode {
        if self.contains(Self::IGNORE_CASE) {
            MatchMode::CaseInsensitive
        } else {
            MatchMode::CaseSensitive
        }
    }
}

/// Visibility, static/instance and declared-only filtering shared by all member kinds
pub(crate) fn filter_apply_base<T: Member>(
    member: &T,
    flags: BindingFlags,
    reflected: TypeHandle,
) -> bool {
    if member.is_public() {
        if !flags.contains(BindingFlags::PUBLIC) {
            return false;
        }
    } else if !flags.contains(BindingFlags::NON_PUBLIC) {
        return false;
    }

    let inherited = member.declaring_type() != reflected;
    if inherited && flags.contains(BindingFlags::DECLARED_ONLY) {
        return false;
    }

    // Nested types and interfaces are neither static nor instance members
    if matches!(T::KIND, MemberKind::NestedType | MemberKind::Interface) {
        return true;
    }

    if member.is_static() {
        if !flags.contains(BindingFlags::STATIC) {
            return false;
        }
        if inherited && !flags.contains(BindingFlags::FLATTEN_HIERARCHY) {
            return false;
        }
    } else {
        if !flags.contains(BindingFlags::INSTANCE) {
            return false;
        }
        if inherited
            && !member.is_public()
            && member.access().is_non_protected_internal()
            && !member.is_overridable()
        {
            return false;
        }
    }
    true
}

/// Calling convention and parameter arity filtering of invocable members
pub(crate) fn filter_apply_method_base(
    parameters: &[ParameterInfo],
    is_vararg: bool,
    flags: BindingFlags,
    calling_convention: CallingConventions,
    args: Option<&[TypeHandle]>,
) -> bool {
    let wants_vararg = calling_convention.contains(CallingConventions::VAR_ARGS);
    let wants_standard = calling_convention.contains(CallingConventions::STANDARD);
    if wants_vararg && !wants_standard && !is_vararg {
        return false;
    }
    if wants_standard && !wants_vararg && is_vararg {
        return false;
    }

    let Some(args) = args else {
        return true;
    };

    if args.len() == parameters.len() {
        if flags.contains(BindingFlags::EXACT_BINDING) {
            return parameters.iter().zip(args).all(|(p, a)| p.ty == *a);
        }
        return true;
    }

    if !flags.intersects(BindingFlags::INVOCATION) {
        return false;
    }

    let ends_in_param_array = parameters.last().is_some_and(ParameterInfo::is_param_array);
    if args.len() > parameters.len() {
        return is_vararg || ends_in_param_array;
    }

    let missing = parameters.len() - args.len();
    if flags.contains(BindingFlags::OPTIONAL_PARAM_BINDING)
        && parameters[args.len()..]
            .iter()
            .all(|p| p.is_optional || p.is_param_array())
    {
        return true;
    }
    missing == 1 && ends_in_param_array
}

/// Returns `true` if `args` can be passed to `parameters`
pub(crate) fn arguments_assignable(
    context: &ReflectionContext,
    parameters: &[ParameterInfo],
    args: &[TypeHandle],
) -> Result<bool> {
    for (index, &arg) in args.iter().enumerate() {
        let target = match parameters.get(index) {
            Some(parameter) => {
                let last = index + 1 == parameters.len();
                match parameter.param_array_element {
                    Some(element)
                        if last
                            && (args.len() != parameters.len()
                                || !context.is_assignable(arg, parameter.ty)?) =>
                    {
                        element
                    }
                    _ => parameter.ty,
                }
            }
            None => match parameters.last().and_then(|p| p.param_array_element) {
                Some(element) => element,
                // Var-arg tail
                None => continue,
            },
        };
        if !context.is_assignable(arg, target)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Of the candidates, the one declared deepest in the hierarchy; `None` on a tie
pub(crate) fn most_derived<T: Member>(
    context: &ReflectionContext,
    candidates: &[Arc<T>],
) -> Result<Option<Arc<T>>> {
    let mut best: Option<(usize, &Arc<T>)> = None;
    let mut tie = false;
    for candidate in candidates {
        let depth = context.hierarchy_depth(candidate.declaring_type())?;
        match best {
            Some((best_depth, _)) if depth < best_depth => {}
            Some((best_depth, _)) if depth == best_depth => tie = true,
            _ => {
                best = Some((depth, candidate));
                tie = false;
            }
        }
    }
    Ok(if tie { None } else { best.map(|(_, c)| c.clone()) })
}

/// Resolve a single invocable member (method, constructor or indexer).
///
/// `candidates` have already passed [`filter_apply_base`] and [`filter_apply_method_base`].
pub(crate) fn select_invocable<T, F>(
    context: &ReflectionContext,
    candidates: Vec<Arc<T>>,
    args: Option<&[TypeHandle]>,
    flags: BindingFlags,
    parameters_of: F,
    owner: TypeHandle,
    name: &str,
) -> Result<Option<Arc<T>>>
where
    T: Member,
    F: Fn(&T) -> &[ParameterInfo],
{
    let same_signature = |a: &T, b: &T| {
        let (pa, pb) = (parameters_of(a), parameters_of(b));
        pa.len() == pb.len() && pa.iter().zip(pb).all(|(x, y)| x.ty == y.ty)
    };
    let resolve_tie = |matches: Vec<Arc<T>>| -> Result<Option<Arc<T>>> {
        if matches.len() <= 1 {
            return Ok(matches.into_iter().next());
        }
        if matches[1..].iter().all(|m| same_signature(&matches[0], m)) {
            if let Some(best) = most_derived(context, &matches)? {
                return Ok(Some(best));
            }
        }
        Err(Error::ambiguous(owner, name))
    };

    let Some(args) = args else {
        return resolve_tie(candidates);
    };

    let exact: Vec<_> = candidates
        .iter()
        .filter(|c| {
            let parameters = parameters_of(c);
            parameters.len() == args.len() && parameters.iter().zip(args).all(|(p, a)| p.ty == *a)
        })
        .cloned()
        .collect();
    if !exact.is_empty() {
        return resolve_tie(exact);
    }
    if flags.contains(BindingFlags::EXACT_BINDING) {
        return Ok(None);
    }

    let mut assignable = Vec::new();
    for candidate in candidates {
        if arguments_assignable(context, parameters_of(&candidate), args)? {
            assignable.push(candidate);
        }
    }
    resolve_tie(assignable)
}

/// Resolve a single property by name (and optionally index parameter types)
pub(crate) fn select_property(
    context: &ReflectionContext,
    cache: &MemberKindCache<PropertyRecord>,
    candidates: Vec<Arc<PropertyRecord>>,
    index_types: Option<&[TypeHandle]>,
    flags: BindingFlags,
    owner: TypeHandle,
    name: &str,
) -> Result<Option<Arc<PropertyRecord>>> {
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if cache.is_ambiguous_pair(a, b)? {
                return Err(Error::ambiguous(owner, name));
            }
        }
    }
    select_invocable(
        context,
        candidates,
        index_types,
        flags,
        |p: &PropertyRecord| p.index_parameters.as_slice(),
        owner,
        name,
    )
}

/// Resolve a single field by name
pub(crate) fn select_field(
    context: &ReflectionContext,
    candidates: Vec<Arc<FieldRecord>>,
    owner: TypeHandle,
    name: &str,
) -> Result<Option<Arc<FieldRecord>>> {
    let mut selected: Option<Arc<FieldRecord>> = None;
    let mut interface_matches = false;

    for candidate in candidates {
        let candidate_in_interface = context.describe(candidate.declaring_type)?.is_interface();
        if let Some(current) = &selected {
            if candidate.declaring_type == current.declaring_type {
                return Err(Error::ambiguous(owner, name));
            }
            let current_in_interface = context.describe(current.declaring_type)?.is_interface();
            if current_in_interface && candidate_in_interface {
                interface_matches = true;
            }
            let replace = current_in_interface
                || context.is_subclass_of(candidate.declaring_type, current.declaring_type)?;
            if replace {
                selected = Some(candidate);
            }
        } else {
            selected = Some(candidate);
        }
    }

    if let Some(field) = &selected {
        if interface_matches && context.describe(field.declaring_type)?.is_interface() {
            return Err(Error::ambiguous(owner, name));
        }
    }
    Ok(selected)
}

/// Resolve a single event, nested type or interface: more than one match is ambiguous
pub(crate) fn select_unique<T: Member>(
    candidates: Vec<Arc<T>>,
    owner: TypeHandle,
    name: &str,
) -> Result<Option<Arc<T>>> {
    if candidates.len() > 1 {
        return Err(Error::ambiguous(owner, name));
    }
    Ok(candidates.into_iter().next())
}
