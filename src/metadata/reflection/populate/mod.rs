//! Kind-specific population.
//!
//! Each member kind knows how to scan a reflected type (and, where inheritance applies,
//! its base chain) for members matching a [`NameFilter`]. Population only talks to the
//! metadata provider and never touches the caches; merging the result is the job of
//! [`crate::metadata::reflection::MemberKindCache`].
//!
//! The inheritance rules applied here:
//!
//! | Kind        | Walk                    | Hiding                                         |
//! |-------------|-------------------------|------------------------------------------------|
//! | Method      | most derived to base    | overridden virtual slots, private base methods |
//! | Constructor | reflected type only     | none                                           |
//! | Field       | most derived to base    | private base fields                            |
//! | Property    | most derived to base    | overridden slots, same name and signature      |
//! | Event       | most derived to base    | same name                                      |
//! | NestedType  | reflected type only     | none                                           |
//! | Interface   | provider interface map  | duplicates                                     |

mod constructors;
mod events;
mod fields;
mod interfaces;
mod methods;
mod nested;
mod properties;

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    metadata::{
        member::{MemberAccess, MethodModifiers},
        reflection::{
            config::ReflectionConfig,
            context::ReflectionContext,
            filter::NameFilter,
            kindcache::Population,
            provider::MetadataProvider,
            records::{AccessorInfo, Member},
        },
        token::Token,
        typesystem::TypeDescription,
    },
    Error, Result,
};

/// A member kind that can be populated from the metadata provider
pub trait Populate: Member {
    /// Scan the reflected type of `ctx` for members matching `filter`
    ///
    /// # Errors
    ///
    /// Propagates provider errors that are not dropped by the configuration.
    fn populate(ctx: &PopulateContext<'_>, filter: &NameFilter) -> Result<Population<Self>>;
}

/// Everything a population run needs
pub struct PopulateContext<'a> {
    context: &'a ReflectionContext,
    reflected: &'a Arc<TypeDescription>,
}

impl<'a> PopulateContext<'a> {
    /// Create a context for populating `reflected`
    pub(crate) fn new(context: &'a ReflectionContext, reflected: &'a Arc<TypeDescription>) -> Self {
        PopulateContext { context, reflected }
    }

    pub(crate) fn provider(&self) -> &'a dyn MetadataProvider {
        self.context.provider()
    }

    pub(crate) fn config(&self) -> &'a ReflectionConfig {
        self.context.config()
    }

    pub(crate) fn context(&self) -> &'a ReflectionContext {
        self.context
    }

    pub(crate) fn reflected(&self) -> &'a Arc<TypeDescription> {
        self.reflected
    }

    /// The reflected type followed by its base types.
    ///
    /// Generic parameters have no members of their own; their walk starts at the base
    /// constraint.
    pub(crate) fn hierarchy(&self) -> Result<Vec<Arc<TypeDescription>>> {
        let limit = self.config().max_hierarchy_depth;
        let mut levels = Vec::new();

        let mut current = if self.reflected.is_generic_parameter() {
            self.reflected.base
        } else {
            levels.push(self.reflected.clone());
            self.reflected.base
        };

        while let Some(handle) = current {
            if levels.len() >= limit {
                return Err(Error::RecursionLimit(limit));
            }
            let level = self.provider().describe(handle)?;
            current = level.base;
            levels.push(level);
        }
        Ok(levels)
    }

    /// Turn an unresolvable member into `None` if the configuration drops those
    pub(crate) fn resolve<R>(&self, result: Result<R>) -> Result<Option<R>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(Error::MemberNotResolved(token)) if self.config().drop_unresolvable_members => {
                warn!(
                    "Dropping unresolvable member {} while reflecting over {}",
                    token, self.reflected.handle
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Read an accessor method of a property or event declared on `level`
    pub(crate) fn accessor(
        &self,
        level: &TypeDescription,
        token: Option<Token>,
    ) -> Result<Option<AccessorInfo>> {
        let Some(token) = token else {
            return Ok(None);
        };
        let Some(raw) = self.resolve(self.provider().member(level.handle, token))? else {
            return Ok(None);
        };

        let modifiers = MethodModifiers::from_method_flags(raw.flags);
        let is_virtual = modifiers.contains(MethodModifiers::VIRTUAL)
            && raw.slot.is_some_and(|slot| slot < level.virtual_slots);
        Ok(Some(AccessorInfo {
            token,
            access: MemberAccess::from_flags(raw.flags),
            is_static: modifiers.contains(MethodModifiers::STATIC),
            is_virtual,
            slot: if is_virtual { raw.slot } else { None },
        }))
    }

    /// Number of virtual slots of the most derived level, read from its shared representation
    pub(crate) fn slot_count(&self, levels: &[Arc<TypeDescription>]) -> Result<usize> {
        let Some(first) = levels.first() else {
            return Ok(0);
        };
        let canonical = if first.is_shared() {
            self.provider().describe(first.canonical)?
        } else {
            first.clone()
        };
        Ok(canonical.virtual_slots as usize)
    }

    pub(crate) fn finish<T: Member>(&self, population: Population<T>) -> Population<T> {
        debug!(
            "Populated {} {} member(s) of {}",
            population.members.len(),
            T::KIND,
            self.reflected.handle
        );
        population
    }
}
