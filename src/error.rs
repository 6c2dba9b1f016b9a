use thiserror::Error;

use crate::metadata::{token::Token, typesystem::TypeHandle};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Member Lookup Errors
/// - [`Error::AmbiguousMatch`] - A single-result query found more than one equally good candidate
/// - [`Error::MissingMember`] - A required member does not exist
/// - [`Error::MissingMethod`] - A required method or constructor does not exist
/// - [`Error::MissingField`] - A required field does not exist
///
/// ## Usage Errors
/// - [`Error::InvalidOperation`] - The query is not valid for the shape of the type
/// - [`Error::InvalidBindingFlags`] - Conflicting or absent required bits in a `BindingFlags` mask
///
/// ## Metadata Errors
/// - [`Error::TypeNotFound`] - The metadata provider does not know the type
/// - [`Error::MemberNotResolved`] - A single member token could not be resolved
/// - [`Error::Malformed`] - The metadata provider returned inconsistent data
/// - [`Error::RecursionLimit`] - An inheritance chain exceeded the configured depth
///
/// ## Internal Errors
/// - [`Error::CacheInvariant`] - A cache was asked to do something that breaks its invariants
/// - [`Error::LockError`] - A lock was poisoned by a panicking thread
///
/// # Examples
///
/// ```rust
/// use memberscope::prelude::*;
/// use std::sync::Arc;
///
/// let provider = Arc::new(InMemoryProvider::new());
/// let widget = provider
///     .class("Demo", "Widget")
///     .method(MethodDef::new("Run"))
///     .method(MethodDef::new("Run").param(provider.object_type()))
///     .build()?;
///
/// let context = ReflectionContext::new(provider);
/// match context.get_type(widget)?.method("Run", BindingFlags::DEFAULT_LOOKUP) {
///     Err(Error::AmbiguousMatch(message)) => println!("{message}"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// # Ok::<(), memberscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// More than one member satisfies a query that must produce a single result.
    ///
    /// Single-result accessors never pick an arbitrary candidate; when the filtered
    /// candidate set cannot be narrowed down to one member this error is raised instead.
    #[error("Ambiguous match found - {0}")]
    AmbiguousMatch(String),

    /// A required member could not be found.
    #[error("Member not found - {0}")]
    MissingMember(String),

    /// A required method or constructor could not be found.
    ///
    /// Raised for example when default-constructing a type that has no accessible
    /// parameterless constructor.
    #[error("Method not found - {0}")]
    MissingMethod(String),

    /// A required field could not be found.
    #[error("Field not found - {0}")]
    MissingField(String),

    /// The operation is not valid for the shape of the type it was invoked on.
    ///
    /// Examples are asking a concrete type for its generic parameter constraints, or
    /// trying to create an instance of an interface.
    #[error("Invalid operation - {0}")]
    InvalidOperation(String),

    /// The supplied `BindingFlags` mask is malformed.
    ///
    /// Either two bits that exclude each other were combined, or a bit required for the
    /// query (visibility or static/instance selection) was absent.
    #[error("Invalid binding flags - {0}")]
    InvalidBindingFlags(String),

    /// The metadata provider does not know the requested type.
    #[error("Failed to find type - {0}")]
    TypeNotFound(Token),

    /// A member token could not be resolved by the metadata provider.
    ///
    /// During population this error is caught and the single member is dropped from
    /// the result set, unless the configuration asks for strict propagation.
    #[error("Failed to resolve member - {0}")]
    MemberNotResolved(Token),

    /// The metadata provider returned inconsistent data.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Recursion limit reached.
    ///
    /// Walking an inheritance chain is bounded; a chain deeper than the configured
    /// limit is treated as a cycle in the metadata.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A cache invariant would have been violated.
    ///
    /// The most prominent case is growing the global member list of a kind cache after
    /// it was marked complete.
    #[error("Cache invariant violated - {0}")]
    CacheInvariant(String),

    /// Failed to lock target.
    ///
    /// This error occurs when a mutex was poisoned by a thread that panicked while
    /// holding it.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Build an [`Error::AmbiguousMatch`] naming the queried member and its owner.
    pub(crate) fn ambiguous(owner: TypeHandle, name: &str) -> Self {
        Error::AmbiguousMatch(format!("'{name}' on type {owner}"))
    }
}
