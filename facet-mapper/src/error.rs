//! Error types.

use core::fmt;

use crate::classfile::ClassFileError;
use crate::generic::{GenericType, SignatureError};

/// Errors from [`MapperCache::add`](crate::MapperCache::add).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The ordering function called two keys equal that are not `==`.
    ///
    /// The cache cannot tell whether the key is present, so the insert is
    /// abandoned rather than retried.
    InconsistentOrdering {
        /// The key being inserted.
        key: String,
        /// The stored key the ordering function compared equal to it.
        existing: String,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InconsistentOrdering { key, existing } => write!(
                f,
                "mapper key {key} compares equal to cached key {existing} but is not equal to it; \
                 the cache ordering is inconsistent with equality"
            ),
        }
    }
}

impl std::error::Error for CacheError {}

/// Errors from describing a type or one of its constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntrospectError {
    /// The class source has no class with this internal name.
    ClassNotFound {
        /// Internal name of the class.
        name: String,
    },
    /// The class file is malformed.
    ClassFile {
        /// Internal name of the class being read.
        class: String,
        /// What the reader found.
        error: ClassFileError,
    },
    /// A descriptor or generic signature is malformed.
    Signature {
        /// Internal name of the class declaring it.
        class: String,
        /// What the parser found.
        error: SignatureError,
    },
    /// A constructor's parameter names could not all be recovered, usually
    /// because the class was compiled without debug information.
    MissingParameterNames {
        /// Internal name of the class.
        class: String,
        /// The constructor descriptor.
        descriptor: String,
        /// Parameters in the descriptor.
        expected: usize,
        /// Parameters recovered from the local variable table.
        found: usize,
    },
    /// The type is a primitive, an array or a type variable.
    NotAClass {
        /// The offending type.
        ty: GenericType,
    },
    /// No declaration was registered for this type.
    UnknownType {
        /// Internal name of the type.
        name: String,
    },
}

impl fmt::Display for IntrospectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrospectError::ClassNotFound { name } => write!(f, "class {name} not found"),
            IntrospectError::ClassFile { class, error } => {
                write!(f, "cannot read class file of {class}: {error}")
            }
            IntrospectError::Signature { class, error } => {
                write!(f, "in class {class}: {error}")
            }
            IntrospectError::MissingParameterNames {
                class,
                descriptor,
                expected,
                found,
            } => write!(
                f,
                "constructor {class}.<init>{descriptor} has {expected} parameters but only \
                 {found} names were found; compile with debug information (-g)"
            ),
            IntrospectError::NotAClass { ty } => write!(f, "{ty} is not a class type"),
            IntrospectError::UnknownType { name } => write!(f, "no declaration for type {name}"),
        }
    }
}

impl std::error::Error for IntrospectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntrospectError::ClassFile { error, .. } => Some(error),
            IntrospectError::Signature { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Why no object plan could be built for a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvableReason {
    /// No usable constructor has all of its required parameters matched.
    NoSuitableConstructor {
        /// Constructors the introspector rejected, with the reason.
        rejected: Vec<IntrospectError>,
    },
    /// Nested objects go deeper than the configured limit.
    MaxDepthExceeded {
        /// The configured limit.
        max_depth: usize,
    },
}

impl fmt::Display for UnresolvableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvableReason::NoSuitableConstructor { rejected } => {
                write!(f, "no constructor can be called with the matched fields")?;
                for reason in rejected {
                    write!(f, "\n  rejected: {reason}")?;
                }
                Ok(())
            }
            UnresolvableReason::MaxDepthExceeded { max_depth } => {
                write!(f, "nesting deeper than {max_depth} levels")
            }
        }
    }
}

/// A "did you mean?" hint for a field that matched nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSuggestion {
    /// The unmatched field name.
    pub unknown: String,
    /// The closest property or parameter name.
    pub suggestion: String,
    /// Jaro-Winkler similarity, 0.0 to 1.0.
    pub similarity: f64,
}

/// Errors from resolving or building a mapper.
#[derive(Debug, Clone, PartialEq)]
pub enum MapperError {
    /// Publishing the mapper failed.
    Cache(CacheError),
    /// The target type could not be described.
    Introspect(IntrospectError),
    /// A (possibly nested) target type cannot be instantiated from the fields.
    Unresolvable {
        /// The type that could not be planned.
        target: GenericType,
        /// Why.
        reason: UnresolvableReason,
        /// The fields that were to populate it.
        fields: Vec<String>,
    },
    /// Fields that match no property or constructor parameter.
    UnmatchedFields {
        /// The mapper's target type.
        target: GenericType,
        /// Unmatched field names, in input order.
        fields: Vec<String>,
        /// Close property names, when the `suggestions` feature is on.
        suggestions: Vec<FieldSuggestion>,
    },
    /// The mapper builder failed.
    Build(String),
}

impl MapperError {
    /// Error for fields that matched nothing, with suggestions drawn from
    /// `known` names.
    pub fn unmatched<'a, U, N>(target: &GenericType, unmatched: U, known: N) -> Self
    where
        U: IntoIterator<Item = &'a str>,
        N: IntoIterator<Item = &'a str> + Clone,
    {
        let fields: Vec<String> = unmatched.into_iter().map(str::to_string).collect();
        let suggestions = compute_suggestions(&fields, known);
        MapperError::UnmatchedFields {
            target: target.clone(),
            fields,
            suggestions,
        }
    }
}

#[cfg(feature = "suggestions")]
fn compute_suggestions<'a, N>(unknown_fields: &[String], known: N) -> Vec<FieldSuggestion>
where
    N: IntoIterator<Item = &'a str> + Clone,
{
    const SIMILARITY_THRESHOLD: f64 = 0.6;

    let mut suggestions = Vec::new();
    for unknown in unknown_fields {
        let mut best: Option<(&str, f64)> = None;
        for candidate in known.clone() {
            let similarity =
                strsim::jaro_winkler(&unknown.to_lowercase(), &candidate.to_lowercase());
            if similarity >= SIMILARITY_THRESHOLD
                && best.is_none_or(|(_, best_similarity)| similarity > best_similarity)
            {
                best = Some((candidate, similarity));
            }
        }
        if let Some((suggestion, similarity)) = best {
            suggestions.push(FieldSuggestion {
                unknown: unknown.clone(),
                suggestion: suggestion.to_string(),
                similarity,
            });
        }
    }
    suggestions
}

#[cfg(not(feature = "suggestions"))]
fn compute_suggestions<'a, N>(_unknown_fields: &[String], _known: N) -> Vec<FieldSuggestion>
where
    N: IntoIterator<Item = &'a str> + Clone,
{
    Vec::new()
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperError::Cache(err) => write!(f, "{err}"),
            MapperError::Introspect(err) => write!(f, "{err}"),
            MapperError::Unresolvable {
                target,
                reason,
                fields,
            } => write!(f, "cannot map fields {fields:?} to {target}: {reason}"),
            MapperError::UnmatchedFields {
                target,
                fields,
                suggestions,
            } => {
                write!(f, "fields {fields:?} match no property of {target}")?;
                for s in suggestions {
                    write!(
                        f,
                        "\n  did you mean `{}` instead of `{}`?",
                        s.suggestion, s.unknown
                    )?;
                }
                Ok(())
            }
            MapperError::Build(message) => write!(f, "cannot build mapper: {message}"),
        }
    }
}

impl std::error::Error for MapperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapperError::Cache(err) => Some(err),
            MapperError::Introspect(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CacheError> for MapperError {
    fn from(err: CacheError) -> Self {
        MapperError::Cache(err)
    }
}

impl From<IntrospectError> for MapperError {
    fn from(err: IntrospectError) -> Self {
        MapperError::Introspect(err)
    }
}
