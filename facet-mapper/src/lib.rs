#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod tracing_macros;

pub mod cache;
pub mod classfile;
mod error;
pub mod generic;
pub mod introspect;
mod key;
pub mod matcher;
pub mod naming;
pub mod resolver;

pub use cache::{MapperCache, SIZE_THRESHOLD};
pub use error::{CacheError, FieldSuggestion, IntrospectError, MapperError, UnresolvableReason};
pub use generic::{GenericType, Primitive, SignatureError, TypeArgument, TypeBindings};
pub use introspect::{
    ClassFileIntrospector, ClassPath, ClassSource, ConstructorDefinition, ConstructorHandle,
    ConstructorParameter, Constructors, DeclaredIntrospector, DirectoryClassSource,
    PropertyAccess, PropertyDescriptor, TypeDeclaration, TypeDescription, TypeIntrospector,
    select_constructor,
};
pub use key::{FieldDescriptor, FieldKey, MapperKey};
pub use matcher::{MatchingConfig, PropertyNameMatch, PropertyNameMatcher, RankedMatch};
pub use resolver::{
    BindingTarget, FieldBinding, MapperBuilder, MapperResolver, MappingPlan, ObjectPlan,
    PathStep, PropertyPath, ResolverConfig,
};
