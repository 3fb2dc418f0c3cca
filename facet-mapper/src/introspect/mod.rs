//! Type introspection: constructors and properties of a target type.
//!
//! A [`TypeIntrospector`] turns a (possibly parameterized) type into a
//! [`TypeDescription`]: the properties that can be set after construction and
//! the constructors that can be called, with parameter names and concrete
//! generic types. Two implementations are provided:
//!
//! - [`ClassFileIntrospector`] reads compiled class files. Parameter names come
//!   from the `LocalVariableTable` debug information, generic parameter types
//!   from the `LocalVariableTypeTable`, resolved against the type arguments of
//!   the requested type.
//! - [`DeclaredIntrospector`] serves explicit declarations.

use core::fmt;
use std::sync::Arc;

use crate::error::IntrospectError;
use crate::generic::GenericType;

mod classfile;
mod declared;
mod select;

pub use classfile::{ClassFileIntrospector, ClassPath, ClassSource, DirectoryClassSource};
pub use declared::{DeclaredIntrospector, TypeDeclaration};
pub use select::select_constructor;

/// One parameter of a constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorParameter {
    /// Parameter name.
    pub name: String,
    /// Erased type, as in the constructor descriptor.
    pub declared: GenericType,
    /// Type with the target's type arguments substituted.
    pub generic: GenericType,
    /// Whether the constructor cannot be called without a value for it.
    pub required: bool,
}

impl ConstructorParameter {
    /// A parameter whose declared type is the erasure of `generic`.
    ///
    /// Primitive parameters are required: there is no value to pass in their
    /// place.
    pub fn new(name: impl Into<String>, generic: GenericType) -> Self {
        let declared = generic.erasure();
        Self {
            name: name.into(),
            required: matches!(declared, GenericType::Primitive(_)),
            declared,
            generic,
        }
    }

    /// Override the required flag.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Identifies a constructor to the mapper builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorHandle {
    /// Internal name of the declaring class.
    pub owner: String,
    /// Erased method descriptor, e.g. `(Ljava/lang/String;I)V`.
    pub descriptor: String,
    /// Access flags.
    pub access_flags: u16,
}

/// A constructor with its recovered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorDefinition {
    /// The constructor itself.
    pub handle: ConstructorHandle,
    /// Parameters in declaration order.
    pub parameters: Vec<ConstructorParameter>,
}

impl ConstructorDefinition {
    /// Whether a parameter is named `name`.
    pub fn has_param(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// Position and description of the parameter named `name`.
    pub fn parameter(&self, name: &str) -> Option<(usize, &ConstructorParameter)> {
        self.parameters
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }
}

impl fmt::Display for ConstructorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", GenericType::class(self.handle.owner.as_str()))?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", param.generic, param.name)?;
        }
        f.write_str(")")
    }
}

/// How a property is written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyAccess {
    /// Direct field assignment.
    Field,
    /// Through the named setter method.
    Setter(String),
}

/// A property that can be set on a constructed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Property type, type arguments substituted.
    pub ty: GenericType,
    /// How to write it.
    pub access: PropertyAccess,
}

/// Constructors of a type, split by whether they can be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constructors {
    /// Constructors whose parameters were fully recovered.
    pub usable: Vec<ConstructorDefinition>,
    /// Why the other constructors cannot be used.
    pub rejected: Vec<IntrospectError>,
}

/// What a mapper needs to know about a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescription {
    /// The described type, as requested.
    pub target: GenericType,
    /// Settable properties.
    pub properties: Vec<PropertyDescriptor>,
    /// Constructors.
    pub constructors: Constructors,
}

impl TypeDescription {
    /// Whether fields can be mapped into the type's members, as opposed to
    /// converting a single value into it.
    pub fn is_composite(&self) -> bool {
        !self.properties.is_empty()
            || self
                .constructors
                .usable
                .iter()
                .any(|c| !c.parameters.is_empty())
    }

    /// The property named `name`.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Every constructor parameter and property name, without duplicates,
    /// constructor parameters first.
    pub fn member_names(&self) -> Vec<&str> {
        let params = self
            .constructors
            .usable
            .iter()
            .flat_map(|c| &c.parameters)
            .map(|p| p.name.as_str());
        let properties = self.properties.iter().map(|p| p.name.as_str());

        let mut names: Vec<&str> = Vec::new();
        for name in params.chain(properties) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Type of the member named `name`: the first constructor parameter with
    /// that name, else the property.
    pub fn member_type(&self, name: &str) -> Option<&GenericType> {
        self.constructors
            .usable
            .iter()
            .find_map(|c| c.parameter(name))
            .map(|(_, p)| &p.generic)
            .or_else(|| self.property(name).map(|p| &p.ty))
    }
}

/// Describes target types.
pub trait TypeIntrospector {
    /// Describe `ty`, substituting its type arguments into member types.
    fn describe(&self, ty: &GenericType) -> Result<TypeDescription, IntrospectError>;
}

impl<T: TypeIntrospector + ?Sized> TypeIntrospector for &T {
    fn describe(&self, ty: &GenericType) -> Result<TypeDescription, IntrospectError> {
        (**self).describe(ty)
    }
}

impl<T: TypeIntrospector + ?Sized> TypeIntrospector for Arc<T> {
    fn describe(&self, ty: &GenericType) -> Result<TypeDescription, IntrospectError> {
        (**self).describe(ty)
    }
}

impl<T: TypeIntrospector + ?Sized> TypeIntrospector for Box<T> {
    fn describe(&self, ty: &GenericType) -> Result<TypeDescription, IntrospectError> {
        (**self).describe(ty)
    }
}
