use std::collections::HashMap;

use super::{
    ConstructorDefinition, ConstructorHandle, ConstructorParameter, Constructors,
    PropertyAccess, PropertyDescriptor, TypeDescription, TypeIntrospector,
};
use crate::classfile::ACC_PUBLIC;
use crate::error::IntrospectError;
use crate::generic::{GenericType, TypeBindings};

/// Explicit description of a type: constructors with named parameters and
/// properties, with member types written in terms of the type's own type
/// parameters.
///
/// ```
/// use facet_mapper::{GenericType, TypeDeclaration};
///
/// let pair = TypeDeclaration::new("com/example/Pair")
///     .type_params(["T", "U"])
///     .constructor([
///         ("first", GenericType::variable("T")),
///         ("second", GenericType::variable("U")),
///     ]);
/// assert_eq!(pair.name(), "com/example/Pair");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    name: String,
    type_params: Vec<String>,
    constructors: Vec<Vec<ConstructorParameter>>,
    properties: Vec<PropertyDescriptor>,
}

impl TypeDeclaration {
    /// A type with no members, by internal name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Internal name of the declared type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare the type's type parameters, in order.
    pub fn type_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add a constructor; primitive parameters are required.
    pub fn constructor<I, S>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (S, GenericType)>,
        S: Into<String>,
    {
        self.constructor_with(
            params
                .into_iter()
                .map(|(name, ty)| ConstructorParameter::new(name, ty)),
        )
    }

    /// Add a constructor with fully specified parameters.
    pub fn constructor_with(mut self, params: impl IntoIterator<Item = ConstructorParameter>) -> Self {
        self.constructors.push(params.into_iter().collect());
        self
    }

    /// Add a field property.
    pub fn property(mut self, name: impl Into<String>, ty: GenericType) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            ty,
            access: PropertyAccess::Field,
        });
        self
    }

    fn describe(&self, target: &GenericType) -> TypeDescription {
        let bindings = TypeBindings::for_target(&self.type_params, target);

        let usable = self
            .constructors
            .iter()
            .map(|params| {
                let descriptor: String = params.iter().map(|p| p.declared.descriptor()).collect();
                ConstructorDefinition {
                    handle: ConstructorHandle {
                        owner: self.name.clone(),
                        descriptor: format!("({descriptor})V"),
                        access_flags: ACC_PUBLIC,
                    },
                    parameters: params
                        .iter()
                        .map(|p| ConstructorParameter {
                            generic: p.generic.substitute(&bindings),
                            ..p.clone()
                        })
                        .collect(),
                }
            })
            .collect();

        let properties = self
            .properties
            .iter()
            .map(|p| PropertyDescriptor {
                ty: p.ty.substitute(&bindings),
                ..p.clone()
            })
            .collect();

        TypeDescription {
            target: target.clone(),
            properties,
            constructors: Constructors {
                usable,
                rejected: Vec::new(),
            },
        }
    }
}

/// Serves registered [`TypeDeclaration`]s.
#[derive(Debug, Clone, Default)]
pub struct DeclaredIntrospector {
    types: HashMap<String, TypeDeclaration>,
}

impl DeclaredIntrospector {
    /// No types registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any earlier declaration with the same name.
    pub fn register(&mut self, declaration: TypeDeclaration) {
        self.types.insert(declaration.name.clone(), declaration);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_type(mut self, declaration: TypeDeclaration) -> Self {
        self.register(declaration);
        self
    }
}

impl TypeIntrospector for DeclaredIntrospector {
    fn describe(&self, ty: &GenericType) -> Result<TypeDescription, IntrospectError> {
        let name = ty
            .raw_name()
            .ok_or_else(|| IntrospectError::NotAClass { ty: ty.clone() })?;
        let declaration = self
            .types
            .get(name)
            .ok_or_else(|| IntrospectError::UnknownType { name: name.into() })?;
        Ok(declaration.describe(ty))
    }
}
