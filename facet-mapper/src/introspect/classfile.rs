use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{
    ConstructorDefinition, ConstructorHandle, ConstructorParameter, Constructors,
    PropertyAccess, PropertyDescriptor, TypeDescription, TypeIntrospector,
};
use crate::classfile::{ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC, ClassFile, MethodInfo};
use crate::error::IntrospectError;
use crate::generic::{self, GenericType, MethodSignature, SignatureError, TypeBindings};
use crate::naming::decapitalize;
use crate::{debug, trace};

/// Where class files come from.
pub trait ClassSource {
    /// Bytes of the class with internal name `name`.
    fn class_bytes(&self, name: &str) -> Option<Cow<'_, [u8]>>;

    /// Whether a class can be loaded at all.
    ///
    /// Platform classes (`java/...`) are assumed present.
    fn is_loadable(&self, name: &str) -> bool {
        is_platform_class(name) || self.class_bytes(name).is_some()
    }
}

fn is_platform_class(name: &str) -> bool {
    name.starts_with("java/")
}

impl<S: ClassSource + ?Sized> ClassSource for &S {
    fn class_bytes(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        (**self).class_bytes(name)
    }

    fn is_loadable(&self, name: &str) -> bool {
        (**self).is_loadable(name)
    }
}

impl<S: ClassSource + ?Sized> ClassSource for Arc<S> {
    fn class_bytes(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        (**self).class_bytes(name)
    }

    fn is_loadable(&self, name: &str) -> bool {
        (**self).is_loadable(name)
    }
}

/// Class files held in memory, by internal name.
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    classes: HashMap<String, Arc<[u8]>>,
}

impl ClassPath {
    /// An empty class path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a class.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.classes.insert(name.into(), bytes.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_class(mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class was added.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for ClassPath {
    fn class_bytes(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.classes.get(name).map(|bytes| Cow::Borrowed(&bytes[..]))
    }

    fn is_loadable(&self, name: &str) -> bool {
        is_platform_class(name) || self.classes.contains_key(name)
    }
}

/// Class files under a class-path directory: `com/example/Person` is read
/// from `<root>/com/example/Person.class`.
#[derive(Debug, Clone)]
pub struct DirectoryClassSource {
    root: PathBuf,
}

impl DirectoryClassSource {
    /// Classes below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(name.split('/'));
        path.set_extension("class");
        path
    }
}

impl ClassSource for DirectoryClassSource {
    fn class_bytes(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        match std::fs::read(self.path_of(name)) {
            Ok(bytes) => Some(Cow::Owned(bytes)),
            Err(_err) => {
                trace!(name, error = %_err, "class not readable");
                None
            }
        }
    }

    fn is_loadable(&self, name: &str) -> bool {
        is_platform_class(name) || self.path_of(name).is_file()
    }
}

/// Describes types by reading their class files.
#[derive(Debug, Clone)]
pub struct ClassFileIntrospector<S> {
    source: S,
}

impl<S: ClassSource> ClassFileIntrospector<S> {
    /// Read classes from `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// The class source.
    pub fn source(&self) -> &S {
        &self.source
    }

    fn load(&self, name: &str) -> Result<ClassFile, IntrospectError> {
        let bytes = self
            .source
            .class_bytes(name)
            .ok_or_else(|| IntrospectError::ClassNotFound { name: name.into() })?;
        ClassFile::parse(&bytes).map_err(|error| IntrospectError::ClassFile {
            class: name.into(),
            error,
        })
    }

    fn constructor(
        &self,
        class: &ClassFile,
        method: &MethodInfo,
        bindings: &TypeBindings,
    ) -> Result<ConstructorDefinition, IntrospectError> {
        let signature_error = |error: SignatureError| IntrospectError::Signature {
            class: class.this_class.clone(),
            error,
        };

        let erased = MethodSignature::parse(&method.descriptor).map_err(signature_error)?;
        let generic = method
            .signature
            .as_deref()
            .map(MethodSignature::parse)
            .transpose()
            .map_err(signature_error)?
            // Signatures of inner-class constructors may omit synthetic parameters.
            .filter(|sig| sig.params.len() == erased.params.len());

        let code = method.code.clone().unwrap_or_default();
        let mut locals: Vec<_> = match code.label_bounds() {
            Some((first, last)) => code
                .local_variables
                .iter()
                .filter(|v| v.start_pc as u32 == first && v.end_pc() == last)
                .filter(|v| v.name != "this")
                .collect(),
            None => Vec::new(),
        };
        locals.sort_by_key(|v| v.index);

        if locals.len() != erased.params.len() {
            return Err(IntrospectError::MissingParameterNames {
                class: class.this_class.clone(),
                descriptor: method.descriptor.clone(),
                expected: erased.params.len(),
                found: locals.len(),
            });
        }

        let mut parameters = Vec::with_capacity(locals.len());
        for (i, local) in locals.iter().enumerate() {
            let typed = code
                .local_variable_types
                .iter()
                .find(|t| t.index == local.index && t.name == local.name);
            let unresolved = match (typed, &generic) {
                (Some(typed), _) => {
                    GenericType::from_signature(&typed.descriptor).map_err(signature_error)?
                }
                (None, Some(sig)) => sig.params[i].clone(),
                (None, None) => erased.params[i].clone(),
            };
            // A type variable is declared as Object, whatever its bound.
            let declared = if unresolved.is_variable() {
                GenericType::object()
            } else {
                erased.params[i].clone()
            };
            let resolved = unresolved.substitute(bindings);

            for name in resolved
                .referenced_classes()
                .into_iter()
                .chain(declared.referenced_classes())
            {
                if !self.source.is_loadable(name) {
                    return Err(IntrospectError::ClassNotFound { name: name.into() });
                }
            }

            parameters.push(ConstructorParameter {
                name: local.name.clone(),
                required: matches!(declared, GenericType::Primitive(_)),
                declared,
                generic: resolved,
            });
        }

        Ok(ConstructorDefinition {
            handle: ConstructorHandle {
                owner: class.this_class.clone(),
                descriptor: method.descriptor.clone(),
                access_flags: method.access_flags,
            },
            parameters,
        })
    }

    fn properties(
        &self,
        class: &ClassFile,
        bindings: &TypeBindings,
    ) -> Result<Vec<PropertyDescriptor>, IntrospectError> {
        let signature_error = |error: SignatureError| IntrospectError::Signature {
            class: class.this_class.clone(),
            error,
        };
        let mut properties: Vec<PropertyDescriptor> = Vec::new();

        for field in &class.fields {
            if !is_public_instance(field.access_flags) {
                continue;
            }
            let signature = field.signature.as_deref().unwrap_or(&field.descriptor);
            let ty = GenericType::from_signature(signature).map_err(signature_error)?;
            properties.push(PropertyDescriptor {
                name: field.name.clone(),
                ty: ty.substitute(bindings),
                access: PropertyAccess::Field,
            });
        }

        for method in &class.methods {
            let Some(suffix) = method.name.strip_prefix("set") else {
                continue;
            };
            if !suffix.starts_with(|c: char| c.is_ascii_uppercase())
                || !is_public_instance(method.access_flags)
            {
                continue;
            }
            let signature = method.signature.as_deref().unwrap_or(&method.descriptor);
            let parsed = MethodSignature::parse(signature).map_err(signature_error)?;
            let [param] = parsed.params.as_slice() else {
                continue;
            };
            if parsed.ret != GenericType::Primitive(generic::Primitive::Void) {
                continue;
            }

            let name = decapitalize(suffix);
            if properties.iter().any(|p| p.name == name) {
                continue;
            }
            properties.push(PropertyDescriptor {
                name,
                ty: param.substitute(bindings),
                access: PropertyAccess::Setter(method.name.clone()),
            });
        }

        Ok(properties)
    }
}

fn is_public_instance(access_flags: u16) -> bool {
    access_flags & ACC_PUBLIC != 0 && access_flags & (ACC_STATIC | ACC_SYNTHETIC) == 0
}

impl<S: ClassSource> TypeIntrospector for ClassFileIntrospector<S> {
    fn describe(&self, ty: &GenericType) -> Result<TypeDescription, IntrospectError> {
        let name = match ty {
            GenericType::Class(name) | GenericType::Parameterized { raw: name, .. } => name,
            _ => return Err(IntrospectError::NotAClass { ty: ty.clone() }),
        };
        let class = self.load(name)?;

        let type_params = class
            .signature
            .as_deref()
            .map(generic::class_type_parameters)
            .transpose()
            .map_err(|error| IntrospectError::Signature {
                class: name.clone(),
                error,
            })?
            .unwrap_or_default();
        let bindings = TypeBindings::for_target(&type_params, ty);

        let mut constructors = Constructors::default();
        // Access is left to the builder through the handle's flags.
        for method in class.constructors() {
            if method.access_flags & ACC_SYNTHETIC != 0 {
                continue;
            }
            match self.constructor(&class, method, &bindings) {
                Ok(definition) => {
                    trace!(%definition, "constructor discovered");
                    constructors.usable.push(definition);
                }
                Err(err) => {
                    debug!(class = %name, descriptor = %method.descriptor, error = %err, "constructor rejected");
                    constructors.rejected.push(err);
                }
            }
        }

        let properties = self.properties(&class, &bindings)?;

        Ok(TypeDescription {
            target: ty.clone(),
            properties,
            constructors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::classfile::{
        ACC_PRIVATE, ClassFileBuilder, LocalVar, MethodSpec, Param,
    };

    const STRING: &str = "Ljava/lang/String;";

    fn introspector(classes: &[(&str, Vec<u8>)]) -> ClassFileIntrospector<ClassPath> {
        let mut path = ClassPath::new();
        for (name, bytes) in classes {
            path.insert(*name, bytes.clone());
        }
        ClassFileIntrospector::new(path)
    }

    fn names(definition: &ConstructorDefinition) -> Vec<&str> {
        definition.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn body_locals_are_not_parameters() {
        let person = ClassFileBuilder::new("com/example/Person")
            .method(
                MethodSpec::constructor("com/example/Person", [Param::new("name", STRING)])
                    .local(LocalVar::new(4, 3, "trimmed", STRING, 2)),
            )
            .build();
        let desc = introspector(&[("com/example/Person", person)])
            .describe(&GenericType::class("com/example/Person"))
            .unwrap();
        assert_eq!(names(&desc.constructors.usable[0]), ["name"]);
    }

    #[test]
    fn parameters_follow_slot_order() {
        // javac lists locals by scope, not slot; the table order is not relied on.
        let method = MethodSpec::new("<init>", "(Ljava/lang/String;J)V")
            .code_length(8)
            .local(LocalVar::new(0, 8, "start", "J", 2))
            .local(LocalVar::new(0, 8, "this", "Lcom/example/Span;", 0))
            .local(LocalVar::new(0, 8, "label", STRING, 1));
        let span = ClassFileBuilder::new("com/example/Span").method(method).build();
        let desc = introspector(&[("com/example/Span", span)])
            .describe(&GenericType::class("com/example/Span"))
            .unwrap();
        let ctor = &desc.constructors.usable[0];
        assert_eq!(names(ctor), ["label", "start"]);
        assert_eq!(ctor.parameters[1].declared, GenericType::long());
        assert!(ctor.parameters[1].required);
        assert!(!ctor.parameters[0].required);
    }

    #[test]
    fn missing_debug_info_rejects_constructor() {
        let bare = ClassFileBuilder::new("com/example/Bare")
            .method(
                MethodSpec::constructor("com/example/Bare", [Param::new("value", "I")])
                    .without_debug_info(),
            )
            .build();
        let desc = introspector(&[("com/example/Bare", bare)])
            .describe(&GenericType::class("com/example/Bare"))
            .unwrap();
        assert!(desc.constructors.usable.is_empty());
        assert_eq!(
            desc.constructors.rejected,
            [IntrospectError::MissingParameterNames {
                class: "com/example/Bare".into(),
                descriptor: "(I)V".into(),
                expected: 1,
                found: 0,
            }]
        );
    }

    #[test]
    fn unloadable_parameter_type_rejects_constructor() {
        let order = ClassFileBuilder::new("com/example/Order")
            .method(MethodSpec::constructor(
                "com/example/Order",
                [Param::new("customer", "Lcom/example/Customer;")],
            ))
            .method(MethodSpec::constructor("com/example/Order", []))
            .build();
        let desc = introspector(&[("com/example/Order", order)])
            .describe(&GenericType::class("com/example/Order"))
            .unwrap();
        assert_eq!(desc.constructors.usable.len(), 1);
        assert!(desc.constructors.usable[0].parameters.is_empty());
        assert_eq!(
            desc.constructors.rejected,
            [IntrospectError::ClassNotFound {
                name: "com/example/Customer".into()
            }]
        );
    }

    #[test]
    fn properties_from_fields_and_setters() {
        let bean = ClassFileBuilder::new("com/example/Bean")
            .field(ACC_PUBLIC, "id", "J", None)
            .field(ACC_PUBLIC | ACC_STATIC, "COUNTER", "I", None)
            .field(0x0002, "hidden", STRING, None)
            .method(MethodSpec::constructor("com/example/Bean", []))
            .method(MethodSpec::setter("setEmailAddress", STRING))
            .method(MethodSpec::new("setup", "()V").code_length(1))
            .method(MethodSpec::new("set", "(I)V").code_length(1))
            .method(MethodSpec::setter("settle", "I"))
            .method(MethodSpec::setter("setup", "I"))
            .build();
        let desc = introspector(&[("com/example/Bean", bean)])
            .describe(&GenericType::class("com/example/Bean"))
            .unwrap();
        let props: Vec<_> = desc
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.ty.to_string()))
            .collect();
        assert_eq!(props, [("id", "long".into()), ("emailAddress", "java.lang.String".into())]);
        assert_eq!(
            desc.property("emailAddress").unwrap().access,
            PropertyAccess::Setter("setEmailAddress".into())
        );
    }

    #[test]
    fn non_public_constructors_are_discovered() {
        let money = ClassFileBuilder::new("com/example/Money")
            .method(
                MethodSpec::constructor("com/example/Money", [Param::new("cents", "J")])
                    .access(0),
            )
            .method(
                MethodSpec::constructor("com/example/Money", [Param::new("amount", STRING)])
                    .access(ACC_PRIVATE),
            )
            .method(MethodSpec::constructor("com/example/Money", []).access(ACC_SYNTHETIC))
            .build();
        let desc = introspector(&[("com/example/Money", money)])
            .describe(&GenericType::class("com/example/Money"))
            .unwrap();
        assert!(desc.constructors.rejected.is_empty());
        let found: Vec<_> = desc
            .constructors
            .usable
            .iter()
            .map(|c| (names(c), c.handle.access_flags))
            .collect();
        assert_eq!(found, [(vec!["cents"], 0), (vec!["amount"], ACC_PRIVATE)]);
    }

    #[test]
    fn bounded_type_variable_is_declared_as_object() {
        let measure = ClassFileBuilder::new("com/example/Measure")
            .signature("<N:Ljava/lang/Number;>Ljava/lang/Object;")
            .method(MethodSpec::constructor(
                "com/example/Measure",
                [
                    Param::new("value", "Ljava/lang/Number;").signature("TN;"),
                    Param::new("unit", STRING),
                ],
            ))
            .build();
        let introspector = introspector(&[("com/example/Measure", measure)]);

        let target = GenericType::parameterized(
            "com/example/Measure",
            [GenericType::class("java/lang/Double")],
        );
        let desc = introspector.describe(&target).unwrap();
        let params = &desc.constructors.usable[0].parameters;
        assert_eq!(params[0].declared, GenericType::object());
        assert_eq!(params[0].generic, GenericType::class("java/lang/Double"));
        assert!(!params[0].required);
        assert_eq!(params[1].declared, GenericType::string());

        let raw = introspector
            .describe(&GenericType::class("com/example/Measure"))
            .unwrap();
        assert_eq!(raw.constructors.usable[0].parameters[0].declared, GenericType::object());
    }

    #[test]
    fn generic_field_is_resolved() {
        let holder = ClassFileBuilder::new("com/example/Holder")
            .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
            .field(ACC_PUBLIC, "value", "Ljava/lang/Object;", Some("TT;"))
            .field(ACC_PUBLIC, "values", "Ljava/util/List;", Some("Ljava/util/List<TT;>;"))
            .method(MethodSpec::constructor("com/example/Holder", []))
            .build();
        let introspector = introspector(&[("com/example/Holder", holder)]);
        let target = GenericType::parameterized("com/example/Holder", [GenericType::string()]);
        let desc = introspector.describe(&target).unwrap();
        assert_eq!(desc.property("value").unwrap().ty, GenericType::string());
        assert_eq!(
            desc.property("values").unwrap().ty.to_string(),
            "java.util.List<java.lang.String>"
        );
    }

    #[test]
    fn describing_a_primitive_fails() {
        let err = introspector(&[]).describe(&GenericType::int()).unwrap_err();
        assert_eq!(err, IntrospectError::NotAClass { ty: GenericType::int() });
    }

    #[test]
    fn missing_class_fails() {
        let err = introspector(&[])
            .describe(&GenericType::class("com/example/Gone"))
            .unwrap_err();
        assert_eq!(err.to_string(), "class com/example/Gone not found");
    }

    #[test]
    fn directory_source_maps_names_to_paths() {
        let source = DirectoryClassSource::new("/classes");
        assert_eq!(
            source.path_of("com/example/Person"),
            PathBuf::from("/classes/com/example/Person.class")
        );
        assert!(source.is_loadable("java/lang/String"));
        assert!(!source.is_loadable("com/example/Nowhere"));
    }
}
