//! Resolving mappers: cache lookup, planning and building.
//!
//! [`MapperResolver`] answers "give me the mapper for these fields". On a
//! cache miss it matches every field name against the members of the target
//! type, follows partial matches into nested objects, picks a constructor at
//! every level, hands the resulting [`MappingPlan`] to a [`MapperBuilder`] and
//! publishes the built mapper in its [`MapperCache`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::MapperCache;
use crate::error::{IntrospectError, MapperError, UnresolvableReason};
use crate::generic::GenericType;
use crate::introspect::{TypeDescription, TypeIntrospector, select_constructor};
use crate::key::{FieldKey, MapperKey};
use crate::matcher::{MatchingConfig, PropertyNameMatch, PropertyNameMatcher};
use crate::{debug, trace};

mod plan;

pub use plan::{BindingTarget, FieldBinding, MappingPlan, ObjectPlan, PathStep, PropertyPath};

/// Settings for [`MapperResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Name matching scores and thresholds.
    pub matching: MatchingConfig,

    /// Most nested objects a field may reach through. The target itself is
    /// depth 0.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            max_depth: 8,
        }
    }
}

/// Turns a plan into an executable mapper.
pub trait MapperBuilder<K> {
    /// The built mapper; cloned out of the cache on every hit.
    type Mapper: Clone;

    /// Build a mapper for `plan`.
    fn build(&self, plan: &MappingPlan<K>) -> Result<Self::Mapper, MapperError>;
}

impl<K, F, M> MapperBuilder<K> for F
where
    F: Fn(&MappingPlan<K>) -> Result<M, MapperError>,
    M: Clone,
{
    type Mapper = M;

    fn build(&self, plan: &MappingPlan<K>) -> Result<M, MapperError> {
        self(plan)
    }
}

/// Resolves, builds and caches mappers into one target type.
pub struct MapperResolver<K, I, B>
where
    K: FieldKey,
    B: MapperBuilder<K>,
{
    target: GenericType,
    introspector: I,
    builder: B,
    cache: MapperCache<MapperKey<K>, B::Mapper>,
    config: ResolverConfig,
}

impl<K, I, B> MapperResolver<K, I, B>
where
    K: FieldKey,
    I: TypeIntrospector,
    B: MapperBuilder<K>,
{
    /// A resolver with the default configuration and an empty cache.
    pub fn new(target: GenericType, introspector: I, builder: B) -> Self {
        Self {
            target,
            introspector,
            builder,
            cache: MapperCache::ordered(),
            config: ResolverConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// The target type.
    pub fn target(&self) -> &GenericType {
        &self.target
    }

    /// The mapper cache.
    pub fn cache(&self) -> &MapperCache<MapperKey<K>, B::Mapper> {
        &self.cache
    }

    /// The mapper for `fields`, built on first request.
    pub fn mapper(&self, fields: &[K]) -> Result<B::Mapper, MapperError> {
        self.mapper_for_key(MapperKey::from(fields))
    }

    /// The mapper for `key`, built on first request.
    ///
    /// Concurrent first requests for the same key may each build a mapper;
    /// all of them get the one that was cached first.
    pub fn mapper_for_key(&self, key: MapperKey<K>) -> Result<B::Mapper, MapperError> {
        self.cache.get_or_try_insert_with(key, |key| {
            let plan = self.plan(key.fields())?;
            debug!(ty = %self.target, ?key, "building mapper");
            self.builder.build(&plan)
        })
    }

    /// Match `fields` against the target type without building or caching.
    pub fn plan(&self, fields: &[K]) -> Result<MappingPlan<K>, MapperError> {
        let pending = fields
            .iter()
            .enumerate()
            .map(|(position, field)| Pending {
                position,
                matcher: PropertyNameMatcher::new(field.name()),
            })
            .collect();

        let mut resolution = Resolution {
            introspector: &self.introspector,
            config: &self.config,
            descriptions: HashMap::new(),
        };
        let resolved = resolution.resolve_object(&self.target, pending, 0)?;

        let mut targets = vec![BindingTarget::Unmatched; fields.len()];
        for (position, steps) in resolved.paths {
            targets[position] = BindingTarget::from_path(PropertyPath::new(steps));
        }
        let bindings = fields
            .iter()
            .cloned()
            .zip(targets)
            .map(|(field, target)| FieldBinding { field, target })
            .collect();

        Ok(MappingPlan {
            target: self.target.clone(),
            root: resolved.plan,
            bindings,
        })
    }
}

/// A field (or what is left of its name) waiting to be matched at some level.
struct Pending {
    position: usize,
    matcher: PropertyNameMatcher,
}

struct Resolved {
    plan: ObjectPlan,
    /// Relative paths of the fields matched at or below this object.
    paths: Vec<(usize, Vec<PathStep>)>,
}

/// State of one planning pass; type descriptions are looked up once per pass.
struct Resolution<'r, I> {
    introspector: &'r I,
    config: &'r ResolverConfig,
    descriptions: HashMap<GenericType, Result<Arc<TypeDescription>, IntrospectError>>,
}

impl<I: TypeIntrospector> Resolution<'_, I> {
    fn describe(&mut self, ty: &GenericType) -> Result<Arc<TypeDescription>, IntrospectError> {
        if let Some(known) = self.descriptions.get(ty) {
            return known.clone();
        }
        let described = self.introspector.describe(ty).map(Arc::new);
        self.descriptions.insert(ty.clone(), described.clone());
        described
    }

    /// Whether fields can be mapped into members of `ty`.
    fn is_composite(&mut self, ty: &GenericType) -> bool {
        match ty {
            GenericType::Class(_) | GenericType::Parameterized { .. } => {
                self.describe(ty).is_ok_and(|desc| desc.is_composite())
            }
            _ => false,
        }
    }

    fn resolve_object(
        &mut self,
        ty: &GenericType,
        pending: Vec<Pending>,
        depth: usize,
    ) -> Result<Resolved, MapperError> {
        let columns = || pending.iter().map(|p| p.matcher.column().to_string()).collect();

        if depth > self.config.max_depth {
            return Err(MapperError::Unresolvable {
                target: ty.clone(),
                reason: UnresolvableReason::MaxDepthExceeded {
                    max_depth: self.config.max_depth,
                },
                fields: columns(),
            });
        }

        let desc = self.describe(ty)?;
        let names = desc.member_names();

        let mut matched: Vec<(usize, PropertyNameMatch)> = Vec::new();
        for field in &pending {
            let ranked = field.matcher.rank(names.iter().copied(), &self.config.matching);
            let pick = ranked.into_iter().find(|candidate| {
                candidate.found.is_full()
                    || desc
                        .member_type(candidate.found.property())
                        .is_some_and(|member| self.is_composite(member))
            });
            match pick {
                Some(candidate) => {
                    trace!(
                        field = field.matcher.column(),
                        remaining = field.matcher.remaining(),
                        property = candidate.found.property(),
                        score = candidate.found.score(),
                        "matched"
                    );
                    matched.push((field.position, candidate.found));
                }
                None => {
                    debug!(
                        field = field.matcher.column(),
                        remaining = field.matcher.remaining(),
                        ty = %ty,
                        "no member matches"
                    );
                }
            }
        }

        let constructor = select_constructor(&desc.constructors.usable, |name| {
            matched.iter().any(|(_, found)| found.property() == name)
        })
        .ok_or_else(|| MapperError::Unresolvable {
            target: ty.clone(),
            reason: UnresolvableReason::NoSuitableConstructor {
                rejected: desc.constructors.rejected.clone(),
            },
            fields: columns(),
        })?
        .clone();

        let mut paths = Vec::new();
        let mut nested: Vec<(PathStep, Vec<Pending>)> = Vec::new();
        for (position, found) in matched {
            let name = found.property();
            let step = if let Some((index, param)) = constructor.parameter(name) {
                PathStep::ConstructorParameter {
                    index,
                    name: name.to_string(),
                    ty: param.generic.clone(),
                }
            } else if let Some(property) = desc.property(name) {
                PathStep::Property {
                    name: name.to_string(),
                    ty: property.ty.clone(),
                }
            } else {
                debug!(
                    field = found.column(),
                    parameter = name,
                    "matched a parameter of a constructor that was not selected"
                );
                continue;
            };

            match found.leftover() {
                None => paths.push((position, vec![step])),
                Some(leftover) => {
                    let next = Pending {
                        position,
                        matcher: leftover.clone(),
                    };
                    match nested.iter_mut().find(|(existing, _)| *existing == step) {
                        Some((_, group)) => group.push(next),
                        None => nested.push((step, vec![next])),
                    }
                }
            }
        }

        let mut children = Vec::with_capacity(nested.len());
        for (step, group) in nested {
            let child = self.resolve_object(step.ty(), group, depth + 1)?;
            for (position, rest) in child.paths {
                let mut steps = Vec::with_capacity(rest.len() + 1);
                steps.push(step.clone());
                steps.extend(rest);
                paths.push((position, steps));
            }
            children.push((step, child.plan));
        }

        Ok(Resolved {
            plan: ObjectPlan {
                ty: ty.clone(),
                constructor,
                candidates: names.iter().map(|name| name.to_string()).collect(),
                children,
            },
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{DeclaredIntrospector, TypeDeclaration};
    use crate::key::FieldDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn integer() -> GenericType {
        GenericType::class("java/lang/Integer")
    }

    fn people() -> DeclaredIntrospector {
        DeclaredIntrospector::new()
            .with_type(
                TypeDeclaration::new("com/example/Person")
                    .constructor([("name", GenericType::string())])
                    .property("age", integer())
                    .property("address", GenericType::class("com/example/Address")),
            )
            .with_type(
                TypeDeclaration::new("com/example/Address")
                    .constructor_with([])
                    .property("street", GenericType::string())
                    .property("city", GenericType::string()),
            )
    }

    fn fields(names: &[&str]) -> Vec<FieldDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| FieldDescriptor::new(*name, i))
            .collect()
    }

    fn clone_plan(
        plan: &MappingPlan<FieldDescriptor>,
    ) -> Result<MappingPlan<FieldDescriptor>, MapperError> {
        Ok(plan.clone())
    }

    fn plan_of(names: &[&str]) -> Result<MappingPlan<FieldDescriptor>, MapperError> {
        let resolver = MapperResolver::new(
            GenericType::class("com/example/Person"),
            people(),
            clone_plan,
        );
        resolver.plan(&fields(names))
    }

    #[test]
    fn nested_property_through_leftover() {
        let plan = plan_of(&["name", "address_city"]).unwrap();
        let city = plan.binding(1).unwrap();
        let BindingTarget::Property(path) = &city.target else {
            panic!("expected a property binding, got {}", city.target);
        };
        assert_eq!(path.to_string(), "address.city");
        assert_eq!(path.depth(), 1);
        assert!(plan.root.child("address").is_some());
    }

    #[test]
    fn constructor_parameter_preferred_for_its_name() {
        let plan = plan_of(&["NAME", "age"]).unwrap();
        assert!(matches!(
            &plan.binding(0).unwrap().target,
            BindingTarget::ConstructorParameter(path) if path.to_string() == "name"
        ));
        assert!(matches!(
            &plan.binding(1).unwrap().target,
            BindingTarget::Property(path) if path.to_string() == "age"
        ));
    }

    #[test]
    fn unknown_field_is_unmatched() {
        let plan = plan_of(&["name", "unknownField"]).unwrap();
        let unmatched: Vec<_> = plan.unmatched().map(|f| f.name()).collect();
        assert_eq!(unmatched, ["unknownField"]);
        assert!(plan.unmatched_error().is_some());
    }

    #[test]
    fn leaf_types_are_not_entered() {
        // `name` is a String; `name_first` must not try to go inside it.
        let plan = plan_of(&["name", "name_first"]).unwrap();
        assert_eq!(plan.unmatched().count(), 1);
    }

    #[test]
    fn plan_renders_tree_and_bindings() {
        let plan = plan_of(&["name", "age", "address_street", "address_city", "zip"]).unwrap();
        insta::assert_snapshot!(plan, @r"
        new com.example.Person(java.lang.String name)
          address = new com.example.Address()
        name#0 -> constructor parameter name
        age#1 -> property age
        address_street#2 -> property address.street
        address_city#3 -> property address.city
        zip#4 -> unmatched
        ");
    }

    #[test]
    fn missing_required_parameter_is_unresolvable() {
        let introspector = DeclaredIntrospector::new().with_type(
            TypeDeclaration::new("com/example/Point")
                .constructor([("x", GenericType::int()), ("y", GenericType::int())]),
        );
        let resolver = MapperResolver::new(
            GenericType::class("com/example/Point"),
            introspector,
            clone_plan,
        );
        let err = resolver.plan(&fields(&["x"])).unwrap_err();
        assert!(matches!(
            err,
            MapperError::Unresolvable {
                reason: UnresolvableReason::NoSuitableConstructor { .. },
                ..
            }
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let introspector = DeclaredIntrospector::new().with_type(
            TypeDeclaration::new("com/example/Node")
                .constructor_with([])
                .property("value", integer())
                .property("next", GenericType::class("com/example/Node")),
        );
        let resolver = MapperResolver::new(
            GenericType::class("com/example/Node"),
            introspector,
            clone_plan,
        )
        .with_config(ResolverConfig {
            max_depth: 1,
            ..ResolverConfig::default()
        });

        assert!(resolver.plan(&fields(&["next_value"])).is_ok());
        let err = resolver.plan(&fields(&["next_next_value"])).unwrap_err();
        assert!(matches!(
            err,
            MapperError::Unresolvable {
                reason: UnresolvableReason::MaxDepthExceeded { max_depth: 1 },
                ..
            }
        ));
    }

    #[test]
    fn builds_once_per_key() {
        let builds = AtomicUsize::new(0);
        let resolver = MapperResolver::new(
            GenericType::class("com/example/Person"),
            people(),
            |plan: &MappingPlan<FieldDescriptor>| -> Result<_, MapperError> {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(plan.clone()))
            },
        );

        let first = resolver.mapper(&fields(&["name", "age"])).unwrap();
        let second = resolver.mapper(&fields(&["name", "age"])).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        resolver.mapper(&fields(&["age", "name"])).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cache().size(), 2);
    }

    #[test]
    fn build_errors_are_not_cached() {
        let resolver = MapperResolver::new(
            GenericType::class("com/example/Person"),
            people(),
            |plan: &MappingPlan<FieldDescriptor>| -> Result<(), MapperError> {
                match plan.unmatched_error() {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            },
        );
        let err = resolver.mapper(&fields(&["nmae"])).unwrap_err();
        assert!(matches!(err, MapperError::UnmatchedFields { .. }));
        assert!(resolver.cache().is_empty());
    }
}
