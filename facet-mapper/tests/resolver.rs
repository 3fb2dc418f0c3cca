use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use facet_mapper::{
    BindingTarget, ClassFileIntrospector, ClassPath, FieldDescriptor, GenericType, MapperBuilder,
    MapperError, MapperResolver, MappingPlan, PathStep,
};
use facet_testhelpers::classfile::{ACC_PUBLIC, ClassFileBuilder, MethodSpec, Param};
use facet_testhelpers::test;

const STRING: &str = "Ljava/lang/String;";

/// Address has a no-arg constructor and setters.
fn address_class() -> Vec<u8> {
    ClassFileBuilder::new("com/example/Address")
        .method(MethodSpec::constructor("com/example/Address", []))
        .method(MethodSpec::setter("setStreet", STRING))
        .method(MethodSpec::setter("setCity", STRING))
        .build()
}

/// Person is immutable except for its address.
fn person_class() -> Vec<u8> {
    ClassFileBuilder::new("com/example/Person")
        .field(ACC_PUBLIC, "address", "Lcom/example/Address;", None)
        .method(MethodSpec::constructor(
            "com/example/Person",
            [Param::new("firstName", STRING), Param::new("age", "I")],
        ))
        .method(MethodSpec::constructor(
            "com/example/Person",
            [Param::new("firstName", STRING)],
        ))
        .build()
}

fn introspector() -> ClassFileIntrospector<ClassPath> {
    ClassFileIntrospector::new(
        ClassPath::new()
            .with_class("com/example/Person", person_class())
            .with_class("com/example/Address", address_class()),
    )
}

fn fields(names: &[&str]) -> Vec<FieldDescriptor> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| FieldDescriptor::new(*name, i))
        .collect()
}

/// Keeps the plan as the "mapper" and counts builds.
#[derive(Default)]
struct RecordingBuilder {
    builds: AtomicUsize,
}

impl MapperBuilder<FieldDescriptor> for RecordingBuilder {
    type Mapper = Arc<MappingPlan<FieldDescriptor>>;

    fn build(&self, plan: &MappingPlan<FieldDescriptor>) -> Result<Self::Mapper, MapperError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = plan.unmatched_error() {
            return Err(err);
        }
        Ok(Arc::new(plan.clone()))
    }
}

fn resolver() -> MapperResolver<FieldDescriptor, ClassFileIntrospector<ClassPath>, RecordingBuilder> {
    MapperResolver::new(
        GenericType::class("com/example/Person"),
        introspector(),
        RecordingBuilder::default(),
    )
}

#[test]
fn csv_header_maps_into_nested_objects() {
    let resolver = resolver();
    let mapper = resolver
        .mapper(&fields(&["FIRST_NAME", "age", "address_street", "ADDRESS_CITY"]))
        .unwrap();

    insta::assert_snapshot!(mapper, @r"
    new com.example.Person(java.lang.String firstName, int age)
      address = new com.example.Address()
    FIRST_NAME#0 -> constructor parameter firstName
    age#1 -> constructor parameter age
    address_street#2 -> property address.street
    ADDRESS_CITY#3 -> property address.city
    ");

    let city = &mapper.bindings[3];
    let BindingTarget::Property(path) = &city.target else {
        panic!("unexpected binding {}", city.target);
    };
    assert!(matches!(
        path.steps(),
        [PathStep::Property { name: address, .. }, PathStep::Property { name: city, .. }]
            if address == "address" && city == "city"
    ));
}

#[test]
fn constructor_without_unmatched_required_parameters_is_used() {
    let resolver = resolver();
    let mapper = resolver.mapper(&fields(&["firstName"])).unwrap();
    let params: Vec<_> = mapper
        .root
        .constructor
        .parameters
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(params, ["firstName"]);
}

#[test]
fn unknown_field_is_rejected_with_suggestion() {
    let resolver = resolver();
    let err = resolver.mapper(&fields(&["firstName", "agee"])).unwrap_err();
    let MapperError::UnmatchedFields { fields, .. } = &err else {
        panic!("expected unmatched fields, got {err:?}");
    };
    assert_eq!(fields, &["agee"]);
    #[cfg(feature = "suggestions")]
    assert!(err.to_string().contains("did you mean `age` instead of `agee`?"));
    assert!(resolver.cache().is_empty());
}

#[test]
fn mapper_is_built_once_per_field_shape() {
    let resolver = resolver();
    let header = fields(&["firstName", "age"]);

    let first = resolver.mapper(&header).unwrap();
    let second = resolver.mapper(&header).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let reordered = fields(&["age", "firstName"]);
    let third = resolver.mapper(&reordered).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));

    assert_eq!(resolver.cache().size(), 2);
}

#[test]
fn concurrent_requests_converge_on_one_mapper() {
    let resolver = resolver();
    let header = fields(&["firstName", "address_city"]);

    let mappers: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| resolver.mapper(&header).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for mapper in &mappers[1..] {
        assert!(Arc::ptr_eq(&mappers[0], mapper));
    }
    assert_eq!(resolver.cache().size(), 1);
}

#[test]
fn generic_target_binds_type_arguments() {
    let pair = ClassFileBuilder::new("com/example/Pair")
        .signature("<T:Ljava/lang/Object;U:Ljava/lang/Object;>Ljava/lang/Object;")
        .method(MethodSpec::constructor(
            "com/example/Pair",
            [
                Param::new("first", "Ljava/lang/Object;").signature("TT;"),
                Param::new("second", "Ljava/lang/Object;").signature("TU;"),
            ],
        ))
        .build();
    let introspector =
        ClassFileIntrospector::new(ClassPath::new().with_class("com/example/Pair", pair));
    let target = GenericType::parameterized(
        "com/example/Pair",
        [GenericType::string(), GenericType::class("java/lang/Integer")],
    );
    let resolver = MapperResolver::new(target, introspector, RecordingBuilder::default());

    let mapper = resolver.mapper(&fields(&["first", "second"])).unwrap();
    insta::assert_snapshot!(mapper, @r"
    new com.example.Pair(java.lang.String first, java.lang.Integer second)
    first#0 -> constructor parameter first
    second#1 -> constructor parameter second
    ");
}
