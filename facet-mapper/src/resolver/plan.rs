use core::fmt;

use crate::error::MapperError;
use crate::generic::GenericType;
use crate::introspect::ConstructorDefinition;

/// One hop from an object to one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// A property set after construction.
    Property {
        /// Property name.
        name: String,
        /// Property type.
        ty: GenericType,
    },
    /// An argument of the selected constructor.
    ConstructorParameter {
        /// Position in the constructor's parameter list.
        index: usize,
        /// Parameter name.
        name: String,
        /// Parameter type.
        ty: GenericType,
    },
}

impl PathStep {
    /// Member name.
    pub fn name(&self) -> &str {
        match self {
            PathStep::Property { name, .. } | PathStep::ConstructorParameter { name, .. } => name,
        }
    }

    /// Member type.
    pub fn ty(&self) -> &GenericType {
        match self {
            PathStep::Property { ty, .. } | PathStep::ConstructorParameter { ty, .. } => ty,
        }
    }
}

/// Path from the target object to the member a field is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    steps: Vec<PathStep>,
}

impl PropertyPath {
    pub(crate) fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// Steps from the target outwards; never empty.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// The member finally written.
    pub fn leaf(&self) -> &PathStep {
        // Paths are built with at least one step.
        &self.steps[self.steps.len() - 1]
    }

    /// Number of nested objects crossed on the way.
    pub fn depth(&self) -> usize {
        self.steps.len() - 1
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(step.name())?;
        }
        Ok(())
    }
}

/// Where a field's value goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingTarget {
    /// Written to a property, possibly of a nested object.
    Property(PropertyPath),
    /// Passed to a constructor, possibly of a nested object.
    ConstructorParameter(PropertyPath),
    /// No member matched.
    Unmatched,
}

impl BindingTarget {
    pub(crate) fn from_path(path: PropertyPath) -> Self {
        match path.leaf() {
            PathStep::Property { .. } => BindingTarget::Property(path),
            PathStep::ConstructorParameter { .. } => BindingTarget::ConstructorParameter(path),
        }
    }

    /// The path, unless unmatched.
    pub fn path(&self) -> Option<&PropertyPath> {
        match self {
            BindingTarget::Property(path) | BindingTarget::ConstructorParameter(path) => Some(path),
            BindingTarget::Unmatched => None,
        }
    }
}

impl fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Property(path) => write!(f, "property {path}"),
            BindingTarget::ConstructorParameter(path) => write!(f, "constructor parameter {path}"),
            BindingTarget::Unmatched => f.write_str("unmatched"),
        }
    }
}

/// One input field and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldBinding<K> {
    /// The input field.
    pub field: K,
    /// Its destination.
    pub target: BindingTarget,
}

/// How to instantiate one object of the target graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPlan {
    /// The object's type.
    pub ty: GenericType,
    /// The constructor to call.
    pub constructor: ConstructorDefinition,
    /// Every member name that fields were matched against.
    pub candidates: Vec<String>,
    /// Nested objects, by the member they are assigned to.
    pub children: Vec<(PathStep, ObjectPlan)>,
}

impl ObjectPlan {
    /// The nested object plan for the member named `name`.
    pub fn child(&self, name: &str) -> Option<&ObjectPlan> {
        self.children
            .iter()
            .find(|(step, _)| step.name() == name)
            .map(|(_, plan)| plan)
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (step, child) in &self.children {
            writeln!(
                f,
                "{:indent$}{} = new {}",
                "",
                step.name(),
                child.constructor,
                indent = indent
            )?;
            child.fmt_tree(f, indent + 2)?;
        }
        Ok(())
    }
}

/// Everything a mapper builder needs: where each field goes and how to
/// construct every object on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPlan<K> {
    /// The mapper's target type.
    pub target: GenericType,
    /// Plan for the target object, with nested objects below it.
    pub root: ObjectPlan,
    /// One binding per input field, in input order.
    pub bindings: Vec<FieldBinding<K>>,
}

impl<K> MappingPlan<K> {
    /// Fields that matched no member.
    pub fn unmatched(&self) -> impl Iterator<Item = &K> + '_ {
        self.bindings
            .iter()
            .filter(|b| b.target == BindingTarget::Unmatched)
            .map(|b| &b.field)
    }

    /// The binding of the field at `position` in the input.
    pub fn binding(&self, position: usize) -> Option<&FieldBinding<K>> {
        self.bindings.get(position)
    }
}

impl<K: crate::FieldKey> MappingPlan<K> {
    /// A [`MapperError::UnmatchedFields`] for builders that refuse unmatched
    /// fields, or `None` when every field matched.
    pub fn unmatched_error(&self) -> Option<MapperError> {
        let mut unmatched = self.unmatched().peekable();
        unmatched.peek()?;
        let known = self.root.candidates.iter().map(String::as_str);
        Some(MapperError::unmatched(
            &self.target,
            unmatched.map(|k| k.name()),
            known,
        ))
    }
}

impl<K: fmt::Display> fmt::Display for MappingPlan<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "new {}", self.root.constructor)?;
        self.root.fmt_tree(f, 2)?;
        for binding in &self.bindings {
            writeln!(f, "{} -> {}", binding.field, binding.target)?;
        }
        Ok(())
    }
}
