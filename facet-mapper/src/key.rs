//! Field descriptors and the composite key mappers are cached under.

use core::fmt;
use core::hash::Hash;
use std::sync::Arc;

use crate::generic::GenericType;

/// One named, positioned unit of source data.
///
/// Format adapters (CSV headers, result-set metadata, record schemas) implement
/// this for their own column types; [`FieldDescriptor`] is the stock
/// implementation.
pub trait FieldKey: Clone + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    /// Name the field is matched by.
    fn name(&self) -> &str;

    /// Ordinal position of the field in its source.
    fn index(&self) -> usize;
}

/// A source field: name, ordinal, and an optional type token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldDescriptor {
    index: usize,
    name: Arc<str>,
    type_token: Option<GenericType>,
}

impl FieldDescriptor {
    /// Create an untyped field descriptor.
    pub fn new(name: impl Into<Arc<str>>, index: usize) -> Self {
        Self {
            index,
            name: name.into(),
            type_token: None,
        }
    }

    /// Attach the source's type for this field.
    pub fn with_type(mut self, type_token: GenericType) -> Self {
        self.type_token = Some(type_token);
        self
    }

    /// The source type, when the adapter knows it.
    pub fn type_token(&self) -> Option<&GenericType> {
        self.type_token.as_ref()
    }
}

impl FieldKey for FieldDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Identity of a mapper: the ordered field shape it was built for.
///
/// Two keys are equal iff their fields are equal element-wise. Keys are
/// immutable and cheap to clone.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MapperKey<K> {
    fields: Arc<[K]>,
}

impl<K> Clone for MapperKey<K> {
    fn clone(&self) -> Self {
        Self {
            fields: Arc::clone(&self.fields),
        }
    }
}

impl<K> MapperKey<K> {
    /// Build a key from fields in source order.
    pub fn new(fields: impl IntoIterator<Item = K>) -> Self {
        fields.into_iter().collect()
    }

    /// The fields, in source order.
    pub fn fields(&self) -> &[K] {
        &self.fields
    }

    /// Number of fields in the key.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the key has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K> FromIterator<K> for MapperKey<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<K: Clone> From<&[K]> for MapperKey<K> {
    fn from(fields: &[K]) -> Self {
        Self {
            fields: fields.into(),
        }
    }
}

impl<K: fmt::Display> fmt::Display for MapperKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(names: &[&str]) -> MapperKey<FieldDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| FieldDescriptor::new(*name, i + 1))
            .collect()
    }

    #[test]
    fn keys_compare_element_wise() {
        assert_eq!(key(&["col1", "col2"]), key(&["col1", "col2"]));
        assert_ne!(key(&["col1", "col2"]), key(&["col1"]));
        assert_ne!(key(&["col1", "col2"]), key(&["col2", "col1"]));
    }

    #[test]
    fn type_token_is_part_of_identity() {
        let plain = MapperKey::new([FieldDescriptor::new("id", 0)]);
        let typed = MapperKey::new([FieldDescriptor::new("id", 0).with_type(GenericType::long())]);
        assert_ne!(plain, typed);
    }

    #[test]
    fn ordering_is_by_position_first() {
        let a = FieldDescriptor::new("zeta", 0);
        let b = FieldDescriptor::new("alpha", 1);
        assert!(a < b);
        assert!(key(&["a"]) < key(&["a", "b"]));
    }

    #[test]
    fn display_lists_fields() {
        assert_eq!(key(&["id", "name"]).to_string(), "[id#1, name#2]");
    }
}
