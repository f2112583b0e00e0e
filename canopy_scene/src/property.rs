// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Custom properties attached to entities, bones, nodes and strips.

use alloc::string::String;
use alloc::vec::Vec;

use crate::id::IdRef;

/// A single custom property value.
#[derive(Clone, Debug, PartialEq)]
pub enum IdProperty {
    /// 32-bit integer.
    Int(i32),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Integer array.
    IntArray(Vec<i32>),
    /// Float array.
    FloatArray(Vec<f32>),
    /// Double array.
    DoubleArray(Vec<f64>),
    /// Nested property group.
    Group(IdProperties),
    /// Reference to another entity; `None` for an unset pointer.
    Id(Option<IdRef>),
}

/// An ordered group of named [`IdProperty`] values.
///
/// Insertion order is preserved so that traversals over properties are
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdProperties {
    entries: Vec<(String, IdProperty)>,
}

impl IdProperties {
    /// Creates an empty property group.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets `name` to `value`, replacing any existing value of that name.
    pub fn set(&mut self, name: impl Into<String>, value: IdProperty) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: IdProperty) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IdProperty> {
        self.entries
            .iter()
            .find_map(|(n, value)| (n == name).then_some(value))
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<IdProperty> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdProperty)> + '_ {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of top-level properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `f` for every entity referenced by an [`IdProperty::Id`],
    /// descending into nested groups.
    pub fn for_each_id(&self, f: &mut impl FnMut(IdRef)) {
        for (_, value) in &self.entries {
            match value {
                IdProperty::Id(Some(id)) => f(*id),
                IdProperty::Group(group) => group.for_each_id(f),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MaterialId, ObjectId};
    use alloc::vec;

    #[test]
    fn set_replaces_and_keeps_order() {
        let mut props = IdProperties::new();
        props.set("a", IdProperty::Int(1));
        props.set("b", IdProperty::Float(2.0));
        props.set("a", IdProperty::Int(3));

        let names: Vec<_> = props.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(props.get("a"), Some(&IdProperty::Int(3)));
        assert_eq!(props.remove("b"), Some(IdProperty::Float(2.0)));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn id_pointers_are_visited_in_nested_groups() {
        let inner = IdProperties::new().with("mat", IdProperty::Id(Some(MaterialId(2).into())));
        let props = IdProperties::new()
            .with("target", IdProperty::Id(Some(ObjectId(1).into())))
            .with("unset", IdProperty::Id(None))
            .with("group", IdProperty::Group(inner));

        let mut seen = Vec::new();
        props.for_each_id(&mut |id| seen.push(id));
        assert_eq!(
            seen,
            vec![IdRef::from(ObjectId(1)), IdRef::from(MaterialId(2))]
        );
    }
}
