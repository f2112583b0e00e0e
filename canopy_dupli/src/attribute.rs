// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named color attributes of instances, for shading.

use glam::Vec4;

use canopy_scene::{IdProperty, IdRef, Main, ObjectId, rna};

use crate::dupli::DupliObject;

#[expect(
    clippy::cast_possible_truncation,
    reason = "colors are single precision"
)]
fn narrow(value: f64) -> f32 {
    value as f32
}

/// Converts a property value to RGBA.
///
/// Scalars broadcast to RGB with alpha one. Arrays of up to four numbers
/// fill the leading channels of `(0, 0, 0, 1)`. Anything else has no color
/// form.
fn property_rgba(value: &IdProperty) -> Option<Vec4> {
    fn padded(values: impl ExactSizeIterator<Item = f32>) -> Option<Vec4> {
        if values.len() > 4 {
            return None;
        }
        let mut rgba = Vec4::W;
        for (channel, value) in values.enumerate() {
            rgba[channel] = value;
        }
        Some(rgba)
    }
    let broadcast = |v: f32| Vec4::new(v, v, v, 1.0);

    match value {
        IdProperty::Int(v) => Some(broadcast(*v as f32)),
        IdProperty::Float(v) => Some(broadcast(*v)),
        IdProperty::Double(v) => Some(broadcast(narrow(*v))),
        IdProperty::Bool(v) => Some(broadcast(if *v { 1.0 } else { 0.0 })),
        IdProperty::IntArray(values) => padded(values.iter().map(|&v| v as f32)),
        IdProperty::FloatArray(values) => padded(values.iter().copied()),
        IdProperty::DoubleArray(values) => padded(values.iter().map(|&v| narrow(v))),
        IdProperty::String(_) | IdProperty::Group(_) | IdProperty::Id(_) => None,
    }
}

/// Looks `name` up on `id`: first its custom properties, then its built-in
/// properties.
fn id_rgba(main: &Main, id: IdRef, name: &str) -> Option<Vec4> {
    if let Some(value) = main.header(id)?.properties.get(name) {
        return property_rgba(value);
    }
    property_rgba(&rna::resolve_property(main, id, name)?)
}

/// Finds the color attribute `name` for an object being drawn.
///
/// `dupli` is the instance the object is drawn for, and `dupli_parent` the
/// object that generated it. The first source that has the attribute wins:
///
/// 1. the settings of the particle system that emitted the instance,
/// 2. the geometry instances that placed it, innermost first,
/// 3. the instancing object,
/// 4. the object itself,
/// 5. the object's data.
///
/// Returns `None` when no source has a value with a color form. Callers
/// that need a value use `unwrap_or_default`, which is transparent black.
///
/// # Example
///
/// ```
/// use canopy_dupli::find_rgba_attribute;
/// use canopy_scene::{IdProperty, Main, Object, ObjectType};
/// use glam::Vec4;
///
/// let mut main = Main::new();
/// let mut object = Object::new("Cube", ObjectType::Empty);
/// object.id.properties.set("tint", IdProperty::FloatArray(vec![1.0, 0.5]));
/// let cube = main.add_object(object);
///
/// let tint = find_rgba_attribute(&main, cube, None, None, "tint");
/// assert_eq!(tint, Some(Vec4::new(1.0, 0.5, 0.0, 1.0)));
/// assert_eq!(find_rgba_attribute(&main, cube, None, None, "missing"), None);
/// ```
#[must_use]
pub fn find_rgba_attribute(
    main: &Main,
    object: ObjectId,
    dupli: Option<&DupliObject<'_>>,
    dupli_parent: Option<ObjectId>,
    name: &str,
) -> Option<Vec4> {
    if name.is_empty() {
        return None;
    }

    if let Some(dupli) = dupli {
        let settings = dupli.particle_system.and_then(|system| {
            main.get_object(system.object)?
                .particle_systems
                .get(system.index)?
                .settings
        });
        let from_settings =
            settings.and_then(|id| id_rgba(main, IdRef::ParticleSettings(id), name));
        if let Some(rgba) = from_settings {
            return Some(rgba);
        }
        if let Some(rgba) = dupli
            .instance_data
            .iter()
            .find_map(|instance| instance.attribute_rgba(name))
        {
            return Some(rgba);
        }
    }

    let from_parent = dupli_parent.and_then(|parent| id_rgba(main, IdRef::Object(parent), name));
    if let Some(rgba) = from_parent {
        return Some(rgba);
    }
    if let Some(rgba) = id_rgba(main, IdRef::Object(object), name) {
        return Some(rgba);
    }
    let data = main.get_object(object)?.data?;
    id_rgba(main, data, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn properties_convert_to_rgba() {
        assert_eq!(
            property_rgba(&IdProperty::Int(2)),
            Some(Vec4::new(2.0, 2.0, 2.0, 1.0))
        );
        assert_eq!(property_rgba(&IdProperty::Bool(true)), Some(Vec4::ONE));
        assert_eq!(
            property_rgba(&IdProperty::IntArray(vec![1, 2, 3])),
            Some(Vec4::new(1.0, 2.0, 3.0, 1.0))
        );
        assert_eq!(
            property_rgba(&IdProperty::DoubleArray(vec![0.25; 4])),
            Some(Vec4::splat(0.25))
        );
        assert_eq!(property_rgba(&IdProperty::FloatArray(vec![0.0; 5])), None);
        assert_eq!(property_rgba(&IdProperty::String("red".into())), None);
    }
}
