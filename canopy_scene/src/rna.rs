// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property lookup by path.
//!
//! Only a fixed set of builtin properties per kind is exposed, plus custom
//! properties through the `["name"]` syntax.

use alloc::vec;

use crate::database::Main;
use crate::id::IdRef;
use crate::property::IdProperty;

/// Extracts `name` from a custom-property path `["name"]`.
#[must_use]
pub fn custom_property_name(path: &str) -> Option<&str> {
    let inner = path.strip_prefix("[\"")?.strip_suffix("\"]")?;
    (!inner.is_empty() && !inner.contains('"')).then_some(inner)
}

/// Resolves `path` on the entity `id` to a property value.
///
/// Returns `None` if the entity does not exist or has no such property.
#[must_use]
pub fn resolve_property(main: &Main, id: IdRef, path: &str) -> Option<IdProperty> {
    if let Some(name) = custom_property_name(path) {
        return main.header(id)?.properties.get(name).cloned();
    }
    let value = match id {
        IdRef::Object(h) => {
            let ob = main.get_object(h)?;
            let (scale, _, location) = ob.world.to_scale_rotation_translation();
            match path {
                "color" => IdProperty::FloatArray(ob.color.to_array().to_vec()),
                "pass_index" => IdProperty::Int(ob.pass_index),
                "location" => IdProperty::FloatArray(location.to_array().to_vec()),
                "scale" => IdProperty::FloatArray(scale.to_array().to_vec()),
                _ => return None,
            }
        }
        IdRef::Material(h) => {
            let ma = main.get_material(h)?;
            match path {
                "diffuse_color" => IdProperty::FloatArray(ma.diffuse_color.to_array().to_vec()),
                "roughness" => IdProperty::Float(ma.roughness),
                "metallic" => IdProperty::Float(ma.metallic),
                "pass_index" => IdProperty::Int(ma.pass_index),
                _ => return None,
            }
        }
        IdRef::Light(h) => {
            let la = main.get_light(h)?;
            match path {
                "color" => IdProperty::FloatArray(la.color.to_array().to_vec()),
                "energy" => IdProperty::Float(la.energy),
                _ => return None,
            }
        }
        IdRef::Camera(h) => match path {
            "lens" => IdProperty::Float(main.get_camera(h)?.lens),
            _ => return None,
        },
        IdRef::ParticleSettings(h) => {
            let part = main.get_particle_settings(h)?;
            match path {
                "count" => IdProperty::Int(i32::try_from(part.count).unwrap_or(i32::MAX)),
                "particle_size" => IdProperty::Float(part.size),
                _ => return None,
            }
        }
        IdRef::Scene(h) => {
            let scene = main.get_scene(h)?;
            match path {
                "use_nodes" => IdProperty::Bool(scene.compositor.is_some()),
                "view_layers" => IdProperty::IntArray(vec![
                    i32::try_from(scene.view_layers.len()).unwrap_or(i32::MAX),
                ]),
                _ => return None,
            }
        }
        _ => return None,
    };
    Some(value)
}
