// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapping of RNA-style property paths to graph nodes.
//!
//! Drivers and animation address properties by path. A path is resolved to
//! the node that writes the property (`Entry`) or the node after which its
//! final value is available (`Exit`).

use canopy_scene::{IdRef, Main, rna::custom_property_name};

use crate::key::{ComponentKey, NodeKey, NodeType, OperationCode, OperationKey};

/// Which side of a property's evaluation a key should point to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RnaPointSource {
    /// The node that writes the property.
    Entry,
    /// The node after which the property has its final value.
    Exit,
}

/// Transform channels of objects.
const TRANSFORM_PROPERTIES: &[&str] = &[
    "location",
    "rotation_euler",
    "rotation_quaternion",
    "rotation_axis_angle",
    "rotation_mode",
    "scale",
    "delta_location",
    "delta_rotation_euler",
    "delta_rotation_quaternion",
    "delta_scale",
    "matrix_world",
    "matrix_basis",
    "matrix_local",
];

/// Splits `prefix["name"]rest` into `("name", rest)`.
pub(crate) fn split_collection_item<'p>(
    path: &'p str,
    prefix: &str,
) -> Option<(&'p str, &'p str)> {
    let inner = path.strip_prefix(prefix)?.strip_prefix("[\"")?;
    let end = inner.find("\"]")?;
    Some((&inner[..end], &inner[end + 2..]))
}

/// First path segment, without array subscripts.
fn head(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    &path[..end]
}

/// The property-owning entity a path resolves to, and the remaining path.
///
/// Follows pointers into other entities (`data.`, `shape_keys.`,
/// `node_tree.`) so the returned entity is the one that owns the property.
#[must_use]
pub fn resolve_owner<'p>(main: &Main, id: IdRef, path: &'p str) -> (IdRef, &'p str) {
    let mut id = id;
    let mut path = path;
    loop {
        let next = match id {
            IdRef::Object(ob) => path
                .strip_prefix("data.")
                .and_then(|rest| Some((main.get_object(ob)?.data?, rest))),
            IdRef::Mesh(me) => path
                .strip_prefix("shape_keys.")
                .and_then(|rest| Some((main.get_mesh(me)?.key?.into(), rest))),
            IdRef::Curve(cu) => path
                .strip_prefix("shape_keys.")
                .and_then(|rest| Some((main.get_curve(cu)?.key?.into(), rest))),
            IdRef::Lattice(lt) => path
                .strip_prefix("shape_keys.")
                .and_then(|rest| Some((main.get_lattice(lt)?.key?.into(), rest))),
            IdRef::Material(ma) => path
                .strip_prefix("node_tree.")
                .and_then(|rest| Some((main.get_material(ma)?.node_tree?.into(), rest))),
            IdRef::World(wo) => path
                .strip_prefix("node_tree.")
                .and_then(|rest| Some((main.get_world(wo)?.node_tree?.into(), rest))),
            IdRef::Light(la) => path
                .strip_prefix("node_tree.")
                .and_then(|rest| Some((main.get_light(la)?.node_tree?.into(), rest))),
            IdRef::LineStyle(ls) => path
                .strip_prefix("node_tree.")
                .and_then(|rest| Some((main.get_line_style(ls)?.node_tree?.into(), rest))),
            IdRef::Texture(tex) => path
                .strip_prefix("node_tree.")
                .and_then(|rest| Some((main.get_texture(tex)?.node_tree?.into(), rest))),
            IdRef::Scene(sce) => path
                .strip_prefix("node_tree.")
                .and_then(|rest| Some((main.get_scene(sce)?.compositor?.into(), rest))),
            _ => None,
        };
        match next {
            Some((owner, rest)) => {
                id = owner;
                path = rest;
            }
            None => return (id, path),
        }
    }
}

/// Resolves `path` on `id` to a node key.
///
/// Unknown properties fall back to the parameters evaluation of the owning
/// entity. `frame_current` on a scene resolves to the time source.
#[must_use]
pub fn property_key<'p>(
    main: &Main,
    id: IdRef,
    path: &'p str,
    source: RnaPointSource,
) -> NodeKey<'p> {
    let (id, path) = resolve_owner(main, id, path);

    if let Some(name) = custom_property_name(path) {
        return OperationKey::new(id, NodeType::Parameters, OperationCode::IdProperty)
            .named(name)
            .into();
    }

    match id {
        IdRef::Object(_) => {
            if let Some((bone, rest)) = split_collection_item(path, "pose.bones") {
                let opcode = if rest.starts_with(".constraints") {
                    OperationCode::BoneConstraints
                } else {
                    match source {
                        RnaPointSource::Entry => OperationCode::BoneLocal,
                        RnaPointSource::Exit => OperationCode::BoneDone,
                    }
                };
                return OperationKey::new(id, NodeType::Bone, opcode)
                    .in_component(bone)
                    .into();
            }
            if path.starts_with("constraints") {
                let opcode = OperationCode::TransformConstraints;
                return OperationKey::new(id, NodeType::Transform, opcode).into();
            }
            if let Some((modifier, _)) = split_collection_item(path, "modifiers") {
                return OperationKey::new(id, NodeType::Geometry, OperationCode::Modifier)
                    .named(modifier)
                    .into();
            }
            let property = head(path);
            if TRANSFORM_PROPERTIES.contains(&property) {
                let opcode = match source {
                    RnaPointSource::Entry => OperationCode::TransformLocal,
                    RnaPointSource::Exit => OperationCode::TransformFinal,
                };
                return OperationKey::new(id, NodeType::Transform, opcode).into();
            }
            if matches!(property, "hide_viewport" | "hide_render" | "hide_select") {
                return ComponentKey::new(id, NodeType::Visibility).into();
            }
        }
        IdRef::Scene(_) if path == "frame_current" => return NodeKey::TimeSource,
        IdRef::Armature(_) if path.starts_with("bones[") => {
            return ComponentKey::new(id, NodeType::Armature).into();
        }
        IdRef::Key(_) => {
            if let Some((block, _)) = split_collection_item(path, "key_blocks") {
                return OperationKey::new(id, NodeType::Parameters, OperationCode::ParametersEval)
                    .named(block)
                    .into();
            }
        }
        IdRef::Speaker(_) | IdRef::Sound(_) if matches!(head(path), "volume" | "pitch") => {
            return ComponentKey::new(id, NodeType::Audio).into();
        }
        _ => {}
    }

    OperationKey::new(id, NodeType::Parameters, OperationCode::ParametersEval).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_scene::{Mesh, Object, ObjectType};

    #[test]
    fn collection_items_split() {
        assert_eq!(
            split_collection_item("pose.bones[\"hand\"].location", "pose.bones"),
            Some(("hand", ".location"))
        );
        assert_eq!(split_collection_item("location", "pose.bones"), None);
    }

    #[test]
    fn object_paths() {
        let mut main = Main::new();
        let me = main.add_mesh(Mesh::from_points("Mesh", alloc::vec![], alloc::vec![]));
        let ob = main.add_object(Object::new("Ob", ObjectType::Mesh).with_data(me));
        let id: IdRef = ob.into();

        assert_eq!(
            property_key(&main, id, "location", RnaPointSource::Exit),
            OperationKey::new(id, NodeType::Transform, OperationCode::TransformFinal).into()
        );
        assert_eq!(
            property_key(&main, id, "pose.bones[\"hand\"].scale", RnaPointSource::Entry),
            OperationKey::new(id, NodeType::Bone, OperationCode::BoneLocal)
                .in_component("hand")
                .into()
        );
        assert_eq!(
            property_key(&main, id, "[\"tint\"]", RnaPointSource::Entry),
            OperationKey::new(id, NodeType::Parameters, OperationCode::IdProperty)
                .named("tint")
                .into()
        );
        assert_eq!(
            property_key(&main, id, "data.auto_smooth", RnaPointSource::Entry),
            OperationKey::new(me, NodeType::Parameters, OperationCode::ParametersEval).into(),
            "pointer into object data"
        );
    }
}
