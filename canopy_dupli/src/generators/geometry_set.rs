// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Components and instances of evaluated geometry.
//!
//! Geometry components that the object cannot draw as itself become
//! duplis carrying the component data. Instances become duplis of the
//! referenced object, of every member of the referenced collection, or
//! recurse into the nested geometry.

use glam::Mat4;

use canopy_scene::{GeometrySet, IdRef, InstanceReference, ObjectType};

use crate::context::{DupliContext, Traversal, id_index};
use crate::dupli::InstanceData;

pub(super) fn make_duplis<'a>(ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
    let Some(object) = ctx.object() else {
        return;
    };
    let Some(set) = &object.geometry_set else {
        return;
    };
    make_duplis_impl(ctx, traversal, set, object.world, false);
}

/// Components the object of `ctx` would not draw itself.
fn components(
    set: &GeometrySet,
    kind: ObjectType,
    is_instance: bool,
) -> impl Iterator<Item = IdRef> {
    let mesh = set
        .mesh
        .filter(|_| is_instance || kind != ObjectType::Mesh)
        .map(IdRef::Mesh);
    let volume = set
        .volume
        .filter(|_| is_instance || kind != ObjectType::Volume)
        .map(IdRef::Volume);
    let curves = set
        .curves
        .filter(|_| {
            let drawn_as_self =
                matches!(kind, ObjectType::Curve | ObjectType::Font | ObjectType::Curves);
            is_instance || !drawn_as_self
        })
        .map(IdRef::Curves);
    let point_cloud = set
        .point_cloud
        .filter(|_| is_instance || kind != ObjectType::PointCloud)
        .map(IdRef::PointCloud);
    let grease_pencil = set
        .grease_pencil
        .filter(|_| is_instance || kind != ObjectType::GreasePencil)
        .map(IdRef::GreasePencil);
    [mesh, volume, curves, point_cloud, grease_pencil]
        .into_iter()
        .flatten()
}

fn make_duplis_impl<'a>(
    ctx: &DupliContext<'a, '_>,
    traversal: &mut Traversal<'a>,
    set: &'a GeometrySet,
    parent: Mat4,
    is_instance: bool,
) {
    let main = ctx.main;
    let Some(object) = ctx.object() else {
        return;
    };

    let mut component_index = 0;
    for data in components(set, object.kind, is_instance) {
        ctx.make_dupli(traversal, ctx.object, Some(data), parent, component_index, None);
        component_index += 1;
    }

    let Some(instances) = &set.instances else {
        return;
    };
    // Instances get their own level when components took the low indices.
    let sub_ctx;
    let instances_ctx = if component_index > 0 {
        let Some(sub) = ctx.descend(ctx.object, None, component_index, None) else {
            return;
        };
        sub_ctx = sub;
        &sub_ctx
    } else {
        ctx
    };
    let is_preview = !is_instance && ctx.options.preview_object == Some(ctx.object);

    for (i, (&handle, transform)) in instances
        .handles
        .iter()
        .zip(&instances.transforms)
        .enumerate()
    {
        let Some(reference) = instances.references.get(handle) else {
            continue;
        };
        let preview_ctx;
        let ctx = if is_preview {
            let mut with_preview = instances_ctx.clone();
            with_preview.preview_instance_index = Some(i);
            preview_ctx = with_preview;
            &preview_ctx
        } else {
            instances_ctx
        };
        let id = instances.id(i);
        let instance = InstanceData { instances, index: i };
        let matrix = parent * *transform;

        match reference {
            InstanceReference::None => {}
            InstanceReference::Object(target) => {
                let Some(target_object) = main.get_object(*target) else {
                    continue;
                };
                let space = matrix * target_object.world.inverse();
                ctx.make_dupli(traversal, *target, None, matrix, id, Some(instance));
                ctx.recurse(traversal, *target, space, id, Some(instance));
            }
            InstanceReference::Collection(collection_id) => {
                let Some(collection) = main.get_collection(*collection_id) else {
                    continue;
                };
                let collection_matrix =
                    matrix * Mat4::from_translation(-collection.instance_offset);
                let Some(sub) = ctx.descend(ctx.object, None, id, Some(instance)) else {
                    continue;
                };
                let members = main.collection_visible_objects(*collection_id, ctx.mode);
                let members = members
                    .into_iter()
                    .map(|(_, member)| member)
                    .filter(|&member| member != ctx.object && ctx.options.includes(member));
                for (index, member) in members.enumerate() {
                    let Some(member_object) = main.get_object(member) else {
                        continue;
                    };
                    let member_matrix = collection_matrix * member_object.world;
                    sub.make_dupli(traversal, member, None, member_matrix, id_index(index), None);
                    // Nested instances are numbered from the next member index.
                    sub.recurse(traversal, member, collection_matrix, id_index(index + 1), None);
                }
            }
            InstanceReference::GeometrySet(nested) => {
                if let Some(sub) = ctx.descend(ctx.object, None, id, Some(instance)) {
                    make_duplis_impl(&sub, traversal, nested, matrix, true);
                }
            }
        }
    }
}
