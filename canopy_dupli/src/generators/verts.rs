// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Children placed on the vertices of a mesh or the points of a point cloud.

use glam::{Mat3, Mat4, Quat, Vec3};

use canopy_scene::{DupliFlags, IdRef, Object, ObjectId};

use super::for_each_child;
use crate::context::{DupliContext, Traversal, id_index};
use crate::math::vec_to_quat;

/// A child of the instancer, about to be placed on its vertices.
struct VertexChild<'a> {
    id: ObjectId,
    object: &'a Object,
    /// Turns instancer-space offsets into the child's own frame.
    basis: Mat3,
}

impl<'a> VertexChild<'a> {
    fn new(ctx: &DupliContext<'a, '_>, id: ObjectId) -> Option<Self> {
        let parent = ctx.object()?;
        let object = ctx.main.get_object(id)?;
        Some(Self {
            id,
            object,
            basis: Mat3::from_mat4(object.world.inverse() * parent.world),
        })
    }

    /// Emits the child at `position` turned by `rotation`, and expands it
    /// in turn.
    ///
    /// The vertex offset is taken relative to the child, so the instance
    /// keeps the child's offset from the instancer.
    fn place(
        &self,
        ctx: &DupliContext<'a, '_>,
        traversal: &mut Traversal<'a>,
        index: usize,
        position: Vec3,
        rotation: Quat,
        orco: Option<Vec3>,
    ) {
        let local = Mat4::from_rotation_translation(rotation, self.basis * position);
        let matrix = self.object.world * local;
        let space = matrix * self.object.world.inverse();

        let index = id_index(index);
        let dupli = ctx.make_dupli(traversal, self.id, None, matrix, index, None);
        dupli.orco = orco;
        ctx.recurse(traversal, self.id, space, index, None);
    }
}

pub(super) fn make_duplis_mesh<'a>(ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
    let main = ctx.main;
    let Some(instancer) = ctx.object() else {
        return;
    };
    let Some(IdRef::Mesh(mesh_id)) = instancer.data else {
        return;
    };
    let Some(mesh) = main.get_mesh(mesh_id) else {
        return;
    };
    let positions = match &mesh.edit_cage {
        Some(cage) if ctx.options.edit_object == Some(ctx.object) => cage,
        _ => &mesh.positions,
    };
    let use_rotation = instancer.dupli.contains(DupliFlags::ROTATION);

    for_each_child(ctx, traversal, |child_ctx, traversal, child| {
        let Some(child) = VertexChild::new(child_ctx, child) else {
            return;
        };
        for (i, &position) in positions.iter().enumerate() {
            let rotation = if use_rotation {
                let normal = mesh.normals.get(i).copied().unwrap_or(Vec3::Z);
                vec_to_quat(-normal, child.object.track_axis, child.object.up_axis)
            } else {
                Quat::IDENTITY
            };
            let orco = mesh.orco.as_ref().and_then(|orco| orco.get(i).copied());
            child.place(child_ctx, traversal, i, position, rotation, orco);
        }
    });
}

pub(super) fn make_duplis_point_cloud<'a>(
    ctx: &DupliContext<'a, '_>,
    traversal: &mut Traversal<'a>,
) {
    let main = ctx.main;
    let Some(IdRef::PointCloud(cloud_id)) = ctx.object().and_then(|ob| ob.data) else {
        return;
    };
    let Some(cloud) = main.get_point_cloud(cloud_id) else {
        return;
    };

    for_each_child(ctx, traversal, |child_ctx, traversal, child| {
        let Some(child) = VertexChild::new(child_ctx, child) else {
            return;
        };
        for (i, &position) in cloud.positions.iter().enumerate() {
            child.place(child_ctx, traversal, i, position, Quat::IDENTITY, None);
        }
    });
}
