// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Children placed on the faces of a mesh.

use alloc::vec::Vec;

use glam::{Mat3, Mat4, Vec2, Vec3};

use canopy_scene::{DupliFlags, IdRef, Mesh};

use super::for_each_child;
use crate::context::{DupliContext, Traversal, id_index};
use crate::float;
use crate::math::{poly_cross, pre_multiply_basis, tri_to_quat, with_translation};

/// Averages `values` at the given indices; `None` for an empty selection
/// or an index out of range.
fn average<T>(values: &[T], indices: impl ExactSizeIterator<Item = usize>) -> Option<T>
where
    T: Copy + core::ops::Add<Output = T> + core::ops::Div<f32, Output = T> + Default,
{
    let count = indices.len();
    if count == 0 {
        return None;
    }
    let mut sum = T::default();
    for i in indices {
        sum = sum + *values.get(i)?;
    }
    Some(sum / count as f32)
}

/// Face placement in instancer space: center, orientation and size.
fn face_matrix(coords: &[Vec3], scale_factor: Option<f32>) -> (Vec3, Mat4) {
    let center = coords.iter().copied().sum::<Vec3>() / coords.len() as f32;
    let cross = poly_cross(coords);
    let rotation = tri_to_quat(coords[0], coords[1], cross.normalize_or_zero());
    let size = scale_factor.map_or(1.0, |factor| float::sqrt(cross.length() * 0.5) * factor);
    let matrix = Mat4::from_scale_rotation_translation(Vec3::splat(size), rotation, Vec3::ZERO);
    (center, matrix)
}

fn face_coords(mesh: &Mesh, positions: &[Vec3], face: usize) -> Option<Vec<Vec3>> {
    mesh.face(face)
        .iter()
        .map(|&v| positions.get(v).copied())
        .collect()
}

pub(super) fn make_duplis<'a>(ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
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
    let scale_factor = instancer
        .dupli
        .contains(DupliFlags::FACES_SCALE)
        .then_some(instancer.instance_faces_scale);

    for_each_child(ctx, traversal, |child_ctx, traversal, child| {
        let Some(object) = main.get_object(child) else {
            return;
        };
        let child_basis = Mat3::from_mat4(object.world.inverse() * instancer.world);
        let parent_inverse = Mat3::from_mat4(object.parent_inverse);

        for face in 0..mesh.faces_num() {
            let Some(coords) = face_coords(mesh, positions, face) else {
                continue;
            };
            if coords.len() < 3 {
                continue;
            }
            let (center, local) = face_matrix(&coords, scale_factor);
            let local = with_translation(local, child_basis * center);
            // Parent inverse rotation is applied to face instances as well.
            let local = pre_multiply_basis(parent_inverse, local);
            let matrix = object.world * local;
            let space = matrix * object.world.inverse();

            let index = id_index(face);
            let dupli = child_ctx.make_dupli(traversal, child, None, matrix, index, None);
            dupli.orco = mesh
                .orco
                .as_deref()
                .and_then(|orco| average(orco, mesh.face(face).iter().copied()));
            dupli.uv = mesh
                .uv_map
                .as_deref()
                .and_then(|uv| average::<Vec2>(uv, mesh.face_corners(face)));
            child_ctx.recurse(traversal, child, space, index, None);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_is_centered_and_scaled_by_area() {
        let coords = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let (center, matrix) = face_matrix(&coords, Some(1.0));
        assert!((center - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6, "center");
        // Area 4, so the face scale is 2.
        let (scale, _, _) = matrix.to_scale_rotation_translation();
        assert!((scale - Vec3::splat(2.0)).length() < 1e-5, "scale {scale}");

        let (_, unscaled) = face_matrix(&coords, None);
        let (scale, _, _) = unscaled.to_scale_rotation_translation();
        assert!((scale - Vec3::ONE).length() < 1e-5, "unit scale");
    }

    #[test]
    fn averages_skip_empty_selections() {
        let values = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 2.0)];
        assert_eq!(average(&values, [0_usize, 1].into_iter()), Some(Vec2::new(0.5, 1.0)));
        assert_eq!(average(&values, core::iter::empty::<usize>()), None);
        assert_eq!(average(&values, [5_usize].into_iter()), None);
    }
}
