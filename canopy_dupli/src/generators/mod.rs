// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generator selection and dispatch.

use canopy_scene::{DupliFlags, ObjectId, ObjectType};

use crate::context::{DupliContext, Traversal, id_index};

mod collection;
mod faces;
mod font;
mod geometry_set;
mod particles;
mod verts;

/// The algorithm that expands an instancer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Generator {
    /// Objects of an instanced collection.
    Collection,
    /// Children placed on mesh vertices.
    Verts,
    /// Children placed on point cloud points.
    PointCloud,
    /// Children placed on mesh faces.
    Faces,
    /// Objects placed on particles.
    Particles,
    /// Components and instances of the evaluated geometry.
    GeometrySet,
    /// Glyph objects placed on the characters of a text.
    Font,
}

impl Generator {
    /// Picks the generator for the object of `ctx`, if it instances
    /// anything.
    pub(crate) fn select(ctx: &DupliContext<'_, '_>) -> Option<Self> {
        let object = ctx.object()?;
        let dupli = object.dupli;
        if !dupli.intersects(DupliFlags::INSTANCERS) && object.geometry_set.is_none() {
            return None;
        }
        // Metaball geometry is merged into the basis ball already.
        if object.kind == ObjectType::MetaBall && ctx.level > 0 {
            return None;
        }
        if object.is_hidden(ctx.mode) {
            return None;
        }

        // Text glyphs win over geometry instances.
        if dupli.contains(DupliFlags::VERTS) && object.kind == ObjectType::Font {
            return Some(Self::Font);
        }
        if object.has_geometry_instances() {
            return Some(Self::GeometrySet);
        }
        if dupli.contains(DupliFlags::PARTICLES) {
            return Some(Self::Particles);
        }
        if dupli.contains(DupliFlags::VERTS) {
            return match object.kind {
                ObjectType::Mesh => Some(Self::Verts),
                ObjectType::PointCloud => Some(Self::PointCloud),
                _ => None,
            };
        }
        if dupli.contains(DupliFlags::FACES) {
            return (object.kind == ObjectType::Mesh).then_some(Self::Faces);
        }
        dupli.contains(DupliFlags::COLLECTION).then_some(Self::Collection)
    }

    pub(crate) fn make_duplis<'a>(self, ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
        match self {
            Self::Collection => collection::make_duplis(ctx, traversal),
            Self::Verts => verts::make_duplis_mesh(ctx, traversal),
            Self::PointCloud => verts::make_duplis_point_cloud(ctx, traversal),
            Self::Faces => faces::make_duplis(ctx, traversal),
            Self::Particles => particles::make_duplis(ctx, traversal),
            Self::GeometrySet => geometry_set::make_duplis(ctx, traversal),
            Self::Font => font::make_duplis(ctx, traversal),
        }
    }
}

/// Calls `f` with a child context for every child object of the instancer.
///
/// Inside an instanced collection only its members are considered.
/// Otherwise every visible object of the database is, and the child's
/// position among them is its persistent index.
fn for_each_child<'a, 'o>(
    ctx: &DupliContext<'a, 'o>,
    traversal: &mut Traversal<'a>,
    mut f: impl FnMut(&DupliContext<'a, 'o>, &mut Traversal<'a>, ObjectId),
) {
    let main = ctx.main;
    let parent = ctx.object;
    let is_candidate =
        |child: ObjectId| ctx.options.edit_object != Some(child) && main.is_child_of(child, parent);

    if let Some(collection) = ctx.collection {
        for (index, child) in main.collection_visible_objects(collection, ctx.mode) {
            if !is_candidate(child) {
                continue;
            }
            if let Some(child_ctx) = ctx.descend(parent, None, id_index(index), None) {
                f(&child_ctx, traversal, child);
            }
        }
    } else {
        let visible = main
            .objects()
            .filter(|(_, object)| !object.is_hidden(ctx.mode))
            .map(|(id, _)| id);
        for (index, child) in visible.enumerate() {
            if !is_candidate(child) {
                continue;
            }
            if let Some(child_ctx) = ctx.descend(parent, None, id_index(index), None) {
                f(&child_ctx, traversal, child);
            }
        }
    }
}
