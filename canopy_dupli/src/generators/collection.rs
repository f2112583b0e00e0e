// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instancing of a collection on an object.

use glam::{Mat4, Vec3};

use crate::context::{DupliContext, Traversal, id_index};

/// Space of an instanced collection: the instancer transform with the
/// collection's instance offset removed.
pub(super) fn collection_space(instancer: Mat4, instance_offset: Vec3) -> Mat4 {
    Mat4::from_translation(-instance_offset) * instancer
}

pub(super) fn make_duplis<'a>(ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
    let main = ctx.main;
    let Some(instancer) = ctx.object() else {
        return;
    };
    let Some(collection_id) = instancer.instance_collection else {
        return;
    };
    let Some(collection) = main.get_collection(collection_id) else {
        return;
    };
    let space = collection_space(instancer.world, collection.instance_offset);

    for (index, member) in main.collection_visible_objects(collection_id, ctx.mode) {
        // The instancer may sit in the collection it instances.
        if member == ctx.object || !ctx.options.includes(member) {
            continue;
        }
        let Some(object) = main.get_object(member) else {
            continue;
        };
        let index = id_index(index);
        ctx.make_dupli(traversal, member, None, space * object.world, index, None);
        ctx.recurse(traversal, member, space, index, None);
    }
}
