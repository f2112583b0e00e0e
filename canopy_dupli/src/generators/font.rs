// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph objects placed on the characters of a text.

use glam::{Mat4, Vec3};
use hashbrown::HashMap;

use canopy_scene::{IdRef, Main, ObjectId};

use crate::context::{DupliContext, Traversal, id_index};
use crate::math::with_translation;

/// Finds the object named after `family` followed by `character`.
fn find_family_object(main: &Main, family: &str, character: char) -> Option<ObjectId> {
    main.objects().find_map(|(id, object)| {
        let rest = object.id.name.strip_prefix(family)?;
        let mut chars = rest.chars();
        (chars.next() == Some(character) && chars.next().is_none()).then_some(id)
    })
}

pub(super) fn make_duplis<'a>(ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
    // Text inside an instanced collection does not place glyphs.
    if ctx.collection.is_some() {
        return;
    }
    let main = ctx.main;
    let Some(text_object) = ctx.object() else {
        return;
    };
    let Some(IdRef::Curve(curve_id)) = text_object.data else {
        return;
    };
    let Some(curve) = main.get_curve(curve_id) else {
        return;
    };
    let Some(layout) = &curve.text else {
        return;
    };

    let world = text_object.world;
    let mut glyphs: HashMap<char, Option<ObjectId>> = HashMap::with_capacity(layout.chars.len());
    for (a, placed) in layout.chars.iter().enumerate() {
        let glyph = *glyphs
            .entry(placed.character)
            .or_insert_with(|| find_family_object(main, &curve.family, placed.character));
        let Some(glyph) = glyph else {
            continue;
        };

        let position = world.transform_point3(Vec3::new(
            curve.font_size * (placed.x - curve.x_offset),
            curve.font_size * (placed.y - curve.y_offset),
            0.0,
        ));
        let mut matrix = world;
        if placed.rotation != 0.0 {
            matrix = with_translation(matrix, Vec3::ZERO) * Mat4::from_rotation_z(-placed.rotation);
        }
        let matrix = with_translation(matrix, position);
        ctx.make_dupli(traversal, glyph, None, matrix, id_index(a), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_scene::{Object, ObjectType};

    #[test]
    fn family_objects_match_the_whole_name() {
        let mut main = Main::new();
        let a = main.add_object(Object::new("glyph.a", ObjectType::Mesh));
        main.add_object(Object::new("glyph.ab", ObjectType::Mesh));
        let b = main.add_object(Object::new("glyph.é", ObjectType::Mesh));
        assert_eq!(find_family_object(&main, "glyph.", 'a'), Some(a));
        assert_eq!(find_family_object(&main, "glyph.", 'é'), Some(b));
        assert_eq!(find_family_object(&main, "glyph.", 'c'), None);
        assert_eq!(find_family_object(&main, "other.", 'a'), None);
    }
}
