// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-level tests for `canopy_dupli`.
//!
//! Each test builds a small database, expands one instancer through
//! [`object_duplilist`] and checks the instances that come out.

use canopy_dupli::{
    DupliList, DupliObject, DupliOptions, Generator, MAX_DUPLI_RECUR, PersistentId,
    find_rgba_attribute, object_duplilist,
};
use canopy_scene::{
    AttributeArray, Collection, CollectionId, Curve, DupliFlags, EvalMode, GeometrySet, IdHeader,
    IdProperties, IdProperty, InstanceReference, InstanceWeight, Instances, Main, Mesh, Object,
    ObjectId, ObjectType, ParentType, Particle, ParticleDrawFlags, ParticleKey, ParticleRenderAs,
    ParticleSettings, ParticleSystem, TextLayout,
};
use glam::{Mat4, Quat, Vec3, Vec4};

fn expand(main: &Main, object: ObjectId) -> DupliList<'_> {
    object_duplilist(main, EvalMode::Render, object, &DupliOptions::default())
}

fn empty(main: &mut Main, name: &str) -> ObjectId {
    main.add_object(Object::new(name, ObjectType::Empty))
}

fn collection_of(main: &mut Main, name: &str, members: &[ObjectId]) -> CollectionId {
    let collection = main.add_collection(Collection::new(name));
    for &member in members {
        main.link_object(collection, member).unwrap();
    }
    collection
}

fn translation(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}

/// An emitter whose one particle system instances `target` on particles at
/// `locations`.
fn emitter(main: &mut Main, settings: ParticleSettings, locations: &[Vec3]) -> ObjectId {
    let settings = main.add_particle_settings(settings);
    let mut psys = ParticleSystem::new("Particles", settings);
    psys.particles = locations
        .iter()
        .map(|&location| Particle {
            state: Some(ParticleKey {
                location,
                rotation: Quat::IDENTITY,
            }),
            size: 1.0,
            ..Particle::default()
        })
        .collect();
    let mut object = Object::new("Emitter", ObjectType::Mesh);
    object.dupli |= DupliFlags::PARTICLES;
    object.particle_systems.push(psys);
    main.add_object(object)
}

fn object_settings(target: ObjectId) -> ParticleSettings {
    ParticleSettings {
        id: IdHeader::new("Settings"),
        render_as: ParticleRenderAs::Object,
        instance_object: Some(target),
        size: 1.0,
        ..ParticleSettings::default()
    }
}

#[test]
fn recursion_stops_below_the_limit() {
    let mut main = Main::new();
    let chain: Vec<ObjectId> = (0..16).map(|i| empty(&mut main, &format!("E{i}"))).collect();
    for pair in chain.windows(2) {
        let collection = collection_of(&mut main, "Link", &[pair[1]]);
        let instancer = main.object_mut(pair[0]);
        instancer.instance_collection = Some(collection);
        instancer.dupli |= DupliFlags::COLLECTION;
    }

    let duplis = expand(&main, chain[0]);
    assert_eq!(duplis.len(), MAX_DUPLI_RECUR - 1);
    for (dupli, &expected) in duplis.iter().zip(&chain[1..]) {
        assert_eq!(dupli.object, expected);
        assert!(dupli.level < MAX_DUPLI_RECUR, "level {}", dupli.level);
        assert_eq!(dupli.persistent_id.indices().len(), dupli.level + 1);
    }
}

#[test]
fn objects_never_expand_inside_themselves() {
    let mut main = Main::new();
    let a = empty(&mut main, "A");
    let b = empty(&mut main, "B");
    let s = empty(&mut main, "S");
    let c1 = collection_of(&mut main, "C1", &[b, s]);
    let c2 = collection_of(&mut main, "C2", &[a]);
    main.object_mut(a).instance_collection = Some(c1);
    main.object_mut(a).dupli |= DupliFlags::COLLECTION;
    main.object_mut(b).instance_collection = Some(c2);
    main.object_mut(b).dupli |= DupliFlags::COLLECTION;

    let duplis = expand(&main, a);
    let objects: Vec<ObjectId> = duplis.iter().map(|d| d.object).collect();
    assert_eq!(objects, [b, a, s]);
    assert_eq!(duplis.as_slice()[1].level, 1);
}

#[test]
fn persistent_ids_are_stable_and_distinct() {
    let mut main = Main::new();
    let target = empty(&mut main, "Target");
    let locations: Vec<Vec3> = (0..6).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    let emitter = emitter(&mut main, object_settings(target), &locations);

    let first = expand(&main, emitter);
    let second = expand(&main, emitter);
    assert_eq!(first.len(), 6);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.persistent_id, b.persistent_id);
        assert_eq!(a.random_id, b.random_id);
    }

    let third = &first.as_slice()[3];
    let fourth = &first.as_slice()[4];
    assert_eq!(third.persistent_id.indices(), &[3, 0]);
    assert_ne!(third.persistent_id, fourth.persistent_id);
    assert_ne!(third.random_id, fourth.random_id);
    assert_eq!(translation(&fourth.matrix), Vec3::new(4.0, 0.0, 0.0));
    assert_eq!(third.generator, Some(Generator::Particles));

    // The same logical instance is found again in the next list.
    let found = second.find(target, &fourth.persistent_id).unwrap();
    assert_eq!(found.random_id, fourth.random_id);
    assert!(second.find(target, &PersistentId::EMPTY).is_none(), "no such instance");
}

#[test]
fn collection_instances_follow_offset_and_instancer() {
    let mut main = Main::new();
    let member_world = Mat4::from_scale_rotation_translation(
        Vec3::splat(2.0),
        Quat::from_rotation_x(0.3),
        Vec3::new(0.5, -1.0, 2.0),
    );
    let member =
        main.add_object(Object::new("Member", ObjectType::Empty).with_world(member_world));
    let collection = collection_of(&mut main, "Set", &[member]);
    let offset = Vec3::new(1.0, 2.0, 3.0);
    main.collection_mut(collection).instance_offset = offset;

    let instancer_world =
        Mat4::from_rotation_translation(Quat::from_rotation_z(1.1), Vec3::new(4.0, 0.0, -2.0));
    let instancer = main.add_object(
        Object::new("Instancer", ObjectType::Empty)
            .with_world(instancer_world)
            .with_instance_collection(collection),
    );

    let duplis = expand(&main, instancer);
    assert_eq!(duplis.len(), 1);
    let expected = Mat4::from_translation(-offset) * instancer_world * member_world;
    let dupli = &duplis.as_slice()[0];
    assert!(
        dupli.matrix.abs_diff_eq(expected, 1e-5),
        "{} != {expected}",
        dupli.matrix
    );
    assert_eq!(dupli.generator, Some(Generator::Collection));
}

#[test]
fn instancer_is_skipped_in_its_own_collection() {
    let mut main = Main::new();
    let member = empty(&mut main, "Member");
    let instancer = empty(&mut main, "Instancer");
    let collection = collection_of(&mut main, "Set", &[instancer, member]);
    main.object_mut(instancer).instance_collection = Some(collection);
    main.object_mut(instancer).dupli |= DupliFlags::COLLECTION;

    let duplis = expand(&main, instancer);
    let objects: Vec<ObjectId> = duplis.iter().map(|d| d.object).collect();
    assert_eq!(objects, [member]);
    // Positions in the collection count the skipped instancer.
    assert_eq!(duplis.as_slice()[0].persistent_id.indices(), &[1]);
}

#[test]
fn include_list_filters_collection_members() {
    let mut main = Main::new();
    let kept = empty(&mut main, "Kept");
    let dropped = empty(&mut main, "Dropped");
    let collection = collection_of(&mut main, "Set", &[kept, dropped]);
    let instancer = main.add_object(
        Object::new("Instancer", ObjectType::Empty).with_instance_collection(collection),
    );

    let options = DupliOptions {
        include_objects: Some([kept].into_iter().collect()),
        ..DupliOptions::default()
    };
    let duplis = object_duplilist(&main, EvalMode::Viewport, instancer, &options);
    let objects: Vec<ObjectId> = duplis.iter().map(|d| d.object).collect();
    assert_eq!(objects, [kept]);
}

#[test]
fn children_land_on_vertices() {
    let mut main = Main::new();
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];
    let mesh = main.add_mesh(Mesh::from_points("Grid", positions.clone(), vec![Vec3::Z; 4]));
    let mut instancer = Object::new("Grid", ObjectType::Mesh)
        .with_data(mesh)
        .with_world(Mat4::from_translation(Vec3::Z));
    instancer.dupli |= DupliFlags::VERTS;
    let instancer = main.add_object(instancer);
    let child = empty(&mut main, "Child");
    main.set_parent(child, instancer, ParentType::Object).unwrap();

    let duplis = expand(&main, instancer);
    assert_eq!(duplis.len(), 4);
    for (dupli, position) in duplis.iter().zip(&positions) {
        assert_eq!(dupli.object, child);
        assert_eq!(dupli.generator, Some(Generator::Verts));
        let (_, rotation, location) = dupli.matrix.to_scale_rotation_translation();
        // A child at the origin puts instances on the raw vertex positions.
        assert!((location - *position).length() < 1e-6, "at {location}");
        assert!(rotation.abs_diff_eq(Quat::IDENTITY, 1e-6), "unrotated");
    }
}

#[test]
fn vertex_children_keep_their_offset() {
    let mut main = Main::new();
    let mesh = main.add_mesh(Mesh::from_points("Point", vec![Vec3::X], vec![Vec3::Z]));
    let mut instancer = Object::new("Point", ObjectType::Mesh).with_data(mesh);
    instancer.dupli |= DupliFlags::VERTS;
    let instancer = main.add_object(instancer);
    let child = main.add_object(
        Object::new("Child", ObjectType::Empty)
            .with_world(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0))),
    );
    main.set_parent(child, instancer, ParentType::Object).unwrap();

    let duplis = expand(&main, instancer);
    assert_eq!(duplis.len(), 1);
    let location = translation(&duplis.as_slice()[0].matrix);
    assert!((location - Vec3::new(1.0, 0.0, 5.0)).length() < 1e-6, "at {location}");
}

#[test]
fn children_land_on_face_centers() {
    let mut main = Main::new();
    let mesh = main.add_mesh(Mesh::from_polygons(
        "Quad",
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ],
        &[&[0, 1, 2, 3]],
    ));
    let mut instancer = Object::new("Quad", ObjectType::Mesh).with_data(mesh);
    instancer.dupli |= DupliFlags::FACES | DupliFlags::FACES_SCALE;
    instancer.instance_faces_scale = 1.0;
    let instancer = main.add_object(instancer);
    let child = empty(&mut main, "Child");
    main.set_parent(child, instancer, ParentType::Object).unwrap();

    let duplis = expand(&main, instancer);
    assert_eq!(duplis.len(), 1);
    let (scale, _, location) = duplis.as_slice()[0].matrix.to_scale_rotation_translation();
    assert!((location - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5, "at {location}");
    assert!((scale - Vec3::splat(2.0)).length() < 1e-4, "scale {scale}");
}

#[test]
fn face_children_keep_their_offset() {
    let mut main = Main::new();
    let mesh = main.add_mesh(Mesh::from_polygons(
        "Quad",
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        &[&[0, 1, 2, 3]],
    ));
    let mut instancer = Object::new("Quad", ObjectType::Mesh).with_data(mesh);
    instancer.dupli |= DupliFlags::FACES;
    let instancer = main.add_object(instancer);
    let child = main.add_object(
        Object::new("Child", ObjectType::Empty)
            .with_world(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0))),
    );
    main.set_parent(child, instancer, ParentType::Object).unwrap();

    let duplis = expand(&main, instancer);
    assert_eq!(duplis.len(), 1);
    let location = translation(&duplis.as_slice()[0].matrix);
    assert!((location - Vec3::new(0.5, 0.5, 5.0)).length() < 1e-5, "at {location}");
}

#[test]
fn glyph_objects_follow_the_text() {
    let mut main = Main::new();
    let a = empty(&mut main, "glyph.a");
    let b = empty(&mut main, "glyph.b");
    let curve = main.add_curve(Curve {
        id: IdHeader::new("Text"),
        family: "glyph.".into(),
        font_size: 2.0,
        text: Some(TextLayout::monospace("abza", 1.0)),
        ..Curve::default()
    });
    let mut text = Object::new("Text", ObjectType::Font).with_data(curve);
    text.dupli |= DupliFlags::VERTS;
    let text = main.add_object(text);

    let duplis = expand(&main, text);
    let objects: Vec<ObjectId> = duplis.iter().map(|d| d.object).collect();
    // No object stands for 'z'.
    assert_eq!(objects, [a, b, a]);
    let last = &duplis.as_slice()[2];
    assert_eq!(translation(&last.matrix), Vec3::new(6.0, 0.0, 0.0));
    assert_eq!(last.persistent_id.indices(), &[3]);
}

fn picks(main: &Main, emitter: ObjectId) -> Vec<ObjectId> {
    expand(main, emitter).iter().map(|d| d.object).collect()
}

#[test]
fn collection_pick_policies_differ() {
    let mut main = Main::new();
    let a = empty(&mut main, "A");
    let b = empty(&mut main, "B");
    let c = empty(&mut main, "C");
    let collection = collection_of(&mut main, "Pool", &[a, b, c]);
    let locations = vec![Vec3::ZERO; 6];
    let settings = |draw| ParticleSettings {
        id: IdHeader::new("Settings"),
        render_as: ParticleRenderAs::Collection,
        instance_collection: Some(collection),
        instance_weights: vec![
            InstanceWeight { object: b, count: 2 },
            InstanceWeight { object: a, count: 1 },
        ],
        draw,
        size: 1.0,
        ..ParticleSettings::default()
    };

    let round_robin = emitter(&mut main, settings(ParticleDrawFlags::empty()), &locations);
    assert_eq!(picks(&main, round_robin), [a, b, c, a, b, c]);

    let weighted = emitter(&mut main, settings(ParticleDrawFlags::COUNT_COLLECTION), &locations);
    assert_eq!(picks(&main, weighted), [b, b, a, b, b, a]);

    let random = emitter(&mut main, settings(ParticleDrawFlags::RANDOM_COLLECTION), &locations);
    let random_picks = picks(&main, random);
    assert_eq!(random_picks.len(), 6);
    assert!(random_picks.iter().all(|p| [a, b, c].contains(p)), "picked from the pool");
    assert_eq!(random_picks, picks(&main, random), "picks are seeded");

    let whole = emitter(&mut main, settings(ParticleDrawFlags::WHOLE_COLLECTION), &locations[..2]);
    assert_eq!(picks(&main, whole), [a, b, c, a, b, c]);
}

#[test]
fn geometry_instances_carry_their_attributes() {
    let mut main = Main::new();
    let target = empty(&mut main, "Target");
    main.object_mut(target)
        .id
        .properties
        .set("tint", IdProperty::FloatArray(vec![0.0, 0.0, 1.0]));

    let mut instances = Instances::default();
    let handle = instances.add_reference(InstanceReference::Object(target));
    instances.add_instance(handle, Mat4::from_translation(Vec3::X));
    instances.add_instance(handle, Mat4::from_translation(Vec3::Y));
    instances.attributes.push((
        "tint".into(),
        AttributeArray::Color(vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 1.0)]),
    ));
    let mut owner = Object::new("Scatter", ObjectType::Empty);
    owner.geometry_set = Some(GeometrySet {
        instances: Some(instances),
        ..GeometrySet::default()
    });
    let owner = main.add_object(owner);

    let options = DupliOptions {
        preview_object: Some(owner),
        ..DupliOptions::default()
    };
    let duplis = object_duplilist(&main, EvalMode::Viewport, owner, &options);
    assert_eq!(duplis.len(), 2);
    let second = &duplis.as_slice()[1];
    assert_eq!(second.generator, Some(Generator::GeometrySet));
    assert_eq!(second.preview_instance_index, Some(1));
    assert_eq!(translation(&second.matrix), Vec3::Y);

    let tint = find_rgba_attribute(&main, target, Some(second), Some(owner), "tint");
    assert_eq!(tint, Some(Vec4::new(0.0, 1.0, 0.0, 1.0)));
    // Without the instance, the object's own property answers.
    let own = find_rgba_attribute(&main, target, None, Some(owner), "tint");
    assert_eq!(own, Some(Vec4::new(0.0, 0.0, 1.0, 1.0)));
}

#[test]
fn geometry_collection_members_number_nested_instances_after_themselves() {
    let mut main = Main::new();
    let leaf = empty(&mut main, "Leaf");
    let inner = collection_of(&mut main, "Inner", &[leaf]);
    let member = main.add_object(
        Object::new("Member", ObjectType::Empty).with_instance_collection(inner),
    );
    let outer = collection_of(&mut main, "Outer", &[member]);

    let mut instances = Instances::default();
    let handle = instances.add_reference(InstanceReference::Collection(outer));
    instances.add_instance(handle, Mat4::IDENTITY);
    let mut owner = Object::new("Scatter", ObjectType::Empty);
    owner.geometry_set = Some(GeometrySet {
        instances: Some(instances),
        ..GeometrySet::default()
    });
    let owner = main.add_object(owner);

    let duplis = expand(&main, owner);
    let objects: Vec<ObjectId> = duplis.iter().map(|d| d.object).collect();
    assert_eq!(objects, [member, leaf]);
    assert_eq!(duplis.as_slice()[0].persistent_id.indices(), &[0, 0]);
    assert_eq!(duplis.as_slice()[1].persistent_id.indices(), &[0, 1, 0]);
}

#[test]
fn attribute_sources_keep_their_priority() {
    let mut main = Main::new();
    let mesh = main.add_mesh(Mesh::from_points("Body", Vec::new(), Vec::new()));
    main.mesh_mut(mesh)
        .id
        .properties
        .set("level", IdProperty::Float(0.1));
    let target = main.add_object(Object::new("Target", ObjectType::Mesh).with_data(mesh));

    let settings = ParticleSettings {
        id: IdHeader {
            properties: IdProperties::new().with("level", IdProperty::Int(5)),
            ..IdHeader::new("Settings")
        },
        ..object_settings(target)
    };
    let emitter = emitter(&mut main, settings, &[Vec3::ZERO]);
    main.object_mut(emitter)
        .id
        .properties
        .set("level", IdProperty::Double(0.5));

    let duplis = expand(&main, emitter);
    let dupli = &duplis.as_slice()[0];
    let find = |dupli: Option<&DupliObject<'_>>, parent: Option<ObjectId>, name: &str| {
        find_rgba_attribute(&main, target, dupli, parent, name)
    };

    // Particle settings win over everything else.
    assert_eq!(find(Some(dupli), Some(emitter), "level"), Some(Vec4::new(5.0, 5.0, 5.0, 1.0)));
    // Then the instancing object, over the object data.
    assert_eq!(find(None, Some(emitter), "level"), Some(Vec4::new(0.5, 0.5, 0.5, 1.0)));
    // Then the data of the object itself.
    assert_eq!(find(None, None, "level"), Some(Vec4::new(0.1, 0.1, 0.1, 1.0)));
    // Built-in properties resolve when no custom property matches.
    assert_eq!(find(None, None, "color"), Some(Vec4::ONE));
    // Missing everywhere is reported, and reads as zero.
    assert_eq!(find(Some(dupli), Some(emitter), "missing"), None);
    assert_eq!(find(None, None, "missing").unwrap_or_default(), Vec4::ZERO);
}
