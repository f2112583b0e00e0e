// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenario tests for the `Main` database.

use canopy_scene::{
    Collection, EvalMode, IdProperty, IdRef, LayerBase, LayerCollection, Main, Object,
    ObjectType, ParentType, SceneError, VisibilityFlags, rna,
};
use glam::{Mat4, Vec3};

#[test]
fn parenting_refuses_cycles() {
    let mut main = Main::new();
    let a = main.add_object(Object::new("A", ObjectType::Empty));
    let b = main.add_object(Object::new("B", ObjectType::Empty));
    let c = main.add_object(Object::new("C", ObjectType::Empty));
    main.set_parent(b, a, ParentType::Object).unwrap();
    main.set_parent(c, b, ParentType::Object).unwrap();

    assert!(main.is_child_of(c, a), "grandchild");
    assert!(!main.is_child_of(a, c), "not the other way round");
    assert_eq!(
        main.set_parent(a, c, ParentType::Object),
        Err(SceneError::ParentCycle { child: a, parent: c })
    );
    assert_eq!(
        main.set_parent(a, a, ParentType::Object),
        Err(SceneError::ParentCycle { child: a, parent: a })
    );
    // The failed edits left the hierarchy alone.
    assert_eq!(main.object(a).parent, None);
}

#[test]
fn collections_refuse_to_contain_themselves() {
    let mut main = Main::new();
    let outer = main.add_collection(Collection::new("Outer"));
    let middle = main.add_collection(Collection::new("Middle"));
    let inner = main.add_collection(Collection::new("Inner"));
    main.link_collection(outer, middle).unwrap();
    main.link_collection(middle, inner).unwrap();
    // Linking twice is a no-op.
    main.link_collection(outer, middle).unwrap();
    assert_eq!(main.collection(outer).children, [middle]);

    assert!(main.collection_contains(outer, inner), "transitive child");
    assert_eq!(
        main.link_collection(inner, outer),
        Err(SceneError::CollectionCycle {
            child: outer,
            parent: inner
        })
    );
}

#[test]
fn visible_objects_keep_stable_positions() {
    let mut main = Main::new();
    let root = main.add_collection(Collection::new("Root"));
    let props = main.add_collection(Collection {
        hide_render: true,
        ..Collection::new("Props")
    });
    let a = main.add_object(Object::new("A", ObjectType::Empty));
    let b = main.add_object(Object::new("B", ObjectType::Empty));
    let mut hidden = Object::new("Hidden", ObjectType::Empty);
    hidden.visibility = VisibilityFlags::HIDE_VIEWPORT;
    let hidden = main.add_object(hidden);
    main.link_object(root, a).unwrap();
    main.link_object(root, hidden).unwrap();
    main.link_object(props, b).unwrap();
    // Reached twice; listed once.
    main.link_object(props, a).unwrap();
    main.link_collection(root, props).unwrap();

    assert_eq!(main.collection_object_cache(root).len(), 3);
    assert_eq!(
        main.collection_visible_objects(root, EvalMode::Viewport),
        [(0, a), (2, b)]
    );
    assert_eq!(
        main.collection_visible_objects(root, EvalMode::Render),
        [(0, a), (1, hidden)]
    );
}

#[test]
fn view_layer_bases_follow_layer_collections() {
    let mut main = Main::new();
    let scene = main.new_scene("Scene");
    let master = main.scene(scene).master_collection.unwrap();
    let hidden = main.add_collection(Collection {
        hide_viewport: true,
        ..Collection::new("Hidden")
    });
    let a = main.add_object(Object::new("A", ObjectType::Empty));
    let b = main.add_object(Object::new("B", ObjectType::Empty));
    main.link_object(master, a).unwrap();
    main.link_object(hidden, b).unwrap();
    main.link_collection(master, hidden).unwrap();
    main.scene_mut(scene).view_layers[0].layer_collections[0]
        .children
        .push(LayerCollection::new(hidden));

    let layer = &main.scene(scene).view_layers[0];
    assert_eq!(
        main.view_layer_bases(layer, EvalMode::Viewport),
        [
            LayerBase {
                object: a,
                visible: true
            },
            LayerBase {
                object: b,
                visible: false
            },
        ]
    );
    let render = main.view_layer_bases(layer, EvalMode::Render);
    assert!(render.iter().all(|base| base.visible), "nothing hidden in renders");
}

#[test]
fn properties_resolve_by_path() {
    let mut main = Main::new();
    let mut object = Object::new("Cube", ObjectType::Empty)
        .with_world(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
    object.pass_index = 4;
    object.id.properties.set("weight", IdProperty::Float(0.5));
    let cube = main.add_object(object);

    assert_eq!(main.find_object_by_name("Cube"), Some(cube));
    assert_eq!(main.find_object_by_name("Sphere"), None);
    assert_eq!(main.name(IdRef::Object(cube)), "Cube");

    let id = IdRef::Object(cube);
    assert_eq!(rna::resolve_property(&main, id, "pass_index"), Some(IdProperty::Int(4)));
    assert_eq!(
        rna::resolve_property(&main, id, "location"),
        Some(IdProperty::FloatArray(vec![1.0, 2.0, 3.0]))
    );
    assert_eq!(
        rna::resolve_property(&main, id, "[\"weight\"]"),
        Some(IdProperty::Float(0.5))
    );
    assert_eq!(rna::resolve_property(&main, id, "[\"missing\"]"), None);
    assert_eq!(rna::resolve_property(&main, id, "bogus"), None);
}
