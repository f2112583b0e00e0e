// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-level tests for `canopy_depsgraph`.
//!
//! Each test builds a small scene through [`build_depsgraph`] and checks the
//! relations, the evaluation order or the update flushing that results.

use canopy_depsgraph::{
    BuildOptions, ComponentKey, CustomDataMask, Depsgraph, EvalFlags, IdNode, NodeBuilder,
    NodeType, OperationCode, OperationKey, RelationBuilder, RelationFlags, TimeSourceKey,
    UpdateSource, build_depsgraph,
};
use canopy_scene::{
    Action, AnimData, Armature, CacheFile, Constraint, ConstraintKind, ConstraintTarget, Curve,
    Driver, DriverKind, DriverVariable, FCurve, IdHeader, Lattice, Main, Mesh, Modifier,
    ModifierKind, Object, ObjectId, ObjectType, ParentType, Pose, PoseChannel, SceneId,
    ShrinkType,
};

fn scene_with(main: &mut Main, objects: &[ObjectId]) -> SceneId {
    let scene = main.new_scene("Scene");
    let master = main.scene(scene).master_collection.unwrap();
    for &ob in objects {
        main.link_object(master, ob).unwrap();
    }
    scene
}

fn mesh_object(main: &mut Main, name: &str) -> ObjectId {
    let mesh = main.add_mesh(Mesh {
        id: IdHeader::new(name),
        ..Mesh::default()
    });
    let mut object = Object::new(name, ObjectType::Mesh);
    object.data = Some(mesh.into());
    main.add_object(object)
}

/// An armature object posed with one root bone per name.
fn rig_object(main: &mut Main, name: &str, bones: &[&str]) -> ObjectId {
    let armature = main.add_armature(Armature {
        id: IdHeader::new(name),
        ..Armature::default()
    });
    let mut pose = Pose::default();
    for bone in bones {
        pose.channels.push(PoseChannel::new(*bone, None));
    }
    let mut rig = Object::new(name, ObjectType::Armature).with_data(armature);
    rig.pose = Some(pose);
    main.add_object(rig)
}

fn id_node(graph: &Depsgraph, ob: ObjectId) -> &IdNode {
    graph.id_node(graph.find_id_node(ob.into()).unwrap())
}

fn geometry(ob: ObjectId) -> ComponentKey<'static> {
    ComponentKey::new(ob, NodeType::Geometry)
}

fn transform_parent(ob: ObjectId) -> OperationKey<'static> {
    OperationKey::new(ob, NodeType::Transform, OperationCode::TransformParent)
}

fn transform_constraints(ob: ObjectId) -> OperationKey<'static> {
    OperationKey::new(ob, NodeType::Transform, OperationCode::TransformConstraints)
}

fn unreduced() -> BuildOptions {
    BuildOptions {
        transitive_reduction: false,
        ..BuildOptions::default()
    }
}

fn transform_final(ob: ObjectId) -> OperationKey<'static> {
    OperationKey::new(ob, NodeType::Transform, OperationCode::TransformFinal)
}

fn updated(graph: &Depsgraph, key: &OperationKey<'_>) -> bool {
    graph.find_operation(key).is_some_and(|op| graph.needs_update(op))
}

#[test]
fn rebuilding_is_deterministic() {
    let mut main = Main::new();
    let a = mesh_object(&mut main, "A");
    let b = mesh_object(&mut main, "B");
    main.object_mut(b).constraints.push(
        Constraint::new("Track", ConstraintKind::TrackTo).with_target(ConstraintTarget::object(a)),
    );
    let scene = scene_with(&mut main, &[a, b]);

    let first = build_depsgraph(&main, scene, &BuildOptions::default());
    let second = build_depsgraph(&main, scene, &BuildOptions::default());
    assert_eq!(first.stats(), second.stats());
    assert_eq!(first.evaluation_order().unwrap(), second.evaluation_order().unwrap());
}

#[test]
fn copy_on_eval_flushes_only_into_listed_components() {
    let mut main = Main::new();
    let ob = mesh_object(&mut main, "Cube");
    let scene = scene_with(&mut main, &[ob]);
    let graph = build_depsgraph(&main, scene, &unreduced());
    let mesh = main.object(ob).data.unwrap();

    let cow = OperationKey::new(mesh, NodeType::CopyOnEval, OperationCode::CopyOnEval);
    let into_geometry = graph
        .relation_between(cow, ComponentKey::new(mesh, NodeType::Geometry))
        .expect("copy precedes geometry");
    assert!(!into_geometry.flags.contains(RelationFlags::NO_FLUSH));

    let into_parameters = graph
        .relation_between(cow, ComponentKey::new(mesh, NodeType::Parameters))
        .expect("copy precedes parameters");
    assert!(into_parameters.flags.contains(RelationFlags::NO_FLUSH));
    assert!(into_parameters.flags.contains(RelationFlags::GODMODE));
}

#[test]
fn driver_reads_target_and_writes_owner() {
    let mut main = Main::new();
    let source = main.add_object(Object::new("Source", ObjectType::Empty));
    let mut driven = Object::new("Driven", ObjectType::Empty);
    driven.id.anim_data = Some(AnimData {
        drivers: vec![FCurve::driver(
            "location",
            2,
            Driver {
                kind: DriverKind::Average,
                variables: vec![DriverVariable::single_property(
                    "z",
                    source.into(),
                    "location",
                )],
                ..Driver::default()
            },
        )],
        ..AnimData::default()
    });
    let driven = main.add_object(driven);
    let scene = scene_with(&mut main, &[source, driven]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let driver = OperationKey::new(driven, NodeType::Parameters, OperationCode::Driver)
        .named("location")
        .tagged(2);
    assert!(graph.relation_between(transform_final(source), driver).is_some());
    assert!(
        graph
            .relation_between(
                driver,
                OperationKey::new(driven, NodeType::Transform, OperationCode::TransformLocal),
            )
            .is_some()
    );

    let order = graph.evaluation_order().unwrap();
    let position = |key: OperationKey<'_>| {
        let op = graph.find_operation(&key).unwrap();
        order.iter().position(|&o| o == op).unwrap()
    };
    assert!(position(transform_final(source)) < position(transform_final(driven)));
}

#[test]
fn mutual_constraints_are_flagged_cyclic() {
    let mut main = Main::new();
    let a = main.add_object(Object::new("A", ObjectType::Empty));
    let b = main.add_object(Object::new("B", ObjectType::Empty));
    main.object_mut(a).constraints.push(
        Constraint::new("Copy", ConstraintKind::CopyLocation)
            .with_target(ConstraintTarget::object(b)),
    );
    main.object_mut(b).constraints.push(
        Constraint::new("Copy", ConstraintKind::CopyLocation)
            .with_target(ConstraintTarget::object(a)),
    );
    let scene = scene_with(&mut main, &[a, b]);
    let graph = build_depsgraph(&main, scene, &BuildOptions::default());

    assert!(graph.stats().cyclic_relations > 0);
    assert!(
        graph.evaluation_order().is_ok(),
        "cyclic relations are ignored when ordering"
    );
}

#[test]
fn time_change_reaches_animated_objects_only() {
    let mut main = Main::new();
    let action = main.add_action(Action {
        id: IdHeader::new("Move"),
        fcurves: vec![FCurve {
            rna_path: "location".into(),
            ..FCurve::default()
        }],
    });
    let mut animated = Object::new("Animated", ObjectType::Empty);
    animated.id.anim_data = Some(AnimData {
        action: Some(action),
        ..AnimData::default()
    });
    let animated = main.add_object(animated);
    let still = main.add_object(Object::new("Still", ObjectType::Empty));
    let scene = scene_with(&mut main, &[animated, still]);
    let mut graph = build_depsgraph(&main, scene, &BuildOptions::default());

    graph.tag_time_source();
    graph.flush_updates();
    assert!(updated(&graph, &transform_final(animated)));
    assert!(!updated(&graph, &transform_final(still)));
}

#[test]
fn user_edit_flushes_to_children() {
    let mut main = Main::new();
    let parent = main.add_object(Object::new("Parent", ObjectType::Empty));
    let child = main.add_object(Object::new("Child", ObjectType::Empty));
    let other = main.add_object(Object::new("Other", ObjectType::Empty));
    main.set_parent(child, parent, canopy_scene::ParentType::Object).unwrap();
    let scene = scene_with(&mut main, &[parent, child, other]);
    let mut graph = build_depsgraph(&main, scene, &BuildOptions::default());

    graph.tag_id(parent.into(), Some(NodeType::Transform), UpdateSource::UserEdit);
    graph.flush_updates();
    assert!(updated(&graph, &transform_final(child)));
    assert!(!updated(&graph, &transform_final(other)));

    graph.clear_update_tags();
    assert!(!updated(&graph, &transform_final(child)));
}

#[test]
fn hidden_objects_stay_out_of_the_graph() {
    let mut main = Main::new();
    let shown = main.add_object(Object::new("Shown", ObjectType::Empty));
    let hidden = main.add_object(Object::new("Hidden", ObjectType::Empty));
    main.object_mut(hidden).visibility |= canopy_scene::VisibilityFlags::HIDE_VIEWPORT;
    let scene = scene_with(&mut main, &[shown, hidden]);
    let graph = build_depsgraph(&main, scene, &BuildOptions::default());

    assert!(graph.find_id_node(shown.into()).is_some());
    assert!(graph.find_id_node(hidden.into()).is_none());
}

#[test]
fn deformed_mesh_waits_for_ik_pose() {
    let mut main = Main::new();
    let armature = main.add_armature(canopy_scene::Armature {
        id: IdHeader::new("Skeleton"),
        ..canopy_scene::Armature::default()
    });
    let mut rig = Object::new("Rig", ObjectType::Armature);
    rig.data = Some(armature.into());
    let mut pose = canopy_scene::Pose::default();
    for (name, parent) in [("root", None), ("upper", Some(0)), ("lower", Some(1))] {
        pose.channels.push(canopy_scene::PoseChannel::new(name, parent));
    }
    pose.channels[2].constraints.push(Constraint::new(
        "IK",
        ConstraintKind::Kinematic {
            chain_length: 2,
            use_tail: true,
            pole: None,
        },
    ));
    rig.pose = Some(pose);
    let rig = main.add_object(rig);
    let body = mesh_object(&mut main, "Body");
    main.object_mut(body).modifiers.push(canopy_scene::Modifier::new(
        "Armature",
        canopy_scene::ModifierKind::Armature { object: Some(rig) },
    ));
    let scene = scene_with(&mut main, &[rig, body]);
    let graph = build_depsgraph(&main, scene, &BuildOptions::default());

    assert_eq!(graph.stats().cyclic_relations, 0);
    let order = graph.evaluation_order().unwrap();
    let position = |key: OperationKey<'_>| {
        let op = graph.find_operation(&key).unwrap();
        order.iter().position(|&o| o == op).unwrap()
    };
    let solver =
        OperationKey::new(rig, NodeType::EvalPose, OperationCode::PoseIkSolver).named("upper");
    let pose_done = OperationKey::new(rig, NodeType::EvalPose, OperationCode::PoseDone);
    let modifier =
        OperationKey::new(body, NodeType::Geometry, OperationCode::Modifier).named("Armature");
    assert!(position(solver) < position(pose_done));
    assert!(position(pose_done) < position(modifier));
}

#[test]
fn wiring_an_object_twice_adds_nothing() {
    let mut main = Main::new();
    let target = mesh_object(&mut main, "Target");
    let ob = mesh_object(&mut main, "Cube");
    main.object_mut(ob).constraints.push(
        Constraint::new("Track", ConstraintKind::TrackTo)
            .with_target(ConstraintTarget::object(target)),
    );
    let scene = scene_with(&mut main, &[target, ob]);
    let mut graph = Depsgraph::new(BuildOptions::default().mode);
    NodeBuilder::new(&main, &mut graph).build_scene(scene, 0);

    RelationBuilder::new(&main, &mut graph).build_object(ob);
    let once = graph.stats().relations;
    assert!(once > 0, "the object was wired");

    // A fresh builder does not remember what was built and wires it again.
    let mut relations = RelationBuilder::new(&main, &mut graph);
    relations.build_object(ob);
    relations.build_object(ob);
    assert_eq!(graph.stats().relations, once);
}

#[test]
fn armature_parent_pose_feeds_child_geometry() {
    let mut main = Main::new();
    let rig = rig_object(&mut main, "Rig", &["root"]);
    let body = mesh_object(&mut main, "Body");
    main.set_parent(body, rig, ParentType::Armature).unwrap();
    let scene = scene_with(&mut main, &[rig, body]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    assert!(
        graph
            .relation_between(ComponentKey::new(rig, NodeType::EvalPose), geometry(body))
            .is_some(),
        "pose deforms the child"
    );
    assert!(
        graph
            .relation_between(
                ComponentKey::new(rig, NodeType::Transform),
                transform_parent(body),
            )
            .is_some(),
        "rig transform parents the child"
    );
}

#[test]
fn vertex_parent_reads_parent_geometry() {
    let mut main = Main::new();
    let parent = mesh_object(&mut main, "Parent");
    let child = main.add_object(Object::new("Child", ObjectType::Empty));
    main.set_parent(child, parent, ParentType::Vertex).unwrap();
    let scene = scene_with(&mut main, &[parent, child]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    assert!(
        graph
            .relation_between(geometry(parent), transform_parent(child))
            .is_some(),
        "vertex positions come from the evaluated geometry"
    );
    assert!(
        id_node(&graph, parent)
            .customdata_masks
            .contains(CustomDataMask::ORIGINDEX),
        "parent keeps original indices"
    );
    assert!(!id_node(&graph, child).customdata_masks.contains(CustomDataMask::ORIGINDEX));
}

#[test]
fn bone_parent_reads_the_named_bone() {
    let mut main = Main::new();
    let rig = rig_object(&mut main, "Rig", &["root", "hand"]);
    let prop = main.add_object(Object::new("Prop", ObjectType::Empty));
    main.set_parent(prop, rig, ParentType::Bone).unwrap();
    main.object_mut(prop).parent_bone = "hand".into();
    let scene = scene_with(&mut main, &[rig, prop]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let bone = |name: &'static str| ComponentKey::new(rig, NodeType::Bone).named(name);
    assert!(graph.relation_between(bone("hand"), transform_parent(prop)).is_some());
    assert!(
        graph.relation_between(bone("root"), transform_parent(prop)).is_none(),
        "other bones are not read"
    );
    assert!(graph.relation_between(transform_final(rig), transform_parent(prop)).is_some());
}

#[test]
fn lattice_and_path_parents_read_geometry() {
    let mut main = Main::new();
    let lattice = main.add_lattice(Lattice {
        id: IdHeader::new("Cage"),
        ..Lattice::default()
    });
    let cage = main.add_object(Object::new("Cage", ObjectType::Lattice).with_data(lattice));
    let path = main.add_curve(Curve {
        id: IdHeader::new("Path"),
        use_path: true,
        ..Curve::default()
    });
    let rail = main.add_object(Object::new("Rail", ObjectType::Curve).with_data(path));
    let plain = main.add_curve(Curve {
        id: IdHeader::new("Plain"),
        ..Curve::default()
    });
    let arc = main.add_object(Object::new("Arc", ObjectType::Curve).with_data(plain));

    let in_cage = main.add_object(Object::new("InCage", ObjectType::Empty));
    let on_rail = main.add_object(Object::new("OnRail", ObjectType::Empty));
    let on_arc = main.add_object(Object::new("OnArc", ObjectType::Empty));
    main.set_parent(in_cage, cage, ParentType::Object).unwrap();
    main.set_parent(on_rail, rail, ParentType::Object).unwrap();
    main.set_parent(on_arc, arc, ParentType::Object).unwrap();
    let scene = scene_with(&mut main, &[cage, rail, arc, in_cage, on_rail, on_arc]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let reads_geometry = |parent: ObjectId, child: ObjectId| {
        graph
            .relation_between(geometry(parent), transform_parent(child))
            .is_some()
    };
    assert!(reads_geometry(cage, in_cage), "lattice deform parent");
    assert!(reads_geometry(rail, on_rail), "curve follow parent");
    assert!(!reads_geometry(arc, on_arc), "curve without a path is a plain parent");
    assert!(
        graph
            .relation_between(
                ComponentKey::new(arc, NodeType::Transform),
                transform_parent(on_arc),
            )
            .is_some(),
        "plain parents still read the transform"
    );
}

#[test]
fn solver_constraints_follow_camera_and_time() {
    let mut main = Main::new();
    let camera = main.add_object(Object::new("Camera", ObjectType::Empty));
    let tracked = main.add_object(Object::new("Tracked", ObjectType::Empty));
    main.object_mut(tracked)
        .constraints
        .push(Constraint::new("Solve", ConstraintKind::ObjectSolver));
    let solved = main.add_object(Object::new("Solved", ObjectType::Empty));
    main.object_mut(solved)
        .constraints
        .push(Constraint::new("Solve", ConstraintKind::CameraSolver));
    let scene = scene_with(&mut main, &[camera, tracked, solved]);
    main.scene_mut(scene).camera = Some(camera);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let camera_transform = ComponentKey::new(camera, NodeType::Transform);
    assert!(
        graph
            .relation_between(camera_transform, transform_constraints(tracked))
            .is_some(),
        "object solver reads the scene camera"
    );
    assert!(
        graph
            .relation_between(camera_transform, transform_constraints(solved))
            .is_none(),
        "camera solver does not"
    );
    for ob in [tracked, solved] {
        assert!(graph.relation_between(TimeSourceKey, transform_constraints(ob)).is_some());
    }
}

#[test]
fn transform_cache_reads_the_cache_file() {
    let mut main = Main::new();
    let cache_file = main.add_cache_file(CacheFile {
        id: IdHeader::new("Shot"),
        ..CacheFile::default()
    });
    let ob = main.add_object(Object::new("Cached", ObjectType::Empty));
    main.object_mut(ob).constraints.push(Constraint::new(
        "Cache",
        ConstraintKind::TransformCache {
            cache_file: Some(cache_file),
        },
    ));
    let scene = scene_with(&mut main, &[ob]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    assert!(
        graph
            .relation_between(
                ComponentKey::new(cache_file, NodeType::Cache),
                transform_constraints(ob),
            )
            .is_some()
    );
    assert!(graph.relation_between(TimeSourceKey, transform_constraints(ob)).is_some());
}

#[test]
fn self_targeting_constraint_reads_local_transform() {
    let mut main = Main::new();
    let ob = main.add_object(Object::new("Loop", ObjectType::Empty));
    main.object_mut(ob).constraints.push(
        Constraint::new("Track", ConstraintKind::TrackTo).with_target(ConstraintTarget::object(ob)),
    );
    let scene = scene_with(&mut main, &[ob]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let local = OperationKey::new(ob, NodeType::Transform, OperationCode::TransformLocal);
    assert!(graph.relation_between(local, transform_constraints(ob)).is_some());
    assert!(graph.relation_between(transform_final(ob), transform_constraints(ob)).is_none());
    assert_eq!(graph.stats().cyclic_relations, 0);
}

#[test]
fn vertex_group_target_keeps_weights() {
    let mut main = Main::new();
    let target = mesh_object(&mut main, "Target");
    let ob = main.add_object(Object::new("Follower", ObjectType::Empty));
    main.object_mut(ob).constraints.push(
        Constraint::new("Copy", ConstraintKind::CopyLocation)
            .with_target(ConstraintTarget::sub(target, "Group")),
    );
    let scene = scene_with(&mut main, &[target, ob]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    assert!(
        graph
            .relation_between(geometry(target), transform_constraints(ob))
            .is_some()
    );
    assert!(
        id_node(&graph, target)
            .customdata_masks
            .contains(CustomDataMask::MDEFORMVERT),
        "vertex group weights are kept"
    );
}

#[test]
fn shrinkwrap_requests_boundary_only_when_needed() {
    let mut main = Main::new();
    let surface = mesh_object(&mut main, "Surface");
    let points = mesh_object(&mut main, "Points");
    let shrinkwrap = |shrink_type: ShrinkType| ConstraintKind::Shrinkwrap {
        shrink_type,
        track_normal: false,
        above_surface: false,
    };
    let a = main.add_object(Object::new("A", ObjectType::Empty));
    main.object_mut(a).constraints.push(
        Constraint::new("Wrap", shrinkwrap(ShrinkType::NearestSurface))
            .with_target(ConstraintTarget::object(surface)),
    );
    let b = main.add_object(Object::new("B", ObjectType::Empty));
    main.object_mut(b).constraints.push(
        Constraint::new("Wrap", shrinkwrap(ShrinkType::NearestVertex))
            .with_target(ConstraintTarget::object(points)),
    );
    let scene = scene_with(&mut main, &[surface, points, a, b]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    assert!(
        id_node(&graph, surface)
            .eval_flags
            .contains(EvalFlags::SHRINKWRAP_BOUNDARY),
        "nearest surface needs boundary data"
    );
    assert!(
        !id_node(&graph, points)
            .eval_flags
            .contains(EvalFlags::SHRINKWRAP_BOUNDARY),
        "nearest vertex does not"
    );
    for (ob, target) in [(a, surface), (b, points)] {
        assert!(
            graph
                .relation_between(geometry(target), transform_constraints(ob))
                .is_some()
        );
    }
}

#[test]
fn time_dependent_modifiers_follow_the_clock() {
    let mut main = Main::new();
    let ob = mesh_object(&mut main, "Sea");
    main.object_mut(ob).modifiers.push(Modifier::new(
        "Wave",
        ModifierKind::Wave {
            texture: None,
            map_object: None,
        },
    ));
    main.object_mut(ob).modifiers.push(Modifier::new(
        "Mirror",
        ModifierKind::Mirror {
            mirror_object: None,
        },
    ));
    let scene = scene_with(&mut main, &[ob]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let modifier = |name: &'static str| {
        OperationKey::new(ob, NodeType::Geometry, OperationCode::Modifier).named(name)
    };
    assert!(graph.relation_between(TimeSourceKey, modifier("Wave")).is_some());
    assert!(graph.relation_between(TimeSourceKey, modifier("Mirror")).is_none());
}

#[test]
fn synchronization_waits_for_transform_and_base_flags() {
    let mut main = Main::new();
    let shown = main.add_object(Object::new("Shown", ObjectType::Empty));
    let parent = main.add_object(Object::new("Parent", ObjectType::Empty));
    main.set_parent(shown, parent, ParentType::Object).unwrap();
    // The parent is pulled in through its child and has no base.
    let scene = scene_with(&mut main, &[shown]);
    let graph = build_depsgraph(&main, scene, &unreduced());

    let synchronize = |ob: ObjectId| {
        OperationKey::new(ob, NodeType::Synchronization, OperationCode::SynchronizeToOriginal)
    };
    let layer_exit = |ob: ObjectId| {
        OperationKey::new(ob, NodeType::ObjectFromLayer, OperationCode::ObjectFromLayerExit)
    };
    for ob in [shown, parent] {
        assert!(graph.relation_between(transform_final(ob), synchronize(ob)).is_some());
    }
    assert!(graph.relation_between(layer_exit(shown), synchronize(shown)).is_some());
    assert!(
        graph.relation_between(layer_exit(parent), synchronize(parent)).is_none(),
        "objects without a base skip the layer flags"
    );
}
