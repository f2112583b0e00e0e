// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use canopy_depsgraph::{BuildOptions, NodeType, UpdateSource, build_depsgraph};
use canopy_scene::{
    Constraint, ConstraintKind, ConstraintTarget, IdHeader, Main, Mesh, Object, ObjectId,
    ObjectType, ParentType, SceneId,
};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn gen_range_usize(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        (self.next_u32() as usize) % upper_exclusive
    }
}

/// A scene of `n` mesh objects. Each object after the first is parented to
/// an earlier one, and every fourth tracks another earlier object.
fn build_scene(n: usize, seed: u64) -> (Main, SceneId, ObjectId) {
    let mut main = Main::new();
    let scene = main.new_scene("Scene");
    let master = main.scene(scene).master_collection.unwrap();
    let mut rng = Lcg::new(seed);
    let mut objects = Vec::with_capacity(n);

    for i in 0..n {
        let mesh = main.add_mesh(Mesh {
            id: IdHeader::new(format!("Mesh{i}")),
            ..Mesh::default()
        });
        let ob = main.add_object(Object::new(format!("Ob{i}"), ObjectType::Mesh).with_data(mesh));
        main.link_object(master, ob).unwrap();
        if i > 0 {
            let parent = objects[rng.gen_range_usize(i)];
            main.set_parent(ob, parent, ParentType::Object).unwrap();
        }
        if i > 1 && i % 4 == 0 {
            let target = objects[rng.gen_range_usize(i)];
            main.object_mut(ob).constraints.push(
                Constraint::new("Track", ConstraintKind::TrackTo)
                    .with_target(ConstraintTarget::object(target)),
            );
        }
        objects.push(ob);
    }
    (main, scene, objects[0])
}

fn bench_depsgraph(c: &mut Criterion) {
    let mut group = c.benchmark_group("canopy_depsgraph");
    group.sample_size(30);

    for &n in &[64_usize, 512, 2_048] {
        let (main, scene, root) = build_scene(n, 0xCA40_0000_0000_0001);

        group.bench_function(format!("build(n={n})"), |b| {
            b.iter(|| black_box(build_depsgraph(&main, scene, &BuildOptions::default())));
        });

        let unreduced = BuildOptions {
            transitive_reduction: false,
            ..BuildOptions::default()
        };
        group.bench_function(format!("build_unreduced(n={n})"), |b| {
            b.iter(|| black_box(build_depsgraph(&main, scene, &unreduced)));
        });

        let graph = build_depsgraph(&main, scene, &BuildOptions::default());
        group.bench_function(format!("flush_root_edit(n={n})"), |b| {
            b.iter_batched(
                || graph.clone(),
                |mut graph| {
                    graph.tag_id(root.into(), Some(NodeType::Transform), UpdateSource::UserEdit);
                    black_box(graph.flush_updates());
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("evaluation_order(n={n})"), |b| {
            b.iter(|| black_box(graph.evaluation_order().map(|order| order.len())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_depsgraph);
criterion_main!(benches);
