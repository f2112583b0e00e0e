// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_dupli::{DupliOptions, object_duplilist};
use canopy_scene::{
    Collection, DupliFlags, EvalMode, IdHeader, Main, Mesh, Object, ObjectId, ObjectType,
    ParentType, Particle, ParticleDrawFlags, ParticleKey, ParticleRenderAs, ParticleSettings,
    ParticleSystem,
};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::{Mat4, Quat, Vec3};

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

    fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1_u32 << 24) as f32
    }
}

fn empty(main: &mut Main, name: String, rng: &mut Lcg) -> ObjectId {
    let at = Vec3::new(rng.next_f32(), rng.next_f32(), rng.next_f32()) * 10.0;
    main.add_object(Object::new(name, ObjectType::Empty).with_world(Mat4::from_translation(at)))
}

/// An instancer of a collection of `n` empties.
fn collection_scene(n: usize) -> (Main, ObjectId) {
    let mut main = Main::new();
    let mut rng = Lcg::new(0xD0_0001);
    let collection = main.add_collection(Collection::new("Pool"));
    for i in 0..n {
        let member = empty(&mut main, format!("Member{i}"), &mut rng);
        main.link_object(collection, member).unwrap();
    }
    let instancer = main.add_object(
        Object::new("Instancer", ObjectType::Empty).with_instance_collection(collection),
    );
    (main, instancer)
}

/// A `side` x `side` vertex grid instancing one child on every vertex.
fn verts_scene(side: usize) -> (Main, ObjectId) {
    let mut main = Main::new();
    let mut positions = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            positions.push(Vec3::new(x as f32, y as f32, 0.0));
        }
    }
    let normals = vec![Vec3::Z; positions.len()];
    let mesh = main.add_mesh(Mesh::from_points("Grid", positions, normals));
    let mut grid = Object::new("Grid", ObjectType::Mesh).with_data(mesh);
    grid.dupli |= DupliFlags::VERTS;
    let grid = main.add_object(grid);
    let child = main.add_object(Object::new("Child", ObjectType::Empty));
    main.set_parent(child, grid, ParentType::Object).unwrap();
    (main, grid)
}

/// An emitter of `n` particles picking randomly from a pool of eight.
fn particles_scene(n: usize) -> (Main, ObjectId) {
    let mut main = Main::new();
    let mut rng = Lcg::new(0xD0_0002);
    let collection = main.add_collection(Collection::new("Pool"));
    for i in 0..8 {
        let member = empty(&mut main, format!("Pick{i}"), &mut rng);
        main.link_object(collection, member).unwrap();
    }
    let settings = main.add_particle_settings(ParticleSettings {
        id: IdHeader::new("Settings"),
        render_as: ParticleRenderAs::Collection,
        instance_collection: Some(collection),
        draw: ParticleDrawFlags::RANDOM_COLLECTION,
        size: 1.0,
        ..ParticleSettings::default()
    });
    let mut psys = ParticleSystem::new("Particles", settings);
    psys.particles = (0..n)
        .map(|_| Particle {
            state: Some(ParticleKey {
                location: Vec3::new(rng.next_f32(), rng.next_f32(), 0.0) * 100.0,
                rotation: Quat::from_rotation_z(rng.next_f32()),
            }),
            size: 0.5 + rng.next_f32(),
            ..Particle::default()
        })
        .collect();
    let mut emitter = Object::new("Emitter", ObjectType::Mesh);
    emitter.dupli |= DupliFlags::PARTICLES;
    emitter.particle_systems.push(psys);
    let emitter = main.add_object(emitter);
    (main, emitter)
}

fn bench_dupli(c: &mut Criterion) {
    let mut group = c.benchmark_group("canopy_dupli");
    group.sample_size(30);
    let options = DupliOptions::default();

    let expand = |main: &Main, object: ObjectId| {
        object_duplilist(main, EvalMode::Render, object, &options).len()
    };

    for &n in &[256_usize, 4_096] {
        let (main, instancer) = collection_scene(n);
        group.bench_function(format!("collection(n={n})"), |b| {
            b.iter(|| black_box(expand(&main, instancer)));
        });

        let (main, emitter) = particles_scene(n);
        group.bench_function(format!("particles_random(n={n})"), |b| {
            b.iter(|| black_box(expand(&main, emitter)));
        });
    }

    for &side in &[16_usize, 64] {
        let (main, grid) = verts_scene(side);
        group.bench_function(format!("verts(n={})", side * side), |b| {
            b.iter(|| black_box(expand(&main, grid)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dupli);
criterion_main!(benches);
