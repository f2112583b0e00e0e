// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Objects placed on particles and hair strands.

use alloc::vec::Vec;

use glam::{Mat4, Vec2, Vec3};

use canopy_scene::{
    Collection, CollectionId, EvalMode, Object, ObjectId, ParticleDisplayAs, ParticleDrawFlags,
    ParticleFlags, ParticleKind, ParticleRenderAs, ParticleSettings, ParticleSystem, PathStrand,
};

use super::collection::collection_space;
use crate::context::{DupliContext, Traversal, id_index};
use crate::dupli::ParticleSystemRef;
use crate::float;
use crate::math::{basis_scale, scale_basis, vec_to_quat, with_translation};
use crate::rng::Rng;

/// Seed offset of the collection pick generator.
const PICK_SEED: u32 = 31_415_926;

pub(super) fn make_duplis<'a>(ctx: &DupliContext<'a, '_>, traversal: &mut Traversal<'a>) {
    let Some(object) = ctx.object() else {
        return;
    };
    for (index, psys) in object.particle_systems.iter().enumerate() {
        if let Some(pctx) = ctx.descend(ctx.object, None, id_index(index), None) {
            make_duplis_system(&pctx, traversal, index, psys);
        }
    }
}

/// What every particle of a system instances.
enum Instanced<'a> {
    Object(ObjectId),
    Collection {
        collection: &'a Collection,
        /// Candidates for per-particle picks.
        members: Vec<ObjectId>,
        /// Every visible member, for whole-collection instancing.
        whole: Option<Vec<ObjectId>>,
        random: bool,
    },
}

impl<'a> Instanced<'a> {
    fn resolve(ctx: &DupliContext<'a, '_>, settings: &'a ParticleSettings) -> Option<Self> {
        let main = ctx.main;
        match settings.render_as {
            ParticleRenderAs::Object => {
                let object = settings.instance_object?;
                // An emitter instancing itself would recurse forever.
                (object != ctx.object).then_some(Self::Object(object))
            }
            ParticleRenderAs::Collection => {
                let id = settings.instance_collection?;
                let collection = main.get_collection(id)?;
                let visible: Vec<ObjectId> = main
                    .collection_visible_objects(id, ctx.mode)
                    .into_iter()
                    .map(|(_, object)| object)
                    .collect();
                if visible.is_empty() || contains_object(ctx, id, ctx.object) {
                    return None;
                }

                let draw = settings.draw;
                let whole = draw.contains(ParticleDrawFlags::WHOLE_COLLECTION);
                let members = if draw.contains(ParticleDrawFlags::COUNT_COLLECTION) && !whole {
                    weighted_members(settings, &visible)
                } else {
                    visible.clone()
                };
                Some(Self::Collection {
                    collection,
                    members,
                    whole: whole.then_some(visible),
                    random: draw.contains(ParticleDrawFlags::RANDOM_COLLECTION) && !whole,
                })
            }
            _ => None,
        }
    }

    /// Picks the object for particle `a`.
    fn pick(&self, rng: &mut Rng, a: usize) -> Option<ObjectId> {
        match self {
            Self::Object(object) => Some(*object),
            Self::Collection {
                members, random, ..
            } => {
                if members.is_empty() {
                    return None;
                }
                let b = if *random {
                    rng.next_int() as usize % members.len()
                } else {
                    a % members.len()
                };
                Some(members[b])
            }
        }
    }
}

fn contains_object(ctx: &DupliContext<'_, '_>, collection: CollectionId, object: ObjectId) -> bool {
    ctx.main
        .collection_object_cache(collection)
        .iter()
        .any(|base| base.object == object)
}

/// Repeats each weighted object by its count, in weight order.
///
/// Weights naming an object that is not a visible member are dropped.
fn weighted_members(settings: &ParticleSettings, visible: &[ObjectId]) -> Vec<ObjectId> {
    let mut members = Vec::new();
    for weight in &settings.instance_weights {
        let Some(&object) = visible.iter().find(|&&member| member == weight.object) else {
            continue;
        };
        for _ in 0..weight.count {
            members.push(object);
        }
    }
    members
}

/// Placement of a hair instance along its strand: X follows the strand,
/// scaled by its length.
fn strand_transform(strand: &PathStrand) -> Option<(Mat4, f32)> {
    let segments = usize::try_from(strand.segments).ok()?;
    let root = *strand.keys.first()?;
    let tip = *strand.keys.get(segments)?;
    let dir = tip - root;
    let len = dir.length();
    let dir = dir.normalize_or_zero();

    let mut nor = strand.normal.normalize_or_zero();
    if float::abs(nor.dot(dir)) > 0.999_999 {
        nor = if float::abs(nor.dot(Vec3::NEG_X)) > 0.999_999 {
            Vec3::Y
        } else {
            Vec3::X
        };
    }
    let side = nor.cross(dir).normalize_or_zero();
    let nor = dir.cross(side);

    let matrix = Mat4::from_cols(
        dir.extend(0.0),
        side.extend(0.0),
        nor.extend(0.0),
        root.extend(1.0),
    );
    Some((matrix, len))
}

/// One parent or child particle, flattened.
struct Emitted {
    matrix: Mat4,
    /// Strand length for hair, one otherwise.
    scale: f32,
    size: f32,
    uv: Option<Vec2>,
    orco: Option<Vec3>,
}

fn emitted(
    psys: &ParticleSystem,
    settings: &ParticleSettings,
    hair: bool,
    totpart: usize,
    no_draw: ParticleFlags,
    a: usize,
) -> Option<Emitted> {
    let (state, size, uv, orco, strand) = if a < totpart {
        let particle = psys.particles.get(a);
        if particle.is_some_and(|pa| pa.flag.intersects(no_draw)) {
            return None;
        }
        let strand = psys.path_cache.as_ref().and_then(|cache| cache.get(a));
        (
            particle.and_then(|pa| pa.state),
            particle.map_or(settings.size, |pa| pa.size),
            particle.and_then(|pa| pa.uv),
            particle.and_then(|pa| pa.orco),
            strand,
        )
    } else {
        let child = psys.children.get(a - totpart)?;
        let parent = psys.particles.get(child.parent);
        let strand = psys
            .child_path_cache
            .as_ref()
            .and_then(|cache| cache.get(a - totpart));
        (
            child.state,
            child.size,
            child.uv.or_else(|| parent.and_then(|pa| pa.uv)),
            child.orco.or_else(|| parent.and_then(|pa| pa.orco)),
            strand,
        )
    };

    let (matrix, scale) = if hair {
        // Strands that were never cached cannot place an instance.
        strand_transform(strand?)?
    } else {
        let state = state?;
        let matrix =
            Mat4::from_rotation_translation(state.rotation.normalize(), state.location);
        (matrix, 1.0)
    };
    Some(Emitted {
        matrix,
        scale,
        size,
        uv,
        orco,
    })
}

/// Transform of a single instanced object on a particle.
fn object_on_particle(settings: &ParticleSettings, object: &Object, particle: &Emitted) -> Mat4 {
    let draw = settings.draw;
    let location = object.world.w_axis.truncate();
    let mut obmat = with_translation(object.world, Vec3::ZERO);

    if !draw.contains(ParticleDrawFlags::ROTATE_OBJECT) {
        // Particles align their X axis, so turn the object's track axis onto it.
        let size = Mat4::from_scale(basis_scale(&obmat));
        obmat = Mat4::from_quat(vec_to_quat(Vec3::NEG_X, object.track_axis, object.up_axis));
        if !draw.contains(ParticleDrawFlags::NO_SCALE_OBJECT) {
            obmat *= size;
        }
    } else if draw.contains(ParticleDrawFlags::NO_SCALE_OBJECT) {
        obmat *= Mat4::from_scale(basis_scale(&obmat)).inverse();
    }

    let matrix = scale_basis(particle.matrix * obmat, particle.size * particle.scale);
    if draw.contains(ParticleDrawFlags::GLOBAL_OBJECT) {
        let translation = matrix.w_axis.truncate() + location;
        with_translation(matrix, translation)
    } else {
        matrix
    }
}

fn make_duplis_system<'a>(
    ctx: &DupliContext<'a, '_>,
    traversal: &mut Traversal<'a>,
    index: usize,
    psys: &'a ParticleSystem,
) {
    let main = ctx.main;
    let Some(settings) = psys.settings.and_then(|id| main.get_particle_settings(id)) else {
        return;
    };
    let rendering = ctx.mode == EvalMode::Render;
    let enabled = if rendering {
        psys.show_render
    } else {
        psys.show_viewport
    };
    if !enabled {
        return;
    }
    if !(rendering || settings.display_as == ParticleDisplayAs::Render) {
        return;
    }
    let Some(instanced) = Instanced::resolve(ctx, settings) else {
        return;
    };

    let mut no_draw = ParticleFlags::UNEXIST;
    if !rendering {
        no_draw |= ParticleFlags::NO_DISPLAY;
    }

    let (hair, totpart, totchild) = if settings.kind == ParticleKind::Hair {
        let Some(path_cache) = &psys.path_cache else {
            return;
        };
        let child_cache = psys.child_path_cache.as_ref();
        if !psys.children.is_empty() && child_cache.is_none() {
            return;
        }
        (true, path_cache.len(), child_cache.map_or(0, Vec::len))
    } else {
        (false, psys.particles.len(), psys.children.len())
    };

    let mut rng = Rng::new(PICK_SEED.wrapping_add(psys.seed));
    let start = if totchild == 0 || settings.draw.contains(ParticleDrawFlags::PARENT) {
        0
    } else {
        totpart
    };
    let system = ParticleSystemRef {
        object: ctx.object,
        index,
    };

    for a in start..totpart + totchild {
        let Some(particle) = emitted(psys, settings, hair, totpart, no_draw, a) else {
            continue;
        };

        if let Instanced::Collection {
            collection,
            whole: Some(members),
            ..
        } = &instanced
        {
            let factor = particle.size * particle.scale;
            for &member in members {
                let Some(object) = main.get_object(member) else {
                    continue;
                };
                let local = collection_space(object.world, collection.instance_offset);
                let local = with_translation(
                    scale_basis(local, factor),
                    local.w_axis.truncate() * factor,
                );
                let matrix = particle.matrix * local;
                let dupli = ctx.make_dupli(traversal, member, None, matrix, id_index(a), None);
                dupli.particle_system = Some(system);
                dupli.uv = particle.uv;
                dupli.orco = particle.orco;
            }
            continue;
        }

        let Some(picked) = instanced.pick(&mut rng, a) else {
            continue;
        };
        let Some(object) = main.get_object(picked) else {
            continue;
        };
        let matrix = object_on_particle(settings, object, &particle);
        let dupli = ctx.make_dupli(traversal, picked, None, matrix, id_index(a), None);
        dupli.particle_system = Some(system);
        dupli.uv = particle.uv;
        dupli.orco = particle.orco;
    }
}
