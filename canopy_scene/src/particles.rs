// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Particle settings and per-object particle systems.

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;
use glam::{Quat, Vec2, Vec3};

use crate::id::{CollectionId, IdHeader, ObjectId, ParticleSettingsId, TextureId};

/// Emitter or hair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParticleKind {
    /// Particles emitted over time.
    #[default]
    Emitter,
    /// Static strands.
    Hair,
}

/// Particle physics model.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParticlePhysics {
    /// No physics.
    None,
    /// Newtonian motion.
    #[default]
    Newtonian,
    /// Motion keyed by other particle systems.
    Keyed,
    /// Flocking.
    Boids,
    /// Particle fluid.
    Fluid,
}

/// How particles render.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParticleRenderAs {
    /// Not rendered.
    None,
    /// As halos.
    #[default]
    Halo,
    /// As lines.
    Line,
    /// As strands along their path.
    Path,
    /// As instances of one object.
    Object,
    /// As instances picked from a collection.
    Collection,
}

/// How particles display in the viewport.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParticleDisplayAs {
    /// Not displayed.
    None,
    /// Displayed the way they render.
    #[default]
    Render,
    /// As points.
    Point,
    /// As crosses.
    Cross,
    /// As axes.
    Axis,
}

bitflags! {
    /// Display options of particle settings.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ParticleDrawFlags: u32 {
        /// Render parent particles alongside children.
        const PARENT = 1 << 0;
        /// Use the instanced object's rotation.
        const ROTATE_OBJECT = 1 << 1;
        /// Ignore the instanced object's scale.
        const NO_SCALE_OBJECT = 1 << 2;
        /// Use the instanced object's world location.
        const GLOBAL_OBJECT = 1 << 3;
        /// Instance the whole collection per particle.
        const WHOLE_COLLECTION = 1 << 4;
        /// Pick collection members by per-object counts.
        const COUNT_COLLECTION = 1 << 5;
        /// Pick collection members at random.
        const RANDOM_COLLECTION = 1 << 6;
    }
}

bitflags! {
    /// State of one particle.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ParticleFlags: u32 {
        /// Not yet born or already dead.
        const UNEXIST = 1 << 0;
        /// Hidden from display.
        const NO_DISPLAY = 1 << 1;
    }
}

/// Per-object pick count of a counted collection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstanceWeight {
    /// Collection member.
    pub object: ObjectId,
    /// Consecutive particles that pick this object.
    pub count: u32,
}

/// A texture slot of particle settings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticleTextureSlot {
    /// Texture.
    pub texture: Option<TextureId>,
    /// Object providing texture coordinates.
    pub object: Option<ObjectId>,
}

/// A boid rule that references an object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BoidRule {
    /// Goal or avoided object.
    pub object: Option<ObjectId>,
}

/// Shared particle settings.
#[derive(Clone, Debug, Default)]
pub struct ParticleSettings {
    /// Entity header.
    pub id: IdHeader,
    /// Emitter or hair.
    pub kind: ParticleKind,
    /// Physics model.
    pub physics: ParticlePhysics,
    /// Render mode.
    pub render_as: ParticleRenderAs,
    /// Viewport display mode.
    pub display_as: ParticleDisplayAs,
    /// Display flags.
    pub draw: ParticleDrawFlags,
    /// Object instanced in [`ParticleRenderAs::Object`] mode.
    pub instance_object: Option<ObjectId>,
    /// Collection instanced in [`ParticleRenderAs::Collection`] mode.
    pub instance_collection: Option<CollectionId>,
    /// Per-object counts for [`ParticleDrawFlags::COUNT_COLLECTION`].
    pub instance_weights: Vec<InstanceWeight>,
    /// Texture slots.
    pub textures: Vec<ParticleTextureSlot>,
    /// Boid rules.
    pub boid_rules: Vec<BoidRule>,
    /// Collision objects, all scene objects when unset.
    pub collision_collection: Option<CollectionId>,
    /// Force fields, all scene objects when unset.
    pub effector_collection: Option<CollectionId>,
    /// Number of particles.
    pub count: u32,
    /// Base particle size.
    pub size: f32,
}

/// Location and orientation of a particle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleKey {
    /// World-space location.
    pub location: Vec3,
    /// Orientation.
    pub rotation: Quat,
}

impl Default for ParticleKey {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// A simulated particle.
#[derive(Clone, Debug, Default)]
pub struct Particle {
    /// State at the current frame; `None` if not evaluated.
    pub state: Option<ParticleKey>,
    /// Size multiplier.
    pub size: f32,
    /// State flags.
    pub flag: ParticleFlags,
    /// UV of the emitting surface point.
    pub uv: Option<Vec2>,
    /// Original coordinates of the emitting surface point.
    pub orco: Option<Vec3>,
}

/// An interpolated child particle.
#[derive(Clone, Debug, Default)]
pub struct ChildParticle {
    /// State at the current frame.
    pub state: Option<ParticleKey>,
    /// Size multiplier.
    pub size: f32,
    /// UV of the emitting surface point.
    pub uv: Option<Vec2>,
    /// Original coordinates of the emitting surface point.
    pub orco: Option<Vec3>,
    /// Parent particle.
    pub parent: usize,
}

/// A cached hair strand.
#[derive(Clone, Debug, Default)]
pub struct PathStrand {
    /// Points from root to tip.
    pub keys: Vec<Vec3>,
    /// Segment count; negative marks a strand that failed to cache.
    pub segments: i32,
    /// Surface normal at the root.
    pub normal: Vec3,
}

impl PathStrand {
    /// Creates a strand from its points.
    #[must_use]
    pub fn new(keys: Vec<Vec3>) -> Self {
        let segments = i32::try_from(keys.len()).unwrap_or(i32::MAX) - 1;
        Self {
            keys,
            segments,
            normal: Vec3::Z,
        }
    }
}

/// A keyed-physics target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticleTarget {
    /// Object holding the target system; the owner if unset.
    pub object: Option<ObjectId>,
    /// Index of the target system on that object.
    pub system: usize,
}

/// A particle system of an object.
#[derive(Clone, Debug, Default)]
pub struct ParticleSystem {
    /// System name, unique on its object.
    pub name: String,
    /// Settings.
    pub settings: Option<ParticleSettingsId>,
    /// Random seed.
    pub seed: u32,
    /// Displayed in the viewport.
    pub show_viewport: bool,
    /// Rendered.
    pub show_render: bool,
    /// Parent particles.
    pub particles: Vec<Particle>,
    /// Child particles.
    pub children: Vec<ChildParticle>,
    /// Cached parent hair strands.
    pub path_cache: Option<Vec<PathStrand>>,
    /// Cached child hair strands.
    pub child_path_cache: Option<Vec<PathStrand>>,
    /// Hair dynamics are enabled.
    pub hair_dynamics: bool,
    /// Keyed-physics targets.
    pub targets: Vec<ParticleTarget>,
}

impl ParticleSystem {
    /// Creates a system using `settings`, visible in both modes.
    #[must_use]
    pub fn new(name: impl Into<String>, settings: ParticleSettingsId) -> Self {
        Self {
            name: name.into(),
            settings: Some(settings),
            show_viewport: true,
            show_render: true,
            ..Self::default()
        }
    }
}
