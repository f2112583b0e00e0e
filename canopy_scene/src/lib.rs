// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Scene: the entity database that scene evaluation reads.
//!
//! A [`Main`] owns every entity of a scene file in one store per kind and
//! hands out typed handles ([`ObjectId`], [`CollectionId`], ...). Any
//! entity can be named with the closed tag [`IdRef`], whose [`IdKind`]
//! selects the store.
//!
//! Every entity carries an [`IdHeader`] with its name, custom
//! [`IdProperties`] and optional [`AnimData`] (action, NLA tracks and
//! drivers).
//!
//! ## Quick Start
//!
//! ```rust
//! use canopy_scene::{EvalMode, Main, Object, ObjectType};
//!
//! let mut main = Main::new();
//! let scene = main.new_scene("Scene");
//! let master = main.scene(scene).master_collection.unwrap();
//!
//! let cube = main.add_object(Object::new("Cube", ObjectType::Empty));
//! main.link_object(master, cube).unwrap();
//!
//! let visible = main.collection_visible_objects(master, EvalMode::Viewport);
//! assert_eq!(visible, [(0, cube)]);
//! ```
//!
//! ## Structural edits
//!
//! Parenting and collection linking go through [`Main::set_parent`],
//! [`Main::link_collection`] and [`Main::link_object`], which reject cycles
//! with a [`SceneError`]. Everything else is plain public data.
//!
//! ## Features
//!
//! - `std` (default): use `std` math through `glam`.
//! - `libm`: use `libm` math through `glam` for `no_std` targets.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod anim;
mod armature;
mod collection;
mod constraint;
mod data;
mod database;
mod error;
mod geometry;
mod id;
mod modifier;
mod object;
mod particles;
mod property;
pub mod rna;
mod scene;
mod shading;

pub use anim::{
    Action, AnimData, Driver, DriverKind, DriverTarget, DriverVariable, DriverVariableKind, FCurve,
    NlaStrip, NlaTrack,
};
pub use armature::{Armature, Bone, IkSolver, Pose, PoseChannel};
pub use collection::Collection;
pub use constraint::{Constraint, ConstraintKind, ConstraintTarget, ShrinkType};
pub use data::{CacheFile, Camera, Light, LightProbe, Mask, MovieClip, Sound, Speaker};
pub use database::{CollectionBase, LayerBase, Main, split_name_number};
pub use error::SceneError;
pub use geometry::{
    AttributeArray, CharTransform, Curve, CurveKind, Curves, GeometrySet, GreasePencil,
    InstanceReference, Instances, Key, KeyBlock, Lattice, Mesh, MetaBall, PointCloud, TextLayout,
    Volume,
};
pub use id::{
    ActionId, ArmatureId, CacheFileId, CameraId, CollectionId, CurveId, CurvesId, Datablock,
    GreasePencilId, IdHeader, IdKind, IdRef, ImageId, KeyId, LatticeId, LightId, LightProbeId,
    LineStyleId, MaskId, MaterialId, MeshId, MetaBallId, MovieClipId, NodeTreeId, ObjectId,
    ParticleSettingsId, PointCloudId, SceneId, SoundId, SpeakerId, TextureId, VolumeId, WorldId,
};
pub use modifier::{BooleanOperand, Modifier, ModifierKind};
pub use object::{
    DupliFlags, ForceField, Object, ObjectType, ParentType, TrackAxis, UpAxis, VisibilityFlags,
};
pub use particles::{
    BoidRule, ChildParticle, InstanceWeight, Particle, ParticleDisplayAs, ParticleDrawFlags,
    ParticleFlags, ParticleKey, ParticleKind, ParticlePhysics, ParticleRenderAs, ParticleSettings,
    ParticleSystem, ParticleTarget, ParticleTextureSlot, PathStrand,
};
pub use property::{IdProperties, IdProperty};
pub use scene::{LayerCollection, Scene, Sequencer, Strip, StripKind, ViewLayer};
pub use shading::{
    Image, LineStyle, Material, Node, NodeTree, NodeTreeKind, Texture, World,
};

/// Whether scene evaluation serves the interactive viewport or a final render.
///
/// Selects which visibility flags apply and which particle systems are
/// evaluated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum EvalMode {
    /// Interactive viewport.
    #[default]
    Viewport,
    /// Final render.
    Render,
}

impl EvalMode {
    /// The object visibility flag that hides objects in this mode.
    #[must_use]
    pub const fn hide_flag(self) -> VisibilityFlags {
        match self {
            Self::Viewport => VisibilityFlags::HIDE_VIEWPORT,
            Self::Render => VisibilityFlags::HIDE_RENDER,
        }
    }
}
