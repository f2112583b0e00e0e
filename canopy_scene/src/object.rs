// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Objects: placed instances of data in the scene.

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;
use glam::{Mat4, Vec4};

use crate::EvalMode;
use crate::armature::Pose;
use crate::constraint::Constraint;
use crate::geometry::GeometrySet;
use crate::id::{CollectionId, IdHeader, IdRef, MaterialId, ObjectId, TextureId};
use crate::modifier::Modifier;
use crate::particles::ParticleSystem;

/// What an object holds as data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// No data.
    #[default]
    Empty,
    /// A [`Mesh`](crate::Mesh).
    Mesh,
    /// A curve [`Curve`](crate::Curve).
    Curve,
    /// A surface [`Curve`](crate::Curve).
    Surface,
    /// A text [`Curve`](crate::Curve).
    Font,
    /// A [`MetaBall`](crate::MetaBall).
    MetaBall,
    /// A [`Lattice`](crate::Lattice).
    Lattice,
    /// An [`Armature`](crate::Armature).
    Armature,
    /// A [`Camera`](crate::Camera).
    Camera,
    /// A [`Light`](crate::Light).
    Light,
    /// A [`LightProbe`](crate::LightProbe).
    LightProbe,
    /// A [`Speaker`](crate::Speaker).
    Speaker,
    /// Hair [`Curves`](crate::Curves).
    Curves,
    /// A [`PointCloud`](crate::PointCloud).
    PointCloud,
    /// A [`Volume`](crate::Volume).
    Volume,
    /// A [`GreasePencil`](crate::GreasePencil).
    GreasePencil,
}

impl ObjectType {
    /// Returns `true` for types whose data evaluates to geometry.
    #[must_use]
    pub const fn has_geometry(self) -> bool {
        matches!(
            self,
            Self::Mesh
                | Self::Curve
                | Self::Surface
                | Self::Font
                | Self::MetaBall
                | Self::Lattice
                | Self::Curves
                | Self::PointCloud
                | Self::Volume
                | Self::GreasePencil
        )
    }

    /// Returns `true` for legacy curve, surface and text objects.
    #[must_use]
    pub const fn is_legacy_curve(self) -> bool {
        matches!(self, Self::Curve | Self::Surface | Self::Font)
    }
}

/// How an object is attached to its parent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParentType {
    /// Follow the parent transform, or its path for curve parents.
    #[default]
    Object,
    /// Deform with the parent armature.
    Armature,
    /// Follow one parent vertex.
    Vertex,
    /// Follow the triangle of three parent vertices.
    VertexTriangle,
    /// Follow a bone of the parent armature.
    Bone,
}

bitflags! {
    /// Legacy instancing flags of an object.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DupliFlags: u32 {
        /// Instance children on vertices.
        const VERTS = 1 << 0;
        /// Instance children on faces.
        const FACES = 1 << 1;
        /// Instance a collection.
        const COLLECTION = 1 << 2;
        /// Instance objects on particles.
        const PARTICLES = 1 << 3;
        /// Rotate vertex instances by the vertex normal.
        const ROTATION = 1 << 4;
        /// Scale face instances by face area.
        const FACES_SCALE = 1 << 5;
    }
}

impl DupliFlags {
    /// Flags that make an object an instancer.
    pub const INSTANCERS: Self = Self::VERTS
        .union(Self::FACES)
        .union(Self::COLLECTION)
        .union(Self::PARTICLES);
}

bitflags! {
    /// Per-mode visibility restrictions.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VisibilityFlags: u32 {
        /// Hidden in the viewport.
        const HIDE_VIEWPORT = 1 << 0;
        /// Hidden in renders.
        const HIDE_RENDER = 1 << 1;
    }
}

impl VisibilityFlags {
    /// Returns `true` if hidden in `mode`.
    #[must_use]
    pub const fn hidden_in(self, mode: EvalMode) -> bool {
        self.contains(mode.hide_flag())
    }
}

/// Local axis that points at the instancing normal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrackAxis {
    /// +X.
    X,
    /// +Y.
    #[default]
    Y,
    /// +Z.
    Z,
    /// -X.
    NegX,
    /// -Y.
    NegY,
    /// -Z.
    NegZ,
}

/// Local axis that stays upright when tracking.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum UpAxis {
    /// X.
    X,
    /// Y.
    Y,
    /// Z.
    #[default]
    Z,
}

/// Force field settings that reference other data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForceField {
    /// Texture of a texture field.
    pub texture: Option<TextureId>,
}

/// A scene object.
#[derive(Clone, Debug)]
pub struct Object {
    /// Entity header.
    pub id: IdHeader,
    /// Data type.
    pub kind: ObjectType,
    /// Data block; its kind matches [`kind`](Self::kind).
    pub data: Option<IdRef>,
    /// Parent object.
    pub parent: Option<ObjectId>,
    /// Parenting mode.
    pub parent_type: ParentType,
    /// Parent bone for [`ParentType::Bone`].
    pub parent_bone: String,
    /// Inverse of the parent transform at parenting time.
    pub parent_inverse: Mat4,
    /// Evaluated world transform.
    pub world: Mat4,
    /// Object constraints.
    pub constraints: Vec<Constraint>,
    /// Modifier stack.
    pub modifiers: Vec<Modifier>,
    /// Pose of armature objects.
    pub pose: Option<Pose>,
    /// Particle systems.
    pub particle_systems: Vec<ParticleSystem>,
    /// Legacy instancing flags.
    pub dupli: DupliFlags,
    /// Axis aligned to instancing normals.
    pub track_axis: TrackAxis,
    /// Upright axis.
    pub up_axis: UpAxis,
    /// Visibility restrictions.
    pub visibility: VisibilityFlags,
    /// Collection instanced with [`DupliFlags::COLLECTION`].
    pub instance_collection: Option<CollectionId>,
    /// Face instance scale factor.
    pub instance_faces_scale: f32,
    /// Material slots linked to the object.
    pub materials: Vec<Option<MaterialId>>,
    /// Force field.
    pub force_field: Option<ForceField>,
    /// Takes part in the rigid-body simulation.
    pub rigid_body: bool,
    /// Evaluated geometry, including realized instances.
    pub geometry_set: Option<GeometrySet>,
    /// Object color.
    pub color: Vec4,
    /// Render pass index.
    pub pass_index: i32,
}

impl Object {
    /// Creates an object of `kind` with identity transforms.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ObjectType) -> Self {
        Self {
            id: IdHeader::new(name),
            kind,
            data: None,
            parent: None,
            parent_type: ParentType::Object,
            parent_bone: String::new(),
            parent_inverse: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            constraints: Vec::new(),
            modifiers: Vec::new(),
            pose: None,
            particle_systems: Vec::new(),
            dupli: DupliFlags::empty(),
            track_axis: TrackAxis::Y,
            up_axis: UpAxis::Z,
            visibility: VisibilityFlags::empty(),
            instance_collection: None,
            instance_faces_scale: 1.0,
            materials: Vec::new(),
            force_field: None,
            rigid_body: false,
            geometry_set: None,
            color: Vec4::ONE,
            pass_index: 0,
        }
    }

    /// Sets the data block.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<IdRef>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Sets the world transform.
    #[must_use]
    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    /// Makes the object instance `collection`.
    #[must_use]
    pub fn with_instance_collection(mut self, collection: CollectionId) -> Self {
        self.instance_collection = Some(collection);
        self.dupli |= DupliFlags::COLLECTION;
        self
    }

    /// Returns `true` if the object is restricted in `mode`.
    #[must_use]
    pub fn is_hidden(&self, mode: EvalMode) -> bool {
        self.visibility.hidden_in(mode)
    }

    /// Returns `true` if the evaluated geometry carries instances that are
    /// not the object's own data.
    #[must_use]
    pub fn has_geometry_instances(&self) -> bool {
        self.geometry_set
            .as_ref()
            .is_some_and(|set| set.has_instances_for(self.kind))
    }
}
