// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The modifier stack of an object.

use alloc::string::String;
use alloc::vec::Vec;

use crate::id::{CacheFileId, CollectionId, NodeTreeId, ObjectId, TextureId};

/// The closed set of modifier kinds, with the references each one holds.
#[derive(Clone, Debug, PartialEq)]
pub enum ModifierKind {
    /// Deform with an armature.
    Armature {
        /// Armature object.
        object: Option<ObjectId>,
    },
    /// Deform with a lattice.
    Lattice {
        /// Lattice object.
        object: Option<ObjectId>,
    },
    /// Deform along a curve.
    Curve {
        /// Curve object.
        object: Option<ObjectId>,
    },
    /// Move vertices with an object or bone.
    Hook {
        /// Hook object.
        object: Option<ObjectId>,
        /// Bone of `object`, if an armature.
        subtarget: String,
    },
    /// Repeat the geometry.
    Array {
        /// Geometry placed at the start.
        start_cap: Option<ObjectId>,
        /// Geometry placed at the end.
        end_cap: Option<ObjectId>,
        /// Object providing the per-copy offset.
        offset_object: Option<ObjectId>,
        /// Curve the array is fitted to.
        curve: Option<ObjectId>,
    },
    /// Mirror across an axis.
    Mirror {
        /// Object providing the mirror frame.
        mirror_object: Option<ObjectId>,
    },
    /// Boolean operation with other geometry.
    Boolean {
        /// The other operand.
        operand: BooleanOperand,
    },
    /// Snap onto another mesh.
    Shrinkwrap {
        /// Target mesh object.
        target: Option<ObjectId>,
        /// Secondary projection target.
        auxiliary_target: Option<ObjectId>,
    },
    /// Displace along a texture.
    Displace {
        /// Displacement texture.
        texture: Option<TextureId>,
        /// Object providing texture coordinates.
        map_object: Option<ObjectId>,
    },
    /// Animated wave deformation.
    Wave {
        /// Modulating texture.
        texture: Option<TextureId>,
        /// Object providing the wave origin.
        map_object: Option<ObjectId>,
    },
    /// Deform with a cage mesh.
    MeshDeform {
        /// Cage object.
        object: Option<ObjectId>,
    },
    /// Bind to the surface of another mesh.
    SurfaceDeform {
        /// Bound mesh object.
        target: Option<ObjectId>,
    },
    /// Copy attributes from another mesh.
    DataTransfer {
        /// Source mesh object.
        source: Option<ObjectId>,
    },
    /// Cast to a primitive shape.
    Cast {
        /// Object providing the cast center.
        object: Option<ObjectId>,
    },
    /// Project UVs from objects.
    UvProject {
        /// Projector objects.
        projectors: Vec<ObjectId>,
    },
    /// Build faces over time.
    Build,
    /// Ocean surface simulation.
    Ocean,
    /// Evaluation slot of a particle system.
    ParticleSystem,
    /// Instance geometry along particles of another object.
    ParticleInstance {
        /// Object holding the particle systems.
        object: Option<ObjectId>,
    },
    /// Cloth simulation.
    Cloth,
    /// Soft-body simulation.
    SoftBody,
    /// Collision surface for simulations.
    Collision,
    /// Dynamic paint canvas or brush.
    DynamicPaint,
    /// Fluid simulation.
    Fluid,
    /// Geometry nodes.
    Nodes {
        /// Node group evaluated by the modifier.
        node_tree: Option<NodeTreeId>,
    },
    /// Read geometry from a cache file.
    MeshSequenceCache {
        /// Source cache.
        cache_file: Option<CacheFileId>,
    },
    /// Subdivision surface.
    Subdivision,
    /// Add thickness.
    Solidify,
    /// Bevel edges.
    Bevel,
    /// Smooth vertices.
    Smooth,
}

/// Operand of a boolean modifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BooleanOperand {
    /// No operand.
    #[default]
    None,
    /// A single object.
    Object(ObjectId),
    /// Every object of a collection.
    Collection(CollectionId),
}

impl ModifierKind {
    /// Returns `true` if the modifier result changes with the current frame
    /// even without animation.
    #[must_use]
    pub fn depends_on_time(&self) -> bool {
        match self {
            Self::Build
            | Self::Ocean
            | Self::Wave { .. }
            | Self::Cloth
            | Self::SoftBody
            | Self::DynamicPaint
            | Self::Fluid
            | Self::ParticleSystem
            | Self::MeshSequenceCache { .. } => true,
            Self::Displace { texture, .. } => texture.is_some(),
            _ => false,
        }
    }

    /// Returns `true` for simulation modifiers that own a point cache.
    #[must_use]
    pub const fn has_point_cache(&self) -> bool {
        matches!(
            self,
            Self::Cloth | Self::SoftBody | Self::DynamicPaint | Self::Fluid
        )
    }
}

/// One entry of a modifier stack.
#[derive(Clone, Debug)]
pub struct Modifier {
    /// Modifier name, unique on its object.
    pub name: String,
    /// Kind and references.
    pub kind: ModifierKind,
    /// Evaluated in the viewport.
    pub show_viewport: bool,
    /// Evaluated for final renders.
    pub show_render: bool,
}

impl Modifier {
    /// Creates a modifier enabled in both modes.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ModifierKind) -> Self {
        Self {
            name: name.into(),
            kind,
            show_viewport: true,
            show_render: true,
        }
    }
}
