// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object and bone constraints.

use alloc::string::String;

use smallvec::SmallVec;

use crate::id::{CacheFileId, MovieClipId, ObjectId};

/// A target of a constraint: an object and an optional sub-target.
///
/// The sub-target names a bone on armature objects and a vertex group on
/// mesh and lattice objects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintTarget {
    /// Target object.
    pub object: Option<ObjectId>,
    /// Bone or vertex-group name.
    pub subtarget: String,
}

impl ConstraintTarget {
    /// Targets a whole object.
    #[must_use]
    pub fn object(object: ObjectId) -> Self {
        Self {
            object: Some(object),
            subtarget: String::new(),
        }
    }

    /// Targets a bone or vertex group of `object`.
    #[must_use]
    pub fn sub(object: ObjectId, subtarget: impl Into<String>) -> Self {
        Self {
            object: Some(object),
            subtarget: subtarget.into(),
        }
    }
}

/// Shrinkwrap projection mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ShrinkType {
    /// Snap to the nearest surface point.
    #[default]
    NearestSurface,
    /// Project along an axis.
    Project,
    /// Snap to the nearest vertex.
    NearestVertex,
    /// Project onto the target's surface along its normals.
    TargetProject,
}

impl ShrinkType {
    /// Returns `true` if this mode needs boundary data of the target mesh.
    #[must_use]
    pub const fn needs_boundary(self) -> bool {
        matches!(self, Self::NearestSurface | Self::TargetProject)
    }
}

/// The closed set of constraint kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintKind {
    /// Copy the target location.
    CopyLocation,
    /// Copy the target rotation.
    CopyRotation,
    /// Copy the target scale.
    CopyScale,
    /// Copy the full target transform.
    CopyTransforms,
    /// Parent-like constraint.
    ChildOf,
    /// Point an axis at the target.
    TrackTo,
    /// Point an axis at the target along the shortest rotation.
    DampedTrack,
    /// Point an axis at the target around a locked axis.
    LockedTrack,
    /// Keep a distance range from the target.
    LimitDistance,
    /// Stretch towards the target.
    StretchTo,
    /// Map one transform channel of the target to another.
    Transform,
    /// Play an action driven by the target transform.
    Action,
    /// Deform with a set of bones.
    Armature,
    /// Follow a curve object.
    FollowPath,
    /// Clamp to a curve object.
    ClampTo,
    /// Read a transform from a geometry attribute of the target.
    GeometryAttribute,
    /// Rotate around the target as pivot.
    Pivot,
    /// Snap onto the surface of a mesh target.
    Shrinkwrap {
        /// Projection mode.
        shrink_type: ShrinkType,
        /// Align to the surface normal.
        track_normal: bool,
        /// Keep the owner above the surface.
        above_surface: bool,
    },
    /// Inverse kinematics; the goal is `targets[0]`.
    Kinematic {
        /// Bones in the chain, `0` for the whole parent chain.
        chain_length: usize,
        /// Include the tail of the owning bone.
        use_tail: bool,
        /// Pole target.
        pole: Option<ConstraintTarget>,
    },
    /// Fit a bone chain to a curve target.
    SplineIk {
        /// Bones in the chain.
        chain_length: usize,
    },
    /// Follow a motion-tracking track.
    FollowTrack {
        /// Clip holding the track.
        clip: Option<MovieClipId>,
        /// Use the scene's active clip instead of `clip`.
        use_active_clip: bool,
        /// Track name.
        track: String,
        /// Object used to derive depth.
        depth_object: Option<ObjectId>,
    },
    /// Solve the camera motion from tracking data.
    CameraSolver,
    /// Solve an object motion from tracking data.
    ObjectSolver,
    /// Read transforms from a cache file.
    TransformCache {
        /// Source cache.
        cache_file: Option<CacheFileId>,
    },
    /// Clamp the location.
    LimitLocation,
    /// Clamp the rotation.
    LimitRotation,
    /// Clamp the scale.
    LimitScale,
    /// Preserve volume while scaling.
    MaintainVolume,
}

impl ConstraintKind {
    /// Returns `true` for the motion-tracking kinds that follow the scene
    /// camera instead of explicit targets.
    #[must_use]
    pub const fn is_camera_tracking(&self) -> bool {
        matches!(
            self,
            Self::FollowTrack { .. } | Self::CameraSolver | Self::ObjectSolver
        )
    }
}

/// A constraint on an object or a pose bone.
#[derive(Clone, Debug)]
pub struct Constraint {
    /// Constraint name, unique on its owner.
    pub name: String,
    /// Kind and kind-specific settings.
    pub kind: ConstraintKind,
    /// Disabled constraints still contribute relations.
    pub enabled: bool,
    /// Targets.
    pub targets: SmallVec<[ConstraintTarget; 1]>,
    /// Follow the B-Bone curve of a bone target.
    pub use_bbone_shape: bool,
}

impl Constraint {
    /// Creates an enabled constraint with no targets.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            targets: SmallVec::new(),
            use_bbone_shape: false,
        }
    }

    /// Appends a target.
    #[must_use]
    pub fn with_target(mut self, target: ConstraintTarget) -> Self {
        self.targets.push(target);
        self
    }
}
