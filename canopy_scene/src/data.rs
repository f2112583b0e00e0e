// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cameras, lights, speakers and the other non-geometry data blocks.

use alloc::vec::Vec;

use glam::Vec3;

use crate::id::{IdHeader, IdRef, NodeTreeId, ObjectId, SoundId};

/// Camera data.
#[derive(Clone, Debug, Default)]
pub struct Camera {
    /// Entity header.
    pub id: IdHeader,
    /// Object that sets the focus distance.
    pub dof_object: Option<ObjectId>,
    /// Focal length in millimeters.
    pub lens: f32,
}

/// Light data.
#[derive(Clone, Debug, Default)]
pub struct Light {
    /// Entity header.
    pub id: IdHeader,
    /// Shader node tree.
    pub node_tree: Option<NodeTreeId>,
    /// Color.
    pub color: Vec3,
    /// Power.
    pub energy: f32,
}

/// Light probe data.
#[derive(Clone, Debug, Default)]
pub struct LightProbe {
    /// Entity header.
    pub id: IdHeader,
}

/// Speaker data.
#[derive(Clone, Debug, Default)]
pub struct Speaker {
    /// Entity header.
    pub id: IdHeader,
    /// Played sound.
    pub sound: Option<SoundId>,
}

/// A sound.
#[derive(Clone, Debug, Default)]
pub struct Sound {
    /// Entity header.
    pub id: IdHeader,
}

/// An Alembic or USD cache.
#[derive(Clone, Debug, Default)]
pub struct CacheFile {
    /// Entity header.
    pub id: IdHeader,
    /// The cache path is a frame sequence.
    pub is_sequence: bool,
}

/// A 2D mask.
#[derive(Clone, Debug, Default)]
pub struct Mask {
    /// Entity header.
    pub id: IdHeader,
    /// Entities (movie clips) that mask points are parented to.
    pub point_parents: Vec<IdRef>,
}

/// A tracked movie clip.
#[derive(Clone, Debug, Default)]
pub struct MovieClip {
    /// Entity header.
    pub id: IdHeader,
}
