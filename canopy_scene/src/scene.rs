// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scenes, view layers and the sequencer.

use alloc::string::String;
use alloc::vec::Vec;

use crate::id::{
    CollectionId, IdHeader, LineStyleId, MaskId, MaterialId, MovieClipId, NodeTreeId, ObjectId,
    SceneId, SoundId, WorldId,
};

/// A collection as seen by a view layer.
#[derive(Clone, Debug)]
pub struct LayerCollection {
    /// The collection.
    pub collection: CollectionId,
    /// Excluded from the view layer, with its children.
    pub exclude: bool,
    /// Nested layer collections mirroring the collection children.
    pub children: Vec<LayerCollection>,
}

impl LayerCollection {
    /// Wraps `collection` with no children.
    #[must_use]
    pub fn new(collection: CollectionId) -> Self {
        Self {
            collection,
            exclude: false,
            children: Vec::new(),
        }
    }
}

/// A render layer of a scene.
#[derive(Clone, Debug, Default)]
pub struct ViewLayer {
    /// Layer name.
    pub name: String,
    /// Top-level layer collections; the first wraps the master collection.
    pub layer_collections: Vec<LayerCollection>,
    /// Material overriding every object material.
    pub material_override: Option<MaterialId>,
    /// Freestyle line styles.
    pub line_styles: Vec<LineStyleId>,
}

/// What a sequencer strip plays.
#[derive(Clone, Debug)]
pub enum StripKind {
    /// A sound.
    Sound(SoundId),
    /// Another scene, optionally with its own strips.
    Scene {
        /// Played scene.
        scene: SceneId,
        /// Include the played scene's strips.
        use_strips: bool,
    },
    /// A movie clip.
    MovieClip(MovieClipId),
    /// A mask.
    Mask(MaskId),
    /// An effect without data references.
    Effect,
}

/// A sequencer strip.
#[derive(Clone, Debug)]
pub struct Strip {
    /// Strip name.
    pub name: String,
    /// Played content.
    pub kind: StripKind,
}

/// Video sequencer contents.
#[derive(Clone, Debug, Default)]
pub struct Sequencer {
    /// Strips.
    pub strips: Vec<Strip>,
}

/// A scene.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Entity header.
    pub id: IdHeader,
    /// Active camera.
    pub camera: Option<ObjectId>,
    /// World.
    pub world: Option<WorldId>,
    /// Root collection.
    pub master_collection: Option<CollectionId>,
    /// View layers.
    pub view_layers: Vec<ViewLayer>,
    /// Background scene drawn behind this one.
    pub set: Option<SceneId>,
    /// Compositor node tree.
    pub compositor: Option<NodeTreeId>,
    /// Video sequencer.
    pub sequencer: Option<Sequencer>,
    /// Active movie clip used by tracking constraints.
    pub clip: Option<MovieClipId>,
    /// Audio volume is animated.
    pub audio_volume_animated: bool,
}
