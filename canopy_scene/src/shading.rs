// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Materials, node trees, textures and the other shading data blocks.

use alloc::string::String;
use alloc::vec::Vec;

use glam::Vec4;

use crate::id::{IdHeader, IdRef, ImageId, NodeTreeId};
use crate::property::IdProperties;

/// A surface material.
#[derive(Clone, Debug)]
pub struct Material {
    /// Entity header.
    pub id: IdHeader,
    /// Shader node tree.
    pub node_tree: Option<NodeTreeId>,
    /// Viewport color.
    pub diffuse_color: Vec4,
    /// Viewport roughness.
    pub roughness: f32,
    /// Viewport metallic.
    pub metallic: f32,
    /// Render pass index.
    pub pass_index: i32,
}

impl Material {
    /// Creates a grey material without nodes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: IdHeader::new(name),
            node_tree: None,
            diffuse_color: Vec4::new(0.8, 0.8, 0.8, 1.0),
            roughness: 0.4,
            metallic: 0.0,
            pass_index: 0,
        }
    }
}

/// What a node tree computes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NodeTreeKind {
    /// Shading.
    #[default]
    Shader,
    /// Geometry nodes.
    Geometry,
    /// Compositing.
    Compositor,
    /// Procedural textures.
    Texture,
}

/// A node of a [`NodeTree`].
#[derive(Clone, Debug, Default)]
pub struct Node {
    /// Node name, unique in its tree.
    pub name: String,
    /// Referenced entity: an image, object, collection, texture or, for
    /// group nodes, a node tree.
    pub id: Option<IdRef>,
    /// Custom properties.
    pub properties: IdProperties,
}

/// A node tree.
#[derive(Clone, Debug, Default)]
pub struct NodeTree {
    /// Entity header.
    pub id: IdHeader,
    /// Tree type.
    pub kind: NodeTreeKind,
    /// Nodes.
    pub nodes: Vec<Node>,
    /// Some node reads the scene time.
    pub uses_time: bool,
}

/// A procedural or image texture.
#[derive(Clone, Debug, Default)]
pub struct Texture {
    /// Entity header.
    pub id: IdHeader,
    /// Texture node tree.
    pub node_tree: Option<NodeTreeId>,
    /// Image of image textures.
    pub image: Option<ImageId>,
}

/// An image.
#[derive(Clone, Debug, Default)]
pub struct Image {
    /// Entity header.
    pub id: IdHeader,
    /// The image is an animated sequence or movie.
    pub is_sequence: bool,
}

/// World shading.
#[derive(Clone, Debug, Default)]
pub struct World {
    /// Entity header.
    pub id: IdHeader,
    /// Shader node tree.
    pub node_tree: Option<NodeTreeId>,
}

/// Freestyle line style.
#[derive(Clone, Debug, Default)]
pub struct LineStyle {
    /// Entity header.
    pub id: IdHeader,
    /// Shader node tree.
    pub node_tree: Option<NodeTreeId>,
}
