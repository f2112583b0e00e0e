// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use glam::Vec3;

use crate::EvalMode;
use crate::id::{CollectionId, IdHeader, ObjectId};

/// A named group of objects and child collections.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    /// Entity header.
    pub id: IdHeader,
    /// Directly linked objects.
    pub objects: Vec<ObjectId>,
    /// Child collections.
    pub children: Vec<CollectionId>,
    /// Origin used when the collection is instanced.
    pub instance_offset: Vec3,
    /// Hidden in the viewport, with its children.
    pub hide_viewport: bool,
    /// Hidden in renders, with its children.
    pub hide_render: bool,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(name: impl Into<alloc::string::String>) -> Self {
        Self {
            id: IdHeader::new(name),
            ..Self::default()
        }
    }

    /// Returns `true` if hidden in `mode`.
    #[must_use]
    pub const fn is_hidden(&self, mode: EvalMode) -> bool {
        match mode {
            EvalMode::Viewport => self.hide_viewport,
            EvalMode::Render => self.hide_render,
        }
    }
}
