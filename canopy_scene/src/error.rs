// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

use crate::id::{CollectionId, IdRef, ObjectId};

/// Error returned by fallible [`Main`](crate::Main) edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneError {
    /// Parenting `child` to `parent` would make an object its own ancestor.
    ParentCycle {
        /// Object being parented.
        child: ObjectId,
        /// Requested parent.
        parent: ObjectId,
    },
    /// Linking `child` under `parent` would make a collection contain itself.
    CollectionCycle {
        /// Collection being linked.
        child: CollectionId,
        /// Requested parent collection.
        parent: CollectionId,
    },
    /// A handle does not refer to a stored entity.
    StaleHandle(IdRef),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentCycle { child, parent } => write!(
                f,
                "parenting object {} to {} would create a cycle",
                child.index(),
                parent.index()
            ),
            Self::CollectionCycle { child, parent } => write!(
                f,
                "linking collection {} into {} would create a cycle",
                child.index(),
                parent.index()
            ),
            Self::StaleHandle(id) => write!(f, "no {:?} at index {}", id.kind(), id.index()),
        }
    }
}

impl core::error::Error for SceneError {}
