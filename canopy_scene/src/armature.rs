// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Armatures and object poses.

use alloc::string::String;
use alloc::vec::Vec;

use crate::constraint::{Constraint, ConstraintKind};
use crate::id::{IdHeader, ObjectId};
use crate::property::IdProperties;

/// A bone of an armature's rest pose.
#[derive(Clone, Debug, Default)]
pub struct Bone {
    /// Bone name, unique in its armature.
    pub name: String,
    /// B-Bone segment count; more than one makes a curved bone.
    pub segments: u32,
}

/// Rest-pose bone data.
#[derive(Clone, Debug, Default)]
pub struct Armature {
    /// Entity header.
    pub id: IdHeader,
    /// Bones, in the same order as the pose channels of objects using this armature.
    pub bones: Vec<Bone>,
}

/// Which solver evaluates IK chains of a pose.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IkSolver {
    /// The standard solver.
    #[default]
    Standard,
    /// The iTaSC solver; it solves all chains of the armature at once.
    Itasc,
}

/// The animated state of one bone.
#[derive(Clone, Debug, Default)]
pub struct PoseChannel {
    /// Name of the bone this channel poses.
    pub name: String,
    /// Index of the parent channel.
    pub parent: Option<usize>,
    /// Bone constraints.
    pub constraints: Vec<Constraint>,
    /// B-Bone handle bone at the start.
    pub bbone_prev: Option<usize>,
    /// B-Bone handle bone at the end.
    pub bbone_next: Option<usize>,
    /// Object drawn in place of the bone.
    pub custom_shape: Option<ObjectId>,
    /// Custom properties.
    pub properties: IdProperties,
}

impl PoseChannel {
    /// Creates a channel for the bone `name` under `parent`.
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            ..Self::default()
        }
    }
}

/// The pose of an armature object.
#[derive(Clone, Debug, Default)]
pub struct Pose {
    /// One channel per bone.
    pub channels: Vec<PoseChannel>,
    /// IK solver.
    pub ik_solver: IkSolver,
}

impl Pose {
    /// Finds a channel index by bone name.
    #[must_use]
    pub fn find_channel(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|pchan| pchan.name == name)
    }

    /// Iterates over `index` and its ancestors, nearest first.
    pub fn parent_chain(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        core::iter::successors(Some(index), |&i| self.channels.get(i).and_then(|c| c.parent))
    }

    /// Returns `true` if `descendant` is `ancestor` or below it.
    #[must_use]
    pub fn is_descendant(&self, descendant: usize, ancestor: usize) -> bool {
        self.parent_chain(descendant).any(|i| i == ancestor)
    }

    /// Returns `true` if any channel has an IK or Spline IK constraint.
    #[must_use]
    pub fn has_ik(&self) -> bool {
        self.channels.iter().any(|pchan| {
            pchan.constraints.iter().any(|con| {
                matches!(
                    con.kind,
                    ConstraintKind::Kinematic { .. } | ConstraintKind::SplineIk { .. }
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn chain() -> Pose {
        Pose {
            channels: vec![
                PoseChannel::new("root", None),
                PoseChannel::new("upper", Some(0)),
                PoseChannel::new("lower", Some(1)),
                PoseChannel::new("side", Some(0)),
            ],
            ik_solver: IkSolver::Standard,
        }
    }

    #[test]
    fn parent_chain_walks_to_root() {
        let pose = chain();
        let walked: Vec<_> = pose.parent_chain(2).collect();
        assert_eq!(walked, vec![2, 1, 0]);
        assert!(pose.is_descendant(2, 0));
        assert!(!pose.is_descendant(3, 1));
        assert_eq!(pose.find_channel("side"), Some(3));
    }
}
