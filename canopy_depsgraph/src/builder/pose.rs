// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IK chain walking shared by the node and relation passes.

use alloc::vec::Vec;

use canopy_scene::{ArmatureId, Main, Pose};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Upper bound on the bones walked for one chain.
const MAX_CHAIN_SEGMENTS: usize = 255;

/// Bones solved by one IK constraint, nearest to the tip first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct IkChain {
    pub(crate) bones: Vec<usize>,
    pub(crate) root: usize,
}

/// Chain of an IK constraint on `tip`.
///
/// Without `use_tail` the chain starts at the parent of `tip`. A chain length
/// of zero walks to the top of the hierarchy.
pub(crate) fn ik_chain(
    pose: &Pose,
    tip: usize,
    chain_length: usize,
    use_tail: bool,
) -> Option<IkChain> {
    let start = if use_tail {
        tip
    } else {
        pose.channels.get(tip)?.parent?
    };
    let limit = match chain_length {
        0 => MAX_CHAIN_SEGMENTS,
        n => n.min(MAX_CHAIN_SEGMENTS),
    };
    let bones: Vec<usize> = pose.parent_chain(start).take(limit).collect();
    let root = *bones.last()?;
    Some(IkChain { bones, root })
}

/// Chain of a Spline IK constraint on `tip`, which always includes `tip`.
pub(crate) fn spline_ik_chain(pose: &Pose, tip: usize, chain_length: usize) -> Option<IkChain> {
    pose.channels.get(tip)?;
    let limit = chain_length.clamp(1, MAX_CHAIN_SEGMENTS);
    let bones: Vec<usize> = pose.parent_chain(tip).take(limit).collect();
    let root = *bones.last()?;
    Some(IkChain { bones, root })
}

/// Returns `true` if the armature bone `name` is a B-Bone with more than one
/// segment.
pub(crate) fn has_bbone_segments(main: &Main, armature: ArmatureId, name: &str) -> bool {
    main.get_armature(armature)
        .and_then(|arm| arm.bones.iter().find(|bone| bone.name == name))
        .is_some_and(|bone| bone.segments > 1)
}

/// For each bone, the roots of the IK chains it belongs to.
///
/// Two bones in a chain with the same root are solved together, so relations
/// between them must not wait for the solver result.
#[derive(Clone, Debug, Default)]
pub(crate) struct RootMap {
    roots: HashMap<usize, SmallVec<[usize; 2]>>,
}

impl RootMap {
    /// Records that `bone` is solved by the chain rooted at `root`.
    pub(crate) fn add_bone(&mut self, bone: usize, root: usize) {
        let roots = self.roots.entry(bone).or_default();
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    /// Returns `true` if `a` and `b` are part of chains sharing a root.
    pub(crate) fn has_common_root(&self, a: usize, b: usize) -> bool {
        let (Some(a), Some(b)) = (self.roots.get(&a), self.roots.get(&b)) else {
            return false;
        };
        a.iter().any(|root| b.contains(root))
    }
}
