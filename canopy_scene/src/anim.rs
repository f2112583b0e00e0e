// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Animation data: actions, NLA tracks and drivers.

use alloc::string::String;
use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::id::{ActionId, IdHeader, IdRef};

/// Animation attached to an entity.
#[derive(Clone, Debug, Default)]
pub struct AnimData {
    /// Active action.
    pub action: Option<ActionId>,
    /// NLA tracks, bottom to top.
    pub nla_tracks: Vec<NlaTrack>,
    /// Driver F-curves.
    pub drivers: Vec<FCurve>,
}

impl AnimData {
    /// Returns `true` if there is an action or at least one NLA track.
    #[must_use]
    pub fn has_animation(&self) -> bool {
        self.action.is_some() || !self.nla_tracks.is_empty()
    }
}

/// An animation curve bound to a property path.
///
/// Inside [`AnimData::drivers`] each curve carries a [`Driver`].
#[derive(Clone, Debug, Default)]
pub struct FCurve {
    /// Property path relative to the owning entity, e.g. `location` or
    /// `pose.bones["Arm"].rotation_euler`.
    pub rna_path: String,
    /// Element of an array property, `-1` for the whole property.
    pub array_index: i32,
    /// The driver, for driver curves.
    pub driver: Option<Driver>,
}

impl FCurve {
    /// Creates a driver curve for `rna_path[array_index]`.
    #[must_use]
    pub fn driver(rna_path: impl Into<String>, array_index: i32, driver: Driver) -> Self {
        Self {
            rna_path: rna_path.into(),
            array_index,
            driver: Some(driver),
        }
    }
}

/// How a driver combines its variables.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DriverKind {
    /// Mean of the variables.
    #[default]
    Average,
    /// Sum of the variables.
    Sum,
    /// A scripted expression over the variables.
    Scripted,
    /// Minimum of the variables.
    Min,
    /// Maximum of the variables.
    Max,
}

/// A driver: an expression computing a property from other properties.
#[derive(Clone, Debug, Default)]
pub struct Driver {
    /// Combination mode.
    pub kind: DriverKind,
    /// Expression text for [`DriverKind::Scripted`].
    pub expression: String,
    /// Input variables.
    pub variables: Vec<DriverVariable>,
}

impl Driver {
    /// Returns `true` if the scripted expression may read the current frame.
    ///
    /// Only simple expressions (no calls, no `frame` reference) are known to
    /// be time-independent.
    #[must_use]
    pub fn expression_depends_on_time(&self) -> bool {
        if self.kind != DriverKind::Scripted || self.expression.is_empty() {
            return false;
        }
        self.expression.contains('(') || self.expression.contains("frame")
    }
}

/// What a [`DriverVariable`] reads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DriverVariableKind {
    /// A single property addressed by path.
    #[default]
    SingleProperty,
    /// A transform channel of an object or bone.
    TransformChannel,
    /// The rotation difference between two objects or bones.
    RotationDifference,
    /// The distance between two objects or bones.
    LocationDifference,
    /// A property of the evaluation context (active scene or view layer).
    ContextProperty,
}

impl DriverVariableKind {
    /// Number of targets this variable kind reads.
    #[must_use]
    pub const fn used_targets(self) -> usize {
        match self {
            Self::RotationDifference | Self::LocationDifference => 2,
            _ => 1,
        }
    }

    /// Returns `true` if the targets address an object or bone directly
    /// rather than a property path.
    #[must_use]
    pub const fn uses_struct_ref(self) -> bool {
        !matches!(self, Self::SingleProperty | Self::ContextProperty)
    }
}

/// An input of a driver.
#[derive(Clone, Debug, Default)]
pub struct DriverVariable {
    /// Name used inside the expression.
    pub name: String,
    /// What this variable reads.
    pub kind: DriverVariableKind,
    /// Targets; only the first [`DriverVariableKind::used_targets`] are read.
    pub targets: SmallVec<[DriverTarget; 2]>,
}

impl DriverVariable {
    /// Creates a single-property variable reading `rna_path` on `id`.
    #[must_use]
    pub fn single_property(name: impl Into<String>, id: IdRef, rna_path: impl Into<String>) -> Self {
        let mut targets = SmallVec::new();
        targets.push(DriverTarget {
            id: Some(id),
            rna_path: rna_path.into(),
            bone: String::new(),
        });
        Self {
            name: name.into(),
            kind: DriverVariableKind::SingleProperty,
            targets,
        }
    }

    /// Creates a transform-channel variable reading an object or one of its bones.
    #[must_use]
    pub fn transform_channel(name: impl Into<String>, id: IdRef, bone: impl Into<String>) -> Self {
        let mut targets = SmallVec::new();
        targets.push(DriverTarget {
            id: Some(id),
            rna_path: String::new(),
            bone: bone.into(),
        });
        Self {
            name: name.into(),
            kind: DriverVariableKind::TransformChannel,
            targets,
        }
    }

    /// The targets that are actually read.
    pub fn used_targets(&self) -> impl Iterator<Item = &DriverTarget> {
        self.targets.iter().take(self.kind.used_targets())
    }
}

/// One target of a [`DriverVariable`].
#[derive(Clone, Debug, Default)]
pub struct DriverTarget {
    /// Target entity.
    pub id: Option<IdRef>,
    /// Property path for property variables.
    pub rna_path: String,
    /// Bone name for struct-reference variables on armature objects.
    pub bone: String,
}

/// A track of NLA strips.
#[derive(Clone, Debug, Default)]
pub struct NlaTrack {
    /// Track name.
    pub name: String,
    /// Strips in time order.
    pub strips: Vec<NlaStrip>,
}

/// An NLA strip; meta strips nest further strips.
#[derive(Clone, Debug, Default)]
pub struct NlaStrip {
    /// Action played by this strip.
    pub action: Option<ActionId>,
    /// Nested strips of a meta strip.
    pub strips: Vec<NlaStrip>,
}

/// Keyframed animation curves.
#[derive(Clone, Debug, Default)]
pub struct Action {
    /// Entity header.
    pub id: IdHeader,
    /// Animated property curves.
    pub fcurves: Vec<FCurve>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectId;

    #[test]
    fn only_scripted_calls_depend_on_time() {
        let mut driver = Driver {
            kind: DriverKind::Scripted,
            expression: "var * 2".into(),
            variables: Vec::new(),
        };
        assert!(!driver.expression_depends_on_time());

        driver.expression = "sin(var)".into();
        assert!(driver.expression_depends_on_time());

        driver.expression = "frame / 10".into();
        assert!(driver.expression_depends_on_time());

        driver.kind = DriverKind::Sum;
        assert!(!driver.expression_depends_on_time());
    }

    #[test]
    fn difference_variables_read_two_targets() {
        let mut var = DriverVariable::transform_channel("d", ObjectId(0).into(), "");
        var.targets.push(DriverTarget {
            id: Some(ObjectId(1).into()),
            ..DriverTarget::default()
        });
        assert_eq!(var.used_targets().count(), 1);

        var.kind = DriverVariableKind::LocationDifference;
        assert_eq!(var.used_targets().count(), 2);
        assert!(var.kind.uses_struct_ref());
        assert!(!DriverVariableKind::SingleProperty.uses_struct_ref());
    }
}
