// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composite keys used to find nodes while the graph is being built.

use core::fmt;

use canopy_scene::IdRef;

/// The kind of a component node.
///
/// A component is one named aspect of an entity, such as its transform or its
/// geometry. Bones and particle systems are the only components that carry a
/// sub-name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    /// Animatable parameters of any entity.
    Parameters,
    /// Action and NLA evaluation.
    Animation,
    /// Object transform.
    Transform,
    /// Evaluated geometry.
    Geometry,
    /// Scene sequencer strips.
    Sequencer,
    /// View layer collection flags.
    LayerCollections,
    /// Creation of the evaluation copy.
    CopyOnEval,
    /// Flags an object receives from its base in the view layer.
    ObjectFromLayer,
    /// Parent/child and collection nesting changes.
    Hierarchy,
    /// Sound playback.
    Audio,
    /// Armature data (bone rest state).
    Armature,
    /// Data blocks without a more specific component.
    GenericDatablock,
    /// Object visibility.
    Visibility,
    /// Physics caches.
    PointCache,
    /// Pose evaluation of an armature object.
    EvalPose,
    /// A single pose bone.
    Bone,
    /// Particle systems of an object.
    ParticleSystem,
    /// Particle settings data block.
    ParticleSettings,
    /// Materials and shading.
    Shading,
    /// External cache files.
    Cache,
    /// Drawing caches that depend on selection.
    BatchCache,
    /// Instancing of collections and geometry.
    Instancing,
    /// Write-back of evaluated results to the original.
    Synchronization,
    /// Image sequences and movies.
    ImageAnimation,
    /// Node tree output.
    NTreeOutput,
}

impl NodeType {
    /// A human readable name, used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Parameters => "Parameters",
            Self::Animation => "Animation",
            Self::Transform => "Transform",
            Self::Geometry => "Geometry",
            Self::Sequencer => "Sequencer",
            Self::LayerCollections => "Layer Collections",
            Self::CopyOnEval => "Copy-on-Eval",
            Self::ObjectFromLayer => "Object from Layer",
            Self::Hierarchy => "Hierarchy",
            Self::Audio => "Audio",
            Self::Armature => "Armature",
            Self::GenericDatablock => "Generic Datablock",
            Self::Visibility => "Visibility",
            Self::PointCache => "Point Cache",
            Self::EvalPose => "Pose Eval",
            Self::Bone => "Bone",
            Self::ParticleSystem => "Particle System",
            Self::ParticleSettings => "Particle Settings",
            Self::Shading => "Shading",
            Self::Cache => "Cache",
            Self::BatchCache => "Batch Cache",
            Self::Instancing => "Instancing",
            Self::Synchronization => "Synchronization",
            Self::ImageAnimation => "Image Animation",
            Self::NTreeOutput => "Node Tree Output",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The step an operation node performs.
#[allow(missing_docs, reason = "operation codes are named after the step they perform")]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationCode {
    /// Placeholder for operations with no specific meaning.
    Operation,
    /// A custom property, named by the property.
    IdProperty,
    ParametersEntry,
    ParametersEval,
    ParametersExit,

    AnimationEntry,
    AnimationEval,
    AnimationExit,
    /// A driver, named by its RNA path and tagged with its array index.
    Driver,

    SceneEval,
    AudioEntry,
    AudioVolume,
    AudioExit,
    SoundEval,
    SpeakerEval,
    SequencesEval,
    ViewLayerEval,
    Hierarchy,

    CopyOnEval,

    ObjectFromLayerEntry,
    ObjectBaseFlags,
    ObjectFromLayerExit,

    TransformInit,
    TransformLocal,
    TransformParent,
    TransformConstraints,
    TransformEval,
    TransformSimulationInit,
    TransformFinal,

    GeometryEvalInit,
    GeometryEval,
    GeometryEvalDone,
    /// A modifier, named by the modifier.
    Modifier,
    GeometryShapekey,

    Visibility,
    Instancer,
    Instance,

    PointCacheReset,
    GeometrySelectUpdate,
    FileCacheUpdate,

    Shading,
    MaterialUpdate,
    WorldUpdate,
    LightUpdate,
    LightProbeEval,
    NTreeOutput,
    ImageAnimation,
    GenericDatablock,
    MovieClipEval,
    MaskEval,

    ArmatureEval,
    PoseInit,
    PoseInitIk,
    PoseCleanup,
    PoseDone,
    /// An IK solver, named by the root bone of its chain.
    PoseIkSolver,
    /// A Spline IK solver, named by the root bone of its chain.
    PoseSplineIkSolver,

    BoneLocal,
    BonePoseParent,
    BoneConstraints,
    BoneReady,
    BoneDone,
    BoneSegments,

    ParticleSystemInit,
    /// One particle system, named by the system.
    ParticleSystemEval,
    ParticleSystemDone,
    ParticleSettingsInit,
    ParticleSettingsEval,
    ParticleSettingsReset,

    SynchronizeToOriginal,
}

/// Locates a component node: an entity, a component kind and a sub-name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentKey<'a> {
    /// Owning entity.
    pub id: IdRef,
    /// Component kind.
    pub kind: NodeType,
    /// Sub-name, empty for most components.
    pub name: &'a str,
}

impl<'a> ComponentKey<'a> {
    /// Key of the unnamed component `kind` of `id`.
    #[must_use]
    pub fn new(id: impl Into<IdRef>, kind: NodeType) -> Self {
        Self {
            id: id.into(),
            kind,
            name: "",
        }
    }

    /// Sets the component sub-name (a bone name, for example).
    #[must_use]
    pub fn named(self, name: &'a str) -> Self {
        Self { name, ..self }
    }
}

impl fmt::Display for ComponentKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComponentKey({:?}, {}, '{}')",
            self.id, self.kind, self.name
        )
    }
}

/// Locates an operation node inside a component.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationKey<'a> {
    /// Owning component.
    pub component: ComponentKey<'a>,
    /// Operation code.
    pub opcode: OperationCode,
    /// Operation name, empty for most operations.
    pub name: &'a str,
    /// Disambiguates operations sharing a name (driver array indices).
    pub name_tag: i32,
}

impl<'a> OperationKey<'a> {
    /// Key of the unnamed operation `opcode` in the unnamed component `kind`.
    #[must_use]
    pub fn new(id: impl Into<IdRef>, kind: NodeType, opcode: OperationCode) -> Self {
        Self {
            component: ComponentKey::new(id, kind),
            opcode,
            name: "",
            name_tag: -1,
        }
    }

    /// Sets the sub-name of the owning component.
    #[must_use]
    pub fn in_component(mut self, component_name: &'a str) -> Self {
        self.component.name = component_name;
        self
    }

    /// Sets the operation name.
    #[must_use]
    pub fn named(self, name: &'a str) -> Self {
        Self { name, ..self }
    }

    /// Sets the operation name tag.
    #[must_use]
    pub fn tagged(self, name_tag: i32) -> Self {
        Self { name_tag, ..self }
    }

    /// The owning entity.
    #[must_use]
    pub fn id(&self) -> IdRef {
        self.component.id
    }
}

impl fmt::Display for OperationKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OperationKey({:?}, {}, '{}', {:?}, '{}', {})",
            self.component.id,
            self.component.kind,
            self.component.name,
            self.opcode,
            self.name,
            self.name_tag
        )
    }
}

/// Key of the graph's single time source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TimeSourceKey;

/// Any node key accepted as a relation endpoint.
///
/// A component used as the source of a relation resolves to its exit
/// operation; used as the target it resolves to its entry operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKey<'a> {
    /// The time source.
    TimeSource,
    /// A component, resolved through its entry or exit operation.
    Component(ComponentKey<'a>),
    /// A single operation.
    Operation(OperationKey<'a>),
}

impl From<TimeSourceKey> for NodeKey<'_> {
    fn from(_: TimeSourceKey) -> Self {
        Self::TimeSource
    }
}

impl<'a> From<ComponentKey<'a>> for NodeKey<'a> {
    fn from(key: ComponentKey<'a>) -> Self {
        Self::Component(key)
    }
}

impl<'a> From<OperationKey<'a>> for NodeKey<'a> {
    fn from(key: OperationKey<'a>) -> Self {
        Self::Operation(key)
    }
}

impl fmt::Display for NodeKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeSource => f.write_str("TimeSourceKey"),
            Self::Component(key) => key.fmt(f),
            Self::Operation(key) => key.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use canopy_scene::{Main, Object, ObjectType};
    use std::string::ToString;

    #[test]
    fn builder_style_keys() {
        let mut main = Main::new();
        let ob = main.add_object(Object::new("Rig", ObjectType::Armature));
        let key = OperationKey::new(ob, NodeType::Bone, OperationCode::BoneDone).in_component("hand");
        assert_eq!(key.component.name, "hand", "component name is set");
        assert_eq!(key.name_tag, -1, "untagged by default");
        assert!(key.to_string().contains("BoneDone"), "display names the opcode");
    }
}
