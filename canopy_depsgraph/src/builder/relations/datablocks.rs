// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collections and the smaller entity kinds.

use canopy_scene::{
    ArmatureId, CacheFileId, CameraId, CollectionId, IdRef, LightProbeId, MaskId, MovieClipId,
    ObjectType, SoundId, SpeakerId,
};

use super::{RelationBuilder, comp, op};
use crate::builder::map::BuildTags;
use crate::key::{NodeType, OperationCode, TimeSourceKey};

impl RelationBuilder<'_> {
    /// Wires a collection, its objects and its child collections.
    ///
    /// The geometry of a collection is done once every member is in place.
    pub fn build_collection(&mut self, collection: CollectionId) {
        if !self.begin(collection) {
            return;
        }
        let main = self.main;
        let data = main.collection(collection);
        self.build_id_common(collection.into());
        let geometry_done = op(collection, NodeType::Geometry, OperationCode::GeometryEvalDone);

        for &ob in &data.objects {
            self.build_object(ob);
            self.add_relation(
                op(ob, NodeType::Transform, OperationCode::TransformFinal),
                geometry_done,
                "Collection Geometry",
            );
            let geometry = op(ob, NodeType::Geometry, OperationCode::GeometryEval);
            if self.has_node(geometry) {
                self.add_relation(geometry, geometry_done, "Collection Geometry");
            }
            let object = main.object(ob);
            if object.kind == ObjectType::Empty
                && let Some(instance) = object.instance_collection
            {
                self.add_relation(
                    op(instance, NodeType::Geometry, OperationCode::GeometryEvalDone),
                    geometry_done,
                    "Collection Geometry",
                );
            }
        }
        for &child in &data.children {
            self.build_collection(child);
            self.add_relation(
                op(child, NodeType::Geometry, OperationCode::GeometryEvalDone),
                geometry_done,
                "Collection Geometry",
            );
        }
        self.build_collection_hierarchy(collection);
    }

    /// Orders the hierarchy of members and child collections after their
    /// parent collection.
    pub(super) fn build_collection_hierarchy(&mut self, collection: CollectionId) {
        if self
            .built
            .check_is_built_and_tag(collection.into(), BuildTags::COLLECTION_CHILDREN_HIERARCHY)
        {
            return;
        }
        let Some(data) = self.main.get_collection(collection) else {
            return;
        };
        let hierarchy = comp(collection, NodeType::Hierarchy);
        for &ob in &data.objects {
            self.add_relation(
                hierarchy,
                comp(ob, NodeType::Hierarchy),
                "Collection -> Object hierarchy",
            );
        }
        for &child in &data.children {
            self.add_relation(
                hierarchy,
                comp(child, NodeType::Hierarchy),
                "Collection hierarchy",
            );
            self.build_collection_hierarchy(child);
        }
    }

    pub(super) fn build_armature(&mut self, armature: ArmatureId) {
        if !self.begin(armature) {
            return;
        }
        self.build_id_common(armature.into());
        self.add_relation(
            comp(armature, NodeType::Parameters),
            op(armature, NodeType::Armature, OperationCode::ArmatureEval),
            "Armature Parameters",
        );
    }

    pub(super) fn build_camera(&mut self, camera: CameraId) {
        if !self.begin(camera) {
            return;
        }
        self.build_id_common(camera.into());
        if let Some(focus) = self.main.camera(camera).dof_object {
            self.build_object(focus);
            self.add_relation(
                comp(focus, NodeType::Transform),
                comp(camera, NodeType::Parameters),
                "Camera DOF",
            );
        }
    }

    pub(super) fn build_light_probe(&mut self, probe: LightProbeId) {
        if !self.begin(probe) {
            return;
        }
        self.build_id_common(probe.into());
        self.add_relation(
            op(probe, NodeType::Parameters, OperationCode::ParametersEval),
            op(probe, NodeType::Parameters, OperationCode::LightProbeEval),
            "Light Probe Update",
        );
    }

    pub(super) fn build_speaker(&mut self, speaker: SpeakerId) {
        if !self.begin(speaker) {
            return;
        }
        self.build_id_common(speaker.into());
        if let Some(sound) = self.main.speaker(speaker).sound {
            self.build_sound(sound);
            self.add_relation(
                comp(sound, NodeType::Audio),
                comp(speaker, NodeType::Audio),
                "Sound -> Speaker",
            );
        }
    }

    pub(super) fn build_sound(&mut self, sound: SoundId) {
        if !self.begin(sound) {
            return;
        }
        self.build_id_common(sound.into());
        self.add_relation(
            comp(sound, NodeType::Parameters),
            comp(sound, NodeType::Audio),
            "Parameters -> Audio",
        );
    }

    pub(super) fn build_cache_file(&mut self, cache_file: CacheFileId) {
        if !self.begin(cache_file) {
            return;
        }
        let main = self.main;
        self.build_id_common(cache_file.into());
        let cache = comp(cache_file, NodeType::Cache);
        if let Some(header) = main.header(cache_file.into()) {
            if header.has_animation() {
                self.add_relation(
                    comp(cache_file, NodeType::Animation),
                    cache,
                    "Datablock Animation",
                );
            }
            if header
                .anim_data
                .as_ref()
                .is_some_and(|anim| !anim.drivers.is_empty())
            {
                self.add_relation(
                    comp(cache_file, NodeType::Parameters),
                    cache,
                    "Drivers -> Cache Eval",
                );
            }
        }
        if main.cache_file(cache_file).is_sequence {
            self.add_relation(TimeSourceKey, cache, "TimeSrc -> Cache File Eval");
        }
    }

    pub(super) fn build_mask(&mut self, mask: MaskId) {
        if !self.begin(mask) {
            return;
        }
        let main = self.main;
        self.build_id_common(mask.into());
        let eval = op(mask, NodeType::Parameters, OperationCode::MaskEval);
        if main.header(mask.into()).is_some_and(|header| header.has_animation()) {
            self.add_relation(
                comp(mask, NodeType::Animation),
                eval,
                "Mask Animation -> Mask Eval",
            );
        }
        for &parent in &main.mask(mask).point_parents {
            self.build_id(parent);
            if let IdRef::MovieClip(clip) = parent {
                self.add_relation(
                    op(clip, NodeType::Parameters, OperationCode::MovieClipEval),
                    eval,
                    "Mask Parent",
                );
            }
        }
    }

    pub(super) fn build_movie_clip(&mut self, clip: MovieClipId) {
        if !self.begin(clip) {
            return;
        }
        self.build_id_common(clip.into());
        self.add_relation(
            op(clip, NodeType::Parameters, OperationCode::ParametersEval),
            op(clip, NodeType::Parameters, OperationCode::MovieClipEval),
            "Movie Clip Parameters",
        );
    }
}
