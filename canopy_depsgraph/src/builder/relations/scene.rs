// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use canopy_scene::{IdRef, LayerCollection, SceneId, StripKind};

use super::{RelationBuilder, comp, op};
use crate::builder::map::BuildTags;
use crate::key::{NodeType, OperationCode, TimeSourceKey};

impl RelationBuilder<'_> {
    pub(super) fn build_view_layer(
        &mut self,
        scene: SceneId,
        view_layer: usize,
        linked_directly: bool,
    ) {
        let main = self.main;
        let Some(sce) = main.get_scene(scene) else {
            return;
        };
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::COMPLETE)
        {
            return;
        }

        if let Some(layer) = sce.view_layers.get(view_layer) {
            let bases: Vec<_> = main
                .view_layer_bases(layer, self.graph.mode())
                .into_iter()
                .filter(|base| base.visible)
                .map(|base| base.object)
                .collect();
            if linked_directly {
                self.bases.clone_from(&bases);
            }
            for ob in bases {
                self.build_object(ob);
            }
            self.build_layer_collections(&layer.layer_collections);
            if let Some(material) = layer.material_override {
                self.build_material(material);
            }
            for &line_style in &layer.line_styles {
                self.build_line_style(line_style);
            }
        }
        if let Some(camera) = sce.camera {
            self.build_object(camera);
        }
        if let Some(world) = sce.world {
            self.build_world(world);
        }
        for (mask, _) in main.masks() {
            self.build_mask(mask);
        }
        for (clip, _) in main.movie_clips() {
            self.build_movie_clip(clip);
        }
        if let Some(clip) = sce.clip {
            self.build_movie_clip(clip);
        }
        self.build_scene_compositor(scene);
        self.build_scene_parameters(scene);

        self.add_relation(
            op(scene, NodeType::LayerCollections, OperationCode::ViewLayerEval),
            op(scene, NodeType::Parameters, OperationCode::SceneEval),
            "View Layer -> Scene Eval",
        );
        if linked_directly {
            self.build_scene_audio(scene);
            self.build_scene_sequencer(scene);
        }
        if let Some(set) = sce.set {
            self.build_view_layer(set, 0, false);
        }
    }

    fn build_layer_collections(&mut self, layer_collections: &[LayerCollection]) {
        let mode = self.graph.mode();
        for lc in layer_collections {
            let Some(collection) = self.main.get_collection(lc.collection) else {
                continue;
            };
            if collection.is_hidden(mode) {
                continue;
            }
            if !lc.exclude {
                self.build_id_common(lc.collection.into());
                self.build_collection_hierarchy(lc.collection);
            }
            self.build_layer_collections(&lc.children);
        }
    }

    pub(super) fn build_scene_parameters(&mut self, scene: SceneId) {
        if !self.main.contains(scene.into()) {
            return;
        }
        self.build_id_common(scene.into());
        self.add_relation(
            op(scene, NodeType::Parameters, OperationCode::ParametersExit),
            op(scene, NodeType::Parameters, OperationCode::SceneEval),
            "Parameters -> Scene Data",
        );
    }

    fn build_scene_compositor(&mut self, scene: SceneId) {
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::SCENE_COMPOSITOR)
        {
            return;
        }
        if let Some(tree) = self.main.scene(scene).compositor {
            self.build_nested_nodetree(scene.into(), tree);
        }
    }

    fn build_scene_audio(&mut self, scene: SceneId) {
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::SCENE_AUDIO)
        {
            return;
        }
        let entry = op(scene, NodeType::Audio, OperationCode::AudioEntry);
        let volume = op(scene, NodeType::Audio, OperationCode::AudioVolume);
        let exit = op(scene, NodeType::Audio, OperationCode::AudioExit);
        self.add_relation(entry, volume, "Audio Entry -> Volume");
        self.add_relation(volume, exit, "Audio Volume -> Exit");
        if self.main.scene(scene).audio_volume_animated {
            self.add_relation(
                comp(scene, NodeType::Animation),
                volume,
                "Animation -> Audio Volume",
            );
        }
    }

    fn build_scene_sequencer(&mut self, scene: SceneId) {
        let main = self.main;
        let Some(sequencer) = &main.scene(scene).sequencer else {
            return;
        };
        if self
            .built
            .check_is_built_and_tag(scene.into(), BuildTags::SCENE_SEQUENCER)
        {
            return;
        }
        self.build_scene_audio(scene);
        let sequencer_key = comp(scene, NodeType::Sequencer);
        let mut has_audio_strips = false;
        for strip in &sequencer.strips {
            match strip.kind {
                StripKind::Sound(sound) => {
                    self.build_sound(sound);
                    self.add_relation(
                        comp(sound, NodeType::Audio),
                        sequencer_key,
                        "Sound -> Sequencer",
                    );
                    has_audio_strips = true;
                }
                StripKind::Scene {
                    scene: strip_scene,
                    use_strips,
                } => {
                    self.build_scene_parameters(strip_scene);
                    // Scene strips carry 3D audio.
                    has_audio_strips = true;
                    if use_strips {
                        self.build_scene_sequencer(strip_scene);
                        self.add_relation(
                            comp(strip_scene, NodeType::Audio),
                            sequencer_key,
                            "Sequence Scene Audio -> Sequencer",
                        );
                        self.add_relation(
                            comp(strip_scene, NodeType::Sequencer),
                            sequencer_key,
                            "Sequence Scene -> Sequencer",
                        );
                    }
                    self.build_scene_speakers(strip_scene);
                }
                StripKind::MovieClip(clip) => {
                    self.build_movie_clip(clip);
                    self.add_relation(
                        op(clip, NodeType::Parameters, OperationCode::MovieClipEval),
                        sequencer_key,
                        "Movie Clip -> Sequencer",
                    );
                }
                StripKind::Mask(mask) => {
                    self.build_mask(mask);
                    self.add_relation(
                        op(mask, NodeType::Parameters, OperationCode::MaskEval),
                        sequencer_key,
                        "Mask -> Sequencer",
                    );
                }
                StripKind::Effect => {}
            }
        }
        self.add_relation(TimeSourceKey, sequencer_key, "TimeSrc -> Sequencer");
        if has_audio_strips {
            self.add_relation(sequencer_key, comp(scene, NodeType::Audio), "Sequencer -> Audio");
        }
    }

    fn build_scene_speakers(&mut self, scene: SceneId) {
        let main = self.main;
        let Some(layer) = main.scene(scene).view_layers.first() else {
            return;
        };
        for base in main.view_layer_bases(layer, self.graph.mode()) {
            if base.visible && matches!(main.object(base.object).data, Some(IdRef::Speaker(_))) {
                self.build_object(base.object);
            }
        }
    }
}
