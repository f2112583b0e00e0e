// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;

use canopy_scene::{
    IdRef, ImageId, LightId, LineStyleId, MaterialId, NodeTreeId, ObjectId, TextureId, WorldId,
};

use super::{RelationBuilder, comp, op};
use crate::key::{NodeType, OperationCode, OperationKey, TimeSourceKey};
use crate::relation::RelationFlags;

impl RelationBuilder<'_> {
    /// Material slots of an object feed its shading.
    pub(super) fn build_materials(&mut self, owner: ObjectId, slots: &[Option<MaterialId>]) {
        for &material in slots.iter().flatten() {
            self.build_material(material);
            self.add_relation(
                comp(material, NodeType::Shading),
                op(owner, NodeType::Shading, OperationCode::Shading),
                "Material -> Owner Shading",
            );
        }
    }

    pub(super) fn build_material(&mut self, material: MaterialId) {
        if !self.begin(material) {
            return;
        }
        self.build_id_common(material.into());
        let update = op(material, NodeType::Shading, OperationCode::MaterialUpdate);
        self.add_relation(
            comp(material, NodeType::Parameters),
            update,
            "Material Parameters",
        );
        if let Some(tree) = self.main.material(material).node_tree {
            self.build_nodetree(tree);
            self.add_relation(
                op(tree, NodeType::NTreeOutput, OperationCode::NTreeOutput),
                update,
                "Material's NTree",
            );
            self.build_nested_nodetree(material.into(), tree);
        }
    }

    pub(super) fn build_nodetree(&mut self, tree: NodeTreeId) {
        if !self.begin(tree) {
            return;
        }
        let main = self.main;
        let data = main.node_tree(tree);
        self.build_id_common(tree.into());
        let output = op(tree, NodeType::NTreeOutput, OperationCode::NTreeOutput);

        for node in &data.nodes {
            let mut referenced: Vec<IdRef> = node.id.into_iter().collect();
            node.properties.for_each_id(&mut |id| referenced.push(id));
            for id in referenced {
                self.build_node_reference(id, output);
            }
        }

        if main.header(tree.into()).is_some_and(|header| header.has_animation()) {
            self.add_relation(
                comp(tree, NodeType::Animation),
                output,
                "NTree Shading Parameters",
            );
        }
        self.add_relation(
            comp(tree, NodeType::Parameters),
            output,
            "NTree Shading Parameters",
        );
        if data.uses_time {
            self.add_relation(TimeSourceKey, output, "Time Source -> Node Tree");
        }
    }

    fn build_node_reference(&mut self, id: IdRef, output: OperationKey<'static>) {
        let main = self.main;
        match id {
            IdRef::Material(material) => {
                self.build_material(material);
                self.add_relation(comp(material, NodeType::Shading), output, "Material -> Node");
            }
            IdRef::Texture(texture) => {
                self.build_texture(texture);
                self.add_relation(
                    comp(texture, NodeType::GenericDatablock),
                    output,
                    "Texture -> Node",
                );
            }
            IdRef::Image(image) => {
                self.build_image(image);
                self.add_relation(
                    comp(image, NodeType::GenericDatablock),
                    output,
                    "Image -> Node",
                );
            }
            IdRef::Object(ob) => {
                self.build_object(ob);
                self.add_relation(
                    comp(ob, NodeType::Transform),
                    output,
                    "Object Transform -> Node",
                );
                if main.get_object(ob).is_some_and(|object| object.kind.has_geometry()) {
                    self.add_relation(
                        comp(ob, NodeType::Geometry),
                        output,
                        "Object Geometry -> Node",
                    );
                }
            }
            IdRef::Collection(collection) => {
                self.build_collection(collection);
                self.add_relation(
                    op(collection, NodeType::Geometry, OperationCode::GeometryEvalDone),
                    output,
                    "Collection -> Node",
                );
            }
            IdRef::Scene(scene) => {
                self.build_scene_parameters(scene);
                // The defocus node reads the scene camera.
                if let Some(camera) = main.get_scene(scene).and_then(|sce| sce.camera) {
                    self.build_object(camera);
                }
            }
            IdRef::Mask(mask) => {
                self.build_mask(mask);
                self.add_relation(
                    op(mask, NodeType::Parameters, OperationCode::MaskEval),
                    output,
                    "Mask -> Node",
                );
            }
            IdRef::MovieClip(clip) => {
                self.build_movie_clip(clip);
                self.add_relation(
                    op(clip, NodeType::Parameters, OperationCode::MovieClipEval),
                    output,
                    "Clip -> Node",
                );
            }
            IdRef::NodeTree(group) => {
                self.build_nodetree(group);
                self.add_relation(comp(group, NodeType::NTreeOutput), output, "Group Node");
            }
            _ => self.build_id(id),
        }
    }

    /// Orders the copy of `owner` after the copy of an entity it embeds.
    pub(super) fn build_nested_datablock(&mut self, owner: IdRef, id: IdRef, flush: bool) {
        let flags = if flush {
            RelationFlags::empty()
        } else {
            RelationFlags::NO_FLUSH
        };
        self.add_relation_with_flags(
            op(id, NodeType::CopyOnEval, OperationCode::CopyOnEval),
            op(owner, NodeType::CopyOnEval, OperationCode::CopyOnEval),
            "Eval Order",
            flags,
        );
    }

    /// Node tree edits do not re-copy the owner.
    pub(super) fn build_nested_nodetree(&mut self, owner: IdRef, tree: NodeTreeId) {
        self.build_nodetree(tree);
        self.build_nested_datablock(owner, tree.into(), false);
    }

    pub(super) fn build_texture(&mut self, texture: TextureId) {
        if !self.begin(texture) {
            return;
        }
        let main = self.main;
        let data = main.texture(texture);
        self.build_id_common(texture.into());
        let datablock = op(texture, NodeType::GenericDatablock, OperationCode::GenericDatablock);
        if let Some(tree) = data.node_tree {
            self.build_nodetree(tree);
            self.add_relation(
                op(tree, NodeType::NTreeOutput, OperationCode::NTreeOutput),
                datablock,
                "Texture's NTree",
            );
            self.build_nested_nodetree(texture.into(), tree);
        }
        if let Some(image) = data.image {
            self.build_image(image);
            self.add_relation(
                comp(image, NodeType::GenericDatablock),
                datablock,
                "Texture Image",
            );
        }
        if main.header(texture.into()).is_some_and(|header| header.has_animation()) {
            self.add_relation(
                comp(texture, NodeType::Animation),
                datablock,
                "Datablock Animation",
            );
        }
    }

    pub(super) fn build_image(&mut self, image: ImageId) {
        if !self.begin(image) {
            return;
        }
        self.build_id_common(image.into());
        if self.main.image(image).is_sequence {
            let animation = op(image, NodeType::ImageAnimation, OperationCode::ImageAnimation);
            self.add_relation(TimeSourceKey, animation, "Time Source -> Image Animation");
            self.add_relation(
                animation,
                op(image, NodeType::GenericDatablock, OperationCode::GenericDatablock),
                "Datablock Image Animation",
            );
        }
    }

    pub(super) fn build_world(&mut self, world: WorldId) {
        if !self.begin(world) {
            return;
        }
        self.build_id_common(world.into());
        let update = op(world, NodeType::Shading, OperationCode::WorldUpdate);
        self.add_relation(comp(world, NodeType::Parameters), update, "World Parameters");
        if let Some(tree) = self.main.world(world).node_tree {
            self.build_nodetree(tree);
            self.add_relation(
                op(tree, NodeType::NTreeOutput, OperationCode::NTreeOutput),
                update,
                "World's NTree",
            );
            self.build_nested_nodetree(world.into(), tree);
        }
    }

    pub(super) fn build_light(&mut self, light: LightId) {
        if !self.begin(light) {
            return;
        }
        self.build_id_common(light.into());
        let shading = comp(light, NodeType::Shading);
        self.add_relation(
            comp(light, NodeType::Parameters),
            shading,
            "Light Shading Parameters",
        );
        if let Some(tree) = self.main.light(light).node_tree {
            self.build_nodetree(tree);
            self.add_relation(comp(tree, NodeType::NTreeOutput), shading, "NTree->Light Parameters");
            self.build_nested_nodetree(light.into(), tree);
        }
    }

    pub(super) fn build_line_style(&mut self, line_style: LineStyleId) {
        if !self.begin(line_style) {
            return;
        }
        self.build_id_common(line_style.into());
        if let Some(tree) = self.main.line_style(line_style).node_tree {
            self.build_nested_nodetree(line_style.into(), tree);
        }
    }
}
