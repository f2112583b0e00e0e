// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-level expansion state and the shared dupli constructor.

use alloc::vec::Vec;

use glam::Mat4;
use hashbrown::HashSet;
use smallvec::SmallVec;

use canopy_scene::{CollectionId, EvalMode, IdRef, Main, Object, ObjectId, ObjectType};

use crate::dupli::{DupliObject, InstanceData, MAX_DUPLI_RECUR, PersistentId};
use crate::generators::Generator;
use crate::hash::{hash_int, hash_int_2d, hash_string};

/// Options for one expansion.
#[derive(Clone, Debug, Default)]
pub struct DupliOptions {
    /// Object in edit mode.
    ///
    /// It is never instanced as a child, and vertex instancing on it uses
    /// the edit cage.
    pub edit_object: Option<ObjectId>,
    /// When set, collection members outside this set are not instanced.
    pub include_objects: Option<HashSet<ObjectId>>,
    /// Object whose evaluated geometry is being previewed.
    ///
    /// Instances of its geometry record their index in
    /// [`DupliObject::preview_instance_index`].
    pub preview_object: Option<ObjectId>,
}

impl DupliOptions {
    pub(crate) fn includes(&self, object: ObjectId) -> bool {
        self.include_objects
            .as_ref()
            .is_none_or(|objects| objects.contains(&object))
    }
}

/// Shared mutable state of one expansion: the output and the chain of
/// objects currently being expanded.
#[derive(Debug)]
pub(crate) struct Traversal<'a> {
    pub(crate) duplis: Vec<DupliObject<'a>>,
    instance_stack: Vec<ObjectId>,
}

impl<'a> Traversal<'a> {
    pub(crate) fn new(root: ObjectId) -> Self {
        Self {
            duplis: Vec::new(),
            instance_stack: alloc::vec![root],
        }
    }

    /// Runs `f` with `object` pushed on the instance stack.
    fn with_instance(&mut self, object: ObjectId, f: impl FnOnce(&mut Self)) {
        self.instance_stack.push(object);
        f(self);
        self.instance_stack.pop();
    }
}

/// State of one expansion level.
#[derive(Clone, Debug)]
pub(crate) struct DupliContext<'a, 'o> {
    pub(crate) main: &'a Main,
    pub(crate) mode: EvalMode,
    pub(crate) options: &'o DupliOptions,
    /// Object the expansion started from.
    pub(crate) root: ObjectId,
    /// Object whose instances this level generates.
    pub(crate) object: ObjectId,
    /// Set while expanding inside an instanced collection.
    pub(crate) collection: Option<CollectionId>,
    /// Transform from this level's space to world.
    pub(crate) space: Mat4,
    pub(crate) level: usize,
    persistent_id: [i32; MAX_DUPLI_RECUR],
    /// Geometry instances that led to each level.
    instance_data: SmallVec<[Option<InstanceData<'a>>; 4]>,
    pub(crate) preview_instance_index: Option<usize>,
    pub(crate) generator: Option<Generator>,
}

/// Clamps an element index into the persistent id range.
pub(crate) fn id_index(index: usize) -> i32 {
    i32::try_from(index).map_or(PersistentId::UNUSED - 1, |i| i.min(PersistentId::UNUSED - 1))
}

impl<'a, 'o> DupliContext<'a, 'o> {
    pub(crate) fn root(
        main: &'a Main,
        mode: EvalMode,
        object: ObjectId,
        options: &'o DupliOptions,
    ) -> Self {
        let mut ctx = Self {
            main,
            mode,
            options,
            root: object,
            object,
            collection: None,
            space: Mat4::IDENTITY,
            level: 0,
            persistent_id: [PersistentId::UNUSED; MAX_DUPLI_RECUR],
            instance_data: SmallVec::new(),
            preview_instance_index: None,
            generator: None,
        };
        ctx.generator = Generator::select(&ctx);
        ctx
    }

    /// The object of this level.
    pub(crate) fn object(&self) -> Option<&'a Object> {
        self.main.get_object(self.object)
    }

    /// Descends one level into `object`, recording `index` in the
    /// persistent id and composing `space` onto the current space.
    ///
    /// Returns `None` when the new level would reach the recursion limit.
    pub(crate) fn descend(
        &self,
        object: ObjectId,
        space: Option<Mat4>,
        index: i32,
        instance: Option<InstanceData<'a>>,
    ) -> Option<Self> {
        let mut child = self.clone();
        if self.generator == Some(Generator::Collection) {
            child.collection = self.object().and_then(|ob| ob.instance_collection);
        }
        child.object = object;
        if let Some(space) = space {
            child.space = self.space * space;
        }
        child.persistent_id[child.level] = index;
        child.instance_data.push(instance);
        child.level += 1;
        if child.level == MAX_DUPLI_RECUR - 1 {
            log::warn!(
                "Maximum instance recursion level reached in \"{}\"",
                self.main.name(object.into())
            );
            return None;
        }
        child.generator = Generator::select(&child);
        Some(child)
    }

    /// Expands `object` as a nested instancer placed by `space`.
    ///
    /// Objects already being expanded are refused, which breaks
    /// self-instancing loops.
    pub(crate) fn recurse(
        &self,
        traversal: &mut Traversal<'a>,
        object: ObjectId,
        space: Mat4,
        index: i32,
        instance: Option<InstanceData<'a>>,
    ) {
        if traversal.instance_stack.contains(&object) {
            log::warn!(
                "'{}' object is trying to instance itself",
                self.main.name(object.into())
            );
            return;
        }
        if self.level >= MAX_DUPLI_RECUR {
            return;
        }
        let Some(child) = self.descend(object, Some(space), index, instance) else {
            return;
        };
        if let Some(generator) = child.generator {
            traversal.with_instance(object, |traversal| generator.make_duplis(&child, traversal));
        }
    }

    /// Emits an instance of `object` at `matrix` (relative to this level's
    /// space) and returns it for further annotation.
    pub(crate) fn make_dupli<'t>(
        &self,
        traversal: &'t mut Traversal<'a>,
        object: ObjectId,
        data: Option<IdRef>,
        matrix: Mat4,
        index: i32,
        instance: Option<InstanceData<'a>>,
    ) -> &'t mut DupliObject<'a> {
        let mut persistent_id = [PersistentId::UNUSED; MAX_DUPLI_RECUR];
        persistent_id[0] = index;
        for (i, slot) in persistent_id.iter_mut().enumerate().take(self.level + 1).skip(1) {
            *slot = self.persistent_id[self.level - i];
        }
        let persistent_id = PersistentId(persistent_id);

        let name = self.main.name(object.into());
        let mut random_id = hash_string(name);
        if index != PersistentId::UNUSED {
            for &slot in persistent_id.slots() {
                random_id = hash_int_2d(random_id, slot as u32);
            }
        } else {
            random_id = hash_int_2d(random_id, 0);
        }
        if object != self.root {
            random_id ^= hash_int(hash_string(self.main.name(self.root.into())));
        }

        let instance_data = instance
            .into_iter()
            .chain(self.instance_data.iter().rev().flatten().copied())
            .collect();
        let no_draw = self
            .main
            .get_object(object)
            .is_some_and(|ob| ob.kind == ObjectType::MetaBall);

        traversal.duplis.push(DupliObject {
            object,
            data,
            matrix: self.space * matrix,
            persistent_id,
            level: self.level,
            generator: self.generator,
            no_draw,
            random_id,
            orco: None,
            uv: None,
            particle_system: None,
            instance_data,
            preview_instance_index: self.preview_instance_index,
        });
        let last = traversal.duplis.len() - 1;
        &mut traversal.duplis[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_stay_below_the_unused_marker() {
        assert_eq!(id_index(3), 3);
        assert_eq!(id_index(usize::MAX), PersistentId::UNUSED - 1);
    }

    #[test]
    fn descending_stops_before_the_limit() {
        let mut main = Main::new();
        let ob = main.add_object(Object::new("Empty", ObjectType::Empty));
        let options = DupliOptions::default();
        let mut ctx = DupliContext::root(&main, EvalMode::Viewport, ob, &options);
        let mut depth = 0;
        while let Some(child) = ctx.descend(ob, None, 0, None) {
            ctx = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_DUPLI_RECUR - 2);
    }
}
