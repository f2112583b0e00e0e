// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bitflags::bitflags;
use canopy_scene::IdRef;
use hashbrown::HashMap;

bitflags! {
    /// Parts of an entity a builder has already visited.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BuildTags: u32 {
        /// Parameters chain and custom properties.
        const PARAMETERS = 1 << 0;
        /// Animation data and drivers.
        const ANIMATION = 1 << 1;
        /// Nesting of child collections.
        const COLLECTION_CHILDREN_HIERARCHY = 1 << 2;
        /// Scene sound playback.
        const SCENE_AUDIO = 1 << 3;
        /// Scene sequencer strips.
        const SCENE_SEQUENCER = 1 << 4;
        /// Scene compositor tree.
        const SCENE_COMPOSITOR = 1 << 5;
        /// The full entity. Separate from the partial tags, which full builds
        /// still run through.
        const COMPLETE = 1 << 6;
    }
}

/// Visited-set shared by one build pass.
///
/// Each entity is built at most once per tag, no matter how many call sites
/// request it.
#[derive(Clone, Debug, Default)]
pub struct BuilderMap {
    built: HashMap<IdRef, BuildTags>,
}

impl BuilderMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if every bit of `tag` is already recorded for `id`.
    #[must_use]
    pub fn check_is_built(&self, id: IdRef, tag: BuildTags) -> bool {
        self.built.get(&id).is_some_and(|done| done.contains(tag))
    }

    /// Records `tag` for `id`.
    pub fn tag_build(&mut self, id: IdRef, tag: BuildTags) {
        *self.built.entry(id).or_default() |= tag;
    }

    /// Returns whether `tag` was already built for `id`, recording it either
    /// way.
    pub fn check_is_built_and_tag(&mut self, id: IdRef, tag: BuildTags) -> bool {
        let done = self.built.entry(id).or_default();
        let was_built = done.contains(tag);
        *done |= tag;
        was_built
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_scene::{Main, Object, ObjectType};

    #[test]
    fn tags_are_independent() {
        let mut main = Main::new();
        let id: IdRef = main.add_object(Object::new("Ob", ObjectType::Empty)).into();
        let mut map = BuilderMap::new();

        assert!(!map.check_is_built_and_tag(id, BuildTags::PARAMETERS));
        assert!(map.check_is_built_and_tag(id, BuildTags::PARAMETERS));
        assert!(!map.check_is_built(id, BuildTags::ANIMATION));
        assert!(!map.check_is_built(id, BuildTags::COMPLETE));

        map.tag_build(id, BuildTags::COMPLETE);
        assert!(map.check_is_built(id, BuildTags::COMPLETE));
        assert!(!map.check_is_built(id, BuildTags::ANIMATION), "partial tags stay separate");
    }
}
