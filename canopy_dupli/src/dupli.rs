// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generated instance records.

use alloc::vec::Vec;
use core::fmt;

use glam::{Mat4, Vec2, Vec3, Vec4};
use hashbrown::HashMap;
use smallvec::SmallVec;

use canopy_scene::{IdRef, Instances, ObjectId};

use crate::generators::Generator;

/// Maximum instancing depth.
///
/// Persistent ids hold one index per level, and expansion stops one level
/// before this bound.
pub const MAX_DUPLI_RECUR: usize = 8;

/// Index path that identifies one instance across frames.
///
/// The innermost index comes first, followed by the index at every
/// enclosing level. Unused trailing slots hold [`PersistentId::UNUSED`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PersistentId(pub(crate) [i32; MAX_DUPLI_RECUR]);

impl PersistentId {
    /// Value of the slots beyond the instancing depth; no index takes it.
    pub const UNUSED: i32 = i32::MAX;

    /// An id with every slot unused.
    pub const EMPTY: Self = Self([Self::UNUSED; MAX_DUPLI_RECUR]);

    /// Creates an id from explicit slots, innermost first.
    #[must_use]
    pub const fn from_slots(slots: [i32; MAX_DUPLI_RECUR]) -> Self {
        Self(slots)
    }

    /// All slots, including unused ones.
    #[must_use]
    pub const fn slots(&self) -> &[i32; MAX_DUPLI_RECUR] {
        &self.0
    }

    /// The used slots, innermost first.
    #[must_use]
    pub fn indices(&self) -> &[i32] {
        let used = self
            .0
            .iter()
            .position(|&slot| slot == Self::UNUSED)
            .unwrap_or(MAX_DUPLI_RECUR);
        &self.0[..used]
    }
}

impl fmt::Debug for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PersistentId").field(&self.indices()).finish()
    }
}

/// One entry of the instance-data stack of a dupli: the geometry instances
/// that placed it, and the instance index within them.
#[derive(Copy, Clone, Debug)]
pub struct InstanceData<'a> {
    /// The instances component.
    pub instances: &'a Instances,
    /// Index of the instance.
    pub index: usize,
}

impl InstanceData<'_> {
    /// Reads attribute `name` of this instance as a color.
    ///
    /// Scalars broadcast to RGB with alpha one, vectors fill the leading
    /// channels. Rotations have no color form.
    #[must_use]
    pub fn attribute_rgba(&self, name: &str) -> Option<Vec4> {
        use canopy_scene::AttributeArray as A;

        let i = self.index;
        let rgba = match self.instances.attribute(name)? {
            A::Float(values) => {
                let v = *values.get(i)?;
                Vec4::new(v, v, v, 1.0)
            }
            A::Float2(values) => values.get(i)?.extend(0.0).extend(1.0),
            A::Float3(values) => values.get(i)?.extend(1.0),
            A::Color(values) => *values.get(i)?,
            A::Int(values) => {
                let v = *values.get(i)? as f32;
                Vec4::new(v, v, v, 1.0)
            }
            A::Bool(values) => {
                let v = if *values.get(i)? { 1.0 } else { 0.0 };
                Vec4::new(v, v, v, 1.0)
            }
            A::Quaternion(_) => return None,
        };
        Some(rgba)
    }
}

/// A particle system of an object, by position in its system list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParticleSystemRef {
    /// Object owning the system.
    pub object: ObjectId,
    /// Index into the object's particle systems.
    pub index: usize,
}

/// A generated instance.
///
/// Borrowed parts point into the database the list was generated from.
#[derive(Clone, Debug)]
pub struct DupliObject<'a> {
    /// Instanced object.
    pub object: ObjectId,
    /// Data drawn instead of the object's own, for geometry components.
    pub data: Option<IdRef>,
    /// World transform.
    pub matrix: Mat4,
    /// Index path, innermost first.
    pub persistent_id: PersistentId,
    /// Depth of the generating context; instances of the root are level 0.
    pub level: usize,
    /// Generator that produced the instance.
    pub generator: Option<Generator>,
    /// Drawn through another mechanism, like merged metaballs.
    pub no_draw: bool,
    /// Stable per-instance hash for random variation.
    pub random_id: u32,
    /// Original coordinates of the emitting point.
    pub orco: Option<Vec3>,
    /// UV of the emitting point.
    pub uv: Option<Vec2>,
    /// Particle system that emitted the instance.
    pub particle_system: Option<ParticleSystemRef>,
    /// Geometry instances that placed this dupli, innermost first.
    pub instance_data: SmallVec<[InstanceData<'a>; 2]>,
    /// Instance index within the previewed geometry, if any.
    pub preview_instance_index: Option<usize>,
}

/// The flat result of expanding one object.
#[derive(Clone, Debug, Default)]
pub struct DupliList<'a> {
    duplis: Vec<DupliObject<'a>>,
    by_id: HashMap<(ObjectId, PersistentId), usize>,
}

impl<'a> DupliList<'a> {
    pub(crate) fn from_vec(duplis: Vec<DupliObject<'a>>) -> Self {
        let mut by_id = HashMap::with_capacity(duplis.len());
        for (index, dupli) in duplis.iter().enumerate() {
            by_id
                .entry((dupli.object, dupli.persistent_id))
                .or_insert(index);
        }
        Self { duplis, by_id }
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.duplis.len()
    }

    /// Returns `true` if nothing was instanced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duplis.is_empty()
    }

    /// Instances in generation order.
    #[must_use]
    pub fn as_slice(&self) -> &[DupliObject<'a>] {
        &self.duplis
    }

    /// Iterates over the instances in generation order.
    pub fn iter(&self) -> core::slice::Iter<'_, DupliObject<'a>> {
        self.duplis.iter()
    }

    /// Finds the first instance of `object` with `persistent_id`.
    ///
    /// Matching the same pair in the lists of two frames pairs up the same
    /// logical instance.
    #[must_use]
    pub fn find(&self, object: ObjectId, persistent_id: &PersistentId) -> Option<&DupliObject<'a>> {
        self.by_id
            .get(&(object, *persistent_id))
            .map(|&index| &self.duplis[index])
    }

    /// Consumes the list, returning the instances.
    #[must_use]
    pub fn into_vec(self) -> Vec<DupliObject<'a>> {
        self.duplis
    }
}

impl<'a, 'l> IntoIterator for &'l DupliList<'a> {
    type Item = &'l DupliObject<'a>;
    type IntoIter = core::slice::Iter<'l, DupliObject<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.duplis.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;
    use canopy_scene::{AttributeArray, InstanceReference};

    #[test]
    fn indices_stop_at_first_unused_slot() {
        let mut slots = [PersistentId::UNUSED; MAX_DUPLI_RECUR];
        slots[0] = 4;
        slots[1] = 0;
        let id = PersistentId::from_slots(slots);
        assert_eq!(id.indices(), &[4, 0]);
        assert!(PersistentId::EMPTY.indices().is_empty(), "no used slots");
    }

    #[test]
    fn attributes_convert_to_rgba() {
        let mut instances = Instances::default();
        let handle = instances.add_reference(InstanceReference::None);
        instances.add_instance(handle, Mat4::IDENTITY);
        instances.add_instance(handle, Mat4::IDENTITY);
        instances.attributes = vec![
            (String::from("weight"), AttributeArray::Float(vec![0.0, 0.5])),
            (
                String::from("offset"),
                AttributeArray::Float2(vec![Vec2::ZERO, Vec2::new(1.0, 2.0)]),
            ),
            (String::from("count"), AttributeArray::Int(vec![1, 3])),
        ];
        let data = InstanceData {
            instances: &instances,
            index: 1,
        };
        assert_eq!(data.attribute_rgba("weight"), Some(Vec4::new(0.5, 0.5, 0.5, 1.0)));
        assert_eq!(data.attribute_rgba("offset"), Some(Vec4::new(1.0, 2.0, 0.0, 1.0)));
        assert_eq!(data.attribute_rgba("count"), Some(Vec4::new(3.0, 3.0, 3.0, 1.0)));
        assert_eq!(data.attribute_rgba("missing"), None);
    }
}
