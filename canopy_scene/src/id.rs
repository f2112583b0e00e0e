// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed entity handles and the closed entity-kind tag.

use alloc::string::String;

use crate::anim::AnimData;
use crate::property::IdProperties;

macro_rules! define_handles {
    ($($(#[$meta:meta])* $handle:ident => $kind:ident,)*) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $handle(pub(crate) u32);

            impl $handle {
                /// Returns this handle as an index into its store.
                #[inline]
                #[must_use]
                pub const fn index(self) -> usize {
                    self.0 as usize
                }
            }

            impl From<$handle> for IdRef {
                #[inline]
                fn from(id: $handle) -> Self {
                    Self::$kind(id)
                }
            }
        )*

        /// The closed set of entity kinds stored in a [`Main`](crate::Main).
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum IdKind {
            $(
                #[doc = concat!("`", stringify!($kind), "` entities.")]
                $kind,
            )*
        }

        /// A reference to any entity in a [`Main`](crate::Main).
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum IdRef {
            $(
                #[doc = concat!("A `", stringify!($kind), "` entity.")]
                $kind($handle),
            )*
        }

        impl IdRef {
            /// Returns the kind tag of the referenced entity.
            #[must_use]
            pub const fn kind(self) -> IdKind {
                match self {
                    $(Self::$kind(_) => IdKind::$kind,)*
                }
            }

            /// Returns the store index of the referenced entity.
            #[must_use]
            pub const fn index(self) -> usize {
                match self {
                    $(Self::$kind(id) => id.index(),)*
                }
            }
        }
    };
}

define_handles! {
    /// Handle to an [`Object`](crate::Object).
    ObjectId => Object,
    /// Handle to a [`Collection`](crate::Collection).
    CollectionId => Collection,
    /// Handle to a [`Mesh`](crate::Mesh).
    MeshId => Mesh,
    /// Handle to a legacy [`Curve`](crate::Curve) (curves, surfaces and text).
    CurveId => Curve,
    /// Handle to a hair [`Curves`](crate::Curves) data-block.
    CurvesId => Curves,
    /// Handle to a [`PointCloud`](crate::PointCloud).
    PointCloudId => PointCloud,
    /// Handle to a [`Volume`](crate::Volume).
    VolumeId => Volume,
    /// Handle to a [`GreasePencil`](crate::GreasePencil).
    GreasePencilId => GreasePencil,
    /// Handle to a [`Lattice`](crate::Lattice).
    LatticeId => Lattice,
    /// Handle to a [`MetaBall`](crate::MetaBall).
    MetaBallId => MetaBall,
    /// Handle to a shape [`Key`](crate::Key).
    KeyId => Key,
    /// Handle to an [`Armature`](crate::Armature).
    ArmatureId => Armature,
    /// Handle to a [`Camera`](crate::Camera).
    CameraId => Camera,
    /// Handle to a [`Light`](crate::Light).
    LightId => Light,
    /// Handle to a [`LightProbe`](crate::LightProbe).
    LightProbeId => LightProbe,
    /// Handle to a [`Speaker`](crate::Speaker).
    SpeakerId => Speaker,
    /// Handle to a [`Sound`](crate::Sound).
    SoundId => Sound,
    /// Handle to a [`Material`](crate::Material).
    MaterialId => Material,
    /// Handle to a [`NodeTree`](crate::NodeTree).
    NodeTreeId => NodeTree,
    /// Handle to a [`Texture`](crate::Texture).
    TextureId => Texture,
    /// Handle to an [`Image`](crate::Image).
    ImageId => Image,
    /// Handle to a [`World`](crate::World).
    WorldId => World,
    /// Handle to a [`LineStyle`](crate::LineStyle).
    LineStyleId => LineStyle,
    /// Handle to [`ParticleSettings`](crate::ParticleSettings).
    ParticleSettingsId => ParticleSettings,
    /// Handle to an [`Action`](crate::Action).
    ActionId => Action,
    /// Handle to a [`CacheFile`](crate::CacheFile).
    CacheFileId => CacheFile,
    /// Handle to a [`Mask`](crate::Mask).
    MaskId => Mask,
    /// Handle to a [`MovieClip`](crate::MovieClip).
    MovieClipId => MovieClip,
    /// Handle to a [`Scene`](crate::Scene).
    SceneId => Scene,
}

impl IdKind {
    /// Returns `true` if entities of this kind are duplicated before evaluation.
    ///
    /// Images are evaluated in place; every other kind gets an evaluation copy.
    #[must_use]
    pub const fn needs_copy_on_eval(self) -> bool {
        !matches!(self, Self::Image)
    }

    /// Returns `true` for kinds that can be the data of an object.
    #[must_use]
    pub const fn is_object_data(self) -> bool {
        matches!(
            self,
            Self::Mesh
                | Self::Curve
                | Self::Curves
                | Self::PointCloud
                | Self::Volume
                | Self::GreasePencil
                | Self::Lattice
                | Self::MetaBall
                | Self::Armature
                | Self::Camera
                | Self::Light
                | Self::LightProbe
                | Self::Speaker
        )
    }

    /// Returns `true` for object-data kinds that evaluate to geometry.
    #[must_use]
    pub const fn is_geometry(self) -> bool {
        matches!(
            self,
            Self::Mesh
                | Self::Curve
                | Self::Curves
                | Self::PointCloud
                | Self::Volume
                | Self::GreasePencil
                | Self::Lattice
                | Self::MetaBall
        )
    }
}

/// Data shared by every entity: its name, custom properties and animation.
#[derive(Clone, Debug, Default)]
pub struct IdHeader {
    /// User-visible name, unique within its kind by convention.
    pub name: String,
    /// Custom properties.
    pub properties: IdProperties,
    /// Animation, NLA and drivers.
    pub anim_data: Option<AnimData>,
}

impl IdHeader {
    /// Creates a header with the given name and no properties or animation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: IdProperties::new(),
            anim_data: None,
        }
    }

    /// Returns `true` if the entity has an action or NLA tracks.
    #[must_use]
    pub fn has_animation(&self) -> bool {
        self.anim_data.as_ref().is_some_and(AnimData::has_animation)
    }

    /// Returns `true` if the entity has at least one driver.
    #[must_use]
    pub fn has_drivers(&self) -> bool {
        self.anim_data.as_ref().is_some_and(|adt| !adt.drivers.is_empty())
    }
}

/// Access to the [`IdHeader`] of any entity type.
pub trait Datablock {
    /// The shared entity header.
    fn header(&self) -> &IdHeader;
    /// Mutable access to the shared entity header.
    fn header_mut(&mut self) -> &mut IdHeader;

    /// The entity name.
    fn name(&self) -> &str {
        &self.header().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_ref_reports_kind_and_index() {
        let object = IdRef::from(ObjectId(3));
        assert_eq!(object.kind(), IdKind::Object);
        assert_eq!(object.index(), 3);

        let mesh: IdRef = MeshId(7).into();
        assert_eq!(mesh.kind(), IdKind::Mesh);
        assert_ne!(object, mesh);
    }

    #[test]
    fn images_skip_copy_on_eval() {
        assert!(!IdKind::Image.needs_copy_on_eval());
        assert!(IdKind::Mesh.needs_copy_on_eval());
        assert!(IdKind::Scene.needs_copy_on_eval());
    }

    #[test]
    fn geometry_kinds_are_object_data() {
        for kind in [IdKind::Mesh, IdKind::Curve, IdKind::Volume, IdKind::MetaBall] {
            assert!(kind.is_geometry(), "{kind:?} should be geometry");
            assert!(kind.is_object_data(), "{kind:?} should be object data");
        }
        assert!(IdKind::Camera.is_object_data());
        assert!(!IdKind::Camera.is_geometry());
        assert!(!IdKind::Material.is_object_data());
    }
}
