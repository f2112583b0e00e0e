// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry data blocks and evaluated geometry sets.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::id::{
    CollectionId, CurvesId, GreasePencilId, IdHeader, KeyId, MaterialId, MeshId, ObjectId,
    PointCloudId, VolumeId,
};
use crate::object::ObjectType;

/// A polygon mesh.
///
/// Faces are stored as ranges into `corner_verts`, delimited by
/// `face_offsets` (one more entry than there are faces).
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Entity header.
    pub id: IdHeader,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex normals.
    pub normals: Vec<Vec3>,
    /// Face boundaries into `corner_verts`.
    pub face_offsets: Vec<usize>,
    /// Vertex index of every face corner.
    pub corner_verts: Vec<usize>,
    /// Active UV map, one entry per face corner.
    pub uv_map: Option<Vec<Vec2>>,
    /// Original (undeformed) coordinates, one per vertex.
    pub orco: Option<Vec<Vec3>>,
    /// Deformed vertex positions of the edit-mode cage.
    pub edit_cage: Option<Vec<Vec3>>,
    /// Shape keys.
    pub key: Option<KeyId>,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

impl Mesh {
    /// Builds a mesh from vertex positions and polygons given as vertex loops.
    ///
    /// Vertex normals are the normalized sum of adjacent face normals.
    #[must_use]
    pub fn from_polygons(name: impl Into<String>, positions: Vec<Vec3>, polys: &[&[usize]]) -> Self {
        let mut face_offsets = Vec::with_capacity(polys.len() + 1);
        let mut corner_verts = Vec::new();
        face_offsets.push(0);
        for poly in polys {
            corner_verts.extend_from_slice(poly);
            face_offsets.push(corner_verts.len());
        }
        let mut mesh = Self {
            id: IdHeader::new(name),
            positions,
            face_offsets,
            corner_verts,
            ..Self::default()
        };
        mesh.update_normals();
        mesh
    }

    /// Builds a mesh with vertices only.
    #[must_use]
    pub fn from_points(name: impl Into<String>, positions: Vec<Vec3>, normals: Vec<Vec3>) -> Self {
        Self {
            id: IdHeader::new(name),
            positions,
            normals,
            face_offsets: alloc::vec![0],
            ..Self::default()
        }
    }

    /// Recomputes vertex normals from the faces.
    pub fn update_normals(&mut self) {
        let mut normals = alloc::vec![Vec3::ZERO; self.positions.len()];
        for face in 0..self.faces_num() {
            let normal = self.face_normal(face);
            for &vert in self.face(face) {
                if let Some(n) = normals.get_mut(vert) {
                    *n += normal;
                }
            }
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        self.normals = normals;
    }

    /// Number of faces.
    #[must_use]
    pub fn faces_num(&self) -> usize {
        self.face_offsets.len().saturating_sub(1)
    }

    /// Corner range of `face`.
    #[must_use]
    pub fn face_corners(&self, face: usize) -> Range<usize> {
        self.face_offsets[face]..self.face_offsets[face + 1]
    }

    /// Vertex indices of `face`.
    #[must_use]
    pub fn face(&self, face: usize) -> &[usize] {
        &self.corner_verts[self.face_corners(face)]
    }

    /// Unit normal of `face` by Newell's method.
    #[must_use]
    pub fn face_normal(&self, face: usize) -> Vec3 {
        let verts = self.face(face);
        let mut normal = Vec3::ZERO;
        for (i, &a) in verts.iter().enumerate() {
            let b = verts[(i + 1) % verts.len()];
            let (p, q) = (self.positions[a], self.positions[b]);
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
        }
        normal.normalize_or_zero()
    }
}

/// Kind of a legacy curve data block.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CurveKind {
    /// Curves.
    #[default]
    Curve,
    /// NURBS surface.
    Surface,
    /// Text.
    Text,
}

/// Placement of one laid-out character.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CharTransform {
    /// Unicode scalar value of the character.
    pub character: char,
    /// Horizontal offset in font units.
    pub x: f32,
    /// Vertical offset in font units.
    pub y: f32,
    /// Rotation around Z in radians.
    pub rotation: f32,
}

/// The laid-out text of a text curve.
#[derive(Clone, Debug, Default)]
pub struct TextLayout {
    /// One entry per character, in text order.
    pub chars: Vec<CharTransform>,
}

impl TextLayout {
    /// Lays out `text` on a single line with fixed advance.
    #[must_use]
    pub fn monospace(text: &str, advance: f32) -> Self {
        let chars = text
            .chars()
            .enumerate()
            .map(|(i, character)| CharTransform {
                character,
                x: i as f32 * advance,
                y: 0.0,
                rotation: 0.0,
            })
            .collect();
        Self { chars }
    }
}

/// Legacy curve, surface or text data.
#[derive(Clone, Debug, Default)]
pub struct Curve {
    /// Entity header.
    pub id: IdHeader,
    /// Curve, surface or text.
    pub kind: CurveKind,
    /// Shape keys.
    pub key: Option<KeyId>,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
    /// Object whose profile is swept along the curve.
    pub bevel_object: Option<ObjectId>,
    /// Object scaling the bevel along the curve.
    pub taper_object: Option<ObjectId>,
    /// Curve object that text follows.
    pub text_on_curve: Option<ObjectId>,
    /// Children can follow this curve as a path.
    pub use_path: bool,
    /// Name prefix of objects used as glyphs for text instancing.
    pub family: String,
    /// Font size.
    pub font_size: f32,
    /// Horizontal text offset.
    pub x_offset: f32,
    /// Vertical text offset.
    pub y_offset: f32,
    /// Laid-out text.
    pub text: Option<TextLayout>,
}

/// Hair curves.
#[derive(Clone, Debug, Default)]
pub struct Curves {
    /// Entity header.
    pub id: IdHeader,
    /// Mesh object the hair is attached to.
    pub surface: Option<ObjectId>,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

/// A point cloud.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    /// Entity header.
    pub id: IdHeader,
    /// Point positions.
    pub positions: Vec<Vec3>,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

/// A volume grid container.
#[derive(Clone, Debug, Default)]
pub struct Volume {
    /// Entity header.
    pub id: IdHeader,
    /// Grids are loaded per frame from a file sequence.
    pub is_sequence: bool,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

/// Grease pencil drawings.
#[derive(Clone, Debug, Default)]
pub struct GreasePencil {
    /// Entity header.
    pub id: IdHeader,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

/// A deformation lattice.
#[derive(Clone, Debug, Default)]
pub struct Lattice {
    /// Entity header.
    pub id: IdHeader,
    /// Shape keys.
    pub key: Option<KeyId>,
}

/// Metaball elements.
#[derive(Clone, Debug, Default)]
pub struct MetaBall {
    /// Entity header.
    pub id: IdHeader,
    /// Material slots.
    pub materials: Vec<Option<MaterialId>>,
}

/// One shape of a [`Key`].
#[derive(Clone, Debug, Default)]
pub struct KeyBlock {
    /// Shape name.
    pub name: String,
}

/// Shape keys of a mesh, curve or lattice.
#[derive(Clone, Debug, Default)]
pub struct Key {
    /// Entity header.
    pub id: IdHeader,
    /// Shapes, basis first.
    pub blocks: Vec<KeyBlock>,
}

/// What a geometry instance places.
#[derive(Clone, Debug, Default)]
pub enum InstanceReference {
    /// Nothing.
    #[default]
    None,
    /// An object.
    Object(ObjectId),
    /// Every object of a collection.
    Collection(CollectionId),
    /// A nested geometry set.
    GeometrySet(Box<GeometrySet>),
}

/// Values of a per-instance attribute.
#[derive(Clone, Debug)]
pub enum AttributeArray {
    /// Scalars.
    Float(Vec<f32>),
    /// 2D vectors.
    Float2(Vec<Vec2>),
    /// 3D vectors.
    Float3(Vec<Vec3>),
    /// RGBA colors.
    Color(Vec<Vec4>),
    /// Integers.
    Int(Vec<i32>),
    /// Booleans.
    Bool(Vec<bool>),
    /// Rotations.
    Quaternion(Vec<Quat>),
}

impl AttributeArray {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Float2(v) => v.len(),
            Self::Float3(v) => v.len(),
            Self::Color(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Quaternion(v) => v.len(),
        }
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Instances placed by geometry evaluation.
#[derive(Clone, Debug, Default)]
pub struct Instances {
    /// Distinct instanced things.
    pub references: Vec<InstanceReference>,
    /// Per instance, an index into `references`.
    pub handles: Vec<usize>,
    /// Per instance transform relative to the owner.
    pub transforms: Vec<Mat4>,
    /// Stable per-instance ids.
    pub ids: Option<Vec<i32>>,
    /// Named per-instance attributes.
    pub attributes: Vec<(String, AttributeArray)>,
}

impl Instances {
    /// Adds `reference` and returns its handle, reusing an identical object
    /// or collection reference.
    pub fn add_reference(&mut self, reference: InstanceReference) -> usize {
        let existing = self.references.iter().position(|r| match (r, &reference) {
            (InstanceReference::Object(a), InstanceReference::Object(b)) => a == b,
            (InstanceReference::Collection(a), InstanceReference::Collection(b)) => a == b,
            _ => false,
        });
        existing.unwrap_or_else(|| {
            self.references.push(reference);
            self.references.len() - 1
        })
    }

    /// Appends an instance of `handle`.
    pub fn add_instance(&mut self, handle: usize, transform: Mat4) {
        self.handles.push(handle);
        self.transforms.push(transform);
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if there are no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeArray> {
        self.attributes
            .iter()
            .find_map(|(n, values)| (n == name).then_some(values))
    }

    /// Stable id of instance `index`, falling back to the index.
    #[must_use]
    pub fn id(&self, index: usize) -> i32 {
        self.ids
            .as_ref()
            .and_then(|ids| ids.get(index).copied())
            .unwrap_or_else(|| i32::try_from(index).unwrap_or(i32::MAX))
    }
}

/// Evaluated geometry of an object: one component per geometry type plus
/// instances.
#[derive(Clone, Debug, Default)]
pub struct GeometrySet {
    /// Mesh component.
    pub mesh: Option<MeshId>,
    /// Curves component.
    pub curves: Option<CurvesId>,
    /// Point cloud component.
    pub point_cloud: Option<PointCloudId>,
    /// Volume component.
    pub volume: Option<VolumeId>,
    /// Grease pencil component.
    pub grease_pencil: Option<GreasePencilId>,
    /// Instances component.
    pub instances: Option<Instances>,
}

impl GeometrySet {
    /// Returns `true` if any component would be drawn as an instance of an
    /// object of type `kind`.
    ///
    /// Components matching the object's own type are drawn as the object
    /// itself; everything else, and any instances, are instanced.
    #[must_use]
    pub fn has_instances_for(&self, kind: ObjectType) -> bool {
        (self.mesh.is_some() && kind != ObjectType::Mesh)
            || (self.point_cloud.is_some() && kind != ObjectType::PointCloud)
            || (self.volume.is_some() && kind != ObjectType::Volume)
            || (self.curves.is_some() && !matches!(kind, ObjectType::Curve | ObjectType::Font))
            || (self.grease_pencil.is_some() && kind != ObjectType::GreasePencil)
            || self.instances.as_ref().is_some_and(|i| !i.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn quad_normal_points_up() {
        let mesh = Mesh::from_polygons(
            "quad",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            &[&[0, 1, 2, 3]],
        );
        assert_eq!(mesh.faces_num(), 1);
        assert_eq!(mesh.face(0), &[0, 1, 2, 3]);
        assert!((mesh.face_normal(0) - Vec3::Z).length() < 1e-6, "normal");
        assert!((mesh.normals[2] - Vec3::Z).length() < 1e-6, "vertex normal");
    }

    #[test]
    fn own_component_is_not_an_instance() {
        let set = GeometrySet {
            mesh: Some(MeshId(0)),
            ..GeometrySet::default()
        };
        assert!(!set.has_instances_for(ObjectType::Mesh));
        assert!(set.has_instances_for(ObjectType::PointCloud));
    }

    #[test]
    fn ids_fall_back_to_index() {
        let mut instances = Instances::default();
        let handle = instances.add_reference(InstanceReference::Object(ObjectId(1)));
        assert_eq!(
            instances.add_reference(InstanceReference::Object(ObjectId(1))),
            handle
        );
        instances.add_instance(handle, Mat4::IDENTITY);
        instances.add_instance(handle, Mat4::IDENTITY);
        assert_eq!(instances.id(1), 1);
        instances.ids = Some(vec![10, 20]);
        assert_eq!(instances.id(1), 20);
    }
}
