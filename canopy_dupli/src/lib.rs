// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Dupli: instances generated by the objects of an evaluated scene.
//!
//! An object can instance other objects: the members of a collection, its
//! children on its vertices or faces, objects on its particles, glyph
//! objects on the characters of a text, or whatever its evaluated geometry
//! carries. [`object_duplilist`] expands one object into a flat
//! [`DupliList`], following instancers inside instancers.
//!
//! ## Quick Start
//!
//! ```rust
//! use canopy_dupli::{DupliOptions, object_duplilist};
//! use canopy_scene::{Collection, EvalMode, Main, Object, ObjectType};
//! use glam::{Mat4, Vec3};
//!
//! let mut main = Main::new();
//! let tree = main.add_object(
//!     Object::new("Tree", ObjectType::Empty)
//!         .with_world(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))),
//! );
//! let forest = main.add_collection(Collection::new("Forest"));
//! main.link_object(forest, tree).unwrap();
//!
//! let instancer = main.add_object(
//!     Object::new("Instancer", ObjectType::Empty)
//!         .with_world(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)))
//!         .with_instance_collection(forest),
//! );
//!
//! let duplis = object_duplilist(&main, EvalMode::Render, instancer, &DupliOptions::default());
//! assert_eq!(duplis.len(), 1);
//! let tree_instance = &duplis.as_slice()[0];
//! assert_eq!(tree_instance.object, tree);
//! assert_eq!(tree_instance.matrix.w_axis.truncate(), Vec3::new(1.0, 5.0, 0.0));
//! assert_eq!(tree_instance.persistent_id.indices(), &[0]);
//! ```
//!
//! ## Nesting
//!
//! Instanced objects that instance again are expanded in place, up to
//! [`MAX_DUPLI_RECUR`] levels. An object is never expanded inside its own
//! expansion; such loops are broken with a warning through the [`log`]
//! facade.
//!
//! ## Persistent ids
//!
//! Every [`DupliObject`] carries a [`PersistentId`]: its index at each level,
//! innermost first. The pair of instanced object and persistent id names the
//! same logical instance in every frame, which [`DupliList::find`] uses to
//! match instances across frames. [`DupliObject::random_id`] is a hash of
//! the same path.
//!
//! ## Attributes
//!
//! [`find_rgba_attribute`] looks up a named color for an instance, through
//! its particle system, the geometry instances that placed it, the
//! instancing object, and the object with its data.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.
//!
//! ## Features
//!
//! - `std` (default): float math from `std`; forwards to `canopy_scene/std`.
//! - `libm`: float math from `libm` for `no_std` targets.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("canopy_dupli requires either the `std` or `libm` feature");

mod attribute;
mod context;
mod dupli;
mod float;
mod generators;
pub mod hash;
mod math;
mod rng;

use canopy_scene::{EvalMode, Main, ObjectId};

pub use attribute::find_rgba_attribute;
pub use context::DupliOptions;
pub use dupli::{
    DupliList, DupliObject, InstanceData, MAX_DUPLI_RECUR, ParticleSystemRef, PersistentId,
};
pub use generators::Generator;

use context::{DupliContext, Traversal};

/// Expands `object` into the instances it generates in `mode`.
///
/// Objects that generate nothing, and objects missing from `main`, give an
/// empty list. The list borrows geometry instances from `main`.
#[must_use]
pub fn object_duplilist<'a>(
    main: &'a Main,
    mode: EvalMode,
    object: ObjectId,
    options: &DupliOptions,
) -> DupliList<'a> {
    let ctx = DupliContext::root(main, mode, object, options);
    let mut traversal = Traversal::new(object);
    if let Some(generator) = ctx.generator {
        generator.make_duplis(&ctx, &mut traversal);
    }
    log::trace!(
        "\"{}\" generated {} instances",
        main.name(object.into()),
        traversal.duplis.len()
    );
    DupliList::from_vec(traversal.duplis)
}
