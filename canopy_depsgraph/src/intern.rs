// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interning of component and operation names.
//!
//! Keys carry borrowed names, but nodes must own theirs. Every name is stored
//! once in a [`NameInterner`] and nodes keep a compact [`NameId`]. Lookups by
//! `&str` never allocate, so resolving a key against the graph is cheap.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::hash::BuildHasher;

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;

/// A compact, interned name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct NameId(u32);

impl NameId {
    /// The empty name, always interned first.
    pub const EMPTY: Self = Self(0);

    /// Returns this id as a `usize` index.
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Stores node names once and hands out [`NameId`]s.
///
/// Lookups use a hash-bucket index (hash -> small list of candidate ids) so
/// the strings are not duplicated as map keys.
#[derive(Debug, Clone)]
pub struct NameInterner {
    names: Vec<Box<str>>,
    buckets: HashMap<u64, Vec<NameId>>,
    build_hasher: DefaultHashBuilder,
}

impl Default for NameInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl NameInterner {
    /// Creates an interner that already contains the empty name.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Self {
            names: Vec::new(),
            buckets: HashMap::new(),
            build_hasher: DefaultHashBuilder::default(),
        };
        interner.intern("");
        interner
    }

    /// Returns the number of interned names, the empty name included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if only the empty name is interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.len() <= 1
    }

    /// Returns the interned name for `id`.
    ///
    /// Ids from another interner resolve to the empty name.
    #[must_use]
    pub fn resolve(&self, id: NameId) -> &str {
        self.names.get(id.as_usize()).map_or("", |name| name)
    }

    /// Returns the id of `name` if it was interned.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<NameId> {
        let hash = self.build_hasher.hash_one(name);
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|id| &*self.names[id.as_usize()] == name)
    }

    /// Interns `name` and returns its id.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let hash = self.build_hasher.hash_one(name);
        let id = NameId(
            u32::try_from(self.names.len()).expect("too many interned names for NameId (u32)"),
        );
        self.names.push(name.into());
        self.buckets.entry(hash).or_default().push(id);
        id
    }
}
