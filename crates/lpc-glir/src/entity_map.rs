//! Dense entity-to-data arenas.
//!
//! A `PrimaryMap` is the allocation arena for one kind of IR object. Objects
//! are only ever appended; nothing is freed until the whole map is dropped,
//! which is how a shader releases its IR in bulk.

use alloc::vec::Vec;
use core::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use crate::entity::EntityRef;

/// Dense map from entity to data
///
/// A `Vec` with entity-based indexing: `PrimaryMap<Var, VariableData>`
/// cannot be indexed with a `Node`.
#[derive(Debug, Clone)]
pub struct PrimaryMap<K: EntityRef, V> {
    data: Vec<V>,
    _phantom: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    /// Create a new empty map
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Allocate a value and return its key
    pub fn push(&mut self, value: V) -> K {
        let index = self.data.len();
        self.data.push(value);
        K::from_index(index)
    }

    /// The key the next `push` will return
    pub fn next_key(&self) -> K {
        K::from_index(self.data.len())
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.data.get(key.index())
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.data.get_mut(key.index())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over all keys in allocation order
    pub fn keys(&self) -> impl Iterator<Item = K> {
        (0..self.data.len()).map(K::from_index)
    }

    /// Iterate over entries as (entity, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (K::from_index(i), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.data.iter()
    }
}

impl<K: EntityRef, V> Default for PrimaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V> Index<K> for PrimaryMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        &self.data[key.index()]
    }
}

impl<K: EntityRef, V> IndexMut<K> for PrimaryMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut V {
        &mut self.data[key.index()]
    }
}
