//! Entity references for shader IR objects.
//!
//! Variables, rvalue nodes, statements and statement lists are all owned by a
//! [`Shader`](crate::Shader) and referred to through small copyable ids. The
//! ids index dense arenas ([`PrimaryMap`](crate::PrimaryMap)), so an id from
//! one shader is meaningless in another.

use core::fmt;

/// Base trait for entity references.
///
/// Entities are type-safe identifiers with O(1) conversion to and from
/// arena indices.
pub trait EntityRef: Copy + Clone + PartialEq + Eq + core::hash::Hash + fmt::Debug {
    /// Get the arena index of this entity
    fn index(self) -> usize;

    /// Create an entity from an arena index
    fn from_index(index: usize) -> Self;
}

macro_rules! entity {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create an entity with the given raw index
            pub fn new(index: u32) -> Self {
                $name(index)
            }

            /// Raw index of this entity
            pub fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl EntityRef for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Self {
                $name(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity!(
    /// A variable declared somewhere in a shader (global, local or parameter).
    Var,
    "var"
);

entity!(
    /// An rvalue node: dereference, constant, swizzle or expression.
    Node,
    "node"
);

entity!(
    /// A statement.
    Inst,
    "inst"
);

entity!(
    /// An ordered statement list (top level, function body, loop body, ...).
    List,
    "list"
);
