//! GLSL shader-stage IR.
//!
//! This crate defines the tree IR consumed by the interface linker:
//! - Types (scalars, vectors, matrices, arrays, structs)
//! - Variables with their interface qualifiers
//! - Rvalue nodes (dereferences, swizzles, constants, expressions)
//! - Statements and ordered statement lists
//! - A hierarchical visitor
//! - A textual s-expression form (printer and parser)

#![no_std]

extern crate alloc;

mod entity;
mod entity_map;
mod inst;
mod layout;
mod node;
mod parser;
mod print;
mod shader;
mod types;
mod variable;
pub mod visit;

pub use entity::{EntityRef, Inst, List, Node, Var};
pub use entity_map::PrimaryMap;
pub use inst::InstData;
pub use layout::{Insts, Layout};
pub use node::{ConstScalar, Constant, ExprOp, NodeData, SwizzleMask};
pub use parser::{parse_shader, ParseError};
pub use shader::{Shader, ShaderStage};
pub use types::{BaseType, StructField, StructType, Type};
pub use variable::{InterpQualifier, VariableData, VariableMode};
pub use visit::{walk_inst, walk_list, walk_node, VisitAction, Visitor};
