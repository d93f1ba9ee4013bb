//! Statements.

use alloc::string::String;

use crate::entity::{List, Node, Var};

/// A statement.
///
/// Compound statements own their bodies through [`List`] ids; the lists are
/// stored in the shader's [`Layout`](crate::Layout).
#[derive(Debug, Clone, PartialEq)]
pub enum InstData {
    /// Variable declaration
    Declare(Var),
    /// `lhs = rhs`; a swizzled `lhs` writes only the selected components
    Assign { lhs: Node, rhs: Node },
    If {
        condition: Node,
        then_list: List,
        else_list: List,
    },
    /// Infinite loop, left with `Break`
    Loop { body: List },
    Break,
    Continue,
    Return,
    Discard { condition: Option<Node> },
    /// A function with one signature; `params` holds `Declare` statements
    Function {
        name: String,
        params: List,
        body: List,
    },
}

impl InstData {
    pub fn as_declare(&self) -> Option<crate::entity::Var> {
        match self {
            InstData::Declare(var) => Some(*var),
            _ => None,
        }
    }

    /// Child lists in visiting order.
    pub fn child_lists(&self) -> impl Iterator<Item = List> {
        let lists: [Option<List>; 2] = match self {
            InstData::If {
                then_list,
                else_list,
                ..
            } => [Some(*then_list), Some(*else_list)],
            InstData::Loop { body } => [Some(*body), None],
            InstData::Function { params, body, .. } => [Some(*params), Some(*body)],
            _ => [None, None],
        };
        lists.into_iter().flatten()
    }
}
