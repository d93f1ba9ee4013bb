//! Hierarchical traversal of statements and rvalues.
//!
//! A pass implements [`Visitor`] for the node kinds it cares about and hands
//! it to [`walk_list`]. Traversal is read-only; passes that rewrite the IR
//! collect what they need first and mutate afterwards.

use crate::{
    entity::{Inst, List, Node},
    inst::InstData,
    node::NodeData,
    shader::Shader,
};

/// What the walker does after a visitor callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    Continue,
    /// Do not descend into the children of the current statement or node
    SkipChildren,
    /// Abort the whole traversal
    Stop,
}

#[allow(unused_variables)]
pub trait Visitor {
    fn enter_inst(&mut self, shader: &Shader, list: List, inst: Inst) -> VisitAction {
        VisitAction::Continue
    }

    fn leave_inst(&mut self, shader: &Shader, list: List, inst: Inst) -> VisitAction {
        VisitAction::Continue
    }

    fn enter_node(&mut self, shader: &Shader, node: Node) -> VisitAction {
        VisitAction::Continue
    }

    fn leave_node(&mut self, shader: &Shader, node: Node) -> VisitAction {
        VisitAction::Continue
    }
}

/// Walk every statement of `list` in order. Returns `Stop` if the visitor
/// aborted the traversal.
pub fn walk_list<V: Visitor + ?Sized>(shader: &Shader, list: List, visitor: &mut V) -> VisitAction {
    for inst in shader.layout.iter(list) {
        if walk_inst(shader, list, inst, visitor) == VisitAction::Stop {
            return VisitAction::Stop;
        }
    }
    VisitAction::Continue
}

pub fn walk_inst<V: Visitor + ?Sized>(
    shader: &Shader,
    list: List,
    inst: Inst,
    visitor: &mut V,
) -> VisitAction {
    match visitor.enter_inst(shader, list, inst) {
        VisitAction::Stop => return VisitAction::Stop,
        VisitAction::SkipChildren => {}
        VisitAction::Continue => {
            let stopped = match &shader.insts[inst] {
                InstData::Declare(_)
                | InstData::Break
                | InstData::Continue
                | InstData::Return
                | InstData::Discard { condition: None } => false,
                InstData::Assign { lhs, rhs } => {
                    walk_node(shader, *lhs, visitor) == VisitAction::Stop
                        || walk_node(shader, *rhs, visitor) == VisitAction::Stop
                }
                InstData::Discard {
                    condition: Some(condition),
                } => walk_node(shader, *condition, visitor) == VisitAction::Stop,
                InstData::If {
                    condition,
                    then_list,
                    else_list,
                } => {
                    walk_node(shader, *condition, visitor) == VisitAction::Stop
                        || walk_list(shader, *then_list, visitor) == VisitAction::Stop
                        || walk_list(shader, *else_list, visitor) == VisitAction::Stop
                }
                InstData::Loop { body } => walk_list(shader, *body, visitor) == VisitAction::Stop,
                InstData::Function { params, body, .. } => {
                    walk_list(shader, *params, visitor) == VisitAction::Stop
                        || walk_list(shader, *body, visitor) == VisitAction::Stop
                }
            };
            if stopped {
                return VisitAction::Stop;
            }
        }
    }
    match visitor.leave_inst(shader, list, inst) {
        VisitAction::Stop => VisitAction::Stop,
        _ => VisitAction::Continue,
    }
}

pub fn walk_node<V: Visitor + ?Sized>(shader: &Shader, node: Node, visitor: &mut V) -> VisitAction {
    match visitor.enter_node(shader, node) {
        VisitAction::Stop => return VisitAction::Stop,
        VisitAction::SkipChildren => {}
        VisitAction::Continue => {
            let stopped = match &shader.nodes[node] {
                NodeData::VarRef(_) | NodeData::Constant(_) => false,
                NodeData::ArrayRef { array, index } => {
                    walk_node(shader, *array, visitor) == VisitAction::Stop
                        || walk_node(shader, *index, visitor) == VisitAction::Stop
                }
                NodeData::RecordRef { record, .. } => {
                    walk_node(shader, *record, visitor) == VisitAction::Stop
                }
                NodeData::Swizzle { value, .. } => {
                    walk_node(shader, *value, visitor) == VisitAction::Stop
                }
                NodeData::Expression { operands, .. } => operands
                    .iter()
                    .any(|operand| walk_node(shader, *operand, visitor) == VisitAction::Stop),
            };
            if stopped {
                return VisitAction::Stop;
            }
        }
    }
    match visitor.leave_node(shader, node) {
        VisitAction::Stop => VisitAction::Stop,
        _ => VisitAction::Continue,
    }
}
