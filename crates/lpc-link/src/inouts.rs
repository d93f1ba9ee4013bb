//! Liveness of interface components.
//!
//! Walks a shader and records which input, output and system-value
//! components its code dereferences, along with the fragment-stage facts a
//! backend needs (interpolation per input component, centroid inputs,
//! derivative and discard use).

use alloc::vec::Vec;

use log::trace;
use lpc_glir::{
    walk_list, Inst, InstData, InterpQualifier, List, Node, NodeData, Shader, ShaderStage, Type,
    VariableData, VariableMode, VisitAction, Visitor,
};

use crate::{
    error::{InternalFault, LinkError, LinkResult},
    mask::ComponentMask,
};

/// Interface usage of one linked shader stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub inputs_read: ComponentMask,
    pub outputs_written: ComponentMask,
    pub system_values_read: ComponentMask,
    /// Interpolation of each input component, indexed by component bit
    /// (fragment stage only)
    pub interp_qualifiers: Vec<InterpQualifier>,
    /// Centroid-sampled input components (fragment stage only)
    pub is_centroid: ComponentMask,
    pub uses_derivative: bool,
    pub uses_discard: bool,
}

impl ProgramInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Interpolation qualifier recorded for an input component.
    pub fn interp_qualifier(&self, slot: u32, component: u32) -> InterpQualifier {
        self.interp_qualifiers
            .get(ComponentMask::bit(slot, component) as usize)
            .copied()
            .unwrap_or_default()
    }

    fn set_interp_qualifier(&mut self, bit: u32, interp: InterpQualifier) {
        let bit = bit as usize;
        if bit >= self.interp_qualifiers.len() {
            self.interp_qualifiers.resize(bit + 1, InterpQualifier::None);
        }
        self.interp_qualifiers[bit] = interp;
    }
}

/// Recompute `prog` from the code of `shader`.
///
/// All previous contents of `prog` are discarded first.
pub fn set_program_inouts(shader: &Shader, prog: &mut ProgramInterface) -> LinkResult<()> {
    prog.reset();
    let mut visitor = InoutsVisitor {
        prog,
        is_fragment: shader.stage == ShaderStage::Fragment,
        is_geometry: shader.stage == ShaderStage::Geometry,
        error: None,
    };
    walk_list(shader, shader.toplevel, &mut visitor);
    if let Some(err) = visitor.error {
        return Err(err);
    }
    trace!(
        "{} shader reads {} writes {}",
        shader.stage,
        prog.inputs_read,
        prog.outputs_written
    );
    Ok(())
}

struct InoutsVisitor<'a> {
    prog: &'a mut ProgramInterface,
    is_fragment: bool,
    is_geometry: bool,
    error: Option<LinkError>,
}

impl InoutsVisitor<'_> {
    /// Mark `len` slot units of `var` starting `offset` units past its
    /// location. Each unit covers the variable's element components from
    /// `location_frac` on.
    fn mark(&mut self, var: &VariableData, offset: u32, len: u32) {
        let Some(location) = var.location else {
            return;
        };
        let width = match var.ty.innermost_element().vector_elements() {
            0 => 4,
            n => n,
        };
        let Some(first) = location
            .checked_add(var.index)
            .and_then(|slot| slot.checked_add(offset))
        else {
            return;
        };
        for i in 0..len {
            let Some(slot) = first
                .checked_add(i)
                .filter(|slot| *slot < ComponentMask::MAX_SLOTS)
            else {
                break;
            };
            match var.mode {
                VariableMode::ShaderIn => {
                    self.prog
                        .inputs_read
                        .insert_components(slot, var.location_frac, width);
                    if self.is_fragment {
                        for c in var.location_frac..(var.location_frac + width).min(4) {
                            let bit = ComponentMask::bit(slot, c);
                            self.prog.set_interp_qualifier(bit, var.interpolation);
                            if var.centroid {
                                self.prog.is_centroid.insert(bit);
                            }
                        }
                    }
                }
                VariableMode::SystemValue => {
                    self.prog
                        .system_values_read
                        .insert_components(slot, var.location_frac, width);
                }
                VariableMode::ShaderOut => {
                    self.prog
                        .outputs_written
                        .insert_components(slot, var.location_frac, width);
                }
                _ => {}
            }
        }
    }

    /// Whole-variable dereference: mark every slot the variable covers.
    fn mark_whole(&mut self, var: &VariableData) {
        match &var.ty {
            Type::Array(element, length) => {
                let (length, columns) = if self.is_geometry && var.mode == VariableMode::ShaderIn {
                    // The outer dimension selects the input vertex.
                    match &**element {
                        Type::Array(inner, inner_length) => (*inner_length, inner.matrix_columns()),
                        _ => (1, element.matrix_columns()),
                    }
                } else {
                    (*length, element.matrix_columns())
                };
                self.mark(var, 0, length.saturating_mul(columns));
            }
            ty => self.mark(var, 0, ty.matrix_columns()),
        }
    }

    fn enter_array_ref(&mut self, shader: &Shader, node: Node, array: Node, index: Node) -> VisitAction {
        let mut deref_var = shader.nodes[array].as_var_ref();
        let mut is_vert_array = false;
        let mut is_2d_array = false;

        if self.is_geometry {
            if deref_var.is_none() {
                // Outer (attribute) dereference of a 2-D input, or a column
                // of an array of matrices.
                if let NodeData::ArrayRef { array: inner, .. } = shader.nodes[array] {
                    deref_var = shader.nodes[inner].as_var_ref();
                    is_2d_array = true;
                }
            }
            if let Some(var) = deref_var {
                if shader.vars[var].mode == VariableMode::ShaderIn {
                    if shader.node_type(node).is_array() {
                        // Inner (vertex) dereference of a 2-D input
                        return VisitAction::Continue;
                    }
                    is_vert_array = true;
                }
            }
        }

        let Some(var) = deref_var else {
            return VisitAction::Continue;
        };
        let data = &shader.vars[var];
        if !data.mode.is_interface() {
            return VisitAction::Continue;
        }

        let constant_index = shader.nodes[index]
            .as_constant()
            .and_then(|c| c.as_index())
            .and_then(|i| u32::try_from(i).ok());
        let Some(index) = constant_index else {
            return VisitAction::Continue;
        };

        let ty = if is_vert_array {
            data.ty.element_type().unwrap_or(&data.ty)
        } else {
            &data.ty
        };
        let offset = if is_vert_array && !is_2d_array { 0 } else { index };
        let width = match ty {
            Type::Array(element, _) if element.is_matrix() => element.matrix_columns(),
            _ => 1,
        };
        self.mark(data, offset.saturating_mul(width), width);
        VisitAction::SkipChildren
    }
}

impl Visitor for InoutsVisitor<'_> {
    fn enter_inst(&mut self, shader: &Shader, _list: List, inst: Inst) -> VisitAction {
        match &shader.insts[inst] {
            InstData::Function { body, .. } => {
                // Parameters are never interface variables.
                if walk_list(shader, *body, self) == VisitAction::Stop {
                    return VisitAction::Stop;
                }
                VisitAction::SkipChildren
            }
            InstData::Discard { .. } => {
                if !self.is_fragment {
                    self.error = Some(InternalFault::DiscardOutsideFragment.into());
                    return VisitAction::Stop;
                }
                self.prog.uses_discard = true;
                VisitAction::Continue
            }
            _ => VisitAction::Continue,
        }
    }

    fn enter_node(&mut self, shader: &Shader, node: Node) -> VisitAction {
        match &shader.nodes[node] {
            NodeData::VarRef(var) => {
                let data = &shader.vars[*var];
                if data.mode.is_interface() {
                    self.mark_whole(data);
                }
                VisitAction::Continue
            }
            NodeData::ArrayRef { array, index } => self.enter_array_ref(shader, node, *array, *index),
            NodeData::Expression { op, .. } => {
                if self.is_fragment && op.is_derivative() {
                    self.prog.uses_derivative = true;
                }
                VisitAction::Continue
            }
            _ => VisitAction::Continue,
        }
    }
}
