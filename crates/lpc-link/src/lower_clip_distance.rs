//! Clip distance lowering.
//!
//! Replaces the `float gl_ClipDistance[n]` output with
//! `vec4 gl_ClipDistanceMESA[(n + 3) / 4]` and rewrites every
//! `gl_ClipDistance[i]` into `gl_ClipDistanceMESA[i / 4][i % 4]`. The index
//! is evaluated once, into a temporary declared right before the statement
//! that uses it.

use alloc::{format, vec::Vec};

use log::debug;
use lpc_glir::{
    walk_list, BaseType, Constant, ExprOp, Inst, List, Node, NodeData, Shader, Type, Var,
    VariableData, VariableMode, VisitAction, Visitor,
};

use crate::error::LinkResult;

/// Lower `gl_ClipDistance` in `shader`. Returns whether anything changed.
pub fn lower_clip_distance(shader: &mut Shader) -> LinkResult<bool> {
    let Some(var) = shader.globals().find(|var| {
        let data = &shader.vars[*var];
        data.name == "gl_ClipDistance" && data.mode.is_interface()
    }) else {
        return Ok(false);
    };
    let Type::Array(_, size) = shader.vars[var].ty else {
        return Ok(false);
    };

    let data = &mut shader.vars[var];
    data.name = "gl_ClipDistanceMESA".into();
    data.ty = Type::array(Type::vec(BaseType::Float, 4), (size + 3) / 4);
    debug!("lowered gl_ClipDistance[{}] to {}", size, data.ty);

    let mut finder = ClipDistanceRefs {
        var,
        statements: Vec::new(),
        found: Vec::new(),
    };
    walk_list(shader, shader.toplevel, &mut finder);

    for (n, (list, statement, node)) in finder.found.into_iter().enumerate() {
        let NodeData::ArrayRef { array, index } = shader.nodes[node] else {
            continue;
        };
        let index_ty = match shader.node_type(index) {
            Type::Scalar(BaseType::Uint) => Type::UINT,
            _ => Type::INT,
        };
        let four = |shader: &mut Shader| match index_ty {
            Type::Scalar(BaseType::Uint) => shader.constant(Constant::uint(4)),
            _ => shader.constant(Constant::int(4)),
        };

        let temp = shader.add_var(VariableData::new(
            format!("clip_distance_index{}", n),
            index_ty.clone(),
            VariableMode::Temporary,
        ));
        let decl = shader.declare(temp);
        shader.layout.insert_before(list, decl, statement);
        let temp_ref = shader.var_ref(temp);
        let init = shader.assign(temp_ref, index);
        shader.layout.insert_before(list, init, statement);

        let temp_ref = shader.var_ref(temp);
        let divisor = four(shader);
        let vec_index = shader.expr(ExprOp::Div, index_ty.clone(), alloc::vec![temp_ref, divisor]);
        let temp_ref = shader.var_ref(temp);
        let divisor = four(shader);
        let component =
            shader.expr(ExprOp::Mod, index_ty.clone(), alloc::vec![temp_ref, divisor]);
        let vector = shader.array_ref(array, vec_index);
        shader.nodes[node] = NodeData::ArrayRef {
            array: vector,
            index: component,
        };
    }
    Ok(true)
}

/// Collects `gl_ClipDistance[i]` dereferences in post-order, with the
/// statement containing each.
struct ClipDistanceRefs {
    var: Var,
    statements: Vec<(List, Inst)>,
    found: Vec<(List, Inst, Node)>,
}

impl Visitor for ClipDistanceRefs {
    fn enter_inst(&mut self, _shader: &Shader, list: List, inst: Inst) -> VisitAction {
        self.statements.push((list, inst));
        VisitAction::Continue
    }

    fn leave_inst(&mut self, _shader: &Shader, _list: List, _inst: Inst) -> VisitAction {
        self.statements.pop();
        VisitAction::Continue
    }

    fn leave_node(&mut self, shader: &Shader, node: Node) -> VisitAction {
        if let NodeData::ArrayRef { array, .. } = shader.nodes[node] {
            if shader.nodes[array].as_var_ref() == Some(self.var) {
                if let Some(&(list, inst)) = self.statements.last() {
                    self.found.push((list, inst, node));
                }
            }
        }
        VisitAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use lpc_glir::parse_shader;

    use super::*;

    #[test]
    fn test_rewrites_declaration_and_uses() {
        let mut shader = parse_shader(
            "shader vertex
            (declare (out location=18) (array float 6) gl_ClipDistance)
            (declare (uniform) int k)
            (function main (parameters) (
              (assign (array_ref (var_ref gl_ClipDistance) (constant int (5))) (constant float (1.0)))
              (if (constant bool (true)) (
                (assign (array_ref (var_ref gl_ClipDistance) (var_ref k)) (constant float (0.5)))
              ) ())
            ))",
        )
        .unwrap();
        assert_eq!(lower_clip_distance(&mut shader), Ok(true));
        assert_eq!(
            shader.to_string(),
            "shader vertex
(declare (out location=18) (array vec4 2) gl_ClipDistanceMESA)
(declare (uniform) int k)
(function main (parameters) (
  (declare (temporary) int clip_distance_index0)
  (assign (var_ref clip_distance_index0) (constant int (5)))
  (assign (array_ref (array_ref (var_ref gl_ClipDistanceMESA) (expression int / (var_ref clip_distance_index0) (constant int (4)))) (expression int % (var_ref clip_distance_index0) (constant int (4)))) (constant float (1.0)))
  (if (constant bool (true)) (
    (declare (temporary) int clip_distance_index1)
    (assign (var_ref clip_distance_index1) (var_ref k))
    (assign (array_ref (array_ref (var_ref gl_ClipDistanceMESA) (expression int / (var_ref clip_distance_index1) (constant int (4)))) (expression int % (var_ref clip_distance_index1) (constant int (4)))) (constant float (0.5)))
  ) ())
))
"
        );
    }

    #[test]
    fn test_no_clip_distance() {
        let mut shader = parse_shader(
            "shader vertex
            (declare (out location=0) vec4 gl_Position)
            (function main (parameters) ())",
        )
        .unwrap();
        assert_eq!(lower_clip_distance(&mut shader), Ok(false));
    }

    #[test]
    fn test_array_size_rounds_up() {
        let mut shader = parse_shader(
            "shader vertex
            (declare (out location=18) (array float 5) gl_ClipDistance)
            (function main (parameters) ())",
        )
        .unwrap();
        assert_eq!(lower_clip_distance(&mut shader), Ok(true));
        let var = shader
            .find_var("gl_ClipDistanceMESA", VariableMode::ShaderOut)
            .unwrap();
        assert_eq!(shader.vars[var].ty, Type::array(Type::vec(BaseType::Float, 4), 2));
    }
}
