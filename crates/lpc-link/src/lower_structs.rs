//! Struct varying flattening.
//!
//! Every interface variable of the requested direction whose type contains a
//! struct is replaced by one variable per leaf field, named
//! `var.field.subfield`. Array dimensions along the way are folded into a
//! single flat array on the leaf, so
//!
//! ```text
//! struct S { vec2 a; float b[3]; };
//! out S s[2];
//! ```
//!
//! becomes `out vec2 s.a[2]` and `out float s.b[6]`. The original variable
//! turns into an ordinary global and a copy block moves the data: for
//! outputs the block runs after all of `main`, for inputs before it.
//!
//! The per-vertex dimension of a geometry input is not folded: `in S s[3]`
//! becomes `in vec2 s.a[3]` and `in float s.b[3][3]`, matching the leaves
//! of the producer's `out S s`.

use alloc::{format, string::String, vec::Vec};

use log::debug;
use lpc_glir::{
    Constant, ExprOp, Inst, InstData, List, Node, Shader, ShaderStage, Type, Var, VariableData,
    VariableMode,
};

use crate::error::{InternalFault, LinkResult};

/// Flatten every unassigned `mode` variable that contains a struct.
/// Returns the generated leaf variables in declaration order.
pub fn lower_varying_structs(shader: &mut Shader, mode: VariableMode) -> LinkResult<Vec<Var>> {
    debug_assert!(matches!(mode, VariableMode::ShaderIn | VariableMode::ShaderOut));
    let targets: Vec<(Var, Inst)> = shader
        .layout
        .iter(shader.toplevel)
        .filter_map(|inst| {
            let var = shader.insts[inst].as_declare()?;
            let data = &shader.vars[var];
            (data.mode == mode && data.location.is_none() && data.ty.contains_record())
                .then_some((var, inst))
        })
        .collect();
    if targets.is_empty() {
        return Ok(Vec::new());
    }
    let main = shader.main_body().ok_or(InternalFault::MissingMain)?;
    let per_vertex = shader.stage == ShaderStage::Geometry && mode == VariableMode::ShaderIn;

    let mut leaves = Vec::new();
    for (var, decl) in targets {
        let ty = shader.vars[var].ty.clone();
        let name = shader.vars[var].name.clone();
        debug!("flattening struct varying {}", name);

        let block = shader.make_list();
        let mut flattener = Flattener {
            shader: &mut *shader,
            original: var,
            original_decl: decl,
            mode,
            vertex: None,
            leaves: &mut leaves,
        };
        match &ty {
            Type::Array(element, vertices) if per_vertex => {
                let (counter, body) = flattener.begin_loop("vertex".into(), *vertices, block);
                let array = flattener.shader.var_ref(var);
                let counter_ref = flattener.shader.var_ref(counter);
                let rvalue = flattener.shader.array_ref(array, counter_ref);
                let index = flattener.uint(0);
                flattener.vertex = Some((counter, *vertices));
                flattener.flatten(element, name, rvalue, index, None, body, 0);
                flattener.end_loop(counter, body, block);
            }
            _ => {
                let rvalue = flattener.shader.var_ref(var);
                let index = flattener.uint(0);
                flattener.flatten(&ty, name, rvalue, index, None, block, 0);
            }
        }

        shader.vars[var].mode = VariableMode::Auto;
        if mode == VariableMode::ShaderOut {
            shader.layout.splice_back(main, block);
        } else {
            shader.layout.splice_front(main, block);
        }
    }
    Ok(leaves)
}

struct Flattener<'a> {
    shader: &'a mut Shader,
    original: Var,
    original_decl: Inst,
    mode: VariableMode,
    /// Vertex counter and vertex count while flattening a per-vertex input
    vertex: Option<(Var, u32)>,
    leaves: &'a mut Vec<Var>,
}

impl Flattener<'_> {
    fn uint(&mut self, value: u32) -> Node {
        self.shader.constant(Constant::uint(value))
    }

    fn temporary(&mut self, name: String, stmts: List) -> Var {
        let var = self
            .shader
            .add_var(VariableData::new(name, Type::UINT, VariableMode::Temporary));
        let decl = self.shader.declare(var);
        self.shader.layout.push_back(stmts, decl);
        var
    }

    /// Declare and zero the counter `name` in `stmts` and open a loop body
    /// that breaks once the counter reaches `length`. The loop is closed by
    /// [`end_loop`](Self::end_loop).
    fn begin_loop(&mut self, name: String, length: u32, stmts: List) -> (Var, List) {
        let counter = self.temporary(name, stmts);
        let counter_ref = self.shader.var_ref(counter);
        let zero = self.uint(0);
        let init = self.shader.assign(counter_ref, zero);
        self.shader.layout.push_back(stmts, init);

        let body = self.shader.make_list();

        // if (i >= length) break;
        let counter_ref = self.shader.var_ref(counter);
        let bound = self.uint(length);
        let condition = self
            .shader
            .expr(ExprOp::Gequal, Type::BOOL, alloc::vec![counter_ref, bound]);
        let then_list = self.shader.make_list();
        let else_list = self.shader.make_list();
        let brk = self.shader.add_inst(InstData::Break);
        self.shader.layout.push_back(then_list, brk);
        let exit = self.shader.add_inst(InstData::If {
            condition,
            then_list,
            else_list,
        });
        self.shader.layout.push_back(body, exit);
        (counter, body)
    }

    /// Increment the counter at the end of `body` and append the loop to
    /// `stmts`.
    fn end_loop(&mut self, counter: Var, body: List, stmts: List) {
        // i = i + 1;
        let counter_ref = self.shader.var_ref(counter);
        let one = self.uint(1);
        let next = self
            .shader
            .expr(ExprOp::Add, Type::UINT, alloc::vec![counter_ref, one]);
        let counter_ref = self.shader.var_ref(counter);
        let step = self.shader.assign(counter_ref, next);
        self.shader.layout.push_back(body, step);

        let lp = self.shader.add_inst(InstData::Loop { body });
        self.shader.layout.push_back(stmts, lp);
    }

    /// Emit the copy statements for `rvalue` (of type `ty`) into `stmts`.
    ///
    /// `index` is the flat leaf index of the current element and
    /// `multiplicity` the product of the array lengths traversed so far
    /// (`None` while outside any array).
    #[allow(clippy::too_many_arguments)]
    fn flatten(
        &mut self,
        ty: &Type,
        name: String,
        rvalue: Node,
        index: Node,
        multiplicity: Option<u32>,
        stmts: List,
        depth: usize,
    ) {
        match ty {
            Type::Array(element, length) => {
                let length = *length;
                let (counter, body) = self.begin_loop(format!("i{}", depth), length, stmts);

                // index = outer_index * length + i;
                let flat = self.temporary(format!("index{}", depth), body);
                let scale = self.uint(length);
                let scaled = self
                    .shader
                    .expr(ExprOp::Mul, Type::UINT, alloc::vec![index, scale]);
                let counter_ref = self.shader.var_ref(counter);
                let sum = self
                    .shader
                    .expr(ExprOp::Add, Type::UINT, alloc::vec![scaled, counter_ref]);
                let flat_ref = self.shader.var_ref(flat);
                let set_index = self.shader.assign(flat_ref, sum);
                self.shader.layout.push_back(body, set_index);

                let array = self.shader.clone_node(rvalue);
                let counter_ref = self.shader.var_ref(counter);
                let element_rvalue = self.shader.array_ref(array, counter_ref);
                let element_index = self.shader.var_ref(flat);
                self.flatten(
                    element,
                    name,
                    element_rvalue,
                    element_index,
                    Some(multiplicity.unwrap_or(1) * length),
                    body,
                    depth + 1,
                );
                self.end_loop(counter, body, stmts);
            }
            Type::Struct(st) => {
                for field in &st.fields {
                    let record = self.shader.clone_node(rvalue);
                    let field_rvalue = self.shader.record_ref(record, field.name.clone());
                    let field_index = self.shader.clone_node(index);
                    self.flatten(
                        &field.ty,
                        format!("{}.{}", name, field.name),
                        field_rvalue,
                        field_index,
                        multiplicity,
                        stmts,
                        depth,
                    );
                }
            }
            leaf => self.emit_leaf(leaf, name, rvalue, index, multiplicity, stmts),
        }
    }

    fn emit_leaf(
        &mut self,
        ty: &Type,
        name: String,
        rvalue: Node,
        index: Node,
        multiplicity: Option<u32>,
        stmts: List,
    ) {
        let mut leaf_ty = match multiplicity {
            Some(length) => Type::array(ty.clone(), length),
            None => ty.clone(),
        };
        if let Some((_, vertices)) = self.vertex {
            leaf_ty = Type::array(leaf_ty, vertices);
        }
        let mut data = VariableData::new(name, leaf_ty, self.mode);
        data.copy_qualifiers_from(&self.shader.vars[self.original]);
        let leaf = self.shader.add_var(data);
        let decl = self.shader.declare(leaf);
        let toplevel = self.shader.toplevel;
        self.shader.layout.insert_before(toplevel, decl, self.original_decl);

        let mut leaf_value = self.shader.var_ref(leaf);
        if let Some((counter, _)) = self.vertex {
            let counter_ref = self.shader.var_ref(counter);
            leaf_value = self.shader.array_ref(leaf_value, counter_ref);
        }
        if multiplicity.is_some() {
            leaf_value = self.shader.array_ref(leaf_value, index);
        }
        let copy = if self.mode == VariableMode::ShaderOut {
            self.shader.assign(leaf_value, rvalue)
        } else {
            self.shader.assign(rvalue, leaf_value)
        };
        self.shader.layout.push_back(stmts, copy);
        self.leaves.push(leaf);
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec};

    use lpc_glir::parse_shader;

    use super::*;

    const NESTED: &str = "shader vertex
        (struct Inner (vec2 a) ((array float 3) b))
        (struct Outer (Inner inner) (mat2 m))
        (declare (out centroid flat) (array Outer 2) s)
        (declare (out) vec4 plain)
        (function main (parameters) (
          (assign (var_ref plain) (constant vec4 (0.0 0.0 0.0 0.0)))
        ))";

    #[test]
    fn test_leaf_names_and_types() {
        let mut shader = parse_shader(NESTED).unwrap();
        let leaves = lower_varying_structs(&mut shader, VariableMode::ShaderOut).unwrap();
        let described: Vec<_> = leaves
            .iter()
            .map(|leaf| {
                let data = &shader.vars[*leaf];
                (data.name.clone(), data.ty.to_string())
            })
            .collect();
        assert_eq!(
            described,
            vec![
                ("s.inner.a".to_string(), "(array vec2 2)".to_string()),
                ("s.inner.b".to_string(), "(array float 6)".to_string()),
                ("s.m".to_string(), "(array mat2 2)".to_string()),
            ]
        );
        for leaf in &leaves {
            let data = &shader.vars[*leaf];
            assert!(data.centroid);
            assert_eq!(data.interpolation, lpc_glir::InterpQualifier::Flat);
            assert_eq!(data.mode, VariableMode::ShaderOut);
        }
        assert!(shader.find_var("s", VariableMode::Auto).is_some());
        assert!(shader.find_var("plain", VariableMode::ShaderOut).is_some());
    }

    #[test]
    fn test_components_are_preserved() {
        let mut shader = parse_shader(NESTED).unwrap();
        let original = shader.vars[shader.find_var("s", VariableMode::ShaderOut).unwrap()]
            .ty
            .component_slots();
        let leaves = lower_varying_structs(&mut shader, VariableMode::ShaderOut).unwrap();
        let flattened: u32 = leaves
            .iter()
            .map(|leaf| shader.vars[*leaf].ty.component_slots())
            .sum();
        assert_eq!(flattened, original);
    }

    #[test]
    fn test_output_copy_runs_after_user_code() {
        let mut shader = parse_shader(
            "shader vertex
            (struct S (vec3 p) (float w))
            (declare (out) S v)
            (function main (parameters) (
              (assign (record_ref (var_ref v) w) (constant float (1.0)))
            ))",
        )
        .unwrap();
        lower_varying_structs(&mut shader, VariableMode::ShaderOut).unwrap();
        let text = shader.to_string();
        assert_eq!(
            text,
            "shader vertex
(struct S (vec3 p) (float w))
(declare (out) vec3 v.p)
(declare (out) float v.w)
(declare () S v)
(function main (parameters) (
  (assign (record_ref (var_ref v) w) (constant float (1.0)))
  (assign (var_ref v.p) (record_ref (var_ref v) p))
  (assign (var_ref v.w) (record_ref (var_ref v) w))
))
"
        );
        // The flattened form is valid text IR.
        assert!(parse_shader(&text).is_ok());
    }

    #[test]
    fn test_input_copy_runs_first() {
        let mut shader = parse_shader(
            "shader fragment
            (struct S (float a))
            (declare (in) (array S 2) v)
            (declare (out location=4) float color)
            (function main (parameters) (
              (assign (var_ref color) (record_ref (array_ref (var_ref v) (constant int (1))) a))
            ))",
        )
        .unwrap();
        lower_varying_structs(&mut shader, VariableMode::ShaderIn).unwrap();
        let body = shader.main_body().unwrap();
        let stmts = shader.layout.collect(body);
        // i0 declaration, i0 = 0, loop, user assignment
        assert_eq!(stmts.len(), 4);
        assert!(matches!(shader.insts[stmts[2]], InstData::Loop { .. }));
        let text = shader.to_string();
        assert!(text.contains(
            "(assign (record_ref (array_ref (var_ref v) (var_ref i0)) a) (array_ref (var_ref v.a) (var_ref index0)))"
        ));
        assert!(parse_shader(&text).is_ok());
    }

    #[test]
    fn test_geometry_inputs_keep_vertex_dimension() {
        let mut shader = parse_shader(
            "shader geometry
            (struct Inner (vec2 a) ((array float 3) b))
            (declare (in) (array Inner 3) s)
            (function main (parameters) ())",
        )
        .unwrap();
        let leaves = lower_varying_structs(&mut shader, VariableMode::ShaderIn).unwrap();
        let described: Vec<_> = leaves
            .iter()
            .map(|leaf| {
                let data = &shader.vars[*leaf];
                (data.name.clone(), data.ty.to_string())
            })
            .collect();
        assert_eq!(
            described,
            vec![
                ("s.a".to_string(), "(array vec2 3)".to_string()),
                ("s.b".to_string(), "(array (array float 3) 3)".to_string()),
            ]
        );

        let text = shader.to_string();
        assert!(text.contains(
            "(assign (record_ref (array_ref (var_ref s) (var_ref vertex)) a) (array_ref (var_ref s.a) (var_ref vertex)))"
        ));
        assert!(text.contains(
            "(assign (array_ref (record_ref (array_ref (var_ref s) (var_ref vertex)) b) (var_ref i0)) (array_ref (array_ref (var_ref s.b) (var_ref vertex)) (var_ref index0)))"
        ));
        assert!(parse_shader(&text).is_ok());

        // The same struct as a vertex output flattens to the per-vertex
        // element types.
        let mut vs = parse_shader(
            "shader vertex
            (struct Inner (vec2 a) ((array float 3) b))
            (declare (out) Inner s)
            (function main (parameters) ())",
        )
        .unwrap();
        let outputs = lower_varying_structs(&mut vs, VariableMode::ShaderOut).unwrap();
        for (output, input) in outputs.iter().zip(&leaves) {
            assert_eq!(
                Some(&vs.vars[*output].ty),
                shader.vars[*input].ty.element_type()
            );
        }
    }

    #[test]
    fn test_assigned_and_plain_variables_are_left_alone() {
        let mut shader = parse_shader(
            "shader vertex
            (struct S (float a))
            (declare (out location=40) S fixed)
            (declare (out) vec2 plain)
            (function main (parameters) ())",
        )
        .unwrap();
        let leaves = lower_varying_structs(&mut shader, VariableMode::ShaderOut).unwrap();
        assert!(leaves.is_empty());
        assert!(shader.find_var("fixed", VariableMode::ShaderOut).is_some());
    }

    #[test]
    fn test_missing_main() {
        let mut shader = parse_shader(
            "shader vertex
            (struct S (float a))
            (declare (out) S v)",
        )
        .unwrap();
        assert_eq!(
            lower_varying_structs(&mut shader, VariableMode::ShaderOut),
            Err(InternalFault::MissingMain.into())
        );
    }
}
