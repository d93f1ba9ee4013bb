//! Vector packing of assigned varyings.
//!
//! Backends that can only address whole vec4 slots see every varying that
//! is not already a vec4 (or an array of vec4s) rewritten into swizzled
//! accesses of `packed<N>` vec4 variables, one per slot. For example
//!
//! ```text
//! out mat3x2 foo;      // location 4, frac 0
//! out vec3 bar[2];     // location 5, frac 2
//! ```
//!
//! is lowered to
//!
//! ```text
//! packed4.xy = foo[0];
//! packed4.zw = foo[1];
//! packed5.xy = foo[2];
//! packed5.zw = bar[0].xy;
//! packed6.x  = bar[0].z;
//! packed6.yzw = bar[1];
//! ```
//!
//! Output copies run after all of `main`, input copies before it.
//!
//! Geometry shader inputs carry an outer per-vertex dimension. It is kept
//! out of the slot layout: each `packed<N>` becomes an array of vec4s with
//! one entry per vertex, and every vertex is copied separately, e.g.
//! `n[1] = packed32[1].yzw`.

use alloc::{collections::BTreeMap, format, string::String};

use log::{debug, trace};
use lpc_glir::{
    BaseType, Constant, Inst, List, Node, Shader, ShaderStage, SwizzleMask, Type, Var,
    VariableData, VariableMode,
};

use crate::error::{InternalFault, LinkResult};

/// Whether a varying of this type has to be packed: false only when its
/// element is already four components wide.
pub fn needs_lowering(ty: &Type) -> bool {
    let element = ty.element_type().unwrap_or(ty);
    element.vector_elements() != 4
}

/// Type of one vertex's value of a variable; only differs from `ty` for
/// per-vertex arrays.
fn vertex_type(ty: &Type, per_vertex: bool) -> &Type {
    match ty {
        Type::Array(element, _) if per_vertex => &**element,
        ty => ty,
    }
}

/// Rewrite every `mode` variable placed at or above `generic_base` (within
/// the `slots_used` generic slots) into packed vec4 accesses.
pub fn lower_packed_varyings(
    shader: &mut Shader,
    mode: VariableMode,
    generic_base: u32,
    slots_used: u32,
) -> LinkResult<()> {
    debug_assert!(matches!(mode, VariableMode::ShaderIn | VariableMode::ShaderOut));
    let generic = generic_base..generic_base.saturating_add(slots_used);
    let per_vertex = shader.stage == ShaderStage::Geometry && mode == VariableMode::ShaderIn;
    let targets: alloc::vec::Vec<(Var, Inst)> = shader
        .layout
        .iter(shader.toplevel)
        .filter_map(|inst| {
            let var = shader.insts[inst].as_declare()?;
            let data = &shader.vars[var];
            let location = data.location?;
            (data.mode == mode
                && generic.contains(&location)
                && needs_lowering(vertex_type(&data.ty, per_vertex)))
                .then_some((var, inst))
        })
        .collect();
    if targets.is_empty() {
        return Ok(());
    }
    let main = shader.main_body().ok_or(InternalFault::MissingMain)?;

    let block = shader.make_list();
    let mut lowering = PackedLowering {
        shader: &mut *shader,
        mode,
        per_vertex,
        vertices: None,
        block,
        packed: BTreeMap::new(),
    };
    for (var, decl) in targets {
        lowering.lower_variable(var, decl)?;
    }

    if mode == VariableMode::ShaderOut {
        shader.layout.splice_back(main, block);
    } else {
        shader.layout.splice_front(main, block);
    }
    Ok(())
}

struct PackedLowering<'a> {
    shader: &'a mut Shader,
    mode: VariableMode,
    /// Variables have an outer per-vertex dimension (geometry inputs)
    per_vertex: bool,
    /// Vertex count of the variable being lowered, when `per_vertex`
    vertices: Option<u32>,
    /// Generated copies, in generation order
    block: List,
    /// Packed variable of each slot
    packed: BTreeMap<u32, Var>,
}

impl PackedLowering<'_> {
    fn lower_variable(&mut self, var: Var, decl: Inst) -> LinkResult<()> {
        let data = &self.shader.vars[var];
        if data.ty.contains_record() {
            return Err(InternalFault::RecordInPackedVarying {
                name: data.name.clone(),
            }
            .into());
        }
        let Some(fine_location) = data.fine_location() else {
            return Ok(());
        };
        let ty = data.ty.clone();
        trace!("packing {} at {}", data.name, fine_location);

        if !self.per_vertex {
            self.shader.vars[var].mode = VariableMode::Auto;
            let rvalue = self.shader.var_ref(var);
            self.lower_rvalue(rvalue, &ty, fine_location, None, var, decl)?;
            return Ok(());
        }

        let Type::Array(element, vertices) = &ty else {
            return Err(InternalFault::UnexpectedPackedType {
                name: data.name.clone(),
            }
            .into());
        };
        self.shader.vars[var].mode = VariableMode::Auto;
        self.vertices = Some(*vertices);
        for vertex in 0..*vertices {
            let array = self.shader.var_ref(var);
            let index = self.shader.constant(Constant::int(vertex as i32));
            let rvalue = self.shader.array_ref(array, index);
            self.lower_rvalue(rvalue, element, fine_location, Some(vertex), var, decl)?;
        }
        Ok(())
    }

    /// Emit copies between `rvalue` and the packed slots starting at
    /// `fine_location`, in entry `vertex` of per-vertex packed arrays.
    /// Returns the fine location following the value.
    fn lower_rvalue(
        &mut self,
        rvalue: Node,
        ty: &Type,
        fine_location: u32,
        vertex: Option<u32>,
        unpacked: Var,
        decl: Inst,
    ) -> LinkResult<u32> {
        if ty.is_array() || ty.is_matrix() {
            return self.lower_arraylike(rvalue, ty, fine_location, vertex, unpacked, decl);
        }

        let Some(base) = ty.base_type() else {
            return Err(InternalFault::UnexpectedPackedType {
                name: self.shader.vars[unpacked].name.clone(),
            }
            .into());
        };
        let components = ty.vector_elements();
        let location_frac = fine_location % 4;

        if location_frac + components > 4 {
            // Double parking: split across two slots.
            let left = 4 - location_frac;
            let right = components - left;
            let left_rvalue = self.shader.swizzle(rvalue, SwizzleMask::range(0, left));
            let right_value = self.shader.clone_node(rvalue);
            let right_rvalue = self.shader.swizzle(right_value, SwizzleMask::range(left, right));
            let fine_location = self.lower_rvalue(
                left_rvalue,
                &Type::vec(base, left),
                fine_location,
                vertex,
                unpacked,
                decl,
            )?;
            return self.lower_rvalue(
                right_rvalue,
                &Type::vec(base, right),
                fine_location,
                vertex,
                unpacked,
                decl,
            );
        }

        let packed = self.get_packed_varying(fine_location / 4, base, unpacked, decl)?;
        let mut packed_ref = self.shader.var_ref(packed);
        if let Some(vertex) = vertex {
            let index = self.shader.constant(Constant::int(vertex as i32));
            packed_ref = self.shader.array_ref(packed_ref, index);
        }
        let slot_rvalue = self
            .shader
            .swizzle(packed_ref, SwizzleMask::range(location_frac, components));
        let copy = match self.mode {
            VariableMode::ShaderOut => self.shader.assign(slot_rvalue, rvalue),
            _ => self.shader.assign(rvalue, slot_rvalue),
        };
        self.shader.layout.push_back(self.block, copy);
        Ok(fine_location + components)
    }

    /// Lower each array element or matrix column in turn.
    fn lower_arraylike(
        &mut self,
        rvalue: Node,
        ty: &Type,
        mut fine_location: u32,
        vertex: Option<u32>,
        unpacked: Var,
        decl: Inst,
    ) -> LinkResult<u32> {
        let (count, element) = match ty {
            Type::Array(element, length) => (*length, (**element).clone()),
            _ => (ty.matrix_columns(), ty.column_type().unwrap_or(Type::Void)),
        };
        for i in 0..count {
            let array = if i == 0 {
                rvalue
            } else {
                self.shader.clone_node(rvalue)
            };
            let index = self.shader.constant(Constant::int(i as i32));
            let element_rvalue = self.shader.array_ref(array, index);
            fine_location = self.lower_rvalue(
                element_rvalue,
                &element,
                fine_location,
                vertex,
                unpacked,
                decl,
            )?;
        }
        Ok(fine_location)
    }

    /// The packed variable of `slot`, created on first use right before the
    /// declaration of the variable being lowered. Per-vertex variables get
    /// one vec4 per vertex.
    fn get_packed_varying(
        &mut self,
        slot: u32,
        base: BaseType,
        unpacked: Var,
        decl: Inst,
    ) -> LinkResult<Var> {
        if let Some(&packed) = self.packed.get(&slot) {
            if self.shader.vars[packed].ty.array_len() != self.vertices {
                return Err(InternalFault::UnexpectedPackedType {
                    name: self.shader.vars[unpacked].name.clone(),
                }
                .into());
            }
            return Ok(packed);
        }
        let name: String = format!("packed{}", slot);
        let ty = match self.vertices {
            Some(vertices) => Type::array(Type::vec(base, 4), vertices),
            None => Type::vec(base, 4),
        };
        let mut data = VariableData::new(name, ty, self.mode).with_location(slot, 0);
        data.copy_qualifiers_from(&self.shader.vars[unpacked]);
        debug!("created {} for {}", data.name, self.shader.vars[unpacked].name);
        let packed = self.shader.add_var(data);
        let packed_decl = self.shader.declare(packed);
        let toplevel = self.shader.toplevel;
        self.shader.layout.insert_before(toplevel, packed_decl, decl);
        self.packed.insert(slot, packed);
        Ok(packed)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec::Vec};

    use lpc_glir::{parse_shader, InstData, NodeData};

    use super::*;
    use crate::error::LinkError;

    fn main_copies(shader: &Shader) -> Vec<String> {
        let body = shader.main_body().unwrap();
        shader
            .layout
            .iter(body)
            .filter_map(|inst| match shader.insts[inst] {
                InstData::Assign { lhs, rhs } => Some(format!(
                    "{} = {}",
                    shader.node_to_string(lhs),
                    shader.node_to_string(rhs)
                )),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_matrix_and_double_parked_vec3() {
        let mut shader = parse_shader(
            "shader vertex
            (declare (out location=4) mat3x2 foo)
            (declare (out location=5 frac=2) (array vec3 2) bar)
            (function main (parameters) ())",
        )
        .unwrap();
        lower_packed_varyings(&mut shader, VariableMode::ShaderOut, 4, 3).unwrap();
        assert_eq!(
            main_copies(&shader),
            [
                "(swiz xy (var_ref packed4)) = (array_ref (var_ref foo) (constant int (0)))",
                "(swiz zw (var_ref packed4)) = (array_ref (var_ref foo) (constant int (1)))",
                "(swiz xy (var_ref packed5)) = (array_ref (var_ref foo) (constant int (2)))",
                "(swiz zw (var_ref packed5)) = (swiz xy (array_ref (var_ref bar) (constant int (0))))",
                "(swiz x (var_ref packed6)) = (swiz z (array_ref (var_ref bar) (constant int (0))))",
                "(swiz yzw (var_ref packed6)) = (array_ref (var_ref bar) (constant int (1)))",
            ]
        );
        let packed: Vec<_> = shader
            .globals()
            .filter(|var| shader.vars[*var].mode == VariableMode::ShaderOut)
            .map(|var| {
                let data = &shader.vars[var];
                (data.name.clone(), data.location, data.ty.to_string())
            })
            .collect();
        assert_eq!(
            packed,
            [
                ("packed4".to_string(), Some(4), "vec4".to_string()),
                ("packed5".to_string(), Some(5), "vec4".to_string()),
                ("packed6".to_string(), Some(6), "vec4".to_string()),
            ]
        );
        assert!(shader.find_var("foo", VariableMode::Auto).is_some());
        assert!(parse_shader(&shader.to_string()).is_ok());
    }

    #[test]
    fn test_inputs_are_read_before_user_code() {
        let mut shader = parse_shader(
            "shader fragment
            (declare (in location=32 flat) ivec2 a)
            (declare (in location=32 frac=2 flat) int b)
            (declare (in location=33) vec4 whole)
            (declare (out location=4) vec4 color)
            (function main (parameters) (
              (assign (var_ref color) (var_ref whole))
            ))",
        )
        .unwrap();
        lower_packed_varyings(&mut shader, VariableMode::ShaderIn, 32, 2).unwrap();
        assert_eq!(
            main_copies(&shader),
            [
                "(var_ref a) = (swiz xy (var_ref packed32))",
                "(var_ref b) = (swiz z (var_ref packed32))",
                "(var_ref color) = (var_ref whole)",
            ]
        );
        let packed = shader.find_var("packed32", VariableMode::ShaderIn).unwrap();
        let data = &shader.vars[packed];
        assert_eq!(data.ty, Type::vec(BaseType::Int, 4));
        assert_eq!(data.interpolation, lpc_glir::InterpQualifier::Flat);
        // vec4 inputs stay as they are
        assert!(shader.find_var("whole", VariableMode::ShaderIn).is_some());
    }

    #[test]
    fn test_geometry_inputs_pack_per_vertex() {
        let mut shader = parse_shader(
            "shader geometry
            (declare (in location=32 frac=1) (array vec3 3) n)
            (declare (in location=32) (array float 3) f)
            (declare (in location=33) (array vec4 3) whole)
            (declare (out location=32) vec4 o)
            (function main (parameters) ())",
        )
        .unwrap();
        lower_packed_varyings(&mut shader, VariableMode::ShaderIn, 32, 2).unwrap();
        let copies = main_copies(&shader);
        let mut expected = Vec::new();
        for v in 0..3 {
            expected.push(format!(
                "(array_ref (var_ref n) (constant int ({v}))) = (swiz yzw (array_ref (var_ref packed32) (constant int ({v}))))"
            ));
        }
        for v in 0..3 {
            expected.push(format!(
                "(array_ref (var_ref f) (constant int ({v}))) = (swiz x (array_ref (var_ref packed32) (constant int ({v}))))"
            ));
        }
        assert_eq!(copies, expected);

        let packed: Vec<_> = shader
            .globals()
            .filter(|var| shader.vars[*var].mode == VariableMode::ShaderIn)
            .map(|var| {
                let data = &shader.vars[var];
                (data.name.clone(), data.location, data.ty.to_string())
            })
            .collect();
        assert_eq!(
            packed,
            [
                ("packed32".to_string(), Some(32), "(array vec4 3)".to_string()),
                ("whole".to_string(), Some(33), "(array vec4 3)".to_string()),
            ]
        );
        assert!(parse_shader(&shader.to_string()).is_ok());
    }

    #[test]
    fn test_geometry_input_without_vertex_dimension_is_a_fault() {
        let mut shader = parse_shader(
            "shader geometry
            (declare (in location=32) vec3 n)
            (function main (parameters) ())",
        )
        .unwrap();
        assert_eq!(
            lower_packed_varyings(&mut shader, VariableMode::ShaderIn, 32, 1),
            Err(LinkError::Internal(InternalFault::UnexpectedPackedType {
                name: "n".to_string()
            }))
        );
    }

    #[test]
    fn test_builtins_below_generic_base_are_skipped() {
        let mut shader = parse_shader(
            "shader vertex
            (declare (out location=1) float gl_PointSize)
            (function main (parameters) ())",
        )
        .unwrap();
        lower_packed_varyings(&mut shader, VariableMode::ShaderOut, 32, 0).unwrap();
        assert!(shader.find_var("gl_PointSize", VariableMode::ShaderOut).is_some());
    }

    #[test]
    fn test_struct_reaching_packing_is_a_fault() {
        let mut shader = parse_shader(
            "shader vertex
            (struct S (float a))
            (declare (out location=32) S s)
            (function main (parameters) ())",
        )
        .unwrap();
        assert_eq!(
            lower_packed_varyings(&mut shader, VariableMode::ShaderOut, 32, 1),
            Err(LinkError::Internal(InternalFault::RecordInPackedVarying {
                name: "s".to_string()
            }))
        );
    }

    #[test]
    fn test_needs_lowering() {
        assert!(!needs_lowering(&Type::vec(BaseType::Float, 4)));
        assert!(!needs_lowering(&Type::array(Type::vec(BaseType::Uint, 4), 3)));
        assert!(!needs_lowering(&Type::mat(2, 4)));
        assert!(needs_lowering(&Type::mat(4, 3)));
        assert!(needs_lowering(&Type::array(Type::FLOAT, 4)));
    }

    #[test]
    fn test_packed_swizzles_stay_within_slot() {
        let mut shader = parse_shader(
            "shader vertex
            (declare (out location=32 frac=3) (array vec2 2) v)
            (function main (parameters) ())",
        )
        .unwrap();
        lower_packed_varyings(&mut shader, VariableMode::ShaderOut, 32, 2).unwrap();
        let body = shader.main_body().unwrap();
        for inst in shader.layout.iter(body) {
            let InstData::Assign { lhs, .. } = shader.insts[inst] else {
                continue;
            };
            let NodeData::Swizzle { mask, .. } = &shader.nodes[lhs] else {
                panic!("packed store without swizzle");
            };
            assert!(mask.components().all(|c| c < 4));
        }
        assert_eq!(main_copies(&shader).len(), 3);
    }
}
