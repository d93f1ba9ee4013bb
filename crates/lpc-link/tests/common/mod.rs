//! Reference interpreter for the statement subset the lowering passes
//! generate. Every component is stored as an `f64`; integer and boolean
//! values are exact in that representation.

#![allow(dead_code)]

use std::collections::HashMap;

use lpc_glir::{
    BaseType, ConstScalar, ExprOp, InstData, List, Node, NodeData, Shader, Type, Var,
    VariableMode,
};

const MAX_LOOP_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return,
}

/// Variable storage of one shader invocation.
pub struct Interpreter<'a> {
    shader: &'a Shader,
    memory: HashMap<Var, Vec<f64>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(shader: &'a Shader) -> Self {
        Self {
            shader,
            memory: HashMap::new(),
        }
    }

    fn storage(&mut self, var: Var) -> &mut Vec<f64> {
        let slots = self.shader.vars[var].ty.component_slots() as usize;
        self.memory.entry(var).or_insert_with(|| vec![0.0; slots])
    }

    pub fn get(&mut self, var: Var) -> Vec<f64> {
        self.storage(var).clone()
    }

    pub fn set(&mut self, var: Var, values: &[f64]) {
        let storage = self.storage(var);
        assert_eq!(storage.len(), values.len(), "value size mismatch");
        storage.copy_from_slice(values);
    }

    /// Value of the global `name` (any mode).
    pub fn get_named(&mut self, name: &str) -> Vec<f64> {
        let var = self
            .shader
            .globals()
            .find(|var| self.shader.vars[*var].name == name)
            .unwrap_or_else(|| panic!("no global named {}", name));
        self.get(var)
    }

    /// Values of every interface variable of `mode`, keyed by location.
    pub fn interface_by_location(&mut self, mode: VariableMode) -> HashMap<u32, Vec<f64>> {
        let vars: Vec<Var> = self
            .shader
            .globals()
            .filter(|var| self.shader.vars[*var].mode == mode)
            .collect();
        vars.into_iter()
            .filter_map(|var| {
                let location = self.shader.vars[var].location?;
                Some((location, self.get(var)))
            })
            .collect()
    }

    /// Store `values` into the interface variables of `mode`, by location.
    pub fn load_by_location(&mut self, mode: VariableMode, values: &HashMap<u32, Vec<f64>>) {
        let vars: Vec<Var> = self
            .shader
            .globals()
            .filter(|var| self.shader.vars[*var].mode == mode)
            .collect();
        for var in vars {
            if let Some(value) = self.shader.vars[var].location.and_then(|l| values.get(&l)) {
                self.set(var, value);
            }
        }
    }

    /// Store one value per vertex into the per-vertex inputs of `mode`: each
    /// variable receives the values at its location, vertex after vertex.
    pub fn load_vertices(&mut self, mode: VariableMode, vertices: &[HashMap<u32, Vec<f64>>]) {
        let vars: Vec<Var> = self
            .shader
            .globals()
            .filter(|var| self.shader.vars[*var].mode == mode)
            .collect();
        for var in vars {
            let Some(location) = self.shader.vars[var].location else {
                continue;
            };
            let values: Option<Vec<Vec<f64>>> = vertices
                .iter()
                .map(|vertex| vertex.get(&location).cloned())
                .collect();
            if let Some(values) = values {
                self.set(var, &values.concat());
            }
        }
    }

    pub fn run_main(&mut self) {
        let body = self.shader.main_body().expect("shader has a main function");
        self.exec_list(body);
    }

    fn exec_list(&mut self, list: List) -> Flow {
        let shader = self.shader;
        for inst in shader.layout.iter(list) {
            let flow = self.exec_inst(inst);
            if flow != Flow::Normal {
                return flow;
            }
        }
        Flow::Normal
    }

    fn exec_inst(&mut self, inst: lpc_glir::Inst) -> Flow {
        let shader = self.shader;
        match &shader.insts[inst] {
            InstData::Declare(var) => {
                self.storage(*var);
                Flow::Normal
            }
            InstData::Assign { lhs, rhs } => {
                let values = self.eval(*rhs);
                let (var, offsets) = self.address(*lhs);
                let storage = self.storage(var);
                assert_eq!(offsets.len(), values.len(), "assignment size mismatch");
                for (offset, value) in offsets.into_iter().zip(values) {
                    storage[offset] = value;
                }
                Flow::Normal
            }
            InstData::If {
                condition,
                then_list,
                else_list,
            } => {
                if self.eval(*condition)[0] != 0.0 {
                    self.exec_list(*then_list)
                } else {
                    self.exec_list(*else_list)
                }
            }
            InstData::Loop { body } => {
                for _ in 0..MAX_LOOP_ITERATIONS {
                    match self.exec_list(*body) {
                        Flow::Break => return Flow::Normal,
                        Flow::Return => return Flow::Return,
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                panic!("loop did not terminate");
            }
            InstData::Break => Flow::Break,
            InstData::Continue => Flow::Continue,
            InstData::Return => Flow::Return,
            InstData::Discard { .. } | InstData::Function { .. } => Flow::Normal,
        }
    }

    /// Storage offsets selected by a dereference chain.
    fn address(&mut self, node: Node) -> (Var, Vec<usize>) {
        let shader = self.shader;
        match &shader.nodes[node] {
            NodeData::VarRef(var) => {
                let slots = self.shader.vars[*var].ty.component_slots() as usize;
                (*var, (0..slots).collect())
            }
            NodeData::ArrayRef { array, index } => {
                let (array, index) = (*array, *index);
                let element = self
                    .shader
                    .node_type(array)
                    .index_result()
                    .expect("indexable type");
                let size = element.component_slots() as usize;
                let i = self.eval(index)[0] as usize;
                let (var, offsets) = self.address(array);
                (var, offsets[i * size..(i + 1) * size].to_vec())
            }
            NodeData::RecordRef { record, field } => {
                let record = *record;
                let Type::Struct(st) = self.shader.node_type(record) else {
                    panic!("record_ref of a non-struct");
                };
                let mut start = 0;
                let mut size = 0;
                for f in &st.fields {
                    if &f.name == field {
                        size = f.ty.component_slots() as usize;
                        break;
                    }
                    start += f.ty.component_slots() as usize;
                }
                let (var, offsets) = self.address(record);
                (var, offsets[start..start + size].to_vec())
            }
            NodeData::Swizzle { value, mask } => {
                let components: Vec<u32> = mask.components().collect();
                let (var, offsets) = self.address(*value);
                (
                    var,
                    components.iter().map(|c| offsets[*c as usize]).collect(),
                )
            }
            NodeData::Constant(_) | NodeData::Expression { .. } => {
                panic!("not an lvalue")
            }
        }
    }

    pub fn eval(&mut self, node: Node) -> Vec<f64> {
        let shader = self.shader;
        match &shader.nodes[node] {
            NodeData::Constant(c) => c
                .values
                .iter()
                .map(|value| match value {
                    ConstScalar::Float(v) => *v as f64,
                    ConstScalar::Int(v) => *v as f64,
                    ConstScalar::Uint(v) => *v as f64,
                    ConstScalar::Bool(v) => *v as u8 as f64,
                })
                .collect(),
            NodeData::Expression { op, ty, operands } => {
                let (op, integer) = (*op, matches!(ty.base_type(), Some(BaseType::Int | BaseType::Uint)));
                let operands: Vec<Vec<f64>> = operands.iter().map(|n| self.eval(*n)).collect();
                eval_expression(op, integer, &operands)
            }
            _ => {
                let (var, offsets) = self.address(node);
                let storage = self.storage(var);
                offsets.into_iter().map(|o| storage[o]).collect()
            }
        }
    }
}

fn eval_expression(op: ExprOp, integer: bool, operands: &[Vec<f64>]) -> Vec<f64> {
    let unary = |f: fn(f64) -> f64| -> Vec<f64> { operands[0].iter().map(|v| f(*v)).collect() };
    let binary = |f: &dyn Fn(f64, f64) -> f64| -> Vec<f64> {
        let (a, b) = (&operands[0], &operands[1]);
        let len = a.len().max(b.len());
        (0..len)
            .map(|i| f(a[i.min(a.len() - 1)], b[i.min(b.len() - 1)]))
            .collect()
    };
    let truth = |b: bool| b as u8 as f64;
    match op {
        ExprOp::Neg => unary(|v| -v),
        ExprOp::Not => unary(|v| if v == 0.0 { 1.0 } else { 0.0 }),
        ExprOp::Dfdx | ExprOp::Dfdy | ExprOp::Fwidth => unary(|_| 0.0),
        ExprOp::I2f | ExprOp::U2i | ExprOp::I2u => unary(|v| v),
        ExprOp::F2i => unary(f64::trunc),
        ExprOp::Add => binary(&|a, b| a + b),
        ExprOp::Sub => binary(&|a, b| a - b),
        ExprOp::Mul => binary(&|a, b| a * b),
        ExprOp::Div if integer => binary(&|a, b| (a / b).trunc()),
        ExprOp::Div => binary(&|a, b| a / b),
        ExprOp::Mod => binary(&|a, b| a % b),
        ExprOp::Less => binary(&|a, b| truth(a < b)),
        ExprOp::Greater => binary(&|a, b| truth(a > b)),
        ExprOp::Lequal => binary(&|a, b| truth(a <= b)),
        ExprOp::Gequal => binary(&|a, b| truth(a >= b)),
        ExprOp::Equal => binary(&|a, b| truth(a == b)),
        ExprOp::Nequal => binary(&|a, b| truth(a != b)),
        ExprOp::LogicAnd => binary(&|a, b| truth(a != 0.0 && b != 0.0)),
        ExprOp::LogicOr => binary(&|a, b| truth(a != 0.0 || b != 0.0)),
    }
}

/// Run `producer`, hand its outputs to `consumer` slot by slot, and run
/// `consumer`. Returns both interpreters for inspection.
pub fn run_pipeline<'a>(
    producer: &'a Shader,
    consumer: &'a Shader,
) -> (Interpreter<'a>, Interpreter<'a>) {
    let mut out = Interpreter::new(producer);
    out.run_main();
    let written = out.interface_by_location(VariableMode::ShaderOut);
    let mut input = Interpreter::new(consumer);
    input.load_by_location(VariableMode::ShaderIn, &written);
    input.run_main();
    (out, input)
}
