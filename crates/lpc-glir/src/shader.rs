//! The shader container and its builders.

use alloc::{string::String, sync::Arc, vec::Vec};
use core::fmt;

use crate::{
    entity::{Inst, List, Node, Var},
    entity_map::PrimaryMap,
    inst::InstData,
    layout::Layout,
    node::{Constant, ExprOp, NodeData, SwizzleMask},
    types::{StructType, Type},
    variable::{VariableData, VariableMode},
    visit::{walk_list, VisitAction, Visitor},
};

/// Pipeline stage of a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

impl ShaderStage {
    pub fn keyword(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "vertex" => Some(ShaderStage::Vertex),
            "geometry" => Some(ShaderStage::Geometry),
            "fragment" => Some(ShaderStage::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One compiled shader stage.
///
/// The shader owns every variable, node and statement it contains. Nothing
/// is freed individually: dropping the shader drops all of its IR at once.
/// Statements removed from a list simply become unreachable.
#[derive(Debug, Clone)]
pub struct Shader {
    pub stage: ShaderStage,
    /// Struct types in declaration order
    pub structs: Vec<Arc<StructType>>,
    pub vars: PrimaryMap<Var, VariableData>,
    pub nodes: PrimaryMap<Node, NodeData>,
    pub insts: PrimaryMap<Inst, InstData>,
    pub layout: Layout,
    /// Global declarations and functions
    pub toplevel: List,
}

impl Shader {
    pub fn new(stage: ShaderStage) -> Self {
        let mut layout = Layout::new();
        let toplevel = layout.make_list();
        Self {
            stage,
            structs: Vec::new(),
            vars: PrimaryMap::new(),
            nodes: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            layout,
            toplevel,
        }
    }

    pub fn add_var(&mut self, data: VariableData) -> Var {
        self.vars.push(data)
    }

    pub fn add_node(&mut self, data: NodeData) -> Node {
        self.nodes.push(data)
    }

    /// Allocate a statement. It is not placed in any list yet.
    pub fn add_inst(&mut self, data: InstData) -> Inst {
        let inst = self.insts.push(data);
        self.layout.ensure_inst(inst);
        inst
    }

    pub fn make_list(&mut self) -> List {
        self.layout.make_list()
    }

    pub fn var_ref(&mut self, var: Var) -> Node {
        self.add_node(NodeData::VarRef(var))
    }

    pub fn array_ref(&mut self, array: Node, index: Node) -> Node {
        self.add_node(NodeData::ArrayRef { array, index })
    }

    pub fn record_ref(&mut self, record: Node, field: impl Into<String>) -> Node {
        self.add_node(NodeData::RecordRef {
            record,
            field: field.into(),
        })
    }

    pub fn swizzle(&mut self, value: Node, mask: SwizzleMask) -> Node {
        self.add_node(NodeData::Swizzle { value, mask })
    }

    pub fn constant(&mut self, constant: Constant) -> Node {
        self.add_node(NodeData::Constant(constant))
    }

    pub fn expr(&mut self, op: ExprOp, ty: Type, operands: Vec<Node>) -> Node {
        debug_assert_eq!(op.operand_count(), operands.len());
        self.add_node(NodeData::Expression { op, ty, operands })
    }

    pub fn declare(&mut self, var: Var) -> Inst {
        self.add_inst(InstData::Declare(var))
    }

    pub fn assign(&mut self, lhs: Node, rhs: Node) -> Inst {
        self.add_inst(InstData::Assign { lhs, rhs })
    }

    /// Compute the type of an rvalue. Malformed dereferences yield `Void`.
    pub fn node_type(&self, node: Node) -> Type {
        match &self.nodes[node] {
            NodeData::VarRef(var) => self.vars[*var].ty.clone(),
            NodeData::ArrayRef { array, .. } => {
                self.node_type(*array).index_result().unwrap_or(Type::Void)
            }
            NodeData::RecordRef { record, field } => self
                .node_type(*record)
                .field_type(field)
                .unwrap_or(Type::Void),
            NodeData::Swizzle { value, mask } => match self.node_type(*value).base_type() {
                Some(base) => Type::vec(base, mask.len()),
                None => Type::Void,
            },
            NodeData::Constant(c) => c.ty.clone(),
            NodeData::Expression { ty, .. } => ty.clone(),
        }
    }

    /// Deep copy of an rvalue tree. Nodes are never shared between two
    /// parents, so every rewritten use gets its own copy.
    pub fn clone_node(&mut self, node: Node) -> Node {
        let data = self.nodes[node].clone();
        let cloned = match data {
            NodeData::VarRef(var) => NodeData::VarRef(var),
            NodeData::ArrayRef { array, index } => NodeData::ArrayRef {
                array: self.clone_node(array),
                index: self.clone_node(index),
            },
            NodeData::RecordRef { record, field } => NodeData::RecordRef {
                record: self.clone_node(record),
                field,
            },
            NodeData::Swizzle { value, mask } => NodeData::Swizzle {
                value: self.clone_node(value),
                mask,
            },
            NodeData::Constant(c) => NodeData::Constant(c),
            NodeData::Expression { op, ty, operands } => NodeData::Expression {
                op,
                ty,
                operands: operands.into_iter().map(|n| self.clone_node(n)).collect(),
            },
        };
        self.add_node(cloned)
    }

    /// The variable at the root of a dereference chain, if any.
    pub fn variable_referenced(&self, node: Node) -> Option<Var> {
        match &self.nodes[node] {
            NodeData::VarRef(var) => Some(*var),
            NodeData::ArrayRef { array, .. } => self.variable_referenced(*array),
            NodeData::RecordRef { record, .. } => self.variable_referenced(*record),
            NodeData::Swizzle { value, .. } => self.variable_referenced(*value),
            NodeData::Constant(_) | NodeData::Expression { .. } => None,
        }
    }

    pub fn find_function(&self, name: &str) -> Option<Inst> {
        self.layout.iter(self.toplevel).find(|inst| {
            matches!(&self.insts[*inst], InstData::Function { name: n, .. } if n == name)
        })
    }

    /// Body list of `main`.
    pub fn main_body(&self) -> Option<List> {
        match self.insts[self.find_function("main")?] {
            InstData::Function { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Global variables in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = Var> + '_ {
        self.layout
            .iter(self.toplevel)
            .filter_map(|inst| self.insts[inst].as_declare())
    }

    /// Globals whose mode places them in the stage interface.
    pub fn interface_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.globals()
            .filter(|var| self.vars[*var].mode.is_interface())
    }

    /// Find a global by name and mode.
    pub fn find_var(&self, name: &str, mode: VariableMode) -> Option<Var> {
        self.globals().find(|var| {
            let data = &self.vars[*var];
            data.mode == mode && data.name == name
        })
    }

    /// Top-level declaration statement of a global.
    pub fn declaration_of(&self, var: Var) -> Option<Inst> {
        self.layout
            .iter(self.toplevel)
            .find(|inst| self.insts[*inst].as_declare() == Some(var))
    }

    /// Whether any reachable code dereferences `var`.
    pub fn is_var_referenced(&self, var: Var) -> bool {
        struct FindRef {
            var: Var,
            found: bool,
        }

        impl Visitor for FindRef {
            fn enter_node(&mut self, shader: &Shader, node: Node) -> VisitAction {
                if shader.nodes[node].as_var_ref() == Some(self.var) {
                    self.found = true;
                    return VisitAction::Stop;
                }
                VisitAction::Continue
            }
        }

        let mut finder = FindRef { var, found: false };
        walk_list(self, self.toplevel, &mut finder);
        finder.found
    }
}
