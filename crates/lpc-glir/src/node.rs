//! Rvalue nodes.

use alloc::{string::String, vec::Vec};
use core::fmt;

use crate::{
    entity::{Node, Var},
    types::{BaseType, Type},
};

/// Expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprOp {
    Neg,
    Not,
    Dfdx,
    Dfdy,
    Fwidth,
    I2f,
    F2i,
    U2i,
    I2u,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    Greater,
    Lequal,
    Gequal,
    Equal,
    Nequal,
    LogicAnd,
    LogicOr,
}

impl ExprOp {
    const ALL: [ExprOp; 22] = [
        ExprOp::Neg,
        ExprOp::Not,
        ExprOp::Dfdx,
        ExprOp::Dfdy,
        ExprOp::Fwidth,
        ExprOp::I2f,
        ExprOp::F2i,
        ExprOp::U2i,
        ExprOp::I2u,
        ExprOp::Add,
        ExprOp::Sub,
        ExprOp::Mul,
        ExprOp::Div,
        ExprOp::Mod,
        ExprOp::Less,
        ExprOp::Greater,
        ExprOp::Lequal,
        ExprOp::Gequal,
        ExprOp::Equal,
        ExprOp::Nequal,
        ExprOp::LogicAnd,
        ExprOp::LogicOr,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            ExprOp::Neg => "neg",
            ExprOp::Not => "!",
            ExprOp::Dfdx => "dFdx",
            ExprOp::Dfdy => "dFdy",
            ExprOp::Fwidth => "fwidth",
            ExprOp::I2f => "i2f",
            ExprOp::F2i => "f2i",
            ExprOp::U2i => "u2i",
            ExprOp::I2u => "i2u",
            ExprOp::Add => "+",
            ExprOp::Sub => "-",
            ExprOp::Mul => "*",
            ExprOp::Div => "/",
            ExprOp::Mod => "%",
            ExprOp::Less => "<",
            ExprOp::Greater => ">",
            ExprOp::Lequal => "<=",
            ExprOp::Gequal => ">=",
            ExprOp::Equal => "==",
            ExprOp::Nequal => "!=",
            ExprOp::LogicAnd => "&&",
            ExprOp::LogicOr => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    pub fn operand_count(self) -> usize {
        match self {
            ExprOp::Neg
            | ExprOp::Not
            | ExprOp::Dfdx
            | ExprOp::Dfdy
            | ExprOp::Fwidth
            | ExprOp::I2f
            | ExprOp::F2i
            | ExprOp::U2i
            | ExprOp::I2u => 1,
            _ => 2,
        }
    }

    /// Screen-space derivative intrinsics.
    pub fn is_derivative(self) -> bool {
        matches!(self, ExprOp::Dfdx | ExprOp::Dfdy | ExprOp::Fwidth)
    }
}

/// Component selection of a swizzle, e.g. `.zw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwizzleMask {
    components: [u8; 4],
    count: u8,
}

impl SwizzleMask {
    /// Build a mask from component indices (each 0-3, at most four).
    pub fn new(components: &[u32]) -> Self {
        debug_assert!(!components.is_empty() && components.len() <= 4);
        let mut mask = [0u8; 4];
        for (slot, c) in mask.iter_mut().zip(components) {
            debug_assert!(*c < 4);
            *slot = *c as u8;
        }
        Self {
            components: mask,
            count: components.len() as u8,
        }
    }

    /// `count` consecutive components starting at `first`.
    pub fn range(first: u32, count: u32) -> Self {
        let mut comps = [0u32; 4];
        for (i, c) in comps.iter_mut().enumerate().take(count as usize) {
            *c = first + i as u32;
        }
        Self::new(&comps[..count as usize])
    }

    pub fn len(&self) -> u32 {
        self.count as u32
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn components(&self) -> impl Iterator<Item = u32> + '_ {
        self.components[..self.count as usize]
            .iter()
            .map(|c| *c as u32)
    }

    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() || text.len() > 4 {
            return None;
        }
        let mut comps = Vec::with_capacity(4);
        for ch in text.chars() {
            comps.push(match ch {
                'x' => 0,
                'y' => 1,
                'z' => 2,
                'w' => 3,
                _ => return None,
            });
        }
        Some(Self::new(&comps))
    }
}

impl fmt::Display for SwizzleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.components() {
            let ch = ['x', 'y', 'z', 'w'][c as usize];
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

/// One scalar constant component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstScalar {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
}

impl ConstScalar {
    /// Integer value when this component can index an array.
    pub fn as_index(self) -> Option<i64> {
        match self {
            ConstScalar::Int(v) => Some(v as i64),
            ConstScalar::Uint(v) => Some(v as i64),
            ConstScalar::Float(_) | ConstScalar::Bool(_) => None,
        }
    }
}

impl fmt::Display for ConstScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstScalar::Float(v) if *v == (*v as i64) as f32 => write!(f, "{:.1}", v),
            ConstScalar::Float(v) => write!(f, "{}", v),
            ConstScalar::Int(v) => write!(f, "{}", v),
            ConstScalar::Uint(v) => write!(f, "{}", v),
            ConstScalar::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A constant value of scalar, vector or matrix type.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: Type,
    pub values: Vec<ConstScalar>,
}

impl Constant {
    pub fn int(value: i32) -> Self {
        Self {
            ty: Type::INT,
            values: alloc::vec![ConstScalar::Int(value)],
        }
    }

    pub fn uint(value: u32) -> Self {
        Self {
            ty: Type::UINT,
            values: alloc::vec![ConstScalar::Uint(value)],
        }
    }

    pub fn float(value: f32) -> Self {
        Self {
            ty: Type::FLOAT,
            values: alloc::vec![ConstScalar::Float(value)],
        }
    }

    /// The constant as an array index, if it is a scalar integer.
    pub fn as_index(&self) -> Option<i64> {
        match (&self.ty, self.values.as_slice()) {
            (Type::Scalar(BaseType::Int | BaseType::Uint), [value]) => value.as_index(),
            _ => None,
        }
    }
}

/// An rvalue.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    VarRef(Var),
    /// `array[index]`; also selects matrix columns and vector components
    ArrayRef {
        array: Node,
        index: Node,
    },
    RecordRef {
        record: Node,
        field: String,
    },
    Swizzle {
        value: Node,
        mask: SwizzleMask,
    },
    Constant(Constant),
    Expression {
        op: ExprOp,
        ty: Type,
        operands: Vec<Node>,
    },
}

impl NodeData {
    /// Whether this node is a dereference (valid assignment target root).
    pub fn is_dereference(&self) -> bool {
        matches!(
            self,
            NodeData::VarRef(_) | NodeData::ArrayRef { .. } | NodeData::RecordRef { .. }
        )
    }

    pub fn as_var_ref(&self) -> Option<Var> {
        match self {
            NodeData::VarRef(var) => Some(*var),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            NodeData::Constant(c) => Some(c),
            _ => None,
        }
    }
}
