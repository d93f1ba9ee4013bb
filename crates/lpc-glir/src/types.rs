//! GLSL value types as seen by the linker.

use alloc::{boxed::Box, string::String, sync::Arc, vec::Vec};
use core::fmt;

/// Scalar base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseType {
    Float,
    Int,
    Uint,
    Bool,
}

impl BaseType {
    /// Prefix used by vector type names (`vec`, `ivec`, `uvec`, `bvec`).
    fn vector_prefix(self) -> &'static str {
        match self {
            BaseType::Float => "",
            BaseType::Int => "i",
            BaseType::Uint => "u",
            BaseType::Bool => "b",
        }
    }

    /// Name of the scalar type.
    pub fn scalar_name(self) -> &'static str {
        match self {
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Uint => "uint",
            BaseType::Bool => "bool",
        }
    }
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

/// A struct (record) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A type in the shader IR.
///
/// Matrices are always float and are stored column-major: a `mat3x2` has
/// three columns of `vec2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Scalar(BaseType),
    /// Vector with 2 to 4 components
    Vector(BaseType, u8),
    Matrix {
        columns: u8,
        rows: u8,
    },
    Array(Box<Type>, u32),
    Struct(Arc<StructType>),
}

impl Type {
    pub const FLOAT: Type = Type::Scalar(BaseType::Float);
    pub const INT: Type = Type::Scalar(BaseType::Int);
    pub const UINT: Type = Type::Scalar(BaseType::Uint);
    pub const BOOL: Type = Type::Scalar(BaseType::Bool);

    /// Scalar or vector of `base` with `components` elements.
    pub fn vec(base: BaseType, components: u32) -> Type {
        debug_assert!((1..=4).contains(&components));
        if components == 1 {
            Type::Scalar(base)
        } else {
            Type::Vector(base, components as u8)
        }
    }

    pub fn mat(columns: u32, rows: u32) -> Type {
        Type::Matrix {
            columns: columns as u8,
            rows: rows as u8,
        }
    }

    pub fn array(element: Type, length: u32) -> Type {
        Type::Array(Box::new(element), length)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Type::Matrix { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    /// Number of vector components: 1 for scalars, the row count for
    /// matrices, 0 for aggregates.
    pub fn vector_elements(&self) -> u32 {
        match self {
            Type::Scalar(_) => 1,
            Type::Vector(_, n) => *n as u32,
            Type::Matrix { rows, .. } => *rows as u32,
            Type::Void | Type::Array(..) | Type::Struct(_) => 0,
        }
    }

    /// Number of matrix columns: 1 for scalars and vectors, 0 for aggregates.
    pub fn matrix_columns(&self) -> u32 {
        match self {
            Type::Scalar(_) | Type::Vector(..) => 1,
            Type::Matrix { columns, .. } => *columns as u32,
            Type::Void | Type::Array(..) | Type::Struct(_) => 0,
        }
    }

    pub fn array_len(&self) -> Option<u32> {
        match self {
            Type::Array(_, len) => Some(*len),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(element, _) => Some(element),
            _ => None,
        }
    }

    /// Strip every array dimension.
    pub fn innermost_element(&self) -> &Type {
        let mut ty = self;
        while let Type::Array(element, _) = ty {
            ty = element;
        }
        ty
    }

    /// The vector type of one matrix column.
    pub fn column_type(&self) -> Option<Type> {
        match self {
            Type::Matrix { rows, .. } => Some(Type::vec(BaseType::Float, *rows as u32)),
            _ => None,
        }
    }

    /// Scalar base type; `None` for void and structs.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Type::Scalar(base) | Type::Vector(base, _) => Some(*base),
            Type::Matrix { .. } => Some(BaseType::Float),
            Type::Array(element, _) => element.base_type(),
            Type::Void | Type::Struct(_) => None,
        }
    }

    /// Total number of scalar components.
    pub fn component_slots(&self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Scalar(_) => 1,
            Type::Vector(_, n) => *n as u32,
            Type::Matrix { columns, rows } => *columns as u32 * *rows as u32,
            Type::Array(element, len) => element.component_slots() * len,
            Type::Struct(st) => st.fields.iter().map(|f| f.ty.component_slots()).sum(),
        }
    }

    /// Whether a struct appears anywhere in this type.
    pub fn contains_record(&self) -> bool {
        match self {
            Type::Struct(_) => true,
            Type::Array(element, _) => element.contains_record(),
            _ => false,
        }
    }

    /// Type of `self[index]`: array element, matrix column, or vector
    /// component.
    pub fn index_result(&self) -> Option<Type> {
        match self {
            Type::Array(element, _) => Some((**element).clone()),
            Type::Matrix { .. } => self.column_type(),
            Type::Vector(base, _) => Some(Type::Scalar(*base)),
            _ => None,
        }
    }

    /// Look up `field` in a struct type.
    pub fn field_type(&self, field: &str) -> Option<Type> {
        match self {
            Type::Struct(st) => st.field(field).map(|f| f.ty.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Scalar(base) => write!(f, "{}", base.scalar_name()),
            Type::Vector(base, n) => write!(f, "{}vec{}", base.vector_prefix(), n),
            Type::Matrix { columns, rows } if columns == rows => write!(f, "mat{}", columns),
            Type::Matrix { columns, rows } => write!(f, "mat{}x{}", columns, rows),
            Type::Array(element, len) => write!(f, "(array {} {})", element, len),
            Type::Struct(st) => write!(f, "{}", st.name),
        }
    }
}
