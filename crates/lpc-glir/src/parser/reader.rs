//! Build a [`Shader`] from parsed s-expressions.
//!
//! Variables are referenced by name. Each statement list opens a scope;
//! lookups search from the innermost scope outwards.

use alloc::{
    collections::BTreeMap,
    format,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};

use super::{
    error::{parse_error, ParseError},
    sexp::Sexp,
};
use crate::{
    entity::{Inst, List, Node, Var},
    inst::InstData,
    node::{ConstScalar, Constant, ExprOp, NodeData, SwizzleMask},
    shader::{Shader, ShaderStage},
    types::{BaseType, StructField, StructType, Type},
    variable::{InterpQualifier, VariableData, VariableMode},
};

type ReadResult<T> = Result<T, ParseError>;

pub(crate) struct Reader {
    shader: Shader,
    scopes: Vec<BTreeMap<String, Var>>,
}

fn expect_list<'s, 'a>(sexp: &'s Sexp<'a>, what: &str) -> ReadResult<&'s [Sexp<'a>]> {
    sexp.as_list()
        .ok_or_else(|| parse_error(sexp.position(), &format!("expected {}", what)))
}

fn expect_atom<'a>(sexp: &Sexp<'a>, what: &str) -> ReadResult<&'a str> {
    sexp.as_atom()
        .ok_or_else(|| parse_error(sexp.position(), &format!("expected {}", what)))
}

fn expect_arity(items: &[Sexp<'_>], position: usize, count: usize, form: &str) -> ReadResult<()> {
    if items.len() != count {
        return Err(parse_error(
            position,
            &format!("'{}' takes {} operands, found {}", form, count - 1, items.len() - 1),
        ));
    }
    Ok(())
}

fn parse_number<T: core::str::FromStr>(sexp: &Sexp<'_>, what: &str) -> ReadResult<T> {
    let text = expect_atom(sexp, what)?;
    text.parse()
        .map_err(|_| parse_error(sexp.position(), &format!("invalid {} '{}'", what, text)))
}

impl Reader {
    pub(crate) fn new(stage: ShaderStage) -> Self {
        Self {
            shader: Shader::new(stage),
            scopes: alloc::vec![BTreeMap::new()],
        }
    }

    pub(crate) fn finish(self) -> Shader {
        self.shader
    }

    fn lookup(&self, name: &str) -> Option<Var> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn bind(&mut self, name: &str, var: Var) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), var);
        }
    }

    pub(crate) fn read_toplevel(&mut self, sexp: &Sexp<'_>) -> ReadResult<()> {
        let toplevel = self.shader.toplevel;
        match sexp.head() {
            Some("struct") => self.read_struct(sexp),
            Some("declare") => {
                let inst = self.read_declare(sexp)?;
                self.shader.layout.push_back(toplevel, inst);
                Ok(())
            }
            Some("function") => {
                let inst = self.read_function(sexp)?;
                self.shader.layout.push_back(toplevel, inst);
                Ok(())
            }
            _ => Err(parse_error(
                sexp.position(),
                "expected 'struct', 'declare' or 'function'",
            )),
        }
    }

    /// `(struct Name (type field)...)`
    fn read_struct(&mut self, sexp: &Sexp<'_>) -> ReadResult<()> {
        let items = expect_list(sexp, "struct")?;
        let name = items
            .get(1)
            .ok_or_else(|| parse_error(sexp.position(), "struct without a name"))
            .and_then(|s| expect_atom(s, "struct name"))?;
        let mut fields = Vec::new();
        for field in &items[2..] {
            let parts = expect_list(field, "struct field")?;
            expect_arity(parts, field.position(), 2, "field")?;
            let ty = self.read_type(&parts[0])?;
            let field_name = expect_atom(&parts[1], "field name")?;
            fields.push(StructField {
                name: field_name.to_string(),
                ty,
            });
        }
        self.shader.structs.push(Arc::new(StructType {
            name: name.to_string(),
            fields,
        }));
        Ok(())
    }

    fn read_type(&self, sexp: &Sexp<'_>) -> ReadResult<Type> {
        if let Some(items) = sexp.as_list() {
            if sexp.head() != Some("array") {
                return Err(parse_error(sexp.position(), "expected type"));
            }
            expect_arity(items, sexp.position(), 3, "array")?;
            let element = self.read_type(&items[1])?;
            let length: u32 = parse_number(&items[2], "array length")?;
            return Ok(Type::array(element, length));
        }

        let name = expect_atom(sexp, "type")?;
        if let Some(st) = self.shader.structs.iter().find(|st| st.name == name) {
            return Ok(Type::Struct(st.clone()));
        }
        parse_builtin_type(name)
            .ok_or_else(|| parse_error(sexp.position(), &format!("unknown type '{}'", name)))
    }

    /// `(declare (qualifiers...) type name)`
    fn read_declare(&mut self, sexp: &Sexp<'_>) -> ReadResult<Inst> {
        let items = expect_list(sexp, "declaration")?;
        expect_arity(items, sexp.position(), 4, "declare")?;
        let ty = self.read_type(&items[2])?;
        let name = expect_atom(&items[3], "variable name")?;
        let mut data = VariableData::new(name, ty, VariableMode::Auto);

        for qualifier in expect_list(&items[1], "qualifier list")? {
            let word = expect_atom(qualifier, "qualifier")?;
            let bad = || parse_error(qualifier.position(), &format!("bad qualifier '{}'", word));
            if let Some(mode) = VariableMode::from_keyword(word) {
                data.mode = mode;
            } else if let Some(interp) = InterpQualifier::from_keyword(word) {
                data.interpolation = interp;
            } else if word == "centroid" {
                data.centroid = true;
            } else if word == "invariant" {
                data.invariant = true;
            } else if let Some((key, value)) = word.split_once('=') {
                let value: u32 = value.parse().map_err(|_| bad())?;
                match key {
                    "location" => data.location = Some(value),
                    "frac" if value < 4 => data.location_frac = value,
                    "index" => data.index = value,
                    _ => return Err(bad()),
                }
            } else {
                return Err(bad());
            }
        }

        let var = self.shader.add_var(data);
        self.bind(name, var);
        Ok(self.shader.declare(var))
    }

    /// `(function name (parameters (declare ...)...) (statements...))`
    fn read_function(&mut self, sexp: &Sexp<'_>) -> ReadResult<Inst> {
        let items = expect_list(sexp, "function")?;
        expect_arity(items, sexp.position(), 4, "function")?;
        let name = expect_atom(&items[1], "function name")?;
        if items[2].head() != Some("parameters") {
            return Err(parse_error(items[2].position(), "expected (parameters ...)"));
        }

        self.scopes.push(BTreeMap::new());
        let params = self.shader.make_list();
        let param_items = expect_list(&items[2], "parameters")?;
        for param in &param_items[1..] {
            let inst = self.read_declare(param)?;
            self.shader.layout.push_back(params, inst);
        }
        let body = self.read_list(&items[3])?;
        self.scopes.pop();

        Ok(self.shader.add_inst(InstData::Function {
            name: name.to_string(),
            params,
            body,
        }))
    }

    fn read_list(&mut self, sexp: &Sexp<'_>) -> ReadResult<List> {
        let items = expect_list(sexp, "statement list")?;
        let list = self.shader.make_list();
        self.scopes.push(BTreeMap::new());
        for item in items {
            let inst = self.read_inst(item)?;
            self.shader.layout.push_back(list, inst);
        }
        self.scopes.pop();
        Ok(list)
    }

    fn read_inst(&mut self, sexp: &Sexp<'_>) -> ReadResult<Inst> {
        let items = expect_list(sexp, "statement")?;
        let position = sexp.position();
        let data = match sexp.head() {
            Some("declare") => return self.read_declare(sexp),
            Some("assign") => {
                expect_arity(items, position, 3, "assign")?;
                let lhs = self.read_node(&items[1])?;
                let rhs = self.read_node(&items[2])?;
                InstData::Assign { lhs, rhs }
            }
            Some("if") => {
                expect_arity(items, position, 4, "if")?;
                let condition = self.read_node(&items[1])?;
                let then_list = self.read_list(&items[2])?;
                let else_list = self.read_list(&items[3])?;
                InstData::If {
                    condition,
                    then_list,
                    else_list,
                }
            }
            Some("loop") => {
                expect_arity(items, position, 2, "loop")?;
                InstData::Loop {
                    body: self.read_list(&items[1])?,
                }
            }
            Some("break") => InstData::Break,
            Some("continue") => InstData::Continue,
            Some("return") => InstData::Return,
            Some("discard") => InstData::Discard {
                condition: match items.get(1) {
                    Some(condition) => Some(self.read_node(condition)?),
                    None => None,
                },
            },
            _ => return Err(parse_error(position, "unknown statement")),
        };
        Ok(self.shader.add_inst(data))
    }

    fn read_node(&mut self, sexp: &Sexp<'_>) -> ReadResult<Node> {
        let items = expect_list(sexp, "rvalue")?;
        let position = sexp.position();
        let data = match sexp.head() {
            Some("var_ref") => {
                expect_arity(items, position, 2, "var_ref")?;
                let name = expect_atom(&items[1], "variable name")?;
                let var = self.lookup(name).ok_or_else(|| {
                    parse_error(items[1].position(), &format!("undeclared variable '{}'", name))
                })?;
                NodeData::VarRef(var)
            }
            Some("array_ref") => {
                expect_arity(items, position, 3, "array_ref")?;
                NodeData::ArrayRef {
                    array: self.read_node(&items[1])?,
                    index: self.read_node(&items[2])?,
                }
            }
            Some("record_ref") => {
                expect_arity(items, position, 3, "record_ref")?;
                NodeData::RecordRef {
                    record: self.read_node(&items[1])?,
                    field: expect_atom(&items[2], "field name")?.to_string(),
                }
            }
            Some("swiz") => {
                expect_arity(items, position, 3, "swiz")?;
                let text = expect_atom(&items[1], "swizzle")?;
                let mask = SwizzleMask::parse(text).ok_or_else(|| {
                    parse_error(items[1].position(), &format!("bad swizzle '{}'", text))
                })?;
                NodeData::Swizzle {
                    value: self.read_node(&items[2])?,
                    mask,
                }
            }
            Some("constant") => {
                expect_arity(items, position, 3, "constant")?;
                NodeData::Constant(self.read_constant(&items[1], &items[2])?)
            }
            Some("expression") => {
                if items.len() < 3 {
                    return Err(parse_error(position, "expression without operator"));
                }
                let ty = self.read_type(&items[1])?;
                let symbol = expect_atom(&items[2], "operator")?;
                let op = ExprOp::from_symbol(symbol).ok_or_else(|| {
                    parse_error(items[2].position(), &format!("unknown operator '{}'", symbol))
                })?;
                expect_arity(items, position, 3 + op.operand_count(), symbol)?;
                let operands = items[3..]
                    .iter()
                    .map(|operand| self.read_node(operand))
                    .collect::<ReadResult<Vec<_>>>()?;
                NodeData::Expression { op, ty, operands }
            }
            _ => return Err(parse_error(position, "unknown rvalue")),
        };
        Ok(self.shader.add_node(data))
    }

    /// `(constant type (v0 v1 ...))`
    fn read_constant(&self, ty_sexp: &Sexp<'_>, values: &Sexp<'_>) -> ReadResult<Constant> {
        let ty = self.read_type(ty_sexp)?;
        let base = match (&ty, ty.base_type()) {
            (Type::Scalar(_) | Type::Vector(..) | Type::Matrix { .. }, Some(base)) => base,
            _ => return Err(parse_error(ty_sexp.position(), "constants must be numeric")),
        };
        let items = expect_list(values, "constant values")?;
        if items.len() as u32 != ty.component_slots() {
            return Err(parse_error(
                values.position(),
                &format!("{} needs {} values", ty, ty.component_slots()),
            ));
        }
        let values = items
            .iter()
            .map(|item| -> ReadResult<ConstScalar> {
                Ok(match base {
                    BaseType::Float => ConstScalar::Float(parse_number(item, "float")?),
                    BaseType::Int => ConstScalar::Int(parse_number(item, "int")?),
                    BaseType::Uint => ConstScalar::Uint(parse_number(item, "uint")?),
                    BaseType::Bool => ConstScalar::Bool(parse_number(item, "bool")?),
                })
            })
            .collect::<ReadResult<Vec<_>>>()?;
        Ok(Constant { ty, values })
    }
}

/// Built-in type names: `void`, scalars, `[iub]vecN`, `matN`, `matNxM`.
fn parse_builtin_type(name: &str) -> Option<Type> {
    let base = match name {
        "void" => return Some(Type::Void),
        "float" => return Some(Type::FLOAT),
        "int" => return Some(Type::INT),
        "uint" => return Some(Type::UINT),
        "bool" => return Some(Type::BOOL),
        _ => name,
    };

    if let Some(dims) = base.strip_prefix("mat") {
        let (columns, rows) = match dims.split_once('x') {
            Some((c, r)) => (c.parse().ok()?, r.parse().ok()?),
            None => {
                let n: u32 = dims.parse().ok()?;
                (n, n)
            }
        };
        return ((2..=4).contains(&columns) && (2..=4).contains(&rows))
            .then(|| Type::mat(columns, rows));
    }

    let (base_type, rest) = match base.as_bytes().first()? {
        b'i' => (BaseType::Int, &base[1..]),
        b'u' => (BaseType::Uint, &base[1..]),
        b'b' => (BaseType::Bool, &base[1..]),
        _ => (BaseType::Float, base),
    };
    let n: u32 = rest.strip_prefix("vec")?.parse().ok()?;
    (2..=4).contains(&n).then(|| Type::vec(base_type, n))
}
