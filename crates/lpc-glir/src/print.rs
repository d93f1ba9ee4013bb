//! Text form printer.
//!
//! The output is accepted by [`parse_shader`](crate::parse_shader); printing
//! then re-parsing yields an equivalent shader.

use alloc::string::String;
use core::fmt::{self, Write};

use crate::{
    entity::{Inst, List, Node, Var},
    inst::InstData,
    node::NodeData,
    shader::Shader,
};

impl fmt::Display for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "shader {}", self.stage)?;
        for st in &self.structs {
            write!(f, "(struct {}", st.name)?;
            for field in &st.fields {
                write!(f, " ({} {})", field.ty, field.name)?;
            }
            writeln!(f, ")")?;
        }
        for inst in self.layout.iter(self.toplevel) {
            self.write_inst(f, inst, 0)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Shader {
    /// Print a single rvalue.
    pub fn node_to_string(&self, node: Node) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_node(&mut out, node);
        out
    }

    /// Declaration qualifiers, e.g. `(out location=4 frac=2 centroid flat)`.
    fn write_qualifiers<W: Write>(&self, w: &mut W, var: Var) -> fmt::Result {
        let data = &self.vars[var];
        let mut words = 0;
        let mut word = |w: &mut W, args: fmt::Arguments<'_>| -> fmt::Result {
            if words > 0 {
                w.write_char(' ')?;
            }
            words += 1;
            w.write_fmt(args)
        };

        w.write_char('(')?;
        if let Some(keyword) = data.mode.keyword() {
            word(w, format_args!("{}", keyword))?;
        }
        if let Some(location) = data.location {
            word(w, format_args!("location={}", location))?;
            if data.location_frac != 0 {
                word(w, format_args!("frac={}", data.location_frac))?;
            }
        }
        if data.index != 0 {
            word(w, format_args!("index={}", data.index))?;
        }
        if data.centroid {
            word(w, format_args!("centroid"))?;
        }
        if data.invariant {
            word(w, format_args!("invariant"))?;
        }
        if let Some(keyword) = data.interpolation.keyword() {
            word(w, format_args!("{}", keyword))?;
        }
        w.write_char(')')
    }

    fn write_list<W: Write>(&self, w: &mut W, list: List, depth: usize) -> fmt::Result {
        if self.layout.is_empty(list) {
            return w.write_str("()");
        }
        w.write_str("(\n")?;
        for inst in self.layout.iter(list) {
            write_indent(w, depth + 1)?;
            self.write_inst(w, inst, depth + 1)?;
            w.write_char('\n')?;
        }
        write_indent(w, depth)?;
        w.write_char(')')
    }

    fn write_inst<W: Write>(&self, w: &mut W, inst: Inst, depth: usize) -> fmt::Result {
        match &self.insts[inst] {
            InstData::Declare(var) => {
                w.write_str("(declare ")?;
                self.write_qualifiers(w, *var)?;
                let data = &self.vars[*var];
                write!(w, " {} {})", data.ty, data.name)
            }
            InstData::Assign { lhs, rhs } => {
                w.write_str("(assign ")?;
                self.write_node(w, *lhs)?;
                w.write_char(' ')?;
                self.write_node(w, *rhs)?;
                w.write_char(')')
            }
            InstData::If {
                condition,
                then_list,
                else_list,
            } => {
                w.write_str("(if ")?;
                self.write_node(w, *condition)?;
                w.write_char(' ')?;
                self.write_list(w, *then_list, depth)?;
                w.write_char(' ')?;
                self.write_list(w, *else_list, depth)?;
                w.write_char(')')
            }
            InstData::Loop { body } => {
                w.write_str("(loop ")?;
                self.write_list(w, *body, depth)?;
                w.write_char(')')
            }
            InstData::Break => w.write_str("(break)"),
            InstData::Continue => w.write_str("(continue)"),
            InstData::Return => w.write_str("(return)"),
            InstData::Discard { condition: None } => w.write_str("(discard)"),
            InstData::Discard {
                condition: Some(condition),
            } => {
                w.write_str("(discard ")?;
                self.write_node(w, *condition)?;
                w.write_char(')')
            }
            InstData::Function { name, params, body } => {
                write!(w, "(function {} (parameters", name)?;
                for param in self.layout.iter(*params) {
                    w.write_char(' ')?;
                    self.write_inst(w, param, depth)?;
                }
                w.write_str(") ")?;
                self.write_list(w, *body, depth)?;
                w.write_char(')')
            }
        }
    }

    fn write_node<W: Write>(&self, w: &mut W, node: Node) -> fmt::Result {
        match &self.nodes[node] {
            NodeData::VarRef(var) => write!(w, "(var_ref {})", self.vars[*var].name),
            NodeData::ArrayRef { array, index } => {
                w.write_str("(array_ref ")?;
                self.write_node(w, *array)?;
                w.write_char(' ')?;
                self.write_node(w, *index)?;
                w.write_char(')')
            }
            NodeData::RecordRef { record, field } => {
                w.write_str("(record_ref ")?;
                self.write_node(w, *record)?;
                write!(w, " {})", field)
            }
            NodeData::Swizzle { value, mask } => {
                write!(w, "(swiz {} ", mask)?;
                self.write_node(w, *value)?;
                w.write_char(')')
            }
            NodeData::Constant(c) => {
                write!(w, "(constant {} (", c.ty)?;
                for (i, value) in c.values.iter().enumerate() {
                    if i > 0 {
                        w.write_char(' ')?;
                    }
                    write!(w, "{}", value)?;
                }
                w.write_str("))")
            }
            NodeData::Expression { op, ty, operands } => {
                write!(w, "(expression {} {}", ty, op.symbol())?;
                for operand in operands {
                    w.write_char(' ')?;
                    self.write_node(w, *operand)?;
                }
                w.write_char(')')
            }
        }
    }
}

fn write_indent<W: Write>(w: &mut W, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        w.write_str("  ")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::ToString};

    use super::*;
    use crate::{
        node::{Constant, ExprOp, SwizzleMask},
        types::{BaseType, Type},
        variable::{InterpQualifier, VariableData, VariableMode},
        ShaderStage,
    };

    #[test]
    fn test_print_declaration_and_body() {
        let mut shader = Shader::new(ShaderStage::Vertex);
        let bar = shader.add_var(
            VariableData::new("bar", Type::vec(BaseType::Float, 3), VariableMode::ShaderOut)
                .with_location(4, 2)
                .with_centroid(true)
                .with_interpolation(InterpQualifier::Flat),
        );
        let decl = shader.declare(bar);
        shader.layout.push_back(shader.toplevel, decl);

        let params = shader.make_list();
        let body = shader.make_list();
        let main = shader.add_inst(InstData::Function {
            name: "main".to_string(),
            params,
            body,
        });
        shader.layout.push_back(shader.toplevel, main);

        let r = shader.var_ref(bar);
        let lhs = shader.swizzle(r, SwizzleMask::range(0, 2));
        let a = shader.constant(Constant::float(1.0));
        let b = shader.constant(Constant::float(0.5));
        let rhs = shader.expr(ExprOp::Add, Type::FLOAT, alloc::vec![a, b]);
        let assign = shader.assign(lhs, rhs);
        shader.layout.push_back(body, assign);

        assert_eq!(
            format!("{}", shader),
            "shader vertex\n\
             (declare (out location=4 frac=2 centroid flat) vec3 bar)\n\
             (function main (parameters) (\n  \
             (assign (swiz xy (var_ref bar)) (expression float + (constant float (1.0)) (constant float (0.5))))\n\
             ))\n"
        );
    }

    #[test]
    fn test_print_auto_declaration() {
        let mut shader = Shader::new(ShaderStage::Fragment);
        let t = shader.add_var(VariableData::new("t", Type::array(Type::FLOAT, 2), VariableMode::Auto));
        let decl = shader.declare(t);
        shader.layout.push_back(shader.toplevel, decl);
        assert_eq!(
            format!("{}", shader),
            "shader fragment\n(declare () (array float 2) t)\n"
        );
    }
}
