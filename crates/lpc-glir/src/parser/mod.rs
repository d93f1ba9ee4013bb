//! Parser for the s-expression text form.
//!
//! Parsing happens in two layers: nom turns the text into a generic
//! s-expression tree, then [`reader`] resolves names and types and builds
//! the [`Shader`].

mod error;
mod reader;
mod sexp;
mod whitespace;

use nom::{
    bytes::complete::tag,
    character::complete::{alpha1, space1},
    sequence::{preceded, tuple},
};

use error::{offset, parse_error};
pub use error::ParseError;
use reader::Reader;

use crate::shader::{Shader, ShaderStage};

/// Parse a shader from its text form.
///
/// The text starts with `shader <stage>` followed by struct declarations,
/// global declarations and functions. `;` starts a comment.
pub fn parse_shader(input: &str) -> Result<Shader, ParseError> {
    let header = tuple((
        whitespace::blank,
        tag("shader"),
        preceded(space1, alpha1),
    ))(input);
    let (rest, (_, _, stage_name)) = header.map_err(|_: nom::Err<nom::error::Error<&str>>| {
        parse_error(0, "expected 'shader <stage>' header")
    })?;
    let stage = ShaderStage::from_keyword(stage_name).ok_or_else(|| {
        parse_error(
            offset(input, rest) - stage_name.len(),
            &alloc::format!("unknown shader stage '{}'", stage_name),
        )
    })?;

    let (rest, items) = sexp::sexps(input, rest)
        .map_err(|_| parse_error(offset(input, rest), "malformed s-expression"))?;
    let (rest, ()) = whitespace::blank(rest)
        .map_err(|_| parse_error(offset(input, rest), "malformed comment"))?;
    if !rest.is_empty() {
        return Err(parse_error(
            offset(input, rest),
            &alloc::format!("unexpected input remaining: {}", rest.lines().next().unwrap_or(rest)),
        ));
    }

    let mut reader = Reader::new(stage);
    for item in &items {
        reader.read_toplevel(item)?;
    }
    Ok(reader.finish())
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;
    use crate::{inst::InstData, types::Type, variable::VariableMode};

    #[test]
    fn test_parse_header_and_declaration() {
        let shader = parse_shader(
            "shader fragment\n\
             (declare (in location=33 frac=1 centroid flat) vec2 uv)\n",
        )
        .unwrap();
        assert_eq!(shader.stage, ShaderStage::Fragment);
        let uv = shader.find_var("uv", VariableMode::ShaderIn).unwrap();
        let data = &shader.vars[uv];
        assert_eq!(data.location, Some(33));
        assert_eq!(data.location_frac, 1);
        assert!(data.centroid);
        assert_eq!(data.ty, Type::vec(crate::BaseType::Float, 2));
    }

    #[test]
    fn test_parse_struct_and_main() {
        let shader = parse_shader(
            "shader vertex\n\
             (struct Foo (float x) ((array float 3) y))\n\
             (declare (out) (array Foo 2) foo)\n\
             (function main (parameters) ((assign (record_ref (array_ref (var_ref foo) (constant int (1))) x) (constant float (1.0)))))\n",
        )
        .unwrap();
        assert_eq!(shader.structs.len(), 1);
        let body = shader.main_body().unwrap();
        let assign = shader.layout.first(body).unwrap();
        let InstData::Assign { lhs, .. } = shader.insts[assign] else {
            panic!("expected assignment");
        };
        assert_eq!(shader.node_type(lhs), Type::FLOAT);
    }

    #[test]
    fn test_scoping() {
        let shader = parse_shader(
            "shader vertex\n\
             (declare () float x)\n\
             (function main (parameters) (\n\
               (loop ((declare () int x) (assign (var_ref x) (constant int (1))) (break)))\n\
               (assign (var_ref x) (constant float (2.0)))\n\
             ))\n",
        )
        .unwrap();
        let body = shader.main_body().unwrap();
        let last = shader.layout.last(body).unwrap();
        let InstData::Assign { lhs, .. } = shader.insts[last] else {
            panic!("expected assignment");
        };
        assert_eq!(shader.node_type(lhs), Type::FLOAT);
    }

    #[test]
    fn test_errors() {
        let err = parse_shader("shader tessellation\n").unwrap_err();
        assert!(err.message.contains("unknown shader stage"));
        assert_eq!(err.position, 7);

        let err = parse_shader("shader vertex\n(function main (parameters) ((assign (var_ref y) (constant float (1.0)))))").unwrap_err();
        assert!(err.message.contains("undeclared variable 'y'"), "{}", err);

        let err = parse_shader("shader vertex\n(declare (out) vec7 v)").unwrap_err();
        assert!(format!("{}", err).contains("unknown type 'vec7'"));

        let err = parse_shader("shader vertex\n(declare (out) vec4 v))").unwrap_err();
        assert!(err.message.contains("unexpected input remaining"));
    }
}
