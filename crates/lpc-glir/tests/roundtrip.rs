//! Printing a parsed shader and parsing it again gives the same text.

use lpc_glir::{parse_shader, InstData, ShaderStage, VariableMode};

const VERTEX: &str = "\
shader vertex
(struct Light (vec3 color) ((array float 2) falloff))
(declare (out location=4 centroid flat) mat3x2 foo)
(declare (out location=5 frac=2 invariant noperspective) (array vec3 2) bar)
(declare (out) (array Light 3) lights)
(declare (uniform) int n)
(declare (sysval location=0) int gl_VertexID)
(function main (parameters) (
  (declare () int i)
  (assign (var_ref i) (constant int (0)))
  (loop (
    (if (expression bool >= (var_ref i) (var_ref n)) (
      (break)
    ) ())
    (assign (record_ref (array_ref (var_ref lights) (var_ref i)) color) (constant vec3 (1.0 0.5 0.25)))
    (assign (var_ref i) (expression int + (var_ref i) (constant int (1))))
  ))
  (assign (swiz yz (array_ref (var_ref bar) (constant int (1)))) (constant vec2 (-1.0 2.0)))
  (assign (array_ref (var_ref foo) (constant int (2))) (expression vec2 neg (swiz xy (array_ref (var_ref bar) (constant int (0))))))
  (return)
))
";

#[test]
fn test_print_parse_fixpoint() {
    let shader = parse_shader(VERTEX).unwrap();
    let printed = shader.to_string();
    assert_eq!(printed, VERTEX);

    let reparsed = parse_shader(&printed).unwrap();
    assert_eq!(reparsed.to_string(), printed);
}

#[test]
fn test_parsed_structure() {
    let shader = parse_shader(VERTEX).unwrap();
    assert_eq!(shader.stage, ShaderStage::Vertex);
    assert_eq!(shader.interface_vars().count(), 4);

    let bar = shader.find_var("bar", VariableMode::ShaderOut).unwrap();
    assert_eq!(shader.vars[bar].fine_location(), Some(22));
    assert!(shader.vars[bar].invariant);
    assert!(shader.is_var_referenced(bar));

    let body = shader.main_body().unwrap();
    assert_eq!(shader.layout.len(body), 6);
    let kinds: Vec<_> = shader
        .layout
        .iter(body)
        .map(|inst| match &shader.insts[inst] {
            InstData::Declare(_) => "declare",
            InstData::Assign { .. } => "assign",
            InstData::Loop { .. } => "loop",
            InstData::Return => "return",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, ["declare", "assign", "loop", "assign", "assign", "return"]);
}

#[test]
fn test_fragment_discard_and_params() {
    let text = "\
shader fragment
(declare (in location=32 smooth) vec4 color)
(function helper (parameters (declare (param) float x) (declare (param_out) float y)) (
  (assign (var_ref y) (expression float dFdx (var_ref x)))
))
(function main (parameters) (
  (discard (expression bool < (swiz w (var_ref color)) (constant float (0.5))))
  (discard)
))
";
    let shader = parse_shader(text).unwrap();
    assert_eq!(shader.to_string(), text);
    assert!(shader.find_function("helper").is_some());
}
