//! The `transform` subtest - lowering pass tests
//!
//! `test transform <pass> [args]` runs one pass over each shader and
//! compares the printed result:
//! - `lower_varying_structs in|out`
//! - `lower_packed_varyings in|out [slots=N] [base=N]`
//! - `lower_clip_distance`

use lpc_glir::{parse_shader, Shader, VariableMode};
use lpc_link::{lower_clip_distance, lower_packed_varyings, lower_varying_structs, LinkResult};

use crate::{filecheck::check_output, parser::parse_test_file};

/// Run tests from transform test files
pub fn run_tests_from_file(content: &str) {
    let test_cases = parse_test_file(content);

    assert!(!test_cases.is_empty(), "No test cases found in test file");

    for case in test_cases {
        assert!(
            case.command.starts_with("test transform "),
            "Unexpected test command: {}",
            case.command
        );
        run_transform_test(&case.args(), &case.shader_text, &case.expected_text);
    }
}

fn parse_mode(word: Option<&&str>) -> VariableMode {
    match word.copied() {
        Some("in") => VariableMode::ShaderIn,
        Some("out") => VariableMode::ShaderOut,
        other => panic!("Expected `in` or `out`, got {:?}", other),
    }
}

/// Value of a `key=N` argument.
fn numeric_arg(args: &[&str], key: &str, default: u32) -> u32 {
    args.iter()
        .filter_map(|arg| arg.strip_prefix(key)?.strip_prefix('='))
        .map(|value| {
            value
                .parse()
                .unwrap_or_else(|_| panic!("Bad value for {}: {}", key, value))
        })
        .last()
        .unwrap_or(default)
}

fn apply(args: &[&str], shader: &mut Shader) -> LinkResult<()> {
    match args.first().copied() {
        Some("lower_varying_structs") => {
            lower_varying_structs(shader, parse_mode(args.get(1))).map(drop)
        }
        Some("lower_packed_varyings") => lower_packed_varyings(
            shader,
            parse_mode(args.get(1)),
            numeric_arg(args, "base", 32),
            numeric_arg(args, "slots", 32),
        ),
        Some("lower_clip_distance") => lower_clip_distance(shader).map(drop),
        other => panic!("Unknown transform: {:?}", other),
    }
}

/// Run a single transform test
fn run_transform_test(args: &[&str], shader_text: &str, expected_text: &str) {
    let mut shader = parse_shader(shader_text).unwrap_or_else(|e| {
        panic!("Failed to parse shader: {}\n\nShader text:\n{}", e, shader_text)
    });
    let actual = match apply(args, &mut shader) {
        Ok(()) => shader.to_string(),
        Err(e) => format!("error: {}\n", e),
    };
    check_output(&actual, expected_text, shader_text);
}
