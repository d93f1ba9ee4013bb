//! The `inouts` subtest - interface liveness tests
//!
//! Prints the [`ProgramInterface`] recorded for each shader.

use std::fmt::Write;

use lpc_glir::parse_shader;
use lpc_link::{set_program_inouts, ProgramInterface};

use crate::{filecheck::check_output, parser::parse_test_file};

/// Run tests from inouts test files
pub fn run_tests_from_file(content: &str) {
    let test_cases = parse_test_file(content);

    assert!(!test_cases.is_empty(), "No test cases found in test file");

    for case in test_cases {
        assert_eq!(
            case.command, "test inouts",
            "Unexpected test command: {}",
            case.command
        );
        run_inouts_test(&case.shader_text, &case.expected_text);
    }
}

/// One line per field; interpolation as `slot.component=qualifier` for
/// each read input component that has one.
fn describe(prog: &ProgramInterface) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "inputs_read {}", prog.inputs_read);
    let _ = writeln!(out, "outputs_written {}", prog.outputs_written);
    let _ = writeln!(out, "system_values_read {}", prog.system_values_read);
    let _ = writeln!(out, "centroid {}", prog.is_centroid);
    let interp: Vec<String> = prog
        .inputs_read
        .iter()
        .filter_map(|bit| {
            let (slot, component) = (bit / 4, bit % 4);
            let keyword = prog.interp_qualifier(slot, component).keyword()?;
            Some(format!("{}.{}={}", slot, b"xyzw"[component as usize] as char, keyword))
        })
        .collect();
    let _ = writeln!(out, "interp {}", interp.join(" "));
    let _ = writeln!(out, "uses_derivative {}", prog.uses_derivative);
    let _ = writeln!(out, "uses_discard {}", prog.uses_discard);
    out
}

fn run_inouts_test(shader_text: &str, expected_text: &str) {
    let shader = parse_shader(shader_text).unwrap_or_else(|e| {
        panic!("Failed to parse shader: {}\n\nShader text:\n{}", e, shader_text)
    });
    let mut prog = ProgramInterface::new();
    let actual = match set_program_inouts(&shader, &mut prog) {
        Ok(()) => describe(&prog),
        Err(e) => format!("error: {}\n", e),
    };
    check_output(&actual, expected_text, shader_text);
}
