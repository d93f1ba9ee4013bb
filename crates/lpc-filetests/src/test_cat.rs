//! The `cat` subtest - roundtrip parse/print tests

use lpc_glir::parse_shader;

use crate::{filecheck::check_output, parser::parse_test_file};

/// Run tests from cat test files
pub fn run_tests_from_file(content: &str) {
    let test_cases = parse_test_file(content);

    assert!(!test_cases.is_empty(), "No test cases found in test file");

    for case in test_cases {
        assert_eq!(
            case.command, "test cat",
            "Unexpected test command: {}",
            case.command
        );
        run_cat_test(&case.shader_text, &case.expected_text);
    }
}

/// Run a single cat test (roundtrip parse/print)
fn run_cat_test(shader_text: &str, expected_text: &str) {
    let shader = parse_shader(shader_text).unwrap_or_else(|e| {
        panic!("Failed to parse shader: {}\n\nShader text:\n{}", e, shader_text)
    });
    let actual = shader.to_string();
    check_output(&actual, expected_text, shader_text);

    // The printed form parses back to the same text.
    let reparsed = parse_shader(&actual)
        .unwrap_or_else(|e| panic!("Failed to reparse printed shader: {}\n\n{}", e, actual));
    assert_eq!(reparsed.to_string(), actual, "print/parse is not stable");
}
