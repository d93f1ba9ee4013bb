//! File-based tests for the shader IR and the interface linker.
//!
//! Similar to Cranelift's filetests, these tests read `.glir` files that contain:
//! - A test command (e.g., `test cat`, `test inouts`, `test transform ...`, `test link`)
//! - Shaders to test, in the s-expression text form
//! - Expected output or filecheck directives in `;` comments after each shader

pub mod filecheck;
pub mod parser;

mod test_cat;
mod test_inouts;
mod test_link;
mod test_transform;

pub use filecheck::{check_output, has_filecheck_directives, match_filecheck};
pub use parser::{parse_test_file, TestCase};

/// Run every case of a test file with the runner its `test` line names.
pub fn run_tests_from_file(content: &str) {
    let command = content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("test "))
        .unwrap_or_else(|| panic!("test file has no `test` command"));
    match command.split_whitespace().nth(1) {
        Some("cat") => test_cat::run_tests_from_file(content),
        Some("inouts") => test_inouts::run_tests_from_file(content),
        Some("transform") => test_transform::run_tests_from_file(content),
        Some("link") => test_link::run_tests_from_file(content),
        _ => panic!("Unknown test command: {}", command),
    }
}
