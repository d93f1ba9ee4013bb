//! Filecheck directive parsing and matching using the filecheck crate

use filecheck::{Checker, CheckerBuilder, NO_VARIABLES};

/// Build a filechecker from expected text containing directives
pub fn build_filechecker(expected_text: &str) -> Result<Checker, String> {
    let mut builder = CheckerBuilder::new();

    for line in expected_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        builder
            .directive(trimmed)
            .map_err(|e| format!("Failed to parse filecheck directive '{}': {}", trimmed, e))?;
    }

    Ok(builder.finish())
}

/// Match actual output against filecheck directives
pub fn match_filecheck(actual: &str, expected_text: &str) -> Result<(), String> {
    let checker = build_filechecker(expected_text)?;

    if checker
        .check(actual, NO_VARIABLES)
        .map_err(|e| format!("Filecheck error: {}", e))?
    {
        Ok(())
    } else {
        let (_, explain) = checker
            .explain(actual, NO_VARIABLES)
            .map_err(|e| format!("Failed to get filecheck explanation: {}", e))?;

        Err(format!("Filecheck failed:\n{}", explain))
    }
}

/// Whether the expected text is made of filecheck directives rather than
/// literal output.
pub fn has_filecheck_directives(expected_text: &str) -> bool {
    expected_text.lines().any(|line| {
        let trimmed = line.trim();
        ["check:", "nextln:", "sameln:", "not:", "unordered:", "regex:"]
            .iter()
            .any(|directive| trimmed.starts_with(directive))
    })
}

/// Compare `actual` against the expected text of a test case: filecheck
/// when it holds directives, line-by-line otherwise.
pub fn check_output(actual: &str, expected_text: &str, input: &str) {
    if has_filecheck_directives(expected_text) {
        if let Err(message) = match_filecheck(actual, expected_text) {
            panic!("{}\n\nActual:\n{}\n\nInput:\n{}", message, actual, input);
        }
        return;
    }

    let actual_normalized = crate::parser::normalize_ir(actual);
    let expected_normalized = crate::parser::normalize_ir(expected_text);
    if actual_normalized != expected_normalized {
        panic!(
            "Output mismatch!\n\nExpected:\n{}\n\nActual:\n{}\n\nInput:\n{}",
            expected_text, actual, input
        );
    }
}
