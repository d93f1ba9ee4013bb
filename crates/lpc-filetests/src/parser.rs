//! Test file parsing

/// A test case extracted from a test file
#[derive(Debug, Clone)]
pub struct TestCase {
    /// The shader text; `test link` cases hold two shaders back to back
    pub shader_text: String,
    /// The expected output text (from comments) or filecheck directives
    pub expected_text: String,
    /// The test command line, e.g. `test lower_packed_varyings out slots=2`
    pub command: String,
}

impl TestCase {
    /// Words of the command after `test <name>`.
    pub fn args(&self) -> Vec<&str> {
        self.command.split_whitespace().skip(2).collect()
    }

    /// Split `shader_text` at each `shader` header line.
    pub fn shaders(&self) -> Vec<String> {
        let mut shaders: Vec<String> = Vec::new();
        for line in self.shader_text.lines() {
            if line.trim_start().starts_with("shader ") || shaders.is_empty() {
                shaders.push(String::new());
            }
            if let Some(current) = shaders.last_mut() {
                current.push_str(line);
                current.push('\n');
            }
        }
        shaders
    }
}

/// Parenthesis depth change of one line, ignoring `;` comments.
fn paren_delta(line: &str) -> i32 {
    let code = line.split(';').next().unwrap_or("");
    code.chars()
        .map(|ch| match ch {
            '(' => 1,
            ')' => -1,
            _ => 0,
        })
        .sum()
}

/// Strip the `;` comment prefix from an expected-output line.
fn strip_comment(line: &str) -> String {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("; ") {
        String::from(rest)
    } else if let Some(rest) = trimmed.strip_prefix(';') {
        String::from(rest)
    } else {
        String::from(trimmed)
    }
}

/// Parse a test file and extract shaders with their expected outputs
pub fn parse_test_file(content: &str) -> Vec<TestCase> {
    let lines: Vec<&str> = content.lines().collect();
    let mut test_cases = Vec::new();
    let mut i = 0;

    // Parse test command from header
    let mut command = String::new();
    while i < lines.len() {
        let line = lines[i].trim();
        if line.starts_with("test ") {
            command = String::from(line);
            i += 1;
            break;
        }
        i += 1;
    }

    while i < lines.len() {
        if !lines[i].trim_start().starts_with("shader ") {
            i += 1;
            continue;
        }

        // The shader text runs until a comment line at depth 0
        let shader_start = i;
        let mut depth = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if depth == 0 && line.starts_with(';') {
                break;
            }
            depth += paren_delta(line);
            i += 1;
        }
        let shader_text = lines[shader_start..i].join("\n");

        // Expected output: the comment lines right after the shader, up to
        // the first blank line
        let mut expected = Vec::new();
        while i < lines.len() && lines[i].trim().starts_with(';') {
            expected.push(strip_comment(lines[i]));
            i += 1;
        }

        test_cases.push(TestCase {
            shader_text,
            expected_text: expected.join("\n"),
            command: command.clone(),
        });
    }

    test_cases
}

/// Normalize IR text for comparison
pub fn normalize_ir(ir: &str) -> Vec<String> {
    ir.lines()
        .map(|l| String::from(l.trim()))
        .filter(|l| !l.is_empty())
        .collect()
}
