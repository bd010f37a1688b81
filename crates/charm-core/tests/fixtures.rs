//! Fixture-driven tests: one `.charm` source file per case, with the
//! expected outcome recorded in a trailing comment line.
//!
//! The expectation line is the LAST line of the file and takes one of two
//! forms:
//!   `// Output=<text>`  - program must run to completion; stdout (with
//!                         each `\n` written as the two characters `\` `n`)
//!                         must equal `<text>` after unescaping.
//!   `// Error=<text>`   - program must fail (parse, compile, or runtime);
//!                         the error's `Display` output must equal `<text>`.

use std::error::Error;
use std::fs;
use std::path::Path;

use charm_core::run_tree_walk;

#[derive(Debug)]
enum Expectation {
    Output(String),
    Error(String),
}

fn unescape(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn parse_fixture(content: &str) -> (String, Expectation) {
    let lines: Vec<&str> = content.lines().collect();
    assert!(!lines.is_empty(), "empty fixture file");

    let last_line = lines.last().unwrap();
    let source_lines = &lines[..lines.len() - 1];
    let source = source_lines.join("\n");

    let expectation = if let Some(expected) = last_line.strip_prefix("// Output=") {
        Expectation::Output(unescape(expected))
    } else if let Some(expected) = last_line.strip_prefix("// Error=") {
        Expectation::Error(expected.to_string())
    } else {
        panic!("fixture is missing a trailing `// Output=` or `// Error=` line: {last_line:?}");
    };

    (source, expectation)
}

fn run_fixture_test(path: &Path) -> Result<(), Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let (source, expectation) = parse_fixture(&content);
    let name = path.strip_prefix("test_cases").unwrap_or(path).display().to_string();

    let mut out = Vec::new();
    match run_tree_walk(&source, &mut out) {
        Ok(()) => {
            let stdout = String::from_utf8(out)?;
            match expectation {
                Expectation::Output(expected) => {
                    assert_eq!(stdout, expected, "[{name}] stdout mismatch");
                }
                Expectation::Error(expected) => {
                    panic!("[{name}] expected error {expected:?}, program ran to completion with stdout {stdout:?}");
                }
            }
        }
        Err(err) => match expectation {
            Expectation::Error(expected) => {
                assert_eq!(err.to_string(), expected, "[{name}] error message mismatch");
            }
            Expectation::Output(expected) => {
                panic!("[{name}] expected output {expected:?}, got error: {err}");
            }
        },
    }
    Ok(())
}

datatest_stable::harness!(run_fixture_test, "test_cases", r"^.*\.charm$");
