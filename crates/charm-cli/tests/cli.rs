//! Exercises the `charm` binary's exit-code contract from spec §6: `0` on a
//! successful run, `1` on bad usage, `2` on a file read failure.

use std::io::Write;
use std::process::Command;

fn charm_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_charm"))
}

fn write_source(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp source file");
    file.write_all(contents.as_bytes()).expect("write temp source file");
    file
}

#[test]
fn successful_run_exits_zero_and_prints_to_stdout() {
    let file = write_source("print(1 + 2 * 3);\n");
    let output = charm_bin().arg(file.path()).output().expect("run charm");
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "7.000000\n");
}

#[test]
fn missing_file_argument_exits_one() {
    let output = charm_bin().output().expect("run charm");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unreadable_file_exits_two() {
    let output = charm_bin().arg("/nonexistent/path/does-not-exist.charm").output().expect("run charm");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn runtime_error_exits_nonzero_with_diagnostic_on_stderr() {
    let file = write_source("print(undefined_name);\n");
    let output = charm_bin().arg(file.path()).output().expect("run charm");
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr).unwrap().contains("undefined variable"));
}

#[test]
fn dump_ast_prints_parsed_tree_without_running() {
    let file = write_source("var a = 1;\n");
    let output = charm_bin().arg("--dump-ast").arg(file.path()).output().expect("run charm");
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains('a'));
}

#[test]
fn walk_only_and_vm_only_are_mutually_exclusive() {
    let file = write_source("print(1);\n");
    let output = charm_bin().arg("--vm-only").arg("--walk-only").arg(file.path()).output().expect("run charm");
    assert!(!output.status.success());
}
