//! Binary-level checks: exit codes and the stdout/stderr contract.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn source_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn runs_a_program_and_prints_the_result() {
    let file = source_file("(+ 2 3)");
    Command::cargo_bin("ednjit")
        .unwrap()
        .args(["-f", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("JIT result: 5"))
        .stdout(predicate::str::contains("Generated IR"));
}

#[test]
fn missing_filename_fails() {
    Command::cargo_bin("ednjit")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("No filename provided."));
}

#[test]
fn compile_errors_go_to_stderr_with_the_path() {
    let file = source_file("(+ x 1)");
    let path = file.path().to_str().unwrap().to_string();
    Command::cargo_bin("ednjit")
        .unwrap()
        .args(["-f", &path])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown variable 'x'"))
        .stderr(predicate::str::contains(&path));
}

#[test]
fn help_exits_zero() {
    Command::cargo_bin("ednjit")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--filename"));
}
