use std::path::Path;
use std::process::Output;

use assert_cmd::Command;

include!(concat!(env!("OUT_DIR"), "/test_files.rs"));

// The tests included above are generated by build.rs, one per script under
// tests/data. Each script declares its expectations in comments:
//
//   // expect: <line of stdout>
//   // expect runtime error: <message>          (line number taken from here)
//   // Error at 'x': <message>                  (static error on this line)
//   // [line N] Error ...                       (static error, explicit line)

fn do_test(filename: &Path) {
    let output = find_expects(filename, "expect: ", ExpectKind::Stdout);

    let mut static_errors = vec![];
    static_errors.extend(find_expects(filename, "[line ", ExpectKind::Verbatim));
    static_errors.extend(find_expects(filename, "Error at ", ExpectKind::StaticError));
    let runtime_errors = find_expects(filename, "expect runtime error: ", ExpectKind::RuntimeError);

    let expected = output.join("\n");
    let expected_error =
        static_errors.iter().chain(&runtime_errors).cloned().collect::<Vec<_>>().join("\n");

    let expected_code = if !runtime_errors.is_empty() {
        70
    } else if !static_errors.is_empty() {
        65
    } else {
        0
    };

    let output = run_file(filename);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stdout = stdout.trim_end();

    let stderr = String::from_utf8(output.stderr).unwrap();
    let stderr = stderr.trim_end();

    assert_eq!(stdout, expected, "stdout mismatch for {}", filename.display());
    assert_eq!(stderr, expected_error, "stderr mismatch for {}", filename.display());
    assert_eq!(
        output.status.code(),
        Some(expected_code),
        "exit code mismatch for {}",
        filename.display()
    );
}

fn run_file(filename: &Path) -> Output {
    let mut cmd = Command::cargo_bin("silt").unwrap();
    cmd.arg(filename).output().unwrap()
}

#[test]
fn repl_echoes_expression_values() {
    let mut cmd = Command::cargo_bin("silt").unwrap();
    cmd.write_stdin("1 + 2\n").assert().success().stdout("> 3\n> ");
}

#[test]
fn repl_keeps_state_across_lines() {
    let mut cmd = Command::cargo_bin("silt").unwrap();
    cmd.write_stdin("var a = 40;\na + 2\n").assert().success().stdout("> > 42\n> ");
}

#[test]
fn environment_is_restored_after_a_runtime_error() {
    // The failing block must not leave its frame installed; the next line
    // defines and reads a global as if nothing happened.
    let mut cmd = Command::cargo_bin("silt").unwrap();
    let assert = cmd
        .write_stdin("{ var trap = 1; trap + ghost; }\nvar probe = 2;\nprint probe;\n")
        .assert()
        .success();
    let output = assert.get_output();
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    assert!(stdout.contains('2'));
}

#[test]
fn repl_survives_bad_input() {
    let mut cmd = Command::cargo_bin("silt").unwrap();
    let assert = cmd.write_stdin("var = ;\nprint \"still here\";\n").assert().success();
    let output = assert.get_output();
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    assert!(stdout.contains("still here"));
}

enum ExpectKind {
    /// Take the comment text as a line of expected stdout.
    Stdout,
    /// Take the comment text verbatim (it already carries "[line N]").
    Verbatim,
    /// Static diagnostic: prefix "[line N] " and keep the "Error at" text.
    StaticError,
    /// Runtime diagnostic: message on one line, "[line N]" on the next.
    RuntimeError,
}

fn find_expects(filename: &Path, prefix: &str, kind: ExpectKind) -> Vec<String> {
    let content = std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("failed to read {}", filename.display()));

    let comment = "// ";
    let pattern = format!("{}{}", comment, prefix);

    let mut result = vec![];
    for (line_idx, line) in content.lines().enumerate() {
        let Some(idx) = line.rfind(&pattern) else {
            continue;
        };

        let line_nr = line_idx + 1;
        match kind {
            ExpectKind::Stdout | ExpectKind::RuntimeError => {
                let target = &line[idx + pattern.len()..];
                if matches!(kind, ExpectKind::Stdout) {
                    result.push(target.to_owned());
                } else {
                    result.push(format!("{target}\n[line {line_nr}]"));
                }
            }
            ExpectKind::Verbatim => {
                result.push(line[idx + comment.len()..].to_owned());
            }
            ExpectKind::StaticError => {
                let target = &line[idx + comment.len()..];
                result.push(format!("[line {line_nr}] {target}"));
            }
        }
    }

    result
}
