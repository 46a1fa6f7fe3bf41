use std::path::Path;

use anyhow::{Context, Result, ensure};

use pyscript::{Config, Interpreter, OutputBuffer};
use test_support::{Case, CaseClass, load_cases, normalize_output};

struct Outcome {
    status: i32,
    stdout: String,
    stderr: String,
}

fn run_case(case: &Case) -> Result<Outcome> {
    let source = case.read_program()?;
    let stdout = OutputBuffer::new();
    let stderr = OutputBuffer::new();
    let mut interpreter = Interpreter::new(Config::default())
        .with_stdout(stdout.clone())
        .with_stderr(stderr.clone());
    let file = case.program_path.to_string_lossy();
    let status = interpreter.run_source(&file, &source);
    Ok(Outcome {
        status,
        stdout: stdout.contents(),
        stderr: stderr.contents(),
    })
}

fn check_case(case: &Case) -> Result<()> {
    let expected = &case.spec.expected;
    match case.spec.class {
        CaseClass::RuntimeSuccess => ensure!(
            expected.exit_code == 0,
            "Case {} expected exit code must be 0 for runtime_success",
            case.name
        ),
        CaseClass::FrontendError | CaseClass::RuntimeError => ensure!(
            expected.exit_code == 1,
            "Case {} expected exit code must be 1 for a failing program",
            case.name
        ),
    }
    if case.is_benchmark() {
        ensure!(
            case.spec.bench.as_ref().is_some_and(|bench| !bench.tags.is_empty()),
            "Case {} has bench enabled but no tags",
            case.name
        );
    }

    let outcome = run_case(case)?;
    ensure!(
        outcome.status == expected.exit_code,
        "Case {} exited with {} instead of {}; stderr:\n{}",
        case.name,
        outcome.status,
        expected.exit_code,
        outcome.stderr
    );

    match expected.stdout_file.as_deref() {
        Some(file) => {
            let expected_output = normalize_output(&case.read_text(file)?);
            assert_eq!(
                normalize_output(&outcome.stdout),
                expected_output,
                "stdout mismatch for {}",
                case.name
            );
        }
        None => ensure!(
            case.spec.class != CaseClass::RuntimeSuccess,
            "Missing stdout_file in {}",
            case.name
        ),
    }

    match expected.stderr_expectation() {
        Some((file, partial)) => {
            let expected_error = normalize_output(&case.read_text(file)?);
            let actual = normalize_output(&outcome.stderr);
            if partial {
                ensure!(
                    actual.contains(&expected_error),
                    "Expected stderr containing '{expected_error}' in {}, got '{actual}'",
                    case.name
                );
            } else {
                assert_eq!(actual, expected_error, "stderr mismatch for {}", case.name);
            }
        }
        None => {
            ensure!(
                case.spec.class == CaseClass::RuntimeSuccess,
                "Missing stderr expectation file in {}",
                case.name
            );
            ensure!(
                outcome.stderr.is_empty(),
                "Unexpected stderr in {}: {}",
                case.name,
                outcome.stderr
            );
        }
    }

    if case.spec.class == CaseClass::FrontendError {
        ensure!(
            outcome.stderr.contains("SyntaxError"),
            "Expected a SyntaxError in {}",
            case.name
        );
    }
    Ok(())
}

#[test]
fn runs_programs() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;
    for case in &cases {
        check_case(case).with_context(|| format!("Running case {}", case.name))?;
    }
    Ok(())
}
