use std::path::Path;

use test_support::{Case, load_cases};

/// Program cases marked as benchmarks, with their source text.
pub fn workloads() -> Vec<(String, String)> {
    let cases = load_cases(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load cases: {err:#}"));
    cases
        .iter()
        .filter(|case| case.is_benchmark())
        .map(|case: &Case| {
            let source = case
                .read_program()
                .unwrap_or_else(|err| panic!("read {}: {err:#}", case.name));
            (case.name.clone(), source)
        })
        .collect()
}
