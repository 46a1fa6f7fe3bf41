use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    /// Program runs to completion; stdout is compared exactly.
    RuntimeSuccess,
    /// Lexing, parsing or validation fails with a `SyntaxError`.
    FrontendError,
    /// Program raises an unhandled exception.
    RuntimeError,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchConfig {
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedOutcome {
    pub exit_code: i32,
    pub stdout_file: Option<String>,
    pub stderr_file: Option<String>,
    pub stderr_contains_file: Option<String>,
}

impl ExpectedOutcome {
    /// The stderr expectation, preferring a substring match file.
    pub fn stderr_expectation(&self) -> Option<(&str, bool)> {
        self.stderr_contains_file
            .as_deref()
            .map(|file| (file, true))
            .or_else(|| self.stderr_file.as_deref().map(|file| (file, false)))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    pub bench: Option<BenchConfig>,
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    /// Reads a file stored next to the program, such as expected output.
    pub fn read_text(&self, file: &str) -> Result<String> {
        let path = self.dir.join(file);
        fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))
    }

    pub fn read_program(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading program of {}", self.name))
    }

    pub fn is_benchmark(&self) -> bool {
        self.spec.bench.as_ref().is_some_and(|bench| bench.enabled)
    }
}

/// Reads every `<name>/case.yaml` + `<name>/program.pys` pair under
/// `programs_dir`, sorted by name. Directories without a `case.yaml` are
/// skipped.
pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let entries = fs::read_dir(programs_dir)
        .with_context(|| format!("Listing cases in {}", programs_dir.display()))?;
    let mut cases = Vec::new();
    for entry in entries {
        let dir = entry?.path();
        if let Some(case) = load_case(&dir)? {
            cases.push(case);
        }
    }
    ensure!(!cases.is_empty(), "{} holds no cases", programs_dir.display());
    cases.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(cases)
}

fn load_case(dir: &Path) -> Result<Option<Case>> {
    let manifest = dir.join("case.yaml");
    if !dir.is_dir() || !manifest.is_file() {
        return Ok(None);
    }
    let program_path = dir.join("program.pys");
    ensure!(program_path.is_file(), "{} has no program.pys", dir.display());

    let Some(name) = dir.file_name().and_then(|name| name.to_str()) else {
        anyhow::bail!("case directory {} is not valid UTF-8", dir.display());
    };
    let yaml = fs::read_to_string(&manifest)
        .with_context(|| format!("Reading {}", manifest.display()))?;
    let spec = serde_yaml::from_str(&yaml)
        .with_context(|| format!("Parsing {}", manifest.display()))?;
    Ok(Some(Case {
        name: name.to_string(),
        dir: dir.to_path_buf(),
        program_path,
        spec,
    }))
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}
