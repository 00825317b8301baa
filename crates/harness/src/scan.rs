// ==============================================================================
// Fixture discovery
// ==============================================================================
//
// Fixtures are the regular files directly inside the cases directory, visited
// in name order. A `TODO` in the file name parks a fixture, an unknown
// extension is ignored with a warning, and an `ONLY` in the file name
// restricts the whole run to that one fixture.

use std::io;
use std::path::{Path, PathBuf};

use fixture_parser::{extract_cases, Dialect, ExtractError, TestCase};
use miette::Diagnostic;
use thiserror::Error;

const TODO_MARKER: &str = "TODO";
const ONLY_MARKER: &str = "ONLY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub path: PathBuf,
    pub dialect: Dialect,
}

impl Fixture {
    /// Read the fixture and extract one entry per annotated line.
    pub fn load(&self) -> Result<Vec<Result<TestCase, ExtractError>>, FixtureError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| FixtureError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(extract_cases(&self.path, &text, self.dialect))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Todo,
    UnsupportedExtension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub fixtures: Vec<Fixture>,
    pub skipped: Vec<Skipped>,
    /// Set when an `ONLY` fixture excluded the rest.
    pub isolated: bool,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ScanError {
    #[error("failed to read cases directory {}: {source}", .path.display())]
    #[diagnostic(code(harness::scan::read_dir))]
    ReadDir { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error, Diagnostic)]
pub enum FixtureError {
    #[error("failed to read fixture {}: {source}", .path.display())]
    #[diagnostic(code(harness::scan::read_fixture))]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Annotation(#[from] ExtractError),
}

fn read_dir_error(dir: &Path) -> impl FnOnce(io::Error) -> ScanError + '_ {
    move |source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    }
}

/// List the fixtures in `dir`, applying the skip and isolation rules.
pub fn scan_fixtures(dir: &Path) -> Result<ScanOutcome, ScanError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_error(dir))? {
        let entry = entry.map_err(read_dir_error(dir))?;
        let file_type = entry.file_type().map_err(read_dir_error(dir))?;
        if file_type.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skipping non UTF-8 file name: {:?}", entry.file_name());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();

    let mut outcome = ScanOutcome::default();
    for name in names {
        let path = dir.join(&name);

        if name.contains(TODO_MARKER) {
            log::info!("skipping {}: marked TODO", path.display());
            outcome.skipped.push(Skipped {
                path,
                reason: SkipReason::Todo,
            });
            continue;
        }

        let Some(dialect) = Dialect::from_path(&path) else {
            log::warn!("skipping {}: unsupported file extension", path.display());
            outcome.skipped.push(Skipped {
                path,
                reason: SkipReason::UnsupportedExtension,
            });
            continue;
        };

        if name.contains(ONLY_MARKER) {
            log::info!("{} is marked ONLY; ignoring every other fixture", path.display());
            return Ok(ScanOutcome {
                fixtures: vec![Fixture { path, dialect }],
                skipped: outcome.skipped,
                isolated: true,
            });
        }

        outcome.fixtures.push(Fixture { path, dialect });
    }

    Ok(outcome)
}
