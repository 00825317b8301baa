// ==============================================================================
// Suite runner
// ==============================================================================
//
// Turns a cases directory into a flat list of named checks (one per annotated
// line, plus one per fixture that failed to load) and runs them one at a time
// against a single service. A check that can't reach the service is recorded
// and the run carries on with the next one.

use std::path::{Path, PathBuf};

use fixture_parser::TestCase;

use crate::engine::{run_case, CaseFailure, Verdict};
use crate::scan::{scan_fixtures, FixtureError, ScanError, ScanOutcome};
use crate::service::{CompletionService, ServiceError};

#[derive(Debug)]
pub enum CheckKind {
    Case(TestCase),
    /// The fixture couldn't be read, or one of its annotations is malformed.
    /// Reported as a failing check so it can't go unnoticed; a bad annotation
    /// only takes out its own line.
    BrokenFixture(FixtureError),
}

#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub fixture: PathBuf,
    pub kind: CheckKind,
}

#[derive(Debug)]
pub enum Outcome {
    Passed,
    Failed(CaseFailure),
    Errored(ServiceError),
    /// See [`CheckKind::BrokenFixture`] for the error.
    Broken,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "ok",
            Outcome::Failed(_) => "FAILED",
            Outcome::Errored(_) => "ERROR",
            Outcome::Broken => "BROKEN",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub broken: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.broken == 0
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored + self.broken
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed(_) => self.failed += 1,
            Outcome::Errored(_) => self.errored += 1,
            Outcome::Broken => self.broken += 1,
        }
    }
}

/// Receives progress while a suite runs.
pub trait Reporter {
    fn suite_started(&mut self, _suite: &Suite) {}

    fn check_finished(&mut self, check: &Check, outcome: &Outcome);

    fn suite_finished(&mut self, _summary: &RunSummary) {}
}

#[derive(Debug)]
pub struct Suite {
    pub dir: PathBuf,
    pub scan: ScanOutcome,
    pub checks: Vec<Check>,
}

impl Suite {
    /// Scan `dir` and extract every check, in fixture order then line order.
    pub fn discover(dir: &Path) -> Result<Self, ScanError> {
        let scan = scan_fixtures(dir)?;
        let mut checks = Vec::new();

        for fixture in &scan.fixtures {
            match fixture.load() {
                Ok(lines) => checks.extend(lines.into_iter().map(|line| match line {
                    Ok(case) => Check {
                        name: case.name(),
                        fixture: fixture.path.clone(),
                        kind: CheckKind::Case(case),
                    },
                    Err(err) => {
                        log::warn!("{err}");
                        Check {
                            name: format!("annotation {}:{}", fixture.path.display(), err.line),
                            fixture: fixture.path.clone(),
                            kind: CheckKind::BrokenFixture(err.into()),
                        }
                    }
                })),
                Err(err) => {
                    log::warn!("{err}");
                    checks.push(Check {
                        name: format!("load {}", fixture.path.display()),
                        fixture: fixture.path.clone(),
                        kind: CheckKind::BrokenFixture(err),
                    });
                }
            }
        }

        log::debug!(
            "discovered {} check(s) in {} fixture(s) under {}",
            checks.len(),
            scan.fixtures.len(),
            dir.display()
        );
        Ok(Suite {
            dir: dir.to_path_buf(),
            scan,
            checks,
        })
    }

    /// Keep only checks whose name contains `pattern`.
    pub fn filter(&mut self, pattern: &str) {
        self.checks.retain(|check| check.name.contains(pattern));
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.checks.iter().filter_map(|check| match &check.kind {
            CheckKind::Case(case) => Some(case),
            CheckKind::BrokenFixture(_) => None,
        })
    }

    pub async fn run<S>(
        &self,
        service: &mut S,
        settings: &serde_json::Value,
        reporter: &mut dyn Reporter,
    ) -> RunSummary
    where
        S: CompletionService + ?Sized,
    {
        let mut summary = RunSummary {
            skipped: self.scan.skipped.len(),
            ..RunSummary::default()
        };
        reporter.suite_started(self);

        for check in &self.checks {
            let outcome = match &check.kind {
                CheckKind::BrokenFixture(_) => Outcome::Broken,
                CheckKind::Case(case) => {
                    log::debug!("running {}", check.name);
                    match run_case(service, case, settings).await {
                        Ok(Verdict::Pass) => Outcome::Passed,
                        Ok(Verdict::Fail(failure)) => Outcome::Failed(failure),
                        Err(err) => {
                            log::error!("{}: {err}", check.name);
                            Outcome::Errored(err)
                        }
                    }
                }
            };
            summary.record(&outcome);
            reporter.check_finished(check, &outcome);
        }

        reporter.suite_finished(&summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ScriptedService;

    #[derive(Default)]
    struct Recorder {
        started: usize,
        lines: Vec<String>,
        finished: Option<RunSummary>,
    }

    impl Reporter for Recorder {
        fn suite_started(&mut self, _suite: &Suite) {
            self.started += 1;
        }

        fn check_finished(&mut self, check: &Check, outcome: &Outcome) {
            self.lines.push(format!("{} {}", outcome.label(), check.name));
        }

        fn suite_finished(&mut self, summary: &RunSummary) {
            self.finished = Some(*summary);
        }
    }

    fn write(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).expect("write fixture");
    }

    #[tokio::test]
    async fn runs_every_case_and_reports() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path();
        write(&dir, "a.ts", "obj. // obj.x; !obj.y\nobj. // obj.z\n");
        write(&dir, "b.ts", "x. // a; !a\n");
        write(&dir, "c_TODO.ts", "obj. // obj.x\n");

        let suite = Suite::discover(&dir).expect("readable");
        assert_eq!(suite.checks.len(), 3);
        assert_eq!(suite.cases().count(), 2);

        let mut service = ScriptedService::with_names(&["obj.x"]);
        let mut reporter = Recorder::default();
        let summary = suite
            .run(&mut service, &serde_json::Value::Null, &mut reporter)
            .await;

        assert_eq!(
            summary,
            RunSummary {
                passed: 1,
                failed: 1,
                errored: 0,
                broken: 1,
                skipped: 1,
            }
        );
        assert!(!summary.is_success());
        assert_eq!(reporter.started, 1);
        assert_eq!(reporter.finished, Some(summary));

        let a = dir.join("a.ts");
        let b = dir.join("b.ts");
        assert_eq!(
            reporter.lines,
            vec![
                format!("ok get completions {}:4", a.display()),
                format!("FAILED get completions {}:26", a.display()),
                format!("BROKEN annotation {}:1", b.display()),
            ]
        );
    }

    #[tokio::test]
    async fn bad_annotation_only_breaks_its_own_line() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path();
        write(
            &dir,
            "a.ts",
            "obj. // obj.x\nobj. // obj.missing\nobj. // obj.y; !obj.y\n",
        );

        let suite = Suite::discover(&dir).expect("readable");
        assert_eq!(suite.checks.len(), 3);

        let mut service = ScriptedService::with_names(&["obj.x"]);
        let mut reporter = Recorder::default();
        let summary = suite
            .run(&mut service, &serde_json::Value::Null, &mut reporter)
            .await;

        assert_eq!(
            summary,
            RunSummary {
                passed: 1,
                failed: 1,
                errored: 0,
                broken: 1,
                skipped: 0,
            }
        );
        assert_eq!(service.completion_requests(), 2);

        let a = dir.join("a.ts");
        assert_eq!(
            reporter.lines,
            vec![
                format!("ok get completions {}:4", a.display()),
                format!("FAILED get completions {}:18", a.display()),
                format!("BROKEN annotation {}:3", a.display()),
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_fixture_is_one_broken_check() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path();
        // Not valid UTF-8.
        std::fs::write(dir.join("a.ts"), [0xff, 0xfe, b'\n']).expect("write fixture");

        let suite = Suite::discover(&dir).expect("readable");
        assert_eq!(suite.checks.len(), 1);
        assert_eq!(suite.checks[0].name, format!("load {}", dir.join("a.ts").display()));
        assert!(matches!(
            suite.checks[0].kind,
            CheckKind::BrokenFixture(FixtureError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn service_errors_do_not_stop_the_run() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path();
        write(&dir, "a.ts", "obj. // obj.x\nobj. // obj.x\n");

        let suite = Suite::discover(&dir).expect("readable");
        let mut service = ScriptedService::with_names(&["obj.x"]);
        service.disconnect();
        let mut reporter = Recorder::default();
        let summary = suite
            .run(&mut service, &serde_json::Value::Null, &mut reporter)
            .await;

        assert_eq!(summary.errored, 2);
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn filter_narrows_checks() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let dir = tmp.path();
        write(&dir, "alpha.ts", "obj. // obj.x\n");
        write(&dir, "beta.py", "obj.  # obj.x\n");

        let mut suite = Suite::discover(&dir).expect("readable");
        suite.filter("beta.py");
        assert_eq!(suite.checks.len(), 1);

        let mut service = ScriptedService::with_names(&["obj.x"]);
        let summary = suite
            .run(&mut service, &serde_json::Value::Null, &mut Recorder::default())
            .await;
        assert_eq!(summary.passed, 1);
        assert_eq!(service.completion_requests(), 1);
    }
}
